//! JSX render functions lowered to template IR.

use crate::error::{CompilerError, ERR_SCRIPT_PARSE};
use crate::expression::apply_replacements;
use crate::ir::{
    Attr, Directive, DirectiveKind, ElementNode, InterpolationNode, SourceLocation, StaticAttr,
    TemplateNode, TextNode,
};
use crate::script::script_source_type;
use crate::visitor::{walk_children, TemplateVisitor};
use oxc_allocator::Allocator;
use oxc_ast::ast::*;
use oxc_ast_visit::{walk, Visit};
use oxc_parser::Parser;
use oxc_span::{GetSpan, Span};

// ═══════════════════════════════════════════════════════════════════════════════
// JSX LOWERER
// Turns the JSX returned by `render` into the template IR
// ═══════════════════════════════════════════════════════════════════════════════

/// Template recovered from a JSX component.
#[derive(Debug, Default)]
pub struct JsxTemplate {
    pub nodes: Vec<TemplateNode>,
    pub warnings: Vec<String>,
}

/// Collects `this.` prefixes inside one expression.
struct ThisMembers {
    edits: Vec<(u32, u32, String)>,
}

impl<'a> Visit<'a> for ThisMembers {
    fn visit_static_member_expression(&mut self, it: &StaticMemberExpression<'a>) {
        if let Expression::ThisExpression(this) = &it.object {
            self.edits.push((this.span.start, it.property.span.start, String::new()));
        }
        walk::walk_static_member_expression(self, it);
    }
}

pub struct JsxLowerer<'s> {
    source: &'s str,
    warnings: Vec<String>,
}

impl<'s> JsxLowerer<'s> {
    pub fn new(source: &'s str) -> Self {
        Self {
            source,
            warnings: Vec::new(),
        }
    }

    fn loc(&self, span: Span) -> SourceLocation {
        let (line, column) = crate::error::line_col(self.source, span.start as usize);
        SourceLocation { line, column }
    }

    /// Expression text with `this.x` printed as `x`.
    fn expr_text(&self, expr: &Expression<'_>) -> String {
        let mut members = ThisMembers { edits: Vec::new() };
        members.visit_expression(expr);
        apply_replacements(self.source, expr.span(), members.edits)
    }

    fn directive(&self, kind: DirectiveKind, arg: Option<&str>, exp: Option<String>, span: Span) -> Directive {
        let raw_name = match (&kind, arg) {
            (DirectiveKind::Bind, Some(arg)) => format!(":{}", arg),
            (DirectiveKind::On, Some(arg)) => format!("@{}", arg),
            (DirectiveKind::If, _) => "v-if".to_string(),
            (DirectiveKind::Else, _) => "v-else".to_string(),
            (DirectiveKind::For, _) => "v-for".to_string(),
            _ => String::new(),
        };
        Directive {
            kind,
            arg: arg.map(str::to_string),
            dynamic_arg: false,
            modifiers: Vec::new(),
            exp,
            raw_name,
            loc: self.loc(span),
        }
    }

    fn tag_name(&self, name: &JSXElementName<'_>) -> Option<String> {
        match name {
            JSXElementName::Identifier(id) => Some(id.name.to_string()),
            JSXElementName::IdentifierReference(id) => Some(id.name.to_string()),
            JSXElementName::NamespacedName(ns) => Some(format!("{}:{}", ns.namespace.name, ns.name.name)),
            _ => None,
        }
    }

    fn member_name(me: &JSXMemberExpression<'_>) -> String {
        let object = match &me.object {
            JSXMemberExpressionObject::IdentifierReference(id) => id.name.to_string(),
            JSXMemberExpressionObject::MemberExpression(inner) => Self::member_name(inner),
            JSXMemberExpressionObject::ThisExpression(_) => "this".to_string(),
        };
        format!("{}.{}", object, me.property.name)
    }

    fn attribute(&mut self, attr: &JSXAttribute<'_>) -> Option<Attr> {
        let raw = match &attr.name {
            JSXAttributeName::Identifier(id) => id.name.to_string(),
            JSXAttributeName::NamespacedName(ns) => format!("{}:{}", ns.namespace.name, ns.name.name),
        };
        let name = if raw == "className" { "class".to_string() } else { raw };

        let event = name
            .strip_prefix("on")
            .filter(|rest| rest.chars().next().is_some_and(|c| c.is_ascii_uppercase()))
            .map(|rest| {
                let mut chars = rest.chars();
                let first = chars.next().map(|c| c.to_ascii_lowercase()).unwrap_or_default();
                format!("{}{}", first, chars.as_str())
            });

        match &attr.value {
            None => Some(Attr::Static(StaticAttr { name, value: None })),
            Some(JSXAttributeValue::StringLiteral(s)) => match event {
                Some(event) => Some(Attr::Directive(self.directive(
                    DirectiveKind::On,
                    Some(&event),
                    Some(s.value.to_string()),
                    attr.span,
                ))),
                None => Some(Attr::Static(StaticAttr {
                    name,
                    value: Some(s.value.to_string()),
                })),
            },
            Some(JSXAttributeValue::ExpressionContainer(container)) => {
                let expr = container.expression.as_expression()?;
                let exp = self.expr_text(expr);
                Some(Attr::Directive(match event {
                    Some(event) => self.directive(DirectiveKind::On, Some(&event), Some(exp), attr.span),
                    None => self.directive(DirectiveKind::Bind, Some(&name), Some(exp), attr.span),
                }))
            }
            Some(_) => {
                self.warnings
                    .push(format!("JSX element values are not supported for attribute `{}`", name));
                None
            }
        }
    }

    fn element(&mut self, element: &JSXElement<'_>) -> Vec<TemplateNode> {
        let children = self.children(&element.children);
        let Some(tag) = self.tag_name(&element.opening_element.name) else {
            let shown = match &element.opening_element.name {
                JSXElementName::MemberExpression(me) => Self::member_name(me),
                _ => "this".to_string(),
            };
            self.warnings.push(format!(
                "JSX tag `<{}>` cannot be expressed in a template; only its children are rendered",
                shown
            ));
            return children;
        };
        let mut node = ElementNode::new(tag);
        node.loc = self.loc(element.span);
        node.self_closing = element.closing_element.is_none();
        for item in &element.opening_element.attributes {
            match item {
                JSXAttributeItem::Attribute(attr) => {
                    if let Some(attr) = self.attribute(attr) {
                        node.attrs.push(attr);
                    }
                }
                JSXAttributeItem::SpreadAttribute(spread) => self.warnings.push(format!(
                    "JSX spread attribute `{{...{}}}` is skipped",
                    self.expr_text(&spread.argument)
                )),
            }
        }
        node.children = children;
        vec![TemplateNode::Element(node)]
    }

    /// Attaches a structural directive, wrapping in `<template>` unless the
    /// nodes are a single element.
    fn with_directive(&self, mut nodes: Vec<TemplateNode>, directive: Directive) -> TemplateNode {
        if nodes.len() == 1 {
            if let Some(TemplateNode::Element(el)) = nodes.first_mut() {
                el.attrs.insert(0, Attr::Directive(directive));
                return nodes.remove(0);
            }
        }
        let mut wrapper = ElementNode::new("template");
        wrapper.loc = directive.loc;
        wrapper.attrs.push(Attr::Directive(directive));
        wrapper.children = nodes;
        TemplateNode::Element(wrapper)
    }

    fn is_jsx(expr: &Expression<'_>) -> bool {
        matches!(
            expr.get_inner_expression(),
            Expression::JSXElement(_) | Expression::JSXFragment(_)
        )
    }

    fn is_empty_value(expr: &Expression<'_>) -> bool {
        match expr.get_inner_expression() {
            Expression::NullLiteral(_) | Expression::BooleanLiteral(_) => true,
            Expression::Identifier(id) => id.name == "undefined",
            _ => false,
        }
    }

    /// Lowers a value that may be JSX; other values become interpolations.
    fn value(&mut self, expr: &Expression<'_>) -> Vec<TemplateNode> {
        match expr.get_inner_expression() {
            Expression::JSXElement(el) => self.element(el),
            Expression::JSXFragment(frag) => self.children(&frag.children),
            _ if Self::is_empty_value(expr) => Vec::new(),
            other => vec![TemplateNode::Interpolation(InterpolationNode {
                expression: self.expr_text(other),
                loc: self.loc(other.span()),
            })],
        }
    }

    /// `list.map((item, index) => <A/>)`
    fn map_call(&mut self, call: &CallExpression<'_>) -> Option<TemplateNode> {
        let Expression::StaticMemberExpression(member) = &call.callee else { return None };
        if member.property.name != "map" || call.arguments.len() != 1 {
            return None;
        }
        let (params, body) = match call.arguments.first()?.as_expression()?.get_inner_expression() {
            Expression::ArrowFunctionExpression(arrow) => (&arrow.params, &arrow.body),
            Expression::FunctionExpression(func) => (&func.params, func.body.as_ref()?),
            _ => return None,
        };
        let returned = body.statements.iter().find_map(|stmt| match stmt {
            Statement::ExpressionStatement(es) => Some(&es.expression),
            Statement::ReturnStatement(ret) => ret.argument.as_ref(),
            _ => None,
        })?;
        if !Self::is_jsx(returned) {
            return None;
        }
        let aliases: Vec<&str> = params
            .items
            .iter()
            .map(|p| &self.source[p.pattern.span().start as usize..p.pattern.span().end as usize])
            .collect();
        let alias = match aliases.len() {
            0 => "item".to_string(),
            1 => aliases[0].to_string(),
            _ => format!("({})", aliases.join(", ")),
        };
        let list = self.expr_text(&member.object);
        let nodes = self.value(returned);
        let directive = self.directive(
            DirectiveKind::For,
            None,
            Some(format!("{} in {}", alias, list)),
            call.span,
        );
        Some(self.with_directive(nodes, directive))
    }

    fn expression_child(&mut self, expr: &Expression<'_>, out: &mut Vec<TemplateNode>) {
        match expr.get_inner_expression() {
            Expression::LogicalExpression(logical)
                if logical.operator == LogicalOperator::And && Self::is_jsx(&logical.right) =>
            {
                let nodes = self.value(&logical.right);
                let test = self.expr_text(&logical.left);
                let directive = self.directive(DirectiveKind::If, None, Some(test), logical.span);
                out.push(self.with_directive(nodes, directive));
            }
            Expression::ConditionalExpression(cond)
                if Self::is_jsx(&cond.consequent) || Self::is_jsx(&cond.alternate) =>
            {
                let test = self.expr_text(&cond.test);
                let consequent = self.value(&cond.consequent);
                let alternate = self.value(&cond.alternate);
                if consequent.is_empty() {
                    let negated = format!("!({})", test);
                    let directive = self.directive(DirectiveKind::If, None, Some(negated), cond.span);
                    out.push(self.with_directive(alternate, directive));
                    return;
                }
                let directive = self.directive(DirectiveKind::If, None, Some(test), cond.span);
                out.push(self.with_directive(consequent, directive));
                if !alternate.is_empty() {
                    let directive = self.directive(DirectiveKind::Else, None, None, cond.alternate.span());
                    out.push(self.with_directive(alternate, directive));
                }
            }
            Expression::CallExpression(call) => match self.map_call(call) {
                Some(node) => out.push(node),
                None => out.extend(self.value(expr)),
            },
            _ => out.extend(self.value(expr)),
        }
    }

    fn children(&mut self, children: &[JSXChild<'_>]) -> Vec<TemplateNode> {
        let mut out = Vec::new();
        for child in children {
            match child {
                JSXChild::Text(text) => {
                    let value = jsx_text(&text.value);
                    if !value.is_empty() {
                        out.push(TemplateNode::Text(TextNode {
                            value,
                            loc: self.loc(text.span),
                        }));
                    }
                }
                JSXChild::Element(el) => out.extend(self.element(el)),
                JSXChild::Fragment(frag) => out.extend(self.children(&frag.children)),
                JSXChild::ExpressionContainer(container) => {
                    if let Some(expr) = container.expression.as_expression() {
                        self.expression_child(expr, &mut out);
                    }
                }
                JSXChild::Spread(spread) => self.warnings.push(format!(
                    "JSX spread child `{{...{}}}` is skipped",
                    self.expr_text(&spread.expression)
                )),
            }
        }
        out
    }
}

/// JSX whitespace rules: lines are trimmed and blank lines dropped.
fn jsx_text(raw: &str) -> String {
    if !raw.contains('\n') {
        return raw.to_string();
    }
    let lines: Vec<&str> = raw.lines().collect();
    let last = lines.len().saturating_sub(1);
    let mut parts = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        let mut line = *line;
        if i != 0 {
            line = line.trim_start();
        }
        if i != last {
            line = line.trim_end();
        }
        if !line.is_empty() {
            parts.push(line);
        }
    }
    parts.join(" ")
}

/// Merges adjacent text nodes the lowering produced.
struct TextCompactor;

impl TemplateVisitor for TextCompactor {
    fn visit_children(&mut self, children: &mut Vec<TemplateNode>) {
        let mut merged: Vec<TemplateNode> = Vec::with_capacity(children.len());
        for node in children.drain(..) {
            if let (Some(TemplateNode::Text(prev)), TemplateNode::Text(next)) = (merged.last_mut(), &node) {
                prev.value.push_str(&next.value);
                continue;
            }
            merged.push(node);
        }
        *children = merged;
        walk_children(self, children);
    }
}

/// The JSX returned by a `render` body.
fn returned_jsx<'b, 'a>(body: &'b FunctionBody<'a>) -> Option<&'b Expression<'a>> {
    body.statements.iter().find_map(|stmt| match stmt {
        Statement::ReturnStatement(ret) => ret.argument.as_ref().filter(|e| JsxLowerer::is_jsx(e)),
        Statement::ExpressionStatement(es) if JsxLowerer::is_jsx(&es.expression) => Some(&es.expression),
        _ => None,
    })
}

fn render_body<'b, 'a>(obj: &'b ObjectExpression<'a>) -> Option<&'b FunctionBody<'a>> {
    obj.properties.iter().find_map(|p| {
        let ObjectPropertyKind::ObjectProperty(prop) = p else { return None };
        if prop.computed || !prop.key.is_specific_static_name("render") {
            return None;
        }
        match prop.value.get_inner_expression() {
            Expression::FunctionExpression(func) => func.body.as_deref(),
            Expression::ArrowFunctionExpression(arrow) => Some(&*arrow.body),
            _ => None,
        }
    })
}

fn options_object<'b, 'a>(program: &'b Program<'a>) -> Option<&'b ObjectExpression<'a>> {
    program.body.iter().find_map(|stmt| {
        let Statement::ExportDefaultDeclaration(decl) = stmt else { return None };
        match decl.declaration.as_expression()?.get_inner_expression() {
            Expression::ObjectExpression(obj) => Some(&**obj),
            Expression::CallExpression(call) => match call.arguments.first()?.as_expression()?.get_inner_expression() {
                Expression::ObjectExpression(obj) => Some(&**obj),
                _ => None,
            },
            _ => None,
        }
    })
}

/// Lowers the `render` of a `.jsx`/`.tsx` component. `Ok(None)` when the
/// module has no render function returning JSX.
pub fn lower_jsx_render(source: &str, filename: &str, is_ts: bool) -> Result<Option<JsxTemplate>, CompilerError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, script_source_type(is_ts)).parse();
    if let Some(err) = ret.errors.first() {
        return Err(CompilerError::at_file(ERR_SCRIPT_PARSE, &err.to_string(), filename));
    }
    let Some(body) = options_object(&ret.program).and_then(render_body) else {
        return Ok(None);
    };
    let Some(jsx) = returned_jsx(body) else {
        return Ok(None);
    };
    let mut lowerer = JsxLowerer::new(source);
    let mut nodes = lowerer.value(jsx);
    TextCompactor.visit_children(&mut nodes);
    tracing::debug!(file = %filename, nodes = nodes.len(), "lowered jsx render");
    Ok(Some(JsxTemplate {
        nodes,
        warnings: lowerer.warnings,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lower(source: &str) -> JsxTemplate {
        lower_jsx_render(source, "comp.jsx", false).unwrap().unwrap()
    }

    fn element(node: &TemplateNode) -> &ElementNode {
        node.as_element().unwrap()
    }

    #[test]
    fn attributes_and_events() {
        let t = lower(
            "export default {\n  render() {\n    return <view className=\"box\" style={{ color: this.color }} onTap={this.toggle} data-id=\"1\">{this.title}</view>\n  }\n}\n",
        );
        assert_eq!(t.nodes.len(), 1);
        let el = element(&t.nodes[0]);
        assert_eq!(el.tag, "view");
        assert_eq!(el.static_attr("class").and_then(|a| a.value.as_deref()), Some("box"));
        assert_eq!(el.bound_attr("style"), Some((true, "{ color: color }".to_string())));
        let on = el.directive(&DirectiveKind::On).unwrap();
        assert_eq!(on.arg.as_deref(), Some("tap"));
        assert_eq!(on.exp.as_deref(), Some("toggle"));
        match &el.children[0] {
            TemplateNode::Interpolation(i) => assert_eq!(i.expression, "title"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn conditionals_and_lists() {
        let t = lower(
            "export default defineComponent({\n  render: () => (\n    <view>\n      {this.ok && <text>yes</text>}\n      {this.mode ? <A /> : <B />}\n      {this.items.map((item, index) => <text key={item.id}>{item.name}</text>)}\n    </view>\n  ),\n})\n",
        );
        let root = element(&t.nodes[0]);
        let kids: Vec<&ElementNode> = root.children.iter().filter_map(TemplateNode::as_element).collect();
        assert_eq!(kids.len(), 4);
        assert_eq!(kids[0].directive(&DirectiveKind::If).and_then(|d| d.exp.as_deref()), Some("ok"));
        assert_eq!(kids[1].tag, "A");
        assert_eq!(kids[1].directive(&DirectiveKind::If).and_then(|d| d.exp.as_deref()), Some("mode"));
        assert!(kids[2].has_directive(&DirectiveKind::Else));
        assert_eq!(
            kids[3].directive(&DirectiveKind::For).and_then(|d| d.exp.as_deref()),
            Some("(item, index) in items")
        );
        assert_eq!(kids[3].bound_attr("key"), Some((true, "item.id".to_string())));
    }

    #[test]
    fn member_tags_and_spreads_warn() {
        let t = lower(
            "export default {\n  render() {\n    return <Foo.Bar {...this.rest}>\n      <view>x</view>\n    </Foo.Bar>\n  }\n}\n",
        );
        assert_eq!(element(&t.nodes[0]).tag, "view");
        assert_eq!(t.warnings.len(), 1);
        assert!(t.warnings[0].contains("<Foo.Bar>"));
    }

    #[test]
    fn jsx_text_whitespace() {
        assert_eq!(jsx_text("\n    hello\n    world\n  "), "hello world");
        assert_eq!(jsx_text(" a "), " a ");
    }

    #[test]
    fn missing_render_is_none() {
        assert!(lower_jsx_render("export default { data() { return {} } }", "a.jsx", false)
            .unwrap()
            .is_none());
    }
}

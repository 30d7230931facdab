//! Expression lowering and compact printing.
//!
//! Template engines of the WXML family accept a small subset of JavaScript:
//! no optional chaining, no nullish coalescing and no template literals.
//! [`ExpressionPrinter`] re-prints a parsed expression compactly while
//! lowering those three constructs, and lets callers rewrite free identifiers
//! (loop aliases, `ctx.` / `scope.` / `this.` prefixes) in the same pass.

use oxc_allocator::Allocator;
use oxc_ast::ast::*;
use oxc_ast_visit::walk;
use oxc_ast_visit::Visit;
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType, Span};
use oxc_syntax::scope::ScopeFlags;
use std::collections::HashSet;

// ═══════════════════════════════════════════════════════════════════════════════
// PRECEDENCE
// ═══════════════════════════════════════════════════════════════════════════════

const PREC_SEQUENCE: u8 = 1;
const PREC_ASSIGN: u8 = 2;
const PREC_CONDITIONAL: u8 = 3;
const PREC_OR: u8 = 5;
const PREC_AND: u8 = 6;
const PREC_EQUALITY: u8 = 10;
const PREC_ADDITIVE: u8 = 13;
const PREC_MULTIPLICATIVE: u8 = 14;
const PREC_EXPONENT: u8 = 15;
const PREC_UNARY: u8 = 16;
const PREC_UPDATE: u8 = 17;
const PREC_CALL: u8 = 18;
const PREC_PRIMARY: u8 = 20;

fn binary_precedence(op: BinaryOperator) -> u8 {
    match op.as_str() {
        "|" => 7,
        "^" => 8,
        "&" => 9,
        "==" | "!=" | "===" | "!==" => PREC_EQUALITY,
        "<" | ">" | "<=" | ">=" | "in" | "instanceof" => 11,
        "<<" | ">>" | ">>>" => 12,
        "+" | "-" => PREC_ADDITIVE,
        "*" | "/" | "%" => PREC_MULTIPLICATIVE,
        "**" => PREC_EXPONENT,
        _ => PREC_EQUALITY,
    }
}

/// Joins `left op right` compactly, keeping the tokens apart where gluing
/// them would change meaning (`a+ +b`, `a in b`).
fn join_operator(left: &str, op: &str, right: &str) -> String {
    let wordy = op.chars().all(|c| c.is_ascii_alphabetic());
    if wordy {
        return format!("{} {} {}", left, op, right);
    }
    let last = op.chars().last();
    let glue = matches!(
        (last, right.chars().next()),
        (Some('+'), Some('+')) | (Some('-'), Some('-'))
    );
    if glue {
        format!("{}{} {}", left, op, right)
    } else {
        format!("{}{}{}", left, op, right)
    }
}

/// Single-quoted JS string literal. Double quotes are escaped so the result
/// can sit inside a double-quoted template attribute.
pub fn quote_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\u0022"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARSING
// ═══════════════════════════════════════════════════════════════════════════════

pub fn expression_source_type() -> SourceType {
    SourceType::default().with_typescript(true).with_module(true)
}

/// Parses a standalone expression, rejecting trailing input.
pub fn parse_expression<'a>(allocator: &'a Allocator, text: &'a str) -> Result<Expression<'a>, String> {
    if text.trim().is_empty() {
        return Err("empty expression".to_string());
    }
    match Parser::new(allocator, text, expression_source_type()).parse_expression() {
        Ok(expr) => {
            let end = expr.span().end as usize;
            if text[end.min(text.len())..].trim().is_empty() {
                Ok(expr)
            } else {
                Err(format!("unexpected trailing input `{}`", text[end..].trim()))
            }
        }
        Err(errors) => Err(errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// IDENTIFIER REWRITING
// ═══════════════════════════════════════════════════════════════════════════════

/// Hook for rewriting free identifiers while printing. Returning `None`
/// keeps the original text.
pub trait IdentifierRewriter {
    fn identifier(&mut self, _name: &str) -> Option<String> {
        None
    }

    fn this_expression(&mut self) -> Option<String> {
        None
    }

    /// `this.<prop>`; a `Some` replaces the whole member expression.
    fn this_member(&mut self, _prop: &str) -> Option<String> {
        None
    }
}

pub struct NoRewrite;

impl IdentifierRewriter for NoRewrite {}

// ═══════════════════════════════════════════════════════════════════════════════
// PRINTER
// ═══════════════════════════════════════════════════════════════════════════════

enum ChainLink<'x, 'a> {
    Static(&'x StaticMemberExpression<'a>),
    Computed(&'x ComputedMemberExpression<'a>),
    Private(&'x PrivateFieldExpression<'a>),
    Call(&'x CallExpression<'a>),
}

impl ChainLink<'_, '_> {
    fn optional(&self) -> bool {
        match self {
            ChainLink::Static(m) => m.optional,
            ChainLink::Computed(m) => m.optional,
            ChainLink::Private(m) => m.optional,
            ChainLink::Call(c) => c.optional,
        }
    }
}

pub struct ExpressionPrinter<'s, 'r> {
    source: &'s str,
    rewriter: &'r mut dyn IdentifierRewriter,
    locals: Vec<HashSet<String>>,
    pub warnings: Vec<String>,
}

impl<'s, 'r> ExpressionPrinter<'s, 'r> {
    pub fn new(source: &'s str, rewriter: &'r mut dyn IdentifierRewriter) -> Self {
        Self {
            source,
            rewriter,
            locals: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Names treated as bound for the whole print (never rewritten).
    pub fn with_locals(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.locals.push(names.into_iter().collect());
        self
    }

    pub fn print(&mut self, expr: &Expression<'_>) -> String {
        self.expr(expr).0
    }

    fn slice(&self, span: Span) -> &'s str {
        let start = (span.start as usize).min(self.source.len());
        let end = (span.end as usize).min(self.source.len());
        &self.source[start..end]
    }

    fn is_local(&self, name: &str) -> bool {
        self.locals.iter().any(|frame| frame.contains(name))
    }

    fn wrap(&mut self, expr: &Expression<'_>, min: u8) -> String {
        let (code, prec) = self.expr(expr);
        if prec < min {
            format!("({})", code)
        } else {
            code
        }
    }

    fn identifier(&mut self, name: &str) -> (String, u8) {
        if self.is_local(name) {
            return (name.to_string(), PREC_PRIMARY);
        }
        match self.rewriter.identifier(name) {
            Some(rewritten) => (rewritten, PREC_CALL),
            None => (name.to_string(), PREC_PRIMARY),
        }
    }

    fn expr(&mut self, expr: &Expression<'_>) -> (String, u8) {
        match expr {
            Expression::BooleanLiteral(b) => (b.value.to_string(), PREC_PRIMARY),
            Expression::NullLiteral(_) => ("null".to_string(), PREC_PRIMARY),
            Expression::NumericLiteral(n) => {
                let text = match &n.raw {
                    Some(raw) => raw.to_string(),
                    None => n.value.to_string(),
                };
                (text, PREC_PRIMARY)
            }
            Expression::BigIntLiteral(b) => (self.slice(b.span).to_string(), PREC_PRIMARY),
            Expression::RegExpLiteral(r) => (self.slice(r.span).to_string(), PREC_PRIMARY),
            Expression::StringLiteral(s) => (quote_string(&s.value), PREC_PRIMARY),
            Expression::TemplateLiteral(t) => self.template_literal(t),
            Expression::Identifier(id) => self.identifier(&id.name),
            Expression::ThisExpression(_) => match self.rewriter.this_expression() {
                Some(text) => (text, PREC_CALL),
                None => ("this".to_string(), PREC_PRIMARY),
            },
            Expression::Super(s) => (self.slice(s.span).to_string(), PREC_PRIMARY),
            Expression::MetaProperty(m) => (self.slice(m.span).to_string(), PREC_PRIMARY),
            Expression::ArrayExpression(arr) => self.array(arr),
            Expression::ObjectExpression(obj) => self.object(obj),
            Expression::ArrowFunctionExpression(f) => self.arrow(f),
            Expression::FunctionExpression(_) | Expression::ClassExpression(_) => {
                (self.splice(expr), PREC_ASSIGN)
            }
            Expression::AssignmentExpression(a) => {
                let left = self.assignment_target(&a.left);
                let right = self.wrap(&a.right, PREC_ASSIGN);
                (format!("{}{}{}", left, a.operator.as_str(), right), PREC_ASSIGN)
            }
            Expression::AwaitExpression(a) => {
                let arg = self.wrap(&a.argument, PREC_UNARY);
                (format!("await {}", arg), PREC_UNARY)
            }
            Expression::BinaryExpression(b) => self.binary(b),
            Expression::CallExpression(c) => {
                let callee = self.callee(&c.callee);
                let args = self.arguments(&c.arguments);
                (format!("{}({})", callee, args), PREC_CALL)
            }
            Expression::ChainExpression(c) => self.chain(&c.expression),
            Expression::ConditionalExpression(c) => {
                let test = self.wrap(&c.test, PREC_CONDITIONAL + 1);
                let cons = self.wrap(&c.consequent, PREC_ASSIGN);
                let alt = self.wrap(&c.alternate, PREC_ASSIGN);
                (format!("{}?{}:{}", test, cons, alt), PREC_CONDITIONAL)
            }
            Expression::LogicalExpression(l) => self.logical(l),
            Expression::NewExpression(n) => {
                let (callee, prec) = self.expr(&n.callee);
                let callee = if prec < PREC_CALL || matches!(n.callee, Expression::CallExpression(_)) {
                    format!("({})", callee)
                } else {
                    callee
                };
                let args = self.arguments(&n.arguments);
                (format!("new {}({})", callee, args), PREC_CALL)
            }
            Expression::ParenthesizedExpression(p) => {
                let (inner, _) = self.expr(&p.expression);
                (format!("({})", inner), PREC_PRIMARY)
            }
            Expression::SequenceExpression(s) => {
                let parts: Vec<String> = s
                    .expressions
                    .iter()
                    .map(|e| self.wrap(e, PREC_ASSIGN))
                    .collect();
                (parts.join(","), PREC_SEQUENCE)
            }
            Expression::TaggedTemplateExpression(_) => {
                self.warnings.push(format!(
                    "Tagged template literal `{}` is left untouched and cannot run in the template engine",
                    self.slice(expr.span())
                ));
                (self.splice(expr), PREC_CALL)
            }
            Expression::UnaryExpression(u) => {
                let op = u.operator.as_str();
                let arg = self.wrap(&u.argument, PREC_UNARY);
                let needs_space = op.chars().all(|c| c.is_ascii_alphabetic())
                    || arg.starts_with(op);
                if needs_space {
                    (format!("{} {}", op, arg), PREC_UNARY)
                } else {
                    (format!("{}{}", op, arg), PREC_UNARY)
                }
            }
            Expression::UpdateExpression(u) => {
                let target = self.simple_target(&u.argument);
                let op = u.operator.as_str();
                if u.prefix {
                    (format!("{}{}", op, target), PREC_UNARY)
                } else {
                    (format!("{}{}", target, op), PREC_UPDATE)
                }
            }
            Expression::YieldExpression(_) | Expression::ImportExpression(_) => {
                (self.splice(expr), PREC_ASSIGN)
            }
            Expression::PrivateInExpression(p) => (self.slice(p.span).to_string(), 11),
            Expression::JSXElement(_) | Expression::JSXFragment(_) => {
                (self.splice(expr), PREC_PRIMARY)
            }
            Expression::TSAsExpression(t) => self.expr(&t.expression),
            Expression::TSSatisfiesExpression(t) => self.expr(&t.expression),
            Expression::TSTypeAssertion(t) => self.expr(&t.expression),
            Expression::TSNonNullExpression(t) => self.expr(&t.expression),
            Expression::TSInstantiationExpression(t) => self.expr(&t.expression),
            Expression::V8IntrinsicExpression(v) => (self.slice(v.span).to_string(), PREC_CALL),
            Expression::StaticMemberExpression(m) => self.static_member(m),
            Expression::ComputedMemberExpression(m) => {
                let object = self.member_object(&m.object);
                let (prop, _) = self.expr(&m.expression);
                (format!("{}[{}]", object, prop), PREC_CALL)
            }
            Expression::PrivateFieldExpression(m) => {
                let object = self.member_object(&m.object);
                (format!("{}.#{}", object, m.field.name), PREC_CALL)
            }
        }
    }

    fn member_object(&mut self, object: &Expression<'_>) -> String {
        let (code, prec) = self.expr(object);
        let bare_int = matches!(object, Expression::NumericLiteral(_))
            && code.chars().all(|c| c.is_ascii_digit());
        if prec < PREC_CALL || bare_int {
            format!("({})", code)
        } else {
            code
        }
    }

    fn callee(&mut self, callee: &Expression<'_>) -> String {
        let (code, prec) = self.expr(callee);
        if prec < PREC_CALL {
            format!("({})", code)
        } else {
            code
        }
    }

    fn static_member(&mut self, m: &StaticMemberExpression<'_>) -> (String, u8) {
        if matches!(m.object, Expression::ThisExpression(_)) {
            if let Some(text) = self.rewriter.this_member(&m.property.name) {
                return (text, PREC_CALL);
            }
        }
        let object = self.member_object(&m.object);
        (format!("{}.{}", object, m.property.name), PREC_CALL)
    }

    fn arguments(&mut self, args: &[Argument<'_>]) -> String {
        let mut parts = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                Argument::SpreadElement(s) => {
                    let inner = self.wrap(&s.argument, PREC_ASSIGN);
                    parts.push(format!("...{}", inner));
                }
                other => {
                    if let Some(e) = other.as_expression() {
                        parts.push(self.wrap(e, PREC_ASSIGN));
                    }
                }
            }
        }
        parts.join(",")
    }

    fn array(&mut self, arr: &ArrayExpression<'_>) -> (String, u8) {
        let mut parts = Vec::with_capacity(arr.elements.len());
        for el in &arr.elements {
            match el {
                ArrayExpressionElement::SpreadElement(s) => {
                    let inner = self.wrap(&s.argument, PREC_ASSIGN);
                    parts.push(format!("...{}", inner));
                }
                ArrayExpressionElement::Elision(_) => parts.push(String::new()),
                other => {
                    if let Some(e) = other.as_expression() {
                        parts.push(self.wrap(e, PREC_ASSIGN));
                    }
                }
            }
        }
        let trailing_hole = matches!(arr.elements.last(), Some(ArrayExpressionElement::Elision(_)));
        let mut code = format!("[{}", parts.join(","));
        if trailing_hole {
            code.push(',');
        }
        code.push(']');
        (code, PREC_PRIMARY)
    }

    fn property_key(&mut self, key: &PropertyKey<'_>, computed: bool) -> String {
        if computed {
            if let Some(e) = key.as_expression() {
                let (code, _) = self.expr(e);
                return format!("[{}]", code);
            }
        }
        match key {
            PropertyKey::StaticIdentifier(id) => id.name.to_string(),
            PropertyKey::PrivateIdentifier(id) => format!("#{}", id.name),
            PropertyKey::StringLiteral(s) => quote_string(&s.value),
            PropertyKey::NumericLiteral(n) => match &n.raw {
                Some(raw) => raw.to_string(),
                None => n.value.to_string(),
            },
            other => self.slice(other.span()).to_string(),
        }
    }

    fn object(&mut self, obj: &ObjectExpression<'_>) -> (String, u8) {
        let mut parts = Vec::with_capacity(obj.properties.len());
        for prop in &obj.properties {
            match prop {
                ObjectPropertyKind::ObjectProperty(p) => {
                    if p.kind != PropertyKind::Init || p.method {
                        parts.push(self.splice_object_property(p));
                        continue;
                    }
                    let key = self.property_key(&p.key, p.computed);
                    if p.shorthand {
                        let (value, _) = self.expr(&p.value);
                        if value == key {
                            parts.push(key);
                        } else {
                            parts.push(format!("{}:{}", key, value));
                        }
                    } else {
                        let value = self.wrap(&p.value, PREC_ASSIGN);
                        parts.push(format!("{}:{}", key, value));
                    }
                }
                ObjectPropertyKind::SpreadProperty(s) => {
                    let inner = self.wrap(&s.argument, PREC_ASSIGN);
                    parts.push(format!("...{}", inner));
                }
            }
        }
        (format!("{{{}}}", parts.join(",")), PREC_PRIMARY)
    }

    fn arrow(&mut self, f: &ArrowFunctionExpression<'_>) -> (String, u8) {
        let Some(body) = f.get_expression() else {
            let code = self.splice_arrow(f);
            return (code, PREC_ASSIGN);
        };
        let mut names = HashSet::new();
        for param in &f.params.items {
            for id in param.pattern.get_binding_identifiers() {
                names.insert(id.name.to_string());
            }
        }
        if let Some(rest) = &f.params.rest {
            for id in rest.rest.argument.get_binding_identifiers() {
                names.insert(id.name.to_string());
            }
        }
        self.locals.push(names);
        let params = self.slice(f.params.span).trim().to_string();
        let params = if params.starts_with('(') {
            params
        } else {
            format!("({})", params)
        };
        let mut body_code = self.wrap(body, PREC_ASSIGN);
        if body_code.starts_with('{') {
            body_code = format!("({})", body_code);
        }
        self.locals.pop();
        let prefix = if f.r#async { "async " } else { "" };
        (format!("{}{}=>{}", prefix, params, body_code), PREC_ASSIGN)
    }

    fn binary(&mut self, b: &BinaryExpression<'_>) -> (String, u8) {
        let prec = binary_precedence(b.operator);
        let (left_min, right_min) = if prec == PREC_EXPONENT {
            (PREC_UPDATE, prec)
        } else {
            (prec, prec + 1)
        };
        let left = self.wrap(&b.left, left_min);
        let right = self.wrap(&b.right, right_min);
        (join_operator(&left, b.operator.as_str(), &right), prec)
    }

    fn logical(&mut self, l: &LogicalExpression<'_>) -> (String, u8) {
        match l.operator {
            LogicalOperator::Coalesce => {
                let (left, left_prec) = self.expr(&l.left);
                let test = if left_prec < PREC_EQUALITY {
                    format!("({})", left)
                } else {
                    left.clone()
                };
                let cons = if left_prec < PREC_ASSIGN {
                    format!("({})", left)
                } else {
                    left
                };
                let right = self.wrap(&l.right, PREC_ASSIGN);
                (format!("{}!=null?{}:{}", test, cons, right), PREC_CONDITIONAL)
            }
            LogicalOperator::Or | LogicalOperator::And => {
                let prec = if matches!(l.operator, LogicalOperator::Or) {
                    PREC_OR
                } else {
                    PREC_AND
                };
                let left = self.wrap(&l.left, prec);
                let right = self.wrap(&l.right, prec + 1);
                (format!("{}{}{}", left, l.operator.as_str(), right), prec)
            }
        }
    }

    fn template_literal(&mut self, t: &TemplateLiteral<'_>) -> (String, u8) {
        let mut parts: Vec<String> = Vec::new();
        let mut starts_with_string = false;
        for (i, quasi) in t.quasis.iter().enumerate() {
            let text = match &quasi.value.cooked {
                Some(cooked) => cooked.as_str(),
                None => quasi.value.raw.as_str(),
            };
            if !text.is_empty() {
                if parts.is_empty() {
                    starts_with_string = true;
                }
                parts.push(quote_string(text));
            }
            if let Some(e) = t.expressions.get(i) {
                parts.push(self.wrap(e, PREC_MULTIPLICATIVE));
            }
        }
        if parts.is_empty() {
            return ("''".to_string(), PREC_PRIMARY);
        }
        if t.expressions.is_empty() {
            return (parts.remove(0), PREC_PRIMARY);
        }
        if !starts_with_string {
            parts.insert(0, "''".to_string());
        }
        let mut code = parts[0].clone();
        for part in &parts[1..] {
            code = join_operator(&code, "+", part);
        }
        (code, PREC_ADDITIVE)
    }

    /// Lowers an optional chain outward-in so every `?.` link keeps its
    /// short-circuit: `a?.b.c?.()` → `a==null?undefined:a.b.c==null?undefined:a.b.c()`.
    fn chain(&mut self, element: &ChainElement<'_>) -> (String, u8) {
        let mut links: Vec<ChainLink> = Vec::new();
        let mut cursor: &Expression = match element {
            ChainElement::CallExpression(c) => {
                links.push(ChainLink::Call(c));
                &c.callee
            }
            ChainElement::TSNonNullExpression(n) => &n.expression,
            ChainElement::StaticMemberExpression(m) => {
                links.push(ChainLink::Static(m));
                &m.object
            }
            ChainElement::ComputedMemberExpression(m) => {
                links.push(ChainLink::Computed(m));
                &m.object
            }
            ChainElement::PrivateFieldExpression(m) => {
                links.push(ChainLink::Private(m));
                &m.object
            }
        };
        loop {
            match cursor {
                Expression::CallExpression(c) => {
                    links.push(ChainLink::Call(c));
                    cursor = &c.callee;
                }
                Expression::StaticMemberExpression(m) => {
                    links.push(ChainLink::Static(m));
                    cursor = &m.object;
                }
                Expression::ComputedMemberExpression(m) => {
                    links.push(ChainLink::Computed(m));
                    cursor = &m.object;
                }
                Expression::PrivateFieldExpression(m) => {
                    links.push(ChainLink::Private(m));
                    cursor = &m.object;
                }
                Expression::TSNonNullExpression(n) => cursor = &n.expression,
                _ => break,
            }
        }
        links.reverse();

        let mut skip = 0;
        let mut base = None;
        if matches!(cursor, Expression::ThisExpression(_)) {
            if let Some(ChainLink::Static(m)) = links.first() {
                if !m.optional {
                    if let Some(text) = self.rewriter.this_member(&m.property.name) {
                        base = Some(text);
                        skip = 1;
                    }
                }
            }
        }
        let base = match base {
            Some(text) => text,
            None => self.member_object(cursor),
        };
        self.build_chain(base, &links[skip..])
    }

    fn build_chain(&mut self, current: String, links: &[ChainLink]) -> (String, u8) {
        let Some(link) = links.first() else {
            return (current, PREC_CALL);
        };
        let applied = match link {
            ChainLink::Static(m) => format!("{}.{}", current, m.property.name),
            ChainLink::Computed(m) => {
                let (prop, _) = self.expr(&m.expression);
                format!("{}[{}]", current, prop)
            }
            ChainLink::Private(m) => format!("{}.#{}", current, m.field.name),
            ChainLink::Call(c) => {
                let args = self.arguments(&c.arguments);
                format!("{}({})", current, args)
            }
        };
        if link.optional() {
            let (rest, _) = self.build_chain(applied, &links[1..]);
            (format!("{}==null?undefined:{}", current, rest), PREC_CONDITIONAL)
        } else {
            self.build_chain(applied, &links[1..])
        }
    }

    fn assignment_target(&mut self, target: &AssignmentTarget<'_>) -> String {
        match target {
            AssignmentTarget::AssignmentTargetIdentifier(id) => self.identifier(&id.name).0,
            AssignmentTarget::StaticMemberExpression(m) => self.static_member(m).0,
            AssignmentTarget::ComputedMemberExpression(m) => {
                let object = self.member_object(&m.object);
                let (prop, _) = self.expr(&m.expression);
                format!("{}[{}]", object, prop)
            }
            AssignmentTarget::PrivateFieldExpression(m) => {
                let object = self.member_object(&m.object);
                format!("{}.#{}", object, m.field.name)
            }
            AssignmentTarget::TSAsExpression(t) => self.expr(&t.expression).0,
            AssignmentTarget::TSSatisfiesExpression(t) => self.expr(&t.expression).0,
            AssignmentTarget::TSNonNullExpression(t) => self.expr(&t.expression).0,
            AssignmentTarget::TSTypeAssertion(t) => self.expr(&t.expression).0,
            other => self.slice(other.span()).to_string(),
        }
    }

    fn simple_target(&mut self, target: &SimpleAssignmentTarget<'_>) -> String {
        match target {
            SimpleAssignmentTarget::AssignmentTargetIdentifier(id) => self.identifier(&id.name).0,
            SimpleAssignmentTarget::StaticMemberExpression(m) => self.static_member(m).0,
            SimpleAssignmentTarget::ComputedMemberExpression(m) => {
                let object = self.member_object(&m.object);
                let (prop, _) = self.expr(&m.expression);
                format!("{}[{}]", object, prop)
            }
            SimpleAssignmentTarget::PrivateFieldExpression(m) => {
                let object = self.member_object(&m.object);
                format!("{}.#{}", object, m.field.name)
            }
            SimpleAssignmentTarget::TSAsExpression(t) => self.expr(&t.expression).0,
            SimpleAssignmentTarget::TSSatisfiesExpression(t) => self.expr(&t.expression).0,
            SimpleAssignmentTarget::TSNonNullExpression(t) => self.expr(&t.expression).0,
            SimpleAssignmentTarget::TSTypeAssertion(t) => self.expr(&t.expression).0,
        }
    }

    // ── source-preserving fallback ────────────────────────────────────────

    fn splice(&mut self, expr: &Expression<'_>) -> String {
        let mut bound = BindingNames::default();
        bound.visit_expression(expr);
        let mut collector = SpliceCollector::new(&mut *self.rewriter, &self.locals, bound.names);
        collector.visit_expression(expr);
        let replacements = collector.replacements;
        apply_replacements(self.source, expr.span(), replacements)
    }

    fn splice_arrow(&mut self, f: &ArrowFunctionExpression<'_>) -> String {
        let mut bound = BindingNames::default();
        bound.visit_arrow_function_expression(f);
        let mut collector = SpliceCollector::new(&mut *self.rewriter, &self.locals, bound.names);
        collector.visit_arrow_function_expression(f);
        let replacements = collector.replacements;
        apply_replacements(self.source, f.span, replacements)
    }

    fn splice_object_property(&mut self, p: &ObjectProperty<'_>) -> String {
        let mut bound = BindingNames::default();
        bound.visit_object_property(p);
        let mut collector = SpliceCollector::new(&mut *self.rewriter, &self.locals, bound.names);
        collector.visit_object_property(p);
        let replacements = collector.replacements;
        apply_replacements(self.source, p.span, replacements)
    }
}

/// Applies `(start, end, text)` replacements (absolute offsets) inside `span`.
pub fn apply_replacements(source: &str, span: Span, mut replacements: Vec<(u32, u32, String)>) -> String {
    replacements.sort_by_key(|(start, end, _)| (*start, *end));
    let mut out = String::new();
    let mut cursor = span.start as usize;
    for (start, end, text) in replacements {
        let (start, end) = (start as usize, end as usize);
        if start < cursor || end > span.end as usize {
            continue;
        }
        out.push_str(&source[cursor..start]);
        out.push_str(&text);
        cursor = end;
    }
    out.push_str(&source[cursor..span.end as usize]);
    out
}

/// Every name bound anywhere inside a node.
#[derive(Default)]
pub struct BindingNames {
    pub names: HashSet<String>,
}

impl<'a> Visit<'a> for BindingNames {
    fn visit_binding_identifier(&mut self, ident: &BindingIdentifier<'a>) {
        self.names.insert(ident.name.to_string());
    }

    fn visit_ts_type(&mut self, _it: &TSType<'a>) {}
}

struct SpliceCollector<'p> {
    rewriter: &'p mut dyn IdentifierRewriter,
    locals: &'p [HashSet<String>],
    bound: HashSet<String>,
    function_depth: u32,
    replacements: Vec<(u32, u32, String)>,
}

impl<'p> SpliceCollector<'p> {
    fn new(
        rewriter: &'p mut dyn IdentifierRewriter,
        locals: &'p [HashSet<String>],
        bound: HashSet<String>,
    ) -> Self {
        Self {
            rewriter,
            locals,
            bound,
            function_depth: 0,
            replacements: Vec::new(),
        }
    }

    fn is_free(&self, name: &str) -> bool {
        !self.bound.contains(name) && !self.locals.iter().any(|f| f.contains(name))
    }
}

impl<'a> Visit<'a> for SpliceCollector<'_> {
    fn visit_identifier_reference(&mut self, ident: &IdentifierReference<'a>) {
        if !self.is_free(&ident.name) {
            return;
        }
        if let Some(text) = self.rewriter.identifier(&ident.name) {
            self.replacements.push((ident.span.start, ident.span.end, text));
        }
    }

    fn visit_this_expression(&mut self, it: &ThisExpression) {
        if self.function_depth > 0 {
            return;
        }
        if let Some(text) = self.rewriter.this_expression() {
            self.replacements.push((it.span.start, it.span.end, text));
        }
    }

    fn visit_static_member_expression(&mut self, it: &StaticMemberExpression<'a>) {
        if self.function_depth == 0 && matches!(it.object, Expression::ThisExpression(_)) {
            if let Some(text) = self.rewriter.this_member(&it.property.name) {
                self.replacements.push((it.span.start, it.span.end, text));
                return;
            }
        }
        walk::walk_static_member_expression(self, it);
    }

    fn visit_object_property(&mut self, it: &ObjectProperty<'a>) {
        if it.shorthand {
            if let Expression::Identifier(id) = &it.value {
                if self.is_free(&id.name) {
                    if let Some(text) = self.rewriter.identifier(&id.name) {
                        self.replacements
                            .push((it.span.start, it.span.end, format!("{}:{}", id.name, text)));
                    }
                }
                return;
            }
        }
        walk::walk_object_property(self, it);
    }

    fn visit_function(&mut self, it: &Function<'a>, flags: ScopeFlags) {
        self.function_depth += 1;
        walk::walk_function(self, it, flags);
        self.function_depth -= 1;
    }

    fn visit_ts_type(&mut self, _it: &TSType<'a>) {}
}

// ═══════════════════════════════════════════════════════════════════════════════
// PUBLIC HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizeResult {
    pub code: String,
    pub warnings: Vec<String>,
}

/// Lowers `?.`, `??` and template literals. Parse failures are never fatal:
/// the original text comes back with a warning.
pub fn normalize_expression(expr: &str) -> NormalizeResult {
    let mut rewriter = NoRewrite;
    match rewrite_expression(expr, &mut rewriter) {
        Ok((code, warnings)) => NormalizeResult { code, warnings },
        Err(message) => NormalizeResult {
            code: expr.to_string(),
            warnings: vec![format!(
                "Failed to parse expression `{}`: {}",
                expr.trim(),
                message
            )],
        },
    }
}

/// Parses and re-prints `expr`, lowering and rewriting identifiers.
pub fn rewrite_expression(
    expr: &str,
    rewriter: &mut dyn IdentifierRewriter,
) -> Result<(String, Vec<String>), String> {
    rewrite_expression_with_locals(expr, rewriter, Vec::new())
}

pub fn rewrite_expression_with_locals(
    expr: &str,
    rewriter: &mut dyn IdentifierRewriter,
    locals: Vec<String>,
) -> Result<(String, Vec<String>), String> {
    let allocator = Allocator::default();
    let parsed = parse_expression(&allocator, expr)?;
    let mut printer = ExpressionPrinter::new(expr, rewriter).with_locals(locals);
    let code = printer.print(&parsed);
    Ok((code, printer.warnings))
}

/// True unless the expression is built purely from literals combined with
/// array/object literals, conditionals and operators. Anything touching live
/// state is computed in script instead of the template script module.
pub fn prefer_js_runtime(expr: &str) -> bool {
    let allocator = Allocator::default();
    match parse_expression(&allocator, expr) {
        Ok(parsed) => !is_static_safe(&parsed),
        Err(_) => true,
    }
}

fn is_static_safe(expr: &Expression<'_>) -> bool {
    match expr {
        Expression::BooleanLiteral(_)
        | Expression::NullLiteral(_)
        | Expression::NumericLiteral(_)
        | Expression::BigIntLiteral(_)
        | Expression::StringLiteral(_) => true,
        Expression::TemplateLiteral(t) => t.expressions.iter().all(is_static_safe),
        Expression::ArrayExpression(arr) => arr.elements.iter().all(|el| match el {
            ArrayExpressionElement::SpreadElement(s) => is_static_safe(&s.argument),
            ArrayExpressionElement::Elision(_) => true,
            other => other.as_expression().is_some_and(is_static_safe),
        }),
        Expression::ObjectExpression(obj) => obj.properties.iter().all(|prop| match prop {
            ObjectPropertyKind::ObjectProperty(p) => {
                p.kind == PropertyKind::Init
                    && !p.method
                    && !p.shorthand
                    && (!p.computed || p.key.as_expression().is_some_and(is_static_safe))
                    && is_static_safe(&p.value)
            }
            ObjectPropertyKind::SpreadProperty(s) => is_static_safe(&s.argument),
        }),
        Expression::ConditionalExpression(c) => {
            is_static_safe(&c.test) && is_static_safe(&c.consequent) && is_static_safe(&c.alternate)
        }
        Expression::LogicalExpression(l) => is_static_safe(&l.left) && is_static_safe(&l.right),
        Expression::BinaryExpression(b) => is_static_safe(&b.left) && is_static_safe(&b.right),
        Expression::UnaryExpression(u) => {
            !matches!(u.operator, UnaryOperator::Delete) && is_static_safe(&u.argument)
        }
        Expression::ParenthesizedExpression(p) => is_static_safe(&p.expression),
        Expression::SequenceExpression(s) => s.expressions.iter().all(is_static_safe),
        Expression::TSAsExpression(t) => is_static_safe(&t.expression),
        Expression::TSSatisfiesExpression(t) => is_static_safe(&t.expression),
        _ => false,
    }
}

#[derive(Default)]
struct ScriptOnlyDetector {
    found: bool,
}

impl<'a> Visit<'a> for ScriptOnlyDetector {
    fn visit_call_expression(&mut self, _it: &CallExpression<'a>) {
        self.found = true;
    }
    fn visit_new_expression(&mut self, _it: &NewExpression<'a>) {
        self.found = true;
    }
    fn visit_arrow_function_expression(&mut self, _it: &ArrowFunctionExpression<'a>) {
        self.found = true;
    }
    fn visit_function(&mut self, _it: &Function<'a>, _flags: ScopeFlags) {
        self.found = true;
    }
    fn visit_class(&mut self, _it: &Class<'a>) {
        self.found = true;
    }
    fn visit_tagged_template_expression(&mut self, _it: &TaggedTemplateExpression<'a>) {
        self.found = true;
    }
    fn visit_reg_exp_literal(&mut self, _it: &RegExpLiteral<'a>) {
        self.found = true;
    }
    fn visit_assignment_expression(&mut self, _it: &AssignmentExpression<'a>) {
        self.found = true;
    }
    fn visit_update_expression(&mut self, _it: &UpdateExpression<'a>) {
        self.found = true;
    }
    fn visit_await_expression(&mut self, _it: &AwaitExpression<'a>) {
        self.found = true;
    }
    fn visit_yield_expression(&mut self, _it: &YieldExpression<'a>) {
        self.found = true;
    }
    fn visit_this_expression(&mut self, _it: &ThisExpression) {
        self.found = true;
    }
    fn visit_super(&mut self, _it: &Super) {
        self.found = true;
    }
    fn visit_import_expression(&mut self, _it: &ImportExpression<'a>) {
        self.found = true;
    }
    fn visit_meta_property(&mut self, _it: &MetaProperty<'a>) {
        self.found = true;
    }
    fn visit_unary_expression(&mut self, it: &UnaryExpression<'a>) {
        if matches!(
            it.operator,
            UnaryOperator::Typeof | UnaryOperator::Void | UnaryOperator::Delete
        ) {
            self.found = true;
        }
        walk::walk_unary_expression(self, it);
    }
    fn visit_binary_expression(&mut self, it: &BinaryExpression<'a>) {
        if matches!(it.operator.as_str(), "in" | "instanceof") {
            self.found = true;
        }
        walk::walk_binary_expression(self, it);
    }
    fn visit_ts_type(&mut self, _it: &TSType<'a>) {}
}

/// Whether the expression uses constructs the template engine cannot
/// evaluate (calls, functions, `new`, assignments, `this`, ...).
pub fn needs_script_evaluation(expr: &str) -> bool {
    let allocator = Allocator::default();
    match parse_expression(&allocator, expr) {
        Ok(parsed) => {
            let mut detector = ScriptOnlyDetector::default();
            detector.visit_expression(&parsed);
            detector.found
        }
        Err(_) => false,
    }
}

/// `{ ... }` object literal (ignoring wrapping parentheses).
pub fn is_object_literal(expr: &str) -> bool {
    let allocator = Allocator::default();
    match parse_expression(&allocator, expr) {
        Ok(parsed) => matches!(parsed.without_parentheses(), Expression::ObjectExpression(_)),
        Err(_) => false,
    }
}

pub fn is_simple_identifier(expr: &str) -> bool {
    let trimmed = expr.trim();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(c) if c == '_' || c == '$' || c.is_alphabetic() => {
            chars.all(|c| c == '_' || c == '$' || c.is_alphanumeric())
                && !matches!(trimmed, "true" | "false" | "null" | "undefined" | "this")
        }
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerShape {
    /// `onTap`
    Identifier,
    /// `a.b`, `handlers[type]`
    MemberPath,
    /// `() => ...`, `function () {}`
    Function,
    /// Anything else: evaluated as a statement.
    Statement,
}

pub fn handler_shape(expr: &str) -> Option<HandlerShape> {
    let allocator = Allocator::default();
    let parsed = parse_expression(&allocator, expr).ok()?;
    Some(match parsed.without_parentheses() {
        Expression::Identifier(_) => HandlerShape::Identifier,
        Expression::StaticMemberExpression(_) | Expression::ComputedMemberExpression(_) => {
            HandlerShape::MemberPath
        }
        Expression::ArrowFunctionExpression(_) | Expression::FunctionExpression(_) => {
            HandlerShape::Function
        }
        _ => HandlerShape::Statement,
    })
}

/// Assignable reference (`a`, `a.b`, `a[0]`), usable as a `v-model` target.
pub fn is_assignable(expr: &str) -> bool {
    let allocator = Allocator::default();
    match parse_expression(&allocator, expr) {
        Ok(parsed) => matches!(
            parsed.without_parentheses(),
            Expression::Identifier(_)
                | Expression::StaticMemberExpression(_)
                | Expression::ComputedMemberExpression(_)
        ),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lower(expr: &str) -> String {
        let result = normalize_expression(expr);
        assert!(result.warnings.is_empty(), "unexpected warnings {:?}", result.warnings);
        result.code
    }

    #[test]
    fn nullish_coalescing_is_lowered() {
        assert_eq!(lower("item.icon ?? 'app'"), "item.icon!=null?item.icon:'app'");
    }

    #[test]
    fn optional_chain_is_lowered() {
        assert_eq!(
            lower("routeMeta?.title || '首页'"),
            "(routeMeta==null?undefined:routeMeta.title)||'首页'"
        );
        assert_eq!(lower("a?.b.c"), "a==null?undefined:a.b.c");
        assert_eq!(
            lower("a?.b?.c"),
            "a==null?undefined:a.b==null?undefined:a.b.c"
        );
        assert_eq!(lower("a.b?.()"), "a.b==null?undefined:a.b()");
        assert_eq!(lower("list?.[0]"), "list==null?undefined:list[0]");
    }

    #[test]
    fn template_literals_become_concatenation() {
        assert_eq!(lower("`a${b}c`"), "'a'+b+'c'");
        assert_eq!(lower("`${a}${b}`"), "''+a+b");
        assert_eq!(lower("`${n + 1} items`"), "''+(n+1)+' items'");
        assert_eq!(lower("`plain`"), "'plain'");
        assert_eq!(lower("`a${`b${c}`}`"), "'a'+('b'+c)");
    }

    #[test]
    fn nested_lowering_keeps_precedence() {
        assert_eq!(lower("(a?.b ?? 0) + 1"), "((a==null?undefined:a.b)!=null?a==null?undefined:a.b:0)+1");
    }

    #[test]
    fn normalization_is_idempotent() {
        for src in [
            "item.icon ?? 'app'",
            "routeMeta?.title || '首页'",
            "`a${b}c`",
            "a?.b?.[c]?.(d)",
            "x ? { a: 1 } : [1, 2]",
            "-(-a) + +b",
        ] {
            let once = lower(src);
            let twice = lower(&once);
            assert_eq!(once, twice, "not idempotent for {}", src);
            assert!(!once.contains("?.") && !once.contains("??") && !once.contains('`'));
        }
    }

    #[test]
    fn operators_do_not_glue() {
        assert_eq!(lower("a + +b"), "a+ +b");
        assert_eq!(lower("a - -b"), "a- -b");
        assert_eq!(lower("typeof a === 'string'"), "typeof a==='string'");
        assert_eq!(lower("'k' in obj"), "'k' in obj");
    }

    #[test]
    fn strings_are_single_quoted_and_escaped() {
        assert_eq!(lower("\"it's\""), "'it\\'s'");
        assert_eq!(lower("'say \"hi\"'"), "'say \\u0022hi\\u0022'");
    }

    #[test]
    fn parse_failure_warns_and_passes_through() {
        let result = normalize_expression("a +");
        assert_eq!(result.code, "a +");
        assert_eq!(result.warnings.len(), 1);
        let result = normalize_expression("a b");
        assert_eq!(result.code, "a b");
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn tagged_templates_are_left_alone_with_warning() {
        let result = normalize_expression("tag`x${y}`");
        assert_eq!(result.code, "tag`x${y}`");
        assert_eq!(result.warnings.len(), 1);
    }

    struct Prefix;
    impl IdentifierRewriter for Prefix {
        fn identifier(&mut self, name: &str) -> Option<String> {
            if name == "Math" {
                None
            } else {
                Some(format!("ctx.{}", name))
            }
        }
    }

    #[test]
    fn rewriter_skips_arrow_params_and_expands_shorthand() {
        let (code, _) =
            rewrite_expression("list.map(x => x + offset)", &mut Prefix).unwrap();
        assert_eq!(code, "ctx.list.map((x)=>x+ctx.offset)");
        let (code, _) = rewrite_expression("({ a, b: Math.max(c, 1) })", &mut Prefix).unwrap();
        assert_eq!(code, "({a:ctx.a,b:Math.max(ctx.c,1)})");
    }

    #[test]
    fn rewriter_reaches_block_bodies() {
        let (code, _) = rewrite_expression("() => { count++; let t = 1; use(t) }", &mut Prefix).unwrap();
        assert_eq!(code, "() => { ctx.count++; let t = 1; ctx.use(t) }");
    }

    #[test]
    fn js_runtime_preference() {
        assert!(!prefer_js_runtime("'a'"));
        assert!(!prefer_js_runtime("['a', { b: true }]"));
        assert!(!prefer_js_runtime("1 > 0 ? 'x' : 'y'"));
        assert!(prefer_js_runtime("active"));
        assert!(prefer_js_runtime("{ on: state.on }"));
        assert!(prefer_js_runtime("fn()"));
        assert!(prefer_js_runtime("this.x"));
        assert!(prefer_js_runtime("new Date()"));
        assert!(prefer_js_runtime("a +"));
    }

    #[test]
    fn script_evaluation_detection() {
        assert!(needs_script_evaluation("format(x)"));
        assert!(needs_script_evaluation("a?.b()"));
        assert!(needs_script_evaluation("typeof a"));
        assert!(!needs_script_evaluation("a.b + c[0]"));
        assert!(!needs_script_evaluation("a ? 'x' : `y${z}`"));
    }

    #[test]
    fn handler_shapes() {
        assert_eq!(handler_shape("onTap"), Some(HandlerShape::Identifier));
        assert_eq!(handler_shape("item.onTap"), Some(HandlerShape::MemberPath));
        assert_eq!(handler_shape("() => go()"), Some(HandlerShape::Function));
        assert_eq!(handler_shape("go(1)"), Some(HandlerShape::Statement));
        assert_eq!(handler_shape("go("), None);
    }
}

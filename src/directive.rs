//! Per-directive translation into target template attributes.

use crate::class_style::{register_binding, BindingKind};
use crate::context::{mustache_with, NameKind, TransformContext};
use crate::expression::{
    handler_shape, is_assignable, is_object_literal, needs_script_evaluation, rewrite_expression,
    HandlerShape, IdentifierRewriter,
};
use crate::inline::{register_inline, unify_scope_keys, InlineRegistration};
use crate::ir::Directive;
use crate::options::ObjectLiteralBindMode;
use crate::platform::EventModifiers;
use crate::scope::Resolution;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

lazy_static! {
    static ref FOR_SPLIT_RE: Regex = Regex::new(r"\s+(?:in|of)\s+").unwrap();
    static ref CAMELIZE_RE: Regex = Regex::new(r"-(\w)").unwrap();
}

pub const INLINE_HANDLER: &str = "__weapp_vite_inline";

pub fn camelize(name: &str) -> String {
    CAMELIZE_RE
        .replace_all(name, |caps: &regex::Captures| caps[1].to_uppercase())
        .into_owned()
}

pub fn attr(name: &str, value: &str) -> String {
    format!("{}=\"{}\"", name, value)
}

// ═══════════════════════════════════════════════════════════════════════════════
// VALUES
// ═══════════════════════════════════════════════════════════════════════════════

/// Template expression for a bound value: inlined when the template engine
/// can evaluate it, otherwise read from a `bind` computed.
pub fn compile_value(ctx: &mut TransformContext<'_>, expr: &str) -> String {
    if needs_script_evaluation(expr) {
        if let Some(reference) = register_binding(ctx, BindingKind::Bind, expr) {
            return reference;
        }
        return expr.trim().to_string();
    }
    ctx.template_expr(expr)
}

/// `:name="expr"` on a non-class/style attribute.
pub fn compile_bind(ctx: &mut TransformContext<'_>, name: &str, expr: &str) -> String {
    let value = bind_value(ctx, expr);
    attr(name, &ctx.mustache(&value))
}

/// Template expression carried by a `v-bind`.
pub fn bind_value(ctx: &mut TransformContext<'_>, expr: &str) -> String {
    if is_object_literal(expr) {
        match ctx.options.object_literal_bind_mode {
            ObjectLiteralBindMode::Inline => ctx.template_expr(expr),
            ObjectLiteralBindMode::Runtime => match register_binding(ctx, BindingKind::Bind, expr) {
                Some(reference) => reference,
                None => expr.trim().to_string(),
            },
        }
    } else {
        compile_value(ctx, expr)
    }
}

/// Resolves the attribute name of a `v-bind`, warning on the forms the
/// target cannot express.
pub fn bind_name(ctx: &mut TransformContext<'_>, d: &Directive) -> Option<String> {
    if d.dynamic_arg {
        ctx.warn(format!(
            "Dynamic attribute name `{}` is not supported; the binding is dropped",
            d.raw_name
        ));
        return None;
    }
    let Some(arg) = &d.arg else {
        ctx.warn("`v-bind` without an argument (object spread) is not supported; the binding is dropped");
        return None;
    };
    if d.has_modifier("camel") {
        Some(camelize(arg))
    } else {
        Some(arg.clone())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// v-for / :key
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForSpec {
    pub list: String,
    pub item: Option<String>,
    pub key: Option<String>,
    pub index: Option<String>,
}

fn split_top_level(text: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for c in text.chars() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            _ => {}
        }
        if c == sep && depth == 0 {
            parts.push(current.trim().to_string());
            current.clear();
        } else {
            current.push(c);
        }
    }
    parts.push(current.trim().to_string());
    parts
}

/// Parses `item in list`, `(item, index) in list`, `(value, key, index) of obj`
/// and destructured item aliases.
pub fn parse_for_expression(exp: &str) -> Option<ForSpec> {
    let exp = exp.trim();
    let m = FOR_SPLIT_RE.find(exp)?;
    let lhs = exp[..m.start()].trim();
    let list = exp[m.end()..].trim();
    if list.is_empty() {
        return None;
    }
    let inner = if lhs.starts_with('(') && lhs.ends_with(')') {
        &lhs[1..lhs.len() - 1]
    } else {
        lhs
    };
    let mut aliases = split_top_level(inner, ',').into_iter();
    let non_empty = |s: Option<String>| s.filter(|s| !s.is_empty());
    Some(ForSpec {
        list: list.to_string(),
        item: non_empty(aliases.next()),
        key: non_empty(aliases.next()),
        index: non_empty(aliases.next()),
    })
}

/// `:key` policy. Inside a loop only the item itself or one of its members
/// can be expressed; anything else degrades to the item sentinel.
pub fn compile_key(ctx: &mut TransformContext<'_>, expr: &str) -> String {
    let adapter = ctx.adapter;
    let trimmed = expr.trim();
    let Some(item) = ctx.scope.current_for().map(|f| f.item.clone()) else {
        let value = ctx.template_expr(trimmed);
        return adapter.key_attr(&ctx.mustache(&value));
    };
    if trimmed == adapter.key_sentinel() || trimmed == "this" {
        return adapter.key_attr(adapter.key_sentinel());
    }
    let resolved = ctx.template_expr(trimmed);
    if resolved == item {
        return adapter.key_attr(adapter.key_sentinel());
    }
    if let Some(member) = resolved.strip_prefix(&format!("{}.", item)) {
        if crate::expression::is_simple_identifier(member) {
            return adapter.key_attr(member);
        }
    }
    ctx.warn(format!(
        "Key `{}` cannot be expressed as an item member; falling back to {} (unstable key)",
        trimmed,
        adapter.key_sentinel()
    ));
    adapter.key_attr(adapter.key_sentinel())
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// One resolved `v-on` (or a `v-model` update handler).
#[derive(Debug, Clone)]
pub struct EventBinding {
    pub event: String,
    pub modifiers: EventModifiers,
    pub handler: String,
}

/// Maps `v-on` modifiers to the binding flavour; unsupported ones warn.
pub fn event_modifiers(ctx: &mut TransformContext<'_>, d: &Directive) -> EventModifiers {
    let mut out = EventModifiers::default();
    for m in &d.modifiers {
        match m.as_str() {
            "stop" | "catch" => out.catch = true,
            "capture" => out.capture = true,
            "mut" => {
                if ctx.adapter.supports_mut_bind() {
                    out.mutated = true;
                } else {
                    ctx.warn(format!(
                        "`.mut` is not supported on {:?}; using a normal binding",
                        ctx.adapter.platform()
                    ));
                }
            }
            other => ctx.warn(format!(
                "Event modifier `.{}` has no mini-program equivalent and is ignored",
                other
            )),
        }
    }
    out
}

/// Resolves a `v-on` directive into an [`EventBinding`].
pub fn event_binding(ctx: &mut TransformContext<'_>, d: &Directive, native: bool) -> Option<EventBinding> {
    if d.dynamic_arg {
        ctx.warn(format!("Dynamic event name `{}` is not supported; the listener is dropped", d.raw_name));
        return None;
    }
    let Some(arg) = &d.arg else {
        ctx.warn("`v-on` without an event name is not supported; the listeners are dropped");
        return None;
    };
    let Some(handler) = d.exp_trimmed() else {
        ctx.warn(format!("Listener `{}` has no handler and is dropped", d.raw_name));
        return None;
    };
    let event = if native {
        ctx.adapter.map_event_name(arg)
    } else {
        arg.clone()
    };
    let modifiers = event_modifiers(ctx, d);
    Some(EventBinding {
        event,
        modifiers,
        handler: handler.to_string(),
    })
}

fn data_attr_suffix(event: &str) -> String {
    event
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect()
}

/// Emits the binding attributes for every listener on one element. Bare
/// method names bind directly; everything else goes through the inline
/// dispatch table.
pub fn compile_events(ctx: &mut TransformContext<'_>, events: Vec<EventBinding>) -> Vec<String> {
    let mut attrs = Vec::new();
    let mut inline: Vec<(String, InlineRegistration)> = Vec::new();

    for binding in events {
        let name = ctx.adapter.event_attr_name(&binding.event, binding.modifiers);
        let direct = handler_shape(&binding.handler) == Some(HandlerShape::Identifier)
            && matches!(
                ctx.scope.resolve(binding.handler.trim()),
                Resolution::Instance { in_slot: false }
            );
        if direct {
            ctx.template_identifiers.insert(binding.handler.trim().to_string());
            attrs.push(attr(&name, binding.handler.trim()));
            continue;
        }
        if let Some(reg) = register_inline(ctx, &binding.handler) {
            attrs.push(attr(&name, INLINE_HANDLER));
            inline.push((binding.event.clone(), reg));
        }
    }

    if inline.is_empty() {
        return attrs;
    }
    attrs.push(attr("data-wv-inline-id", &inline[0].1.id));
    if inline.len() > 1 {
        for (event, reg) in &inline {
            attrs.push(attr(&format!("data-wv-inline-id-{}", data_attr_suffix(event)), &reg.id));
        }
    }
    let registrations: Vec<InlineRegistration> = inline.into_iter().map(|(_, r)| r).collect();
    let union = unify_scope_keys(ctx, &registrations);
    for (k, (_, value)) in union.iter().enumerate() {
        attrs.push(attr(&format!("data-wv-s{}", k), &ctx.mustache(value)));
    }
    for (k, index) in ctx.scope.loop_index_vars().iter().enumerate() {
        attrs.push(attr(&format!("data-wv-i{}", k), &ctx.mustache(index)));
    }
    attrs
}

// ═══════════════════════════════════════════════════════════════════════════════
// v-model
// ═══════════════════════════════════════════════════════════════════════════════

/// Value attribute plus the update listener that writes back.
pub fn compile_model(
    ctx: &mut TransformContext<'_>,
    tag: &str,
    is_component: bool,
    d: &Directive,
) -> (Option<String>, Option<EventBinding>) {
    let Some(expr) = d.exp_trimmed().map(str::to_string) else {
        ctx.warn("`v-model` without an expression is ignored");
        return (None, None);
    };
    let (prop, event, payload) = if is_component {
        let prop = d.arg.clone().unwrap_or_else(|| "modelValue".to_string());
        let event = format!("update:{}", prop);
        (prop, event, "$event.detail".to_string())
    } else {
        let (prop, event) = match tag {
            "switch" | "checkbox" => ("checked", "change"),
            "slider" | "picker" | "picker-view" | "radio-group" | "checkbox-group" => ("value", "change"),
            _ if d.has_modifier("lazy") => ("value", "blur"),
            _ => ("value", "input"),
        };
        (prop.to_string(), event.to_string(), "$event.detail.value".to_string())
    };

    let value = ctx.template_expr(&expr);
    let value_attr = attr(&prop, &ctx.mustache(&value));
    if !is_assignable(&expr) {
        ctx.warn(format!(
            "`v-model=\"{}\"` is not assignable; only the value is bound",
            expr
        ));
        return (Some(value_attr), None);
    }
    let mut assigned = payload;
    if d.has_modifier("trim") {
        assigned = format!("{}.trim()", assigned);
    }
    if d.has_modifier("number") {
        assigned = format!("Number({})", assigned);
    }
    let handler = EventBinding {
        event,
        modifiers: EventModifiers::default(),
        handler: format!("{} = {}", expr, assigned),
    };
    (Some(value_attr), Some(handler))
}

// ═══════════════════════════════════════════════════════════════════════════════
// REFS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateRefMeta {
    pub selector: String,
    pub in_for: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Source of `function (ctx) { ... }` for `:ref`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get: Option<String>,
}

struct CtxRewriter;

impl IdentifierRewriter for CtxRewriter {
    fn identifier(&mut self, name: &str) -> Option<String> {
        if crate::scope::AMBIENT_GLOBALS.contains(name) {
            None
        } else {
            Some(format!("ctx.{}", name))
        }
    }

    fn this_expression(&mut self) -> Option<String> {
        Some("ctx".to_string())
    }
}

/// Registers a template ref and returns the marker class for the element.
pub fn compile_ref(ctx: &mut TransformContext<'_>, value: &str, dynamic: bool) -> String {
    let marker = ctx.next_name(NameKind::Ref);
    let in_for = ctx.scope.for_depth() > 0;
    let (name, get) = if dynamic {
        match rewrite_expression(value, &mut CtxRewriter) {
            Ok((code, _)) => (None, Some(format!("function (ctx) {{ return {}; }}", code))),
            Err(message) => {
                ctx.warn(format!("Failed to parse ref expression `{}`: {}", value.trim(), message));
                (Some(value.trim().to_string()), None)
            }
        }
    } else {
        (Some(value.trim().to_string()), None)
    };
    ctx.unit.template_refs.push(TemplateRefMeta {
        selector: format!(".{}", marker),
        in_for,
        name,
        get,
    });
    marker
}

// ═══════════════════════════════════════════════════════════════════════════════
// CUSTOM DIRECTIVES
// ═══════════════════════════════════════════════════════════════════════════════

pub fn compile_custom(ctx: &mut TransformContext<'_>, name: &str, d: &Directive) -> String {
    ctx.warn(format!(
        "Custom directive `v-{}` is compiled to a data attribute and needs runtime support",
        name
    ));
    let attr_name = format!("data-v-{}", name);
    match d.exp_trimmed() {
        Some(expr) => {
            let value = ctx.template_expr(expr);
            attr(&attr_name, &mustache_with(ctx.options.mustache_interpolation, &value))
        }
        None => attr_name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{DirectiveKind, SourceLocation};
    use crate::options::{CompileOptions, Platform};
    use crate::scope::ForInfo;

    fn directive(kind: DirectiveKind, arg: Option<&str>, modifiers: &[&str], exp: &str) -> Directive {
        Directive {
            kind,
            arg: arg.map(str::to_string),
            dynamic_arg: false,
            modifiers: modifiers.iter().map(|m| m.to_string()).collect(),
            exp: Some(exp.to_string()),
            raw_name: "test".to_string(),
            loc: SourceLocation::default(),
        }
    }

    fn in_loop(ctx: &mut TransformContext<'_>) {
        ctx.scope.push_for(
            ForInfo::new("this.list".into(), "item".into(), 0),
            vec![("item".into(), "item".into())],
        );
    }

    #[test]
    fn for_expression_forms() {
        assert_eq!(
            parse_for_expression("(item, index) in list"),
            Some(ForSpec {
                list: "list".into(),
                item: Some("item".into()),
                key: Some("index".into()),
                index: None
            })
        );
        let spec = parse_for_expression("({ id, tags: [a, b] }, i) of rows").unwrap();
        assert_eq!(spec.item.as_deref(), Some("{ id, tags: [a, b] }"));
        assert_eq!(spec.key.as_deref(), Some("i"));
        assert_eq!(parse_for_expression("n in 10").unwrap().list, "10");
        assert_eq!(parse_for_expression("oops"), None);
    }

    #[test]
    fn key_policy() {
        let options = CompileOptions::default();
        let mut ctx = TransformContext::new("a.vue", &options);
        assert_eq!(compile_key(&mut ctx, "id"), "wx:key=\"{{id}}\"");
        in_loop(&mut ctx);
        assert_eq!(compile_key(&mut ctx, "item.id"), "wx:key=\"id\"");
        assert_eq!(compile_key(&mut ctx, "item"), "wx:key=\"*this\"");
        assert!(ctx.warnings.is_empty());
        assert_eq!(compile_key(&mut ctx, "item.id + index"), "wx:key=\"*this\"");
        assert_eq!(ctx.warnings.len(), 1);
        ctx.scope.pop_for();
    }

    #[test]
    fn key_through_destructured_alias() {
        let options = CompileOptions::for_platform(Platform::Alipay);
        let mut ctx = TransformContext::new("a.vue", &options);
        ctx.scope.push_for(
            ForInfo::new("this.list".into(), "__wv_item_0".into(), 0),
            vec![("id".into(), "__wv_item_0.id".into())],
        );
        assert_eq!(compile_key(&mut ctx, "id"), "a:key=\"id\"");
        ctx.scope.pop_for();
    }

    #[test]
    fn bind_routes_calls_to_computed() {
        let options = CompileOptions::default();
        let mut ctx = TransformContext::new("a.vue", &options);
        assert_eq!(
            compile_bind(&mut ctx, "name", "item.icon ?? 'app'"),
            "name=\"{{item.icon!=null?item.icon:'app'}}\""
        );
        assert_eq!(compile_bind(&mut ctx, "label", "format(price)"), "label=\"{{__wv_bind_0}}\"");
        assert_eq!(ctx.unit.class_style_bindings[0].script_expr, "this.format(this.price)");
    }

    #[test]
    fn object_literal_bind_modes() {
        let mut options = CompileOptions::default();
        {
            let mut ctx = TransformContext::new("a.vue", &options);
            assert_eq!(compile_bind(&mut ctx, "opts", "{ a: 1 }"), "opts=\"{{__wv_bind_0}}\"");
        }
        options.object_literal_bind_mode = ObjectLiteralBindMode::Inline;
        let mut ctx = TransformContext::new("a.vue", &options);
        assert_eq!(compile_bind(&mut ctx, "opts", "{ a: 1 }"), "opts=\"{{ {a:1} }}\"");
    }

    #[test]
    fn direct_and_inline_events() {
        let options = CompileOptions::default();
        let mut ctx = TransformContext::new("a.vue", &options);
        in_loop(&mut ctx);
        let tap = directive(DirectiveKind::On, Some("click"), &["stop"], "onTap");
        let tap = event_binding(&mut ctx, &tap, true).unwrap();
        let long = directive(DirectiveKind::On, Some("longpress"), &[], "remove(item.id)");
        let long = event_binding(&mut ctx, &long, true).unwrap();
        let attrs = compile_events(&mut ctx, vec![tap, long]);
        ctx.scope.pop_for();
        assert_eq!(
            attrs,
            vec![
                "catchtap=\"onTap\"".to_string(),
                "bindlongpress=\"__weapp_vite_inline\"".to_string(),
                "data-wv-inline-id=\"__wv_inline_0\"".to_string(),
                "data-wv-s0=\"{{item}}\"".to_string(),
                "data-wv-i0=\"{{__wv_index_0}}\"".to_string(),
            ]
        );
    }

    #[test]
    fn model_on_native_and_component() {
        let options = CompileOptions::default();
        let mut ctx = TransformContext::new("a.vue", &options);
        let d = directive(DirectiveKind::Model, None, &["trim"], "form.name");
        let (value, handler) = compile_model(&mut ctx, "input", false, &d);
        assert_eq!(value.as_deref(), Some("value=\"{{form.name}}\""));
        let handler = handler.unwrap();
        assert_eq!(handler.event, "input");
        assert_eq!(handler.handler, "form.name = $event.detail.value.trim()");

        let d = directive(DirectiveKind::Model, Some("visible"), &[], "show");
        let (value, handler) = compile_model(&mut ctx, "t-popup", true, &d);
        assert_eq!(value.as_deref(), Some("visible=\"{{show}}\""));
        assert_eq!(handler.unwrap().event, "update:visible");

        let d = directive(DirectiveKind::Model, None, &[], "a + b");
        let (_, handler) = compile_model(&mut ctx, "input", false, &d);
        assert!(handler.is_none());
        assert_eq!(ctx.warnings.len(), 1);
    }

    #[test]
    fn refs_record_meta() {
        let options = CompileOptions::default();
        let mut ctx = TransformContext::new("a.vue", &options);
        assert_eq!(compile_ref(&mut ctx, "panel", false), "__wv-ref-0");
        assert_eq!(compile_ref(&mut ctx, "refs[id]", true), "__wv-ref-1");
        let refs = &ctx.unit.template_refs;
        assert_eq!(refs[0].name.as_deref(), Some("panel"));
        assert_eq!(refs[1].get.as_deref(), Some("function (ctx) { return ctx.refs[ctx.id]; }"));
    }

    #[test]
    fn camelize_names() {
        assert_eq!(camelize("view-box"), "viewBox");
    }
}

//! Template tree → target markup.
//!
//! Walks the IR depth-first with a single [`TransformContext`]; structural
//! directives (`v-if` chains, `v-for`) wrap the element they sit on, then
//! attributes are translated in source order.

use crate::class_style::{compile_class, compile_style};
use crate::context::{mustache_with, NameKind, TransformContext};
use crate::directive::{
    attr, bind_name, bind_value, camelize, compile_bind, compile_custom, compile_events, compile_key,
    compile_model, compile_ref, compile_value, event_binding, parse_for_expression, EventBinding,
};
use crate::expression::{is_simple_identifier, quote_string};
use crate::ir::{Attr, Directive, DirectiveKind, ElementNode, TemplateNode};
use crate::parse::is_void_tag;
use crate::scope::{destructure_alias, ForInfo};
use crate::slots;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

lazy_static! {
    /// Hyphenated tags that are mini-program built-ins, not custom components.
    static ref HYPHENATED_BUILTINS: HashSet<&'static str> = [
        "scroll-view",
        "movable-area",
        "movable-view",
        "cover-view",
        "cover-image",
        "rich-text",
        "checkbox-group",
        "radio-group",
        "picker-view",
        "picker-view-column",
        "page-container",
        "root-portal",
        "share-element",
        "match-media",
        "page-meta",
        "navigation-bar",
        "functional-page-navigator",
        "live-player",
        "live-pusher",
        "official-account",
        "open-data",
        "web-view",
        "voip-room",
        "channel-live",
        "channel-video",
        "ad-custom",
        "keyboard-accessory",
        "grid-view",
        "list-view",
        "sticky-header",
        "sticky-section",
        "import-sjs",
    ]
    .into_iter()
    .collect();
    static ref KEBAB_RE: Regex = Regex::new(r"\B([A-Z])").unwrap();
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").unwrap();
}

const VUE_BUILTINS: &[&str] = &[
    "transition",
    "Transition",
    "transition-group",
    "TransitionGroup",
    "keep-alive",
    "KeepAlive",
    "teleport",
    "Teleport",
    "suspense",
    "Suspense",
];

/// PascalCase tags and hyphenated non-builtin tags are custom components.
pub fn is_component_tag(tag: &str) -> bool {
    if VUE_BUILTINS.contains(&tag) || tag == "component" || tag == "slot" || tag == "template" {
        return false;
    }
    if tag.starts_with(|c: char| c.is_ascii_uppercase()) {
        return true;
    }
    tag.contains('-') && !HYPHENATED_BUILTINS.contains(tag) && !tag.starts_with("scoped-slots-")
}

/// `TIcon` → `t-icon`, `VanButton` → `van-button`.
pub fn kebab_case(tag: &str) -> String {
    if !tag.chars().any(|c| c.is_ascii_uppercase()) {
        return tag.to_string();
    }
    KEBAB_RE.replace_all(tag, "-${1}").to_ascii_lowercase()
}

// ═══════════════════════════════════════════════════════════════════════════════
// RENDERED ELEMENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// An element ready to print. `tag: None` renders only the children.
#[derive(Debug, Clone, Default)]
pub struct Rendered {
    pub tag: Option<String>,
    pub attrs: Vec<String>,
    pub children: String,
    pub self_closing: bool,
}

impl Rendered {
    pub fn element(tag: impl Into<String>, attrs: Vec<String>, children: String) -> Self {
        Self {
            tag: Some(tag.into()),
            attrs,
            children,
            self_closing: false,
        }
    }

    pub fn fragment(children: String) -> Self {
        Self {
            children,
            ..Default::default()
        }
    }

    pub fn finish(self) -> String {
        let Some(tag) = self.tag else {
            return self.children;
        };
        let mut out = String::with_capacity(tag.len() * 2 + self.children.len() + 16);
        out.push('<');
        out.push_str(&tag);
        for a in &self.attrs {
            out.push(' ');
            out.push_str(a);
        }
        if self.self_closing && self.children.is_empty() {
            out.push_str("/>");
            return out;
        }
        out.push('>');
        out.push_str(&self.children);
        out.push_str("</");
        out.push_str(&tag);
        out.push('>');
        out
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CHILDREN
// ═══════════════════════════════════════════════════════════════════════════════

/// Compiles a whole template root.
pub fn compile_template(ctx: &mut TransformContext<'_>, nodes: &[TemplateNode]) -> String {
    compile_children(ctx, nodes)
}

fn is_inline(node: Option<&TemplateNode>) -> bool {
    matches!(node, Some(TemplateNode::Text(_)) | Some(TemplateNode::Interpolation(_)))
}

fn compile_text(value: &str, prev_inline: bool, next_inline: bool) -> String {
    if value.trim().is_empty() {
        if prev_inline && next_inline && !value.contains('\n') {
            return " ".to_string();
        }
        return String::new();
    }
    let collapsed = WHITESPACE_RE.replace_all(value, " ");
    let mut text: &str = &collapsed;
    if !prev_inline {
        text = text.trim_start();
    }
    if !next_inline {
        text = text.trim_end();
    }
    text.to_string()
}

enum Branch {
    If(String),
    ElseIf(String),
    Else,
}

fn branch_of(el: &ElementNode) -> Option<Branch> {
    for attr in &el.attrs {
        if let Attr::Directive(d) = attr {
            let exp = || d.exp_trimmed().unwrap_or("true").to_string();
            match d.kind {
                DirectiveKind::If => return Some(Branch::If(exp())),
                DirectiveKind::ElseIf => return Some(Branch::ElseIf(exp())),
                DirectiveKind::Else => return Some(Branch::Else),
                _ => {}
            }
        }
    }
    None
}

pub fn compile_children(ctx: &mut TransformContext<'_>, nodes: &[TemplateNode]) -> String {
    let mut out = String::new();
    let mut i = 0;
    while i < nodes.len() {
        match &nodes[i] {
            TemplateNode::Comment(_) => {}
            TemplateNode::Text(t) => {
                let prev = if i > 0 { nodes.get(i - 1) } else { None };
                out.push_str(&compile_text(&t.value, is_inline(prev), is_inline(nodes.get(i + 1))));
            }
            TemplateNode::Interpolation(node) => {
                let value = compile_value(ctx, &node.expression);
                out.push_str(&ctx.mustache(&value));
            }
            TemplateNode::Element(el) => match branch_of(el) {
                Some(Branch::If(test)) => {
                    let mut chain = vec![(el, Branch::If(test))];
                    let mut j = i + 1;
                    while j < nodes.len() {
                        if nodes[j].is_ignorable() {
                            j += 1;
                            continue;
                        }
                        let Some(next) = nodes[j].as_element() else { break };
                        match branch_of(next) {
                            Some(b @ Branch::ElseIf(_)) => chain.push((next, b)),
                            Some(b @ Branch::Else) => {
                                chain.push((next, b));
                                j += 1;
                                break;
                            }
                            _ => break,
                        }
                        j += 1;
                    }
                    let consumed = chain.len();
                    out.push_str(&compile_if_chain(ctx, chain));
                    // Skip whitespace that sat between branches.
                    i = if consumed > 1 { j } else { i + 1 };
                    continue;
                }
                Some(Branch::ElseIf(_)) | Some(Branch::Else) => {
                    ctx.warn(format!(
                        "`v-else`/`v-else-if` on <{}> has no preceding `v-if`; the branch is rendered unconditionally",
                        el.tag
                    ));
                    out.push_str(&compile_element(ctx, el));
                }
                None => out.push_str(&compile_element(ctx, el)),
            },
        }
        i += 1;
    }
    out
}

fn compile_if_chain(ctx: &mut TransformContext<'_>, chain: Vec<(&ElementNode, Branch)>) -> String {
    let adapter = ctx.adapter;
    let mode = ctx.options.mustache_interpolation;
    let wrap = move |e: &str| mustache_with(mode, e);
    let mut out = String::new();
    for (el, branch) in chain {
        let condition = match branch {
            Branch::If(test) => {
                let value = compile_value(ctx, &test);
                adapter.if_attr(&value, &wrap)
            }
            Branch::ElseIf(test) => {
                let value = compile_value(ctx, &test);
                adapter.else_if_attr(&value, &wrap)
            }
            Branch::Else => adapter.else_attr(),
        };
        let body = compile_element(ctx, el);
        out.push_str(&Rendered::element("block", vec![condition], body).finish());
    }
    out
}

// ═══════════════════════════════════════════════════════════════════════════════
// ELEMENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Compiles one element including its `v-for`. `v-if` has already been
/// consumed by the caller.
pub fn compile_element(ctx: &mut TransformContext<'_>, el: &ElementNode) -> String {
    match el.directive(&DirectiveKind::For).and_then(Directive::exp_trimmed) {
        Some(exp) => compile_for(ctx, el, exp),
        None => compile_plain(ctx, el).finish(),
    }
}

fn compile_for(ctx: &mut TransformContext<'_>, el: &ElementNode, exp: &str) -> String {
    let Some(spec) = parse_for_expression(exp) else {
        ctx.warn(format!("Invalid `v-for` expression `{}`; the loop is dropped", exp));
        return compile_plain(ctx, el).finish();
    };

    let list_value = compile_value(ctx, &spec.list);
    let list_script = match ctx.script_expr(&spec.list) {
        Ok(code) => code,
        Err(_) => spec.list.trim().to_string(),
    };

    let mut names: Vec<(String, String)> = Vec::new();
    let item = match spec.item.as_deref() {
        Some(alias) if is_simple_identifier(alias) => {
            names.push((alias.to_string(), alias.to_string()));
            alias.to_string()
        }
        Some(pattern) => {
            let item = ctx.next_name(NameKind::Item);
            match destructure_alias(pattern, &item) {
                Ok((bound, warnings)) => {
                    names.extend(bound);
                    for w in warnings {
                        ctx.warn(w);
                    }
                }
                Err(message) => ctx.warn(format!(
                    "Failed to parse `v-for` alias `{}`: {}",
                    pattern, message
                )),
            }
            item
        }
        None => ctx.next_name(NameKind::Item),
    };

    let depth_id = ctx.next_index(NameKind::Index);
    let mut info = ForInfo::new(list_script, item.clone(), depth_id);
    if let Some(key) = spec.key.as_deref() {
        if is_simple_identifier(key) {
            names.push((key.to_string(), key.to_string()));
            info.key = Some(key.to_string());
        } else {
            ctx.warn(format!("`v-for` index alias `{}` must be an identifier", key));
        }
    }
    if let Some(index) = spec.index.as_deref() {
        match info.key.clone() {
            Some(key) if is_simple_identifier(index) => {
                ctx.warn(format!(
                    "Third `v-for` alias `{}` has no template equivalent; it reads the key `{}`",
                    index, key
                ));
                names.push((index.to_string(), key));
                info.index = Some(index.to_string());
            }
            _ => ctx.warn(format!("`v-for` alias `{}` is ignored", index)),
        }
    }

    let (mut rendered, info) = ctx.with_for(info, names, |ctx| compile_plain(ctx, el));
    if rendered.tag.is_none() {
        rendered.tag = Some("block".to_string());
        rendered.self_closing = false;
    }
    let mode = ctx.options.mustache_interpolation;
    let index_attr = info
        .as_ref()
        .and_then(|i| i.for_index_attr().map(str::to_string));
    let mut attrs = ctx
        .adapter
        .for_attrs(&list_value, &item, index_attr.as_deref(), &|e| mustache_with(mode, e));
    attrs.append(&mut rendered.attrs);
    rendered.attrs = attrs;
    rendered.finish()
}

/// Compiles an element ignoring its structural directives.
pub fn compile_plain(ctx: &mut TransformContext<'_>, el: &ElementNode) -> Rendered {
    match el.tag.as_str() {
        "template" => compile_template_tag(ctx, el),
        "slot" => slots::compile_slot_outlet(ctx, el),
        "component" => compile_dynamic_component(ctx, el),
        tag if VUE_BUILTINS.contains(&tag) => {
            ctx.warn(format!("<{}> has no mini-program equivalent; only its children are rendered", tag));
            Rendered::fragment(compile_children(ctx, &el.children))
        }
        tag if is_component_tag(tag) => compile_component(ctx, el, kebab_case(tag)),
        _ => compile_builtin(ctx, el),
    }
}

fn compile_builtin(ctx: &mut TransformContext<'_>, el: &ElementNode) -> Rendered {
    if el.has_directive(&DirectiveKind::Slot) {
        ctx.warn(format!("`v-slot` on <{}> is only valid on components", el.tag));
    }
    let out = compile_attrs(ctx, el, false);
    let children = match out.children {
        Some(children) => children,
        None => compile_children(ctx, &el.children),
    };
    Rendered {
        tag: Some(el.tag.clone()),
        attrs: out.attrs,
        children,
        self_closing: el.self_closing || is_void_tag(&el.tag),
    }
}

fn compile_template_tag(ctx: &mut TransformContext<'_>, el: &ElementNode) -> Rendered {
    let native = ["name", "is", "data"]
        .iter()
        .any(|n| el.bound_attr(n).is_some());
    if el.has_directive(&DirectiveKind::Slot) {
        ctx.warn("`<template v-slot>` outside a component is rendered as plain content");
    }
    let out = compile_attrs(ctx, el, false);
    let children = compile_children(ctx, &el.children);
    if native {
        return Rendered {
            tag: Some("template".to_string()),
            attrs: out.attrs,
            children,
            self_closing: el.self_closing,
        };
    }
    // Attributes survive only if a loop turns the fragment into a <block>.
    Rendered {
        tag: None,
        attrs: out.attrs,
        children,
        self_closing: false,
    }
}

fn compile_component(ctx: &mut TransformContext<'_>, el: &ElementNode, tag: String) -> Rendered {
    ctx.note_component(&tag);
    let out = compile_attrs(ctx, el, true);
    let mut attrs = out.attrs;
    if !out.payload.is_empty() {
        let list = format!("[{}]", out.payload.join(","));
        attrs.push(attr("__wvAttrs", &ctx.mustache(&list)));
    }
    let slot_output = slots::compile_component_slots(ctx, el);
    attrs.extend(slot_output.attrs);
    Rendered {
        tag: Some(tag),
        attrs,
        children: slot_output.children,
        self_closing: el.self_closing,
    }
}

fn compile_dynamic_component(ctx: &mut TransformContext<'_>, el: &ElementNode) -> Rendered {
    if let Some(is) = el.static_attr("is").and_then(|s| s.value.clone()) {
        let mut resolved = el.clone();
        resolved.tag = is.clone();
        resolved
            .attrs
            .retain(|a| !matches!(a, Attr::Static(s) if s.name == "is"));
        return compile_plain(ctx, &resolved);
    }
    ctx.warn("`<component :is>` compiles to `data-is` and needs runtime support");
    compile_component(ctx, el, "component".to_string())
}

// ═══════════════════════════════════════════════════════════════════════════════
// ATTRIBUTES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct AttrOutput {
    attrs: Vec<String>,
    /// `__wvAttrs` entries (`'name',value`) forwarded to components.
    payload: Vec<String>,
    /// Replacement children from `v-html` / `v-text`.
    children: Option<String>,
}

/// Names that never travel in the component attribute payload.
fn is_forwardable(name: &str) -> bool {
    !matches!(name, "class" | "style" | "ref" | "key" | "slot" | "is")
        && !name.starts_with("data-")
        && !name.contains(':')
}

fn compile_attrs(ctx: &mut TransformContext<'_>, el: &ElementNode, is_component: bool) -> AttrOutput {
    let mut out = AttrOutput::default();
    let mut static_classes: Vec<String> = Vec::new();
    let mut dynamic_class: Option<String> = None;
    let mut static_style: Option<String> = None;
    let mut dynamic_style: Option<String> = None;
    let mut show: Option<String> = None;
    let mut events: Vec<EventBinding> = Vec::new();

    for a in &el.attrs {
        match a {
            Attr::Static(s) => match s.name.as_str() {
                "class" => static_classes.push(s.value.clone().unwrap_or_default()),
                "style" => static_style = s.value.clone(),
                "ref" => {
                    let value = s.value.clone().unwrap_or_default();
                    static_classes.push(compile_ref(ctx, &value, false));
                }
                "key" => {
                    let value = s.value.clone().unwrap_or_default();
                    let expr = quote_string(&value);
                    out.attrs.push(compile_key(ctx, &expr));
                }
                name => {
                    match &s.value {
                        Some(v) => out.attrs.push(attr(name, v)),
                        None => out.attrs.push(name.to_string()),
                    }
                    if is_component && is_forwardable(name) {
                        let value = s.value.as_deref().map(quote_string).unwrap_or_else(|| "true".into());
                        out.payload.push(format!("{},{}", quote_string(&camelize(name)), value));
                    }
                }
            },
            Attr::Directive(d) => match &d.kind {
                DirectiveKind::If
                | DirectiveKind::ElseIf
                | DirectiveKind::Else
                | DirectiveKind::For
                | DirectiveKind::Slot => {}
                DirectiveKind::Bind => {
                    let Some(name) = bind_name(ctx, d) else { continue };
                    let exp = d
                        .exp_trimmed()
                        .map(str::to_string)
                        .unwrap_or_else(|| camelize(&name));
                    match name.as_str() {
                        "class" => dynamic_class = Some(exp),
                        "style" => dynamic_style = Some(exp),
                        "key" => out.attrs.push(compile_key(ctx, &exp)),
                        "ref" => static_classes.push(compile_ref(ctx, &exp, true)),
                        "is" if el.tag == "component" => {
                            let value = ctx.template_expr(&exp);
                            out.attrs.push(attr("data-is", &ctx.mustache(&value)));
                        }
                        _ if is_component => {
                            let value = bind_value(ctx, &exp);
                            out.attrs.push(attr(&name, &ctx.mustache(&value)));
                            if is_forwardable(&name) {
                                out.payload.push(format!("{},{}", quote_string(&camelize(&name)), value));
                            }
                        }
                        _ => out.attrs.push(compile_bind(ctx, &name, &exp)),
                    }
                }
                DirectiveKind::On => {
                    if let Some(binding) = event_binding(ctx, d, !is_component) {
                        events.push(binding);
                    }
                }
                DirectiveKind::Model => {
                    let (value, handler) = compile_model(ctx, &el.tag, is_component, d);
                    out.attrs.extend(value);
                    events.extend(handler);
                }
                DirectiveKind::Show => show = d.exp_trimmed().map(str::to_string),
                DirectiveKind::Html => {
                    let Some(exp) = d.exp_trimmed() else { continue };
                    ctx.warn("`v-html` is rendered through <rich-text>; markup support depends on the platform");
                    let value = compile_value(ctx, exp);
                    let nodes = attr("nodes", &ctx.mustache(&value));
                    out.children = Some(format!("<rich-text {}/>", nodes));
                }
                DirectiveKind::Text => {
                    let Some(exp) = d.exp_trimmed() else { continue };
                    let value = compile_value(ctx, exp);
                    out.children = Some(ctx.mustache(&value));
                }
                DirectiveKind::Once | DirectiveKind::Memo | DirectiveKind::Pre => {
                    ctx.warn(format!("`{}` has no mini-program equivalent and is ignored", d.raw_name));
                }
                DirectiveKind::Cloak => {}
                DirectiveKind::Custom(name) => out.attrs.push(compile_custom(ctx, name, d)),
            },
        }
    }

    if let Some(class) = compile_class(ctx, &static_classes, dynamic_class.as_deref()) {
        out.attrs.push(attr("class", &class));
    }
    if let Some(style) = compile_style(
        ctx,
        static_style.as_deref(),
        dynamic_style.as_deref(),
        show.as_deref(),
    ) {
        out.attrs.push(attr("style", &style));
    }
    out.attrs.extend(compile_events(ctx, events));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{CompileOptions, Platform};
    use crate::parse::parse_template;

    fn render<'o>(source: &str, options: &'o CompileOptions) -> (String, TransformContext<'o>) {
        let nodes = parse_template(source, "a.vue", 0).unwrap();
        let mut ctx = TransformContext::new("a.vue", options);
        let out = compile_template(&mut ctx, &nodes);
        assert!(ctx.scope.is_balanced());
        (out, ctx)
    }

    #[test]
    fn component_tags() {
        assert!(is_component_tag("TIcon"));
        assert!(is_component_tag("van-button"));
        assert!(!is_component_tag("scroll-view"));
        assert!(!is_component_tag("view"));
        assert_eq!(kebab_case("TIcon"), "t-icon");
        assert_eq!(kebab_case("VanButtonGroup"), "van-button-group");
        assert_eq!(kebab_case("t-icon"), "t-icon");
        assert_eq!(kebab_case("QRCode"), "q-r-code");
        assert_eq!(kebab_case("Van-Cell"), "van-cell");
    }

    #[test]
    fn text_whitespace_is_collapsed() {
        let options = CompileOptions::default();
        let (out, _) = render("<view>\n  hello   {{ name }}  !\n</view>", &options);
        assert_eq!(out, "<view>hello {{name}} !</view>");
    }

    #[test]
    fn if_chain_wraps_blocks() {
        let options = CompileOptions::default();
        let (out, _) = render(
            "<view v-if=\"a\">1</view>\n<!-- c -->\n<view v-else-if=\"b\">2</view>\n<view v-else>3</view>",
            &options,
        );
        assert_eq!(
            out,
            "<block wx:if=\"{{a}}\"><view>1</view></block><block wx:elif=\"{{b}}\"><view>2</view></block><block wx:else><view>3</view></block>"
        );
    }

    #[test]
    fn alipay_loop_with_member_key() {
        let options = CompileOptions::for_platform(Platform::Alipay);
        let (out, _) = render(
            "<view v-for=\"item in items\" :key=\"item.id\">{{ item.name }}</view>",
            &options,
        );
        assert_eq!(
            out,
            "<view a:for=\"{{items}}\" a:for-item=\"item\" a:key=\"id\">{{item.name}}</view>"
        );
    }

    #[test]
    fn template_loop_becomes_block() {
        let options = CompileOptions::default();
        let (out, _) = render(
            "<template v-for=\"(row, i) in rows\" :key=\"row.id\"><text>{{ i }}</text></template>",
            &options,
        );
        assert_eq!(
            out,
            "<block wx:for=\"{{rows}}\" wx:for-item=\"row\" wx:for-index=\"i\" wx:key=\"id\"><text>{{i}}</text></block>"
        );
    }

    #[test]
    fn destructured_loop_alias() {
        let options = CompileOptions::default();
        let (out, _) = render("<view v-for=\"{ id, title } in list\">{{ title }}</view>", &options);
        assert_eq!(
            out,
            "<view wx:for=\"{{list}}\" wx:for-item=\"__wv_item_0\">{{__wv_item_0.title}}</view>"
        );
    }

    #[test]
    fn components_are_kebab_cased_and_noted() {
        let options = CompileOptions::default();
        let (out, ctx) = render("<TIcon :name=\"item.icon ?? 'app'\" size=\"24\" />", &options);
        assert_eq!(
            out,
            "<t-icon name=\"{{item.icon!=null?item.icon:'app'}}\" size=\"24\" __wvAttrs=\"{{['name',item.icon!=null?item.icon:'app','size','24']}}\"/>"
        );
        assert_eq!(ctx.used_components, vec!["t-icon".to_string()]);
    }

    #[test]
    fn class_style_show_and_events() {
        let options = CompileOptions::default();
        let (out, ctx) = render(
            "<view class=\"card\" :class=\"{ on: active }\" v-show=\"open\" @click=\"toggle\"></view>",
            &options,
        );
        assert_eq!(
            out,
            "<view class=\"card {{__wv_cls_0}}\" style=\"{{open?'':'display: none;'}}\" bindtap=\"toggle\"></view>"
        );
        assert_eq!(ctx.unit.class_style_bindings.len(), 1);
    }

    #[test]
    fn void_and_html_elements() {
        let options = CompileOptions::default();
        let (out, ctx) = render("<input v-model=\"text\"><view v-html=\"raw\"></view>", &options);
        assert_eq!(
            out,
            "<input value=\"{{text}}\" bindinput=\"__weapp_vite_inline\" data-wv-inline-id=\"__wv_inline_0\"/><view><rich-text nodes=\"{{raw}}\"/></view>"
        );
        assert_eq!(ctx.warnings.len(), 1);
    }

    #[test]
    fn stray_else_warns() {
        let options = CompileOptions::default();
        let (out, ctx) = render("<view v-else>x</view>", &options);
        assert_eq!(out, "<view>x</view>");
        assert_eq!(ctx.warnings.len(), 1);
    }
}

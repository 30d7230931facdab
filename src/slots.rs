//! Slots.
//!
//! Mini-program templates have no closures, so a slot body that reads props
//! from the child cannot be compiled in place. Such a body is compiled into a
//! synthetic component which the child instantiates through a component
//! generic (`generic:scoped-slots-<key>`); the host passes the locals the body
//! closes over as an alternating `[name, value, ...]` array.

use crate::class_style::{wxs_helper_import, ClassStyleBinding};
use crate::context::TransformContext;
use crate::directive::{attr, bind_name, compile_value, TemplateRefMeta};
use crate::element::{compile_children, Rendered};
use crate::expression::{is_simple_identifier, quote_string};
use crate::inline::InlineExpressionAsset;
use crate::ir::{Attr, DirectiveKind, ElementNode, TemplateNode};
use crate::scope::destructure_alias;
use serde::Serialize;

pub const SLOT_PROPS: &str = "__wvSlotProps";
pub const GENERIC_PREFIX: &str = "scoped-slots-";

/// A scoped slot body compiled into its own component.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopedSlotComponentAsset {
    pub id: String,
    pub component_name: String,
    pub slot_key: String,
    pub template: String,
    pub script: String,
    /// JSON text; `usingComponents` is filled in once the host's imports
    /// are known.
    pub config: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub class_style_bindings: Vec<ClassStyleBinding>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub inline_expressions: Vec<InlineExpressionAsset>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub template_refs: Vec<TemplateRefMeta>,
    /// Component tags the slot body renders.
    #[serde(skip)]
    pub used_components: Vec<String>,
}

/// Slot name → generic-safe key.
pub fn slot_key(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect()
}

fn pairs_array(pairs: &[(String, String)]) -> String {
    let items: Vec<String> = pairs
        .iter()
        .map(|(k, v)| format!("{},{}", quote_string(k), v))
        .collect();
    format!("[{}]", items.join(","))
}

// ═══════════════════════════════════════════════════════════════════════════════
// CHILD SIDE: <slot>
// ═══════════════════════════════════════════════════════════════════════════════

pub fn compile_slot_outlet(ctx: &mut TransformContext<'_>, el: &ElementNode) -> Rendered {
    let mut name = "default".to_string();
    let mut props: Vec<(String, String)> = Vec::new();
    for a in &el.attrs {
        match a {
            Attr::Static(s) if s.name == "name" => {
                name = s.value.clone().unwrap_or_else(|| "default".into());
            }
            Attr::Static(s) => {
                let value = s.value.as_deref().map(quote_string).unwrap_or_else(|| "true".into());
                props.push((s.name.clone(), value));
            }
            Attr::Directive(d) if d.kind == DirectiveKind::Bind => {
                let Some(prop) = bind_name(ctx, d) else { continue };
                if prop == "name" {
                    ctx.warn("Dynamic slot names are not supported; using the default slot");
                    continue;
                }
                let exp = d.exp_trimmed().map(str::to_string).unwrap_or_else(|| prop.clone());
                let value = compile_value(ctx, &exp);
                props.push((prop, value));
            }
            Attr::Directive(d) if d.kind.is_structural() => {}
            Attr::Directive(d) => {
                ctx.warn(format!("`{}` on <slot> is ignored", d.raw_name));
            }
        }
    }

    let fallback = compile_children(ctx, &el.children);
    let mut slot_attrs = Vec::new();
    if name != "default" {
        slot_attrs.push(attr("name", &name));
    }
    let plain = Rendered {
        tag: Some("slot".to_string()),
        attrs: slot_attrs,
        children: fallback,
        self_closing: el.self_closing || el.children.is_empty(),
    };

    if props.is_empty() {
        return plain;
    }
    if !ctx.options.scoped_slots_compiler.enabled() {
        ctx.warn(format!(
            "Slot `{}` passes props but scoped slots are disabled; the props are dropped",
            name
        ));
        return plain;
    }

    let generic = format!("{}{}", GENERIC_PREFIX, slot_key(&name));
    ctx.component_generics
        .insert(generic.clone(), serde_json::Value::Bool(true));
    let outlet = Rendered::element(
        generic,
        vec![
            attr("__wv-slot-props", &ctx.mustache(&pairs_array(&props))),
            attr("__wv-slot-owner-id", &ctx.mustache("__wvOwnerId")),
        ],
        String::new(),
    );
    Rendered::fragment(format!("{}{}", outlet.finish(), plain.finish()))
}

// ═══════════════════════════════════════════════════════════════════════════════
// HOST SIDE: slot content passed to a component
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct SlotOutput {
    pub children: String,
    pub attrs: Vec<String>,
}

struct SlotDecl {
    name: String,
    key: String,
    props: Option<String>,
    children: Vec<TemplateNode>,
}

fn slot_decl_name(ctx: &mut TransformContext<'_>, arg: Option<&str>, dynamic: bool) -> String {
    if dynamic {
        ctx.warn("Dynamic slot names are not supported; using the default slot");
        return "default".to_string();
    }
    arg.unwrap_or("default").to_string()
}

fn collect_slot_decls(ctx: &mut TransformContext<'_>, el: &ElementNode) -> Vec<SlotDecl> {
    if let Some(d) = el.directive(&DirectiveKind::Slot) {
        let name = slot_decl_name(ctx, d.arg.as_deref(), d.dynamic_arg);
        return vec![SlotDecl {
            key: slot_key(&name),
            name,
            props: d.exp_trimmed().map(str::to_string),
            children: el.children.clone(),
        }];
    }

    let mut decls = Vec::new();
    let mut default_children = Vec::new();
    for child in &el.children {
        let slot = child.as_element().and_then(|c| {
            if c.tag == "template" {
                c.directive(&DirectiveKind::Slot).map(|d| (c, d))
            } else {
                None
            }
        });
        match slot {
            Some((template, d)) => {
                let name = slot_decl_name(ctx, d.arg.as_deref(), d.dynamic_arg);
                decls.push(SlotDecl {
                    key: slot_key(&name),
                    name,
                    props: d.exp_trimmed().map(str::to_string),
                    children: template.children.clone(),
                });
            }
            None => default_children.push(child.clone()),
        }
    }
    if default_children.iter().any(|c| !c.is_ignorable()) {
        decls.insert(
            0,
            SlotDecl {
                name: "default".to_string(),
                key: "default".to_string(),
                props: None,
                children: default_children,
            },
        );
    }
    decls
}

/// Compiles the slot content of a component element.
pub fn compile_component_slots(ctx: &mut TransformContext<'_>, el: &ElementNode) -> SlotOutput {
    let decls = collect_slot_decls(ctx, el);
    let mut out = SlotOutput::default();
    let mut generic_keys: Vec<String> = Vec::new();
    let mut slot_scope: Vec<(String, String)> = Vec::new();

    for decl in decls {
        let wants_component = decl.props.is_some() || ctx.options.scoped_slots_require_props;
        if wants_component && ctx.options.scoped_slots_compiler.enabled() {
            let (component_name, captured) = compile_synthetic(ctx, &decl);
            out.attrs.push(attr(
                &format!("generic:{}{}", GENERIC_PREFIX, decl.key),
                &component_name,
            ));
            generic_keys.push(decl.key.clone());
            for entry in captured {
                if !slot_scope.iter().any(|(k, _)| k == &entry.0) {
                    slot_scope.push(entry);
                }
            }
            continue;
        }
        if decl.props.is_some() {
            ctx.warn(format!(
                "Slot `{}` declares props but scoped slots are disabled; the props are unavailable",
                decl.name
            ));
        }
        let body = compile_children(ctx, &decl.children);
        if decl.name == "default" {
            out.children.push_str(&body);
        } else {
            out.children
                .push_str(&Rendered::element("view", vec![attr("slot", &decl.name)], body).finish());
        }
    }

    if !generic_keys.is_empty() {
        let keys: Vec<String> = generic_keys.iter().map(|k| quote_string(k)).collect();
        let list = format!("[{}]", keys.join(","));
        out.attrs.push(attr("vue-slots", &ctx.mustache(&list)));
    }
    if !slot_scope.is_empty() {
        out.attrs
            .push(attr("__wv-slot-scope", &ctx.mustache(&pairs_array(&slot_scope))));
    }
    out
}

/// Compiles one slot body into a [`ScopedSlotComponentAsset`]. Returns the
/// component name and the host locals (with their host-side values) the
/// body captured.
fn compile_synthetic(ctx: &mut TransformContext<'_>, decl: &SlotDecl) -> (String, Vec<(String, String)>) {
    let props = match decl.props.as_deref() {
        None => Vec::new(),
        Some(p) if is_simple_identifier(p) => vec![(p.to_string(), SLOT_PROPS.to_string())],
        Some(p) => match destructure_alias(p, SLOT_PROPS) {
            Ok((names, warnings)) => {
                for w in warnings {
                    ctx.warn(w);
                }
                names
            }
            Err(message) => {
                ctx.warn(format!("Failed to parse slot props `{}`: {}", p, message));
                Vec::new()
            }
        },
    };

    let saved_components = std::mem::take(&mut ctx.used_components);
    let saved_wxs = std::mem::replace(&mut ctx.wxs_helper_used, false);
    let ((body, captured), unit) = ctx.with_isolated_unit(|ctx| {
        ctx.with_slot_props(props, |ctx| compile_children(ctx, &decl.children))
    });
    let used_components = std::mem::replace(&mut ctx.used_components, saved_components);
    let uses_wxs = std::mem::replace(&mut ctx.wxs_helper_used, saved_wxs);

    let captured: Vec<(String, String)> = captured
        .into_iter()
        .map(|name| {
            let value = ctx.template_expr(&name);
            (name, value)
        })
        .collect();

    let component_name = ctx.next_slot_component_name(&decl.key);
    let template = if uses_wxs {
        format!("{}{}", wxs_helper_import(ctx.adapter), body)
    } else {
        body
    };
    let script = crate::script::scoped_slot_script(&unit, ctx.options);
    tracing::debug!(component = %component_name, slot = %decl.name, "compiled scoped slot component");
    ctx.slot_components.push(ScopedSlotComponentAsset {
        id: format!("scoped-slot-{}", ctx.slot_components.len()),
        component_name: component_name.clone(),
        slot_key: decl.key.clone(),
        template,
        script,
        config: "{\n  \"component\": true\n}".to_string(),
        class_style_bindings: unit.class_style_bindings,
        inline_expressions: unit.inline_expressions,
        template_refs: unit.template_refs,
        used_components,
    });
    (component_name, captured)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::compile_template;
    use crate::options::{CompileOptions, ScopedSlotsCompiler};
    use crate::parse::parse_template;

    fn render<'o>(source: &str, options: &'o CompileOptions) -> (String, TransformContext<'o>) {
        let nodes = parse_template(source, "list.vue", 0).unwrap();
        let mut ctx = TransformContext::new("list.vue", options);
        let out = compile_template(&mut ctx, &nodes);
        assert!(ctx.scope.is_balanced());
        (out, ctx)
    }

    #[test]
    fn outlet_with_props_uses_generic() {
        let options = CompileOptions::default();
        let (out, ctx) = render("<slot name=\"item\" :row=\"current\">none</slot>", &options);
        assert_eq!(
            out,
            "<scoped-slots-item __wv-slot-props=\"{{['row',current]}}\" __wv-slot-owner-id=\"{{__wvOwnerId}}\"></scoped-slots-item><slot name=\"item\">none</slot>"
        );
        assert_eq!(
            ctx.component_generics.get("scoped-slots-item"),
            Some(&serde_json::Value::Bool(true))
        );
    }

    #[test]
    fn plain_outlet() {
        let options = CompileOptions::default();
        let (out, ctx) = render("<slot/><slot name=\"footer\">x</slot>", &options);
        assert_eq!(out, "<slot/><slot name=\"footer\">x</slot>");
        assert!(ctx.component_generics.is_empty());
    }

    #[test]
    fn named_slot_without_props_is_inlined() {
        let options = CompileOptions::default();
        let (out, ctx) = render(
            "<my-card><template #footer><text>bye</text></template><text>hi</text></my-card>",
            &options,
        );
        assert_eq!(
            out,
            "<my-card><text>hi</text><view slot=\"footer\"><text>bye</text></view></my-card>"
        );
        assert!(ctx.slot_components.is_empty());
    }

    #[test]
    fn scoped_slot_becomes_component() {
        let options = CompileOptions::default();
        let (out, ctx) = render(
            "<view v-for=\"group in groups\"><my-list><template #item=\"{ row }\"><text @tap=\"pick(row, group)\">{{ row.name }} {{ title }}</text></template></my-list></view>",
            &options,
        );
        assert!(
            out.contains("generic:scoped-slots-item=\"list-scoped-slot-item-0\""),
            "{}",
            out
        );
        assert!(out.contains("vue-slots=\"{{['item']}}\""), "{}", out);
        assert!(out.contains("__wv-slot-scope=\"{{['group',group]}}\""), "{}", out);

        let asset = &ctx.slot_components[0];
        assert_eq!(asset.slot_key, "item");
        assert!(
            asset.template.contains("{{__wvSlotProps.row.name}} {{__wvOwner.title}}"),
            "{}",
            asset.template
        );
        assert_eq!(asset.inline_expressions.len(), 1);
        assert_eq!(
            asset.inline_expressions[0].body,
            "return ctx.__wvOwner.pick(scope.row,scope.group);"
        );
        assert!(ctx.unit.inline_expressions.is_empty());
    }

    #[test]
    fn require_props_forces_components() {
        let options = CompileOptions {
            scoped_slots_require_props: true,
            ..CompileOptions::default()
        };
        let (out, ctx) = render("<my-card><text>hi</text></my-card>", &options);
        assert_eq!(
            out,
            "<my-card generic:scoped-slots-default=\"list-scoped-slot-default-0\" vue-slots=\"{{['default']}}\"></my-card>"
        );
        assert_eq!(ctx.slot_components[0].template, "<text>hi</text>");
    }

    #[test]
    fn disabled_compiler_inlines_with_warning() {
        let options = CompileOptions {
            scoped_slots_compiler: ScopedSlotsCompiler::Off,
            ..CompileOptions::default()
        };
        let (out, ctx) = render("<my-card v-slot=\"p\"><text>{{ p.a }}</text></my-card>", &options);
        assert_eq!(out, "<my-card><text>{{p.a}}</text></my-card>");
        assert_eq!(ctx.warnings.len(), 1);
    }
}

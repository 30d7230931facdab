//! Dynamic `class` / `style` / complex `:prop` values.
//!
//! Literal-only expressions are evaluated by the template script module
//! helper (`__weapp_vite.cls(...)`); anything touching live state becomes a
//! computed property on the component and the template reads it by name,
//! indexed by the enclosing loop indexes.

use crate::context::{NameKind, TransformContext};
use crate::expression::prefer_js_runtime;
use crate::options::ResolvedClassStyleRuntime;
use crate::platform::PlatformAdapter;
use serde::Serialize;

pub const WXS_HELPER_MODULE: &str = "__weapp_vite";
pub const WXS_HELPER_BASENAME: &str = "__weapp_vite_class_style";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingKind {
    Class,
    Style,
    Bind,
}

impl BindingKind {
    fn name_kind(self) -> NameKind {
        match self {
            BindingKind::Class => NameKind::Class,
            BindingKind::Style => NameKind::Style,
            BindingKind::Bind => NameKind::Bind,
        }
    }

    /// Value produced when the computed getter throws.
    pub fn fallback(self) -> &'static str {
        match self {
            BindingKind::Class | BindingKind::Style => "''",
            BindingKind::Bind => "undefined",
        }
    }
}

/// One enclosing `v-for` as seen from script.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopSnapshot {
    pub list: String,
    pub item: String,
    pub key: String,
    pub index: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassStyleBinding {
    pub name: String,
    pub kind: BindingKind,
    pub source_expr: String,
    /// The expression rewritten against `this` and the loop parameters.
    pub script_expr: String,
    pub for_stack: Vec<LoopSnapshot>,
}

/// Registers a computed binding and returns the template expression that
/// reads it (`__wv_cls_0`, or `__wv_cls_0[index]` inside loops). `None` when
/// the expression cannot be parsed; the caller falls back to inline text.
pub fn register_binding(ctx: &mut TransformContext<'_>, kind: BindingKind, expr: &str) -> Option<String> {
    let script_expr = match ctx.script_expr(expr) {
        Ok(code) => code,
        Err(message) => {
            ctx.warn(format!("Failed to parse expression `{}`: {}", expr.trim(), message));
            return None;
        }
    };
    let name = ctx.next_name(kind.name_kind());
    let index_vars = ctx.scope.loop_index_vars();
    let for_stack = ctx
        .scope
        .for_stack()
        .iter()
        .map(|info| {
            let (item, key, index) = info.walk_params();
            LoopSnapshot {
                list: info.list_script.clone(),
                item,
                key,
                index,
            }
        })
        .collect();
    tracing::trace!(name = %name, expr = %expr.trim(), "registered class/style binding");
    ctx.unit.class_style_bindings.push(ClassStyleBinding {
        name: name.clone(),
        kind,
        source_expr: expr.trim().to_string(),
        script_expr,
        for_stack,
    });
    let mut reference = name;
    for var in index_vars {
        reference.push('[');
        reference.push_str(&var);
        reference.push(']');
    }
    Some(reference)
}

fn dynamic_part(ctx: &mut TransformContext<'_>, kind: BindingKind, expr: &str) -> String {
    let helper = match kind {
        BindingKind::Class => "cls",
        _ => "style",
    };
    if ctx.runtime == ResolvedClassStyleRuntime::Wxs && !prefer_js_runtime(expr) {
        ctx.wxs_helper_used = true;
        let code = ctx.template_expr(expr);
        return ctx.mustache(&format!("{}.{}({})", WXS_HELPER_MODULE, helper, code));
    }
    match register_binding(ctx, kind, expr) {
        Some(reference) => ctx.mustache(&reference),
        None => ctx.mustache(expr.trim()),
    }
}

/// `class` attribute value merging static classes (including ref markers)
/// with the dynamic binding.
pub fn compile_class(ctx: &mut TransformContext<'_>, statics: &[String], dynamic: Option<&str>) -> Option<String> {
    let mut parts: Vec<String> = statics
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if let Some(expr) = dynamic.filter(|e| !e.trim().is_empty()) {
        parts.push(dynamic_part(ctx, BindingKind::Class, expr));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

/// `style` attribute value: static declarations, the dynamic binding, then
/// the `v-show` toggle.
pub fn compile_style(
    ctx: &mut TransformContext<'_>,
    statics: Option<&str>,
    dynamic: Option<&str>,
    show: Option<&str>,
) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();
    if let Some(s) = statics.map(str::trim).filter(|s| !s.is_empty()) {
        parts.push(s.trim_end_matches(';').to_string());
    }
    if let Some(expr) = dynamic.filter(|e| !e.trim().is_empty()) {
        parts.push(dynamic_part(ctx, BindingKind::Style, expr));
    }
    if let Some(expr) = show {
        let test = ctx.template_expr(expr);
        let test = if is_plain_operand(&test) {
            test
        } else {
            format!("({})", test)
        };
        parts.push(ctx.mustache(&format!("{}?'':'display: none;'", test)));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(";"))
    }
}

fn is_plain_operand(code: &str) -> bool {
    !code.is_empty()
        && code
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '$' | '.' | '[' | ']' | '!'))
}

/// Template import tag for the helper module.
pub fn wxs_helper_import(adapter: &dyn PlatformAdapter) -> String {
    adapter.script_module_import(
        WXS_HELPER_MODULE,
        &format!("./{}{}", WXS_HELPER_BASENAME, adapter.script_module_extension()),
    )
}

pub fn wxs_helper_filename(adapter: &dyn PlatformAdapter) -> String {
    format!("{}{}", WXS_HELPER_BASENAME, adapter.script_module_extension())
}

/// Source of the helper module, written in the WXS/SJS subset (no regexes
/// beyond the engine's `getRegExp`, no `Array.isArray`, no key enumeration).
pub fn wxs_helper_source(adapter: &dyn PlatformAdapter) -> String {
    let body = r#"function isArray(value) {
  return value && value.constructor === 'Array';
}

function isObject(value) {
  return value && value.constructor === 'Object';
}

// Top-level keys of a plain object, read from its JSON text. The template
// script runtime cannot enumerate object keys directly.
function keys(obj) {
  var json = JSON.stringify(obj);
  var out = [];
  var depth = 0;
  var inString = false;
  var expectKey = false;
  var readingKey = false;
  var key = '';
  for (var i = 0; i < json.length; i++) {
    var ch = json[i];
    if (inString) {
      if (ch === '\\') {
        i++;
        if (readingKey) {
          key += json[i];
        }
      } else if (ch === '"') {
        inString = false;
        if (readingKey) {
          out.push(key);
          readingKey = false;
        }
      } else if (readingKey) {
        key += ch;
      }
    } else if (ch === '"') {
      inString = true;
      if (depth === 1 && expectKey) {
        readingKey = true;
        expectKey = false;
        key = '';
      }
    } else if (ch === '{' || ch === '[') {
      depth++;
      if (depth === 1) {
        expectKey = ch === '{';
      }
    } else if (ch === '}' || ch === ']') {
      depth--;
    } else if (ch === ',' && depth === 1) {
      expectKey = true;
    }
  }
  return out;
}

function hyphenate(name) {
  var out = '';
  for (var i = 0; i < name.length; i++) {
    var ch = name[i];
    if (ch >= 'A' && ch <= 'Z') {
      out += '-' + ch.toLowerCase();
    } else {
      out += ch;
    }
  }
  return out;
}

function cls(value) {
  if (!value) {
    return '';
  }
  if (typeof value === 'string') {
    return value;
  }
  var out = [];
  if (isArray(value)) {
    for (var i = 0; i < value.length; i++) {
      var item = cls(value[i]);
      if (item) {
        out.push(item);
      }
    }
  } else if (isObject(value)) {
    var names = keys(value);
    for (var j = 0; j < names.length; j++) {
      if (value[names[j]]) {
        out.push(names[j]);
      }
    }
  }
  return out.join(' ');
}

function style(value) {
  if (!value) {
    return '';
  }
  if (typeof value === 'string') {
    return value;
  }
  var out = [];
  if (isArray(value)) {
    for (var i = 0; i < value.length; i++) {
      var item = style(value[i]);
      if (item) {
        out.push(item);
      }
    }
  } else if (isObject(value)) {
    var names = keys(value);
    for (var j = 0; j < names.length; j++) {
      var v = value[names[j]];
      if (v !== undefined && v !== null && v !== '') {
        out.push(hyphenate(names[j]) + ':' + v);
      }
    }
  }
  return out.join(';');
}
"#;
    let export = if adapter.script_module_tag() == "import-sjs" {
        "export default {\n  cls: cls,\n  style: style\n};\n"
    } else {
        "module.exports = {\n  cls: cls,\n  style: style\n};\n"
    };
    format!("{}\n{}", body, export)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{ClassStyleRuntime, CompileOptions, Platform};
    use crate::platform::get_platform_adapter;
    use crate::scope::ForInfo;

    #[test]
    fn literal_class_uses_wxs_helper() {
        let options = CompileOptions::default();
        let mut ctx = TransformContext::new("a.vue", &options);
        let value = compile_class(&mut ctx, &["base".into()], Some("['a', { b: true }]"));
        assert_eq!(value.as_deref(), Some("base {{__weapp_vite.cls(['a',{b:true}])}}"));
        assert!(ctx.wxs_helper_used);
        assert!(ctx.unit.class_style_bindings.is_empty());
    }

    #[test]
    fn stateful_class_becomes_computed() {
        let options = CompileOptions::default();
        let mut ctx = TransformContext::new("a.vue", &options);
        let value = compile_class(&mut ctx, &[], Some("{ active: isActive }"));
        assert_eq!(value.as_deref(), Some("{{__wv_cls_0}}"));
        let binding = &ctx.unit.class_style_bindings[0];
        assert_eq!(binding.script_expr, "{active:this.isActive}");
        assert!(binding.for_stack.is_empty());
    }

    #[test]
    fn js_runtime_forces_computed() {
        let mut options = CompileOptions::default();
        options.class_style_runtime = ClassStyleRuntime::Js;
        let mut ctx = TransformContext::new("a.vue", &options);
        let value = compile_class(&mut ctx, &[], Some("'a'"));
        assert_eq!(value.as_deref(), Some("{{__wv_cls_0}}"));
    }

    #[test]
    fn loop_bindings_are_indexed() {
        let options = CompileOptions::default();
        let mut ctx = TransformContext::new("a.vue", &options);
        ctx.scope.push_for(
            ForInfo::new("this.list".into(), "item".into(), 0),
            vec![("item".into(), "item".into())],
        );
        let value = compile_style(&mut ctx, Some("color: red;"), Some("{ width: item.w + 'px' }"), None);
        assert_eq!(value.as_deref(), Some("color: red;{{__wv_style_0[__wv_index_0]}}"));
        let binding = &ctx.unit.class_style_bindings[0];
        assert_eq!(binding.script_expr, "{width:item.w+'px'}");
        assert_eq!(binding.for_stack[0].list, "this.list");
        assert_eq!(ctx.scope.current_for().unwrap().for_index_attr(), Some("__wv_index_0"));
        ctx.scope.pop_for();
    }

    #[test]
    fn show_toggle_is_appended() {
        let options = CompileOptions::default();
        let mut ctx = TransformContext::new("a.vue", &options);
        assert_eq!(
            compile_style(&mut ctx, None, None, Some("visible")).as_deref(),
            Some("{{visible?'':'display: none;'}}")
        );
        assert_eq!(
            compile_style(&mut ctx, Some("a:b"), None, Some("x > 1")).as_deref(),
            Some("a:b;{{(x>1)?'':'display: none;'}}")
        );
    }

    #[test]
    fn helper_module_shapes() {
        let wx = get_platform_adapter(Platform::Wechat);
        assert!(wxs_helper_source(wx).contains("module.exports"));
        assert_eq!(wxs_helper_filename(wx), "__weapp_vite_class_style.wxs");
        let my = get_platform_adapter(Platform::Alipay);
        assert!(wxs_helper_source(my).contains("export default"));
        assert_eq!(
            wxs_helper_import(my),
            "<import-sjs name=\"__weapp_vite\" from=\"./__weapp_vite_class_style.sjs\"/>"
        );
    }

    #[test]
    fn helper_sticks_to_the_template_script_subset() {
        for platform in [Platform::Wechat, Platform::Alipay, Platform::Swan] {
            let source = wxs_helper_source(get_platform_adapter(platform));
            assert!(!source.contains("Object."), "{}", source);
            assert!(!source.contains("RegExp"), "{}", source);
            assert!(source.contains("var names = keys(value);"));
            assert!(source.contains("JSON.stringify(obj)"));
        }
    }
}

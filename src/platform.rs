//! Per-platform template dialect tables.
//!
//! Every supported mini-program runtime speaks a slightly different WXML
//! dialect: the control-flow attribute prefix (`wx:` / `a:` / `tt:` / `s-`),
//! the event binding attribute shape (`bindtap` vs `onTap`), the template
//! script module tag (`<wxs>` vs `<import-sjs>`) and the file extensions.
//! Selecting a platform is a pure lookup: adapters are stateless unit structs.

use crate::options::Platform;

/// Value used as the loop key when items have no stable member key.
pub const KEY_SENTINEL: &str = "*this";

/// Event binding flavour derived from `v-on` modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventModifiers {
    pub catch: bool,
    pub capture: bool,
    pub mutated: bool,
}

pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    /// Prefix for control-flow attributes (`wx:` → `wx:if`, `wx:for`).
    fn directive_prefix(&self) -> &'static str;

    /// Template file extension including the dot.
    fn template_extension(&self) -> &'static str;

    /// Tag used to import the template script helper module.
    fn script_module_tag(&self) -> &'static str;

    /// Extension of template script modules (`.wxs` / `.sjs`).
    fn script_module_extension(&self) -> &'static str;

    /// Whether control-flow attribute values are wrapped in mustaches.
    fn wraps_directive_values(&self) -> bool {
        true
    }

    fn else_if_name(&self) -> &'static str {
        "elif"
    }

    /// `mut-bind` is a WeChat-family extension.
    fn supports_mut_bind(&self) -> bool {
        true
    }

    fn directive_value(&self, expr: &str, mustache: &dyn Fn(&str) -> String) -> String {
        if self.wraps_directive_values() {
            mustache(expr)
        } else {
            expr.to_string()
        }
    }

    fn if_attr(&self, expr: &str, mustache: &dyn Fn(&str) -> String) -> String {
        format!(
            "{}if=\"{}\"",
            self.directive_prefix(),
            self.directive_value(expr, mustache)
        )
    }

    fn else_if_attr(&self, expr: &str, mustache: &dyn Fn(&str) -> String) -> String {
        format!(
            "{}{}=\"{}\"",
            self.directive_prefix(),
            self.else_if_name(),
            self.directive_value(expr, mustache)
        )
    }

    fn else_attr(&self) -> String {
        format!("{}else", self.directive_prefix())
    }

    fn for_attrs(
        &self,
        list: &str,
        item: &str,
        index: Option<&str>,
        mustache: &dyn Fn(&str) -> String,
    ) -> Vec<String> {
        let prefix = self.directive_prefix();
        let mut attrs = vec![
            format!("{}for=\"{}\"", prefix, self.directive_value(list, mustache)),
            format!("{}for-item=\"{}\"", prefix, item),
        ];
        if let Some(index) = index {
            attrs.push(format!("{}for-index=\"{}\"", prefix, index));
        }
        attrs
    }

    fn key_attr(&self, value: &str) -> String {
        format!("{}key=\"{}\"", self.directive_prefix(), value)
    }

    fn key_sentinel(&self) -> &'static str {
        KEY_SENTINEL
    }

    /// Vue event names that have a different native name.
    fn map_event_name(&self, event: &str) -> String {
        match event {
            "click" => "tap".to_string(),
            other => other.to_string(),
        }
    }

    /// Final binding attribute name for an (already remapped) event.
    fn event_attr_name(&self, event: &str, modifiers: EventModifiers) -> String;

    /// Import tag for the class/style helper module.
    fn script_module_import(&self, module: &str, src: &str) -> String {
        format!(
            "<{} module=\"{}\" src=\"{}\"/>",
            self.script_module_tag(),
            module,
            src
        )
    }
}

fn needs_colon_form(event: &str) -> bool {
    !event
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}

/// Shared WeChat-style binding shape: `bindtap`, `catchtap`,
/// `capture-bind:tap`, `capture-catch:tap`, `mut-bind:tap`.
fn wechat_style_event_attr(event: &str, modifiers: EventModifiers, allow_mut: bool) -> String {
    match (modifiers.capture, modifiers.catch) {
        (true, true) => format!("capture-catch:{}", event),
        (true, false) => format!("capture-bind:{}", event),
        (false, true) => {
            if needs_colon_form(event) {
                format!("catch:{}", event)
            } else {
                format!("catch{}", event)
            }
        }
        (false, false) => {
            if modifiers.mutated && allow_mut {
                format!("mut-bind:{}", event)
            } else if needs_colon_form(event) {
                format!("bind:{}", event)
            } else {
                format!("bind{}", event)
            }
        }
    }
}

fn capitalize(event: &str) -> String {
    let mut chars = event.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

macro_rules! wechat_family_adapter {
    ($name:ident, $platform:expr, $prefix:expr, $ext:expr, $tag:expr, $module_ext:expr, $mut:expr) => {
        pub struct $name;

        impl PlatformAdapter for $name {
            fn platform(&self) -> Platform {
                $platform
            }
            fn directive_prefix(&self) -> &'static str {
                $prefix
            }
            fn template_extension(&self) -> &'static str {
                $ext
            }
            fn script_module_tag(&self) -> &'static str {
                $tag
            }
            fn script_module_extension(&self) -> &'static str {
                $module_ext
            }
            fn supports_mut_bind(&self) -> bool {
                $mut
            }
            fn event_attr_name(&self, event: &str, modifiers: EventModifiers) -> String {
                wechat_style_event_attr(event, modifiers, $mut)
            }
        }
    };
}

wechat_family_adapter!(WechatAdapter, Platform::Wechat, "wx:", ".wxml", "wxs", ".wxs", true);
wechat_family_adapter!(TtAdapter, Platform::Tt, "tt:", ".ttml", "sjs", ".sjs", false);
wechat_family_adapter!(JdAdapter, Platform::Jd, "jd:", ".jxml", "wxs", ".wxs", false);
wechat_family_adapter!(XhsAdapter, Platform::Xhs, "xhs:", ".xhsml", "wxs", ".wxs", false);

pub struct AlipayAdapter;

impl PlatformAdapter for AlipayAdapter {
    fn platform(&self) -> Platform {
        Platform::Alipay
    }
    fn directive_prefix(&self) -> &'static str {
        "a:"
    }
    fn template_extension(&self) -> &'static str {
        ".axml"
    }
    fn script_module_tag(&self) -> &'static str {
        "import-sjs"
    }
    fn script_module_extension(&self) -> &'static str {
        ".sjs"
    }
    fn supports_mut_bind(&self) -> bool {
        false
    }

    fn event_attr_name(&self, event: &str, modifiers: EventModifiers) -> String {
        let event = capitalize(event);
        match (modifiers.capture, modifiers.catch) {
            (true, true) => format!("captureCatch{}", event),
            (true, false) => format!("capture{}", event),
            (false, true) => format!("catch{}", event),
            (false, false) => format!("on{}", event),
        }
    }

    fn script_module_import(&self, module: &str, src: &str) -> String {
        format!("<import-sjs name=\"{}\" from=\"{}\"/>", module, src)
    }
}

/// Baidu smart programs: `s-` directives take raw expressions.
pub struct SwanAdapter;

impl PlatformAdapter for SwanAdapter {
    fn platform(&self) -> Platform {
        Platform::Swan
    }
    fn directive_prefix(&self) -> &'static str {
        "s-"
    }
    fn template_extension(&self) -> &'static str {
        ".swan"
    }
    fn script_module_tag(&self) -> &'static str {
        "import-sjs"
    }
    fn script_module_extension(&self) -> &'static str {
        ".sjs"
    }
    fn wraps_directive_values(&self) -> bool {
        false
    }
    fn else_if_name(&self) -> &'static str {
        "elif"
    }
    fn supports_mut_bind(&self) -> bool {
        false
    }
    fn event_attr_name(&self, event: &str, modifiers: EventModifiers) -> String {
        wechat_style_event_attr(event, modifiers, false)
    }
}

static WECHAT: WechatAdapter = WechatAdapter;
static ALIPAY: AlipayAdapter = AlipayAdapter;
static TT: TtAdapter = TtAdapter;
static SWAN: SwanAdapter = SwanAdapter;
static JD: JdAdapter = JdAdapter;
static XHS: XhsAdapter = XhsAdapter;

pub fn get_platform_adapter(platform: Platform) -> &'static dyn PlatformAdapter {
    match platform {
        Platform::Wechat => &WECHAT,
        Platform::Alipay => &ALIPAY,
        Platform::Tt => &TT,
        Platform::Swan => &SWAN,
        Platform::Jd => &JD,
        Platform::Xhs => &XHS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn braces(expr: &str) -> String {
        format!("{{{{{}}}}}", expr)
    }

    #[test]
    fn wechat_event_attrs() {
        let a = get_platform_adapter(Platform::Wechat);
        let m = |catch, capture, mutated| EventModifiers {
            catch,
            capture,
            mutated,
        };
        assert_eq!(a.event_attr_name("tap", m(false, false, false)), "bindtap");
        assert_eq!(a.event_attr_name("tap", m(true, false, false)), "catchtap");
        assert_eq!(a.event_attr_name("tap", m(false, true, false)), "capture-bind:tap");
        assert_eq!(a.event_attr_name("tap", m(true, true, false)), "capture-catch:tap");
        assert_eq!(a.event_attr_name("tap", m(false, false, true)), "mut-bind:tap");
        assert_eq!(
            a.event_attr_name("update:modelValue", m(false, false, false)),
            "bind:update:modelValue"
        );
    }

    #[test]
    fn alipay_event_attrs() {
        let a = get_platform_adapter(Platform::Alipay);
        let catch_capture = EventModifiers {
            catch: true,
            capture: true,
            mutated: false,
        };
        assert_eq!(a.event_attr_name("tap", EventModifiers::default()), "onTap");
        assert_eq!(a.event_attr_name("tap", catch_capture), "captureCatchTap");
        assert!(!a.supports_mut_bind());
    }

    #[test]
    fn click_is_remapped() {
        for p in [Platform::Wechat, Platform::Alipay, Platform::Swan] {
            assert_eq!(get_platform_adapter(p).map_event_name("click"), "tap");
        }
    }

    #[test]
    fn control_flow_attrs() {
        let wx = get_platform_adapter(Platform::Wechat);
        assert_eq!(wx.if_attr("ok", &braces), "wx:if=\"{{ok}}\"");
        assert_eq!(wx.else_if_attr("b", &braces), "wx:elif=\"{{b}}\"");
        assert_eq!(wx.else_attr(), "wx:else");
        assert_eq!(
            wx.for_attrs("list", "item", Some("index"), &braces),
            vec![
                "wx:for=\"{{list}}\"".to_string(),
                "wx:for-item=\"item\"".to_string(),
                "wx:for-index=\"index\"".to_string()
            ]
        );
        let my = get_platform_adapter(Platform::Alipay);
        assert_eq!(my.key_attr("id"), "a:key=\"id\"");
        let swan = get_platform_adapter(Platform::Swan);
        assert_eq!(swan.if_attr("ok", &braces), "s-if=\"ok\"");
    }

    #[test]
    fn script_module_imports() {
        assert_eq!(
            get_platform_adapter(Platform::Wechat).script_module_import("m", "./m.wxs"),
            "<wxs module=\"m\" src=\"./m.wxs\"/>"
        );
        assert_eq!(
            get_platform_adapter(Platform::Alipay).script_module_import("m", "./m.sjs"),
            "<import-sjs name=\"m\" from=\"./m.sjs\"/>"
        );
    }
}

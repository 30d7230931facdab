use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILE OPTIONS
// All fields default so hosts can pass a partial JSON object.
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    #[serde(alias = "weapp")]
    Wechat,
    #[serde(alias = "my")]
    Alipay,
    Tt,
    #[serde(alias = "baidu")]
    Swan,
    Jd,
    Xhs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MustacheInterpolation {
    #[default]
    Compact,
    Spaced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClassStyleRuntime {
    #[default]
    Auto,
    Wxs,
    Js,
}

/// Runtime mode after `auto` has been resolved against the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolvedClassStyleRuntime {
    Wxs,
    Js,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ObjectLiteralBindMode {
    #[default]
    Runtime,
    Inline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScopedSlotsCompiler {
    #[default]
    Auto,
    Augmented,
    Off,
}

impl ScopedSlotsCompiler {
    pub fn enabled(self) -> bool {
        !matches!(self, ScopedSlotsCompiler::Off)
    }
}

/// Origin of a JSON fragment, in fixed merge order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JsonMergeStage {
    JsonBlock,
    AutoUsingComponents,
    ComponentGenerics,
    Defaults,
    Macro,
}

impl JsonMergeStage {
    pub const ORDER: [JsonMergeStage; 5] = [
        JsonMergeStage::JsonBlock,
        JsonMergeStage::AutoUsingComponents,
        JsonMergeStage::ComponentGenerics,
        JsonMergeStage::Defaults,
        JsonMergeStage::Macro,
    ];
}

pub type JsonMergeFn = Arc<dyn Fn(&Value, &Value, JsonMergeStage) -> Value + Send + Sync>;

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonMergeStrategy {
    #[default]
    Deep,
    Assign,
    Replace,
    #[serde(skip)]
    Custom(JsonMergeFn),
}

impl fmt::Debug for JsonMergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonMergeStrategy::Deep => write!(f, "Deep"),
            JsonMergeStrategy::Assign => write!(f, "Assign"),
            JsonMergeStrategy::Replace => write!(f, "Replace"),
            JsonMergeStrategy::Custom(_) => write!(f, "Custom(<fn>)"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JsonDefaults {
    pub app: Value,
    pub page: Value,
    pub component: Value,
}

impl Default for JsonDefaults {
    fn default() -> Self {
        Self {
            app: Value::Object(Default::default()),
            page: Value::Object(Default::default()),
            component: serde_json::json!({ "component": true }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JsonOptions {
    pub defaults: JsonDefaults,
    pub merge_strategy: JsonMergeStrategy,
    pub macro_cache_dir: Option<PathBuf>,
    pub node_binary: Option<PathBuf>,
    pub macro_timeout_ms: u64,
}

impl Default for JsonOptions {
    fn default() -> Self {
        Self {
            defaults: JsonDefaults::default(),
            merge_strategy: JsonMergeStrategy::Deep,
            macro_cache_dir: None,
            node_binary: None,
            macro_timeout_ms: 10_000,
        }
    }
}

pub type WarnFn = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompileOptions {
    pub platform: Platform,
    pub mustache_interpolation: MustacheInterpolation,
    pub class_style_runtime: ClassStyleRuntime,
    pub object_literal_bind_mode: ObjectLiteralBindMode,
    pub scoped_slots_compiler: ScopedSlotsCompiler,
    pub scoped_slots_require_props: bool,
    pub is_app: bool,
    pub is_page: bool,
    pub runtime_module: String,
    pub json: JsonOptions,
    #[serde(skip)]
    pub warn: Option<WarnFn>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            platform: Platform::Wechat,
            mustache_interpolation: MustacheInterpolation::Compact,
            class_style_runtime: ClassStyleRuntime::Auto,
            object_literal_bind_mode: ObjectLiteralBindMode::Runtime,
            scoped_slots_compiler: ScopedSlotsCompiler::Auto,
            scoped_slots_require_props: false,
            is_app: false,
            is_page: false,
            runtime_module: "wevu".to_string(),
            json: JsonOptions::default(),
            warn: None,
        }
    }
}

impl fmt::Debug for CompileOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompileOptions")
            .field("platform", &self.platform)
            .field("mustache_interpolation", &self.mustache_interpolation)
            .field("class_style_runtime", &self.class_style_runtime)
            .field("object_literal_bind_mode", &self.object_literal_bind_mode)
            .field("scoped_slots_compiler", &self.scoped_slots_compiler)
            .field("scoped_slots_require_props", &self.scoped_slots_require_props)
            .field("is_app", &self.is_app)
            .field("is_page", &self.is_page)
            .field("runtime_module", &self.runtime_module)
            .field("json", &self.json)
            .field("warn", &self.warn.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl CompileOptions {
    pub fn for_platform(platform: Platform) -> Self {
        Self {
            platform,
            ..Self::default()
        }
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// The JSON defaults that apply to this file kind.
    pub fn json_defaults(&self) -> &Value {
        if self.is_app {
            &self.json.defaults.app
        } else if self.is_page {
            &self.json.defaults.page
        } else {
            &self.json.defaults.component
        }
    }
}

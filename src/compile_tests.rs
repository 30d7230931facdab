use crate::*;
use std::sync::{Arc, Mutex};

fn run(source: &str, filename: &str) -> CompileResult {
    compile(source, filename, &CompileOptions::default()).unwrap()
}

#[test]
fn options_component_end_to_end() {
    let source = r#"<template>
  <view class="card" :class="{ active: selected }" @tap="select">
    <TIcon :name="icon" />
    {{ title }}
  </view>
</template>

<script>
import TIcon from './t-icon.vue'
export default {
  components: { TIcon },
  data() {
    return { selected: false, icon: 'app', title: 'Hi' }
  },
  methods: {
    select() { this.selected = !this.selected }
  },
}
</script>
"#;
    let result = run(source, "/src/components/card.vue");
    let template = result.template.unwrap();
    let script = result.script.unwrap();
    let config = result.config.unwrap();

    assert!(template.starts_with("<view class=\"card {{__wv_cls_0}}\" bindtap=\"select\">"), "{}", template);
    assert!(template.contains("<t-icon name=\"{{icon}}\""), "{}", template);
    assert!(script.contains("import { createWevuComponent as __wevuCreateComponent, normalizeClass as __wevuNormalizeClass } from 'wevu';"), "{}", script);
    assert!(script.contains("__wv_cls_0() {"), "{}", script);
    assert!(script.contains("__wevuNormalizeClass("), "{}", script);
    assert!(script.contains("this.selected"), "{}", script);
    assert!(!script.contains("t-icon.vue"), "{}", script);
    assert!(script.trim_end().ends_with("__wevuCreateComponent(__wevuOptions);"));

    let config: serde_json::Value = serde_json::from_str(&config).unwrap();
    assert_eq!(config["component"], true);
    assert_eq!(config["usingComponents"]["t-icon"], "./t-icon");
    assert_eq!(result.meta.using_components.len(), 1);
    assert_eq!(result.meta.class_style_bindings.len(), 1);
    assert!(result.warnings.is_empty(), "{:?}", result.warnings);
}

#[test]
fn script_setup_end_to_end() {
    let source = r#"<template>
  <view @tap="count++">{{ label }}: {{ count }}</view>
</template>

<script setup lang="ts">
import { ref, computed } from 'wevu'
const props = defineProps<{ label: string }>()
const count = ref(0)
const unused = computed(() => props.label.length)
</script>

<json>
{ "navigationBarTitleText": "Counter" }
</json>
"#;
    let result = run(source, "counter.vue");
    let script = result.script.unwrap();
    assert!(script.contains("setup(__props, __ctx)"), "{}", script);
    assert!(script.contains("return {"), "{}", script);
    assert!(script.contains("count"), "{}", script);
    assert!(script.contains("__weapp_vite_inline_map"), "{}", script);
    assert!(!script.contains("defineProps"), "{}", script);
    assert!(!script.contains(": string"), "{}", script);
    let template = result.template.unwrap();
    assert!(template.contains("bindtap=\"__weapp_vite_inline\""), "{}", template);
    let config: serde_json::Value = serde_json::from_str(&result.config.unwrap()).unwrap();
    assert_eq!(config["navigationBarTitleText"], "Counter");
    assert_eq!(config["component"], true);
}

#[test]
fn template_only_component_has_script_and_no_config() {
    let result = run("<template><view>static</view></template>", "plain.vue");
    assert_eq!(result.template.as_deref(), Some("<view>static</view>"));
    let script = result.script.unwrap();
    assert!(script.contains("const __wevuOptions = {};"), "{}", script);
    assert!(result.config.is_none());
    assert_eq!(result.meta.template_extension, ".wxml");
}

#[test]
fn app_registers_with_create_app() {
    let options = CompileOptions {
        is_app: true,
        ..Default::default()
    };
    let source = "<script>\nexport default { onLaunch() {} }\n</script>\n<json>\n{ \"pages\": [\"pages/index/index\"] }\n</json>\n";
    let result = compile(source, "app.vue", &options).unwrap();
    let script = result.script.unwrap();
    assert!(script.contains("import { createApp as __wevuCreateApp } from 'wevu';"), "{}", script);
    assert!(script.contains("__wevuCreateApp(__wevuOptions);"), "{}", script);
    assert!(result.template.is_none());
    let config: serde_json::Value = serde_json::from_str(&result.config.unwrap()).unwrap();
    assert_eq!(config["pages"][0], "pages/index/index");
    assert!(config.get("component").is_none());
}

#[test]
fn jsx_component_end_to_end() {
    let source = r#"import { defineComponent } from 'wevu'
import TBadge from './t-badge.vue'

export default defineComponent({
  components: { TBadge },
  data() {
    return { items: [], open: false }
  },
  render() {
    return (
      <view className="list">
        {this.open && <TBadge count={this.items.length} />}
        {this.items.map((item) => <text key={item.id}>{item.name}</text>)}
      </view>
    )
  },
})
"#;
    let result = run(source, "list.jsx");
    let template = result.template.unwrap();
    assert!(template.starts_with("<view class=\"list\">"), "{}", template);
    assert!(template.contains("wx:if=\"{{open}}\""), "{}", template);
    assert!(template.contains("<t-badge count=\"{{items.length}}\""), "{}", template);
    assert!(template.contains("wx:for=\"{{items}}\""), "{}", template);
    let script = result.script.unwrap();
    assert!(!script.contains("render()"), "{}", script);
    assert!(!script.contains("<view"), "{}", script);
    assert_eq!(result.meta.using_components.get("t-badge").map(String::as_str), Some("./t-badge"));
}

#[test]
fn invalid_json_block_is_fatal() {
    let err = compile("<json>\n{ nope }\n</json>\n", "a.vue", &CompileOptions::default()).unwrap_err();
    assert_eq!(err.code, ERR_JSON_BLOCK);
    let err = compile("<json>\n[1, 2]\n</json>\n", "a.vue", &CompileOptions::default()).unwrap_err();
    assert_eq!(err.code, ERR_JSON_BLOCK);
}

#[test]
fn template_parse_errors_are_fatal() {
    let err = compile("<template>\n  <view>\n</template>\n", "broken.vue", &CompileOptions::default()).unwrap_err();
    assert_eq!(err.code, ERR_TEMPLATE_PARSE);
    assert_eq!(err.file, "broken.vue");
}

#[test]
fn script_parse_errors_are_fatal() {
    let err = compile("<script>\nexport default {\n</script>\n", "broken.vue", &CompileOptions::default()).unwrap_err();
    assert_eq!(err.code, ERR_SCRIPT_PARSE);
}

#[test]
fn warnings_are_prefixed_and_forwarded() {
    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let options = CompileOptions {
        warn: Some(Arc::new(move |message: &str| {
            sink.lock().unwrap().push(message.to_string());
        })),
        ..Default::default()
    };
    let result = compile("<template><view v-html=\"raw\"></view></template>", "warn.vue", &options).unwrap();
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].starts_with("[wevu-compiler] warn.vue: "), "{}", result.warnings[0]);
    assert_eq!(*seen.lock().unwrap(), result.warnings);
}

#[test]
fn wxs_helper_is_reported() {
    let result = run("<template><view :class=\"['a', { b: true }]\"></view></template>", "wxs.vue");
    let helper = result.meta.wxs_helper.expect("helper meta");
    assert_eq!(helper.filename, "__weapp_vite_class_style.wxs");
    let template = result.template.unwrap();
    assert!(template.starts_with(&helper.tag), "{}", template);
    assert!(result.meta.class_style_bindings.is_empty());
}

#[test]
fn alipay_uses_sjs_and_axml() {
    let options = CompileOptions::for_platform(Platform::Alipay);
    let result = compile("<template><view :class=\"['a']\"></view></template>", "a.vue", &options).unwrap();
    assert_eq!(result.meta.template_extension, ".axml");
    assert_eq!(
        result.meta.wxs_helper.map(|h| h.filename).as_deref(),
        Some("__weapp_vite_class_style.sjs")
    );
}

#[test]
fn scoped_slot_components_get_their_own_config() {
    let source = r#"<template>
  <t-list :items="rows">
    <template #item="{ row }">
      <TIcon :name="row.icon" />
    </template>
  </t-list>
</template>
<script>
import TIcon from './t-icon.vue'
import TList from './t-list.vue'
export default {}
</script>
"#;
    let result = run(source, "page.vue");
    assert_eq!(result.meta.scoped_slot_components.len(), 1);
    let slot = &result.meta.scoped_slot_components[0];
    let config: serde_json::Value = serde_json::from_str(&slot.config).unwrap();
    assert_eq!(config["component"], true);
    assert_eq!(config["usingComponents"]["t-icon"], "./t-icon");
    assert!(slot.script.contains("__wevuCreateScopedSlotComponent("));
    assert_eq!(result.meta.using_components.get("t-list").map(String::as_str), Some("./t-list"));
}

#[test]
fn batch_compiles_each_file_independently() {
    let inputs = vec![
        CompileInput {
            source: "<template><view :class=\"{ a: x }\"></view></template>".into(),
            filename: "a.vue".into(),
        },
        CompileInput {
            source: "<template><view :class=\"{ b: y }\"></view></template>".into(),
            filename: "b.vue".into(),
        },
    ];
    let results = compile_batch(&inputs, &CompileOptions::default());
    assert_eq!(results.len(), 2);
    for result in results {
        let result = result.unwrap();
        assert_eq!(result.meta.class_style_bindings[0].name, "__wv_cls_0");
    }
}

#[test]
fn options_deserialize_from_json() {
    let options = CompileOptions::from_json(
        r#"{ "platform": "alipay", "mustacheInterpolation": "spaced", "json": { "macroTimeoutMs": 500 } }"#,
    )
    .unwrap();
    let result = compile("<template><text>{{ a }}</text></template>", "a.vue", &options).unwrap();
    assert_eq!(result.template.as_deref(), Some("<text>{{ a }}</text>"));
    assert_eq!(options.json.macro_timeout_ms, 500);
}

//! Deterministic merging of the JSON configuration fragments.

use crate::error::{CompilerError, ERR_JSON_MERGE};
use crate::options::{JsonMergeStage, JsonMergeStrategy};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Fragments contributed by each origin, merged in [`JsonMergeStage::ORDER`].
#[derive(Debug, Clone, Default)]
pub struct JsonSources {
    pub json_block: Option<Value>,
    pub using_components: BTreeMap<String, String>,
    pub component_generics: BTreeMap<String, Value>,
    pub defaults: Option<Value>,
    pub macro_config: Option<Value>,
}

impl JsonSources {
    fn fragment(&self, stage: JsonMergeStage) -> Option<Value> {
        match stage {
            JsonMergeStage::JsonBlock => self.json_block.clone(),
            JsonMergeStage::AutoUsingComponents => {
                if self.using_components.is_empty() {
                    return None;
                }
                let entries: Map<String, Value> = self
                    .using_components
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect();
                Some(wrap("usingComponents", Value::Object(entries)))
            }
            JsonMergeStage::ComponentGenerics => {
                if self.component_generics.is_empty() {
                    return None;
                }
                let entries: Map<String, Value> = self
                    .component_generics
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                Some(wrap("componentGenerics", Value::Object(entries)))
            }
            JsonMergeStage::Defaults => self.defaults.clone(),
            JsonMergeStage::Macro => self.macro_config.clone(),
        }
    }

    /// True when some fragment other than the defaults contributes.
    fn has_content(&self) -> bool {
        self.json_block.is_some()
            || !self.using_components.is_empty()
            || !self.component_generics.is_empty()
            || self.macro_config.is_some()
    }
}

fn wrap(key: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    Value::Object(map)
}

/// Recursively merges `source` into `target`; objects merge key by key,
/// everything else is replaced.
pub fn deep_merge(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, source) => *target = source,
    }
}

/// Fills keys of `target` missing from it with those of `base`, recursively.
fn fill_missing(target: &mut Value, base: Value) {
    let mut merged = base;
    deep_merge(&mut merged, target.take());
    *target = merged;
}

fn merge_stage(
    acc: Value,
    fragment: Value,
    stage: JsonMergeStage,
    strategy: &JsonMergeStrategy,
) -> Result<Value, CompilerError> {
    let mut acc = acc;
    match strategy {
        JsonMergeStrategy::Custom(merge) => {
            let merged = merge(&acc, &fragment, stage);
            if !merged.is_object() {
                return Err(CompilerError::at_file(
                    ERR_JSON_MERGE,
                    &format!("Custom JSON merge returned a non-object at stage {:?}", stage),
                    "",
                ));
            }
            return Ok(merged);
        }
        _ if stage == JsonMergeStage::Defaults => fill_missing(&mut acc, fragment),
        JsonMergeStrategy::Deep => deep_merge(&mut acc, fragment),
        JsonMergeStrategy::Assign => {
            if let (Value::Object(target), Value::Object(source)) = (&mut acc, fragment) {
                target.extend(source);
            }
        }
        JsonMergeStrategy::Replace => acc = fragment,
    }
    Ok(acc)
}

/// Merges every fragment and returns the pretty-printed configuration, or
/// `None` when only the defaults would contribute.
///
/// Stages apply in the fixed order json-block, auto `usingComponents`,
/// `componentGenerics`, defaults, macro. Defaults only fill keys the earlier
/// stages left unset; the macro stage has the last word.
pub fn merge_json_sources(
    sources: &JsonSources,
    strategy: &JsonMergeStrategy,
) -> Result<Option<String>, CompilerError> {
    if !sources.has_content() {
        return Ok(None);
    }
    let mut acc = Value::Object(Map::new());
    for stage in JsonMergeStage::ORDER {
        let Some(fragment) = sources.fragment(stage) else { continue };
        if !fragment.is_object() {
            continue;
        }
        acc = merge_stage(acc, fragment, stage, strategy)?;
        tracing::trace!(?stage, "merged json fragment");
    }
    serde_json::to_string_pretty(&acc)
        .map(Some)
        .map_err(|e| CompilerError::at_file(ERR_JSON_MERGE, &e.to_string(), ""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn sources() -> JsonSources {
        let mut sources = JsonSources {
            json_block: Some(json!({ "navigationBarTitleText": "Home", "window": { "a": 1 } })),
            defaults: Some(json!({ "component": true, "navigationBarTitleText": "Default" })),
            macro_config: Some(json!({ "window": { "b": 2 } })),
            ..Default::default()
        };
        sources.using_components.insert("t-icon".into(), "./t-icon".into());
        sources
    }

    #[test]
    fn deep_merge_follows_stage_order() {
        let out = merge_json_sources(&sources(), &JsonMergeStrategy::Deep).unwrap().unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["navigationBarTitleText"], "Home");
        assert_eq!(value["component"], true);
        assert_eq!(value["window"], json!({ "a": 1, "b": 2 }));
        assert_eq!(value["usingComponents"]["t-icon"], "./t-icon");
    }

    #[test]
    fn assign_replaces_top_level_keys() {
        let out = merge_json_sources(&sources(), &JsonMergeStrategy::Assign).unwrap().unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["window"], json!({ "b": 2 }));
    }

    #[test]
    fn replace_keeps_last_fragment() {
        let out = merge_json_sources(&sources(), &JsonMergeStrategy::Replace).unwrap().unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value, json!({ "window": { "b": 2 } }));
    }

    #[test]
    fn defaults_alone_produce_no_config() {
        let sources = JsonSources {
            defaults: Some(json!({ "component": true })),
            ..Default::default()
        };
        assert_eq!(merge_json_sources(&sources, &JsonMergeStrategy::Deep).unwrap(), None);
    }

    #[test]
    fn merge_output_is_stable() {
        let first = merge_json_sources(&sources(), &JsonMergeStrategy::Deep).unwrap();
        let second = merge_json_sources(&sources(), &JsonMergeStrategy::Deep).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn custom_merge_must_return_object() {
        let strategy = JsonMergeStrategy::Custom(Arc::new(|_: &Value, _: &Value, _: JsonMergeStage| json!([1])));
        let err = merge_json_sources(&sources(), &strategy).unwrap_err();
        assert_eq!(err.code, ERR_JSON_MERGE);

        let strategy = JsonMergeStrategy::Custom(Arc::new(|acc: &Value, fragment: &Value, stage: JsonMergeStage| {
            let mut next = acc.clone();
            if stage != JsonMergeStage::Defaults {
                deep_merge(&mut next, fragment.clone());
            }
            next
        }));
        let out = merge_json_sources(&sources(), &strategy).unwrap().unwrap();
        assert!(!out.contains("\"component\""));
    }
}

//! # wevu compiler
//!
//! Compiles a Vue single-file component (or a JSX render component) into the
//! three artifacts a mini-program page or component is made of:
//!
//! 1. **Template**: WXML (or the platform's dialect) produced from the Vue
//!    template. Expressions the target engine cannot evaluate are moved into
//!    computed properties or inline handler functions on the component.
//! 2. **Script**: the author's module with the generated members injected and
//!    the runtime registration call appended.
//! 3. **Config**: the page/component JSON merged from the `<json>` block,
//!    detected components, scoped-slot generics, defaults and JSON macros.
//!
//! Each `compile` call owns its `TransformContext`; nothing is shared
//! between files except the macro evaluation directory lock and the
//! optional macro result cache.

#[cfg(feature = "napi")]
use napi_derive::napi;

mod class_style;
mod context;
mod directive;
mod element;
mod error;
mod expression;
mod inline;
mod ir;
mod json_macro;
mod json_merge;
mod jsx_lowerer;
mod options;
mod parse;
mod platform;
mod scope;
mod script;
mod sfc;
mod slots;
mod visitor;

#[cfg(test)]
mod compile_tests;

pub use class_style::{BindingKind, ClassStyleBinding, LoopSnapshot};
pub use directive::TemplateRefMeta;
pub use error::*;
pub use expression::{normalize_expression, prefer_js_runtime, NormalizeResult};
pub use inline::InlineExpressionAsset;
pub use json_macro::{clear_json_macro_cache, evaluate_json_macros, extract_json_macros, JsonMacroExtraction};
pub use json_merge::{merge_json_sources, JsonSources};
pub use options::*;
pub use platform::{get_platform_adapter, PlatformAdapter};
pub use slots::ScopedSlotComponentAsset;

use context::TransformContext;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use visitor::{CommentStripper, TemplateVisitor};

// ═══════════════════════════════════════════════════════════════════════════════
// RESULT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WxsHelperMeta {
    pub filename: String,
    pub source: String,
    pub tag: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileMeta {
    pub class_style_runtime: ResolvedClassStyleRuntime,
    pub class_style_bindings: Vec<ClassStyleBinding>,
    pub inline_expressions: Vec<InlineExpressionAsset>,
    pub scoped_slot_components: Vec<ScopedSlotComponentAsset>,
    pub template_refs: Vec<TemplateRefMeta>,
    pub using_components: BTreeMap<String, String>,
    pub component_generics: BTreeMap<String, Value>,
    pub page_features: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_macro: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wxs_helper: Option<WxsHelperMeta>,
    pub template_extension: String,
    pub style_blocks: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,
    pub warnings: Vec<String>,
    pub meta: CompileMeta,
}

/// One file of a batch.
#[derive(Debug, Clone, Deserialize)]
pub struct CompileInput {
    pub source: String,
    pub filename: String,
}

// ═══════════════════════════════════════════════════════════════════════════════
// PIPELINE
// ═══════════════════════════════════════════════════════════════════════════════

/// A script block as the pipeline carries it.
struct ScriptSource {
    code: String,
    line_offset: u32,
}

fn is_jsx_file(filename: &str) -> bool {
    filename.ends_with(".jsx") || filename.ends_with(".tsx")
}

fn is_ts_lang(lang: Option<&str>) -> bool {
    matches!(lang, Some("ts") | Some("tsx"))
}

/// Shifts a block-relative error position into the enclosing file.
fn in_block(mut err: CompilerError, line_offset: u32) -> CompilerError {
    if err.line > 0 {
        err.line += line_offset;
    }
    err
}

fn parse_json_block(content: &str, filename: &str, line_offset: u32) -> Result<Value, CompilerError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    let value: Value = serde_json::from_str(trimmed).map_err(|e| {
        CompilerError::new(
            ERR_JSON_BLOCK,
            &format!("Invalid <json> block: {}", e),
            filename,
            e.line() as u32 + line_offset,
            e.column() as u32,
        )
    })?;
    if !value.is_object() {
        return Err(CompilerError::new(
            ERR_JSON_BLOCK,
            "The <json> block must contain an object",
            filename,
            line_offset + 1,
            1,
        ));
    }
    Ok(value)
}

/// Config of a scoped-slot component, with the components its body renders.
fn slot_config(used: &[String], using: &BTreeMap<String, String>) -> String {
    let mut config = serde_json::json!({ "component": true });
    let entries: serde_json::Map<String, Value> = used
        .iter()
        .filter_map(|tag| using.get(tag).map(|src| (tag.clone(), Value::String(src.clone()))))
        .collect();
    if !entries.is_empty() {
        config["usingComponents"] = Value::Object(entries);
    }
    serde_json::to_string_pretty(&config).unwrap_or_default()
}

/// Compiles one source file.
pub fn compile(source: &str, filename: &str, options: &CompileOptions) -> Result<CompileResult, CompilerError> {
    let mut ctx = TransformContext::new(filename, options);

    // ── split ─────────────────────────────────────────────────────────────
    let mut nodes = None;
    let mut script_block: Option<ScriptSource>;
    let mut setup_block: Option<ScriptSource> = None;
    let mut json_block: Option<Value> = None;
    let mut style_blocks = 0;
    let is_ts;

    if is_jsx_file(filename) {
        is_ts = filename.ends_with(".tsx");
        if let Some(jsx) = jsx_lowerer::lower_jsx_render(source, filename, is_ts)? {
            for warning in jsx.warnings {
                ctx.warn(warning);
            }
            nodes = Some(jsx.nodes);
        }
        script_block = Some(ScriptSource {
            code: source.to_string(),
            line_offset: 0,
        });
    } else {
        let (descriptor, warnings) = sfc::parse_sfc(source, filename)?;
        for warning in warnings {
            ctx.warn(warning);
        }
        tracing::debug!(
            file = %filename,
            template = descriptor.template.is_some(),
            script = descriptor.script.is_some(),
            setup = descriptor.script_setup.is_some(),
            "split sfc"
        );
        is_ts = descriptor
            .script_setup
            .as_ref()
            .or(descriptor.script.as_ref())
            .is_some_and(|block| is_ts_lang(block.lang()));
        if let Some(template) = &descriptor.template {
            nodes = Some(parse::parse_template(&template.content, filename, template.line_offset)?);
        }
        if let Some(json) = &descriptor.json {
            json_block = Some(parse_json_block(&json.content, filename, json.line_offset)?);
        }
        script_block = descriptor.script.map(|b| ScriptSource {
            code: b.content,
            line_offset: b.line_offset,
        });
        setup_block = descriptor.script_setup.map(|b| ScriptSource {
            code: b.content,
            line_offset: b.line_offset,
        });
        style_blocks = descriptor.styles.len();
    }

    // ── template ──────────────────────────────────────────────────────────
    let template = nodes.map(|mut nodes| {
        CommentStripper.visit_children(&mut nodes);
        let body = element::compile_template(&mut ctx, &nodes);
        debug_assert!(ctx.scope.is_balanced(), "scope frames left open after {}", filename);
        if ctx.wxs_helper_used {
            format!("{}{}", class_style::wxs_helper_import(ctx.adapter), body)
        } else {
            body
        }
    });
    tracing::debug!(
        file = %filename,
        bindings = ctx.unit.class_style_bindings.len(),
        inline = ctx.unit.inline_expressions.len(),
        slots = ctx.slot_components.len(),
        "compiled template"
    );

    // ── JSON macros ───────────────────────────────────────────────────────
    let mut extractions = Vec::new();
    for block in [&mut script_block, &mut setup_block].into_iter().flatten() {
        let extraction = json_macro::extract_json_macros(&block.code, is_ts, filename)
            .map_err(|e| in_block(e, block.line_offset))?;
        block.code = extraction.code.clone();
        extractions.push(extraction);
    }
    let macro_name = json_macro::macro_name(&extractions.iter().collect::<Vec<_>>(), filename)?;

    // ── script ────────────────────────────────────────────────────────────
    let module = match (&setup_block, &script_block) {
        (Some(setup), script) => {
            let (module, warnings) = script::desugar_script_setup(
                script::ScriptBlock {
                    content: &setup.code,
                    line_offset: setup.line_offset,
                },
                script.as_ref().map(|s| script::ScriptBlock {
                    content: &s.code,
                    line_offset: s.line_offset,
                }),
                is_ts,
                &ctx.template_identifiers,
                filename,
            )?;
            for warning in warnings {
                ctx.warn(warning);
            }
            Some((module, 0))
        }
        (None, Some(script)) => Some((script.code.clone(), script.line_offset)),
        (None, None) if template.is_some() || options.is_app => Some((String::new(), 0)),
        (None, None) => None,
    };

    let mut all_used = ctx.used_components.clone();
    for asset in &ctx.slot_components {
        for tag in &asset.used_components {
            if !all_used.contains(tag) {
                all_used.push(tag.clone());
            }
        }
    }

    let script_output = match module {
        Some((code, line_offset)) => {
            let sctx = script::ScriptContext {
                options,
                filename,
                unit: &ctx.unit,
                used_components: &all_used,
                strip_render: is_jsx_file(filename) && template.is_some(),
                is_ts,
                line_offset,
            };
            Some(script::transform_script(&code, &sctx)?)
        }
        None => None,
    };
    let (script, using_components, page_features) = match script_output {
        Some(output) => {
            for warning in output.warnings {
                ctx.warn(warning);
            }
            (Some(output.code), output.using_components, output.page_features)
        }
        None => (None, BTreeMap::new(), Vec::new()),
    };

    // ── config ────────────────────────────────────────────────────────────
    let mut macro_config: Option<Value> = None;
    for extraction in &extractions {
        if let Some(value) = json_macro::evaluate_json_macros(extraction, filename, &options.json)? {
            match &mut macro_config {
                Some(existing) => json_merge::deep_merge(existing, value),
                None => macro_config = Some(value),
            }
        }
    }
    let sources = JsonSources {
        json_block,
        using_components: using_components.clone(),
        component_generics: ctx.component_generics.clone(),
        defaults: Some(options.json_defaults().clone()),
        macro_config,
    };
    let config = merge_json_sources(&sources, &options.json.merge_strategy).map_err(|mut e| {
        e.file = filename.to_string();
        e
    })?;
    tracing::debug!(file = %filename, has_config = config.is_some(), "merged json");

    // ── meta ──────────────────────────────────────────────────────────────
    let helper_import = class_style::wxs_helper_import(ctx.adapter);
    let mut slot_components = std::mem::take(&mut ctx.slot_components);
    for asset in &mut slot_components {
        asset.config = slot_config(&asset.used_components, &using_components);
    }
    let wxs_used = ctx.wxs_helper_used || slot_components.iter().any(|a| a.template.starts_with(&helper_import));
    let wxs_helper = wxs_used.then(|| WxsHelperMeta {
        filename: class_style::wxs_helper_filename(ctx.adapter),
        source: class_style::wxs_helper_source(ctx.adapter),
        tag: helper_import.clone(),
    });

    let meta = CompileMeta {
        class_style_runtime: ctx.runtime,
        class_style_bindings: ctx.unit.class_style_bindings,
        inline_expressions: ctx.unit.inline_expressions,
        scoped_slot_components: slot_components,
        template_refs: ctx.unit.template_refs,
        using_components,
        component_generics: ctx.component_generics,
        page_features,
        json_macro: macro_name,
        wxs_helper,
        template_extension: ctx.adapter.template_extension().to_string(),
        style_blocks,
    };
    Ok(CompileResult {
        script,
        template,
        config,
        warnings: ctx.warnings,
        meta,
    })
}

/// Compiles independent files in parallel.
pub fn compile_batch(inputs: &[CompileInput], options: &CompileOptions) -> Vec<Result<CompileResult, CompilerError>> {
    inputs
        .par_iter()
        .map(|input| compile(&input.source, &input.filename, options))
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// NODE BRIDGE
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "napi")]
#[napi]
pub fn compile_native(source: String, filename: String, options_json: Option<String>) -> napi::Result<Value> {
    let options = match options_json {
        Some(text) => CompileOptions::from_json(&text).map_err(|e| napi::Error::from_reason(e.to_string()))?,
        None => CompileOptions::default(),
    };
    let result = compile(&source, &filename, &options).map_err(|e| napi::Error::from_reason(e.to_string()))?;
    serde_json::to_value(result).map_err(|e| napi::Error::from_reason(e.to_string()))
}

use crate::class_style::ClassStyleBinding;
use crate::directive::TemplateRefMeta;
use crate::expression::{rewrite_expression, IdentifierRewriter};
use crate::inline::InlineExpressionAsset;
use crate::options::{
    ClassStyleRuntime, CompileOptions, MustacheInterpolation, ResolvedClassStyleRuntime,
};
use crate::platform::{get_platform_adapter, PlatformAdapter};
use crate::scope::{ForInfo, Resolution, ScopeTracker};
use crate::slots::ScopedSlotComponentAsset;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::{Deref, DerefMut};

pub const WARNING_PREFIX: &str = "[wevu-compiler]";

/// Monotonic per-kind counters. Names are never reused within one compile,
/// including across synthetic slot components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameKind {
    Class,
    Style,
    Bind,
    Inline,
    Item,
    Index,
    Ref,
}

impl NameKind {
    fn prefix(self) -> &'static str {
        match self {
            NameKind::Class => "__wv_cls_",
            NameKind::Style => "__wv_style_",
            NameKind::Bind => "__wv_bind_",
            NameKind::Inline => "__wv_inline_",
            NameKind::Item => "__wv_item_",
            NameKind::Index => "__wv_index_",
            NameKind::Ref => "__wv-ref-",
        }
    }
}

/// Everything a template compiles into that the script side must consume.
/// Synthetic scoped-slot components get a unit of their own.
#[derive(Debug, Default)]
pub struct CompileUnit {
    pub class_style_bindings: Vec<ClassStyleBinding>,
    pub inline_expressions: Vec<InlineExpressionAsset>,
    pub template_refs: Vec<TemplateRefMeta>,
}

/// Per-compile state threaded by `&mut` through the template walk.
pub struct TransformContext<'o> {
    pub options: &'o CompileOptions,
    pub adapter: &'static dyn PlatformAdapter,
    pub filename: String,
    /// File name without directory or extension; prefixes synthetic
    /// component names.
    pub stem: String,
    pub runtime: ResolvedClassStyleRuntime,
    pub scope: ScopeTracker,
    pub warnings: Vec<String>,
    pub unit: CompileUnit,
    pub slot_components: Vec<ScopedSlotComponentAsset>,
    /// Component tags referenced by the template, in first-use order.
    pub used_components: Vec<String>,
    pub component_generics: BTreeMap<String, serde_json::Value>,
    /// Instance members referenced from template expressions.
    pub template_identifiers: BTreeSet<String>,
    pub wxs_helper_used: bool,
    counters: HashMap<NameKind, usize>,
    slot_counters: HashMap<String, usize>,
}

pub fn resolve_class_style_runtime(
    requested: ClassStyleRuntime,
    adapter: &dyn PlatformAdapter,
) -> ResolvedClassStyleRuntime {
    match requested {
        ClassStyleRuntime::Js => ResolvedClassStyleRuntime::Js,
        ClassStyleRuntime::Wxs => ResolvedClassStyleRuntime::Wxs,
        ClassStyleRuntime::Auto => {
            if adapter.script_module_tag().is_empty() {
                ResolvedClassStyleRuntime::Js
            } else {
                ResolvedClassStyleRuntime::Wxs
            }
        }
    }
}

pub fn file_stem(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    match base.find('.') {
        Some(0) | None => base.to_string(),
        Some(dot) => base[..dot].to_string(),
    }
}

impl<'o> TransformContext<'o> {
    pub fn new(filename: &str, options: &'o CompileOptions) -> Self {
        let adapter = get_platform_adapter(options.platform);
        Self {
            options,
            adapter,
            filename: filename.to_string(),
            stem: file_stem(filename),
            runtime: resolve_class_style_runtime(options.class_style_runtime, adapter),
            scope: ScopeTracker::new(),
            warnings: Vec::new(),
            unit: CompileUnit::default(),
            slot_components: Vec::new(),
            used_components: Vec::new(),
            component_generics: BTreeMap::new(),
            template_identifiers: BTreeSet::new(),
            wxs_helper_used: false,
            counters: HashMap::new(),
            slot_counters: HashMap::new(),
        }
    }

    // ── diagnostics ───────────────────────────────────────────────────────

    pub fn format_warning(filename: &str, message: &str) -> String {
        format!("{} {}: {}", WARNING_PREFIX, filename, message)
    }

    pub fn warn(&mut self, message: impl AsRef<str>) {
        let text = Self::format_warning(&self.filename, message.as_ref());
        tracing::warn!(file = %self.filename, "{}", message.as_ref());
        if let Some(callback) = &self.options.warn {
            callback(&text);
        }
        self.warnings.push(text);
    }

    // ── naming ────────────────────────────────────────────────────────────

    pub fn next_name(&mut self, kind: NameKind) -> String {
        let counter = self.counters.entry(kind).or_insert(0);
        let name = format!("{}{}", kind.prefix(), counter);
        *counter += 1;
        name
    }

    pub fn next_index(&mut self, kind: NameKind) -> usize {
        let counter = self.counters.entry(kind).or_insert(0);
        let n = *counter;
        *counter += 1;
        n
    }

    pub fn next_slot_component_name(&mut self, key: &str) -> String {
        let counter = self.slot_counters.entry(key.to_string()).or_insert(0);
        let name = format!("{}-scoped-slot-{}-{}", self.stem, key, counter);
        *counter += 1;
        name
    }

    pub fn note_component(&mut self, tag: &str) {
        if !self.used_components.iter().any(|t| t == tag) {
            self.used_components.push(tag.to_string());
        }
    }

    // ── scoped helpers ────────────────────────────────────────────────────

    /// Runs `f` with a fresh [`CompileUnit`], returning what it collected.
    pub fn with_isolated_unit<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> (R, CompileUnit) {
        let saved = std::mem::take(&mut self.unit);
        let mut guard = ScopeGuard::enter(self, OpenFrame::Unit(saved));
        let result = f(&mut *guard);
        match guard.close() {
            Some(ClosedFrame::Unit(unit)) => (result, unit),
            _ => (result, CompileUnit::default()),
        }
    }

    /// Runs `f` inside a `v-for`; returns the loop info as left by the body
    /// (it records whether a generated index alias was needed).
    pub fn with_for<R>(
        &mut self,
        info: ForInfo,
        names: Vec<(String, String)>,
        f: impl FnOnce(&mut Self) -> R,
    ) -> (R, Option<ForInfo>) {
        self.scope.push_for(info, names);
        let mut guard = ScopeGuard::enter(self, OpenFrame::For);
        let result = f(&mut *guard);
        match guard.close() {
            Some(ClosedFrame::For(info)) => (result, info),
            _ => (result, None),
        }
    }

    /// Runs `f` inside a synthetic slot component; also returns the host
    /// locals the body captured.
    pub fn with_slot_props<R>(
        &mut self,
        props: Vec<(String, String)>,
        f: impl FnOnce(&mut Self) -> R,
    ) -> (R, Vec<String>) {
        self.scope.push_slot_props(props);
        let mut guard = ScopeGuard::enter(self, OpenFrame::SlotProps);
        let result = f(&mut *guard);
        match guard.close() {
            Some(ClosedFrame::SlotProps(captured)) => (result, captured),
            _ => (result, Vec::new()),
        }
    }

    fn close_frame(&mut self, frame: OpenFrame) -> ClosedFrame {
        match frame {
            OpenFrame::For => ClosedFrame::For(self.scope.pop_for()),
            OpenFrame::SlotProps => ClosedFrame::SlotProps(self.scope.pop_slot_props()),
            OpenFrame::Unit(saved) => ClosedFrame::Unit(std::mem::replace(&mut self.unit, saved)),
        }
    }

    // ── expression printing ───────────────────────────────────────────────

    pub fn mustache(&self, expr: &str) -> String {
        mustache_with(self.options.mustache_interpolation, expr)
    }

    /// Template-side rendering: loop aliases resolved, `?.`/`??`/templates
    /// lowered. Parse failures warn and keep the raw text.
    pub fn template_expr(&mut self, expr: &str) -> String {
        let mut rewriter = TemplateRewriter {
            scope: &mut self.scope,
            identifiers: &mut self.template_identifiers,
        };
        match rewrite_expression(expr, &mut rewriter) {
            Ok((code, warnings)) => {
                for w in warnings {
                    self.warn(w);
                }
                code
            }
            Err(message) => {
                self.warn(format!("Failed to parse expression `{}`: {}", expr.trim(), message));
                expr.trim().to_string()
            }
        }
    }

    /// Script-side rendering for computed bindings evaluated on `this`.
    pub fn script_expr(&mut self, expr: &str) -> Result<String, String> {
        let mut rewriter = ScriptRewriter {
            scope: &mut self.scope,
            identifiers: &mut self.template_identifiers,
        };
        let (code, warnings) = rewrite_expression(expr, &mut rewriter)?;
        for w in warnings {
            self.warn(w);
        }
        Ok(code)
    }
}

pub fn mustache_with(mode: MustacheInterpolation, expr: &str) -> String {
    match mode {
        MustacheInterpolation::Spaced => format!("{{{{ {} }}}}", expr),
        MustacheInterpolation::Compact => {
            if expr.starts_with('{') || expr.ends_with('}') {
                format!("{{{{ {} }}}}", expr)
            } else {
                format!("{{{{{}}}}}", expr)
            }
        }
    }
}

struct TemplateRewriter<'c> {
    scope: &'c mut ScopeTracker,
    identifiers: &'c mut BTreeSet<String>,
}

impl IdentifierRewriter for TemplateRewriter<'_> {
    fn identifier(&mut self, name: &str) -> Option<String> {
        match self.scope.resolve(name) {
            Resolution::Local(text) | Resolution::SlotProp(text) | Resolution::HostLocal(text) => {
                if text == name {
                    None
                } else {
                    Some(text)
                }
            }
            Resolution::Instance { in_slot: true } => {
                self.identifiers.insert(name.to_string());
                Some(format!("__wvOwner.{}", name))
            }
            Resolution::Instance { in_slot: false } => {
                self.identifiers.insert(name.to_string());
                None
            }
            Resolution::Global => None,
        }
    }
}

struct ScriptRewriter<'c> {
    scope: &'c mut ScopeTracker,
    identifiers: &'c mut BTreeSet<String>,
}

impl IdentifierRewriter for ScriptRewriter<'_> {
    fn identifier(&mut self, name: &str) -> Option<String> {
        match self.scope.resolve(name) {
            Resolution::Local(text) => {
                if text == name {
                    None
                } else {
                    Some(text)
                }
            }
            Resolution::SlotProp(text) | Resolution::HostLocal(text) => Some(format!("this.{}", text)),
            Resolution::Instance { in_slot } => {
                self.identifiers.insert(name.to_string());
                if in_slot {
                    Some(format!("this.__wvOwner.{}", name))
                } else {
                    Some(format!("this.{}", name))
                }
            }
            Resolution::Global => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCOPE GUARD
// Pops what the scoped helpers pushed, also when the body unwinds.
// ═══════════════════════════════════════════════════════════════════════════════

enum OpenFrame {
    For,
    SlotProps,
    Unit(CompileUnit),
}

enum ClosedFrame {
    For(Option<ForInfo>),
    SlotProps(Vec<String>),
    Unit(CompileUnit),
}

struct ScopeGuard<'c, 'o> {
    ctx: &'c mut TransformContext<'o>,
    frame: Option<OpenFrame>,
}

impl<'c, 'o> ScopeGuard<'c, 'o> {
    fn enter(ctx: &'c mut TransformContext<'o>, frame: OpenFrame) -> Self {
        Self {
            ctx,
            frame: Some(frame),
        }
    }

    fn close(mut self) -> Option<ClosedFrame> {
        let frame = self.frame.take()?;
        Some(self.ctx.close_frame(frame))
    }
}

impl<'o> Deref for ScopeGuard<'_, 'o> {
    type Target = TransformContext<'o>;

    fn deref(&self) -> &Self::Target {
        self.ctx
    }
}

impl DerefMut for ScopeGuard<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.ctx
    }
}

impl Drop for ScopeGuard<'_, '_> {
    fn drop(&mut self) {
        if let Some(frame) = self.frame.take() {
            self.ctx.close_frame(frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Platform;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::{Arc, Mutex};

    #[test]
    fn counters_are_per_kind_and_monotonic() {
        let options = CompileOptions::default();
        let mut ctx = TransformContext::new("pages/index/index.vue", &options);
        assert_eq!(ctx.next_name(NameKind::Class), "__wv_cls_0");
        assert_eq!(ctx.next_name(NameKind::Class), "__wv_cls_1");
        assert_eq!(ctx.next_name(NameKind::Inline), "__wv_inline_0");
        assert_eq!(ctx.stem, "index");
        assert_eq!(ctx.next_slot_component_name("item"), "index-scoped-slot-item-0");
    }

    #[test]
    fn warnings_are_prefixed_and_forwarded() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut options = CompileOptions::for_platform(Platform::Alipay);
        options.warn = Some(Arc::new(move |w: &str| sink.lock().unwrap().push(w.to_string())));
        let mut ctx = TransformContext::new("a.vue", &options);
        ctx.warn("first");
        ctx.warn("second");
        assert_eq!(ctx.warnings[0], "[wevu-compiler] a.vue: first");
        assert_eq!(seen.lock().unwrap().as_slice(), ctx.warnings.as_slice());
    }

    #[test]
    fn template_and_script_rendering() {
        let options = CompileOptions::default();
        let mut ctx = TransformContext::new("a.vue", &options);
        ctx.scope.push_for(
            ForInfo::new("this.list".into(), "__wv_item_0".into(), 0),
            vec![("id".into(), "__wv_item_0.id".into())],
        );
        assert_eq!(ctx.template_expr("id + offset"), "__wv_item_0.id+offset");
        assert_eq!(ctx.script_expr("id + offset").unwrap(), "__wv_item_0.id+this.offset");
        ctx.scope.pop_for();
        assert!(ctx.template_identifiers.contains("offset"));
        assert!(ctx.scope.is_balanced());
    }

    #[test]
    fn loop_frame_is_popped_when_the_body_panics() {
        let options = CompileOptions::default();
        let mut ctx = TransformContext::new("a.vue", &options);
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            ctx.with_for(
                ForInfo::new("this.list".into(), "item".into(), 0),
                vec![("item".into(), "item".into())],
                |ctx| {
                    if ctx.scope.for_depth() == 1 {
                        panic!("boom");
                    }
                    0
                },
            )
        }));
        assert!(outcome.is_err());
        assert!(ctx.scope.is_balanced());
    }

    #[test]
    fn slot_frame_and_unit_are_restored_when_the_body_panics() {
        let options = CompileOptions::default();
        let mut ctx = TransformContext::new("a.vue", &options);
        let host = ctx.next_name(NameKind::Class);
        ctx.unit.class_style_bindings.push(ClassStyleBinding {
            name: host.clone(),
            kind: crate::class_style::BindingKind::Class,
            source_expr: "{ on: ok }".into(),
            script_expr: "{ on: this.ok }".into(),
            for_stack: Vec::new(),
        });
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            ctx.with_isolated_unit(|ctx| {
                ctx.with_slot_props(vec![("row".into(), "__wvSlotProps.row".into())], |ctx| {
                    assert!(ctx.unit.class_style_bindings.is_empty());
                    panic!("boom");
                })
            })
        }));
        assert!(outcome.is_err());
        assert!(ctx.scope.is_balanced());
        assert_eq!(ctx.unit.class_style_bindings.len(), 1);
        assert_eq!(ctx.unit.class_style_bindings[0].name, host);
    }

    #[test]
    fn scoped_helpers_hand_back_what_the_body_left() {
        let options = CompileOptions::default();
        let mut ctx = TransformContext::new("a.vue", &options);
        let ((index, info), unit) = ctx.with_isolated_unit(|ctx| {
            ctx.with_for(ForInfo::new("this.list".into(), "item".into(), 3), vec![], |ctx| {
                ctx.unit.inline_expressions.push(InlineExpressionAsset {
                    id: "__wv_inline_0".into(),
                    expression: "go(item)".into(),
                    body: "return ctx.go(scope.item);".into(),
                    scope_keys: vec!["item".into()],
                });
                ctx.scope.loop_index_vars()
            })
        });
        assert_eq!(index, vec!["__wv_index_3".to_string()]);
        assert!(info.is_some());
        assert_eq!(unit.inline_expressions.len(), 1);
        assert!(ctx.unit.inline_expressions.is_empty());
        assert!(ctx.scope.is_balanced());
    }

    #[test]
    fn compact_mustache_pads_object_literals() {
        assert_eq!(mustache_with(MustacheInterpolation::Compact, "a"), "{{a}}");
        assert_eq!(mustache_with(MustacheInterpolation::Compact, "{a:1}"), "{{ {a:1} }}");
        assert_eq!(mustache_with(MustacheInterpolation::Spaced, "a"), "{{ a }}");
    }

    #[test]
    fn auto_runtime_resolves_to_wxs() {
        for p in [Platform::Wechat, Platform::Alipay, Platform::Swan] {
            assert_eq!(
                resolve_class_style_runtime(ClassStyleRuntime::Auto, get_platform_adapter(p)),
                ResolvedClassStyleRuntime::Wxs
            );
        }
    }
}

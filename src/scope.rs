use crate::expression::{parse_expression, quote_string};
use oxc_allocator::Allocator;
use oxc_ast::ast::{BindingPattern, Expression, PropertyKey};
use std::collections::{HashMap, HashSet};

lazy_static::lazy_static! {
    /// Names never rewritten to instance or scope access.
    pub static ref AMBIENT_GLOBALS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        // Mini-program host APIs
        s.insert("wx");
        s.insert("my");
        s.insert("tt");
        s.insert("swan");
        s.insert("jd");
        s.insert("xhs");
        s.insert("getApp");
        s.insert("getCurrentPages");

        // Standard JS Globals
        s.insert("Math");
        s.insert("Date");
        s.insert("JSON");
        s.insert("Number");
        s.insert("String");
        s.insert("Boolean");
        s.insert("Object");
        s.insert("Array");
        s.insert("RegExp");
        s.insert("Promise");
        s.insert("Map");
        s.insert("Set");
        s.insert("Symbol");
        s.insert("Error");
        s.insert("console");
        s.insert("parseInt");
        s.insert("parseFloat");
        s.insert("isNaN");
        s.insert("isFinite");
        s.insert("encodeURIComponent");
        s.insert("decodeURIComponent");
        s.insert("undefined");
        s.insert("NaN");
        s.insert("Infinity");

        // Event payload inside handlers
        s.insert("$event");
        s
    };
}

/// Where a free identifier in a template expression comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Loop variable visible to the template; carries the printed text
    /// (`item`, or `__wv_item_0.id` for a destructured alias).
    Local(String),
    /// Prop received by a synthetic scoped-slot component (`__wvSlotProps.x`).
    SlotProp(String),
    /// Host-side local captured into a synthetic scoped-slot component.
    HostLocal(String),
    /// Component instance member. `in_slot` when read from a slot component,
    /// where the member lives on the owner.
    Instance { in_slot: bool },
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Scope,
    SlotProps,
}

#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    names: HashMap<String, String>,
    captured: Vec<String>,
}

/// One active `v-for`.
#[derive(Debug, Clone)]
pub struct ForInfo {
    /// List expression rewritten for script-side evaluation.
    pub list_script: String,
    /// Template item variable (`item`, or `__wv_item_N` for patterns).
    pub item: String,
    /// Second alias (index for arrays, key for objects).
    pub key: Option<String>,
    /// Third alias of the object form.
    pub index: Option<String>,
    generated_index: String,
    index_required: bool,
}

impl ForInfo {
    pub fn new(list_script: String, item: String, depth_id: usize) -> Self {
        Self {
            list_script,
            item,
            key: None,
            index: None,
            generated_index: format!("__wv_index_{}", depth_id),
            index_required: false,
        }
    }

    /// Template index variable, allocating the generated alias on first use.
    pub fn index_var(&mut self) -> String {
        match &self.key {
            Some(key) => key.clone(),
            None => {
                self.index_required = true;
                self.generated_index.clone()
            }
        }
    }

    /// `for-index` attribute value, if one must be emitted.
    pub fn for_index_attr(&self) -> Option<&str> {
        match &self.key {
            Some(key) => Some(key),
            None if self.index_required => Some(&self.generated_index),
            None => None,
        }
    }

    /// Parameter names for the script-side walk callback `(item, key, index)`.
    pub fn walk_params(&self) -> (String, String, String) {
        let key = self
            .key
            .clone()
            .unwrap_or_else(|| self.generated_index.clone());
        let index = self
            .index
            .clone()
            .unwrap_or_else(|| format!("{}_i", self.generated_index));
        (self.item.clone(), key, index)
    }
}

/// Lexical scopes introduced by `v-for`, `v-slot` and scoped-slot props.
///
/// Frames are pushed and popped in strict LIFO order around the compilation
/// of a subtree. A slot-props frame is a barrier: locals found below it
/// belong to the host and are captured instead of read directly.
#[derive(Debug, Default)]
pub struct ScopeTracker {
    frames: Vec<Frame>,
    for_stack: Vec<ForInfo>,
    hidden_fors: Vec<Vec<ForInfo>>,
}

impl ScopeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a plain scope: `names` maps each local to its template text.
    pub fn push_scope(&mut self, names: Vec<(String, String)>) {
        self.frames.push(Frame {
            kind: FrameKind::Scope,
            names: names.into_iter().collect(),
            captured: Vec::new(),
        });
    }

    pub fn pop_scope(&mut self) {
        if let Some(frame) = self.frames.pop() {
            debug_assert_eq!(frame.kind, FrameKind::Scope);
        }
    }

    pub fn push_for(&mut self, info: ForInfo, names: Vec<(String, String)>) {
        self.push_scope(names);
        self.for_stack.push(info);
    }

    pub fn pop_for(&mut self) -> Option<ForInfo> {
        self.pop_scope();
        self.for_stack.pop()
    }

    /// Enters a synthetic slot component. Host loops are hidden until the
    /// matching [`ScopeTracker::pop_slot_props`].
    pub fn push_slot_props(&mut self, props: Vec<(String, String)>) {
        self.frames.push(Frame {
            kind: FrameKind::SlotProps,
            names: props.into_iter().collect(),
            captured: Vec::new(),
        });
        self.hidden_fors.push(std::mem::take(&mut self.for_stack));
    }

    /// Leaves the slot component, returning the host locals it captured in
    /// first-use order.
    pub fn pop_slot_props(&mut self) -> Vec<String> {
        if let Some(hidden) = self.hidden_fors.pop() {
            self.for_stack = hidden;
        }
        match self.frames.pop() {
            Some(frame) => {
                debug_assert_eq!(frame.kind, FrameKind::SlotProps);
                frame.captured
            }
            None => Vec::new(),
        }
    }

    pub fn is_balanced(&self) -> bool {
        self.frames.is_empty() && self.for_stack.is_empty() && self.hidden_fors.is_empty()
    }

    pub fn for_depth(&self) -> usize {
        self.for_stack.len()
    }

    pub fn for_stack(&self) -> &[ForInfo] {
        &self.for_stack
    }

    pub fn current_for(&self) -> Option<&ForInfo> {
        self.for_stack.last()
    }

    /// Index variables of every enclosing loop, outermost first.
    pub fn loop_index_vars(&mut self) -> Vec<String> {
        self.for_stack.iter_mut().map(|f| f.index_var()).collect()
    }

    pub fn resolve(&mut self, name: &str) -> Resolution {
        let mut barrier: Option<usize> = None;
        for i in (0..self.frames.len()).rev() {
            let frame = &self.frames[i];
            if let Some(text) = frame.names.get(name) {
                if let Some(b) = barrier {
                    let captured = &mut self.frames[b].captured;
                    if !captured.iter().any(|c| c == name) {
                        captured.push(name.to_string());
                    }
                    return Resolution::HostLocal(format!("__wvSlotScope.{}", name));
                }
                return match frame.kind {
                    FrameKind::Scope => Resolution::Local(text.clone()),
                    FrameKind::SlotProps => Resolution::SlotProp(text.clone()),
                };
            }
            if frame.kind == FrameKind::SlotProps && barrier.is_none() {
                barrier = Some(i);
            }
        }
        if AMBIENT_GLOBALS.contains(name) {
            Resolution::Global
        } else {
            Resolution::Instance {
                in_slot: barrier.is_some(),
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DESTRUCTURING
// `v-for="{ id, meta: [first] } in list"` binds `id` → `base.id`,
// `first` → `base.meta[0]`.
// ═══════════════════════════════════════════════════════════════════════════════

/// Maps every name bound by `pattern` to an access path rooted at `base`.
/// Defaults and rest elements are not representable and are reported back.
pub fn destructure_alias(pattern: &str, base: &str) -> Result<(Vec<(String, String)>, Vec<String>), String> {
    let allocator = Allocator::default();
    let wrapped = format!("({}) => 0", pattern.trim());
    let wrapped = allocator.alloc_str(&wrapped);
    let expr = parse_expression(&allocator, wrapped)?;
    let Expression::ArrowFunctionExpression(arrow) = expr.without_parentheses() else {
        return Err(format!("`{}` is not a binding pattern", pattern));
    };
    let Some(param) = arrow.params.items.first() else {
        return Err(format!("`{}` is not a binding pattern", pattern));
    };
    let mut names = Vec::new();
    let mut warnings = Vec::new();
    collect_pattern(&param.pattern, base.to_string(), &mut names, &mut warnings);
    Ok((names, warnings))
}

fn collect_pattern(
    pattern: &BindingPattern<'_>,
    path: String,
    out: &mut Vec<(String, String)>,
    warnings: &mut Vec<String>,
) {
    match pattern {
        BindingPattern::BindingIdentifier(id) => out.push((id.name.to_string(), path)),
        BindingPattern::ObjectPattern(obj) => {
            for prop in &obj.properties {
                let access = match (&prop.key, prop.computed) {
                    (PropertyKey::StaticIdentifier(id), false) => format!("{}.{}", path, id.name),
                    (PropertyKey::StringLiteral(s), _) => {
                        format!("{}[{}]", path, quote_string(&s.value))
                    }
                    (PropertyKey::NumericLiteral(n), _) => format!("{}[{}]", path, n.value),
                    _ => {
                        warnings.push("Computed keys in v-for destructuring are not supported".to_string());
                        continue;
                    }
                };
                collect_pattern(&prop.value, access, out, warnings);
            }
            if obj.rest.is_some() {
                warnings.push("Rest elements in v-for destructuring are not supported".to_string());
            }
        }
        BindingPattern::ArrayPattern(arr) => {
            for (i, el) in arr.elements.iter().enumerate() {
                if let Some(el) = el {
                    collect_pattern(el, format!("{}[{}]", path, i), out, warnings);
                }
            }
            if arr.rest.is_some() {
                warnings.push("Rest elements in v-for destructuring are not supported".to_string());
            }
        }
        BindingPattern::AssignmentPattern(assign) => {
            warnings.push("Default values in v-for destructuring are ignored".to_string());
            collect_pattern(&assign.left, path, out, warnings);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_locals_shadow_instance() {
        let mut scope = ScopeTracker::new();
        assert_eq!(scope.resolve("item"), Resolution::Instance { in_slot: false });
        scope.push_for(
            ForInfo::new("this.list".into(), "item".into(), 0),
            vec![("item".into(), "item".into())],
        );
        assert_eq!(scope.resolve("item"), Resolution::Local("item".into()));
        assert_eq!(scope.resolve("Math"), Resolution::Global);
        scope.pop_for();
        assert!(scope.is_balanced());
    }

    #[test]
    fn slot_barrier_captures_host_locals() {
        let mut scope = ScopeTracker::new();
        scope.push_scope(vec![("row".into(), "row".into())]);
        scope.push_slot_props(vec![("item".into(), "__wvSlotProps.item".into())]);
        assert_eq!(scope.resolve("item"), Resolution::SlotProp("__wvSlotProps.item".into()));
        assert_eq!(scope.resolve("row"), Resolution::HostLocal("__wvSlotScope.row".into()));
        assert_eq!(scope.resolve("title"), Resolution::Instance { in_slot: true });
        scope.resolve("row");
        assert_eq!(scope.pop_slot_props(), vec!["row".to_string()]);
        scope.pop_scope();
        assert!(scope.is_balanced());
    }

    #[test]
    fn slot_component_hides_host_loops() {
        let mut scope = ScopeTracker::new();
        scope.push_for(
            ForInfo::new("this.list".into(), "item".into(), 0),
            vec![("item".into(), "item".into())],
        );
        scope.push_slot_props(vec![]);
        assert_eq!(scope.for_depth(), 0);
        scope.pop_slot_props();
        assert_eq!(scope.for_depth(), 1);
        scope.pop_for();
    }

    #[test]
    fn generated_index_only_when_requested() {
        let mut info = ForInfo::new("this.list".into(), "item".into(), 2);
        assert_eq!(info.for_index_attr(), None);
        assert_eq!(info.index_var(), "__wv_index_2");
        assert_eq!(info.for_index_attr(), Some("__wv_index_2"));
        info.key = Some("i".into());
        assert_eq!(info.index_var(), "i");
    }

    #[test]
    fn destructuring_paths() {
        let (names, warnings) = destructure_alias("{ id, meta: [first, , third] }", "__wv_item_0").unwrap();
        assert!(warnings.is_empty());
        assert_eq!(
            names,
            vec![
                ("id".to_string(), "__wv_item_0.id".to_string()),
                ("first".to_string(), "__wv_item_0.meta[0]".to_string()),
                ("third".to_string(), "__wv_item_0.meta[2]".to_string()),
            ]
        );
        let (names, _) = destructure_alias("[key, value]", "__wv_item_1").unwrap();
        assert_eq!(names[1], ("value".to_string(), "__wv_item_1[1]".to_string()));
        let (_, warnings) = destructure_alias("{ a = 1, ...rest }", "x").unwrap();
        assert_eq!(warnings.len(), 2);
    }
}

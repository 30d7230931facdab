//! Script transformation.
//!
//! The component script is edited as text: oxc locates the options object
//! and the imports, and every change is a span replacement so the author's
//! code survives byte-for-byte outside the edited ranges. TypeScript is
//! stripped at the very end.

use crate::class_style::{BindingKind, ClassStyleBinding};
use crate::context::CompileUnit;
use crate::directive::TemplateRefMeta;
use crate::element::kebab_case;
use crate::error::{line_col, CompilerError, ERR_SCRIPT_PARSE};
use crate::expression::{apply_replacements, quote_string, BindingNames};
use crate::inline::InlineExpressionAsset;
use crate::json_macro::JSON_MACROS;
use crate::options::CompileOptions;
use oxc_allocator::Allocator;
use oxc_ast::ast::*;
use oxc_ast_visit::Visit;
use oxc_codegen::Codegen;
use oxc_parser::Parser;
use oxc_semantic::SemanticBuilder;
use oxc_span::{GetSpan, SourceType, Span};
use oxc_transformer::{TransformOptions, Transformer};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;

pub const CREATE_COMPONENT: &str = "createWevuComponent";
pub const CREATE_APP: &str = "createApp";
pub const CREATE_SCOPED_SLOT: &str = "createWevuScopedSlotComponent";
pub const INLINE_MAP: &str = "__weapp_vite_inline_map";
pub const TEMPLATE_REFS: &str = "__wevuTemplateRefs";
pub const OPTIONS_VAR: &str = "__wevuOptions";

/// Compile-time macros of `<script setup>`; their imports never reach the
/// output.
const SETUP_MACROS: &[&str] = &[
    "defineProps",
    "defineEmits",
    "defineExpose",
    "defineOptions",
    "defineSlots",
    "defineModel",
    "withDefaults",
];

/// Page lifecycle hooks that need the native handler declared up front.
const PAGE_HOOKS: &[(&str, &str)] = &[
    ("onPageScroll", "enableOnPageScroll"),
    ("onPullDownRefresh", "enableOnPullDownRefresh"),
    ("onReachBottom", "enableOnReachBottom"),
    ("onShareAppMessage", "enableOnShareAppMessage"),
    ("onShareTimeline", "enableOnShareTimeline"),
    ("onAddToFavorites", "enableOnAddToFavorites"),
    ("onTabItemTap", "enableOnTabItemTap"),
    ("onResize", "enableOnResize"),
    ("onSaveExitState", "enableOnSaveExitState"),
];

pub fn script_source_type(is_ts: bool) -> SourceType {
    SourceType::mjs().with_typescript(is_ts).with_jsx(true)
}

fn text(source: &str, span: Span) -> &str {
    &source[span.start as usize..span.end as usize]
}

fn parse_failure(source: &str, filename: &str, line_offset: u32, message: String) -> CompilerError {
    let (line, column) = line_col(source, 0);
    CompilerError::new(ERR_SCRIPT_PARSE, &message, filename, line + line_offset, column)
        .hint("The script block must be valid JavaScript or TypeScript")
}

/// Strips TypeScript syntax, returning plain JavaScript.
pub fn strip_typescript(source: &str, filename: &str) -> Result<String, String> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, script_source_type(true)).parse();
    if let Some(err) = ret.errors.first() {
        return Err(err.to_string());
    }
    let mut program = ret.program;
    let scoping = SemanticBuilder::new().build(&program).semantic.into_scoping();
    let options = TransformOptions::default();
    let ret = Transformer::new(&allocator, Path::new(filename), &options)
        .build_with_scoping(scoping, &mut program);
    if let Some(err) = ret.errors.first() {
        return Err(err.to_string());
    }
    Ok(Codegen::new().build(&program).code)
}

/// Extends a removal range over a directly following comma and newline.
fn removal_end(source: &str, end: u32) -> u32 {
    let rest = &source[end as usize..];
    let trimmed = rest.trim_start_matches([' ', '\t']);
    let mut consumed = rest.len() - trimmed.len();
    if trimmed.starts_with(',') {
        consumed += 1;
    }
    let after = &rest[consumed..];
    if after.starts_with('\n') {
        consumed += 1;
    } else if after.starts_with("\r\n") {
        consumed += 2;
    }
    end + consumed as u32
}

// ═══════════════════════════════════════════════════════════════════════════════
// GENERATED MEMBERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Code synthesized from one template's bindings.
#[derive(Debug, Default)]
struct Generated {
    computed: Vec<String>,
    inline_map: Option<String>,
    refs: Option<String>,
    uses_walk: bool,
    uses_class: bool,
    uses_style: bool,
}

impl Generated {
    fn from_unit(unit: &CompileUnit) -> Self {
        let mut generated = Generated::default();
        for binding in &unit.class_style_bindings {
            generated.uses_walk |= !binding.for_stack.is_empty();
            generated.uses_class |= binding.kind == BindingKind::Class;
            generated.uses_style |= binding.kind == BindingKind::Style;
            generated.computed.push(computed_entry(binding));
        }
        if !unit.inline_expressions.is_empty() {
            generated.inline_map = Some(inline_map(&unit.inline_expressions));
        }
        if !unit.template_refs.is_empty() {
            generated.refs = Some(template_refs(&unit.template_refs));
        }
        generated
    }

    fn runtime_imports(&self) -> Vec<String> {
        let mut names = Vec::new();
        if self.uses_class {
            names.push("normalizeClass as __wevuNormalizeClass".to_string());
        }
        if self.uses_style {
            names.push("normalizeStyle as __wevuNormalizeStyle".to_string());
        }
        names
    }
}

const WALK_HELPER: &str = "function __wevuWalk(list, fn) {
  if (Array.isArray(list)) {
    return list.map((item, index) => fn(item, index, index));
  }
  if (typeof list === 'number') {
    const out = [];
    for (let i = 0; i < list; i++) {
      out.push(fn(i + 1, i, i));
    }
    return out;
  }
  if (list && typeof list === 'object') {
    return Object.keys(list).reduce((acc, key, index) => {
      acc[key] = fn(list[key], key, index);
      return acc;
    }, {});
  }
  return [];
}
";

fn computed_entry(binding: &ClassStyleBinding) -> String {
    let value = match binding.kind {
        BindingKind::Class => format!("__wevuNormalizeClass({})", binding.script_expr),
        BindingKind::Style => format!("__wevuNormalizeStyle({})", binding.script_expr),
        BindingKind::Bind => binding.script_expr.clone(),
    };
    let guarded = format!(
        "try {{ return {}; }} catch (e) {{ return {}; }}",
        value,
        binding.kind.fallback()
    );
    if binding.for_stack.is_empty() {
        return format!("{}() {{\n      {}\n    }}", binding.name, guarded);
    }
    let mut body = guarded;
    for snapshot in binding.for_stack.iter().rev() {
        body = format!(
            "return __wevuWalk({}, ({}, {}, {}) => {{ {} }});",
            snapshot.list, snapshot.item, snapshot.key, snapshot.index, body
        );
    }
    format!(
        "{}() {{\n      try {{\n        {}\n      }} catch (e) {{\n        return [];\n      }}\n    }}",
        binding.name, body
    )
}

fn inline_map(assets: &[InlineExpressionAsset]) -> String {
    let entries: Vec<String> = assets
        .iter()
        .map(|asset| {
            let keys: Vec<String> = asset.scope_keys.iter().map(|k| quote_string(k)).collect();
            format!(
                "{}: {{\n        keys: [{}],\n        fn: function (ctx, scope, $event) {{\n          {}\n        }},\n      }}",
                asset.id,
                keys.join(", "),
                asset.body
            )
        })
        .collect();
    format!("{}: {{\n      {},\n    }}", INLINE_MAP, entries.join(",\n      "))
}

fn template_refs(refs: &[TemplateRefMeta]) -> String {
    let entries: Vec<String> = refs
        .iter()
        .map(|r| {
            let mut fields = vec![
                format!("selector: {}", quote_string(&r.selector)),
                format!("inFor: {}", r.in_for),
            ];
            if let Some(name) = &r.name {
                fields.push(format!("name: {}", quote_string(name)));
            }
            if let Some(get) = &r.get {
                fields.push(format!("get: {}", get));
            }
            format!("{{ {} }}", fields.join(", "))
        })
        .collect();
    format!("[\n    {},\n  ]", entries.join(",\n    "))
}

fn import_line(names: &[String], module: &str) -> String {
    format!("import {{ {} }} from {};\n", names.join(", "), quote_string(module))
}

/// Script of a synthetic scoped-slot component.
pub fn scoped_slot_script(unit: &CompileUnit, options: &CompileOptions) -> String {
    let generated = Generated::from_unit(unit);
    let mut names = vec![format!("{} as __wevuCreateScopedSlotComponent", CREATE_SCOPED_SLOT)];
    names.extend(generated.runtime_imports());
    let mut out = import_line(&names, &options.runtime_module);
    if generated.uses_walk {
        out.push('\n');
        out.push_str(WALK_HELPER);
    }
    let mut props = Vec::new();
    if !generated.computed.is_empty() {
        props.push(format!("computed: {{\n    {},\n  }}", generated.computed.join(",\n    ")));
    }
    if let Some(map) = &generated.inline_map {
        props.push(format!("methods: {{\n    {},\n  }}", map));
    }
    if let Some(refs) = &generated.refs {
        props.push(format!("{}: {}", TEMPLATE_REFS, refs));
    }
    out.push('\n');
    if props.is_empty() {
        out.push_str("__wevuCreateScopedSlotComponent({});\n");
    } else {
        out.push_str(&format!(
            "__wevuCreateScopedSlotComponent({{\n  {},\n}});\n",
            props.join(",\n  ")
        ));
    }
    out
}

// ═══════════════════════════════════════════════════════════════════════════════
// <script setup>
// ═══════════════════════════════════════════════════════════════════════════════

/// One script block handed to the transformer.
#[derive(Debug, Clone, Copy)]
pub struct ScriptBlock<'s> {
    pub content: &'s str,
    pub line_offset: u32,
}

#[derive(Debug, Default)]
struct SetupParts {
    imports: Vec<String>,
    hoisted: Vec<String>,
    body: Vec<String>,
    props: Option<String>,
    emits: Option<String>,
    extra_options: Vec<String>,
    bindings: BTreeSet<String>,
    warnings: Vec<String>,
}

fn is_call_to<'b, 'a>(expr: &'b Expression<'a>, name: &str) -> Option<&'b CallExpression<'a>> {
    match expr.get_inner_expression() {
        Expression::CallExpression(call) => match &call.callee {
            Expression::Identifier(id) if id.name == name => Some(&**call),
            _ => None,
        },
        _ => None,
    }
}

fn first_arg_text<'s>(source: &'s str, call: &CallExpression<'_>) -> Option<&'s str> {
    call.arguments.first().map(|a| text(source, a.span()))
}

/// `{ a: null, b: null }` from `defineProps<{ a: string; b?: number }>()`.
fn props_from_type(
    source: &str,
    call: &CallExpression<'_>,
    defaults: Option<&ObjectExpression<'_>>,
) -> Option<String> {
    let params = call.type_arguments.as_ref()?;
    let TSType::TSTypeLiteral(literal) = params.params.first()? else {
        return None;
    };
    let mut defaults_by_key: HashMap<String, String> = HashMap::new();
    if let Some(obj) = defaults {
        for prop in &obj.properties {
            if let ObjectPropertyKind::ObjectProperty(p) = prop {
                if let Some(name) = p.key.static_name() {
                    defaults_by_key.insert(name.to_string(), text(source, p.value.span()).to_string());
                }
            }
        }
    }
    let mut entries = Vec::new();
    for member in &literal.members {
        if let TSSignature::TSPropertySignature(sig) = member {
            let Some(name) = sig.key.static_name() else { continue };
            let entry = match defaults_by_key.get(name.as_ref()) {
                Some(value) => format!("{}: {{ type: null, default: {} }}", quote_string(&name), value),
                None => format!("{}: null", quote_string(&name)),
            };
            entries.push(entry);
        }
    }
    Some(format!("{{ {} }}", entries.join(", ")))
}

impl SetupParts {
    /// Handles a `defineProps`-family call. Returns the replacement
    /// initializer when the call was a declarator init.
    fn macro_call(&mut self, source: &str, expr: &Expression<'_>) -> Option<Option<String>> {
        if let Some(call) = is_call_to(expr, "withDefaults") {
            let inner = call.arguments.first().and_then(Argument::as_expression)?;
            let props_call = is_call_to(inner, "defineProps")?;
            let defaults = call
                .arguments
                .get(1)
                .and_then(Argument::as_expression)
                .and_then(|e| match e.get_inner_expression() {
                    Expression::ObjectExpression(obj) => Some(&**obj),
                    _ => None,
                });
            self.props = props_from_type(source, props_call, defaults);
            if self.props.is_none() {
                self.warnings
                    .push("`withDefaults` needs a type literal argument to `defineProps`; props are left undeclared".into());
            }
            return Some(Some("__props".into()));
        }
        if let Some(call) = is_call_to(expr, "defineProps") {
            self.props = first_arg_text(source, call)
                .map(str::to_string)
                .or_else(|| props_from_type(source, call, None));
            return Some(Some("__props".into()));
        }
        if let Some(call) = is_call_to(expr, "defineEmits") {
            self.emits = first_arg_text(source, call).map(str::to_string);
            if self.emits.is_none() && call.type_arguments.is_some() {
                self.warnings
                    .push("Type-only `defineEmits` is not analysed; events are left undeclared".into());
            }
            return Some(Some("__ctx.emit".into()));
        }
        if let Some(call) = is_call_to(expr, "defineOptions") {
            if let Some(arg) = call.arguments.first().and_then(Argument::as_expression) {
                match arg.get_inner_expression() {
                    Expression::ObjectExpression(obj) => {
                        for prop in &obj.properties {
                            self.extra_options.push(text(source, prop.span()).to_string());
                        }
                    }
                    other => self
                        .extra_options
                        .push(format!("...({})", text(source, other.span()))),
                }
            }
            return Some(None);
        }
        if let Some(call) = is_call_to(expr, "defineExpose") {
            let arg = first_arg_text(source, call).unwrap_or("{}");
            self.body.push(format!("__ctx.expose({});", arg));
            return Some(None);
        }
        if is_call_to(expr, "defineSlots").is_some() {
            return Some(Some("__ctx.slots".into()));
        }
        None
    }

    fn statement(&mut self, source: &str, stmt: &Statement<'_>) {
        let stmt_text = text(source, stmt.span()).to_string();
        match stmt {
            Statement::ImportDeclaration(_) => self.imports.push(stmt_text),
            Statement::TSTypeAliasDeclaration(_) | Statement::TSInterfaceDeclaration(_) => {
                self.hoisted.push(stmt_text)
            }
            Statement::ExpressionStatement(es) => {
                if self.macro_call(source, &es.expression).is_none() {
                    self.body.push(stmt_text);
                }
            }
            Statement::VariableDeclaration(decl) => {
                let mut edits: Vec<(u32, u32, String)> = Vec::new();
                for declarator in &decl.declarations {
                    let mut names = BindingNames::default();
                    names.visit_binding_pattern(&declarator.id);
                    self.bindings.extend(names.names);
                    let Some(init) = &declarator.init else { continue };
                    if let Some(replacement) = self.macro_call(source, init) {
                        let replacement = replacement.unwrap_or_else(|| "undefined".into());
                        edits.push((init.span().start, init.span().end, replacement));
                    }
                }
                self.body
                    .push(apply_replacements(source, decl.span, edits));
            }
            Statement::FunctionDeclaration(func) => {
                if let Some(id) = &func.id {
                    self.bindings.insert(id.name.to_string());
                }
                self.body.push(stmt_text);
            }
            Statement::ClassDeclaration(class) => {
                if let Some(id) = &class.id {
                    self.bindings.insert(id.name.to_string());
                }
                self.body.push(stmt_text);
            }
            _ => self.body.push(stmt_text),
        }
    }
}

/// Locals bound by value imports of a module, excluding `.vue` components.
fn import_bindings(program: &Program<'_>) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for stmt in &program.body {
        let Statement::ImportDeclaration(decl) = stmt else { continue };
        if decl.import_kind.is_type() || decl.source.value.ends_with(".vue") {
            continue;
        }
        for spec in decl.specifiers.iter().flatten() {
            if let ImportDeclarationSpecifier::ImportSpecifier(s) = spec {
                if s.import_kind.is_type() {
                    continue;
                }
            }
            names.insert(spec.local().name.to_string());
        }
    }
    names
}

/// The options object written by the author: `export default {..}` or
/// `export default defineComponent({..})` where `is_wrapper` accepts the
/// callee name.
fn default_export_object<'b, 'a>(
    decl: &'b ExportDefaultDeclaration<'a>,
    is_wrapper: &dyn Fn(&str) -> bool,
) -> Option<&'b ObjectExpression<'a>> {
    let expr = decl.declaration.as_expression()?;
    match expr.get_inner_expression() {
        Expression::ObjectExpression(obj) => Some(&**obj),
        Expression::CallExpression(call) => {
            let Expression::Identifier(callee) = &call.callee else { return None };
            if !is_wrapper(callee.name.as_str()) {
                return None;
            }
            match call.arguments.first()?.as_expression()?.get_inner_expression() {
                Expression::ObjectExpression(obj) => Some(&**obj),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Rewrites `<script setup>` (plus an optional plain `<script>`) into one
/// module whose default export is an options object with `setup`.
/// Returns the module and the warnings raised.
pub fn desugar_script_setup(
    setup: ScriptBlock<'_>,
    script: Option<ScriptBlock<'_>>,
    is_ts: bool,
    template_identifiers: &BTreeSet<String>,
    filename: &str,
) -> Result<(String, Vec<String>), CompilerError> {
    let allocator = Allocator::default();
    let mut parts = SetupParts::default();
    let mut leading: Vec<String> = Vec::new();
    let mut options: Vec<String> = Vec::new();

    if let Some(block) = script {
        let ret = Parser::new(&allocator, block.content, script_source_type(is_ts)).parse();
        if let Some(err) = ret.errors.first() {
            return Err(parse_failure(block.content, filename, block.line_offset, err.to_string()));
        }
        for stmt in &ret.program.body {
            match stmt {
                Statement::ExportDefaultDeclaration(decl) => match default_export_object(decl, &|name| {
                    name == "defineComponent"
                }) {
                    Some(obj) => {
                        for prop in &obj.properties {
                            options.push(text(block.content, prop.span()).to_string());
                        }
                    }
                    None => {
                        let span = decl
                            .declaration
                            .as_expression()
                            .map_or(decl.span, |e| e.span());
                        options.push(format!("...({})", text(block.content, span)));
                    }
                },
                Statement::ImportDeclaration(_) => {
                    parts.imports.push(text(block.content, stmt.span()).to_string())
                }
                _ => leading.push(text(block.content, stmt.span()).to_string()),
            }
        }
    }

    let ret = Parser::new(&allocator, setup.content, script_source_type(is_ts)).parse();
    if let Some(err) = ret.errors.first() {
        return Err(parse_failure(setup.content, filename, setup.line_offset, err.to_string()));
    }
    let imported = import_bindings(&ret.program);
    for stmt in &ret.program.body {
        parts.statement(setup.content, stmt);
    }

    if let Some(props) = &parts.props {
        options.push(format!("props: {}", props));
    }
    if let Some(emits) = &parts.emits {
        options.push(format!("emits: {}", emits));
    }
    options.extend(parts.extra_options.iter().cloned());

    let exposed: Vec<&String> = parts
        .bindings
        .iter()
        .chain(imported.iter())
        .filter(|name| template_identifiers.contains(*name))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let mut setup_body = String::new();
    for stmt in &parts.body {
        setup_body.push_str("    ");
        setup_body.push_str(stmt);
        setup_body.push('\n');
    }
    setup_body.push_str(&format!(
        "    return {{ {} }};",
        exposed.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
    ));
    options.push(format!("setup(__props, __ctx) {{\n{}\n  }}", setup_body));

    let mut module = String::new();
    for chunk in parts.imports.iter().chain(leading.iter()).chain(parts.hoisted.iter()) {
        module.push_str(chunk);
        module.push('\n');
    }
    module.push_str(&format!("export default {{\n  {},\n}};\n", options.join(",\n  ")));
    Ok((module, parts.warnings))
}

// ═══════════════════════════════════════════════════════════════════════════════
// OPTIONS OBJECT
// ═══════════════════════════════════════════════════════════════════════════════

pub struct ScriptContext<'a> {
    pub options: &'a CompileOptions,
    pub filename: &'a str,
    pub unit: &'a CompileUnit,
    /// Component tags the template renders (kebab-case).
    pub used_components: &'a [String],
    /// JSX sources: the `render` option is superseded by the template.
    pub strip_render: bool,
    pub is_ts: bool,
    pub line_offset: u32,
}

#[derive(Debug, Default)]
pub struct ScriptOutput {
    pub code: String,
    pub using_components: BTreeMap<String, String>,
    pub page_features: Vec<String>,
    pub warnings: Vec<String>,
}

fn property<'o, 'a>(obj: &'o ObjectExpression<'a>, name: &str) -> Option<&'o ObjectProperty<'a>> {
    obj.properties.iter().find_map(|p| match p {
        ObjectPropertyKind::ObjectProperty(prop) if !prop.computed && prop.key.is_specific_static_name(name) => {
            Some(&**prop)
        }
        _ => None,
    })
}

fn object_value<'o, 'a>(prop: &'o ObjectProperty<'a>) -> Option<&'o ObjectExpression<'a>> {
    match prop.value.get_inner_expression() {
        Expression::ObjectExpression(obj) => Some(&**obj),
        _ => None,
    }
}

fn static_keys(obj: &ObjectExpression<'_>) -> HashSet<String> {
    obj.properties
        .iter()
        .filter_map(|p| match p {
            ObjectPropertyKind::ObjectProperty(prop) => prop.key.static_name().map(|n| n.to_string()),
            ObjectPropertyKind::SpreadProperty(_) => None,
        })
        .collect()
}

/// Insertion that appends `entries` after the last property of `obj`,
/// ignoring the properties whose start offsets are in `removed`.
fn append_to_object(
    source: &str,
    obj: &ObjectExpression<'_>,
    removed: &HashSet<u32>,
    entries: &[String],
    indent: &str,
) -> (u32, u32, String) {
    let close = obj.span.end - 1;
    let last_kept = obj
        .properties
        .iter()
        .rev()
        .find(|p| !removed.contains(&p.span().start))
        .map(|p| p.span().end);
    let mut out = String::new();
    let Some(end) = last_kept else {
        for entry in entries {
            out.push_str(&format!("\n{}{},", indent, entry));
        }
        out.push('\n');
        return (close, close, out);
    };
    let between = &source[end as usize..close as usize];
    let trimmed = between.trim_start();
    if trimmed.starts_with(',') {
        let comma = end + (between.len() - trimmed.len()) as u32 + 1;
        for entry in entries {
            out.push_str(&format!("\n{}{},", indent, entry));
        }
        (comma, comma, out)
    } else {
        for entry in entries {
            out.push_str(&format!(",\n{}{}", indent, entry));
        }
        (end, end, out)
    }
}

struct ScriptTransformer<'c, 's> {
    sctx: &'c ScriptContext<'c>,
    source: &'s str,
    edits: Vec<(u32, u32, String)>,
    define_component: HashSet<String>,
    /// Default-import local → (module source, imported from a `.vue` file).
    default_imports: HashMap<String, (String, bool)>,
    /// Non-`.vue` default imports that are the only binding of their
    /// statement, by local name.
    sole_defaults: HashMap<String, Span>,
    registered: Vec<(String, String)>,
    features: BTreeSet<&'static str>,
    warnings: Vec<String>,
}

impl<'c, 's> ScriptTransformer<'c, 's> {
    fn remove_statement(&mut self, span: Span) {
        self.edits
            .push((span.start, removal_end(self.source, span.end), String::new()));
    }

    fn import(&mut self, decl: &ImportDeclaration<'_>) {
        let module = decl.source.value.as_str();
        if decl.import_kind.is_type() {
            self.remove_statement(decl.span);
            return;
        }
        let Some(specifiers) = &decl.specifiers else { return };
        let from_vue_runtime = module == "vue" || module == self.sctx.options.runtime_module;

        let mut kept: Vec<String> = Vec::new();
        let mut default_kept: Option<String> = None;
        let mut dropped = false;
        for spec in specifiers {
            match spec {
                ImportDeclarationSpecifier::ImportSpecifier(s) => {
                    let imported = s.imported.name();
                    let imported = imported.as_str();
                    if s.import_kind.is_type()
                        || SETUP_MACROS.contains(&imported)
                        || JSON_MACROS.contains(&imported)
                    {
                        dropped = true;
                        continue;
                    }
                    if from_vue_runtime && imported == "defineComponent" {
                        self.define_component.insert(s.local.name.to_string());
                        dropped = true;
                        continue;
                    }
                    if module == self.sctx.options.runtime_module {
                        if let Some((_, flag)) = PAGE_HOOKS.iter().find(|(hook, _)| *hook == imported) {
                            self.features.insert(*flag);
                        }
                    }
                    kept.push(text(self.source, s.span).to_string());
                }
                ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                    let local = s.local.name.to_string();
                    let is_vue = module.ends_with(".vue");
                    self.default_imports
                        .insert(local.clone(), (module.trim_end_matches(".vue").to_string(), is_vue));
                    if is_vue {
                        dropped = true;
                    } else {
                        if specifiers.len() == 1 {
                            self.sole_defaults.insert(local.clone(), decl.span);
                        }
                        default_kept = Some(local);
                    }
                }
                ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                    default_kept = Some(format!("* as {}", s.local.name));
                }
            }
        }
        if !dropped {
            return;
        }
        if kept.is_empty() && default_kept.is_none() {
            self.remove_statement(decl.span);
            return;
        }
        let mut clause = Vec::new();
        if let Some(d) = default_kept {
            clause.push(d);
        }
        if !kept.is_empty() {
            clause.push(format!("{{ {} }}", kept.join(", ")));
        }
        let rebuilt = format!(
            "import {} from {};",
            clause.join(", "),
            text(self.source, decl.source.span)
        );
        self.edits.push((decl.span.start, decl.span.end, rebuilt));
    }

    /// `components: { TIcon, 'my-card': MyCard }`
    fn components_option(&mut self, prop: &ObjectProperty<'_>) {
        let Some(obj) = object_value(prop) else {
            self.warnings
                .push("`components` is not an object literal; component registration is skipped".into());
            return;
        };
        for entry in &obj.properties {
            let ObjectPropertyKind::ObjectProperty(p) = entry else { continue };
            let Some(key) = p.key.static_name() else { continue };
            if let Expression::Identifier(id) = p.value.get_inner_expression() {
                self.registered.push((kebab_case(&key), id.name.to_string()));
            }
        }
    }

    /// Maps each rendered component tag to the module it was imported from.
    /// Explicit `components` registrations win over `.vue` imports whose
    /// local name kebab-cases to the tag.
    fn resolve_components(&self) -> BTreeMap<String, String> {
        let mut using = BTreeMap::new();
        for tag in self.sctx.used_components {
            let registered = self
                .registered
                .iter()
                .find(|(key, _)| key == tag)
                .and_then(|(_, local)| self.default_imports.get(local));
            let imported = || {
                self.default_imports
                    .iter()
                    .filter(|(local, (_, is_vue))| *is_vue && kebab_case(local) == *tag)
                    .min_by(|a, b| a.0.cmp(b.0))
                    .map(|(_, entry)| entry)
            };
            if let Some((source, _)) = registered.or_else(imported) {
                using.insert(tag.clone(), source.clone());
            }
        }
        using
    }

    /// Imports registered under `components` move to the JSON config.
    fn remove_registered_imports(&mut self) {
        let spans: Vec<Span> = self
            .registered
            .iter()
            .filter_map(|(_, local)| self.sole_defaults.get(local).copied())
            .collect();
        for span in spans {
            self.remove_statement(span);
        }
    }

    fn generated_properties(&mut self, obj: Option<&ObjectExpression<'_>>) -> Vec<String> {
        let generated = Generated::from_unit(self.sctx.unit);
        let mut new_props = Vec::new();

        if !generated.computed.is_empty() {
            match obj.and_then(|o| property(o, "computed")) {
                Some(prop) => match object_value(prop) {
                    Some(existing) => {
                        let edit = append_to_object(self.source, existing, &HashSet::new(), &generated.computed, "    ");
                        self.edits.push(edit);
                    }
                    None => {
                        let span = prop.value.span();
                        let merged = format!(
                            "{{\n    ...({}),\n    {},\n  }}",
                            text(self.source, span),
                            generated.computed.join(",\n    ")
                        );
                        self.edits.push((span.start, span.end, merged));
                    }
                },
                None => new_props.push(format!("computed: {{\n    {},\n  }}", generated.computed.join(",\n    "))),
            }
        }

        if let Some(map) = &generated.inline_map {
            match obj.and_then(|o| property(o, "methods")) {
                Some(prop) => match object_value(prop) {
                    Some(existing) => {
                        let edit = append_to_object(self.source, existing, &HashSet::new(), std::slice::from_ref(map), "    ");
                        self.edits.push(edit);
                    }
                    None => {
                        let span = prop.value.span();
                        let merged = format!("{{\n    ...({}),\n    {},\n  }}", text(self.source, span), map);
                        self.edits.push((span.start, span.end, merged));
                    }
                },
                None => new_props.push(format!("methods: {{\n    {},\n  }}", map)),
            }
        }

        if let Some(refs) = &generated.refs {
            new_props.push(format!("{}: {}", TEMPLATE_REFS, refs));
        }

        if !self.features.is_empty() {
            let mut flags: Vec<&str> = self.features.iter().copied().collect();
            if self.features.contains("enableOnShareTimeline") && !self.features.contains("enableOnShareAppMessage") {
                flags.push("enableOnShareAppMessage");
            }
            match obj.and_then(|o| property(o, "features")) {
                Some(prop) => match object_value(prop) {
                    Some(existing) => {
                        let present = static_keys(existing);
                        let missing: Vec<String> = flags
                            .iter()
                            .filter(|f| !present.contains(**f))
                            .map(|f| format!("{}: true", f))
                            .collect();
                        if !missing.is_empty() {
                            let edit = append_to_object(self.source, existing, &HashSet::new(), &missing, "    ");
                            self.edits.push(edit);
                        }
                    }
                    None => self
                        .warnings
                        .push("`features` is not an object literal; page hook flags are not injected".into()),
                },
                None => {
                    let entries: Vec<String> = flags.iter().map(|f| format!("{}: true", f)).collect();
                    new_props.push(format!("features: {{ {} }}", entries.join(", ")));
                }
            }
        }

        new_props
    }
}

/// Applies template-derived injections to a component/app script.
pub fn transform_script(source: &str, sctx: &ScriptContext<'_>) -> Result<ScriptOutput, CompilerError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, script_source_type(sctx.is_ts)).parse();
    if let Some(err) = ret.errors.first() {
        return Err(parse_failure(source, sctx.filename, sctx.line_offset, err.to_string()));
    }
    let program = ret.program;

    let mut t = ScriptTransformer {
        sctx,
        source,
        edits: Vec::new(),
        define_component: HashSet::new(),
        default_imports: HashMap::new(),
        sole_defaults: HashMap::new(),
        registered: Vec::new(),
        features: BTreeSet::new(),
        warnings: Vec::new(),
    };

    let mut export: Option<&ExportDefaultDeclaration<'_>> = None;
    for stmt in &program.body {
        match stmt {
            Statement::ImportDeclaration(decl) => t.import(decl),
            Statement::ExportDefaultDeclaration(decl) => export = Some(decl),
            _ => {}
        }
    }

    let wrappers = &t.define_component;
    let options_obj = export.and_then(|decl| default_export_object(decl, &|name| wrappers.contains(name)));
    let mut removed: HashSet<u32> = HashSet::new();
    if let Some(obj) = options_obj {
        if let Some(prop) = property(obj, "components") {
            t.components_option(prop);
            removed.insert(prop.span.start);
            t.edits
                .push((prop.span.start, removal_end(source, prop.span.end), String::new()));
        }
        if sctx.strip_render {
            if let Some(prop) = property(obj, "render") {
                removed.insert(prop.span.start);
                t.edits
                    .push((prop.span.start, removal_end(source, prop.span.end), String::new()));
            }
        }
    }

    let using_components = t.resolve_components();
    t.remove_registered_imports();
    let new_props = t.generated_properties(options_obj);
    let generated = Generated::from_unit(sctx.unit);

    let (create_name, create_local) = if sctx.options.is_app {
        (CREATE_APP, "__wevuCreateApp")
    } else {
        (CREATE_COMPONENT, "__wevuCreateComponent")
    };
    let mut runtime_names = vec![format!("{} as {}", create_name, create_local)];
    runtime_names.extend(generated.runtime_imports());
    t.edits
        .push((0, 0, import_line(&runtime_names, &sctx.options.runtime_module)));

    let mut tail = String::new();
    if generated.uses_walk {
        tail.push('\n');
        tail.push_str(WALK_HELPER);
    }

    match (export, options_obj) {
        (Some(decl), Some(obj)) => {
            if !new_props.is_empty() {
                t.edits
                    .push(append_to_object(source, obj, &removed, &new_props, "  "));
            }
            t.edits.push((
                decl.span.start,
                obj.span.start,
                format!("const {} = ", OPTIONS_VAR),
            ));
            t.edits.push((obj.span.end, decl.span.end, ";".to_string()));
        }
        (Some(decl), None) => {
            let span = decl.declaration.as_expression().map_or(decl.span, |e| e.span());
            t.warnings.push(
                "The default export is not an options object literal; generated members are merged shallowly".into(),
            );
            let mut props = vec![format!("...({})", text(source, span))];
            props.extend(new_props);
            t.edits.push((
                decl.span.start,
                decl.span.end,
                format!("const {} = {{\n  {},\n}};", OPTIONS_VAR, props.join(",\n  ")),
            ));
        }
        (None, _) => {
            let body = if new_props.is_empty() {
                "{}".to_string()
            } else {
                format!("{{\n  {},\n}}", new_props.join(",\n  "))
            };
            tail.push_str(&format!("\nconst {} = {};\n", OPTIONS_VAR, body));
        }
    }
    tail.push_str(&format!("\n{}({});\n", create_local, OPTIONS_VAR));

    let end = source.len() as u32;
    t.edits.push((end, end, tail));
    let edited = apply_replacements(source, Span::new(0, end), std::mem::take(&mut t.edits));

    let code = if sctx.is_ts {
        strip_typescript(&edited, sctx.filename)
            .map_err(|message| parse_failure(source, sctx.filename, sctx.line_offset, message))?
    } else {
        edited
    };

    tracing::debug!(
        file = %sctx.filename,
        components = using_components.len(),
        features = t.features.len(),
        "transformed script"
    );
    let mut page_features: Vec<String> = t.features.iter().map(|f| f.to_string()).collect();
    if t.features.contains("enableOnShareTimeline") && !t.features.contains("enableOnShareAppMessage") {
        page_features.push("enableOnShareAppMessage".to_string());
        page_features.sort();
    }
    Ok(ScriptOutput {
        code,
        using_components,
        page_features,
        warnings: t.warnings,
    })
}

//! Compile-time JSON macros (`definePageJson({...})` and friends).
//!
//! A macro statement is cut out of the script. Its argument and the
//! top-level declarations it transitively depends on are written into a
//! throwaway ES module which the JS runtime executes; the module prints the
//! resolved configuration as JSON on stdout.

use crate::error::{CompilerError, ERR_JSON_MACRO_ARGS, ERR_JSON_MACRO_CONFLICT, ERR_JSON_MACRO_EVAL, ERR_JSON_MACRO_SHAPE, ERR_SCRIPT_PARSE};
use crate::json_merge::deep_merge;
use crate::options::JsonOptions;
use crate::script::{script_source_type, strip_typescript};
use lazy_static::lazy_static;
use oxc_allocator::Allocator;
use oxc_ast::ast::*;
use oxc_ast_visit::Visit;
use oxc_parser::Parser;
use oxc_span::{GetSpan, Span};
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub const JSON_MACROS: &[&str] = &[
    "defineAppJson",
    "definePageJson",
    "defineComponentJson",
    "defineSitemapJson",
    "defineThemeJson",
];

lazy_static! {
    static ref DIR_LOCKS: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>> = Mutex::new(HashMap::new());
    static ref RESULT_CACHE: Mutex<HashMap<String, Value>> = Mutex::new(HashMap::new());
}

static MODULE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Macro statements cut out of one script block.
#[derive(Debug, Clone, Default)]
pub struct JsonMacroExtraction {
    /// The script with every macro statement removed.
    pub code: String,
    /// Macro name used, if any.
    pub name: Option<String>,
    /// Evaluation module source; `None` when the block has no macro.
    pub module: Option<String>,
    /// Whether the module imports anything (disables memoisation).
    pub has_imports: bool,
}

fn text(source: &str, span: Span) -> &str {
    &source[span.start as usize..span.end as usize]
}

fn macro_call<'b, 'a>(stmt: &'b Statement<'a>) -> Option<&'b CallExpression<'a>> {
    let Statement::ExpressionStatement(es) = stmt else { return None };
    let expr = match es.expression.get_inner_expression() {
        Expression::AwaitExpression(await_expr) => await_expr.argument.get_inner_expression(),
        other => other,
    };
    let Expression::CallExpression(call) = expr else { return None };
    let Expression::Identifier(callee) = &call.callee else { return None };
    JSON_MACROS.contains(&callee.name.as_str()).then_some(&**call)
}

#[derive(Default)]
struct References {
    names: BTreeSet<String>,
}

impl<'a> Visit<'a> for References {
    fn visit_identifier_reference(&mut self, ident: &IdentifierReference<'a>) {
        self.names.insert(ident.name.to_string());
    }
}

/// Names a top-level statement declares.
fn declared_names(stmt: &Statement<'_>) -> Vec<String> {
    match stmt {
        Statement::ImportDeclaration(decl) => decl
            .specifiers
            .iter()
            .flatten()
            .map(|s| s.local().name.to_string())
            .collect(),
        Statement::VariableDeclaration(decl) => {
            let mut names = crate::expression::BindingNames::default();
            for declarator in &decl.declarations {
                names.visit_binding_pattern(&declarator.id);
            }
            names.names.into_iter().collect()
        }
        Statement::FunctionDeclaration(func) => func.id.iter().map(|id| id.name.to_string()).collect(),
        Statement::ClassDeclaration(class) => class.id.iter().map(|id| id.name.to_string()).collect(),
        Statement::ExportNamedDeclaration(export) => match &export.declaration {
            Some(Declaration::VariableDeclaration(decl)) => {
                let mut names = crate::expression::BindingNames::default();
                for declarator in &decl.declarations {
                    names.visit_binding_pattern(&declarator.id);
                }
                names.names.into_iter().collect()
            }
            Some(Declaration::FunctionDeclaration(func)) => {
                func.id.iter().map(|id| id.name.to_string()).collect()
            }
            Some(Declaration::ClassDeclaration(class)) => {
                class.id.iter().map(|id| id.name.to_string()).collect()
            }
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Text of a dependency statement as it goes into the evaluation module.
fn closure_statement(source: &str, stmt: &Statement<'_>, filename: &str) -> String {
    match stmt {
        Statement::ImportDeclaration(decl) => {
            let specifier = decl.source.value.as_str();
            if !specifier.starts_with('.') {
                return text(source, decl.span).to_string();
            }
            let base = Path::new(filename).parent().unwrap_or_else(|| Path::new(""));
            let resolved = file_url(&with_extension(base.join(specifier)));
            format!(
                "{}{}{}",
                text(source, Span::new(decl.span.start, decl.source.span.start)),
                crate::expression::quote_string(&resolved),
                text(source, Span::new(decl.source.span.end, decl.span.end))
            )
        }
        Statement::ExportNamedDeclaration(export) => match &export.declaration {
            Some(decl) => text(source, decl.span()).to_string(),
            None => String::new(),
        },
        _ => text(source, stmt.span()).to_string(),
    }
}

/// Extensionless relative imports resolve the way bundlers do.
fn with_extension(path: PathBuf) -> PathBuf {
    if path.extension().is_some() || path.is_file() {
        return path;
    }
    for ext in ["js", "mjs", "cjs", "json"] {
        let candidate = path.with_extension(ext);
        if candidate.is_file() {
            return candidate;
        }
    }
    let index = path.join("index.js");
    if index.is_file() {
        return index;
    }
    path
}

fn file_url(path: &Path) -> String {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().map(|cwd| cwd.join(path)).unwrap_or_else(|_| path.to_path_buf())
    };
    let normalized = absolute.to_string_lossy().replace('\\', "/");
    if normalized.starts_with('/') {
        format!("file://{}", normalized)
    } else {
        format!("file:///{}", normalized)
    }
}

const RUNNER: &str = r#"
function __wevuShape(value, path, seen) {
  if (value === null || value === undefined) return null;
  const type = typeof value;
  if (type === 'string' || type === 'boolean') return null;
  if (type === 'number') return Number.isFinite(value) ? null : path + ' is not a finite number';
  if (type !== 'object') return path + ' is a ' + type;
  if (seen.has(value)) return path + ' is a circular reference';
  seen.add(value);
  if (Array.isArray(value)) {
    for (let i = 0; i < value.length; i++) {
      const error = __wevuShape(value[i], path + '[' + i + ']', seen);
      if (error) return error;
    }
  } else {
    const proto = Object.getPrototypeOf(value);
    if (proto !== Object.prototype && proto !== null) return path + ' is not a plain object';
    if (Object.getOwnPropertySymbols(value).length > 0) return path + ' has symbol keys';
    for (const key of Object.keys(value)) {
      const error = __wevuShape(value[key], path + '.' + key, seen);
      if (error) return error;
    }
  }
  seen.delete(value);
  return null;
}

(async () => {
  const values = [];
  try {
    for (const thunk of __wevuMacroValues) {
      let value = thunk();
      if (typeof value === 'function') value = value();
      value = await value;
      if (value === null || typeof value !== 'object' || Array.isArray(value)) {
        const kind = value === null ? 'null' : Array.isArray(value) ? 'an array' : typeof value;
        process.stdout.write(JSON.stringify({ ok: false, shape: true, error: 'the macro resolved to ' + kind }));
        return;
      }
      const error = __wevuShape(value, '$', new Set());
      if (error) {
        process.stdout.write(JSON.stringify({ ok: false, shape: true, error }));
        return;
      }
      values.push(value);
    }
    process.stdout.write(JSON.stringify({ ok: true, values }));
  } catch (error) {
    const message = error && error.stack ? error.stack : String(error);
    process.stdout.write(JSON.stringify({ ok: false, shape: false, error: message }));
  }
})();
"#;

/// Cuts macro statements out of `source` and prepares their evaluation
/// module.
pub fn extract_json_macros(
    source: &str,
    is_ts: bool,
    filename: &str,
) -> Result<JsonMacroExtraction, CompilerError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, script_source_type(is_ts)).parse();
    if let Some(err) = ret.errors.first() {
        return Err(CompilerError::at_file(ERR_SCRIPT_PARSE, &err.to_string(), filename));
    }
    let body = &ret.program.body;

    let mut name: Option<String> = None;
    let mut calls: Vec<&CallExpression<'_>> = Vec::new();
    let mut edits: Vec<(u32, u32, String)> = Vec::new();
    for stmt in body {
        let Some(call) = macro_call(stmt) else { continue };
        let Expression::Identifier(callee) = &call.callee else { continue };
        let callee = callee.name.as_str();
        match &name {
            Some(existing) if existing != callee => {
                let (line, column) = crate::error::line_col(source, call.span.start as usize);
                return Err(CompilerError::new(
                    ERR_JSON_MACRO_CONFLICT,
                    &format!("`{}` and `{}` cannot be used in the same file", existing, callee),
                    filename,
                    line,
                    column,
                )
                .hint("Keep a single JSON macro per file"));
            }
            _ => name = Some(callee.to_string()),
        }
        if call.arguments.len() != 1 || call.arguments[0].is_spread() {
            let (line, column) = crate::error::line_col(source, call.span.start as usize);
            return Err(CompilerError::new(
                ERR_JSON_MACRO_ARGS,
                &format!("`{}` expects exactly one argument", callee),
                filename,
                line,
                column,
            ));
        }
        calls.push(call);
        edits.push((stmt.span().start, stmt.span().end, String::new()));
    }

    let code = crate::expression::apply_replacements(source, Span::new(0, source.len() as u32), edits);
    if calls.is_empty() {
        return Ok(JsonMacroExtraction {
            code,
            ..Default::default()
        });
    }

    // Transitive closure of the top-level statements the arguments reach.
    let mut declared: HashMap<String, usize> = HashMap::new();
    for (index, stmt) in body.iter().enumerate() {
        if macro_call(stmt).is_some() {
            continue;
        }
        if let Statement::ImportDeclaration(decl) = stmt {
            if decl.import_kind.is_type() {
                continue;
            }
        }
        for declared_name in declared_names(stmt) {
            declared.insert(declared_name, index);
        }
    }
    let mut pending: Vec<String> = Vec::new();
    for call in &calls {
        let mut refs = References::default();
        refs.visit_arguments(&call.arguments);
        pending.extend(refs.names);
    }
    let mut included: BTreeSet<usize> = BTreeSet::new();
    while let Some(next) = pending.pop() {
        let Some(&index) = declared.get(&next) else { continue };
        if !included.insert(index) {
            continue;
        }
        let mut refs = References::default();
        refs.visit_statement(&body[index]);
        pending.extend(refs.names);
    }

    let mut module = String::new();
    let mut has_imports = false;
    for index in &included {
        let stmt = &body[*index];
        has_imports |= matches!(stmt, Statement::ImportDeclaration(_));
        module.push_str(&closure_statement(source, stmt, filename));
        module.push('\n');
    }
    module.push_str("\nconst __wevuMacroValues = [\n");
    for call in &calls {
        module.push_str(&format!("  () => ({}),\n", text(source, call.arguments[0].span())));
    }
    module.push_str("];\n");
    if is_ts {
        module = strip_typescript(&module, filename)
            .map_err(|message| CompilerError::at_file(ERR_SCRIPT_PARSE, &message, filename))?;
    }
    module.push_str(RUNNER);

    tracing::trace!(file = %filename, macro_name = ?name, statements = included.len(), "extracted json macro");
    Ok(JsonMacroExtraction {
        code,
        name,
        module: Some(module),
        has_imports,
    })
}

/// Combines extractions from the blocks of one file, rejecting distinct
/// macro names across blocks.
pub fn macro_name(extractions: &[&JsonMacroExtraction], filename: &str) -> Result<Option<String>, CompilerError> {
    let mut found: Option<&str> = None;
    for name in extractions.iter().filter_map(|e| e.name.as_deref()) {
        match found {
            Some(existing) if existing != name => {
                return Err(CompilerError::at_file(
                    ERR_JSON_MACRO_CONFLICT,
                    &format!("`{}` and `{}` cannot be used in the same file", existing, name),
                    filename,
                )
                .hint("Keep a single JSON macro per file"));
            }
            _ => found = Some(name),
        }
    }
    Ok(found.map(str::to_string))
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVALUATION
// ═══════════════════════════════════════════════════════════════════════════════

pub fn compute_hash(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Drops memoised macro results.
pub fn clear_json_macro_cache() {
    match RESULT_CACHE.lock() {
        Ok(mut cache) => cache.clear(),
        Err(poisoned) => poisoned.into_inner().clear(),
    }
}

fn cached(hash: &str) -> Option<Value> {
    RESULT_CACHE.lock().ok()?.get(hash).cloned()
}

fn remember(hash: String, value: &Value) {
    if let Ok(mut cache) = RESULT_CACHE.lock() {
        cache.insert(hash, value.clone());
    }
}

/// Directory the evaluation modules are written into.
pub fn macro_cache_dir(filename: &str, options: &JsonOptions) -> PathBuf {
    if let Some(dir) = &options.macro_cache_dir {
        return dir.clone();
    }
    let start = Path::new(filename).parent().map(Path::to_path_buf).unwrap_or_default();
    let start = if start.is_absolute() {
        start
    } else {
        std::env::current_dir().map(|cwd| cwd.join(&start)).unwrap_or(start)
    };
    for dir in start.ancestors() {
        let node_modules = dir.join("node_modules");
        if node_modules.is_dir() {
            return node_modules.join(".cache").join("wevu-compiler").join("json-macro");
        }
    }
    std::env::temp_dir().join("wevu-compiler-json-macro")
}

fn dir_lock(dir: &Path) -> Arc<Mutex<()>> {
    let mut locks = match DIR_LOCKS.lock() {
        Ok(locks) => locks,
        Err(poisoned) => poisoned.into_inner(),
    };
    locks.entry(dir.to_path_buf()).or_default().clone()
}

/// A written evaluation module; removes its own file when dropped. The
/// directory is shared with other compiles and stays.
struct TempModule {
    path: PathBuf,
}

impl Drop for TempModule {
    fn drop(&mut self) {
        fs::remove_file(&self.path).ok();
    }
}

#[derive(Deserialize)]
struct RunnerOutput {
    ok: bool,
    #[serde(default)]
    values: Vec<Value>,
    #[serde(default)]
    shape: bool,
    #[serde(default)]
    error: Option<String>,
}

fn eval_error(filename: &str, message: String) -> CompilerError {
    CompilerError::at_file(ERR_JSON_MACRO_EVAL, &message, filename)
        .hint("JSON macros run in Node.js; set json.nodeBinary when `node` is not on PATH")
}

fn run_module(node: &Path, path: &Path, timeout: Duration, filename: &str) -> Result<String, CompilerError> {
    let mut child = Command::new(node)
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| eval_error(filename, format!("Failed to start {}: {}", node.display(), e)))?;

    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();
    let out_reader = std::thread::spawn(move || {
        let mut buf = String::new();
        if let Some(pipe) = stdout.as_mut() {
            pipe.read_to_string(&mut buf).ok();
        }
        buf
    });
    let err_reader = std::thread::spawn(move || {
        let mut buf = String::new();
        if let Some(pipe) = stderr.as_mut() {
            pipe.read_to_string(&mut buf).ok();
        }
        buf
    });

    let started = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if started.elapsed() >= timeout => {
                child.kill().ok();
                child.wait().ok();
                return Err(eval_error(
                    filename,
                    format!("JSON macro evaluation timed out after {}ms", timeout.as_millis()),
                ));
            }
            Ok(None) => std::thread::sleep(Duration::from_millis(10)),
            Err(e) => return Err(eval_error(filename, e.to_string())),
        }
    };
    let stdout = out_reader.join().unwrap_or_default();
    let stderr = err_reader.join().unwrap_or_default();
    if !status.success() && stdout.trim().is_empty() {
        return Err(eval_error(
            filename,
            format!("JSON macro evaluation failed ({}): {}", status, stderr.trim()),
        ));
    }
    Ok(stdout)
}

/// Executes the prepared module and returns the merged configuration.
pub fn evaluate_json_macros(
    extraction: &JsonMacroExtraction,
    filename: &str,
    options: &JsonOptions,
) -> Result<Option<Value>, CompilerError> {
    let Some(module) = &extraction.module else {
        return Ok(None);
    };
    let hash = compute_hash(module);
    if !extraction.has_imports {
        if let Some(value) = cached(&hash) {
            tracing::trace!(file = %filename, "json macro cache hit");
            return Ok(Some(value));
        }
    }

    let node = match &options.node_binary {
        Some(path) => path.clone(),
        None => which::which("node").map_err(|e| eval_error(filename, format!("No JS runtime found: {}", e)))?,
    };
    let dir = macro_cache_dir(filename, options);
    let lock = dir_lock(&dir);
    let _guard = match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };

    fs::create_dir_all(&dir).map_err(|e| eval_error(filename, format!("{}: {}", dir.display(), e)))?;
    let stem = Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "module".to_string());
    let path = dir.join(format!(
        "{}.{}.{}.{}.mjs",
        stem,
        &hash[..8],
        std::process::id(),
        MODULE_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    fs::write(&path, module).map_err(|e| eval_error(filename, format!("{}: {}", path.display(), e)))?;
    let temp = TempModule { path };

    let stdout = run_module(&node, &temp.path, Duration::from_millis(options.macro_timeout_ms), filename)?;
    drop(temp);

    let output: RunnerOutput = serde_json::from_str(stdout.trim())
        .map_err(|e| eval_error(filename, format!("Unreadable macro output: {}", e)))?;
    if !output.ok {
        let message = output.error.unwrap_or_else(|| "unknown error".to_string());
        if output.shape {
            return Err(CompilerError::at_file(
                ERR_JSON_MACRO_SHAPE,
                &format!("JSON macro must resolve to a plain object: {}", message),
                filename,
            ));
        }
        return Err(eval_error(filename, message));
    }

    let mut merged = Value::Object(Default::default());
    for value in output.values {
        deep_merge(&mut merged, value);
    }
    if !extraction.has_imports {
        remember(hash, &merged);
    }
    tracing::debug!(file = %filename, macro_name = ?extraction.name, "evaluated json macro");
    Ok(Some(merged))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropping_a_module_leaves_the_shared_directory() {
        let dir = tempfile::tempdir().unwrap();
        let neighbour = dir.path().join("other.0.mjs");
        fs::write(&neighbour, "export default {}").unwrap();
        let path = dir.path().join("page.0.mjs");
        fs::write(&path, "export default {}").unwrap();

        drop(TempModule { path: path.clone() });

        assert!(!path.exists());
        assert!(neighbour.exists());
        assert!(dir.path().is_dir());
    }

    #[test]
    fn dropping_the_last_module_keeps_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.1.mjs");
        fs::write(&path, "export default {}").unwrap();
        drop(TempModule { path: path.clone() });
        assert!(!path.exists());
        assert!(dir.path().is_dir());
    }

    #[test]
    fn macro_statements_are_cut_with_their_closure() {
        let source = "import { ref } from 'wevu'\nconst title = 'Home'\nconst unused = 1\nconst base = { navigationBarTitleText: title }\ndefinePageJson(() => ({ ...base, enablePullDownRefresh: true }))\nconst count = ref(0)\n";
        let extraction = extract_json_macros(source, false, "/src/pages/index.vue").unwrap();
        assert_eq!(extraction.name.as_deref(), Some("definePageJson"));
        assert!(!extraction.code.contains("definePageJson"));
        assert!(extraction.code.contains("const count = ref(0)"));
        let module = extraction.module.unwrap();
        assert!(module.contains("const title = 'Home'"));
        assert!(module.contains("const base = { navigationBarTitleText: title }"));
        assert!(!module.contains("unused"));
        assert!(!module.contains("import { ref }"));
        assert!(!extraction.has_imports);
    }

    #[test]
    fn same_macro_twice_is_allowed() {
        let source = "definePageJson({ a: 1 })\ndefinePageJson({ b: 2 })\n";
        let extraction = extract_json_macros(source, false, "page.vue").unwrap();
        let module = extraction.module.unwrap();
        assert!(module.contains("() => ({ a: 1 }),\n  () => ({ b: 2 }),"));
    }

    #[test]
    fn distinct_macros_conflict() {
        let source = "definePageJson({})\ndefinePageJson({})\ndefineAppJson({})\n";
        let err = extract_json_macros(source, false, "page.vue").unwrap_err();
        assert_eq!(err.code, ERR_JSON_MACRO_CONFLICT);
        assert_eq!(err.line, 3);
    }

    #[test]
    fn macro_arguments_are_checked() {
        let err = extract_json_macros("definePageJson()\n", false, "page.vue").unwrap_err();
        assert_eq!(err.code, ERR_JSON_MACRO_ARGS);
        let err = extract_json_macros("definePageJson({}, {})\n", false, "page.vue").unwrap_err();
        assert_eq!(err.code, ERR_JSON_MACRO_ARGS);
    }

    #[test]
    fn relative_imports_become_absolute() {
        let source = "import shared from './shared'\ndefineComponentJson(shared)\n";
        let extraction = extract_json_macros(source, false, "/project/src/comp.vue").unwrap();
        assert!(extraction.has_imports);
        assert!(extraction.module.unwrap().contains("import shared from 'file:///project/src/./shared'"));
    }

    #[test]
    fn conflicts_across_blocks() {
        let page = extract_json_macros("definePageJson({})\n", false, "a.vue").unwrap();
        let app = extract_json_macros("defineAppJson({})\n", false, "a.vue").unwrap();
        let none = extract_json_macros("const a = 1\n", false, "a.vue").unwrap();
        assert_eq!(macro_name(&[&page, &none], "a.vue").unwrap().as_deref(), Some("definePageJson"));
        assert_eq!(macro_name(&[&none], "a.vue").unwrap(), None);
        assert!(macro_name(&[&page, &app], "a.vue").is_err());
    }

    #[test]
    fn explicit_cache_dir_wins() {
        let options = JsonOptions {
            macro_cache_dir: Some(PathBuf::from("/tmp/custom")),
            ..Default::default()
        };
        assert_eq!(macro_cache_dir("src/a.vue", &options), PathBuf::from("/tmp/custom"));
    }

    fn node_available() -> bool {
        which::which("node").is_ok()
    }

    #[test]
    fn evaluates_with_node() {
        if !node_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let options = JsonOptions {
            macro_cache_dir: Some(dir.path().join("macro")),
            ..Default::default()
        };
        let source = "const title = 'Home'\ndefinePageJson(async () => ({ navigationBarTitleText: title, list: [1, 2] }))\ndefinePageJson({ extra: true })\n";
        let extraction = extract_json_macros(source, false, "/virtual/page.vue").unwrap();
        let value = evaluate_json_macros(&extraction, "/virtual/page.vue", &options)
            .unwrap()
            .unwrap();
        assert_eq!(value["navigationBarTitleText"], "Home");
        assert_eq!(value["list"], serde_json::json!([1, 2]));
        assert_eq!(value["extra"], true);
        assert!(!dir.path().join("macro").exists());
    }

    #[test]
    fn non_object_results_are_rejected() {
        if !node_available() {
            return;
        }
        clear_json_macro_cache();
        let dir = tempfile::tempdir().unwrap();
        let options = JsonOptions {
            macro_cache_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        for source in [
            "definePageJson([1])\n",
            "definePageJson({ fn: () => 1 })\n",
            "definePageJson({ s: Symbol('x') })\n",
            "definePageJson(() => { const a = {}; a.self = a; return a })\n",
            "definePageJson(new Map())\n",
        ] {
            let extraction = extract_json_macros(source, false, "/virtual/page.vue").unwrap();
            let err = evaluate_json_macros(&extraction, "/virtual/page.vue", &options).unwrap_err();
            assert_eq!(err.code, ERR_JSON_MACRO_SHAPE, "{}", source);
        }
    }

    #[test]
    fn runtime_failures_are_eval_errors() {
        if !node_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let options = JsonOptions {
            macro_cache_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let extraction = extract_json_macros("definePageJson(() => { throw new Error('boom') })\n", false, "/virtual/page.vue").unwrap();
        let err = evaluate_json_macros(&extraction, "/virtual/page.vue", &options).unwrap_err();
        assert_eq!(err.code, ERR_JSON_MACRO_EVAL);
        assert!(err.message.contains("boom"));
    }
}

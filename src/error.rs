use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════════
// ERROR CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const ERR_SFC_PARSE: &str = "W-ERR-SFC-PARSE";
pub const ERR_TEMPLATE_PARSE: &str = "W-ERR-TEMPLATE-PARSE";
pub const ERR_SCRIPT_PARSE: &str = "W-ERR-SCRIPT-PARSE";
pub const ERR_JSON_BLOCK: &str = "W-ERR-JSON-BLOCK";
pub const ERR_JSON_MACRO_CONFLICT: &str = "W-ERR-JSON-MACRO-CONFLICT";
pub const ERR_JSON_MACRO_ARGS: &str = "W-ERR-JSON-MACRO-ARGS";
pub const ERR_JSON_MACRO_EVAL: &str = "W-ERR-JSON-MACRO-EVAL";
pub const ERR_JSON_MACRO_SHAPE: &str = "W-ERR-JSON-MACRO-SHAPE";
pub const ERR_JSON_MERGE: &str = "W-ERR-JSON-MERGE";

/// A fatal compile error. Any `CompilerError` aborts the whole file: no
/// template, script or config is produced for it.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("[{code}] {message} ({file}:{line}:{column})")]
pub struct CompilerError {
    pub code: String,
    pub message: String,
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub hints: Vec<String>,
}

impl CompilerError {
    pub fn new(code: &str, message: &str, file: &str, line: u32, column: u32) -> Self {
        Self::with_hints(code, message, file, line, column, vec![])
    }

    pub fn with_hints(
        code: &str,
        message: &str,
        file: &str,
        line: u32,
        column: u32,
        hints: Vec<String>,
    ) -> Self {
        CompilerError {
            code: code.to_string(),
            message: message.to_string(),
            file: file.to_string(),
            line,
            column,
            hints,
        }
    }

    /// Error without a meaningful source position (the whole file is at fault).
    pub fn at_file(code: &str, message: &str, file: &str) -> Self {
        Self::new(code, message, file, 1, 1)
    }

    pub fn hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }
}

pub type CompileResultOf<T> = Result<T, CompilerError>;

/// 1-based line/column of a byte offset.
pub fn line_col(source: &str, offset: usize) -> (u32, u32) {
    let offset = offset.min(source.len());
    let mut line = 1u32;
    let mut col = 1u32;
    for (i, ch) in source.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code_and_position() {
        let err = CompilerError::new(ERR_TEMPLATE_PARSE, "Unclosed <view>", "a.vue", 3, 7);
        assert_eq!(err.to_string(), "[W-ERR-TEMPLATE-PARSE] Unclosed <view> (a.vue:3:7)");
    }

    #[test]
    fn line_col_counts_newlines() {
        let src = "ab\ncd\nef";
        assert_eq!(line_col(src, 0), (1, 1));
        assert_eq!(line_col(src, 4), (2, 2));
        assert_eq!(line_col(src, 6), (3, 1));
    }
}

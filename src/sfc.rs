//! Single-file component block splitting.

use crate::error::{line_col, CompilerError, ERR_SFC_PARSE};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

lazy_static! {
    static ref BLOCK_OPEN_RE: Regex = Regex::new(r"<([A-Za-z][\w-]*)((?:\s[^>]*?)?)(/?)>").unwrap();
    static ref BLOCK_ATTR_RE: Regex =
        Regex::new(r#"([^\s=/>]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+)))?"#).unwrap();
    static ref TEMPLATE_TAG_RE: Regex = Regex::new(r"<(/?)template(\s[^>]*?)?(/?)>").unwrap();
    static ref COMMENT_RE: Regex = Regex::new(r"(?s)<!--.*?-->").unwrap();
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SfcBlock {
    pub content: String,
    pub attrs: Vec<(String, Option<String>)>,
    /// Number of lines before the block content in the whole file.
    pub line_offset: u32,
}

impl SfcBlock {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_deref().unwrap_or(""))
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|(n, _)| n == name)
    }

    pub fn lang(&self) -> Option<&str> {
        self.attr("lang")
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SfcDescriptor {
    pub template: Option<SfcBlock>,
    pub script: Option<SfcBlock>,
    pub script_setup: Option<SfcBlock>,
    pub styles: Vec<SfcBlock>,
    pub json: Option<SfcBlock>,
}

fn parse_block_attrs(raw: &str) -> Vec<(String, Option<String>)> {
    BLOCK_ATTR_RE
        .captures_iter(raw)
        .filter_map(|cap| {
            let name = cap.get(1)?.as_str().to_string();
            let value = cap
                .get(2)
                .or_else(|| cap.get(3))
                .or_else(|| cap.get(4))
                .map(|m| m.as_str().to_string());
            Some((name, value))
        })
        .collect()
}

/// End offset (start of `</template>`) of a template block whose content
/// starts at `from`, honouring nested `<template>` elements.
fn find_template_end(source: &str, from: usize) -> Option<(usize, usize)> {
    let mut depth = 1usize;
    for cap in TEMPLATE_TAG_RE.captures_iter(&source[from..]) {
        let Some(whole) = cap.get(0) else { continue };
        let closing = cap.get(1).is_some_and(|m| !m.as_str().is_empty());
        let self_closing = cap.get(3).is_some_and(|m| !m.as_str().is_empty());
        if closing {
            depth -= 1;
            if depth == 0 {
                return Some((from + whole.start(), from + whole.end()));
            }
        } else if !self_closing {
            depth += 1;
        }
    }
    None
}

fn sfc_error(source: &str, filename: &str, offset: usize, message: &str) -> CompilerError {
    let (line, column) = line_col(source, offset);
    CompilerError::new(ERR_SFC_PARSE, message, filename, line, column)
}

/// Splits a `.vue` source into its top-level blocks. Unknown custom blocks
/// are skipped and reported in the returned warnings.
pub fn parse_sfc(source: &str, filename: &str) -> Result<(SfcDescriptor, Vec<String>), CompilerError> {
    // Blank out comments while keeping offsets stable.
    let scan: String = COMMENT_RE
        .replace_all(source, |caps: &regex::Captures| {
            caps[0]
                .chars()
                .map(|c| if c == '\n' { '\n' } else { ' ' })
                .collect::<String>()
        })
        .into_owned();

    let mut descriptor = SfcDescriptor::default();
    let mut warnings = Vec::new();
    let mut cursor = 0usize;

    while let Some(cap) = BLOCK_OPEN_RE.captures(&scan[cursor..]) {
        let Some(whole) = cap.get(0) else { break };
        let tag = cap[1].to_string();
        let attrs = parse_block_attrs(cap.get(2).map_or("", |m| m.as_str()));
        let open_start = cursor + whole.start();
        let content_start = cursor + whole.end();

        if cap.get(3).is_some_and(|m| !m.as_str().is_empty()) {
            cursor = content_start;
            continue;
        }

        let (content_end, block_end) = if tag == "template" {
            find_template_end(&scan, content_start)
        } else {
            let closing = format!("</{}>", tag);
            scan[content_start..]
                .find(&closing)
                .map(|i| (content_start + i, content_start + i + closing.len()))
        }
        .ok_or_else(|| {
            sfc_error(source, filename, open_start, &format!("Unterminated <{}> block", tag))
        })?;

        let block = SfcBlock {
            content: source[content_start..content_end].to_string(),
            attrs,
            line_offset: line_col(source, content_start).0 - 1,
        };

        match tag.as_str() {
            "template" => {
                if descriptor.template.is_some() {
                    return Err(sfc_error(source, filename, open_start, "Duplicate <template> block"));
                }
                descriptor.template = Some(block);
            }
            "script" if block.has_attr("setup") => {
                if descriptor.script_setup.is_some() {
                    return Err(sfc_error(source, filename, open_start, "Duplicate <script setup> block"));
                }
                descriptor.script_setup = Some(block);
            }
            "script" => {
                if descriptor.script.is_some() {
                    return Err(sfc_error(source, filename, open_start, "Duplicate <script> block"));
                }
                descriptor.script = Some(block);
            }
            "style" => descriptor.styles.push(block),
            "json" => {
                if descriptor.json.is_some() {
                    return Err(sfc_error(source, filename, open_start, "Duplicate <json> block"));
                }
                descriptor.json = Some(block);
            }
            other => warnings.push(format!("Custom block <{}> is ignored", other)),
        }
        cursor = block_end;
    }

    Ok((descriptor, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_blocks_with_nested_templates() {
        let src = "<template>\n  <view><template v-if=\"a\">x</template></view>\n</template>\n<script setup lang=\"ts\">\nconst a = 1\n</script>\n<style scoped>.a{}</style>\n<json>{\"navigationBarTitleText\":\"Hi\"}</json>";
        let (sfc, warnings) = parse_sfc(src, "a.vue").unwrap();
        assert!(warnings.is_empty());
        let template = sfc.template.unwrap();
        assert!(template.content.contains("<template v-if=\"a\">x</template>"));
        assert_eq!(template.line_offset, 0);
        let setup = sfc.script_setup.unwrap();
        assert_eq!(setup.lang(), Some("ts"));
        assert_eq!(setup.line_offset, 3);
        assert!(sfc.script.is_none());
        assert_eq!(sfc.styles.len(), 1);
        assert!(sfc.json.unwrap().content.contains("Hi"));
    }

    #[test]
    fn commented_blocks_are_ignored() {
        let src = "<!-- <script>bad</script> -->\n<script>export default {}</script>";
        let (sfc, _) = parse_sfc(src, "a.vue").unwrap();
        assert_eq!(sfc.script.unwrap().content, "export default {}");
    }

    #[test]
    fn custom_blocks_warn() {
        let (_, warnings) = parse_sfc("<i18n>{}</i18n>", "a.vue").unwrap();
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn unterminated_and_duplicate_blocks_fail() {
        let err = parse_sfc("<template><view/>", "a.vue").unwrap_err();
        assert_eq!(err.code, ERR_SFC_PARSE);
        let err = parse_sfc("<template></template><template></template>", "a.vue").unwrap_err();
        assert!(err.message.contains("Duplicate"));
    }
}

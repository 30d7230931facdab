//! Template parser.
//!
//! A small Vue-aware tokenizer producing the [`crate::ir`] tree. Tag and
//! attribute case is preserved (component names and `:propName` bindings
//! depend on it), any element may self-close, and `{{ }}` interpolations are
//! scanned as opaque expressions so `<` and `>` inside them are not markup.

use crate::error::{line_col, CompilerError, ERR_TEMPLATE_PARSE};
use crate::ir::{
    Attr, CommentNode, Directive, DirectiveKind, ElementNode, InterpolationNode, SourceLocation,
    StaticAttr, TemplateNode, TextNode,
};
use lazy_static::lazy_static;
use std::collections::HashSet;

lazy_static! {
    static ref VOID_TAGS: HashSet<&'static str> = [
        "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
        "source", "track", "wbr",
    ]
    .into_iter()
    .collect();

    /// Elements whose content is kept verbatim.
    static ref RAW_TEXT_TAGS: HashSet<&'static str> =
        ["script", "style", "wxs", "sjs", "import-sjs"].into_iter().collect();
}

pub fn is_void_tag(tag: &str) -> bool {
    VOID_TAGS.contains(tag)
}

/// Splits an attribute name into a directive, or `None` for plain attributes.
///
/// Handles `v-name:arg.mod`, `:arg`, `@arg`, `#arg`, `.prop` and dynamic
/// arguments (`:[key]`).
pub fn parse_directive_name(name: &str) -> Option<(DirectiveKind, Option<String>, bool, Vec<String>)> {
    let (kind, rest) = if let Some(rest) = name.strip_prefix("v-") {
        let end = rest.find([':', '.']).unwrap_or(rest.len());
        let kind = DirectiveKind::from_name(&rest[..end]);
        let rest = &rest[end..];
        let rest = rest.strip_prefix(':').map(|r| (true, r)).unwrap_or((false, rest));
        (kind, rest)
    } else if let Some(rest) = name.strip_prefix(':') {
        (DirectiveKind::Bind, (true, rest))
    } else if let Some(rest) = name.strip_prefix('@') {
        (DirectiveKind::On, (true, rest))
    } else if let Some(rest) = name.strip_prefix('#') {
        (DirectiveKind::Slot, (true, rest))
    } else if let Some(rest) = name.strip_prefix('.') {
        let (arg, _, mut modifiers) = split_arg(rest);
        modifiers.insert(0, "prop".to_string());
        return Some((DirectiveKind::Bind, arg, false, modifiers));
    } else {
        return None;
    };

    let (has_arg, rest) = rest;
    if has_arg {
        let (arg, dynamic, modifiers) = split_arg(rest);
        Some((kind, arg, dynamic, modifiers))
    } else {
        let modifiers = rest
            .split('.')
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .collect();
        Some((kind, None, false, modifiers))
    }
}

fn split_arg(rest: &str) -> (Option<String>, bool, Vec<String>) {
    let (arg, dynamic, tail) = if let Some(inner) = rest.strip_prefix('[') {
        match inner.find(']') {
            Some(end) => (&inner[..end], true, &inner[end + 1..]),
            None => (inner, true, ""),
        }
    } else {
        let end = rest.find('.').unwrap_or(rest.len());
        (&rest[..end], false, &rest[end..])
    };
    let modifiers = tail
        .split('.')
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect();
    let arg = if arg.is_empty() { None } else { Some(arg.to_string()) };
    (arg, dynamic, modifiers)
}

fn make_attr(name: &str, value: Option<String>, loc: SourceLocation) -> Attr {
    match parse_directive_name(name) {
        Some((kind, arg, dynamic_arg, modifiers)) => Attr::Directive(Directive {
            kind,
            arg,
            dynamic_arg,
            modifiers,
            exp: value,
            raw_name: name.to_string(),
            loc,
        }),
        None => Attr::Static(StaticAttr {
            name: name.to_string(),
            value,
        }),
    }
}

struct TemplateParser<'s> {
    src: &'s str,
    pos: usize,
    file: &'s str,
    line_offset: u32,
    stack: Vec<ElementNode>,
    roots: Vec<TemplateNode>,
}

impl<'s> TemplateParser<'s> {
    fn loc(&self, offset: usize) -> SourceLocation {
        let (line, column) = line_col(self.src, offset);
        SourceLocation {
            line: line + self.line_offset,
            column,
        }
    }

    fn error(&self, message: String, offset: usize) -> CompilerError {
        let loc = self.loc(offset);
        CompilerError::new(ERR_TEMPLATE_PARSE, &message, self.file, loc.line, loc.column)
    }

    fn rest(&self) -> &'s str {
        &self.src[self.pos..]
    }

    fn append(&mut self, node: TemplateNode) {
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.roots.push(node),
        }
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();
    }

    fn run(mut self) -> Result<Vec<TemplateNode>, CompilerError> {
        while self.pos < self.src.len() {
            let rest = self.rest();
            if rest.starts_with("<!--") {
                self.comment()?;
            } else if rest.starts_with("</") {
                self.close_tag()?;
            } else if starts_tag(rest) {
                self.open_tag()?;
            } else {
                self.text()?;
            }
        }
        if let Some(open) = self.stack.last() {
            let loc = open.loc;
            return Err(CompilerError::new(
                ERR_TEMPLATE_PARSE,
                &format!("Element <{}> is never closed", open.tag),
                self.file,
                loc.line,
                loc.column,
            ));
        }
        Ok(self.roots)
    }

    fn comment(&mut self) -> Result<(), CompilerError> {
        let start = self.pos;
        let body_start = start + 4;
        match self.src[body_start..].find("-->") {
            Some(end) => {
                let value = self.src[body_start..body_start + end].to_string();
                self.pos = body_start + end + 3;
                self.append(TemplateNode::Comment(CommentNode { value }));
                Ok(())
            }
            None => Err(self.error("Unterminated comment".to_string(), start)),
        }
    }

    fn close_tag(&mut self) -> Result<(), CompilerError> {
        let start = self.pos;
        let Some(end) = self.rest().find('>') else {
            return Err(self.error("Unterminated closing tag".to_string(), start));
        };
        let name = self.src[start + 2..start + end].trim().to_string();
        self.pos = start + end + 1;
        match self.stack.pop() {
            Some(open) if open.tag == name => {
                self.append(TemplateNode::Element(open));
                Ok(())
            }
            Some(open) => Err(self.error(
                format!("Closing tag </{}> does not match <{}>", name, open.tag),
                start,
            )),
            None => Err(self.error(format!("Unexpected closing tag </{}>", name), start)),
        }
    }

    fn open_tag(&mut self) -> Result<(), CompilerError> {
        let start = self.pos;
        let loc = self.loc(start);
        self.pos += 1;
        let name_len = self
            .rest()
            .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
            .unwrap_or(self.rest().len());
        let tag = self.rest()[..name_len].to_string();
        self.pos += name_len;

        let mut element = ElementNode::new(tag);
        element.loc = loc;
        loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.is_empty() {
                return Err(self.error(format!("Unterminated start tag <{}>", element.tag), start));
            }
            if rest.starts_with("/>") {
                self.pos += 2;
                element.self_closing = true;
                break;
            }
            if rest.starts_with('>') {
                self.pos += 1;
                break;
            }
            let attr_start = self.pos;
            let attr = self.attribute()?;
            let (name, value) = attr;
            if name.is_empty() {
                // Stray `/` or similar; skip a character to make progress.
                self.pos = attr_start + self.rest().chars().next().map_or(1, char::len_utf8);
                continue;
            }
            element.attrs.push(make_attr(&name, value, self.loc(attr_start)));
        }

        if element.self_closing || is_void_tag(&element.tag) {
            self.append(TemplateNode::Element(element));
            return Ok(());
        }
        if RAW_TEXT_TAGS.contains(element.tag.as_str()) {
            let closing = format!("</{}", element.tag);
            let Some(end) = self.rest().find(&closing) else {
                return Err(CompilerError::new(
                    ERR_TEMPLATE_PARSE,
                    &format!("Element <{}> is never closed", element.tag),
                    self.file,
                    loc.line,
                    loc.column,
                ));
            };
            let content = self.rest()[..end].to_string();
            self.pos += end;
            let text_loc = self.loc(self.pos);
            if !content.is_empty() {
                element.children.push(TemplateNode::Text(TextNode {
                    value: content,
                    loc: text_loc,
                }));
            }
            self.stack.push(element);
            return self.close_tag();
        }
        self.stack.push(element);
        Ok(())
    }

    fn attribute(&mut self) -> Result<(String, Option<String>), CompilerError> {
        let rest = self.rest();
        let mut bracket = 0usize;
        let mut len = 0usize;
        for (i, c) in rest.char_indices() {
            match c {
                '[' => bracket += 1,
                ']' => bracket = bracket.saturating_sub(1),
                c if bracket == 0 && (c.is_whitespace() || c == '=' || c == '>') => break,
                '/' if bracket == 0 && rest[i..].starts_with("/>") => break,
                _ => {}
            }
            len = i + c.len_utf8();
        }
        let name = rest[..len].to_string();
        self.pos += len;
        self.skip_whitespace();
        if !self.rest().starts_with('=') {
            return Ok((name, None));
        }
        self.pos += 1;
        self.skip_whitespace();
        let rest = self.rest();
        let value_start = self.pos;
        match rest.chars().next() {
            Some(quote @ ('"' | '\'')) => match rest[1..].find(quote) {
                Some(end) => {
                    let value = rest[1..1 + end].to_string();
                    self.pos += end + 2;
                    Ok((name, Some(value)))
                }
                None => Err(self.error(
                    format!("Unterminated value for attribute `{}`", name),
                    value_start,
                )),
            },
            _ => {
                let end = rest
                    .find(|c: char| c.is_whitespace() || c == '>')
                    .unwrap_or(rest.len());
                let value = rest[..end].to_string();
                self.pos += end;
                Ok((name, Some(value)))
            }
        }
    }

    fn text(&mut self) -> Result<(), CompilerError> {
        let start = self.pos;
        let mut i = start;
        let bytes = self.src.as_bytes();
        while i < self.src.len() {
            let rest = &self.src[i..];
            if rest.starts_with("{{") {
                match find_mustache_end(&rest[2..]) {
                    Some(end) => i += 2 + end + 2,
                    None => return Err(self.error("Unterminated interpolation".to_string(), i)),
                }
                continue;
            }
            if bytes[i] == b'<' && (rest.starts_with("</") || rest.starts_with("<!--") || starts_tag(rest)) {
                break;
            }
            i += rest.chars().next().map_or(1, char::len_utf8);
        }
        if i == start {
            // A lone `<` that opens nothing.
            i += 1;
        }
        let src = self.src;
        let chunk = &src[start..i];
        self.pos = i;
        for node in split_interpolations(chunk, start, self) {
            self.append(node);
        }
        Ok(())
    }
}

fn starts_tag(rest: &str) -> bool {
    let mut chars = rest.chars();
    chars.next() == Some('<') && chars.next().is_some_and(|c| c.is_ascii_alphabetic())
}

/// Offset of the closing `}}`, ignoring braces inside string literals.
fn find_mustache_end(body: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in body.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => quote = Some(c),
            '}' if body[i..].starts_with("}}") && !body[i + 2..].starts_with('}') => return Some(i),
            _ => {}
        }
    }
    None
}

fn split_interpolations(chunk: &str, base: usize, parser: &TemplateParser<'_>) -> Vec<TemplateNode> {
    let mut nodes = Vec::new();
    let mut cursor = 0usize;
    while let Some(open) = chunk[cursor..].find("{{") {
        let open = cursor + open;
        let Some(end) = find_mustache_end(&chunk[open + 2..]) else {
            break;
        };
        if open > cursor {
            nodes.push(TemplateNode::Text(TextNode {
                value: chunk[cursor..open].to_string(),
                loc: parser.loc(base + cursor),
            }));
        }
        nodes.push(TemplateNode::Interpolation(InterpolationNode {
            expression: chunk[open + 2..open + 2 + end].trim().to_string(),
            loc: parser.loc(base + open),
        }));
        cursor = open + 2 + end + 2;
    }
    if cursor < chunk.len() {
        nodes.push(TemplateNode::Text(TextNode {
            value: chunk[cursor..].to_string(),
            loc: parser.loc(base + cursor),
        }));
    }
    nodes
}

/// Parses template markup. `line_offset` shifts reported lines so errors
/// point into the enclosing `.vue` file.
pub fn parse_template(
    source: &str,
    file_path: &str,
    line_offset: u32,
) -> Result<Vec<TemplateNode>, CompilerError> {
    TemplateParser {
        src: source,
        pos: 0,
        file: file_path,
        line_offset,
        stack: Vec::new(),
        roots: Vec::new(),
    }
    .run()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(nodes: &[TemplateNode], i: usize) -> &ElementNode {
        nodes[i].as_element().expect("element")
    }

    #[test]
    fn preserves_case_and_self_closing() {
        let nodes = parse_template("<MyButton :isActive=\"on\" />", "a.vue", 0).unwrap();
        let el = element(&nodes, 0);
        assert_eq!(el.tag, "MyButton");
        assert!(el.self_closing);
        match &el.attrs[0] {
            Attr::Directive(d) => {
                assert_eq!(d.kind, DirectiveKind::Bind);
                assert_eq!(d.arg.as_deref(), Some("isActive"));
                assert_eq!(d.exp.as_deref(), Some("on"));
            }
            other => panic!("expected directive, got {:?}", other),
        }
    }

    #[test]
    fn interpolation_may_contain_markup_characters() {
        let nodes = parse_template("<view>{{ a < b ? '}' : c }} tail</view>", "a.vue", 0).unwrap();
        let el = element(&nodes, 0);
        assert_eq!(el.children.len(), 2);
        match &el.children[0] {
            TemplateNode::Interpolation(i) => assert_eq!(i.expression, "a < b ? '}' : c"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn directive_names() {
        let (kind, arg, dynamic, mods) = parse_directive_name("@tap.stop.capture").unwrap();
        assert_eq!(kind, DirectiveKind::On);
        assert_eq!(arg.as_deref(), Some("tap"));
        assert!(!dynamic);
        assert_eq!(mods, vec!["stop", "capture"]);

        let (kind, arg, _, _) = parse_directive_name("v-on:update:modelValue").unwrap();
        assert_eq!(kind, DirectiveKind::On);
        assert_eq!(arg.as_deref(), Some("update:modelValue"));

        let (kind, arg, dynamic, _) = parse_directive_name(":[key]").unwrap();
        assert_eq!(kind, DirectiveKind::Bind);
        assert_eq!(arg.as_deref(), Some("key"));
        assert!(dynamic);

        let (kind, _, _, mods) = parse_directive_name("v-model.trim").unwrap();
        assert_eq!(kind, DirectiveKind::Model);
        assert_eq!(mods, vec!["trim"]);

        let (kind, arg, _, _) = parse_directive_name("#item").unwrap();
        assert_eq!(kind, DirectiveKind::Slot);
        assert_eq!(arg.as_deref(), Some("item"));

        assert_eq!(
            parse_directive_name("v-focus").map(|d| d.0),
            Some(DirectiveKind::Custom("focus".into()))
        );
        assert!(parse_directive_name("class").is_none());
        assert!(parse_directive_name("bind:tap").is_none());
    }

    #[test]
    fn void_and_boolean_attributes() {
        let nodes = parse_template("<input disabled value=abc><text>x</text>", "a.vue", 0).unwrap();
        assert_eq!(nodes.len(), 2);
        let input = element(&nodes, 0);
        assert_eq!(input.static_attr("disabled").unwrap().value, None);
        assert_eq!(input.static_attr("value").unwrap().value.as_deref(), Some("abc"));
    }

    #[test]
    fn errors_carry_positions() {
        let err = parse_template("<view>\n  <text>\n</view>", "a.vue", 0).unwrap_err();
        assert_eq!(err.code, ERR_TEMPLATE_PARSE);
        assert_eq!(err.line, 3);

        let err = parse_template("<view>", "a.vue", 4).unwrap_err();
        assert_eq!(err.line, 5);

        assert!(parse_template("<view>{{ a </view>", "a.vue", 0).is_err());
        assert!(parse_template("<view class=\"a></view>", "a.vue", 0).is_err());
    }

    #[test]
    fn raw_text_tags_keep_content() {
        let nodes = parse_template("<wxs module=\"m\">var a = 1 < 2;</wxs>", "a.vue", 0).unwrap();
        let el = element(&nodes, 0);
        match &el.children[0] {
            TemplateNode::Text(t) => assert_eq!(t.value, "var a = 1 < 2;"),
            other => panic!("unexpected {:?}", other),
        }
    }
}

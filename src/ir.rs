use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════════
// TEMPLATE IR
// Produced by `parse::parse_template` and by the JSX lowerer; consumed by the
// element compiler.
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TemplateNode {
    Element(ElementNode),
    Text(TextNode),
    Interpolation(InterpolationNode),
    Comment(CommentNode),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementNode {
    pub tag: String,
    pub attrs: Vec<Attr>,
    pub children: Vec<TemplateNode>,
    pub self_closing: bool,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    pub value: String,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpolationNode {
    pub expression: String,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentNode {
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Attr {
    Static(StaticAttr),
    Directive(Directive),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticAttr {
    pub name: String,
    /// `None` for boolean attributes (`<input disabled>`).
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DirectiveKind {
    Bind,
    On,
    Model,
    Show,
    If,
    ElseIf,
    Else,
    For,
    Slot,
    Html,
    Text,
    Once,
    Pre,
    Cloak,
    Memo,
    Custom(String),
}

impl DirectiveKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            "bind" => DirectiveKind::Bind,
            "on" => DirectiveKind::On,
            "model" => DirectiveKind::Model,
            "show" => DirectiveKind::Show,
            "if" => DirectiveKind::If,
            "else-if" => DirectiveKind::ElseIf,
            "else" => DirectiveKind::Else,
            "for" => DirectiveKind::For,
            "slot" => DirectiveKind::Slot,
            "html" => DirectiveKind::Html,
            "text" => DirectiveKind::Text,
            "once" => DirectiveKind::Once,
            "pre" => DirectiveKind::Pre,
            "cloak" => DirectiveKind::Cloak,
            "memo" => DirectiveKind::Memo,
            other => DirectiveKind::Custom(other.to_string()),
        }
    }

    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            DirectiveKind::If | DirectiveKind::ElseIf | DirectiveKind::Else | DirectiveKind::For
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Directive {
    pub kind: DirectiveKind,
    pub arg: Option<String>,
    /// `:[name]`; the target templates cannot express computed attribute names.
    pub dynamic_arg: bool,
    pub modifiers: Vec<String>,
    pub exp: Option<String>,
    pub raw_name: String,
    pub loc: SourceLocation,
}

impl Directive {
    pub fn has_modifier(&self, name: &str) -> bool {
        self.modifiers.iter().any(|m| m == name)
    }

    pub fn exp_trimmed(&self) -> Option<&str> {
        self.exp.as_deref().map(str::trim).filter(|e| !e.is_empty())
    }
}

impl ElementNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
            self_closing: false,
            loc: SourceLocation::default(),
        }
    }

    pub fn directive(&self, kind: &DirectiveKind) -> Option<&Directive> {
        self.attrs.iter().find_map(|a| match a {
            Attr::Directive(d) if &d.kind == kind => Some(d),
            _ => None,
        })
    }

    pub fn has_directive(&self, kind: &DirectiveKind) -> bool {
        self.directive(kind).is_some()
    }

    pub fn static_attr(&self, name: &str) -> Option<&StaticAttr> {
        self.attrs.iter().find_map(|a| match a {
            Attr::Static(s) if s.name == name => Some(s),
            _ => None,
        })
    }

    /// Static value, or the expression of `:name`.
    pub fn bound_attr(&self, name: &str) -> Option<(bool, String)> {
        for attr in &self.attrs {
            match attr {
                Attr::Static(s) if s.name == name => {
                    return Some((false, s.value.clone().unwrap_or_default()))
                }
                Attr::Directive(d)
                    if d.kind == DirectiveKind::Bind && d.arg.as_deref() == Some(name) =>
                {
                    return Some((true, d.exp.clone().unwrap_or_default()))
                }
                _ => {}
            }
        }
        None
    }
}

impl TemplateNode {
    pub fn as_element(&self) -> Option<&ElementNode> {
        match self {
            TemplateNode::Element(el) => Some(el),
            _ => None,
        }
    }

    /// Whitespace-only text and comments; skipped between `v-if` branches.
    pub fn is_ignorable(&self) -> bool {
        match self {
            TemplateNode::Text(t) => t.value.trim().is_empty(),
            TemplateNode::Comment(_) => true,
            _ => false,
        }
    }
}

//! Block model
//!
//! Defines the typed content blocks exchanged with the remote store and the
//! canonical string used to compare them.
//!
//! A block's canonical string ([`Block::comparable`]) depends only on its
//! type and payload, never on its remote id or position, so two blocks with
//! the same canonical string are interchangeable for diffing.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Remote type names
mod types {
    pub const HEADING_1: &str = "heading_1";
    pub const HEADING_2: &str = "heading_2";
    pub const HEADING_3: &str = "heading_3";
    pub const PARAGRAPH: &str = "paragraph";
    pub const BULLETED: &str = "bulleted_list_item";
    pub const NUMBERED: &str = "numbered_list_item";
    pub const TO_DO: &str = "to_do";
    pub const CODE: &str = "code";
    pub const IMAGE: &str = "image";
}

/// Language used for code blocks that don't name one
pub const DEFAULT_CODE_LANGUAGE: &str = "plain text";

/// A span of rich text with inline styling
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RichText {
    pub content: String,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub code: bool,
    #[serde(default)]
    pub strikethrough: bool,
    #[serde(default)]
    pub link: Option<String>,
}

impl RichText {
    /// Create an unstyled span
    pub fn plain(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    /// Check if two spans carry the same styling
    pub fn same_style(&self, other: &RichText) -> bool {
        self.bold == other.bold
            && self.italic == other.italic
            && self.code == other.code
            && self.strikethrough == other.strikethrough
            && self.link == other.link
    }

    /// Render this span with its styles folded into markdown markers
    pub fn render(&self) -> String {
        self.wrap(self.content.clone(), self.link.clone())
    }

    /// Markdown rendering with marker characters in the text escaped
    ///
    /// Only styling produces bare markers, so a literal `**hi**` and a bold
    /// `hi` never encode the same way.
    fn canonical(&self) -> String {
        let link = self.link.as_deref().map(|url| escape(url, LINK_SPECIALS));
        self.wrap(escape(&self.content, TEXT_SPECIALS), link)
    }

    fn wrap(&self, mut out: String, link: Option<String>) -> String {
        if self.code {
            out = format!("`{}`", out);
        }
        if self.strikethrough {
            out = format!("~~{}~~", out);
        }
        if self.italic {
            out = format!("*{}*", out);
        }
        if self.bold {
            out = format!("**{}**", out);
        }
        if let Some(url) = link {
            out = format!("[{}]({})", out, url);
        }
        out
    }

    fn from_remote(value: &Value) -> Self {
        let content = value
            .pointer("/text/content")
            .or_else(|| value.get("plain_text"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let link = value
            .pointer("/text/link/url")
            .or_else(|| value.get("href"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let flag = |name: &str| {
            value
                .get("annotations")
                .and_then(|a| a.get(name))
                .and_then(Value::as_bool)
                .unwrap_or(false)
        };

        Self {
            content,
            bold: flag("bold"),
            italic: flag("italic"),
            code: flag("code"),
            strikethrough: flag("strikethrough"),
            link,
        }
    }

    fn to_remote(&self) -> Value {
        json!({
            "type": "text",
            "text": {
                "content": self.content,
                "link": self.link.as_ref().map(|url| json!({ "url": url })),
            },
            "annotations": {
                "bold": self.bold,
                "italic": self.italic,
                "code": self.code,
                "strikethrough": self.strikethrough,
            },
        })
    }
}

/// Render a sequence of spans into one deterministic string
pub fn render_rich_text(spans: &[RichText]) -> String {
    spans.iter().map(RichText::render).collect()
}

const TEXT_SPECIALS: &[char] = &['\\', '*', '~', '`', '[', ']', '(', ')'];
const LINK_SPECIALS: &[char] = &['\\', '(', ')'];
const LANGUAGE_SPECIALS: &[char] = &['\\', ':'];
const URL_SPECIALS: &[char] = &['\\', '|'];

fn escape(text: &str, specials: &[char]) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if specials.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Canonical encoding of a span sequence
///
/// Empty spans render nothing whatever their style and are skipped.
fn canonical_text(spans: &[RichText]) -> String {
    spans
        .iter()
        .filter(|span| !span.content.is_empty())
        .map(RichText::canonical)
        .collect()
}

/// Where an image is stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "url", rename_all = "snake_case")]
pub enum ImageSource {
    /// Linked from an external url
    External(String),
    /// Uploaded to and served by the remote store
    Hosted(String),
}

impl ImageSource {
    pub fn url(&self) -> &str {
        match self {
            ImageSource::External(url) | ImageSource::Hosted(url) => url,
        }
    }
}

/// Type-specific payload of a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockContent {
    #[serde(rename = "heading_1")]
    Heading1 { text: Vec<RichText> },
    #[serde(rename = "heading_2")]
    Heading2 { text: Vec<RichText> },
    #[serde(rename = "heading_3")]
    Heading3 { text: Vec<RichText> },
    Paragraph { text: Vec<RichText> },
    BulletedListItem { text: Vec<RichText> },
    NumberedListItem { text: Vec<RichText> },
    ToDo { text: Vec<RichText>, checked: bool },
    Code { text: Vec<RichText>, language: String },
    Image { source: ImageSource, caption: Vec<RichText> },
    /// A remote block type outside the supported set
    Unsupported { type_name: String },
}

/// A unit of document content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Remote id; absent for blocks authored locally
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub content: BlockContent,
}

impl Block {
    /// Create a local block (no remote id)
    pub fn new(content: BlockContent) -> Self {
        Self { id: None, content }
    }

    /// Attach a remote id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::new(BlockContent::Paragraph {
            text: vec![RichText::plain(text)],
        })
    }

    pub fn heading_1(text: impl Into<String>) -> Self {
        Self::new(BlockContent::Heading1 {
            text: vec![RichText::plain(text)],
        })
    }

    pub fn bulleted(text: impl Into<String>) -> Self {
        Self::new(BlockContent::BulletedListItem {
            text: vec![RichText::plain(text)],
        })
    }

    pub fn todo(text: impl Into<String>, checked: bool) -> Self {
        Self::new(BlockContent::ToDo {
            text: vec![RichText::plain(text)],
            checked,
        })
    }

    pub fn code(text: impl Into<String>, language: impl Into<String>) -> Self {
        Self::new(BlockContent::Code {
            text: vec![RichText::plain(text)],
            language: language.into(),
        })
    }

    /// Remote type name of this block
    pub fn type_name(&self) -> &str {
        match &self.content {
            BlockContent::Heading1 { .. } => types::HEADING_1,
            BlockContent::Heading2 { .. } => types::HEADING_2,
            BlockContent::Heading3 { .. } => types::HEADING_3,
            BlockContent::Paragraph { .. } => types::PARAGRAPH,
            BlockContent::BulletedListItem { .. } => types::BULLETED,
            BlockContent::NumberedListItem { .. } => types::NUMBERED,
            BlockContent::ToDo { .. } => types::TO_DO,
            BlockContent::Code { .. } => types::CODE,
            BlockContent::Image { .. } => types::IMAGE,
            BlockContent::Unsupported { type_name } => type_name.as_str(),
        }
    }

    /// Rich text carried by this block, if its type has any
    pub fn text(&self) -> &[RichText] {
        match &self.content {
            BlockContent::Heading1 { text }
            | BlockContent::Heading2 { text }
            | BlockContent::Heading3 { text }
            | BlockContent::Paragraph { text }
            | BlockContent::BulletedListItem { text }
            | BlockContent::NumberedListItem { text }
            | BlockContent::ToDo { text, .. }
            | BlockContent::Code { text, .. } => text.as_slice(),
            BlockContent::Image { caption, .. } => caption.as_slice(),
            BlockContent::Unsupported { .. } => &[],
        }
    }

    /// Canonical string used as the equality oracle when diffing
    ///
    /// Two blocks are identical iff their canonical strings match.
    pub fn comparable(&self) -> String {
        let type_name = self.type_name();
        match &self.content {
            BlockContent::ToDo { text, checked } => format!(
                "{}:[{}]{}",
                type_name,
                if *checked { "x" } else { " " },
                canonical_text(text)
            ),
            BlockContent::Code { text, language } => format!(
                "{}:{}:{}",
                type_name,
                escape(language, LANGUAGE_SPECIALS),
                canonical_text(text)
            ),
            BlockContent::Image { source, caption } => format!(
                "{}:{}|{}",
                type_name,
                escape(source.url(), URL_SPECIALS),
                canonical_text(caption)
            ),
            BlockContent::Unsupported { .. } => format!("{}:", type_name),
            _ => format!("{}:{}", type_name, canonical_text(self.text())),
        }
    }

    /// Decode a block from its remote JSON shape
    ///
    /// Unknown types and missing payloads decode to [`BlockContent::Unsupported`]
    /// or to empty text rather than failing.
    pub fn from_remote(value: &Value) -> Self {
        let id = value.get("id").and_then(Value::as_str).map(str::to_string);
        let type_name = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let payload = value.get(&type_name).cloned().unwrap_or(Value::Null);

        let rich_text = |key: &str| -> Vec<RichText> {
            payload
                .get(key)
                .and_then(Value::as_array)
                .map(|spans| spans.iter().map(RichText::from_remote).collect())
                .unwrap_or_default()
        };

        let content = match type_name.as_str() {
            types::HEADING_1 => BlockContent::Heading1 {
                text: rich_text("rich_text"),
            },
            types::HEADING_2 => BlockContent::Heading2 {
                text: rich_text("rich_text"),
            },
            types::HEADING_3 => BlockContent::Heading3 {
                text: rich_text("rich_text"),
            },
            types::PARAGRAPH => BlockContent::Paragraph {
                text: rich_text("rich_text"),
            },
            types::BULLETED => BlockContent::BulletedListItem {
                text: rich_text("rich_text"),
            },
            types::NUMBERED => BlockContent::NumberedListItem {
                text: rich_text("rich_text"),
            },
            types::TO_DO => BlockContent::ToDo {
                text: rich_text("rich_text"),
                checked: payload
                    .get("checked")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            },
            types::CODE => BlockContent::Code {
                text: rich_text("rich_text"),
                language: payload
                    .get("language")
                    .and_then(Value::as_str)
                    .unwrap_or(DEFAULT_CODE_LANGUAGE)
                    .to_string(),
            },
            types::IMAGE => {
                let hosted = payload.get("type").and_then(Value::as_str) == Some("file");
                let url = payload
                    .pointer(if hosted { "/file/url" } else { "/external/url" })
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                BlockContent::Image {
                    source: if hosted {
                        ImageSource::Hosted(url)
                    } else {
                        ImageSource::External(url)
                    },
                    caption: rich_text("caption"),
                }
            }
            _ => BlockContent::Unsupported { type_name },
        };

        Self { id, content }
    }

    /// Type-specific payload in remote JSON shape
    ///
    /// Hosted images are written back as external links; the remote store
    /// does not accept hosted file references on write.
    pub fn payload_to_remote(&self) -> Value {
        let spans = |text: &[RichText]| -> Value {
            Value::Array(text.iter().map(RichText::to_remote).collect())
        };

        match &self.content {
            BlockContent::ToDo { text, checked } => json!({
                "rich_text": spans(text),
                "checked": checked,
            }),
            BlockContent::Code { text, language } => json!({
                "rich_text": spans(text),
                "language": language,
            }),
            BlockContent::Image { source, caption } => json!({
                "type": "external",
                "external": { "url": source.url() },
                "caption": spans(caption),
            }),
            BlockContent::Unsupported { .. } => Value::Object(Map::new()),
            _ => json!({ "rich_text": spans(self.text()) }),
        }
    }

    /// Encode this block as a remote child object (for appends)
    pub fn to_remote(&self) -> Value {
        let mut object = Map::new();
        object.insert("object".to_string(), json!("block"));
        object.insert("type".to_string(), json!(self.type_name()));
        object.insert(self.type_name().to_string(), self.payload_to_remote());
        Value::Object(object)
    }

    /// Encode this block as the body of an in-place update
    pub fn to_remote_update(&self) -> Value {
        let mut object = Map::new();
        object.insert(self.type_name().to_string(), self.payload_to_remote());
        Value::Object(object)
    }
}

//! Markdown conversion for local documents
//!
//! The sync orchestrator consumes lines through [`BlockParser`] and the CLI
//! prints pulled pages through [`BlockRenderer`]. [`Markdown`] implements
//! both for a small line-oriented dialect:
//!
//! ```text
//! # Heading 1 / ## Heading 2 / ### Heading 3
//! - bullet or * bullet
//! 1. numbered item
//! - [ ] open todo / - [x] done todo
//! ```lang ... ``` fenced code
//! ![caption](url)
//! anything else is a paragraph
//! ```
//!
//! Inline styles: `**bold**`, `*italic*`, `` `code` ``, `~~strike~~` and
//! `[text](url)`. Blank lines separate blocks and produce none.

use crate::block::{Block, BlockContent, ImageSource, RichText, DEFAULT_CODE_LANGUAGE};

/// Turns lines of local content into blocks
pub trait BlockParser {
    fn parse(&self, lines: &[String]) -> Vec<Block>;
}

/// Turns blocks into lines of local content
pub trait BlockRenderer {
    fn render(&self, blocks: &[Block]) -> Vec<String>;
}

const FENCE: &str = "```";

#[derive(Debug, Clone, Copy, Default)]
pub struct Markdown;

impl BlockParser for Markdown {
    fn parse(&self, lines: &[String]) -> Vec<Block> {
        let mut blocks = Vec::new();
        let mut iter = lines.iter();

        while let Some(line) = iter.next() {
            let line = line.trim_end();
            if line.trim().is_empty() {
                continue;
            }

            if let Some(language) = line.trim_start().strip_prefix(FENCE) {
                let body: Vec<&str> = iter
                    .by_ref()
                    .map(|l| l.trim_end_matches(['\r', '\n']))
                    .take_while(|l| !l.trim_start().starts_with(FENCE))
                    .collect();
                let language = match language.trim() {
                    "" => DEFAULT_CODE_LANGUAGE,
                    lang => lang,
                };
                blocks.push(Block::code(body.join("\n"), language));
                continue;
            }

            blocks.push(parse_line(line));
        }

        blocks
    }
}

impl BlockRenderer for Markdown {
    fn render(&self, blocks: &[Block]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut number = 0;

        for block in blocks {
            if !matches!(block.content, BlockContent::NumberedListItem { .. }) {
                number = 0;
            }

            match &block.content {
                BlockContent::Heading1 { text } => lines.push(format!("# {}", inline(text))),
                BlockContent::Heading2 { text } => lines.push(format!("## {}", inline(text))),
                BlockContent::Heading3 { text } => lines.push(format!("### {}", inline(text))),
                BlockContent::Paragraph { text } => lines.push(inline(text)),
                BlockContent::BulletedListItem { text } => {
                    lines.push(format!("- {}", inline(text)))
                }
                BlockContent::NumberedListItem { text } => {
                    number += 1;
                    lines.push(format!("{}. {}", number, inline(text)));
                }
                BlockContent::ToDo { text, checked } => lines.push(format!(
                    "- [{}] {}",
                    if *checked { "x" } else { " " },
                    inline(text)
                )),
                BlockContent::Code { text, language } => {
                    let language = if language == DEFAULT_CODE_LANGUAGE {
                        ""
                    } else {
                        language.as_str()
                    };
                    lines.push(format!("{}{}", FENCE, language));
                    let body: String = text.iter().map(|s| s.content.as_str()).collect();
                    lines.extend(body.lines().map(String::from));
                    lines.push(FENCE.to_string());
                }
                BlockContent::Image { source, caption } => {
                    lines.push(format!("![{}]({})", inline(caption), source.url()))
                }
                // no markdown form; dropped from the rendered document
                BlockContent::Unsupported { .. } => continue,
            }
        }

        lines
    }
}

fn inline(spans: &[RichText]) -> String {
    crate::block::render_rich_text(spans)
}

/// Classify one non-blank line outside a code fence
fn parse_line(line: &str) -> Block {
    let content = if let Some(rest) = line.strip_prefix("### ") {
        BlockContent::Heading3 { text: parse_inline(rest) }
    } else if let Some(rest) = line.strip_prefix("## ") {
        BlockContent::Heading2 { text: parse_inline(rest) }
    } else if let Some(rest) = line.strip_prefix("# ") {
        BlockContent::Heading1 { text: parse_inline(rest) }
    } else if let Some((checked, rest)) = todo_item(line) {
        BlockContent::ToDo {
            text: parse_inline(rest),
            checked,
        }
    } else if let Some(rest) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
        BlockContent::BulletedListItem { text: parse_inline(rest) }
    } else if let Some(rest) = numbered_item(line) {
        BlockContent::NumberedListItem { text: parse_inline(rest) }
    } else if let Some((caption, url)) = image(line) {
        BlockContent::Image {
            source: ImageSource::External(url.to_string()),
            caption: parse_inline(caption),
        }
    } else {
        BlockContent::Paragraph { text: parse_inline(line) }
    };

    Block::new(content)
}

fn todo_item(line: &str) -> Option<(bool, &str)> {
    let mut chars = line.strip_prefix("- [")?.chars();
    let mark = chars.next()?;
    let rest = chars.as_str().strip_prefix("] ")?;
    match mark {
        ' ' => Some((false, rest)),
        'x' | 'X' => Some((true, rest)),
        _ => None,
    }
}

fn numbered_item(line: &str) -> Option<&str> {
    let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    line[digits..].strip_prefix(". ")
}

/// `![caption](url)` spanning the whole line
fn image(line: &str) -> Option<(&str, &str)> {
    let inner = line.strip_prefix("![")?.strip_suffix(')')?;
    let (caption, url) = inner.rsplit_once("](")?;
    if url.is_empty() {
        return None;
    }
    Some((caption, url))
}

/// Split inline markdown into styled spans, merging neighbours that share a style
pub fn parse_inline(text: &str) -> Vec<RichText> {
    let mut spans = Vec::new();
    parse_styled(text, &RichText::default(), &mut spans);

    let mut merged: Vec<RichText> = Vec::with_capacity(spans.len());
    for span in spans {
        match merged.last_mut() {
            Some(last) if last.same_style(&span) => last.content.push_str(&span.content),
            _ => merged.push(span),
        }
    }
    merged
}

fn parse_styled(text: &str, style: &RichText, out: &mut Vec<RichText>) {
    let mut plain = String::new();
    let mut rest = text;

    while !rest.is_empty() {
        // code spans are literal
        if let Some((inner, after)) = delimited(rest, "`") {
            flush(&mut plain, style, out);
            out.push(RichText {
                content: inner.to_string(),
                code: true,
                ..style.clone()
            });
            rest = after;
            continue;
        }

        let nested = if let Some((inner, after)) = delimited(rest, "**") {
            Some((inner, after, RichText { bold: true, ..style.clone() }))
        } else if let Some((inner, after)) = delimited(rest, "~~") {
            Some((inner, after, RichText { strikethrough: true, ..style.clone() }))
        } else if let Some((inner, after)) = delimited(rest, "*") {
            Some((inner, after, RichText { italic: true, ..style.clone() }))
        } else if let Some((label, url, after)) = link(rest) {
            Some((label, after, RichText { link: Some(url.to_string()), ..style.clone() }))
        } else {
            None
        };

        match nested {
            Some((inner, after, inner_style)) => {
                flush(&mut plain, style, out);
                parse_styled(inner, &inner_style, out);
                rest = after;
            }
            None => {
                let mut chars = rest.chars();
                if let Some(ch) = chars.next() {
                    plain.push(ch);
                }
                rest = chars.as_str();
            }
        }
    }

    flush(&mut plain, style, out);
}

fn flush(plain: &mut String, style: &RichText, out: &mut Vec<RichText>) {
    if !plain.is_empty() {
        out.push(RichText {
            content: std::mem::take(plain),
            ..style.clone()
        });
    }
}

/// Split `marker inner marker rest` into `(inner, rest)`
///
/// The closing marker absorbs a directly following run of the same
/// character, so `***x***` nests as bold around italic. Outside code spans
/// the inner text may not start or end with whitespace.
fn delimited<'a>(text: &'a str, marker: &str) -> Option<(&'a str, &'a str)> {
    let body = text.strip_prefix(marker)?;
    let mut end = body.find(marker)?;
    if end == 0 {
        return None;
    }
    let repeat = marker.chars().next()?;
    while body[end + marker.len()..].starts_with(repeat) {
        end += repeat.len_utf8();
    }

    let inner = &body[..end];
    if repeat != '`'
        && (inner.starts_with(char::is_whitespace) || inner.ends_with(char::is_whitespace))
    {
        return None;
    }
    Some((inner, &body[end + marker.len()..]))
}

/// Split `[label](url)rest` into `(label, url, rest)`
fn link(text: &str) -> Option<(&str, &str, &str)> {
    let body = text.strip_prefix('[')?;
    let (label, tail) = body.split_once("](")?;
    let (url, rest) = tail.split_once(')')?;
    if label.is_empty() || url.is_empty() {
        return None;
    }
    Some((label, url, rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(String::from).collect()
    }

    fn parse(text: &str) -> Vec<Block> {
        Markdown.parse(&lines(text))
    }

    fn comparables(text: &str) -> Vec<String> {
        parse(text).iter().map(Block::comparable).collect()
    }

    #[test]
    fn test_block_kinds() {
        let got = comparables(
            "# One\n## Two\n### Three\n\nplain text\n- dash\n* star\n12. twelve\n- [ ] open\n- [X] done\n![a cat](https://img/cat.png)",
        );
        assert_eq!(
            got,
            vec![
                "heading_1:One",
                "heading_2:Two",
                "heading_3:Three",
                "paragraph:plain text",
                "bulleted_list_item:dash",
                "bulleted_list_item:star",
                "numbered_list_item:twelve",
                "to_do:[ ]open",
                "to_do:[x]done",
                "image:https://img/cat.png|a cat",
            ]
        );
    }

    #[test]
    fn test_blank_lines_produce_nothing() {
        assert!(parse("").is_empty());
        assert!(parse("\n  \n\t\n").is_empty());
    }

    #[test]
    fn test_prefix_without_space_is_paragraph() {
        assert_eq!(
            comparables("#hashtag\n-dash\n3.14 pi"),
            vec!["paragraph:#hashtag", "paragraph:-dash", "paragraph:3.14 pi"]
        );
    }

    #[test]
    fn test_code_fence() {
        let blocks = parse("intro\n```rust\nfn main() {}\n\n  let x = 1;\n```\nafter");
        assert_eq!(blocks.len(), 3);
        assert_eq!(
            blocks[1].content,
            BlockContent::Code {
                text: vec![RichText::plain("fn main() {}\n\n  let x = 1;")],
                language: "rust".to_string(),
            }
        );
        assert_eq!(blocks[2].comparable(), "paragraph:after");
    }

    #[test]
    fn test_code_fence_without_language_or_close() {
        let blocks = parse("```\n# not a heading");
        assert_eq!(blocks.len(), 1);
        assert_eq!(
            blocks[0].comparable(),
            format!("code:{}:# not a heading", DEFAULT_CODE_LANGUAGE)
        );
    }

    #[test]
    fn test_inline_styles() {
        let spans = parse_inline("a **b** *c* `d` ~~e~~ [f](https://f.io)");
        let styled: Vec<(&str, bool, bool, bool, bool, Option<&str>)> = spans
            .iter()
            .map(|s| {
                (
                    s.content.as_str(),
                    s.bold,
                    s.italic,
                    s.code,
                    s.strikethrough,
                    s.link.as_deref(),
                )
            })
            .collect();

        assert_eq!(
            styled,
            vec![
                ("a ", false, false, false, false, None),
                ("b", true, false, false, false, None),
                (" ", false, false, false, false, None),
                ("c", false, true, false, false, None),
                (" ", false, false, false, false, None),
                ("d", false, false, true, false, None),
                (" ", false, false, false, false, None),
                ("e", false, false, false, true, None),
                (" ", false, false, false, false, None),
                ("f", false, false, false, false, Some("https://f.io")),
            ]
        );
    }

    #[test]
    fn test_nested_styles() {
        let spans = parse_inline("***both***");
        assert_eq!(spans.len(), 1);
        assert!(spans[0].bold && spans[0].italic);
        assert_eq!(spans[0].content, "both");

        let spans = parse_inline("[**bold link**](https://x.y)");
        assert_eq!(spans.len(), 1);
        assert!(spans[0].bold);
        assert_eq!(spans[0].link.as_deref(), Some("https://x.y"));
    }

    #[test]
    fn test_code_span_is_literal() {
        let spans = parse_inline("`**not bold**`");
        assert_eq!(spans.len(), 1);
        assert!(spans[0].code);
        assert!(!spans[0].bold);
        assert_eq!(spans[0].content, "**not bold**");
    }

    #[test]
    fn test_unclosed_markers_stay_plain() {
        let spans = parse_inline("2 * 3 = 6 and **open");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].content, "2 * 3 = 6 and **open");
        assert_eq!(spans[0], RichText::plain("2 * 3 = 6 and **open"));
    }

    #[test]
    fn test_render() {
        let blocks = vec![
            Block::heading_1("Title"),
            Block::new(BlockContent::NumberedListItem { text: vec![RichText::plain("a")] }),
            Block::new(BlockContent::NumberedListItem { text: vec![RichText::plain("b")] }),
            Block::paragraph("between"),
            Block::new(BlockContent::NumberedListItem { text: vec![RichText::plain("c")] }),
            Block::todo("done", true),
            Block::code("x = 1\ny = 2", "python"),
            Block::code("raw", DEFAULT_CODE_LANGUAGE),
            Block::new(BlockContent::Unsupported { type_name: "divider".into() }),
            Block::new(BlockContent::Image {
                source: ImageSource::Hosted("https://files/x.png".into()),
                caption: vec![],
            }),
        ];

        assert_eq!(
            Markdown.render(&blocks),
            vec![
                "# Title",
                "1. a",
                "2. b",
                "between",
                "1. c",
                "- [x] done",
                "```python",
                "x = 1",
                "y = 2",
                "```",
                "```",
                "raw",
                "```",
                "![](https://files/x.png)",
            ]
        );
    }

    #[test]
    fn test_render_then_parse_keeps_comparables() {
        let text = "# Notes\n\n- **bold** and *it*\n- [ ] task with `code`\n1. one\n2. two\n```sh\nls -la\n```\n![pic](https://a/b.png)\n~~gone~~ [home](https://h.io)";
        let blocks = parse(text);
        let rendered = Markdown.render(&blocks);
        let reparsed = Markdown.parse(&rendered);

        let before: Vec<String> = blocks.iter().map(Block::comparable).collect();
        let after: Vec<String> = reparsed.iter().map(Block::comparable).collect();
        assert_eq!(before, after);
    }
}

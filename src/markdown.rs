//! The built-in [`Converter`] for markdown files with optional YAML
//! front-matter. Each file is structured as follows:
//!
//! ```md
//! ---
//! title: Hello, *world*!
//! summary: A short greeting.
//! ---
//! # Hello
//!
//! World
//! ```
//!
//! The front-matter block is optional. When present it must open on the
//! first line of the file and close with `---` (or `...`) on a line of its
//! own.

use crate::document::{format_by_extension, Converter, Document, Error, Meta, MetaValue, Result};
use pulldown_cmark::{html, Options, Parser};
use serde_yaml::{Mapping, Value};
use std::path::Path;

const FORMAT: &str = "markdown";
const EXTENSIONS: &[(&str, &str)] = &[("md", FORMAT), ("markdown", FORMAT)];

/// Reads markdown files with [`pulldown_cmark`] and their front-matter with
/// [`serde_yaml`].
#[derive(Clone, Copy, Debug, Default)]
pub struct MarkdownConverter;

impl Converter for MarkdownConverter {
    fn format(&self, path: &Path) -> Option<&'static str> {
        format_by_extension(EXTENSIONS, path)
    }

    fn read(&self, path: &Path, format: &str) -> Result<Document> {
        if format != FORMAT {
            return Err(Error::UnsupportedFormat(format.to_owned()));
        }
        let input = std::fs::read_to_string(path).map_err(|err| Error::Read {
            path: path.to_owned(),
            err,
        })?;
        parse(&input)
    }

    fn write_html(&self, document: &Document) -> Result<String> {
        Ok(to_html(document.body()))
    }
}

/// Splits `input` into front-matter and body and parses the front-matter.
/// The document body stays markdown until [`Converter::write_html`].
pub fn parse(input: &str) -> Result<Document> {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);
    match split_frontmatter(input)? {
        None => Ok(Document::new(Meta::new(), input.to_owned())),
        Some((yaml, body)) if yaml.trim().is_empty() => {
            Ok(Document::new(Meta::new(), body.to_owned()))
        }
        Some((yaml, body)) => {
            let meta = match serde_yaml::from_str(yaml)? {
                Value::Null => Meta::new(),
                Value::Mapping(mapping) => meta_map(mapping)?,
                _ => {
                    return Err(Error::Malformed(
                        "front-matter must be a mapping".to_owned(),
                    ))
                }
            };
            Ok(Document::new(meta, body.to_owned()))
        }
    }
}

/// Converts markdown to HTML with footnotes, smart punctuation,
/// strikethrough, tables, and task lists enabled.
pub fn to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_SMART_PUNCTUATION);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, Parser::new_ext(markdown, options));
    out
}

// Returns `(yaml, body)` when `input` opens with a front-matter fence.
fn split_frontmatter(input: &str) -> Result<Option<(&str, &str)>> {
    const FENCE: &str = "---";
    const END_FENCE_ALT: &str = "...";

    let first_line_end = input.find('\n').unwrap_or(input.len());
    if input[..first_line_end].trim_end() != FENCE {
        return Ok(None);
    }

    let yaml_start = (first_line_end + 1).min(input.len());
    let mut offset = yaml_start;
    for line in input[yaml_start..].split_inclusive('\n') {
        let next = offset + line.len();
        let line = line.trim_end();
        if line == FENCE || line == END_FENCE_ALT {
            return Ok(Some((&input[yaml_start..offset], &input[next..])));
        }
        offset = next;
    }
    Err(Error::FrontmatterMissingEndFence)
}

fn meta_map(mapping: Mapping) -> Result<Meta> {
    let mut meta = Meta::new();
    for (key, value) in mapping {
        let key = match key {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => {
                return Err(Error::Malformed(
                    "front-matter keys must be scalars".to_owned(),
                ))
            }
        };
        meta.insert(key, meta_value(value)?);
    }
    Ok(meta)
}

fn meta_value(value: Value) -> Result<MetaValue> {
    Ok(match value {
        Value::Null => MetaValue::Scalar(String::new()),
        Value::Bool(b) => MetaValue::Scalar(b.to_string()),
        Value::Number(n) => MetaValue::Scalar(n.to_string()),
        Value::String(s) => string_value(&s),
        Value::Sequence(seq) => MetaValue::List(
            seq.into_iter().map(meta_value).collect::<Result<_>>()?,
        ),
        Value::Mapping(mapping) => MetaValue::Map(meta_map(mapping)?),
        Value::Tagged(tagged) => MetaValue::Unknown(format!("tagged {}", tagged.tag)),
    })
}

// Renders a front-matter string as HTML. Text that renders to a single
// paragraph is inline and loses the paragraph wrapper; anything else (several
// paragraphs, a list, a heading) is block content.
fn string_value(text: &str) -> MetaValue {
    let html = to_html(text);
    let trimmed = html.trim();
    if trimmed.is_empty() {
        return MetaValue::Inlines(String::new());
    }
    match trimmed
        .strip_prefix("<p>")
        .and_then(|s| s.strip_suffix("</p>"))
    {
        Some(inner) if !inner.contains("<p>") => MetaValue::Inlines(inner.trim().to_owned()),
        _ => MetaValue::Blocks(trimmed.to_owned()),
    }
}

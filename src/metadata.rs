//! Derives a page's [`Metadata`] from its source path and its document's
//! front-matter. See [`extract`] for the full set of keys.

use crate::document::{Document, Meta, MetaValue};
use chrono::{DateTime, Local, NaiveDate};
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;
use url::Url;

/// A page's metadata: every value a template can refer to by name.
pub type Metadata = BTreeMap<String, String>;

/// Keys that are always derived from the source path. Front-matter can't
/// override these, because the page's output location and index membership
/// depend on them.
const PATH_KEYS: &[&str] = &["relpath", "outpath", "category", "url"];

/// How a page's `summary` is filled in when its front-matter has none.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SummaryMode {
    /// Leave it empty.
    #[default]
    Field,

    /// Use the contents of the first paragraph of the rendered page.
    Paragraph,

    /// Use the first N words of the rendered page with tags stripped.
    Words(usize),
}

/// Where pages come from and where they go.
#[derive(Clone, Copy, Debug)]
pub struct Roots<'a> {
    /// The directory containing the source tree.
    pub content: &'a Path,

    /// The directory the site is written into.
    pub output: &'a Path,

    /// The public base URL of the site, ending in `/`. When set, each page
    /// gets a `url` key.
    pub site_url: Option<&'a Url>,
}

/// Builds the metadata for the page whose source is `path`.
///
/// Path-derived keys:
///
/// * `date`: the `YYYY-MM-DD-` prefix of the file name, or the file's
///   modification date.
/// * `slug` and `title`: the rest of the file name, without extension.
/// * `relpath`: the output path relative to the output root, ending in
///   `.html`; `outpath` is the same joined onto the output root.
/// * `category`: the first directory under the content root, or empty for
///   pages at the root.
/// * `url`: `relpath` resolved against the site URL.
///
/// The flattened front-matter is merged over these (except for the
/// path-owned keys), then `date` is validated and `rfc_2822_date` derived
/// from it. `summary` defaults to empty.
pub fn extract(path: &Path, document: &Document, roots: &Roots) -> Result<Metadata> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::InvalidFileName(path.to_owned()))?;
    let (date, slug) = split_basename(stem);
    let date = match date {
        Some(date) => date.to_owned(),
        None => modified_date(path)?,
    };
    let location = locate(path, roots.content)?;

    let mut meta = Metadata::new();
    meta.insert("date".to_owned(), date);
    meta.insert("slug".to_owned(), slug.to_owned());
    meta.insert("title".to_owned(), slug.to_owned());

    for (key, value) in flatten(&document.meta)? {
        if PATH_KEYS.contains(&key.as_str()) {
            log::debug!("ignoring front-matter key `{}` in {}", key, path.display());
            continue;
        }
        meta.insert(key, value);
    }

    meta.insert(
        "outpath".to_owned(),
        roots.output.join(&location.relpath).display().to_string(),
    );
    if let Some(site_url) = roots.site_url {
        if let Ok(url) = site_url.join(&location.relpath) {
            meta.insert("url".to_owned(), url.to_string());
        }
    }
    meta.insert("relpath".to_owned(), location.relpath);
    meta.insert("category".to_owned(), location.category);

    let (date, rfc_2822_date) = parse_date(&meta["date"])?;
    meta.insert("date".to_owned(), date);
    meta.insert("rfc_2822_date".to_owned(), rfc_2822_date);
    meta.entry("summary".to_owned()).or_default();

    Ok(meta)
}

fn basename_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // should never fail; the pattern is a constant
        Regex::new(r"^(?:(\d{4}-\d{2}-\d{2})-)?(.+)$").unwrap()
    })
}

/// Splits a file stem into its optional `YYYY-MM-DD` date prefix and the
/// remaining slug.
pub fn split_basename(stem: &str) -> (Option<&str>, &str) {
    match basename_pattern().captures(stem) {
        Some(caps) => (
            caps.get(1).map(|m| m.as_str()),
            caps.get(2).map_or(stem, |m| m.as_str()),
        ),
        None => (None, stem),
    }
}

/// Formats the last-modified time of `path` as a local `YYYY-MM-DD` date.
pub fn modified_date(path: &Path) -> Result<String> {
    let modified = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|err| Error::Io {
            path: path.to_owned(),
            err,
        })?;
    Ok(DateTime::<Local>::from(modified)
        .format("%Y-%m-%d")
        .to_string())
}

/// A page's position in the output tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
    /// The `/`-separated output path relative to the output root.
    pub relpath: String,

    /// The first directory under the content root; empty for root pages.
    pub category: String,
}

/// Computes where the page sourced from `path` lands relative to the output
/// root, and which category it belongs to.
pub fn locate(path: &Path, content_root: &Path) -> Result<Location> {
    let relative = path
        .strip_prefix(content_root)
        .map_err(|_| Error::OutsideContentRoot(path.to_owned()))?
        .with_extension("html");

    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => segments.push(
                segment
                    .to_str()
                    .ok_or_else(|| Error::InvalidFileName(path.to_owned()))?,
            ),
            _ => return Err(Error::InvalidFileName(path.to_owned())),
        }
    }

    let category = match segments.len() {
        0 => return Err(Error::InvalidFileName(path.to_owned())),
        1 => String::new(),
        _ => segments[0].to_owned(),
    };
    Ok(Location {
        relpath: segments.join("/"),
        category,
    })
}

/// Flattens front-matter into string values. Nested maps contribute dotted
/// keys (`author.name`). Lists, blocks, and unknown node kinds are rejected.
pub fn flatten(meta: &Meta) -> Result<Metadata> {
    fn flatten_into(prefix: Option<&str>, meta: &Meta, out: &mut Metadata) -> Result<()> {
        for (key, value) in meta {
            let key = match prefix {
                Some(prefix) => format!("{}.{}", prefix, key),
                None => key.clone(),
            };
            match value {
                MetaValue::Map(inner) => flatten_into(Some(&key), inner, out)?,
                MetaValue::Inlines(html) => {
                    out.insert(key, html.trim().to_owned());
                }
                MetaValue::Scalar(raw) => {
                    out.insert(key, raw.clone());
                }
                other => {
                    return Err(Error::MetadataType {
                        kind: other.kind().to_owned(),
                        key,
                    })
                }
            }
        }
        Ok(())
    }

    let mut out = Metadata::new();
    flatten_into(None, meta, &mut out)?;
    Ok(out)
}

/// Validates a `YYYY-MM-DD` date, returning it normalized along with its
/// RFC 2822 form at midnight UTC.
pub fn parse_date(date: &str) -> Result<(String, String)> {
    let parsed = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").map_err(|err| {
        Error::DateFormat {
            date: date.to_owned(),
            err,
        }
    })?;
    Ok((
        parsed.format("%Y-%m-%d").to_string(),
        parsed.format("%a, %d %b %Y 00:00:00 +0000").to_string(),
    ))
}

// Elements whose boundaries separate words when tags are stripped.
const BLOCK_TAGS: &[&str] = &[
    "p", "br", "hr", "h1", "h2", "h3", "h4", "h5", "h6", "li", "ul", "ol", "dl", "dt",
    "dd", "div", "blockquote", "pre", "table", "tr", "td", "th", "figure", "figcaption",
];

/// Derives a summary from a page's rendered HTML.
pub fn summarize(html: &str, mode: SummaryMode) -> String {
    fn first_paragraph() -> &'static Regex {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        PATTERN.get_or_init(|| Regex::new(r"(?s)<p>(.*?)</p>").unwrap())
    }
    fn tag() -> &'static Regex {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        PATTERN.get_or_init(|| Regex::new(r"<\s*/?\s*([^\s>/]*)[^>]*>").unwrap())
    }

    match mode {
        SummaryMode::Field => String::new(),
        SummaryMode::Paragraph => first_paragraph()
            .captures(html)
            .map(|caps| caps[1].trim().to_owned())
            .unwrap_or_default(),
        SummaryMode::Words(limit) => {
            // Block boundaries separate words; inline tags vanish so that
            // punctuation stays attached to the text before it.
            let text = tag().replace_all(html, |caps: &Captures| {
                if BLOCK_TAGS.contains(&caps[1].to_ascii_lowercase().as_str()) {
                    " "
                } else {
                    ""
                }
            });
            let mut words = text.split_whitespace();
            let mut summary = words.by_ref().take(limit).collect::<Vec<_>>().join(" ");
            if words.next().is_some() {
                summary.push_str("...");
            }
            summary
        }
    }
}

/// The result of a metadata operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a problem deriving a page's metadata.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when the front-matter contains a node kind that can't be
    /// flattened into a string.
    #[error("front-matter key `{key}` has unsupported kind `{kind}`")]
    MetadataType { key: String, kind: String },

    /// Returned when a page's date isn't a valid `YYYY-MM-DD` date.
    #[error("invalid date `{date}`: {err}")]
    DateFormat {
        date: String,
        #[source]
        err: chrono::ParseError,
    },

    /// Returned when the source file's modification time can't be read.
    #[error("reading metadata of `{}`: {err}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        err: std::io::Error,
    },

    /// Returned when a page isn't under the content root.
    #[error("`{}` is outside the content directory", .0.display())]
    OutsideContentRoot(PathBuf),

    /// Returned when a source path isn't valid UTF-8 or has no file name.
    #[error("invalid file name: {}", .0.display())]
    InvalidFileName(PathBuf),
}

//! Defines the [`Converter`] seam between the site pipeline and whatever
//! turns source documents into HTML, along with the [`Document`] and
//! [`MetaValue`] types converters produce.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A document's front-matter, keyed by field name.
pub type Meta = BTreeMap<String, MetaValue>;

/// One node of a document's front-matter tree.
///
/// Only [`MetaValue::Map`], [`MetaValue::Inlines`], and [`MetaValue::Scalar`]
/// can be flattened into page metadata. The remaining kinds are kept so that
/// [`crate::metadata`] can report exactly what it refused.
#[derive(Clone, Debug, PartialEq)]
pub enum MetaValue {
    /// A nested mapping of field names to values.
    Map(Meta),

    /// Inline text, already rendered to HTML by the converter.
    Inlines(String),

    /// A raw string, number, or boolean.
    Scalar(String),

    /// A list of values.
    List(Vec<MetaValue>),

    /// Block-level content (paragraphs, lists, ...), rendered to HTML.
    Blocks(String),

    /// Anything the converter itself doesn't recognize, by kind name.
    Unknown(String),
}

impl MetaValue {
    /// The name of this node's kind, for error messages.
    pub fn kind(&self) -> &str {
        match self {
            MetaValue::Map(_) => "map",
            MetaValue::Inlines(_) => "inlines",
            MetaValue::Scalar(_) => "scalar",
            MetaValue::List(_) => "list",
            MetaValue::Blocks(_) => "blocks",
            MetaValue::Unknown(kind) => kind,
        }
    }
}

/// A converted source document: its front-matter plus a body whose encoding
/// belongs to the [`Converter`] that produced it.
#[derive(Clone, Debug)]
pub struct Document {
    pub meta: Meta,
    body: String,
}

impl Document {
    pub fn new(meta: Meta, body: String) -> Document {
        Document { meta, body }
    }

    /// The converter-owned body. Only the converter that created the
    /// document knows how to interpret it.
    pub fn body(&self) -> &str {
        &self.body
    }
}

/// Converts source files into [`Document`]s and documents into HTML.
pub trait Converter: Send + Sync {
    /// Maps a file's extension onto the input format this converter reads.
    /// Files without a format are copied into the site verbatim.
    fn format(&self, path: &Path) -> Option<&'static str>;

    /// Reads and parses the file at `path` as `format`.
    fn read(&self, path: &Path, format: &str) -> Result<Document>;

    /// Serializes a document produced by [`Converter::read`] as HTML.
    fn write_html(&self, document: &Document) -> Result<String>;
}

/// Looks up `path`'s lowercased extension in a table of
/// `(extension, format)` pairs.
pub fn format_by_extension(
    table: &[(&str, &'static str)],
    path: &Path,
) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    table
        .iter()
        .find(|(candidate, _)| *candidate == ext)
        .map(|(_, format)| *format)
}

/// The result of a conversion.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a failure to read or serialize a document.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when the source file couldn't be read.
    #[error("reading `{}`: {err}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        err: std::io::Error,
    },

    /// Returned when the converter doesn't handle the requested format.
    #[error("unsupported format `{0}`")]
    UnsupportedFormat(String),

    /// Returned when the front-matter block has an opening fence but no
    /// closing one.
    #[error("front-matter is missing its closing `---`")]
    FrontmatterMissingEndFence,

    /// Returned when the front-matter isn't valid YAML.
    #[error("front-matter: {0}")]
    DeserializeYaml(#[from] serde_yaml::Error),

    /// Returned when the converter's JSON output can't be parsed.
    #[error("document tree: {0}")]
    DeserializeJson(#[from] serde_json::Error),

    /// Returned when the converter's output doesn't have the expected shape.
    #[error("malformed document tree: {0}")]
    Malformed(String),

    /// Returned when an external converter couldn't be run or failed.
    #[error("running `{program}`: {message}")]
    External { program: String, message: String },
}

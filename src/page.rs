//! Defines [`Page`], a converted content file together with its metadata,
//! and the [`Error`] taxonomy for pages that can't be built.

use crate::document::{self, Converter};
use crate::metadata::{self, Metadata, Roots, SummaryMode};
use crate::template::{render, Context};
use crate::util::write_file;
use std::path::{Path, PathBuf};

/// One content file, converted and ready to render.
#[derive(Clone, Debug)]
pub struct Page {
    /// The page's metadata. See [`metadata::extract`].
    pub meta: Metadata,

    /// The page body as HTML.
    pub content: String,

    /// Where the rendered page is written.
    pub output_path: PathBuf,
}

impl Page {
    /// Converts the file at `path` (declared as `format`) and derives its
    /// metadata. When the front-matter has no `summary`, one is derived from
    /// the page body according to `summary`.
    pub fn read(
        path: &Path,
        format: &str,
        converter: &dyn Converter,
        roots: &Roots,
        summary: SummaryMode,
    ) -> Result<Page> {
        let document = converter.read(path, format)?;
        let mut meta = metadata::extract(path, &document, roots)?;
        let content = converter.write_html(&document)?;

        if !document.meta.contains_key("summary") && summary != SummaryMode::Field {
            meta.insert(
                "summary".to_owned(),
                metadata::summarize(&content, summary),
            );
        }

        let output_path = roots.output.join(&meta["relpath"]);
        Ok(Page {
            meta,
            content,
            output_path,
        })
    }

    /// The page's category, or `None` for pages at the content root.
    pub fn category(&self) -> Option<&str> {
        self.meta
            .get("category")
            .map(String::as_str)
            .filter(|c| !c.is_empty())
    }

    /// The rendering context: `globals`, overridden by the page metadata,
    /// plus `content`.
    pub fn context(&self, globals: &Context) -> Context {
        let mut ctx = globals.clone();
        ctx.extend(self.meta.iter().map(|(k, v)| (k.clone(), v.clone())));
        ctx.insert("content".to_owned(), self.content.clone());
        ctx
    }

    /// Renders the page through `layout` without writing it.
    pub fn render(&self, layout: &str, globals: &Context) -> String {
        render(layout, &self.context(globals))
    }

    /// Renders the page through `layout` and writes the result to the page's
    /// output path, replacing any previous file. Returns the rendered text.
    pub fn write(&self, layout: &str, globals: &Context) -> Result<String> {
        let output = self.render(layout, globals);
        write_file(&self.output_path, &output).map_err(|err| Error::Io {
            path: self.output_path.clone(),
            err,
        })?;
        Ok(output)
    }
}

/// The result of building a page.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents why a page was dropped from the site.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when the document converter failed.
    #[error("parse error: {0}")]
    Parse(#[from] document::Error),

    /// Returned when the page's metadata couldn't be derived; this covers
    /// unsupported front-matter kinds and malformed dates.
    #[error("{0}")]
    Metadata(#[from] metadata::Error),

    /// Returned when an earlier content file already writes to the same
    /// output path, as `about.html` and `about.md` both do.
    #[error("`{}` is already written from `{}`", output.display(), claimed_by.display())]
    DuplicateOutput { output: PathBuf, claimed_by: PathBuf },

    /// Returned when the rendered page couldn't be written.
    #[error("writing `{}`: {err}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        err: std::io::Error,
    },
}

impl Error {
    /// A short name for the kind of failure, for the build report.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Parse(_) => "ParseError",
            Error::Metadata(metadata::Error::MetadataType { .. }) => "MetadataTypeError",
            Error::Metadata(metadata::Error::DateFormat { .. }) => "DateFormatError",
            Error::Metadata(_) => "MetadataError",
            Error::DuplicateOutput { .. } => "DuplicateOutputError",
            Error::Io { .. } => "IoError",
        }
    }
}

//! Exports [`Site`], which stitches together the high-level steps of building
//! the output static site. A build moves through the [`Stage`]s in order:
//!
//! 1. Clearing: the output directory is deleted and re-seeded from the static
//!    assets directory.
//! 2. Discovering: the content directory is walked and each file is classified
//!    as convertible or copy-through. When two files would land on the same
//!    output path, only the first in file-name order is kept.
//! 3. Converting: copy-through files are copied, convertible files become
//!    [`Page`]s and are rendered through the `page` layout (root pages) or the
//!    `post` layout (category pages).
//! 4. Indexing: an HTML index and an RSS feed are written for each category,
//!    and one more pair for the most recent pages across all categories.
//!
//! Layouts are loaded and the static directory is checked before clearing, so
//! a broken setup never destroys the previous output. A page that fails to
//! build is logged, recorded in the [`Report`], and left out of every index;
//! the build carries on with the other pages.

use crate::config::Config;
use crate::document::Converter;
use crate::index::{self, sort_by_date};
use crate::layout::{self, menu, Layouts, RawLayouts};
use crate::metadata::{locate, Metadata, Roots};
use crate::page::{self, Page};
use crate::template::capitalize;
use crate::util::{copy_dir, copy_file, rmdir};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;
use walkdir::WalkDir;

/// The title of the home index.
pub const HOME_TITLE: &str = "Recent posts";

/// The steps of a build, in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Clearing,
    Discovering,
    Converting,
    Indexing,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Stage::Clearing => "clearing",
            Stage::Discovering => "discovering",
            Stage::Converting => "converting",
            Stage::Indexing => "indexing",
            Stage::Done => "done",
        })
    }
}

/// A content file and what the build will do with it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    /// Copied into the output verbatim.
    Copy(PathBuf),

    /// Converted into a page from the given input format.
    Convert { path: PathBuf, format: &'static str },
}

impl Source {
    pub fn path(&self) -> &Path {
        match self {
            Source::Copy(path) => path,
            Source::Convert { path, .. } => path,
        }
    }
}

/// A content file that didn't make it into the site.
#[derive(Debug)]
pub struct Failure {
    pub path: PathBuf,
    pub error: page::Error,
}

/// What a build produced.
#[derive(Debug, Default)]
pub struct Report {
    /// Rendered pages, in discovery order.
    pub pages: Vec<PathBuf>,

    /// Files copied verbatim from the content directory.
    pub copied: Vec<PathBuf>,

    /// Index pages and feeds.
    pub indexes: Vec<PathBuf>,

    /// Content files that were dropped, with the reason.
    pub failures: Vec<Failure>,
}

// The result of handling one content file during the converting stage.
enum Outcome {
    Copied(PathBuf),
    Page { output: PathBuf, meta: Metadata },
    Failed(Failure),
}

/// Builds a site from a [`Config`] with a given [`Converter`].
pub struct Site<'a> {
    config: &'a Config,
    converter: &'a dyn Converter,
    site_url: Option<Url>,
}

impl<'a> Site<'a> {
    pub fn new(config: &'a Config, converter: &'a dyn Converter) -> Site<'a> {
        Site {
            config,
            converter,
            site_url: config.site_url(),
        }
    }

    /// Runs every stage of the build and reports the outcome. Only setup
    /// problems and failures writing the output tree itself are errors;
    /// problems with individual content files end up in
    /// [`Report::failures`].
    pub fn build(&self) -> Result<Report> {
        let layouts = self.setup()?;

        log::info!("{}: {}", Stage::Clearing, self.config.output_directory.display());
        self.clear()?;

        log::info!(
            "{}: {}",
            Stage::Discovering,
            self.config.content_directory.display()
        );
        let mut report = Report::default();
        let sources = self.claim_outputs(self.discover(), &mut report);

        log::info!("{}: {} files", Stage::Converting, sources.len());
        let categorized = self.convert(&layouts, &sources, &mut report)?;

        log::info!("{}: {} categories", Stage::Indexing, categorized.categories.len());
        report.indexes = self.index(&layouts, categorized)?;

        log::info!(
            "{}: {} pages, {} copied, {} indexes, {} failed",
            Stage::Done,
            report.pages.len(),
            report.copied.len(),
            report.indexes.len(),
            report.failures.len()
        );
        Ok(report)
    }

    // Checks the static directory and loads and composes the layouts.
    fn setup(&self) -> Result<Layouts> {
        if !self.config.static_directory.is_dir() {
            return Err(Error::MissingStatic(self.config.static_directory.clone()));
        }
        let raw = RawLayouts::load(&self.config.layout_directory)?;
        Ok(raw.compose(&menu(&self.categories())))
    }

    /// The top-level directories of the content directory, sorted by name.
    pub fn categories(&self) -> Vec<String> {
        let entries = match std::fs::read_dir(&self.config.content_directory) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };
        let mut categories: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter_map(|entry| entry.file_name().to_str().map(str::to_owned))
            .filter(|name| !is_hidden(name))
            .collect();
        categories.sort();
        categories
    }

    fn clear(&self) -> Result<()> {
        let output = &self.config.output_directory;
        rmdir(output).map_err(|err| Error::Clean {
            path: output.clone(),
            err,
        })?;
        copy_dir(&self.config.static_directory, output).map_err(|err| Error::CopyStatic {
            path: self.config.static_directory.clone(),
            err,
        })
    }

    /// Walks the content directory in file-name order and classifies every
    /// regular file. Hidden files and directories are skipped.
    pub fn discover(&self) -> Vec<Source> {
        let content = &self.config.content_directory;
        if !content.is_dir() {
            log::warn!("content directory {} does not exist", content.display());
            return Vec::new();
        }

        let mut sources = Vec::new();
        let walker = WalkDir::new(content)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(&e.file_name().to_string_lossy()));
        for result in walker {
            let entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("skipping unreadable content entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.into_path();
            sources.push(match self.converter.format(&path) {
                Some(format) => Source::Convert { path, format },
                None => Source::Copy(path),
            });
        }
        sources
    }

    /// Where `source` lands in the output tree, or `None` when its path
    /// can't be placed under the output root.
    pub fn output_path(&self, source: &Source) -> Option<PathBuf> {
        let content = &self.config.content_directory;
        let output = &self.config.output_directory;
        match source {
            Source::Copy(path) => path.strip_prefix(content).ok().map(|r| output.join(r)),
            Source::Convert { path, .. } => locate(path, content)
                .ok()
                .map(|location| output.join(location.relpath)),
        }
    }

    // Keeps only the first source, in discovery order, for each output path.
    // Later sources for a claimed path are reported as failures, so no two
    // conversions ever write the same file.
    fn claim_outputs(&self, sources: Vec<Source>, report: &mut Report) -> Vec<Source> {
        let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::new();
        let mut kept = Vec::with_capacity(sources.len());
        for source in sources {
            let output = match self.output_path(&source) {
                Some(output) => output,
                None => {
                    kept.push(source);
                    continue;
                }
            };
            match claimed.get(&output) {
                Some(first) => {
                    let failure = Failure {
                        path: source.path().to_owned(),
                        error: page::Error::DuplicateOutput {
                            output,
                            claimed_by: first.clone(),
                        },
                    };
                    log::warn!(
                        "{}: dropping {}: {}",
                        failure.error.kind(),
                        failure.path.display(),
                        failure.error
                    );
                    report.failures.push(failure);
                }
                None => {
                    claimed.insert(output, source.path().to_owned());
                    kept.push(source);
                }
            }
        }
        kept
    }

    fn convert(
        &self,
        layouts: &Layouts,
        sources: &[Source],
        report: &mut Report,
    ) -> Result<Categorized> {
        let process = |source: &Source| self.process(layouts, source);
        let outcomes: Vec<Outcome> = if self.config.threads > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.threads)
                .build()?;
            pool.install(|| sources.par_iter().map(process).collect())
        } else {
            sources.iter().map(process).collect()
        };

        // Fold in discovery order regardless of how the outcomes were
        // produced.
        let mut categorized = Categorized::default();
        for outcome in outcomes {
            match outcome {
                Outcome::Copied(output) => report.copied.push(output),
                Outcome::Page { output, meta } => {
                    report.pages.push(output);
                    categorized.push(meta);
                }
                Outcome::Failed(failure) => {
                    log::warn!(
                        "{}: dropping {}: {}",
                        failure.error.kind(),
                        failure.path.display(),
                        failure.error
                    );
                    report.failures.push(failure);
                }
            }
        }
        Ok(categorized)
    }

    fn process(&self, layouts: &Layouts, source: &Source) -> Outcome {
        let roots = Roots {
            content: &self.config.content_directory,
            output: &self.config.output_directory,
            site_url: self.site_url.as_ref(),
        };
        match source {
            Source::Copy(path) => {
                let output = self
                    .output_path(source)
                    .unwrap_or_else(|| roots.output.join(path.file_name().unwrap_or_default()));
                match copy_file(path, &output) {
                    Ok(()) => Outcome::Copied(output),
                    Err(err) => Outcome::Failed(Failure {
                        path: path.clone(),
                        error: page::Error::Io { path: output, err },
                    }),
                }
            }
            Source::Convert { path, format } => {
                let summary = self.config.summary;
                let written = Page::read(path, format, self.converter, &roots, summary)
                    .and_then(|page| {
                        let layout = match page.category() {
                            Some(_) => &layouts.post,
                            None => &layouts.page,
                        };
                        page.write(layout, &self.config.params)?;
                        Ok(page)
                    });
                match written {
                    Ok(page) => Outcome::Page {
                        output: page.output_path,
                        meta: page.meta,
                    },
                    Err(error) => Outcome::Failed(Failure {
                        path: path.clone(),
                        error,
                    }),
                }
            }
        }
    }

    fn index(&self, layouts: &Layouts, categorized: Categorized) -> Result<Vec<PathBuf>> {
        let writer = index::Writer {
            layouts,
            globals: &self.config.params,
            output_directory: &self.config.output_directory,
        };
        let io = |err| Error::Index { err };

        let mut written = Vec::new();
        for (category, mut items) in categorized.categories {
            sort_by_date(&mut items);
            written.extend(
                writer
                    .write(&items, &category, &capitalize(&category))
                    .map_err(io)?,
            );
        }

        let mut recent = categorized.all;
        sort_by_date(&mut recent);
        recent.truncate(self.config.home_size);
        written.extend(writer.write(&recent, "", HOME_TITLE).map_err(io)?);
        Ok(written)
    }
}

// Page metadata grouped by category, plus every categorized page in
// discovery order for the home index.
#[derive(Default)]
struct Categorized {
    categories: BTreeMap<String, Vec<Metadata>>,
    all: Vec<Metadata>,
}

impl Categorized {
    fn push(&mut self, meta: Metadata) {
        let category = match meta.get("category") {
            Some(category) if !category.is_empty() => category.clone(),
            _ => return,
        };
        self.all.push(meta.clone());
        self.categories.entry(category).or_default().push(meta);
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// The result of a build.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a fatal build error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when the static assets directory doesn't exist.
    #[error("static directory `{}` does not exist", .0.display())]
    MissingStatic(PathBuf),

    /// Returned when the layouts can't be loaded.
    #[error(transparent)]
    Layout(#[from] layout::Error),

    /// Returned for I/O problems deleting the old output directory.
    #[error("cleaning directory `{}`: {err}", path.display())]
    Clean {
        path: PathBuf,
        #[source]
        err: std::io::Error,
    },

    /// Returned for I/O problems seeding the output from the static
    /// directory.
    #[error("copying static directory `{}`: {err}", path.display())]
    CopyStatic {
        path: PathBuf,
        #[source]
        err: std::io::Error,
    },

    /// Returned for I/O problems writing index pages.
    #[error("writing index: {err}")]
    Index {
        #[source]
        err: std::io::Error,
    },

    /// Returned when the conversion thread pool can't be started.
    #[error("starting worker threads: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl Error {
    /// Whether the error is a problem with the site's setup (missing static
    /// or layout files) rather than with writing the output.
    pub fn is_setup(&self) -> bool {
        matches!(self, Error::MissingStatic(_) | Error::Layout(_))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::markdown::MarkdownConverter;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
    }

    impl Fixture {
        fn new() -> Fixture {
            let fx = Fixture {
                dir: TempDir::new().unwrap(),
            };
            fx.file("layout/page.html", "<nav>{{ menu }}</nav>{{ content }}");
            fx.file("layout/post.html", "<h1>{{ title }}</h1><time>{{ date }}</time>{{ content }}");
            fx.file(
                "layout/list.html",
                "<h1>{{ title }}</h1><ul>{{ content }}</ul>\
                 <a href=\"{{ site_url }}{{ rsspath }}\">rss</a>",
            );
            fx.file("layout/item.html", "<li>{{ date }} {{ title }}</li>");
            fx.file("layout/feed.xml", "<rss><title>{{ title }}</title>{{ content }}</rss>");
            fx.file(
                "layout/item.xml",
                "<item><title>{{ title }}</title><pubDate>{{ rfc_2822_date }}</pubDate></item>",
            );
            fx.file("static/css/site.css", "body {}");
            fx
        }

        fn root(&self) -> &Path {
            self.dir.path()
        }

        fn file(&self, relpath: &str, contents: &str) {
            let path = self.root().join(relpath);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, contents).unwrap();
        }

        fn config(&self) -> Config {
            let mut config = Config::defaults(self.root());
            config
                .params
                .insert("site_url".to_owned(), "https://example.org/".to_owned());
            config
        }

        fn build(&self, config: &Config) -> Result<Report> {
            Site::new(config, &MarkdownConverter).build()
        }

        fn read(&self, relpath: &str) -> String {
            std::fs::read_to_string(self.root().join("_site").join(relpath)).unwrap()
        }

        fn snapshot(&self) -> BTreeMap<PathBuf, Vec<u8>> {
            let output = self.root().join("_site");
            WalkDir::new(&output)
                .into_iter()
                .map(|e| e.unwrap())
                .filter(|e| e.file_type().is_file())
                .map(|e| {
                    (
                        e.path().strip_prefix(&output).unwrap().to_owned(),
                        std::fs::read(e.path()).unwrap(),
                    )
                })
                .collect()
        }
    }

    #[test]
    fn test_build_site() -> Result<()> {
        let fx = Fixture::new();
        fx.file("content/about.md", "---\ntitle: About\n---\nAbout me.\n");
        fx.file("content/blog/2024-01-01-first.md", "First post.\n");
        fx.file("content/blog/2024-03-01-third.md", "Third post.\n");
        fx.file("content/blog/2024-02-01-second.md", "Second post.\n");
        fx.file("content/blog/photo.jpg", "not really a jpeg");
        fx.file("content/notes/2024-02-15-note.md", "A note.\n");

        let report = fx.build(&fx.config())?;
        assert_eq!(5, report.pages.len());
        assert_eq!(1, report.copied.len());
        assert!(report.failures.is_empty());
        // two categories plus the home index, each an HTML page and a feed
        assert_eq!(6, report.indexes.len());

        let menu = "<a href=\"https://example.org/blog/\">Blog</a>\n\
                    <a href=\"https://example.org/notes/\">Notes</a>";
        assert_eq!(
            format!("<nav>{}</nav><p>About me.</p>\n", menu),
            fx.read("about.html")
        );
        assert_eq!(
            format!(
                "<nav>{}</nav><h1>third</h1><time>2024-03-01</time><p>Third post.</p>\n",
                menu
            ),
            fx.read("blog/2024-03-01-third.html")
        );
        assert_eq!("body {}", fx.read("css/site.css"));
        assert_eq!("not really a jpeg", fx.read("blog/photo.jpg"));

        assert_eq!(
            format!(
                "<nav>{}</nav><h1>Blog</h1><ul>\
                 <li>2024-03-01 third</li><li>2024-02-01 second</li><li>2024-01-01 first</li>\
                 </ul><a href=\"https://example.org/blog/rss.xml\">rss</a>",
                menu
            ),
            fx.read("blog/index.html")
        );
        assert_eq!(
            "<rss><title>Notes</title><item><title>note</title>\
             <pubDate>Thu, 15 Feb 2024 00:00:00 +0000</pubDate></item></rss>",
            fx.read("notes/rss.xml")
        );
        assert_eq!(
            format!(
                "<nav>{}</nav><h1>Recent posts</h1><ul>\
                 <li>2024-03-01 third</li><li>2024-02-15 note</li>\
                 <li>2024-02-01 second</li><li>2024-01-01 first</li>\
                 </ul><a href=\"https://example.org/rss.xml\">rss</a>",
                menu
            ),
            fx.read("index.html")
        );
        Ok(())
    }

    #[test]
    fn test_home_index_size() -> Result<()> {
        let fx = Fixture::new();
        for day in 1..=12 {
            fx.file(&format!("content/blog/2024-01-{:02}-p{}.md", day, day), "x\n");
        }
        let mut config = fx.config();
        config.home_size = 3;
        fx.build(&config)?;

        let home = fx.read("index.html");
        assert!(home.contains(
            "<li>2024-01-12 p12</li><li>2024-01-11 p11</li><li>2024-01-10 p10</li></ul>"
        ));
        assert!(!home.contains("p9<"));
        assert_eq!(12, fx.read("blog/index.html").matches("<li>").count());
        Ok(())
    }

    #[test]
    fn test_failed_page_is_isolated() -> Result<()> {
        let fx = Fixture::new();
        for i in 1..=9 {
            fx.file(&format!("content/blog/2024-01-0{}-ok{}.md", i, i), "fine\n");
        }
        fx.file("content/blog/2024-02-01-broken.md", "---\ntitle: never closed\n");

        let report = fx.build(&fx.config())?;
        assert_eq!(9, report.pages.len());
        assert_eq!(1, report.failures.len());
        assert_eq!(
            fx.root().join("content/blog/2024-02-01-broken.md"),
            report.failures[0].path
        );
        assert_eq!("ParseError", report.failures[0].error.kind());
        assert!(!fx.root().join("_site/blog/2024-02-01-broken.html").exists());
        assert!(!fx.read("blog/index.html").contains("broken"));
        assert!(!fx.read("index.html").contains("broken"));
        Ok(())
    }

    #[test]
    fn test_unsupported_front_matter_drops_page() -> Result<()> {
        let fx = Fixture::new();
        fx.file("content/blog/2024-01-01-tags.md", "---\ntags: [a, b]\n---\nx\n");
        fx.file("content/blog/2024-01-02-bad-date.md", "---\ndate: 01/02/2024\n---\nx\n");
        fx.file("content/blog/2024-01-03-ok.md", "x\n");

        let report = fx.build(&fx.config())?;
        assert_eq!(1, report.pages.len());
        let kinds: Vec<&str> = report.failures.iter().map(|f| f.error.kind()).collect();
        assert_eq!(vec!["MetadataTypeError", "DateFormatError"], kinds);
        Ok(())
    }

    #[test]
    fn test_rebuild_is_identical_and_removes_stale_files() -> Result<()> {
        let fx = Fixture::new();
        fx.file("content/index-me.md", "Root.\n");
        fx.file("content/blog/2024-01-01-a.md", "A.\n");
        fx.file("content/blog/b.md", "B, dated by mtime.\n");
        let config = fx.config();

        fx.build(&config)?;
        let first = fx.snapshot();
        fx.file("_site/stale.html", "left over");
        fx.build(&config)?;
        assert_eq!(first, fx.snapshot());
        Ok(())
    }

    #[test]
    fn test_parallel_build_matches_serial_build() -> Result<()> {
        let fx = Fixture::new();
        for i in 1..=20 {
            fx.file(
                &format!("content/c{}/2024-01-{:02}-p{}.md", i % 3, i, i),
                "body\n",
            );
        }
        fx.file("content/blog/2024-01-05-same-day-a.md", "x\n");
        fx.file("content/blog/2024-01-05-same-day-b.md", "x\n");

        fx.build(&fx.config())?;
        let serial = fx.snapshot();

        let mut config = fx.config();
        config.threads = 4;
        fx.build(&config)?;
        assert_eq!(serial, fx.snapshot());
        Ok(())
    }

    #[test]
    fn test_colliding_outputs_keep_the_first_source() -> Result<()> {
        let fx = Fixture::new();
        fx.file("content/about.html", "<p>hand written</p>");
        fx.file("content/about.md", "Converted.\n");
        fx.file("content/blog/2024-01-01-a.md", "A.\n");

        for threads in [1, 4] {
            let mut config = fx.config();
            config.threads = threads;
            let report = fx.build(&config)?;
            assert_eq!(vec![fx.root().join("_site/about.html")], report.copied);
            assert_eq!(1, report.pages.len());
            assert_eq!(1, report.failures.len());
            assert_eq!(fx.root().join("content/about.md"), report.failures[0].path);
            assert_eq!("DuplicateOutputError", report.failures[0].error.kind());
            assert_eq!("<p>hand written</p>", fx.read("about.html"));
        }
        Ok(())
    }

    #[test]
    fn test_missing_static_is_fatal_and_keeps_output() {
        let fx = Fixture::new();
        fx.file("_site/keep.html", "previous build");
        std::fs::remove_dir_all(fx.root().join("static")).unwrap();

        let err = fx.build(&fx.config()).unwrap_err();
        assert!(err.is_setup());
        assert!(matches!(err, Error::MissingStatic(_)));
        assert_eq!("previous build", fx.read("keep.html"));
    }

    #[test]
    fn test_missing_layout_is_fatal() {
        let fx = Fixture::new();
        std::fs::remove_dir_all(fx.root().join("layout")).unwrap();
        let err = fx.build(&fx.config()).unwrap_err();
        assert!(err.is_setup());
        assert!(matches!(err, Error::Layout(_)));
    }

    #[test]
    fn test_discover_classifies_and_skips_hidden_files() {
        let fx = Fixture::new();
        fx.file("content/a.md", "x");
        fx.file("content/b.png", "x");
        fx.file("content/.draft.md", "x");
        fx.file("content/.git/config", "x");
        fx.file("content/blog/c.markdown", "x");

        let config = fx.config();
        let site = Site::new(&config, &MarkdownConverter);
        let content = fx.root().join("content");
        assert_eq!(
            vec![
                Source::Convert {
                    path: content.join("a.md"),
                    format: "markdown"
                },
                Source::Copy(content.join("b.png")),
                Source::Convert {
                    path: content.join("blog/c.markdown"),
                    format: "markdown"
                },
            ],
            site.discover()
        );
        assert_eq!(vec!["blog".to_owned()], site.categories());
    }
}

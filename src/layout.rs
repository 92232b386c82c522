//! Loads the layout templates and composes them into the templates pages,
//! indexes, and feeds are rendered with.
//!
//! Loading and composing are separate types: [`RawLayouts::compose`]
//! consumes the raw set, so the page shell can only ever be wrapped around
//! the post and list templates once.

use crate::template::{capitalize, context, render};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The templates every site must provide, by name.
pub const REQUIRED: &[&str] = &["page", "post", "list", "item", "feedxml", "itemxml"];

/// Layout templates as they were read from disk.
#[derive(Clone, Debug)]
pub struct RawLayouts {
    templates: BTreeMap<String, String>,
}

/// Composed layout templates, ready for rendering.
#[derive(Clone, Debug)]
pub struct Layouts {
    /// The shell for root pages.
    pub page: String,

    /// A category page, embedded in the page shell.
    pub post: String,

    /// An HTML index, embedded in the page shell.
    pub list: String,

    /// One entry of an HTML index.
    pub item: String,

    /// An RSS feed.
    pub feed: String,

    /// One entry of an RSS feed.
    pub feed_item: String,
}

/// Maps a layout file name onto its template name: `page.html` is `page`,
/// `feed.xml` is `feedxml`, and `page` is `page`.
pub fn template_name(file_name: &str) -> String {
    let path = Path::new(file_name);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    match path.extension().and_then(|e| e.to_str()) {
        None | Some("html") => stem.to_owned(),
        Some(ext) => format!("{}{}", stem, ext),
    }
}

impl RawLayouts {
    /// Reads every file in `dir`. Fails if the directory is missing or any
    /// of the [`REQUIRED`] templates is absent.
    pub fn load(dir: &Path) -> Result<RawLayouts> {
        if !dir.is_dir() {
            return Err(Error::MissingDirectory(dir.to_owned()));
        }
        let io = |path: &Path| {
            let path = path.to_owned();
            move |err| Error::Io { path, err }
        };

        let mut templates = BTreeMap::new();
        for entry in std::fs::read_dir(dir).map_err(io(dir))? {
            let entry = entry.map_err(io(dir))?;
            let path = entry.path();
            let file_name = entry.file_name();
            let file_name = match file_name.to_str() {
                Some(name) if !name.starts_with('.') => name,
                _ => continue,
            };
            if !entry.file_type().map_err(io(&path))?.is_file() {
                continue;
            }
            let contents = std::fs::read_to_string(&path).map_err(io(&path))?;
            log::debug!("loaded layout {} from {}", template_name(file_name), path.display());
            templates.insert(template_name(file_name), contents);
        }

        for name in REQUIRED {
            if !templates.contains_key(*name) {
                return Err(Error::Missing {
                    name: (*name).to_owned(),
                    dir: dir.to_owned(),
                });
            }
        }
        Ok(RawLayouts { templates })
    }

    #[cfg(test)]
    pub(crate) fn from_templates(templates: BTreeMap<String, String>) -> Result<RawLayouts> {
        match REQUIRED.iter().find(|name| !templates.contains_key(**name)) {
            Some(name) => Err(Error::Missing {
                name: (*name).to_owned(),
                dir: PathBuf::new(),
            }),
            None => Ok(RawLayouts { templates }),
        }
    }

    /// Resolves `{{ menu }}` in the page shell, then embeds the post and list
    /// templates as the shell's `{{ content }}`. Every other placeholder is
    /// left for render time.
    pub fn compose(mut self, menu: &str) -> Layouts {
        let mut take = |name: &str| self.templates.remove(name).unwrap_or_default();
        let page = render(&take("page"), &context([("menu", menu)]));
        let post = render(&page, &context([("content", take("post").as_str())]));
        let list = render(&page, &context([("content", take("list").as_str())]));
        let item = take("item");
        let feed = take("feedxml");
        let feed_item = take("itemxml");

        Layouts {
            page,
            post,
            list,
            item,
            feed,
            feed_item,
        }
    }
}

/// Builds the navigation menu: one link per category. Links are relative to
/// `{{ site_url }}`, which is resolved when each page is rendered.
pub fn menu(categories: &[String]) -> String {
    categories
        .iter()
        .map(|category| {
            format!(
                r#"<a href="{{{{ site_url }}}}{}/">{}</a>"#,
                category,
                capitalize(category)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The result of loading layouts.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a problem loading the layout directory.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when the layout directory doesn't exist.
    #[error("layout directory `{}` does not exist", .0.display())]
    MissingDirectory(PathBuf),

    /// Returned when a required template isn't in the layout directory.
    #[error("layout `{name}` is missing from `{}`", dir.display())]
    Missing { name: String, dir: PathBuf },

    /// Returned for I/O problems reading layout files.
    #[error("reading layout `{}`: {err}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        err: std::io::Error,
    },
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::template::Context;
    use tempfile::TempDir;

    fn write_layouts(dir: &Path) {
        let files = [
            (
                "page.html",
                "<nav>{{ menu }}</nav><main>{{ content }}</main><footer>{{ author }}</footer>",
            ),
            ("post.html", "<article><h1>{{ title }}</h1>{{ content }}</article>"),
            ("list.html", "<h1>{{ title }}</h1><ul>{{ content }}</ul>"),
            ("item.html", "<li>{{ title }}</li>"),
            ("feed.xml", "<rss>{{ content }}</rss>"),
            ("item.xml", "<item>{{ title }}</item>"),
            ("extra", "plain"),
        ];
        std::fs::create_dir_all(dir).unwrap();
        for (name, contents) in files {
            std::fs::write(dir.join(name), contents).unwrap();
        }
    }

    #[test]
    fn test_template_name() {
        assert_eq!("page", template_name("page.html"));
        assert_eq!("feedxml", template_name("feed.xml"));
        assert_eq!("itemxml", template_name("item.xml"));
        assert_eq!("page", template_name("page"));
    }

    #[test]
    fn test_load_and_compose() -> Result<()> {
        let dir = TempDir::new().unwrap();
        write_layouts(dir.path());

        let layouts = RawLayouts::load(dir.path())?.compose("MENU");
        assert_eq!(
            "<nav>MENU</nav><main><article><h1>{{ title }}</h1>{{ content }}</article></main>\
             <footer>{{ author }}</footer>",
            layouts.post
        );
        assert_eq!(
            "<nav>MENU</nav><main><h1>{{ title }}</h1><ul>{{ content }}</ul></main>\
             <footer>{{ author }}</footer>",
            layouts.list
        );
        assert_eq!(
            "<nav>MENU</nav><main>{{ content }}</main><footer>{{ author }}</footer>",
            layouts.page
        );
        assert_eq!("<rss>{{ content }}</rss>", layouts.feed);
        assert_eq!("<item>{{ title }}</item>", layouts.feed_item);
        Ok(())
    }

    #[test]
    fn test_composed_post_renders_page_content() -> Result<()> {
        let dir = TempDir::new().unwrap();
        write_layouts(dir.path());
        let layouts = RawLayouts::load(dir.path())?.compose("");

        let mut ctx = Context::new();
        ctx.insert("title".to_owned(), "Hi".to_owned());
        ctx.insert("content".to_owned(), "<p>body</p>".to_owned());
        ctx.insert("author".to_owned(), "Jo".to_owned());
        assert_eq!(
            "<nav></nav><main><article><h1>Hi</h1><p>body</p></article></main><footer>Jo</footer>",
            render(&layouts.post, &ctx)
        );
        Ok(())
    }

    #[test]
    fn test_missing_directory() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            RawLayouts::load(&dir.path().join("layout")),
            Err(Error::MissingDirectory(_))
        ));
    }

    #[test]
    fn test_missing_required_layout() {
        let dir = TempDir::new().unwrap();
        write_layouts(dir.path());
        std::fs::remove_file(dir.path().join("item.xml")).unwrap();
        match RawLayouts::load(dir.path()) {
            Err(Error::Missing { name, .. }) => assert_eq!("itemxml", name),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_menu() {
        let categories = vec!["blog".to_owned(), "notes".to_owned()];
        assert_eq!(
            "<a href=\"{{ site_url }}blog/\">Blog</a>\n<a href=\"{{ site_url }}notes/\">Notes</a>",
            menu(&categories)
        );
        assert_eq!("", menu(&[]));
    }
}

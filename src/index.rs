//! Writes index pages: an HTML list and an RSS feed over a set of page
//! [`Metadata`], for each category and for the home page.

use crate::layout::Layouts;
use crate::metadata::Metadata;
use crate::template::{render, Context};
use crate::util::write_file;
use std::path::{Path, PathBuf};

/// Sorts page metadata by `date`, most recent first. The sort is stable, so
/// pages sharing a date keep their discovery order.
pub fn sort_by_date(items: &mut [Metadata]) {
    items.sort_by(|a, b| b.get("date").cmp(&a.get("date")));
}

/// Renders and writes index pages.
pub struct Writer<'a> {
    /// The composed layouts; `list`/`item` build the HTML index and
    /// `feed`/`feed_item` the RSS feed.
    pub layouts: &'a Layouts,

    /// Global template parameters.
    pub globals: &'a Context,

    /// The output root.
    pub output_directory: &'a Path,
}

impl Writer<'_> {
    /// Writes `{dir}/index.html` and `{dir}/rss.xml` under the output root
    /// for `items`, which must already be sorted. An empty `dir` writes to
    /// the output root itself. Returns the paths written.
    ///
    /// Each item is rendered with the globals, the index `title`, and the
    /// item's own metadata (which wins). The list and the feed get the
    /// globals plus `title`, `rsspath`, and the rendered items as `content`.
    pub fn write(
        &self,
        items: &[Metadata],
        dir: &str,
        title: &str,
    ) -> std::io::Result<Vec<PathBuf>> {
        let relative = |file: &str| match dir {
            "" => file.to_owned(),
            _ => format!("{}/{}", dir, file),
        };
        let rsspath = relative("rss.xml");
        let html_path = self.output_directory.join(relative("index.html"));
        let rss_path = self.output_directory.join(&rsspath);

        let mut ctx = self.globals.clone();
        ctx.insert("title".to_owned(), title.to_owned());

        let html = self.render(&self.layouts.list, &self.layouts.item, items, &ctx, &rsspath);
        write_file(&html_path, &html)?;

        let rss = self.render(&self.layouts.feed, &self.layouts.feed_item, items, &ctx, &rsspath);
        write_file(&rss_path, &rss)?;

        Ok(vec![html_path, rss_path])
    }

    fn render(
        &self,
        outer: &str,
        item: &str,
        items: &[Metadata],
        ctx: &Context,
        rsspath: &str,
    ) -> String {
        let content: String = items
            .iter()
            .map(|meta| {
                let mut item_ctx = ctx.clone();
                item_ctx.extend(meta.iter().map(|(k, v)| (k.clone(), v.clone())));
                render(item, &item_ctx)
            })
            .collect();

        let mut outer_ctx = ctx.clone();
        outer_ctx.insert("content".to_owned(), content);
        outer_ctx.insert("rsspath".to_owned(), rsspath.to_owned());
        render(outer, &outer_ctx)
    }
}

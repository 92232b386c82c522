//! Defines [`render`], the placeholder substitution used for every layout,
//! index, and feed in the site.
//!
//! Placeholders look like `{{ name }}`. Whitespace inside the braces is
//! ignored. A placeholder whose name isn't in the context is left exactly as
//! it was written, which is what lets [`crate::layout`] compose templates in
//! one pass and resolve the remaining placeholders in a later one.

use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// The values available to a template, keyed by placeholder name.
pub type Context = BTreeMap<String, String>;

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        // should never fail; the pattern is a constant
        Regex::new(r"\{\{\s*([^}\s]+)\s*\}\}").unwrap()
    })
}

/// Replaces each placeholder in `template` with its value from `context`.
/// Substituted text is never re-scanned.
pub fn render(template: &str, context: &Context) -> String {
    placeholder()
        .replace_all(template, |caps: &Captures| match context.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_owned(),
        })
        .into_owned()
}

/// Builds a [`Context`] from borrowed pairs. Handy for one-off renders.
pub fn context<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Context {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect()
}

/// Uppercases the first character of `s` and lowercases the rest, for
/// turning category directory names into titles.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_capitalize() {
        assert_eq!("Blog", capitalize("blog"));
        assert_eq!("Notes", capitalize("NOTES"));
        assert_eq!("", capitalize(""));
    }

    #[test]
    fn test_render_substitutes_known_keys() {
        let ctx = context([("name", "Al")]);
        assert_eq!("Hi Al!", render("Hi {{ name }}!", &ctx));
        assert_eq!("Hi Al!", render("Hi {{name}}!", &ctx));
        assert_eq!("Hi Al!", render("Hi {{   name\t}}!", &ctx));
    }

    #[test]
    fn test_render_leaves_missing_keys_untouched() {
        assert_eq!("{{ missing }}", render("{{ missing }}", &Context::new()));
        assert_eq!(
            "a {{x}} b {{  y }}",
            render("a {{x}} b {{  y }}", &context([("z", "1")]))
        );
    }

    #[test]
    fn test_render_does_not_reexpand() {
        let ctx = context([("a", "{{ b }}"), ("b", "nope")]);
        assert_eq!("{{ b }}", render("{{ a }}", &ctx));
    }

    #[test]
    fn test_render_dotted_names() {
        let ctx = context([("author.name", "Jo")]);
        assert_eq!("by Jo", render("by {{ author.name }}", &ctx));
    }

    #[test]
    fn test_render_is_idempotent_once_resolved() {
        let ctx = context([("title", "Home"), ("content", "<p>hi</p>")]);
        let once = render("<h1>{{ title }}</h1>{{ content }}", &ctx);
        assert_eq!(once, render(&once, &ctx));
    }
}

//! Site configuration: the fixed directory layout under the site root, the
//! global template parameters, and the knobs that control summaries, the
//! home index, the converter, and parallelism.
//!
//! Parameters are layered: built-in defaults, then the optional JSON config
//! file (`params.json` in the site root), then the `MAKESITE_URL`
//! environment variable for `site_url`.

use crate::metadata::SummaryMode;
use crate::template::Context;
use chrono::Datelike;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use url::Url;

/// The environment variable that overrides `site_url`.
pub const SITE_URL_VAR: &str = "MAKESITE_URL";

/// `site_url` when neither the config file nor the environment sets one.
pub const DEFAULT_SITE_URL: &str = "http://localhost:8000/";

/// The config file looked up in the site root when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "params.json";

const DEFAULT_HOME_SIZE: usize = 10;
const DEFAULT_SUMMARY_WORDS: usize = 25;

/// Selects the [`crate::document::Converter`] used for content files.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConverterKind {
    /// The built-in markdown converter.
    #[default]
    Markdown,

    /// The external `pandoc` program.
    Pandoc,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum SummaryKind {
    Field,
    Paragraph,
    Words,
}

// The on-disk shape of the config file: a flat JSON object whose reserved
// keys are knobs and whose other keys are template parameters.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    home_size: Option<usize>,
    summary: Option<SummaryKind>,
    summary_words: Option<usize>,
    converter: Option<ConverterKind>,
    threads: Option<usize>,

    #[serde(flatten)]
    params: BTreeMap<String, serde_json::Value>,
}

/// Everything the site pipeline needs to know before it starts.
#[derive(Clone, Debug)]
pub struct Config {
    /// Source tree; top-level directories are categories.
    pub content_directory: PathBuf,

    /// Layout templates.
    pub layout_directory: PathBuf,

    /// Static assets copied verbatim into the output.
    pub static_directory: PathBuf,

    /// The output root. Destroyed and rebuilt on every run.
    pub output_directory: PathBuf,

    /// Global parameters available to every template.
    pub params: Context,

    /// Number of pages on the home index.
    pub home_size: usize,

    /// How summaries are derived when front-matter has none.
    pub summary: SummaryMode,

    /// Which converter reads content files.
    pub converter: ConverterKind,

    /// Worker threads for converting pages; 1 converts in place.
    pub threads: usize,
}

impl Config {
    /// The built-in configuration for a site rooted at `root`.
    pub fn defaults(root: &Path) -> Config {
        let mut params = Context::new();
        params.insert("author".to_owned(), "Admin".to_owned());
        params.insert("site_title".to_owned(), "My Site".to_owned());
        params.insert("site_url".to_owned(), DEFAULT_SITE_URL.to_owned());
        params.insert(
            "current_year".to_owned(),
            chrono::Local::now().year().to_string(),
        );

        Config {
            content_directory: root.join("content"),
            layout_directory: root.join("layout"),
            static_directory: root.join("static"),
            output_directory: root.join("_site"),
            params,
            home_size: DEFAULT_HOME_SIZE,
            summary: SummaryMode::Field,
            converter: ConverterKind::Markdown,
            threads: 1,
        }
    }

    /// Loads the configuration for the site rooted at `root`, reading
    /// `config_file` (or `params.json` in the root when `None`) and the
    /// `MAKESITE_URL` environment variable.
    pub fn load(root: &Path, config_file: Option<&Path>) -> Result<Config> {
        Config::load_with(root, config_file, std::env::var(SITE_URL_VAR).ok())
    }

    /// Like [`Config::load`], with the `MAKESITE_URL` value passed in.
    pub fn load_with(
        root: &Path,
        config_file: Option<&Path>,
        site_url: Option<String>,
    ) -> Result<Config> {
        let mut config = Config::defaults(root);

        let (path, required) = match config_file {
            Some(path) => (root.join(path), true),
            None => (root.join(DEFAULT_CONFIG_FILE), false),
        };
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                let file: ConfigFile = serde_json::from_str(&contents)
                    .map_err(|err| Error::Parse { path: path.clone(), err })?;
                log::debug!("loaded config file {}", path.display());
                config.apply(file);
            }
            Err(err) if !required && err.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("no config file at {}; using defaults", path.display());
            }
            Err(err) => return Err(Error::Read { path, err }),
        }

        if let Some(site_url) = site_url {
            config.params.insert("site_url".to_owned(), site_url);
        }
        Ok(config)
    }

    fn apply(&mut self, file: ConfigFile) {
        if let Some(home_size) = file.home_size {
            self.home_size = home_size;
        }
        let words = file.summary_words.unwrap_or(DEFAULT_SUMMARY_WORDS);
        if let Some(summary) = file.summary {
            self.summary = match summary {
                SummaryKind::Field => SummaryMode::Field,
                SummaryKind::Paragraph => SummaryMode::Paragraph,
                SummaryKind::Words => SummaryMode::Words(words),
            };
        }
        if let Some(converter) = file.converter {
            self.converter = converter;
        }
        if let Some(threads) = file.threads {
            self.threads = threads.max(1);
        }
        for (key, value) in file.params {
            let value = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            };
            self.params.insert(key, value);
        }
    }

    /// The site URL as an absolute URL ending in `/`, or `None` when
    /// `site_url` isn't an absolute URL.
    pub fn site_url(&self) -> Option<Url> {
        let raw = self.params.get("site_url")?;
        let mut url = match Url::parse(raw) {
            Ok(url) => url,
            Err(e) => {
                log::warn!("site_url `{}` is not an absolute URL: {}", raw, e);
                return None;
            }
        };
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Some(url)
    }
}

/// The result of loading configuration.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a problem loading the config file.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when the config file exists but can't be read, or when an
    /// explicitly requested config file doesn't exist.
    #[error("reading config file `{}`: {err}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        err: std::io::Error,
    },

    /// Returned when the config file isn't valid JSON of the expected shape.
    #[error("parsing config file `{}`: {err}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        err: serde_json::Error,
    },
}

use anyhow::{Context, Result};
use clap::Parser;
use makesite::build::Site;
use makesite::config::{Config, ConverterKind};
use makesite::document::Converter;
use makesite::logging;
use makesite::markdown::MarkdownConverter;
use makesite::pandoc::PandocConverter;
use std::path::PathBuf;

/// Builds a static site: `static/` is copied, `content/` is converted
/// through the templates in `layout/`, and the result lands in `_site/`.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// The site root containing the content, layout, and static directories.
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// A JSON file of site parameters, relative to the root. Defaults to
    /// `params.json` if it exists.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log more; pass twice for trace output. `RUST_LOG` overrides this.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = Config::load(&cli.root, cli.config.as_deref())
        .with_context(|| format!("loading configuration for `{}`", cli.root.display()))?;

    let converter: Box<dyn Converter> = match config.converter {
        ConverterKind::Markdown => Box::new(MarkdownConverter),
        ConverterKind::Pandoc => Box::new(PandocConverter::default()),
    };

    // Per-file failures are already logged by the build and don't change
    // the exit status.
    match Site::new(&config, converter.as_ref()).build() {
        Ok(_) => Ok(()),
        Err(e) if e.is_setup() => Err(anyhow::Error::new(e).context(format!(
            "site at `{}` needs `static/` and a complete `layout/`",
            cli.root.display()
        ))),
        Err(e) => Err(anyhow::Error::new(e).context("building site")),
    }
}

//! A [`Converter`] backed by the external `pandoc` program. Source files are
//! read into pandoc's JSON document tree (`pandoc -f <format> -t json`), and
//! the tree is handed back to pandoc for HTML output (`pandoc -f json -t
//! html`). Inline and block metadata values are rendered to HTML the same
//! way, by wrapping them in a throwaway document.

use crate::document::{format_by_extension, Converter, Document, Error, Meta, MetaValue, Result};
use serde_json::{json, Map, Value};
use std::ffi::OsStr;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

const EXTENSIONS: &[(&str, &str)] = &[
    ("md", "markdown"),
    ("markdown", "markdown"),
    ("rst", "rst"),
    ("org", "org"),
    ("docx", "docx"),
    ("odt", "odt"),
    ("textile", "textile"),
    ("tex", "latex"),
    ("epub", "epub"),
    ("ipynb", "ipynb"),
];

/// Converts documents by running `pandoc`.
#[derive(Clone, Debug)]
pub struct PandocConverter {
    program: PathBuf,
}

impl Default for PandocConverter {
    fn default() -> Self {
        PandocConverter::new("pandoc")
    }
}

impl PandocConverter {
    /// Uses `program` as the pandoc executable.
    pub fn new(program: impl Into<PathBuf>) -> PandocConverter {
        PandocConverter {
            program: program.into(),
        }
    }

    fn run<S: AsRef<OsStr>>(&self, args: &[S], stdin: Option<String>) -> Result<String> {
        let external = |message: String| Error::External {
            program: self.program.display().to_string(),
            message,
        };

        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(match stdin {
                Some(_) => Stdio::piped(),
                None => Stdio::null(),
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| external(e.to_string()))?;

        // Feed stdin from another thread so a large output can't fill the
        // stdout pipe while we are still writing.
        let feeder = match (stdin, child.stdin.take()) {
            (Some(input), Some(mut pipe)) => {
                Some(std::thread::spawn(move || pipe.write_all(input.as_bytes())))
            }
            _ => None,
        };

        let output = child
            .wait_with_output()
            .map_err(|e| external(e.to_string()))?;
        if let Some(feeder) = feeder {
            match feeder.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(external(format!("writing stdin: {}", e))),
                Err(_) => return Err(external("stdin writer panicked".to_owned())),
            }
        }

        if !output.status.success() {
            return Err(external(format!(
                "{}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        String::from_utf8(output.stdout).map_err(|e| external(e.to_string()))
    }

    // Renders a list of pandoc blocks as an HTML fragment.
    fn blocks_to_html(&self, api_version: &Value, blocks: Vec<Value>) -> Result<String> {
        let doc = json!({
            "pandoc-api-version": api_version,
            "meta": {},
            "blocks": blocks,
        });
        self.run(&["-f", "json", "-t", "html"], Some(doc.to_string()))
    }
}

impl Converter for PandocConverter {
    fn format(&self, path: &Path) -> Option<&'static str> {
        format_by_extension(EXTENSIONS, path)
    }

    fn read(&self, path: &Path, format: &str) -> Result<Document> {
        if !EXTENSIONS.iter().any(|(_, known)| *known == format) {
            return Err(Error::UnsupportedFormat(format.to_owned()));
        }
        let tree = self.run(
            &[
                OsStr::new("-f"),
                OsStr::new(format),
                OsStr::new("-t"),
                OsStr::new("json"),
                path.as_os_str(),
            ],
            None,
        )?;
        let parsed: Value = serde_json::from_str(&tree)?;
        let api_version = parsed
            .get("pandoc-api-version")
            .cloned()
            .ok_or_else(|| Error::Malformed("missing `pandoc-api-version`".to_owned()))?;
        let meta = match parsed.get("meta") {
            Some(Value::Object(meta)) => {
                let mut render =
                    |blocks: Vec<Value>| self.blocks_to_html(&api_version, blocks);
                meta_from_json(meta, &mut render)?
            }
            Some(_) => return Err(Error::Malformed("`meta` is not an object".to_owned())),
            None => Meta::new(),
        };
        Ok(Document::new(meta, tree))
    }

    fn write_html(&self, document: &Document) -> Result<String> {
        self.run(&["-f", "json", "-t", "html"], Some(document.body().to_owned()))
    }
}

/// Converts pandoc's JSON `meta` object into [`Meta`]. `render` turns a list
/// of pandoc blocks into HTML.
pub fn meta_from_json(
    meta: &Map<String, Value>,
    render: &mut dyn FnMut(Vec<Value>) -> Result<String>,
) -> Result<Meta> {
    meta.iter()
        .map(|(key, node)| -> Result<(String, MetaValue)> {
            Ok((key.clone(), meta_value(node, render)?))
        })
        .collect()
}

fn meta_value(
    node: &Value,
    render: &mut dyn FnMut(Vec<Value>) -> Result<String>,
) -> Result<MetaValue> {
    let kind = node
        .get("t")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Malformed(format!("metadata node without a tag: {}", node)))?;
    let content = node.get("c").cloned().unwrap_or(Value::Null);

    Ok(match (kind, content) {
        ("MetaMap", Value::Object(entries)) => MetaValue::Map(meta_from_json(&entries, render)?),
        ("MetaInlines", inlines @ Value::Array(_)) => {
            let plain = json!({ "t": "Plain", "c": inlines });
            MetaValue::Inlines(render(vec![plain])?.trim().to_owned())
        }
        ("MetaBlocks", Value::Array(blocks)) => {
            MetaValue::Blocks(render(blocks)?.trim().to_owned())
        }
        ("MetaString", Value::String(s)) => MetaValue::Scalar(s),
        ("MetaBool", Value::Bool(b)) => MetaValue::Scalar(b.to_string()),
        ("MetaList", Value::Array(items)) => MetaValue::List(
            items
                .iter()
                .map(|item| meta_value(item, render))
                .collect::<Result<_>>()?,
        ),
        ("MetaMap" | "MetaInlines" | "MetaBlocks" | "MetaString" | "MetaBool" | "MetaList", _) => {
            return Err(Error::Malformed(format!("`{}` node with unexpected content", kind)))
        }
        (other, _) => MetaValue::Unknown(other.to_owned()),
    })
}

//! The launcher's cape catalog.
//!
//! The catalog is a text file the launcher writes with one `cape` line per cape the player can
//! pick, tab-separated and form-encoded:
//!
//! ```text
//! selected=red
//! cape	red	Red+Cape	premium	%2Fcapes%2Fred.png	https%3A%2F%2Fexample.com%2Fred.png
//! ```
//!
//! An optional seventh field carries the cape's signature. We only ever rewrite the `selected=`
//! line. Selections are also mirrored into a JSON sidecar for the launcher to pick up.

use std::path::{Path, PathBuf};

use eyre::Result;
use percent_encoding::percent_decode_str;
use serde::Serialize;

use crate::asset::Tier;

const CAPE_PREFIX: &str = "cape\t";
const SELECTED_PREFIX: &str = "selected=";

/// Decodes a form-encoded field. `+` is a space.
pub fn form_decode(field: &str) -> String {
    let spaced = field.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

pub fn form_encode(field: &str) -> String {
    form_urlencoded::byte_serialize(field.as_bytes()).collect()
}

/// A cape the player can select.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CapeOption {
    pub id: String,

    /// Display name. Falls back to the id.
    pub name: String,

    /// Lowercase tier name, possibly empty.
    pub tier: String,

    pub full_path: String,
    pub cloud_url: String,

    /// Base64 signature, empty if the launcher didn't provide one.
    pub signature: String,
}

impl CapeOption {
    /// Parses a `cape` line. Returns `None` for anything else, and for capes without an id.
    fn parse_line(line: &str) -> Option<CapeOption> {
        if !line.starts_with(CAPE_PREFIX) {
            return None;
        }

        let fields: Vec<String> = line.split('\t').map(form_decode).collect();

        if fields.len() < 6 {
            return None;
        }

        let field = |index: usize| fields.get(index).map(|f| f.trim().to_string()).unwrap_or_default();

        let id = field(1);

        if id.is_empty() {
            return None;
        }

        let name = Some(field(2)).filter(|name| !name.is_empty()).unwrap_or_else(|| id.clone());

        Some(CapeOption {
            name,
            tier: field(3).to_lowercase(),
            full_path: field(4),
            cloud_url: field(5),
            signature: field(6),
            id,
        })
    }

    pub fn tier(&self) -> Tier {
        Tier::parse(&self.tier)
    }
}

/// Returns the cape options listed in `text`, in file order. Lines that don't parse are skipped.
pub fn parse_options(text: &str) -> Vec<CapeOption> {
    text.lines()
        // Tabs are field separators, so trailing empty fields must survive.
        .map(|line| line.trim_matches(|c: char| c.is_whitespace() && c != '\t'))
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(CapeOption::parse_line)
        .collect()
}

/// Returns `text` with its `selected=` lines replaced by one selecting `id`. Every other line is
/// kept as it was. If there was no `selected=` line, one is added at the top.
pub fn rewrite_selected(text: &str, id: &str) -> String {
    let selected = format!("{SELECTED_PREFIX}{}", form_encode(id));
    let mut replaced = false;

    let mut lines: Vec<&str> = text
        .lines()
        .map(|line| {
            if line.starts_with(SELECTED_PREFIX) {
                replaced = true;
                selected.as_str()
            } else {
                line
            }
        })
        .collect();

    if !replaced {
        lines.insert(0, &selected);
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// The catalog file.
pub struct Catalog {
    path: PathBuf,
}

impl Catalog {
    pub fn new(path: impl Into<PathBuf>) -> Catalog {
        Catalog { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn try_options(&self) -> Result<Vec<CapeOption>> {
        if !self.path.is_file() {
            return Ok(vec![]);
        }

        Ok(parse_options(&std::fs::read_to_string(&self.path)?))
    }

    /// Reads the catalog. A missing or unreadable catalog lists nothing.
    pub fn options(&self) -> Vec<CapeOption> {
        self.try_options().unwrap_or_else(|err| {
            log::warn!("Unable to read cape catalog: {err:?}");
            vec![]
        })
    }

    pub fn find(&self, id: &str) -> Option<CapeOption> {
        self.options().into_iter().find(|option| option.id == id)
    }

    /// Writes `id` as the selected cape. A catalog that doesn't exist is left that way.
    fn try_save_selected(&self, id: &str) -> Result<bool> {
        if !self.path.is_file() {
            return Ok(false);
        }

        let text = std::fs::read_to_string(&self.path)?;
        std::fs::write(&self.path, rewrite_selected(&text, id))?;

        Ok(true)
    }

    /// Writes `id` as the selected cape. Errors will be logged.
    pub fn save_selected(&self, id: &str) {
        match self.try_save_selected(id) {
            Ok(true) => log::info!("Saved cape selection {:?} to catalog", id),
            Ok(false) => log::info!("No catalog at {}, selection not saved", self.path.display()),
            Err(err) => log::error!("Error saving cape selection to catalog: {err:?}"),
        }
    }
}

/// Contents of the JSON sidecar.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionMeta {
    pub cape_id: String,
    pub tier: String,
    pub full_path: String,
    pub cloud_url: String,

    /// Milliseconds since the Unix epoch.
    pub updated_at: i64,
}

impl SelectionMeta {
    /// Describes `option` being selected now, or the selection being cleared if there is no
    /// option.
    pub fn now(option: Option<&CapeOption>) -> SelectionMeta {
        let option = option.cloned().unwrap_or_default();

        SelectionMeta {
            cape_id: option.id,
            tier: option.tier,
            full_path: option.full_path,
            cloud_url: option.cloud_url,
            updated_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    fn try_write(&self, path: &Path) -> Result<()> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');

        std::fs::write(path, json)?;
        Ok(())
    }

    /// Overwrites the sidecar at `path`. Errors will be logged.
    pub fn write(&self, path: &Path) {
        if let Err(err) = self.try_write(path) {
            log::error!("Error writing cape metadata to {}: {err:?}", path.display());
        }
    }
}

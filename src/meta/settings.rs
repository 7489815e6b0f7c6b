use std::{
    fs::File,
    io::Read,
    path::{Path, PathBuf},
};

use eyre::Result;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{adapter::identity::parse_uuid, asset::Tier};

/// Where the launcher writes its cape catalog if nobody says otherwise.
pub const DEFAULT_CATALOG_PATH: &str = ".fishbattery/launcher-capes.txt";

/// Environment variables the launcher sets when it starts the game.
const CAPE_PATH_VAR: &str = "FISHBATTERY_CAPE_PATH";
const CAPE_URL_VAR: &str = "FISHBATTERY_CAPE_URL";
const CAPE_ID_VAR: &str = "FISHBATTERY_CAPE_ID";
const CAPE_TIER_VAR: &str = "FISHBATTERY_CAPE_TIER";
const CAPE_SIGNATURE_VAR: &str = "FISHBATTERY_CAPE_SIGNATURE";
const CAPE_CATALOG_VAR: &str = "FISHBATTERY_CAPE_CATALOG";
const CAPE_META_VAR: &str = "FISHBATTERY_CAPE_META";
const PLAYER_UUID_VAR: &str = "FISHBATTERY_PLAYER_UUID";
const LOG_VAR: &str = "FISHBATTERY_LOG";

/// Everything the launcher tells us about the selected cape.
#[derive(Clone, Default, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Local file holding the cape image. Preferred over `cape_url` when it exists.
    pub cape_path: String,

    /// `http(s)` or `data:` URL of the cape image.
    pub cape_url: String,

    /// Catalog id of the selected cape. Empty when nothing is selected.
    pub cape_id: String,

    pub tier: String,

    /// Base64 signature of the cape bytes, needed for gated tiers.
    pub signature: String,

    pub catalog_path: Option<PathBuf>,

    /// Where selection changes are mirrored as JSON. Nothing is written if this is unset.
    pub meta_path: Option<PathBuf>,

    /// When set, capes are only served for this player.
    pub player_uuid: String,

    pub log_path: Option<PathBuf>,
}

impl Settings {
    /// Builds settings from a variable lookup. Values are trimmed, and blank paths count as unset.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Settings {
        let text = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .unwrap_or_default()
        };

        let path = |name: &str| Some(text(name)).filter(|p| !p.is_empty()).map(PathBuf::from);

        Settings {
            cape_path: text(CAPE_PATH_VAR),
            cape_url: text(CAPE_URL_VAR),
            cape_id: text(CAPE_ID_VAR),
            tier: text(CAPE_TIER_VAR),
            signature: text(CAPE_SIGNATURE_VAR),
            catalog_path: path(CAPE_CATALOG_VAR),
            meta_path: path(CAPE_META_VAR),
            player_uuid: text(PLAYER_UUID_VAR),
            log_path: path(LOG_VAR),
        }
    }

    /// Reads the settings from the process environment.
    pub fn from_env() -> Settings {
        Settings::from_lookup(|name| std::env::var(name).ok())
    }

    /// Attempts to parse the contents of `reader` to get a `Settings` value.
    fn parse_json(reader: impl Read) -> Result<Settings> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Looks for a settings file and loads it.
    fn load_from_file(path: &Path) -> Result<Option<Settings>> {
        if !path.exists() {
            // Not an error, there just aren't any settings.
            return Ok(None);
        }

        let mut settings = Settings::parse_json(File::open(path)?)?;
        settings.trim();

        Ok(Some(settings))
    }

    /// Loads settings from a JSON file, falling back to defaults if the file is missing or can't
    /// be read.
    pub fn load_file(path: impl AsRef<Path>) -> Settings {
        let path = path.as_ref();

        match Settings::load_from_file(path) {
            Ok(Some(settings)) => return settings,

            Ok(None) => log::info!("No settings at {}. Defaults will be used.", path.display()),

            Err(err) => {
                log::error!("Error loading settings file: {err:?}. Defaults will be used.")
            }
        }

        Settings::default()
    }

    fn trim(&mut self) {
        for value in [
            &mut self.cape_path,
            &mut self.cape_url,
            &mut self.cape_id,
            &mut self.tier,
            &mut self.signature,
            &mut self.player_uuid,
        ] {
            *value = value.trim().to_string();
        }
    }

    pub fn tier(&self) -> Tier {
        Tier::parse(&self.tier)
    }

    pub fn signature(&self) -> Option<&str> {
        Some(self.signature.as_str()).filter(|s| !s.is_empty())
    }

    /// The player capes are restricted to, if one is configured and valid.
    pub fn player_uuid(&self) -> Option<Uuid> {
        parse_uuid(&self.player_uuid)
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.catalog_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CATALOG_PATH))
    }

    /// Forgets the selected cape.
    pub fn clear_selection(&mut self) {
        self.cape_path.clear();
        self.cape_url.clear();
        self.cape_id.clear();
        self.tier.clear();
        self.signature.clear();
    }
}

use crate::services::assets::AssetEntry;
use camino::Utf8PathBuf;
use indexmap::IndexSet;
use serde::Deserialize;
use std::fmt;

/// File extension given to every packed map.
pub const ARCHIVE_EXTENSION: &str = "bsp";

/// Top-level shape of the settings document (`settings.json`).
///
/// The `settings` section is optional at the serde level so a missing section
/// can be reported with a proper message instead of a generic parse error.
#[derive(Debug, Clone, Deserialize)]
pub struct SettingsDocument {
    pub settings: Option<Settings>,
}

/// Global settings shared by every archive set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Game directory handed to the archiver (the folder holding `gameinfo.txt`)
    #[serde(default)]
    pub gameinfo_path: Utf8PathBuf,

    /// Path to the `bspzip` executable
    #[serde(default)]
    pub bspzip_path: Utf8PathBuf,

    /// Directory that receives the packed maps
    #[serde(default)]
    pub output_path: Utf8PathBuf,

    #[serde(default)]
    pub force_map_compression: bool,

    #[serde(default)]
    pub verbose_logging: bool,

    #[serde(default)]
    pub upload_maps_to_workshop: bool,

    #[serde(default)]
    pub extension_whitelist: ExtensionWhitelist,

    /// Names of the archive-set documents to load from the config directory
    #[serde(default)]
    pub bsp_config_file_names: Vec<String>,

    /// Raw asset specifications embedded into every enabled map
    #[serde(default)]
    pub global_assets: Vec<String>,
}

/// Shape of one archive-set document (`configs/<name>.json`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveSetDocument {
    pub maps: Option<Vec<MapOptions>>,

    #[serde(default)]
    pub shared_assets: Vec<String>,
}

/// Options for a single map to pack (and possibly publish).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapOptions {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub source_path: Utf8PathBuf,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_true")]
    pub compress: bool,

    #[serde(default)]
    pub ignore_assets: bool,

    /// Raw asset specifications, resolved at load time into `resolved_assets`
    #[serde(default)]
    pub assets: Vec<String>,

    #[serde(default)]
    pub workshop: WorkshopOptions,

    /// `outputPath/name.bsp`, computed during validation
    #[serde(skip)]
    pub output_path: Utf8PathBuf,

    /// Name of the archive-set document this map came from
    #[serde(skip)]
    pub config_name: String,

    #[serde(skip)]
    pub resolved_assets: Vec<AssetEntry>,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            name: String::new(),
            source_path: Utf8PathBuf::new(),
            enabled: true,
            compress: true,
            ignore_assets: false,
            assets: Vec::new(),
            workshop: WorkshopOptions::default(),
            output_path: Utf8PathBuf::new(),
            config_name: String::new(),
            resolved_assets: Vec::new(),
        }
    }
}

impl MapOptions {
    /// Whether packing needs the archiver at all
    pub fn is_passthrough(&self) -> bool {
        self.ignore_assets && !self.compress
    }
}

/// Workshop publish options embedded in a map entry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkshopOptions {
    #[serde(default)]
    pub upload: bool,

    /// Remote catalog identifier; 0 means "do not publish"
    #[serde(default, alias = "ID")]
    pub id: u64,

    #[serde(default)]
    pub visibility: Visibility,

    #[serde(default)]
    pub changelog: String,

    /// Remote details, filled in once the id is found in the user's catalog
    #[serde(skip)]
    pub details: Option<CatalogItem>,
}

/// Kind of a remote catalog entry. Only community content can be updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Community,
    Other,
}

/// An item from the current user's published workshop catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    pub id: u64,
    pub title: String,
    pub kind: ItemKind,
}

/// Workshop visibility, numbered the way the Steam API numbers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "VisibilityRepr")]
pub enum Visibility {
    Public,
    FriendsOnly,
    Private,
    #[default]
    Unlisted,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum VisibilityRepr {
    Index(i64),
    Name(String),
}

impl TryFrom<VisibilityRepr> for Visibility {
    type Error = String;

    fn try_from(repr: VisibilityRepr) -> Result<Self, Self::Error> {
        match repr {
            VisibilityRepr::Index(0) => Ok(Self::Public),
            VisibilityRepr::Index(1) => Ok(Self::FriendsOnly),
            VisibilityRepr::Index(2) => Ok(Self::Private),
            VisibilityRepr::Index(3) => Ok(Self::Unlisted),
            VisibilityRepr::Index(other) => Err(format!(
                "invalid visibility value {} (expected 0-3 or public/friendsOnly/private/unlisted)",
                other
            )),
            VisibilityRepr::Name(name) => {
                match name.to_ascii_lowercase().replace(['-', '_', ' '], "").as_str() {
                    "public" => Ok(Self::Public),
                    "friendsonly" => Ok(Self::FriendsOnly),
                    "private" => Ok(Self::Private),
                    "unlisted" => Ok(Self::Unlisted),
                    _ => Err(format!(
                        "invalid visibility value '{}' (expected 0-3 or public/friendsOnly/private/unlisted)",
                        name
                    )),
                }
            }
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Public => "Public",
            Self::FriendsOnly => "Friends Only",
            Self::Private => "Private",
            Self::Unlisted => "Unlisted",
        };
        f.write_str(label)
    }
}

/// Set of allowed asset file extensions, normalized to a leading dot.
///
/// Matching is case-sensitive. An empty whitelist allows every file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Vec<String>")]
pub struct ExtensionWhitelist(IndexSet<String>);

impl ExtensionWhitelist {
    /// Build a whitelist from raw entries, adding the leading dot where missing.
    pub fn from_entries<I, S>(entries: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = IndexSet::new();
        for entry in entries {
            let entry = entry.as_ref();
            if entry.is_empty() {
                return Err(
                    "'extensionWhitelist' must not contain a null or empty string".to_string(),
                );
            }
            if entry.starts_with('.') {
                set.insert(entry.to_string());
            } else {
                set.insert(format!(".{}", entry));
            }
        }
        Ok(Self(set))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether a file with the given extension (leading dot included) may be packed
    pub fn allows(&self, extension: Option<&str>) -> bool {
        if self.0.is_empty() {
            return true;
        }
        extension.is_some_and(|ext| self.0.contains(ext))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl TryFrom<Vec<String>> for ExtensionWhitelist {
    type Error = String;

    fn try_from(entries: Vec<String>) -> Result<Self, Self::Error> {
        Self::from_entries(entries)
    }
}

impl fmt::Display for ExtensionWhitelist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.iter().collect();
        f.write_str(&joined.join(", "))
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_options_defaults() {
        let map: MapOptions = serde_json::from_str(r#"{ "name": "koth_test" }"#).unwrap();
        assert!(map.enabled);
        assert!(map.compress);
        assert!(!map.ignore_assets);
        assert!(map.assets.is_empty());
        assert!(!map.workshop.upload);
        assert_eq!(map.workshop.id, 0);
        assert_eq!(map.workshop.visibility, Visibility::Unlisted);
    }

    #[test]
    fn test_workshop_id_alias() {
        let workshop: WorkshopOptions =
            serde_json::from_str(r#"{ "upload": true, "ID": 3453602691 }"#).unwrap();
        assert_eq!(workshop.id, 3453602691);
        assert!(workshop.upload);
    }

    #[test]
    fn test_visibility_from_index_and_name() {
        let vis: Visibility = serde_json::from_str("0").unwrap();
        assert_eq!(vis, Visibility::Public);
        let vis: Visibility = serde_json::from_str("\"friends-only\"").unwrap();
        assert_eq!(vis, Visibility::FriendsOnly);
        let vis: Visibility = serde_json::from_str("\"Private\"").unwrap();
        assert_eq!(vis, Visibility::Private);
        let vis: Visibility = serde_json::from_str("3").unwrap();
        assert_eq!(vis, Visibility::Unlisted);
    }

    #[test]
    fn test_visibility_rejects_out_of_range() {
        let err = serde_json::from_str::<Visibility>("7").unwrap_err();
        assert!(err.to_string().contains("invalid visibility value 7"));

        let err = serde_json::from_str::<Visibility>("\"hidden\"").unwrap_err();
        assert!(err.to_string().contains("hidden"));
    }

    #[test]
    fn test_whitelist_normalization() {
        let whitelist = ExtensionWhitelist::from_entries(["vmt", ".vtf", "vmt"]).unwrap();
        assert_eq!(whitelist.len(), 2);
        assert!(whitelist.allows(Some(".vmt")));
        assert!(whitelist.allows(Some(".vtf")));
        assert!(!whitelist.allows(Some(".VMT")));
        assert!(!whitelist.allows(None));
        assert_eq!(whitelist.to_string(), ".vmt, .vtf");
    }

    #[test]
    fn test_whitelist_rejects_empty_entry() {
        assert!(ExtensionWhitelist::from_entries(["vmt", ""]).is_err());
        assert!(serde_json::from_str::<ExtensionWhitelist>(r#"["vmt", ""]"#).is_err());
    }

    #[test]
    fn test_empty_whitelist_allows_everything() {
        let whitelist = ExtensionWhitelist::default();
        assert!(whitelist.allows(Some(".anything")));
        assert!(whitelist.allows(None));
    }

    #[test]
    fn test_passthrough_requires_ignore_without_compress() {
        let mut map = MapOptions {
            ignore_assets: true,
            compress: false,
            ..Default::default()
        };
        assert!(map.is_passthrough());
        map.compress = true;
        assert!(!map.is_passthrough());
    }
}

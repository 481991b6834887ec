use crate::models::{
    ARCHIVE_EXTENSION, ArchiveSet, ArchiveSetDocument, MapOptions, Project, Settings,
    SettingsDocument,
};
use crate::services::assets::{AssetError, AssetResolver, normalize_separators};
use camino::{Utf8Path, Utf8PathBuf};
use serde::de::DeserializeOwned;
use std::fs;
use thiserror::Error;

/// Default location of the settings document
pub const DEFAULT_SETTINGS_FILE: &str = "settings.json";

/// Default directory holding the archive-set documents
pub const DEFAULT_CONFIG_DIR: &str = "configs";

/// Extensions tried, in order, when looking up an archive-set document by name
pub const ARCHIVE_SET_EXTENSIONS: &[&str] = &["json", "yaml", "yml"];

const GAMEINFO_FILE: &str = "gameinfo.txt";

/// Errors raised while loading or validating configuration. All of them are fatal.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("The settings file '{0}' was not found")]
    SettingsNotFound(Utf8PathBuf),

    #[error("Failed to read '{path}': {source}")]
    Read {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse '{path}' due to invalid formatting or value types: {reason}")]
    Parse { path: Utf8PathBuf, reason: String },

    #[error("Missing the '{section}' section in '{path}'")]
    MissingSection {
        path: Utf8PathBuf,
        section: &'static str,
    },

    #[error("The directory for the setting 'gameinfoPath' does not exist: '{0}'")]
    GameinfoDirMissing(Utf8PathBuf),

    #[error("The file 'gameinfo.txt' does not exist at the directory of 'gameinfoPath': '{0}'")]
    GameinfoFileMissing(Utf8PathBuf),

    #[error("The file for the setting 'bspzipPath' does not exist: '{0}'")]
    BspzipMissing(Utf8PathBuf),

    #[error("The directory of 'outputPath' does not exist: '{0}'")]
    OutputDirMissing(Utf8PathBuf),

    #[error("No configs were specified within 'bspConfigFileNames'")]
    NoArchiveSets,

    #[error("Failed to find config file '{name}' in '{dir}' (tried .json, .yaml and .yml)")]
    ArchiveSetNotFound { name: String, dir: Utf8PathBuf },

    #[error("Found a map without a proper name within '{config}'")]
    UnnamedMap { config: String },

    #[error(
        "The value of 'sourcePath' for the bsp '{map}' within '{config}' cannot be the same as the 'outputPath'"
    )]
    SourceIsOutput { map: String, config: String },

    #[error("The 'sourcePath' for the bsp '{map}' within '{config}' does not exist: '{path}'")]
    SourceMissing {
        map: String,
        config: String,
        path: Utf8PathBuf,
    },

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error("Couldn't find any enabled maps from within the list of 'bspConfigFileNames'")]
    NoEnabledMaps,
}

/// Loads the settings document and every archive-set document it names, validating
/// paths and resolving asset specifications along the way.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    settings_path: Utf8PathBuf,
    config_dir: Utf8PathBuf,
}

impl ConfigManager {
    pub fn new(settings_path: impl Into<Utf8PathBuf>, config_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            settings_path: settings_path.into(),
            config_dir: config_dir.into(),
        }
    }

    /// Load everything a run needs.
    ///
    /// Fails on the first invalid value, in document order.
    pub fn load_project(&self) -> Result<Project, ConfigError> {
        let settings = self.load_settings()?;
        let resolver = AssetResolver::new(&settings.extension_whitelist);

        let resolved_global_assets = resolver.resolve_all(&settings.global_assets, "settings")?;

        let mut archive_sets = Vec::with_capacity(settings.bsp_config_file_names.len());
        for name in &settings.bsp_config_file_names {
            archive_sets.push(self.load_archive_set(name, &settings, &resolver)?);
        }

        let project = Project {
            settings,
            resolved_global_assets,
            archive_sets,
        };

        if project.enabled_map_count() == 0 {
            return Err(ConfigError::NoEnabledMaps);
        }

        tracing::info!(
            "Loaded {} archive sets with {} enabled maps",
            project.archive_sets.len(),
            project.enabled_map_count()
        );

        Ok(project)
    }

    /// Load and validate the `settings` section of the settings document.
    ///
    /// Paths are normalized to forward slashes. Global assets are not resolved here.
    pub fn load_settings(&self) -> Result<Settings, ConfigError> {
        if !self.settings_path.is_file() {
            return Err(ConfigError::SettingsNotFound(self.settings_path.clone()));
        }

        let document: SettingsDocument = read_document(&self.settings_path)?;
        let mut settings = document.settings.ok_or_else(|| ConfigError::MissingSection {
            path: self.settings_path.clone(),
            section: "settings",
        })?;

        settings.gameinfo_path = normalize_path(&settings.gameinfo_path);
        if !settings.gameinfo_path.is_dir() {
            return Err(ConfigError::GameinfoDirMissing(settings.gameinfo_path));
        }
        if !settings.gameinfo_path.join(GAMEINFO_FILE).is_file() {
            return Err(ConfigError::GameinfoFileMissing(settings.gameinfo_path));
        }

        settings.bspzip_path = normalize_path(&settings.bspzip_path);
        if !settings.bspzip_path.is_file() {
            return Err(ConfigError::BspzipMissing(settings.bspzip_path));
        }

        settings.output_path = normalize_path(&settings.output_path);
        if !settings.output_path.is_dir() {
            return Err(ConfigError::OutputDirMissing(settings.output_path));
        }

        if settings.bsp_config_file_names.is_empty() {
            return Err(ConfigError::NoArchiveSets);
        }

        tracing::info!("Loaded settings from {}", self.settings_path);
        tracing::debug!(
            "gameinfo: {}, bspzip: {}, output: {}, whitelist: [{}]",
            settings.gameinfo_path,
            settings.bspzip_path,
            settings.output_path,
            settings.extension_whitelist
        );

        Ok(settings)
    }

    /// Locate an archive-set document by name: `<name>.json`, then `.yaml`, then `.yml`
    pub fn find_archive_set(&self, name: &str) -> Result<Utf8PathBuf, ConfigError> {
        ARCHIVE_SET_EXTENSIONS
            .iter()
            .map(|ext| self.config_dir.join(format!("{}.{}", name, ext)))
            .find(|path| path.is_file())
            .ok_or_else(|| ConfigError::ArchiveSetNotFound {
                name: name.to_string(),
                dir: self.config_dir.clone(),
            })
    }

    /// Load one archive-set document and validate each of its maps against `settings`
    pub fn load_archive_set(
        &self,
        name: &str,
        settings: &Settings,
        resolver: &AssetResolver<'_>,
    ) -> Result<ArchiveSet, ConfigError> {
        let path = self.find_archive_set(name)?;
        let document: ArchiveSetDocument = read_document(&path)?;
        let owner = path.file_name().unwrap_or(name).to_string();

        let maps = document.maps.ok_or_else(|| ConfigError::MissingSection {
            path: path.clone(),
            section: "maps",
        })?;

        let resolved_shared_assets = resolver.resolve_all(&document.shared_assets, &owner)?;

        let mut validated = Vec::with_capacity(maps.len());
        for map in maps {
            validated.push(validate_map(map, name, &owner, settings, resolver)?);
        }

        tracing::debug!(
            "Loaded archive set '{}' from {} ({} maps, {} shared assets)",
            name,
            path,
            validated.len(),
            resolved_shared_assets.len()
        );

        Ok(ArchiveSet {
            name: name.to_string(),
            maps: validated,
            resolved_shared_assets,
        })
    }
}

fn validate_map(
    mut map: MapOptions,
    config_name: &str,
    owner: &str,
    settings: &Settings,
    resolver: &AssetResolver<'_>,
) -> Result<MapOptions, ConfigError> {
    if map.name.is_empty() {
        return Err(ConfigError::UnnamedMap {
            config: owner.to_string(),
        });
    }

    map.source_path = normalize_path(&map.source_path);
    map.output_path = settings
        .output_path
        .join(format!("{}.{}", map.name, ARCHIVE_EXTENSION));

    if map.source_path == settings.output_path || map.source_path == map.output_path {
        return Err(ConfigError::SourceIsOutput {
            map: map.name,
            config: owner.to_string(),
        });
    }

    if !map.source_path.is_file() {
        return Err(ConfigError::SourceMissing {
            map: map.name,
            config: owner.to_string(),
            path: map.source_path,
        });
    }

    map.resolved_assets = resolver.resolve_all(&map.assets, owner)?;
    map.config_name = config_name.to_string();

    Ok(map)
}

/// Replace backslashes with forward slashes
pub fn normalize_path(path: &Utf8Path) -> Utf8PathBuf {
    Utf8PathBuf::from(normalize_separators(path.as_str()))
}

/// Read a JSON document, or a YAML one when the extension is `.yaml`/`.yml`
pub fn read_document<T: DeserializeOwned>(path: &Utf8Path) -> Result<T, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let parsed = match path.extension() {
        Some("yaml") | Some("yml") => {
            serde_yaml_ng::from_str(&contents).map_err(|e| e.to_string())
        }
        _ => serde_json::from_str(&contents).map_err(|e| e.to_string()),
    };

    parsed.map_err(|reason| ConfigError::Parse {
        path: path.to_path_buf(),
        reason,
    })
}

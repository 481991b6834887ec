//! Asset specification parsing and resolution.
//!
//! An asset specification is a filesystem path with exactly one doubled separator (`//`)
//! in it. Everything before the marker is where the file lives on disk, everything after
//! it is where the file ends up inside the map:
//!
//! ```text
//! C:/mymod//materials/custom/wall.vmt
//!           └─ packed as materials/custom/wall.vmt
//! ```
//!
//! Pointing the specification at a directory packs every file below it (filtered by the
//! extension whitelist), keeping the part of each path after the marker.

use crate::models::ExtensionWhitelist;
use camino::{Utf8Path, Utf8PathBuf};
use std::path::PathBuf;
use thiserror::Error;
use walkdir::WalkDir;

/// Separator pair splitting the on-disk prefix from the in-archive path
pub const EMBED_MARKER: &str = "//";

/// One file to embed: where it goes inside the map and where it is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetEntry {
    pub internal_path: String,
    pub source_path: Utf8PathBuf,
}

/// Errors raised while resolving asset specifications
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Found a null or empty asset path within the '{owner}' config")]
    Empty { owner: String },

    #[error(
        "Found an invalid asset path '{spec}' within the '{owner}' config.\n\
         The path must include a // or \\\\ that precedes a file/folder that you want to pack into the map"
    )]
    MissingMarker { owner: String, spec: String },

    #[error(
        "Found an invalid asset path '{spec}' within the '{owner}' config.\n\
         The path must not have more than one instance of // or \\\\"
    )]
    MultipleMarkers { owner: String, spec: String },

    #[error("Found an invalid asset path '{path}' within the '{owner}' config (no such file or directory)")]
    NotFound { owner: String, path: Utf8PathBuf },

    #[error("Failed to read asset directory '{path}' for the '{owner}' config: {source}")]
    Walk {
        owner: String,
        path: Utf8PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Asset path '{}' within the '{owner}' config is not valid UTF-8", path.display())]
    NonUtf8 { owner: String, path: PathBuf },
}

/// Replace Windows separators with `/`.
pub fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

/// Final `.`-delimited suffix of a file name, dot included.
pub fn extension_of(path: &Utf8Path) -> Option<&str> {
    let name = path.file_name()?;
    name.rfind('.').map(|index| &name[index..])
}

/// A parsed asset specification.
///
/// Holds the real filesystem path (marker collapsed to a single separator) and the byte
/// offset in that path where the in-archive path begins. The offset stays valid for
/// every file found below a directory specification, since those paths share the prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetSpec {
    source: Utf8PathBuf,
    split: usize,
}

impl AssetSpec {
    pub fn parse(raw: &str, owner: &str) -> Result<Self, AssetError> {
        if raw.is_empty() {
            return Err(AssetError::Empty {
                owner: owner.to_string(),
            });
        }

        let normalized = normalize_separators(raw);

        let first = normalized
            .find(EMBED_MARKER)
            .ok_or_else(|| AssetError::MissingMarker {
                owner: owner.to_string(),
                spec: normalized.clone(),
            })?;

        if normalized.rfind(EMBED_MARKER) != Some(first) {
            return Err(AssetError::MultipleMarkers {
                owner: owner.to_string(),
                spec: normalized,
            });
        }

        let mut collapsed = normalized;
        collapsed.remove(first);

        Ok(Self {
            source: Utf8PathBuf::from(collapsed),
            split: first + 1,
        })
    }

    /// Real filesystem path the specification points at
    pub fn source(&self) -> &Utf8Path {
        &self.source
    }

    /// In-archive path of the specification itself
    pub fn internal_path(&self) -> &str {
        self.internal_for(self.source.as_str())
    }

    fn internal_for<'p>(&self, path: &'p str) -> &'p str {
        path.get(self.split..).unwrap_or(path)
    }
}

/// Expands asset specifications into concrete [`AssetEntry`] lists.
#[derive(Debug, Clone, Copy)]
pub struct AssetResolver<'a> {
    whitelist: &'a ExtensionWhitelist,
}

impl<'a> AssetResolver<'a> {
    pub fn new(whitelist: &'a ExtensionWhitelist) -> Self {
        Self { whitelist }
    }

    /// Resolve a list of specifications in order.
    ///
    /// All entries of specification *i* come before those of specification *i + 1*.
    /// The first invalid specification aborts the whole list.
    pub fn resolve_all<S: AsRef<str>>(
        &self,
        specs: &[S],
        owner: &str,
    ) -> Result<Vec<AssetEntry>, AssetError> {
        let mut entries = Vec::new();
        for spec in specs {
            self.resolve_into(spec.as_ref(), owner, &mut entries)?;
        }
        Ok(entries)
    }

    /// Resolve a single specification.
    ///
    /// # Arguments
    /// * `raw` - The specification as written in the config
    /// * `owner` - Config name used in error messages
    pub fn resolve(&self, raw: &str, owner: &str) -> Result<Vec<AssetEntry>, AssetError> {
        let mut entries = Vec::new();
        self.resolve_into(raw, owner, &mut entries)?;
        Ok(entries)
    }

    fn resolve_into(
        &self,
        raw: &str,
        owner: &str,
        entries: &mut Vec<AssetEntry>,
    ) -> Result<(), AssetError> {
        let spec = AssetSpec::parse(raw, owner)?;

        if spec.source().is_file() {
            entries.push(AssetEntry {
                internal_path: spec.internal_path().to_string(),
                source_path: spec.source().to_path_buf(),
            });
            return Ok(());
        }

        if spec.source().is_dir() {
            let before = entries.len();
            self.walk_directory(&spec, owner, entries)?;
            tracing::debug!(
                "Resolved {} assets from directory {}",
                entries.len() - before,
                spec.source()
            );
            return Ok(());
        }

        Err(AssetError::NotFound {
            owner: owner.to_string(),
            path: spec.source().to_path_buf(),
        })
    }

    fn walk_directory(
        &self,
        spec: &AssetSpec,
        owner: &str,
        entries: &mut Vec<AssetEntry>,
    ) -> Result<(), AssetError> {
        let walker = WalkDir::new(spec.source())
            .follow_links(true)
            .sort_by_file_name();

        for entry in walker {
            let entry = entry.map_err(|source| AssetError::Walk {
                owner: owner.to_string(),
                path: spec.source().to_path_buf(),
                source,
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let path = Utf8Path::from_path(entry.path()).ok_or_else(|| AssetError::NonUtf8 {
                owner: owner.to_string(),
                path: entry.path().to_path_buf(),
            })?;
            let file = Utf8PathBuf::from(normalize_separators(path.as_str()));

            if !self.whitelist.allows(extension_of(&file)) {
                tracing::trace!("Skipping {} (extension not whitelisted)", file);
                continue;
            }

            entries.push(AssetEntry {
                internal_path: spec.internal_for(file.as_str()).to_string(),
                source_path: file,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn utf8_root(dir: &TempDir) -> String {
        normalize_separators(dir.path().to_str().unwrap())
    }

    #[test]
    fn test_parse_collapses_marker() {
        let spec = AssetSpec::parse("C:/mod//materials/wall.vmt", "test").unwrap();
        assert_eq!(spec.source(), Utf8Path::new("C:/mod/materials/wall.vmt"));
        assert_eq!(spec.internal_path(), "materials/wall.vmt");
    }

    #[test]
    fn test_parse_normalizes_backslashes() {
        let spec = AssetSpec::parse("C:\\mod\\\\sound\\a.wav", "test").unwrap();
        assert_eq!(spec.source(), Utf8Path::new("C:/mod/sound/a.wav"));
        assert_eq!(spec.internal_path(), "sound/a.wav");
    }

    #[test]
    fn test_parse_rejects_missing_marker() {
        let err = AssetSpec::parse("C:/mod/materials", "cfg").unwrap_err();
        assert!(matches!(err, AssetError::MissingMarker { .. }));
        assert!(err.to_string().contains("//"));
        assert!(err.to_string().contains("cfg"));
    }

    #[test]
    fn test_parse_rejects_multiple_markers() {
        assert!(matches!(
            AssetSpec::parse("C:/mod//materials//x", "cfg"),
            Err(AssetError::MultipleMarkers { .. })
        ));
        // Three separators in a row count as two overlapping markers
        assert!(matches!(
            AssetSpec::parse("C:/mod///x", "cfg"),
            Err(AssetError::MultipleMarkers { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(matches!(
            AssetSpec::parse("", "cfg"),
            Err(AssetError::Empty { .. })
        ));
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of(Utf8Path::new("a/b/wall.vmt")), Some(".vmt"));
        assert_eq!(extension_of(Utf8Path::new("a/b/wall.vmt.bak")), Some(".bak"));
        assert_eq!(extension_of(Utf8Path::new("a/b/README")), None);
    }

    #[test]
    fn test_resolve_single_file() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("materials")).unwrap();
        fs::write(dir.path().join("materials/wall.vmt"), "x").unwrap();

        let root = utf8_root(&dir);
        let whitelist = ExtensionWhitelist::default();
        let resolver = AssetResolver::new(&whitelist);
        let entries = resolver
            .resolve(&format!("{}//materials/wall.vmt", root), "test")
            .unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].internal_path, "materials/wall.vmt");
        assert_eq!(
            entries[0].source_path,
            Utf8PathBuf::from(format!("{}/materials/wall.vmt", root))
        );
    }

    #[test]
    fn test_resolve_directory_with_whitelist() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("materials/sub")).unwrap();
        fs::write(dir.path().join("materials/a.vmt"), "x").unwrap();
        fs::write(dir.path().join("materials/b.txt"), "x").unwrap();
        fs::write(dir.path().join("materials/sub/c.vtf"), "x").unwrap();

        let root = utf8_root(&dir);
        let whitelist = ExtensionWhitelist::from_entries(["vmt", "vtf"]).unwrap();
        let resolver = AssetResolver::new(&whitelist);
        let entries = resolver
            .resolve(&format!("{}//materials", root), "test")
            .unwrap();

        let internal: Vec<&str> = entries.iter().map(|e| e.internal_path.as_str()).collect();
        assert_eq!(internal, vec!["materials/a.vmt", "materials/sub/c.vtf"]);
        for entry in &entries {
            assert!(entry.source_path.as_str().ends_with(&entry.internal_path));
        }
    }

    #[test]
    fn test_resolve_directory_marker_at_end() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("models")).unwrap();
        fs::write(dir.path().join("models/prop.mdl"), "x").unwrap();

        let root = utf8_root(&dir);
        let whitelist = ExtensionWhitelist::default();
        let entries = AssetResolver::new(&whitelist)
            .resolve(&format!("{}//", root), "test")
            .unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].internal_path, "models/prop.mdl");
    }

    #[test]
    fn test_resolve_missing_path() {
        let dir = TempDir::new().unwrap();
        let root = utf8_root(&dir);
        let whitelist = ExtensionWhitelist::default();
        let err = AssetResolver::new(&whitelist)
            .resolve(&format!("{}//nothing/here.vmt", root), "maps_a")
            .unwrap_err();

        assert!(matches!(err, AssetError::NotFound { .. }));
        assert!(err.to_string().contains("maps_a"));
        assert!(err.to_string().contains("nothing/here.vmt"));
    }

    #[test]
    fn test_resolve_all_preserves_spec_order() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("z.vmt"), "x").unwrap();
        fs::write(dir.path().join("a.vmt"), "x").unwrap();

        let root = utf8_root(&dir);
        let whitelist = ExtensionWhitelist::default();
        let entries = AssetResolver::new(&whitelist)
            .resolve_all(
                &[format!("{}//z.vmt", root), format!("{}//a.vmt", root)],
                "test",
            )
            .unwrap();

        let internal: Vec<&str> = entries.iter().map(|e| e.internal_path.as_str()).collect();
        assert_eq!(internal, vec!["z.vmt", "a.vmt"]);
    }

    #[test]
    fn test_duplicates_are_kept() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.vmt"), "x").unwrap();

        let root = utf8_root(&dir);
        let spec = format!("{}//a.vmt", root);
        let whitelist = ExtensionWhitelist::default();
        let entries = AssetResolver::new(&whitelist)
            .resolve_all(&[spec.clone(), spec], "test")
            .unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], entries[1]);
    }
}

use crate::models::config::{MapOptions, Settings};
use crate::services::assets::AssetEntry;

/// One loaded archive-set document: its maps plus the assets shared between them.
#[derive(Debug, Clone, Default)]
pub struct ArchiveSet {
    /// Document name as listed in `bspConfigFileNames`
    pub name: String,
    pub maps: Vec<MapOptions>,
    pub resolved_shared_assets: Vec<AssetEntry>,
}

impl ArchiveSet {
    pub fn enabled_maps(&self) -> impl Iterator<Item = &MapOptions> {
        self.maps.iter().filter(|map| map.enabled)
    }
}

/// Everything one run works from: validated settings and every archive set.
///
/// Built once by [`ConfigManager::load_project`](crate::config::ConfigManager::load_project).
/// Only the workshop details of each map change afterwards.
#[derive(Debug, Clone, Default)]
pub struct Project {
    pub settings: Settings,
    pub resolved_global_assets: Vec<AssetEntry>,
    pub archive_sets: Vec<ArchiveSet>,
}

impl Project {
    /// Number of enabled maps across every archive set
    pub fn enabled_map_count(&self) -> usize {
        self.archive_sets
            .iter()
            .map(|set| set.enabled_maps().count())
            .sum()
    }

    /// Assets for a map's manifest: map-local, then archive-set shared, then global.
    pub fn manifest_entries<'a>(
        &'a self,
        set: &'a ArchiveSet,
        map: &'a MapOptions,
    ) -> impl Iterator<Item = &'a AssetEntry> {
        map.resolved_assets
            .iter()
            .chain(set.resolved_shared_assets.iter())
            .chain(self.resolved_global_assets.iter())
    }

    /// Enabled maps marked for upload, in configuration order.
    ///
    /// Empty when publishing is switched off globally.
    pub fn publish_candidates_mut(&mut self) -> Vec<&mut MapOptions> {
        if !self.settings.upload_maps_to_workshop {
            return Vec::new();
        }

        self.archive_sets
            .iter_mut()
            .flat_map(|set| set.maps.iter_mut())
            .filter(|map| map.enabled && map.workshop.upload)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::WorkshopOptions;
    use camino::Utf8PathBuf;

    fn entry(internal: &str) -> AssetEntry {
        AssetEntry {
            internal_path: internal.to_string(),
            source_path: Utf8PathBuf::from(format!("/src/{}", internal)),
        }
    }

    fn map(name: &str, enabled: bool, upload: bool) -> MapOptions {
        MapOptions {
            name: name.to_string(),
            enabled,
            workshop: WorkshopOptions {
                upload,
                id: 1,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_manifest_order_is_local_shared_global() {
        let mut local = map("a", true, false);
        local.resolved_assets = vec![entry("local.vmt")];

        let set = ArchiveSet {
            name: "set".to_string(),
            maps: vec![local.clone()],
            resolved_shared_assets: vec![entry("shared.vmt")],
        };

        let project = Project {
            resolved_global_assets: vec![entry("global.vmt")],
            archive_sets: vec![set.clone()],
            ..Default::default()
        };

        let order: Vec<&str> = project
            .manifest_entries(&set, &local)
            .map(|e| e.internal_path.as_str())
            .collect();
        assert_eq!(order, vec!["local.vmt", "shared.vmt", "global.vmt"]);
    }

    #[test]
    fn test_enabled_map_count() {
        let project = Project {
            archive_sets: vec![
                ArchiveSet {
                    maps: vec![map("a", true, false), map("b", false, false)],
                    ..Default::default()
                },
                ArchiveSet {
                    maps: vec![map("c", true, false)],
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        assert_eq!(project.enabled_map_count(), 2);
    }

    #[test]
    fn test_publish_candidates_respect_global_flag() {
        let mut project = Project {
            archive_sets: vec![ArchiveSet {
                maps: vec![
                    map("a", true, true),
                    map("b", false, true),
                    map("c", true, false),
                ],
                ..Default::default()
            }],
            ..Default::default()
        };

        assert!(project.publish_candidates_mut().is_empty());

        project.settings.upload_maps_to_workshop = true;
        let names: Vec<String> = project
            .publish_candidates_mut()
            .into_iter()
            .map(|m| m.name.clone())
            .collect();
        assert_eq!(names, vec!["a".to_string()]);
    }
}

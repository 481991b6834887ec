use crate::metrics::RunMetrics;
use crate::models::{ARCHIVE_EXTENSION, ArchiveSet, MapOptions, Project};
use crate::services::archiver::{ArchiveTool, ArchiveToolError, ToolStatus};
use crate::services::assets::AssetEntry;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use thiserror::Error;

/// Name of the asset list handed to `bspzip -addlist`
pub const MANIFEST_FILE_NAME: &str = "assets.txt";

/// Prefix of the per-run scratch directory
pub const SCRATCH_PREFIX: &str = "mappacker-";

/// Errors that abort a packing run
#[derive(Error, Debug)]
pub enum PackError {
    #[error("Failed to create a temporary directory in '{}': {source}", parent.display())]
    Scratch {
        parent: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Temporary directory '{}' is not a valid UTF-8 path", .0.display())]
    ScratchPath(PathBuf),

    #[error("Failed to write a temp bsp for '{map}' in the temp directory '{scratch}': {source}")]
    Stage {
        map: String,
        scratch: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write the asset list '{path}' for '{map}': {source}")]
    Manifest {
        map: String,
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to copy '{map}' to the output path '{output}': {source}")]
    Finalize {
        map: String,
        output: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Tool(#[from] ArchiveToolError),
}

/// One step performed while packing a map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackStep {
    /// Source map copied into the scratch directory
    Staged,
    /// Staged map copied to the output untouched (ignores assets, no compression)
    PassedThrough,
    /// `-repack` run before injecting assets
    Decompressed,
    /// Manifest written and `-addlist` run, producing the output file
    AssetsInjected,
    /// `-repack` run again on the staged map
    Compressed,
    /// Staged map copied to the output after the archiver steps
    CopiedToOutput,
}

/// What happened to one map
#[derive(Debug, Clone)]
pub struct MapReport {
    pub name: String,
    pub output_path: Utf8PathBuf,
    pub steps: Vec<PackStep>,
    /// Asset pairs listed in the manifest (0 when assets were ignored)
    pub asset_count: usize,
}

/// Result of packing every enabled map
#[derive(Debug, Clone, Default)]
pub struct PackReport {
    pub maps: Vec<MapReport>,
}

/// Drives the archiver over every enabled map, one map at a time.
///
/// All maps share one scratch directory. It is removed when packing finishes, and it is
/// also removed on drop when a fatal error cuts the run short.
pub struct Packer<'a, T: ArchiveTool> {
    project: &'a Project,
    tool: &'a T,
    metrics: &'a RunMetrics,
    scratch: TempDir,
    scratch_path: Utf8PathBuf,
}

impl<'a, T: ArchiveTool> Packer<'a, T> {
    /// Create a packer with a fresh scratch directory under the system temp dir
    pub fn new(project: &'a Project, tool: &'a T, metrics: &'a RunMetrics) -> Result<Self, PackError> {
        Self::with_scratch_parent(project, tool, metrics, std::env::temp_dir())
    }

    /// Create a packer whose scratch directory lives under `parent`
    pub fn with_scratch_parent(
        project: &'a Project,
        tool: &'a T,
        metrics: &'a RunMetrics,
        parent: impl AsRef<Path>,
    ) -> Result<Self, PackError> {
        let parent = parent.as_ref();
        let scratch = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(parent)
            .map_err(|source| PackError::Scratch {
                parent: parent.to_path_buf(),
                source,
            })?;

        let scratch_path = Utf8PathBuf::try_from(scratch.path().to_path_buf())
            .map_err(|e| PackError::ScratchPath(e.into_path_buf()))?;

        tracing::debug!("Created scratch directory {}", scratch_path);

        Ok(Self {
            project,
            tool,
            metrics,
            scratch,
            scratch_path,
        })
    }

    /// Pack every enabled map in configuration order.
    ///
    /// Stops at the first fatal error. Maps already written to the output directory stay there.
    pub async fn pack_all(self) -> Result<PackReport, PackError> {
        let mut report = PackReport::default();

        for set in &self.project.archive_sets {
            for map in set.enabled_maps() {
                let map_report = self.pack_map(set, map).await?;
                report.maps.push(map_report);
            }
        }

        let scratch_path = self.scratch_path.clone();
        if let Err(e) = self.scratch.close() {
            tracing::warn!("Failed to remove temporary directory {}: {}", scratch_path, e);
        }

        Ok(report)
    }

    async fn pack_map(&self, set: &ArchiveSet, map: &MapOptions) -> Result<MapReport, PackError> {
        let settings = &self.project.settings;
        let staged = self
            .scratch_path
            .join(format!("{}.{}", map.name, ARCHIVE_EXTENSION));

        let mut report = MapReport {
            name: map.name.clone(),
            output_path: map.output_path.clone(),
            steps: Vec::new(),
            asset_count: 0,
        };

        fs::copy(&map.source_path, &staged).map_err(|source| PackError::Stage {
            map: map.name.clone(),
            scratch: self.scratch_path.clone(),
            source,
        })?;
        report.steps.push(PackStep::Staged);

        if map.is_passthrough() {
            self.copy_to_output(map, &staged)?;
            report.steps.push(PackStep::PassedThrough);
            self.metrics.record_map_passed_through();
            tracing::info!("{} - No Operations Performed", map.name);
            return Ok(report);
        }

        // -addlist and the compression pass both need a decompressed map
        tracing::info!("{} - Decompressing...", map.name);
        let status = self.tool.repack(&staged).await?;
        self.observe(map, "decompress", status);
        report.steps.push(PackStep::Decompressed);

        if !map.ignore_assets {
            let manifest = self.scratch_path.join(MANIFEST_FILE_NAME);
            let count = write_manifest(&manifest, self.project.manifest_entries(set, map))
                .map_err(|source| PackError::Manifest {
                    map: map.name.clone(),
                    path: manifest.clone(),
                    source,
                })?;
            self.metrics.record_manifest_entries(count);
            report.asset_count = count;

            tracing::info!("{} - Packing {} assets...", map.name, count);
            let status = self
                .tool
                .add_list(&staged, &manifest, &map.output_path)
                .await?;
            self.observe(map, "add assets", status);
            report.steps.push(PackStep::AssetsInjected);
        }

        if map.compress || settings.force_map_compression {
            tracing::info!("{} - Compressing...", map.name);
            let status = self.tool.repack(&staged).await?;
            self.observe(map, "compress", status);
            report.steps.push(PackStep::Compressed);
        }

        // -addlist writes the output itself; without it the staged copy is the result
        if map.ignore_assets {
            self.copy_to_output(map, &staged)?;
            report.steps.push(PackStep::CopiedToOutput);
        }

        self.metrics.record_map_packed();
        tracing::info!("{} - Completed!", map.name);

        Ok(report)
    }

    fn copy_to_output(&self, map: &MapOptions, staged: &Utf8Path) -> Result<(), PackError> {
        fs::copy(staged, &map.output_path).map_err(|source| PackError::Finalize {
            map: map.name.clone(),
            output: map.output_path.clone(),
            source,
        })?;
        Ok(())
    }

    fn observe(&self, map: &MapOptions, operation: &str, status: ToolStatus) {
        self.metrics.record_tool_invocation(status.is_success());
        if !status.is_success() {
            tracing::warn!(
                "{} - bspzip {} exited with code {:?}, continuing",
                map.name,
                operation,
                status.code
            );
        }
    }
}

/// Write a `bspzip -addlist` manifest: the in-archive path on one line, the source file on the next.
///
/// # Returns
/// The number of asset pairs written
pub fn write_manifest<'e>(
    path: &Utf8Path,
    entries: impl IntoIterator<Item = &'e AssetEntry>,
) -> io::Result<usize> {
    let mut writer = BufWriter::new(File::create(path)?);
    let mut count = 0;

    for entry in entries {
        writeln!(writer, "{}", entry.internal_path)?;
        writeln!(writer, "{}", entry.source_path)?;
        count += 1;
    }

    writer.flush()?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_manifest_alternates_lines() {
        let dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(dir.path().join("assets.txt")).unwrap();

        let entries = vec![
            AssetEntry {
                internal_path: "materials/a.vmt".to_string(),
                source_path: Utf8PathBuf::from("C:/mod/materials/a.vmt"),
            },
            AssetEntry {
                internal_path: "sound/b.wav".to_string(),
                source_path: Utf8PathBuf::from("C:/mod/sound/b.wav"),
            },
        ];

        let count = write_manifest(&path, &entries).unwrap();
        assert_eq!(count, 2);

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines,
            vec![
                "materials/a.vmt",
                "C:/mod/materials/a.vmt",
                "sound/b.wav",
                "C:/mod/sound/b.wav",
            ]
        );
    }

    #[test]
    fn test_write_manifest_empty() {
        let dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(dir.path().join("assets.txt")).unwrap();

        let count = write_manifest(&path, std::iter::empty()).unwrap();
        assert_eq!(count, 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_write_manifest_into_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(dir.path().join("gone/assets.txt")).unwrap();
        assert!(write_manifest(&path, std::iter::empty()).is_err());
    }
}

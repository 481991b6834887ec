use camino::{Utf8Path, Utf8PathBuf};
use std::future::Future;
use std::time::Instant;
use thiserror::Error;
use tokio::process::Command;

/// Exit status of one archiver run.
///
/// A non-zero code is reported but never treated as fatal; the archiver prints its own
/// diagnostics to the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolStatus {
    /// Process exit code, `None` if the process was killed by a signal
    pub code: Option<i32>,
}

impl ToolStatus {
    pub fn success() -> Self {
        Self { code: Some(0) }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Errors that can occur while running the archiver
#[derive(Error, Debug)]
pub enum ArchiveToolError {
    #[error("Failed to launch archiver {exe}: {source}")]
    Spawn {
        exe: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to wait for archiver {exe}: {source}")]
    Wait {
        exe: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Operations the packer needs from the external map archiver.
///
/// Both operations block until the archiver exits. Only one invocation runs at a time.
pub trait ArchiveTool {
    /// Repack `archive` in place. Used both to decompress and to compress.
    fn repack(
        &self,
        archive: &Utf8Path,
    ) -> impl Future<Output = Result<ToolStatus, ArchiveToolError>>;

    /// Inject every file listed in `manifest` into `archive`, writing the result to `output`.
    fn add_list(
        &self,
        archive: &Utf8Path,
        manifest: &Utf8Path,
        output: &Utf8Path,
    ) -> impl Future<Output = Result<ToolStatus, ArchiveToolError>>;
}

/// The Source SDK `bspzip` tool.
///
/// Every invocation gets `-game <gameinfo dir>` followed by exactly one operation flag:
///
/// - `-repack <staged.bsp>`
/// - `-addlist <staged.bsp> <assets.txt> <output.bsp>`
#[derive(Debug, Clone)]
pub struct BspZip {
    exe: Utf8PathBuf,
    game_dir: Utf8PathBuf,
}

impl BspZip {
    pub fn new(exe: impl Into<Utf8PathBuf>, game_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            exe: exe.into(),
            game_dir: game_dir.into(),
        }
    }

    /// Arguments for an in-place repack
    pub fn repack_args(&self, archive: &Utf8Path) -> Vec<String> {
        vec![
            "-game".to_string(),
            self.game_dir.to_string(),
            "-repack".to_string(),
            archive.to_string(),
        ]
    }

    /// Arguments for adding the files listed in a manifest
    pub fn add_list_args(
        &self,
        archive: &Utf8Path,
        manifest: &Utf8Path,
        output: &Utf8Path,
    ) -> Vec<String> {
        vec![
            "-game".to_string(),
            self.game_dir.to_string(),
            "-addlist".to_string(),
            archive.to_string(),
            manifest.to_string(),
            output.to_string(),
        ]
    }

    async fn run(&self, args: Vec<String>) -> Result<ToolStatus, ArchiveToolError> {
        tracing::debug!("Executing: {} {}", self.exe, args.join(" "));

        let start = Instant::now();

        let child = Command::new(self.exe.as_std_path())
            .args(&args)
            .spawn()
            .map_err(|source| ArchiveToolError::Spawn {
                exe: self.exe.clone(),
                source,
            })?;

        let output = child
            .wait_with_output()
            .await
            .map_err(|source| ArchiveToolError::Wait {
                exe: self.exe.clone(),
                source,
            })?;

        let status = ToolStatus {
            code: output.status.code(),
        };

        tracing::debug!(
            "bspzip completed in {:.2}s with exit code {:?}",
            start.elapsed().as_secs_f32(),
            status.code
        );

        Ok(status)
    }
}

impl ArchiveTool for BspZip {
    async fn repack(&self, archive: &Utf8Path) -> Result<ToolStatus, ArchiveToolError> {
        self.run(self.repack_args(archive)).await
    }

    async fn add_list(
        &self,
        archive: &Utf8Path,
        manifest: &Utf8Path,
        output: &Utf8Path,
    ) -> Result<ToolStatus, ArchiveToolError> {
        self.run(self.add_list_args(archive, manifest, output)).await
    }
}

//! The run loop: summary → confirmation → packing → publishing.
//!
//! Every fatal condition below this point comes back as an error; only `main` turns one
//! into an exit code.

use crate::metrics::RunMetrics;
use crate::models::{Project, Visibility};
use crate::services::{
    ArchiveTool, CatalogPage, ItemUpdate, Packer, Pending, PublishError, PublishOutcome,
    PublishSettings, Publisher, SubmitOutcome, WorkshopClient, filter_publish_candidates,
};
use crate::ui::{Operator, log_project_summary};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use tokio::process::Command;

/// Switches that change how a run interacts with the operator
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Skip the settings confirmation prompt
    pub assume_yes: bool,
    /// Open the output directory once packing finishes
    pub open_output: bool,
    /// Where the scratch directory is created (system temp dir when `None`)
    pub scratch_parent: Option<Utf8PathBuf>,
    pub publish: PublishSettings,
}

/// How a run ended, short of an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The operator rejected the settings summary; nothing was packed
    Declined,
    Completed {
        packed: usize,
        /// `None` when publishing is switched off
        publish: Option<PublishOutcome>,
    },
}

/// Workshop client for builds without a workshop backend. It cannot be constructed.
#[derive(Debug)]
pub enum NoWorkshop {}

impl WorkshopClient for NoWorkshop {
    fn query_owned_items(&self, _page: u32) -> Pending<Result<CatalogPage, PublishError>> {
        match *self {}
    }

    fn begin_item_update(&self, _item_id: u64) -> ItemUpdate {
        match *self {}
    }

    fn set_item_content(&self, _update: &mut ItemUpdate, _content: &Utf8Path) {
        match *self {}
    }

    fn set_item_visibility(&self, _update: &mut ItemUpdate, _visibility: Visibility) {
        match *self {}
    }

    fn submit_item_update(
        &self,
        _update: ItemUpdate,
        _changelog: &str,
    ) -> Pending<Result<SubmitOutcome, PublishError>> {
        match *self {}
    }

    fn run_callbacks(&self) {
        match *self {}
    }
}

/// Run the whole pipeline over a loaded project.
///
/// `connect` opens the workshop session. It is only called when at least one map
/// survives the publish filter.
pub async fn run_pipeline<T, O, C, F>(
    project: &mut Project,
    tool: &T,
    operator: &mut O,
    connect: F,
    metrics: &RunMetrics,
    options: &PipelineOptions,
) -> Result<RunOutcome>
where
    T: ArchiveTool,
    O: Operator + ?Sized,
    C: WorkshopClient,
    F: FnOnce() -> Result<C, PublishError>,
{
    log_project_summary(project, project.settings.verbose_logging);

    if !options.assume_yes
        && !operator.confirm("Enter 'y' to confirm these settings. Enter anything else to abort: ")
    {
        tracing::info!("Settings not confirmed, nothing was packed");
        return Ok(RunOutcome::Declined);
    }

    tracing::info!("> Packing & Compressing");
    let packer = match &options.scratch_parent {
        Some(parent) => Packer::with_scratch_parent(project, tool, metrics, parent),
        None => Packer::new(project, tool, metrics),
    }
    .context("Failed to prepare the scratch directory")?;

    let report = packer.pack_all().await.context("Packing failed")?;
    tracing::info!("Packed {} maps into {}", report.maps.len(), project.settings.output_path);

    if options.open_output {
        reveal_output_dir(&project.settings.output_path);
    }

    if !project.settings.upload_maps_to_workshop {
        metrics.log_summary();
        return Ok(RunOutcome::Completed {
            packed: report.maps.len(),
            publish: None,
        });
    }

    tracing::info!("> Uploading To Workshop");
    let candidates = filter_publish_candidates(project.publish_candidates_mut());

    let publish = if candidates.is_empty() {
        tracing::info!("No maps were found to be uploaded to the workshop");
        PublishOutcome::NothingToPublish
    } else {
        let client = connect().context("Failed to start a workshop session")?;
        Publisher::new(&client, operator, metrics)
            .with_settings(options.publish)
            .publish(candidates)
            .await
            .context("Workshop upload failed")?
    };

    metrics.log_summary();

    Ok(RunOutcome::Completed {
        packed: report.maps.len(),
        publish: Some(publish),
    })
}

/// Open `dir` in the platform file manager. Failures are only logged.
pub fn reveal_output_dir(dir: &Utf8Path) {
    let (program, target) = if cfg!(windows) {
        ("explorer", dir.as_str().replace('/', "\\"))
    } else if cfg!(target_os = "macos") {
        ("open", dir.to_string())
    } else {
        ("xdg-open", dir.to_string())
    };

    match Command::new(program).arg(&target).spawn() {
        Ok(_) => tracing::debug!("Opened {} with {}", target, program),
        Err(e) => tracing::warn!("Failed to open the output directory {}: {}", dir, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArchiveSet, MapOptions, Settings};
    use crate::services::{ArchiveToolError, ToolStatus};
    use std::cell::Cell;
    use tempfile::TempDir;

    #[derive(Default)]
    struct CountingTool {
        calls: Cell<usize>,
    }

    impl ArchiveTool for CountingTool {
        async fn repack(&self, _archive: &Utf8Path) -> Result<ToolStatus, ArchiveToolError> {
            self.calls.set(self.calls.get() + 1);
            Ok(ToolStatus::success())
        }

        async fn add_list(
            &self,
            _archive: &Utf8Path,
            _manifest: &Utf8Path,
            output: &Utf8Path,
        ) -> Result<ToolStatus, ArchiveToolError> {
            self.calls.set(self.calls.get() + 1);
            std::fs::write(output, b"packed").unwrap();
            Ok(ToolStatus::success())
        }
    }

    struct Answers(Vec<bool>);

    impl Operator for Answers {
        fn confirm(&mut self, _prompt: &str) -> bool {
            if self.0.is_empty() { false } else { self.0.remove(0) }
        }

        fn status(&mut self, _line: &str) {}

        fn acknowledge(&mut self) {}
    }

    fn no_workshop() -> Result<NoWorkshop, PublishError> {
        Err(PublishError::Unsupported)
    }

    fn fixture(dir: &TempDir, upload: bool) -> Project {
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        let source = root.join("koth_a_src.bsp");
        std::fs::write(&source, b"VBSP").unwrap();
        let output_dir = root.join("out");
        std::fs::create_dir(&output_dir).unwrap();

        let mut map = MapOptions {
            name: "koth_a".to_string(),
            source_path: source,
            output_path: output_dir.join("koth_a.bsp"),
            ..Default::default()
        };
        map.workshop.upload = true;
        map.workshop.id = 77;

        Project {
            settings: Settings {
                output_path: output_dir,
                upload_maps_to_workshop: upload,
                ..Default::default()
            },
            resolved_global_assets: Vec::new(),
            archive_sets: vec![ArchiveSet {
                name: "koth".to_string(),
                maps: vec![map],
                ..Default::default()
            }],
        }
    }

    fn options(dir: &TempDir) -> PipelineOptions {
        PipelineOptions {
            scratch_parent: Some(Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_declined_settings_pack_nothing() {
        let dir = TempDir::new().unwrap();
        let mut project = fixture(&dir, false);
        let tool = CountingTool::default();
        let metrics = RunMetrics::new();

        let outcome = run_pipeline(
            &mut project,
            &tool,
            &mut Answers(vec![false]),
            no_workshop,
            &metrics,
            &options(&dir),
        )
        .await
        .unwrap();

        assert_eq!(outcome, RunOutcome::Declined);
        assert_eq!(tool.calls.get(), 0);
        assert!(!project.archive_sets[0].maps[0].output_path.exists());
    }

    #[tokio::test]
    async fn test_pack_only_run() {
        let dir = TempDir::new().unwrap();
        let mut project = fixture(&dir, false);
        let tool = CountingTool::default();
        let metrics = RunMetrics::new();

        let outcome = run_pipeline(
            &mut project,
            &tool,
            &mut Answers(vec![true]),
            no_workshop,
            &metrics,
            &options(&dir),
        )
        .await
        .unwrap();

        assert_eq!(
            outcome,
            RunOutcome::Completed {
                packed: 1,
                publish: None
            }
        );
        // decompress, add list, compress
        assert_eq!(tool.calls.get(), 3);
        assert!(project.archive_sets[0].maps[0].output_path.is_file());
    }

    #[tokio::test]
    async fn test_publishing_without_backend_fails_after_packing() {
        let dir = TempDir::new().unwrap();
        let mut project = fixture(&dir, true);
        let tool = CountingTool::default();
        let metrics = RunMetrics::new();
        let opts = PipelineOptions {
            assume_yes: true,
            ..options(&dir)
        };

        let err = run_pipeline(
            &mut project,
            &tool,
            &mut Answers(Vec::new()),
            no_workshop,
            &metrics,
            &opts,
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<PublishError>(),
            Some(PublishError::Unsupported)
        ));
        assert!(project.archive_sets[0].maps[0].output_path.is_file());
    }

    #[tokio::test]
    async fn test_zero_ids_skip_the_workshop_session() {
        let dir = TempDir::new().unwrap();
        let mut project = fixture(&dir, true);
        project.archive_sets[0].maps[0].workshop.id = 0;
        let tool = CountingTool::default();
        let metrics = RunMetrics::new();
        let opts = PipelineOptions {
            assume_yes: true,
            ..options(&dir)
        };

        let outcome = run_pipeline(
            &mut project,
            &tool,
            &mut Answers(Vec::new()),
            no_workshop,
            &metrics,
            &opts,
        )
        .await
        .unwrap();

        assert_eq!(
            outcome,
            RunOutcome::Completed {
                packed: 1,
                publish: Some(PublishOutcome::NothingToPublish)
            }
        );
    }
}

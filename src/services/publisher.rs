use crate::metrics::RunMetrics;
use crate::models::{CatalogItem, ItemKind, MapOptions};
use crate::services::workshop::{CatalogAccumulator, PublishError, WorkshopClient, await_completion};
use crate::ui::Operator;
use std::collections::HashMap;
use std::time::Duration;

/// Fixed cadence of the completion poll loop
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Pause between consecutive uploads
pub const DEFAULT_UPLOAD_COOLDOWN: Duration = Duration::from_secs(5);

const UPLOAD_ADVISORY: &[&str] = &[
    "> The next step will upload all maps found from the previous step to the workshop.",
    "Before proceeding, ensure you have reviewed the packed maps in the output path using GCFScape or VPKEdit.",
    "Copy any maps from the output path to your game's maps folder and check in-game that they work as expected.",
];

/// Timing knobs for the publish workflow
#[derive(Debug, Clone, Copy)]
pub struct PublishSettings {
    pub poll_interval: Duration,
    pub cooldown: Duration,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            cooldown: DEFAULT_UPLOAD_COOLDOWN,
        }
    }
}

/// How a publish run ended, short of an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// No map survived the zero/duplicate id filter
    NothingToPublish,
    /// The operator chose not to continue
    Declined,
    Completed { uploaded: usize },
}

/// Drop maps with a zero workshop id and maps whose id repeats an earlier one.
///
/// The first map with a given id is kept. Order is preserved.
pub fn filter_publish_candidates<'m>(candidates: Vec<&'m mut MapOptions>) -> Vec<&'m mut MapOptions> {
    let mut seen: HashMap<u64, String> = HashMap::new();
    let mut kept = Vec::with_capacity(candidates.len());

    for map in candidates {
        let id = map.workshop.id;
        if id == 0 {
            tracing::warn!(
                "'{}' is set to upload with a workshop id of 0. Discarding from upload list",
                map.name
            );
            continue;
        }

        if let Some(first) = seen.get(&id) {
            tracing::warn!(
                "'{}'s workshop id is a duplicate of {}'s. Discarding from upload list",
                map.name,
                first
            );
            continue;
        }

        seen.insert(id, map.name.clone());
        kept.push(map);
    }

    kept
}

/// Maps confirmed for upload and the position of the next one to send
struct UploadQueue<'m> {
    items: Vec<&'m mut MapOptions>,
    cursor: usize,
}

impl<'m> UploadQueue<'m> {
    fn new(items: Vec<&'m mut MapOptions>) -> Self {
        Self { items, cursor: 0 }
    }

    fn current(&self) -> Option<&MapOptions> {
        self.items.get(self.cursor).map(|map| &**map)
    }

    /// Move past the current item. Returns whether anything is left.
    fn advance(&mut self) -> bool {
        self.cursor += 1;
        self.cursor < self.items.len()
    }

    fn uploaded(&self) -> usize {
        self.cursor.min(self.items.len())
    }
}

/// Reconciles configured workshop ids against the user's catalog, then uploads the
/// confirmed maps one at a time.
pub struct Publisher<'a, C: WorkshopClient + ?Sized, O: Operator + ?Sized> {
    client: &'a C,
    operator: &'a mut O,
    metrics: &'a RunMetrics,
    settings: PublishSettings,
}

impl<'a, C: WorkshopClient + ?Sized, O: Operator + ?Sized> Publisher<'a, C, O> {
    pub fn new(client: &'a C, operator: &'a mut O, metrics: &'a RunMetrics) -> Self {
        Self {
            client,
            operator,
            metrics,
            settings: PublishSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: PublishSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Run both phases over `candidates` (already filtered by [`filter_publish_candidates`]).
    ///
    /// Confirmed maps get their [`WorkshopOptions::details`](crate::models::WorkshopOptions::details)
    /// filled in from the catalog.
    pub async fn publish(
        &mut self,
        candidates: Vec<&mut MapOptions>,
    ) -> Result<PublishOutcome, PublishError> {
        if candidates.is_empty() {
            tracing::info!("No maps were found to be uploaded to the workshop");
            return Ok(PublishOutcome::NothingToPublish);
        }

        let catalog = self.fetch_catalog().await?;

        let configured = candidates.len();
        let confirmed = reconcile(&catalog, candidates);

        if confirmed.is_empty() {
            return Err(PublishError::NoConfirmedItems);
        }

        if confirmed.len() < configured {
            tracing::info!(
                "{} of {} maps marked to be uploaded were found on the workshop",
                confirmed.len(),
                configured
            );
            if !self.operator.confirm(
                "Would you still like to upload the ones that were found? Enter \"y\" to continue, anything else to abort: ",
            ) {
                // Declining is a clean abort; the process still exits with 0
                return Ok(PublishOutcome::Declined);
            }
        }

        for line in UPLOAD_ADVISORY {
            tracing::info!("{}", line);
        }

        if !self
            .operator
            .confirm("Enter 'y' to start the upload process, enter anything else to abort: ")
        {
            return Ok(PublishOutcome::Declined);
        }

        tracing::info!("> Uploading modified maps to the workshop...");
        let uploaded = self.upload_all(UploadQueue::new(confirmed)).await?;

        Ok(PublishOutcome::Completed { uploaded })
    }

    /// Page through the user's published items until the service runs out
    async fn fetch_catalog(&self) -> Result<Vec<CatalogItem>, PublishError> {
        tracing::info!("Finding owned workshop maps...");

        let mut accumulator = CatalogAccumulator::new();
        while let Some(page) = accumulator.next_page() {
            tracing::debug!("Requesting workshop page {}", page);
            let pending = self.client.query_owned_items(page);
            let result = await_completion(
                self.client,
                pending,
                self.settings.poll_interval,
                "Workshop query",
            )
            .await?;
            accumulator.absorb(result?);
        }

        if accumulator.is_empty() {
            return Err(PublishError::EmptyCatalog);
        }

        tracing::info!("Found {} workshop maps!", accumulator.len());
        Ok(accumulator.into_items())
    }

    async fn upload_all(&mut self, mut queue: UploadQueue<'_>) -> Result<usize, PublishError> {
        while let Some(map) = queue.current() {
            self.upload(map).await?;
            self.metrics.record_item_uploaded();

            if !queue.advance() {
                break;
            }
            self.cooldown().await;
        }

        Ok(queue.uploaded())
    }

    async fn upload(&self, map: &MapOptions) -> Result<(), PublishError> {
        let id = map
            .workshop
            .details
            .as_ref()
            .map_or(map.workshop.id, |details| details.id);

        tracing::info!("Uploading {} ({})...", map.name, id);

        if !map.output_path.is_file() {
            return Err(PublishError::MissingArchive {
                path: map.output_path.clone(),
            });
        }

        let mut update = self.client.begin_item_update(id);
        self.client.set_item_content(&mut update, &map.output_path);
        self.client
            .set_item_visibility(&mut update, map.workshop.visibility);

        let pending = self
            .client
            .submit_item_update(update, &map.workshop.changelog);
        let outcome = await_completion(
            self.client,
            pending,
            self.settings.poll_interval,
            "Workshop upload",
        )
        .await?
        .map_err(|e| PublishError::Upload {
            name: map.name.clone(),
            id,
            reason: e.to_string(),
        })?;

        if outcome.needs_legal_agreement {
            return Err(PublishError::LegalAgreement {
                name: map.name.clone(),
                id,
            });
        }

        tracing::info!("Successfully uploaded {} ({})", map.name, id);
        Ok(())
    }

    async fn cooldown(&mut self) {
        let whole = self.settings.cooldown.as_secs();
        for remaining in (1..=whole).rev() {
            self.operator.status(&format!(
                "Waiting a moment to avoid tripping spam filters ({})...",
                remaining
            ));
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        let rest = self.settings.cooldown - Duration::from_secs(whole);
        if !rest.is_zero() {
            tokio::time::sleep(rest).await;
        }

        if whole > 0 {
            self.operator.status("");
        }
    }
}

/// Keep the candidates whose id is a community item in `catalog`, filling in their details
fn reconcile<'m>(catalog: &[CatalogItem], candidates: Vec<&'m mut MapOptions>) -> Vec<&'m mut MapOptions> {
    let index: HashMap<u64, &CatalogItem> = catalog
        .iter()
        .filter(|item| item.kind == ItemKind::Community)
        .map(|item| (item.id, item))
        .collect();

    tracing::info!("Verifying that maps marked to be uploaded exist on the workshop...");

    let mut confirmed = Vec::with_capacity(candidates.len());
    for map in candidates {
        match index.get(&map.workshop.id) {
            Some(item) => {
                tracing::info!("Found {} = ({}) - {}", map.name, map.workshop.id, item.title);
                map.workshop.details = Some((*item).clone());
                confirmed.push(map);
            }
            None => {
                tracing::info!(
                    "{} ({}) was not found among your workshop maps",
                    map.name,
                    map.workshop.id
                );
            }
        }
    }

    confirmed
}

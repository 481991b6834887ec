use crate::models::{CatalogItem, Visibility};
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError};
use std::time::Duration;
use thiserror::Error;

/// Errors from the workshop service or the publish workflow. All of them end the run.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Workshop publishing is not available in this build (rebuild with the 'steam' feature)")]
    Unsupported,

    #[error("Failed to initialize the Steam API: {0}")]
    Session(String),

    #[error("Steam is running but no user is logged on")]
    NotLoggedOn,

    #[error("Failed to query workshop maps (page {page}): {reason}")]
    Query { page: u32, reason: String },

    #[error("No workshop maps were found")]
    EmptyCatalog,

    #[error("No maps marked to be uploaded were found on the workshop")]
    NoConfirmedItems,

    #[error("The file at '{path}' no longer exists. Was the file deleted?")]
    MissingArchive { path: Utf8PathBuf },

    #[error("Failed to upload {name} ({id}). User needs to agree to the workshop legal agreement")]
    LegalAgreement { name: String, id: u64 },

    #[error("Failed to upload {name} ({id}): {reason}")]
    Upload { name: String, id: u64, reason: String },

    /// Raw failure reported by the workshop service
    #[error("{0}")]
    Service(String),

    #[error("{0} was dropped before it completed")]
    Abandoned(&'static str),
}

/// Receiving end of a single-buffered completion channel.
///
/// Workshop requests complete on the service's callback queue; the requester gets a
/// `Pending` and drains it with [`await_completion`].
#[derive(Debug)]
pub struct Pending<T> {
    rx: Receiver<T>,
}

/// Sending end of a [`Pending`]. Completing consumes it, so a request completes at most once.
#[derive(Debug)]
pub struct Completer<T> {
    tx: SyncSender<T>,
}

impl<T> Pending<T> {
    /// Create a linked completer/pending pair
    pub fn channel() -> (Completer<T>, Pending<T>) {
        let (tx, rx) = mpsc::sync_channel(1);
        (Completer { tx }, Pending { rx })
    }

    /// A pending value that is already complete
    pub fn ready(value: T) -> Self {
        let (completer, pending) = Self::channel();
        completer.complete(value);
        pending
    }
}

impl<T> Completer<T> {
    pub fn complete(self, value: T) {
        // The requester may have given up already; nothing to deliver to then
        let _ = self.tx.try_send(value);
    }
}

/// One page of the current user's published items
#[derive(Debug, Clone, Default)]
pub struct CatalogPage {
    pub items: Vec<CatalogItem>,
    /// Total number of items matching the query across every page
    pub total_matching: u32,
}

/// An item update being assembled before submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemUpdate {
    pub item_id: u64,
    pub content: Option<Utf8PathBuf>,
    pub visibility: Option<Visibility>,
}

impl ItemUpdate {
    pub fn new(item_id: u64) -> Self {
        Self {
            item_id,
            content: None,
            visibility: None,
        }
    }
}

/// Completion of a submitted item update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub item_id: u64,
    pub needs_legal_agreement: bool,
}

/// The workshop capabilities the publisher consumes.
///
/// Requests return immediately. Their results are delivered while [`run_callbacks`]
/// is being called.
///
/// [`run_callbacks`]: WorkshopClient::run_callbacks
#[cfg_attr(test, mockall::automock)]
pub trait WorkshopClient {
    /// Request one page (starting at 1) of the current user's published items
    fn query_owned_items(&self, page: u32) -> Pending<Result<CatalogPage, PublishError>>;

    /// Start collecting changes for one catalog item. Nothing is sent to the service yet.
    fn begin_item_update(&self, item_id: u64) -> ItemUpdate;

    /// Record the file to upload on `update`.
    ///
    /// Only records the value. The service sees it, and can reject it, when the update
    /// is submitted.
    fn set_item_content(&self, update: &mut ItemUpdate, content: &Utf8Path);

    /// Record the visibility on `update`. Applied on submit, like the content.
    fn set_item_visibility(&self, update: &mut ItemUpdate, visibility: Visibility);

    /// Apply everything recorded on `update` and upload it. Content and visibility
    /// errors surface here, through the returned completion.
    fn submit_item_update(
        &self,
        update: ItemUpdate,
        changelog: &str,
    ) -> Pending<Result<SubmitOutcome, PublishError>>;

    /// Deliver any completed requests
    fn run_callbacks(&self);
}

/// Poll `pending` at a fixed cadence until it completes, pumping callbacks between checks.
///
/// There is no timeout. A request the service never completes stalls here.
pub async fn await_completion<C, T>(
    client: &C,
    pending: Pending<T>,
    interval: Duration,
    operation: &'static str,
) -> Result<T, PublishError>
where
    C: WorkshopClient + ?Sized,
{
    loop {
        client.run_callbacks();

        match pending.rx.try_recv() {
            Ok(value) => return Ok(value),
            Err(TryRecvError::Empty) => tokio::time::sleep(interval).await,
            Err(TryRecvError::Disconnected) => return Err(PublishError::Abandoned(operation)),
        }
    }
}

/// Collects catalog pages until the service has nothing more to return.
///
/// Paging starts at 1 and stops once a page comes back empty or the number of items
/// collected reaches the total the service reported.
#[derive(Debug)]
pub struct CatalogAccumulator {
    items: Vec<CatalogItem>,
    page: u32,
    finished: bool,
}

impl CatalogAccumulator {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            page: 1,
            finished: false,
        }
    }

    /// The page to request next, or `None` once collection is finished
    pub fn next_page(&self) -> Option<u32> {
        (!self.finished).then_some(self.page)
    }

    pub fn absorb(&mut self, page: CatalogPage) {
        let returned = page.items.len();
        self.items.extend(page.items);

        if returned == 0 || self.items.len() >= page.total_matching as usize {
            self.finished = true;
        } else {
            self.page += 1;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_items(self) -> Vec<CatalogItem> {
        self.items
    }
}

impl Default for CatalogAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ItemKind;

    fn items(ids: &[u64]) -> Vec<CatalogItem> {
        ids.iter()
            .map(|&id| CatalogItem {
                id,
                title: format!("Map {}", id),
                kind: ItemKind::Community,
            })
            .collect()
    }

    #[test]
    fn test_single_full_page_finishes() {
        let mut acc = CatalogAccumulator::new();
        assert_eq!(acc.next_page(), Some(1));

        acc.absorb(CatalogPage {
            items: items(&[1, 2, 3]),
            total_matching: 3,
        });

        assert!(acc.is_finished());
        assert_eq!(acc.next_page(), None);
        assert_eq!(acc.len(), 3);
    }

    #[test]
    fn test_empty_page_finishes() {
        let mut acc = CatalogAccumulator::new();
        acc.absorb(CatalogPage {
            items: items(&[1, 2]),
            total_matching: 3,
        });
        assert_eq!(acc.next_page(), Some(2));

        acc.absorb(CatalogPage {
            items: Vec::new(),
            total_matching: 3,
        });
        assert!(acc.is_finished());
        assert_eq!(acc.into_items().len(), 2);
    }

    #[test]
    fn test_pages_advance_until_total_reached() {
        let mut acc = CatalogAccumulator::new();
        acc.absorb(CatalogPage {
            items: items(&[1, 2]),
            total_matching: 4,
        });
        acc.absorb(CatalogPage {
            items: items(&[3, 4]),
            total_matching: 4,
        });
        assert!(acc.is_finished());
        let ids: Vec<u64> = acc.into_items().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_pending_ready() {
        let pending = Pending::ready(7u32);
        assert_eq!(pending.rx.try_recv().unwrap(), 7);
    }

    #[tokio::test]
    async fn test_await_completion_pumps_callbacks_until_complete() {
        let (completer, pending) = Pending::<u64>::channel();
        let mut completer = Some(completer);
        let mut calls = 0;

        let mut client = MockWorkshopClient::new();
        client.expect_run_callbacks().times(2).returning(move || {
            calls += 1;
            if calls == 2 {
                if let Some(c) = completer.take() {
                    c.complete(42);
                }
            }
        });

        let value = await_completion(&client, pending, Duration::ZERO, "Query")
            .await
            .unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_await_completion_reports_abandoned_request() {
        let (completer, pending) = Pending::<u64>::channel();
        drop(completer);

        let mut client = MockWorkshopClient::new();
        client.expect_run_callbacks().returning(|| {});

        let err = await_completion(&client, pending, Duration::ZERO, "Upload")
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Abandoned("Upload")));
    }
}

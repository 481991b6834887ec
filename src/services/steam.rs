//! Steam Workshop backend built on the `steamworks` crate.
//!
//! Requires a running Steam client and a `steam_appid.txt` (or launch through Steam)
//! for the game whose workshop receives the maps.

use crate::models::{CatalogItem, ItemKind, Visibility};
use crate::services::workshop::{
    CatalogPage, ItemUpdate, Pending, PublishError, SubmitOutcome, WorkshopClient,
};
use camino::Utf8Path;
use steamworks::{
    AppIDs, AppId, Client, FileType, PublishedFileId, PublishedFileVisibility, SingleClient,
    UGCType, UserList, UserListOrder,
};

/// A logged-on Steam session for the running app
pub struct SteamWorkshop {
    client: Client,
    single: SingleClient,
    app_id: AppId,
}

impl SteamWorkshop {
    /// Initialize the Steam API and check that a user is logged on
    pub fn connect() -> Result<Self, PublishError> {
        let (client, single) =
            Client::init().map_err(|e| PublishError::Session(e.to_string()))?;

        if !client.user().logged_on() {
            return Err(PublishError::NotLoggedOn);
        }

        let app_id = client.utils().app_id();
        tracing::info!("Steam API initialized for app {}", app_id.0);

        Ok(Self {
            client,
            single,
            app_id,
        })
    }
}

fn to_steam_visibility(visibility: Visibility) -> PublishedFileVisibility {
    match visibility {
        Visibility::Public => PublishedFileVisibility::Public,
        Visibility::FriendsOnly => PublishedFileVisibility::FriendsOnly,
        Visibility::Private => PublishedFileVisibility::Private,
        Visibility::Unlisted => PublishedFileVisibility::Unlisted,
    }
}

impl WorkshopClient for SteamWorkshop {
    fn query_owned_items(&self, page: u32) -> Pending<Result<CatalogPage, PublishError>> {
        let (completer, pending) = Pending::channel();
        let account = self.client.user().steam_id().account_id();

        let query = self.client.ugc().query_user(
            account,
            UserList::Published,
            UGCType::Items,
            UserListOrder::CreationOrderDesc,
            AppIDs::Both {
                creator: self.app_id,
                consumer: self.app_id,
            },
            page,
        );

        let query = match query {
            Ok(query) => query,
            Err(e) => {
                completer.complete(Err(PublishError::Query {
                    page,
                    reason: e.to_string(),
                }));
                return pending;
            }
        };

        query.fetch(move |result| {
            let page_result = result
                .map(|results| CatalogPage {
                    total_matching: results.total_results(),
                    items: results
                        .iter()
                        .flatten()
                        .map(|item| CatalogItem {
                            id: item.published_file_id.0,
                            title: item.title,
                            kind: match item.file_type {
                                FileType::Community => ItemKind::Community,
                                _ => ItemKind::Other,
                            },
                        })
                        .collect(),
                })
                .map_err(|e| PublishError::Query {
                    page,
                    reason: e.to_string(),
                });
            completer.complete(page_result);
        });

        pending
    }

    fn begin_item_update(&self, item_id: u64) -> ItemUpdate {
        ItemUpdate::new(item_id)
    }

    fn set_item_content(&self, update: &mut ItemUpdate, content: &Utf8Path) {
        update.content = Some(content.to_path_buf());
    }

    fn set_item_visibility(&self, update: &mut ItemUpdate, visibility: Visibility) {
        update.visibility = Some(visibility);
    }

    fn submit_item_update(
        &self,
        update: ItemUpdate,
        changelog: &str,
    ) -> Pending<Result<SubmitOutcome, PublishError>> {
        let (completer, pending) = Pending::channel();

        let mut handle = self
            .client
            .ugc()
            .start_item_update(self.app_id, PublishedFileId(update.item_id));
        if let Some(content) = &update.content {
            handle = handle.content_path(content.as_std_path());
        }
        if let Some(visibility) = update.visibility {
            handle = handle.visibility(to_steam_visibility(visibility));
        }

        // The watch handle only reports progress; completion arrives through the callback
        let _watch = handle.submit(Some(changelog), move |result| {
            let outcome = result
                .map(|(id, needs_legal_agreement)| SubmitOutcome {
                    item_id: id.0,
                    needs_legal_agreement,
                })
                .map_err(|e| PublishError::Service(e.to_string()));
            completer.complete(outcome);
        });

        pending
    }

    fn run_callbacks(&self) {
        self.single.run_callbacks();
    }
}

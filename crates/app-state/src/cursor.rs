//! Cursor based pagination
//!
//! [`CursorPaginator`] is the counterpart of
//! [`Paginator`](crate::paginator::Paginator) for sources that page with opaque
//! cursors instead of offsets. There is no threshold logic: the caller asks
//! for the next page and the paginator follows the last cursor it received
//! until the source reports that nothing is left.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::data::{replace_by_id, PaginatorData, PaginatorOptions};
use crate::fetcher::{Cursor, CursorPage, CursorPageFetcher, Identifiable, PaginationError, Result};
use crate::paginator::{LoadGuard, LoadOutcome, SkipReason};

/// Observable cursor paginator state
#[derive(Debug, Clone, PartialEq)]
pub struct CursorPaginatorState<Item> {
    /// Items currently shown
    pub items: Vec<Item>,

    /// A fetch is in flight
    pub is_loading: bool,

    /// The in-flight fetch was started by a refresh
    pub is_refreshing: bool,

    /// `items` holds placeholders rather than real data
    pub is_showing_placeholders: bool,

    /// Error from the most recent fetch
    pub error: Option<PaginationError>,

    /// Cursor returned by the most recent successful fetch
    pub cursor: Cursor,
}

/// Incremental, cursor based list loader
pub struct CursorPaginator<Item, Context> {
    context: Context,
    page_size: usize,
    total_count: Option<usize>,
    placeholder_items: Vec<Item>,
    fetcher: Option<Arc<dyn CursorPageFetcher<Item, Context>>>,
    state: watch::Sender<CursorPaginatorState<Item>>,
}

impl<Item, Context> CursorPaginator<Item, Context>
where
    Item: Identifiable + Clone + Send + Sync + 'static,
    Context: Clone + fmt::Debug + Send + Sync + 'static,
{
    /// Create a cursor paginator
    ///
    /// Without initial items the placeholders are shown and the first page is
    /// requested on a spawned task, exactly as for the offset paginator. The
    /// load more threshold of `options.config` is not used.
    ///
    /// # Panics
    ///
    /// Panics if the first page has to be requested outside of a Tokio
    /// runtime.
    pub fn new(
        context: Context,
        options: PaginatorOptions<Item>,
        fetcher: Option<Arc<dyn CursorPageFetcher<Item, Context>>>,
    ) -> Arc<Self> {
        let is_showing_placeholders = options.initial_items.is_empty();
        let items = if is_showing_placeholders {
            options.placeholder_items.clone()
        } else {
            options.initial_items
        };

        let (state, _) = watch::channel(CursorPaginatorState {
            items,
            is_loading: false,
            is_refreshing: false,
            is_showing_placeholders,
            error: None,
            cursor: Cursor::first_page(),
        });

        let paginator = Arc::new(Self {
            context,
            page_size: options.config.page_size,
            total_count: options.total_count,
            placeholder_items: options.placeholder_items,
            fetcher,
            state,
        });

        if is_showing_placeholders {
            paginator.trigger_load_more();
        }

        paginator
    }

    /// Fetch the page after the current cursor
    ///
    /// Dropping the returned future before it completes abandons the load and
    /// releases the loading gate.
    pub async fn load_more(&self) -> LoadOutcome {
        let (fetcher, cursor) = match self.begin(false) {
            Ok(started) => started,
            Err(reason) => return LoadOutcome::Skipped(reason),
        };

        self.fetch(fetcher, cursor, false).await
    }

    /// Fire-and-forget [`load_more`](Self::load_more)
    pub fn trigger_load_more(self: &Arc<Self>) -> Option<JoinHandle<LoadOutcome>> {
        let (fetcher, cursor) = self.begin(false).ok()?;
        Some(self.spawn_fetch(fetcher, cursor, false))
    }

    /// Refetch from the first page and replace the list
    pub async fn refresh(&self) -> LoadOutcome {
        let (fetcher, cursor) = match self.begin(true) {
            Ok(started) => started,
            Err(reason) => return LoadOutcome::Skipped(reason),
        };

        self.fetch(fetcher, cursor, true).await
    }

    /// Fire-and-forget [`refresh`](Self::refresh)
    pub fn trigger_refresh(self: &Arc<Self>) -> Option<JoinHandle<LoadOutcome>> {
        let (fetcher, cursor) = self.begin(true).ok()?;
        Some(self.spawn_fetch(fetcher, cursor, true))
    }

    /// Replace the item sharing `item`'s identity, keeping its position
    pub fn update_item(&self, item: Item) -> bool {
        let mut updated = false;
        self.state.send_if_modified(|state| {
            updated = replace_by_id(&mut state.items, &item).is_some();
            updated
        });

        if !updated {
            tracing::warn!(
                item_id = ?item.id(),
                context = ?self.context,
                "Attempt to update item that did not previously exist"
            );
        }

        updated
    }

    /// Snapshot of the visible list
    ///
    /// The cursor is not part of the snapshot: a paginator restored from it
    /// starts from the first page again and drops the items it already has.
    pub fn current_data(&self) -> PaginatorData<Item> {
        let state = self.state.borrow();
        let items = if state.is_showing_placeholders {
            Vec::new()
        } else {
            state.items.clone()
        };

        PaginatorData {
            items,
            placeholder_items: self.placeholder_items.clone(),
            page_size: self.page_size,
            known_count: self.total_count,
        }
    }

    /// Context passed to every fetch
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Items requested per fetch
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Clone of the current state
    pub fn state(&self) -> CursorPaginatorState<Item> {
        self.state.borrow().clone()
    }

    /// Items currently shown
    pub fn items(&self) -> Vec<Item> {
        self.state.borrow().items.clone()
    }

    /// Whether a fetch is in flight
    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading
    }

    /// Cursor returned by the most recent successful fetch
    pub fn cursor(&self) -> Cursor {
        self.state.borrow().cursor.clone()
    }

    /// Error from the most recent fetch
    pub fn error(&self) -> Option<PaginationError> {
        self.state.borrow().error.clone()
    }

    /// Subscribe to state changes
    pub fn subscribe(&self) -> watch::Receiver<CursorPaginatorState<Item>> {
        self.state.subscribe()
    }

    fn begin(
        &self,
        refresh: bool,
    ) -> std::result::Result<(Arc<dyn CursorPageFetcher<Item, Context>>, Cursor), SkipReason> {
        let Some(fetcher) = self.fetcher.as_ref() else {
            return Err(SkipReason::NoFetcher);
        };

        let mut decision = Err(SkipReason::AlreadyLoading);
        self.state.send_if_modified(|state| {
            if state.is_loading {
                return false;
            }

            if !refresh && !state.cursor.has_next_page {
                decision = Err(SkipReason::NoMorePages);
                return false;
            }

            state.is_loading = true;
            state.is_refreshing = refresh;
            state.error = None;
            decision = Ok(if refresh {
                Cursor::first_page()
            } else {
                state.cursor.clone()
            });
            true
        });

        match decision {
            Ok(cursor) => {
                tracing::trace!(
                    context = ?self.context,
                    page_size = self.page_size,
                    end_cursor = ?cursor.end_cursor,
                    "Beginning load"
                );
                Ok((Arc::clone(fetcher), cursor))
            }
            Err(reason) => {
                tracing::trace!(?reason, "Skipping load");
                Err(reason)
            }
        }
    }

    fn finish(&self, refresh: bool, result: Result<CursorPage<Item>>) -> LoadOutcome {
        match result {
            Ok(CursorPage { items: page, cursor }) => {
                let mut count = 0;
                let mut replaced = false;

                self.state.send_modify(|state| {
                    replaced = state.is_showing_placeholders || refresh;
                    if replaced {
                        count = page.len();
                        state.items = page;
                    } else {
                        let known: HashSet<Item::Id> =
                            state.items.iter().map(|item| item.id().clone()).collect();
                        let fresh: Vec<Item> = page
                            .into_iter()
                            .filter(|item| !known.contains(item.id()))
                            .collect();
                        count = fresh.len();
                        state.items.extend(fresh);
                    }

                    state.cursor = cursor;
                    state.is_showing_placeholders = false;
                    state.is_loading = false;
                    state.is_refreshing = false;
                });

                tracing::debug!(context = ?self.context, count, replaced, "Applied fetched page");
                LoadOutcome::Loaded { count, replaced }
            }
            Err(error) => {
                tracing::error!(context = ?self.context, %error, "Pagination error fetching new records");

                self.state.send_modify(|state| {
                    state.is_loading = false;
                    state.is_refreshing = false;
                    state.error = Some(error);
                });

                LoadOutcome::Failed
            }
        }
    }

    async fn fetch(
        &self,
        fetcher: Arc<dyn CursorPageFetcher<Item, Context>>,
        cursor: Cursor,
        refresh: bool,
    ) -> LoadOutcome {
        let guard = LoadGuard::new(|| self.abandon());
        let result = fetcher.fetch_page(&cursor, self.page_size, &self.context).await;
        guard.disarm();

        self.finish(refresh, result)
    }

    fn abandon(&self) {
        tracing::debug!(context = ?self.context, "Load abandoned before the page arrived");

        self.state.send_modify(|state| {
            state.is_loading = false;
            state.is_refreshing = false;
        });
    }

    fn spawn_fetch(
        self: &Arc<Self>,
        fetcher: Arc<dyn CursorPageFetcher<Item, Context>>,
        cursor: Cursor,
        refresh: bool,
    ) -> JoinHandle<LoadOutcome> {
        let paginator = Arc::downgrade(self);
        let context = self.context.clone();
        let page_size = self.page_size;

        let abandoned = paginator.clone();
        let guard = LoadGuard::new(move || {
            if let Some(paginator) = abandoned.upgrade() {
                paginator.abandon();
            }
        });

        tokio::spawn(async move {
            let result = fetcher.fetch_page(&cursor, page_size, &context).await;
            guard.disarm();

            match paginator.upgrade() {
                Some(paginator) => paginator.finish(refresh, result),
                None => LoadOutcome::Discarded,
            }
        })
    }
}

//! Offset based pagination
//!
//! A [`Paginator`] owns a growing list of items for one logical list (one
//! roadmap tab, one changelog, one feed). The rendering layer reports which
//! row became visible through [`Paginator::load_more`]; the paginator decides
//! whether that row is close enough to the end of the list to request the next
//! page, and appends the page once the injected [`PageFetcher`] returns it.
//!
//! State is published through a `watch` channel (latest value) and discrete
//! changes through a `broadcast` channel, so any UI layer can observe it.
//!
//! # Example
//!
//! ```no_run
//! use app_state::data::{PaginatorConfig, PaginatorOptions};
//! use app_state::fetcher::{Identifiable, PageFetcher, PaginationError};
//! use app_state::paginator::Paginator;
//! use std::sync::Arc;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Release {
//!     id: String,
//! }
//!
//! impl Identifiable for Release {
//!     type Id = String;
//!
//!     fn id(&self) -> &String {
//!         &self.id
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let fetcher: Arc<dyn PageFetcher<Release, ()>> =
//!         Arc::new(|page_size: usize, offset: usize, _: ()| async move {
//!             let page: Vec<Release> = (offset..offset + page_size)
//!                 .map(|n| Release { id: n.to_string() })
//!                 .collect();
//!             Ok::<_, PaginationError>(page)
//!         });
//!
//!     // No initial items: placeholders are shown and the first page is
//!     // requested right away.
//!     let paginator = Paginator::new(
//!         (),
//!         PaginatorOptions::new(PaginatorConfig::new(10)),
//!         Some(fetcher),
//!     );
//!
//!     let mut rx = paginator.subscribe();
//!     rx.wait_for(|state| !state.is_loading).await.unwrap();
//!
//!     // Row 8 became visible
//!     paginator.load_more(Some(8)).await;
//!     assert_eq!(paginator.items().len(), 20);
//! }
//! ```

use std::fmt;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::data::{replace_by_id, PaginatorConfig, PaginatorData, PaginatorOptions};
use crate::fetcher::{Identifiable, PageFetcher, PaginationError, Result};

/// Capacity of the event channel
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Observable paginator state
#[derive(Debug, Clone, PartialEq)]
pub struct PaginatorState<Item> {
    /// Items currently shown: placeholders or loaded pages in page order
    pub items: Vec<Item>,

    /// A fetch is in flight
    pub is_loading: bool,

    /// The in-flight fetch was started by a refresh
    pub is_refreshing: bool,

    /// `items` holds placeholders rather than real data
    pub is_showing_placeholders: bool,

    /// Error from the most recent fetch, cleared when the next one starts
    pub error: Option<PaginationError>,

    /// Index that triggered the most recently completed fetch
    pub last_fetched_offset: Option<usize>,
}

/// Discrete paginator changes
#[derive(Debug, Clone, PartialEq)]
pub enum PaginatorEvent {
    /// A fetch started at `offset`
    LoadStarted {
        /// Offset passed to the fetcher
        offset: usize,
    },

    /// A page was appended to the list
    PageAppended {
        /// Offset the page was fetched from
        offset: usize,
        /// Number of items appended
        count: usize,
    },

    /// The first page replaced the placeholder items
    PlaceholdersReplaced {
        /// Number of items in the page
        count: usize,
    },

    /// A refresh replaced the list
    Refreshed {
        /// Number of items in the page
        count: usize,
    },

    /// A fetch failed; the list was left unchanged
    LoadFailed {
        /// Offset passed to the fetcher
        offset: usize,
        /// Cause reported by the fetcher
        error: PaginationError,
    },

    /// An item was replaced in place
    ItemUpdated {
        /// Position of the replaced item
        index: usize,
    },
}

/// Why a load request did not start a fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The paginator has no fetcher (static list)
    NoFetcher,

    /// Another fetch is in flight
    AlreadyLoading,

    /// The visible row is not within the trailing threshold window
    NotPastThreshold,

    /// The visible row is not past the row that triggered the last load
    AlreadyTriggered,

    /// The known total count has been reached
    ReachedEnd,

    /// The source reported that there are no more pages
    NoMorePages,
}

/// What a load request did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No fetch was started
    Skipped(SkipReason),

    /// A page was fetched and applied
    Loaded {
        /// Number of items in the page
        count: usize,
        /// The page replaced the list instead of being appended
        replaced: bool,
    },

    /// The fetch failed; the error is available in the paginator state
    Failed,

    /// The paginator was dropped before the page arrived
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadKind {
    Page,
    Refresh,
}

/// A fetch that has taken the loading gate
#[derive(Debug, Clone, Copy)]
struct PendingLoad {
    after: Option<usize>,
    offset: usize,
    kind: LoadKind,
}

/// Runs `reset` when dropped unless disarmed
///
/// Held across a fetch so that a load whose future is dropped or whose task is
/// aborted still releases the loading gate.
pub(crate) struct LoadGuard<F: FnOnce()> {
    reset: Option<F>,
}

impl<F: FnOnce()> LoadGuard<F> {
    pub(crate) fn new(reset: F) -> Self {
        Self { reset: Some(reset) }
    }

    /// The fetch completed; the result is applied by the caller
    pub(crate) fn disarm(mut self) {
        self.reset = None;
    }
}

impl<F: FnOnce()> Drop for LoadGuard<F> {
    fn drop(&mut self) {
        if let Some(reset) = self.reset.take() {
            reset();
        }
    }
}

/// Incremental, offset based list loader
///
/// Generic over the `Item` type (identified and comparable) and an opaque
/// `Context` passed to every fetch (a tab filter, a feed identifier).
///
/// Only one fetch is ever in flight. Failed fetches are never retried
/// automatically: the next scroll or refresh is the retry.
pub struct Paginator<Item, Context> {
    context: Context,
    config: PaginatorConfig,
    total_count: Option<usize>,
    placeholder_items: Vec<Item>,
    fetcher: Option<Arc<dyn PageFetcher<Item, Context>>>,
    state: watch::Sender<PaginatorState<Item>>,
    events: broadcast::Sender<PaginatorEvent>,
}

impl<Item, Context> Paginator<Item, Context>
where
    Item: Identifiable + Clone + Send + Sync + 'static,
    Context: Clone + fmt::Debug + Send + Sync + 'static,
{
    /// Create a paginator
    ///
    /// With non-empty `initial_items` the list starts as-is. Otherwise the
    /// placeholder items are shown and the first page is requested at once:
    /// the loading gate is taken before this returns and the fetch runs on a
    /// spawned task.
    ///
    /// Without a fetcher the paginator never loads anything.
    ///
    /// # Panics
    ///
    /// Panics if `load_more_threshold >= page_size`, or if the first page has
    /// to be requested outside of a Tokio runtime.
    pub fn new(
        context: Context,
        options: PaginatorOptions<Item>,
        fetcher: Option<Arc<dyn PageFetcher<Item, Context>>>,
    ) -> Arc<Self> {
        let PaginatorOptions {
            initial_items,
            placeholder_items,
            config,
            total_count,
        } = options;

        if let Err(err) = config.validate() {
            panic!("{}", err);
        }

        let is_showing_placeholders = initial_items.is_empty();
        let items = if is_showing_placeholders {
            placeholder_items.clone()
        } else {
            initial_items
        };

        let (state, _) = watch::channel(PaginatorState {
            items,
            is_loading: false,
            is_refreshing: false,
            is_showing_placeholders,
            error: None,
            last_fetched_offset: None,
        });
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let paginator = Arc::new(Self {
            context,
            config,
            total_count,
            placeholder_items,
            fetcher,
            state,
            events,
        });

        if is_showing_placeholders {
            paginator.trigger_load_more(None);
        }

        paginator
    }

    /// Restore a paginator from a snapshot, using the default threshold
    pub fn from_data(
        context: Context,
        data: PaginatorData<Item>,
        fetcher: Option<Arc<dyn PageFetcher<Item, Context>>>,
    ) -> Arc<Self> {
        Self::new(context, data.into(), fetcher)
    }

    /// Load the next page if `after` warrants it
    ///
    /// `after` is the index of the row that became visible, or `None` for an
    /// explicit "next page" request. A row only triggers a fetch when it lies
    /// within the last `load_more_threshold` items and is past the row that
    /// triggered the previous load; the fetch then starts at
    /// `index + load_more_threshold`. `None` continues from the last
    /// triggering index, or zero.
    ///
    /// Fetch failures are recorded in the state, never returned. Dropping the
    /// returned future before it completes abandons the load and releases the
    /// loading gate.
    pub async fn load_more(&self, after: Option<usize>) -> LoadOutcome {
        let (fetcher, pending) = match self.begin(after, LoadKind::Page) {
            Ok(started) => started,
            Err(reason) => return LoadOutcome::Skipped(reason),
        };

        self.fetch(fetcher, pending).await
    }

    /// Fire-and-forget [`load_more`](Self::load_more)
    ///
    /// The gate decision is made before this returns; the fetch runs on a
    /// spawned task. Returns the task handle when a fetch was started.
    pub fn trigger_load_more(self: &Arc<Self>, after: Option<usize>) -> Option<JoinHandle<LoadOutcome>> {
        let (fetcher, pending) = self.begin(after, LoadKind::Page).ok()?;
        Some(self.spawn_fetch(fetcher, pending))
    }

    /// Refetch the list from the start
    ///
    /// Current items stay visible while the first page is fetched again and
    /// are replaced wholesale when it arrives. The triggering offset is reset.
    /// A failed refresh leaves the items untouched and sets the error.
    pub async fn refresh(&self) -> LoadOutcome {
        let (fetcher, pending) = match self.begin(None, LoadKind::Refresh) {
            Ok(started) => started,
            Err(reason) => return LoadOutcome::Skipped(reason),
        };

        self.fetch(fetcher, pending).await
    }

    /// Fire-and-forget [`refresh`](Self::refresh)
    pub fn trigger_refresh(self: &Arc<Self>) -> Option<JoinHandle<LoadOutcome>> {
        let (fetcher, pending) = self.begin(None, LoadKind::Refresh).ok()?;
        Some(self.spawn_fetch(fetcher, pending))
    }

    /// Replace the item sharing `item`'s identity, keeping its position
    ///
    /// Used for optimistic updates such as a vote toggle. Returns `false` when
    /// no item matched.
    pub fn update_item(&self, item: Item) -> bool {
        let mut updated = None;
        self.state.send_if_modified(|state| {
            updated = replace_by_id(&mut state.items, &item);
            updated.is_some()
        });

        match updated {
            Some(index) => {
                self.emit(PaginatorEvent::ItemUpdated { index });
                true
            }
            None => {
                tracing::warn!(
                    item_id = ?item.id(),
                    context = ?self.context,
                    "Attempt to update item that did not previously exist"
                );
                false
            }
        }
    }

    /// Snapshot of the visible list for later restore
    ///
    /// While placeholders are showing the snapshot carries no items, so a
    /// paginator restored from it shows placeholders and fetches again.
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
            page_size: self.config.page_size,
            known_count: self.total_count,
        }
    }

    /// Context passed to every fetch
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Paging configuration
    pub fn config(&self) -> PaginatorConfig {
        self.config
    }

    /// Items requested per fetch
    pub fn page_size(&self) -> usize {
        self.config.page_size
    }

    /// Trailing window that triggers a prefetch
    pub fn load_more_threshold(&self) -> usize {
        self.config.load_more_threshold
    }

    /// Known upper bound on the number of items
    pub fn total_count(&self) -> Option<usize> {
        self.total_count
    }

    /// Skeleton items shown before the first page
    pub fn placeholder_items(&self) -> &[Item] {
        &self.placeholder_items
    }

    /// Clone of the current state
    pub fn state(&self) -> PaginatorState<Item> {
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

    /// Whether a refresh is in flight
    pub fn is_refreshing(&self) -> bool {
        self.state.borrow().is_refreshing
    }

    /// Whether placeholders are shown
    pub fn is_showing_placeholders(&self) -> bool {
        self.state.borrow().is_showing_placeholders
    }

    /// Error from the most recent fetch
    pub fn error(&self) -> Option<PaginationError> {
        self.state.borrow().error.clone()
    }

    /// Index that triggered the most recently completed fetch
    pub fn last_fetched_offset(&self) -> Option<usize> {
        self.state.borrow().last_fetched_offset
    }

    /// Subscribe to state changes
    pub fn subscribe(&self) -> watch::Receiver<PaginatorState<Item>> {
        self.state.subscribe()
    }

    /// Subscribe to paginator events
    pub fn subscribe_events(&self) -> broadcast::Receiver<PaginatorEvent> {
        self.events.subscribe()
    }

    /// Take the loading gate if the request warrants a fetch
    fn begin(
        &self,
        after: Option<usize>,
        kind: LoadKind,
    ) -> std::result::Result<(Arc<dyn PageFetcher<Item, Context>>, PendingLoad), SkipReason> {
        let Some(fetcher) = self.fetcher.as_ref() else {
            tracing::trace!("No page fetcher. Skipping load.");
            return Err(SkipReason::NoFetcher);
        };

        let mut decision = Err(SkipReason::AlreadyLoading);
        self.state.send_if_modified(|state| {
            if state.is_loading {
                return false;
            }

            let offset = match kind {
                LoadKind::Page => self.fetch_offset(state, after),
                LoadKind::Refresh => Ok(0),
            };

            match offset {
                Ok(offset) => {
                    if kind == LoadKind::Refresh {
                        state.last_fetched_offset = None;
                    }
                    state.is_loading = true;
                    state.is_refreshing = kind == LoadKind::Refresh;
                    state.error = None;
                    decision = Ok(PendingLoad { after, offset, kind });
                    true
                }
                Err(reason) => {
                    decision = Err(reason);
                    false
                }
            }
        });

        match decision {
            Ok(pending) => {
                tracing::trace!(
                    context = ?self.context,
                    page_size = self.config.page_size,
                    offset = pending.offset,
                    "Beginning load"
                );
                self.emit(PaginatorEvent::LoadStarted {
                    offset: pending.offset,
                });
                Ok((Arc::clone(fetcher), pending))
            }
            Err(reason) => {
                tracing::trace!(?reason, ?after, "Skipping load");
                Err(reason)
            }
        }
    }

    /// Offset to fetch for a load triggered by `after`
    fn fetch_offset(
        &self,
        state: &PaginatorState<Item>,
        after: Option<usize>,
    ) -> std::result::Result<usize, SkipReason> {
        // Not tied to a visible row: continue from the last load, or start at
        // the beginning.
        let Some(index) = after else {
            return Ok(state.last_fetched_offset.unwrap_or(0));
        };

        // Placeholder rows don't correspond to anything fetched yet
        if state.is_showing_placeholders {
            return Ok(0);
        }

        if self.total_count.is_some_and(|total| index + 1 >= total) {
            return Err(SkipReason::ReachedEnd);
        }

        let threshold = self.config.load_more_threshold;
        if index < state.items.len().saturating_sub(threshold) {
            return Err(SkipReason::NotPastThreshold);
        }

        if state.last_fetched_offset.is_some_and(|last| index <= last) {
            return Err(SkipReason::AlreadyTriggered);
        }

        // The threshold is added back so consecutive pages don't overlap by
        // `threshold` items.
        let offset = index + threshold;
        if self.total_count.is_some_and(|total| offset >= total) {
            return Err(SkipReason::ReachedEnd);
        }

        Ok(offset)
    }

    /// Apply a fetch result and release the loading gate
    fn finish(&self, pending: PendingLoad, result: Result<Vec<Item>>) -> LoadOutcome {
        match result {
            Ok(page) => {
                let count = page.len();
                let mut replaced = false;

                self.state.send_modify(|state| {
                    // The triggering index, not the fetched offset, so later
                    // threshold checks compare row indices with row indices.
                    state.last_fetched_offset = pending.after;

                    replaced = state.is_showing_placeholders || pending.kind == LoadKind::Refresh;
                    if replaced {
                        state.items = page;
                    } else {
                        state.items.extend(page);
                    }

                    state.is_showing_placeholders = false;
                    state.is_loading = false;
                    state.is_refreshing = false;
                });

                tracing::debug!(
                    context = ?self.context,
                    offset = pending.offset,
                    count,
                    replaced,
                    "Applied fetched page"
                );

                let event = match (pending.kind, replaced) {
                    (LoadKind::Refresh, _) => PaginatorEvent::Refreshed { count },
                    (LoadKind::Page, true) => PaginatorEvent::PlaceholdersReplaced { count },
                    (LoadKind::Page, false) => PaginatorEvent::PageAppended {
                        offset: pending.offset,
                        count,
                    },
                };
                self.emit(event);

                LoadOutcome::Loaded { count, replaced }
            }
            Err(error) => {
                tracing::error!(
                    context = ?self.context,
                    offset = pending.offset,
                    %error,
                    "Pagination error fetching new records"
                );

                self.state.send_modify(|state| {
                    state.is_loading = false;
                    state.is_refreshing = false;
                    state.error = Some(error.clone());
                });

                self.emit(PaginatorEvent::LoadFailed {
                    offset: pending.offset,
                    error,
                });

                LoadOutcome::Failed
            }
        }
    }

    fn spawn_fetch(
        self: &Arc<Self>,
        fetcher: Arc<dyn PageFetcher<Item, Context>>,
        pending: PendingLoad,
    ) -> JoinHandle<LoadOutcome> {
        let paginator = Arc::downgrade(self);
        let context = self.context.clone();
        let page_size = self.config.page_size;

        // Created outside the task so an abort before the first poll still
        // releases the gate.
        let abandoned = paginator.clone();
        let guard = LoadGuard::new(move || {
            if let Some(paginator) = abandoned.upgrade() {
                paginator.abandon(pending);
            }
        });

        tokio::spawn(async move {
            let result = fetcher.fetch_page(page_size, pending.offset, &context).await;
            guard.disarm();

            match paginator.upgrade() {
                Some(paginator) => paginator.finish(pending, result),
                None => {
                    tracing::trace!(?context, "Paginator dropped before page arrived. Discarding.");
                    LoadOutcome::Discarded
                }
            }
        })
    }

    /// Fetch a page for a load that holds the gate and apply the result
    async fn fetch(
        &self,
        fetcher: Arc<dyn PageFetcher<Item, Context>>,
        pending: PendingLoad,
    ) -> LoadOutcome {
        let guard = LoadGuard::new(|| self.abandon(pending));
        let result = fetcher
            .fetch_page(self.config.page_size, pending.offset, &self.context)
            .await;
        guard.disarm();

        self.finish(pending, result)
    }

    /// Release the gate for a load that will never finish
    fn abandon(&self, pending: PendingLoad) {
        tracing::debug!(
            context = ?self.context,
            offset = pending.offset,
            "Load abandoned before the page arrived"
        );

        self.state.send_modify(|state| {
            state.is_loading = false;
            state.is_refreshing = false;
        });
    }

    fn emit(&self, event: PaginatorEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

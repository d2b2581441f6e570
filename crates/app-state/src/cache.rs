//! Paginator snapshot cache
//!
//! Widgets that switch between lists (roadmap tabs, for example) keep one
//! [`PaginatorData`] snapshot per list so that switching back restores the
//! loaded items instead of showing placeholders and refetching.
//!
//! Snapshots are keyed by the paginator context and bounded by an LRU policy.

use lru::LruCache;
use parking_lot::Mutex;
use std::fmt;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::data::{replace_by_id, PaginatorData, PaginatorOptions};
use crate::fetcher::{Identifiable, PageFetcher};
use crate::paginator::Paginator;

/// Default number of snapshots kept
pub const DEFAULT_CACHE_CAPACITY: usize = 16;

/// LRU cache of paginator snapshots keyed by context
pub struct PaginatorCache<K: Hash + Eq, Item> {
    entries: Mutex<LruCache<K, PaginatorData<Item>>>,
}

impl<K, Item> PaginatorCache<K, Item>
where
    K: Hash + Eq,
{
    /// Create a cache holding at most `capacity` snapshots (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);

        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Number of cached snapshots
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Store a snapshot, evicting the least recently used one when full
    pub fn insert(&self, key: K, data: PaginatorData<Item>) {
        self.entries.lock().put(key, data);
    }

    /// Remove and return a snapshot
    pub fn remove(&self, key: &K) -> Option<PaginatorData<Item>> {
        self.entries.lock().pop(key)
    }

    /// Drop every snapshot
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl<K, Item> PaginatorCache<K, Item>
where
    K: Hash + Eq,
    Item: Clone,
{
    /// Get a snapshot, marking it as recently used
    pub fn get(&self, key: &K) -> Option<PaginatorData<Item>> {
        self.entries.lock().get(key).cloned()
    }
}

impl<K, Item> Default for PaginatorCache<K, Item>
where
    K: Hash + Eq,
{
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl<K, Item> PaginatorCache<K, Item>
where
    K: Hash + Eq + Clone + fmt::Debug + Send + Sync + 'static,
    Item: Identifiable + Clone + Send + Sync + 'static,
{
    /// Save the paginator's current snapshot under its context
    pub fn store(&self, paginator: &Paginator<Item, K>) {
        let data = paginator.current_data();
        tracing::trace!(context = ?paginator.context(), count = data.items.len(), "Storing paginator snapshot");
        self.insert(paginator.context().clone(), data);
    }

    /// Paginator for `context`, restored from its snapshot when there is one
    ///
    /// A restored paginator shows the cached items and does not fetch. The
    /// paging configuration always comes from `options`; cached placeholders
    /// and the cached known count are used when present.
    pub fn paginator_for(
        &self,
        context: K,
        options: PaginatorOptions<Item>,
        fetcher: Option<Arc<dyn PageFetcher<Item, K>>>,
    ) -> Arc<Paginator<Item, K>> {
        let options = match self.get(&context) {
            Some(data) => {
                tracing::debug!(?context, count = data.items.len(), "Restoring paginator from cache");

                let placeholder_items = if data.placeholder_items.is_empty() {
                    options.placeholder_items
                } else {
                    data.placeholder_items
                };

                PaginatorOptions {
                    initial_items: data.items,
                    placeholder_items,
                    config: options.config,
                    total_count: data.known_count.or(options.total_count),
                }
            }
            None => options,
        };

        Paginator::new(context, options, fetcher)
    }

    /// Replace `item` in every snapshot that contains it
    ///
    /// Returns the number of snapshots changed.
    pub fn replace_item_everywhere(&self, item: &Item) -> usize {
        let mut entries = self.entries.lock();

        entries
            .iter_mut()
            .filter_map(|(_, data)| replace_by_id(&mut data.items, item))
            .count()
    }

    /// Keep the snapshot for `paginator` up to date
    ///
    /// Stores a snapshot now and after every state change until the handle is
    /// stopped or dropped, or the paginator itself is dropped.
    pub fn track(self: &Arc<Self>, paginator: &Arc<Paginator<Item, K>>) -> TrackingHandle {
        self.store(paginator);

        let (stop_tx, mut stop_rx) = oneshot::channel();
        let cache = Arc::clone(self);
        let tracked = Arc::downgrade(paginator);
        let mut changes = paginator.subscribe();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;

                    _ = &mut stop_rx => {
                        break;
                    }
                    changed = changes.changed() => {
                        if changed.is_err() {
                            break;
                        }

                        let Some(paginator) = tracked.upgrade() else {
                            break;
                        };
                        cache.store(&paginator);
                    }
                }
            }
        });

        TrackingHandle {
            stop_tx: Some(stop_tx),
            handle,
        }
    }
}

/// Handle for controlling snapshot tracking
///
/// When dropped, tracking stops.
pub struct TrackingHandle {
    stop_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl TrackingHandle {
    /// Stop tracking manually
    pub fn stop(mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Whether the tracking task has ended
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for TrackingHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }
}

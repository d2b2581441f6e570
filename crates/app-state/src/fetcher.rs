//! Page fetching boundary
//!
//! Paginators never talk to the network themselves. Every page is requested
//! through a [`PageFetcher`] (offset based) or a [`CursorPageFetcher`]
//! (cursor based) supplied by the widget that owns the list.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use thiserror::Error;

/// Pagination errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaginationError {
    /// A page fetch failed; carries the fetcher's description of the cause
    #[error("Page fetch failed: {0}")]
    FetchFailed(String),

    /// Paginator configuration violates an invariant
    #[error("Invalid paginator configuration: {0}")]
    InvalidConfig(String),
}

impl PaginationError {
    /// Wrap any displayable cause as a fetch failure
    pub fn fetch(cause: impl fmt::Display) -> Self {
        PaginationError::FetchFailed(cause.to_string())
    }
}

/// Result type for pagination operations
pub type Result<T> = std::result::Result<T, PaginationError>;

/// Items that carry a stable identity
///
/// Identity is what `update_item` matches on: every other field of an item may
/// change between two versions of it.
pub trait Identifiable {
    /// Identifier type
    type Id: Eq + Hash + Clone + fmt::Debug;

    /// The item's identifier
    fn id(&self) -> &Self::Id;
}

/// Offset based page source
///
/// Given `page_size` and `offset`, return up to `page_size` items starting at
/// `offset` in the backing source's sort order. The context is passed through
/// unmodified on every call.
///
/// Closures of the shape `Fn(usize, usize, Context) -> impl Future<Output =
/// Result<Vec<Item>>>` implement this trait directly.
///
/// # Examples
///
/// ```
/// use app_state::fetcher::PageFetcher;
/// use std::sync::Arc;
///
/// let fetcher: Arc<dyn PageFetcher<u32, String>> =
///     Arc::new(|page_size: usize, offset: usize, _filter: String| async move {
///         let page: Vec<u32> = (offset..offset + page_size).map(|n| n as u32).collect();
///         Ok::<_, app_state::PaginationError>(page)
///     });
/// # let _ = fetcher;
/// ```
#[async_trait]
pub trait PageFetcher<Item, Context>: Send + Sync {
    /// Fetch one page
    async fn fetch_page(
        &self,
        page_size: usize,
        offset: usize,
        context: &Context,
    ) -> Result<Vec<Item>>;
}

#[async_trait]
impl<Item, Context, F, Fut> PageFetcher<Item, Context> for F
where
    F: Fn(usize, usize, Context) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<Item>>> + Send + 'static,
    Item: Send + 'static,
    Context: Clone + Send + Sync + 'static,
{
    async fn fetch_page(
        &self,
        page_size: usize,
        offset: usize,
        context: &Context,
    ) -> Result<Vec<Item>> {
        (self)(page_size, offset, context.clone()).await
    }
}

/// Position in a cursor paginated collection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cursor {
    /// Cursor pointing at the first item of the last page
    pub start_cursor: Option<String>,

    /// Cursor pointing at the last item of the last page
    pub end_cursor: Option<String>,

    /// Whether the source has more items after `end_cursor`
    pub has_next_page: bool,
}

impl Cursor {
    /// Cursor used before anything has been fetched
    pub fn first_page() -> Self {
        Self {
            start_cursor: None,
            end_cursor: None,
            has_next_page: true,
        }
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Self::first_page()
    }
}

/// One page returned by a [`CursorPageFetcher`]
#[derive(Debug, Clone, PartialEq)]
pub struct CursorPage<Item> {
    /// Items in the page
    pub items: Vec<Item>,

    /// Cursor to continue from
    pub cursor: Cursor,
}

impl<Item> CursorPage<Item> {
    /// Create a page
    pub fn new(items: Vec<Item>, cursor: Cursor) -> Self {
        Self { items, cursor }
    }
}

/// Cursor based page source
#[async_trait]
pub trait CursorPageFetcher<Item, Context>: Send + Sync {
    /// Fetch the page that follows `cursor`
    async fn fetch_page(
        &self,
        cursor: &Cursor,
        page_size: usize,
        context: &Context,
    ) -> Result<CursorPage<Item>>;
}

//! HTTP backed page source
//!
//! Collection endpoints take `limit` and `offset` query parameters plus any
//! filter the list context contributes, and answer with a
//! [`CollectionResponse`] envelope.

use app_state::{PageFetcher, PaginationError, PaginatorData};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

use crate::client::HttpClient;
use crate::error::Result;

/// Paged collection envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionResponse<T> {
    /// Page number of this response
    pub page: usize,
    /// Number of pages at the requested page size
    pub page_count: usize,
    /// Page size the server applied
    pub page_size: usize,
    /// Number of items in the whole collection
    pub total_count: usize,
    /// Items in this page
    pub data: Vec<T>,
}

/// Extra query parameters contributed by a paginator context
pub trait PageQuery {
    /// Parameters appended after `limit` and `offset`
    fn query_params(&self) -> Vec<(String, String)>;
}

impl PageQuery for () {
    fn query_params(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}

/// [`PageFetcher`] that reads pages from a collection endpoint
///
/// # Examples
/// ```no_run
/// use app_state::{Paginator, PaginatorConfig, PaginatorOptions, PageFetcher};
/// use networking::{HttpClient, HttpClientConfig, HttpPageFetcher};
/// use serde::Deserialize;
/// use std::sync::Arc;
///
/// #[derive(Debug, Clone, PartialEq, Deserialize)]
/// struct Release {
///     id: String,
/// }
///
/// impl app_state::Identifiable for Release {
///     type Id = String;
///
///     fn id(&self) -> &String {
///         &self.id
///     }
/// }
///
/// async fn example() -> networking::Result<()> {
///     let client = HttpClient::new(HttpClientConfig::new("https://api.parra.io/v1"))?;
///     let fetcher: Arc<dyn PageFetcher<Release, ()>> =
///         Arc::new(HttpPageFetcher::new(client, "releases"));
///
///     let releases = Paginator::new((), PaginatorOptions::new(PaginatorConfig::new(20)), Some(fetcher));
///     # let _ = releases;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct HttpPageFetcher<Item> {
    client: HttpClient,
    path: String,
    _item: PhantomData<fn() -> Item>,
}

impl<Item> HttpPageFetcher<Item>
where
    Item: DeserializeOwned,
{
    /// Create a fetcher for the collection at `path` (relative to the base URL)
    pub fn new(client: HttpClient, path: impl Into<String>) -> Self {
        Self {
            client,
            path: path.into(),
            _item: PhantomData,
        }
    }

    /// Collection path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Request one page and return the full envelope
    pub async fn fetch_collection<C>(
        &self,
        page_size: usize,
        offset: usize,
        context: &C,
    ) -> Result<CollectionResponse<Item>>
    where
        C: PageQuery,
    {
        let mut params = vec![
            ("limit".to_string(), page_size.to_string()),
            ("offset".to_string(), offset.to_string()),
        ];
        params.extend(context.query_params());

        self.client.get_json(&self.path, &params).await
    }

    /// Fetch the first page ahead of building a paginator
    ///
    /// The returned snapshot carries the server's total count, so the
    /// paginator built from it stops requesting pages at the end of the
    /// collection.
    pub async fn initial_data<C>(
        &self,
        context: &C,
        page_size: usize,
        placeholder_items: Vec<Item>,
    ) -> Result<PaginatorData<Item>>
    where
        C: PageQuery,
    {
        let response = self.fetch_collection(page_size, 0, context).await?;

        Ok(PaginatorData::new(response.data)
            .with_placeholder_items(placeholder_items)
            .with_page_size(page_size)
            .with_known_count(Some(response.total_count)))
    }
}

#[async_trait]
impl<Item, C> PageFetcher<Item, C> for HttpPageFetcher<Item>
where
    Item: DeserializeOwned + Send + Sync + 'static,
    C: PageQuery + Send + Sync + 'static,
{
    async fn fetch_page(
        &self,
        page_size: usize,
        offset: usize,
        context: &C,
    ) -> app_state::Result<Vec<Item>> {
        match self.fetch_collection(page_size, offset, context).await {
            Ok(response) => Ok(response.data),
            Err(err) => {
                tracing::warn!(path = %self.path, offset, error = %err, "Page request failed");
                Err(PaginationError::fetch(err))
            }
        }
    }
}

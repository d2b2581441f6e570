//! Paginator configuration and snapshots
//!
//! [`PaginatorData`] is the value a widget keeps around when it switches away
//! from a list (for example when the user changes tabs) so that the list can be
//! restored later without refetching.

use serde::{Deserialize, Serialize};

use crate::fetcher::{Identifiable, PaginationError, Result};

/// Default number of items requested per page
pub const DEFAULT_PAGE_SIZE: usize = 15;

/// Default number of trailing items that triggers a prefetch
pub const DEFAULT_LOAD_MORE_THRESHOLD: usize = 2;

/// Paging configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginatorConfig {
    /// Number of items requested per fetch
    pub page_size: usize,

    /// Number of items from the end of the list that triggers a prefetch.
    /// Must be smaller than `page_size`.
    pub load_more_threshold: usize,
}

impl Default for PaginatorConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            load_more_threshold: DEFAULT_LOAD_MORE_THRESHOLD,
        }
    }
}

impl PaginatorConfig {
    /// Create a config with the given page size and the default threshold
    ///
    /// The threshold is lowered to `page_size - 1` for pages smaller than the
    /// default threshold, so the result is valid for any non-zero page size.
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            load_more_threshold: DEFAULT_LOAD_MORE_THRESHOLD.min(page_size.saturating_sub(1)),
        }
    }

    /// Set the load more threshold
    pub fn with_load_more_threshold(mut self, threshold: usize) -> Self {
        self.load_more_threshold = threshold;
        self
    }

    /// Check the `load_more_threshold < page_size` invariant
    pub fn validate(&self) -> Result<()> {
        if self.load_more_threshold >= self.page_size {
            return Err(PaginationError::InvalidConfig(format!(
                "load_more_threshold ({}) must be smaller than page_size ({})",
                self.load_more_threshold, self.page_size
            )));
        }

        Ok(())
    }
}

/// Construction inputs for a paginator
#[derive(Debug, Clone, PartialEq)]
pub struct PaginatorOptions<Item> {
    /// Items to start with. When empty, placeholders are shown and the first
    /// page is requested immediately.
    pub initial_items: Vec<Item>,

    /// Skeleton items shown until the first page arrives
    pub placeholder_items: Vec<Item>,

    /// Paging configuration
    pub config: PaginatorConfig,

    /// Known upper bound on the number of items, if the source reported one
    pub total_count: Option<usize>,
}

impl<Item> Default for PaginatorOptions<Item> {
    fn default() -> Self {
        Self {
            initial_items: Vec::new(),
            placeholder_items: Vec::new(),
            config: PaginatorConfig::default(),
            total_count: None,
        }
    }
}

impl<Item> PaginatorOptions<Item> {
    /// Options with the given paging configuration and nothing loaded yet
    pub fn new(config: PaginatorConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Set the initial items
    pub fn with_initial_items(mut self, items: Vec<Item>) -> Self {
        self.initial_items = items;
        self
    }

    /// Set the placeholder items
    pub fn with_placeholder_items(mut self, items: Vec<Item>) -> Self {
        self.placeholder_items = items;
        self
    }

    /// Set the known total count
    pub fn with_total_count(mut self, total_count: Option<usize>) -> Self {
        self.total_count = total_count;
        self
    }
}

impl<Item> From<PaginatorData<Item>> for PaginatorOptions<Item> {
    fn from(data: PaginatorData<Item>) -> Self {
        Self {
            initial_items: data.items,
            placeholder_items: data.placeholder_items,
            config: PaginatorConfig::new(data.page_size.max(1)),
            total_count: data.known_count,
        }
    }
}

/// Snapshot of a paginator's visible list
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaginatorData<Item> {
    /// Loaded items. Empty when the paginator was still showing placeholders.
    pub items: Vec<Item>,

    /// Skeleton items for the next time the list has nothing to show
    pub placeholder_items: Vec<Item>,

    /// Number of items requested per fetch
    pub page_size: usize,

    /// The number of items that are known to exist, even if they aren't all
    /// in `items` yet. `None` until a source has reported it.
    pub known_count: Option<usize>,
}

impl<Item> PaginatorData<Item> {
    /// Snapshot with the default page size and no placeholders
    pub fn new(items: Vec<Item>) -> Self {
        Self {
            items,
            placeholder_items: Vec::new(),
            page_size: DEFAULT_PAGE_SIZE,
            known_count: None,
        }
    }

    /// Set the placeholder items
    pub fn with_placeholder_items(mut self, items: Vec<Item>) -> Self {
        self.placeholder_items = items;
        self
    }

    /// Set the page size
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set the known count
    pub fn with_known_count(mut self, known_count: Option<usize>) -> Self {
        self.known_count = known_count;
        self
    }
}

impl<Item: Identifiable + Clone> PaginatorData<Item> {
    /// Copy of this snapshot with the item sharing `item`'s identity replaced
    ///
    /// Returns an unchanged copy when no item matches.
    pub fn replacing_item(&self, item: &Item) -> Self {
        let mut next = self.clone();
        replace_by_id(&mut next.items, item);
        next
    }
}

/// Replace the element sharing `item`'s identity, returning its position
pub(crate) fn replace_by_id<Item>(items: &mut [Item], item: &Item) -> Option<usize>
where
    Item: Identifiable + Clone,
{
    let index = items.iter().position(|existing| existing.id() == item.id())?;
    items[index] = item.clone();
    Some(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
    struct Ticket {
        id: String,
        votes: u32,
    }

    impl Identifiable for Ticket {
        type Id = String;

        fn id(&self) -> &String {
            &self.id
        }
    }

    fn ticket(id: &str, votes: u32) -> Ticket {
        Ticket { id: id.to_string(), votes }
    }

    #[test]
    fn test_config_default() {
        let config = PaginatorConfig::default();
        assert_eq!(config.page_size, 15);
        assert_eq!(config.load_more_threshold, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_threshold_at_page_size() {
        let config = PaginatorConfig::new(5).with_load_more_threshold(5);
        assert!(matches!(
            config.validate(),
            Err(PaginationError::InvalidConfig(_))
        ));

        let config = PaginatorConfig::new(5).with_load_more_threshold(4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_small_page_sizes() {
        let config = PaginatorConfig::new(2);
        assert_eq!(config.load_more_threshold, 1);
        assert!(config.validate().is_ok());

        let config = PaginatorConfig::new(1);
        assert_eq!(config.load_more_threshold, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_options_from_degenerate_snapshot() {
        let options =
            PaginatorOptions::from(PaginatorData::new(vec![ticket("a", 0)]).with_page_size(0));
        assert_eq!(options.config.page_size, 1);
        assert!(options.config.validate().is_ok());
    }

    #[test]
    fn test_replacing_item_preserves_order() {
        let data = PaginatorData::new(vec![ticket("a", 0), ticket("b", 0), ticket("c", 0)]);

        let next = data.replacing_item(&ticket("b", 7));
        assert_eq!(next.items, vec![ticket("a", 0), ticket("b", 7), ticket("c", 0)]);

        // Original snapshot untouched
        assert_eq!(data.items[1].votes, 0);
    }

    #[test]
    fn test_replacing_unknown_item_is_noop() {
        let data = PaginatorData::new(vec![ticket("a", 0)]);
        assert_eq!(data.replacing_item(&ticket("z", 3)), data);
    }

    #[test]
    fn test_options_from_data() {
        let data = PaginatorData::new(vec![ticket("a", 1)])
            .with_placeholder_items(vec![ticket("p", 0)])
            .with_page_size(25)
            .with_known_count(Some(40));

        let options = PaginatorOptions::from(data);
        assert_eq!(options.initial_items.len(), 1);
        assert_eq!(options.placeholder_items.len(), 1);
        assert_eq!(options.config.page_size, 25);
        assert_eq!(options.config.load_more_threshold, DEFAULT_LOAD_MORE_THRESHOLD);
        assert_eq!(options.total_count, Some(40));
    }

    #[test]
    fn test_data_serialization() {
        let data = PaginatorData::new(vec![ticket("a", 2)]).with_known_count(Some(9));

        let json = serde_json::to_string(&data).unwrap();
        let restored: PaginatorData<Ticket> = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, data);
    }
}

//! Pagination Integration Tests
//!
//! End-to-end scenarios for a roadmap style widget: tabbed lists, infinite
//! scroll, optimistic votes and restoring a tab from the snapshot cache.

use async_trait::async_trait;
use mockall::mock;
use parra_kit::app_state::{
    Identifiable, LoadOutcome, PageFetcher, PaginationError, Paginator, PaginatorCache,
    PaginatorConfig, PaginatorEvent, PaginatorOptions, Result, SkipReason,
};
use parra_kit::networking::{HttpClient, HttpClientConfig, HttpPageFetcher, PageQuery};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct UserTicket {
    id: String,
    title: String,
    vote_count: u32,
    voted: bool,
}

impl Identifiable for UserTicket {
    type Id = String;

    fn id(&self) -> &String {
        &self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RoadmapTab {
    InProgress,
    Released,
}

impl PageQuery for RoadmapTab {
    fn query_params(&self) -> Vec<(String, String)> {
        let filter = match self {
            RoadmapTab::InProgress => "in_progress",
            RoadmapTab::Released => "released",
        };
        vec![("filter".to_string(), filter.to_string())]
    }
}

mock! {
    Roadmap {}

    #[async_trait]
    impl PageFetcher<UserTicket, RoadmapTab> for Roadmap {
        async fn fetch_page(
            &self,
            page_size: usize,
            offset: usize,
            context: &RoadmapTab,
        ) -> Result<Vec<UserTicket>>;
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

fn tickets(offset: usize, count: usize) -> Vec<UserTicket> {
    (offset..offset + count)
        .map(|n| UserTicket {
            id: format!("ticket-{}", n),
            title: format!("Ticket {}", n),
            vote_count: 0,
            voted: false,
        })
        .collect()
}

fn placeholders() -> Vec<UserTicket> {
    (0..3)
        .map(|n| UserTicket {
            id: format!("placeholder-{}", n),
            title: String::new(),
            vote_count: 0,
            voted: false,
        })
        .collect()
}

fn options() -> PaginatorOptions<UserTicket> {
    PaginatorOptions::new(PaginatorConfig::new(10).with_load_more_threshold(2))
        .with_placeholder_items(placeholders())
}

async fn settle(paginator: &Paginator<UserTicket, RoadmapTab>) {
    let mut rx = paginator.subscribe();
    rx.wait_for(|state| !state.is_loading).await.unwrap();
}

/// First page, scroll to the threshold, then scroll back up
#[tokio::test]
async fn test_scroll_through_roadmap_tab() {
    init_tracing();

    let mut roadmap = MockRoadmap::new();
    roadmap
        .expect_fetch_page()
        .withf(|page_size, offset, tab| {
            *page_size == 10 && *offset == 0 && *tab == RoadmapTab::InProgress
        })
        .times(1)
        .returning(|_, _, _| Ok(tickets(0, 10)));
    roadmap
        .expect_fetch_page()
        .withf(|_, offset, _| *offset == 10)
        .times(1)
        .returning(|_, offset, _| Ok(tickets(offset, 10)));

    let paginator = Paginator::new(RoadmapTab::InProgress, options(), Some(Arc::new(roadmap)));
    assert!(paginator.is_showing_placeholders());
    assert_eq!(paginator.items(), placeholders());

    settle(&paginator).await;

    let state = paginator.state();
    assert_eq!(state.items, tickets(0, 10));
    assert!(!state.is_showing_placeholders);
    assert_eq!(state.last_fetched_offset, None);

    // Row 8 sits inside the trailing window of 2
    let outcome = paginator.load_more(Some(8)).await;
    assert_eq!(outcome, LoadOutcome::Loaded { count: 10, replaced: false });
    assert_eq!(paginator.items(), tickets(0, 20));
    assert_eq!(paginator.last_fetched_offset(), Some(8));

    // Scrolling back up never refetches
    assert_eq!(
        paginator.load_more(Some(5)).await,
        LoadOutcome::Skipped(SkipReason::NotPastThreshold)
    );
    assert_eq!(paginator.items().len(), 20);
}

/// A failed page leaves the loaded list alone
#[tokio::test]
async fn test_failed_page_keeps_loaded_items() {
    init_tracing();

    let mut roadmap = MockRoadmap::new();
    roadmap
        .expect_fetch_page()
        .withf(|_, offset, _| *offset == 0)
        .times(1)
        .returning(|_, _, _| Ok(tickets(0, 10)));
    roadmap
        .expect_fetch_page()
        .withf(|_, offset, _| *offset == 10)
        .times(1)
        .returning(|_, _, _| Err(PaginationError::fetch("connection reset")));

    let paginator = Paginator::new(RoadmapTab::InProgress, options(), Some(Arc::new(roadmap)));
    settle(&paginator).await;

    let mut events = paginator.subscribe_events();
    assert_eq!(paginator.load_more(Some(8)).await, LoadOutcome::Failed);

    let state = paginator.state();
    assert_eq!(state.items, tickets(0, 10));
    assert!(!state.is_loading);
    assert_eq!(
        state.error,
        Some(PaginationError::FetchFailed("connection reset".to_string()))
    );

    assert_eq!(events.recv().await.unwrap(), PaginatorEvent::LoadStarted { offset: 10 });
    assert!(matches!(
        events.recv().await.unwrap(),
        PaginatorEvent::LoadFailed { offset: 10, .. }
    ));
}

/// Switching tabs and back restores the first tab without a fetch
#[tokio::test]
async fn test_tab_switch_restores_from_cache() {
    init_tracing();

    let mut roadmap = MockRoadmap::new();
    roadmap
        .expect_fetch_page()
        .withf(|_, offset, tab| *offset == 0 && *tab == RoadmapTab::InProgress)
        .times(1)
        .returning(|_, _, _| Ok(tickets(0, 10)));
    roadmap
        .expect_fetch_page()
        .withf(|_, offset, tab| *offset == 10 && *tab == RoadmapTab::InProgress)
        .times(1)
        .returning(|_, offset, _| Ok(tickets(offset, 10)));
    roadmap
        .expect_fetch_page()
        .withf(|_, offset, tab| *offset == 0 && *tab == RoadmapTab::Released)
        .times(1)
        .returning(|_, _, _| Ok(tickets(100, 4)));
    let roadmap: Arc<dyn PageFetcher<UserTicket, RoadmapTab>> = Arc::new(roadmap);

    let cache: Arc<PaginatorCache<RoadmapTab, UserTicket>> = Arc::new(PaginatorCache::default());

    let in_progress =
        cache.paginator_for(RoadmapTab::InProgress, options(), Some(Arc::clone(&roadmap)));
    let tracking = cache.track(&in_progress);
    settle(&in_progress).await;
    in_progress.load_more(Some(8)).await;

    // Switch away: stop tracking and keep the final snapshot
    drop(tracking);
    cache.store(&in_progress);
    drop(in_progress);

    let released = cache.paginator_for(RoadmapTab::Released, options(), Some(Arc::clone(&roadmap)));
    settle(&released).await;
    assert_eq!(released.items(), tickets(100, 4));
    cache.store(&released);

    // Switch back
    let in_progress =
        cache.paginator_for(RoadmapTab::InProgress, options(), Some(Arc::clone(&roadmap)));
    assert!(!in_progress.is_showing_placeholders());
    assert!(!in_progress.is_loading());
    assert_eq!(in_progress.items(), tickets(0, 20));
    assert_eq!(cache.len(), 2);
}

/// A vote applied to the visible list and to every cached tab
#[tokio::test]
async fn test_optimistic_vote() {
    let cache: PaginatorCache<RoadmapTab, UserTicket> = PaginatorCache::default();

    let paginator: Arc<Paginator<UserTicket, RoadmapTab>> = Paginator::new(
        RoadmapTab::InProgress,
        options().with_initial_items(tickets(0, 5)),
        None,
    );
    cache.store(&paginator);

    let mut voted = tickets(3, 1).remove(0);
    voted.voted = true;
    voted.vote_count = 1;

    assert!(paginator.update_item(voted.clone()));
    assert_eq!(cache.replace_item_everywhere(&voted), 1);

    let items = paginator.items();
    assert_eq!(items.len(), 5);
    assert_eq!(items[3], voted);
    assert_eq!(cache.get(&RoadmapTab::InProgress).unwrap().items, items);

    let mut stranger = voted.clone();
    stranger.id = "ticket-404".to_string();
    assert!(!paginator.update_item(stranger));
    assert_eq!(paginator.items(), items);
}

/// Pull to refresh after new tickets were added on the server
#[tokio::test]
async fn test_pull_to_refresh() {
    let mut roadmap = MockRoadmap::new();
    let mut seq = mockall::Sequence::new();
    roadmap
        .expect_fetch_page()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, _| Ok(tickets(0, 10)));
    roadmap
        .expect_fetch_page()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, offset, _| Ok(tickets(offset, 10)));
    roadmap
        .expect_fetch_page()
        .withf(|_, offset, _| *offset == 0)
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, _| Ok(tickets(50, 10)));

    let paginator = Paginator::new(RoadmapTab::Released, options(), Some(Arc::new(roadmap)));
    settle(&paginator).await;
    paginator.load_more(Some(9)).await;
    assert_eq!(paginator.items().len(), 20);

    let handle = paginator.trigger_refresh().unwrap();
    assert!(paginator.is_refreshing());
    // Items stay visible while refreshing
    assert_eq!(paginator.items().len(), 20);

    assert_eq!(
        handle.await.unwrap(),
        LoadOutcome::Loaded { count: 10, replaced: true }
    );
    assert_eq!(paginator.items(), tickets(50, 10));
    assert_eq!(paginator.last_fetched_offset(), None);
}

/// The same roadmap served over HTTP
#[tokio::test]
async fn test_roadmap_over_http() {
    init_tracing();
    let server = MockServer::start().await;

    for offset in [0usize, 10] {
        Mock::given(method("GET"))
            .and(path("/tickets"))
            .and(query_param("filter", "in_progress"))
            .and(query_param("limit", "10"))
            .and(query_param("offset", offset.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "page": offset / 10 + 1,
                "pageCount": 2,
                "pageSize": 10,
                "totalCount": 20,
                "data": tickets(offset, 10),
            })))
            .expect(1)
            .mount(&server)
            .await;
    }

    let client = HttpClient::new(HttpClientConfig::new(server.uri())).unwrap();
    let fetcher: HttpPageFetcher<UserTicket> = HttpPageFetcher::new(client, "tickets");
    let data = fetcher
        .initial_data(&RoadmapTab::InProgress, 10, placeholders())
        .await
        .unwrap();
    assert_eq!(data.known_count, Some(20));

    let fetcher: Arc<dyn PageFetcher<UserTicket, RoadmapTab>> = Arc::new(fetcher);
    let paginator = Paginator::from_data(RoadmapTab::InProgress, data, Some(fetcher));

    paginator.load_more(Some(8)).await;
    assert_eq!(paginator.items(), tickets(0, 20));

    // Everything the server has is loaded
    assert_eq!(
        paginator.load_more(Some(19)).await,
        LoadOutcome::Skipped(SkipReason::ReachedEnd)
    );
}

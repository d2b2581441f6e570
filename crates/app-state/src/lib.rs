//! Incremental list loading for Parra widgets
//!
//! This crate provides the pagination engine behind feedback boards, roadmaps
//! and changelogs: offset and cursor based paginators with observable state,
//! single-flight loading, optimistic item updates and a snapshot cache for
//! switching between lists.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod cursor;
pub mod data;
pub mod fetcher;
pub mod paginator;

pub use cache::{PaginatorCache, TrackingHandle};
pub use cursor::{CursorPaginator, CursorPaginatorState};
pub use data::{PaginatorConfig, PaginatorData, PaginatorOptions};
pub use fetcher::{
    Cursor, CursorPage, CursorPageFetcher, Identifiable, PageFetcher, PaginationError, Result,
};
pub use paginator::{LoadOutcome, Paginator, PaginatorEvent, PaginatorState, SkipReason};

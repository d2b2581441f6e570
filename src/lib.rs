//! Parra Kit
//!
//! Incremental list loading for feedback boards, roadmaps and changelogs.
//!
//! - [`app_state`]: paginators, page fetcher traits and the snapshot cache
//! - [`networking`]: HTTP client and the HTTP backed page source

pub use app_state;
pub use networking;

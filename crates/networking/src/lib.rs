//! Networking utilities for Parra Kit
//!
//! This crate provides the HTTP client used to talk to collection endpoints
//! and an HTTP backed page source for the paginators in `app-state`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod error;
pub mod fetcher;

pub use client::{HttpClient, HttpClientConfig};
pub use error::{Error, Result};
pub use fetcher::{CollectionResponse, HttpPageFetcher, PageQuery};

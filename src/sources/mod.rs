// src/sources/mod.rs

//! Built-in collection strategies.
//!
//! Most feeds are mechanical variations of one shape: GET a JSON
//! endpoint (optionally paginated, optionally API-key-gated), check a
//! handful of fields, check the price arithmetic. [`HttpJsonSource`]
//! expresses that shape as configuration so the CLI can drive a feed
//! without per-feed code. Feeds that need bespoke logic implement
//! [`crate::collector::CollectionStrategy`] directly.

mod http_json;

pub use http_json::{FeedConfig, HttpJsonSource, PriceCheck};

// src/lib.rs

//! gridsource: a collection framework for electricity market data feeds.
//!
//! Each feed is a [`collector::CollectionStrategy`] (generate candidates,
//! fetch, validate); the [`collector::Collector`] drives the shared
//! pipeline: fetch → validate → hash-dedupe → compress → store → notify.

pub mod collector;
pub mod error;
pub mod fetch;
pub mod hash;
pub mod models;
pub mod notify;
pub mod registry;
pub mod sources;
pub mod storage;
pub mod validate;

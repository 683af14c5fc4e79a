//! amoCRM integration: typed HTTP client, token lifecycle, pagination
//! policy, wire-to-domain mapping, and the sync engine that drives them.

pub mod client;
pub mod engine;
pub mod fetch;
pub mod mapper;
pub mod models;
pub mod token;

pub use client::AmoClient;
pub use engine::{SegmentReport, SyncEngine, SyncReport};
pub use fetch::Paginator;
pub use token::TokenProvider;

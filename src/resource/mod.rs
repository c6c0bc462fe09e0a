//! Resource abstraction layer
//!
//! Resources are described declaratively in the services document: which
//! operation lists them, how its pagination works, and where the items
//! live inside each response. This module turns such a description into a
//! flat list of items.
//!
//! # Architecture
//!
//! - [`definition`] - Validated resource recipes ([`ResourceConfig`])
//! - [`path`] - Attribute path walking over untyped responses and items
//! - [`fetcher`] - The three fetch strategies (paginator, next-in-response, direct)
//!
//! # Example
//!
//! ```ignore
//! use resource_counter::aws::ClientRegistry;
//! use resource_counter::resource::{fetch_resources, ResourceConfig};
//!
//! async fn count_buckets(clients: &ClientRegistry) -> usize {
//!     let config = ResourceConfig::direct("s3", "list_buckets", &["Buckets"], "Inventory", "Buckets");
//!     fetch_resources(clients, &config).await.map(|items| items.len()).unwrap_or(0)
//! }
//! ```

pub mod definition;
mod fetcher;
pub mod path;

pub use definition::*;
pub use fetcher::{fetch_resources, FetchError};

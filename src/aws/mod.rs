//! Service API interaction
//!
//! # Module Structure
//!
//! - [`client`] - The [`ServiceClient`] capability contract and [`ClientRegistry`]
//! - [`http`] - JSON protocol HTTP transport and client
//! - [`stub`] - Scripted in-memory client for tests and dry runs

pub mod client;
pub mod http;
pub mod stub;

pub use client::{paginate_by_token, ClientRegistry, ServiceClient, MAX_PAGES};
pub use http::{HttpTransport, JsonProtocolClient, JsonVersion};
pub use stub::StaticClient;

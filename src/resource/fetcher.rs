//! Resource Fetcher
//!
//! Turns one [`ResourceConfig`] into a flat list of items, whatever the
//! pagination idiom of the underlying operation.

use super::definition::{FetchStrategy, ResourceConfig};
use super::path;
use crate::aws::{ClientRegistry, ServiceClient, MAX_PAGES};
use futures::StreamExt;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no client registered for service {0}")]
    MissingClient(String),

    #[error("item path is empty")]
    EmptyItemPath,

    #[error("next-in-response fetch needs nextInResponse and nextInRequest")]
    MissingContinuation,

    #[error("call to {service}.{method} failed: {error:#}")]
    Call {
        service: String,
        method: String,
        error: anyhow::Error,
    },
}

impl FetchError {
    fn call(config: &ResourceConfig, error: anyhow::Error) -> Self {
        FetchError::Call {
            service: config.client.clone(),
            method: config.method.clone(),
            error,
        }
    }
}

/// Fetch all items described by `config`
pub async fn fetch_resources(
    clients: &ClientRegistry,
    config: &ResourceConfig,
) -> Result<Vec<Value>, FetchError> {
    let client = clients
        .get(&config.client)
        .ok_or_else(|| FetchError::MissingClient(config.client.clone()))?;

    if config.item_path.is_empty() {
        return Err(FetchError::EmptyItemPath);
    }

    info!(
        "Get resources from {}.{} using type {}",
        config.client, config.method, config.strategy
    );

    match config.strategy {
        FetchStrategy::Paginated => list_paginated(client, config).await,
        FetchStrategy::NextToken => list_next_in_response(client, config).await,
        FetchStrategy::Direct => list_direct(client, config).await,
    }
}

/// Iterate the pages produced by the client's own pagination
async fn list_paginated(
    client: &dyn ServiceClient,
    config: &ResourceConfig,
) -> Result<Vec<Value>, FetchError> {
    let mut items = Vec::new();
    let mut pages = client.paginate(&config.method, config.call_args.clone());

    while let Some(page) = pages.next().await {
        let page = page.map_err(|e| FetchError::call(config, e))?;
        let added = path::take_items(page, &config.item_path, config.require_item_path, &mut items);
        info!(
            "Page for {}.{}, item path {:?}: {} items",
            config.client, config.method, config.item_path, added
        );
    }

    Ok(items)
}

/// Call repeatedly, copying the response's continuation token into the
/// next request, until the token is no longer returned
async fn list_next_in_response(
    client: &dyn ServiceClient,
    config: &ResourceConfig,
) -> Result<Vec<Value>, FetchError> {
    let continuation = config
        .continuation
        .as_ref()
        .ok_or(FetchError::MissingContinuation)?;

    // Per-fetch copy; the config itself is never touched
    let mut args = config.call_args.clone();
    let mut items = Vec::new();
    let mut calls = 0usize;

    loop {
        let mut response = client
            .invoke(&config.method, &args)
            .await
            .map_err(|e| FetchError::call(config, e))?;
        calls += 1;

        let token = response
            .as_object_mut()
            .and_then(|map| map.remove(&continuation.response_field))
            .filter(|token| !token.is_null());

        let added = path::take_items(response, &config.item_path, config.require_item_path, &mut items);
        info!(
            "Response for {}.{}, item path {:?}: {} items",
            config.client, config.method, config.item_path, added
        );

        let Some(token) = token else {
            break;
        };

        if calls >= MAX_PAGES {
            warn!(
                "{}.{}: stopped after {} calls, {} still present",
                config.client, config.method, MAX_PAGES, continuation.response_field
            );
            break;
        }

        if !inject_continuation(&mut args, &continuation.request_field, token) {
            warn!(
                "{}.{}: {} did not change between calls, stopping",
                config.client, config.method, continuation.response_field
            );
            break;
        }

        info!(
            "Found {} for {}.{}, calling again",
            continuation.response_field, config.client, config.method
        );
    }

    Ok(items)
}

/// Single call, single extraction
async fn list_direct(
    client: &dyn ServiceClient,
    config: &ResourceConfig,
) -> Result<Vec<Value>, FetchError> {
    let response = client
        .invoke(&config.method, &config.call_args)
        .await
        .map_err(|e| FetchError::call(config, e))?;

    let mut items = Vec::new();
    let added = path::take_items(response, &config.item_path, config.require_item_path, &mut items);
    info!(
        "Response for {}.{}, item path {:?}: {} items",
        config.client, config.method, config.item_path, added
    );

    Ok(items)
}

/// Copy the continuation token into the request arguments.
/// Returns false when the arguments already carry that exact token.
fn inject_continuation(args: &mut Map<String, Value>, field: &str, token: Value) -> bool {
    if args.get(field) == Some(&token) {
        return false;
    }
    args.insert(field.to_string(), token);
    true
}

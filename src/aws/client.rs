//! Service clients
//!
//! The capability contract every list-operation backend implements, and the
//! registry mapping service names to ready-to-use clients.

use anyhow::Result;
use futures::future::BoxFuture;
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Upper bound on calls made by one pagination loop
pub const MAX_PAGES: usize = 1000;

/// Continuation token conventions used by list operations, as
/// `(response field, request argument)` pairs. The first one found in a
/// response wins.
const TOKEN_CONVENTIONS: &[(&str, &str)] = &[
    ("NextToken", "NextToken"),
    ("nextToken", "nextToken"),
    ("NextMarker", "Marker"),
    ("Marker", "Marker"),
    ("NextPageToken", "PageToken"),
];

/// An authenticated handle able to call operations of one service
pub trait ServiceClient: Send + Sync {
    /// Call `method` once with `args` and return the decoded response
    fn invoke<'a>(
        &'a self,
        method: &'a str,
        args: &'a Map<String, Value>,
    ) -> BoxFuture<'a, Result<Value>>;

    /// Call `method` page by page until the service stops returning a
    /// continuation token
    fn paginate<'a>(
        &'a self,
        method: &'a str,
        args: Map<String, Value>,
    ) -> BoxStream<'a, Result<Value>> {
        paginate_by_token(self, method, args)
    }
}

/// Find the continuation token of a response using the known conventions
fn continuation_of(response: &Value) -> Option<(&'static str, Value)> {
    TOKEN_CONVENTIONS.iter().find_map(|(response_field, request_field)| {
        let token = response.get(*response_field)?;
        let usable = match token {
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            _ => true,
        };
        usable.then(|| (*request_field, token.clone()))
    })
}

/// Page through `method` by following continuation tokens.
///
/// Stops when a response carries no token, when the service echoes back
/// the token it was just sent, or after [`MAX_PAGES`] calls. A failed call
/// is yielded as an error and ends the stream.
pub fn paginate_by_token<'a, C>(
    client: &'a C,
    method: &'a str,
    args: Map<String, Value>,
) -> BoxStream<'a, Result<Value>>
where
    C: ServiceClient + ?Sized,
{
    stream::unfold(Some((args, 0usize)), move |state| async move {
        let (mut args, calls) = state?;
        if calls >= MAX_PAGES {
            warn!("{}: stopped after {} pages", method, MAX_PAGES);
            return None;
        }

        let response = match client.invoke(method, &args).await {
            Ok(response) => response,
            Err(e) => return Some((Err(e), None)),
        };

        let next = match continuation_of(&response) {
            Some((request_field, token)) if args.get(request_field) == Some(&token) => {
                warn!("{}: service returned the same {} again, stopping", method, request_field);
                None
            }
            Some((request_field, token)) => {
                debug!("{}: following {}", method, request_field);
                args.insert(request_field.to_string(), token);
                Some((args, calls + 1))
            }
            None => None,
        };

        Some((Ok(response), next))
    })
    .boxed()
}

/// Service name -> client handle
#[derive(Clone, Default)]
pub struct ClientRegistry {
    clients: HashMap<String, Arc<dyn ServiceClient>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one client per distinct service name
    pub fn build<'s, I, F>(services: I, mut factory: F) -> Result<Self>
    where
        I: IntoIterator<Item = &'s str>,
        F: FnMut(&str) -> Result<Arc<dyn ServiceClient>>,
    {
        let mut registry = Self::new();
        for service in services {
            if registry.clients.contains_key(service) {
                continue;
            }
            tracing::info!("Creating client for service: {}", service);
            let client = factory(service)?;
            registry.clients.insert(service.to_string(), client);
        }
        Ok(registry)
    }

    pub fn insert(&mut self, service: &str, client: Arc<dyn ServiceClient>) {
        self.clients.insert(service.to_string(), client);
    }

    pub fn with(mut self, service: &str, client: Arc<dyn ServiceClient>) -> Self {
        self.insert(service, client);
        self
    }

    pub fn get(&self, service: &str) -> Option<&dyn ServiceClient> {
        self.clients.get(service).map(|c| c.as_ref())
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut services: Vec<_> = self.clients.keys().collect();
        services.sort();
        f.debug_struct("ClientRegistry")
            .field("services", &services)
            .finish()
    }
}

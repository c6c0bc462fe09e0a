//! Scripted in-memory client
//!
//! Replays canned responses per method and records every call, so fetch
//! strategies and whole runs can be exercised without a network.

use super::client::ServiceClient;
use anyhow::{anyhow, Result};
use futures::future::{self, BoxFuture, FutureExt};
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

type Scripted = std::result::Result<Value, String>;

#[derive(Debug, Default)]
pub struct StaticClient {
    responses: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<(String, Map<String, Value>)>>,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl StaticClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response for `method`
    pub fn respond(self, method: &str, response: Value) -> Self {
        self.push(method, Ok(response));
        self
    }

    /// Queue a failure for `method`
    pub fn fail(self, method: &str, message: &str) -> Self {
        self.push(method, Err(message.to_string()));
        self
    }

    fn push(&self, method: &str, scripted: Scripted) {
        locked(&self.responses)
            .entry(method.to_string())
            .or_default()
            .push_back(scripted);
    }

    /// Every call made so far, in order, with the arguments it was given
    pub fn calls(&self) -> Vec<(String, Map<String, Value>)> {
        locked(&self.calls).clone()
    }
}

impl ServiceClient for StaticClient {
    fn invoke<'a>(
        &'a self,
        method: &'a str,
        args: &'a Map<String, Value>,
    ) -> BoxFuture<'a, Result<Value>> {
        locked(&self.calls).push((method.to_string(), args.clone()));

        let next = locked(&self.responses)
            .get_mut(method)
            .and_then(VecDeque::pop_front);

        let result = match next {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(anyhow!("{}: {}", method, message)),
            None => Err(anyhow!("no scripted response left for {}", method)),
        };
        future::ready(result).boxed()
    }
}

//! Verb-keyed handler registry

use super::Request;
use crate::transport::Transport;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Catch-all key for verbs with no handler of their own
pub const WILDCARD: &str = "*";

pub type Handler<T> = Arc<dyn Fn(Request<T>) -> BoxFuture<'static, ()> + Send + Sync>;

pub(crate) struct Registry<T: Transport> {
    handlers: RwLock<HashMap<String, Handler<T>>>,
}

impl<T: Transport> Registry<T> {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Register or replace the handler for `verb` (case-insensitive).
    pub fn insert(&self, verb: &str, handler: Handler<T>) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(verb.to_uppercase(), handler);
    }

    /// Exact verb first, then the wildcard. The lock is released before
    /// the handler is returned, so it is never held while a handler runs.
    pub fn lookup(&self, verb: &str) -> Option<Handler<T>> {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        handlers
            .get(&verb.to_uppercase())
            .or_else(|| handlers.get(WILDCARD))
            .cloned()
    }
}

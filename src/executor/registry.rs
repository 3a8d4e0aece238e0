//! Handler registry — maps handler names to executable functions.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::executor::handler::{HandlerFn, Middleware};

/// Registry of named job handlers.
///
/// Read-mostly after startup; re-registering a name silently overwrites the
/// previous handler (last write wins).
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<String, HandlerFn>>,
    middlewares: RwLock<Vec<Middleware>>,
}

impl HandlerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            middlewares: RwLock::new(Vec::new()),
        }
    }

    /// Add a middleware. Middlewares wrap handlers at registration time, so
    /// this only affects handlers registered afterwards. The first-added
    /// middleware ends up outermost.
    pub async fn use_middleware(&self, middleware: Middleware) {
        self.middlewares.write().await.push(middleware);
    }

    /// Register a handler under `name`, applying the middleware chain.
    pub async fn register(&self, name: impl Into<String>, handler: HandlerFn) {
        let name = name.into();
        let wrapped = {
            let middlewares = self.middlewares.read().await;
            middlewares
                .iter()
                .rev()
                .fold(handler, |next, middleware| middleware(next))
        };
        self.handlers.write().await.insert(name.clone(), wrapped);
        tracing::debug!(handler = %name, "Registered job handler");
    }

    /// Look up a handler by name.
    pub async fn lookup(&self, name: &str) -> Option<HandlerFn> {
        self.handlers.read().await.get(name).cloned()
    }

    /// List registered handler names.
    pub async fn names(&self) -> Vec<String> {
        self.handlers.read().await.keys().cloned().collect()
    }

    /// Number of registered handlers.
    pub async fn len(&self) -> usize {
        self.handlers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.handlers.read().await.is_empty()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// SPDX-License-Identifier: MIT
pub mod config;
pub mod error;
pub mod lsp;
pub mod tools;

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use config::ConfigStore;
use lsp::session::SessionManager;
use tools::{ToolDispatcher, ToolResponse};

/// Shared state wired at process start: the validated server catalog, the
/// live session manager built on top of it, and the tool dispatcher.
pub struct Bridge {
    pub manager: Arc<SessionManager>,
    pub dispatcher: ToolDispatcher,
    pub started_at: Instant,
}

impl Bridge {
    pub fn new(config: ConfigStore) -> Self {
        let manager = SessionManager::new(config);
        let dispatcher = ToolDispatcher::new(manager.clone());
        Self { manager, dispatcher, started_at: Instant::now() }
    }

    pub async fn call(&self, name: &str, arguments: Value) -> ToolResponse {
        self.dispatcher.call(name, arguments).await
    }

    /// Drain every live session's stop sequence concurrently.
    pub async fn shutdown(&self) {
        lsp::shutdown::shutdown_all(&self.manager).await;
    }
}

// SPDX-License-Identifier: MIT
//! Shutdown coordinator (component G) — orchestrates draining every live
//! session in parallel on host shutdown.

use std::sync::Arc;

use tracing::warn;

use crate::lsp::session::SessionManager;

/// Stop every currently-running language's session concurrently. A
/// per-session failure is logged and does not block the others.
pub async fn shutdown_all(manager: &Arc<SessionManager>) {
    let language_ids: Vec<String> = manager
        .config()
        .language_ids()
        .filter(|_| true)
        .map(|s| s.to_string())
        .collect();

    let mut handles = Vec::with_capacity(language_ids.len());
    for language_id in language_ids {
        let manager = manager.clone();
        handles.push(tokio::spawn(async move {
            if manager.get_by_language(&language_id).await.is_some() {
                if let Err(e) = manager.stop(&language_id).await {
                    warn!(language_id, error = %e, "error stopping session during shutdown");
                }
            }
        }));
    }

    for handle in handles {
        let _ = handle.await;
    }
}

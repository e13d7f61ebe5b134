// SPDX-License-Identifier: MIT
//! Request router (component E) — resolves a language/project pair or a
//! file path to its owning session, applies the rate limit and the
//! project warm-up guard, and forwards the JSON-RPC request.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use crate::error::BridgeError;
use crate::lsp::session::SessionManager;

/// Methods whose params include a `textDocument.uri` — routing one of
/// these triggers the once-per-session-lifetime project warm-up.
pub const DOCUMENT_CENTRIC_METHODS: &[&str] = &[
    "callHierarchy/prepare",
    "callHierarchy/incomingCalls",
    "callHierarchy/outgoingCalls",
    "textDocument/codeAction",
    "textDocument/completion",
    "textDocument/definition",
    "textDocument/documentColor",
    "textDocument/formatting",
    "textDocument/documentLink",
    "textDocument/rangeFormatting",
    "textDocument/documentSymbol",
    "textDocument/foldingRange",
    "textDocument/hover",
    "textDocument/implementation",
    "textDocument/inlayHint",
    "textDocument/linkedEditingRange",
    "textDocument/references",
    "textDocument/rename",
    "textDocument/selectionRange",
    "textDocument/signatureHelp",
    "textDocument/typeDefinition",
    "typeHierarchy/prepare",
    "typeHierarchy/subtypes",
    "typeHierarchy/supertypes",
    "workspace/symbol",
];

pub struct Router {
    manager: Arc<SessionManager>,
}

impl Router {
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self { manager }
    }

    /// Entry 1: by `(language_id, project)` pair.
    pub async fn send_request(
        &self,
        language_id: &str,
        project_name: Option<&str>,
        method: &str,
        params: Value,
    ) -> Result<Value, BridgeError> {
        let session = match project_name {
            Some(name) => self.manager.get_by_project(name).await,
            None => self.manager.get_by_language(language_id).await,
        }
        .ok_or_else(|| BridgeError::NotRunning(language_id.to_string()))?;

        let settings = session.lock().await.settings.clone();
        self.manager.check_rate_limit(language_id, &settings).await?;

        if method == "workspace/symbol" {
            let spec = self
                .manager
                .config()
                .get_server_config(language_id)
                .cloned();
            if let Some(spec) = spec {
                let mut guard = session.lock().await;
                let project_name = guard.project_name.clone();
                if let Some(project) = spec.project(&project_name) {
                    let project = project.clone();
                    guard.announce_workspace_folders_once(&project).await;
                }
            }
        }

        let guard = session.lock().await;
        guard
            .channel
            .request(method, params)
            .await
            .map_err(|e| BridgeError::Transport(e.to_string()))
    }

    /// Entry 2: by file path — resolves via `FileIndex` or a project-path
    /// prefix scan, then ensures document-centric warm-up before routing.
    pub async fn send_file_request(
        &self,
        file_path: &Path,
        method: &str,
        params: Value,
    ) -> Result<Value, BridgeError> {
        let session = match self.manager.resolve_file(file_path).await {
            Some(session) => session,
            None if self.manager.any_running().await => {
                return Err(BridgeError::FileNotOwned(file_path.display().to_string()));
            }
            None => return Err(BridgeError::NoServersRunning(file_path.display().to_string())),
        };

        let (language_id, project_name, settings) = {
            let guard = session.lock().await;
            (
                guard.language_id.clone(),
                guard.project_name.clone(),
                guard.settings.clone(),
            )
        };
        self.manager.check_rate_limit(&language_id, &settings).await?;

        if DOCUMENT_CENTRIC_METHODS.contains(&method) {
            let spec = self.manager.config().get_server_config(&language_id).cloned();
            if let Some(spec) = spec {
                if let Some(project) = spec.project(&project_name) {
                    let project = project.clone();
                    let mut guard = session.lock().await;
                    guard
                        .ensure_project_warmed_up(
                            &project,
                            &spec.extensions,
                            spec.settings.max_concurrent_file_reads as usize,
                        )
                        .await;
                    if method == "workspace/symbol" {
                        guard.announce_workspace_folders_once(&project).await;
                    }
                }
            }
        }

        let guard = session.lock().await;
        guard
            .channel
            .request(method, params)
            .await
            .map_err(|e| BridgeError::Transport(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigStore;

    #[tokio::test]
    async fn send_request_on_unstarted_language_is_not_running() {
        let manager = SessionManager::new(ConfigStore::empty());
        let router = Router::new(manager);
        let result = router
            .send_request("py", None, "textDocument/hover", Value::Null)
            .await;
        assert!(matches!(result, Err(BridgeError::NotRunning(_))));
    }

    #[tokio::test]
    async fn send_file_request_with_no_sessions_reports_no_servers_running() {
        let manager = SessionManager::new(ConfigStore::empty());
        let router = Router::new(manager);
        let result = router
            .send_file_request(Path::new("/tmp/other/x.py"), "textDocument/hover", Value::Null)
            .await;
        assert!(matches!(result, Err(BridgeError::NoServersRunning(_))));
    }

    #[tokio::test]
    async fn send_file_request_on_unowned_file_with_a_running_session_reports_not_owned() {
        let manager = SessionManager::new(ConfigStore::empty());
        manager.insert_running_session_for_test("py", "demo").await;
        let router = Router::new(manager);
        let result = router
            .send_file_request(Path::new("/tmp/other/x.py"), "textDocument/hover", Value::Null)
            .await;
        assert!(matches!(result, Err(BridgeError::FileNotOwned(_))));
    }
}

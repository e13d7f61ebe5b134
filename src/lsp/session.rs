// SPDX-License-Identifier: MIT
//! LSP session manager (component D) — the `initialize`/`initialized`
//! handshake, per-session document bookkeeping, file discovery caching,
//! and the language/project session indexes (spec.md §3, §4.D).

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::{oneshot, Mutex, RwLock};
use tracing::{info, warn};

use crate::config::{ConfigStore, ServerSpec, Settings};
use crate::error::BridgeError;
use crate::lsp::capabilities::{deep_merge, default_capabilities};
use crate::lsp::channel::RpcChannel;
use crate::lsp::discovery::discover_project_files;
use crate::lsp::process::LspProcess;

/// One live `(language_id, project_name)` connection.
pub struct Session {
    pub language_id: String,
    pub project_name: String,
    pub process: LspProcess,
    pub channel: RpcChannel,
    pub settings: Settings,
    pub server_capabilities: Value,
    pub initialized: bool,
    pub started_at: Instant,
    pub open_files: HashSet<String>,
    pub project_files: Option<Vec<PathBuf>>,
    pub workspace_folders_announced: bool,
}

impl Session {
    fn file_uri(path: &Path) -> String {
        format!("file://{}", path.display())
    }

    /// Idempotent: a file already in the open-set is a no-op. Read errors
    /// are returned to the caller rather than failing a whole batch.
    pub async fn open_file(&mut self, path: &Path) -> anyhow::Result<()> {
        let uri = Self::file_uri(path);
        if self.open_files.contains(&uri) {
            return Ok(());
        }
        let text = tokio::fs::read_to_string(path).await?;
        self.channel
            .notify(
                "textDocument/didOpen",
                json!({
                    "textDocument": {
                        "uri": uri,
                        "languageId": self.language_id,
                        "version": 1,
                        "text": text,
                    }
                }),
            )
            .await?;
        self.open_files.insert(uri);
        Ok(())
    }

    /// Bounded-concurrency batch open with an optional timeout; on timeout,
    /// abandons outstanding opens and falls back to opening at most the
    /// first 10 paths.
    pub async fn open_files(
        &mut self,
        paths: &[PathBuf],
        max_concurrent: usize,
        timeout_ms: Option<u64>,
    ) -> Result<(), BridgeError> {
        match timeout_ms {
            None => {
                self.open_files_bounded(paths, max_concurrent).await;
                Ok(())
            }
            Some(ms) => {
                let fut = self.open_files_bounded(paths, max_concurrent);
                match tokio::time::timeout(Duration::from_millis(ms), fut).await {
                    Ok(()) => Ok(()),
                    Err(_) => {
                        let fallback = &paths[..paths.len().min(10)];
                        self.open_files_bounded(fallback, max_concurrent).await;
                        Err(BridgeError::Timeout(
                            "loadProjectFiles timed out, opened the first 10 files".into(),
                        ))
                    }
                }
            }
        }
    }

    async fn open_files_bounded(&mut self, paths: &[PathBuf], max_concurrent: usize) {
        let max_concurrent = max_concurrent.max(1);
        for chunk in paths.chunks(max_concurrent) {
            for path in chunk {
                if let Err(e) = self.open_file(path).await {
                    warn!(path = %path.display(), error = %e, "failed to open file");
                }
            }
        }
    }

    pub async fn ensure_project_warmed_up(
        &mut self,
        project: &crate::config::ProjectSpec,
        extensions: &[String],
        max_concurrent: usize,
    ) {
        if self.project_files.is_none() {
            self.project_files = Some(discover_project_files(project, extensions));
        }
        let files = self.project_files.clone().unwrap_or_default();
        self.open_files_bounded(&files, max_concurrent).await;
    }

    pub async fn announce_workspace_folders_once(&mut self, project: &crate::config::ProjectSpec) {
        if self.workspace_folders_announced {
            return;
        }
        let uri = format!("file://{}", project.path);
        let _ = self
            .channel
            .notify(
                "workspace/didChangeWorkspaceFolders",
                json!({
                    "event": {
                        "added": [{"name": project.name, "uri": uri}],
                        "removed": []
                    }
                }),
            )
            .await;
        self.workspace_folders_announced = true;
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Unconfigured,
    Stopped,
    Starting,
    Ready,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusRecord {
    pub status: SessionStatus,
    pub uptime_ms: u64,
    pub language_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

type SharedSession = Arc<Mutex<Session>>;

/// The bucket for one `(language_id, floor(now/windowMs))` key.
struct RateBucket {
    bucket: u64,
    count: u32,
}

pub struct SessionManager {
    self_ref: Weak<SessionManager>,
    config: ConfigStore,
    by_language: RwLock<HashMap<String, SharedSession>>,
    by_project: RwLock<HashMap<String, SharedSession>>,
    file_index: RwLock<HashMap<PathBuf, String>>,
    rate_buckets: Mutex<HashMap<String, RateBucket>>,
    start_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionManager {
    /// Built with `Arc::new_cyclic` so the manager can hand its own spawned
    /// background tasks (the exit watcher below) a way to call back into
    /// itself once the process exits.
    pub fn new(config: ConfigStore) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            config,
            by_language: RwLock::new(HashMap::new()),
            by_project: RwLock::new(HashMap::new()),
            file_index: RwLock::new(HashMap::new()),
            rate_buckets: Mutex::new(HashMap::new()),
            start_locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub async fn get_by_language(&self, language_id: &str) -> Option<SharedSession> {
        self.by_language.read().await.get(language_id).cloned()
    }

    pub async fn get_by_project(&self, project_name: &str) -> Option<SharedSession> {
        self.by_project.read().await.get(project_name).cloned()
    }

    /// Whether any language currently has a live session at all — used to
    /// distinguish "no servers running" from "file not owned by a running
    /// server" at the file-routing entry point.
    pub async fn any_running(&self) -> bool {
        !self.by_language.read().await.is_empty()
    }

    /// Test-only: register a session directly in the indexes, bypassing the
    /// real spawn/handshake, so routing logic can be exercised without a
    /// working language server. The child process is a real but trivial one
    /// (`true`) purely so `Session` has a genuine `LspProcess` to hold.
    #[cfg(test)]
    pub(crate) async fn insert_running_session_for_test(&self, language_id: &str, project_name: &str) {
        let (process, stdin, stdout) =
            LspProcess::spawn("true", &[], "/tmp").expect("spawn stub process for test");
        let (channel, _exit_rx) = RpcChannel::new(stdin, stdout, Settings::default(), None);
        let session = Session {
            language_id: language_id.to_string(),
            project_name: project_name.to_string(),
            process,
            channel,
            settings: Settings::default(),
            server_capabilities: Value::Null,
            initialized: true,
            started_at: Instant::now(),
            open_files: HashSet::new(),
            project_files: None,
            workspace_folders_announced: false,
        };
        let session = Arc::new(Mutex::new(session));
        self.by_language
            .write()
            .await
            .insert(language_id.to_string(), session.clone());
        self.by_project
            .write()
            .await
            .insert(project_name.to_string(), session);
    }

    /// Fast-path file→session routing via `FileIndex`, falling back to a
    /// scan of running sessions whose project path prefixes `file_path`
    /// and whose server handles one of the file's extensions.
    pub async fn resolve_file(&self, file_path: &Path) -> Option<SharedSession> {
        if let Some(project_name) = self.file_index.read().await.get(file_path).cloned() {
            if let Some(session) = self.get_by_project(&project_name).await {
                return Some(session);
            }
        }

        let by_language = self.by_language.read().await;
        for session in by_language.values() {
            let guard = session.lock().await;
            let Some(spec) = self.config.get_server_config(&guard.language_id) else {
                continue;
            };
            let Some(project) = spec.project(&guard.project_name) else {
                continue;
            };
            if !file_path.starts_with(&project.path) {
                continue;
            }
            let matches_ext = spec
                .extensions
                .iter()
                .any(|ext| file_path.to_string_lossy().ends_with(ext.as_str()));
            if matches_ext {
                drop(guard);
                return Some(session.clone());
            }
        }
        None
    }

    /// The per-language lock guarding `start`'s check-then-spawn-then-insert
    /// sequence, so two concurrent `start` calls for the same language
    /// cannot both observe "not running" and both spawn a process.
    async fn start_lock(&self, language_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.start_locks.lock().await;
        locks
            .entry(language_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Start the given language's session against `project` (or the
    /// server's first configured project). Rejects a second concurrent
    /// start for the same language.
    pub async fn start(
        &self,
        language_id: &str,
        project_name: Option<&str>,
    ) -> Result<String, BridgeError> {
        let spec = self
            .config
            .get_server_config(language_id)
            .cloned()
            .ok_or_else(|| BridgeError::NotConfigured(language_id.to_string()))?;

        let lock = self.start_lock(language_id).await;
        let _start_guard = lock.lock().await;

        if self.get_by_language(language_id).await.is_some() {
            return Err(BridgeError::AlreadyRunning(language_id.to_string()));
        }

        let project = match project_name {
            Some(name) => spec
                .project(name)
                .ok_or_else(|| BridgeError::NotConfigured(format!("{language_id}/{name}")))?
                .clone(),
            None => spec.default_project().clone(),
        };

        let (process, stdin, stdout) = LspProcess::spawn(&spec.command, &spec.args, &project.path)
            .map_err(|e| BridgeError::Transport(e.to_string()))?;
        let (channel, exit_rx) =
            RpcChannel::new(stdin, stdout, spec.settings.clone(), spec.configuration.clone());

        let session = Session {
            language_id: language_id.to_string(),
            project_name: project.name.clone(),
            process,
            channel,
            settings: spec.settings.clone(),
            server_capabilities: Value::Null,
            initialized: false,
            started_at: Instant::now(),
            open_files: HashSet::new(),
            project_files: None,
            workspace_folders_announced: false,
        };
        let session = Arc::new(Mutex::new(session));

        self.by_language
            .write()
            .await
            .insert(language_id.to_string(), session.clone());
        self.by_project
            .write()
            .await
            .insert(project.name.clone(), session.clone());

        self.spawn_exit_watcher(language_id.to_string(), &session, exit_rx);

        self.initialize_session(&session, &spec, &project).await;

        Ok(project.name)
    }

    /// Spawn a task that waits for the channel's exit signal — fired when
    /// the reader loop observes the child process's stdout close or error
    /// out — and runs the same cleanup path as `stop` once it does.
    fn spawn_exit_watcher(
        &self,
        language_id: String,
        session: &SharedSession,
        exit_rx: oneshot::Receiver<()>,
    ) {
        let Some(manager) = self.self_ref.upgrade() else {
            return;
        };
        let weak_session = Arc::downgrade(session);
        tokio::spawn(async move {
            let _ = exit_rx.await;
            manager.handle_unexpected_exit(language_id, weak_session).await;
        });
    }

    /// Invoked once a session's channel reports the child process gone.
    /// Guarded by `Weak::ptr_eq` against the current `by_language` entry so
    /// a session already replaced by a later `restart`/`start`, or already
    /// torn down by a graceful `stop`, is not cleaned up twice.
    async fn handle_unexpected_exit(&self, language_id: String, weak_session: Weak<Mutex<Session>>) {
        let current = self.by_language.read().await.get(&language_id).cloned();
        let Some(current) = current else {
            return;
        };
        if !Weak::ptr_eq(&weak_session, &Arc::downgrade(&current)) {
            return;
        }

        warn!(language_id = %language_id, "LSP server process exited unexpectedly, cleaning up session");
        self.remove_session_indexes(&language_id, &current).await;
        self.run_stop_sequence(current).await;
    }

    async fn initialize_session(
        &self,
        session: &SharedSession,
        spec: &ServerSpec,
        project: &crate::config::ProjectSpec,
    ) {
        let pid = std::process::id();
        let uri = format!("file://{}", project.path);
        let client_capabilities = deep_merge(
            &default_capabilities(),
            spec.capabilities.as_ref().unwrap_or(&Value::Null),
        );

        let init_result = {
            let guard = session.lock().await;
            guard
                .channel
                .request(
                    "initialize",
                    json!({
                        "processId": pid,
                        "clientInfo": {"name": "lsp-bridge", "version": env!("CARGO_PKG_VERSION")},
                        "rootPath": project.path,
                        "rootUri": uri,
                        "workspaceFolders": [{"name": project.name, "uri": uri}],
                        "initializationOptions": spec.configuration.clone().unwrap_or(json!({})),
                        "capabilities": client_capabilities,
                    }),
                )
                .await
        };

        let server_capabilities = match init_result {
            Ok(result) => result.get("capabilities").cloned().unwrap_or(Value::Null),
            Err(e) => {
                warn!(language_id = %spec.language_id, error = %e, "initialize failed");
                return;
            }
        };

        {
            let mut guard = session.lock().await;
            guard.server_capabilities = server_capabilities;
            let _ = guard.channel.notify("initialized", json!({})).await;
        }

        let files = discover_project_files(project, &spec.extensions);
        {
            let path = files.first().cloned();
            let mut guard = session.lock().await;
            guard.project_files = Some(files.clone());
            if let Some(first) = path {
                if let Err(e) = guard.open_file(&first).await {
                    warn!(path = %first.display(), error = %e, "warm-up open failed");
                }
            }
        }
        {
            let mut index = self.file_index.write().await;
            for file in &files {
                index.insert(file.clone(), project.name.clone());
            }
        }

        let probe_skipped = !files.is_empty() && !spec.settings.workspace;
        let probe_ok = if probe_skipped {
            true
        } else {
            let guard = session.lock().await;
            guard
                .channel
                .request("workspace/symbol", json!({"query": ""}))
                .await
                .is_ok()
        };

        if probe_ok {
            let mut guard = session.lock().await;
            guard.initialized = true;
            info!(language_id = %spec.language_id, project = %project.name, "session ready");
        }
    }

    pub async fn stop(&self, language_id: &str) -> Result<(), BridgeError> {
        let session = self
            .get_by_language(language_id)
            .await
            .ok_or_else(|| BridgeError::NotRunning(language_id.to_string()))?;

        self.remove_session_indexes(language_id, &session).await;
        self.run_stop_sequence(session).await;
        Ok(())
    }

    pub async fn restart(
        &self,
        language_id: &str,
        project_name: Option<&str>,
    ) -> Result<String, BridgeError> {
        if self.get_by_language(language_id).await.is_some() {
            self.stop(language_id).await?;
        }
        self.start(language_id, project_name).await
    }

    /// Idempotent cleanup shared by graceful stop and child-exit handling:
    /// remove the language/project indexes and every `FileIndex` row
    /// pointing at this session.
    async fn remove_session_indexes(&self, language_id: &str, session: &SharedSession) {
        let project_name = session.lock().await.project_name.clone();
        self.by_language.write().await.remove(language_id);
        self.by_project.write().await.remove(&project_name);
        self.file_index
            .write()
            .await
            .retain(|_, owner| owner != &project_name);
    }

    /// Strict-order graceful stop (spec.md §4.C): `shutdown` request, grace
    /// wait, `exit` notification, channel close, then `SIGTERM`/`SIGKILL`
    /// escalation if the process is still alive.
    async fn run_stop_sequence(&self, session: SharedSession) {
        let Ok(session) = Arc::try_unwrap(session).map(Mutex::into_inner) else {
            warn!("stop sequence invoked while session still shared, skipping cleanup");
            return;
        };
        let Session {
            mut process,
            channel,
            settings,
            ..
        } = session;

        let _ = channel.request("shutdown", Value::Null).await;
        tokio::time::sleep(Duration::from_millis(settings.shutdown_grace_period_ms)).await;
        let _ = channel.notify("exit", Value::Null).await;
        channel.close().await;

        if process.is_alive() {
            process.send_sigterm();
            if !process.wait_exit(Duration::from_millis(500)).await {
                process.send_sigkill();
                let _ = process.wait_exit(Duration::from_millis(500)).await;
            }
        }
    }

    pub async fn status_all(&self) -> HashMap<String, StatusRecord> {
        let mut out = HashMap::new();
        for language_id in self.config.language_ids() {
            out.insert(language_id.to_string(), self.status_one(language_id).await);
        }
        out
    }

    pub async fn status_one(&self, language_id: &str) -> StatusRecord {
        if !self.config.has_server_config(language_id) {
            return StatusRecord {
                status: SessionStatus::Unconfigured,
                uptime_ms: 0,
                language_id: language_id.to_string(),
                project: None,
                pid: None,
                error: None,
            };
        }

        match self.get_by_language(language_id).await {
            None => StatusRecord {
                status: SessionStatus::Stopped,
                uptime_ms: 0,
                language_id: language_id.to_string(),
                project: None,
                pid: None,
                error: None,
            },
            Some(session) => {
                let guard = session.lock().await;
                let status = if !guard.process.is_alive() {
                    SessionStatus::Error
                } else if guard.initialized {
                    SessionStatus::Ready
                } else {
                    SessionStatus::Starting
                };
                StatusRecord {
                    status,
                    uptime_ms: guard.started_at.elapsed().as_millis() as u64,
                    language_id: language_id.to_string(),
                    project: Some(guard.project_name.clone()),
                    pid: Some(guard.process.pid),
                    error: None,
                }
            }
        }
    }

    /// Enforce the sliding-bucket rate limit for `language_id`. Returns an
    /// error and does not increment the counter when the bucket is full.
    pub async fn check_rate_limit(&self, language_id: &str, settings: &Settings) -> Result<(), BridgeError> {
        let now_ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        let bucket = now_ms / settings.rate_limit_window_ms.max(1);

        let mut buckets = self.rate_buckets.lock().await;
        buckets.retain(|_, v| v.bucket >= bucket);

        let entry = buckets
            .entry(language_id.to_string())
            .or_insert(RateBucket { bucket, count: 0 });
        if entry.bucket != bucket {
            entry.bucket = bucket;
            entry.count = 0;
        }
        if entry.count >= settings.rate_limit_max_requests {
            return Err(BridgeError::RateLimitExceeded(language_id.to_string()));
        }
        entry.count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> ConfigStore {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.json"),
            format!(
                r#"{{"servers": {{"py": {{"command": "true", "args": [], "extensions": [".py"],
                    "projects": [{{"name": "demo", "path": "{}"}}]}}}}}}"#,
                dir.path().display()
            ),
        )
        .unwrap();
        ConfigStore::load(&dir.path().join("config.json"))
    }

    #[tokio::test]
    async fn unconfigured_language_reports_unconfigured_status() {
        let manager = SessionManager::new(ConfigStore::empty());
        let status = manager.status_one("py").await;
        assert_eq!(status.status, SessionStatus::Unconfigured);
    }

    #[tokio::test]
    async fn stopped_language_reports_stopped_status() {
        let manager = SessionManager::new(sample_config());
        let status = manager.status_one("py").await;
        assert_eq!(status.status, SessionStatus::Stopped);
    }

    #[tokio::test]
    async fn rate_limit_rejects_after_max_requests() {
        let manager = SessionManager::new(ConfigStore::empty());
        let settings = Settings {
            rate_limit_max_requests: 2,
            rate_limit_window_ms: 60_000,
            ..Settings::default()
        };
        assert!(manager.check_rate_limit("py", &settings).await.is_ok());
        assert!(manager.check_rate_limit("py", &settings).await.is_ok());
        assert!(manager.check_rate_limit("py", &settings).await.is_err());
    }

    #[tokio::test]
    async fn stop_on_unstarted_language_is_not_running() {
        let manager = SessionManager::new(sample_config());
        let result = manager.stop("py").await;
        assert!(matches!(result, Err(BridgeError::NotRunning(_))));
    }

    /// `true` exits the instant it's spawned, so its `RpcChannel` reader
    /// loop hits EOF almost immediately — exercising the exit watcher
    /// without needing a real language server to crash.
    #[tokio::test]
    async fn exit_watcher_removes_session_after_process_exit() {
        let manager = SessionManager::new(sample_config());
        manager.start("py", None).await.unwrap();

        let mut cleaned_up = false;
        for _ in 0..100 {
            if manager.get_by_language("py").await.is_none() {
                cleaned_up = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(cleaned_up, "exit watcher did not prune the dead session in time");

        // A language whose session was reaped by the watcher, not `stop`,
        // must be startable again rather than stuck on AlreadyRunning.
        let restarted = manager.start("py", None).await;
        assert!(restarted.is_ok());
    }

    #[tokio::test]
    async fn concurrent_start_calls_for_same_language_do_not_race() {
        let manager = SessionManager::new(sample_config());
        let first = manager.clone();
        let second = manager.clone();
        let (r1, r2) = tokio::join!(first.start("py", None), second.start("py", None));

        let results = [r1, r2];
        let ok_count = results.iter().filter(|r| r.is_ok()).count();
        let already_running_count = results
            .iter()
            .filter(|r| matches!(r, Err(BridgeError::AlreadyRunning(_))))
            .count();
        assert_eq!(ok_count, 1, "exactly one concurrent start should win");
        assert_eq!(already_running_count, 1, "the other must see AlreadyRunning, not spawn a second process");
    }
}

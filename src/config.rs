// SPDX-License-Identifier: MIT
//! Config store (component A) — loads and strictly validates the LSP
//! bridge's server catalog.
//!
//! Validation rejects the whole document on any structural violation; the
//! result is never an `Err` the caller has to handle document-shape
//! failures for — a malformed file and an absent server are the same thing
//! to every downstream consumer ("not configured").

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Per-project glob overrides layered onto the default file-discovery excludes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Patterns {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSpec {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub patterns: Option<Patterns>,
}

fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_max_concurrent_file_reads() -> u32 {
    10
}
fn default_rate_limit_max_requests() -> u32 {
    100
}
fn default_rate_limit_window_ms() -> u64 {
    60_000
}
fn default_shutdown_grace_period_ms() -> u64 {
    100
}

/// Fully-defaulted per-server behavior knobs (spec.md §3 Settings).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_false")]
    pub configuration_request: bool,
    #[serde(default = "default_true")]
    pub message_request: bool,
    #[serde(default = "default_true")]
    pub registration_request: bool,
    #[serde(default = "default_true")]
    pub workspace: bool,
    #[serde(default = "default_max_concurrent_file_reads")]
    pub max_concurrent_file_reads: u32,
    #[serde(default = "default_rate_limit_max_requests")]
    pub rate_limit_max_requests: u32,
    #[serde(default = "default_rate_limit_window_ms")]
    pub rate_limit_window_ms: u64,
    #[serde(default = "default_shutdown_grace_period_ms")]
    pub shutdown_grace_period_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            configuration_request: default_false(),
            message_request: default_true(),
            registration_request: default_true(),
            workspace: default_true(),
            max_concurrent_file_reads: default_max_concurrent_file_reads(),
            rate_limit_max_requests: default_rate_limit_max_requests(),
            rate_limit_window_ms: default_rate_limit_window_ms(),
            shutdown_grace_period_ms: default_shutdown_grace_period_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSpec {
    pub language_id: String,
    pub command: String,
    pub args: Vec<String>,
    pub extensions: Vec<String>,
    pub projects: Vec<ProjectSpec>,
    #[serde(default)]
    pub configuration: Option<Value>,
    #[serde(default)]
    pub capabilities: Option<Value>,
    #[serde(default)]
    pub settings: Settings,
}

impl ServerSpec {
    pub fn default_project(&self) -> &ProjectSpec {
        &self.projects[0]
    }

    pub fn project(&self, name: &str) -> Option<&ProjectSpec> {
        self.projects.iter().find(|p| p.name == name)
    }
}

/// The validated, in-memory server catalog. Empty when the document was
/// missing, unreadable, or failed structural validation.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    servers: HashMap<String, ServerSpec>,
}

impl ConfigStore {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Read `path`, parse as JSON, and validate. Any failure at any stage
    /// yields an empty store — never an error the caller must propagate.
    pub fn load(path: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read config file, treating as unconfigured");
                return Self::empty();
            }
        };
        let raw: Value = match serde_json::from_str(&text) {
            Ok(v) => v,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "config file is not valid JSON, treating as unconfigured");
                return Self::empty();
            }
        };
        match validate_and_parse(&raw) {
            Some(servers) => Self { servers },
            None => {
                warn!(path = %path.display(), "config document failed validation, treating as unconfigured");
                Self::empty()
            }
        }
    }

    pub fn has_server_config(&self, language_id: &str) -> bool {
        self.servers.contains_key(language_id)
    }

    pub fn get_server_config(&self, language_id: &str) -> Option<&ServerSpec> {
        self.servers.get(language_id)
    }

    pub fn get_servers(&self) -> impl Iterator<Item = &ServerSpec> {
        self.servers.values()
    }

    pub fn language_ids(&self) -> impl Iterator<Item = &str> {
        self.servers.keys().map(|s| s.as_str())
    }
}

/// Structural validation against spec.md §4.A, applied to the raw JSON
/// before typed deserialization so a single malformed server rejects the
/// whole document rather than surfacing a serde error partway through.
fn validate_and_parse(raw: &Value) -> Option<HashMap<String, ServerSpec>> {
    let servers_obj = raw.get("servers")?.as_object()?;
    if servers_obj.is_empty() {
        return None;
    }

    let mut out = HashMap::with_capacity(servers_obj.len());
    for (language_id, server_val) in servers_obj {
        let obj = server_val.as_object()?;

        let command = obj.get("command")?.as_str()?;
        if command.is_empty() {
            return None;
        }
        let args = non_empty_string_array_allowed_empty(obj.get("args")?)?;

        let extensions = obj.get("extensions")?.as_array()?;
        if extensions.is_empty() {
            return None;
        }
        let extensions = string_array(extensions)?;

        let projects_val = obj.get("projects")?.as_array()?;
        if projects_val.is_empty() {
            return None;
        }
        let mut projects = Vec::with_capacity(projects_val.len());
        for p in projects_val {
            projects.push(validate_project(p)?);
        }

        if let Some(c) = obj.get("configuration") {
            if !c.is_object() {
                return None;
            }
        }
        if let Some(c) = obj.get("capabilities") {
            if !c.is_object() {
                return None;
            }
        }
        let settings = match obj.get("settings") {
            Some(s) => validate_settings(s)?,
            None => Settings::default(),
        };

        out.insert(
            language_id.clone(),
            ServerSpec {
                language_id: language_id.clone(),
                command: command.to_string(),
                args,
                extensions,
                projects,
                configuration: obj.get("configuration").cloned(),
                capabilities: obj.get("capabilities").cloned(),
                settings,
            },
        );
    }
    Some(out)
}

fn validate_project(v: &Value) -> Option<ProjectSpec> {
    let obj = v.as_object()?;
    let name = obj.get("name")?.as_str()?;
    if name.is_empty() {
        return None;
    }
    let path = obj.get("path")?.as_str()?;
    if path.is_empty() {
        return None;
    }
    let description = match obj.get("description") {
        Some(d) => Some(d.as_str()?.to_string()),
        None => None,
    };
    let url = match obj.get("url") {
        Some(u) => Some(u.as_str()?.to_string()),
        None => None,
    };
    let patterns = match obj.get("patterns") {
        Some(p) => Some(validate_patterns(p)?),
        None => None,
    };
    Some(ProjectSpec {
        name: name.to_string(),
        path: path.to_string(),
        description,
        url,
        patterns,
    })
}

fn validate_patterns(v: &Value) -> Option<Patterns> {
    let obj = v.as_object()?;
    let include = match obj.get("include") {
        Some(i) => string_array(i.as_array()?)?,
        None => Vec::new(),
    };
    let exclude = match obj.get("exclude") {
        Some(e) => string_array(e.as_array()?)?,
        None => Vec::new(),
    };
    Some(Patterns { include, exclude })
}

fn validate_settings(v: &Value) -> Option<Settings> {
    let obj = v.as_object()?;
    let mut s = Settings::default();
    for (key, val) in obj {
        match key.as_str() {
            "configurationRequest" => s.configuration_request = val.as_bool()?,
            "messageRequest" => s.message_request = val.as_bool()?,
            "registrationRequest" => s.registration_request = val.as_bool()?,
            "workspace" => s.workspace = val.as_bool()?,
            "maxConcurrentFileReads" => s.max_concurrent_file_reads = val.as_u64()? as u32,
            "rateLimitMaxRequests" => s.rate_limit_max_requests = val.as_u64()? as u32,
            "rateLimitWindowMs" => s.rate_limit_window_ms = val.as_u64()?,
            "shutdownGracePeriodMs" => s.shutdown_grace_period_ms = val.as_u64()?,
            _ => return None,
        }
    }
    Some(s)
}

fn string_array(arr: &[Value]) -> Option<Vec<String>> {
    arr.iter()
        .map(|v| v.as_str().map(|s| s.to_string()))
        .collect()
}

fn non_empty_string_array_allowed_empty(v: &Value) -> Option<Vec<String>> {
    string_array(v.as_array()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    fn valid_doc() -> &'static str {
        r#"{
            "servers": {
                "py": {
                    "command": "dummy-lsp",
                    "args": [],
                    "extensions": [".py"],
                    "projects": [{"name": "demo", "path": "/tmp/demo"}]
                }
            }
        }"#
    }

    #[test]
    fn loads_valid_config() {
        let f = write_config(valid_doc());
        let store = ConfigStore::load(f.path());
        assert!(store.has_server_config("py"));
        let spec = store.get_server_config("py").unwrap();
        assert_eq!(spec.command, "dummy-lsp");
        assert_eq!(spec.projects[0].name, "demo");
        assert_eq!(spec.settings.rate_limit_max_requests, 100);
    }

    #[test]
    fn missing_file_yields_empty_store() {
        let store = ConfigStore::load(Path::new("/nonexistent/path/does-not-exist.json"));
        assert!(!store.has_server_config("py"));
        assert_eq!(store.get_servers().count(), 0);
    }

    #[test]
    fn malformed_json_yields_empty_store() {
        let f = write_config("{ not json");
        let store = ConfigStore::load(f.path());
        assert_eq!(store.get_servers().count(), 0);
    }

    #[test]
    fn missing_command_rejects_whole_document() {
        let f = write_config(
            r#"{"servers": {"py": {"args": [], "extensions": [".py"], "projects": [{"name": "demo", "path": "/tmp"}]}}}"#,
        );
        let store = ConfigStore::load(f.path());
        assert_eq!(store.get_servers().count(), 0);
    }

    #[test]
    fn empty_extensions_rejects_whole_document() {
        let f = write_config(
            r#"{"servers": {"py": {"command": "x", "args": [], "extensions": [], "projects": [{"name": "demo", "path": "/tmp"}]}}}"#,
        );
        let store = ConfigStore::load(f.path());
        assert_eq!(store.get_servers().count(), 0);
    }

    #[test]
    fn empty_projects_rejects_whole_document() {
        let f = write_config(
            r#"{"servers": {"py": {"command": "x", "args": [], "extensions": [".py"], "projects": []}}}"#,
        );
        let store = ConfigStore::load(f.path());
        assert_eq!(store.get_servers().count(), 0);
    }

    #[test]
    fn one_malformed_server_rejects_entire_document() {
        let f = write_config(
            r#"{"servers": {
                "py": {"command": "x", "args": [], "extensions": [".py"], "projects": [{"name": "demo", "path": "/tmp"}]},
                "rs": {"command": "", "args": [], "extensions": [".rs"], "projects": [{"name": "d", "path": "/tmp"}]}
            }}"#,
        );
        let store = ConfigStore::load(f.path());
        assert_eq!(store.get_servers().count(), 0);
    }

    #[test]
    fn settings_defaults_applied_when_absent() {
        let f = write_config(valid_doc());
        let store = ConfigStore::load(f.path());
        let spec = store.get_server_config("py").unwrap();
        assert!(!spec.settings.configuration_request);
        assert!(spec.settings.message_request);
        assert!(spec.settings.registration_request);
        assert!(spec.settings.workspace);
        assert_eq!(spec.settings.max_concurrent_file_reads, 10);
        assert_eq!(spec.settings.shutdown_grace_period_ms, 100);
    }

    #[test]
    fn reload_with_identical_content_is_idempotent() {
        let f = write_config(valid_doc());
        let a = ConfigStore::load(f.path());
        let b = ConfigStore::load(f.path());
        let sa = a.get_server_config("py").unwrap();
        let sb = b.get_server_config("py").unwrap();
        assert_eq!(sa.command, sb.command);
        assert_eq!(sa.settings.rate_limit_max_requests, sb.settings.rate_limit_max_requests);
    }

    #[test]
    fn unknown_settings_key_rejects_document() {
        let f = write_config(
            r#"{"servers": {"py": {"command": "x", "args": [], "extensions": [".py"],
                "projects": [{"name": "demo", "path": "/tmp"}],
                "settings": {"bogus": true}}}}"#,
        );
        let store = ConfigStore::load(f.path());
        assert_eq!(store.get_servers().count(), 0);
    }
}

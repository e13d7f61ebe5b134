// SPDX-License-Identifier: MIT
//! Tool dispatcher (component F) — validates arguments against the fixed
//! catalog, translates them to LSP requests per the mapping rules in
//! spec.md §4.F, paginates list results, and answers the status/capability
//! and lifecycle tools locally.

pub mod capability_map;
pub mod catalog;

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

use crate::error::BridgeError;
use crate::lsp::router::Router;
use crate::lsp::session::SessionManager;
use catalog::{find, FieldKind, Shape, ToolDef};

#[derive(Debug, Serialize)]
pub struct ContentItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ToolResponse {
    pub content: Vec<ContentItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ToolResponse {
    fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentItem { kind: "text".into(), text: text.into() }],
            data: None,
        }
    }

    fn data(text: impl Into<String>, data: Value) -> Self {
        Self {
            content: vec![ContentItem { kind: "text".into(), text: text.into() }],
            data: Some(data),
        }
    }

    fn from_json_payload(data: Value) -> Self {
        let text = serde_json::to_string(&data).unwrap_or_default();
        Self::data(text, data)
    }

    fn from_error(e: &BridgeError) -> Self {
        Self::text(e.response_text())
    }
}

pub struct ToolDispatcher {
    manager: Arc<SessionManager>,
    router: Router,
}

impl ToolDispatcher {
    pub fn new(manager: Arc<SessionManager>) -> Self {
        let router = Router::new(manager.clone());
        Self { manager, router }
    }

    pub async fn call(&self, name: &str, args: Value) -> ToolResponse {
        let Some(tool) = find(name) else {
            return ToolResponse::from_error(&BridgeError::UnknownTool(name.to_string()));
        };

        if let Err(missing) = validate(tool, &args) {
            return ToolResponse::from_error(&BridgeError::MissingArguments(missing));
        }

        match self.dispatch(tool, &args).await {
            Ok(response) => response,
            Err(e) => ToolResponse::from_error(&e),
        }
    }

    async fn dispatch(&self, tool: &ToolDef, args: &Value) -> Result<ToolResponse, BridgeError> {
        match tool.shape {
            Shape::Position { method } => {
                let file = require_str(args, "file_path")?;
                let params = position_params(args, file)?;
                self.route_file(file, method, params).await.map(ToolResponse::from_json_payload)
            }
            Shape::Range { method, formatting } => {
                let file = require_str(args, "file_path")?;
                let params = range_params(args, file, formatting)?;
                self.route_file(file, method, params).await.map(ToolResponse::from_json_payload)
            }
            Shape::NoPosition { method } => {
                let file = require_str(args, "file_path")?;
                let params = no_position_params(file)?;
                self.route_file(file, method, params).await.map(ToolResponse::from_json_payload)
            }
            Shape::Rename { method } => {
                let file = require_str(args, "file_path")?;
                let new_name = require_str(args, "new_name")?;
                let mut params = position_params(args, file)?;
                params["newName"] = json!(new_name);
                self.route_file(file, method, params).await.map(ToolResponse::from_json_payload)
            }
            Shape::References { method } => {
                let file = require_str(args, "file_path")?;
                let mut params = position_params(args, file)?;
                let include_declaration = args
                    .get("include_declaration")
                    .and_then(Value::as_bool)
                    .unwrap_or(true);
                params["context"] = json!({"includeDeclaration": include_declaration});
                self.route_file(file, method, params).await.map(ToolResponse::from_json_payload)
            }
            Shape::SelectionRange { method } => {
                let file = require_str(args, "file_path")?;
                let line = require_num(args, "line")?;
                let character = require_num(args, "character")?;
                let params = json!({
                    "textDocument": {"uri": file_uri(file)},
                    "positions": [{"line": line, "character": character}],
                });
                self.route_file(file, method, params).await.map(ToolResponse::from_json_payload)
            }
            Shape::ItemWrapped { method } => {
                let item = args.get("item").cloned().unwrap_or(Value::Null);
                let file = item_owning_file(&item)?;
                let params = json!({"item": item});
                self.route_file(&file, method, params).await.map(ToolResponse::from_json_payload)
            }
            Shape::ItemResolve { method } => {
                let file = require_str(args, "file_path")?;
                let item = args.get("item").cloned().unwrap_or(Value::Null);
                self.route_file(file, method, item).await.map(ToolResponse::from_json_payload)
            }
            Shape::PaginatedFileList { method } => {
                let file = require_str(args, "file_path")?;
                let params = no_position_params(file)?;
                let result = self.route_file(file, method, params).await?;
                let items = result.as_array().cloned().unwrap_or_default();
                Ok(paginated_response(&items, args, Some(file)))
            }
            Shape::ProjectSymbols => {
                let language_id = require_str(args, "language_id")?;
                let query = args.get("query").and_then(Value::as_str).unwrap_or("");
                let project = args.get("project").and_then(Value::as_str);
                let result = self
                    .router
                    .send_request(language_id, project, "workspace/symbol", json!({"query": query}))
                    .await?;
                let items = result.as_array().cloned().unwrap_or_default();
                Ok(paginated_response(&items, args, None))
            }
            Shape::ProjectFiles => {
                let language_id = require_str(args, "language_id")?;
                self.project_files(language_id, args).await
            }
            Shape::ServerStatus => {
                let language_id = args.get("language_id").and_then(Value::as_str);
                Ok(self.server_status(language_id).await)
            }
            Shape::ServerProjects => {
                let language_id = require_str(args, "language_id")?;
                self.server_projects(language_id)
            }
            Shape::ServerCapabilities => {
                let language_id = require_str(args, "language_id")?;
                self.server_capabilities(language_id).await
            }
            Shape::StartServer => {
                let language_id = require_str(args, "language_id")?;
                let project = args.get("project").and_then(Value::as_str);
                let project_name = self.manager.start(language_id, project).await?;
                Ok(ToolResponse::data(
                    format!("Successfully started '{language_id}'"),
                    json!({"project": project_name}),
                ))
            }
            Shape::StopServer => {
                let language_id = require_str(args, "language_id")?;
                self.manager.stop(language_id).await?;
                Ok(ToolResponse::text(format!("Successfully stopped '{language_id}'")))
            }
            Shape::RestartServer => {
                let language_id = require_str(args, "language_id")?;
                let project = args.get("project").and_then(Value::as_str);
                let project_name = self.manager.restart(language_id, project).await?;
                Ok(ToolResponse::data(
                    format!("Successfully restarted '{language_id}'"),
                    json!({"project": project_name}),
                ))
            }
            Shape::LoadProjectFiles => {
                let language_id = require_str(args, "language_id")?;
                self.load_project_files(language_id, args).await
            }
        }
    }

    async fn route_file(&self, file: &str, method: &str, params: Value) -> Result<Value, BridgeError> {
        self.router.send_file_request(Path::new(file), method, params).await
    }

    async fn project_files(&self, language_id: &str, args: &Value) -> Result<ToolResponse, BridgeError> {
        if !self.manager.config().has_server_config(language_id) {
            return Err(BridgeError::NotConfigured(language_id.to_string()));
        }
        let session = self
            .manager
            .get_by_language(language_id)
            .await
            .ok_or_else(|| BridgeError::NotRunning(language_id.to_string()))?;
        let files = session.lock().await.project_files.clone().unwrap_or_default();
        let items: Vec<Value> = files.iter().map(|p| json!(p.display().to_string())).collect();
        Ok(paginated_response(&items, args, None))
    }

    async fn server_status(&self, language_id: Option<&str>) -> ToolResponse {
        match language_id {
            Some(id) => {
                let record = self.manager.status_one(id).await;
                ToolResponse::from_json_payload(serde_json::to_value(record).unwrap_or(Value::Null))
            }
            None => {
                let all = self.manager.status_all().await;
                ToolResponse::from_json_payload(serde_json::to_value(all).unwrap_or(Value::Null))
            }
        }
    }

    fn server_projects(&self, language_id: &str) -> Result<ToolResponse, BridgeError> {
        let spec = self
            .manager
            .config()
            .get_server_config(language_id)
            .ok_or_else(|| BridgeError::NotConfigured(language_id.to_string()))?;
        let projects: Vec<Value> = spec
            .projects
            .iter()
            .map(|p| {
                json!({
                    "name": p.name,
                    "path": p.path,
                    "extensions": spec.extensions,
                    "configuration": spec.configuration,
                    "description": p.description,
                    "url": p.url,
                })
            })
            .collect();
        Ok(ToolResponse::from_json_payload(json!(projects)))
    }

    async fn server_capabilities(&self, language_id: &str) -> Result<ToolResponse, BridgeError> {
        if !self.manager.config().has_server_config(language_id) {
            return Err(BridgeError::NotConfigured(language_id.to_string()));
        }
        let session = self
            .manager
            .get_by_language(language_id)
            .await
            .ok_or_else(|| BridgeError::NotRunning(language_id.to_string()))?;
        let guard = session.lock().await;
        let server_capabilities = guard.server_capabilities.clone();
        let project = guard.project_name.clone();
        drop(guard);

        let mut tools_report = serde_json::Map::new();
        for &(capability, tool_names) in capability_map::CAPABILITY_TOOLS {
            let supported = server_capabilities
                .get(capability)
                .map(|v| !matches!(v, Value::Bool(false) | Value::Null))
                .unwrap_or(false);
            let tools: Vec<&str> = if supported { tool_names.to_vec() } else { Vec::new() };
            tools_report.insert(capability.to_string(), json!({"supported": supported, "tools": tools}));
        }
        tools_report.insert(
            capability_map::SERVER_OPERATIONS.to_string(),
            json!({"supported": true, "tools": capability_map::SERVER_OPERATION_TOOLS}),
        );

        Ok(ToolResponse::from_json_payload(json!({
            "language_id": language_id,
            "project": project,
            "capabilities": server_capabilities,
            "tools": Value::Object(tools_report),
        })))
    }

    async fn load_project_files(&self, language_id: &str, args: &Value) -> Result<ToolResponse, BridgeError> {
        let spec = self
            .manager
            .config()
            .get_server_config(language_id)
            .cloned()
            .ok_or_else(|| BridgeError::NotConfigured(language_id.to_string()))?;
        let session = self
            .manager
            .get_by_language(language_id)
            .await
            .ok_or_else(|| BridgeError::NotRunning(language_id.to_string()))?;

        let timeout_ms = args.get("timeout_ms").and_then(Value::as_u64);
        let mut guard = session.lock().await;

        let project_name = args
            .get("project")
            .and_then(Value::as_str)
            .map(|n| n.to_string())
            .unwrap_or_else(|| guard.project_name.clone());
        let project = spec
            .project(&project_name)
            .cloned()
            .unwrap_or_else(|| spec.default_project().clone());

        if guard.project_files.is_none() {
            guard.project_files = Some(crate::lsp::discovery::discover_project_files(&project, &spec.extensions));
        }
        let files = guard.project_files.clone().unwrap_or_default();
        let outcome = guard
            .open_files(&files, spec.settings.max_concurrent_file_reads as usize, timeout_ms)
            .await;
        drop(guard);

        match outcome {
            Ok(()) => Ok(ToolResponse::text(format!(
                "Loaded {} project file(s) for '{language_id}'",
                files.len()
            ))),
            Err(e) => Err(e),
        }
    }
}

fn file_uri(path: &str) -> String {
    format!("file://{path}")
}

fn require_str<'a>(args: &'a Value, name: &str) -> Result<&'a str, BridgeError> {
    args.get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| BridgeError::MissingArguments(vec![name.to_string()]))
}

fn require_num(args: &Value, name: &str) -> Result<i64, BridgeError> {
    args.get(name)
        .and_then(Value::as_i64)
        .ok_or_else(|| BridgeError::MissingArguments(vec![name.to_string()]))
}

fn position_params(args: &Value, file: &str) -> Result<Value, BridgeError> {
    let line = require_num(args, "line")?;
    let character = require_num(args, "character")?;
    Ok(json!({
        "textDocument": {"uri": file_uri(file)},
        "position": {"line": line, "character": character},
    }))
}

fn range_params(args: &Value, file: &str, formatting: bool) -> Result<Value, BridgeError> {
    let start_line = require_num(args, "start_line")?;
    let start_character = require_num(args, "start_character")?;
    let end_line = require_num(args, "end_line")?;
    let end_character = require_num(args, "end_character")?;
    let mut params = json!({
        "textDocument": {"uri": file_uri(file)},
        "range": {
            "start": {"line": start_line, "character": start_character},
            "end": {"line": end_line, "character": end_character},
        },
    });
    if formatting {
        params["options"] = json!({"tabSize": 2, "insertSpaces": true});
    }
    Ok(params)
}

fn no_position_params(file: &str) -> Result<Value, BridgeError> {
    Ok(json!({"textDocument": {"uri": file_uri(file)}}))
}

/// Recover the owning file path from an opaque `item.uri`, rejecting
/// non-`file://` URIs per spec.md §9's open-question resolution.
fn item_owning_file(item: &Value) -> Result<String, BridgeError> {
    let uri = item
        .get("uri")
        .and_then(Value::as_str)
        .ok_or_else(|| BridgeError::MissingArguments(vec!["item".to_string()]))?;
    uri.strip_prefix("file://")
        .map(|p| p.to_string())
        .ok_or_else(|| BridgeError::NotAFileUri(uri.to_string()))
}

fn paginate(items: &[Value], limit: u64, offset: u64) -> (Vec<Value>, bool, u64) {
    let total = items.len() as u64;
    let start = offset.min(total) as usize;
    let end = (offset.saturating_add(limit)).min(total) as usize;
    let page = items.get(start..end).unwrap_or(&[]).to_vec();
    let more = offset.saturating_add(limit) < total;
    (page, more, total)
}

fn paginated_response(items: &[Value], args: &Value, file_path: Option<&str>) -> ToolResponse {
    let limit = args.get("limit").and_then(Value::as_u64).unwrap_or(250);
    let offset = args.get("offset").and_then(Value::as_u64).unwrap_or(0);
    let (page, more, total) = paginate(items, limit, offset);
    let mut data = json!({
        "items": page,
        "pagination": {"more": more, "offset": offset, "total": total},
    });
    if let Some(file_path) = file_path {
        data["file_path"] = json!(file_path);
    }
    ToolResponse::from_json_payload(data)
}

/// Required-field presence/type validation (spec.md §4.F). Returns the
/// sorted list of missing/ill-typed field names.
fn validate(tool: &ToolDef, args: &Value) -> Result<(), Vec<String>> {
    let mut missing = Vec::new();
    for (name, kind) in tool.required {
        let ok = match kind {
            FieldKind::Str => args.get(*name).and_then(Value::as_str).map(|s| !s.is_empty()).unwrap_or(false),
            FieldKind::Num => args.get(*name).map(Value::is_number).unwrap_or(false),
            FieldKind::Obj => args.get(*name).and_then(Value::as_object).map(|o| !o.is_empty()).unwrap_or(false),
            FieldKind::Query => args.get(*name).and_then(Value::as_str).is_some(),
        };
        if !ok {
            missing.push((*name).to_string());
        }
    }
    if missing.is_empty() {
        Ok(())
    } else {
        missing.sort();
        Err(missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigStore;

    fn dispatcher() -> ToolDispatcher {
        ToolDispatcher::new(SessionManager::new(ConfigStore::empty()))
    }

    #[tokio::test]
    async fn unknown_tool_reports_stable_text() {
        let d = dispatcher();
        let resp = d.call("get_magic", json!({})).await;
        assert_eq!(resp.content[0].text, "Unknown tool: get_magic");
    }

    #[tokio::test]
    async fn missing_arguments_are_reported_sorted_and_joined() {
        let d = dispatcher();
        let resp = d.call("get_hover", json!({"file_path": "/tmp/demo/a.py"})).await;
        assert_eq!(resp.content[0].text, "Missing required arguments: character, line");
    }

    #[tokio::test]
    async fn empty_config_reports_not_configured() {
        let d = dispatcher();
        let resp = d.call("get_server_projects", json!({"language_id": "py"})).await;
        assert_eq!(resp.content[0].text, "'py' is not configured");
    }

    #[test]
    fn pagination_reports_more_when_remaining_items_exist() {
        let items: Vec<Value> = (0..5).map(|i| json!(i)).collect();
        let (page, more, total) = paginate(&items, 2, 1);
        assert_eq!(page, vec![json!(1), json!(2)]);
        assert!(more);
        assert_eq!(total, 5);
    }

    #[test]
    fn pagination_offset_past_total_yields_empty_page() {
        let items: Vec<Value> = (0..3).map(|i| json!(i)).collect();
        let (page, more, total) = paginate(&items, 10, 10);
        assert!(page.is_empty());
        assert!(!more);
        assert_eq!(total, 3);
    }

    #[test]
    fn item_owning_file_rejects_non_file_uri() {
        let item = json!({"uri": "untitled:Untitled-1"});
        let result = item_owning_file(&item);
        assert!(matches!(result, Err(BridgeError::NotAFileUri(_))));
    }

    #[test]
    fn item_owning_file_strips_file_prefix() {
        let item = json!({"uri": "file:///tmp/demo/a.py"});
        assert_eq!(item_owning_file(&item).unwrap(), "/tmp/demo/a.py");
    }
}

// SPDX-License-Identifier: MIT
//! Static capability → tool table (spec.md §4.F). Used by
//! `get_server_capabilities` to report, per advertised LSP server
//! capability, which catalog tools exercise it.

pub const SERVER_OPERATIONS: &str = "serverOperations";

pub const CAPABILITY_TOOLS: &[(&str, &[&str])] = &[
    ("hoverProvider", &["get_hover"]),
    ("completionProvider", &["get_completions", "get_resolves"]),
    ("codeActionProvider", &["get_code_actions", "get_code_resolves"]),
    ("colorProvider", &["get_colors"]),
    ("foldingRangeProvider", &["get_folding_ranges"]),
    ("documentFormattingProvider", &["get_format"]),
    ("documentHighlightProvider", &["get_highlights"]),
    ("implementationProvider", &["get_implementations"]),
    (
        "callHierarchyProvider",
        &["get_call_hierarchy", "get_incoming_calls", "get_outgoing_calls"],
    ),
    ("inlayHintProvider", &["get_inlay_hints", "get_inlay_hint"]),
    ("linkedEditingRangeProvider", &["get_linked_editing_range"]),
    ("documentLinkProvider", &["get_links", "get_link_resolves"]),
    ("documentRangeFormattingProvider", &["get_range_format"]),
    ("selectionRangeProvider", &["get_selection_range"]),
    ("semanticTokensProvider", &["get_semantic_tokens"]),
    ("signatureHelpProvider", &["get_signature"]),
    (
        "typeHierarchyProvider",
        &["get_subtypes", "get_supertypes", "get_type_hierarchy"],
    ),
    ("definitionProvider", &["get_symbol_definitions"]),
    ("referencesProvider", &["get_symbol_references"]),
    ("renameProvider", &["get_symbol_renames"]),
    ("documentSymbolProvider", &["get_symbols"]),
    ("typeDefinitionProvider", &["get_type_definitions"]),
    ("workspaceSymbolProvider", &["get_project_symbols"]),
];

pub const SERVER_OPERATION_TOOLS: &[&str] = &[
    "get_project_files",
    "get_server_capabilities",
    "get_server_projects",
    "get_server_status",
    "load_project_files",
    "restart_server",
    "start_server",
    "stop_server",
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::catalog::TOOL_CATALOG;
    use std::collections::HashSet;

    #[test]
    fn every_catalog_tool_appears_in_the_capability_map_or_server_operations() {
        let mut mapped: HashSet<&str> = SERVER_OPERATION_TOOLS.iter().copied().collect();
        for (_, tools) in CAPABILITY_TOOLS {
            mapped.extend(tools.iter().copied());
        }
        for tool in TOOL_CATALOG {
            assert!(mapped.contains(tool.name), "{} missing from capability map", tool.name);
        }
    }
}

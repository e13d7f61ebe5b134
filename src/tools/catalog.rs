// SPDX-License-Identifier: MIT
//! The fixed tool catalog (spec.md §6) — tool names, their declared
//! required/optional arguments, and the shape that drives argument→LSP
//! translation (component F).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Str,
    Num,
    Obj,
    /// `query` is special-cased to accept any string, including empty.
    Query,
}

/// Determines how a tool's validated arguments are turned into an LSP
/// request (or handled entirely locally).
#[derive(Debug, Clone, Copy)]
pub enum Shape {
    /// `file_path` + `line`/`character` → `textDocument` + `position`.
    Position { method: &'static str },
    /// `file_path` + `start_*`/`end_*` → `textDocument` + `range`.
    Range { method: &'static str, formatting: bool },
    /// `file_path` only → `textDocument`.
    NoPosition { method: &'static str },
    /// `file_path` + position + `new_name` → `textDocument` + `position` + `newName`.
    Rename { method: &'static str },
    /// `file_path` + position, optional `include_declaration` → `context.includeDeclaration`.
    References { method: &'static str },
    /// `file_path` + position → `positions: [position]` (selectionRange takes an array).
    SelectionRange { method: &'static str },
    /// `item` only; forwarded as `{item}`; owning file recovered from `item.uri`.
    ItemWrapped { method: &'static str },
    /// `file_path` + `item`; `item` forwarded unchanged as the whole params object.
    ItemResolve { method: &'static str },
    /// `file_path`, paginated document-level list (e.g. document symbols).
    PaginatedFileList { method: &'static str },
    /// `language_id` + `query`, paginated, routed by language/project.
    ProjectSymbols,
    /// `language_id`, paginated, local cache (no LSP call).
    ProjectFiles,
    ServerStatus,
    ServerProjects,
    ServerCapabilities,
    StartServer,
    StopServer,
    RestartServer,
    LoadProjectFiles,
}

#[derive(Debug, Clone, Copy)]
pub struct ToolDef {
    pub name: &'static str,
    pub description: &'static str,
    pub required: &'static [(&'static str, FieldKind)],
    pub optional: &'static [&'static str],
    pub shape: Shape,
}

const POS: (&str, FieldKind) = ("line", FieldKind::Num);
const CHAR: (&str, FieldKind) = ("character", FieldKind::Num);
const FILE: (&str, FieldKind) = ("file_path", FieldKind::Str);
const ITEM: (&str, FieldKind) = ("item", FieldKind::Obj);
const LANG: (&str, FieldKind) = ("language_id", FieldKind::Str);
const SL: (&str, FieldKind) = ("start_line", FieldKind::Num);
const SC: (&str, FieldKind) = ("start_character", FieldKind::Num);
const EL: (&str, FieldKind) = ("end_line", FieldKind::Num);
const EC: (&str, FieldKind) = ("end_character", FieldKind::Num);

pub const TOOL_CATALOG: &[ToolDef] = &[
    ToolDef {
        name: "get_hover",
        description: "Hover information for a symbol at a file position.",
        required: &[FILE, POS, CHAR],
        optional: &[],
        shape: Shape::Position { method: "textDocument/hover" },
    },
    ToolDef {
        name: "get_completions",
        description: "Completion candidates at a file position.",
        required: &[FILE, POS, CHAR],
        optional: &[],
        shape: Shape::Position { method: "textDocument/completion" },
    },
    ToolDef {
        name: "get_code_actions",
        description: "Available code actions over a range.",
        required: &[FILE, SL, SC, EL, EC],
        optional: &[],
        shape: Shape::Range { method: "textDocument/codeAction", formatting: false },
    },
    ToolDef {
        name: "get_code_resolves",
        description: "Resolve a code action's edit/command.",
        required: &[FILE, ITEM],
        optional: &[],
        shape: Shape::ItemResolve { method: "codeAction/resolve" },
    },
    ToolDef {
        name: "get_colors",
        description: "Document color ranges.",
        required: &[FILE],
        optional: &[],
        shape: Shape::NoPosition { method: "textDocument/documentColor" },
    },
    ToolDef {
        name: "get_folding_ranges",
        description: "Folding ranges for a document.",
        required: &[FILE],
        optional: &[],
        shape: Shape::NoPosition { method: "textDocument/foldingRange" },
    },
    ToolDef {
        name: "get_format",
        description: "Format an entire document.",
        required: &[FILE],
        optional: &[],
        shape: Shape::NoPosition { method: "textDocument/formatting" },
    },
    ToolDef {
        name: "get_highlights",
        description: "Document highlights for a symbol at a position.",
        required: &[FILE, POS, CHAR],
        optional: &[],
        shape: Shape::Position { method: "textDocument/documentHighlight" },
    },
    ToolDef {
        name: "get_implementations",
        description: "Implementations of the symbol at a position.",
        required: &[FILE, POS, CHAR],
        optional: &[],
        shape: Shape::Position { method: "textDocument/implementation" },
    },
    ToolDef {
        name: "get_incoming_calls",
        description: "Incoming calls for a call-hierarchy item.",
        required: &[ITEM],
        optional: &[],
        shape: Shape::ItemWrapped { method: "callHierarchy/incomingCalls" },
    },
    ToolDef {
        name: "get_inlay_hint",
        description: "Resolve an inlay hint's extra details.",
        required: &[FILE, ITEM],
        optional: &[],
        shape: Shape::ItemResolve { method: "inlayHint/resolve" },
    },
    ToolDef {
        name: "get_inlay_hints",
        description: "Inlay hints over a range.",
        required: &[FILE, SL, SC, EL, EC],
        optional: &[],
        shape: Shape::Range { method: "textDocument/inlayHint", formatting: false },
    },
    ToolDef {
        name: "get_linked_editing_range",
        description: "Linked editing ranges at a position.",
        required: &[FILE, POS, CHAR],
        optional: &[],
        shape: Shape::Position { method: "textDocument/linkedEditingRange" },
    },
    ToolDef {
        name: "get_link_resolves",
        description: "Resolve a document link's target.",
        required: &[FILE, ITEM],
        optional: &[],
        shape: Shape::ItemResolve { method: "documentLink/resolve" },
    },
    ToolDef {
        name: "get_links",
        description: "Document links in a file.",
        required: &[FILE],
        optional: &[],
        shape: Shape::NoPosition { method: "textDocument/documentLink" },
    },
    ToolDef {
        name: "get_outgoing_calls",
        description: "Outgoing calls for a call-hierarchy item.",
        required: &[ITEM],
        optional: &[],
        shape: Shape::ItemWrapped { method: "callHierarchy/outgoingCalls" },
    },
    ToolDef {
        name: "get_project_files",
        description: "Discovered project files for a configured language, paginated.",
        required: &[LANG],
        optional: &["limit", "offset"],
        shape: Shape::ProjectFiles,
    },
    ToolDef {
        name: "get_project_symbols",
        description: "Workspace symbol search within a language's project, paginated.",
        required: &[LANG, ("query", FieldKind::Query)],
        optional: &["limit", "offset"],
        shape: Shape::ProjectSymbols,
    },
    ToolDef {
        name: "get_range_format",
        description: "Format a range within a document.",
        required: &[FILE, SL, SC, EL, EC],
        optional: &[],
        shape: Shape::Range { method: "textDocument/rangeFormatting", formatting: true },
    },
    ToolDef {
        name: "get_resolves",
        description: "Resolve a completion item's extra details.",
        required: &[FILE, ITEM],
        optional: &[],
        shape: Shape::ItemResolve { method: "completionItem/resolve" },
    },
    ToolDef {
        name: "get_selection_range",
        description: "Selection ranges at a position.",
        required: &[FILE, POS, CHAR],
        optional: &[],
        shape: Shape::SelectionRange { method: "textDocument/selectionRange" },
    },
    ToolDef {
        name: "get_semantic_tokens",
        description: "Full-document semantic tokens.",
        required: &[FILE],
        optional: &[],
        shape: Shape::NoPosition { method: "textDocument/semanticTokens/full" },
    },
    ToolDef {
        name: "get_server_capabilities",
        description: "Server capabilities and the tools that exercise each.",
        required: &[LANG],
        optional: &["project"],
        shape: Shape::ServerCapabilities,
    },
    ToolDef {
        name: "get_server_projects",
        description: "Configured projects for a language.",
        required: &[LANG],
        optional: &[],
        shape: Shape::ServerProjects,
    },
    ToolDef {
        name: "get_server_status",
        description: "Status of one or all configured language servers.",
        required: &[],
        optional: &["language_id"],
        shape: Shape::ServerStatus,
    },
    ToolDef {
        name: "get_signature",
        description: "Signature help at a position.",
        required: &[FILE, POS, CHAR],
        optional: &[],
        shape: Shape::Position { method: "textDocument/signatureHelp" },
    },
    ToolDef {
        name: "get_subtypes",
        description: "Subtypes for a type-hierarchy item.",
        required: &[ITEM],
        optional: &[],
        shape: Shape::ItemWrapped { method: "typeHierarchy/subtypes" },
    },
    ToolDef {
        name: "get_supertypes",
        description: "Supertypes for a type-hierarchy item.",
        required: &[ITEM],
        optional: &[],
        shape: Shape::ItemWrapped { method: "typeHierarchy/supertypes" },
    },
    ToolDef {
        name: "get_symbol_definitions",
        description: "Definition locations for the symbol at a position.",
        required: &[FILE, POS, CHAR],
        optional: &[],
        shape: Shape::Position { method: "textDocument/definition" },
    },
    ToolDef {
        name: "get_symbol_references",
        description: "References to the symbol at a position.",
        required: &[FILE, POS, CHAR],
        optional: &["include_declaration"],
        shape: Shape::References { method: "textDocument/references" },
    },
    ToolDef {
        name: "get_symbol_renames",
        description: "Compute a rename edit for the symbol at a position.",
        required: &[FILE, POS, CHAR, ("new_name", FieldKind::Str)],
        optional: &[],
        shape: Shape::Rename { method: "textDocument/rename" },
    },
    ToolDef {
        name: "get_symbols",
        description: "Document symbols in a file, paginated.",
        required: &[FILE],
        optional: &["limit", "offset"],
        shape: Shape::PaginatedFileList { method: "textDocument/documentSymbol" },
    },
    ToolDef {
        name: "get_type_definitions",
        description: "Type-definition locations for the symbol at a position.",
        required: &[FILE, POS, CHAR],
        optional: &[],
        shape: Shape::Position { method: "textDocument/typeDefinition" },
    },
    ToolDef {
        name: "get_type_hierarchy",
        description: "Prepare a type hierarchy rooted at a position.",
        required: &[FILE, POS, CHAR],
        optional: &[],
        shape: Shape::Position { method: "textDocument/prepareTypeHierarchy" },
    },
    ToolDef {
        name: "load_project_files",
        description: "Eagerly open all discovered project files for a language.",
        required: &[LANG],
        optional: &["project", "timeout_ms"],
        shape: Shape::LoadProjectFiles,
    },
    ToolDef {
        name: "restart_server",
        description: "Stop then start a language server.",
        required: &[LANG],
        optional: &["project"],
        shape: Shape::RestartServer,
    },
    ToolDef {
        name: "start_server",
        description: "Start a configured language server.",
        required: &[LANG],
        optional: &["project"],
        shape: Shape::StartServer,
    },
    ToolDef {
        name: "stop_server",
        description: "Stop a running language server.",
        required: &[LANG],
        optional: &[],
        shape: Shape::StopServer,
    },
    ToolDef {
        name: "get_call_hierarchy",
        description: "Prepare a call hierarchy rooted at a position.",
        required: &[FILE, POS, CHAR],
        optional: &[],
        shape: Shape::Position { method: "textDocument/prepareCallHierarchy" },
    },
];

pub fn find(name: &str) -> Option<&'static ToolDef> {
    TOOL_CATALOG.iter().find(|t| t.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_exactly_the_contracted_tool_names() {
        const EXPECTED: &[&str] = &[
            "get_call_hierarchy", "get_code_actions", "get_code_resolves", "get_colors",
            "get_completions", "get_folding_ranges", "get_format", "get_highlights", "get_hover",
            "get_implementations", "get_incoming_calls", "get_inlay_hint", "get_inlay_hints",
            "get_linked_editing_range", "get_link_resolves", "get_links", "get_outgoing_calls",
            "get_project_files", "get_project_symbols", "get_range_format", "get_resolves",
            "get_selection_range", "get_semantic_tokens", "get_server_capabilities",
            "get_server_projects", "get_server_status", "get_signature", "get_subtypes",
            "get_supertypes", "get_symbol_definitions", "get_symbol_references",
            "get_symbol_renames", "get_symbols", "get_type_definitions", "get_type_hierarchy",
            "load_project_files", "restart_server", "start_server", "stop_server",
        ];
        let mut actual: Vec<&str> = TOOL_CATALOG.iter().map(|t| t.name).collect();
        let mut expected: Vec<&str> = EXPECTED.to_vec();
        actual.sort();
        expected.sort();
        assert_eq!(actual, expected);
    }

    #[test]
    fn find_locates_a_known_tool() {
        assert!(find("get_hover").is_some());
        assert!(find("get_magic").is_none());
    }
}

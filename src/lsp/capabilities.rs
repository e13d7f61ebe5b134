// SPDX-License-Identifier: MIT
//! Default client capabilities advertised to every LSP server (spec.md
//! §4.D), and the deep-merge used to layer a server's override on top.

use serde_json::{json, Value};

pub fn default_capabilities() -> Value {
    let symbol_kinds: Vec<i64> = (1..=26).collect();
    json!({
        "general": {
            "positionEncodings": ["utf-8", "utf-16"]
        },
        "textDocument": {
            "hover": {
                "dynamicRegistration": false,
                "contentFormat": ["markdown", "plaintext"]
            },
            "completion": {
                "dynamicRegistration": false,
                "completionItem": {
                    "snippetSupport": true,
                    "insertReplaceSupport": true,
                    "deprecatedSupport": true,
                    "tagSupport": { "valueSet": [1] },
                    "resolveSupport": { "properties": ["additionalTextEdits", "detail", "documentation"] }
                }
            },
            "codeAction": {
                "dynamicRegistration": false,
                "codeActionLiteralSupport": {
                    "codeActionKind": { "valueSet": [] }
                },
                "dataSupport": true,
                "disabledSupport": true,
                "isPreferredSupport": true,
                "resolveSupport": { "properties": ["edit"] }
            },
            "signatureHelp": {
                "dynamicRegistration": false,
                "contextSupport": true,
                "signatureInformation": {
                    "activeParameterSupport": true,
                    "parameterInformation": { "labelOffsetSupport": true },
                    "documentationFormat": ["markdown", "plaintext"]
                }
            },
            "synchronization": {
                "dynamicRegistration": false,
                "didSave": true,
                "willSave": true,
                "willSaveWaitUntil": true
            },
            "callHierarchy": { "dynamicRegistration": false },
            "typeHierarchy": { "dynamicRegistration": false },
            "inlayHint": { "dynamicRegistration": false },
            "foldingRange": { "dynamicRegistration": false },
            "documentSymbol": { "dynamicRegistration": false },
            "definition": { "dynamicRegistration": false },
            "typeDefinition": { "dynamicRegistration": false },
            "implementation": { "dynamicRegistration": false },
            "references": { "dynamicRegistration": false },
            "rename": { "dynamicRegistration": false },
            "selectionRange": { "dynamicRegistration": false },
            "documentLink": { "dynamicRegistration": false },
            "linkedEditingRange": { "dynamicRegistration": false },
            "formatting": { "dynamicRegistration": false },
            "rangeFormatting": { "dynamicRegistration": false },
            "colorProvider": { "dynamicRegistration": false }
        },
        "workspace": {
            "applyEdit": true,
            "configuration": true,
            "workspaceFolders": true,
            "executeCommand": { "dynamicRegistration": false },
            "didChangeConfiguration": { "dynamicRegistration": false },
            "didChangeWatchedFiles": { "dynamicRegistration": false },
            "symbol": {
                "dynamicRegistration": false,
                "symbolKind": { "valueSet": symbol_kinds }
            },
            "workspaceEdit": {
                "documentChanges": true,
                "failureHandling": "textOnlyTransactional",
                "resourceOperations": ["create", "delete", "rename"]
            }
        }
    })
}

/// Recursive merge: scalar/array leaves in `override_` replace the base;
/// objects merge key-wise; arrays are replaced wholesale, never concatenated.
pub fn deep_merge(base: &Value, override_: &Value) -> Value {
    match (base, override_) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged = base_map.clone();
            for (key, override_val) in override_map {
                let next = match merged.get(key) {
                    Some(base_val) => deep_merge(base_val, override_val),
                    None => override_val.clone(),
                };
                merged.insert(key.clone(), next);
            }
            Value::Object(merged)
        }
        (_, override_) => override_.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_capabilities_has_utf8_and_utf16_encodings() {
        let caps = default_capabilities();
        assert_eq!(
            caps["general"]["positionEncodings"],
            json!(["utf-8", "utf-16"])
        );
    }

    #[test]
    fn deep_merge_replaces_leaf() {
        let base = json!({"a": 1, "b": {"c": 2}});
        let over = json!({"a": 99});
        let merged = deep_merge(&base, &over);
        assert_eq!(merged["a"], json!(99));
        assert_eq!(merged["b"]["c"], json!(2));
    }

    #[test]
    fn deep_merge_merges_objects_keywise() {
        let base = json!({"textDocument": {"hover": {"x": 1}, "definition": {"y": 2}}});
        let over = json!({"textDocument": {"hover": {"x": 9, "z": 3}}});
        let merged = deep_merge(&base, &over);
        assert_eq!(merged["textDocument"]["hover"]["x"], json!(9));
        assert_eq!(merged["textDocument"]["hover"]["z"], json!(3));
        assert_eq!(merged["textDocument"]["definition"]["y"], json!(2));
    }

    #[test]
    fn deep_merge_replaces_arrays_wholesale() {
        let base = json!({"list": [1, 2, 3]});
        let over = json!({"list": [9]});
        let merged = deep_merge(&base, &over);
        assert_eq!(merged["list"], json!([9]));
    }

    #[test]
    fn deep_merge_with_empty_override_is_identity() {
        let base = json!({"a": {"b": 1}});
        let merged = deep_merge(&base, &json!({}));
        assert_eq!(merged, base);
    }
}

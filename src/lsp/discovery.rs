// SPDX-License-Identifier: MIT
//! Project file discovery (spec.md §4.D).
//!
//! Walks `project.path` for files matching the server's `extensions`,
//! applying the fixed default excludes plus the project's own
//! `patterns.include`/`patterns.exclude` glob overrides. An include whose
//! path segments overlap a default-excluded directory name removes that
//! exclude so the include can reach it.

use std::path::{Path, PathBuf};

use glob::Pattern;
use ignore::WalkBuilder;

use crate::config::{Patterns, ProjectSpec};

const DEFAULT_EXCLUDED_DIR_NAMES: &[&str] = &[
    "bin", "build", "cache", "coverage", "dist", "log", "node_modules", "obj", "out", "target",
    "temp", "tmp", "venv",
];

/// Discover absolute paths under `project.path` whose suffix matches one of
/// `extensions`. Empty `extensions` yields an empty list.
pub fn discover_project_files(project: &ProjectSpec, extensions: &[String]) -> Vec<PathBuf> {
    if extensions.is_empty() {
        return Vec::new();
    }

    let empty = Patterns::default();
    let patterns = project.patterns.as_ref().unwrap_or(&empty);
    let active_excludes = active_default_excludes(patterns);
    let include_patterns = compile_patterns(&patterns.include);
    let exclude_patterns = compile_patterns(&patterns.exclude);

    let root = Path::new(&project.path);
    let mut out = Vec::new();

    let mut walker = WalkBuilder::new(root);
    walker.hidden(false).git_ignore(false).git_global(false).git_exclude(false);

    for entry in walker.build() {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };
        let path = entry.path();
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }

        let rel = path.strip_prefix(root).unwrap_or(path);
        let is_included = matches_any(rel, &include_patterns);

        if !is_included {
            if has_hidden_component(rel) {
                continue;
            }
            if has_excluded_ancestor(rel, &active_excludes) {
                continue;
            }
            if matches_any(rel, &exclude_patterns) {
                continue;
            }
        }

        let matches_ext = extensions
            .iter()
            .any(|ext| path.to_string_lossy().ends_with(ext.as_str()));
        if !matches_ext {
            continue;
        }

        out.push(path.to_path_buf());
    }

    out
}

/// The default excludes are a fixed directory-name set, minus any name
/// that any include pattern's path segments overlap — so an include can
/// still reach inside e.g. `node_modules` if explicitly asked for.
fn active_default_excludes(patterns: &Patterns) -> Vec<&'static str> {
    DEFAULT_EXCLUDED_DIR_NAMES
        .iter()
        .copied()
        .filter(|name| {
            !patterns
                .include
                .iter()
                .any(|inc| inc.split(['/', '\\']).any(|seg| seg == *name))
        })
        .collect()
}

fn has_hidden_component(rel: &Path) -> bool {
    rel.components().any(|c| {
        c.as_os_str()
            .to_str()
            .map(|s| s.starts_with('.') && s != "." && s != "..")
            .unwrap_or(false)
    })
}

fn has_excluded_ancestor(rel: &Path, excludes: &[&str]) -> bool {
    rel.components().any(|c| {
        c.as_os_str()
            .to_str()
            .map(|s| excludes.contains(&s))
            .unwrap_or(false)
    })
}

fn compile_patterns(globs: &[String]) -> Vec<Pattern> {
    globs.iter().filter_map(|g| Pattern::new(g).ok()).collect()
}

fn matches_any(rel: &Path, patterns: &[Pattern]) -> bool {
    let rel_str = rel.to_string_lossy();
    patterns.iter().any(|p| p.matches(&rel_str))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn project(path: &Path, patterns: Option<Patterns>) -> ProjectSpec {
        ProjectSpec {
            name: "demo".into(),
            path: path.to_string_lossy().to_string(),
            description: None,
            url: None,
            patterns,
        }
    }

    #[test]
    fn finds_files_matching_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "x").unwrap();
        fs::write(dir.path().join("b.txt"), "x").unwrap();
        let files = discover_project_files(&project(dir.path(), None), &[".py".into()]);
        assert_eq!(files.len(), 1);
        assert!(files[0].to_string_lossy().ends_with("a.py"));
    }

    #[test]
    fn excludes_default_directory_names_at_any_depth() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        fs::write(dir.path().join("node_modules/pkg/a.py"), "x").unwrap();
        fs::write(dir.path().join("a.py"), "x").unwrap();
        let files = discover_project_files(&project(dir.path(), None), &[".py".into()]);
        assert_eq!(files.len(), 1);
        assert!(!files[0].to_string_lossy().contains("node_modules"));
    }

    #[test]
    fn excludes_hidden_dotfile_paths() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join(".git/a.py"), "x").unwrap();
        fs::write(dir.path().join("a.py"), "x").unwrap();
        let files = discover_project_files(&project(dir.path(), None), &[".py".into()]);
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn empty_extensions_yields_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "x").unwrap();
        let files = discover_project_files(&project(dir.path(), None), &[]);
        assert!(files.is_empty());
    }

    #[test]
    fn include_override_reaches_into_default_excluded_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        fs::write(dir.path().join("node_modules/pkg/a.py"), "x").unwrap();
        let patterns = Patterns {
            include: vec!["node_modules/**".into()],
            exclude: vec![],
        };
        let files = discover_project_files(&project(dir.path(), Some(patterns)), &[".py".into()]);
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn project_exclude_glob_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("vendor")).unwrap();
        fs::write(dir.path().join("vendor/a.py"), "x").unwrap();
        fs::write(dir.path().join("b.py"), "x").unwrap();
        let patterns = Patterns {
            include: vec![],
            exclude: vec!["vendor/**".into()],
        };
        let files = discover_project_files(&project(dir.path(), Some(patterns)), &[".py".into()]);
        assert_eq!(files.len(), 1);
        assert!(files[0].to_string_lossy().ends_with("b.py"));
    }
}

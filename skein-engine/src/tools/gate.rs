//! File-access gate (spec §4.2): every file-read passes a path and an
//! optional [`FileFilter`]; absent a filter, the project's ignore list is
//! consulted.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Outcome of consulting a [`FileFilter`] for a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAccessDecision {
    Allow,
    AllowExample,
    Blocked,
}

/// Caller-supplied policy; authoritative over the project ignore list when present.
pub trait FileFilter: Send + Sync {
    fn check(&self, path: &Path) -> FileAccessDecision;
}

/// Failure reading a gated file, in the fixed check order spec §4.2 lists.
/// A filter/ignore-list `Blocked` decision is not a failure — it returns the
/// `IGNORED` sentinel as a successful read (see [`FileGate::read_file`]).
#[derive(Debug, Error, PartialEq)]
pub enum FileGateError {
    #[error("path is outside the project root: {0}")]
    OutsideProject(String),
    #[error("file does not exist: {0}")]
    DoesNotExist(String),
    #[error("file is too large (> 1 MiB): {0}")]
    TooLarge(String),
    #[error("I/O error reading {path}: {message}")]
    Io { path: String, message: String },
}

use crate::config::MAX_FILE_READ_BYTES as MAX_FILE_BYTES;
const TEMPLATE_MARKER: &str = "[TEMPLATE]\n";
const IGNORED_SENTINEL: &str = "IGNORED";

/// Consults the project ignore list (via `ignore::gitignore`) when no
/// [`FileFilter`] is supplied, and enforces the fixed path/size checks.
pub struct FileGate {
    project_root: PathBuf,
    filter: Option<Box<dyn FileFilter>>,
    ignore_matcher: Option<ignore::gitignore::Gitignore>,
}

impl FileGate {
    pub fn new(project_root: impl Into<PathBuf>, filter: Option<Box<dyn FileFilter>>) -> Self {
        let project_root = project_root.into();
        let ignore_matcher = if filter.is_none() {
            let mut builder = ignore::gitignore::GitignoreBuilder::new(&project_root);
            builder.add(project_root.join(".gitignore"));
            builder.build().ok()
        } else {
            None
        };
        Self {
            project_root,
            filter,
            ignore_matcher,
        }
    }

    /// Reads `path`, applying the fixed checks in spec order: outside-project,
    /// filter/ignore decision (a `Blocked` verdict returns the `IGNORED`
    /// sentinel as a successful read, not an error), missing, too-large, I/O error.
    pub fn read_file(&self, path: &Path) -> Result<String, FileGateError> {
        let display = path.display().to_string();

        let absolute = self.project_root.join(path);
        let canonical_root = self
            .project_root
            .canonicalize()
            .unwrap_or_else(|_| self.project_root.clone());
        if path.is_absolute() {
            return Err(FileGateError::OutsideProject(display));
        }
        let resolved = absolute
            .canonicalize()
            .unwrap_or_else(|_| absolute.clone());
        if !resolved.starts_with(&canonical_root) {
            return Err(FileGateError::OutsideProject(display));
        }

        let decision = self.decide(path);
        if decision == FileAccessDecision::Blocked {
            return Ok(IGNORED_SENTINEL.to_string());
        }

        if !resolved.exists() {
            return Err(FileGateError::DoesNotExist(display));
        }

        let metadata = std::fs::metadata(&resolved).map_err(|e| FileGateError::Io {
            path: display.clone(),
            message: e.to_string(),
        })?;
        if metadata.len() > MAX_FILE_BYTES {
            return Err(FileGateError::TooLarge(display));
        }

        let contents = std::fs::read_to_string(&resolved).map_err(|e| FileGateError::Io {
            path: display.clone(),
            message: e.to_string(),
        })?;

        if decision == FileAccessDecision::AllowExample {
            Ok(format!("{TEMPLATE_MARKER}{contents}"))
        } else {
            Ok(contents)
        }
    }

    fn decide(&self, path: &Path) -> FileAccessDecision {
        if let Some(filter) = &self.filter {
            return filter.check(path);
        }
        if let Some(matcher) = &self.ignore_matcher {
            let matched = matcher.matched(path, false);
            if matched.is_ignore() {
                return FileAccessDecision::Blocked;
            }
        }
        FileAccessDecision::Allow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct ScriptedFilter {
        allow_example: PathBuf,
        blocked: PathBuf,
    }

    impl FileFilter for ScriptedFilter {
        fn check(&self, path: &Path) -> FileAccessDecision {
            if path == self.allow_example {
                FileAccessDecision::AllowExample
            } else if path == self.blocked {
                FileAccessDecision::Blocked
            } else {
                FileAccessDecision::Allow
            }
        }
    }

    fn project(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (name, contents) in files {
            std::fs::write(dir.path().join(name), contents).unwrap();
        }
        dir
    }

    #[test]
    fn template_marker_prefixes_allow_example_reads() {
        let dir = project(&[(".env.example", "KEY=value"), (".env", "KEY=secret")]);
        let filter = ScriptedFilter {
            allow_example: PathBuf::from(".env.example"),
            blocked: PathBuf::from(".env"),
        };
        let gate = FileGate::new(dir.path(), Some(Box::new(filter)));

        let content = gate.read_file(Path::new(".env.example")).unwrap();
        assert_eq!(content, "[TEMPLATE]\nKEY=value");

        let blocked = gate.read_file(Path::new(".env")).unwrap();
        assert_eq!(blocked, "IGNORED");
    }

    #[test]
    fn absolute_path_is_outside_project() {
        let dir = project(&[]);
        let gate = FileGate::new(dir.path(), None);
        let err = gate.read_file(Path::new("/etc/passwd")).unwrap_err();
        assert!(matches!(err, FileGateError::OutsideProject(_)));
    }

    #[test]
    fn missing_file_is_does_not_exist() {
        let dir = project(&[]);
        let gate = FileGate::new(dir.path(), None);
        let err = gate.read_file(Path::new("missing.txt")).unwrap_err();
        assert_eq!(err, FileGateError::DoesNotExist("missing.txt".to_string()));
    }

    #[test]
    fn oversized_file_is_too_large() {
        let dir = tempfile::tempdir().unwrap();
        let big = "x".repeat((MAX_FILE_BYTES + 1) as usize);
        std::fs::write(dir.path().join("big.txt"), big).unwrap();
        let gate = FileGate::new(dir.path(), None);
        let err = gate.read_file(Path::new("big.txt")).unwrap_err();
        assert_eq!(err, FileGateError::TooLarge("big.txt".to_string()));
    }

    #[test]
    fn ordinary_read_succeeds_without_filter() {
        let dir = project(&[("a.txt", "hello")]);
        let gate = FileGate::new(dir.path(), None);
        assert_eq!(gate.read_file(Path::new("a.txt")).unwrap(), "hello");
    }
}

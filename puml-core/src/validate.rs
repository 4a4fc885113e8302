//! Candidate-path validation shared by launch arguments and IPC requests.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::SUPPORTED_EXTENSIONS;

/// Filter and normalise candidate file paths.
///
/// Entries that do not exist or are directories are dropped with a log
/// line, never an error. Unrecognised extensions are kept — a file without
/// a standard suffix may still contain valid PlantUML text — but warned
/// about. Survivors are returned as absolute paths in their original order.
pub fn validate_files<I, S>(candidates: I) -> Vec<PathBuf>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut valid = Vec::new();

    for candidate in candidates {
        let candidate = candidate.as_ref().trim();
        if candidate.is_empty() {
            continue;
        }
        let path = Path::new(candidate);

        let meta = match std::fs::metadata(path) {
            Ok(meta) => meta,
            Err(e) => {
                warn!("cannot access {}: {}", path.display(), e);
                continue;
            }
        };
        if meta.is_dir() {
            warn!("{} is a directory, not a file", path.display());
            continue;
        }

        let known_extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                SUPPORTED_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            })
            .unwrap_or(false);
        if !known_extension {
            warn!(
                "{} does not look like a PlantUML file (expected .puml, .plantuml or .pu); keeping it anyway",
                path.display()
            );
        }

        valid.push(absolutize(path));
    }

    debug!("validated {} file(s)", valid.len());
    valid
}

/// Normalise to an absolute path. Canonicalisation resolves symlinks so
/// IPC-forwarded and CLI-passed spellings of the same file map to one
/// registry key; when it fails the path is joined onto the current
/// directory instead.
fn absolutize(path: &Path) -> PathBuf {
    match path.canonicalize() {
        Ok(abs) => abs,
        Err(_) if path.is_absolute() => path.to_path_buf(),
        Err(_) => std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn drops_missing_and_directory_entries() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.puml");
        std::fs::write(&file, "@startuml\n@enduml\n").unwrap();

        let result = validate_files([
            file.to_str().unwrap(),
            dir.path().to_str().unwrap(),
            "/no/such/file.puml",
        ]);

        assert_eq!(result, vec![file.canonicalize().unwrap()]);
    }

    #[test]
    fn keeps_unrecognised_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("diagram.txt");
        std::fs::write(&file, "@startuml\n@enduml\n").unwrap();

        let result = validate_files([file.to_str().unwrap()]);
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn preserves_order_and_returns_absolute_paths() {
        let dir = tempfile::tempdir().unwrap();
        let names = ["x.puml", "y.plantuml", "z.pu"];
        let mut expected = Vec::new();
        for name in names {
            let file = dir.path().join(name);
            std::fs::write(&file, "@startuml\n@enduml\n").unwrap();
            expected.push(file.canonicalize().unwrap());
        }

        let candidates: Vec<String> = names
            .iter()
            .map(|n| dir.path().join(n).to_string_lossy().into_owned())
            .collect();
        let result = validate_files(candidates.iter().map(String::as_str));

        assert_eq!(result, expected);
        assert!(result.iter().all(|p| p.is_absolute()));
    }

    #[test]
    fn skips_blank_entries() {
        let result = validate_files(["", "  ", "\n"]);
        assert!(result.is_empty());
    }
}

//! Local discovery of candidate font files.
//!
//! [`scan_fonts`] walks a directory tree top-down, [`list_files`] reads a
//! single directory level. Both return paths in a deterministic order
//! (lexicographic per directory).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Recursively collect files whose name ends with one of `extensions`, ignoring case.
///
/// A missing or unreadable root yields an empty list. Unreadable subdirectories
/// are logged and skipped. Symlinked directories are not followed.
pub fn scan_fonts(root: &Path, extensions: &[String]) -> Vec<PathBuf> {
    let suffixes = normalise_extensions(extensions);
    info!(root = %root.display(), extensions = ?suffixes, "[SCAN] Scanning folder");

    let mut found = Vec::new();
    visit_dir(root, &suffixes, &mut found);

    info!(root = %root.display(), count = found.len(), "[SCAN] Found font files to process");
    found
}

fn visit_dir(dir: &Path, suffixes: &[String], results: &mut Vec<PathBuf>) {
    let entries = match sorted_entries(dir) {
        Ok(entries) => entries,
        Err(e) => {
            if e.kind() == io::ErrorKind::NotFound {
                debug!(path = %dir.display(), "[SCAN] Directory does not exist");
            } else {
                warn!(error = ?e, path = %dir.display(), "[SCAN] Skipping unreadable directory");
            }
            return;
        }
    };

    let mut subdirs = Vec::new();
    for entry in entries {
        let path = entry.path();
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if is_dir {
            subdirs.push(path);
        } else if path.is_file() && has_font_suffix(&path, suffixes) {
            debug!(path = %path.display(), "[SCAN] Matched font file");
            results.push(path);
        }
    }

    for subdir in subdirs {
        visit_dir(&subdir, suffixes, results);
    }
}

/// List the regular files directly inside `dir`, without any extension filter.
pub fn list_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let files: Vec<PathBuf> = sorted_entries(dir)?
        .into_iter()
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    debug!(path = %dir.display(), count = files.len(), "[SCAN] Listed files in directory");
    Ok(files)
}

fn sorted_entries(dir: &Path) -> io::Result<Vec<fs::DirEntry>> {
    let mut entries = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());
    Ok(entries)
}

/// Lowercase each extension and make sure it starts with a dot, so "ttf"
/// cannot match a name like "notttf".
fn normalise_extensions(extensions: &[String]) -> Vec<String> {
    extensions
        .iter()
        .map(|e| {
            let lower = e.trim().to_lowercase();
            if lower.starts_with('.') {
                lower
            } else {
                format!(".{lower}")
            }
        })
        .collect()
}

fn has_font_suffix(path: &Path, suffixes: &[String]) -> bool {
    let Some(name) = path.file_name() else {
        return false;
    };
    let name = name.to_string_lossy().to_lowercase();
    suffixes.iter().any(|s| name.ends_with(s.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_are_lowercased_and_dotted() {
        let exts = vec!["TTF".to_string(), ".WOFF2".to_string()];
        assert_eq!(normalise_extensions(&exts), vec![".ttf", ".woff2"]);
    }

    #[test]
    fn suffix_match_ignores_case() {
        let suffixes = normalise_extensions(&[".otf".to_string()]);
        assert!(has_font_suffix(Path::new("a/Roboto.OTF"), &suffixes));
        assert!(!has_font_suffix(Path::new("a/Roboto.otf.txt"), &suffixes));
    }
}

//! Recursive file discovery with deterministic ordering.
//!
//! Used to collect the CZI corpus for estimation and the candidate lists
//! shown by the interactive picker.

use std::fs;
use std::path::Path;
use std::path::PathBuf;

/// Extensions (lowercase, no dot) accepted as mosaic scans.
pub const CZI_EXTENSIONS: &[&str] = &["czi"];

/// Extensions accepted as bias-field images.
pub const TIFF_EXTENSIONS: &[&str] = &["tif", "tiff"];

/// All files under `root` (up to `max_depth` directories deep) whose
/// extension matches one of `extensions`, case-insensitively.
///
/// `.git`, `target` and `node_modules` are never entered.
pub fn find_files(root: &Path, extensions: &[&str], max_depth: usize) -> Vec<PathBuf> {
    let mut out = Vec::new();
    find_files_inner(root, extensions, 0, max_depth, &mut out);
    out.sort_by(|a, b| pretty_path(a).cmp(&pretty_path(b)));
    out
}

/// Every `.czi` file under `root`, at any depth.
pub fn find_czi_files(root: &Path) -> Vec<PathBuf> {
    find_files(root, CZI_EXTENSIONS, usize::MAX)
}

pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|want| ext.eq_ignore_ascii_case(want)))
        == Some(true)
}

fn find_files_inner(root: &Path, extensions: &[&str], depth: usize, max_depth: usize, out: &mut Vec<PathBuf>) {
    if depth > max_depth {
        return;
    }

    let Ok(entries) = fs::read_dir(root) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let file_type = match entry.file_type() {
            Ok(ft) => ft,
            Err(_) => continue,
        };

        if file_type.is_dir() {
            if should_skip_dir(&path) {
                continue;
            }
            find_files_inner(&path, extensions, depth + 1, max_depth, out);
            continue;
        }

        if file_type.is_file() && has_extension(&path, extensions) {
            out.push(path);
        }
    }
}

fn should_skip_dir(path: &Path) -> bool {
    let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("");
    matches!(name, ".git" | "target" | "node_modules")
}

/// Display form without a leading `./`.
pub fn pretty_path(path: &Path) -> String {
    let stripped = path.strip_prefix("./").unwrap_or(path);
    stripped.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn finds_czi_recursively_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("b/scan2.CZI"));
        touch(&root.join("a.czi"));
        touch(&root.join("b/deeper/scan3.czi"));
        touch(&root.join("notes.txt"));
        touch(&root.join(".git/objects/x.czi"));
        touch(&root.join("target/y.czi"));

        let found = find_czi_files(root);
        let names: Vec<PathBuf> = found
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("a.czi"),
                PathBuf::from("b/deeper/scan3.czi"),
                PathBuf::from("b/scan2.CZI"),
            ]
        );
    }

    #[test]
    fn depth_limit_is_honoured() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("top.tif"));
        touch(&dir.path().join("one/two/deep.tiff"));

        assert_eq!(find_files(dir.path(), TIFF_EXTENSIONS, 0).len(), 1);
        assert_eq!(find_files(dir.path(), TIFF_EXTENSIONS, 2).len(), 2);
    }

    #[test]
    fn missing_root_yields_nothing() {
        assert!(find_czi_files(Path::new("/no/such/folder")).is_empty());
    }
}

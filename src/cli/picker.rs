//! Interactive terminal prompts for paths that were not given on the command line.
//!
//! This is intentionally kept separate from clap parsing:
//! - clap handles structured flags/subcommands
//! - the picker provides the "run `ffc` and choose a file" UX
//!
//! Candidates are searched for under the current working directory.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use crate::error::AppError;
use crate::io::discover::{CZI_EXTENSIONS, TIFF_EXTENSIONS, find_files, has_extension, pretty_path};

/// Default directory recursion depth for finding candidate files.
const DEFAULT_SEARCH_DEPTH: usize = 4;

/// What kind of file a prompt is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Scan,
    BiasField,
}

impl FileKind {
    fn extensions(self) -> &'static [&'static str] {
        match self {
            FileKind::Scan => CZI_EXTENSIONS,
            FileKind::BiasField => TIFF_EXTENSIONS,
        }
    }

    fn label(self) -> &'static str {
        match self {
            FileKind::Scan => "CZI file",
            FileKind::BiasField => "flat field",
        }
    }

    fn nothing_selected(self) -> &'static str {
        match self {
            FileKind::Scan => "No CZI file selected.",
            FileKind::BiasField => "No flat field selected.",
        }
    }
}

/// Prompt the user to select a file of `kind` from the current directory tree.
///
/// Behavior:
/// - list discovered candidates
/// - accept either a number (from the list) or an explicit path
/// - `q` cancels
pub fn prompt_for_file(kind: FileKind) -> Result<PathBuf, AppError> {
    let files = find_files(Path::new("."), kind.extensions(), DEFAULT_SEARCH_DEPTH);
    let stdin = io::stdin();
    select_file(kind, &files, &mut stdin.lock())
}

fn select_file<R: BufRead>(kind: FileKind, files: &[PathBuf], input: &mut R) -> Result<PathBuf, AppError> {
    if files.is_empty() {
        println!("No {} candidates found below the current directory.", kind.label());
    } else {
        println!("Found {} {}(s):", files.len(), kind.label());
        for (idx, path) in files.iter().enumerate() {
            println!("{:>3}) {}", idx + 1, pretty_path(path));
        }
    }

    loop {
        if files.is_empty() {
            prompt(&format!("Type a {} path (q to quit): ", kind.label()))?;
        } else {
            prompt(&format!(
                "Select a {} by number (1-{}) or type a path (q to quit): ",
                kind.label(),
                files.len()
            ))?;
        }

        let Some(line) = read_line(input)? else {
            return Err(AppError::new(2, kind.nothing_selected()));
        };
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("q") {
            return Err(AppError::new(2, "Canceled."));
        }

        if let Ok(choice) = line.parse::<usize>() {
            if (1..=files.len()).contains(&choice) {
                return validate_file_path(&files[choice - 1], kind);
            }
            println!("Invalid choice: {choice}.");
            continue;
        }

        match validate_file_path(Path::new(&line), kind) {
            Ok(path) => return Ok(path),
            Err(err) => println!("{err}"),
        }
    }
}

/// Validate that `path` is an existing file with an extension accepted for `kind`.
pub fn validate_file_path(path: &Path, kind: FileKind) -> Result<PathBuf, AppError> {
    if !path.exists() {
        return Err(AppError::new(
            2,
            format!("File not found: {}", path.display()),
        ));
    }
    if path.is_dir() {
        return Err(AppError::new(
            2,
            format!("Expected a file, got a directory: {}", path.display()),
        ));
    }
    if !has_extension(path, kind.extensions()) {
        return Err(AppError::new(
            2,
            format!(
                "Expected a {} (.{}), got: {}",
                kind.label(),
                kind.extensions().join("/."),
                path.display()
            ),
        ));
    }

    Ok(path.to_path_buf())
}

/// Ask for the corpus folder; empty input selects the current directory.
pub fn prompt_for_folder() -> Result<PathBuf, AppError> {
    let stdin = io::stdin();
    select_folder(&mut stdin.lock())
}

fn select_folder<R: BufRead>(input: &mut R) -> Result<PathBuf, AppError> {
    loop {
        prompt("Folder containing CZI scans [.] (q to quit): ")?;
        let Some(line) = read_line(input)? else {
            return Err(AppError::new(2, "No folder selected."));
        };
        if line.eq_ignore_ascii_case("q") {
            return Err(AppError::new(2, "Canceled."));
        }

        let folder = if line.is_empty() { PathBuf::from(".") } else { PathBuf::from(line) };
        if folder.is_dir() {
            return Ok(folder);
        }
        println!("Not a folder: {}", folder.display());
    }
}

/// Ask where to save the bias field.
///
/// Empty input or end of input accepts `default`; `q` returns `None` (save canceled).
pub fn prompt_for_save_path(default: &Path) -> Result<Option<PathBuf>, AppError> {
    let stdin = io::stdin();
    select_save_path(default, &mut stdin.lock())
}

fn select_save_path<R: BufRead>(default: &Path, input: &mut R) -> Result<Option<PathBuf>, AppError> {
    prompt(&format!("Save flat field as [{}] (q to skip): ", pretty_path(default)))?;
    let Some(line) = read_line(input)? else {
        return Ok(Some(default.to_path_buf()));
    };
    if line.eq_ignore_ascii_case("q") {
        return Ok(None);
    }
    if line.is_empty() {
        return Ok(Some(default.to_path_buf()));
    }
    Ok(Some(PathBuf::from(line)))
}

fn prompt(text: &str) -> Result<(), AppError> {
    print!("{text}");
    io::stdout()
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to write prompt: {e}")))
}

/// One trimmed line, or `None` at end of input.
fn read_line<R: BufRead>(input: &mut R) -> Result<Option<String>, AppError> {
    let mut line = String::new();
    let bytes = input
        .read_line(&mut line)
        .map_err(|e| AppError::new(2, format!("Failed to read input: {e}")))?;
    if bytes == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn numbered_choice_selects_listed_file() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.czi");
        let b = dir.path().join("b.czi");
        std::fs::write(&a, b"").unwrap();
        std::fs::write(&b, b"").unwrap();

        let picked = select_file(FileKind::Scan, &[a, b.clone()], &mut Cursor::new("7\n2\n")).unwrap();
        assert_eq!(picked, b);
    }

    #[test]
    fn typed_path_must_have_the_right_extension() {
        let dir = tempfile::tempdir().unwrap();
        let wrong = dir.path().join("field.png");
        let right = dir.path().join("field.ome.tiff");
        std::fs::write(&wrong, b"").unwrap();
        std::fs::write(&right, b"").unwrap();

        let input = format!("{}\n{}\n", wrong.display(), right.display());
        let picked = select_file(FileKind::BiasField, &[], &mut Cursor::new(input)).unwrap();
        assert_eq!(picked, right);
    }

    #[test]
    fn quit_and_end_of_input_are_reported() {
        let err = select_file(FileKind::Scan, &[], &mut Cursor::new("q\n")).unwrap_err();
        assert_eq!(err.to_string(), "Canceled.");
        let err = select_file(FileKind::BiasField, &[], &mut Cursor::new("")).unwrap_err();
        assert_eq!(err.to_string(), "No flat field selected.");
        let err = select_folder(&mut Cursor::new("")).unwrap_err();
        assert_eq!(err.to_string(), "No folder selected.");
        let err = select_folder(&mut Cursor::new("q\n")).unwrap_err();
        assert_eq!(err.to_string(), "Canceled.");
    }

    #[test]
    fn empty_folder_answer_means_current_directory() {
        assert_eq!(select_folder(&mut Cursor::new("\n")).unwrap(), PathBuf::from("."));
    }

    #[test]
    fn save_prompt_defaults_and_cancels() {
        let default = Path::new("scans/flatfield.ome.tiff");
        assert_eq!(
            select_save_path(default, &mut Cursor::new("\n")).unwrap(),
            Some(default.to_path_buf())
        );
        assert_eq!(
            select_save_path(default, &mut Cursor::new("out.tiff\n")).unwrap(),
            Some(PathBuf::from("out.tiff"))
        );
        assert_eq!(select_save_path(default, &mut Cursor::new("q\n")).unwrap(), None);
        assert_eq!(
            select_save_path(default, &mut Cursor::new("")).unwrap(),
            Some(default.to_path_buf())
        );
    }
}

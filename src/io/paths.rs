//! Output path construction.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// File name of an estimated bias field when the user accepts the default.
pub const DEFAULT_BIAS_FIELD_NAME: &str = "flatfield.ome.tiff";

const CORRECTED_SUFFIX: &str = "_flatfield_corrected.ome.tiff";
const PREVIEW_SUFFIX: &str = "_preview.jpg";

/// `<scan without last extension>_flatfield_corrected.ome.tiff`
pub fn corrected_output_path(scan: &Path) -> PathBuf {
    replace_extension_with_suffix(scan, CORRECTED_SUFFIX)
}

/// `<scan without last extension>_preview.jpg`
pub fn preview_output_path(scan: &Path) -> PathBuf {
    replace_extension_with_suffix(scan, PREVIEW_SUFFIX)
}

pub fn default_bias_field_path(folder: &Path) -> PathBuf {
    folder.join(DEFAULT_BIAS_FIELD_NAME)
}

fn replace_extension_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut base: OsString = path.with_extension("").into_os_string();
    base.push(suffix);
    PathBuf::from(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outputs_sit_next_to_the_scan() {
        let scan = Path::new("/data/run 1/slide.v2.czi");
        assert_eq!(
            corrected_output_path(scan),
            PathBuf::from("/data/run 1/slide.v2_flatfield_corrected.ome.tiff")
        );
        assert_eq!(preview_output_path(scan), PathBuf::from("/data/run 1/slide.v2_preview.jpg"));
    }

    #[test]
    fn scan_without_extension_keeps_its_name() {
        assert_eq!(preview_output_path(Path::new("slide")), PathBuf::from("slide_preview.jpg"));
    }

    #[test]
    fn default_field_lands_in_the_corpus_folder() {
        assert_eq!(
            default_bias_field_path(Path::new("corpus")),
            PathBuf::from("corpus/flatfield.ome.tiff")
        );
    }
}

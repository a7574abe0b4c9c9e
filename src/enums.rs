use std::path::Path;

/// What to do when the label map and the brain mask live in different spaces.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GeometryPolicy {
    /// Abort with a geometry mismatch error.
    #[default]
    Strict,
    /// Log a warning and keep going with the mismatched mask.
    Warn,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageFormat {
    Nifti,
    Nrrd,
}

impl ImageFormat {
    /// Guess the format from the file name, looking through a trailing `.gz`.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        let name = name.strip_suffix(".gz").unwrap_or(&name);
        let ext = Path::new(name).extension()?.to_str()?;
        match ext {
            "nii" | "hdr" => Some(ImageFormat::Nifti),
            "nrrd" | "nhdr" => Some(ImageFormat::Nrrd),
            _ => None,
        }
    }
}

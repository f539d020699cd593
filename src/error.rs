use thiserror::Error;

/// Everything an editor operation can report.
///
/// `InvalidSelection`, `EmptyCropRegion` and `UnsupportedColorMode` are
/// ordinary outcomes of interactive use: callers are expected to drop them
/// (see [`EditorError::is_silent`]). Persistence and merge errors must reach
/// the user.
#[derive(Error, Debug)]
pub enum EditorError {
    #[error("no object is selected")]
    InvalidSelection,

    #[error("crop rectangle does not intersect the selected object")]
    EmptyCropRegion,

    #[error("decode error: {0}")]
    Decode(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot merge: {0}")]
    MergeInput(String),

    #[error("unsupported color mode '{0}'")]
    UnsupportedColorMode(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

impl EditorError {
    /// True for the kinds that are expected no-ops rather than failures.
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            EditorError::InvalidSelection
                | EditorError::EmptyCropRegion
                | EditorError::UnsupportedColorMode(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, EditorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_kinds() {
        assert!(EditorError::InvalidSelection.is_silent());
        assert!(EditorError::EmptyCropRegion.is_silent());
        assert!(EditorError::UnsupportedColorMode("XYZ".into()).is_silent());
        assert!(!EditorError::Decode("truncated".into()).is_silent());
        assert!(!EditorError::MergeInput("need two".into()).is_silent());
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: EditorError = io.into();
        assert!(matches!(err, EditorError::Io(_)));
        assert!(err.to_string().contains("gone"));
    }
}

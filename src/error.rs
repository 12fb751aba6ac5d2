use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Classifies every condition the engine and the save path can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Absolute file path could not be calculated, or the calculated path is
    /// a directory where a file was expected.
    CouldNotCalculateAbsoluteFilePath,

    /// File does not exist.
    FileDoesNotExist,

    /// File exists but failed to load.
    FileFailedToLoad,

    /// A file referenced in an include placeholder failed to load. Wraps the
    /// specific load error, which is reported separately.
    FailedToLoadReferencedFile,

    /// Template file path is the same as the path the generated file would be
    /// saved to.
    TemplateFilePathIsTheSameAsGeneratedFilePath,

    /// An include placeholder references the template file it appears in.
    TemplateFileReferencesItself,

    /// An include placeholder closes a reference cycle. The message lists the
    /// full chain of references.
    CircularReferences,

    /// Failed to write the generated file.
    FailedToSaveFileGeneratedFromTemplate,

    /// Template file has an opening include tag but no closing tag after it.
    ClosingTagMissing,

    /// The previously generated file was changed outside this tool since the
    /// last generation, so saving over it was refused.
    FileGeneratedFromTemplateWasModifiedAfterLastGeneration,

    /// The generated file was saved, but the generation marker beside it was
    /// not. Not critical: the generated content is already on disk.
    FailedToSaveFileGenerationData,
}

/// A single reported condition. The engine accumulates these instead of
/// returning early, so one bad reference never hides the rest of the run.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ErrorRecord {
    /// What went wrong.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Underlying I/O fault, when one triggered the condition.
    #[source]
    pub source: Option<io::Error>,
    /// File in which the condition was detected.
    pub file: PathBuf,
    /// Byte offset into the raw (unexpanded) text of `file`. `None` when the
    /// file itself could not be loaded.
    pub position: Option<usize>,
}

impl ErrorRecord {
    pub fn new(code: ErrorCode, message: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
            file: file.into(),
            position: None,
        }
    }

    /// Builds a record from an I/O fault, using the fault's own message.
    pub fn from_io(code: ErrorCode, source: io::Error, file: impl Into<PathBuf>) -> Self {
        Self {
            code,
            message: source.to_string(),
            source: Some(source),
            file: file.into(),
            position: None,
        }
    }

    /// Attaches the byte offset at which the condition was detected.
    #[must_use]
    pub fn at(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }

    pub fn file(&self) -> &Path {
        &self.file
    }
}

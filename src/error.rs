//src/error.rs

use thiserror::Error;

/// Errors surfaced by the serotyping pipeline.
///
/// Structural format errors indicate an upstream contract violation and abort
/// the run. Absence of evidence for a genome is never an error; it is encoded
/// in the prediction record's info fields.
#[derive(Debug, Error)]
pub enum SerotypeError {
    /// A hit line did not carry the expected 9 parseable fields.
    #[error("malformed alignment record at line {line_number}: {line:?}")]
    MalformedAlignmentRecord { line_number: usize, line: String },

    /// The allele catalog did not match the expected nested-mapping shape.
    #[error("malformed allele catalog: {0}")]
    MalformedCatalog(#[from] serde_json::Error),

    /// A subject identifier lacked the pipe-delimited genome-name field.
    #[error("malformed subject id (no genome-name field): {subject_id:?}")]
    MalformedSubjectId { subject_id: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

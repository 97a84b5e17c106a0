//! Error types for the hermes-common crate.
//!
//! Everything in here is a construction error: it surfaces while loading records or
//! templates, before any dispatch has begun, except for
//! [`TemplateError::MissingVariable`] which is raised per recipient at render time.

use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors raised while loading or writing sender/recipient records.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The record file could not be opened.
    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The CSV data was malformed or did not match the record shape.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// An address did not parse as a single mailbox.
    #[error("Invalid address '{0}'")]
    InvalidAddress(String),

    /// A `variables` entry was not of the form `KEY=VALUE`.
    #[error("KEY=VALUE pair '{0}' is of invalid format")]
    InvalidVariable(String),

    /// A record parsed but failed validation.
    #[error("Record {index}: {source}")]
    InvalidRecord {
        index: usize,
        #[source]
        source: Box<RecordError>,
    },

    /// Writing records failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors raised while parsing or rendering message templates.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// A `{{` without a matching `}}`.
    #[error("Template '{template}' has an unclosed placeholder at byte {offset}")]
    Unclosed { template: String, offset: usize },

    /// A placeholder whose name is empty or contains illegal characters.
    #[error("Template '{template}' has an invalid placeholder '{placeholder}'")]
    InvalidPlaceholder {
        template: String,
        placeholder: String,
    },

    /// A recipient's variables did not supply a name the template references.
    #[error("Template '{template}' references missing variable '{variable}'")]
    MissingVariable { template: String, variable: String },

    /// Neither a text nor an HTML body template was supplied.
    #[error("At least one of the text or HTML body templates is required")]
    NoBody,

    /// The template file could not be read.
    #[error("Failed to read template {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl TemplateError {
    /// Returns `true` for errors that depend on a recipient's data rather than on the
    /// template itself.
    #[must_use]
    pub const fn is_render_error(&self) -> bool {
        matches!(self, Self::MissingVariable { .. })
    }
}

use std::{fs::File, path::PathBuf};

use hermes_common::{Recipient, RecordError, internal, write_records};

use crate::error::PersistError;

/// The failed-recipient output file.
///
/// Written in the recipient record shape so it can be used as the next run's input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureLog {
    path: PathBuf,
}

impl FailureLog {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Writes `recipients`, replacing any previous file. Nothing is written when
    /// there are none.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistError`] if the file cannot be created or written.
    pub fn persist<'a>(
        &self,
        recipients: impl IntoIterator<Item = &'a Recipient>,
    ) -> Result<usize, PersistError> {
        let recipients: Vec<&Recipient> = recipients.into_iter().collect();
        if recipients.is_empty() {
            return Ok(0);
        }

        let wrap = |source: RecordError| PersistError {
            path: self.path.clone(),
            source,
        };

        let file = File::create(&self.path).map_err(|e| {
            wrap(RecordError::Open {
                path: self.path.clone(),
                source: e,
            })
        })?;
        write_records(file, recipients.iter().copied()).map_err(wrap)?;

        internal!(
            level = INFO,
            "Wrote {} failed recipients to {}",
            recipients.len(),
            self.path.display()
        );
        Ok(recipients.len())
    }
}

//! Loading sender and recipient records from CSV, and writing recipient records back.
//!
//! Files carry a header row. Fields are trimmed; a missing optional column (`name`,
//! `cc`, `bcc`, `variables`) is treated as empty.

use std::{fs::File, io, path::Path};

use serde::{Serialize, de::DeserializeOwned};

use crate::{error::RecordError, recipient::Recipient, sender::SenderIdentity, tracing};

/// Deserializes every row of `reader`.
///
/// # Errors
///
/// Returns [`RecordError::Csv`] for the first row that fails to parse.
pub fn parse_records<T, R>(reader: R) -> Result<Vec<T>, RecordError>
where
    T: DeserializeOwned,
    R: io::Read,
{
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader)
        .deserialize::<T>()
        .map(|row| row.map_err(RecordError::from))
        .collect()
}

/// Opens `path` and deserializes every row.
///
/// # Errors
///
/// Returns [`RecordError::Open`] if the file cannot be opened, otherwise as
/// [`parse_records`].
pub fn read_records<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>, RecordError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| RecordError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::debug!(file = %path.display(), "reading csv file");
    parse_records(file)
}

/// Writes `records` with a header row.
///
/// # Errors
///
/// Returns an error if serialization or the underlying writer fails.
pub fn write_records<'a, T, W, I>(writer: W, records: I) -> Result<(), RecordError>
where
    T: Serialize + 'a,
    W: io::Write,
    I: IntoIterator<Item = &'a T>,
{
    let mut writer = csv::Writer::from_writer(writer);
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

fn validated<T>(
    records: Vec<T>,
    validate: impl Fn(&T) -> Result<(), RecordError>,
) -> Result<Vec<T>, RecordError> {
    for (index, record) in records.iter().enumerate() {
        validate(record).map_err(|source| RecordError::InvalidRecord {
            index,
            source: Box::new(source),
        })?;
    }
    Ok(records)
}

/// Loads and validates the senders file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, a row fails to parse, or an address
/// is not a valid mailbox.
pub fn load_senders(path: impl AsRef<Path>) -> Result<Vec<SenderIdentity>, RecordError> {
    validated(read_records(path)?, SenderIdentity::validate)
}

/// Loads and validates the recipients file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, a row fails to parse (including
/// malformed `variables`), or any address is not a valid mailbox.
pub fn load_recipients(path: impl AsRef<Path>) -> Result<Vec<Recipient>, RecordError> {
    validated(read_records(path)?, Recipient::validate)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::variables::Variables;

    const RECEIVERS: &str = "\
email,cc,bcc,variables
john@example.com,,,name=John
sarah@example.com,tom@example.com,mark@example.com;emma@example.com,name=Sarah;location=Paris
";

    #[test]
    fn test_parse_recipients() {
        let recipients: Vec<Recipient> = parse_records(RECEIVERS.as_bytes()).unwrap();
        assert_eq!(recipients.len(), 2);

        let expected = Recipient::new("sarah@example.com")
            .with_cc("tom@example.com".parse().unwrap())
            .with_bcc("mark@example.com;emma@example.com".parse().unwrap())
            .with_variables(
                [("name", "Sarah"), ("location", "Paris")]
                    .into_iter()
                    .collect::<Variables>(),
            );
        assert_eq!(recipients[1], expected);
        assert!(recipients[0].cc.is_empty());
    }

    #[test]
    fn test_missing_optional_columns() {
        let recipients: Vec<Recipient> =
            parse_records("email\nsolo@example.com\n".as_bytes()).unwrap();
        assert_eq!(recipients, vec![Recipient::new("solo@example.com")]);

        let senders: Vec<SenderIdentity> =
            parse_records("email,password\nemma@example.com,pw\n".as_bytes()).unwrap();
        assert_eq!(senders[0].name, None);
    }

    #[test]
    fn test_empty_name_is_none() {
        let senders: Vec<SenderIdentity> =
            parse_records("email,password,name\nemma@example.com,pw,\n".as_bytes()).unwrap();
        assert_eq!(senders[0].name, None);
    }

    #[test]
    fn test_bad_variables_fail_to_parse() {
        let result: Result<Vec<Recipient>, _> =
            parse_records("email,cc,bcc,variables\na@example.com,,,novalue\n".as_bytes());
        assert!(result.is_err());
    }

    #[test]
    fn test_write_then_read_preserves_shape() {
        let recipients: Vec<Recipient> = parse_records(RECEIVERS.as_bytes()).unwrap();

        let mut out = Vec::new();
        write_records(&mut out, &recipients).unwrap();

        let written = String::from_utf8(out).unwrap();
        assert!(written.starts_with("email,cc,bcc,variables\n"));

        let reread: Vec<Recipient> = parse_records(written.as_bytes()).unwrap();
        assert_eq!(reread, recipients);
    }
}

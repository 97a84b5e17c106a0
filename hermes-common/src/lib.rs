pub mod address;
pub mod error;
pub mod logging;
pub mod recipient;
pub mod records;
pub mod sender;
pub mod template;
pub mod variables;

pub use address::{AddressList, validate_address};
pub use error::{RecordError, TemplateError};
pub use recipient::Recipient;
pub use records::{load_recipients, load_senders, read_records, write_records};
pub use sender::SenderIdentity;
pub use template::{MessageTemplates, RenderedContent, Template};
pub use tracing;
pub use variables::Variables;

//! SMTP reply parsing.

use super::error::{ClientError, Result};

/// A single line of an SMTP reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseLine {
    pub code: u16,
    /// `false` for `250-` continuation lines.
    pub is_last: bool,
    pub message: String,
}

/// A complete, possibly multi-line, SMTP reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub code: u16,
    pub lines: Vec<String>,
}

impl Response {
    #[must_use]
    pub const fn new(code: u16, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    /// Returns the complete message as a single string with lines joined by newlines.
    #[must_use]
    pub fn message(&self) -> String {
        self.lines.join("\n")
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code >= 200 && self.code < 300
    }

    /// `3xx`: the server wants more input (DATA content, an AUTH answer).
    #[must_use]
    pub const fn is_intermediate(&self) -> bool {
        self.code >= 300 && self.code < 400
    }

    #[must_use]
    pub const fn is_temporary_error(&self) -> bool {
        self.code >= 400 && self.code < 500
    }

    #[must_use]
    pub const fn is_permanent_error(&self) -> bool {
        self.code >= 500 && self.code < 600
    }

    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.is_temporary_error() || self.is_permanent_error()
    }

    /// Whether an EHLO reply advertises `keyword` (case-insensitive, first word of a
    /// line).
    #[must_use]
    pub fn has_extension(&self, keyword: &str) -> bool {
        self.extension(keyword).is_some()
    }

    /// The parameters an EHLO reply lists for `keyword`, e.g. the mechanisms of `AUTH`.
    #[must_use]
    pub fn extension(&self, keyword: &str) -> Option<Vec<&str>> {
        self.lines.iter().find_map(|line| {
            let mut words = line.split_whitespace();
            words
                .next()
                .filter(|first| first.eq_ignore_ascii_case(keyword))
                .map(|_| words.collect())
        })
    }

    /// Parses a single response line.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::ParseError` if the line doesn't match SMTP format.
    pub fn parse_line(line: &str) -> Result<ResponseLine> {
        let Some(code_str) = line.get(..3) else {
            return Err(ClientError::ParseError(format!(
                "Response line too short: '{line}'"
            )));
        };

        let code = code_str
            .parse::<u16>()
            .map_err(|_| ClientError::ParseError(format!("Invalid status code: '{code_str}'")))?;

        let is_last = match line[3..].chars().next() {
            None | Some(' ') => true,
            Some('-') => false,
            Some(c) => {
                return Err(ClientError::ParseError(format!(
                    "Invalid separator character: '{c}'"
                )));
            }
        };

        let message = line.get(4..).unwrap_or_default().to_string();

        Ok(ResponseLine {
            code,
            is_last,
            message,
        })
    }

    /// Parses a complete multi-line SMTP response from a buffer.
    ///
    /// Returns the parsed `Response` and the number of bytes consumed, or `None` when
    /// the buffer does not yet hold a complete reply.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::ParseError` if the response is malformed.
    pub fn parse_response(buffer: &[u8]) -> Result<Option<(Self, usize)>> {
        let text = match std::str::from_utf8(buffer) {
            Ok(text) => text,
            // A read may end partway through a multi-byte character.
            Err(e) if e.error_len().is_none() => std::str::from_utf8(&buffer[..e.valid_up_to()])?,
            Err(e) => return Err(e.into()),
        };
        let mut lines = Vec::new();
        let mut consumed = 0;
        let mut first_code = None;

        while let Some(end) = text[consumed..].find('\n') {
            let raw = &text[consumed..consumed + end];
            consumed += end + 1;

            let line = raw.strip_suffix('\r').unwrap_or(raw);
            if line.is_empty() {
                continue;
            }

            let parsed = Self::parse_line(line)?;
            match first_code {
                Some(code) if code != parsed.code => {
                    return Err(ClientError::ParseError(format!(
                        "Status code mismatch in multi-line response: expected {code}, got {}",
                        parsed.code
                    )));
                }
                Some(_) => {}
                None => first_code = Some(parsed.code),
            }

            lines.push(parsed.message);

            if parsed.is_last {
                return Ok(first_code.map(|code| (Self::new(code, lines), consumed)));
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_line() {
        let line = ResponseLine {
            code: 220,
            is_last: true,
            message: "mail.example.com ESMTP".to_string(),
        };
        assert_eq!(
            Response::parse_line("220 mail.example.com ESMTP").unwrap(),
            line
        );
    }

    #[test]
    fn test_parse_bare_code() {
        let line = Response::parse_line("334").unwrap();
        assert_eq!(line.code, 334);
        assert!(line.is_last);
        assert!(line.message.is_empty());
    }

    #[test]
    fn test_parse_multi_line_response() {
        let data = b"250-mail.example.com\r\n250-AUTH PLAIN LOGIN CRAM-MD5\r\n250 STARTTLS\r\n";
        let (response, consumed) = Response::parse_response(data).unwrap().unwrap();
        assert_eq!(response.code, 250);
        assert_eq!(consumed, data.len());
        assert!(response.has_extension("starttls"));
        assert_eq!(
            response.extension("AUTH").unwrap(),
            vec!["PLAIN", "LOGIN", "CRAM-MD5"]
        );
        assert!(!response.has_extension("PIPELINING"));
    }

    #[test]
    fn test_parse_leaves_trailing_bytes() {
        let data = b"250 OK\r\n354 go";
        let (response, consumed) = Response::parse_response(data).unwrap().unwrap();
        assert_eq!(response.lines, vec!["OK"]);
        assert_eq!(consumed, 8);
    }

    #[test]
    fn test_parse_incomplete_response() {
        let data = b"250-mail.example.com\r\n250-SIZE";
        assert!(Response::parse_response(data).unwrap().is_none());
    }

    #[test]
    fn test_code_mismatch() {
        let data = b"250-one\r\n251 two\r\n";
        assert!(Response::parse_response(data).is_err());
    }

    #[test]
    fn test_classification() {
        assert!(Response::new(235, vec![]).is_success());
        assert!(Response::new(334, vec![]).is_intermediate());
        assert!(Response::new(451, vec![]).is_temporary_error());
        let rejected = Response::new(550, vec!["Error".to_string()]);
        assert!(rejected.is_permanent_error());
        assert!(rejected.is_error());
        assert!(!rejected.is_success());
    }
}

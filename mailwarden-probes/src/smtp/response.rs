//! SMTP response parsing: multi-line dash/space continuation per RFC 5321.

use mailwarden_resilience::Cause;

#[derive(Debug, Clone, PartialEq, Eq)]
struct ResponseLine {
    code: u16,
    is_last: bool,
    message: String,
}

/// A complete (possibly multi-line) SMTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub code: u16,
    pub lines: Vec<String>,
}

impl Response {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code >= 200 && self.code < 300
    }

    #[must_use]
    pub const fn is_temporary_error(&self) -> bool {
        self.code >= 400 && self.code < 500
    }

    #[must_use]
    pub const fn is_permanent_error(&self) -> bool {
        self.code >= 500 && self.code < 600
    }

    /// Whether an EHLO response line advertises `extension` (e.g. `"STARTTLS"`),
    /// matching only the extension keyword itself, not its parameters.
    #[must_use]
    pub fn advertises_extension(&self, extension: &str) -> bool {
        self.lines
            .iter()
            .any(|line| line.split_whitespace().next().is_some_and(|kw| kw.eq_ignore_ascii_case(extension)))
    }

    fn parse_line(line: &str) -> Result<ResponseLine, Cause> {
        if line.len() < 3 {
            return Err(Cause::Network(format!("response line too short: '{line}'")));
        }

        let code = line[..3]
            .parse::<u16>()
            .map_err(|_| Cause::Network(format!("invalid status code: '{}'", &line[..3])))?;

        let is_last = match line.as_bytes().get(3) {
            Some(b' ') | None => true,
            Some(b'-') => false,
            Some(&c) => {
                return Err(Cause::Network(format!(
                    "invalid SMTP continuation character: '{}'",
                    c as char
                )))
            }
        };

        let message = line.get(4..).unwrap_or_default().to_string();

        Ok(ResponseLine {
            code,
            is_last,
            message,
        })
    }

    /// Parses a complete response out of `buffer`, returning the response and
    /// the number of bytes consumed, or `None` if more data is needed.
    pub fn parse_response(buffer: &[u8]) -> Result<Option<(Self, usize)>, Cause> {
        let text = std::str::from_utf8(buffer)
            .map_err(|e| Cause::Network(format!("invalid UTF-8 in SMTP response: {e}")))?;

        let mut lines = Vec::new();
        let mut consumed = 0;
        let mut first_code = None;

        for line in text.lines() {
            if !text[consumed..].starts_with(line) {
                break;
            }
            let mut next = consumed + line.len();
            if text[next..].starts_with("\r\n") {
                next += 2;
            } else if text[next..].starts_with('\n') {
                next += 1;
            } else {
                break;
            }

            if !line.is_empty() {
                let parsed = Self::parse_line(line)?;
                if let Some(code) = first_code {
                    if parsed.code != code {
                        return Err(Cause::Network(format!(
                            "status code mismatch in multi-line response: expected {code}, got {}",
                            parsed.code
                        )));
                    }
                } else {
                    first_code = Some(parsed.code);
                }
                let is_last = parsed.is_last;
                lines.push(parsed.message);
                consumed = next;
                if is_last {
                    return Ok(first_code.map(|code| (Self { code, lines }, consumed)));
                }
            } else {
                consumed = next;
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_line_response() {
        let (response, consumed) = Response::parse_response(b"220 mail.example.com ESMTP\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(response.code, 220);
        assert_eq!(response.lines, vec!["mail.example.com ESMTP"]);
        assert_eq!(consumed, 29);
    }

    #[test]
    fn test_parse_multi_line_response() {
        let data = b"250-mail.example.com\r\n250-SIZE 10000000\r\n250 HELP\r\n";
        let (response, _) = Response::parse_response(data).unwrap().unwrap();
        assert_eq!(response.code, 250);
        assert_eq!(
            response.lines,
            vec!["mail.example.com", "SIZE 10000000", "HELP"]
        );
    }

    #[test]
    fn test_incomplete_response_returns_none() {
        let data = b"250-mail.example.com\r\n250-SIZE";
        assert!(Response::parse_response(data).unwrap().is_none());
    }

    #[test]
    fn test_mismatched_code_is_rejected() {
        let data = b"250-one\r\n251 two\r\n";
        assert!(Response::parse_response(data).is_err());
    }

    #[test]
    fn test_status_classification() {
        let ok = Response {
            code: 250,
            lines: vec!["OK".into()],
        };
        assert!(ok.is_success());

        let rejected = Response {
            code: 535,
            lines: vec!["Authentication failed".into()],
        };
        assert!(rejected.is_permanent_error());
    }

    #[test]
    fn test_advertises_extension_matches_keyword_only() {
        let ehlo = Response {
            code: 250,
            lines: vec![
                "mail.example.com".into(),
                "STARTTLS".into(),
                "SIZE 35882577".into(),
            ],
        };
        assert!(ehlo.advertises_extension("STARTTLS"));
        assert!(ehlo.advertises_extension("starttls"));
        assert!(ehlo.advertises_extension("SIZE"));
        assert!(!ehlo.advertises_extension("AUTH"));
    }
}

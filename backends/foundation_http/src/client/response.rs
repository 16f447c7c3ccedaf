use crate::errors::HttpClientError;

/// Parses `HTTP/<version> <status> <reason...>`.
///
/// Returns the status code; the reason phrase is free text and ignored.
///
/// # Errors
///
/// `HttpClientError::MalformedStatusLine` if the line does not start with
/// `HTTP/` or the status is not an unsigned number that fits in `u32`.
/// Codes outside the registered 1xx-5xx range are passed through.
pub fn parse_status_line(line: &[u8]) -> Result<u32, HttpClientError> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim_end_matches(['\r', '\n']);
    let malformed = || HttpClientError::MalformedStatusLine(text.to_string());

    let mut parts = text.split_whitespace();
    let version = parts.next().ok_or_else(malformed)?;
    if !version.starts_with("HTTP/") {
        return Err(malformed());
    }

    parts
        .next()
        .and_then(|status| status.parse::<u32>().ok())
        .ok_or_else(malformed)
}

/// Splits a header block into `(name, value)` pairs.
///
/// For each line with a colon, the text before the first colon is the name
/// and the rest is the value, both trimmed. Lines without a colon, including
/// the terminating blank line, are skipped. Names keep their case.
#[must_use]
pub fn parse_header_block(block: &[u8]) -> Vec<(String, String)> {
    String::from_utf8_lossy(block)
        .split("\r\n")
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .collect()
}

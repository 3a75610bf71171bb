//! Line-oriented text records shared by the calibration families

use std::io::{BufRead, ErrorKind, Lines};

use crate::error::CalibrationError;

/// Reads a record line by line, tracking 1-based line numbers for errors
pub(crate) struct RecordReader<R> {
    lines: Lines<R>,
    line_number: usize,
}

impl<R: BufRead> RecordReader<R> {
    pub(crate) fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_number: 0,
        }
    }

    /// Next line of the record
    ///
    /// A record that ends early or holds bytes that are not UTF-8 is
    /// malformed; a failing reader is an I/O error.
    pub(crate) fn next_line(&mut self, expected: &str) -> Result<(usize, String), CalibrationError> {
        self.line_number += 1;
        match self.lines.next() {
            Some(Ok(line)) => Ok((self.line_number, line)),
            Some(Err(err)) if err.kind() == ErrorKind::InvalidData => Err(CalibrationError::malformed(
                self.line_number,
                format!("invalid UTF-8 where {expected} was expected"),
            )),
            Some(Err(err)) => Err(err.into()),
            None => Err(CalibrationError::malformed(
                self.line_number,
                format!("record ended, expected {expected}"),
            )),
        }
    }
}

/// Every whitespace-separated token of `line` that parses as a real
///
/// Tokens that do not parse are skipped rather than rejected.
pub(crate) fn numeric_tokens(line: &str) -> Vec<f64> {
    line.split_whitespace()
        .filter_map(|token| token.parse::<f64>().ok())
        .collect()
}

/// Parse one required token, naming the field on failure
pub(crate) fn parse_field<T: std::str::FromStr>(
    token: Option<&str>,
    field: &str,
    line: usize,
) -> Result<T, CalibrationError> {
    let token = token.ok_or_else(|| CalibrationError::malformed(line, format!("missing {field}")))?;
    token
        .parse()
        .map_err(|_| CalibrationError::malformed(line, format!("invalid {field} '{token}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_tokens_skip_garbage() {
        assert_eq!(numeric_tokens(" 1 2.5 abc -3e2 "), vec![1.0, 2.5, -300.0]);
        assert!(numeric_tokens("").is_empty());
    }

    #[test]
    fn test_reader_reports_missing_line() {
        let mut reader = RecordReader::new("first\n".as_bytes());
        assert_eq!(reader.next_line("a header").unwrap(), (1, "first".to_string()));
        match reader.next_line("coefficients") {
            Err(CalibrationError::MalformedRecord { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_reader_reports_invalid_utf8_as_malformed() {
        let mut reader = RecordReader::new(&b"0 0 0\n1 0 \xff\xfe\n"[..]);
        reader.next_line("a header").unwrap();
        match reader.next_line("coefficients") {
            Err(CalibrationError::MalformedRecord { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_parse_field() {
        assert_eq!(parse_field::<usize>(Some("3"), "order", 1).unwrap(), 3);
        assert!(parse_field::<usize>(Some("-1"), "order", 1).is_err());
        assert!(parse_field::<f64>(None, "temperature", 1).is_err());
    }
}

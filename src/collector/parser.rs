//! Parsers for HAProxy admin socket responses.
//!
//! Both parsers are pure functions over the raw response bytes so they can be
//! tested with literal inputs. Anomalies that do not abort parsing are
//! reported through the `Observer` instead of being returned.
//!
//! Text is decoded lossily: HAProxy echoes server check output into free-text
//! columns, and a stray non-UTF-8 byte there must not cost the numeric fields
//! around it.

use crate::observer::{Observation, Observer};

/// Longest accepted `show info` line.
const MAX_INFO_LINE: usize = 64 * 1024;

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The response contained no header row.
    Empty,
    /// A quoted CSV field was still open at end of input.
    UnterminatedQuote { offset: usize },
    /// A `show info` line exceeded the accepted length.
    LineTooLong { offset: usize, limit: usize },
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Empty => write!(f, "empty response"),
            ParseError::UnterminatedQuote { offset } => {
                write!(f, "unterminated quoted field in record at byte {}", offset)
            }
            ParseError::LineTooLong { offset, limit } => {
                write!(f, "line at byte {} longer than {} bytes", offset, limit)
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// One reported field, before classification.
///
/// `proxy` and `service` are empty for `show info` fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldRecord {
    pub key: String,
    pub proxy: String,
    pub service: String,
    pub raw_value: String,
}

/// Parses a `show info` response.
///
/// Format: one `Key: value` pair per line.
/// ```text
/// Name: HAProxy
/// Maxconn: 2000
/// Uptime_sec: 1234
/// ```
/// Lines without a colon, or with nothing after it, are skipped. Keys are
/// trimmed and lowercased, values are trimmed. An overlong line stops
/// parsing; fields parsed before it are still returned.
pub fn parse_info(raw: &[u8], observer: &dyn Observer) -> Vec<FieldRecord> {
    let mut records = Vec::new();

    for (idx, line) in raw.split(|&b| b == b'\n').enumerate() {
        if line.len() > MAX_INFO_LINE {
            let error = ParseError::LineTooLong {
                offset: line_offset(raw, line),
                limit: MAX_INFO_LINE,
            };
            observer.observe(&Observation::InfoLineDecode {
                line: idx + 1,
                error: &error,
            });
            break;
        }

        let Some(colon) = line.iter().position(|&b| b == b':') else {
            continue;
        };
        if colon + 1 >= line.len() {
            continue;
        }

        records.push(FieldRecord {
            key: String::from_utf8_lossy(&line[..colon]).trim().to_lowercase(),
            raw_value: String::from_utf8_lossy(&line[colon + 1..]).trim().to_string(),
            ..Default::default()
        });
    }

    records
}

/// Parses a `show stat` response.
///
/// Format: CSV with a header row naming the columns; the first two columns
/// of each data row are the proxy and service names.
/// ```text
/// # pxname,svname,qcur,qmax,scur,...
/// http-in,FRONTEND,,,12,...
/// ```
/// A header that cannot be read aborts the whole response. Data rows with
/// fewer than two columns are skipped, and columns beyond the shorter of
/// header and row are ignored. A structurally broken row stops parsing;
/// fields parsed before it are still returned.
pub fn parse_stats(raw: &[u8], observer: &dyn Observer) -> Result<Vec<FieldRecord>, ParseError> {
    let mut reader = CsvReader::new(raw);
    let header = reader.next_record().unwrap_or(Err(ParseError::Empty))?;

    let mut records = Vec::new();
    let mut row_number = 1;
    while let Some(row) = reader.next_record() {
        row_number += 1;
        let row = match row {
            Ok(row) => row,
            Err(error) => {
                observer.observe(&Observation::StatsRowDecode {
                    row: row_number,
                    error: &error,
                });
                break;
            }
        };

        if row.len() < 2 {
            continue;
        }
        let (proxy, service) = (&row[0], &row[1]);
        for (key, value) in header.iter().zip(row.iter()).skip(2) {
            records.push(FieldRecord {
                key: key.clone(),
                proxy: proxy.clone(),
                service: service.clone(),
                raw_value: value.clone(),
            });
        }
    }

    Ok(records)
}

/// Byte offset of `line` within `raw`; `line` must be a subslice of `raw`.
fn line_offset(raw: &[u8], line: &[u8]) -> usize {
    line.as_ptr() as usize - raw.as_ptr() as usize
}

/// Minimal CSV record reader respecting double-quote escaping.
///
/// A `"` opens a quoted field only at the start of a field; anywhere else it
/// is an ordinary byte. Quoted fields may contain commas, doubled quotes and
/// newlines. Blank lines are skipped and a trailing `\r` is dropped from each
/// record.
struct CsvReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> CsvReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Returns `None` at end of input.
    fn next_record(&mut self) -> Option<Result<Vec<String>, ParseError>> {
        while let Some(&b) = self.data.get(self.pos) {
            match b {
                b'\n' => self.pos += 1,
                b'\r' if self.data.get(self.pos + 1) == Some(&b'\n') => self.pos += 2,
                _ => break,
            }
        }
        if self.pos >= self.data.len() {
            return None;
        }
        let record = self.read_record();
        if record.is_err() {
            // Nothing after a broken record can be trusted.
            self.pos = self.data.len();
        }
        Some(record)
    }

    fn read_record(&mut self) -> Result<Vec<String>, ParseError> {
        let start = self.pos;
        let mut fields = Vec::new();
        let mut current = Vec::new();
        let mut in_quotes = false;
        let mut field_start = true;

        while let Some(&b) = self.data.get(self.pos) {
            self.pos += 1;
            if in_quotes {
                if b == b'"' {
                    if self.data.get(self.pos) == Some(&b'"') {
                        // Escaped quote
                        self.pos += 1;
                        current.push(b'"');
                    } else {
                        in_quotes = false;
                    }
                } else {
                    current.push(b);
                }
            } else {
                match b {
                    b'"' if field_start => in_quotes = true,
                    b',' => {
                        fields.push(decode_field(std::mem::take(&mut current)));
                        field_start = true;
                        continue;
                    }
                    b'\n' => break,
                    _ => current.push(b),
                }
            }
            field_start = false;
        }

        if in_quotes {
            return Err(ParseError::UnterminatedQuote { offset: start });
        }
        if current.last() == Some(&b'\r') {
            current.pop();
        }
        fields.push(decode_field(current));

        Ok(fields)
    }
}

fn decode_field(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(field) => field,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines, Read};
use std::path::Path;

use super::error::IngestError;

/// Every data row of an input file has exactly this many fields
const FIELDS_PER_ROW: usize = 2;

/// Rows are single lines, so the tokenizer never needs a large buffer
const LINE_BUFFER_CAPACITY: usize = 256;

/// Which of the two columns holds the timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnOrder {
    /// value, timestamp
    #[default]
    ValueFirst,
    /// timestamp, value
    TimestampFirst,
}

/// A single data row, still as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub first: String,
    pub second: String,
    /// Physical line of the file (the header is line 1)
    pub line: u64,
}

impl RawRecord {
    /// Split the record into (value, timestamp) according to the column order
    pub fn fields(&self, order: ColumnOrder) -> (&str, &str) {
        match order {
            ColumnOrder::ValueFirst => (&self.first, &self.second),
            ColumnOrder::TimestampFirst => (&self.second, &self.first),
        }
    }
}

/// CsvIngester reads a two column, comma delimited file one row at a time.
///
/// The first physical line is always treated as a header and discarded, whatever it
/// contains. Every following line is one row; quoted fields may contain commas and
/// backslash escapes, but not line breaks. Any row that does not have exactly two
/// fields, blank rows included, is returned as an [`IngestError::MalformedRow`]. The
/// underlying file is owned by the ingester, so it is closed as soon as the ingester
/// is dropped.
pub struct CsvIngester<R: Read = File> {
    lines: Lines<BufReader<R>>,
    tokenizer: csv::ReaderBuilder,
    /// Physical line number of the last line read, 0 before the header
    line: u64,
}

impl CsvIngester<File> {
    /// Open a file for ingestion
    pub fn open(path: &Path) -> Result<Self, IngestError> {
        let file = File::open(path)?;
        Ok(Self::from_reader(file))
    }
}

impl<R: Read> CsvIngester<R> {
    pub fn from_reader(reader: R) -> Self {
        let mut tokenizer = csv::ReaderBuilder::new();
        tokenizer
            .has_headers(false)
            .flexible(true)
            .escape(Some(b'\\'))
            .trim(csv::Trim::All)
            .buffer_capacity(LINE_BUFFER_CAPACITY);
        Self {
            lines: BufReader::new(reader).lines(),
            tokenizer,
            line: 0,
        }
    }

    /// Split a single line into a record
    fn tokenize(&self, text: &str) -> Result<RawRecord, IngestError> {
        let line = self.line;
        if text.trim().is_empty() {
            return Err(IngestError::MalformedRow { line, fields: 0 });
        }
        let mut reader = self.tokenizer.from_reader(text.as_bytes());
        let mut record = csv::StringRecord::new();
        if !reader.read_record(&mut record)? {
            return Err(IngestError::MalformedRow { line, fields: 0 });
        }
        if record.len() != FIELDS_PER_ROW {
            return Err(IngestError::MalformedRow {
                line,
                fields: record.len(),
            });
        }
        Ok(RawRecord {
            first: record[0].to_string(),
            second: record[1].to_string(),
            line,
        })
    }
}

impl<R: Read> Iterator for CsvIngester<R> {
    type Item = Result<RawRecord, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.line == 0 {
            // Header
            self.line = 1;
            if let Err(e) = self.lines.next()? {
                return Some(Err(IngestError::IOError(e)));
            }
        }
        let text = match self.lines.next()? {
            Ok(t) => t,
            Err(e) => return Some(Err(IngestError::IOError(e))),
        };
        self.line += 1;
        Some(self.tokenize(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn ingest(text: &str) -> Vec<Result<RawRecord, IngestError>> {
        CsvIngester::from_reader(text.as_bytes()).collect()
    }

    #[test]
    fn test_one_record_per_line() {
        let rows = ingest("current,date\n1.2345,2024-10-20\n1.5,2024-10-21\n0.0,2024-10-22\n");
        let rows: Vec<RawRecord> = rows.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].first, "1.2345");
        assert_eq!(rows[0].second, "2024-10-20");
        assert_eq!(rows[0].line, 2);
        assert_eq!(rows[2].first, "0.0");
        assert_eq!(rows[2].line, 4);
    }

    #[test]
    fn test_header_only() {
        assert!(ingest("current,date\n").is_empty());
        assert!(ingest("").is_empty());
    }

    #[test]
    fn test_header_is_skipped_unconditionally() {
        // Looks like data, is still the header
        let rows = ingest("1.0,2024-10-20\n2.0,2024-10-21\n");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].as_ref().unwrap().first, "2.0");
    }

    #[test]
    fn test_malformed_row() {
        let rows = ingest("current,date\n1.2345\n");
        assert!(matches!(
            rows[0],
            Err(IngestError::MalformedRow { line: 2, fields: 1 })
        ));
        let rows = ingest("current,date\n1.0,2024-10-20,extra\n");
        assert!(matches!(
            rows[0],
            Err(IngestError::MalformedRow { fields: 3, .. })
        ));
    }

    #[test]
    fn test_blank_row_is_malformed() {
        let rows = ingest("current,date\n1.0,2024-10-20\n\n2.0,2024-10-21\n");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].as_ref().unwrap().line, 2);
        assert!(matches!(
            rows[1],
            Err(IngestError::MalformedRow { line: 3, fields: 0 })
        ));
        let last = rows[2].as_ref().unwrap();
        assert_eq!(last.first, "2.0");
        assert_eq!(last.line, 4);
        let rows = ingest("current,date\n1.0,2024-10-20\n   \n");
        assert!(matches!(
            rows[1],
            Err(IngestError::MalformedRow { line: 3, fields: 0 })
        ));
    }

    #[test]
    fn test_blank_first_line_is_the_header() {
        let rows = ingest("\ncurrent,date\n1.0,2024-10-20\n");
        let rows: Vec<RawRecord> = rows.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].fields(ColumnOrder::ValueFirst), ("current", "date"));
        assert_eq!(rows[0].line, 2);
        assert_eq!(rows[1].line, 3);
    }

    #[test]
    fn test_crlf_line_endings() {
        let rows = ingest("current,date\r\n1.0,2024-10-20\r\n");
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].as_ref().unwrap().fields(ColumnOrder::ValueFirst),
            ("1.0", "2024-10-20")
        );
    }

    #[test]
    fn test_quoted_delimiter() {
        let rows = ingest("name,date\n\"beam, ler\",2024-10-20\n\"say \\\"hi\\\"\",x\n");
        let first = rows[0].as_ref().unwrap();
        assert_eq!(first.first, "beam, ler");
        let second = rows[1].as_ref().unwrap();
        assert_eq!(second.first, "say \"hi\"");
    }

    #[test]
    fn test_column_order() {
        let record = RawRecord {
            first: String::from("2024-10-20"),
            second: String::from("1.5"),
            line: 2,
        };
        assert_eq!(record.fields(ColumnOrder::TimestampFirst), ("1.5", "2024-10-20"));
        assert_eq!(record.fields(ColumnOrder::ValueFirst), ("2024-10-20", "1.5"));
    }

    #[test]
    fn test_open_file() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "current,date").unwrap();
        writeln!(file, " 1.2345 , 2024-10-20 ").unwrap();
        let rows: Vec<RawRecord> = CsvIngester::open(file.path())
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].fields(ColumnOrder::ValueFirst), ("1.2345", "2024-10-20"));
    }
}

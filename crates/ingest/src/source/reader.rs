//! Source reader with delimiter and header auto-detection

use crate::error::{IngestError, IngestResult, RowError};
use csv::{ReaderBuilder, StringRecordsIntoIter};
use std::fs::File;
use std::io::{BufRead, BufReader, Chain, Cursor, Read};
use std::path::Path;
use tracing::debug;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Candidate delimiter together with the header markers expected under it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderProbe {
    /// Field delimiter byte
    pub delimiter: u8,
    /// Lowercase substrings; any header cell containing one marks the header
    pub markers: &'static [&'static str],
}

impl HeaderProbe {
    /// Create a new probe
    #[must_use]
    pub const fn new(delimiter: u8, markers: &'static [&'static str]) -> Self {
        Self { delimiter, markers }
    }

    /// Whether the given cells form a header under this probe
    #[must_use]
    pub fn matches(&self, cells: &[String]) -> bool {
        cells.len() >= 2
            && cells.iter().any(|cell| {
                let cell = cell.to_lowercase();
                self.markers.iter().any(|marker| cell.contains(marker))
            })
    }
}

/// Header located in the scan window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedHeader {
    /// Delimiter that produced the match
    pub delimiter: u8,
    /// 1-based line number of the header
    pub line: u64,
    /// Trimmed header cells
    pub cells: Vec<String>,
}

/// One data row: its cells plus the 1-based source line it started on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    /// Source line number
    pub line: u64,
    /// Cell values in column order
    pub cells: Vec<String>,
}

/// Result of reading one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Decoded row
    Row(RawRow),
    /// Record that could not be decoded; the stream continues
    Rejected {
        /// Source line number
        line: u64,
        /// Reason
        error: RowError,
    },
}

type Replay<R> = Chain<Cursor<Vec<u8>>, BufReader<R>>;

/// Streaming reader positioned immediately after a detected header
pub struct SourceReader<R: Read> {
    header: DetectedHeader,
    records: StringRecordsIntoIter<Replay<R>>,
}

impl SourceReader<File> {
    /// Open a file and detect its header
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be opened or no header is found.
    pub fn open(
        path: impl AsRef<Path>,
        scan_lines: usize,
        probes: &[HeaderProbe],
    ) -> IngestResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            IngestError::input(format!("cannot open {}: {e}", path.display()))
        })?;
        Self::detect(file, scan_lines, probes)
    }
}

impl<R: Read> SourceReader<R> {
    /// Scan up to `scan_lines` leading lines for a header.
    ///
    /// Probes are tried in order; within a probe, lines are tried top to
    /// bottom. The first match becomes the header, earlier lines are
    /// discarded, and later window lines are replayed ahead of the rest of
    /// the stream.
    ///
    /// # Errors
    ///
    /// Returns `HeaderNotFound` if no window line matches any probe, or an
    /// input error if the window cannot be read.
    pub fn detect(source: R, scan_lines: usize, probes: &[HeaderProbe]) -> IngestResult<Self> {
        let mut input = BufReader::new(source);
        let mut window: Vec<Vec<u8>> = Vec::with_capacity(scan_lines);

        while window.len() < scan_lines {
            let mut line = Vec::new();
            let read = input
                .read_until(b'\n', &mut line)
                .map_err(|e| IngestError::input(format!("Failed to read source: {e}")))?;
            if read == 0 {
                break;
            }
            if window.is_empty() && line.starts_with(UTF8_BOM) {
                line.drain(..UTF8_BOM.len());
            }
            window.push(line);
        }

        for probe in probes {
            for (idx, line) in window.iter().enumerate() {
                let Some(cells) = split_line(line, probe.delimiter) else {
                    continue;
                };
                if !probe.matches(&cells) {
                    continue;
                }

                let header = DetectedHeader {
                    delimiter: probe.delimiter,
                    line: idx as u64 + 1,
                    cells,
                };
                debug!(
                    line = header.line,
                    delimiter = %char::from(header.delimiter),
                    columns = header.cells.len(),
                    "header detected"
                );

                let replay: Vec<u8> = window[idx + 1..].concat();
                let records = ReaderBuilder::new()
                    .has_headers(false)
                    .flexible(true)
                    .delimiter(probe.delimiter)
                    .from_reader(Cursor::new(replay).chain(input))
                    .into_records();

                return Ok(Self { header, records });
            }
        }

        Err(IngestError::HeaderNotFound {
            scanned_lines: window.len(),
        })
    }

    /// The detected header
    #[must_use]
    pub const fn header(&self) -> &DetectedHeader {
        &self.header
    }
}

impl<R: Read> Iterator for SourceReader<R> {
    type Item = IngestResult<ReadOutcome>;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.header.line;
        let item = match self.records.next()? {
            Ok(record) => {
                let line = offset + record.position().map_or(0, csv::Position::line);
                Ok(ReadOutcome::Row(RawRow {
                    line,
                    cells: record.iter().map(str::to_string).collect(),
                }))
            }
            Err(err) if err.is_io_error() => Err(IngestError::Csv(err)),
            Err(err) => {
                let line = offset + err.position().map_or(0, csv::Position::line);
                Ok(ReadOutcome::Rejected {
                    line,
                    error: RowError::Malformed {
                        reason: err.to_string(),
                    },
                })
            }
        };
        Some(item)
    }
}

/// Parse one window line under `delimiter`; `None` for blank lines
fn split_line(line: &[u8], delimiter: u8) -> Option<Vec<String>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(line);
    let record = reader.records().next()?.ok()?;
    Some(record.iter().map(|cell| cell.trim().to_string()).collect())
}

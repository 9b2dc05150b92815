//! File-based report source.
//!
//! Tails a JSON lines file written by `Output::File`.

use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use freezewatch_types::LongEventReport;

use super::ReportSource;

/// A report source that reads a JSON lines file incrementally.
///
/// Each poll picks up where the previous one stopped, keyed on the byte
/// offset already consumed. A file that shrank (rotated or truncated) is
/// read again from the start. A trailing line without its newline is left
/// for the next poll, since the writer may still be appending it.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    description: String,
    offset: u64,
    line: usize,
    last_error: Option<String>,
}

impl FileSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let description = format!("file: {}", path.display());
        Self {
            path,
            description,
            offset: 0,
            line: 0,
            last_error: None,
        }
    }

    /// Returns the path being read.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every report in the file from the start, failing on the first bad line.
    pub fn read_all<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<LongEventReport>> {
        use anyhow::Context;

        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        let mut reports = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let report = serde_json::from_str(&line)
                .with_context(|| format!("{}:{}: invalid report", path.display(), index + 1))?;
            reports.push(report);
        }
        Ok(reports)
    }

    /// Reads complete lines past `offset`. Errors on individual lines are
    /// recorded in `last_error` and skipped; reports read before an I/O
    /// failure are still returned.
    fn read_new(&mut self) -> std::io::Result<Vec<LongEventReport>> {
        let mut file = File::open(&self.path)?;
        let len = file.metadata()?.len();

        if len < self.offset {
            self.offset = 0;
            self.line = 0;
        }
        if len == self.offset {
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(self.offset))?;
        let mut reader = BufReader::new(file);
        let mut reports = Vec::new();
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let read = match reader.read_until(b'\n', &mut buf) {
                Ok(read) => read,
                Err(e) => {
                    self.last_error = Some(format!("Read error: {}", e));
                    break;
                }
            };
            if read == 0 || buf.last() != Some(&b'\n') {
                break;
            }
            self.offset += read as u64;
            self.line += 1;

            let line = match std::str::from_utf8(&buf) {
                Ok(line) => line.trim(),
                Err(e) => {
                    self.last_error = Some(format!("Encoding error on line {}: {}", self.line, e));
                    continue;
                }
            };
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(report) => reports.push(report),
                Err(e) => {
                    self.last_error = Some(format!("Parse error on line {}: {}", self.line, e));
                }
            }
        }

        Ok(reports)
    }
}

impl ReportSource for FileSource {
    fn poll(&mut self) -> Vec<LongEventReport> {
        self.last_error = None;
        match self.read_new() {
            Ok(reports) => reports,
            Err(e) => {
                self.last_error = Some(format!("Read error: {}", e));
                Vec::new()
            }
        }
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn error(&self) -> Option<String> {
        self.last_error.clone()
    }
}

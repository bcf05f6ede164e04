//! Destinations the engine hands data to without knowing where it ends up:
//! formatted report records ([`OutputSink`]) and recovered plaintexts for the
//! loopback wordlist ([`Loopback`]).
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Show,
    Left,
}

pub trait OutputSink {
    fn emit(&mut self, kind: ReportKind, record: &[u8]);
}

impl OutputSink for Vec<(ReportKind, Vec<u8>)> {
    fn emit(&mut self, kind: ReportKind, record: &[u8]) {
        self.push((kind, record.to_vec()));
    }
}

/// Writes each record followed by a newline. The first I/O error is kept
/// and later records are dropped.
pub struct WriteSink<W: Write> {
    inner: W,
    error: Option<io::Error>,
}

impl<W: Write> WriteSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, error: None }
    }

    pub fn finish(mut self) -> io::Result<W> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> OutputSink for WriteSink<W> {
    fn emit(&mut self, _kind: ReportKind, record: &[u8]) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = self
            .inner
            .write_all(record)
            .and_then(|_| self.inner.write_all(b"\n"))
        {
            self.error = Some(e);
        }
    }
}

/// Receiver of recovered plaintexts. Fire-and-forget.
pub trait Loopback {
    fn append(&mut self, plain: &[u8]);
}

impl Loopback for Vec<Vec<u8>> {
    fn append(&mut self, plain: &[u8]) {
        self.push(plain.to_vec());
    }
}

/// Appends plaintexts, one per line, to a file.
pub struct LoopbackFile {
    file: File,
}

impl LoopbackFile {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::options().create(true).append(true).open(path)?;
        Ok(Self { file })
    }
}

impl Loopback for LoopbackFile {
    fn append(&mut self, plain: &[u8]) {
        if let Err(e) = self
            .file
            .write_all(plain)
            .and_then(|_| self.file.write_all(b"\n"))
        {
            log::debug!("loopback append failed: {}", e);
        }
    }
}

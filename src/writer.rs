//! Appending newly recovered credentials to the potfile.
//!
//! A [`PotfileWriter`] keeps the potfile open for the duration of a run and
//! closes it when dropped. Each [`PotfileWriter::append`] is one atomic unit:
//! the whole record is written and flushed under an exclusive advisory lock,
//! so records from concurrent processes never interleave. A lock that cannot
//! be taken is reported and the record is written anyway.
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use log::error;

use crate::config::Potfile;
use crate::error::{PotfileError, Result};
use crate::lock::FileLock;
use crate::pot::format_record;
use crate::sink::Loopback;

#[cfg(windows)]
const EOL: &[u8] = b"\r\n";
#[cfg(not(windows))]
const EOL: &[u8] = b"\n";

pub struct PotfileWriter<'a> {
    potfile: &'a Potfile,
    file: File,
    buf: Vec<u8>,
    loopback: Option<Box<dyn Loopback + 'a>>,
}

impl Potfile {
    /// Open the potfile for appending, creating it if needed.
    pub fn writer(&self) -> Result<PotfileWriter<'_>> {
        let file = File::options()
            .create(true)
            .append(true)
            .open(self.path())
            .map_err(|source| {
                error!("{}: {}", self.path().display(), source);
                PotfileError::Open {
                    path: self.path().to_path_buf(),
                    source,
                }
            })?;
        Ok(PotfileWriter {
            potfile: self,
            file,
            buf: self.record_buffer(),
            loopback: None,
        })
    }
}

impl<'a> PotfileWriter<'a> {
    /// Also hand every appended plaintext to `loopback`.
    pub fn with_loopback(mut self, loopback: Box<dyn Loopback + 'a>) -> Self {
        self.loopback = Some(loopback);
        self
    }

    /// Append `hash_ascii SEP plaintext` as one line.
    pub fn append(&mut self, hash_ascii: &str, plain: &[u8]) -> Result<()> {
        let potfile = self.potfile;
        let path = potfile.path();

        self.buf.clear();
        format_record(&mut self.buf, hash_ascii, plain, potfile.policy());
        self.buf.extend_from_slice(EOL);

        let lock = FileLock::exclusive(&self.file, path);
        write_record(&self.file, path, &self.buf, lock)?;

        if let Some(lb) = self.loopback.as_mut() {
            lb.append(plain);
        }
        Ok(())
    }
}

fn write_record(
    file: &File,
    path: &Path,
    record: &[u8],
    lock: io::Result<FileLock<'_>>,
) -> Result<()> {
    let _lock = match lock {
        Ok(guard) => Some(guard),
        Err(e) => {
            error!("{}: Failed to lock file: {}", path.display(), e);
            None
        }
    };
    let mut f = file;
    f.write_all(record)
        .and_then(|_| f.flush())
        .map_err(|source| {
            error!("{}: {}", path.display(), source);
            PotfileError::Write {
                path: path.to_path_buf(),
                source,
            }
        })
}

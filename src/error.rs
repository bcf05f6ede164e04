use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PotfileError {
    #[error("{}: {}", path.display(), source)]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{}: read failed: {}", path.display(), source)]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{}: write failed: {}", path.display(), source)]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("potfile set up for hash mode {}, reconciled as {}", expected, actual)]
    ModeMismatch { expected: u32, actual: u32 },
}

pub type Result<T> = std::result::Result<T, PotfileError>;

//! Loading target hashes into a [`Catalog`].
//!
//! One hash per line, optionally prefixed with `user<SEP>`. LM hashes given
//! as 32 hex digits are split into two halves that are cracked separately
//! and paired again for reporting.
use std::cmp::Ordering;
use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use log::debug;

use crate::catalog::{
    Catalog, Comparator, HashEntry, HashInfo, ParsedHash, SplitInfo, SplitOrigin,
};
use crate::config::{RunOptions, keep_all_hashes};
use crate::io::iter_lines_auto;
use crate::mode::{HashMode, LM_MODE, ParseError};

#[derive(Debug, thiserror::Error)]
pub enum HashlistError {
    #[error("missing user separator")]
    MissingUser,
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// One parsed hash-list line: a single hash, or both halves of a split hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashLine {
    pub user: Option<Vec<u8>>,
    pub hashes: Vec<ParsedHash>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadStats {
    pub lines: usize,
    pub malformed: usize,
}

pub fn parse_hash_line(
    line: &[u8],
    mode: &dyn HashMode,
    with_user: bool,
) -> Result<HashLine, HashlistError> {
    let (user, hash) = if with_user {
        let sep = memchr::memchr(mode.separator(), line).ok_or(HashlistError::MissingUser)?;
        (Some(line[..sep].to_vec()), &line[sep + 1..])
    } else {
        (None, line)
    };

    let hashes = if mode.id() == LM_MODE && hash.len() == 32 {
        vec![mode.parse(&hash[..16])?, mode.parse(&hash[16..])?]
    } else {
        vec![mode.parse(hash)?]
    };
    Ok(HashLine { user, hashes })
}

/// Build a sorted catalog from raw lines. Unless every hash must be kept,
/// duplicates are collapsed and split pairing is dropped.
pub fn catalog_from_lines<I>(
    lines: I,
    mode: &dyn HashMode,
    opts: &RunOptions,
) -> (Catalog, LoadStats)
where
    I: IntoIterator<Item = Vec<u8>>,
{
    let keep_all = keep_all_hashes(opts, mode);
    let order = Comparator::for_catalog(mode.is_salted());
    let mut stats = LoadStats::default();
    let mut entries: Vec<HashEntry> = Vec::new();

    for raw in lines {
        let line = raw.trim_ascii();
        if line.is_empty() {
            continue;
        }
        stats.lines += 1;
        let parsed = match parse_hash_line(line, mode, opts.username) {
            Ok(p) => p,
            Err(e) => {
                debug!("skipping hash line {}: {}", stats.lines, e);
                stats.malformed += 1;
                continue;
            }
        };

        let paired = keep_all && parsed.hashes.len() == 2;
        let base = entries.len();
        for (i, hash) in parsed.hashes.into_iter().enumerate() {
            let split = paired.then(|| SplitInfo {
                origin: if i == 0 {
                    SplitOrigin::Left
                } else {
                    SplitOrigin::Right
                },
                neighbor: if i == 0 { base + 1 } else { base },
            });
            let mut entry = HashEntry::new(hash);
            if parsed.user.is_some() || split.is_some() {
                entry = entry.with_info(HashInfo {
                    user: parsed.user.clone(),
                    split,
                });
            }
            entries.push(entry);
        }
    }

    if !keep_all {
        entries.sort_by(|a, b| order.compare(&a.hash, &b.hash));
        entries.dedup_by(|a, b| order.compare(&a.hash, &b.hash) == Ordering::Equal);
    }

    (Catalog::new(entries, order), stats)
}

pub fn load_hashlist_from_str(
    contents: &str,
    mode: &dyn HashMode,
    opts: &RunOptions,
) -> (Catalog, LoadStats) {
    catalog_from_lines(
        contents.lines().map(|l| l.as_bytes().to_vec()),
        mode,
        opts,
    )
}

/// Build a catalog from fallible lines, failing on the first read error.
pub fn catalog_from_reader<I>(
    lines: I,
    mode: &dyn HashMode,
    opts: &RunOptions,
) -> io::Result<(Catalog, LoadStats)>
where
    I: IntoIterator<Item = io::Result<Vec<u8>>>,
{
    let mut failure = None;
    let lines = lines
        .into_iter()
        .map_while(|line| line.map_err(|e| failure = Some(e)).ok());
    let loaded = catalog_from_lines(lines, mode, opts);
    match failure {
        Some(e) => Err(e),
        None => Ok(loaded),
    }
}

/// Streamingly load a hash file, using mmap above `mmap_threshold_bytes`.
pub fn load_hashlist<P: AsRef<Path>>(
    path: P,
    mode: &dyn HashMode,
    opts: &RunOptions,
    mmap_threshold_bytes: u64,
) -> Result<(Catalog, LoadStats)> {
    let iter = iter_lines_auto(&path, mmap_threshold_bytes)?;
    catalog_from_reader(iter, mode, opts)
        .with_context(|| format!("read {}", path.as_ref().display()))
}

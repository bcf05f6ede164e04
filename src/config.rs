//! Potfile lifecycle: decides whether the potfile takes part in a run,
//! where it lives, and which match policy reconciliation uses.
//!
//! A disabled potfile is represented by `None` from [`Potfile::init`];
//! dropping a [`Potfile`] releases everything it owns.
use std::path::{Path, PathBuf};

use log::warn;

use crate::engine::MatchPlan;
use crate::hexify::HexPolicy;
use crate::io::DEFAULT_MMAP_THRESHOLD_BYTES;
use crate::mode::{HashMode, LM_MODE};

/// Longest plaintext a record is sized for.
pub const PLAINTEXT_MAX: usize = 256;

pub const POTFILE_NAME: &str = "hashcat.potfile";
pub const LEGACY_POTFILE_NAME: &str = "hashcat.pot";

/// Run options the potfile depends on; resolved by the caller.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub benchmark: bool,
    pub keyspace: bool,
    pub backend_info: bool,
    pub stdout_flag: bool,
    pub speed_only: bool,
    pub progress_only: bool,
    pub usage: bool,
    pub version: bool,
    pub potfile_disable: bool,
    pub potfile_path: Option<PathBuf>,
    pub username: bool,
    pub show: bool,
    pub left: bool,
    pub outfile_autohex: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            benchmark: false,
            keyspace: false,
            backend_info: false,
            stdout_flag: false,
            speed_only: false,
            progress_only: false,
            usage: false,
            version: false,
            potfile_disable: false,
            potfile_path: None,
            username: false,
            show: false,
            left: false,
            outfile_autohex: true,
        }
    }
}

impl RunOptions {
    /// Run modes in which no hash is ever cracked or reported.
    fn potfile_unused(&self) -> bool {
        self.benchmark
            || self.keyspace
            || self.backend_info
            || self.stdout_flag
            || self.speed_only
            || self.progress_only
            || self.usage
            || self.version
            || self.potfile_disable
    }
}

/// Whether duplicate catalog entries must be kept and matched individually:
/// several users may share one hash, and LM halves have to be paired up
/// again for `show` / `left` output.
pub fn keep_all_hashes(opts: &RunOptions, mode: &dyn HashMode) -> bool {
    let reporting = opts.show || opts.left;
    reporting && (opts.username || mode.id() == LM_MODE)
}

#[derive(Debug, Clone)]
pub struct Potfile {
    path: PathBuf,
    legacy: Option<PathBuf>,
    keep_all_hashes: bool,
    hash_mode: u32,
    policy: HexPolicy,
    plan: MatchPlan,
    record_capacity: usize,
    mmap_threshold: u64,
}

impl Potfile {
    pub fn init(opts: &RunOptions, profile_dir: &Path, mode: &dyn HashMode) -> Option<Self> {
        if opts.potfile_unused() {
            return None;
        }

        let path = match &opts.potfile_path {
            Some(p) => p.clone(),
            None => profile_dir.join(POTFILE_NAME),
        };

        let keep_all_hashes = keep_all_hashes(opts, mode);

        let record_capacity =
            mode.max_digest_text_len() + 1 + "$HEX[]".len() + PLAINTEXT_MAX * 2;

        let mut legacy = None;
        if opts.potfile_path.is_none() {
            let old = profile_dir.join(LEGACY_POTFILE_NAME);
            if old.exists() {
                warn!("Old potfile detected: {}", old.display());
                warn!("New potfile is: {}", path.display());
                legacy = Some(old);
            }
        }

        Some(Self {
            path,
            legacy,
            keep_all_hashes,
            hash_mode: mode.id(),
            policy: HexPolicy {
                separator: mode.separator(),
                always_ascii: mode.always_ascii(),
                autohex: opts.outfile_autohex,
            },
            plan: MatchPlan::for_mode(mode),
            record_capacity,
            mmap_threshold: DEFAULT_MMAP_THRESHOLD_BYTES,
        })
    }

    pub fn with_mmap_threshold(mut self, threshold_bytes: u64) -> Self {
        self.mmap_threshold = threshold_bytes;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Pre-`hashcat.potfile` file found in the profile directory, if any.
    pub fn legacy_potfile(&self) -> Option<&Path> {
        self.legacy.as_deref()
    }

    pub fn keep_all_hashes(&self) -> bool {
        self.keep_all_hashes
    }

    pub fn hash_mode(&self) -> u32 {
        self.hash_mode
    }

    pub fn policy(&self) -> &HexPolicy {
        &self.policy
    }

    pub fn plan(&self) -> MatchPlan {
        self.plan
    }

    pub fn mmap_threshold(&self) -> u64 {
        self.mmap_threshold
    }

    /// Empty buffer large enough for any record of this hash mode.
    pub fn record_buffer(&self) -> Vec<u8> {
        Vec::with_capacity(self.record_capacity)
    }
}

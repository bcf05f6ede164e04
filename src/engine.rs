//! Engine: re-applies previously recovered plaintexts from the potfile to a
//! freshly loaded catalog before any cracking starts.
//!
//! Each potfile line is turned into a fresh search key according to the
//! hash mode's [`MatchStrategy`] and looked up with the [`Comparator`] chosen
//! for that mode. Lines that do not parse or do not match are skipped; a
//! potfile is routinely shared between unrelated hash lists.
//!
//! ```no_run
//! use potfile::config::{Potfile, RunOptions};
//! use potfile::hashlist::load_hashlist_from_str;
//! use potfile::mode::builtin;
//! # fn main() -> anyhow::Result<()> {
//! let mode = builtin(0).unwrap();
//! let opts = RunOptions::default();
//! let potfile = Potfile::init(&opts, std::path::Path::new("."), mode.as_ref()).unwrap();
//! let (mut catalog, _) =
//!     load_hashlist_from_str("5f4dcc3b5aa765d61d8327deb882cf99", mode.as_ref(), &opts);
//! let stats = potfile.reconcile(&mut catalog, mode.as_ref(), None)?;
//! println!("{} already cracked", stats.cracked);
//! # Ok(())
//! # }
//! ```
use std::io;

use log::{debug, error};

use crate::catalog::{Catalog, Comparator, ParsedHash, SALT_CAPACITY, Salt};
use crate::config::Potfile;
use crate::error::{PotfileError, Result};
use crate::hexify::{is_hexify, unhexify};
use crate::io::iter_lines_auto;
use crate::mode::{HashMode, LM_MODE, LM_WEAK_HASH, WPA_ESSID_MAX, WPA_ROUNDS, Wpa};
use crate::pot::split_record;
use crate::sink::Loopback;

/// How a potfile hash field is turned into a search key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    /// The record cannot be matched back to a hash at all.
    Unsupported,
    /// The hash field is the salt; no digest is stored.
    SaltOnly,
    /// `digest:mac_ap:mac_sta:essid`, rebuilt without the mode parser.
    Composite,
    /// The mode's own parser.
    Generic,
}

impl MatchStrategy {
    pub fn for_mode_id(id: u32) -> Self {
        match id {
            5200 | 6200..=6299 | 9000 | 13700..=13799 | 14600 => MatchStrategy::Unsupported,
            6800 => MatchStrategy::SaltOnly,
            2500 => MatchStrategy::Composite,
            _ => MatchStrategy::Generic,
        }
    }
}

/// Strategy and comparator, fixed per hash mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchPlan {
    pub strategy: MatchStrategy,
    pub comparator: Comparator,
}

impl MatchPlan {
    pub fn for_mode(mode: &dyn HashMode) -> Self {
        let strategy = MatchStrategy::for_mode_id(mode.id());
        let comparator = match strategy {
            MatchStrategy::SaltOnly => Comparator::BySaltBytesOnly,
            MatchStrategy::Composite => Comparator::ByDigestAndSalt,
            MatchStrategy::Generic | MatchStrategy::Unsupported => {
                Comparator::for_catalog(mode.is_salted())
            }
        };
        Self {
            strategy,
            comparator,
        }
    }
}

/// Counters for one reconciliation pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Non-empty lines read.
    pub lines: usize,
    /// Lines without a separator or with a hash field the mode rejects.
    pub malformed: usize,
    /// Well-formed lines with no equal catalog entry.
    pub unmatched: usize,
    /// Entries newly marked cracked, weak-hash pre-pass included.
    pub cracked: usize,
}

impl Potfile {
    /// Mark every catalog entry already present in the potfile as cracked.
    ///
    /// A missing potfile, or a hash mode whose records cannot be matched,
    /// leaves the catalog untouched and succeeds. Failing to open or read an
    /// existing potfile is reported and returned; whether that ends the run
    /// is up to the caller. `mode` must be the mode passed to
    /// [`Potfile::init`].
    pub fn reconcile(
        &self,
        catalog: &mut Catalog,
        mode: &dyn HashMode,
        loopback: Option<&mut dyn Loopback>,
    ) -> Result<ReconcileStats> {
        if mode.id() != self.hash_mode() {
            return Err(PotfileError::ModeMismatch {
                expected: self.hash_mode(),
                actual: mode.id(),
            });
        }

        let mut loopback = loopback;
        let mut stats = ReconcileStats::default();

        if !self.path().exists() {
            return Ok(stats);
        }

        let plan = self.plan();
        if plan.strategy == MatchStrategy::Unsupported {
            debug!(
                "hash mode {} cannot be reconciled from potfile records",
                mode.id()
            );
            return Ok(stats);
        }

        // bitsliced LM kernels never see the empty-password half
        if mode.id() == LM_MODE {
            if let Ok(weak) = mode.parse(LM_WEAK_HASH.as_bytes()) {
                let (_, cracked) =
                    self.update_hashes(catalog, plan.comparator, &weak, b"", &mut loopback);
                stats.cracked += cracked;
            }
        }

        let lines = iter_lines_auto(self.path(), self.mmap_threshold()).map_err(|e| {
            error!("{}: {}", self.path().display(), e);
            PotfileError::Open {
                path: self.path().to_path_buf(),
                source: e.downcast::<io::Error>().unwrap_or_else(io::Error::other),
            }
        })?;

        self.scan_lines(catalog, mode, lines, &mut loopback, &mut stats)?;

        debug!(
            "potfile {}: {} lines, {} malformed, {} unmatched, {} cracked",
            self.path().display(),
            stats.lines,
            stats.malformed,
            stats.unmatched,
            stats.cracked
        );
        Ok(stats)
    }

    /// Match every record of `lines` against the catalog. The first read
    /// error ends the pass.
    fn scan_lines<I>(
        &self,
        catalog: &mut Catalog,
        mode: &dyn HashMode,
        lines: I,
        loopback: &mut Option<&mut dyn Loopback>,
        stats: &mut ReconcileStats,
    ) -> Result<()>
    where
        I: IntoIterator<Item = io::Result<Vec<u8>>>,
    {
        let plan = self.plan();
        let separator = self.policy().separator;
        for line in lines {
            let line = line.map_err(|source| {
                error!("{}: {}", self.path().display(), source);
                PotfileError::Read {
                    path: self.path().to_path_buf(),
                    source,
                }
            })?;
            if line.is_empty() {
                continue;
            }
            stats.lines += 1;

            let record = match split_record(&line, separator) {
                Ok(r) => r,
                Err(e) => {
                    debug!("skipping potfile line {}: {}", stats.lines, e);
                    stats.malformed += 1;
                    continue;
                }
            };

            let Some(key) = search_key(plan.strategy, mode, record.hash) else {
                stats.malformed += 1;
                continue;
            };

            let plain = unhexify(record.plain);
            let (matched, cracked) =
                self.update_hashes(catalog, plan.comparator, &key, &plain, loopback);
            if matched == 0 {
                stats.unmatched += 1;
            }
            stats.cracked += cracked;
        }
        Ok(())
    }

    /// Apply `plain` to the entries equal to `key`: every one of them when
    /// all hashes are kept, otherwise the single binary-search hit.
    /// Returns (entries matched, entries newly cracked).
    fn update_hashes(
        &self,
        catalog: &mut Catalog,
        cmp: Comparator,
        key: &ParsedHash,
        plain: &[u8],
        loopback: &mut Option<&mut dyn Loopback>,
    ) -> (usize, usize) {
        let hits: Vec<usize> = if self.keep_all_hashes() {
            catalog.find_all(cmp, key)
        } else {
            catalog.find(cmp, key).into_iter().collect()
        };

        let mut cracked = 0;
        for &idx in &hits {
            let Some(entry) = catalog.entry_mut(idx) else {
                continue;
            };
            if entry.crack(plain) {
                cracked += 1;
                if let Some(lb) = loopback.as_deref_mut() {
                    lb.append(plain);
                }
            }
        }
        (hits.len(), cracked)
    }
}

fn search_key(
    strategy: MatchStrategy,
    mode: &dyn HashMode,
    hash_field: &[u8],
) -> Option<ParsedHash> {
    match strategy {
        MatchStrategy::SaltOnly => salt_only_key(hash_field),
        MatchStrategy::Composite => composite_key(hash_field),
        MatchStrategy::Generic | MatchStrategy::Unsupported => match mode.parse(hash_field) {
            Ok(key) => Some(key),
            Err(e) => {
                debug!(
                    "rejected potfile hash {:?}: {}",
                    String::from_utf8_lossy(hash_field),
                    e
                );
                None
            }
        },
    }
}

fn salt_only_key(hash_field: &[u8]) -> Option<ParsedHash> {
    if hash_field.len() >= SALT_CAPACITY {
        return None;
    }
    let salt = Salt::new(hash_field, 0).ok()?;
    Some(ParsedHash::salted(Vec::new(), salt))
}

fn composite_key(hash_field: &[u8]) -> Option<ParsedHash> {
    let sep = memchr::memrchr(b':', hash_field)?;
    let (prefix, essid) = (&hash_field[..sep], &hash_field[sep + 1..]);
    if prefix.len() != Wpa::PREFIX_LEN {
        return None;
    }
    let essid = if is_hexify(essid) {
        unhexify(essid)
    } else {
        essid.to_vec()
    };
    if essid.len() > WPA_ESSID_MAX {
        return None;
    }
    let digest = hex::decode(&prefix[..32]).ok()?;
    let salt = Salt::new(&essid, WPA_ROUNDS - 1).ok()?;
    Some(ParsedHash::salted(digest, salt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{HashEntry, HashInfo};
    use crate::config::RunOptions;
    use crate::mode::{RawHex, builtin};
    use std::path::Path;
    use tempfile::tempdir;

    const PASSWORD_MD5: &str = "5f4dcc3b5aa765d61d8327deb882cf99";

    fn potfile_at(dir: &Path, opts: RunOptions, mode: &dyn HashMode) -> Potfile {
        let opts = RunOptions {
            potfile_path: Some(dir.join("test.potfile")),
            ..opts
        };
        Potfile::init(&opts, dir, mode).unwrap()
    }

    fn catalog_of(mode: &dyn HashMode, hashes: &[&str]) -> Catalog {
        let entries = hashes
            .iter()
            .map(|h| HashEntry::new(mode.parse(h.as_bytes()).unwrap()))
            .collect();
        Catalog::new(entries, Comparator::for_catalog(mode.is_salted()))
    }

    fn plain_of<'a>(cat: &'a Catalog, mode: &dyn HashMode, hash: &str) -> Option<&'a [u8]> {
        let key = mode.parse(hash.as_bytes()).unwrap();
        let idx = cat.find(cat.order(), &key)?;
        cat.entries()[idx].plain()
    }

    #[test]
    fn unsalted_line_cracks_matching_entry() {
        let dir = tempdir().unwrap();
        let md5 = builtin(0).unwrap();
        let pf = potfile_at(dir.path(), RunOptions::default(), md5.as_ref());
        std::fs::write(pf.path(), format!("{}:password\n", PASSWORD_MD5)).unwrap();

        let mut cat = catalog_of(md5.as_ref(), &[PASSWORD_MD5, "00000000000000000000000000000000"]);
        let stats = pf.reconcile(&mut cat, md5.as_ref(), None).unwrap();

        assert_eq!(stats.cracked, 1);
        assert_eq!(plain_of(&cat, md5.as_ref(), PASSWORD_MD5), Some(&b"password"[..]));
        assert_eq!(cat.cracked_count(), 1);
    }

    #[test]
    fn missing_potfile_is_a_silent_noop() {
        let dir = tempdir().unwrap();
        let md5 = builtin(0).unwrap();
        let pf = potfile_at(dir.path(), RunOptions::default(), md5.as_ref());
        let mut cat = catalog_of(md5.as_ref(), &[PASSWORD_MD5]);
        let before = cat.entries().to_vec();

        let stats = pf.reconcile(&mut cat, md5.as_ref(), None).unwrap();
        assert_eq!(stats, ReconcileStats::default());
        assert_eq!(cat.entries(), &before[..]);
    }

    #[test]
    fn second_pass_changes_nothing() {
        let dir = tempdir().unwrap();
        let md5 = builtin(0).unwrap();
        let pf = potfile_at(dir.path(), RunOptions::default(), md5.as_ref());
        std::fs::write(
            pf.path(),
            format!("{0}:password\n{0}:other\nffffffffffffffffffffffffffffffff:x\n", PASSWORD_MD5),
        )
        .unwrap();

        let mut cat = catalog_of(md5.as_ref(), &[PASSWORD_MD5]);
        pf.reconcile(&mut cat, md5.as_ref(), None).unwrap();
        let after_first = cat.entries().to_vec();
        let stats = pf.reconcile(&mut cat, md5.as_ref(), None).unwrap();

        assert_eq!(stats.cracked, 0);
        assert_eq!(cat.entries(), &after_first[..]);
        assert_eq!(plain_of(&cat, md5.as_ref(), PASSWORD_MD5), Some(&b"password"[..]));
    }

    #[test]
    fn keep_all_hashes_cracks_every_duplicate() {
        let dir = tempdir().unwrap();
        let md5 = builtin(0).unwrap();
        let opts = RunOptions {
            username: true,
            show: true,
            ..RunOptions::default()
        };
        let pf = potfile_at(dir.path(), opts, md5.as_ref());
        assert!(pf.keep_all_hashes());
        std::fs::write(pf.path(), format!("{}:password\n", PASSWORD_MD5)).unwrap();

        let entries = ["alice", "bob", "carol"]
            .iter()
            .map(|u| {
                HashEntry::new(md5.parse(PASSWORD_MD5.as_bytes()).unwrap()).with_info(HashInfo {
                    user: Some(u.as_bytes().to_vec()),
                    split: None,
                })
            })
            .collect();
        let mut cat = Catalog::new(entries, Comparator::ByDigestOnly);
        let stats = pf.reconcile(&mut cat, md5.as_ref(), None).unwrap();

        assert_eq!(stats.cracked, 3);
        assert!(cat.entries().iter().all(|e| e.plain() == Some(&b"password"[..])));
    }

    #[test]
    fn unique_policy_cracks_a_single_duplicate() {
        let dir = tempdir().unwrap();
        let md5 = builtin(0).unwrap();
        let pf = potfile_at(dir.path(), RunOptions::default(), md5.as_ref());
        std::fs::write(pf.path(), format!("{}:password\n", PASSWORD_MD5)).unwrap();

        let mut cat = catalog_of(md5.as_ref(), &[PASSWORD_MD5, PASSWORD_MD5]);
        let stats = pf.reconcile(&mut cat, md5.as_ref(), None).unwrap();
        assert_eq!(stats.cracked, 1);
        assert_eq!(cat.cracked_count(), 1);
    }

    #[test]
    fn hex_plaintext_and_malformed_lines() {
        let dir = tempdir().unwrap();
        let md5 = builtin(0).unwrap();
        let pf = potfile_at(dir.path(), RunOptions::default(), md5.as_ref());
        std::fs::write(
            pf.path(),
            format!(
                "\nno separator here\n{}:$HEX[613a62]\n0123:short\nffffffffffffffffffffffffffffffff:pa:ss\n",
                PASSWORD_MD5
            ),
        )
        .unwrap();

        let mut cat = catalog_of(md5.as_ref(), &[PASSWORD_MD5]);
        let stats = pf.reconcile(&mut cat, md5.as_ref(), None).unwrap();
        assert_eq!(stats.lines, 4);
        assert_eq!(stats.malformed, 3);
        assert_eq!(plain_of(&cat, md5.as_ref(), PASSWORD_MD5), Some(&b"a:b"[..]));
    }

    #[test]
    fn salted_records_match_on_digest_and_salt() {
        let dir = tempdir().unwrap();
        let mode = builtin(10).unwrap();
        let pf = potfile_at(dir.path(), RunOptions::default(), mode.as_ref());
        let hash = "00112233445566778899aabbccddeeff:NaCl";
        std::fs::write(
            pf.path(),
            format!("00112233445566778899aabbccddeeff:pepper:wrong\n{}:s3cret\n", hash),
        )
        .unwrap();

        let mut cat = catalog_of(mode.as_ref(), &[hash]);
        let stats = pf.reconcile(&mut cat, mode.as_ref(), None).unwrap();
        assert_eq!(stats.unmatched, 1);
        assert_eq!(plain_of(&cat, mode.as_ref(), hash), Some(&b"s3cret"[..]));
    }

    #[test]
    fn composite_records_rebuild_digest_and_essid() {
        let dir = tempdir().unwrap();
        let wpa = builtin(2500).unwrap();
        let pf = potfile_at(dir.path(), RunOptions::default(), wpa.as_ref());
        let hash = "0123456789abcdef0123456789abcdef:001122334455:66778899aabb:lab net";
        // the potfile may carry the ESSID hex-encoded and other MACs; only digest and ESSID count
        std::fs::write(
            pf.path(),
            "0123456789abcdef0123456789abcdef:aaaaaaaaaaaa:bbbbbbbbbbbb:$HEX[6c6162206e6574]:wpapass\n\
             0123456789abcdef:001122334455:66778899aabb:lab net:short\n",
        )
        .unwrap();

        let mut cat = catalog_of(wpa.as_ref(), &[hash]);
        let stats = pf.reconcile(&mut cat, wpa.as_ref(), None).unwrap();
        assert_eq!(stats.malformed, 1);
        assert_eq!(plain_of(&cat, wpa.as_ref(), hash), Some(&b"wpapass"[..]));
    }

    #[test]
    fn salt_only_records_match_on_salt_bytes() {
        let dir = tempdir().unwrap();
        let mode = builtin(6800).unwrap();
        let pf = potfile_at(dir.path(), RunOptions::default(), mode.as_ref());
        let hash = "a2d1f7b7a1862d0d4a52644e72d59df5:500:lp@trash-mail.com";
        std::fs::write(pf.path(), "lp@trash-mail.com:139c3f8e\nnobody@example.com:x\n").unwrap();

        let mut cat = catalog_of(mode.as_ref(), &[hash]);
        let stats = pf.reconcile(&mut cat, mode.as_ref(), None).unwrap();
        assert_eq!(stats.unmatched, 1);
        assert_eq!(cat.entries()[0].plain(), Some(&b"139c3f8e"[..]));
    }

    #[test]
    fn lm_weak_half_is_marked_before_scanning() {
        let dir = tempdir().unwrap();
        let lm = builtin(LM_MODE).unwrap();
        let pf = potfile_at(dir.path(), RunOptions::default(), lm.as_ref());
        std::fs::write(pf.path(), "").unwrap();

        let mut cat = catalog_of(lm.as_ref(), &[LM_WEAK_HASH, "e52cac67419a9a22"]);
        let stats = pf.reconcile(&mut cat, lm.as_ref(), None).unwrap();
        assert_eq!(stats.cracked, 1);
        assert_eq!(plain_of(&cat, lm.as_ref(), LM_WEAK_HASH), Some(&b""[..]));
        assert_eq!(plain_of(&cat, lm.as_ref(), "e52cac67419a9a22"), None);
    }

    #[test]
    fn unsupported_modes_are_skipped() {
        let dir = tempdir().unwrap();
        let mode = RawHex {
            id: 9000,
            name: "Password Safe v2",
            digest_len: 16,
            always_ascii: false,
        };
        let pf = potfile_at(dir.path(), RunOptions::default(), &mode);
        std::fs::write(pf.path(), format!("{}:password\n", PASSWORD_MD5)).unwrap();

        let mut cat = catalog_of(&mode, &[PASSWORD_MD5]);
        let stats = pf.reconcile(&mut cat, &mode, None).unwrap();
        assert_eq!(stats, ReconcileStats::default());
        assert_eq!(cat.cracked_count(), 0);
    }

    #[test]
    fn new_cracks_are_forwarded_to_loopback() {
        let dir = tempdir().unwrap();
        let md5 = builtin(0).unwrap();
        let pf = potfile_at(dir.path(), RunOptions::default(), md5.as_ref());
        std::fs::write(pf.path(), format!("{0}:password\n{0}:password\n", PASSWORD_MD5)).unwrap();

        let mut cat = catalog_of(md5.as_ref(), &[PASSWORD_MD5]);
        let mut lb: Vec<Vec<u8>> = Vec::new();
        pf.reconcile(&mut cat, md5.as_ref(), Some(&mut lb)).unwrap();
        assert_eq!(lb, vec![b"password".to_vec()]);
    }

    #[test]
    fn unreadable_potfile_path_is_an_open_error() {
        let dir = tempdir().unwrap();
        let md5 = builtin(0).unwrap();
        let opts = RunOptions {
            potfile_path: Some(dir.path().to_path_buf()),
            ..RunOptions::default()
        };
        let pf = Potfile::init(&opts, dir.path(), md5.as_ref()).unwrap();
        let mut cat = catalog_of(md5.as_ref(), &[PASSWORD_MD5]);

        match pf.reconcile(&mut cat, md5.as_ref(), None) {
            Err(PotfileError::Open { path, source }) => {
                assert_eq!(path, dir.path());
                assert_eq!(source.kind(), io::ErrorKind::InvalidInput);
            }
            other => panic!("expected open error, got {:?}", other),
        }
        assert_eq!(cat.cracked_count(), 0);
    }

    #[test]
    fn read_error_ends_the_pass() {
        let dir = tempdir().unwrap();
        let md5 = builtin(0).unwrap();
        let pf = potfile_at(dir.path(), RunOptions::default(), md5.as_ref());
        let mut cat = catalog_of(md5.as_ref(), &[PASSWORD_MD5]);

        // a reader that keeps failing once it has failed
        let lines = std::iter::once(Ok(format!("{}:password", PASSWORD_MD5).into_bytes()))
            .chain(std::iter::repeat_with(|| Err(io::Error::other("device gone"))));
        let mut stats = ReconcileStats::default();
        let res = pf.scan_lines(&mut cat, md5.as_ref(), lines, &mut None, &mut stats);

        assert!(matches!(res, Err(PotfileError::Read { .. })));
        assert_eq!(stats.lines, 1);
        assert_eq!(plain_of(&cat, md5.as_ref(), PASSWORD_MD5), Some(&b"password"[..]));
    }

    #[test]
    fn reconciling_with_another_mode_is_rejected() {
        let dir = tempdir().unwrap();
        let md5 = builtin(0).unwrap();
        let sha1 = builtin(100).unwrap();
        let pf = potfile_at(dir.path(), RunOptions::default(), md5.as_ref());
        std::fs::write(pf.path(), format!("{}:password\n", PASSWORD_MD5)).unwrap();
        let mut cat = catalog_of(md5.as_ref(), &[PASSWORD_MD5]);

        let res = pf.reconcile(&mut cat, sha1.as_ref(), None);
        assert!(matches!(
            res,
            Err(PotfileError::ModeMismatch {
                expected: 0,
                actual: 100
            })
        ));
        assert_eq!(cat.cracked_count(), 0);
    }

    #[test]
    fn strategy_table() {
        assert_eq!(MatchStrategy::for_mode_id(5200), MatchStrategy::Unsupported);
        assert_eq!(MatchStrategy::for_mode_id(6242), MatchStrategy::Unsupported);
        assert_eq!(MatchStrategy::for_mode_id(13751), MatchStrategy::Unsupported);
        assert_eq!(MatchStrategy::for_mode_id(14600), MatchStrategy::Unsupported);
        assert_eq!(MatchStrategy::for_mode_id(6800), MatchStrategy::SaltOnly);
        assert_eq!(MatchStrategy::for_mode_id(2500), MatchStrategy::Composite);
        assert_eq!(MatchStrategy::for_mode_id(0), MatchStrategy::Generic);
        let salted = builtin(10).unwrap();
        assert_eq!(MatchPlan::for_mode(salted.as_ref()).comparator, Comparator::ByDigestAndSalt);
    }
}

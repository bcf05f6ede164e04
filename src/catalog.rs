//! In-memory hash catalog: the target hashes of a run, their crack state and
//! the orderings used to search them.
//!
//! A [`Catalog`] is always kept sorted under one [`Comparator`]. Entries are
//! grouped by salt so that reports can walk salts first and digests second.
//! The engine never adds or removes entries; it only calls
//! [`HashEntry::crack`] on them.
use std::cmp::Ordering;

use crate::bounded::{Bounded, CapacityError};

/// Largest salt, in bytes, a search key can carry.
pub const SALT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Salt {
    bytes: Bounded<SALT_CAPACITY>,
    iterations: u32,
}

impl Salt {
    pub fn new(bytes: &[u8], iterations: u32) -> Result<Self, CapacityError> {
        Ok(Self {
            bytes: Bounded::from_slice(bytes)?,
            iterations,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        self.bytes.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    fn cmp_bytes(&self, other: &Self) -> Ordering {
        self.len()
            .cmp(&other.len())
            .then_with(|| self.bytes().cmp(other.bytes()))
    }

    fn cmp_full(&self, other: &Self) -> Ordering {
        self.cmp_bytes(other)
            .then_with(|| self.iterations.cmp(&other.iterations))
    }
}

/// Output of a hash-mode parser, also used as the search key for a potfile line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedHash {
    pub digest: Vec<u8>,
    pub salt: Option<Salt>,
    pub esalt: Option<Vec<u8>>,
}

impl ParsedHash {
    pub fn unsalted(digest: Vec<u8>) -> Self {
        Self {
            digest,
            ..Self::default()
        }
    }

    pub fn salted(digest: Vec<u8>, salt: Salt) -> Self {
        Self {
            digest,
            salt: Some(salt),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitOrigin {
    None,
    Left,
    Right,
}

/// Pairing of the two independently crackable halves of a split hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitInfo {
    pub origin: SplitOrigin,
    /// Catalog index of the other half.
    pub neighbor: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashInfo {
    pub user: Option<Vec<u8>>,
    pub split: Option<SplitInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashEntry {
    pub hash: ParsedHash,
    pub info: Option<HashInfo>,
    cracked: bool,
    plain: Option<Vec<u8>>,
}

impl HashEntry {
    pub fn new(hash: ParsedHash) -> Self {
        Self {
            hash,
            info: None,
            cracked: false,
            plain: None,
        }
    }

    pub fn with_info(mut self, info: HashInfo) -> Self {
        self.info = Some(info);
        self
    }

    pub fn is_cracked(&self) -> bool {
        self.cracked
    }

    pub fn plain(&self) -> Option<&[u8]> {
        self.plain.as_deref()
    }

    pub fn user(&self) -> Option<&[u8]> {
        self.info.as_ref().and_then(|i| i.user.as_deref())
    }

    pub fn split(&self) -> Option<SplitInfo> {
        self.info.as_ref().and_then(|i| i.split)
    }

    /// Attach the recovered plaintext and mark the entry cracked. The first
    /// plaintext wins; returns `false` if the entry was already cracked.
    pub fn crack(&mut self, plain: &[u8]) -> bool {
        if self.cracked {
            return false;
        }
        self.plain = Some(plain.to_vec());
        self.cracked = true;
        true
    }
}

/// Ordering used to sort the catalog and to search it for a potfile key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    /// Digest bytes only.
    ByDigestOnly,
    /// Salt (length, bytes, iterations), then digest bytes.
    ByDigestAndSalt,
    /// Salt length, then salt bytes. For records that carry no digest.
    BySaltBytesOnly,
}

impl Comparator {
    /// The ordering a catalog of this saltedness is kept in.
    pub fn for_catalog(is_salted: bool) -> Self {
        if is_salted {
            Comparator::ByDigestAndSalt
        } else {
            Comparator::ByDigestOnly
        }
    }

    pub fn compare(self, a: &ParsedHash, b: &ParsedHash) -> Ordering {
        match self {
            Comparator::ByDigestOnly => a.digest.cmp(&b.digest),
            Comparator::ByDigestAndSalt => cmp_salt(a, b, Salt::cmp_full)
                .then_with(|| a.digest.cmp(&b.digest)),
            Comparator::BySaltBytesOnly => cmp_salt(a, b, Salt::cmp_bytes),
        }
    }
}

fn cmp_salt(a: &ParsedHash, b: &ParsedHash, f: fn(&Salt, &Salt) -> Ordering) -> Ordering {
    match (&a.salt, &b.salt) {
        (Some(x), Some(y)) => f(x, y),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
    }
}

/// A run of consecutive catalog entries sharing one salt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaltGroup {
    pub offset: usize,
    pub count: usize,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    entries: Vec<HashEntry>,
    groups: Vec<SaltGroup>,
    order: Comparator,
}

impl Catalog {
    /// Sort `entries` under `order` and index them by salt. Split neighbor
    /// indices are given against the input order and are remapped here.
    pub fn new(entries: Vec<HashEntry>, order: Comparator) -> Self {
        let n = entries.len();
        let mut perm: Vec<usize> = (0..n).collect();
        perm.sort_by(|&a, &b| order.compare(&entries[a].hash, &entries[b].hash));

        let mut new_pos = vec![0usize; n];
        for (new, &old) in perm.iter().enumerate() {
            new_pos[old] = new;
        }

        let mut slots: Vec<Option<HashEntry>> = entries.into_iter().map(Some).collect();
        let mut sorted = Vec::with_capacity(n);
        for &old in &perm {
            if let Some(mut e) = slots[old].take() {
                if let Some(split) = e.info.as_mut().and_then(|i| i.split.as_mut()) {
                    if let Some(&pos) = new_pos.get(split.neighbor) {
                        split.neighbor = pos;
                    }
                }
                sorted.push(e);
            }
        }

        let groups = group_by_salt(&sorted);
        Self {
            entries: sorted,
            groups,
            order,
        }
    }

    pub fn entries(&self) -> &[HashEntry] {
        &self.entries
    }

    pub fn entry(&self, idx: usize) -> Option<&HashEntry> {
        self.entries.get(idx)
    }

    pub fn entry_mut(&mut self, idx: usize) -> Option<&mut HashEntry> {
        self.entries.get_mut(idx)
    }

    pub fn groups(&self) -> &[SaltGroup] {
        &self.groups
    }

    pub fn order(&self) -> Comparator {
        self.order
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cracked_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_cracked()).count()
    }

    /// Binary search for an entry equal to `key` under `cmp`. `cmp` must agree
    /// with the catalog's own ordering.
    pub fn find(&self, cmp: Comparator, key: &ParsedHash) -> Option<usize> {
        self.entries
            .binary_search_by(|e| cmp.compare(&e.hash, key))
            .ok()
    }

    /// Every entry equal to `key` under `cmp`, by linear scan.
    pub fn find_all(&self, cmp: Comparator, key: &ParsedHash) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| cmp.compare(&e.hash, key) == Ordering::Equal)
            .map(|(i, _)| i)
            .collect()
    }

    /// Shown bitmap derived from the crack flags, indexed like `entries()`.
    pub fn shown_bitmap(&self) -> Vec<bool> {
        self.entries.iter().map(HashEntry::is_cracked).collect()
    }
}

fn group_by_salt(entries: &[HashEntry]) -> Vec<SaltGroup> {
    let mut groups: Vec<SaltGroup> = Vec::new();
    for (i, e) in entries.iter().enumerate() {
        match groups.last_mut() {
            Some(g) if entries[g.offset].hash.salt == e.hash.salt => g.count += 1,
            _ => groups.push(SaltGroup {
                offset: i,
                count: 1,
            }),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn salted(digest: &[u8], salt: &[u8]) -> HashEntry {
        HashEntry::new(ParsedHash::salted(
            digest.to_vec(),
            Salt::new(salt, 0).unwrap(),
        ))
    }

    #[test]
    fn crack_is_monotonic_and_first_plain_wins() {
        let mut e = HashEntry::new(ParsedHash::unsalted(vec![1, 2]));
        assert!(e.crack(b"first"));
        assert!(!e.crack(b"second"));
        assert!(e.is_cracked());
        assert_eq!(e.plain(), Some(&b"first"[..]));
    }

    #[test]
    fn salt_orders_by_length_before_content() {
        let short = ParsedHash::salted(vec![], Salt::new(b"zz", 0).unwrap());
        let long = ParsedHash::salted(vec![], Salt::new(b"aaa", 0).unwrap());
        assert_eq!(
            Comparator::BySaltBytesOnly.compare(&short, &long),
            Ordering::Less
        );
        assert_eq!(
            Comparator::ByDigestAndSalt.compare(&short, &long),
            Ordering::Less
        );
    }

    #[test]
    fn salt_bytes_only_ignores_digest_and_iterations() {
        let a = ParsedHash::salted(vec![9; 16], Salt::new(b"user@example", 5000).unwrap());
        let b = ParsedHash::salted(vec![], Salt::new(b"user@example", 0).unwrap());
        assert_eq!(Comparator::BySaltBytesOnly.compare(&a, &b), Ordering::Equal);
        assert_ne!(Comparator::ByDigestAndSalt.compare(&a, &b), Ordering::Equal);
    }

    #[test]
    fn groups_follow_salts() {
        let cat = Catalog::new(
            vec![
                salted(b"\x02", b"s1"),
                salted(b"\x01", b"s2"),
                salted(b"\x01", b"s1"),
            ],
            Comparator::ByDigestAndSalt,
        );
        assert_eq!(
            cat.groups(),
            &[
                SaltGroup { offset: 0, count: 2 },
                SaltGroup { offset: 2, count: 1 }
            ]
        );
        assert_eq!(cat.entries()[0].hash.digest, vec![1]);
    }

    #[test]
    fn sorting_remaps_split_neighbors() {
        let left = HashEntry::new(ParsedHash::unsalted(vec![0xff])).with_info(HashInfo {
            user: None,
            split: Some(SplitInfo {
                origin: SplitOrigin::Left,
                neighbor: 1,
            }),
        });
        let right = HashEntry::new(ParsedHash::unsalted(vec![0x00])).with_info(HashInfo {
            user: None,
            split: Some(SplitInfo {
                origin: SplitOrigin::Right,
                neighbor: 0,
            }),
        });
        let cat = Catalog::new(vec![left, right], Comparator::ByDigestOnly);
        assert_eq!(cat.entries()[1].split().unwrap().origin, SplitOrigin::Left);
        assert_eq!(cat.entries()[1].split().unwrap().neighbor, 0);
        assert_eq!(cat.entries()[0].split().unwrap().neighbor, 1);
    }

    #[test]
    fn find_all_returns_every_duplicate() {
        let cat = Catalog::new(
            vec![
                HashEntry::new(ParsedHash::unsalted(vec![7])),
                HashEntry::new(ParsedHash::unsalted(vec![3])),
                HashEntry::new(ParsedHash::unsalted(vec![7])),
            ],
            Comparator::ByDigestOnly,
        );
        let key = ParsedHash::unsalted(vec![7]);
        assert_eq!(cat.find_all(Comparator::ByDigestOnly, &key), vec![1, 2]);
        assert!(cat.find(Comparator::ByDigestOnly, &key).is_some());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn entry_strategy() -> impl Strategy<Value = (Vec<u8>, Vec<u8>)> {
            (
                prop::collection::vec(0u8..4, 0..3),
                prop::collection::vec(0u8..4, 0..6),
            )
        }

        fn build(raw: &[(Vec<u8>, Vec<u8>)]) -> Catalog {
            let entries = raw
                .iter()
                .map(|(d, s)| salted(d, s))
                .collect::<Vec<_>>();
            Catalog::new(entries, Comparator::ByDigestAndSalt)
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(256))]

            #[test]
            fn binary_search_finds_equal_or_nothing(
                raw in prop::collection::vec(entry_strategy(), 0..24),
                probe in entry_strategy(),
            ) {
                let cat = build(&raw);
                let key = salted(&probe.0, &probe.1).hash;
                let cmp = Comparator::ByDigestAndSalt;
                let exists = cat.entries().iter().any(|e| cmp.compare(&e.hash, &key) == Ordering::Equal);
                match cat.find(cmp, &key) {
                    Some(i) => prop_assert_eq!(cmp.compare(&cat.entries()[i].hash, &key), Ordering::Equal),
                    None => prop_assert!(!exists),
                }
            }

            #[test]
            fn salt_only_search_is_valid_on_salted_order(
                raw in prop::collection::vec(entry_strategy(), 0..24),
                probe in prop::collection::vec(0u8..4, 0..6),
            ) {
                let cat = build(&raw);
                let key = ParsedHash::salted(Vec::new(), Salt::new(&probe, 0).unwrap());
                let cmp = Comparator::BySaltBytesOnly;
                let exists = cat.entries().iter().any(|e| cmp.compare(&e.hash, &key) == Ordering::Equal);
                match cat.find(cmp, &key) {
                    Some(i) => prop_assert_eq!(cmp.compare(&cat.entries()[i].hash, &key), Ordering::Equal),
                    None => prop_assert!(!exists),
                }
            }
        }
    }
}

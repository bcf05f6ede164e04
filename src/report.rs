//! `show` / `left` reports over a reconciled catalog.
//!
//! Both walk the catalog salt by salt, digest by digest, and hand each
//! formatted record to an [`OutputSink`]. A record is
//! `[user SEP] digest [SEP plaintext]`, the plaintext only present in `show`
//! output and escaped like potfile plaintexts.
//!
//! Split hashes are reported as one record per pair, emitted from the left
//! half. `show` lists a pair as soon as either half is cracked, masking the
//! missing half; `left` keeps listing it until both halves are cracked.
use log::warn;

use crate::bounded::Bounded;
use crate::catalog::{Catalog, HashEntry, SplitOrigin};
use crate::hexify::HexPolicy;
use crate::mode::{HashMode, LM_MASKED_PLAIN};
use crate::sink::{OutputSink, ReportKind};

/// Room for two cracked LM halves or their masks.
pub const SPLIT_PLAIN_CAPACITY: usize = 20;

pub fn show(
    catalog: &Catalog,
    shown: &[bool],
    mode: &dyn HashMode,
    policy: &HexPolicy,
    sink: &mut dyn OutputSink,
) {
    walk(catalog, shown, mode, policy, ReportKind::Show, sink);
}

pub fn left(
    catalog: &Catalog,
    shown: &[bool],
    mode: &dyn HashMode,
    policy: &HexPolicy,
    sink: &mut dyn OutputSink,
) {
    walk(catalog, shown, mode, policy, ReportKind::Left, sink);
}

fn walk(
    catalog: &Catalog,
    shown: &[bool],
    mode: &dyn HashMode,
    policy: &HexPolicy,
    kind: ReportKind,
    sink: &mut dyn OutputSink,
) {
    let is_shown = |idx: usize| shown.get(idx).copied().unwrap_or(false);
    let mut out: Vec<u8> = Vec::new();

    for group in catalog.groups() {
        for idx in group.offset..group.offset + group.count {
            let Some(entry) = catalog.entry(idx) else {
                continue;
            };

            let split = entry.split().filter(|s| s.origin != SplitOrigin::None);
            let (digest, plain) = match split {
                None => {
                    let skip = match kind {
                        ReportKind::Show => !is_shown(idx),
                        ReportKind::Left => is_shown(idx),
                    };
                    if skip {
                        continue;
                    }
                    let plain = entry.plain().unwrap_or_default().to_vec();
                    (mode.format(&entry.hash), plain)
                }
                Some(s) if s.origin == SplitOrigin::Left => {
                    let Some(pair) = catalog.entry(s.neighbor) else {
                        warn!("split hash at {} has no neighbor at {}", idx, s.neighbor);
                        continue;
                    };
                    let (shown_l, shown_r) = (is_shown(idx), is_shown(s.neighbor));
                    let skip = match kind {
                        ReportKind::Show => !shown_l && !shown_r,
                        ReportKind::Left => shown_l && shown_r,
                    };
                    if skip {
                        continue;
                    }
                    let mut plain = Vec::new();
                    if kind == ReportKind::Show {
                        match split_plain(entry, shown_l, pair, shown_r) {
                            Some(p) => plain.extend_from_slice(p.as_bytes()),
                            None => {
                                warn!("split plaintext at {} exceeds {} bytes", idx, SPLIT_PLAIN_CAPACITY);
                                continue;
                            }
                        }
                    }
                    let mut digest = mode.format(&entry.hash);
                    digest.push_str(&mode.format(&pair.hash));
                    (digest, plain)
                }
                // right halves are folded into their left partner
                Some(_) => continue,
            };

            out.clear();
            if let Some(user) = entry.user() {
                out.extend_from_slice(user);
                out.push(policy.separator);
            }
            out.extend_from_slice(digest.as_bytes());
            if kind == ReportKind::Show {
                out.push(policy.separator);
                policy.write_plain(&mut out, &plain);
            }
            sink.emit(kind, &out);
        }
    }
}

fn split_plain(
    left: &HashEntry,
    shown_l: bool,
    right: &HashEntry,
    shown_r: bool,
) -> Option<Bounded<SPLIT_PLAIN_CAPACITY>> {
    let mut buf: Bounded<SPLIT_PLAIN_CAPACITY> = Bounded::new();
    for (entry, is_shown) in [(left, shown_l), (right, shown_r)] {
        let part = if is_shown {
            entry.plain().unwrap_or_default()
        } else {
            LM_MASKED_PLAIN.as_bytes()
        };
        buf.try_extend(part).ok()?;
    }
    Some(buf)
}

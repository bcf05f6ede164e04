//! `$HEX[...]` escaping of plaintexts.
//!
//! A plaintext is written raw unless it could not be read back unchanged:
//! it contains the field separator, bytes that are not printable for the
//! hash mode, or already looks like an escaped field.
const HEX_PREFIX: &[u8] = b"$HEX[";
const HEX_SUFFIX: u8 = b']';

/// Escaping rules shared by the potfile appender and the report generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HexPolicy {
    pub separator: u8,
    pub always_ascii: bool,
    pub autohex: bool,
}

impl HexPolicy {
    /// Append `plain` to `out`, escaped if the policy requires it.
    pub fn write_plain(&self, out: &mut Vec<u8>, plain: &[u8]) {
        if self.autohex && need_hexify(plain, self.separator, self.always_ascii) {
            out.extend_from_slice(HEX_PREFIX);
            out.extend_from_slice(hex::encode(plain).as_bytes());
            out.push(HEX_SUFFIX);
        } else {
            out.extend_from_slice(plain);
        }
    }
}

pub fn need_hexify(plain: &[u8], separator: u8, always_ascii: bool) -> bool {
    let printable = if always_ascii {
        plain.iter().all(|&b| (0x20..=0x7e).contains(&b))
    } else {
        !plain.iter().any(|&b| b < 0x20 || b == 0x7f) && std::str::from_utf8(plain).is_ok()
    };
    !printable || memchr::memchr(separator, plain).is_some() || is_hexify(plain)
}

/// True when `field` has the exact `$HEX[<even number of hex digits>]` shape.
pub fn is_hexify(field: &[u8]) -> bool {
    hex_body(field).is_some()
}

/// Decode an escaped field. Anything not in `$HEX[...]` form is returned
/// unchanged.
pub fn unhexify(field: &[u8]) -> Vec<u8> {
    match hex_body(field).and_then(|body| hex::decode(body).ok()) {
        Some(bytes) => bytes,
        None => field.to_vec(),
    }
}

fn hex_body(field: &[u8]) -> Option<&[u8]> {
    let body = field.strip_prefix(HEX_PREFIX)?.strip_suffix(&[HEX_SUFFIX])?;
    if body.len() % 2 != 0 || !body.iter().all(u8::is_ascii_hexdigit) {
        return None;
    }
    Some(body)
}

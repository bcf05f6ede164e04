//! Hash-mode collaborators: parsing hash text into a [`ParsedHash`] and
//! formatting it back to its ASCII digest form.
//!
//! The engine only relies on the [`HashMode`] trait. The built-in modes cover
//! the record shapes the potfile engine has to deal with (unsalted, salted,
//! split two-part, composite and salt-only) and are what the CLI uses.
use crate::catalog::{ParsedHash, SALT_CAPACITY, Salt};
use crate::hexify::{is_hexify, need_hexify, unhexify};

/// Legacy LM: 32 hex digits made of two independently crackable halves.
pub const LM_MODE: u32 = 3000;
/// Hex text of the LM half produced by an empty password.
pub const LM_WEAK_HASH: &str = "aad3b435b51404ee";
/// Placeholder for an uncracked LM half in `show` output.
pub const LM_MASKED_PLAIN: &str = "[notfound]";

pub const WPA_ROUNDS: u32 = 4096;
pub const WPA_ESSID_MAX: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("token length mismatch: expected {expected}, got {actual}")]
    Length { expected: usize, actual: usize },
    #[error("invalid hex encoding")]
    Hex,
    #[error("missing field separator")]
    Separator,
    #[error("salt too long: {0} bytes")]
    SaltLength(usize),
    #[error("invalid iteration count")]
    Iterations,
}

pub trait HashMode {
    fn id(&self) -> u32;

    fn name(&self) -> &'static str;

    /// Byte separating hash and plaintext in potfile records.
    fn separator(&self) -> u8 {
        b':'
    }

    fn is_salted(&self) -> bool;

    /// Plaintexts outside printable ASCII must be escaped.
    fn always_ascii(&self) -> bool {
        false
    }

    /// Upper bound on the length of `format` output.
    fn max_digest_text_len(&self) -> usize;

    fn parse(&self, input: &[u8]) -> Result<ParsedHash, ParseError>;

    fn format(&self, hash: &ParsedHash) -> String;
}

fn decode_hex(input: &[u8], bytes: usize) -> Result<Vec<u8>, ParseError> {
    if input.len() != bytes * 2 {
        return Err(ParseError::Length {
            expected: bytes * 2,
            actual: input.len(),
        });
    }
    hex::decode(input).map_err(|_| ParseError::Hex)
}

fn salt_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Unsalted digest given as plain hex.
#[derive(Debug, Clone, Copy)]
pub struct RawHex {
    pub id: u32,
    pub name: &'static str,
    pub digest_len: usize,
    pub always_ascii: bool,
}

impl HashMode for RawHex {
    fn id(&self) -> u32 {
        self.id
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn is_salted(&self) -> bool {
        false
    }

    fn always_ascii(&self) -> bool {
        self.always_ascii
    }

    fn max_digest_text_len(&self) -> usize {
        self.digest_len * 2
    }

    fn parse(&self, input: &[u8]) -> Result<ParsedHash, ParseError> {
        Ok(ParsedHash::unsalted(decode_hex(input, self.digest_len)?))
    }

    fn format(&self, hash: &ParsedHash) -> String {
        hex::encode(&hash.digest)
    }
}

/// `hexdigest:salt`, salt taken verbatim.
#[derive(Debug, Clone, Copy)]
pub struct SaltedHex {
    pub id: u32,
    pub name: &'static str,
    pub digest_len: usize,
}

impl HashMode for SaltedHex {
    fn id(&self) -> u32 {
        self.id
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn is_salted(&self) -> bool {
        true
    }

    fn max_digest_text_len(&self) -> usize {
        self.digest_len * 2 + 1 + SALT_CAPACITY
    }

    fn parse(&self, input: &[u8]) -> Result<ParsedHash, ParseError> {
        let sep = memchr::memchr(b':', input).ok_or(ParseError::Separator)?;
        let digest = decode_hex(&input[..sep], self.digest_len)?;
        let salt_bytes = &input[sep + 1..];
        let salt = Salt::new(salt_bytes, 0).map_err(|_| ParseError::SaltLength(salt_bytes.len()))?;
        Ok(ParsedHash::salted(digest, salt))
    }

    fn format(&self, hash: &ParsedHash) -> String {
        let salt = hash.salt.as_ref().map(|s| salt_text(s.bytes())).unwrap_or_default();
        format!("{}:{}", hex::encode(&hash.digest), salt)
    }
}

/// WPA handshake in text form: `digest:mac_ap:mac_sta:essid`.
///
/// The ESSID is the salt (optionally `$HEX[...]` encoded); the two MAC
/// addresses are carried in the extended salt and only matter for output.
#[derive(Debug, Clone, Copy, Default)]
pub struct Wpa;

impl Wpa {
    /// Length of `digest:mac_ap:mac_sta`.
    pub const PREFIX_LEN: usize = 32 + 1 + 12 + 1 + 12;
}

impl HashMode for Wpa {
    fn id(&self) -> u32 {
        2500
    }

    fn name(&self) -> &'static str {
        "WPA/WPA2"
    }

    fn is_salted(&self) -> bool {
        true
    }

    fn max_digest_text_len(&self) -> usize {
        Self::PREFIX_LEN + 1 + "$HEX[]".len() + WPA_ESSID_MAX * 2
    }

    fn parse(&self, input: &[u8]) -> Result<ParsedHash, ParseError> {
        if input.len() <= Self::PREFIX_LEN || input[Self::PREFIX_LEN] != b':' {
            return Err(ParseError::Separator);
        }
        let prefix = &input[..Self::PREFIX_LEN];
        if prefix[32] != b':' || prefix[45] != b':' {
            return Err(ParseError::Separator);
        }
        let digest = decode_hex(&prefix[..32], 16)?;
        let mut macs = decode_hex(&prefix[33..45], 6)?;
        macs.extend(decode_hex(&prefix[46..58], 6)?);

        let essid_field = &input[Self::PREFIX_LEN + 1..];
        let essid = if is_hexify(essid_field) {
            unhexify(essid_field)
        } else {
            essid_field.to_vec()
        };
        if essid.len() > WPA_ESSID_MAX {
            return Err(ParseError::SaltLength(essid.len()));
        }
        let salt =
            Salt::new(&essid, WPA_ROUNDS - 1).map_err(|_| ParseError::SaltLength(essid.len()))?;
        let mut hash = ParsedHash::salted(digest, salt);
        hash.esalt = Some(macs);
        Ok(hash)
    }

    fn format(&self, hash: &ParsedHash) -> String {
        let macs = hash.esalt.as_deref().unwrap_or(&[]);
        let (ap, sta) = macs.split_at(macs.len().min(6));
        let essid = hash.salt.as_ref().map(|s| s.bytes()).unwrap_or(&[]);
        let essid = if need_hexify(essid, b':', true) {
            format!("$HEX[{}]", hex::encode(essid))
        } else {
            salt_text(essid)
        };
        format!(
            "{}:{}:{}:{}",
            hex::encode(&hash.digest),
            hex::encode(ap),
            hex::encode(sta),
            essid
        )
    }
}

/// `digest:iterations:salt`. Its ASCII digest, and therefore its potfile
/// hash field, is the salt alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SaltOnlyDigest;

impl HashMode for SaltOnlyDigest {
    fn id(&self) -> u32 {
        6800
    }

    fn name(&self) -> &'static str {
        "LastPass + LastPass sniffed"
    }

    fn is_salted(&self) -> bool {
        true
    }

    fn max_digest_text_len(&self) -> usize {
        SALT_CAPACITY
    }

    fn parse(&self, input: &[u8]) -> Result<ParsedHash, ParseError> {
        let mut fields = input.splitn(3, |&b| b == b':');
        let digest = decode_hex(fields.next().unwrap_or_default(), 16)?;
        let iterations = fields
            .next()
            .and_then(|f| std::str::from_utf8(f).ok())
            .and_then(|f| f.parse::<u32>().ok())
            .ok_or(ParseError::Iterations)?;
        let salt_bytes = fields.next().ok_or(ParseError::Separator)?;
        let salt = Salt::new(salt_bytes, iterations)
            .map_err(|_| ParseError::SaltLength(salt_bytes.len()))?;
        Ok(ParsedHash::salted(digest, salt))
    }

    fn format(&self, hash: &ParsedHash) -> String {
        hash.salt.as_ref().map(|s| salt_text(s.bytes())).unwrap_or_default()
    }
}

/// Look up a built-in mode by its numeric id.
pub fn builtin(id: u32) -> Option<Box<dyn HashMode>> {
    let mode: Box<dyn HashMode> = match id {
        0 => Box::new(RawHex {
            id,
            name: "MD5",
            digest_len: 16,
            always_ascii: false,
        }),
        10 => Box::new(SaltedHex {
            id,
            name: "md5($pass.$salt)",
            digest_len: 16,
        }),
        100 => Box::new(RawHex {
            id,
            name: "SHA1",
            digest_len: 20,
            always_ascii: false,
        }),
        1000 => Box::new(RawHex {
            id,
            name: "NTLM",
            digest_len: 16,
            always_ascii: false,
        }),
        2500 => Box::new(Wpa),
        LM_MODE => Box::new(RawHex {
            id,
            name: "LM",
            digest_len: 8,
            always_ascii: true,
        }),
        6800 => Box::new(SaltOnlyDigest),
        _ => return None,
    };
    Some(mode)
}

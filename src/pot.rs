use crate::hexify::HexPolicy;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum PotError {
	#[error("malformed pot line: no separator")]
	MissingSeparator,
	#[error("malformed pot line: empty hash field")]
	EmptyHash,
}

/// One potfile line viewed as two ranges of the original buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PotRecord<'a> {
	pub hash: &'a [u8],
	pub plain: &'a [u8],
}

pub fn split_record(line: &[u8], separator: u8) -> Result<PotRecord<'_>, PotError> {
	// salted hash fields contain the separator themselves; plaintext may be empty
	let pos = memchr::memrchr(separator, line).ok_or(PotError::MissingSeparator)?;
	if pos == 0 {
		return Err(PotError::EmptyHash);
	}
	Ok(PotRecord {
		hash: &line[..pos],
		plain: &line[pos + 1..],
	})
}

/// Append `hash SEP plaintext-field` to `out`, without line terminator.
pub fn format_record(out: &mut Vec<u8>, hash_ascii: &str, plain: &[u8], policy: &HexPolicy) {
	out.extend_from_slice(hash_ascii.as_bytes());
	out.push(policy.separator);
	policy.write_plain(out, plain);
}

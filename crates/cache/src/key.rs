use sha2::{Digest, Sha256};

/// Longest input stored verbatim; anything longer is digested.
pub const LITERAL_MAX: usize = 31;

/// Cache key: a short literal kept verbatim, or a SHA-256 digest.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
	/// Raw key bytes, at most [`LITERAL_MAX`] of them.
	Literal { len: u8, bytes: [u8; LITERAL_MAX] },
	/// Fixed-size content digest of a longer input.
	Digest([u8; 32]),
}

impl CacheKey {
	/// Builds a key from arbitrary input bytes.
	pub fn new(input: &[u8]) -> Self {
		if input.len() <= LITERAL_MAX {
			let mut bytes = [0u8; LITERAL_MAX];
			bytes[..input.len()].copy_from_slice(input);
			Self::Literal {
				len: input.len() as u8,
				bytes,
			}
		} else {
			let digest = Sha256::digest(input);
			Self::Digest(digest.into())
		}
	}

	/// Builds a key from a text identifier.
	pub fn from_text(text: &str) -> Self {
		Self::new(text.as_bytes())
	}

	/// Hex rendering for diagnostics.
	pub fn to_hex(&self) -> String {
		let bytes: &[u8] = match self {
			Self::Literal { len, bytes } => &bytes[..*len as usize],
			Self::Digest(d) => d,
		};
		let mut out = String::with_capacity(bytes.len() * 2);
		for b in bytes {
			out.push_str(&format!("{b:02x}"));
		}
		out
	}
}

impl std::fmt::Debug for CacheKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Literal { len, bytes } => {
				let raw = &bytes[..*len as usize];
				match std::str::from_utf8(raw) {
					Ok(s) => write!(f, "Literal({s:?})"),
					Err(_) => write!(f, "Literal(0x{})", self.to_hex()),
				}
			}
			Self::Digest(_) => write!(f, "Digest(0x{})", self.to_hex()),
		}
	}
}

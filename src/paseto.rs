//! PASETO tokens: `v<N>.<purpose>.<payload>[.<footer>]`.
//!
//! [`Token`] only deals with the *shape* of a token: which version and purpose it claims, and
//! the (base64url, unpadded) payload and footer.  Actually creating and checking tokens is done
//! by the version-specific modules, of which there is currently just [`v4`].
use std::sync::OnceLock;

use super::{Encoding, Error};

pub mod v4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Version {
	V1,
	V2,
	V3,
	V4,
}

impl Version {
	fn from_tag(tag: &str) -> Option<Self> {
		match tag {
			"v1" => Some(Self::V1),
			"v2" => Some(Self::V2),
			"v3" => Some(Self::V3),
			"v4" => Some(Self::V4),
			_ => None,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::V1 => "v1",
			Self::V2 => "v2",
			Self::V3 => "v3",
			Self::V4 => "v4",
		}
	}
}

impl std::fmt::Display for Version {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Purpose {
	/// Symmetrically encrypted
	Local,
	/// Signed, but readable by anyone
	Public,
}

impl Purpose {
	fn from_tag(tag: &str) -> Option<Self> {
		match tag {
			"local" => Some(Self::Local),
			"public" => Some(Self::Public),
			_ => None,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Local => "local",
			Self::Public => "public",
		}
	}
}

impl std::fmt::Display for Purpose {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A syntactically valid PASETO token.
///
/// Nothing about the token has been verified; it has merely been found to have the right shape.
/// The footer is only decoded the first time it's asked for.
#[derive(Clone, Debug)]
pub struct Token {
	version: Version,
	purpose: Purpose,
	payload: String,
	footer: Option<String>,
	decoded_footer: OnceLock<Option<Vec<u8>>>,
}

impl Token {
	/// Assemble a token from raw (not yet encoded) payload and footer bytes.  An empty footer is
	/// left off entirely.
	///
	/// # Errors
	///
	/// [`Error::InvalidToken`] if `payload` is empty, since no token can have an empty payload.
	pub fn new(
		version: Version,
		purpose: Purpose,
		payload: impl AsRef<[u8]>,
		footer: impl AsRef<[u8]>,
	) -> Result<Self, Error> {
		let payload = payload.as_ref();
		let footer = footer.as_ref();

		if payload.is_empty() {
			return Err(Error::InvalidToken);
		}

		Ok(Self {
			version,
			purpose,
			payload: Encoding::Base64UrlNoPadding.encode(payload),
			footer: (!footer.is_empty()).then(|| Encoding::Base64UrlNoPadding.encode(footer)),
			decoded_footer: OnceLock::from(Some(footer.to_vec())),
		})
	}

	/// Check `token` against the PASETO grammar, and pull it apart.
	///
	/// # Errors
	///
	/// [`Error::InvalidToken`] for anything that isn't
	/// `v(1|2|3|4).(local|public).<base64url>[.<base64url>]`.
	#[tracing::instrument(level = "trace", skip(token))]
	pub fn parse(token: &str) -> Result<Self, Error> {
		let mut parts = token.split('.');

		let version = parts.next().and_then(Version::from_tag);
		let purpose = parts.next().and_then(Purpose::from_tag);
		let payload = parts.next().filter(|p| is_segment(p));
		let footer = parts.next();
		let extra = parts.next();

		let (Some(version), Some(purpose), Some(payload), None) = (version, purpose, payload, extra)
		else {
			return Err(Error::InvalidToken);
		};

		if footer.is_some_and(|f| !is_segment(f)) {
			return Err(Error::InvalidToken);
		}

		Ok(Self {
			version,
			purpose,
			payload: payload.to_string(),
			footer: footer.map(str::to_string),
			decoded_footer: OnceLock::new(),
		})
	}

	pub fn version(&self) -> Version {
		self.version
	}

	pub fn purpose(&self) -> Purpose {
		self.purpose
	}

	/// The `v4.local.` bit at the front of the token.
	pub fn header(&self) -> String {
		header(self.version, self.purpose)
	}

	/// The payload, still base64url-encoded.
	pub fn payload(&self) -> &str {
		&self.payload
	}

	pub fn decode_payload(&self) -> Result<Vec<u8>, Error> {
		Encoding::Base64UrlNoPadding
			.decode(&self.payload)
			.map(|p| p.to_vec())
			.map_err(|_| Error::InvalidToken)
	}

	/// The footer as it appears in the token, or `""` if there isn't one.
	pub fn footer_raw(&self) -> &str {
		self.footer.as_deref().unwrap_or_default()
	}

	/// The decoded footer; empty if the token has no footer.
	pub fn footer(&self) -> Result<&[u8], Error> {
		self.decoded_footer
			.get_or_init(|| match &self.footer {
				None => Some(Vec::new()),
				Some(f) => Encoding::Base64UrlNoPadding.decode(f).ok().map(|f| f.to_vec()),
			})
			.as_deref()
			.ok_or(Error::InvalidToken)
	}
}

impl PartialEq for Token {
	fn eq(&self, other: &Self) -> bool {
		self.version == other.version
			&& self.purpose == other.purpose
			&& self.payload == other.payload
			&& self.footer == other.footer
	}
}

impl Eq for Token {}

impl std::str::FromStr for Token {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Error> {
		Self::parse(s)
	}
}

impl std::fmt::Display for Token {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}.{}.{}", self.version, self.purpose, self.payload)?;

		if let Some(footer) = &self.footer {
			write!(f, ".{footer}")?;
		}

		Ok(())
	}
}

fn is_segment(s: &str) -> bool {
	!s.is_empty()
		&& s
			.bytes()
			.all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

pub(crate) fn header(version: Version, purpose: Purpose) -> String {
	format!("{version}.{purpose}.")
}

/// Pre-Authentication Encoding: an unambiguous encoding of a list of byte strings, so that
/// `["ab", "c"]` and `["a", "bc"]` don't end up MACed or signed as the same thing.
pub fn pae(pieces: &[&[u8]]) -> Vec<u8> {
	let mut out = Vec::with_capacity(8 + pieces.iter().map(|p| 8 + p.len()).sum::<usize>());

	out.extend_from_slice(&le64(pieces.len()));
	for piece in pieces {
		out.extend_from_slice(&le64(piece.len()));
		out.extend_from_slice(piece);
	}

	out
}

// The top bit is always clear, for the sake of languages without unsigned integers
fn le64(n: usize) -> [u8; 8] {
	(n as u64 & (u64::MAX >> 1)).to_le_bytes()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn minimal_token() {
		let t: Token = "v4.local.AAAA".parse().unwrap();

		assert_eq!(Version::V4, t.version());
		assert_eq!(Purpose::Local, t.purpose());
		assert_eq!("AAAA", t.payload());
		assert_eq!(vec![0u8; 3], t.decode_payload().unwrap());
		assert_eq!("", t.footer_raw());
		assert_eq!(b"", t.footer().unwrap());
		assert_eq!("v4.local.", t.header());
	}

	#[test]
	fn token_with_footer() {
		let t = Token::parse("v4.local.AAAA.Zm9v").unwrap();

		assert_eq!("Zm9v", t.footer_raw());
		assert_eq!(b"foo", t.footer().unwrap());
		// Second time around comes from the cache
		assert_eq!(b"foo", t.footer().unwrap());
	}

	#[test]
	fn every_version_and_purpose() {
		for v in ["v1", "v2", "v3", "v4"] {
			for p in ["local", "public"] {
				let s = format!("{v}.{p}.abc-_XYZ019");
				let t = Token::parse(&s).unwrap();
				assert_eq!(s, t.to_string());
			}
		}
	}

	#[test]
	fn malformed_tokens() {
		for bad in [
			"",
			"v5.local.x",
			"v4.custom.x",
			"v0.local.x",
			"V4.local.x",
			"v4.local",
			"v4.local.",
			"v4.local.x.",
			"v4.local.x.y.z",
			"v4.local.a+b",
			"v4.local.ab==",
			"v4..x",
			" v4.local.x",
		] {
			assert!(matches!(Token::parse(bad), Err(Error::InvalidToken)), "{bad:?}");
		}

		assert_eq!("Invalid Token", Token::parse("").unwrap_err().to_string());
	}

	#[test]
	fn undecodable_footer() {
		// Valid characters, impossible length
		let t = Token::parse("v4.local.AAAA.A").unwrap();

		assert!(matches!(t.footer(), Err(Error::InvalidToken)));
		assert!(matches!(t.footer(), Err(Error::InvalidToken)));
	}

	#[test]
	fn built_tokens_round_trip() {
		let t = Token::new(Version::V4, Purpose::Public, b"payload", b"{\"kid\":\"1\"}").unwrap();
		let s = t.to_string();

		let parsed = Token::parse(&s).unwrap();
		assert_eq!(t, parsed);
		assert_eq!(b"payload".to_vec(), parsed.decode_payload().unwrap());
		assert_eq!(b"{\"kid\":\"1\"}", parsed.footer().unwrap());

		let bare = Token::new(Version::V4, Purpose::Local, b"x", b"").unwrap();
		assert_eq!(3, bare.to_string().split('.').count());
	}

	#[test]
	fn empty_payloads_are_refused() {
		assert!(matches!(
			Token::new(Version::V4, Purpose::Local, b"", b""),
			Err(Error::InvalidToken)
		));
		assert!(matches!(
			Token::new(Version::V4, Purpose::Public, b"", b"footer"),
			Err(Error::InvalidToken)
		));

		// The smallest payload there is still round-trips
		let t = Token::new(Version::V4, Purpose::Local, [0u8], b"").unwrap();
		assert_eq!(t, Token::parse(&t.to_string()).unwrap());
	}

	#[test]
	fn pae_known_answers() {
		assert_eq!(b"\x00\x00\x00\x00\x00\x00\x00\x00".to_vec(), pae(&[]));
		assert_eq!(
			b"\x01\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00".to_vec(),
			pae(&[b""])
		);
		assert_eq!(
			b"\x01\x00\x00\x00\x00\x00\x00\x00\x04\x00\x00\x00\x00\x00\x00\x00test".to_vec(),
			pae(&[b"test"])
		);
		assert_ne!(pae(&[b"ab", b"c"]), pae(&[b"a", b"bc"]));
	}
}

//! Message digests.
//!
//! [`HashAlgorithm`] is a closed list of the hash functions we are willing to compute.  What we
//! know about each one (how big its output is, whether it's meant for cryptographic use, and
//! whether it's been broken) lives in a single static table, so adding an algorithm means adding
//! one enum case and one row.
use blake2::{Blake2b, Blake2b512, Blake2s256};
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest as _, Sha256, Sha384, Sha512, Sha512_256};
use typenum::U32;

use super::{Encoding, Error, PublicMaterial};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(try_from = "String", into = "String")]
pub enum HashAlgorithm {
	Md5,
	Sha1,
	Sha256,
	Sha384,
	Sha512,
	Sha512_256,
	Blake2b256,
	Blake2b512,
	Blake2s256,
	Crc32,
}

/// Everything there is to know about a [`HashAlgorithm`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HashInfo {
	pub name: &'static str,
	pub digest_bytes: usize,
	pub is_cryptographic: bool,
	pub is_broken: bool,
}

// Must stay in the same order as the HashAlgorithm cases
static HASH_INFO: [(HashAlgorithm, HashInfo); 10] = [
	(HashAlgorithm::Md5, info("md5", 16, true, true)),
	(HashAlgorithm::Sha1, info("sha1", 20, true, true)),
	(HashAlgorithm::Sha256, info("sha256", 32, true, false)),
	(HashAlgorithm::Sha384, info("sha384", 48, true, false)),
	(HashAlgorithm::Sha512, info("sha512", 64, true, false)),
	(HashAlgorithm::Sha512_256, info("sha512/256", 32, true, false)),
	(HashAlgorithm::Blake2b256, info("blake2b-256", 32, true, false)),
	(HashAlgorithm::Blake2b512, info("blake2b-512", 64, true, false)),
	(HashAlgorithm::Blake2s256, info("blake2s-256", 32, true, false)),
	(HashAlgorithm::Crc32, info("crc32", 4, false, false)),
];

const fn info(
	name: &'static str,
	digest_bytes: usize,
	is_cryptographic: bool,
	is_broken: bool,
) -> HashInfo {
	HashInfo {
		name,
		digest_bytes,
		is_cryptographic,
		is_broken,
	}
}

impl HashAlgorithm {
	pub fn all() -> impl Iterator<Item = HashAlgorithm> {
		HASH_INFO.iter().map(|(alg, _)| *alg)
	}

	pub fn info(self) -> &'static HashInfo {
		&HASH_INFO[self as usize].1
	}

	pub fn name(self) -> &'static str {
		self.info().name
	}

	pub fn digest_bytes(self) -> usize {
		self.info().digest_bytes
	}

	pub fn is_cryptographic(self) -> bool {
		self.info().is_cryptographic
	}

	pub fn is_broken(self) -> bool {
		self.info().is_broken
	}

	/// Usable for anything security-related.
	pub fn is_secure(self) -> bool {
		self.is_cryptographic() && !self.is_broken()
	}

	pub fn from_name(name: &str) -> Result<Self, Error> {
		HASH_INFO
			.iter()
			.find(|(_, info)| info.name == name)
			.map(|(alg, _)| *alg)
			.ok_or_else(|| Error::unsupported_algorithm(name))
	}

	#[tracing::instrument(level = "trace", skip(data))]
	pub fn digest(self, data: impl AsRef<[u8]>) -> MessageDigest {
		let data = data.as_ref();

		let bytes = match self {
			Self::Md5 => Md5::digest(data).to_vec(),
			Self::Sha1 => Sha1::digest(data).to_vec(),
			Self::Sha256 => Sha256::digest(data).to_vec(),
			Self::Sha384 => Sha384::digest(data).to_vec(),
			Self::Sha512 => Sha512::digest(data).to_vec(),
			Self::Sha512_256 => Sha512_256::digest(data).to_vec(),
			Self::Blake2b256 => Blake2b::<U32>::digest(data).to_vec(),
			Self::Blake2b512 => Blake2b512::digest(data).to_vec(),
			Self::Blake2s256 => Blake2s256::digest(data).to_vec(),
			Self::Crc32 => crc32fast::hash(data).to_be_bytes().to_vec(),
		};

		MessageDigest {
			algorithm: self,
			bytes,
		}
	}
}

impl std::fmt::Display for HashAlgorithm {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.name())
	}
}

impl std::str::FromStr for HashAlgorithm {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Error> {
		Self::from_name(s)
	}
}

impl TryFrom<String> for HashAlgorithm {
	type Error = Error;

	fn try_from(s: String) -> Result<Self, Error> {
		Self::from_name(&s)
	}
}

impl From<HashAlgorithm> for String {
	fn from(alg: HashAlgorithm) -> String {
		alg.name().to_string()
	}
}

/// The output of a [`HashAlgorithm`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MessageDigest {
	algorithm: HashAlgorithm,
	bytes: Vec<u8>,
}

impl MessageDigest {
	/// Wrap an existing digest value, such as one received from elsewhere.
	pub fn from_bytes(algorithm: HashAlgorithm, bytes: impl Into<Vec<u8>>) -> Result<Self, Error> {
		let bytes = bytes.into();

		if bytes.len() != algorithm.digest_bytes() {
			return Err(Error::invalid_length(algorithm.digest_bytes(), bytes.len()));
		}

		Ok(Self { algorithm, bytes })
	}

	pub fn import(
		algorithm: HashAlgorithm,
		text: impl AsRef<[u8]>,
		encoding: Encoding,
	) -> Result<Self, Error> {
		Self::from_bytes(algorithm, encoding.decode(text)?.to_vec())
	}

	pub fn algorithm(&self) -> HashAlgorithm {
		self.algorithm
	}

	pub fn to_hex(&self) -> String {
		self.export(Encoding::Hex)
	}

	/// Compare against another digest without leaking timing information about where they
	/// differ.
	pub fn ct_eq(&self, other: &MessageDigest) -> bool {
		self.algorithm == other.algorithm
			&& constant_time_eq::constant_time_eq(&self.bytes, &other.bytes)
	}
}

impl PublicMaterial for MessageDigest {
	fn as_bytes(&self) -> &[u8] {
		&self.bytes
	}
}

impl AsRef<[u8]> for MessageDigest {
	fn as_ref(&self) -> &[u8] {
		&self.bytes
	}
}

impl std::fmt::Display for MessageDigest {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.to_hex())
	}
}

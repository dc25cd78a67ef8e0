use base64::{
	Engine as _,
	engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD},
};
use zeroize::Zeroizing;

use super::Error;

/// The text encodings that binary values can be exported to, and imported from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
pub enum Encoding {
	#[serde(rename = "hex")]
	Hex,
	#[serde(rename = "base64")]
	Base64,
	#[default]
	#[serde(rename = "base64url")]
	Base64Url,
	#[serde(rename = "base64url-nopad")]
	Base64UrlNoPadding,
}

impl Encoding {
	pub fn name(self) -> &'static str {
		match self {
			Self::Hex => "hex",
			Self::Base64 => "base64",
			Self::Base64Url => "base64url",
			Self::Base64UrlNoPadding => "base64url-nopad",
		}
	}

	pub fn encode(self, bytes: impl AsRef<[u8]>) -> String {
		let bytes = bytes.as_ref();

		match self {
			Self::Hex => hex::encode(bytes),
			Self::Base64 => STANDARD.encode(bytes),
			Self::Base64Url => URL_SAFE.encode(bytes),
			Self::Base64UrlNoPadding => URL_SAFE_NO_PAD.encode(bytes),
		}
	}

	/// Decode `text`.
	///
	/// The decoded bytes may well be secret, so they come back in a buffer that is zeroed when it
	/// is dropped.
	pub fn decode(self, text: impl AsRef<[u8]>) -> Result<Zeroizing<Vec<u8>>, Error> {
		let text = text.as_ref();

		let decoded = match self {
			Self::Hex => hex::decode(text).map_err(|e| e.to_string()),
			Self::Base64 => STANDARD.decode(text).map_err(|e| e.to_string()),
			Self::Base64Url => URL_SAFE.decode(text).map_err(|e| e.to_string()),
			Self::Base64UrlNoPadding => URL_SAFE_NO_PAD.decode(text).map_err(|e| e.to_string()),
		};

		decoded
			.map(Zeroizing::new)
			.map_err(|cause| Error::invalid_encoding(self.name(), cause))
	}
}

impl std::fmt::Display for Encoding {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.name())
	}
}

impl std::str::FromStr for Encoding {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Error> {
		match s {
			"hex" => Ok(Self::Hex),
			"base64" => Ok(Self::Base64),
			"base64url" => Ok(Self::Base64Url),
			"base64url-nopad" => Ok(Self::Base64UrlNoPadding),
			other => Err(Error::invalid_encoding(
				"encoding name",
				format!("unknown encoding {other:?}"),
			)),
		}
	}
}

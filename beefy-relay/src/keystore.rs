// Copyright (C) 2021 Parity Technologies (UK) Ltd.
// SPDX-License-Identifier: GPL-3.0-or-later WITH Classpath-exception-2.0

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! The key foreign chain transactions are signed with.

use std::{fmt, fs, path::Path};

use beefy_primitives::{
	crypto::{address_of, sign_prehashed, Signature},
	keccak_256, H160, H256,
};

use crate::error::Error;

/// A transaction signing key.
#[derive(Clone)]
pub struct Signer {
	secret: libsecp256k1::SecretKey,
	address: H160,
}

impl fmt::Debug for Signer {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "Signer({:?})", self.address)
	}
}

impl Signer {
	/// Wrap a secret key.
	pub fn new(secret: libsecp256k1::SecretKey) -> Self {
		let address = address_of(&libsecp256k1::PublicKey::from_secret_key(&secret));
		Signer { secret, address }
	}

	/// Parse a hex encoded secret key, with or without `0x` prefix.
	pub fn from_hex(encoded: &str) -> Result<Self, Error> {
		let encoded = encoded.trim();
		let encoded = encoded.strip_prefix("0x").unwrap_or(encoded);

		let raw = hex::decode(encoded).map_err(|e| Error::Credential(e.to_string()))?;
		let secret = libsecp256k1::SecretKey::parse_slice(&raw).map_err(|e| Error::Credential(e.to_string()))?;

		Ok(Signer::new(secret))
	}

	/// Read a hex encoded secret key from `path`.
	pub fn from_file(path: &Path) -> Result<Self, Error> {
		let encoded =
			fs::read_to_string(path).map_err(|e| Error::Credential(format!("{}: {}", path.display(), e)))?;
		Self::from_hex(&encoded)
	}

	/// Read a hex encoded secret key from the environment variable `var`.
	pub fn from_env(var: &str) -> Result<Self, Error> {
		let encoded = std::env::var(var).map_err(|e| Error::Credential(format!("{}: {}", var, e)))?;
		Self::from_hex(&encoded)
	}

	/// Address of the key.
	pub fn address(&self) -> H160 {
		self.address
	}

	/// Sign the keccak-256 hash of `message`.
	pub fn sign(&self, message: &[u8]) -> Signature {
		sign_prehashed(&self.secret, &H256(keccak_256(message)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use beefy_primitives::crypto::recover_address;

	const ALICE: &str = "0xe5be9a5092b81bca64be81d212e7f2f9eba183bb7a90954f7b76361f6edb5c0a";

	#[test]
	fn sign_works() {
		// given
		let signer = Signer::from_hex(ALICE).unwrap();
		let msg = b"are you involved or committed?";

		// when
		let sig = signer.sign(msg);

		// then
		assert_eq!(recover_address(&H256(keccak_256(msg)), &sig), Some(signer.address()));
		assert_eq!(
			Signer::from_hex(ALICE.trim_start_matches("0x")).unwrap().address(),
			signer.address()
		);
	}

	#[test]
	fn bad_credentials_are_rejected() {
		assert!(matches!(Signer::from_hex("0xzz"), Err(Error::Credential(_))));
		assert!(matches!(Signer::from_hex("0x0102"), Err(Error::Credential(_))));
		assert!(matches!(
			Signer::from_hex("0x0000000000000000000000000000000000000000000000000000000000000000"),
			Err(Error::Credential(_))
		));
		assert!(matches!(
			Signer::from_env("BEEFY_RELAY_TEST_SURELY_UNSET_VARIABLE"),
			Err(Error::Credential(_))
		));
		assert!(matches!(
			Signer::from_file(Path::new("/nonexistent/beefy-relay/key")),
			Err(Error::Credential(_))
		));
	}
}

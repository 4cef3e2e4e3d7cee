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

use beefy_primitives::{
	crypto::{self, address_of},
	keccak_256, H160, H256,
};
use beefy_relay::Signer;

/// Set of test accounts, usable as validators and as relayers.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumIter)]
pub enum Keyring {
	Alice,
	Bob,
	Charlie,
	Dave,
	Eve,
	Ferdie,
	One,
	Two,
}

impl Keyring {
	/// Sign the keccak-256 hash of `msg`.
	pub fn sign(self, msg: &[u8]) -> crypto::Signature {
		self.sign_prehashed(&H256(keccak_256(msg)))
	}

	/// Sign a 32 byte hash.
	pub fn sign_prehashed(self, hash: &H256) -> crypto::Signature {
		crypto::sign_prehashed(&self.secret(), hash)
	}

	/// Return the secret key, derived from the seed string.
	pub fn secret(self) -> libsecp256k1::SecretKey {
		let mut seed = keccak_256(self.to_seed().as_bytes());
		// rehash until the digest is a valid scalar
		loop {
			if let Ok(secret) = libsecp256k1::SecretKey::parse(&seed) {
				return secret;
			}
			seed = keccak_256(&seed);
		}
	}

	/// Return public key.
	pub fn public(self) -> libsecp256k1::PublicKey {
		libsecp256k1::PublicKey::from_secret_key(&self.secret())
	}

	/// Return the Ethereum address.
	pub fn address(self) -> H160 {
		address_of(&self.public())
	}

	/// Return a transaction signer holding the key.
	pub fn signer(self) -> Signer {
		Signer::new(self.secret())
	}

	/// Return seed string.
	pub fn to_seed(self) -> String {
		format!("//{}", self)
	}

	/// Iterator over all test accounts
	pub fn iter() -> impl (Iterator<Item = Keyring>) {
		<Self as strum::IntoEnumIterator>::iter()
	}
}

/// Addresses of `keys`, in order.
pub fn addresses(keys: &[Keyring]) -> Vec<H160> {
	keys.iter().map(|k| k.address()).collect()
}

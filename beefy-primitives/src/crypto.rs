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

//! secp256k1 helpers: signing, public key recovery and Ethereum addresses.
//!
//! BEEFY validators sign the keccak-256 hash of a SCALE encoded commitment. The foreign chain
//! identifies a validator by the Ethereum address derived from its uncompressed public key.

use crate::{keccak_256, H160, H256};
use codec::{Decode, Encode};
use core::fmt;

/// An ECDSA signature in `r ++ s ++ v` form.
///
/// `v` is either the raw recovery id (`0`/`1`) or the Ethereum flavour (`27`/`28`).
#[derive(Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct Signature(pub [u8; 65]);

impl fmt::Debug for Signature {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "Signature(0x{})", hex::encode(&self.0[..]))
	}
}

impl Signature {
	/// Build a signature from its Ethereum components.
	pub fn from_rsv(r: H256, s: H256, v: u8) -> Self {
		let mut raw = [0u8; 65];
		raw[..32].copy_from_slice(r.as_bytes());
		raw[32..64].copy_from_slice(s.as_bytes());
		raw[64] = v;
		Signature(raw)
	}

	/// `r` component.
	pub fn r(&self) -> H256 {
		H256::from_slice(&self.0[..32])
	}

	/// `s` component.
	pub fn s(&self) -> H256 {
		H256::from_slice(&self.0[32..64])
	}

	/// Recovery id in Ethereum form (`27` or `28`).
	pub fn v(&self) -> u8 {
		match self.0[64] {
			v @ 0..=3 => v + 27,
			v => v,
		}
	}
}

/// Sign a 32 byte message hash, the hash is not hashed again.
pub fn sign_prehashed(secret: &libsecp256k1::SecretKey, message_hash: &H256) -> Signature {
	let message = libsecp256k1::Message::parse(message_hash.as_fixed_bytes());
	let (signature, recovery_id) = libsecp256k1::sign(&message, secret);

	let mut raw = [0u8; 65];
	raw[..64].copy_from_slice(&signature.serialize());
	raw[64] = recovery_id.serialize();
	Signature(raw)
}

/// Recover the Ethereum address which produced `signature` over `message_hash`.
///
/// High-s (malleable) signatures and malformed recovery ids are rejected with `None`.
pub fn recover_address(message_hash: &H256, signature: &Signature) -> Option<H160> {
	let message = libsecp256k1::Message::parse(message_hash.as_fixed_bytes());

	let mut rs = [0u8; 64];
	rs.copy_from_slice(&signature.0[..64]);
	let parsed = libsecp256k1::Signature::parse_standard(&rs).ok()?;
	if parsed.s.is_high() {
		return None;
	}

	let recovery_id = libsecp256k1::RecoveryId::parse(signature.v().checked_sub(27)?).ok()?;
	let public = libsecp256k1::recover(&message, &parsed, &recovery_id).ok()?;

	Some(address_of(&public))
}

/// Ethereum address of a public key: last 20 bytes of the keccak-256 of the uncompressed key.
pub fn address_of(public: &libsecp256k1::PublicKey) -> H160 {
	let uncompressed = public.serialize();
	let hash = keccak_256(&uncompressed[1..]);
	H160::from_slice(&hash[12..])
}

/// Uncompress a 33 byte compressed public key, as found in BEEFY authority ids.
pub fn uncompress(compressed: &[u8]) -> Result<libsecp256k1::PublicKey, libsecp256k1::Error> {
	libsecp256k1::PublicKey::parse_slice(compressed, Some(libsecp256k1::PublicKeyFormat::Compressed))
}

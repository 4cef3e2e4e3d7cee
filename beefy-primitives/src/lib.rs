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

#![warn(missing_docs)]

//! Primitives shared by the BEEFY light client verifier and the relay.
//!
//! Everything in here is a pure data type or a pure function, so it can be used on both
//! sides of the bridge and reproduced bit-for-bit by an independent implementation.

pub mod bitfield;
pub mod commitment;
pub mod crypto;
pub mod message;
pub mod mmr;
pub mod parachain;
pub mod validator;

pub use commitment::{BeefyPayloadId, Commitment, PayloadItem, SignedCommitment, MMR_ROOT_ID};
pub use primitive_types::{H160, H256, U256};
pub use validator::{ValidatorProof, ValidatorSet};

use beefy_merkle_tree::{Hasher, Keccak256};

/// A typedef for validator set id.
pub type ValidatorSetId = u64;

/// The `ValidatorSetId` of the first validator set a light client is initialised with.
pub const GENESIS_AUTHORITY_SET_ID: ValidatorSetId = 0;

/// Compute the keccak-256 hash of `data`.
pub fn keccak_256(data: &[u8]) -> [u8; 32] {
	Keccak256::hash(data)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn keccak_of_empty_input() {
		assert_eq!(
			keccak_256(&[]),
			hex_literal::hex!("c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470")
		);
	}
}

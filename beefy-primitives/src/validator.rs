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

//! Validator set commitments as seen by the foreign chain.

use crate::{
	crypto::{recover_address, Signature},
	ValidatorSetId, H160, H256,
};
use beefy_merkle_tree::{merkle_proof, merkle_root, verify_proof, Keccak256, Leaf};
use codec::{Decode, Encode};

/// A BEEFY validator set, committed to as a merkle root of validator addresses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Encode, Decode)]
pub struct ValidatorSet {
	/// Id of the set.
	pub id: u128,
	/// Number of validators in the set.
	pub length: u128,
	/// Merkle root of the ordered validator addresses.
	pub root: H256,
}

impl ValidatorSet {
	/// Commit to an ordered list of validator addresses.
	pub fn new(id: ValidatorSetId, addresses: &[H160]) -> Self {
		ValidatorSet {
			id: id.into(),
			length: addresses.len() as u128,
			root: validator_set_root(addresses),
		}
	}

	/// Number of validators in the set, as a `usize`.
	pub fn len(&self) -> usize {
		self.length as usize
	}

	/// Return `true` if the set has no validators.
	pub fn is_empty(&self) -> bool {
		self.length == 0
	}

	/// Return `true` if this set has id `id`.
	pub fn has_id(&self, id: ValidatorSetId) -> bool {
		self.id == u128::from(id)
	}
}

/// A claim that validator `account` at `index` signed a commitment.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct ValidatorProof {
	/// Recovery id in Ethereum form.
	pub v: u8,
	/// Signature `r`.
	pub r: H256,
	/// Signature `s`.
	pub s: H256,
	/// Position of the validator in the set.
	pub index: u64,
	/// Address of the validator.
	pub account: H160,
	/// Merkle proof of `account` at `index` in the validator set.
	pub proof: Vec<H256>,
}

impl ValidatorProof {
	/// The signature carried by the proof.
	pub fn signature(&self) -> Signature {
		Signature::from_rsv(self.r, self.s, self.v)
	}

	/// Check that `account` is a member of `set` at position `index`.
	pub fn is_member_of(&self, set: &ValidatorSet) -> bool {
		let index = self.index as usize;
		if u128::from(self.index) >= set.length {
			return false;
		}

		verify_proof::<Keccak256, _, _>(
			set.root.as_fixed_bytes(),
			self.proof.iter().map(|h| h.to_fixed_bytes()),
			set.len(),
			index,
			Leaf::Value(self.account.as_bytes()),
		)
	}

	/// Check that the signature over `commitment_hash` recovers to `account`.
	pub fn is_signed_by_account(&self, commitment_hash: &H256) -> bool {
		recover_address(commitment_hash, &self.signature()) == Some(self.account)
	}
}

/// Merkle root of an ordered list of validator addresses.
pub fn validator_set_root(addresses: &[H160]) -> H256 {
	H256(merkle_root::<Keccak256, _, _>(addresses.iter().map(|a| a.as_bytes())))
}

/// Merkle proof of the validator at `index`, `None` if out of bounds.
pub fn validator_merkle_proof(addresses: &[H160], index: usize) -> Option<Vec<H256>> {
	merkle_proof::<Keccak256, _, _>(addresses.iter().map(|a| a.as_bytes()), index)
		.map(|proof| proof.proof.into_iter().map(H256).collect())
}

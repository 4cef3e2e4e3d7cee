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

use crate::{crypto::Signature, keccak_256, ValidatorSetId, H256};
use codec::{Decode, Encode};
use core::cmp;

/// Id of a payload item.
pub type BeefyPayloadId = [u8; 2];

/// Registry of the payload item carrying the MMR root hash.
pub const MMR_ROOT_ID: BeefyPayloadId = *b"mh";

/// A single tagged entry of a commitment payload.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct PayloadItem {
	/// Payload item tag.
	pub id: BeefyPayloadId,
	/// Opaque payload data.
	pub data: Vec<u8>,
}

/// A commitment signed by BEEFY validators.
///
/// The commitment contains a [payload](Commitment::payload) extracted from the finalized block
/// at height [block_number](Commitment::block_number). Validators collect signatures on
/// commitments and a stream of such signed commitments (see [SignedCommitment]) forms the
/// BEEFY protocol.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Commitment {
	/// The payload being signed.
	///
	/// One of the items is expected to be tagged with [MMR_ROOT_ID] and carry the MMR root of
	/// all blocks up to [block_number](Commitment::block_number).
	pub payload: Vec<PayloadItem>,

	/// Finalized block number this commitment is for.
	pub block_number: u32,

	/// BEEFY validator set supposed to sign this commitment.
	pub validator_set_id: ValidatorSetId,
}

impl Commitment {
	/// Create a commitment with a single MMR root payload item.
	pub fn with_mmr_root(mmr_root: H256, block_number: u32, validator_set_id: ValidatorSetId) -> Self {
		Commitment {
			payload: vec![PayloadItem {
				id: MMR_ROOT_ID,
				data: mmr_root.as_bytes().to_vec(),
			}],
			block_number,
			validator_set_id,
		}
	}

	/// Keccak-256 hash of the SCALE encoded commitment. This is what validators sign.
	pub fn hash(&self) -> H256 {
		H256(keccak_256(&self.encode()))
	}

	/// Return the data of the first payload item tagged with `id`.
	pub fn payload_item(&self, id: &BeefyPayloadId) -> Option<&[u8]> {
		self.payload.iter().find(|item| &item.id == id).map(|item| &item.data[..])
	}

	/// Return the raw MMR root payload, if present. Its length is not checked.
	pub fn mmr_root(&self) -> Option<&[u8]> {
		self.payload_item(&MMR_ROOT_ID)
	}
}

impl cmp::PartialOrd for Commitment {
	fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
		Some(self.cmp(other))
	}
}

impl cmp::Ord for Commitment {
	fn cmp(&self, other: &Self) -> cmp::Ordering {
		self.validator_set_id
			.cmp(&other.validator_set_id)
			.then_with(|| self.block_number.cmp(&other.block_number))
	}
}

/// A commitment with matching BEEFY validators' signatures.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct SignedCommitment {
	/// The commitment signatures are collected for.
	pub commitment: Commitment,
	/// BEEFY validators' signatures for the commitment.
	///
	/// The length of this `Vec` must match number of validators in the current set (see
	/// [Commitment::validator_set_id]).
	pub signatures: Vec<Option<Signature>>,
}

impl SignedCommitment {
	/// Return the number of collected signatures.
	pub fn no_of_signatures(&self) -> usize {
		self.signatures.iter().filter(|x| x.is_some()).count()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use hex_literal::hex;

	fn commitment(block_number: u32, validator_set_id: ValidatorSetId) -> Commitment {
		Commitment {
			payload: vec![PayloadItem {
				id: MMR_ROOT_ID,
				data: vec![1, 2, 3, 4],
			}],
			block_number,
			validator_set_id,
		}
	}

	#[test]
	fn commitment_encode_decode() {
		// given
		let commitment = commitment(5, 0);

		// when
		let encoded = codec::Encode::encode(&commitment);
		let decoded = Commitment::decode(&mut &*encoded);

		// then
		assert_eq!(decoded, Ok(commitment));
		assert_eq!(encoded, hex!("046d681001020304050000000000000000000000"));
	}

	#[test]
	fn signed_commitment_encode_decode() {
		// given
		let signed = SignedCommitment {
			commitment: commitment(5, 0),
			signatures: vec![None, Some(Signature([7u8; 65]))],
		};

		// when
		let encoded = codec::Encode::encode(&signed);
		let decoded = SignedCommitment::decode(&mut &*encoded);

		// then
		assert_eq!(decoded, Ok(signed));
		assert_eq!(&encoded[..20], &hex!("046d681001020304050000000000000000000000")[..]);
		assert_eq!(&encoded[20..23], &[0x08, 0x00, 0x01][..]);
		assert_eq!(encoded.len(), 23 + 65);
	}

	#[test]
	fn signed_commitment_count_signatures() {
		// given
		let mut signed = SignedCommitment {
			commitment: commitment(5, 0),
			signatures: vec![None, None, Some(Signature([1u8; 65])), Some(Signature([2u8; 65]))],
		};
		assert_eq!(signed.no_of_signatures(), 2);

		// when
		signed.signatures[2] = None;

		// then
		assert_eq!(signed.no_of_signatures(), 1);
	}

	#[test]
	fn commitment_ordering() {
		// given
		let a = commitment(1, 0);
		let b = commitment(2, 1);
		let c = commitment(10, 0);
		let d = commitment(10, 1);

		// then
		assert!(a < b);
		assert!(a < c);
		assert!(c < b);
		assert!(c < d);
		assert!(b < d);
	}

	#[test]
	fn commitment_hash_covers_every_field() {
		let base = commitment(5, 0);

		assert_eq!(base.hash(), H256(keccak_256(&base.encode())));
		assert_ne!(base.hash(), commitment(6, 0).hash());
		assert_ne!(base.hash(), commitment(5, 1).hash());
	}

	#[test]
	fn should_find_mmr_root() {
		// given
		let root = H256::repeat_byte(0x42);
		let mut commitment = Commitment::with_mmr_root(root, 3, 1);

		// then
		assert_eq!(commitment.mmr_root(), Some(root.as_bytes()));

		// when
		commitment.payload[0].id = *b"xx";

		// then
		assert_eq!(commitment.mmr_root(), None);
	}
}

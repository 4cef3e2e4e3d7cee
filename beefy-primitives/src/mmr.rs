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

//! Merkle Mountain Range leaves, accumulator and proofs.
//!
//! Node positions are 0-based and laid out in insertion order (the layout used by the MMR
//! pallet). A parent is `keccak(left ++ right)`. Peaks are bagged right to left, `keccak(right ++
//! left)`.
//!
//! Two proof formats exist:
//!
//! - [MmrProof]: what the source chain returns. Items are `[left peaks.., siblings.., bagged
//!   right peaks]`.
//! - [SimplifiedMmrProof]: what the foreign chain verifies. A list of items and a bitmask where
//!   bit `i` set means item `i` is hashed on the left of the accumulator.

use crate::{keccak_256, H256, U256};
use codec::{Decode, Encode};
use mmr_lib::{
	helper::{get_peaks, pos_height_in_tree},
	leaf_index_to_mmr_size, leaf_index_to_pos,
	util::MemStore,
};

/// Maximum number of items in a simplified proof.
pub const MAX_PROOF_ITEMS: usize = 256;

/// MMR errors.
#[derive(Debug, displaydoc::Display, Clone, PartialEq, Eq)]
pub enum Error {
	/// the MMR has no leaves
	Empty,
	/// leaf {index} is not part of an MMR with {count} leaves
	LeafIndexOutOfRange {
		/// Leaf index.
		index: u64,
		/// Leaf count.
		count: u64,
	},
	/// MMR with {count} leaves requested, only {available} known
	LeafCountOutOfRange {
		/// Requested leaf count.
		count: u64,
		/// Known leaf count.
		available: u64,
	},
	/// expected {expected} proof items, got {got}
	InvalidProofLength {
		/// Items implied by the leaf position and MMR size.
		expected: usize,
		/// Items provided.
		got: usize,
	},
	/// mmr store: {0}
	Backend(String),
}

impl std::error::Error for Error {}

/// A leaf of the source chain MMR. One leaf is appended per block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode)]
pub struct MmrLeaf {
	/// Leaf format version.
	pub version: u8,
	/// Number of the parent of the block that appended the leaf.
	pub parent_number: u32,
	/// Hash of that parent block.
	pub parent_hash: H256,
	/// Id of the next BEEFY validator set.
	pub next_authority_set_id: u64,
	/// Length of the next BEEFY validator set.
	pub next_authority_set_len: u32,
	/// Merkle root of the next BEEFY validator set addresses.
	pub next_authority_set_root: H256,
	/// Merkle root of all registered parachain heads.
	pub parachain_heads_root: H256,
}

impl MmrLeaf {
	/// Keccak-256 of the SCALE encoded leaf.
	pub fn hash(&self) -> H256 {
		H256(keccak_256(&self.encode()))
	}

	/// Rebuild a leaf from its partial form and a parachain heads root.
	pub fn from_partial(partial: &MmrLeafPartial, parachain_heads_root: H256) -> Self {
		MmrLeaf {
			version: partial.version,
			parent_number: partial.parent_number,
			parent_hash: partial.parent_hash,
			next_authority_set_id: partial.next_authority_set_id,
			next_authority_set_len: partial.next_authority_set_len,
			next_authority_set_root: partial.next_authority_set_root,
			parachain_heads_root,
		}
	}

	/// Strip the parachain heads root.
	pub fn partial(&self) -> MmrLeafPartial {
		MmrLeafPartial {
			version: self.version,
			parent_number: self.parent_number,
			parent_hash: self.parent_hash,
			next_authority_set_id: self.next_authority_set_id,
			next_authority_set_len: self.next_authority_set_len,
			next_authority_set_root: self.next_authority_set_root,
		}
	}
}

/// An [MmrLeaf] without its parachain heads root, which the verifier recomputes from a head proof.
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode)]
pub struct MmrLeafPartial {
	/// Leaf format version.
	pub version: u8,
	/// Number of the parent block.
	pub parent_number: u32,
	/// Hash of the parent block.
	pub parent_hash: H256,
	/// Id of the next BEEFY validator set.
	pub next_authority_set_id: u64,
	/// Length of the next BEEFY validator set.
	pub next_authority_set_len: u32,
	/// Merkle root of the next BEEFY validator set addresses.
	pub next_authority_set_root: H256,
}

/// A leaf proof as produced by the source chain.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct MmrProof {
	/// Index of the proven leaf.
	pub leaf_index: u64,
	/// Number of leaves in the MMR the proof was generated against.
	pub leaf_count: u64,
	/// Proof items.
	pub items: Vec<H256>,
}

/// A leaf proof in the form verified by the foreign chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode)]
pub struct SimplifiedMmrProof {
	/// Proof items, in folding order.
	pub items: Vec<H256>,
	/// Bit `i` set: item `i` goes on the left.
	pub order: U256,
}

impl MmrProof {
	/// Convert into the simplified form.
	///
	/// Fails if the number of items does not match what the leaf position and the MMR size imply.
	pub fn simplify(&self) -> Result<SimplifiedMmrProof, Error> {
		let layout = ProofLayout::new(self.leaf_index, self.leaf_count)?;
		if self.items.len() != layout.len() {
			return Err(Error::InvalidProofLength {
				expected: layout.len(),
				got: self.items.len(),
			});
		}

		let mut items = Vec::with_capacity(self.items.len());
		let mut order = U256::zero();
		let mut bit = 0usize;
		let mut push = |item: H256, left: bool| {
			if left {
				order = order | (U256::one() << bit);
			}
			items.push(item);
			bit += 1;
		};

		let (lhs, rest) = self.items.split_at(layout.lhs_peaks);
		let (path, rhs) = rest.split_at(layout.sides.len());

		for (item, is_right_child) in path.iter().zip(layout.sides.iter()) {
			push(*item, *is_right_child);
		}
		for item in rhs {
			push(*item, true);
		}
		for item in lhs.iter().rev() {
			push(*item, false);
		}

		Ok(SimplifiedMmrProof { items, order })
	}

	/// Verify the proof of `leaf_hash` against `root`.
	pub fn verify(&self, root: &H256, leaf_hash: &H256) -> bool {
		self.simplify()
			.map(|proof| proof.verify(root, leaf_hash))
			.unwrap_or(false)
	}
}

impl SimplifiedMmrProof {
	/// Fold `leaf_hash` with the proof items. `None` if the proof is too large.
	pub fn root(&self, leaf_hash: &H256) -> Option<H256> {
		calculate_root(leaf_hash, &self.items, self.order)
	}

	/// Verify the proof of `leaf_hash` against `root`.
	pub fn verify(&self, root: &H256, leaf_hash: &H256) -> bool {
		verify_leaf_proof(root, leaf_hash, &self.items, self.order)
	}
}

/// Fold `leaf_hash` with `items` according to `order`. `None` if there are more than
/// [MAX_PROOF_ITEMS] items.
pub fn calculate_root(leaf_hash: &H256, items: &[H256], order: U256) -> Option<H256> {
	if items.len() > MAX_PROOF_ITEMS {
		return None;
	}

	Some(items.iter().enumerate().fold(*leaf_hash, |acc, (i, item)| {
		if order.bit(i) {
			merge(item, &acc)
		} else {
			merge(&acc, item)
		}
	}))
}

/// Verify a simplified leaf proof against `root`.
pub fn verify_leaf_proof(root: &H256, leaf_hash: &H256, items: &[H256], order: U256) -> bool {
	calculate_root(leaf_hash, items, order).as_ref() == Some(root)
}

/// Hashes MMR nodes with keccak-256.
#[derive(Debug, Clone, Copy)]
pub struct Keccak256Merge;

impl mmr_lib::Merge for Keccak256Merge {
	type Item = H256;

	fn merge(left: &H256, right: &H256) -> mmr_lib::Result<H256> {
		Ok(merge(left, right))
	}
}

type Mmr<'a> = mmr_lib::MMR<H256, Keccak256Merge, &'a MemStore<H256>>;

/// An in-memory Merkle Mountain Range of leaf hashes.
///
/// Keeps every node, so that roots and proofs for any past size can be produced.
#[derive(Default)]
pub struct MerkleMountainRange {
	store: MemStore<H256>,
	size: u64,
	leaves: u64,
}

impl MerkleMountainRange {
	/// An empty MMR.
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of leaves.
	pub fn leaf_count(&self) -> u64 {
		self.leaves
	}

	/// Number of nodes.
	pub fn size(&self) -> u64 {
		self.size
	}

	/// Append a leaf hash, returning its leaf index.
	pub fn push(&mut self, leaf_hash: H256) -> Result<u64, Error> {
		let mut mmr = Mmr::new(self.size, &self.store);
		mmr.push(leaf_hash).map_err(backend)?;
		mmr.commit().map_err(backend)?;
		let size = mmr.mmr_size();

		self.size = size;
		self.leaves += 1;
		Ok(self.leaves - 1)
	}

	/// Root of the current MMR.
	pub fn root(&self) -> Result<H256, Error> {
		self.root_at(self.leaves)
	}

	/// Root of the MMR as it was when it had `leaf_count` leaves.
	pub fn root_at(&self, leaf_count: u64) -> Result<H256, Error> {
		self.at(leaf_count)?.get_root().map_err(backend)
	}

	/// Proof of leaf `leaf_index` against the MMR of `leaf_count` leaves.
	pub fn generate_proof(&self, leaf_index: u64, leaf_count: u64) -> Result<MmrProof, Error> {
		let mmr = self.at(leaf_count)?;
		ProofLayout::new(leaf_index, leaf_count)?;

		let proof = mmr.gen_proof(vec![leaf_index_to_pos(leaf_index)]).map_err(backend)?;

		Ok(MmrProof {
			leaf_index,
			leaf_count,
			items: proof.proof_items().to_vec(),
		})
	}

	/// A view of the MMR truncated to `leaf_count` leaves. Nodes are append-only, so a smaller
	/// size reads exactly the nodes that existed back then.
	fn at(&self, leaf_count: u64) -> Result<Mmr<'_>, Error> {
		if leaf_count == 0 {
			return Err(Error::Empty);
		}
		if leaf_count > self.leaves {
			return Err(Error::LeafCountOutOfRange {
				count: leaf_count,
				available: self.leaves,
			});
		}
		Ok(Mmr::new(leaf_index_to_mmr_size(leaf_count - 1), &self.store))
	}
}

fn backend(e: mmr_lib::Error) -> Error {
	Error::Backend(format!("{:?}", e))
}

/// Shape of a proof: how many left peaks, which side the accumulator is on at every step of
/// the path, and whether right peaks exist.
struct ProofLayout {
	lhs_peaks: usize,
	sides: Vec<bool>,
	has_rhs: bool,
}

impl ProofLayout {
	fn new(leaf_index: u64, leaf_count: u64) -> Result<Self, Error> {
		if leaf_count == 0 {
			return Err(Error::Empty);
		}
		if leaf_index >= leaf_count {
			return Err(Error::LeafIndexOutOfRange {
				index: leaf_index,
				count: leaf_count,
			});
		}

		let peaks = get_peaks(leaf_index_to_mmr_size(leaf_count - 1));
		let leaf_pos = leaf_index_to_pos(leaf_index);
		let peak = peaks
			.iter()
			.position(|p| *p >= leaf_pos)
			.ok_or(Error::LeafIndexOutOfRange {
				index: leaf_index,
				count: leaf_count,
			})?;

		let mut sides = Vec::new();
		let mut pos = leaf_pos;
		let mut height = 0u32;
		while pos < peaks[peak] {
			// a node is a right child iff the next position is higher
			let is_right_child = pos_height_in_tree(pos + 1) > pos_height_in_tree(pos);
			sides.push(is_right_child);
			pos = if is_right_child { pos + 1 } else { pos + (2 << height) };
			height += 1;
		}

		Ok(ProofLayout {
			lhs_peaks: peak,
			sides,
			has_rhs: peak + 1 < peaks.len(),
		})
	}

	fn len(&self) -> usize {
		self.lhs_peaks + self.sides.len() + self.has_rhs as usize
	}
}

fn merge(left: &H256, right: &H256) -> H256 {
	let mut combined = [0u8; 64];
	combined[..32].copy_from_slice(left.as_bytes());
	combined[32..].copy_from_slice(right.as_bytes());
	H256(keccak_256(&combined))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn leaf(i: u64) -> H256 {
		H256(keccak_256(&i.to_le_bytes()))
	}

	fn mmr(leaves: u64) -> MerkleMountainRange {
		let mut mmr = MerkleMountainRange::new();
		for i in 0..leaves {
			assert_eq!(mmr.push(leaf(i)), Ok(i));
		}
		mmr
	}

	#[test]
	fn root_of_small_mmrs() {
		// given
		let mmr = mmr(3);

		// then
		assert_eq!(mmr.size(), 4);
		assert_eq!(mmr.root_at(1), Ok(leaf(0)));
		assert_eq!(mmr.root_at(2), Ok(merge(&leaf(0), &leaf(1))));
		assert_eq!(mmr.root(), Ok(merge(&leaf(2), &merge(&leaf(0), &leaf(1)))));
	}

	#[test]
	fn proofs_verify_against_their_own_size_only() {
		let mmr = mmr(23);

		for leaf_count in 1..=23u64 {
			let root = mmr.root_at(leaf_count).unwrap();
			for leaf_index in 0..leaf_count {
				// when
				let proof = mmr.generate_proof(leaf_index, leaf_count).unwrap();
				let simplified = proof.simplify().unwrap();

				// then
				assert!(proof.verify(&root, &leaf(leaf_index)), "{}/{}", leaf_index, leaf_count);
				assert!(simplified.verify(&root, &leaf(leaf_index)));
				assert!(!simplified.verify(&root, &leaf(leaf_index + 1)));

				if leaf_count < 23 {
					let newer = mmr.root_at(leaf_count + 1).unwrap();
					assert!(!simplified.verify(&newer, &leaf(leaf_index)));
				}
			}
		}
	}

	#[test]
	fn flipped_sibling_fails_verification() {
		// given
		let mmr = mmr(11);
		let root = mmr.root().unwrap();
		let proof = mmr.generate_proof(5, 11).unwrap().simplify().unwrap();

		for i in 0..proof.items.len() {
			// when
			let mut tampered = proof.clone();
			tampered.items[i].0[0] ^= 1;

			// then
			assert!(!tampered.verify(&root, &leaf(5)));
		}

		// flipping an order bit also breaks the proof
		let mut tampered = proof;
		tampered.order = tampered.order ^ U256::one();
		assert!(!tampered.verify(&root, &leaf(5)));
	}

	#[test]
	fn simplified_layout_of_middle_peak() {
		// 11 leaves: peaks of 8, 2 and 1 leaves. Leaf 9 sits in the middle peak.
		let mmr = mmr(11);
		let proof = mmr.generate_proof(9, 11).unwrap();

		// left peak, one sibling, right peak
		assert_eq!(proof.items.len(), 3);

		let simplified = proof.simplify().unwrap();
		assert_eq!(simplified.items, vec![proof.items[1], proof.items[2], proof.items[0]]);
		// sibling is on the left (leaf 9 is a right child), right peak bagged on the left,
		// left peak on the right
		assert_eq!(simplified.order, U256::from(0b011));
	}

	#[test]
	fn should_reject_bad_proof_requests() {
		let mmr = mmr(4);

		assert_eq!(mmr.generate_proof(0, 0), Err(Error::Empty));
		assert_eq!(mmr.generate_proof(4, 4), Err(Error::LeafIndexOutOfRange { index: 4, count: 4 }));
		assert_eq!(
			mmr.generate_proof(0, 5),
			Err(Error::LeafCountOutOfRange { count: 5, available: 4 })
		);

		let mut proof = mmr.generate_proof(1, 4).unwrap();
		proof.items.push(H256::zero());
		assert_eq!(proof.simplify(), Err(Error::InvalidProofLength { expected: 2, got: 3 }));
	}

	#[test]
	fn proofs_up_to_the_item_limit_are_folded() {
		let mut items = vec![H256::zero(); MAX_PROOF_ITEMS];

		assert!(calculate_root(&H256::zero(), &items, U256::zero()).is_some());

		items.push(H256::zero());
		assert_eq!(calculate_root(&H256::zero(), &items, U256::zero()), None);
	}

	#[test]
	fn historical_views_do_not_see_later_nodes() {
		// given
		let mut mmr = mmr(4);
		let root = mmr.root_at(3).unwrap();
		let proof = mmr.generate_proof(1, 3).unwrap();

		// when
		for i in 4..9 {
			mmr.push(leaf(i)).unwrap();
		}

		// then
		assert_eq!(mmr.size(), 16);
		assert_eq!(mmr.root_at(3), Ok(root));
		assert_eq!(mmr.generate_proof(1, 3), Ok(proof));
	}

	#[test]
	fn leaf_encoding_and_partial_round_trip() {
		// given
		let leaf = MmrLeaf {
			version: 1,
			parent_number: 2,
			parent_hash: H256::repeat_byte(3),
			next_authority_set_id: 4,
			next_authority_set_len: 5,
			next_authority_set_root: H256::repeat_byte(6),
			parachain_heads_root: H256::repeat_byte(7),
		};

		// when
		let encoded = leaf.encode();

		// then
		assert_eq!(encoded.len(), 1 + 4 + 32 + 8 + 4 + 32 + 32);
		assert_eq!(&encoded[..5], &[1, 2, 0, 0, 0][..]);
		assert_eq!(leaf.hash(), H256(keccak_256(&encoded)));
		assert_eq!(MmrLeaf::from_partial(&leaf.partial(), leaf.parachain_heads_root), leaf);
	}
}

// Copyright (C) 2020-2021 Parity Technologies (UK) Ltd.
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

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

//! A binary merkle tree.
//!
//! Two flavours of the tree are provided:
//!
//! - a *positional* tree, where a parent is `H(left ++ right)`. Used for validator set
//!   commitments and parachain heads. Leaves are hashed before they enter the tree.
//! - a *sorted* tree, where a parent is `H(min(a, b) ++ max(a, b))`. Used for outbound
//!   message commitments. Leaves enter the tree as already computed hashes.
//!
//! In both flavours an odd last node of a row is promoted to the next row unchanged.

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// Output of the hash function and type of every tree node.
pub type Hash = [u8; 32];

/// Hash function used to build the tree.
pub trait Hasher {
	/// Hash given arbitrary-length piece of data.
	fn hash(data: &[u8]) -> Hash;
}

/// Keccak-256 hasher, as used on the Ethereum side of the bridge.
#[cfg(feature = "keccak")]
pub struct Keccak256;

#[cfg(feature = "keccak")]
impl Hasher for Keccak256 {
	fn hash(data: &[u8]) -> Hash {
		use tiny_keccak::{Hasher as _, Keccak};

		let mut keccak = Keccak::v256();
		keccak.update(data);
		let mut output = [0_u8; 32];
		keccak.finalize(&mut output);
		output
	}
}

/// A generated merkle proof.
///
/// The proof contains the list of sibling hashes bottom-up. Promoted levels have no sibling
/// and therefore contribute no item.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct MerkleProof<T> {
	/// Root hash of the generated merkle tree.
	pub root: Hash,
	/// Proof items (does not contain the leaf hash, nor the root).
	pub proof: Vec<Hash>,
	/// Number of leaves in the original tree.
	pub number_of_leaves: usize,
	/// Index of the leaf the proof is for (0-based).
	pub leaf_index: usize,
	/// Leaf content.
	pub leaf: T,
}

/// A leaf passed to [`verify_proof`]: either the raw value or its hash.
#[derive(Debug, PartialEq, Eq)]
pub enum Leaf<'a> {
	/// Leaf content, hashed before verification.
	Value(&'a [u8]),
	/// Hash of the leaf content.
	Hash(Hash),
}

impl<'a, T: AsRef<[u8]>> From<&'a T> for Leaf<'a> {
	fn from(v: &'a T) -> Self {
		Leaf::Value(v.as_ref())
	}
}

impl<'a> From<Hash> for Leaf<'a> {
	fn from(v: Hash) -> Self {
		Leaf::Hash(v)
	}
}

/// Construct a root hash of a positional binary merkle tree created from given leaves.
///
/// An empty tree has an all-zero root.
pub fn merkle_root<H, I, T>(leaves: I) -> Hash
where
	H: Hasher,
	I: IntoIterator<Item = T>,
	T: AsRef<[u8]>,
{
	let row = leaves.into_iter().map(|l| H::hash(l.as_ref())).collect::<Vec<_>>();
	merkelize::<H>(row, None, false).0
}

/// Construct a root hash of a sorted-pair binary merkle tree over already hashed leaves.
pub fn merkle_root_sorted<H, I>(leaf_hashes: I) -> Hash
where
	H: Hasher,
	I: IntoIterator<Item = Hash>,
{
	merkelize::<H>(leaf_hashes.into_iter().collect(), None, true).0
}

/// Construct a merkle proof for the leaf at `leaf_index` of a positional tree.
///
/// Returns `None` if `leaf_index` is out of bounds.
pub fn merkle_proof<H, I, T>(leaves: I, leaf_index: usize) -> Option<MerkleProof<T>>
where
	H: Hasher,
	I: IntoIterator<Item = T>,
	T: AsRef<[u8]>,
{
	let mut leaf = None;
	let row = leaves
		.into_iter()
		.enumerate()
		.map(|(idx, l)| {
			let hash = H::hash(l.as_ref());
			if idx == leaf_index {
				leaf = Some(l);
			}
			hash
		})
		.collect::<Vec<_>>();

	let number_of_leaves = row.len();
	let leaf = leaf?;
	let (root, proof) = merkelize::<H>(row, Some(leaf_index), false);

	Some(MerkleProof {
		root,
		proof,
		number_of_leaves,
		leaf_index,
		leaf,
	})
}

/// Construct a merkle proof for the leaf hash at `leaf_index` of a sorted-pair tree.
///
/// Returns `None` if `leaf_index` is out of bounds.
pub fn merkle_proof_sorted<H, I>(leaf_hashes: I, leaf_index: usize) -> Option<MerkleProof<Hash>>
where
	H: Hasher,
	I: IntoIterator<Item = Hash>,
{
	let row = leaf_hashes.into_iter().collect::<Vec<_>>();
	let leaf = *row.get(leaf_index)?;
	let number_of_leaves = row.len();
	let (root, proof) = merkelize::<H>(row, Some(leaf_index), true);

	Some(MerkleProof {
		root,
		proof,
		number_of_leaves,
		leaf_index,
		leaf,
	})
}

/// Verify a merkle proof of a positional tree.
///
/// Returns `false` if the proof is malformed or does not lead to `root`.
pub fn verify_proof<'a, H, P, L>(root: &Hash, proof: P, number_of_leaves: usize, leaf_index: usize, leaf: L) -> bool
where
	H: Hasher,
	P: IntoIterator<Item = Hash>,
	L: Into<Leaf<'a>>,
{
	let leaf_hash = match leaf.into() {
		Leaf::Value(content) => H::hash(content),
		Leaf::Hash(hash) => hash,
	};

	compute_root::<H, _>(leaf_hash, proof, number_of_leaves, leaf_index).as_ref() == Some(root)
}

/// Walk a positional proof from `leaf_hash` up to the root.
///
/// The walk tracks the leaf `position` and the row `width` so that promoted levels are
/// skipped without consuming a proof item. Returns `None` if the position is out of range or
/// the proof has the wrong number of items.
pub fn compute_root<H, P>(leaf_hash: Hash, proof: P, number_of_leaves: usize, leaf_index: usize) -> Option<Hash>
where
	H: Hasher,
	P: IntoIterator<Item = Hash>,
{
	if leaf_index >= number_of_leaves {
		return None;
	}

	let mut proof = proof.into_iter();
	let mut position = leaf_index;
	let mut width = number_of_leaves;
	let mut computed = leaf_hash;

	while width > 1 {
		let promoted = position + 1 == width && width % 2 == 1;
		if !promoted {
			let sibling = proof.next()?;
			computed = if position % 2 == 1 {
				combine::<H>(&sibling, &computed, false)
			} else {
				combine::<H>(&computed, &sibling, false)
			};
		}
		position /= 2;
		width = (width - 1) / 2 + 1;
	}

	if proof.next().is_some() {
		return None;
	}

	Some(computed)
}

/// Fold a sorted-pair proof over `leaf_hash`, returning the implied root.
///
/// Position independent, the order of each pair is derived from the hashes themselves.
pub fn process_sorted_proof<H, P>(leaf_hash: Hash, proof: P) -> Hash
where
	H: Hasher,
	P: IntoIterator<Item = Hash>,
{
	proof.into_iter().fold(leaf_hash, |acc, item| combine::<H>(&acc, &item, true))
}

fn combine<H: Hasher>(a: &Hash, b: &Hash, sorted: bool) -> Hash {
	let (left, right) = if sorted && b < a { (b, a) } else { (a, b) };
	let mut combined = [0_u8; 64];
	combined[0..32].copy_from_slice(left);
	combined[32..64].copy_from_slice(right);
	H::hash(&combined)
}

/// Reduce `row` to the root, collecting the sibling path of `leaf_index` along the way.
fn merkelize<H: Hasher>(mut row: Vec<Hash>, leaf_index: Option<usize>, sorted: bool) -> (Hash, Vec<Hash>) {
	let mut proof = Vec::new();
	let mut index = leaf_index;

	if row.is_empty() {
		return (Hash::default(), proof);
	}

	while row.len() > 1 {
		#[cfg(feature = "debug")]
		log::trace!(
			target: "beefy-merkle-tree",
			"Layer: {:?}",
			row.iter().map(hex::encode).collect::<Vec<_>>()
		);

		if let Some(idx) = index {
			let sibling = if idx % 2 == 1 { idx - 1 } else { idx + 1 };
			if let Some(hash) = row.get(sibling) {
				proof.push(*hash);
			}
			index = Some(idx / 2);
		}

		row = merkelize_row::<H>(&row, sorted);
	}

	(row[0], proof)
}

fn merkelize_row<H: Hasher>(row: &[Hash], sorted: bool) -> Vec<Hash> {
	row.chunks(2)
		.map(|pair| match pair.get(1) {
			Some(b) => combine::<H>(&pair[0], b, sorted),
			// Odd number of items. Promote the item to the upper layer.
			None => pair[0],
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use hex_literal::hex;

	#[test]
	fn should_generate_empty_root() {
		// given
		let data: Vec<[u8; 1]> = Default::default();

		// when
		let out = merkle_root::<Keccak256, _, _>(data);

		// then
		assert_eq!(
			hex::encode(&out),
			"0000000000000000000000000000000000000000000000000000000000000000"
		);
	}

	#[test]
	fn should_generate_single_root() {
		// given
		let data = vec![hex!("E04CC55ebEE1cBCE552f250e85c57B70B2E2625b")];

		// when
		let out = merkle_root::<Keccak256, _, _>(data);

		// then
		assert_eq!(
			hex::encode(&out),
			"aeb47a269393297f4b0a3c9c9cfd00c7a4195255274cf39d83dabc2fcc9ff3d7"
		);
	}

	#[test]
	fn should_generate_root_pow_2() {
		// given
		let data = vec![
			hex!("E04CC55ebEE1cBCE552f250e85c57B70B2E2625b"),
			hex!("25451A4de12dcCc2D166922fA938E900fCc4ED24"),
		];

		// when
		let out = merkle_root::<Keccak256, _, _>(data);

		// then
		assert_eq!(
			hex::encode(&out),
			"697ea2a8fe5b03468548a7a413424a6292ab44a82a6f5cc594c3fa7dda7ce402"
		);
	}

	#[test]
	fn should_generate_root_complex() {
		let test = |root, data| {
			assert_eq!(hex::encode(&merkle_root::<Keccak256, _, _>(data)), root);
		};

		test(
			"aff1208e69c9e8be9b584b07ebac4e48a1ee9d15ce3afe20b77a4d29e4175aa3",
			vec!["a", "b", "c"],
		);

		test(
			"b8912f7269068901f231a965adfefbc10f0eedcfa61852b103efd54dac7db3d7",
			vec!["a", "b", "a"],
		);

		test(
			"dc8e73fe6903148ff5079baecc043983625c23b39f31537e322cd0deee09fa9c",
			vec!["a", "b", "a", "b"],
		);

		test(
			"fb3b3be94be9e983ba5e094c9c51a7d96a4fa2e5d8e891df00ca89ba05bb1239",
			vec!["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"],
		);
	}

	#[test]
	fn should_generate_and_verify_proof_for_every_leaf() {
		let _ = env_logger::try_init();

		// given
		let data = vec!["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"];
		let root = merkle_root::<Keccak256, _, _>(data.clone());

		for leaf_index in 0..data.len() {
			// when
			let proof = merkle_proof::<Keccak256, _, _>(data.clone(), leaf_index).unwrap();

			// then
			assert_eq!(proof.root, root);
			assert_eq!(proof.leaf, data[leaf_index]);
			assert!(verify_proof::<Keccak256, _, _>(
				&root,
				proof.proof.clone(),
				data.len(),
				leaf_index,
				&proof.leaf,
			));
		}
	}

	#[test]
	fn promoted_leaf_needs_fewer_proof_items() {
		// given
		let data = vec!["a", "b", "c"];

		// when
		let first = merkle_proof::<Keccak256, _, _>(data.clone(), 0).unwrap();
		let last = merkle_proof::<Keccak256, _, _>(data, 2).unwrap();

		// then
		assert_eq!(first.proof.len(), 2);
		assert_eq!(last.proof.len(), 1);
	}

	#[test]
	fn should_reject_invalid_proofs() {
		// given
		let data = vec!["a", "b", "c", "d", "e"];
		let proof = merkle_proof::<Keccak256, _, _>(data.clone(), 1).unwrap();

		// wrong leaf
		assert!(!verify_proof::<Keccak256, _, _>(&proof.root, proof.proof.clone(), 5, 1, &"c"));

		// wrong position
		assert!(!verify_proof::<Keccak256, _, _>(&proof.root, proof.proof.clone(), 5, 2, &"b"));

		// wrong width, a tree of 3 leaves is one level shallower
		assert!(!verify_proof::<Keccak256, _, _>(&proof.root, proof.proof.clone(), 3, 1, &"b"));

		// extra item
		let mut longer = proof.proof.clone();
		longer.push([0u8; 32]);
		assert!(!verify_proof::<Keccak256, _, _>(&proof.root, longer, 5, 1, &"b"));

		// out of range
		assert!(!verify_proof::<Keccak256, _, _>(&proof.root, proof.proof, 5, 5, &"b"));
	}

	#[test]
	fn out_of_bounds_proof_is_none() {
		let data = vec!["a", "b"];

		assert!(merkle_proof::<Keccak256, _, _>(data, 2).is_none());
		assert!(merkle_proof_sorted::<Keccak256, _>(Vec::new(), 0).is_none());
	}

	#[test]
	fn verify_accepts_leaf_hash() {
		// given
		let data = vec![hex!("E04CC55ebEE1cBCE552f250e85c57B70B2E2625b")];
		let root = merkle_root::<Keccak256, _, _>(data.clone());

		// when
		let leaf_hash = Keccak256::hash(&data[0]);

		// then
		assert!(verify_proof::<Keccak256, _, _>(&root, Vec::new(), 1, 0, leaf_hash));
	}

	#[test]
	fn sorted_proofs_are_position_independent() {
		// given
		let leaves = ["a", "b", "c", "d", "e", "f", "g"]
			.iter()
			.map(|l| Keccak256::hash(l.as_bytes()))
			.collect::<Vec<_>>();
		let root = merkle_root_sorted::<Keccak256, _>(leaves.clone());

		for leaf_index in 0..leaves.len() {
			// when
			let proof = merkle_proof_sorted::<Keccak256, _>(leaves.clone(), leaf_index).unwrap();

			// then
			assert_eq!(proof.root, root);
			assert_eq!(process_sorted_proof::<Keccak256, _>(proof.leaf, proof.proof), root);
		}

		// a foreign leaf never reaches the root
		let proof = merkle_proof_sorted::<Keccak256, _>(leaves, 0).unwrap();
		assert_ne!(
			process_sorted_proof::<Keccak256, _>(Keccak256::hash(b"z"), proof.proof),
			root
		);
	}

	#[test]
	fn sorted_single_leaf_is_its_own_root() {
		let leaf = Keccak256::hash(b"only");

		assert_eq!(merkle_root_sorted::<Keccak256, _>(vec![leaf]), leaf);
		assert_eq!(process_sorted_proof::<Keccak256, _>(leaf, Vec::new()), leaf);
	}
}

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

//! Parachain headers and the proofs anchoring them to an MMR leaf.

use crate::{
	keccak_256,
	mmr::{MmrLeaf, MmrLeafPartial},
	H256, U256,
};
use beefy_merkle_tree::{compute_root, merkle_proof, merkle_root, Keccak256};
use codec::{Decode, Encode};

/// Identifier of a parachain.
pub type ParaId = u32;

/// Engine id of a consensus digest.
pub type ConsensusEngineId = [u8; 4];

/// Prefix of the `Other` digest item carrying the outbound message commitment.
pub const MESSAGE_COMMITMENT_PREFIX: u8 = 0;

/// A header digest item, laid out as on the source chain.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum DigestItem {
	/// Arbitrary data. Carries the outbound message commitment.
	#[codec(index = 0)]
	Other(Vec<u8>),
	/// Consensus engine message.
	#[codec(index = 4)]
	Consensus(ConsensusEngineId, Vec<u8>),
	/// Block seal.
	#[codec(index = 5)]
	Seal(ConsensusEngineId, Vec<u8>),
	/// Pre-runtime consensus data.
	#[codec(index = 6)]
	PreRuntime(ConsensusEngineId, Vec<u8>),
	/// The runtime code or heap pages changed.
	#[codec(index = 8)]
	RuntimeEnvironmentUpdated,
}

/// A parachain header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode)]
pub struct ParachainHeader {
	/// Parent hash.
	pub parent_hash: H256,
	/// Block number.
	#[codec(compact)]
	pub number: u32,
	/// State root.
	pub state_root: H256,
	/// Extrinsics root.
	pub extrinsics_root: H256,
	/// Digest items.
	pub digest: Vec<DigestItem>,
}

impl ParachainHeader {
	/// Hash of the header.
	pub fn hash(&self) -> H256 {
		H256(keccak_256(&self.encode()))
	}

	/// The outbound message commitment, if the block accepted any message.
	pub fn message_commitment(&self) -> Option<H256> {
		self.digest.iter().find_map(|item| match item {
			DigestItem::Other(data) if data.len() == 33 && data[0] == MESSAGE_COMMITMENT_PREFIX =>
				Some(H256::from_slice(&data[1..])),
			_ => None,
		})
	}

	/// Append an outbound message commitment to the digest.
	pub fn push_message_commitment(&mut self, commitment: H256) {
		let mut data = Vec::with_capacity(33);
		data.push(MESSAGE_COMMITMENT_PREFIX);
		data.extend_from_slice(commitment.as_bytes());
		self.digest.push(DigestItem::Other(data));
	}
}

/// Leaf of the para heads tree: `SCALE((para_id, SCALE(header)))`.
pub fn para_head_leaf(para_id: ParaId, head: &[u8]) -> Vec<u8> {
	(para_id, head).encode()
}

fn sorted_leaves(heads: &[(ParaId, Vec<u8>)]) -> Vec<(ParaId, Vec<u8>)> {
	let mut heads = heads.to_vec();
	heads.sort_by_key(|(id, _)| *id);
	heads.into_iter().map(|(id, head)| (id, para_head_leaf(id, &head))).collect()
}

/// Merkle root over the heads of all parachains, ordered by para id.
pub fn para_heads_root(heads: &[(ParaId, Vec<u8>)]) -> H256 {
	H256(merkle_root::<Keccak256, _, _>(
		sorted_leaves(heads).into_iter().map(|(_, leaf)| leaf),
	))
}

/// Position of a para head in the para heads tree and its merkle path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode)]
pub struct HeadProof {
	/// Position of the head among all heads.
	pub pos: u64,
	/// Number of heads.
	pub width: u64,
	/// Sibling hashes, bottom-up.
	pub proof: Vec<H256>,
}

impl HeadProof {
	/// Root implied by `leaf` (see [para_head_leaf]). `None` if the proof is malformed.
	pub fn root(&self, leaf: &[u8]) -> Option<H256> {
		compute_root::<Keccak256, _>(
			keccak_256(leaf),
			self.proof.iter().map(|h| h.to_fixed_bytes()),
			self.width as usize,
			self.pos as usize,
		)
		.map(H256)
	}
}

/// Proof of the head of `para_id` among `heads`, `None` if the para is not registered.
pub fn para_head_proof(heads: &[(ParaId, Vec<u8>)], para_id: ParaId) -> Option<HeadProof> {
	let leaves = sorted_leaves(heads);
	let pos = leaves.iter().position(|(id, _)| *id == para_id)?;
	let proof = merkle_proof::<Keccak256, _, _>(leaves.iter().map(|(_, leaf)| leaf), pos)?;

	Some(HeadProof {
		pos: pos as u64,
		width: proof.number_of_leaves as u64,
		proof: proof.proof.into_iter().map(H256).collect(),
	})
}

/// Everything needed to anchor a parachain header to the light client's MMR root.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct VerificationProof {
	/// Header committing to the message.
	pub header: ParachainHeader,
	/// Proof of the header among the para heads of the relay block that included it.
	pub head_proof: HeadProof,
	/// MMR leaf of that relay block, without its para heads root.
	pub leaf_partial: MmrLeafPartial,
	/// Simplified MMR proof items of the leaf.
	pub leaf_proof: Vec<H256>,
	/// Simplified MMR proof order bits.
	pub leaf_proof_order: U256,
}

impl VerificationProof {
	/// Rebuild the MMR leaf of `para_id`'s header. `None` if the head proof is malformed.
	pub fn leaf(&self, para_id: ParaId) -> Option<MmrLeaf> {
		let heads_root = self.head_proof.root(&para_head_leaf(para_id, &self.header.encode()))?;
		Some(MmrLeaf::from_partial(&self.leaf_partial, heads_root))
	}
}

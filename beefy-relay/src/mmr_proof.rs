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

//! MMR leaf proofs in the form the light client verifies.

use log::trace;

use beefy_primitives::{
	mmr::{MmrLeaf, SimplifiedMmrProof},
	H256,
};

use crate::{client::RelayChainApi, error::Error};

/// Fetches leaf proofs from the relay chain and simplifies them.
#[derive(Debug, Clone)]
pub struct MmrProofProvider<R> {
	relay: R,
}

impl<R: RelayChainApi> MmrProofProvider<R> {
	pub fn new(relay: R) -> Self {
		MmrProofProvider { relay }
	}

	/// Leaf `leaf_index` and its proof against the MMR of exactly `leaf_count` leaves.
	///
	/// A proof for any other size would not verify against the root of that size.
	pub async fn leaf_proof(&self, leaf_index: u64, leaf_count: u64) -> Result<(MmrLeaf, SimplifiedMmrProof), Error> {
		let (leaf, proof) = self.relay.generate_mmr_proof(leaf_index, leaf_count).await?;

		if proof.leaf_index != leaf_index || proof.leaf_count != leaf_count {
			return Err(Error::InvalidSourceData(format!(
				"asked for leaf {} of {}, got leaf {} of {}",
				leaf_index, leaf_count, proof.leaf_index, proof.leaf_count
			)));
		}

		let simplified = proof.simplify()?;

		trace!(
			target: "beefy",
			"🥩 Leaf #{} of {}: {} proof items, order {:#x}",
			leaf_index,
			leaf_count,
			simplified.items.len(),
			simplified.order,
		);

		Ok((leaf, simplified))
	}

	/// Proof of the leaf a commitment for `block_number` anchors, checked against `root`.
	///
	/// The MMR of block `n` has `n` leaves, the last one describing block `n - 1`.
	pub async fn commitment_leaf_proof(
		&self,
		block_number: u32,
		root: &H256,
	) -> Result<(MmrLeaf, SimplifiedMmrProof), Error> {
		let leaf_count = u64::from(block_number);
		let leaf_index = leaf_count
			.checked_sub(1)
			.ok_or_else(|| Error::InvalidSourceData("commitment for the genesis block".into()))?;

		let (leaf, proof) = self.leaf_proof(leaf_index, leaf_count).await?;
		if !proof.verify(root, &leaf.hash()) {
			return Err(Error::InvalidSourceData(format!(
				"leaf proof for block #{} does not match root {:?}",
				block_number, root
			)));
		}

		Ok((leaf, proof))
	}
}

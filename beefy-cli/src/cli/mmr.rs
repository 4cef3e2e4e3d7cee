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

use crate::cli::utils::Bytes;
use beefy_primitives::{
	mmr::{MmrLeaf, MmrProof, SimplifiedMmrProof},
	H256,
};
use codec::{Decode, Encode};
use structopt::StructOpt;

/// MMR related commands
#[derive(StructOpt)]
#[structopt(about = "Merkle Mountain Range related commands.")]
pub enum Mmr {
	/// Decode an MMR leaf.
	DecodeLeaf {
		/// A double SCALE-encoded MMR Leaf.
		///
		/// Leaf can be obtained via `mmr_generateProof` custom RPC method.
		/// Since the RPC returns a SCALE-encoding of `Vec<u8>`, this method expects the same.
		leaf: Bytes,
	},
	/// Keccak-256 hash of an MMR leaf, as inserted into the MMR.
	HashLeaf {
		/// A double SCALE-encoded MMR Leaf.
		leaf: Bytes,
	},
	/// Convert a leaf proof into the simplified form accepted by the light client.
	SimplifyProof {
		/// A SCALE-encoded leaf proof: leaf index, leaf count and proof items.
		proof: Bytes,
		/// Verify the simplified proof of this leaf hash against `root`.
		#[structopt(long, requires("root"))]
		leaf_hash: Option<H256>,
		/// MMR root to verify against.
		#[structopt(long, requires("leaf-hash"))]
		root: Option<H256>,
	},
}

impl Mmr {
	pub fn run(self) -> anyhow::Result<()> {
		match self {
			Self::DecodeLeaf { leaf } => {
				println!("{:#?}", decode_leaf(&leaf.0)?);
			}
			Self::HashLeaf { leaf } => {
				println!("{:?}", decode_leaf(&leaf.0)?.hash());
			}
			Self::SimplifyProof { proof, leaf_hash, root } => {
				let proof = MmrProof::decode(&mut &*proof.0)?;
				let simplified = simplify(&proof, leaf_hash.zip(root))?;

				println!();
				println!("Items: {:?}", simplified.items);
				println!("Order: 0x{:x}", simplified.order);
				println!("SCALE-encoded proof: 0x{}", hex::encode(simplified.encode()));
				println!();
			}
		}
		Ok(())
	}
}

fn decode_leaf(encoded: &[u8]) -> anyhow::Result<MmrLeaf> {
	let leaf: Vec<u8> = Decode::decode(&mut &*encoded)?;
	Ok(MmrLeaf::decode(&mut &*leaf)?)
}

fn simplify(proof: &MmrProof, check: Option<(H256, H256)>) -> anyhow::Result<SimplifiedMmrProof> {
	let simplified = proof.simplify()?;

	if let Some((leaf_hash, root)) = check {
		anyhow::ensure!(
			simplified.verify(&root, &leaf_hash),
			"Leaf {:?} is not proven against {:?}",
			leaf_hash,
			root
		);
		log::info!(target: "beefy", "Proof of leaf {} verified against {:?}", proof.leaf_index, root);
	}

	Ok(simplified)
}

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

use crate::cli::{
	uncompress_authorities::uncompress_beefy_ids,
	utils::{Addresses, Authorities, Bytes, Hashes, ParaHead},
};
use beefy_merkle_tree::{verify_proof, Keccak256, Leaf};
use beefy_primitives::{
	parachain::{para_head_leaf, para_head_proof, para_heads_root, HeadProof, ParaId},
	validator::{validator_merkle_proof, validator_set_root},
	H160, H256,
};
use codec::{Decode, Encode};
use structopt::StructOpt;

/// Validator address merkle tree related commands.
#[derive(StructOpt)]
#[structopt(about = "Construct or verify a merkle proof of a validator address.")]
pub enum ValidatorMerkleTree {
	/// Construct a merkle tree of validator addresses and generate a merkle proof.
	GenerateProof {
		/// Leaf index to generate the proof for.
		leaf_index: usize,
		/// Comma separated validator addresses, in set order.
		#[structopt(long, required_unless("authorities"))]
		addresses: Option<Addresses>,
		/// A SCALE-encoded vector of BEEFY authority ids (compressed public keys).
		#[structopt(long, conflicts_with("addresses"))]
		authorities: Option<Authorities>,
	},
	/// Verify a merkle proof given root hash and the proof content.
	VerifyProof {
		/// Validator set root.
		root: H256,
		/// Comma separated proof items.
		proof: Hashes,
		/// Number of validators in the set.
		number_of_leaves: usize,
		/// Index of the leaf the proof is for.
		leaf_index: usize,
		/// Validator address.
		address: H160,
	},
}

impl ValidatorMerkleTree {
	pub fn run(self) -> anyhow::Result<()> {
		match self {
			Self::GenerateProof {
				leaf_index,
				addresses,
				authorities,
			} => {
				let addresses = match (addresses, authorities) {
					(Some(addresses), _) => addresses.0,
					(None, Some(ids)) => uncompress_beefy_ids(&ids.0)?,
					(None, None) => anyhow::bail!("Neither argument given"),
				};
				let (root, proof) = generate_validator_proof(&addresses, leaf_index)?;

				println!();
				println!("Root: {:?}", root);
				println!("Number of leaves: {}", addresses.len());
				println!("Leaf: {:?}", addresses[leaf_index]);
				println!("Proof: {}", join(&proof));
				println!();

				Ok(())
			}
			Self::VerifyProof {
				root,
				proof,
				number_of_leaves,
				leaf_index,
				address,
			} => {
				verify_validator_proof(root, &proof.0, number_of_leaves, leaf_index, address)?;
				println!("\nProof is correct.\n");
				Ok(())
			}
		}
	}
}

/// Parachain heads merkle tree related commands.
#[derive(StructOpt)]
#[structopt(about = "Construct or verify a merkle proof from parachain heads.")]
pub enum ParaMerkleTree {
	/// Construct a merkle tree of the given parachain heads and generate a merkle proof.
	GenerateProof {
		/// Parachain to generate the proof for.
		para_id: ParaId,
		/// Heads of all parachains, as `<para id>:<hex encoded head>`.
		heads: Vec<ParaHead>,
	},
	/// Verify a merkle proof given root hash and the proof content.
	VerifyProof {
		/// Parachain heads root.
		root: H256,
		/// SCALE-encoded head proof.
		proof: Bytes,
		/// Parachain the proof is for.
		para_id: ParaId,
		/// SCALE-encoded head of the parachain.
		head: Bytes,
	},
}

impl ParaMerkleTree {
	pub fn run(self) -> anyhow::Result<()> {
		match self {
			Self::GenerateProof { para_id, heads } => {
				let heads = heads.into_iter().map(|head| (head.0, head.1)).collect::<Vec<_>>();
				let proof = para_head_proof(&heads, para_id)
					.ok_or_else(|| anyhow::format_err!("No head of parachain {}", para_id))?;

				println!();
				println!("Root: {:?}", para_heads_root(&heads));
				println!("SCALE-encoded proof: 0x{}", hex::encode(proof.encode()));
				println!();

				Ok(())
			}
			Self::VerifyProof {
				root,
				proof,
				para_id,
				head,
			} => {
				let proof = HeadProof::decode(&mut &*proof.0)?;
				verify_head_proof(root, &proof, para_id, &head.0)?;
				println!("\nProof is correct.\n");
				Ok(())
			}
		}
	}
}

fn join(hashes: &[H256]) -> String {
	hashes.iter().map(|h| format!("{:?}", h)).collect::<Vec<_>>().join(",")
}

fn generate_validator_proof(addresses: &[H160], leaf_index: usize) -> anyhow::Result<(H256, Vec<H256>)> {
	let proof = validator_merkle_proof(addresses, leaf_index).ok_or_else(|| {
		anyhow::format_err!("Leaf index out of bounds: {} vs {}", leaf_index, addresses.len())
	})?;

	Ok((validator_set_root(addresses), proof))
}

fn verify_validator_proof(
	root: H256,
	proof: &[H256],
	number_of_leaves: usize,
	leaf_index: usize,
	address: H160,
) -> anyhow::Result<()> {
	let valid = verify_proof::<Keccak256, _, _>(
		root.as_fixed_bytes(),
		proof.iter().map(|h| h.to_fixed_bytes()),
		number_of_leaves,
		leaf_index,
		Leaf::Value(address.as_bytes()),
	);
	anyhow::ensure!(valid, "Proof does not match root {:?}", root);

	Ok(())
}

fn verify_head_proof(root: H256, proof: &HeadProof, para_id: ParaId, head: &[u8]) -> anyhow::Result<()> {
	let computed = proof
		.root(&para_head_leaf(para_id, head))
		.ok_or_else(|| anyhow::format_err!("Malformed proof"))?;
	anyhow::ensure!(computed == root, "Proof yields root {:?}, expected {:?}", computed, root);

	Ok(())
}

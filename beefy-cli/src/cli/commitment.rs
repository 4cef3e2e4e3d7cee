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

use crate::cli::utils::{Bytes, List};
use beefy_light_client::num_required_signatures;
use beefy_primitives::{
	bitfield::{subsample, Bitfield},
	SignedCommitment, H256, U256,
};
use codec::Decode;
use structopt::StructOpt;

/// Commitment related commands.
#[derive(StructOpt)]
#[structopt(about = "Inspect signed commitments and validator bitfields.")]
pub enum Commitment {
	/// Decode a SCALE-encoded signed commitment and print its hash.
	Hash {
		/// A SCALE-encoded signed commitment.
		signed_commitment: Bytes,
	},
	/// Select validators from a candidate bitfield, the way the light client does.
	Subsample {
		/// Randomness the selection is seeded with.
		seed: H256,
		/// Comma separated indices of the validators that signed.
		signers: List<usize>,
		/// Number of validators in the set.
		length: usize,
		/// Number of validators to select.
		///
		/// Defaults to the number the light client requires for a fresh validator.
		#[structopt(long)]
		count: Option<usize>,
		/// Minimum number of signatures the light client requires.
		#[structopt(long, default_value = "1")]
		min_signatures: u32,
	},
}

impl Commitment {
	pub fn run(self) -> anyhow::Result<()> {
		match self {
			Self::Hash { signed_commitment } => {
				let signed = SignedCommitment::decode(&mut &*signed_commitment.0)?;
				let commitment = &signed.commitment;

				println!();
				println!("Block: #{}", commitment.block_number);
				println!("Validator set: {}", commitment.validator_set_id);
				match commitment.mmr_root() {
					Some(root) => println!("MMR root: 0x{}", hex::encode(root)),
					None => println!("MMR root: none"),
				}
				println!("Signatures: {} of {}", signed.no_of_signatures(), signed.signatures.len());
				println!("Hash: {:?}", commitment.hash());
				println!();
			}
			Self::Subsample {
				seed,
				signers,
				length,
				count,
				min_signatures,
			} => {
				let count = count
					.unwrap_or_else(|| num_required_signatures(min_signatures, length as u64, 0) as usize);
				let selected = select(seed, &signers.0, length, count)?;
				println!("{}", selected.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(","));
			}
		}
		Ok(())
	}
}

fn select(seed: H256, signers: &[usize], length: usize, count: usize) -> anyhow::Result<Vec<usize>> {
	let prior = Bitfield::create_initial(signers.iter().copied(), length)?;
	let selected = subsample(U256::from_big_endian(seed.as_bytes()), &prior, count, length)?;

	Ok(selected.iter_ones().collect())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn select_from_signers() {
		// given
		let seed = H256::repeat_byte(7);
		let signers = [0, 2, 3, 5, 8];

		// when
		let selected = select(seed, &signers, 10, 3).unwrap();

		// then
		assert_eq!(selected.len(), 3);
		assert!(selected.iter().all(|i| signers.contains(i)));
		assert_eq!(select(seed, &signers, 10, 3).unwrap(), selected);
	}

	#[test]
	fn select_fails_without_enough_signers() {
		assert!(select(H256::zero(), &[0, 1], 4, 3).is_err());
		assert!(select(H256::zero(), &[4], 4, 1).is_err());
	}
}

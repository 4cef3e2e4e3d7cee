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

//! Validator signature proofs for a signed commitment.

use rand::seq::IteratorRandom;

use beefy_primitives::{
	bitfield::Bitfield,
	crypto::recover_address,
	validator::{validator_merkle_proof, validator_set_root},
	SignedCommitment, ValidatorProof, ValidatorSet, H160, H256,
};

use crate::error::Error;

/// Builds [ValidatorProof]s for the signatures of a [SignedCommitment].
#[derive(Debug, Clone)]
pub struct SignatureProofs {
	signed: SignedCommitment,
	addresses: Vec<H160>,
	commitment_hash: H256,
}

impl SignatureProofs {
	/// Pair a signed commitment with the addresses of the set that signed it.
	///
	/// The addresses must commit to `set`, and there must be one signature slot per validator.
	pub fn new(signed: SignedCommitment, addresses: Vec<H160>, set: &ValidatorSet) -> Result<Self, Error> {
		if validator_set_root(&addresses) != set.root || addresses.len() != set.len() {
			return Err(Error::InvalidSourceData(format!(
				"addresses of validator set {} do not match its root",
				set.id
			)));
		}

		if signed.signatures.len() != addresses.len() {
			return Err(Error::InvalidSourceData(format!(
				"commitment #{} has {} signature slots, validator set {} has {} validators",
				signed.commitment.block_number,
				signed.signatures.len(),
				set.id,
				addresses.len()
			)));
		}

		let commitment_hash = signed.commitment.hash();

		Ok(SignatureProofs {
			signed,
			addresses,
			commitment_hash,
		})
	}

	/// Indices of the validators with a valid signature.
	pub fn signers(&self) -> impl Iterator<Item = usize> + '_ {
		self.signed
			.signatures
			.iter()
			.enumerate()
			.filter_map(move |(index, signature)| {
				let signature = signature.as_ref()?;
				if recover_address(&self.commitment_hash, signature) == Some(self.addresses[index]) {
					Some(index)
				} else {
					None
				}
			})
	}

	/// Candidate bitfield with a bit set per valid signature.
	pub fn candidate_bitfield(&self) -> Result<Bitfield, Error> {
		Ok(Bitfield::create_initial(self.signers(), self.addresses.len())?)
	}

	/// A random validator with a valid signature, to open the ticket with.
	pub fn initial_signer(&self) -> Option<usize> {
		self.signers().choose(&mut rand::thread_rng())
	}

	/// Proof that validator `index` signed the commitment.
	pub fn proof(&self, index: usize) -> Result<ValidatorProof, Error> {
		let signature = self
			.signed
			.signatures
			.get(index)
			.copied()
			.flatten()
			.ok_or_else(|| Error::InvalidSourceData(format!("validator {} did not sign", index)))?;
		let proof = validator_merkle_proof(&self.addresses, index)
			.ok_or_else(|| Error::InvalidSourceData(format!("validator {} out of bounds", index)))?;

		Ok(ValidatorProof {
			v: signature.v(),
			r: signature.r(),
			s: signature.s(),
			index: index as u64,
			account: self.addresses[index],
			proof,
		})
	}

	/// Proofs for every bit set in `bitfield`, in increasing index order.
	pub fn proofs_for(&self, bitfield: &Bitfield) -> Result<Vec<ValidatorProof>, Error> {
		bitfield.iter_ones().map(|index| self.proof(index)).collect()
	}

	pub fn commitment_hash(&self) -> H256 {
		self.commitment_hash
	}

	pub fn signed_commitment(&self) -> &SignedCommitment {
		&self.signed
	}
}

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

use std::collections::BTreeMap;

use beefy_primitives::{
	bitfield::{self, words_for, Bitfield},
	mmr::{verify_leaf_proof, MmrLeaf, MAX_PROOF_ITEMS},
	Commitment, ValidatorProof, ValidatorSet, H256, U256,
};

use crate::{
	ticket::{Ticket, TicketState},
	BlockEnv, BlockNumber, Error, Event,
};

/// Parameters fixed at deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
	/// Blocks to wait after an initial submission before randomness can be captured.
	pub randao_commit_delay: BlockNumber,
	/// Blocks after the delay during which the ticket stays usable.
	pub randao_commit_expiration: BlockNumber,
	/// Lower bound for the number of signatures of a final submission.
	pub min_num_required_signatures: u32,
}

/// A validator set together with the number of times each validator was used to open a ticket.
#[derive(Debug, Clone)]
struct TrackedSet {
	set: ValidatorSet,
	usage: Vec<u16>,
}

impl TrackedSet {
	fn install(set: ValidatorSet) -> Self {
		TrackedSet {
			usage: vec![0; set.len()],
			set,
		}
	}

	fn usage_of(&self, index: u64) -> u16 {
		self.usage.get(index as usize).copied().unwrap_or(0)
	}
}

/// The light client verifier, modelled as a state machine.
///
/// Every mutating call either succeeds and applies all its effects, or fails and leaves the
/// client untouched.
#[derive(Debug, Clone)]
pub struct BeefyClient {
	config: Config,
	latest_mmr_root: H256,
	latest_beefy_block: BlockNumber,
	current: TrackedSet,
	next: TrackedSet,
	tickets: BTreeMap<H256, Ticket>,
	events: Vec<Event>,
}

/// Number of signatures needed for a supermajority of `n` validators.
pub fn quorum(n: u64) -> u64 {
	if n <= 3 {
		n
	} else {
		n - (n - 1) / 3
	}
}

/// `ceil(log2(x))`, with `ceil_log2(0) == 0`.
pub fn ceil_log2(x: u64) -> u64 {
	if x <= 1 {
		0
	} else {
		64 - u64::from((x - 1).leading_zeros())
	}
}

/// Signatures required by a final submission, given the set length and how often the
/// signer of the initial submission has already been used.
pub fn num_required_signatures(min_required: u32, set_len: u64, usage: u16) -> u64 {
	let min_required = u64::from(min_required);
	let f = min_required + ceil_log2(set_len) + 1 + 2 * ceil_log2(u64::from(usage));
	min_required.max(f).min(quorum(set_len))
}

impl BeefyClient {
	/// Deploy a light client trusting `current` and `next` from `initial_beefy_block` on.
	pub fn initialize(
		config: Config,
		initial_beefy_block: BlockNumber,
		current: ValidatorSet,
		next: ValidatorSet,
	) -> Self {
		BeefyClient {
			config,
			latest_mmr_root: H256::zero(),
			latest_beefy_block: initial_beefy_block,
			current: TrackedSet::install(current),
			next: TrackedSet::install(next),
			tickets: BTreeMap::new(),
			events: Vec::new(),
		}
	}

	/// Open a ticket for `commitment`, claiming that the validators set in `bitfield` signed it.
	///
	/// `proof` shows that one of them actually did.
	pub fn submit_initial(
		&mut self,
		env: &BlockEnv,
		commitment: &Commitment,
		bitfield: &Bitfield,
		proof: &ValidatorProof,
	) -> Result<(), Error> {
		let is_next = self.next.set.has_id(commitment.validator_set_id);
		let tracked = if is_next {
			&self.next
		} else if self.current.set.has_id(commitment.validator_set_id) {
			&self.current
		} else {
			return Err(Error::InvalidCommitment);
		};

		if u64::from(commitment.block_number) <= self.latest_beefy_block {
			return Err(Error::InvalidCommitment);
		}

		let len = tracked.set.len();
		if bitfield.words().len() != words_for(len) {
			return Err(Error::InvalidBitfieldLength);
		}
		if bitfield.count_set_bits() != bitfield.count_set_bits_below(len) {
			return Err(Error::InvalidBitfield);
		}
		if (bitfield.count_set_bits() as u64) < quorum(len as u64) {
			return Err(Error::NotEnoughClaims);
		}

		if proof.index >= len as u64 {
			return Err(Error::IndexOutOfBounds);
		}
		if !bitfield.is_set(proof.index as usize) || !proof.is_member_of(&tracked.set) {
			return Err(Error::InvalidValidatorProof);
		}

		let commitment_hash = commitment.hash();
		if !proof.is_signed_by_account(&commitment_hash) {
			return Err(Error::InvalidSignature);
		}

		if let Some(existing) = self.tickets.get(&commitment_hash) {
			match self.ticket_state(existing, env.number) {
				TicketState::Expired => {}
				TicketState::RandaoCaptured => return Err(Error::PrevRandaoAlreadyCaptured),
				TicketState::Created | TicketState::RandaoPending => return Ok(()),
			}
		}

		let usage = tracked.usage_of(proof.index);
		let num_required = num_required_signatures(self.config.min_num_required_signatures, len as u64, usage);

		// all checks passed, apply effects
		let tracked = if is_next { &mut self.next } else { &mut self.current };
		if let Some(counter) = tracked.usage.get_mut(proof.index as usize) {
			*counter = counter.saturating_add(1);
		}

		self.tickets.insert(
			commitment_hash,
			Ticket {
				block_number: env.number,
				validator_set_len: len as u32,
				num_required_signatures: num_required as u32,
				prev_randao: None,
				bitfield_hash: bitfield.hash(),
			},
		);
		self.events.push(Event::NewTicket {
			commitment_hash,
			block_number: env.number,
		});

		Ok(())
	}

	/// Capture the randomness of the current block for the ticket of `commitment_hash`.
	pub fn commit_prev_randao(&mut self, env: &BlockEnv, commitment_hash: &H256) -> Result<(), Error> {
		let delay = self.config.randao_commit_delay;
		let expiration = self.config.randao_commit_expiration;

		let ticket = self.tickets.get_mut(commitment_hash).ok_or(Error::InvalidTicket)?;

		if ticket.prev_randao.is_some() {
			return Err(Error::PrevRandaoAlreadyCaptured);
		}
		if env.number < ticket.randao_block(delay) {
			return Err(Error::WaitPeriodNotOver);
		}
		if env.number > ticket.deadline(delay, expiration) {
			return Err(Error::TicketExpired);
		}

		ticket.prev_randao = Some(env.prev_randao);

		Ok(())
	}

	/// Derive the validators whose signatures the final submission has to carry.
	///
	/// `bitfield` is the candidate bitfield of the initial submission.
	pub fn create_final_bitfield(
		&self,
		env: &BlockEnv,
		commitment_hash: &H256,
		bitfield: &Bitfield,
	) -> Result<Bitfield, Error> {
		let ticket = self.tickets.get(commitment_hash).ok_or(Error::InvalidTicket)?;
		let prev_randao = self.captured_randao(ticket, env.number)?;

		if bitfield.hash() != ticket.bitfield_hash {
			return Err(Error::InvalidBitfield);
		}

		final_bitfield(ticket, prev_randao, bitfield)
	}

	/// Accept `commitment` and its MMR root.
	///
	/// `bitfield` is the candidate bitfield of the initial submission, the final selection is
	/// derived from it. `proofs` holds one proof per selected validator. `leaf` is the leaf of
	/// the commitment's parent block, proven against the new root.
	#[allow(clippy::too_many_arguments)]
	pub fn submit_final(
		&mut self,
		env: &BlockEnv,
		commitment: &Commitment,
		bitfield: &Bitfield,
		proofs: &[ValidatorProof],
		leaf: &MmrLeaf,
		leaf_proof: &[H256],
		leaf_proof_order: U256,
	) -> Result<(), Error> {
		// finalizing deletes the ticket, so staleness is checked first
		if u64::from(commitment.block_number) <= self.latest_beefy_block {
			return Err(Error::StaleCommitment);
		}

		let commitment_hash = commitment.hash();
		let ticket = self.tickets.get(&commitment_hash).ok_or(Error::InvalidTicket)?;
		let prev_randao = self.captured_randao(ticket, env.number)?;

		let is_next = self.next.set.has_id(commitment.validator_set_id);
		let set = if is_next {
			&self.next.set
		} else if self.current.set.has_id(commitment.validator_set_id) {
			&self.current.set
		} else {
			return Err(Error::CommitmentNotRelevant);
		};

		if bitfield.hash() != ticket.bitfield_hash {
			return Err(Error::InvalidBitfield);
		}

		let selected = final_bitfield(ticket, prev_randao, bitfield)?;
		if proofs.len() as u64 != u64::from(ticket.num_required_signatures) {
			return Err(Error::InvalidValidatorProofLength);
		}

		let mut used = Bitfield::with_length(set.len());
		for proof in proofs {
			let index = proof.index as usize;
			if proof.index >= set.length as u64 || !selected.is_set(index) || used.is_set(index) {
				return Err(Error::InvalidValidatorProof);
			}
			if !proof.is_member_of(set) {
				return Err(Error::InvalidValidatorProof);
			}
			if !proof.is_signed_by_account(&commitment_hash) {
				return Err(Error::InvalidSignature);
			}
			used.set(index);
		}

		let root = commitment.mmr_root().ok_or(Error::CommitmentNotRelevant)?;
		if root.len() != 32 {
			return Err(Error::InvalidMMRRootLength);
		}
		let root = H256::from_slice(root);

		let expected_next_id = if is_next { self.next.set.id + 1 } else { self.next.set.id };
		if u128::from(leaf.next_authority_set_id) != expected_next_id {
			return Err(Error::InvalidMMRLeaf);
		}

		if leaf_proof.len() > MAX_PROOF_ITEMS {
			return Err(Error::ProofSizeExceeded);
		}
		if !verify_leaf_proof(&root, &leaf.hash(), leaf_proof, leaf_proof_order) {
			return Err(Error::InvalidMMRLeafProof);
		}

		// all checks passed, apply effects
		if is_next {
			let handover = ValidatorSet {
				id: leaf.next_authority_set_id.into(),
				length: leaf.next_authority_set_len.into(),
				root: leaf.next_authority_set_root,
			};
			self.current = std::mem::replace(&mut self.next, TrackedSet::install(handover));
		}

		self.latest_mmr_root = root;
		self.latest_beefy_block = commitment.block_number.into();
		self.tickets.remove(&commitment_hash);
		self.events.push(Event::NewMMRRoot {
			root,
			block_number: commitment.block_number.into(),
		});

		Ok(())
	}

	/// Verify a simplified MMR leaf proof against the latest accepted root.
	pub fn verify_mmr_leaf_proof(&self, leaf_hash: &H256, proof: &[H256], proof_order: U256) -> bool {
		verify_leaf_proof(&self.latest_mmr_root, leaf_hash, proof, proof_order)
	}

	/// Build a candidate bitfield for a set of `length` validators.
	pub fn create_initial_bitfield<I>(bits_to_set: I, length: usize) -> Result<Bitfield, Error>
	where
		I: IntoIterator<Item = usize>,
	{
		Ok(Bitfield::create_initial(bits_to_set, length)?)
	}

	/// Ticket of `commitment_hash`, if any.
	pub fn ticket(&self, commitment_hash: &H256) -> Option<&Ticket> {
		self.tickets.get(commitment_hash)
	}

	/// Lifecycle state of the ticket of `commitment_hash` at block `now`.
	pub fn ticket_state_at(&self, commitment_hash: &H256, now: BlockNumber) -> Option<TicketState> {
		self.tickets.get(commitment_hash).map(|ticket| self.ticket_state(ticket, now))
	}

	pub fn latest_mmr_root(&self) -> H256 {
		self.latest_mmr_root
	}

	pub fn latest_beefy_block(&self) -> BlockNumber {
		self.latest_beefy_block
	}

	pub fn current_validator_set(&self) -> ValidatorSet {
		self.current.set
	}

	pub fn next_validator_set(&self) -> ValidatorSet {
		self.next.set
	}

	pub fn randao_commit_delay(&self) -> BlockNumber {
		self.config.randao_commit_delay
	}

	pub fn randao_commit_expiration(&self) -> BlockNumber {
		self.config.randao_commit_expiration
	}

	pub fn min_num_required_signatures(&self) -> u32 {
		self.config.min_num_required_signatures
	}

	/// Number of initial submissions opened with the validator at `index` of the set `id`.
	pub fn usage_count(&self, id: u64, index: u64) -> Option<u16> {
		[&self.current, &self.next]
			.iter()
			.find(|tracked| tracked.set.has_id(id))
			.map(|tracked| tracked.usage_of(index))
	}

	/// Events emitted so far, oldest first.
	pub fn events(&self) -> &[Event] {
		&self.events
	}

	fn ticket_state(&self, ticket: &Ticket, now: BlockNumber) -> TicketState {
		ticket.state(now, self.config.randao_commit_delay, self.config.randao_commit_expiration)
	}

	fn captured_randao(&self, ticket: &Ticket, now: BlockNumber) -> Result<U256, Error> {
		match (self.ticket_state(ticket, now), ticket.prev_randao) {
			(TicketState::Expired, _) => Err(Error::TicketExpired),
			(_, Some(prev_randao)) => Ok(prev_randao),
			(_, None) => Err(Error::PrevRandaoNotCaptured),
		}
	}
}

fn final_bitfield(ticket: &Ticket, prev_randao: U256, candidate: &Bitfield) -> Result<Bitfield, Error> {
	Ok(bitfield::subsample(
		prev_randao,
		candidate,
		ticket.num_required_signatures as usize,
		ticket.validator_set_len as usize,
	)?)
}

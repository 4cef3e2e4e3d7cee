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

//! Two-phase submission of signed commitments to the light client.

use std::{convert::TryFrom, time::Duration};

use log::{debug, info, trace};

use beefy_light_client::Error as VerifierError;
use beefy_primitives::{bitfield::Bitfield, SignedCommitment, ValidatorSet, H256};

use crate::{
	client::{BeefyClientApi, RelayChainApi},
	error::{Error, ErrorKind},
	mmr_proof::MmrProofProvider,
	proofs::SignatureProofs,
};

/// What became of a commitment handed to the [TicketManager].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
	/// The light client accepted the commitment.
	Accepted,
	/// The commitment is stale or not relevant. Somebody else got there first.
	Skipped,
}

/// Drives a commitment through `submit_initial`, `commit_prev_randao` and `submit_final`.
#[derive(Debug, Clone)]
pub struct TicketManager<R, B> {
	relay: R,
	client: B,
	leaves: MmrProofProvider<R>,
	poll_interval: Duration,
}

impl<R, B> TicketManager<R, B>
where
	R: RelayChainApi,
	B: BeefyClientApi,
{
	pub fn new(relay: R, client: B, poll_interval: Duration) -> Self {
		TicketManager {
			leaves: MmrProofProvider::new(relay.clone()),
			relay,
			client,
			poll_interval,
		}
	}

	/// Relay `signed` to the light client.
	///
	/// Waits out the randao delay and reopens the ticket if it expires in the meantime.
	pub async fn relay_commitment(&self, signed: SignedCommitment) -> Result<RelayOutcome, Error> {
		let block_number = signed.commitment.block_number;
		let set_id = signed.commitment.validator_set_id;

		let set = match self.signing_set(&signed).await? {
			Some(set) => set,
			None => return Ok(RelayOutcome::Skipped),
		};

		let addresses = self.relay.validator_addresses(set_id).await?;
		let proofs = SignatureProofs::new(signed, addresses, &set)?;
		let candidate = proofs.candidate_bitfield()?;

		debug!(
			target: "beefy",
			"🥩 Relaying commitment #{} of set {}, {} of {} validators signed",
			block_number,
			set_id,
			candidate.count_set_bits(),
			set.len(),
		);

		loop {
			match self.submit(&proofs, &candidate).await {
				Ok(()) => {
					info!(target: "beefy", "🥩 Commitment #{} of set {} accepted", block_number, set_id);
					return Ok(RelayOutcome::Accepted);
				}
				// expired, or reopened by another relayer since it was read
				Err(err) if err.kind() == ErrorKind::Timing => {
					debug!(target: "beefy", "🥩 Ticket for #{} not usable ({}), reopening", block_number, err);
				}
				Err(err) if err.kind() == ErrorKind::Relevance => {
					debug!(target: "beefy", "🥩 Commitment #{} no longer needed: {}", block_number, err);
					return Ok(RelayOutcome::Skipped);
				}
				Err(err) if self.superseded(&err, block_number).await? => {
					debug!(
						target: "beefy",
						"🥩 Commitment #{} was finalized by another relayer: {}",
						block_number,
						err,
					);
					return Ok(RelayOutcome::Skipped);
				}
				Err(err) => return Err(err),
			}
		}
	}

	/// The light client's validator set that signed `signed`, if the commitment is still useful.
	async fn signing_set(&self, signed: &SignedCommitment) -> Result<Option<ValidatorSet>, Error> {
		let commitment = &signed.commitment;

		let latest = self.client.latest_beefy_block().await?;
		if u64::from(commitment.block_number) <= latest {
			trace!(
				target: "beefy",
				"🥩 Commitment #{} is not newer than #{}",
				commitment.block_number,
				latest
			);
			return Ok(None);
		}

		if commitment.mmr_root().is_none() {
			trace!(target: "beefy", "🥩 Commitment #{} carries no MMR root", commitment.block_number);
			return Ok(None);
		}

		let next = self.client.next_validator_set().await?;
		if next.has_id(commitment.validator_set_id) {
			return Ok(Some(next));
		}
		let current = self.client.current_validator_set().await?;
		if current.has_id(commitment.validator_set_id) {
			return Ok(Some(current));
		}

		trace!(
			target: "beefy",
			"🥩 Commitment #{} signed by set {}, light client tracks {} and {}",
			commitment.block_number,
			commitment.validator_set_id,
			current.id,
			next.id,
		);

		Ok(None)
	}

	async fn submit(&self, proofs: &SignatureProofs, candidate: &Bitfield) -> Result<(), Error> {
		self.open_ticket(proofs, candidate).await?;
		self.capture_randao(proofs.commitment_hash()).await?;
		self.finalize(proofs, candidate).await
	}

	/// Phase 1. A live ticket for the same commitment is left as it is.
	async fn open_ticket(&self, proofs: &SignatureProofs, candidate: &Bitfield) -> Result<(), Error> {
		let signer = proofs
			.initial_signer()
			.ok_or_else(|| Error::InvalidSourceData("commitment without valid signatures".into()))?;
		let commitment = proofs.signed_commitment().commitment.clone();

		match self
			.client
			.submit_initial(commitment, candidate.clone(), proofs.proof(signer)?)
			.await
		{
			Err(err) if err.verifier() == Some(VerifierError::PrevRandaoAlreadyCaptured) => {
				trace!(target: "beefy", "🥩 Randao already captured, skipping initial submission");
				Ok(())
			}
			result => result,
		}
	}

	/// Wait for the randao delay to pass, then capture the randomness.
	///
	/// Fails with `TicketExpired` without sending anything if the capture window closes before
	/// the next block, so that the ticket is reopened instead.
	async fn capture_randao(&self, commitment_hash: H256) -> Result<(), Error> {
		let ticket = self
			.client
			.ticket(commitment_hash)
			.await?
			.ok_or(Error::Verifier(VerifierError::InvalidTicket))?;
		if ticket.prev_randao.is_some() {
			return Ok(());
		}

		let delay = self.client.randao_commit_delay().await?;
		let expiration = self.client.randao_commit_expiration().await?;
		let ready = ticket.randao_block(delay);
		let deadline = ticket.deadline(delay, expiration);

		loop {
			// the transaction lands in the block after the current one
			let next = self.client.block_number().await?.saturating_add(1);
			if next > deadline {
				return Err(Error::Verifier(VerifierError::TicketExpired));
			}
			if next >= ready {
				break;
			}
			trace!(
				target: "beefy",
				"🥩 Waiting for randao of {:?}, block {} of {}",
				commitment_hash,
				next,
				ready,
			);
			async_std::task::sleep(self.poll_interval).await;
		}

		match self.client.commit_prev_randao(commitment_hash).await {
			Err(err) if err.verifier() == Some(VerifierError::PrevRandaoAlreadyCaptured) => Ok(()),
			result => result,
		}
	}

	/// Whether `err` is explained by another relayer having finalized `block_number` or a later
	/// commitment, which deletes the ticket and makes the commitment stale.
	async fn superseded(&self, err: &Error, block_number: u32) -> Result<bool, Error> {
		match err.verifier() {
			Some(VerifierError::InvalidTicket) | Some(VerifierError::InvalidCommitment) => {
				Ok(self.client.latest_beefy_block().await? >= u64::from(block_number))
			}
			_ => Ok(false),
		}
	}

	/// Phase 2.
	async fn finalize(&self, proofs: &SignatureProofs, candidate: &Bitfield) -> Result<(), Error> {
		let commitment = proofs.signed_commitment().commitment.clone();

		let root = commitment
			.mmr_root()
			.and_then(|root| <[u8; 32]>::try_from(root).ok())
			.map(H256)
			.ok_or_else(|| {
				Error::InvalidSourceData(format!("commitment #{} has a malformed MMR root", commitment.block_number))
			})?;

		let selected = self
			.client
			.create_final_bitfield(proofs.commitment_hash(), candidate.clone())
			.await?;
		let validator_proofs = proofs.proofs_for(&selected)?;
		let (leaf, leaf_proof) = self.leaves.commitment_leaf_proof(commitment.block_number, &root).await?;

		trace!(
			target: "beefy",
			"🥩 Final submission of #{} with {} signatures",
			commitment.block_number,
			validator_proofs.len(),
		);

		self.client
			.submit_final(commitment, candidate.clone(), validator_proofs, leaf, leaf_proof)
			.await
	}
}

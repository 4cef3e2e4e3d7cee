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

//! Nonce-ordered relay of the messages of one channel.
//!
//! Messages are relayed strictly one at a time, in nonce order. A message can only be proven
//! once the light client accepted a commitment at or after the relay block that included the
//! parachain header committing to it.

use std::time::Duration;

use codec::Encode;
use log::{debug, info, trace};

use beefy_light_client::gateway::DispatchOutcome;
use beefy_primitives::{
	message::{message_commitment, message_proof, Channel, ChannelId, InboundMessage},
	parachain::{para_head_proof, para_heads_root, ParaId, VerificationProof},
	H256,
};

use crate::{
	client::{BeefyClientApi, GatewayApi, ParachainApi, RelayChainApi},
	error::Error,
	mmr_proof::MmrProofProvider,
};

/// Where the relay of a channel stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
	/// Nothing to do until the next poll.
	Idle,
	/// Read both ends of the channel.
	FetchNext,
	/// Build the proofs of message `nonce`.
	ProveInclusion { nonce: u64 },
	/// Hand a proven message to the gateway.
	Submit {
		message: InboundMessage,
		leaf_proof: Vec<H256>,
		header_proof: VerificationProof,
	},
}

/// Relays the messages of one channel to the gateway.
#[derive(Debug, Clone)]
pub struct ChannelRelay<R, P, B, G> {
	channel: Channel,
	para_id: ParaId,
	relay: R,
	parachain: P,
	client: B,
	gateway: G,
	leaves: MmrProofProvider<R>,
	poll_interval: Duration,
}

impl<R, P, B, G> ChannelRelay<R, P, B, G>
where
	R: RelayChainApi,
	P: ParachainApi,
	B: BeefyClientApi,
	G: GatewayApi,
{
	pub fn new(
		channel_id: ChannelId,
		para_id: ParaId,
		relay: R,
		parachain: P,
		client: B,
		gateway: G,
		poll_interval: Duration,
	) -> Self {
		ChannelRelay {
			channel: Channel {
				id: channel_id,
				..Default::default()
			},
			para_id,
			leaves: MmrProofProvider::new(relay.clone()),
			relay,
			parachain,
			client,
			gateway,
			poll_interval,
		}
	}

	/// Nonces as last read.
	pub fn channel(&self) -> &Channel {
		&self.channel
	}

	/// Relay messages until an error occurs.
	pub async fn run(mut self) -> Result<(), Error> {
		let mut state = State::FetchNext;
		loop {
			state = self.step(state).await?;
		}
	}

	/// Advance the state machine by one transition.
	pub async fn step(&mut self, state: State) -> Result<State, Error> {
		match state {
			State::Idle => {
				async_std::task::sleep(self.poll_interval).await;
				Ok(State::FetchNext)
			}
			State::FetchNext => self.fetch_next().await,
			State::ProveInclusion { nonce } => self.prove_inclusion(nonce).await,
			State::Submit {
				message,
				leaf_proof,
				header_proof,
			} => self.submit(message, leaf_proof, header_proof).await,
		}
	}

	async fn fetch_next(&mut self) -> Result<State, Error> {
		let source_nonce = self.parachain.outbound_nonce(self.channel.id).await?;
		let (sink_nonce, _) = self.gateway.channel_nonces_of(self.channel.id).await?;

		if sink_nonce > source_nonce {
			return Err(Error::InvalidSourceData(format!(
				"channel {:?} accepted nonce {} but only {} were sent",
				self.channel.id, sink_nonce, source_nonce
			)));
		}
		if sink_nonce < self.channel.sink_nonce {
			return Err(Error::InvalidSourceData(format!(
				"inbound nonce of channel {:?} went back from {} to {}",
				self.channel.id, self.channel.sink_nonce, sink_nonce
			)));
		}

		self.channel.source_nonce = source_nonce;
		self.channel.sink_nonce = sink_nonce;

		match self.channel.next_nonce() {
			Some(nonce) => {
				trace!(
					target: "bridge",
					"Channel {:?}: {} messages pending",
					self.channel.id,
					self.channel.pending()
				);
				Ok(State::ProveInclusion { nonce })
			}
			None => Ok(State::Idle),
		}
	}

	async fn prove_inclusion(&self, nonce: u64) -> Result<State, Error> {
		let channel_id = self.channel.id;

		let para_block = self.parachain.message_block(channel_id, nonce).await?.ok_or_else(|| {
			Error::InvalidSourceData(format!("message {} of channel {:?} not found", nonce, channel_id))
		})?;

		let messages = self.parachain.messages_at(para_block).await?;
		let index = messages
			.iter()
			.position(|m| m.channel_id == channel_id && m.nonce == nonce)
			.ok_or_else(|| {
				Error::InvalidSourceData(format!("message {} missing from parachain block #{}", nonce, para_block))
			})?;
		let header = self.parachain.header(para_block).await?;
		if header.message_commitment() != Some(message_commitment(&messages)) {
			return Err(Error::InvalidSourceData(format!(
				"header #{} does not commit to its messages",
				para_block
			)));
		}
		let leaf_proof = message_proof(&messages, index)
			.ok_or_else(|| Error::InvalidSourceData(format!("no proof for message {}", nonce)))?;

		let relay_block = match self.relay.para_head_inclusion_block(self.para_id, para_block).await? {
			Some(block) => block,
			None => {
				trace!(target: "bridge", "Parachain block #{} not yet included", para_block);
				return Ok(State::Idle);
			}
		};

		let latest = self.client.latest_beefy_block().await?;
		if latest < u64::from(relay_block) {
			debug!(
				target: "bridge",
				"Message {} of {:?} waits for a commitment at or after #{}, light client at #{}",
				nonce,
				channel_id,
				relay_block,
				latest,
			);
			return Ok(State::Idle);
		}

		let heads = self.relay.para_heads(relay_block).await?;
		if !heads.iter().any(|(id, head)| *id == self.para_id && *head == header.encode()) {
			return Err(Error::InvalidSourceData(format!(
				"relay block #{} does not include parachain block #{}",
				relay_block, para_block
			)));
		}
		let head_proof = para_head_proof(&heads, self.para_id)
			.ok_or_else(|| Error::InvalidSourceData(format!("no head proof at #{}", relay_block)))?;

		let leaf_index = u64::from(relay_block)
			.checked_sub(1)
			.ok_or_else(|| Error::InvalidSourceData("para head included at genesis".into()))?;
		let (leaf, mmr_proof) = self.leaves.leaf_proof(leaf_index, latest).await?;
		if leaf.parachain_heads_root != para_heads_root(&heads) {
			return Err(Error::InvalidSourceData(format!(
				"leaf of relay block #{} commits to other para heads",
				relay_block
			)));
		}

		// the root may have moved since `latest` was read
		if !self.client.verify_mmr_leaf_proof(leaf.hash(), mmr_proof.clone()).await? {
			debug!(target: "bridge", "Light client moved past #{}, proving again", latest);
			return Ok(State::FetchNext);
		}

		let header_proof = VerificationProof {
			header,
			head_proof,
			leaf_partial: leaf.partial(),
			leaf_proof: mmr_proof.items,
			leaf_proof_order: mmr_proof.order,
		};

		Ok(State::Submit {
			message: messages[index].clone(),
			leaf_proof,
			header_proof,
		})
	}

	async fn submit(
		&mut self,
		message: InboundMessage,
		leaf_proof: Vec<H256>,
		header_proof: VerificationProof,
	) -> Result<State, Error> {
		let nonce = message.nonce;
		let id = message.id;

		match self.gateway.submit_v1(message, leaf_proof, header_proof).await? {
			DispatchOutcome::Dispatched => {
				self.channel.sink_nonce = nonce;
				info!(target: "bridge", "Channel {:?}: message {} dispatched", self.channel.id, nonce);
			}
			DispatchOutcome::AlreadyDispatched => {
				debug!(target: "bridge", "Channel {:?}: message {:?} already dispatched", self.channel.id, id);
			}
		}

		Ok(State::FetchNext)
	}
}

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

//! Message entry point on the foreign chain.
//!
//! A message is accepted if it is the next one of its channel and if it is anchored to the
//! light client's latest MMR root: message → parachain header → para heads root → MMR leaf.

use std::collections::{BTreeMap, BTreeSet};

use beefy_primitives::{
	message::{message_proof_root, ChannelId, InboundMessage},
	parachain::{ParaId, VerificationProof},
	H256,
};

use crate::{BeefyClient, Error};

/// Nonces of a channel on the foreign chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelNonces {
	/// Nonce of the last message received.
	pub inbound: u64,
	/// Nonce of the last message sent the other way.
	pub outbound: u64,
}

/// Outcome of a successful [Gateway::submit_v1].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
	/// The message was verified and dispatched.
	Dispatched,
	/// A message with the same id was dispatched before. Nothing happened.
	AlreadyDispatched,
}

/// Gateway events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
	/// A message was dispatched.
	InboundMessageDispatched {
		/// Channel of the message.
		channel_id: ChannelId,
		/// Nonce of the message.
		nonce: u64,
		/// Id of the message.
		message_id: H256,
	},
}

/// Message gateway of a single parachain.
#[derive(Debug, Clone)]
pub struct Gateway {
	para_id: ParaId,
	channels: BTreeMap<ChannelId, ChannelNonces>,
	dispatched: BTreeSet<H256>,
	events: Vec<GatewayEvent>,
}

impl Gateway {
	/// A gateway accepting messages from `para_id`.
	pub fn new(para_id: ParaId) -> Self {
		Gateway {
			para_id,
			channels: BTreeMap::new(),
			dispatched: BTreeSet::new(),
			events: Vec::new(),
		}
	}

	/// Parachain this gateway accepts messages from.
	pub fn para_id(&self) -> ParaId {
		self.para_id
	}

	/// Open a channel with both nonces at zero.
	pub fn create_channel(&mut self, channel_id: ChannelId) -> Result<(), Error> {
		if self.channels.contains_key(&channel_id) {
			return Err(Error::ChannelExists);
		}
		self.channels.insert(channel_id, ChannelNonces::default());
		Ok(())
	}

	/// `(inbound, outbound)` nonces of `channel_id`.
	pub fn channel_nonces_of(&self, channel_id: &ChannelId) -> Result<(u64, u64), Error> {
		self.channels
			.get(channel_id)
			.map(|nonces| (nonces.inbound, nonces.outbound))
			.ok_or(Error::UnknownChannel)
	}

	/// Verify and dispatch `message`.
	///
	/// `leaf_proof` proves the message against the outbound commitment of `header_proof.header`,
	/// which is in turn proven against `client`'s latest MMR root.
	pub fn submit_v1(
		&mut self,
		client: &BeefyClient,
		message: &InboundMessage,
		leaf_proof: &[H256],
		header_proof: &VerificationProof,
	) -> Result<DispatchOutcome, Error> {
		let nonces = self.channels.get(&message.channel_id).ok_or(Error::UnknownChannel)?;

		if self.dispatched.contains(&message.id) {
			return Ok(DispatchOutcome::AlreadyDispatched);
		}
		if message.nonce != nonces.inbound + 1 {
			return Err(Error::InvalidNonce);
		}

		let commitment = header_proof.header.message_commitment().ok_or(Error::InvalidProof)?;
		if message_proof_root(message, leaf_proof) != commitment {
			return Err(Error::InvalidProof);
		}

		let leaf = header_proof.leaf(self.para_id).ok_or(Error::InvalidProof)?;
		if !client.verify_mmr_leaf_proof(&leaf.hash(), &header_proof.leaf_proof, header_proof.leaf_proof_order) {
			return Err(Error::InvalidProof);
		}

		if let Some(nonces) = self.channels.get_mut(&message.channel_id) {
			nonces.inbound += 1;
		}
		self.dispatched.insert(message.id);
		self.events.push(GatewayEvent::InboundMessageDispatched {
			channel_id: message.channel_id,
			nonce: message.nonce,
			message_id: message.id,
		});

		Ok(DispatchOutcome::Dispatched)
	}

	/// Events emitted so far, oldest first.
	pub fn events(&self) -> &[GatewayEvent] {
		&self.events
	}
}

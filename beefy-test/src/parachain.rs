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

//! A parachain sending messages on outbound channels.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use codec::Encode;
use parking_lot::Mutex;

use beefy_primitives::{
	keccak_256,
	message::{message_commitment, ChannelId, InboundMessage},
	parachain::{DigestItem, ParaId, ParachainHeader},
	H256,
};
use beefy_relay::{Error, ParachainApi};

const CHAIN: &str = "parachain";

struct State {
	para_id: ParaId,
	/// Headers and messages by block number, genesis included.
	blocks: Vec<(ParachainHeader, Vec<InboundMessage>)>,
	/// Messages waiting for the next block.
	queue: Vec<InboundMessage>,
	/// Nonce of the last queued message, per channel.
	queued_nonces: BTreeMap<ChannelId, u64>,
	/// Nonce of the last message in a block, per channel.
	outbound_nonces: BTreeMap<ChannelId, u64>,
	message_blocks: BTreeMap<(ChannelId, u64), u32>,
	failures: u32,
}

impl State {
	fn check_failure(&mut self) -> Result<(), Error> {
		if self.failures > 0 {
			self.failures -= 1;
			return Err(Error::Connection(CHAIN));
		}
		Ok(())
	}

	fn block(&self, number: u32) -> Result<&(ParachainHeader, Vec<InboundMessage>), Error> {
		self.blocks.get(number as usize).ok_or_else(|| Error::Rpc {
			chain: CHAIN,
			reason: format!("unknown block #{}", number),
		})
	}
}

/// Handle to a simulated parachain.
#[derive(Clone)]
pub struct Parachain {
	inner: Arc<Mutex<State>>,
}

impl Parachain {
	pub fn new(para_id: ParaId) -> Self {
		let genesis = ParachainHeader {
			state_root: H256(keccak_256(&para_id.encode())),
			..Default::default()
		};

		Parachain {
			inner: Arc::new(Mutex::new(State {
				para_id,
				blocks: vec![(genesis, Vec::new())],
				queue: Vec::new(),
				queued_nonces: BTreeMap::new(),
				outbound_nonces: BTreeMap::new(),
				message_blocks: BTreeMap::new(),
				failures: 0,
			})),
		}
	}

	pub fn para_id(&self) -> ParaId {
		self.inner.lock().para_id
	}

	/// The next `count` calls fail with a connection error.
	pub fn fail_next(&self, count: u32) {
		self.inner.lock().failures = count;
	}

	/// Queue a message on `channel_id` for the next block.
	pub fn send(&self, channel_id: ChannelId, command: u8, params: Vec<u8>) -> InboundMessage {
		let mut state = self.inner.lock();

		let nonce = state.queued_nonces.entry(channel_id).or_insert(0);
		*nonce += 1;
		let nonce = *nonce;

		let message = InboundMessage {
			channel_id,
			nonce,
			command,
			id: InboundMessage::compute_id(&channel_id, nonce, command, &params),
			params,
			max_dispatch_gas: 500_000,
			max_fee_per_gas: 1_000_000_000,
			reward: 1_000_000,
		};
		state.queue.push(message.clone());

		message
	}

	/// Produce a block with the queued messages and return its header.
	pub fn produce_block(&self) -> ParachainHeader {
		let mut state = self.inner.lock();

		let messages = std::mem::take(&mut state.queue);
		let number = state.blocks.len() as u32;
		let parent_hash = state.blocks[state.blocks.len() - 1].0.hash();

		let mut header = ParachainHeader {
			parent_hash,
			number,
			state_root: H256(keccak_256(&(parent_hash, number).encode())),
			extrinsics_root: H256(keccak_256(&messages.encode())),
			digest: vec![DigestItem::PreRuntime(*b"aura", u64::from(number).encode())],
		};
		if !messages.is_empty() {
			header.push_message_commitment(message_commitment(&messages));
		}

		for message in &messages {
			state.message_blocks.insert((message.channel_id, message.nonce), number);
			state.outbound_nonces.insert(message.channel_id, message.nonce);
		}
		state.blocks.push((header.clone(), messages));

		header
	}
}

#[async_trait]
impl ParachainApi for Parachain {
	async fn outbound_nonce(&self, channel_id: ChannelId) -> Result<u64, Error> {
		let mut state = self.inner.lock();
		state.check_failure()?;
		Ok(state.outbound_nonces.get(&channel_id).copied().unwrap_or(0))
	}

	async fn message_block(&self, channel_id: ChannelId, nonce: u64) -> Result<Option<u32>, Error> {
		let mut state = self.inner.lock();
		state.check_failure()?;
		Ok(state.message_blocks.get(&(channel_id, nonce)).copied())
	}

	async fn messages_at(&self, block: u32) -> Result<Vec<InboundMessage>, Error> {
		let mut state = self.inner.lock();
		state.check_failure()?;
		Ok(state.block(block)?.1.clone())
	}

	async fn header(&self, block: u32) -> Result<ParachainHeader, Error> {
		let mut state = self.inner.lock();
		state.check_failure()?;
		Ok(state.block(block)?.0.clone())
	}
}

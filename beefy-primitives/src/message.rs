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

//! Channel messages and their commitments.
//!
//! A parachain block commits to the messages it accepted through a sorted-pair merkle root over
//! message leaf hashes. A leaf hash is the keccak-256 of the Ethereum ABI encoding of the
//! message, so the foreign chain can recompute it from calldata.

use crate::{keccak_256, H256};
use beefy_merkle_tree::{merkle_proof_sorted, merkle_root_sorted, process_sorted_proof, Keccak256};
use codec::{Decode, Encode};
use ethabi::Token;

/// Identifier of a message channel.
pub type ChannelId = H256;

/// A message travelling from the parachain to the foreign chain.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct InboundMessage {
	/// Channel the message was sent on.
	pub channel_id: ChannelId,
	/// Position of the message in its channel, starting at 1.
	pub nonce: u64,
	/// Application command.
	pub command: u8,
	/// Opaque command parameters.
	pub params: Vec<u8>,
	/// Gas limit for dispatching the message.
	pub max_dispatch_gas: u64,
	/// Fee cap per unit of gas.
	pub max_fee_per_gas: u128,
	/// Reward paid to the relayer.
	pub reward: u128,
	/// Unique id, used to detect replays.
	pub id: H256,
}

impl InboundMessage {
	/// Ethereum ABI encoding of the message as a single tuple.
	pub fn abi_encode(&self) -> Vec<u8> {
		ethabi::encode(&[Token::Tuple(vec![
			Token::FixedBytes(self.channel_id.as_bytes().to_vec()),
			Token::Uint(self.nonce.into()),
			Token::Uint(self.command.into()),
			Token::Bytes(self.params.clone()),
			Token::Uint(self.max_dispatch_gas.into()),
			Token::Uint(self.max_fee_per_gas.into()),
			Token::Uint(self.reward.into()),
			Token::FixedBytes(self.id.as_bytes().to_vec()),
		])])
	}

	/// Leaf hash of the message in a block's outbound commitment.
	pub fn leaf_hash(&self) -> H256 {
		H256(keccak_256(&self.abi_encode()))
	}

	/// Derive the id of a message from its channel, nonce and content.
	pub fn compute_id(channel_id: &ChannelId, nonce: u64, command: u8, params: &[u8]) -> H256 {
		H256(keccak_256(&(channel_id, nonce, command, params).encode()))
	}
}

/// Nonces of a channel as seen by the relay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Channel {
	/// Channel id.
	pub id: ChannelId,
	/// Nonce of the last message sent on the parachain.
	pub source_nonce: u64,
	/// Nonce of the last message accepted by the foreign chain.
	pub sink_nonce: u64,
}

impl Channel {
	/// Messages waiting to be relayed.
	pub fn pending(&self) -> u64 {
		self.source_nonce.saturating_sub(self.sink_nonce)
	}

	/// Nonce of the next message to relay, if any.
	pub fn next_nonce(&self) -> Option<u64> {
		if self.pending() > 0 {
			Some(self.sink_nonce + 1)
		} else {
			None
		}
	}
}

/// Outbound commitment of a block: sorted-pair merkle root over the message leaf hashes.
pub fn message_commitment(messages: &[InboundMessage]) -> H256 {
	H256(merkle_root_sorted::<Keccak256, _>(
		messages.iter().map(|m| m.leaf_hash().to_fixed_bytes()),
	))
}

/// Proof of the message at `index` in a block's outbound commitment.
pub fn message_proof(messages: &[InboundMessage], index: usize) -> Option<Vec<H256>> {
	merkle_proof_sorted::<Keccak256, _>(messages.iter().map(|m| m.leaf_hash().to_fixed_bytes()), index)
		.map(|proof| proof.proof.into_iter().map(H256).collect())
}

/// Root implied by a message and its sorted-pair proof.
pub fn message_proof_root(message: &InboundMessage, proof: &[H256]) -> H256 {
	H256(process_sorted_proof::<Keccak256, _>(
		message.leaf_hash().to_fixed_bytes(),
		proof.iter().map(|h| h.to_fixed_bytes()),
	))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn message(nonce: u64) -> InboundMessage {
		let channel_id = H256::repeat_byte(0xcc);
		let params = vec![nonce as u8; 3];
		InboundMessage {
			channel_id,
			nonce,
			command: 1,
			id: InboundMessage::compute_id(&channel_id, nonce, 1, &params),
			params,
			max_dispatch_gas: 500_000,
			max_fee_per_gas: 1_000_000_000,
			reward: 1,
		}
	}

	#[test]
	fn abi_encoding_layout() {
		// given
		let message = message(2);

		// when
		let encoded = message.abi_encode();

		// then
		// tuple offset, 8 head slots, bytes length and one padded word of data
		assert_eq!(encoded.len(), 32 * (1 + 8 + 2));
		assert_eq!(encoded[31], 0x20);
		assert_eq!(&encoded[32..64], message.channel_id.as_bytes());
		assert_eq!(encoded[32 * 3 - 1], 2);
		assert_eq!(&encoded[32 * 8..32 * 9], message.id.as_bytes());
	}

	#[test]
	fn id_depends_on_content() {
		let a = message(1);
		let b = message(2);

		assert_ne!(a.id, b.id);
		assert_ne!(a.leaf_hash(), b.leaf_hash());
	}

	#[test]
	fn every_message_proves_against_commitment() {
		// given
		let messages = (1..=5).map(message).collect::<Vec<_>>();
		let root = message_commitment(&messages);

		for (index, message) in messages.iter().enumerate() {
			// when
			let proof = message_proof(&messages, index).unwrap();

			// then
			assert_eq!(message_proof_root(message, &proof), root);
		}

		assert_eq!(message_proof(&messages, 5), None);
		assert_ne!(message_proof_root(&message(6), &message_proof(&messages, 0).unwrap()), root);
	}

	#[test]
	fn single_message_commitment_is_its_leaf() {
		let messages = vec![message(1)];

		assert_eq!(message_commitment(&messages), messages[0].leaf_hash());
		assert_eq!(message_proof(&messages, 0), Some(vec![]));
	}

	#[test]
	fn channel_pending_messages() {
		let mut channel = Channel {
			id: H256::zero(),
			source_nonce: 3,
			sink_nonce: 1,
		};

		assert_eq!(channel.pending(), 2);
		assert_eq!(channel.next_nonce(), Some(2));

		channel.sink_nonce = 3;
		assert_eq!(channel.next_nonce(), None);
	}
}

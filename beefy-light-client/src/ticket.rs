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

//! Tickets created by an initial submission and their lifecycle.

use beefy_primitives::{H256, U256};
use codec::{Decode, Encode};

use crate::BlockNumber;

/// Interactive submission state, keyed by commitment hash.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Ticket {
	/// Foreign block the ticket was created at.
	pub block_number: BlockNumber,
	/// Length of the validator set the commitment is signed by.
	pub validator_set_len: u32,
	/// Number of signatures the final submission has to carry.
	pub num_required_signatures: u32,
	/// Randomness captured after the commit delay.
	pub prev_randao: Option<U256>,
	/// Hash of the candidate bitfield.
	pub bitfield_hash: H256,
}

/// Where a ticket is in its lifecycle. A function of the ticket and the current block only.
///
/// A finalized ticket is deleted, so it has no state of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketState {
	/// Waiting for the commit delay to pass.
	Created,
	/// Randomness can be captured.
	RandaoPending,
	/// Randomness captured, the final submission can be made.
	RandaoCaptured,
	/// Past `block_number + delay + expiration`.
	Expired,
}

impl Ticket {
	/// Last block at which the ticket can be acted upon.
	pub fn deadline(&self, delay: BlockNumber, expiration: BlockNumber) -> BlockNumber {
		self.block_number.saturating_add(delay).saturating_add(expiration)
	}

	/// First block at which randomness can be captured.
	pub fn randao_block(&self, delay: BlockNumber) -> BlockNumber {
		self.block_number.saturating_add(delay)
	}

	/// State of the ticket at block `now`.
	pub fn state(&self, now: BlockNumber, delay: BlockNumber, expiration: BlockNumber) -> TicketState {
		if now > self.deadline(delay, expiration) {
			TicketState::Expired
		} else if self.prev_randao.is_some() {
			TicketState::RandaoCaptured
		} else if now < self.randao_block(delay) {
			TicketState::Created
		} else {
			TicketState::RandaoPending
		}
	}
}

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

//! BEEFY light client as deployed on the foreign chain.
//!
//! Commitments are accepted in two phases. [BeefyClient::submit_initial] opens a ticket
//! claiming that a set of validators signed a commitment. After a delay, the randomness of a
//! later block is captured with [BeefyClient::commit_prev_randao], which decides the validators
//! whose signatures [BeefyClient::submit_final] has to carry.

use beefy_primitives::{H256, U256};

mod client;
mod error;
pub mod gateway;
pub mod ticket;

pub use client::{ceil_log2, num_required_signatures, quorum, BeefyClient, Config};
pub use error::Error;
pub use gateway::Gateway;

/// Foreign chain block number.
pub type BlockNumber = u64;

/// The foreign block a call executes in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockEnv {
	/// Block number.
	pub number: BlockNumber,
	/// Randomness of the previous block.
	pub prev_randao: U256,
}

/// Light client events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
	/// A ticket was opened.
	NewTicket { commitment_hash: H256, block_number: BlockNumber },
	/// A new MMR root was accepted.
	NewMMRRoot { root: H256, block_number: BlockNumber },
}

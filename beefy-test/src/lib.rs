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

//! Simulated chains for testing the relay end to end.

pub mod foreign;
pub mod keyring;
pub mod network;
pub mod parachain;
pub mod relay_chain;

#[cfg(test)]
mod relay_tests;

pub use foreign::{ForeignChain, ForeignClient, Transaction};
pub use keyring::Keyring;
pub use network::{channel_id, wait_until, TestNet, CONFIG, PARA_ID, POLL_INTERVAL};
pub use parachain::Parachain;
pub use relay_chain::RelayChain;

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

//! BEEFY commitment and message relay.
//!
//! The relay carries signed BEEFY commitments from the relay chain to the light client on a
//! foreign chain, and then relays parachain messages proven against the light client's MMR root.
//!
//! Chains are accessed through the traits in [client]. [run_relay] supervises one commitment
//! relay and one worker per configured channel.

pub mod channel;
pub mod client;
pub mod config;
mod error;
pub mod keystore;
pub mod mmr_proof;
pub mod proofs;
pub mod supervisor;
pub mod ticket_manager;
pub mod watcher;

pub use client::{BeefyClientApi, GatewayApi, ParachainApi, RelayChainApi};
pub use config::RelayConfig;
pub use error::{Error, ErrorKind};
pub use keystore::Signer;
pub use supervisor::{exit_signal, run_relay, supervise, ExitSignal};

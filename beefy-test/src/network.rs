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

use std::time::Duration;

use codec::Encode;
use log::trace;

use beefy_light_client::Config;
use beefy_primitives::{
	keccak_256,
	message::{ChannelId, InboundMessage},
	parachain::ParaId,
	H160, H256,
};
use beefy_relay::config::{BeefyConfig, RelayConfig, SignerConfig, SinkConfig, SourceConfig};

use crate::{
	foreign::{ForeignChain, ForeignClient},
	keyring::Keyring,
	parachain::Parachain,
	relay_chain::RelayChain,
};

/// Id of the parachain messages are sent from.
pub const PARA_ID: ParaId = 1000;

/// Poll interval of relay workers under test.
pub const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Light client configuration used by default.
pub const CONFIG: Config = Config {
	randao_commit_delay: 3,
	randao_commit_expiration: 3,
	min_num_required_signatures: 1,
};

/// Id of test channel `n`.
pub fn channel_id(n: u8) -> ChannelId {
	H256(keccak_256(&(b"channel", n).encode()))
}

/// A relay chain, a parachain and a foreign chain whose light client trusts the relay chain
/// from genesis.
pub struct TestNet {
	pub relay: RelayChain,
	pub parachain: Parachain,
	pub foreign: ForeignChain,
}

impl TestNet {
	/// Build a network with validator sets `sets`, by id. At least two sets are needed.
	pub fn new(sets: Vec<Vec<Keyring>>, config: Config) -> Self {
		let relay = RelayChain::new(sets);
		let foreign = ForeignChain::new(config, 0, relay.validator_set(0), relay.validator_set(1), PARA_ID);

		TestNet {
			relay,
			parachain: Parachain::new(PARA_ID),
			foreign,
		}
	}

	/// Four validators in set 0 and 1, five in set 2.
	pub fn with_default_sets() -> Self {
		use Keyring::*;

		Self::new(
			vec![
				vec![Alice, Bob, Charlie, Dave],
				vec![Bob, Charlie, Dave, Eve],
				vec![Charlie, Dave, Eve, Ferdie, One],
			],
			CONFIG,
		)
	}

	/// Foreign chain access for `relayer`.
	pub fn client(&self, relayer: Keyring) -> ForeignClient {
		self.foreign.client(relayer.signer())
	}

	/// Open `channel_id` on the gateway.
	pub fn create_channel(&self, channel_id: ChannelId) {
		self.foreign
			.create_channel(channel_id)
			.expect("test channels are created once; qed");
	}

	/// Queue a message on the parachain.
	pub fn send_message(&self, channel_id: ChannelId, params: Vec<u8>) -> InboundMessage {
		self.parachain.send(channel_id, 1, params)
	}

	/// Produce a parachain block and include its head in a new relay block.
	///
	/// Returns the number of the relay block.
	pub fn produce_para_block(&self) -> u32 {
		let header = self.parachain.produce_block();
		trace!(target: "bridge", "Parachain block #{} produced", header.number);
		self.relay.include_para_head(PARA_ID, header.number, header.encode());
		self.relay.produce_block()
	}

	/// A relay configuration for `channels`.
	pub fn relay_config(&self, channels: Vec<ChannelId>) -> RelayConfig {
		RelayConfig {
			source: SourceConfig {
				relay_chain: "ws://relay-chain".into(),
				parachain: "ws://parachain".into(),
				para_id: PARA_ID,
			},
			sink: SinkConfig {
				endpoint: "ws://foreign-chain".into(),
				beefy_client: H160::repeat_byte(1),
				gateway: H160::repeat_byte(2),
			},
			channels,
			signer: SignerConfig::Env("BEEFY_TEST_RELAYER_KEY".into()),
			beefy: BeefyConfig { min_block_delta: 1 },
			retry_backoff_ms: 5,
			poll_interval_ms: POLL_INTERVAL.as_millis() as u64,
		}
	}
}

/// Wait until `condition` holds, for at most `timeout`.
pub async fn wait_until(condition: impl Fn() -> bool, timeout: Duration) -> bool {
	let poll = async {
		while !condition() {
			async_std::task::sleep(POLL_INTERVAL).await;
		}
	};
	async_std::future::timeout(timeout, poll).await.is_ok()
}

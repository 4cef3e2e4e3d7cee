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

//! Relay configuration file.

use std::{collections::BTreeSet, fs, path::Path, path::PathBuf, time::Duration};

use beefy_primitives::{message::ChannelId, parachain::ParaId, H160};
use serde::{Deserialize, Serialize};

use crate::{error::Error, keystore::Signer};

/// Source chain endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SourceConfig {
	/// Relay chain RPC endpoint.
	pub relay_chain: String,
	/// Parachain RPC endpoint.
	pub parachain: String,
	/// Id of the parachain messages are relayed from.
	pub para_id: ParaId,
}

/// Foreign chain endpoint and contract addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SinkConfig {
	/// Foreign chain RPC endpoint.
	pub endpoint: String,
	/// Address of the light client contract.
	pub beefy_client: H160,
	/// Address of the gateway contract.
	pub gateway: H160,
}

/// Where to read the transaction signing key from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub enum SignerConfig {
	/// Hex encoded key in a file.
	File(PathBuf),
	/// Hex encoded key in an environment variable.
	Env(String),
}

impl SignerConfig {
	/// Load the key. Failing to do so is fatal.
	pub fn resolve(&self) -> Result<Signer, Error> {
		match self {
			SignerConfig::File(path) => Signer::from_file(path),
			SignerConfig::Env(var) => Signer::from_env(var),
		}
	}
}

/// Commitment relay tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct BeefyConfig {
	/// Minimum number of blocks between two relayed commitments, handovers excepted.
	#[serde(default = "default_min_block_delta")]
	pub min_block_delta: u32,
}

impl Default for BeefyConfig {
	fn default() -> Self {
		BeefyConfig {
			min_block_delta: default_min_block_delta(),
		}
	}
}

/// Relay configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RelayConfig {
	pub source: SourceConfig,
	pub sink: SinkConfig,
	/// Channels to relay messages for. May be empty.
	#[serde(default)]
	pub channels: Vec<ChannelId>,
	pub signer: SignerConfig,
	#[serde(default)]
	pub beefy: BeefyConfig,
	/// Delay before restarting a failed worker, in milliseconds.
	#[serde(default = "default_retry_backoff_ms")]
	pub retry_backoff_ms: u64,
	/// Delay between two polls of an idle worker, in milliseconds.
	#[serde(default = "default_poll_interval_ms")]
	pub poll_interval_ms: u64,
}

fn default_min_block_delta() -> u32 {
	8
}

fn default_retry_backoff_ms() -> u64 {
	5_000
}

fn default_poll_interval_ms() -> u64 {
	1_000
}

impl RelayConfig {
	/// Parse and validate a JSON configuration.
	pub fn from_json(json: &str) -> Result<Self, Error> {
		let config: RelayConfig = serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
		config.validate()?;
		Ok(config)
	}

	/// Read, parse and validate a JSON configuration file.
	pub fn from_file(path: &Path) -> Result<Self, Error> {
		let json = fs::read_to_string(path).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
		Self::from_json(&json)
	}

	/// Check the values serde cannot.
	pub fn validate(&self) -> Result<(), Error> {
		let endpoints = [
			("source.relay-chain", &self.source.relay_chain),
			("source.parachain", &self.source.parachain),
			("sink.endpoint", &self.sink.endpoint),
		];
		if let Some((name, _)) = endpoints.iter().find(|(_, endpoint)| endpoint.trim().is_empty()) {
			return Err(Error::Config(format!("{} is empty", name)));
		}

		if self.sink.beefy_client.is_zero() || self.sink.gateway.is_zero() {
			return Err(Error::Config("contract addresses must not be zero".into()));
		}

		let unique = self.channels.iter().collect::<BTreeSet<_>>();
		if unique.len() != self.channels.len() {
			return Err(Error::Config("duplicate channel id".into()));
		}

		if self.retry_backoff_ms == 0 || self.poll_interval_ms == 0 {
			return Err(Error::Config("retry backoff and poll interval must be positive".into()));
		}
		if self.beefy.min_block_delta == 0 {
			return Err(Error::Config("beefy.min-block-delta must be positive".into()));
		}

		Ok(())
	}

	pub fn retry_backoff(&self) -> Duration {
		Duration::from_millis(self.retry_backoff_ms)
	}

	pub fn poll_interval(&self) -> Duration {
		Duration::from_millis(self.poll_interval_ms)
	}
}

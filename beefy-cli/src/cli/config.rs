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

use std::path::PathBuf;

use beefy_relay::RelayConfig;
use structopt::StructOpt;

/// Validate a relay configuration file.
#[derive(StructOpt)]
#[structopt(about = "Check a relay configuration file and the signing key it points to.")]
pub struct CheckConfig {
	/// Path to the JSON configuration.
	#[structopt(parse(from_os_str))]
	pub path: PathBuf,
}

impl CheckConfig {
	pub fn run(self) -> anyhow::Result<()> {
		let config = RelayConfig::from_file(&self.path)?;
		let signer = config.signer.resolve()?;

		println!();
		println!("Parachain: {}", config.source.para_id);
		println!("Light client: {:?}", config.sink.beefy_client);
		println!("Gateway: {:?}", config.sink.gateway);
		println!("Channels: {}", config.channels.len());
		println!("Relayer: {:?}", signer.address());
		println!();

		Ok(())
	}
}

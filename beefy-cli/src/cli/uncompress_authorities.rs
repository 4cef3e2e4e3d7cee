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

use crate::cli::utils::{parse_hex, Authorities};
use beefy_primitives::{
	crypto::{address_of, uncompress},
	validator::validator_set_root,
	H160,
};
use structopt::StructOpt;

/// Decode and uncompress encoded BEEFY id(s).
#[derive(StructOpt)]
#[structopt(about = "Uncompress BEEFY authority ids and derive their Ethereum addresses")]
pub struct UncompressAuthorities {
	/// A single BEEFY authority id (compressed public key).
	#[structopt(
		long,
		conflicts_with("authorities"),
		required_unless("authorities"),
		parse(try_from_str = beefy_id_from_hex),
	)]
	pub authority: Option<[u8; 33]>,

	/// A SCALE-encoded vector of BEEFY authority ids (compressed public keys).
	///
	/// This can be obtained by querying `beefy.authorities`/`beefy.nextAuthorities` storage item
	/// of the relay chain.
	#[structopt(long, conflicts_with("authority"), required_unless("authority"))]
	pub authorities: Option<Authorities>,
}

impl UncompressAuthorities {
	pub fn run(self) -> anyhow::Result<()> {
		let ids = match (self.authority, self.authorities) {
			(Some(id), _) => vec![id],
			(None, Some(ids)) => ids.0,
			(None, None) => anyhow::bail!("Neither argument given"),
		};

		let addresses = uncompress_beefy_ids(&ids)?;
		for (id, address) in ids.iter().zip(&addresses) {
			println!("[0x{}] Address:\n\t {:?}", hex::encode(id), address);
		}
		if addresses.len() > 1 {
			println!("\nValidator set root: {:?}", validator_set_root(&addresses));
		}

		Ok(())
	}
}

/// Ethereum addresses of the given authority ids, in order.
pub fn uncompress_beefy_ids(ids: &[[u8; 33]]) -> anyhow::Result<Vec<H160>> {
	ids.iter()
		.map(|id| {
			let public = uncompress(id).map_err(|e| anyhow::format_err!("0x{}: {:?}", hex::encode(id), e))?;
			log::debug!(target: "beefy", "Uncompressed 0x{}: 0x{}", hex::encode(id), hex::encode(public.serialize()));
			Ok(address_of(&public))
		})
		.collect()
}

fn beefy_id_from_hex(id: &str) -> anyhow::Result<[u8; 33]> {
	let encoded = parse_hex(id)?;
	let mut auth_id = [0u8; 33];
	if encoded.len() != auth_id.len() {
		anyhow::bail!("Expected 33 bytes, got {}", encoded.len());
	}
	auth_id.copy_from_slice(&encoded);
	Ok(auth_id)
}

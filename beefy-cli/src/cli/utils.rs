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

use std::str::FromStr;

use beefy_primitives::{parachain::ParaId, H160, H256};
use codec::Decode;

/// Parse hex string to a vector of bytes.
pub fn parse_hex(hex: &str) -> anyhow::Result<Vec<u8>> {
	let s = hex.strip_prefix("0x").unwrap_or(hex);

	Ok(hex::decode(s)?)
}

/// A wrapper struct to overcome structopt's `Vec` special handling.
pub struct Bytes(pub Vec<u8>);
impl FromStr for Bytes {
	type Err = anyhow::Error;

	fn from_str(s: &str) -> anyhow::Result<Self> {
		parse_hex(s).map(Bytes)
	}
}

/// A SCALE-encoded vector of BEEFY authority ids (33 byte compressed public keys).
pub struct Authorities(pub Vec<[u8; 33]>);
impl FromStr for Authorities {
	type Err = anyhow::Error;

	fn from_str(ids: &str) -> anyhow::Result<Self> {
		let encoded = parse_hex(ids)?;
		let auth_ids = Vec::<[u8; 33]>::decode(&mut &*encoded)?;
		Ok(Self(auth_ids))
	}
}

/// Comma separated list of hex encoded values.
pub struct List<T>(pub Vec<T>);
impl<T> FromStr for List<T>
where
	T: FromStr,
	T::Err: std::fmt::Display,
{
	type Err = anyhow::Error;

	fn from_str(s: &str) -> anyhow::Result<Self> {
		s.split(',')
			.filter(|item| !item.trim().is_empty())
			.map(|item| T::from_str(item.trim()).map_err(|e| anyhow::format_err!("{}: {}", item, e)))
			.collect::<anyhow::Result<Vec<_>>>()
			.map(List)
	}
}

/// Validator addresses, in set order.
pub type Addresses = List<H160>;

/// Merkle proof items.
pub type Hashes = List<H256>;

/// A parachain head in the form `<para id>:<hex encoded head>`.
pub struct ParaHead(pub ParaId, pub Vec<u8>);
impl FromStr for ParaHead {
	type Err = anyhow::Error;

	fn from_str(s: &str) -> anyhow::Result<Self> {
		let (id, head) = s
			.split_once(':')
			.ok_or_else(|| anyhow::format_err!("Expected <para id>:<head>, got {}", s))?;
		Ok(ParaHead(id.parse()?, parse_hex(head)?))
	}
}

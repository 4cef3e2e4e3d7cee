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

//! Selection of the finalized commitments worth relaying.

use std::{convert::TryFrom, time::Duration};

use log::{debug, trace};

use beefy_light_client::BlockNumber;
use beefy_primitives::{SignedCommitment, ValidatorSetId};

use crate::{
	client::{BeefyClientApi, RelayChainApi},
	error::Error,
	ticket_manager::{RelayOutcome, TicketManager},
};

/// Watches the relay chain and feeds commitments to the [TicketManager].
#[derive(Debug, Clone)]
pub struct CommitmentWatcher<R, B> {
	relay: R,
	client: B,
	manager: TicketManager<R, B>,
	/// Min delta in block numbers between two relayed commitments
	min_block_delta: u32,
	poll_interval: Duration,
}

impl<R, B> CommitmentWatcher<R, B>
where
	R: RelayChainApi,
	B: BeefyClientApi,
{
	pub fn new(relay: R, client: B, min_block_delta: u32, poll_interval: Duration) -> Self {
		CommitmentWatcher {
			manager: TicketManager::new(relay.clone(), client.clone(), poll_interval),
			relay,
			client,
			min_block_delta,
			poll_interval,
		}
	}

	/// Relay commitments until an error occurs.
	pub async fn run(self) -> Result<(), Error> {
		loop {
			match self.next_commitment().await? {
				Some(signed) => {
					if self.manager.relay_commitment(signed).await? == RelayOutcome::Skipped {
						async_std::task::sleep(self.poll_interval).await;
					}
				}
				None => async_std::task::sleep(self.poll_interval).await,
			}
		}
	}

	/// The next commitment to relay, if any.
	///
	/// The first block of the light client's next set has to be relayed before anything that
	/// set signed later, so it takes precedence over the latest commitment.
	pub async fn next_commitment(&self) -> Result<Option<SignedCommitment>, Error> {
		let latest = self.client.latest_beefy_block().await?;
		let next = self.client.next_validator_set().await?;

		let next_id = ValidatorSetId::try_from(next.id)
			.map_err(|_| Error::InvalidSourceData(format!("validator set id {} out of range", next.id)))?;

		if let Some(mandatory) = self.relay.mandatory_block(next_id).await? {
			if u64::from(mandatory) > latest {
				debug!(
					target: "beefy",
					"🥩 Handover to set {} at #{}, light client at #{}",
					next_id,
					mandatory,
					latest
				);
				return self.relay.signed_commitment(mandatory).await;
			}
		}

		let signed = match self.relay.latest_signed_commitment().await? {
			Some(signed) => signed,
			None => return Ok(None),
		};

		let current = self.client.current_validator_set().await?;
		let id = u128::from(signed.commitment.validator_set_id);
		if id != current.id && id != next.id {
			trace!(
				target: "beefy",
				"🥩 Latest commitment #{} signed by unknown set {}",
				signed.commitment.block_number,
				id
			);
			return Ok(None);
		}

		if should_relay(signed.commitment.block_number, latest, self.min_block_delta) {
			Ok(Some(signed))
		} else {
			Ok(None)
		}
	}
}

/// Whether a commitment for `number` is far enough ahead of the light client's `latest` block.
fn should_relay(number: u32, latest: BlockNumber, min_delta: u32) -> bool {
	let target = latest.saturating_add(min_delta.into());
	let relay = u64::from(number) >= target;

	trace!(
		target: "beefy",
		"🥩 should_relay: #{:?}, latest: #{:?}, min_delta: {:?}, target: #{:?}",
		number,
		latest,
		min_delta,
		target,
	);

	relay
}

#[cfg(test)]
mod tests {
	use super::should_relay;

	#[test]
	fn relay_on_min_block_delta() {
		assert!(!should_relay(1, 0, 4));
		assert!(!should_relay(3, 0, 4));
		assert!(should_relay(4, 0, 4));
		assert!(should_relay(5, 0, 4));

		assert!(!should_relay(13, 10, 4));
		assert!(should_relay(14, 10, 4));

		assert!(!should_relay(17, 10, 8));
		assert!(should_relay(18, 10, 8));
	}

	#[test]
	fn never_relay_old_blocks() {
		assert!(!should_relay(10, 10, 1));
		assert!(!should_relay(9, 10, 1));
		assert!(should_relay(11, 10, 1));
	}
}

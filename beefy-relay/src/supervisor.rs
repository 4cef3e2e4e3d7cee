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

//! Worker supervision.
//!
//! Every worker runs in its own task. A failed worker is restarted after a fixed backoff and
//! re-reads all remote state. Fatal errors and the exit signal stop every worker.

use std::{future::Future, time::Duration};

use backoff::backoff::{Backoff, Constant};
use futures::{
	channel::oneshot,
	future::{self, BoxFuture, FutureExt, Shared},
	select_biased,
};
use log::{error, info, warn};

use crate::{
	channel::ChannelRelay,
	client::{BeefyClientApi, GatewayApi, ParachainApi, RelayChainApi},
	config::RelayConfig,
	error::{Error, ErrorKind},
	watcher::CommitmentWatcher,
};

/// Resolves once the relay has to stop.
pub type ExitSignal = Shared<BoxFuture<'static, ()>>;

/// An exit signal and the handle that fires it.
///
/// Dropping the handle fires the signal as well.
pub fn exit_signal() -> (oneshot::Sender<()>, ExitSignal) {
	let (sender, receiver) = oneshot::channel();
	(sender, receiver.map(|_| ()).boxed().shared())
}

/// Run the worker built by `make_worker` until `exit` resolves or the worker fails fatally.
///
/// A worker returning `Ok(())` is done and not restarted.
pub async fn supervise<F, Fut>(name: String, interval: Duration, exit: ExitSignal, make_worker: F) -> Result<(), Error>
where
	F: Fn() -> Fut,
	Fut: Future<Output = Result<(), Error>>,
{
	let mut delays = Constant::new(interval);
	let mut exit = exit;
	let mut restarts = 0u64;

	loop {
		let worker = make_worker().fuse();
		futures::pin_mut!(worker);

		let result = select_biased! {
			_ = exit => return Ok(()),
			result = worker => result,
		};

		let err = match result {
			Ok(()) => {
				info!(target: "bridge", "{} finished", name);
				return Ok(());
			}
			Err(err) => err,
		};

		let kind = err.kind();
		if kind == ErrorKind::Fatal {
			error!(target: "bridge", "{} stopped: {}", name, err);
			return Err(err);
		}

		restarts += 1;
		let delay = delays.next_backoff().unwrap_or(interval);
		warn!(
			target: "bridge",
			"{} failed ({:?}): {}. Restart #{} in {:?}",
			name,
			kind,
			err,
			restarts,
			delay,
		);

		select_biased! {
			_ = exit => return Ok(()),
			_ = async_std::task::sleep(delay).fuse() => {},
		}
	}
}

/// Relay commitments and the messages of every configured channel until `exit` resolves.
///
/// Returns the first fatal error, after stopping the remaining workers.
pub async fn run_relay<R, P, B, G>(
	config: &RelayConfig,
	relay: R,
	parachain: P,
	client: B,
	gateway: G,
	exit: ExitSignal,
) -> Result<(), Error>
where
	R: RelayChainApi,
	P: ParachainApi,
	B: BeefyClientApi,
	G: GatewayApi,
{
	let (stop, stopped) = exit_signal();
	let exit = future::select(exit, stopped).map(|_| ()).boxed().shared();

	let retry_backoff = config.retry_backoff();
	let poll_interval = config.poll_interval();
	let mut workers = Vec::with_capacity(config.channels.len() + 1);

	{
		let (relay, client) = (relay.clone(), client.clone());
		let min_block_delta = config.beefy.min_block_delta;
		workers.push(async_std::task::spawn(supervise(
			"Commitment relay".into(),
			retry_backoff,
			exit.clone(),
			move || CommitmentWatcher::new(relay.clone(), client.clone(), min_block_delta, poll_interval).run(),
		)));
	}

	for channel_id in config.channels.iter().copied() {
		let (relay, parachain, client, gateway) = (relay.clone(), parachain.clone(), client.clone(), gateway.clone());
		let para_id = config.source.para_id;
		workers.push(async_std::task::spawn(supervise(
			format!("Channel {:?}", channel_id),
			retry_backoff,
			exit.clone(),
			move || {
				ChannelRelay::new(
					channel_id,
					para_id,
					relay.clone(),
					parachain.clone(),
					client.clone(),
					gateway.clone(),
					poll_interval,
				)
				.run()
			},
		)));
	}

	info!(target: "bridge", "Relay started with {} channel workers", config.channels.len());

	let mut stop = Some(stop);
	let mut outcome = Ok(());
	while !workers.is_empty() {
		let (result, _, remaining) = future::select_all(workers).await;
		workers = remaining;

		if let Err(err) = result {
			if let Some(stop) = stop.take() {
				let _ = stop.send(());
			}
			if outcome.is_ok() {
				outcome = Err(err);
			}
		}
	}

	outcome
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::{
		atomic::{AtomicUsize, Ordering},
		Arc,
	};

	const INTERVAL: Duration = Duration::from_millis(1);

	#[test]
	fn restarts_failed_worker() {
		// given
		let (_exit, exit) = exit_signal();
		let runs = Arc::new(AtomicUsize::new(0));

		// when
		let result = async_std::task::block_on(supervise("test".into(), INTERVAL, exit, || {
			let runs = runs.clone();
			async move {
				match runs.fetch_add(1, Ordering::SeqCst) {
					0 => Err(Error::Connection("relay chain")),
					1 => Err(Error::Verifier(beefy_light_client::Error::InvalidNonce)),
					_ => Ok(()),
				}
			}
		}));

		// then
		assert!(result.is_ok());
		assert_eq!(runs.load(Ordering::SeqCst), 3);
	}

	#[test]
	fn fatal_error_stops_worker() {
		let (_exit, exit) = exit_signal();
		let runs = Arc::new(AtomicUsize::new(0));

		let result = async_std::task::block_on(supervise("test".into(), INTERVAL, exit, || {
			runs.fetch_add(1, Ordering::SeqCst);
			future::ready(Err(Error::Credential("no key".into())))
		}));

		assert!(matches!(result, Err(Error::Credential(_))));
		assert_eq!(runs.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn exit_signal_stops_worker() {
		// given
		let (exit_sender, exit) = exit_signal();

		// when
		let _ = exit_sender.send(());
		let result = async_std::task::block_on(supervise("test".into(), INTERVAL, exit, || {
			future::pending::<Result<(), Error>>()
		}));

		// then
		assert!(result.is_ok());
	}

	#[test]
	fn dropped_exit_sender_stops_worker() {
		let (exit_sender, exit) = exit_signal();
		drop(exit_sender);

		let result = async_std::task::block_on(supervise("test".into(), INTERVAL, exit, || {
			future::ready(Err(Error::Connection("foreign chain")))
		}));

		assert!(result.is_ok());
	}
}

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

use async_std::task::block_on;

use beefy_light_client::{gateway::GatewayEvent, Error as VerifierError, Event};
use beefy_primitives::{SignedCommitment, H256};
use beefy_relay::{
	channel::{ChannelRelay, State},
	exit_signal, run_relay,
	ticket_manager::{RelayOutcome, TicketManager},
	watcher::CommitmentWatcher,
	ErrorKind, RelayChainApi,
};

use crate::{
	channel_id, foreign::ForeignClient, wait_until, Keyring, Parachain, RelayChain, TestNet, PARA_ID, POLL_INTERVAL,
};

const TIMEOUT: Duration = Duration::from_secs(30);

fn manager(net: &TestNet, client: ForeignClient) -> TicketManager<RelayChain, ForeignClient> {
	TicketManager::new(net.relay.clone(), client, POLL_INTERVAL)
}

fn signed_commitment(net: &TestNet, block: u32) -> SignedCommitment {
	block_on(net.relay.signed_commitment(block)).unwrap().unwrap()
}

fn channel_relay(net: &TestNet, relayer: Keyring) -> ChannelRelay<RelayChain, Parachain, ForeignClient, ForeignClient> {
	let client = net.client(relayer);
	ChannelRelay::new(
		channel_id(1),
		PARA_ID,
		net.relay.clone(),
		net.parachain.clone(),
		client.clone(),
		client,
		POLL_INTERVAL,
	)
}

fn ticket_blocks(net: &TestNet) -> Vec<u64> {
	net.foreign
		.events()
		.iter()
		.filter_map(|event| match event {
			Event::NewTicket { block_number, .. } => Some(*block_number),
			_ => None,
		})
		.collect()
}

fn dispatched_nonces(net: &TestNet) -> Vec<u64> {
	net.foreign
		.gateway_events()
		.iter()
		.map(|GatewayEvent::InboundMessageDispatched { nonce, .. }| *nonce)
		.collect()
}

#[test]
fn commitment_goes_through_both_phases() {
	let _ = env_logger::try_init();

	// given
	let net = TestNet::with_default_sets();
	net.relay.produce_blocks(10);
	let manager = manager(&net, net.client(Keyring::Ferdie));
	let signed = signed_commitment(&net, 10);
	let hash = signed.commitment.hash();

	// when
	let outcome = block_on(manager.relay_commitment(signed)).unwrap();

	// then
	assert_eq!(outcome, RelayOutcome::Accepted);
	assert_eq!(net.foreign.latest_beefy_block(), 10);

	let root = net.relay.mmr_root(10).unwrap();
	assert_eq!(net.foreign.with_client(|client| client.latest_mmr_root()), root);

	// the relay waits for the randao delay before its single capture
	let calls = net
		.foreign
		.transactions()
		.iter()
		.map(|tx| (tx.call, tx.block, tx.success))
		.collect::<Vec<_>>();
	assert_eq!(
		calls,
		vec![
			("submit_initial", 1, true),
			("commit_prev_randao", 4, true),
			("submit_final", 5, true),
		]
	);
	assert!(net
		.foreign
		.transactions()
		.iter()
		.all(|tx| tx.sender == Keyring::Ferdie.address()));

	assert_eq!(
		net.foreign.events(),
		vec![
			Event::NewTicket {
				commitment_hash: hash,
				block_number: 1
			},
			Event::NewMMRRoot {
				root,
				block_number: 10
			},
		]
	);
	assert!(net.foreign.with_client(|client| client.ticket(&hash).is_none()));
}

#[test]
fn stale_commitment_is_skipped() {
	// given
	let net = TestNet::with_default_sets();
	net.relay.produce_blocks(10);
	let manager = manager(&net, net.client(Keyring::Ferdie));
	block_on(manager.relay_commitment(signed_commitment(&net, 10))).unwrap();
	let mined = net.foreign.transactions().len();

	// when
	let outcome = block_on(manager.relay_commitment(signed_commitment(&net, 8))).unwrap();

	// then
	assert_eq!(outcome, RelayOutcome::Skipped);
	assert_eq!(net.foreign.transactions().len(), mined);
	assert_eq!(net.foreign.latest_beefy_block(), 10);
}

#[test]
fn expired_ticket_is_reopened() {
	// given
	let net = TestNet::with_default_sets();
	net.relay.produce_blocks(10);
	let manager = manager(&net, net.client(Keyring::Ferdie));

	// when
	// the first randao commitment lands past the deadline of the ticket
	net.foreign.stall_next("commit_prev_randao", 10);
	let outcome = block_on(manager.relay_commitment(signed_commitment(&net, 10))).unwrap();

	// then
	assert_eq!(outcome, RelayOutcome::Accepted);
	assert_eq!(net.foreign.count_calls("submit_initial"), 2);
	assert_eq!(net.foreign.latest_beefy_block(), 10);

	assert_eq!(ticket_blocks(&net), vec![1, 15]);
}

#[test]
fn late_relay_reopens_without_a_doomed_capture() {
	// given
	let net = TestNet::with_default_sets();
	net.relay.produce_blocks(10);
	let manager = manager(&net, net.client(Keyring::Ferdie));

	// when
	// the relay next sees the chain after the capture window of the first ticket closed
	net.foreign.stall_next("block_number", 10);
	let outcome = block_on(manager.relay_commitment(signed_commitment(&net, 10))).unwrap();

	// then
	assert_eq!(outcome, RelayOutcome::Accepted);
	assert_eq!(ticket_blocks(&net), vec![1, 13]);
	let calls = net
		.foreign
		.transactions()
		.iter()
		.map(|tx| (tx.call, tx.block, tx.success))
		.collect::<Vec<_>>();
	assert_eq!(
		calls,
		vec![
			("submit_initial", 1, true),
			("submit_initial", 13, true),
			("commit_prev_randao", 16, true),
			("submit_final", 17, true),
		]
	);
}

#[test]
fn racing_relayers_skip_instead_of_failing() {
	let _ = env_logger::try_init();

	// given
	let net = TestNet::with_default_sets();
	net.relay.produce_blocks(10);
	let first = manager(&net, net.client(Keyring::Ferdie));
	let second = manager(&net, net.client(Keyring::One));
	let signed = signed_commitment(&net, 10);

	// when
	let (a, b) = block_on(async {
		let a = {
			let signed = signed.clone();
			async_std::task::spawn(async move { first.relay_commitment(signed).await })
		};
		let b = async_std::task::spawn(async move { second.relay_commitment(signed).await });
		(a.await, b.await)
	});

	// then
	let mut outcomes = vec![a.unwrap(), b.unwrap()];
	outcomes.sort_by_key(|outcome| *outcome == RelayOutcome::Skipped);
	assert_eq!(outcomes, vec![RelayOutcome::Accepted, RelayOutcome::Skipped]);
	assert_eq!(net.foreign.latest_beefy_block(), 10);
	assert_eq!(
		net.foreign
			.events()
			.iter()
			.filter(|event| matches!(event, Event::NewMMRRoot { .. }))
			.count(),
		1
	);
}

#[test]
fn handover_to_the_next_validator_set() {
	// given
	let net = TestNet::with_default_sets();
	net.relay.produce_blocks(5);
	net.relay.enact_next_set();
	net.relay.produce_blocks(5);

	let client = net.client(Keyring::Ferdie);
	let watcher = CommitmentWatcher::new(net.relay.clone(), client.clone(), 1, POLL_INTERVAL);
	let manager = manager(&net, client);

	block_on(async {
		// when
		let mandatory = watcher.next_commitment().await.unwrap().unwrap();

		// then
		assert_eq!(mandatory.commitment.block_number, 6);
		assert_eq!(mandatory.commitment.validator_set_id, 1);

		// when
		assert_eq!(manager.relay_commitment(mandatory).await.unwrap(), RelayOutcome::Accepted);

		// then
		assert_eq!(net.foreign.with_client(|c| c.current_validator_set()), net.relay.validator_set(1));
		assert_eq!(net.foreign.with_client(|c| c.next_validator_set()), net.relay.validator_set(2));

		// when
		let latest = watcher.next_commitment().await.unwrap().unwrap();

		// then
		assert_eq!(latest.commitment.block_number, 10);
		assert_eq!(manager.relay_commitment(latest).await.unwrap(), RelayOutcome::Accepted);
		assert_eq!(net.foreign.latest_beefy_block(), 10);
		assert!(watcher.next_commitment().await.unwrap().is_none());
	});
}

#[test]
fn watcher_respects_min_block_delta() {
	let net = TestNet::with_default_sets();
	net.relay.produce_blocks(3);
	let watcher = CommitmentWatcher::new(net.relay.clone(), net.client(Keyring::Ferdie), 4, POLL_INTERVAL);

	block_on(async {
		// mandatory block of set 1 is not known yet, block 3 is too close to genesis
		assert!(watcher.next_commitment().await.unwrap().is_none());

		net.relay.produce_block();
		let signed = watcher.next_commitment().await.unwrap().unwrap();
		assert_eq!(signed.commitment.block_number, 4);
	});
}

#[test]
fn offline_validators_are_tolerated_up_to_quorum() {
	// given
	let net = TestNet::with_default_sets();
	net.relay.set_offline(vec![Keyring::Dave]);
	net.relay.produce_blocks(3);
	let manager = manager(&net, net.client(Keyring::Ferdie));

	// then
	let outcome = block_on(manager.relay_commitment(signed_commitment(&net, 3))).unwrap();
	assert_eq!(outcome, RelayOutcome::Accepted);

	// when
	net.relay.set_offline(vec![Keyring::Charlie, Keyring::Dave]);
	net.relay.produce_blocks(3);

	// then
	let err = block_on(manager.relay_commitment(signed_commitment(&net, 6))).unwrap_err();
	assert_eq!(err.verifier(), Some(VerifierError::NotEnoughClaims));
	assert_eq!(err.kind(), ErrorKind::Protocol);
	assert_eq!(net.foreign.latest_beefy_block(), 3);
}

#[test]
fn channel_relay_waits_for_the_light_client() {
	let _ = env_logger::try_init();

	// given
	let net = TestNet::with_default_sets();
	let channel = channel_id(1);
	net.create_channel(channel);
	net.relay.produce_blocks(3);
	net.send_message(channel, vec![1]);
	net.send_message(channel, vec![2]);
	assert_eq!(net.produce_para_block(), 4);

	let mut relay = channel_relay(&net, Keyring::Ferdie);

	block_on(async {
		// when
		let state = relay.step(State::FetchNext).await.unwrap();

		// then
		assert_eq!(state, State::ProveInclusion { nonce: 1 });
		assert_eq!(relay.channel().pending(), 2);

		// the light client is still at genesis
		assert_eq!(relay.step(state).await.unwrap(), State::Idle);

		// when
		net.relay.produce_blocks(2);
		let signed = net.relay.signed_commitment(6).await.unwrap().unwrap();
		manager(&net, net.client(Keyring::One)).relay_commitment(signed).await.unwrap();

		// then
		let mut state = relay.step(State::Idle).await.unwrap();
		let mut submitted = 0;
		while state != State::Idle {
			if matches!(state, State::Submit { .. }) {
				submitted += 1;
			}
			state = relay.step(state).await.unwrap();
		}
		assert_eq!(submitted, 2);
	});

	assert_eq!(dispatched_nonces(&net), vec![1, 2]);
	assert_eq!(net.foreign.channel_nonces(&channel), Ok((2, 0)));
	assert_eq!(relay.channel().sink_nonce, 2);
	assert_eq!(relay.channel().pending(), 0);
}

#[test]
fn redelivery_is_idempotent() {
	// given
	let net = TestNet::with_default_sets();
	let channel = channel_id(1);
	net.create_channel(channel);
	net.send_message(channel, vec![42]);
	net.produce_para_block();
	net.relay.produce_blocks(2);
	block_on(manager(&net, net.client(Keyring::One)).relay_commitment(signed_commitment(&net, 3))).unwrap();

	let mut alice = channel_relay(&net, Keyring::Alice);
	let mut bob = channel_relay(&net, Keyring::Bob);

	block_on(async {
		let proven = alice.step(State::ProveInclusion { nonce: 1 }).await.unwrap();
		let also_proven = bob.step(State::ProveInclusion { nonce: 1 }).await.unwrap();
		assert_eq!(proven, also_proven);

		// when
		assert_eq!(bob.step(also_proven).await.unwrap(), State::FetchNext);
		assert_eq!(alice.step(proven.clone()).await.unwrap(), State::FetchNext);

		// then
		assert_eq!(dispatched_nonces(&net), vec![1]);
		assert_eq!(net.foreign.channel_nonces(&channel), Ok((1, 0)));

		// when
		let replayed = match proven {
			State::Submit {
				mut message,
				leaf_proof,
				header_proof,
			} => {
				message.nonce = 3;
				message.id = H256::repeat_byte(9);
				State::Submit {
					message,
					leaf_proof,
					header_proof,
				}
			}
			other => panic!("expected a submission, got {:?}", other),
		};
		let err = alice.step(replayed).await.unwrap_err();

		// then
		assert_eq!(err.verifier(), Some(VerifierError::InvalidNonce));
		assert_eq!(err.kind(), ErrorKind::Protocol);
	});

	assert_eq!(net.foreign.channel_nonces(&channel), Ok((1, 0)));
}

#[test]
fn relay_survives_transient_failures() {
	let _ = env_logger::try_init();

	// given
	let net = TestNet::with_default_sets();
	let channel = channel_id(1);
	net.create_channel(channel);
	let config = net.relay_config(vec![channel]);
	let client = net.client(Keyring::Ferdie);

	net.relay.fail_next(2);
	net.parachain.fail_next(1);
	net.foreign.fail_next(2);
	net.foreign.reject_next(1);

	block_on(async {
		let (exit_sender, exit) = exit_signal();
		let (relay, parachain) = (net.relay.clone(), net.parachain.clone());
		let task = async_std::task::spawn(async move {
			run_relay(&config, relay, parachain, client.clone(), client, exit).await
		});

		// when
		for i in 0..3u8 {
			net.send_message(channel, vec![i]);
			net.produce_para_block();
			net.relay.produce_block();
		}

		// then
		let delivered = wait_until(
			|| net.foreign.channel_nonces(&channel).map(|(inbound, _)| inbound) == Ok(3),
			TIMEOUT,
		)
		.await;
		assert!(delivered);

		let _ = exit_sender.send(());
		assert!(task.await.is_ok());
	});

	assert_eq!(dispatched_nonces(&net), vec![1, 2, 3]);
	assert!(net.foreign.latest_beefy_block() >= 6);
}

#[test]
fn fatal_error_stops_the_relay() {
	// given
	let net = TestNet::with_default_sets();
	let channel = channel_id(1);
	net.create_channel(channel);
	net.relay.produce_blocks(3);
	let config = net.relay_config(vec![channel]);
	let client = net.client(Keyring::Ferdie);
	net.foreign.revoke(Keyring::Ferdie.address());

	// when
	let (_exit_sender, exit) = exit_signal();
	let result = block_on(async_std::future::timeout(
		TIMEOUT,
		run_relay(&config, net.relay.clone(), net.parachain.clone(), client.clone(), client, exit),
	))
	.expect("relay stops on fatal errors");

	// then
	let err = result.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Fatal);
	assert!(net.foreign.transactions().is_empty());
	assert_eq!(net.foreign.latest_beefy_block(), 0);
}

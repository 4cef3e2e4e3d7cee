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

//! The foreign chain hosting the light client and the gateway.
//!
//! Every transaction is mined in a block of its own, whether it succeeds or not. Views execute
//! against the latest block. Polling the head takes one block time, so every `block_number` call
//! sees a fresh empty block.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use codec::Encode;
use parking_lot::Mutex;

use beefy_light_client::{
	gateway::{DispatchOutcome, GatewayEvent},
	ticket::Ticket,
	BeefyClient, BlockEnv, BlockNumber, Config, Error as VerifierError, Event, Gateway,
};
use beefy_primitives::{
	bitfield::Bitfield,
	crypto::recover_address,
	keccak_256,
	message::{ChannelId, InboundMessage},
	mmr::{MmrLeaf, SimplifiedMmrProof},
	parachain::{ParaId, VerificationProof},
	Commitment, ValidatorProof, ValidatorSet, H160, H256, U256,
};
use beefy_relay::{BeefyClientApi, Error, GatewayApi, Signer};

const CHAIN: &str = "foreign chain";

/// A mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
	/// Account recovered from the transaction signature.
	pub sender: H160,
	/// Called contract method.
	pub call: &'static str,
	/// Block the transaction was mined in.
	pub block: BlockNumber,
	/// Whether the call succeeded.
	pub success: bool,
}

struct State {
	client: BeefyClient,
	gateway: Gateway,
	block: BlockNumber,
	transactions: Vec<Transaction>,
	failures: u32,
	rejections: u32,
	/// Extra blocks to mine before the next transaction of a method.
	stalls: BTreeMap<&'static str, BlockNumber>,
	revoked: Vec<H160>,
}

impl State {
	fn check_failure(&mut self) -> Result<(), Error> {
		if self.failures > 0 {
			self.failures -= 1;
			return Err(Error::Connection(CHAIN));
		}
		Ok(())
	}
}

/// Randomness of block `number`.
pub fn block_env(number: BlockNumber) -> BlockEnv {
	BlockEnv {
		number,
		prev_randao: U256::from_big_endian(&keccak_256(&number.encode())),
	}
}

/// Handle to a simulated foreign chain.
#[derive(Clone)]
pub struct ForeignChain {
	inner: Arc<Mutex<State>>,
}

impl ForeignChain {
	/// Deploy the light client and a gateway accepting messages from `para_id`.
	pub fn new(
		config: Config,
		initial_beefy_block: BlockNumber,
		current: ValidatorSet,
		next: ValidatorSet,
		para_id: ParaId,
	) -> Self {
		ForeignChain {
			inner: Arc::new(Mutex::new(State {
				client: BeefyClient::initialize(config, initial_beefy_block, current, next),
				gateway: Gateway::new(para_id),
				block: 0,
				transactions: Vec::new(),
				failures: 0,
				rejections: 0,
				stalls: BTreeMap::new(),
				revoked: Vec::new(),
			})),
		}
	}

	/// A client sending transactions signed by `signer`.
	pub fn client(&self, signer: Signer) -> ForeignClient {
		ForeignClient {
			chain: self.clone(),
			signer,
		}
	}

	pub fn block_number(&self) -> BlockNumber {
		self.inner.lock().block
	}

	/// Mine `count` empty blocks.
	pub fn mine(&self, count: BlockNumber) {
		self.inner.lock().block += count;
	}

	/// The next `count` calls fail with a connection error.
	pub fn fail_next(&self, count: u32) {
		self.inner.lock().failures = count;
	}

	/// The next `count` transactions are dropped by the pool.
	pub fn reject_next(&self, count: u32) {
		self.inner.lock().rejections = count;
	}

	/// Mine `blocks` empty blocks before the next `call` transaction, or before the next head poll
	/// if `call` is `"block_number"`.
	pub fn stall_next(&self, call: &'static str, blocks: BlockNumber) {
		self.inner.lock().stalls.insert(call, blocks);
	}

	/// Transactions of `account` fail as if its key were unavailable.
	pub fn revoke(&self, account: H160) {
		self.inner.lock().revoked.push(account);
	}

	/// Open `channel_id` on the gateway.
	pub fn create_channel(&self, channel_id: ChannelId) -> Result<(), VerifierError> {
		self.inner.lock().gateway.create_channel(channel_id)
	}

	/// Inspect the light client.
	pub fn with_client<T>(&self, f: impl FnOnce(&BeefyClient) -> T) -> T {
		f(&self.inner.lock().client)
	}

	pub fn latest_beefy_block(&self) -> BlockNumber {
		self.with_client(|client| client.latest_beefy_block())
	}

	pub fn events(&self) -> Vec<Event> {
		self.with_client(|client| client.events().to_vec())
	}

	pub fn gateway_events(&self) -> Vec<GatewayEvent> {
		self.inner.lock().gateway.events().to_vec()
	}

	/// `(inbound, outbound)` nonces of `channel_id`.
	pub fn channel_nonces(&self, channel_id: &ChannelId) -> Result<(u64, u64), VerifierError> {
		self.inner.lock().gateway.channel_nonces_of(channel_id)
	}

	pub fn transactions(&self) -> Vec<Transaction> {
		self.inner.lock().transactions.clone()
	}

	/// Number of mined `call` transactions, failed ones included.
	pub fn count_calls(&self, call: &str) -> usize {
		self.inner.lock().transactions.iter().filter(|tx| tx.call == call).count()
	}
}

/// Light client and gateway access for one relayer account.
#[derive(Clone)]
pub struct ForeignClient {
	chain: ForeignChain,
	signer: Signer,
}

impl ForeignClient {
	pub fn address(&self) -> H160 {
		self.signer.address()
	}

	/// Sign, mine and execute a transaction calling `call`.
	fn transact<T>(
		&self,
		call: &'static str,
		execute: impl FnOnce(&mut State, &BlockEnv) -> Result<T, VerifierError>,
	) -> Result<T, Error> {
		let mut state = self.chain.inner.lock();
		state.check_failure()?;

		if state.rejections > 0 {
			state.rejections -= 1;
			return Err(Error::Pool(call.into()));
		}

		let payload = (call, state.transactions.len() as u64).encode();
		let signature = self.signer.sign(&payload);
		let sender = recover_address(&H256(keccak_256(&payload)), &signature)
			.ok_or_else(|| Error::Pool(format!("{}: unrecoverable signature", call)))?;
		if state.revoked.contains(&sender) {
			return Err(Error::Credential(format!("key of {:?} is not available", sender)));
		}

		let stall = state.stalls.remove(call).unwrap_or(0);
		state.block += stall + 1;
		let env = block_env(state.block);

		let result = execute(&mut *state, &env);
		state.transactions.push(Transaction {
			sender,
			call,
			block: env.number,
			success: result.is_ok(),
		});

		result.map_err(Error::from)
	}

	/// Read from the latest block.
	fn view<T>(&self, read: impl FnOnce(&State, &BlockEnv) -> T) -> Result<T, Error> {
		let mut state = self.chain.inner.lock();
		state.check_failure()?;
		let env = block_env(state.block);
		Ok(read(&*state, &env))
	}
}

#[async_trait]
impl BeefyClientApi for ForeignClient {
	async fn block_number(&self) -> Result<BlockNumber, Error> {
		let mut state = self.chain.inner.lock();
		state.check_failure()?;
		let stall = state.stalls.remove("block_number").unwrap_or(0);
		state.block += stall + 1;
		Ok(state.block)
	}

	async fn latest_beefy_block(&self) -> Result<BlockNumber, Error> {
		self.view(|state, _| state.client.latest_beefy_block())
	}

	async fn current_validator_set(&self) -> Result<ValidatorSet, Error> {
		self.view(|state, _| state.client.current_validator_set())
	}

	async fn next_validator_set(&self) -> Result<ValidatorSet, Error> {
		self.view(|state, _| state.client.next_validator_set())
	}

	async fn randao_commit_delay(&self) -> Result<BlockNumber, Error> {
		self.view(|state, _| state.client.randao_commit_delay())
	}

	async fn randao_commit_expiration(&self) -> Result<BlockNumber, Error> {
		self.view(|state, _| state.client.randao_commit_expiration())
	}

	async fn ticket(&self, commitment_hash: H256) -> Result<Option<Ticket>, Error> {
		self.view(|state, _| state.client.ticket(&commitment_hash).cloned())
	}

	async fn submit_initial(
		&self,
		commitment: Commitment,
		bitfield: Bitfield,
		proof: ValidatorProof,
	) -> Result<(), Error> {
		self.transact("submit_initial", |state, env| {
			state.client.submit_initial(env, &commitment, &bitfield, &proof)
		})
	}

	async fn commit_prev_randao(&self, commitment_hash: H256) -> Result<(), Error> {
		self.transact("commit_prev_randao", |state, env| {
			state.client.commit_prev_randao(env, &commitment_hash)
		})
	}

	async fn create_final_bitfield(&self, commitment_hash: H256, bitfield: Bitfield) -> Result<Bitfield, Error> {
		self.view(|state, env| state.client.create_final_bitfield(env, &commitment_hash, &bitfield))?
			.map_err(Error::from)
	}

	async fn submit_final(
		&self,
		commitment: Commitment,
		bitfield: Bitfield,
		proofs: Vec<ValidatorProof>,
		leaf: MmrLeaf,
		leaf_proof: SimplifiedMmrProof,
	) -> Result<(), Error> {
		self.transact("submit_final", |state, env| {
			state.client.submit_final(
				env,
				&commitment,
				&bitfield,
				&proofs,
				&leaf,
				&leaf_proof.items,
				leaf_proof.order,
			)
		})
	}

	async fn verify_mmr_leaf_proof(&self, leaf_hash: H256, proof: SimplifiedMmrProof) -> Result<bool, Error> {
		self.view(|state, _| state.client.verify_mmr_leaf_proof(&leaf_hash, &proof.items, proof.order))
	}
}

#[async_trait]
impl GatewayApi for ForeignClient {
	async fn channel_nonces_of(&self, channel_id: ChannelId) -> Result<(u64, u64), Error> {
		self.view(|state, _| state.gateway.channel_nonces_of(&channel_id))?
			.map_err(Error::from)
	}

	async fn submit_v1(
		&self,
		message: InboundMessage,
		leaf_proof: Vec<H256>,
		header_proof: VerificationProof,
	) -> Result<DispatchOutcome, Error> {
		self.transact("submit_v1", |state, _| {
			let State { client, gateway, .. } = state;
			gateway.submit_v1(client, &message, &leaf_proof, &header_proof)
		})
	}
}

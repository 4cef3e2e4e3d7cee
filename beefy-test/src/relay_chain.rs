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

//! A BEEFY-finalized relay chain.
//!
//! Every block is finalized and signed by the active validator set. The MMR leaf appended at
//! block `n` describes block `n - 1` and announces the validator set following the one active
//! at `n`.

use std::{collections::BTreeMap, convert::TryFrom, sync::Arc};

use async_trait::async_trait;
use codec::Encode;
use parking_lot::Mutex;

use beefy_primitives::{
	keccak_256,
	mmr::{MerkleMountainRange, MmrLeaf, MmrProof},
	parachain::{para_heads_root, ParaId},
	Commitment, SignedCommitment, ValidatorSet, ValidatorSetId, H160, H256, GENESIS_AUTHORITY_SET_ID,
};
use beefy_relay::{Error, RelayChainApi};

use crate::keyring::{addresses, Keyring};

const CHAIN: &str = "relay chain";

struct State {
	/// Validators by set id. Ids past the end reuse the last keys.
	sets: Vec<Vec<Keyring>>,
	active: ValidatorSetId,
	mandatory: BTreeMap<ValidatorSetId, u32>,
	/// Block hashes by number, genesis included.
	hashes: Vec<H256>,
	mmr: MerkleMountainRange,
	leaves: Vec<MmrLeaf>,
	commitments: BTreeMap<u32, SignedCommitment>,
	heads: BTreeMap<ParaId, Vec<u8>>,
	heads_at: BTreeMap<u32, Vec<(ParaId, Vec<u8>)>>,
	pending_heads: Vec<(ParaId, u32, Vec<u8>)>,
	inclusions: BTreeMap<(ParaId, u32), u32>,
	offline: Vec<Keyring>,
	failures: u32,
}

impl State {
	fn keys(&self, id: ValidatorSetId) -> &[Keyring] {
		let last = self.sets.len().saturating_sub(1);
		let index = usize::try_from(id).map_or(last, |id| id.min(last));
		&self.sets[index]
	}

	fn validator_set(&self, id: ValidatorSetId) -> ValidatorSet {
		ValidatorSet::new(id, &addresses(self.keys(id)))
	}

	fn best(&self) -> u32 {
		(self.hashes.len() - 1) as u32
	}

	fn check_failure(&mut self) -> Result<(), Error> {
		if self.failures > 0 {
			self.failures -= 1;
			return Err(Error::Connection(CHAIN));
		}
		Ok(())
	}
}

/// Handle to a simulated relay chain.
#[derive(Clone)]
pub struct RelayChain {
	inner: Arc<Mutex<State>>,
}

impl RelayChain {
	/// Start a chain at genesis, with validator set 0 active.
	///
	/// `sets` must not be empty.
	pub fn new(sets: Vec<Vec<Keyring>>) -> Self {
		assert!(!sets.is_empty(), "at least the genesis validator set is needed");

		let mut mandatory = BTreeMap::new();
		mandatory.insert(GENESIS_AUTHORITY_SET_ID, 1);

		RelayChain {
			inner: Arc::new(Mutex::new(State {
				sets,
				active: GENESIS_AUTHORITY_SET_ID,
				mandatory,
				hashes: vec![H256(keccak_256(b"genesis"))],
				mmr: MerkleMountainRange::new(),
				leaves: Vec::new(),
				commitments: BTreeMap::new(),
				heads: BTreeMap::new(),
				heads_at: BTreeMap::new(),
				pending_heads: Vec::new(),
				inclusions: BTreeMap::new(),
				offline: Vec::new(),
				failures: 0,
			})),
		}
	}

	/// Validator set `id`.
	pub fn validator_set(&self, id: ValidatorSetId) -> ValidatorSet {
		self.inner.lock().validator_set(id)
	}

	/// Id of the set signing new blocks.
	pub fn active_set_id(&self) -> ValidatorSetId {
		self.inner.lock().active
	}

	pub fn best_block(&self) -> u32 {
		self.inner.lock().best()
	}

	/// MMR root committed to by block `number`.
	pub fn mmr_root(&self, number: u32) -> Option<H256> {
		self.inner.lock().mmr.root_at(u64::from(number)).ok()
	}

	/// The next block is signed by the next validator set.
	pub fn enact_next_set(&self) {
		let mut state = self.inner.lock();
		state.active += 1;
		let first = state.best() + 1;
		let active = state.active;
		state.mandatory.insert(active, first);
	}

	/// Validators that do not sign from now on.
	pub fn set_offline(&self, offline: Vec<Keyring>) {
		self.inner.lock().offline = offline;
	}

	/// The next `count` calls fail with a connection error.
	pub fn fail_next(&self, count: u32) {
		self.inner.lock().failures = count;
	}

	/// Include `head` of `para_block` of `para_id` in the next block.
	pub fn include_para_head(&self, para_id: ParaId, para_block: u32, head: Vec<u8>) {
		self.inner.lock().pending_heads.push((para_id, para_block, head));
	}

	/// Produce `count` blocks, returning the number of the last one.
	pub fn produce_blocks(&self, count: u32) -> u32 {
		for _ in 0..count {
			self.produce_block();
		}
		self.best_block()
	}

	/// Produce, finalize and sign a block, returning its number.
	pub fn produce_block(&self) -> u32 {
		let mut state = self.inner.lock();
		let number = state.best() + 1;

		let pending = std::mem::take(&mut state.pending_heads);
		for (para_id, para_block, head) in pending {
			state.heads.insert(para_id, head);
			state.inclusions.insert((para_id, para_block), number);
		}
		let heads = state.heads.iter().map(|(id, head)| (*id, head.clone())).collect::<Vec<_>>();

		let next = state.validator_set(state.active + 1);
		let leaf = MmrLeaf {
			version: 0,
			parent_number: number - 1,
			parent_hash: state.hashes[(number - 1) as usize],
			next_authority_set_id: state.active + 1,
			next_authority_set_len: next.length as u32,
			next_authority_set_root: next.root,
			parachain_heads_root: para_heads_root(&heads),
		};
		state.mmr.push(leaf.hash()).expect("in-memory store does not fail; qed");
		state.leaves.push(leaf);

		let root = state.mmr.root().expect("a leaf was just pushed; qed");
		state.hashes.push(H256(keccak_256(&(number, root).encode())));

		let commitment = Commitment::with_mmr_root(root, number, state.active);
		let hash = commitment.hash();
		let signatures = state
			.keys(state.active)
			.iter()
			.map(|key| {
				if state.offline.contains(key) {
					None
				} else {
					Some(key.sign_prehashed(&hash))
				}
			})
			.collect();

		state.commitments.insert(number, SignedCommitment { commitment, signatures });
		state.heads_at.insert(number, heads);

		number
	}
}

#[async_trait]
impl RelayChainApi for RelayChain {
	async fn latest_signed_commitment(&self) -> Result<Option<SignedCommitment>, Error> {
		let mut state = self.inner.lock();
		state.check_failure()?;
		let best = state.best();
		Ok(state.commitments.get(&best).cloned())
	}

	async fn signed_commitment(&self, block: u32) -> Result<Option<SignedCommitment>, Error> {
		let mut state = self.inner.lock();
		state.check_failure()?;
		Ok(state.commitments.get(&block).cloned())
	}

	async fn validator_addresses(&self, id: ValidatorSetId) -> Result<Vec<H160>, Error> {
		let mut state = self.inner.lock();
		state.check_failure()?;
		Ok(addresses(state.keys(id)))
	}

	async fn mandatory_block(&self, id: ValidatorSetId) -> Result<Option<u32>, Error> {
		let mut state = self.inner.lock();
		state.check_failure()?;
		Ok(state.mandatory.get(&id).copied())
	}

	async fn generate_mmr_proof(&self, leaf_index: u64, leaf_count: u64) -> Result<(MmrLeaf, MmrProof), Error> {
		let mut state = self.inner.lock();
		state.check_failure()?;

		let leaf = usize::try_from(leaf_index)
			.ok()
			.and_then(|index| state.leaves.get(index))
			.cloned()
			.ok_or_else(|| Error::Rpc {
				chain: CHAIN,
				reason: format!("no leaf #{}", leaf_index),
			})?;
		let proof = state.mmr.generate_proof(leaf_index, leaf_count).map_err(|e| Error::Rpc {
			chain: CHAIN,
			reason: e.to_string(),
		})?;

		Ok((leaf, proof))
	}

	async fn para_heads(&self, block: u32) -> Result<Vec<(ParaId, Vec<u8>)>, Error> {
		let mut state = self.inner.lock();
		state.check_failure()?;
		state.heads_at.get(&block).cloned().ok_or_else(|| Error::Rpc {
			chain: CHAIN,
			reason: format!("unknown block #{}", block),
		})
	}

	async fn para_head_inclusion_block(&self, para_id: ParaId, para_block: u32) -> Result<Option<u32>, Error> {
		let mut state = self.inner.lock();
		state.check_failure()?;
		Ok(state.inclusions.get(&(para_id, para_block)).copied())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use beefy_primitives::crypto::recover_address;

	#[test]
	fn blocks_are_signed_by_the_active_set() {
		// given
		let chain = RelayChain::new(vec![
			vec![Keyring::Alice, Keyring::Bob],
			vec![Keyring::Charlie, Keyring::Dave],
		]);
		chain.set_offline(vec![Keyring::Bob]);

		// when
		chain.produce_blocks(2);
		chain.enact_next_set();
		chain.produce_block();

		// then
		let state = chain.inner.lock();
		let first = &state.commitments[&1];
		assert_eq!(first.commitment.validator_set_id, 0);
		assert_eq!(
			recover_address(&first.commitment.hash(), first.signatures[0].as_ref().unwrap()),
			Some(Keyring::Alice.address())
		);
		assert_eq!(first.signatures[1], None);

		assert_eq!(state.commitments[&3].commitment.validator_set_id, 1);
		assert_eq!(state.mandatory.get(&1), Some(&3));

		// leaf 2 is appended at block 3 and announces set 2, which reuses the last keys
		assert_eq!(state.leaves[2].parent_number, 2);
		assert_eq!(state.leaves[2].next_authority_set_id, 2);
		assert_eq!(state.leaves[2].next_authority_set_root, state.validator_set(1).root);
		assert_eq!(state.leaves[1].next_authority_set_id, 1);
	}

	#[test]
	fn commitments_carry_the_mmr_root() {
		let chain = RelayChain::new(vec![vec![Keyring::Alice]]);

		let best = chain.produce_blocks(5);

		let root = chain.mmr_root(best).unwrap();
		let signed = async_std::task::block_on(chain.latest_signed_commitment()).unwrap().unwrap();
		assert_eq!(signed.commitment.block_number, 5);
		assert_eq!(signed.commitment.mmr_root(), Some(root.as_bytes()));
	}

	#[test]
	fn para_heads_are_included_in_the_next_block() {
		// given
		let chain = RelayChain::new(vec![vec![Keyring::Alice]]);
		chain.produce_block();

		// when
		chain.include_para_head(1000, 1, vec![1, 2, 3]);
		let included = chain.produce_block();

		// then
		async_std::task::block_on(async {
			assert_eq!(chain.para_head_inclusion_block(1000, 1).await.unwrap(), Some(included));
			assert_eq!(chain.para_heads(included).await.unwrap(), vec![(1000, vec![1, 2, 3])]);
			assert_eq!(chain.para_heads(1).await.unwrap(), vec![]);
		});

		let state = chain.inner.lock();
		assert_eq!(
			state.leaves[(included - 1) as usize].parachain_heads_root,
			para_heads_root(&[(1000, vec![1, 2, 3])])
		);
	}

	#[test]
	fn injected_failures_are_transient() {
		let chain = RelayChain::new(vec![vec![Keyring::Alice]]);
		chain.fail_next(1);

		let err = async_std::task::block_on(chain.mandatory_block(0)).unwrap_err();

		assert_eq!(err.kind(), beefy_relay::ErrorKind::Transient);
		assert_eq!(async_std::task::block_on(chain.mandatory_block(0)).unwrap(), Some(1));
	}
}

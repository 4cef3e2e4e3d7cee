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

//! Chains as seen by the relay.
//!
//! Every call may fail with a transient error. Rejections by the light client or the gateway
//! surface as [Error::Verifier](crate::Error::Verifier).

use async_trait::async_trait;

use beefy_light_client::{gateway::DispatchOutcome, ticket::Ticket, BlockNumber};
use beefy_primitives::{
	bitfield::Bitfield,
	message::{ChannelId, InboundMessage},
	mmr::{MmrLeaf, MmrProof, SimplifiedMmrProof},
	parachain::{ParaId, ParachainHeader, VerificationProof},
	Commitment, SignedCommitment, ValidatorProof, ValidatorSet, ValidatorSetId, H160, H256,
};

use crate::error::Error;

type Result<T> = std::result::Result<T, Error>;

/// The BEEFY-finalized relay chain.
#[async_trait]
pub trait RelayChainApi: Clone + Send + Sync + 'static {
	/// Latest finalized signed commitment, if BEEFY produced any.
	async fn latest_signed_commitment(&self) -> Result<Option<SignedCommitment>>;
	/// Signed commitment for `block`, if BEEFY produced one.
	async fn signed_commitment(&self, block: u32) -> Result<Option<SignedCommitment>>;
	/// Ordered addresses of the validator set `id`.
	async fn validator_addresses(&self, id: ValidatorSetId) -> Result<Vec<H160>>;
	/// First block signed by the validator set `id`, if it was enacted.
	async fn mandatory_block(&self, id: ValidatorSetId) -> Result<Option<u32>>;
	/// MMR proof of `leaf_index` against the MMR of `leaf_count` leaves.
	async fn generate_mmr_proof(&self, leaf_index: u64, leaf_count: u64) -> Result<(MmrLeaf, MmrProof)>;
	/// `(para id, SCALE encoded head)` of every parachain at `block`.
	async fn para_heads(&self, block: u32) -> Result<Vec<(ParaId, Vec<u8>)>>;
	/// Relay block that included the head of `para_block` of `para_id`, if any.
	async fn para_head_inclusion_block(&self, para_id: ParaId, para_block: u32) -> Result<Option<u32>>;
}

/// The parachain messages originate from.
#[async_trait]
pub trait ParachainApi: Clone + Send + Sync + 'static {
	/// Nonce of the last message sent on `channel_id`.
	async fn outbound_nonce(&self, channel_id: ChannelId) -> Result<u64>;
	/// Block that accepted message `nonce` of `channel_id`, if any.
	async fn message_block(&self, channel_id: ChannelId, nonce: u64) -> Result<Option<u32>>;
	/// Messages committed to by `block`, in commitment order.
	async fn messages_at(&self, block: u32) -> Result<Vec<InboundMessage>>;
	/// Header of `block`.
	async fn header(&self, block: u32) -> Result<ParachainHeader>;
}

/// The light client contract.
#[async_trait]
pub trait BeefyClientApi: Clone + Send + Sync + 'static {
	/// Latest foreign chain block.
	async fn block_number(&self) -> Result<BlockNumber>;
	async fn latest_beefy_block(&self) -> Result<BlockNumber>;
	async fn current_validator_set(&self) -> Result<ValidatorSet>;
	async fn next_validator_set(&self) -> Result<ValidatorSet>;
	async fn randao_commit_delay(&self) -> Result<BlockNumber>;
	async fn randao_commit_expiration(&self) -> Result<BlockNumber>;
	async fn ticket(&self, commitment_hash: H256) -> Result<Option<Ticket>>;

	async fn submit_initial(&self, commitment: Commitment, bitfield: Bitfield, proof: ValidatorProof) -> Result<()>;
	async fn commit_prev_randao(&self, commitment_hash: H256) -> Result<()>;
	async fn create_final_bitfield(&self, commitment_hash: H256, bitfield: Bitfield) -> Result<Bitfield>;
	async fn submit_final(
		&self,
		commitment: Commitment,
		bitfield: Bitfield,
		proofs: Vec<ValidatorProof>,
		leaf: MmrLeaf,
		leaf_proof: SimplifiedMmrProof,
	) -> Result<()>;

	/// Verify a simplified leaf proof against the latest MMR root.
	async fn verify_mmr_leaf_proof(&self, leaf_hash: H256, proof: SimplifiedMmrProof) -> Result<bool>;
}

/// The message gateway contract.
#[async_trait]
pub trait GatewayApi: Clone + Send + Sync + 'static {
	/// `(inbound, outbound)` nonces of `channel_id`.
	async fn channel_nonces_of(&self, channel_id: ChannelId) -> Result<(u64, u64)>;
	/// Submit a message with its inclusion proofs.
	async fn submit_v1(
		&self,
		message: InboundMessage,
		leaf_proof: Vec<H256>,
		header_proof: VerificationProof,
	) -> Result<DispatchOutcome>;
}

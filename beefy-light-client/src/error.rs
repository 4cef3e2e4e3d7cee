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

use beefy_primitives::bitfield;

/// Reasons for the light client or the gateway to reject a call.
///
/// A rejected call never changes any state.
#[derive(Debug, displaydoc::Display, Clone, Copy, PartialEq, Eq)]
pub enum Error {
	/// commitment is not for a tracked validator set or is not newer than the latest one
	InvalidCommitment,
	/// bitfield does not match the validator set or the ticket
	InvalidBitfield,
	/// bitfield has the wrong number of words
	InvalidBitfieldLength,
	/// not enough validators claimed to have signed
	NotEnoughClaims,
	/// validator index out of bounds
	IndexOutOfBounds,
	/// validator proof does not verify
	InvalidValidatorProof,
	/// wrong number of validator proofs
	InvalidValidatorProofLength,
	/// signature does not recover the claimed validator
	InvalidSignature,
	/// no ticket for this commitment
	InvalidTicket,
	/// randomness for this ticket has already been captured
	PrevRandaoAlreadyCaptured,
	/// randomness for this ticket has not been captured yet
	PrevRandaoNotCaptured,
	/// randomness cannot be captured before the commit delay is over
	WaitPeriodNotOver,
	/// ticket expired
	TicketExpired,
	/// commitment is not newer than the latest accepted one
	StaleCommitment,
	/// commitment does not carry anything this light client tracks
	CommitmentNotRelevant,
	/// MMR root payload is not 32 bytes long
	InvalidMMRRootLength,
	/// MMR leaf does not match the validator set handover
	InvalidMMRLeaf,
	/// MMR leaf proof does not verify against the new root
	InvalidMMRLeafProof,
	/// MMR leaf proof has too many items
	ProofSizeExceeded,
	/// unknown channel
	UnknownChannel,
	/// channel already exists
	ChannelExists,
	/// message nonce is not the next expected one
	InvalidNonce,
	/// message is not anchored to the latest MMR root
	InvalidProof,
}

impl std::error::Error for Error {}

impl From<bitfield::Error> for Error {
	fn from(err: bitfield::Error) -> Self {
		match err {
			bitfield::Error::IndexOutOfBounds { .. } => Error::IndexOutOfBounds,
			bitfield::Error::NotEnoughClaims { .. } => Error::NotEnoughClaims,
			bitfield::Error::ZeroLength => Error::InvalidBitfieldLength,
		}
	}
}

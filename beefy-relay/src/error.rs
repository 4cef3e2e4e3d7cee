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

//! Relay errors and their classification.

use beefy_light_client::Error as VerifierError;
use beefy_primitives::{bitfield, mmr};

/// How a worker reacts to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	/// The foreign chain rejected our data. Restart and re-sync from remote state.
	Protocol,
	/// Too early or too late. Handled inside the worker by waiting or restarting a phase.
	Timing,
	/// Somebody else already did the work. Counts as success.
	Relevance,
	/// RPC, connection or pool failure. Retry after a fixed backoff.
	Transient,
	/// Bad configuration or credentials. Stops the relay.
	Fatal,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// Call rejected by the light client or the gateway
	#[error("Foreign chain rejected the call: {0}")]
	Verifier(#[from] VerifierError),
	/// Request to a chain failed
	#[error("RPC request to {chain} failed: {reason}")]
	Rpc { chain: &'static str, reason: String },
	/// Connection to a chain lost
	#[error("Connection to {0} lost")]
	Connection(&'static str),
	/// Transaction not accepted into the pool
	#[error("Transaction pool rejected {0}")]
	Pool(String),
	/// Source chain data is missing or inconsistent
	#[error("Invalid source chain data: {0}")]
	InvalidSourceData(String),
	/// MMR proof could not be built or simplified
	#[error("MMR proof error: {0}")]
	Mmr(#[from] mmr::Error),
	/// Bitfield could not be built
	#[error("Bitfield error: {0}")]
	Bitfield(#[from] bitfield::Error),
	/// Configuration is invalid
	#[error("Invalid configuration: {0}")]
	Config(String),
	/// Signing credential could not be loaded
	#[error("Signing credential unavailable: {0}")]
	Credential(String),
}

impl Error {
	/// Classify the error.
	pub fn kind(&self) -> ErrorKind {
		match self {
			Error::Verifier(err) => verifier_error_kind(err),
			Error::Rpc { .. } | Error::Connection(_) | Error::Pool(_) => ErrorKind::Transient,
			Error::InvalidSourceData(_) | Error::Mmr(_) | Error::Bitfield(_) => ErrorKind::Protocol,
			Error::Config(_) | Error::Credential(_) => ErrorKind::Fatal,
		}
	}

	/// Return the verifier error, if the foreign chain rejected the call.
	pub fn verifier(&self) -> Option<VerifierError> {
		match self {
			Error::Verifier(err) => Some(*err),
			_ => None,
		}
	}
}

fn verifier_error_kind(err: &VerifierError) -> ErrorKind {
	use VerifierError::*;

	match err {
		PrevRandaoNotCaptured | WaitPeriodNotOver | PrevRandaoAlreadyCaptured | TicketExpired => ErrorKind::Timing,
		StaleCommitment | CommitmentNotRelevant => ErrorKind::Relevance,
		InvalidCommitment
		| InvalidBitfield
		| InvalidBitfieldLength
		| NotEnoughClaims
		| IndexOutOfBounds
		| InvalidValidatorProof
		| InvalidValidatorProofLength
		| InvalidSignature
		| InvalidTicket
		| InvalidMMRRootLength
		| InvalidMMRLeaf
		| InvalidMMRLeafProof
		| ProofSizeExceeded
		| UnknownChannel
		| ChannelExists
		| InvalidNonce
		| InvalidProof => ErrorKind::Protocol,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn errors_are_classified() {
		assert_eq!(Error::from(VerifierError::WaitPeriodNotOver).kind(), ErrorKind::Timing);
		assert_eq!(Error::from(VerifierError::TicketExpired).kind(), ErrorKind::Timing);
		assert_eq!(Error::from(VerifierError::StaleCommitment).kind(), ErrorKind::Relevance);
		assert_eq!(Error::from(VerifierError::InvalidNonce).kind(), ErrorKind::Protocol);
		assert_eq!(Error::from(mmr::Error::Empty).kind(), ErrorKind::Protocol);
		assert_eq!(Error::Connection("relay chain").kind(), ErrorKind::Transient);
		assert_eq!(Error::Config("no endpoint".into()).kind(), ErrorKind::Fatal);
	}

	#[test]
	fn error_messages() {
		let err = Error::from(VerifierError::InvalidTicket);

		assert_eq!(err.to_string(), "Foreign chain rejected the call: no ticket for this commitment");
		assert_eq!(err.verifier(), Some(VerifierError::InvalidTicket));
		assert_eq!(Error::Pool("submit_final".into()).verifier(), None);
	}
}

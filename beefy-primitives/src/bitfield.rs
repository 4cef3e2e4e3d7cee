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

//! Validator bitfields and the deterministic subsampling of signatures.
//!
//! A bitfield is a vector of 256-bit words. Validator `i` is bit `i % 256` of word `i / 256`,
//! counted from the least significant bit. This matches the layout of a `uint256[]` on the
//! foreign chain, so the same words can be passed around unchanged.

use crate::{keccak_256, H256, U256};
use codec::{Decode, Encode};

/// Number of bits in a bitfield word.
pub const WORD_BITS: usize = 256;

/// Bitfield errors.
#[derive(Debug, displaydoc::Display, Clone, PartialEq, Eq)]
pub enum Error {
	/// bit {index} is out of bounds for a bitfield of length {length}
	IndexOutOfBounds {
		/// Offending bit index.
		index: usize,
		/// Bitfield length in bits.
		length: usize,
	},
	/// cannot subsample {required} bits from a bitfield with {available} bits set
	NotEnoughClaims {
		/// Number of bits set within the bitfield length.
		available: usize,
		/// Number of bits requested.
		required: usize,
	},
	/// cannot subsample a bitfield of length 0
	ZeroLength,
}

impl std::error::Error for Error {}

/// A packed bit vector over validator indices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode)]
pub struct Bitfield(Vec<U256>);

/// Number of words needed for a bitfield of `length` bits.
pub fn words_for(length: usize) -> usize {
	(length + WORD_BITS - 1) / WORD_BITS
}

impl Bitfield {
	/// An empty bitfield able to hold `length` bits.
	pub fn with_length(length: usize) -> Self {
		Bitfield(vec![U256::zero(); words_for(length)])
	}

	/// Wrap raw words.
	pub fn from_words(words: Vec<U256>) -> Self {
		Bitfield(words)
	}

	/// Create a bitfield of `length` bits with the given bits set.
	pub fn create_initial<I>(bits_to_set: I, length: usize) -> Result<Self, Error>
	where
		I: IntoIterator<Item = usize>,
	{
		let mut bitfield = Self::with_length(length);
		for index in bits_to_set {
			if index >= length {
				return Err(Error::IndexOutOfBounds { index, length });
			}
			bitfield.set(index);
		}
		Ok(bitfield)
	}

	/// Raw words.
	pub fn words(&self) -> &[U256] {
		&self.0
	}

	/// Capacity of the bitfield, in bits.
	pub fn capacity(&self) -> usize {
		self.0.len() * WORD_BITS
	}

	/// Return `true` if bit `index` is set. Bits beyond the capacity are never set.
	pub fn is_set(&self, index: usize) -> bool {
		self.0
			.get(index / WORD_BITS)
			.map_or(false, |word| word.bit(index % WORD_BITS))
	}

	/// Set bit `index`, growing the bitfield if needed.
	pub fn set(&mut self, index: usize) {
		let word = index / WORD_BITS;
		if word >= self.0.len() {
			self.0.resize(word + 1, U256::zero());
		}
		self.0[word] = self.0[word] | (U256::one() << (index % WORD_BITS));
	}

	/// Clear bit `index`.
	pub fn unset(&mut self, index: usize) {
		if let Some(word) = self.0.get_mut(index / WORD_BITS) {
			*word = *word & !(U256::one() << (index % WORD_BITS));
		}
	}

	/// Number of bits set.
	pub fn count_set_bits(&self) -> usize {
		self.0
			.iter()
			.map(|word| word.0.iter().map(|limb| limb.count_ones() as usize).sum::<usize>())
			.sum()
	}

	/// Number of bits set below `length`.
	pub fn count_set_bits_below(&self, length: usize) -> usize {
		self.iter_ones().take_while(|index| *index < length).count()
	}

	/// Iterate set bit indices in increasing order.
	pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
		(0..self.capacity()).filter(move |index| self.is_set(*index))
	}

	/// Hash committed to by a ticket: keccak-256 over the big-endian words.
	pub fn hash(&self) -> H256 {
		let mut packed = vec![0u8; self.0.len() * 32];
		for (word, chunk) in self.0.iter().zip(packed.chunks_mut(32)) {
			word.to_big_endian(chunk);
		}
		H256(keccak_256(&packed))
	}
}

/// Deterministically select `n` of the bits set in `prior`.
///
/// Candidate indices are derived from `keccak256(seed ++ iteration)` reduced modulo `length`,
/// both operands encoded as 32 byte big-endian words. Indices not set in `prior`, or already
/// selected, are skipped until exactly `n` bits are selected.
pub fn subsample(seed: U256, prior: &Bitfield, n: usize, length: usize) -> Result<Bitfield, Error> {
	if length == 0 {
		return Err(Error::ZeroLength);
	}

	let available = prior.count_set_bits_below(length);
	if n > available {
		return Err(Error::NotEnoughClaims {
			available,
			required: n,
		});
	}

	let mut bitfield = Bitfield::with_length(length);
	let mut found = 0;
	let mut iteration = 0u64;

	while found < n {
		let index = make_index(seed, iteration, length);
		iteration += 1;

		if !prior.is_set(index) || bitfield.is_set(index) {
			continue;
		}

		bitfield.set(index);
		found += 1;
	}

	Ok(bitfield)
}

fn make_index(seed: U256, iteration: u64, length: usize) -> usize {
	let mut input = [0u8; 64];
	seed.to_big_endian(&mut input[..32]);
	U256::from(iteration).to_big_endian(&mut input[32..]);

	let hash = U256::from_big_endian(&keccak_256(&input));
	(hash % U256::from(length)).low_u64() as usize
}

#[cfg(test)]
mod tests {
	use super::*;

	fn candidate(bits: &[usize], length: usize) -> Bitfield {
		Bitfield::create_initial(bits.iter().copied(), length).unwrap()
	}

	#[test]
	fn should_create_initial_bitfield() {
		// given
		let bits = [0, 5, 255, 256, 299];

		// when
		let bitfield = candidate(&bits, 300);

		// then
		assert_eq!(bitfield.words().len(), 2);
		assert_eq!(bitfield.count_set_bits(), 5);
		assert_eq!(bitfield.iter_ones().collect::<Vec<_>>(), bits.to_vec());
		assert_eq!(bitfield.words()[0], U256::one() | (U256::one() << 5) | (U256::one() << 255));
		assert_eq!(bitfield.words()[1], U256::one() | (U256::one() << 43));
	}

	#[test]
	fn should_reject_out_of_bounds_bits() {
		let result = Bitfield::create_initial(vec![1, 10], 10);

		assert_eq!(result, Err(Error::IndexOutOfBounds { index: 10, length: 10 }));
	}

	#[test]
	fn set_and_unset() {
		// given
		let mut bitfield = Bitfield::with_length(10);

		// when
		bitfield.set(3);
		bitfield.set(600);

		// then
		assert!(bitfield.is_set(3));
		assert!(bitfield.is_set(600));
		assert_eq!(bitfield.words().len(), 3);

		// when
		bitfield.unset(3);
		bitfield.unset(10_000);

		// then
		assert!(!bitfield.is_set(3));
		assert_eq!(bitfield.count_set_bits(), 1);
	}

	#[test]
	fn hash_covers_words_big_endian() {
		// given
		let bitfield = candidate(&[0], 1);

		// when
		let mut expected = [0u8; 32];
		expected[31] = 1;

		// then
		assert_eq!(bitfield.hash(), H256(keccak_256(&expected)));
		assert_ne!(bitfield.hash(), candidate(&[1], 2).hash());
	}

	#[test]
	fn subsample_is_deterministic() {
		// given
		let prior = candidate(&(0..100).filter(|i| i % 3 != 0).collect::<Vec<_>>(), 100);
		let seed = U256::from(0xdead_beef_u64);

		// when
		let a = subsample(seed, &prior, 20, 100).unwrap();
		let b = subsample(seed, &prior, 20, 100).unwrap();

		// then
		assert_eq!(a, b);
	}

	#[test]
	fn subsample_depends_on_seed() {
		let prior = candidate(&(0..300).collect::<Vec<_>>(), 300);

		let a = subsample(U256::from(1), &prior, 10, 300).unwrap();
		let b = subsample(U256::from(2), &prior, 10, 300).unwrap();

		assert_ne!(a, b);
	}

	#[test]
	fn subsample_is_a_subset_of_exact_size() {
		for seed in 0..50u64 {
			// given
			let length = 1 + (seed as usize * 37) % 600;
			let bits = (0..length).filter(|i| (i * 7 + seed as usize) % 5 != 0).collect::<Vec<_>>();
			let prior = candidate(&bits, length);
			let n = bits.len() / 2;

			// when
			let selected = subsample(U256::from(seed), &prior, n, length).unwrap();

			// then
			assert_eq!(selected.count_set_bits(), n);
			assert!(selected.iter_ones().all(|index| prior.is_set(index)));
			assert_eq!(selected.words().len(), words_for(length));
		}
	}

	#[test]
	fn subsample_can_take_every_bit() {
		let prior = candidate(&[1, 4, 9], 10);

		let selected = subsample(U256::from(42), &prior, 3, 10).unwrap();

		assert_eq!(selected, prior);
	}

	#[test]
	fn subsample_requires_enough_claims() {
		// given
		let mut prior = candidate(&[1, 2], 4);
		// bits beyond the length do not count
		prior.set(300);

		// when
		let result = subsample(U256::zero(), &prior, 3, 4);

		// then
		assert_eq!(result, Err(Error::NotEnoughClaims { available: 2, required: 3 }));
	}

	#[test]
	fn subsample_needs_a_length() {
		let prior = Bitfield::with_length(0);

		assert_eq!(subsample(U256::zero(), &prior, 0, 0), Err(Error::ZeroLength));
		assert_eq!(subsample(U256::zero(), &candidate(&[0], 1), 0, 0), Err(Error::ZeroLength));
		assert_eq!(subsample(U256::zero(), &candidate(&[0], 1), 0, 1), Ok(Bitfield::with_length(1)));
	}
}

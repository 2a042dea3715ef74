//! Packed multi-bit counters.
//!
//! Single-bit flags are `flagset` enums (see [`crate::record::PathUpgrade`]); counters wider than
//! one bit that share a host integer with those flags are described here as tables of
//! [`BitField`]s, read with [`unpack`] and stored with [`pack`].

/// A `width`-bit unsigned field at bit `offset` of a host integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitField {
	pub name: &'static str,
	pub offset: u32,
	pub width: u32,
}

impl BitField {
	pub const fn new(name: &'static str, offset: u32, width: u32) -> Self {
		Self {
			name,
			offset,
			width,
		}
	}

	/// Largest value the field can hold.
	pub const fn max(self) -> u64 {
		(1 << self.width) - 1
	}

	/// The field's bits in place within the host integer.
	pub const fn mask(self) -> u64 {
		self.max() << self.offset
	}

	pub const fn get(self, word: u64) -> u64 {
		(word >> self.offset) & self.max()
	}

	/// Store `value` (truncated to the field width) into `word`.
	pub const fn put(self, word: u64, value: u64) -> u64 {
		(word & !self.mask()) | ((value & self.max()) << self.offset)
	}
}

/// Element collection counter packed beside the path upgrades in part 1.
pub const ELEMENT_COLLECTION_1: BitField = BitField::new("element_collection_1", 10, 2);

/// Counters packed beside the extra upgrades in part 2.
pub const ACCOLADE_RANK_2: BitField = BitField::new("accolade_rank_2", 4, 2);
pub const ELEMENT_COLLECTION_2: BitField = BitField::new("element_collection_2", 6, 3);
pub const ACCOLADE_RANK_3: BitField = BitField::new("accolade_rank_3", 9, 2);
pub const ELEMENT_COLLECTION_3: BitField = BitField::new("element_collection_3", 11, 2);

/// Counters in the part 1 upgrade word.
pub const PART1_COUNTERS: [BitField; 1] = [ELEMENT_COLLECTION_1];

/// Counters in the part 2 upgrade word.
pub const PART2_COUNTERS: [BitField; 4] = [
	ACCOLADE_RANK_2,
	ELEMENT_COLLECTION_2,
	ACCOLADE_RANK_3,
	ELEMENT_COLLECTION_3,
];

/// Every field of `table` read out of `word`, in table order.
pub fn unpack<const N: usize>(table: [BitField; N], word: u64) -> [u8; N] {
	table.map(|field| field.get(word) as u8)
}

/// `word` with each field of `table` set to the matching value, clamped to the field width.
pub fn pack<const N: usize>(table: [BitField; N], word: u64, values: [u8; N]) -> u64 {
	table
		.into_iter()
		.zip(values)
		.fold(word, |word, (field, value)| {
			field.put(word, u64::from(value).min(field.max()))
		})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn get_put() {
		let word = ELEMENT_COLLECTION_2.put(0, 5);
		assert_eq!(word, 0b101 << 6);
		assert_eq!(ELEMENT_COLLECTION_2.get(word), 5);
		assert_eq!(ELEMENT_COLLECTION_2.put(word, 0xff), 0b111 << 6);
	}

	#[test]
	fn put_leaves_neighbours_alone() {
		let word = u64::from(u16::MAX);
		let cleared = ACCOLADE_RANK_3.put(word, 0);
		assert_eq!(cleared, word & !(0b11 << 9));
	}

	#[test]
	fn pack_clamps_and_unpack_reads_back() {
		let word = pack(PART2_COUNTERS, 0b1010, [1, 9, 3, 2]);
		assert_eq!(word & 0b1111, 0b1010);
		assert_eq!(unpack(PART2_COUNTERS, word), [1, 7, 3, 2]);
		assert_eq!(unpack(PART1_COUNTERS, pack(PART1_COUNTERS, 0x3ff, [200])), [3]);
	}

	#[test]
	fn part2_counters_do_not_overlap() {
		let mut seen = 0u64;
		for field in PART2_COUNTERS {
			assert_eq!(seen & field.mask(), 0, "{} overlaps", field.name);
			assert_eq!(field.mask() & 0b1111, 0, "{} overlaps upgrade flags", field.name);
			seen |= field.mask();
		}
		assert!(seen < 1 << 16);
	}
}

use std::fmt;

/// One of the two physical copies of the data record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Region {
	A,
	B,
}

impl Region {
	pub const ALL: [Region; 2] = [Region::A, Region::B];

	/// First physical block of the region.
	pub const fn base_block(self) -> u8 {
		match self {
			Self::A => 0x08,
			Self::B => 0x24,
		}
	}

	/// Physical block holding logical data block `index` (0..11) of this region.
	///
	/// Every third data block is followed by a sector trailer, which is skipped.
	pub const fn block(self, index: u8) -> u8 {
		self.base_block() + index + index / 3
	}
}

impl fmt::Display for Region {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::A => f.write_str("A"),
			Self::B => f.write_str("B"),
		}
	}
}

/// The two independently sequenced parts of the data record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Part {
	Part1,
	Part2,
}

impl fmt::Display for Part {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Part1 => f.write_str("part 1"),
			Self::Part2 => f.write_str("part 2"),
		}
	}
}

/// Per-region generation counter; wraps at 256.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct AreaSequence(pub u8);

impl AreaSequence {
	#[must_use]
	pub const fn next(self) -> Self {
		Self(self.0.wrapping_add(1))
	}

	/// Signed distance from `other`, modulo 256.
	pub const fn ahead_of(self, other: Self) -> i8 {
		self.0.wrapping_sub(other.0) as i8
	}
}

/// Outcome of comparing the validated sequences of both regions.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Selection {
	/// Use this region.
	Region(Region),

	/// Neither copy is valid.
	Absent,

	/// Both copies are valid but not exactly one apart.
	Ambiguous { a: u8, b: u8 },
}

/// Pick the current copy from the validated sequences of regions A and B.
///
/// `None` marks a region whose checksums failed.
pub fn select(a: Option<AreaSequence>, b: Option<AreaSequence>) -> Selection {
	match (a, b) {
		(Some(a), Some(b)) => match a.ahead_of(b) {
			1 => Selection::Region(Region::A),
			-1 => Selection::Region(Region::B),
			_ => Selection::Ambiguous { a: a.0, b: b.0 },
		},
		(Some(_), None) => Selection::Region(Region::A),
		(None, Some(_)) => Selection::Region(Region::B),
		(None, None) => Selection::Absent,
	}
}

/// Pick the region to overwrite, and the sequence to write, from the raw sequences.
///
/// The stale region is the one not ahead; on a tie region A counts as current, so the
/// update goes to region B.
pub fn stale_region(a: AreaSequence, b: AreaSequence) -> (Region, AreaSequence) {
	if a.ahead_of(b) >= 0 {
		(Region::B, a.next())
	} else {
		(Region::A, b.next())
	}
}

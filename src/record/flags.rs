use std::fmt;

use flagset::{flags, FlagSet};

flags! {
	/// Upgrade bits stored in the low bits of the 24-bit word at part-1 offset 0x10.
	///
	/// Bits 10 and 11 of the same word hold a counter, see [`crate::bits::ELEMENT_COLLECTION_1`].
	pub enum PathUpgrade: u32 {
		/// A path has been chosen.
		OnPath     = 1 << 0,

		/// The chosen path is the bottom one (top if unset).
		BottomPath = 1 << 1,

		Main1      = 1 << 2,
		Main2      = 1 << 3,
		Main3      = 1 << 4,
		Main4      = 1 << 5,
		Path1      = 1 << 6,
		Path2      = 1 << 7,
		Path3      = 1 << 8,
		SoulGem    = 1 << 9,
	}

	/// Upgrade bits stored in the low bits of the 16-bit word at part-2 offset 0x06.
	pub enum ExtraUpgrade: u16 {
		WowPow   = 1 << 0,
		AltPath1 = 1 << 1,
		AltPath2 = 1 << 2,
		AltPath3 = 1 << 3,
	}

	/// Platforms the tag has been placed on.
	///
	/// The low byte is the platform byte at part-1 offset 0x13, the high byte the one at 0x17.
	pub enum Platform: u16 {
		Wii      = 1 << 0,
		Xbox360  = 1 << 1,
		Ps3      = 1 << 2,
		Pc       = 1 << 3,
		N3ds     = 1 << 4,
		Android  = 1 << 8,
		XboxOne  = 1 << 9,
		Ps4      = 1 << 10,
		Ios      = 1 << 11,
		Switch   = 1 << 14,
	}
}

/// Mask of the [`PathUpgrade`] bits within their host word.
pub const PATH_UPGRADE_MASK: u32 = 0x3ff;

/// Mask of the [`ExtraUpgrade`] bits within their host word.
pub const EXTRA_UPGRADE_MASK: u16 = 0xf;

/// Split a platform set into its two on-tag bytes.
pub fn platform_bytes(platforms: FlagSet<Platform>) -> (u8, u8) {
	let [low, high] = platforms.bits().to_le_bytes();
	(low, high)
}

/// Join the two on-tag platform bytes, dropping unknown bits.
pub fn platforms_from_bytes(low: u8, high: u8) -> FlagSet<Platform> {
	FlagSet::new_truncated(u16::from_le_bytes([low, high]))
}

/// Number of heroic challenges the tag can record.
pub const HEROIC_CHALLENGE_COUNT: u32 = 56;

/// Completed heroic challenges, one bit per challenge.
///
/// Challenges 0..32 live in part 1, 32..56 in part 2.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct HeroicChallenges(u64);

impl HeroicChallenges {
	const MASK: u64 = (1 << HEROIC_CHALLENGE_COUNT) - 1;

	pub const fn new(bits: u64) -> Self {
		Self(bits & Self::MASK)
	}

	pub(crate) fn from_halves(low: u32, high: u32) -> Self {
		Self::new(u64::from(low) | (u64::from(high) << 32))
	}

	pub const fn bits(self) -> u64 {
		self.0
	}

	pub const fn low(self) -> u32 {
		self.0 as u32
	}

	/// The 24 bits stored in part 2.
	pub const fn high(self) -> u32 {
		(self.0 >> 32) as u32
	}

	pub const fn contains(self, challenge: u32) -> bool {
		challenge < HEROIC_CHALLENGE_COUNT && (self.0 >> challenge) & 1 == 1
	}

	/// Copy with `challenge` marked complete or not. Out-of-range indices are ignored.
	#[must_use]
	pub const fn with(self, challenge: u32, complete: bool) -> Self {
		if challenge >= HEROIC_CHALLENGE_COUNT {
			return self;
		}
		if complete {
			Self(self.0 | (1 << challenge))
		} else {
			Self(self.0 & !(1 << challenge))
		}
	}

	pub fn iter(self) -> impl Iterator<Item = u32> {
		(0..HEROIC_CHALLENGE_COUNT).filter(move |n| self.contains(*n))
	}

	pub const fn count(self) -> u32 {
		self.0.count_ones()
	}
}

/// Human-readable upgrade summary, e.g. `Main: 12-- Top path: 1-- Soul gem: - Wow pow: Y Alt path: ---`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpgradeSummary {
	pub path: FlagSet<PathUpgrade>,
	pub extra: FlagSet<ExtraUpgrade>,
}

impl fmt::Display for UpgradeSummary {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fn marks<F: flagset::Flags>(
			f: &mut fmt::Formatter<'_>,
			set: FlagSet<F>,
			flags: &[F],
		) -> fmt::Result {
			for (n, flag) in flags.iter().enumerate() {
				if set.contains(*flag) {
					write!(f, "{}", n + 1)?;
				} else {
					f.write_str("-")?;
				}
			}
			Ok(())
		}

		use ExtraUpgrade::*;
		use PathUpgrade::*;

		f.write_str("Main: ")?;
		marks(f, self.path, &[Main1, Main2, Main3, Main4])?;

		let path = match (self.path.contains(OnPath), self.path.contains(BottomPath)) {
			(false, _) => "No",
			(true, false) => "Top",
			(true, true) => "Bottom",
		};
		write!(f, " {path} path: ")?;
		marks(f, self.path, &[Path1, Path2, Path3])?;

		let yes = |set: bool| if set { "Y" } else { "-" };
		write!(f, " Soul gem: {}", yes(self.path.contains(SoulGem)))?;
		write!(f, " Wow pow: {}", yes(self.extra.contains(WowPow)))?;

		f.write_str(" Alt path: ")?;
		marks(f, self.extra, &[AltPath1, AltPath2, AltPath3])
	}
}

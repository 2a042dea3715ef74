//! The data record stored (twice) in the data area of the tag.
//!
//! Part 1 is always present; part 2 holds the fields added by later games and is present
//! only when part 1 says so. Each part carries its own sequence and checksums, so the two
//! are validated, and reconciled across regions, independently.

use std::fmt;

use deku::prelude::*;
use flagset::FlagSet;

use crate::{
	bits::{pack, unpack, PART1_COUNTERS, PART2_COUNTERS},
	checksum::crc16,
	error::ChecksumError,
	sequence::AreaSequence,
	tag_time::TagTime,
};

pub use self::flags::*;
pub use self::part1::{Part1, PART1_SIZE};
pub use self::part2::{Part2, PART2_SIZE, QUEST_BYTES};

mod flags;
pub mod part1;
pub mod part2;

const SEQUENCE_OFFSET: usize = 0x09;
const CHECKSUM3_OFFSET: usize = 0x0a;
const CHECKSUM2_OFFSET: usize = 0x0c;
const CHECKSUM1_OFFSET: usize = 0x0e;
const HAS_PART2_OFFSET: usize = 0x16;

const PART2_SEQUENCE_OFFSET: usize = 0x02;
const CHECKSUM4_OFFSET: usize = 0x00;

const CHECKSUM1_SUFFIX: [u8; 2] = [5, 0];
const CHECKSUM3_BUFFER: usize = 0x110;
const CHECKSUM4_PREFIX: [u8; 2] = [6, 1];

/// The four data checksums.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Checksum {
	/// Part 1 bytes 0x00..0x0e, which include checksums 2 and 3.
	One,
	/// Part 1 bytes 0x10..0x40.
	Two,
	/// Part 1 bytes 0x40..0x70.
	Three,
	/// Part 2 bytes 0x02..0x40.
	Four,
}

impl fmt::Display for Checksum {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let n = match self {
			Self::One => 1,
			Self::Two => 2,
			Self::Three => 3,
			Self::Four => 4,
		};
		write!(f, "checksum {n}")
	}
}

impl Checksum {
	/// Compute this checksum over a part 1 (checksums 1..3) or part 2 (checksum 4) image.
	pub fn compute(self, part: &[u8]) -> u16 {
		match self {
			Self::One => {
				let mut buf = [0; CHECKSUM1_OFFSET + 2];
				buf[..CHECKSUM1_OFFSET].copy_from_slice(&part[..CHECKSUM1_OFFSET]);
				buf[CHECKSUM1_OFFSET..].copy_from_slice(&CHECKSUM1_SUFFIX);
				crc16(&buf)
			}
			Self::Two => crc16(&part[0x10..0x40]),
			Self::Three => {
				// the live bytes sit at the front of a zeroed buffer, matching tags in the field
				let mut buf = [0; CHECKSUM3_BUFFER];
				buf[..0x30].copy_from_slice(&part[0x40..0x70]);
				crc16(&buf)
			}
			Self::Four => {
				let mut buf = [0; PART2_SIZE];
				buf[..2].copy_from_slice(&CHECKSUM4_PREFIX);
				buf[2..].copy_from_slice(&part[2..PART2_SIZE]);
				crc16(&buf)
			}
		}
	}

	const fn offset(self) -> usize {
		match self {
			Self::One => CHECKSUM1_OFFSET,
			Self::Two => CHECKSUM2_OFFSET,
			Self::Three => CHECKSUM3_OFFSET,
			Self::Four => CHECKSUM4_OFFSET,
		}
	}

	fn stored(self, part: &[u8]) -> u16 {
		let at = self.offset();
		u16::from_le_bytes([part[at], part[at + 1]])
	}

	fn store(self, part: &mut [u8]) {
		let value = self.compute(part);
		let at = self.offset();
		part[at..at + 2].copy_from_slice(&value.to_le_bytes());
	}

	fn check(self, part: &[u8]) -> Result<(), ChecksumError> {
		let stored = self.stored(part);
		let computed = self.compute(part);
		if stored == computed {
			Ok(())
		} else {
			tracing::debug!(which = %self, stored, computed, "data checksum mismatch");
			Err(ChecksumError::Data {
				which: self,
				stored,
				computed,
			})
		}
	}
}

/// Check the three part 1 checksums and return its sequence.
#[tracing::instrument(level = "trace", skip(part1))]
pub fn validate_part1(part1: &[u8; PART1_SIZE]) -> Result<AreaSequence, ChecksumError> {
	Checksum::One.check(part1)?;
	Checksum::Two.check(part1)?;
	Checksum::Three.check(part1)?;
	Ok(AreaSequence(part1[SEQUENCE_OFFSET]))
}

/// Check the part 2 checksum and return its sequence.
#[tracing::instrument(level = "trace", skip(part2))]
pub fn validate_part2(part2: &[u8; PART2_SIZE]) -> Result<AreaSequence, ChecksumError> {
	Checksum::Four.check(part2)?;
	Ok(AreaSequence(part2[PART2_SEQUENCE_OFFSET]))
}

/// Whether a part 1 image flags part 2 as present.
pub fn has_part2(part1: &[u8; PART1_SIZE]) -> bool {
	part1[HAS_PART2_OFFSET] != 0
}

/// Sequence byte of a part 1 image, whether or not it validates.
pub fn part1_sequence(part1: &[u8]) -> AreaSequence {
	AreaSequence(part1[SEQUENCE_OFFSET])
}

/// Sequence byte of a part 2 image, whether or not it validates.
pub fn part2_sequence(part2: &[u8]) -> AreaSequence {
	AreaSequence(part2[PART2_SEQUENCE_OFFSET])
}

fn to_array<const N: usize>(bytes: Vec<u8>, what: &str) -> Result<[u8; N], ChecksumError> {
	let len = bytes.len();
	bytes
		.try_into()
		.map_err(|_| ChecksumError::Layout(format!("{what} encoded to {len} bytes, not {N}")))
}

/// Largest value of the 24-bit part 1 XP counter.
pub const XP1_MAX: u32 = 0x00ff_ffff;

/// Logical data record: the decoded fields of part 1 plus the optional part 2 extension.
///
/// Values are immutable; the `with_*` methods return an edited copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataRecord {
	/// Stored in 24 bits; larger values are clamped to [`XP1_MAX`] on encode.
	pub xp1: u32,
	pub money: u16,
	pub seconds_on_portal: u32,
	pub upgrades: FlagSet<PathUpgrade>,

	/// 0..=3; larger values are clamped on encode.
	pub element_collection_1: u8,
	pub platforms: FlagSet<Platform>,
	pub hat_base: u16,
	pub owner_id: [u8; 8],
	pub nickname: String,
	pub write_time: TagTime,
	pub heroic_challenges: HeroicChallenges,
	pub hero_points: u16,

	/// Build date of the game that last wrote the tag: year since 2000, month, day.
	pub build_date: [u8; 3],
	pub owner_count: u8,
	pub reset_time: TagTime,
	pub pr_event_data: [u8; 2],
	pub wii_data: [u8; 4],
	pub xbox360_data: [u8; 4],
	pub usage_info: [u8; 12],
	pub challenge_level: u32,

	/// Part 2, if the tag uses it.
	pub extension: Option<Extension>,
}

/// Fields stored in part 2.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extension {
	pub xp2: u16,
	pub xp3: u32,

	/// Hat id bytes 2..4, extending [`DataRecord::hat_base`].
	pub hat_extra: [u8; 3],
	pub upgrades: FlagSet<ExtraUpgrade>,

	/// The counters below are clamped to their widths on encode: 0..=3, except
	/// `element_collection_2` which holds 0..=7.
	pub accolade_rank_2: u8,
	pub element_collection_2: u8,
	pub accolade_rank_3: u8,
	pub element_collection_3: u8,
	pub trinket: u8,
	pub battlegrounds: u32,
	pub quests: [u8; QUEST_BYTES],
	pub reserved_0f: u8,
	pub reserved: [u8; 16],
}

impl DataRecord {
	/// Validate and decode a part 1 image and, if given, a part 2 image.
	///
	/// A part 2 image is ignored when part 1 does not flag part 2 as present.
	#[tracing::instrument(level = "trace", skip(part1, part2))]
	pub fn decode(
		part1: &[u8; PART1_SIZE],
		part2: Option<&[u8; PART2_SIZE]>,
	) -> Result<Self, ChecksumError> {
		validate_part1(part1)?;
		let (_, wire) = Part1::from_bytes((&part1[..], 0))?;
		let mut record = Self::from_part1(&wire);

		if let Some(part2) = part2.filter(|_| has_part2(part1)) {
			validate_part2(part2)?;
			let (_, wire) = Part2::from_bytes((&part2[..], 0))?;
			record.heroic_challenges =
				HeroicChallenges::from_halves(record.heroic_challenges.low(), wire.heroic_high);
			record.extension = Some(Extension::from_part2(&wire));
		}

		Ok(record)
	}

	fn from_part1(wire: &Part1) -> Self {
		let [element_collection_1] = unpack(PART1_COUNTERS, u64::from(wire.upgrades));
		Self {
			xp1: wire.xp1,
			money: wire.money,
			seconds_on_portal: wire.seconds_on_portal,
			upgrades: FlagSet::new_truncated(wire.upgrades & PATH_UPGRADE_MASK),
			element_collection_1,
			platforms: platforms_from_bytes(wire.platforms_low, wire.platforms_high),
			hat_base: wire.hat_base,
			owner_id: wire.owner_id,
			nickname: wire.nickname.clone(),
			write_time: wire.write_time,
			heroic_challenges: HeroicChallenges::from_halves(wire.heroic_low, 0),
			hero_points: wire.hero_points,
			build_date: [wire.build_year, wire.build_month, wire.build_day],
			owner_count: wire.owner_count,
			reset_time: wire.reset_time,
			pr_event_data: wire.pr_event_data,
			wii_data: wire.wii_data,
			xbox360_data: wire.xbox360_data,
			usage_info: wire.usage_info,
			challenge_level: wire.challenge_level,
			extension: None,
		}
	}

	/// Encode part 1 with `sequence`, computing checksums 3, 2 and 1 in that order.
	#[tracing::instrument(level = "trace", skip(self))]
	pub fn encode_part1(&self, sequence: AreaSequence) -> Result<[u8; PART1_SIZE], ChecksumError> {
		let word = pack(
			PART1_COUNTERS,
			u64::from(self.upgrades.bits()),
			[self.element_collection_1],
		);
		let (platforms_low, platforms_high) = platform_bytes(self.platforms);
		let [build_year, build_month, build_day] = self.build_date;

		let wire = Part1 {
			xp1: self.xp1.min(XP1_MAX),
			money: self.money,
			seconds_on_portal: self.seconds_on_portal,
			sequence: sequence.0,
			checksum3: 0,
			checksum2: 0,
			checksum1: 0,
			upgrades: word as u32,
			platforms_low,
			hat_base: self.hat_base,
			has_part2: u8::from(self.extension.is_some()),
			platforms_high,
			owner_id: self.owner_id,
			nickname: self.nickname.clone(),
			write_time: self.write_time,
			heroic_low: self.heroic_challenges.low(),
			hero_points: self.hero_points,
			build_year,
			build_month,
			build_day,
			owner_count: self.owner_count,
			reset_time: self.reset_time,
			pr_event_data: self.pr_event_data,
			wii_data: self.wii_data,
			xbox360_data: self.xbox360_data,
			usage_info: self.usage_info,
			challenge_level: self.challenge_level,
		};

		let mut bytes: [u8; PART1_SIZE] = to_array(wire.to_bytes()?, "part 1")?;
		Checksum::Three.store(&mut bytes);
		Checksum::Two.store(&mut bytes);
		Checksum::One.store(&mut bytes);
		Ok(bytes)
	}

	/// Encode part 2 with `sequence`, or `None` if the record has no extension.
	#[tracing::instrument(level = "trace", skip(self))]
	pub fn encode_part2(
		&self,
		sequence: AreaSequence,
	) -> Result<Option<[u8; PART2_SIZE]>, ChecksumError> {
		let Some(ext) = &self.extension else {
			return Ok(None);
		};

		let word = pack(
			PART2_COUNTERS,
			u64::from(ext.upgrades.bits()),
			[
				ext.accolade_rank_2,
				ext.element_collection_2,
				ext.accolade_rank_3,
				ext.element_collection_3,
			],
		);
		let [hat_2, hat_3, hat_4] = ext.hat_extra;

		let wire = Part2 {
			checksum4: 0,
			sequence: sequence.0,
			xp2: ext.xp2,
			hat_2,
			upgrades: word as u16,
			xp3: ext.xp3,
			hat_3,
			trinket: ext.trinket,
			hat_4,
			reserved_0f: ext.reserved_0f,
			battlegrounds: ext.battlegrounds,
			heroic_high: self.heroic_challenges.high(),
			quests: ext.quests,
			reserved: ext.reserved,
		};

		let mut bytes: [u8; PART2_SIZE] = to_array(wire.to_bytes()?, "part 2")?;
		Checksum::Four.store(&mut bytes);
		Ok(Some(bytes))
	}

	/// Sum of the XP counters across both parts.
	pub fn total_xp(&self) -> u32 {
		let extension = self
			.extension
			.as_ref()
			.map_or(0, |ext| u32::from(ext.xp2).saturating_add(ext.xp3));
		self.xp1.saturating_add(extension)
	}

	pub fn upgrade_summary(&self) -> UpgradeSummary {
		UpgradeSummary {
			path: self.upgrades,
			extra: self
				.extension
				.as_ref()
				.map(|ext| ext.upgrades)
				.unwrap_or_default(),
		}
	}

	#[must_use]
	pub fn with_nickname(mut self, nickname: impl Into<String>) -> Self {
		self.nickname = nickname.into();
		self
	}

	#[must_use]
	pub fn with_money(mut self, money: u16) -> Self {
		self.money = money;
		self
	}

	/// Set the part 1 XP counter; values past 24 bits are clamped.
	#[must_use]
	pub fn with_xp1(mut self, xp: u32) -> Self {
		self.xp1 = xp.min(XP1_MAX);
		self
	}

	#[must_use]
	pub fn with_write_time(mut self, time: TagTime) -> Self {
		self.write_time = time;
		self
	}

	#[must_use]
	pub fn with_upgrades(mut self, upgrades: impl Into<FlagSet<PathUpgrade>>) -> Self {
		self.upgrades = upgrades.into();
		self
	}

	#[must_use]
	pub fn with_platforms(mut self, platforms: impl Into<FlagSet<Platform>>) -> Self {
		self.platforms = platforms.into();
		self
	}

	#[must_use]
	pub fn with_heroic_challenges(mut self, challenges: HeroicChallenges) -> Self {
		self.heroic_challenges = challenges;
		self
	}

	#[must_use]
	pub fn with_extension(mut self, extension: Option<Extension>) -> Self {
		self.extension = extension;
		self
	}
}

impl Extension {
	fn from_part2(wire: &Part2) -> Self {
		let [accolade_rank_2, element_collection_2, accolade_rank_3, element_collection_3] =
			unpack(PART2_COUNTERS, u64::from(wire.upgrades));
		Self {
			xp2: wire.xp2,
			xp3: wire.xp3,
			hat_extra: [wire.hat_2, wire.hat_3, wire.hat_4],
			upgrades: FlagSet::new_truncated(wire.upgrades & EXTRA_UPGRADE_MASK),
			accolade_rank_2,
			element_collection_2,
			accolade_rank_3,
			element_collection_3,
			trinket: wire.trinket,
			battlegrounds: wire.battlegrounds,
			quests: wire.quests,
			reserved_0f: wire.reserved_0f,
			reserved: wire.reserved,
		}
	}

	#[must_use]
	pub fn with_xp(mut self, xp2: u16, xp3: u32) -> Self {
		self.xp2 = xp2;
		self.xp3 = xp3;
		self
	}

	#[must_use]
	pub fn with_upgrades(mut self, upgrades: impl Into<FlagSet<ExtraUpgrade>>) -> Self {
		self.upgrades = upgrades.into();
		self
	}
}

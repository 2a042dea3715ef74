use deku::prelude::*;

use crate::tag_time::TagTime;

pub const PART1_SIZE: usize = 0x70;

/// Part 1 of the data record, as decrypted from the first seven data blocks of a region.
#[derive(Debug, Clone, PartialEq, Eq, Default, DekuRead, DekuWrite)]
#[deku(endian = "little")]
pub struct Part1 {
	// block 0
	#[deku(
		reader = "crate::deku_helpers::reader_u24(deku::reader)",
		writer = "crate::deku_helpers::writer_u24(deku::writer, &self.xp1)"
	)]
	pub xp1: u32, // 3 = 3
	pub money: u16, // 2 = 5
	pub seconds_on_portal: u32, // 4 = 9
	pub sequence: u8, // 1 = 10
	pub checksum3: u16, // 2 = 12
	pub checksum2: u16, // 2 = 14
	pub checksum1: u16, // 2 = 16

	// block 1
	/// Path upgrade flags plus the first element collection counter.
	#[deku(
		reader = "crate::deku_helpers::reader_u24(deku::reader)",
		writer = "crate::deku_helpers::writer_u24(deku::writer, &self.upgrades)"
	)]
	pub upgrades: u32, // 3 = 19
	pub platforms_low: u8, // 1 = 20
	pub hat_base: u16, // 2 = 22

	/// Non-zero when part 2 is in use.
	pub has_part2: u8, // 1 = 23
	pub platforms_high: u8, // 1 = 24
	pub owner_id: [u8; 8], // 8 = 32

	// blocks 2 and 3
	#[deku(
		reader = "crate::deku_helpers::reader_nickname(deku::reader)",
		writer = "crate::deku_helpers::writer_nickname(deku::writer, &self.nickname)"
	)]
	pub nickname: String, // 32 = 64

	// block 4
	pub write_time: TagTime, // 6 = 70
	pub heroic_low: u32, // 4 = 74
	pub hero_points: u16, // 2 = 76
	pub build_year: u8, // 1 = 77
	pub build_month: u8, // 1 = 78
	pub build_day: u8, // 1 = 79
	pub owner_count: u8, // 1 = 80

	// block 5
	pub reset_time: TagTime, // 6 = 86
	pub pr_event_data: [u8; 2], // 2 = 88
	pub wii_data: [u8; 4], // 4 = 92
	pub xbox360_data: [u8; 4], // 4 = 96

	// block 6
	pub usage_info: [u8; 12], // 12 = 108
	pub challenge_level: u32, // 4 = 112
}

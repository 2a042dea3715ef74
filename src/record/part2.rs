use deku::prelude::*;

pub const PART2_SIZE: usize = 0x40;

pub const QUEST_BYTES: usize = 25;

/// Part 2 of the data record, as decrypted from the last four data blocks of a region.
#[derive(Debug, Clone, PartialEq, Eq, Default, DekuRead, DekuWrite)]
#[deku(endian = "little")]
pub struct Part2 {
	// block 7
	pub checksum4: u16, // 2 = 2
	pub sequence: u8, // 1 = 3
	pub xp2: u16, // 2 = 5
	pub hat_2: u8, // 1 = 6

	/// Extra upgrade flags plus accolade and element collection counters.
	pub upgrades: u16, // 2 = 8
	pub xp3: u32, // 4 = 12
	pub hat_3: u8, // 1 = 13
	pub trinket: u8, // 1 = 14
	pub hat_4: u8, // 1 = 15
	pub reserved_0f: u8, // 1 = 16

	// blocks 8 and 9
	pub battlegrounds: u32, // 4 = 20
	#[deku(
		reader = "crate::deku_helpers::reader_u24(deku::reader)",
		writer = "crate::deku_helpers::writer_u24(deku::writer, &self.heroic_high)"
	)]
	pub heroic_high: u32, // 3 = 23
	pub quests: [u8; QUEST_BYTES], // 25 = 48

	// block 10
	pub reserved: [u8; 16], // 16 = 64
}

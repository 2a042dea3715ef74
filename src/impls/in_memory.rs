use super::TagDump;
use crate::{
	cipher::Block,
	error::HardwareError,
	keys::{sector_key_a, SectorKey, Uid},
	transport::{is_trailer, sector_of, trailer_of, Mifare, SECTOR_COUNT, TAG_ACCESS_BITS},
};

/// Access bits of a factory-fresh sector.
pub const FACTORY_ACCESS_BITS: [u8; 4] = [0xff, 0x07, 0x80, 0x69];

/// A command received by a [`MemoryTag`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
	Authenticate {
		sector: u8,
		key: SectorKey,
		accepted: bool,
	},
	Read {
		block: u8,
	},
	Write {
		block: u8,
	},
}

/// A simulated MIFARE Classic 1K card over a [`TagDump`].
///
/// Checks key A against each sector's trailer and only serves blocks of the authenticated
/// sector. Key A reads back as zeros, as on a real card. Every command is logged.
#[derive(Debug, Clone)]
pub struct MemoryTag {
	dump: TagDump,
	authenticated: Option<u8>,
	present: bool,
	commands_left: Option<usize>,
	failure: Option<(usize, HardwareError)>,
	ops: Vec<Op>,
}

impl MemoryTag {
	pub fn new(dump: TagDump) -> Self {
		Self {
			dump,
			authenticated: None,
			present: true,
			commands_left: None,
			failure: None,
			ops: Vec::new(),
		}
	}

	/// A card restored from a dump read off a real tag.
	///
	/// Such dumps carry key A as zeros. A dump can only be read with the derived keys, so every
	/// trailer whose key A is all zeros gets the derived key of its sector back.
	pub fn from_masked_dump(dump: TagDump) -> Self {
		let mut uid = [0; 4];
		uid.copy_from_slice(&dump.block(0)[..4]);

		let mut tag = Self::new(dump);
		for sector in 0..SECTOR_COUNT {
			if tag.dump.block(trailer_of(sector))[..6] == [0; 6] {
				tag.set_key_a(sector, sector_key_a(sector, &uid));
			}
		}
		tag
	}

	/// A factory-fresh card: manufacturer block, default keys everywhere.
	pub fn blank(uid: Uid) -> Self {
		let mut dump = TagDump::default();
		let bcc = uid.iter().fold(0, |acc, b| acc ^ b);
		let mut block0 = [0; 16];
		block0[..4].copy_from_slice(&uid);
		block0[4] = bcc;
		block0[5..8].copy_from_slice(&[0x08, 0x04, 0x00]);
		block0[8..].copy_from_slice(b"portaltg");
		dump.set_block(0, &block0);

		let mut tag = Self::new(dump);
		for sector in 0..SECTOR_COUNT {
			let mut trailer = [0xff; 16];
			trailer[6..10].copy_from_slice(&FACTORY_ACCESS_BITS);
			tag.dump.set_block(trailer_of(sector), &trailer);
		}
		tag
	}

	/// A blank card already provisioned with the derived keys and tag access bits.
	pub fn formatted(uid: Uid) -> Self {
		let mut tag = Self::blank(uid);
		for sector in 0..SECTOR_COUNT {
			tag.set_key_a(sector, sector_key_a(sector, &uid));
			if sector != 0 {
				tag.set_access_bits(sector, TAG_ACCESS_BITS);
			}
		}
		tag
	}

	pub fn dump(&self) -> &TagDump {
		&self.dump
	}

	pub fn into_dump(self) -> TagDump {
		self.dump
	}

	pub fn set_key_a(&mut self, sector: u8, key: SectorKey) {
		let mut trailer = self.dump.block(trailer_of(sector));
		trailer[..6].copy_from_slice(&key);
		self.dump.set_block(trailer_of(sector), &trailer);
	}

	pub fn set_access_bits(&mut self, sector: u8, bits: [u8; 4]) {
		let mut trailer = self.dump.block(trailer_of(sector));
		trailer[6..10].copy_from_slice(&bits);
		self.dump.set_block(trailer_of(sector), &trailer);
	}

	pub fn ops(&self) -> &[Op] {
		&self.ops
	}

	#[must_use]
	pub fn with_ops_cleared(mut self) -> Self {
		self.ops.clear();
		self
	}

	pub fn writes(&self) -> impl Iterator<Item = u8> + '_ {
		self.ops.iter().filter_map(|op| match op {
			Op::Write { block } => Some(*block),
			_ => None,
		})
	}

	pub fn trailer_writes(&self) -> usize {
		self.writes().filter(|&block| is_trailer(block)).count()
	}

	pub fn data_writes(&self) -> usize {
		self.writes().filter(|&block| !is_trailer(block)).count()
	}

	/// Take the card off the reader: every further command reports [`HardwareError::Lost`].
	pub fn pull(&mut self) {
		self.present = false;
		self.authenticated = None;
	}

	/// Put the card back on the reader.
	pub fn present(&mut self) {
		self.present = true;
		self.commands_left = None;
	}

	/// Pull the card after `commands` more commands have gone through.
	pub fn pull_after(&mut self, commands: usize) {
		self.commands_left = Some(commands);
	}

	/// Fail the next command with `err`.
	pub fn fail_next(&mut self, err: HardwareError) {
		self.fail_after(0, err);
	}

	/// Fail one command with `err`, after `commands` more have gone through.
	pub fn fail_after(&mut self, commands: usize, err: HardwareError) {
		self.failure = Some((commands, err));
	}

	fn command(&mut self) -> Result<(), HardwareError> {
		if let Some(left) = &mut self.commands_left {
			if *left == 0 {
				self.pull();
			} else {
				*left -= 1;
			}
		}
		if !self.present {
			return Err(HardwareError::Lost);
		}
		match self.failure.take() {
			Some((0, err)) => {
				self.authenticated = None;
				if err == HardwareError::Lost {
					self.pull();
				}
				Err(err)
			}
			Some((left, err)) => {
				self.failure = Some((left - 1, err));
				Ok(())
			}
			None => Ok(()),
		}
	}

	fn check_authenticated(&self, block: u8) -> Result<(), HardwareError> {
		if self.authenticated == Some(sector_of(block)) {
			Ok(())
		} else {
			Err(HardwareError::Io(format!("block {block} not authenticated")))
		}
	}
}

impl Mifare for MemoryTag {
	fn authenticate_key_a(&mut self, sector: u8, key: &SectorKey) -> Result<bool, HardwareError> {
		self.command()?;
		if sector >= SECTOR_COUNT {
			return Err(HardwareError::Io(format!("no sector {sector}")));
		}
		let accepted = self.dump.block(trailer_of(sector))[..6] == key[..];
		self.ops.push(Op::Authenticate {
			sector,
			key: *key,
			accepted,
		});
		self.authenticated = accepted.then_some(sector);
		Ok(accepted)
	}

	fn read_block(&mut self, block: u8) -> Result<Block, HardwareError> {
		self.command()?;
		self.check_authenticated(block)?;
		self.ops.push(Op::Read { block });
		let mut data = self.dump.block(block);
		if is_trailer(block) {
			data[..6].fill(0);
		}
		Ok(data)
	}

	fn write_block(&mut self, block: u8, data: &Block) -> Result<(), HardwareError> {
		self.command()?;
		self.check_authenticated(block)?;
		if block == 0 {
			return Err(HardwareError::Io("block 0 is read-only".into()));
		}
		self.ops.push(Op::Write { block });
		self.dump.set_block(block, data);
		Ok(())
	}
}

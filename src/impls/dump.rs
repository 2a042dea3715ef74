use std::{fmt, path::Path};

use crate::{
	cipher::Block,
	error::{DumpError, TransportError},
	transport::{BlockIo, BLOCK_COUNT},
};

/// Size of a full tag image.
pub const DUMP_SIZE: usize = BLOCK_COUNT as usize * 16;

/// Raw image of a whole tag, block `n` at bytes `16n..16n+16`.
///
/// As a [`BlockIo`] it has no keys and no guards: every block, trailers included, reads and
/// writes directly.
#[derive(Clone, PartialEq, Eq)]
pub struct TagDump(Box<[u8; DUMP_SIZE]>);

impl Default for TagDump {
	fn default() -> Self {
		Self(Box::new([0; DUMP_SIZE]))
	}
}

impl fmt::Debug for TagDump {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_list().entries(self.hex_lines()).finish()
	}
}

impl TagDump {
	pub fn from_bytes(bytes: &[u8]) -> Result<Self, DumpError> {
		if bytes.len() != DUMP_SIZE {
			return Err(DumpError::Size {
				expected: DUMP_SIZE,
				len: bytes.len(),
			});
		}
		let mut dump = Self::default();
		dump.0.copy_from_slice(bytes);
		Ok(dump)
	}

	#[tracing::instrument(level = "debug")]
	pub fn load(path: &Path) -> Result<Self, DumpError> {
		Self::from_bytes(&std::fs::read(path)?)
	}

	#[tracing::instrument(level = "debug", skip(self))]
	pub fn save(&self, path: &Path) -> Result<(), DumpError> {
		std::fs::write(path, &self.0[..])?;
		Ok(())
	}

	pub fn as_bytes(&self) -> &[u8; DUMP_SIZE] {
		&self.0
	}

	/// Panics if `n` is past the last block.
	pub fn block(&self, n: u8) -> Block {
		let at = usize::from(n) * 16;
		let mut block = [0; 16];
		block.copy_from_slice(&self.0[at..at + 16]);
		block
	}

	/// Panics if `n` is past the last block.
	pub fn set_block(&mut self, n: u8, data: &Block) {
		let at = usize::from(n) * 16;
		self.0[at..at + 16].copy_from_slice(data);
	}

	/// One line per block: the block number, then the block in hex.
	pub fn hex_lines(&self) -> impl Iterator<Item = String> + '_ {
		self.0
			.chunks_exact(16)
			.enumerate()
			.map(|(n, block)| format!("{n:02}: {}", hex::encode(block)))
	}
}

impl BlockIo for TagDump {
	fn read_block(&mut self, block: u8) -> Result<Block, TransportError> {
		if block >= BLOCK_COUNT {
			return Err(TransportError::OutOfRange { block });
		}
		Ok(self.block(block))
	}

	fn write_block(&mut self, block: u8, data: &Block) -> Result<(), TransportError> {
		if block >= BLOCK_COUNT {
			return Err(TransportError::OutOfRange { block });
		}
		self.set_block(block, data);
		Ok(())
	}
}

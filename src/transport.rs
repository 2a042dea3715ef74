//! Sector authentication and block I/O against a MIFARE Classic 1K tag.
//!
//! [`Mifare`] is what the host's NFC stack provides: raw authentication and raw block
//! commands. [`TagSession`] wraps it with the derived sector keys, the authenticated-sector
//! cache and the guards that keep callers away from trailers and the vendor block; it hands
//! the result out as [`BlockIo`], which is all the record reader and writer need.

pub use self::format::FormatReport;
pub use self::options::{FormatOptions, FACTORY_KEYS, TAG_ACCESS_BITS};
pub use self::session::{SessionState, TagSession};

use crate::{cipher::Block, error::HardwareError, error::TransportError, keys::SectorKey};

mod format;
pub mod options;
mod session;

pub const SECTOR_COUNT: u8 = 16;
pub const BLOCKS_PER_SECTOR: u8 = 4;
pub const BLOCK_COUNT: u8 = SECTOR_COUNT * BLOCKS_PER_SECTOR;

/// Sector owning `block`.
pub const fn sector_of(block: u8) -> u8 {
	block / BLOCKS_PER_SECTOR
}

/// Trailer block (keys and access bits) of `sector`.
pub const fn trailer_of(sector: u8) -> u8 {
	sector * BLOCKS_PER_SECTOR + BLOCKS_PER_SECTOR - 1
}

pub const fn is_trailer(block: u8) -> bool {
	block % BLOCKS_PER_SECTOR == BLOCKS_PER_SECTOR - 1
}

/// Raw MIFARE Classic commands, as provided by the NFC stack.
///
/// Implementations report [`HardwareError::Lost`] once the tag has gone, and
/// [`HardwareError::Io`] for a failed command on a tag that is still present.
pub trait Mifare {
	/// Authenticate `sector` with key A.
	///
	/// `Ok(false)` means the tag rejected the key.
	fn authenticate_key_a(&mut self, sector: u8, key: &SectorKey) -> Result<bool, HardwareError>;

	/// Read a block of the currently authenticated sector.
	fn read_block(&mut self, block: u8) -> Result<Block, HardwareError>;

	/// Write a block of the currently authenticated sector.
	fn write_block(&mut self, block: u8, data: &Block) -> Result<(), HardwareError>;
}

impl<M: Mifare + ?Sized> Mifare for &mut M {
	fn authenticate_key_a(&mut self, sector: u8, key: &SectorKey) -> Result<bool, HardwareError> {
		(**self).authenticate_key_a(sector, key)
	}

	fn read_block(&mut self, block: u8) -> Result<Block, HardwareError> {
		(**self).read_block(block)
	}

	fn write_block(&mut self, block: u8, data: &Block) -> Result<(), HardwareError> {
		(**self).write_block(block, data)
	}
}

/// Guarded 16-byte block access, addressed by physical block number.
pub trait BlockIo {
	fn read_block(&mut self, block: u8) -> Result<Block, TransportError>;

	fn write_block(&mut self, block: u8, data: &Block) -> Result<(), TransportError>;
}

impl<T: BlockIo + ?Sized> BlockIo for &mut T {
	fn read_block(&mut self, block: u8) -> Result<Block, TransportError> {
		(**self).read_block(block)
	}

	fn write_block(&mut self, block: u8, data: &Block) -> Result<(), TransportError> {
		(**self).write_block(block, data)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn geometry() {
		assert_eq!(BLOCK_COUNT, 64);
		assert_eq!(trailer_of(0), 3);
		assert_eq!(trailer_of(15), 63);
		assert_eq!(sector_of(63), 15);
		assert_eq!(sector_of(8), 2);
		let trailers: Vec<u8> = (0..BLOCK_COUNT).filter(|&b| is_trailer(b)).collect();
		let expected: Vec<u8> = (0..SECTOR_COUNT).map(trailer_of).collect();
		assert_eq!(trailers, expected);
	}
}

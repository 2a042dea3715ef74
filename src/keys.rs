use md5::{Digest, Md5};

use crate::checksum::crc48;

/// A MIFARE Classic key A.
pub type SectorKey = [u8; 6];

/// The 4-byte unique id of a tag.
pub type Uid = [u8; 4];

/// Key A of the manufacturer sector, which is never derived.
pub const SECTOR_ZERO_KEY: SectorKey = [0x4b, 0x0b, 0x20, 0x10, 0x7c, 0xcb];

/// Constant suffix hashed into every block encryption key.
pub const BLOCK_KEY_SALT: &[u8; 53] = b" Copyright (C) 2010 Activision. All Rights Reserved. ";

/// Derive key A for a sector from the tag uid.
pub fn sector_key_a(sector: u8, uid: &Uid) -> SectorKey {
	if sector == 0 {
		return SECTOR_ZERO_KEY;
	}

	let crc = crc48(&[uid[0], uid[1], uid[2], uid[3], sector]);
	let mut key = [0; 6];
	key.copy_from_slice(&crc.to_le_bytes()[..6]);
	key
}

/// Derive the AES key for one physical block.
///
/// The key binds the full 32-byte identity header and the block's address, so any change to
/// the identity invalidates every encrypted block.
pub fn block_encryption_key(header: &[u8; 32], block: u8) -> [u8; 16] {
	let mut md = Md5::new();
	md.update(header);
	md.update([block]);
	md.update(BLOCK_KEY_SALT);
	md.finalize().into()
}

#[cfg(test)]
mod tests {
	use super::*;

	const UID: Uid = [0x12, 0x34, 0x56, 0x78];

	#[test]
	fn sector_keys_golden() {
		assert_eq!(hex::encode(sector_key_a(1, &UID)), "231550b9af28");
		assert_eq!(hex::encode(sector_key_a(2, &UID)), "057884ea78eb");
		assert_eq!(hex::encode(sector_key_a(15, &UID)), "2897eb5f19c6");
	}

	#[test]
	fn sector_zero_ignores_uid() {
		assert_eq!(sector_key_a(0, &UID), SECTOR_ZERO_KEY);
		assert_eq!(sector_key_a(0, &[0xff; 4]), SECTOR_ZERO_KEY);
	}

	#[test]
	fn sector_keys_are_deterministic() {
		for sector in 1..16 {
			assert_eq!(sector_key_a(sector, &UID), sector_key_a(sector, &UID));
			assert_ne!(sector_key_a(sector, &UID), sector_key_a(sector, &[0x87, 0x65, 0x43, 0x21]));
		}
	}

	#[test]
	fn block_key_golden() {
		let mut header = [0u8; 32];
		for (n, byte) in header.iter_mut().enumerate() {
			*byte = n as u8;
		}
		assert_eq!(
			hex::encode(block_encryption_key(&header, 8)),
			"c85e03ce047c487e2350e47fcdfe8032"
		);
		assert_ne!(block_encryption_key(&header, 8), block_encryption_key(&header, 9));
	}
}

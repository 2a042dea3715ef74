//! CRC primitives used by the tag format.

/// CRC-16 with polynomial 0x1021, initial value 0xFFFF, no reflection, no final xor.
///
/// Every integrity checksum on the tag (header and the four data checksums) uses this.
pub fn crc16(data: &[u8]) -> u16 {
	let mut crc: u16 = 0xffff;
	for &byte in data {
		crc ^= u16::from(byte) << 8;
		for _ in 0..8 {
			crc = if crc & 0x8000 != 0 {
				(crc << 1) ^ 0x1021
			} else {
				crc << 1
			};
		}
	}
	crc
}

const CRC48_POLY: u64 = 0x42f0_e1eb_a9ea_3693;
const CRC48_INIT: u64 = 2 * 2 * 3 * 1103 * 12_868_356_821;
const CRC48_MASK: u64 = 0x0000_ffff_ffff_ffff;

/// 48-bit CRC used only to derive sector keys.
///
/// Not an integrity check: the non-standard seed makes this a keyed mixing function.
pub fn crc48(data: &[u8]) -> u64 {
	let mut crc = CRC48_INIT;
	for &byte in data {
		crc ^= u64::from(byte) << 40;
		for _ in 0..8 {
			crc = if crc & 0x8000_0000_0000 != 0 {
				(crc << 1) ^ CRC48_POLY
			} else {
				crc << 1
			};
			crc &= CRC48_MASK;
		}
	}
	crc
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn crc16_golden() {
		assert_eq!(crc16(b""), 0xffff);
		assert_eq!(crc16(b"123456789"), 0x29b1);
	}

	#[test]
	fn crc48_golden() {
		assert_eq!(crc48(b""), 0x9ae9_0326_0cc4);
		assert_eq!(crc48(b"123456789"), 0xa3b8_3fbf_ad0a);
	}

	#[test]
	fn crc48_stays_in_48_bits() {
		for seed in 0..=255u8 {
			assert_eq!(crc48(&[seed, seed ^ 0x5a, 0xff]) & !CRC48_MASK, 0);
		}
	}
}

//! Per-block AES-128, one 16-byte block at a time, no chaining and no padding.

use aes::{
	cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit},
	Aes128,
};

use crate::keys::block_encryption_key;

/// One 16-byte MIFARE block.
pub type Block = [u8; 16];

/// Encrypt the plaintext of physical block `block` under the given identity header.
pub fn encrypt_block(header: &[u8; 32], block: u8, plain: &Block) -> Block {
	let key = block_encryption_key(header, block);
	let cipher = Aes128::new(GenericArray::from_slice(&key));
	let mut buf = GenericArray::clone_from_slice(plain);
	cipher.encrypt_block(&mut buf);
	let mut out = [0; 16];
	out.copy_from_slice(&buf);
	out
}

/// Decrypt the ciphertext of physical block `block` under the given identity header.
pub fn decrypt_block(header: &[u8; 32], block: u8, encrypted: &Block) -> Block {
	let key = block_encryption_key(header, block);
	let cipher = Aes128::new(GenericArray::from_slice(&key));
	let mut buf = GenericArray::clone_from_slice(encrypted);
	cipher.decrypt_block(&mut buf);
	let mut out = [0; 16];
	out.copy_from_slice(&buf);
	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn decrypt_inverts_encrypt() {
		let header = [0x42; 32];
		let plain: Block = *b"sixteen byte blk";
		let encrypted = encrypt_block(&header, 0x08, &plain);
		assert_ne!(encrypted, plain);
		assert_eq!(decrypt_block(&header, 0x08, &encrypted), plain);
	}

	#[test]
	fn key_is_bound_to_block_and_header() {
		let header = [0x42; 32];
		let plain = [0u8; 16];
		let at_8 = encrypt_block(&header, 0x08, &plain);
		assert_ne!(at_8, encrypt_block(&header, 0x09, &plain));

		let mut other = header;
		other[0x1f] ^= 1;
		assert_ne!(at_8, encrypt_block(&other, 0x08, &plain));
		assert_ne!(decrypt_block(&other, 0x08, &at_8), plain);
	}
}

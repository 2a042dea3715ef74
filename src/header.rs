use std::fmt;

use deku::{ctx::Endian, no_std_io, prelude::*};
use flagset::{flags, FlagSet};

use crate::{checksum::crc16, error::ChecksumError, keys::Uid};

/// Size of the identity header (blocks 0 and 1).
pub const IDENTITY_SIZE: usize = 0x20;

const CHECKED_SIZE: usize = 0x1e;

/// Which toy a tag is: blocks 0 and 1 of the tag, minus the trailing CRC16.
///
/// The CRC is never stored here; it is checked by [`Identity::decode`] and recomputed by
/// [`Identity::encode`].
#[derive(Debug, Clone, PartialEq, Eq, DekuRead, DekuWrite)]
#[deku(endian = "little")]
pub struct Identity {
	/// Block 0, owned by the tag vendor (uid, BCC, manufacturer data).
	///
	/// Copied through unmodified; on write it is always refreshed from the tag.
	pub vendor_block: [u8; 16], // 16 = 16

	/// Character/type id (24 bits).
	#[deku(
		reader = "crate::deku_helpers::reader_u24(deku::reader)",
		writer = "crate::deku_helpers::writer_u24(deku::writer, &self.toy_id)"
	)]
	pub toy_id: u32, // 3 = 19

	/// Error/status byte.
	pub error_byte: u8, // 1 = 20

	/// Id printed on the trading card sold with the toy.
	pub trading_card_id: u64, // 8 = 28

	/// Decoration code of the variant.
	pub deco: u8, // 1 = 29

	#[deku(
		reader = "Variant::deku_reader(deku::reader)",
		writer = "Variant::deku_writer(deku::writer, &self.variant)"
	)]
	pub variant: Variant, // 1 = 30
}

impl Identity {
	/// A virtual identity. The vendor block is filled in from the tag when written.
	pub fn new(toy_id: u32, variant: Variant) -> Self {
		Self {
			vendor_block: [0; 16],
			toy_id: toy_id & 0x00ff_ffff,
			error_byte: 0,
			trading_card_id: 0,
			deco: 0,
			variant,
		}
	}

	#[must_use]
	pub fn with_trading_card_id(mut self, trading_card_id: u64) -> Self {
		self.trading_card_id = trading_card_id;
		self
	}

	#[must_use]
	pub fn with_deco(mut self, deco: u8) -> Self {
		self.deco = deco;
		self
	}

	#[must_use]
	pub fn with_vendor_block(mut self, vendor_block: [u8; 16]) -> Self {
		self.vendor_block = vendor_block;
		self
	}

	/// The tag uid, as recorded in the vendor block.
	pub fn uid(&self) -> Uid {
		let mut uid = [0; 4];
		uid.copy_from_slice(&self.vendor_block[..4]);
		uid
	}

	/// Parse and check the 32-byte header.
	#[tracing::instrument(level = "trace", skip(bytes))]
	pub fn decode(bytes: &[u8; IDENTITY_SIZE]) -> Result<Self, ChecksumError> {
		let stored = u16::from_le_bytes([bytes[CHECKED_SIZE], bytes[CHECKED_SIZE + 1]]);
		let computed = crc16(&bytes[..CHECKED_SIZE]);
		if stored != computed {
			tracing::debug!(stored, computed, "identity checksum mismatch");
			return Err(ChecksumError::Identity { stored, computed });
		}

		let (_, identity) = Self::from_bytes((&bytes[..CHECKED_SIZE], 0))?;
		Ok(identity)
	}

	/// Serialise to the 32-byte header, computing the CRC.
	pub fn encode(&self) -> Result<[u8; IDENTITY_SIZE], ChecksumError> {
		let body = self.to_bytes()?;
		if body.len() != CHECKED_SIZE {
			return Err(ChecksumError::Layout(format!(
				"identity encoded to {} bytes",
				body.len()
			)));
		}

		let mut bytes = [0; IDENTITY_SIZE];
		bytes[..CHECKED_SIZE].copy_from_slice(&body);
		bytes[CHECKED_SIZE..].copy_from_slice(&crc16(&body).to_le_bytes());
		Ok(bytes)
	}
}

/// Parse and check a 32-byte identity header.
pub fn decode_identity(bytes: &[u8; IDENTITY_SIZE]) -> Result<Identity, ChecksumError> {
	Identity::decode(bytes)
}

/// Serialise an identity into the 32-byte header.
pub fn encode_identity(identity: &Identity) -> Result<[u8; IDENTITY_SIZE], ChecksumError> {
	identity.encode()
}

/// Game generation a toy was released for, from the low nibble of the variant byte.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Game {
	SpyrosAdventure = 0,
	Giants = 1,
	SwapForce = 2,
	TrapTeam = 3,
	Superchargers = 4,
	Imaginators = 5,
}

impl Game {
	pub fn from_code(code: u8) -> Option<Self> {
		Some(match code {
			0 => Self::SpyrosAdventure,
			1 => Self::Giants,
			2 => Self::SwapForce,
			3 => Self::TrapTeam,
			4 => Self::Superchargers,
			5 => Self::Imaginators,
			_ => return None,
		})
	}
}

impl fmt::Display for Game {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::SpyrosAdventure => "Spyro's Adventure",
			Self::Giants => "Giants",
			Self::SwapForce => "Swap Force",
			Self::TrapTeam => "Trap Team",
			Self::Superchargers => "Superchargers",
			Self::Imaginators => "Imaginators",
		})
	}
}

flags! {
	/// Variant flags in the high nibble of the variant byte.
	pub enum VariantFlag: u8 {
		Supercharger  = 0b0001_0000,
		LightCore     = 0b0010_0000,
		InGameVariant = 0b0100_0000,
		Reposed       = 0b1000_0000,
	}
}

/// The packed variant byte at header offset 0x1d.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Variant {
	/// Low nibble; see [`Variant::game`].
	pub year_code: u8,
	pub flags: FlagSet<VariantFlag>,
}

impl Variant {
	pub fn new(game: Game, flags: impl Into<FlagSet<VariantFlag>>) -> Self {
		Self {
			year_code: game as u8,
			flags: flags.into(),
		}
	}

	pub fn from_byte(byte: u8) -> Self {
		Self {
			year_code: byte & 0x0f,
			flags: FlagSet::new_truncated(byte),
		}
	}

	pub fn to_byte(self) -> u8 {
		(self.year_code & 0x0f) | self.flags.bits()
	}

	/// `None` for year codes past the last known game.
	pub fn game(self) -> Option<Game> {
		Game::from_code(self.year_code)
	}

	fn deku_reader<R: no_std_io::Read + no_std_io::Seek>(
		reader: &mut Reader<R>,
	) -> Result<Self, DekuError> {
		let value = u8::from_reader_with_ctx(reader, Endian::Little)?;
		Ok(Self::from_byte(value))
	}

	fn deku_writer<W: std::io::Write + std::io::Seek>(
		writer: &mut Writer<W>,
		field: &Self,
	) -> Result<(), DekuError> {
		field.to_byte().to_writer(writer, Endian::Little)
	}
}

#[cfg(test)]
mod tests {
	use proptest::prelude::*;

	use super::*;

	const HEADER_DATA: [u8; IDENTITY_SIZE] = [
		0x12, 0x34, 0x56, 0x78, 0x08, 0x81, 0x01, 0x0f, 0xc4, 0x0b, 0x18, 0x00, 0x00, 0x00, 0x00,
		0x12, 0x1c, 0x00, 0x00, 0x00, 0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01, 0x00, 0x13,
		0xe2, 0xf6,
	];

	fn expected() -> Identity {
		Identity {
			vendor_block: [
				0x12, 0x34, 0x56, 0x78, 0x08, 0x81, 0x01, 0x0f, 0xc4, 0x0b, 0x18, 0x00, 0x00, 0x00,
				0x00, 0x12,
			],
			toy_id: 0x1c,
			error_byte: 0,
			trading_card_id: 0x0102_0304_0506_0708,
			deco: 0,
			variant: Variant::new(Game::TrapTeam, VariantFlag::Supercharger),
		}
	}

	#[test]
	fn test_header_parse() {
		let identity = decode_identity(&HEADER_DATA).unwrap();
		assert_eq!(identity, expected());
		assert_eq!(identity.uid(), [0x12, 0x34, 0x56, 0x78]);
		assert_eq!(identity.variant.game(), Some(Game::TrapTeam));
	}

	#[test]
	fn test_header_encode() {
		assert_eq!(encode_identity(&expected()).unwrap(), HEADER_DATA);
	}

	#[test]
	fn bad_checksum_is_rejected() {
		let mut bytes = HEADER_DATA;
		bytes[0x14] ^= 0x80;
		assert!(matches!(
			decode_identity(&bytes),
			Err(ChecksumError::Identity { stored: 0xf6e2, .. })
		));
	}

	#[test]
	fn variant_byte() {
		for byte in [0x00, 0x13, 0xf5, 0x2f, 0xff] {
			assert_eq!(Variant::from_byte(byte).to_byte(), byte);
		}
		let variant = Variant::from_byte(0xa7);
		assert_eq!(variant.game(), None);
		assert_eq!(variant.flags, VariantFlag::Reposed | VariantFlag::LightCore);
	}

	#[test]
	fn new_identity_masks_toy_id() {
		let identity = Identity::new(0x0123_4567, Variant::default());
		assert_eq!(identity.toy_id, 0x23_4567);
		let bytes = identity.encode().unwrap();
		assert_eq!(&bytes[0x10..0x13], &[0x67, 0x45, 0x23]);
		assert_eq!(decode_identity(&bytes).unwrap(), identity);
	}

	fn identity() -> impl Strategy<Value = Identity> {
		(
			any::<[u8; 16]>(),
			0..=0x00ff_ffffu32,
			any::<u8>(),
			any::<u64>(),
			any::<u8>(),
			any::<u8>(),
		)
			.prop_map(
				|(vendor_block, toy_id, error_byte, trading_card_id, deco, variant)| Identity {
					vendor_block,
					toy_id,
					error_byte,
					trading_card_id,
					deco,
					variant: Variant::from_byte(variant),
				},
			)
	}

	proptest! {
		#[test]
		fn decode_reverses_encode(identity in identity()) {
			let bytes = encode_identity(&identity).unwrap();
			prop_assert_eq!(decode_identity(&bytes), Ok(identity));
		}

		#[test]
		fn encode_reverses_decode(body in any::<[u8; CHECKED_SIZE]>()) {
			let mut bytes = [0; IDENTITY_SIZE];
			bytes[..CHECKED_SIZE].copy_from_slice(&body);
			bytes[CHECKED_SIZE..].copy_from_slice(&crc16(&body).to_le_bytes());
			let identity = decode_identity(&bytes).unwrap();
			prop_assert_eq!(encode_identity(&identity).unwrap(), bytes);
		}
	}
}

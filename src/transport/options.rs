use crate::keys::SectorKey;

/// Well-known factory keys, tried in this order on sectors the derived key does not open.
pub const FACTORY_KEYS: [SectorKey; 4] = [
	[0xff, 0xff, 0xff, 0xff, 0xff, 0xff],
	[0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
	// NFC Forum
	[0xd3, 0xf7, 0xd3, 0xf7, 0xd3, 0xf7],
	// MIFARE Application Directory
	[0xa0, 0xa1, 0xa2, 0xa3, 0xa4, 0xa5],
];

/// Access conditions installed on every sector but 0: key A reads and writes the data blocks,
/// and the keys and access bits are frozen.
pub const TAG_ACCESS_BITS: [u8; 4] = [0x7f, 0x0f, 0x08, 0x69];

/// Options used when provisioning a blank tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatOptions {
	/// Keys tried, in order, on sectors the derived key does not open.
	///
	/// Defaults to [`FACTORY_KEYS`].
	pub fallback_keys: Vec<SectorKey>,

	/// Access bits (trailer bytes 6..10) installed on sectors 1..16.
	///
	/// Sector 0 keeps whatever the vendor set. Defaults to [`TAG_ACCESS_BITS`].
	pub access_bits: [u8; 4],
}

impl Default for FormatOptions {
	fn default() -> Self {
		Self {
			fallback_keys: FACTORY_KEYS.to_vec(),
			access_bits: TAG_ACCESS_BITS,
		}
	}
}

impl FormatOptions {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_fallback_keys(mut self, fallback_keys: impl IntoIterator<Item = SectorKey>) -> Self {
		self.fallback_keys = fallback_keys.into_iter().collect();
		self
	}

	pub fn with_access_bits(mut self, access_bits: [u8; 4]) -> Self {
		self.access_bits = access_bits;
		self
	}
}

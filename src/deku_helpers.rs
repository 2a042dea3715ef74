use deku::{ctx::Endian, no_std_io, prelude::*};

/// Characters that fit in the interleaved nickname field.
pub const NICKNAME_CHARS: usize = 14;
const NICKNAME_FIELD: usize = 0x20;

pub fn reader_u24<R: no_std_io::Read + no_std_io::Seek>(
	reader: &mut Reader<R>,
) -> Result<u32, DekuError> {
	let [a, b, c] = <[u8; 3]>::from_reader_with_ctx(reader, Endian::Little)?;
	Ok(u32::from_le_bytes([a, b, c, 0]))
}

/// Writes the low 24 bits; anything above is dropped.
pub fn writer_u24<W: std::io::Write + std::io::Seek>(
	writer: &mut Writer<W>,
	field: &u32,
) -> Result<(), DekuError> {
	let [a, b, c, _] = field.to_le_bytes();
	[a, b, c].to_writer(writer, Endian::Little)
}

/// Nickname: Latin-1 characters on the even bytes of a 32-byte field, zero-terminated.
pub fn reader_nickname<R: no_std_io::Read + no_std_io::Seek>(
	reader: &mut Reader<R>,
) -> Result<String, DekuError> {
	let field = <[u8; NICKNAME_FIELD]>::from_reader_with_ctx(reader, Endian::Little)?;
	Ok(field
		.iter()
		.step_by(2)
		.take(NICKNAME_CHARS)
		.take_while(|&&byte| byte != 0)
		.map(|&byte| char::from(byte))
		.collect())
}

/// Characters past [`NICKNAME_CHARS`] are dropped, and characters outside Latin-1 become `?`.
pub fn writer_nickname<W: std::io::Write + std::io::Seek>(
	writer: &mut Writer<W>,
	field: &str,
) -> Result<(), DekuError> {
	let mut bytes = [0u8; NICKNAME_FIELD];
	for (n, c) in field.chars().take(NICKNAME_CHARS).enumerate() {
		bytes[n * 2] = latin1(c);
	}
	bytes.to_writer(writer, Endian::Little)
}

pub(crate) fn latin1(c: char) -> u8 {
	u8::try_from(u32::from(c)).unwrap_or(b'?')
}

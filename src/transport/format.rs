use super::{trailer_of, FormatOptions, Mifare, TagSession, SECTOR_COUNT};
use crate::{
	error::{FormatError, TransportError},
	keys::{sector_key_a, SectorKey},
};

/// What a format pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatReport {
	/// Sectors whose trailer was rewritten, in order.
	pub rekeyed: Vec<u8>,
}

impl FormatReport {
	/// Whether the tag was already fully provisioned.
	pub fn was_provisioned(&self) -> bool {
		self.rekeyed.is_empty()
	}
}

/// A sector that needs its trailer rewritten, and the key that currently opens it.
#[derive(Debug, Clone, Copy)]
struct Pending {
	sector: u8,
	key: SectorKey,
}

fn fatal(err: &TransportError) -> Option<FormatError> {
	match err {
		TransportError::NotConnected => Some(FormatError::NotConnected),
		TransportError::ConnectionLost => Some(FormatError::ConnectionLost),
		_ => None,
	}
}

impl<M: Mifare> TagSession<M> {
	/// Provision a tag: install the derived key A on every sector, and the tag access bits on
	/// every sector but 0.
	///
	/// Sectors the derived key already opens, with the right access bits, are left alone, so
	/// running this on a provisioned tag writes nothing. Sectors rewritten before a failure stay
	/// rewritten.
	#[tracing::instrument(level = "debug", skip(self, options))]
	pub fn format_blank_tag(&mut self, options: &FormatOptions) -> Result<FormatReport, FormatError> {
		let uid = self.uid().ok_or(FormatError::NotConnected)?;

		// find a working key for every sector before touching anything
		let mut pending = Vec::new();
		for sector in 0..SECTOR_COUNT {
			let derived = sector_key_a(sector, &uid);
			if self.try_key(sector, &derived)? {
				if sector != 0 && self.access_bits(sector)? != options.access_bits {
					tracing::debug!(sector, "access bits differ");
					pending.push(Pending {
						sector,
						key: derived,
					});
				}
				continue;
			}

			let mut found = None;
			for key in &options.fallback_keys {
				if self.try_key(sector, key)? {
					found = Some(*key);
					break;
				}
			}
			let key = found.ok_or(FormatError::NoKey { sector })?;
			tracing::debug!(sector, key = %hex::encode(key), "opened with fallback key");
			pending.push(Pending { sector, key });
		}

		// confirm the keys still work right before changing anything
		for &Pending { sector, key } in &pending {
			self.forget_authentication();
			self.authenticate_sector(sector, Some(&key))
				.map_err(|err| fatal(&err).unwrap_or(FormatError::SectorChanged { sector }))?;
		}

		let mut report = FormatReport::default();
		for &Pending { sector, key } in &pending {
			self.rekey(sector, &key, &sector_key_a(sector, &uid), options)
				.map_err(|err| {
					fatal(&err).unwrap_or_else(|| FormatError::Rekey {
						sector,
						reason: err.to_string(),
					})
				})?;
			report.rekeyed.push(sector);
		}

		tracing::info!(rekeyed = report.rekeyed.len(), "tag formatted");
		Ok(report)
	}

	fn try_key(&mut self, sector: u8, key: &SectorKey) -> Result<bool, FormatError> {
		self.forget_authentication();
		match self.authenticate_sector(sector, Some(key)) {
			Ok(()) => Ok(true),
			Err(err) => match fatal(&err) {
				Some(fatal) => Err(fatal),
				None => Ok(false),
			},
		}
	}

	fn access_bits(&mut self, sector: u8) -> Result<[u8; 4], FormatError> {
		let trailer = self.read_raw(trailer_of(sector)).map_err(|err| {
			fatal(&err).unwrap_or_else(|| FormatError::Rekey {
				sector,
				reason: err.to_string(),
			})
		})?;
		let mut bits = [0; 4];
		bits.copy_from_slice(&trailer[6..10]);
		Ok(bits)
	}

	fn rekey(
		&mut self,
		sector: u8,
		current: &SectorKey,
		derived: &SectorKey,
		options: &FormatOptions,
	) -> Result<(), TransportError> {
		self.forget_authentication();
		self.authenticate_sector(sector, Some(current))?;
		let block = trailer_of(sector);
		let mut trailer = self.read_raw(block)?;
		trailer[..6].copy_from_slice(derived);
		if sector != 0 {
			trailer[6..10].copy_from_slice(&options.access_bits);
		}
		tracing::debug!(sector, "rewriting trailer");
		self.write_raw(block, &trailer)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		error::HardwareError,
		impls::{MemoryTag, Op},
		keys::Uid,
		transport::TAG_ACCESS_BITS,
	};

	const UID: Uid = [0x12, 0x34, 0x56, 0x78];

	fn format(tag: MemoryTag) -> (Result<FormatReport, FormatError>, MemoryTag) {
		let mut session = TagSession::new(tag);
		session.connect(UID);
		let result = session.format_blank_tag(&FormatOptions::new());
		(result, session.into_inner())
	}

	#[test]
	fn formats_a_blank_tag() {
		let (result, tag) = format(MemoryTag::blank(UID));
		assert_eq!(result.unwrap().rekeyed, (0..16).collect::<Vec<u8>>());
		assert_eq!(tag.trailer_writes(), 16);

		for sector in 0..16 {
			let trailer = tag.dump().block(trailer_of(sector));
			assert_eq!(&trailer[..6], &sector_key_a(sector, &UID));
			if sector == 0 {
				assert_eq!(&trailer[6..10], &[0xff, 0x07, 0x80, 0x69]);
			} else {
				assert_eq!(&trailer[6..10], &TAG_ACCESS_BITS);
			}
		}
	}

	#[test]
	fn second_format_writes_nothing() {
		let (result, tag) = format(MemoryTag::blank(UID));
		assert!(!result.unwrap().was_provisioned());

		let (result, tag) = format(tag.with_ops_cleared());
		assert!(result.unwrap().was_provisioned());
		assert_eq!(tag.trailer_writes(), 0);
		assert!(!tag.ops().iter().any(|op| matches!(op, Op::Write { .. })));
	}

	#[test]
	fn wrong_access_bits_are_fixed() {
		let mut tag = MemoryTag::formatted(UID);
		tag.set_access_bits(5, [0xff, 0x07, 0x80, 0x69]);
		let (result, tag) = format(tag);
		assert_eq!(result.unwrap().rekeyed, [5]);
		assert_eq!(&tag.dump().block(trailer_of(5))[6..10], &TAG_ACCESS_BITS);
	}

	#[test]
	fn unknown_key_fails_before_writing() {
		let mut tag = MemoryTag::blank(UID);
		tag.set_key_a(9, [1, 2, 3, 4, 5, 6]);
		let (result, tag) = format(tag);
		assert_eq!(result, Err(FormatError::NoKey { sector: 9 }));
		assert_eq!(tag.trailer_writes(), 0);
	}

	#[test]
	fn fallback_keys_are_tried_in_order() {
		let mut tag = MemoryTag::blank(UID);
		tag.set_key_a(3, [0xa0, 0xa1, 0xa2, 0xa3, 0xa4, 0xa5]);
		let (result, tag) = format(tag);
		assert!(result.is_ok());
		let tried: Vec<SectorKey> = tag
			.ops()
			.iter()
			.filter_map(|op| match op {
				Op::Authenticate { sector: 3, key, .. } => Some(*key),
				_ => None,
			})
			.collect();
		assert_eq!(
			&tried[..5],
			&[
				sector_key_a(3, &UID),
				[0xff; 6],
				[0x00; 6],
				[0xd3, 0xf7, 0xd3, 0xf7, 0xd3, 0xf7],
				[0xa0, 0xa1, 0xa2, 0xa3, 0xa4, 0xa5],
			]
		);
	}

	#[test]
	fn lost_tag_aborts() {
		let mut tag = MemoryTag::blank(UID);
		tag.fail_next(HardwareError::Lost);
		let (result, tag) = format(tag);
		assert_eq!(result, Err(FormatError::ConnectionLost));
		assert_eq!(tag.trailer_writes(), 0);
	}

	// On a blank tag, the key search takes two commands per sector (derived key, then the factory
	// key) and the re-check one more, so rekeying starts after 48 commands.
	const KEYS_CHECKED: usize = 48;

	#[test]
	fn sector_changed_between_passes() {
		let mut tag = MemoryTag::blank(UID);
		tag.fail_after(32 + 4, HardwareError::Io("auth timeout".into()));
		let (result, tag) = format(tag);
		assert_eq!(result, Err(FormatError::SectorChanged { sector: 4 }));
		assert_eq!(tag.trailer_writes(), 0);
	}

	#[test]
	fn failed_rekey_keeps_earlier_sectors() {
		let mut tag = MemoryTag::blank(UID);
		// authenticate, read and write sectors 0 and 1, then authenticate and read sector 2
		tag.fail_after(KEYS_CHECKED + 3 * 2 + 2, HardwareError::Io("write failed".into()));
		let (result, tag) = format(tag);
		assert!(matches!(result, Err(FormatError::Rekey { sector: 2, .. })));
		assert_eq!(tag.trailer_writes(), 2);
		assert_eq!(&tag.dump().block(trailer_of(0))[..6], &sector_key_a(0, &UID));
		assert_eq!(&tag.dump().block(trailer_of(1))[..6], &sector_key_a(1, &UID));
		assert_eq!(&tag.dump().block(trailer_of(1))[6..10], &TAG_ACCESS_BITS);
		assert_eq!(&tag.dump().block(trailer_of(2))[..6], &[0xff; 6]);
	}

	#[test]
	fn lost_while_rekeying() {
		let mut tag = MemoryTag::blank(UID);
		tag.pull_after(KEYS_CHECKED + 3 * 2 + 1);
		let (result, tag) = format(tag);
		assert_eq!(result, Err(FormatError::ConnectionLost));
		assert_eq!(tag.trailer_writes(), 2);
		assert_eq!(&tag.dump().block(trailer_of(1))[..6], &sector_key_a(1, &UID));
	}

	#[test]
	fn needs_a_tag() {
		let mut session = TagSession::new(MemoryTag::blank(UID));
		assert_eq!(
			session.format_blank_tag(&FormatOptions::new()),
			Err(FormatError::NotConnected)
		);
	}
}

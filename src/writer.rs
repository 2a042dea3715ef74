use self::options::WriteOptions;
use crate::{
	cipher::{encrypt_block, Block},
	error::{TransportError, WriteError, WriteStage},
	header::{Identity, IDENTITY_SIZE},
	reader::{read_plain, PART2_INDEX},
	record::{part1_sequence, part2_sequence, DataRecord},
	sequence::{stale_region, AreaSequence, Region},
	transport::BlockIo,
};

pub mod options;

/// Where each copy of a part goes, and with which sequence.
type Targets = Vec<(Region, AreaSequence)>;

fn identity_stage(source: TransportError) -> WriteError {
	WriteError::Transport {
		stage: WriteStage::WritingIdentity,
		source,
	}
}

fn data_stage(source: TransportError) -> WriteError {
	WriteError::Transport {
		stage: WriteStage::WritingData,
		source,
	}
}

/// Encrypt and write `bytes` to consecutive logical blocks of a region, starting at `first`.
fn write_part<T: BlockIo + ?Sized>(
	io: &mut T,
	header: &[u8; IDENTITY_SIZE],
	region: Region,
	first: u8,
	bytes: &[u8],
) -> Result<(), TransportError> {
	for (n, chunk) in (first..).zip(bytes.chunks_exact(16)) {
		let block = region.block(n);
		let mut plain: Block = [0; 16];
		plain.copy_from_slice(chunk);
		io.write_block(block, &encrypt_block(header, block, &plain))?;
	}
	Ok(())
}

/// Writes records to tags through a [`BlockIo`].
pub struct TagWriter<T> {
	options: WriteOptions,
	io: T,
}

impl<T> std::fmt::Debug for TagWriter<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TagWriter")
			.field("options", &self.options)
			.field("io", &std::any::type_name::<T>())
			.finish()
	}
}

impl<T> TagWriter<T>
where
	T: BlockIo,
{
	pub fn new(io: T) -> Self {
		Self::with_options(io, WriteOptions::default())
	}

	pub fn with_options(io: T, options: WriteOptions) -> Self {
		Self { options, io }
	}

	pub fn into_inner(self) -> T {
		self.io
	}

	/// Write `record` under `identity`.
	///
	/// The vendor block always comes from the tag. If the resulting header differs from the
	/// tag's, the write is refused unless [`WriteOptions::rewrite_identity`] is set, in which
	/// case the header is rewritten and both regions are re-encrypted from scratch: region A
	/// with sequence 1, region B with sequence 0.
	///
	/// Otherwise each part goes only to its stale region, with the next sequence, so an
	/// interrupted write leaves the previous copy intact.
	#[tracing::instrument(level = "debug", skip(self, identity, record))]
	pub fn write_record(&mut self, identity: &Identity, record: &DataRecord) -> Result<(), WriteError> {
		let vendor_block = self.io.read_block(0).map_err(identity_stage)?;
		let header = identity
			.clone()
			.with_vendor_block(vendor_block)
			.encode()
			.map_err(|source| WriteError::Encode {
				stage: WriteStage::WritingIdentity,
				source,
			})?;

		let mut block1 = [0; 16];
		block1.copy_from_slice(&header[16..]);
		let on_tag = self.io.read_block(1).map_err(identity_stage)?;

		let (part1_target, part2_target) = if on_tag == block1 {
			self.stale_regions(&header)?
		} else if self.options.rewrite_identity {
			tracing::info!("rewriting identity");
			self.io.write_block(1, &block1).map_err(identity_stage)?;
			let fresh = vec![(Region::A, AreaSequence(1)), (Region::B, AreaSequence(0))];
			(fresh.clone(), fresh)
		} else {
			tracing::warn!("identity on tag does not match");
			return Err(WriteError::IdentityMismatch);
		};

		let encode = |source| WriteError::Encode {
			stage: WriteStage::WritingData,
			source,
		};
		for (region, sequence) in part1_target {
			let part1 = record.encode_part1(sequence).map_err(encode)?;
			tracing::debug!(%region, sequence = sequence.0, "writing part 1");
			write_part(&mut self.io, &header, region, 0, &part1).map_err(data_stage)?;
		}
		for (region, sequence) in part2_target {
			let Some(part2) = record.encode_part2(sequence).map_err(encode)? else {
				break;
			};
			tracing::debug!(%region, sequence = sequence.0, "writing part 2");
			write_part(&mut self.io, &header, region, PART2_INDEX, &part2).map_err(data_stage)?;
		}

		Ok(())
	}

	/// Region and sequence to write each part to, from the sequences currently on the tag.
	///
	/// The sequences are taken as they decrypt, without checking the rest of the region.
	fn stale_regions(
		&mut self,
		header: &[u8; IDENTITY_SIZE],
	) -> Result<(Targets, Targets), WriteError> {
		let mut read = |region, index| read_plain(&mut self.io, header, region, index).map_err(data_stage);
		let part1_a = part1_sequence(&read(Region::A, 0)?);
		let part1_b = part1_sequence(&read(Region::B, 0)?);
		let part2_a = part2_sequence(&read(Region::A, PART2_INDEX)?);
		let part2_b = part2_sequence(&read(Region::B, PART2_INDEX)?);
		tracing::trace!(
			part1_a = part1_a.0,
			part1_b = part1_b.0,
			part2_a = part2_a.0,
			part2_b = part2_b.0,
			"sequences on tag"
		);

		Ok((
			vec![stale_region(part1_a, part1_b)],
			vec![stale_region(part2_a, part2_b)],
		))
	}
}

/// Write `record` under `identity`.
///
/// See [`TagWriter::write_record`].
pub fn write_record<T: BlockIo + ?Sized>(
	io: &mut T,
	identity: &Identity,
	record: &DataRecord,
	options: &WriteOptions,
) -> Result<(), WriteError> {
	TagWriter::with_options(io, options.clone()).write_record(identity, record)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		error::HardwareError,
		header::{Game, Variant, VariantFlag},
		impls::{MemoryTag, Op},
		keys::Uid,
		reader::{read_record, Part2Status, RecordSource},
		record::tests::sample,
		transport::TagSession,
	};

	const UID: Uid = [0x12, 0x34, 0x56, 0x78];

	fn identity() -> Identity {
		Identity::new(0x1c, Variant::new(Game::TrapTeam, VariantFlag::Supercharger))
	}

	fn rewrite() -> WriteOptions {
		WriteOptions::new().with_rewrite_identity(true)
	}

	fn session(tag: &mut MemoryTag) -> TagSession<&mut MemoryTag> {
		let mut session = TagSession::new(tag);
		session.connect(UID);
		session
	}

	/// A provisioned tag carrying `identity()` and the sample record.
	fn labelled_tag() -> MemoryTag {
		let mut tag = MemoryTag::formatted(UID);
		write_record(&mut session(&mut tag), &identity(), &sample(), &rewrite()).unwrap();
		tag.with_ops_cleared()
	}

	fn region_blocks(tag: &MemoryTag, region: Region) -> Vec<Block> {
		(0..11).map(|n| tag.dump().block(region.block(n))).collect()
	}

	#[test]
	fn relabel_writes_both_regions() {
		let mut tag = MemoryTag::formatted(UID);
		write_record(&mut session(&mut tag), &identity(), &sample(), &rewrite()).unwrap();

		let written: Vec<u8> = tag.writes().collect();
		assert_eq!(written[0], 1);
		assert_eq!(written.len(), 1 + 2 * 11);

		let contents = read_record(&mut session(&mut tag)).unwrap();
		assert_eq!(contents.identity, identity().with_vendor_block(tag.dump().block(0)));
		assert_eq!(contents.record, Some(sample()));
		assert_eq!(
			contents.source,
			RecordSource {
				part1: Some(Region::A),
				part2: Part2Status::Selected(Region::A),
			}
		);
	}

	#[test]
	fn mismatched_identity_writes_nothing() {
		let mut tag = labelled_tag();
		let other = Identity::new(0x1d, Variant::new(Game::TrapTeam, VariantFlag::Supercharger));
		let result = write_record(&mut session(&mut tag), &other, &sample(), &WriteOptions::new());
		assert_eq!(result, Err(WriteError::IdentityMismatch));
		assert_eq!(result.unwrap_err().stage(), WriteStage::WritingIdentity);
		assert_eq!(tag.data_writes(), 0);
		assert_eq!(tag.trailer_writes(), 0);
	}

	#[test]
	fn updates_ping_pong() {
		let mut tag = labelled_tag();
		let before_a = region_blocks(&tag, Region::A);

		let second = sample().with_money(2);
		write_record(&mut session(&mut tag), &identity(), &second, &WriteOptions::new()).unwrap();
		assert_eq!(region_blocks(&tag, Region::A), before_a);
		assert!(tag.writes().all(|block| (0x24..0x32).contains(&block)));
		let contents = read_record(&mut session(&mut tag)).unwrap();
		assert_eq!(contents.source.part1, Some(Region::B));
		assert_eq!(contents.record, Some(second));

		let tag = &mut tag.with_ops_cleared();
		let before_b = region_blocks(tag, Region::B);
		let third = sample().with_money(3);
		write_record(&mut session(tag), &identity(), &third, &WriteOptions::new()).unwrap();
		assert_eq!(region_blocks(tag, Region::B), before_b);
		let contents = read_record(&mut session(tag)).unwrap();
		assert_eq!(contents.source.part1, Some(Region::A));
		assert_eq!(contents.record, Some(third));
	}

	#[test]
	fn interrupted_write_keeps_previous_copy() {
		let mut tag = labelled_tag();
		// eleven commands for the header and sequences, then the first two blocks of region B
		tag.pull_after(14);
		let update = sample().with_money(9).with_nickname("Cynder");
		let result = write_record(&mut session(&mut tag), &identity(), &update, &WriteOptions::new());
		assert_eq!(
			result,
			Err(WriteError::Transport {
				stage: WriteStage::WritingData,
				source: TransportError::ConnectionLost,
			})
		);

		assert_eq!(tag.data_writes(), 2);

		tag.present();
		let contents = read_record(&mut session(&mut tag)).unwrap();
		assert_eq!(contents.source.part1, Some(Region::A));
		assert_eq!(contents.record, Some(sample()));
	}

	#[test]
	fn record_without_extension_leaves_part2_alone() {
		let mut tag = labelled_tag();
		let plain = sample().with_extension(None);
		write_record(&mut session(&mut tag), &identity(), &plain, &WriteOptions::new()).unwrap();
		assert_eq!(tag.data_writes(), 7);

		let contents = read_record(&mut session(&mut tag)).unwrap();
		assert_eq!(contents.source.part2, Part2Status::NotPresent);
		assert_eq!(contents.record.unwrap().extension, None);
	}

	#[test]
	fn failed_identity_read() {
		let mut tag = labelled_tag();
		tag.fail_next(HardwareError::Io("timeout".into()));
		let err = write_record(&mut session(&mut tag), &identity(), &sample(), &WriteOptions::new())
			.unwrap_err();
		assert_eq!(err.stage(), WriteStage::WritingIdentity);
		assert!(!tag.ops().iter().any(|op| matches!(op, Op::Write { .. })));
	}
}

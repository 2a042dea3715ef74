use crate::{
	cipher::{decrypt_block, Block},
	error::{ReadError, TransportError},
	header::{Identity, IDENTITY_SIZE},
	record::{has_part2, validate_part1, validate_part2, DataRecord, PART1_SIZE, PART2_SIZE},
	sequence::{select, Part, Region, Selection},
	transport::BlockIo,
};

/// Data blocks in each region: seven for part 1, then four for part 2.
pub const REGION_BLOCKS: u8 = 11;

/// Logical index of the first part 2 block within a region.
pub const PART2_INDEX: u8 = 7;

/// Everything read from a tag in one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagContents {
	pub identity: Identity,

	/// `None` when neither region holds a valid part 1.
	pub record: Option<DataRecord>,
	pub source: RecordSource,
}

impl TagContents {
	pub fn into_parts(self) -> (Identity, Option<DataRecord>) {
		(self.identity, self.record)
	}
}

/// Which copies the record was assembled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSource {
	pub part1: Option<Region>,
	pub part2: Part2Status,
}

/// What became of part 2 while reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Part2Status {
	/// Part 1 does not use part 2 (or there is no part 1).
	NotPresent,

	/// Part 2 came from this region.
	Selected(Region),

	/// Part 1 flags part 2, but neither copy is valid.
	Missing,

	/// Both copies are valid but their sequences are not one apart; part 2 was left out.
	Ambiguous { a: u8, b: u8 },
}

/// One decrypted region.
#[derive(Clone)]
pub(crate) struct RegionImage {
	pub part1: [u8; PART1_SIZE],
	pub part2: [u8; PART2_SIZE],
}

/// Read the identity header (blocks 0 and 1) as stored.
pub fn read_header<T: BlockIo + ?Sized>(io: &mut T) -> Result<[u8; IDENTITY_SIZE], TransportError> {
	let mut header = [0; IDENTITY_SIZE];
	header[..16].copy_from_slice(&io.read_block(0)?);
	header[16..].copy_from_slice(&io.read_block(1)?);
	Ok(header)
}

/// Read and decrypt logical block `index` of a region.
pub(crate) fn read_plain<T: BlockIo + ?Sized>(
	io: &mut T,
	header: &[u8; IDENTITY_SIZE],
	region: Region,
	index: u8,
) -> Result<Block, TransportError> {
	let block = region.block(index);
	Ok(decrypt_block(header, block, &io.read_block(block)?))
}

#[tracing::instrument(level = "trace", skip(io, header))]
pub(crate) fn read_region<T: BlockIo + ?Sized>(
	io: &mut T,
	header: &[u8; IDENTITY_SIZE],
	region: Region,
) -> Result<RegionImage, TransportError> {
	let mut data = [0; PART1_SIZE + PART2_SIZE];
	for index in 0..REGION_BLOCKS {
		let at = usize::from(index) * 16;
		data[at..at + 16].copy_from_slice(&read_plain(io, header, region, index)?);
	}

	let mut image = RegionImage {
		part1: [0; PART1_SIZE],
		part2: [0; PART2_SIZE],
	};
	image.part1.copy_from_slice(&data[..PART1_SIZE]);
	image.part2.copy_from_slice(&data[PART1_SIZE..]);
	Ok(image)
}

fn pick<'a>(a: &'a RegionImage, b: &'a RegionImage, region: Region) -> &'a RegionImage {
	match region {
		Region::A => a,
		Region::B => b,
	}
}

/// Reads tags through a [`BlockIo`].
pub struct TagReader<T> {
	io: T,
}

impl<T> std::fmt::Debug for TagReader<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TagReader")
			.field("io", &std::any::type_name::<T>())
			.finish()
	}
}

impl<T> TagReader<T>
where
	T: BlockIo,
{
	pub fn new(io: T) -> Self {
		Self { io }
	}

	pub fn into_inner(self) -> T {
		self.io
	}

	/// Read the identity and the freshest valid copy of the record.
	///
	/// A region whose checksums fail is ignored; if both do, the record is absent. Both
	/// regions valid with sequences not exactly one apart is an error for part 1. For part 2 it
	/// only leaves part 2 out, see [`Part2Status::Ambiguous`].
	#[tracing::instrument(level = "debug", skip(self))]
	pub fn read_record(&mut self) -> Result<TagContents, ReadError> {
		let header = read_header(&mut self.io)?;
		let identity = Identity::decode(&header)?;

		let a = read_region(&mut self.io, &header, Region::A)?;
		let b = read_region(&mut self.io, &header, Region::B)?;

		let part1 = match select(validate_part1(&a.part1).ok(), validate_part1(&b.part1).ok()) {
			Selection::Region(region) => region,
			Selection::Absent => {
				tracing::warn!("no valid copy of the record");
				return Ok(TagContents {
					identity,
					record: None,
					source: RecordSource {
						part1: None,
						part2: Part2Status::NotPresent,
					},
				});
			}
			Selection::Ambiguous { a, b } => {
				tracing::warn!(a, b, "part 1 sequences are not consecutive");
				return Err(ReadError::AmbiguousSequence {
					part: Part::Part1,
					a,
					b,
				});
			}
		};
		tracing::debug!(%part1, "part 1 selected");
		let part1_bytes = &pick(&a, &b, part1).part1;

		let part2 = if has_part2(part1_bytes) {
			match select(validate_part2(&a.part2).ok(), validate_part2(&b.part2).ok()) {
				Selection::Region(region) => Part2Status::Selected(region),
				Selection::Absent => {
					tracing::warn!("part 2 flagged but no valid copy");
					Part2Status::Missing
				}
				Selection::Ambiguous { a, b } => {
					tracing::warn!(a, b, "part 2 sequences are not consecutive");
					Part2Status::Ambiguous { a, b }
				}
			}
		} else {
			Part2Status::NotPresent
		};

		let part2_bytes = match part2 {
			Part2Status::Selected(region) => Some(&pick(&a, &b, region).part2),
			_ => None,
		};
		let record = DataRecord::decode(part1_bytes, part2_bytes)?;

		Ok(TagContents {
			identity,
			record: Some(record),
			source: RecordSource {
				part1: Some(part1),
				part2,
			},
		})
	}
}

/// Read the identity and the freshest valid copy of the record.
///
/// See [`TagReader::read_record`].
pub fn read_record<T: BlockIo + ?Sized>(io: &mut T) -> Result<TagContents, ReadError> {
	TagReader::new(io).read_record()
}

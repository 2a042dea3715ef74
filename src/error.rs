use std::fmt;

use thiserror::Error;

use crate::{record::Checksum, sequence::Part};

/// A structure on the tag failed its integrity check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChecksumError {
	#[error("identity header checksum mismatch: stored {stored:#06x}, computed {computed:#06x}")]
	Identity { stored: u16, computed: u16 },

	#[error("{which} mismatch: stored {stored:#06x}, computed {computed:#06x}")]
	Data {
		which: Checksum,
		stored: u16,
		computed: u16,
	},

	#[error("malformed layout: {0}")]
	Layout(String),
}

impl From<deku::DekuError> for ChecksumError {
	fn from(err: deku::DekuError) -> Self {
		Self::Layout(err.to_string())
	}
}

/// Failure reported by the hardware collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HardwareError {
	/// The tag left the field or the reader went away.
	#[error("tag connection lost")]
	Lost,

	/// A single command failed but the tag is still present.
	#[error("{0}")]
	Io(String),
}

/// Failure of a guarded block operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
	#[error("no tag connected")]
	NotConnected,

	#[error("tag connection lost")]
	ConnectionLost,

	#[error("block {block} is out of range")]
	OutOfRange { block: u8 },

	#[error("block {block} is a sector trailer")]
	TrailerBlock { block: u8 },

	#[error("block 0 is owned by the tag vendor")]
	ManufacturerBlock,

	/// The sector rejected the key.
	#[error("key A rejected by sector {sector}")]
	WrongKey { sector: u8 },

	/// The command failed; the connection is kept but the sector must be re-authenticated.
	#[error("hardware failure on sector {sector}: {reason}")]
	Hardware { sector: u8, reason: String },
}

impl TransportError {
	pub(crate) fn from_hardware(sector: u8, err: HardwareError) -> Self {
		match err {
			HardwareError::Lost => Self::ConnectionLost,
			HardwareError::Io(reason) => Self::Hardware { sector, reason },
		}
	}

	/// Whether the tag must be re-presented before trying again.
	pub fn is_fatal(&self) -> bool {
		matches!(self, Self::ConnectionLost | Self::NotConnected)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
	#[error(transparent)]
	Transport(#[from] TransportError),

	#[error(transparent)]
	Identity(#[from] ChecksumError),

	/// Both copies are valid but their sequences are not exactly one apart.
	#[error("{part} copies have non-consecutive sequences: A={a}, B={b}")]
	AmbiguousSequence { part: Part, a: u8, b: u8 },
}

/// Which step of a write failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStage {
	WritingIdentity,
	WritingData,
}

impl fmt::Display for WriteStage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::WritingIdentity => f.write_str("writing identity"),
			Self::WritingData => f.write_str("writing data"),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriteError {
	/// The tag carries a different identity and rewriting it was not requested.
	///
	/// Nothing has been written.
	#[error("identity on the tag does not match; enable identity rewrite to relabel it")]
	IdentityMismatch,

	#[error("{stage} failed: {source}")]
	Transport {
		stage: WriteStage,
		#[source]
		source: TransportError,
	},

	/// The identity or record could not be laid out; nothing has been written.
	#[error("{stage} failed: {source}")]
	Encode {
		stage: WriteStage,
		#[source]
		source: ChecksumError,
	},
}

impl WriteError {
	pub fn stage(&self) -> WriteStage {
		match self {
			Self::IdentityMismatch => WriteStage::WritingIdentity,
			Self::Transport { stage, .. } | Self::Encode { stage, .. } => *stage,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
	#[error("no tag connected")]
	NotConnected,

	#[error("tag connection lost")]
	ConnectionLost,

	/// Neither the derived key nor any fallback key opened the sector.
	#[error("no known key opens sector {sector}")]
	NoKey { sector: u8 },

	/// The sector no longer accepted its key right before rekeying.
	#[error("sector {sector} changed before it could be rekeyed")]
	SectorChanged { sector: u8 },

	#[error("could not rekey sector {sector}: {reason}")]
	Rekey { sector: u8, reason: String },
}

/// Failure loading or saving a raw tag dump.
#[derive(Debug, Error)]
pub enum DumpError {
	#[error("dump must be {expected} bytes, got {len}")]
	Size { expected: usize, len: usize },

	#[error(transparent)]
	Io(#[from] std::io::Error),
}

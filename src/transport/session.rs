use super::{is_trailer, sector_of, BlockIo, Mifare, BLOCK_COUNT, SECTOR_COUNT};
use crate::{
	cipher::Block,
	error::{HardwareError, TransportError},
	impls::TagDump,
	keys::{sector_key_a, SectorKey, Uid},
};

/// Connection state of a [`TagSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
	Disconnected,
	Connected {
		uid: Uid,

		/// Sector the tag is currently authenticated to, if any.
		authenticated: Option<u8>,
	},
}

/// A tag on the reader, addressed through its derived sector keys.
///
/// Holds at most one authenticated sector; moving to a block of another sector
/// re-authenticates first.
#[derive(Debug)]
pub struct TagSession<M> {
	mifare: M,
	state: SessionState,
}

impl<M: Mifare> TagSession<M> {
	pub fn new(mifare: M) -> Self {
		Self {
			mifare,
			state: SessionState::Disconnected,
		}
	}

	/// A tag with this uid was presented.
	#[tracing::instrument(level = "debug", skip_all, fields(uid = %hex::encode(uid)))]
	pub fn connect(&mut self, uid: Uid) {
		self.state = SessionState::Connected {
			uid,
			authenticated: None,
		};
	}

	pub fn disconnect(&mut self) {
		tracing::debug!("tag disconnected");
		self.state = SessionState::Disconnected;
	}

	pub fn state(&self) -> SessionState {
		self.state
	}

	pub fn uid(&self) -> Option<Uid> {
		match self.state {
			SessionState::Connected { uid, .. } => Some(uid),
			SessionState::Disconnected => None,
		}
	}

	pub fn mifare(&self) -> &M {
		&self.mifare
	}

	pub fn into_inner(self) -> M {
		self.mifare
	}

	/// Authenticate `sector` with `key`, or with its derived key A if `None`.
	///
	/// Does nothing if the session is already authenticated to `sector`.
	#[tracing::instrument(level = "trace", skip(self, key))]
	pub fn authenticate_sector(
		&mut self,
		sector: u8,
		key: Option<&SectorKey>,
	) -> Result<(), TransportError> {
		let SessionState::Connected { uid, authenticated } = self.state else {
			return Err(TransportError::NotConnected);
		};
		if sector >= SECTOR_COUNT {
			return Err(TransportError::OutOfRange {
				block: sector.saturating_mul(4),
			});
		}
		if authenticated == Some(sector) {
			return Ok(());
		}

		let key = key.copied().unwrap_or_else(|| sector_key_a(sector, &uid));
		self.set_authenticated(None);
		match self.mifare.authenticate_key_a(sector, &key) {
			Ok(true) => {
				self.set_authenticated(Some(sector));
				Ok(())
			}
			Ok(false) => {
				tracing::debug!(sector, "key rejected");
				Err(TransportError::WrongKey { sector })
			}
			Err(err) => Err(self.hardware_failure(sector, err)),
		}
	}

	/// Drop the authenticated-sector cache so the next access authenticates afresh.
	pub(crate) fn forget_authentication(&mut self) {
		self.set_authenticated(None);
	}

	fn set_authenticated(&mut self, sector: Option<u8>) {
		if let SessionState::Connected { authenticated, .. } = &mut self.state {
			*authenticated = sector;
		}
	}

	fn hardware_failure(&mut self, sector: u8, err: HardwareError) -> TransportError {
		match &err {
			HardwareError::Lost => {
				tracing::debug!(sector, "tag lost");
				self.state = SessionState::Disconnected;
			}
			HardwareError::Io(reason) => {
				tracing::debug!(sector, %reason, "hardware failure");
				self.set_authenticated(None);
			}
		}
		TransportError::from_hardware(sector, err)
	}

	/// Read any block, trailers included, using the derived key of its sector.
	pub(crate) fn read_raw(&mut self, block: u8) -> Result<Block, TransportError> {
		if block >= BLOCK_COUNT {
			return Err(TransportError::OutOfRange { block });
		}
		let sector = sector_of(block);
		self.authenticate_sector(sector, None)?;
		self.mifare
			.read_block(block)
			.map_err(|err| self.hardware_failure(sector, err))
	}

	/// Write any block, trailers included, in the currently authenticated sector.
	pub(crate) fn write_raw(&mut self, block: u8, data: &Block) -> Result<(), TransportError> {
		if block >= BLOCK_COUNT {
			return Err(TransportError::OutOfRange { block });
		}
		let sector = sector_of(block);
		self.authenticate_sector(sector, None)?;
		self.mifare
			.write_block(block, data)
			.map_err(|err| self.hardware_failure(sector, err))
	}

	/// Read all 64 blocks into a dump, stopping at the first failure.
	///
	/// Trailers read back as the tag reports them; key A is normally masked.
	#[tracing::instrument(level = "debug", skip(self))]
	pub fn read_dump(&mut self) -> Result<TagDump, TransportError> {
		let mut dump = TagDump::default();
		for block in 0..BLOCK_COUNT {
			let data = self.read_raw(block)?;
			dump.set_block(block, &data);
		}
		Ok(dump)
	}
}

impl<M: Mifare> BlockIo for TagSession<M> {
	fn read_block(&mut self, block: u8) -> Result<Block, TransportError> {
		if block < BLOCK_COUNT && is_trailer(block) {
			return Err(TransportError::TrailerBlock { block });
		}
		self.read_raw(block)
	}

	fn write_block(&mut self, block: u8, data: &Block) -> Result<(), TransportError> {
		if block == 0 {
			return Err(TransportError::ManufacturerBlock);
		}
		if block < BLOCK_COUNT && is_trailer(block) {
			return Err(TransportError::TrailerBlock { block });
		}
		tracing::trace!(block, "write");
		self.write_raw(block, data)
	}
}

pub mod checksum;
pub mod keys;
pub mod cipher;

pub mod header;
pub mod record;
pub mod tag_time;
pub mod bits;
pub mod sequence;

pub mod transport;
pub mod reader;
pub mod writer;

pub mod impls;
pub mod error;

pub(crate) mod deku_helpers;

pub use error::{ChecksumError, FormatError, ReadError, TransportError, WriteError};
pub use header::{decode_identity, encode_identity, Identity};
pub use reader::{read_record, TagContents};
pub use record::DataRecord;
pub use transport::{BlockIo, Mifare, TagSession};
pub use writer::{options::WriteOptions, write_record};

/// Options used when writing a record to a tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
	/// Whether to relabel a tag whose identity differs from the one being written.
	///
	/// Rewriting the identity changes the encryption key of every data block, so both regions
	/// are rewritten from scratch.
	///
	/// Defaults to false: a different identity on the tag aborts the write before anything is
	/// written.
	pub rewrite_identity: bool,
}

impl WriteOptions {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_rewrite_identity(mut self, rewrite_identity: bool) -> Self {
		self.rewrite_identity = rewrite_identity;
		self
	}
}

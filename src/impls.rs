pub use dump::{TagDump, DUMP_SIZE};
pub use in_memory::{MemoryTag, Op, FACTORY_ACCESS_BITS};

mod dump;
mod in_memory;

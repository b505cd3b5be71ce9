pub mod base;
pub mod memory;

pub use base::{SpannerWriter, apply_with_retry};
pub use memory::MemoryWriter;

pub mod buffer;
pub mod gap_buffer;

pub use buffer::{Buffer, BufferId, BufferManager, SCRATCH_BUFFER_NAME};
pub use gap_buffer::GapBuffer;

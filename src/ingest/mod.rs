mod batch;
mod buffer;
mod handle;
#[cfg(test)]
mod tests;

pub use batch::{BatchPass, BatchReport};
pub use buffer::FrameIngest;
pub use handle::IngestHandle;

// The internal layers of the engine, leaves first: per-pixel derts, the gradient
// field provider, then the four stages of the streaming scan (partition, link,
// extend/split, accumulate) and the row driver that orchestrates them.

pub mod blob;
pub mod dert;
pub mod frame_scanner;
pub mod frontier_linker;
pub mod gradient;
pub mod row_partitioner;
pub mod segment;

// THEORY:
// This file is the main entry point for the `gradient_blobs` library crate.
// It follows the standard Rust convention of using `lib.rs` to define the public
// API that will be exposed to external consumers.
//
// The primary goal is to export the `BlobPipeline` (image in, frame of blobs out)
// and its associated data structures as the clean, high-level interface for the
// engine, plus the `ParallelPipeline` variant that computes the gradient field on
// a worker pool. The streaming internals (`core_modules`) stay available for
// consumers that feed the scanner a dert field of their own making.

pub mod core_modules;
pub mod parallel_pipeline;
pub mod pipeline;

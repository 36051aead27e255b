//! # SafeWipe - Concurrent Secure File Erasure
//!
//! SafeWipe overwrites each file's content with a replacement pattern before
//! removing it, running many files in parallel under a fixed worker budget.
//!
//! ## Features
//!
//! - **Replacement patterns**: all-zero or OS CSPRNG bytes, refilled per chunk
//! - **Chunked overwrite**: fixed-size scratch buffer, synced before unlink
//! - **Bounded scheduler**: FIFO queue, self-replenishing worker slots
//! - **Failure isolation**: one bad file never stalls the rest of the batch
//! - **Progress reporting**: per-file fractions and pass/fail outcomes
//!
//! ## Quick Start
//!
//! ```no_run
//! use safewipe::{orchestrator::EraseOrchestrator, replacement::FillPattern, reporter::NullSink};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut orch = EraseOrchestrator::new(FillPattern::Random.source(), Arc::new(NullSink))
//!         .with_workers(4);
//!
//!     let report = orch.run(["./secret.txt", "./old-key.pem"]).await?;
//!     println!("{} erased, {} failed", report.succeeded, report.failed);
//!     Ok(())
//! }
//! ```
//!
//! ## Limits
//!
//! Only the logical file content is overwritten through the normal OS write
//! path. Wear-leveled flash, copy-on-write filesystems and SSD remapping may
//! still retain old blocks.

pub mod config;
pub mod eraser;
pub mod error;
pub mod orchestrator;
pub mod replacement;
pub mod reporter;
pub mod scheduler;
pub mod targets;

// Re-export common types for convenience
pub use error::SafeWipeError;

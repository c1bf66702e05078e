//! Recording storage
//!
//! Uploaded broadcast recordings live under `<data_dir>/<kind>/`. This
//! module owns the on-disk layout and naming, the chunked upload
//! reassembly, and the retention sweep that reclaims old files.

pub mod assembler;
pub mod store;
pub mod sweeper;

pub use assembler::{ChunkAssembler, ChunkOutcome};
pub use store::{RecordingKind, RecordingStore};
pub use sweeper::RetentionSweeper;

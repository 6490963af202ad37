// Pipeline processing: workbook reconciliation and per-test cleanup

pub mod cleanup;
pub mod enrich;

pub use cleanup::{CaptureCleanup, CleanupStrategy, WaveformCleanup};
pub use enrich::{enrich, enrich_with_summary, EnrichmentSummary};

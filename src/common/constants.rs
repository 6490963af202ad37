/// Sheet names recognized in the configuration workbook.
/// Every sheet is optional; a missing sheet skips its enrichment step.
pub const SHEET_EDGE_CHANNELS: &str = "Edge Channels";
pub const SHEET_ONBOARD_RAILS: &str = "On-Board Rails";
pub const SHEET_RAILS_TO_RENAME: &str = "Rails to Rename";
pub const SHEET_SEQUENCING: &str = "Sequencing";
pub const SHEET_TIMING: &str = "Timing";
pub const SHEET_BER: &str = "BER";

pub const RECOGNIZED_SHEETS: [&str; 6] = [
    SHEET_EDGE_CHANNELS,
    SHEET_ONBOARD_RAILS,
    SHEET_RAILS_TO_RENAME,
    SHEET_SEQUENCING,
    SHEET_TIMING,
    SHEET_BER,
];

/// Literal accepted in the Sequencing sheet's valid-voltage column
pub const SPEC_MIN_TOKEN: &str = "spec_min";

// Stage names (used for job payloads, logs and metrics labels)
pub const STAGE_CLEAN: &str = "clean";
pub const STAGE_PERSIST: &str = "persist";
pub const STAGE_ANALYZE: &str = "analyze";

// Progress checkpoints reported by the orchestrator
pub const PROGRESS_TOTAL: u32 = 10;
pub const PROGRESS_CLEANING: u32 = 1;
pub const PROGRESS_PERSISTING: u32 = 4;
pub const PROGRESS_ANALYZING: u32 = 8;
pub const PROGRESS_COMPLETE: u32 = 100;

// Artifact store naming
pub const ARTIFACT_RANDOM_LEN: usize = 20;
pub const TABLE_EXTENSION: &str = "ndjson";
pub const REPORT_EXTENSION: &str = "json";

/// Excel caps worksheet names at 31 characters; report sheet names follow suit.
pub const MAX_SHEET_NAME_LEN: usize = 31;

pub const RESPONSE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

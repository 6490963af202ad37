//! Domain data shapes shared across layers

pub mod record;
pub mod sample;
pub mod test_type;
pub mod workbook;

pub use record::{EnrichedRecord, EnrichedTable, PersistedRecord, RailTags, ValidVoltage};
pub use sample::{CaptureStats, RawSample, SampleKey};
pub use test_type::{FilterBy, TestType};
pub use workbook::{Cell, Sheet, SheetRow, Workbook};

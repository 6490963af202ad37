//! Post-processing pipeline for power-rail validation telemetry.
//!
//! Raw scope captures are reconciled with a per-run configuration workbook
//! (rail renames, edge channels, onboard specs, timing and sequencing),
//! persisted, and handed to a test-specific analysis. Each stage runs either
//! on a task queue or in-process, whichever is available.

pub mod analysis;
pub mod app;
pub mod common;
pub mod config;
pub mod domain;
pub mod infra;
pub mod observability;
pub mod pipeline;

pub use common::error::{PipelineError, Result};

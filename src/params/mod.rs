//! Parameter definitions with physical units and documented semantics.
//!
//! All tuning constants are collected here with:
//! - Physical units (Hz, samples, milliseconds)
//! - Documented ranges and meanings
//! - A `validate()` that rejects configurations the pipeline cannot run

mod audio;

pub use audio::{audio_constants, PipelineConfig};

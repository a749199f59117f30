//! Audio session and the threads around it.
//!
//! A [`Session`] ties a signal source to a route through the slot queue:
//! device capture or a paced software feeder on one side, the analysis
//! thread or the playback device on the other. Readings land in a
//! [`Scope`] for whatever display polls it.

mod activity;
mod analysis;
mod feeder;
mod scope;
mod synthesis;
mod system;

pub use activity::{Activity, Busy};
pub use analysis::spawn_analysis_thread;
pub use feeder::{spawn_feeder_thread, Cadence};
pub use scope::{ProcessingMode, Scope, ScopeStats};
pub use synthesis::{half_period, tone_frequency_hz, ToneControl, ToneGenerator, WaveForm};
pub use system::{Route, Session, SessionConfig, SignalSource, Status};

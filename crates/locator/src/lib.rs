//! # Plume Locator
//!
//! Finds the origin of a contamination event by placing a few sensors per round
//! and pruning the candidate set with their binary readings.
//!
//! ## Architecture
//!
//! ```text
//! FlowGraph + DominanceIndex
//!     │
//!     └──> Localizer (one call to `advance` = one round)
//!            ├─ SELECT   greedy coverage, each gain capped at B = ceil(|C| / 2)
//!            ├─ MEASURE  MeasurementOracle::test per sensor
//!            ├─ PRUNE    drop upstream of negatives, keep upstream of all positives
//!            └─ CHECK    |C| = 1 found, |C| = 0 exhausted, else next round
//!                  │
//!                  └──> StepRecorder (ordered trace events)
//! ```

mod config;
mod error;
mod events;
mod localizer;
mod oracle;
mod selection;

pub use config::{LocatorConfig, OriginChoice, DEFAULT_SENSORS_PER_ROUND};
pub use error::{LocateError, Result};
pub use events::{
    NullRecorder, SensorReading, StepEvent, StepKind, StepPayload, StepRecorder, TraceVariables,
};
pub use localizer::{Localizer, LocatorState, RoundRecord, RunReport, Termination};
pub use oracle::{MeasurementOracle, Reading, SimulatedOracle};
pub use selection::{prune, round_budget, select_sensors, PruneOutcome, Selection, SensorPick};

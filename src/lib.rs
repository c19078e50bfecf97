//! # spikelearn
//!
//! Synaptic plasticity for spiking neural networks. A learning rule is bound
//! to a connection and its two node populations, then called once per
//! timestep to update the weights from spikes, traces and (for the
//! reward-modulated rules) a reward signal.
//!
//! ## Feature Flags
//!
//! - **`logging`** (default): console subscriber with per-crate debug flags
//! - **`file-logging`**: daily-rolling JSON log files
//!
//! ## Usage
//!
//! ```rust,no_run
//! use spikelearn::prelude::*;
//! use ndarray::Array2;
//!
//! let source = SpikingNodes::new(&[100], 1)?.with_traces(false);
//! let target = SpikingNodes::new(&[10], 1)?.with_traces(false);
//! let connection = Connection::dense(Array2::zeros((100, 10))).with_bounds(0.0, 1.0)?;
//!
//! let options = RuleOptions::default().with_nu([1e-3, 1e-3]);
//! let mut projection = Projection::new(connection, RuleKind::PostPre, &options, &source, &target)?;
//!
//! // Once per timestep, after the populations have updated
//! projection.update(&source, &target, &UpdateSignal::default())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Foundation: spikelearn-config                          │
//! │  (RuleKind, LearningConfig, TOML + overrides)           │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Algorithms: spikelearn-plasticity                      │
//! │  (Rules, Connection, NodePopulation, Projection)        │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Infrastructure: spikelearn-observability               │
//! │  (tracing subscriber, debug flags, log files)           │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## License
//!
//! Apache-2.0

pub use spikelearn_config as config;
pub use spikelearn_plasticity as plasticity;

#[cfg(feature = "logging")]
pub use spikelearn_observability as observability;

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude - commonly used types and traits
pub mod prelude {
    pub use crate::config::{load_config, validate_config, LearningConfig, RuleKind, SpikelearnConfig};
    pub use crate::plasticity::{
        CalibrationTable, Connection, Conv2dGeometry, LearningRule, NodePopulation, PlasticityError,
        Projection, Reduction, Reward, RuleOptions, SpikingNodes, UpdateSignal,
    };

    #[cfg(feature = "logging")]
    pub use crate::observability::{init_logging, parse_debug_flags, LogOptions};
}

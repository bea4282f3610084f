//! utgen Core - the test synthesis pipeline
//!
//! Takes source units through generate, build-fix, refine and measure until
//! their generated tests build and reach the coverage targets, or a budget
//! runs out.
//!
//! - [`GeneratorConfig`]: immutable run configuration
//! - [`PipelineController`]: state machine driver and worker pool
//! - [`ArtifactStore`]: revision lineage and reports per unit
//! - [`ReportAggregator`]: terminal outcomes and the run summary
//! - [`retry`]: the bounded retry combinator used for every adapter call
//!
//! # Example
//!
//! ```rust,ignore
//! use utgen_core::prelude::*;
//!
//! let config = Arc::new(GeneratorConfig::load(Path::new(DEFAULT_CONFIG_PATH))?);
//! let controller = PipelineController::new(config, templates, client, toolchain.clone(), toolchain)?;
//! let summary = controller.run(units, &CancellationToken::new()).await;
//! println!("{} of {} units converged", summary.converged, summary.total);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod aggregator;
pub mod config;
pub mod controller;
pub mod error;
pub mod retry;
pub mod state;
pub mod store;

pub use aggregator::{CoverageStats, ReportAggregator, RunSummary, UnitOutcome};
pub use config::{
    GenerationSettings, GeneratorConfig, LlmSettings, PipelineSettings, RequestSettings,
    DEFAULT_CONFIG_PATH,
};
pub use controller::PipelineController;
pub use error::{ConfigError, PipelineError, StoreError};
pub use retry::{retry, Backoff, Retried, RetryError, RetryPolicy, Retryable};
pub use state::{
    allowed_transitions, validate_transition, IllegalTransition, PipelineState, StageCounters,
    TerminationReason, UnitPhase,
};
pub use store::{ArtifactStore, TerminalRecord, UnitRecord};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running the pipeline
    pub use crate::{
        ArtifactStore, GeneratorConfig, PipelineController, PipelineError, ReportAggregator,
        RunSummary, TerminationReason, UnitOutcome, UnitPhase, DEFAULT_CONFIG_PATH,
    };
    pub use tokio_util::sync::CancellationToken;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

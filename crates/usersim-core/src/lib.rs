//! # usersim Core
//!
//! Interchange documents, project configuration, the external stage runner,
//! and the [`Engine`] facade over personas, judgement, matrix and audit.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         USERSIM CORE                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  instrumentation ──▶ perceptions ──▶ FactsDocument              │
//! │   (PipelineRunner, subprocesses)          │                     │
//! │                                           ▼                     │
//! │                                  ┌─────────────────┐            │
//! │                                  │     Engine      │            │
//! │                                  └────────┬────────┘            │
//! │                    ┌──────────────────────┼──────────────┐      │
//! │                    ▼                      ▼              ▼      │
//! │             ResultsDocument        MatrixDocument    AuditReport│
//! │                                                                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! | Kind | Handling |
//! |------|----------|
//! | Malformed input | [`UsersimError::Validation`] before anything is judged |
//! | Persona authoring error | inline failed result for that persona |
//! | External stage failure | inline error results for that scenario |
//! | No model search | hints omitted |

mod config;
mod engine;
mod error;
mod loader;
mod pipeline;
mod schema;

pub use config::{EngineConfig, OutputConfig, ProjectConfig, ScenarioSpec, CONFIG_FILE};
pub use engine::{Calibration, Engine};
pub use error::UsersimError;
pub use loader::{
    facts_files, known_fact_names, read_facts, read_facts_dir, read_facts_file, LoadedFacts,
};
pub use pipeline::{PipelineRunner, ScenarioRun, PATH_VAR, SCENARIO_VAR};
pub use schema::{
    FactsDocument, MatrixDocument, MetricsDocument, Report, ResultsDocument, ResultsSummary,
    MATRIX_SCHEMA, METRICS_SCHEMA, PERCEPTIONS_SCHEMA, RESULTS_SCHEMA,
};

// Re-export component types for convenience
pub use usersim_audit::AuditReport;
pub use usersim_judge::{JudgementResult, MatrixSummary, Persona};

/// Result type for usersim operations.
pub type Result<T> = std::result::Result<T, UsersimError>;

//! # usersim Audit
//!
//! Health checks over completed results: constraints that never fire,
//! constraints that never fail, personas with too few constraints, and facts
//! nobody asks about.
//!
//! ## Components
//!
//! | Component | Purpose |
//! |-----------|---------|
//! | [`AuditAnalyzer`] | runs every check over an [`AuditInput`] |
//! | [`AuditReport`] | structured result; `Display` renders the text report |
//!
//! ## Usage
//!
//! ```rust,ignore
//! use usersim_audit::AuditAnalyzer;
//!
//! let doc: serde_json::Value = serde_json::from_str(&std::fs::read_to_string("results.json")?)?;
//! let report = AuditAnalyzer::new()
//!     .with_known_facts(["latency_ms", "build_ok"])
//!     .analyze_value(&doc)?;
//! eprint!("{report}");
//! ```

mod analyzer;
mod error;
mod models;
mod printer;

pub use analyzer::{AuditAnalyzer, DEFAULT_DENSITY_LIMIT};
pub use error::{AuditError, Result};
pub use models::{
    AlwaysPassing, AuditInput, AuditReport, AuditSummary, ConstraintRow, Density, InputSummary,
    PersonaCount, ResultRow, VacuousConstraint,
};

//! # usersim Judgement
//!
//! Personas, the judgement procedure, and the persona × scenario matrix.
//!
//! ## Overview
//!
//! ```text
//! ┌──────────────┐   constraints(env)   ┌─────────┐   per pair   ┌──────────────────┐
//! │   Persona    │ ───────────────────▶ │  Judge  │ ───────────▶ │ MatrixAggregator │
//! │ (TOML / fn)  │                      │         │              │                  │
//! └──────────────┘                      └─────────┘              └──────────────────┘
//!                                            │                           │
//!                                            ▼                           ▼
//!                                    JudgementResult               Matrix + summary
//! ```
//!
//! A persona turns a grounded [`FactEnv`](usersim_expr::FactEnv) into a list
//! of labeled formulas. The [`Judge`] evaluates each one independently and
//! records whether implications fired. Authoring errors never abort a run:
//! they become a failed result for that persona only.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use usersim_judge::{load_personas, MatrixAggregator, ScenarioInput};
//!
//! let personas = load_personas(&["users/"])?;
//! let matrix = MatrixAggregator::default().run(&personas, &scenarios);
//! println!("{}", matrix.summary.score);
//! ```

mod error;
mod judgement;
mod matrix;
mod persona;

pub use error::{JudgeError, PersonaError, Result};
pub use judgement::{ConstraintOutcome, Direction, Judge, JudgementResult, Reassignment};
pub use matrix::{
    sort_results, EffectiveTestWeights, LabelFrequency, Matrix, MatrixAggregator, MatrixSummary,
    ScenarioInput, ALL_PERSONAS, DEFAULT_EFFECTIVE_BASE, DEFAULT_MAX_ARITY,
};
pub use persona::{
    load_personas, DeclaredPersona, FnPersona, Persona, PersonaProfile, PERSONA_EXTENSION,
};

//! Personas: named observers that turn a fact environment into constraints.
//!
//! A persona is anything implementing [`Persona`]. Two implementations ship
//! here:
//!
//! - [`DeclaredPersona`], loaded from a TOML persona file whose formulas are
//!   compiled once at load time
//! - [`FnPersona`], wrapping a closure for personas written in Rust
//!
//! ## Persona files
//!
//! ```toml
//! name = "reliability_user"
//! role = "End User"
//! goal = "app must be reliable"
//! pronoun = "they"
//! strict_facts = false
//!
//! [[constraint]]
//! label = "reliability/error-rate-under-10pct"
//! expr = "Implies(request_count >= 1, error_count * 10 <= request_count)"
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use usersim_expr::{parse_formula, Expr, FactEnv};
use walkdir::WalkDir;

use crate::error::{JudgeError, PersonaError, Result};

/// Extension of persona files picked up from directories.
pub const PERSONA_EXTENSION: &str = "toml";

fn default_pronoun() -> String {
    "they".to_string()
}

/// Identity metadata carried through to results. Never affects judgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaProfile {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub goal: String,
    #[serde(default = "default_pronoun")]
    pub pronoun: String,
}

impl PersonaProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            role: String::new(),
            goal: String::new(),
            pronoun: default_pronoun(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = goal.into();
        self
    }

    pub fn with_pronoun(mut self, pronoun: impl Into<String>) -> Self {
        self.pronoun = pronoun.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// A simulated observer of the application.
///
/// `constraints` must be pure: the same environment always yields the same
/// list. It may fail only on authoring errors.
pub trait Persona: Send + Sync {
    fn profile(&self) -> &PersonaProfile;

    fn name(&self) -> &str {
        &self.profile().name
    }

    fn constraints(&self, env: &FactEnv) -> std::result::Result<Vec<Expr>, PersonaError>;
}

impl<T: Persona + ?Sized> Persona for Box<T> {
    fn profile(&self) -> &PersonaProfile {
        (**self).profile()
    }

    fn constraints(&self, env: &FactEnv) -> std::result::Result<Vec<Expr>, PersonaError> {
        (**self).constraints(env)
    }
}

impl<T: Persona + ?Sized> Persona for std::sync::Arc<T> {
    fn profile(&self) -> &PersonaProfile {
        (**self).profile()
    }

    fn constraints(&self, env: &FactEnv) -> std::result::Result<Vec<Expr>, PersonaError> {
        (**self).constraints(env)
    }
}

/// A persona backed by a closure.
pub struct FnPersona<F> {
    profile: PersonaProfile,
    build: F,
}

impl<F> FnPersona<F>
where
    F: Fn(&FactEnv) -> std::result::Result<Vec<Expr>, PersonaError> + Send + Sync,
{
    pub fn new(profile: PersonaProfile, build: F) -> Self {
        Self { profile, build }
    }
}

impl<F> Persona for FnPersona<F>
where
    F: Fn(&FactEnv) -> std::result::Result<Vec<Expr>, PersonaError> + Send + Sync,
{
    fn profile(&self) -> &PersonaProfile {
        &self.profile
    }

    fn constraints(&self, env: &FactEnv) -> std::result::Result<Vec<Expr>, PersonaError> {
        (self.build)(env)
    }
}

impl<F> fmt::Debug for FnPersona<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnPersona")
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PersonaFile {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    role: String,
    #[serde(default)]
    goal: String,
    #[serde(default = "default_pronoun")]
    pronoun: String,
    #[serde(default)]
    strict_facts: bool,
    #[serde(default, rename = "constraint")]
    constraints: Vec<ConstraintEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConstraintEntry {
    #[serde(default)]
    label: Option<String>,
    expr: String,
}

/// A persona declared in a TOML file.
#[derive(Debug, Clone)]
pub struct DeclaredPersona {
    profile: PersonaProfile,
    strict_facts: bool,
    constraints: Vec<Expr>,
    source: Option<PathBuf>,
}

impl DeclaredPersona {
    /// Builds a persona from already-compiled constraints.
    pub fn new(profile: PersonaProfile, constraints: Vec<Expr>) -> Self {
        Self {
            profile,
            strict_facts: false,
            constraints,
            source: None,
        }
    }

    /// Treat references to unobserved facts as authoring errors.
    pub fn with_strict_facts(mut self, strict: bool) -> Self {
        self.strict_facts = strict;
        self
    }

    /// Parses a persona document. `origin` is only used in error messages.
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self> {
        let file: PersonaFile = toml::from_str(text).map_err(|e| JudgeError::Format {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })?;
        if file.name.trim().is_empty() {
            return Err(JudgeError::Format {
                path: origin.to_path_buf(),
                message: "persona name must not be empty".to_string(),
            });
        }

        let constraints = file
            .constraints
            .iter()
            .map(|entry| {
                let expr = parse_formula(&entry.expr).map_err(|source| JudgeError::Formula {
                    path: origin.to_path_buf(),
                    source,
                })?;
                Ok(match &entry.label {
                    Some(label) => expr.labeled(label.as_str()),
                    None => expr,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let profile = PersonaProfile {
            name: file.name,
            description: file.description,
            role: file.role,
            goal: file.goal,
            pronoun: file.pronoun,
        };
        Ok(Self {
            profile,
            strict_facts: file.strict_facts,
            constraints,
            source: Some(origin.to_path_buf()),
        })
    }

    /// Reads and compiles a persona file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| JudgeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let persona = Self::from_toml_str(&text, path)?;
        debug!(
            "Loaded persona '{}' with {} constraint(s) from {}",
            persona.profile.name,
            persona.constraints.len(),
            path.display()
        );
        Ok(persona)
    }

    /// The file this persona was loaded from.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn strict_facts(&self) -> bool {
        self.strict_facts
    }

    /// Compiled constraints, in declaration order.
    pub fn declared(&self) -> &[Expr] {
        &self.constraints
    }
}

impl Persona for DeclaredPersona {
    fn profile(&self) -> &PersonaProfile {
        &self.profile
    }

    fn constraints(&self, env: &FactEnv) -> std::result::Result<Vec<Expr>, PersonaError> {
        for expr in &self.constraints {
            expr.check_proposition(env)
                .map_err(|source| PersonaError::Sort {
                    label: expr.label(),
                    source,
                })?;
            if self.strict_facts {
                if let Some(fact) = expr.variables().into_iter().find(|v| !env.contains(v)) {
                    return Err(PersonaError::MissingFact {
                        label: expr.label(),
                        fact,
                    });
                }
            }
        }
        Ok(self.constraints.clone())
    }
}

/// Loads every persona named by `paths`.
///
/// Files are loaded as given; directories contribute every `*.toml` file
/// beneath them, sorted by path.
pub fn load_personas<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<DeclaredPersona>> {
    let mut personas = Vec::new();
    for path in paths {
        let path = path.as_ref();
        if path.is_dir() {
            let mut files: Vec<PathBuf> = WalkDir::new(path)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.into_path())
                .filter(|p| p.extension().is_some_and(|ext| ext == PERSONA_EXTENSION))
                .collect();
            files.sort();
            for file in files {
                personas.push(DeclaredPersona::load(&file)?);
            }
        } else if path.is_file() {
            personas.push(DeclaredPersona::load(path)?);
        } else {
            return Err(JudgeError::NotFound(path.to_path_buf()));
        }
    }
    info!("Loaded {} persona(s)", personas.len());
    Ok(personas)
}

//! Subcommand handlers. Each returns `Ok(true)` when the run counts as a
//! pass, `Ok(false)` when it completed but failed, and `Err` for anything
//! that stopped it from completing.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::info;
use usersim_core::{
    known_fact_names, read_facts, read_facts_file, Calibration, Engine, EngineConfig,
    PipelineRunner, ProjectConfig, Report,
};

use crate::summary::write_summary;

const STDIN: &str = "-";

/// Where `judge` reads facts from.
pub enum FactsSource {
    /// A single document, or stdin for `-`.
    File(String),
    /// Every `*.json` document in a directory.
    Directory(PathBuf),
}

pub fn judge(
    source: FactsSource,
    users: &[PathBuf],
    config: Option<&Path>,
    out: Option<&Path>,
    quiet: bool,
) -> Result<bool> {
    let engine_config = match config {
        Some(path) => load_config(path)?.engine,
        None => EngineConfig::default(),
    };
    let engine = Engine::with_persona_files(engine_config, users)?;

    let report: Report = match source {
        FactsSource::Directory(dir) => engine.judge_directory(&dir)?.into(),
        FactsSource::File(file) if file == STDIN => {
            let loaded = read_facts(io::stdin().lock(), "facts document <stdin>")?;
            engine.judge_document(&loaded).into()
        }
        FactsSource::File(file) => {
            let loaded = read_facts_file(Path::new(&file))?;
            engine.judge_document(&loaded).into()
        }
    };

    finish(&report, out, quiet)
}

pub async fn run(
    config_path: &Path,
    only: Option<&str>,
    out: Option<&Path>,
    quiet: bool,
) -> Result<bool> {
    let config = load_config(config_path)?;
    let engine = Engine::from_project(&config)?;
    let runner = PipelineRunner::from_config(&config)?;
    let scenarios = config.scenarios(only);
    info!("Running {} scenario(s)", scenarios.len());

    let report = Report::from(engine.run_pipeline(&runner, &scenarios).await);
    let out = out
        .map(Path::to_path_buf)
        .or_else(|| config.output.results.as_deref().map(|p| config.resolve(p)));
    finish(&report, out.as_deref(), quiet)
}

pub fn audit(results: &str, facts_dir: Option<&Path>, json: bool) -> Result<bool> {
    let document = read_json(results)?;
    let known = facts_dir.map(known_fact_names).transpose()?;
    let report = Engine::audit(&document, known)?;

    let mut stdout = io::stdout().lock();
    if json {
        writeln!(stdout, "{}", serde_json::to_string_pretty(&report)?)?;
    } else {
        write!(stdout, "{report}")?;
    }
    Ok(true)
}

pub async fn calibrate(config_path: &Path, only: Option<&str>) -> Result<bool> {
    let config = load_config(config_path)?;
    let runner = PipelineRunner::from_config(&config)?;
    let calibration = Calibration::collect(&runner, &config.scenarios(only)).await;

    print!("{calibration}");
    Ok(calibration.failures() == 0)
}

fn load_config(path: &Path) -> Result<ProjectConfig> {
    ProjectConfig::load(path).with_context(|| format!("loading config {}", path.display()))
}

fn read_json(source: &str) -> Result<Value> {
    let text = if source == STDIN {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("reading stdin")?;
        text
    } else {
        std::fs::read_to_string(source).with_context(|| format!("reading {source}"))?
    };
    serde_json::from_str(&text).with_context(|| format!("parsing {source} as JSON"))
}

/// Writes the JSON report and the human summary, and reports whether the
/// aggregate score is perfect.
fn finish(report: &Report, out: Option<&Path>, quiet: bool) -> Result<bool> {
    let json = serde_json::to_string_pretty(report)?;
    match out {
        Some(path) => {
            std::fs::write(path, format!("{json}\n"))
                .with_context(|| format!("writing {}", path.display()))?;
            info!("Results written to {}", path.display());
        }
        None => writeln!(io::stdout().lock(), "{json}")?,
    }

    if !quiet {
        write_summary(&mut io::stderr().lock(), report)?;
    }
    Ok(report.is_perfect())
}

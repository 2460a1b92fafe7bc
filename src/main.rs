//! Schemsim - schematic to netlist compiler
//!
//! Compiles a schematic model (JSON) into the netlist handed to the
//! simulator.
//!
//! # Usage
//!
//! ```bash
//! schemsim divider.json --analysis dc --config analysis.json --line-map
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use schemsim_core::{
    error::{Result, SchemError},
    AnalysisConfig, AnalysisKind, Engine, EngineConfig, SchematicModel,
};

/// Schematic netlist compiler
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the schematic model file (.json)
    #[arg(value_name = "MODEL_JSON")]
    model_file: PathBuf,

    /// Analysis to compile for (op, dc, tran, ac)
    #[arg(short, long, default_value = "op")]
    analysis: AnalysisKind,

    /// Analysis settings file (.json)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Netlist lines placed before the elements
    #[arg(short, long, value_name = "FILE")]
    preamble: Option<PathBuf>,

    /// Print the line map as JSON after the netlist
    #[arg(long)]
    line_map: bool,

    /// Print the probe descriptors as JSON after the netlist
    #[arg(long)]
    probes: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| SchemError::file_read(path, e))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|source| SchemError::Encode { source })
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    // Load inputs
    let model = SchematicModel::from_file(&args.model_file)?;
    let config = match &args.config {
        Some(path) => AnalysisConfig::from_json(&read(path)?)?,
        None => AnalysisConfig::default(),
    };
    let preamble = match &args.preamble {
        Some(path) => read(path)?,
        None => String::new(),
    };

    // Settings first so the model compiles once
    let mut engine = Engine::new(EngineConfig::default());
    engine.set_analysis_config(config, Duration::ZERO);
    engine.set_preamble(preamble, Duration::ZERO);
    engine.set_analysis(args.analysis, Duration::ZERO);
    engine.set_model(model, Duration::ZERO);
    let compiled = engine.compiled()?;

    print!("{}", compiled.netlist_text);
    if args.line_map {
        println!("{}", to_json(&compiled.line_map)?);
    }
    if args.probes {
        println!("{}", to_json(engine.probes())?);
    }

    if let Some(request) = engine.simulation_request() {
        log::debug!("simulator request: {}", request.to_json()?);
    }

    Ok(())
}

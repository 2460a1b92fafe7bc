//! Analysis kinds, their configuration records and directive emission.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::lexer::parse_value;
use crate::error::SchemError;

/// Simulator analysis kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisKind {
    /// DC operating point
    Op,
    /// DC sweep
    Dc,
    /// Transient
    Tran,
    /// Small-signal AC sweep
    Ac,
}

impl AnalysisKind {
    /// Lowercase name as used in directives.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Op => "op",
            Self::Dc => "dc",
            Self::Tran => "tran",
            Self::Ac => "ac",
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AnalysisKind {
    type Err = SchemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().trim_start_matches('.') {
            "op" => Ok(Self::Op),
            "dc" => Ok(Self::Dc),
            "tran" => Ok(Self::Tran),
            "ac" => Ok(Self::Ac),
            _ => Err(SchemError::UnknownAnalysis { name: s.to_string() }),
        }
    }
}

/// DC sweep settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DcConfig {
    /// Swept source (component id or netlist name)
    pub source: String,
    pub start: String,
    pub stop: String,
    pub step: String,
}

/// Transient settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TranConfig {
    pub step: String,
    pub stop: String,
    /// Optional start time for saved data
    pub start: String,
    /// Source whose value is replaced for this run
    pub source: String,
    /// Replacement value text, e.g. `SIN(0 1 1k)`
    pub source_value: String,
}

/// AC sweep settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AcConfig {
    /// `dec`, `oct` or `lin`
    pub sweep: String,
    pub points: String,
    pub start: String,
    pub stop: String,
    /// Source whose value is replaced for this run
    pub source: String,
    /// Replacement value text, e.g. `AC 1`
    pub source_value: String,
}

impl Default for AcConfig {
    fn default() -> Self {
        Self {
            sweep: "dec".to_string(),
            points: "10".to_string(),
            start: "1".to_string(),
            stop: "1meg".to_string(),
            source: String::new(),
            source_value: "AC 1".to_string(),
        }
    }
}

/// Settings for every analysis kind; only the active kind's record is read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisConfig {
    pub dc: DcConfig,
    pub tran: TranConfig,
    pub ac: AcConfig,
}

impl AnalysisConfig {
    /// Decode a configuration from JSON.
    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        serde_json::from_str(json).map_err(|source| SchemError::ConfigDecode { source })
    }

    /// The source override requested for a run, as `(source, value)`.
    pub fn source_override(&self, kind: AnalysisKind) -> Option<(&str, &str)> {
        let (source, value) = match kind {
            AnalysisKind::Tran => (&self.tran.source, &self.tran.source_value),
            AnalysisKind::Ac => (&self.ac.source, &self.ac.source_value),
            AnalysisKind::Op | AnalysisKind::Dc => return None,
        };
        let (source, value) = (source.trim(), value.trim());
        if source.is_empty() || value.is_empty() {
            None
        } else {
            Some((source, value))
        }
    }
}

/// Parse a required numeric field, producing a kind-prefixed error message.
fn field(kind: AnalysisKind, name: &str, text: &str) -> Result<f64, String> {
    let text = text.trim();
    if text.is_empty() {
        return Err(format!("{kind}: {name} is required"));
    }
    parse_value(text).ok_or_else(|| format!("{kind}: {name} '{text}' is not a number"))
}

/// Build the directive line for an analysis.
///
/// `resolve_source` maps a configured source name onto the netlist name of
/// an independent source, returning `None` when no such source exists.
pub fn directive(
    kind: AnalysisKind,
    config: &AnalysisConfig,
    resolve_source: impl Fn(&str) -> Option<String>,
) -> Result<String, String> {
    match kind {
        AnalysisKind::Op => Ok(".op".to_string()),

        AnalysisKind::Dc => {
            let dc = &config.dc;
            let source = dc.source.trim();
            if source.is_empty() {
                return Err("dc: sweep source is required".to_string());
            }
            let netlist_id = resolve_source(source)
                .ok_or_else(|| format!("dc: sweep source '{source}' is not a V or I source"))?;
            let start = field(kind, "start", &dc.start)?;
            let stop = field(kind, "stop", &dc.stop)?;
            let step = field(kind, "step", &dc.step)?;
            if step == 0.0 {
                return Err("dc: step must be non-zero".to_string());
            }
            if (stop - start) * step < 0.0 {
                return Err("dc: step moves away from stop".to_string());
            }
            Ok(format!(
                ".dc {} {} {} {}",
                netlist_id,
                dc.start.trim(),
                dc.stop.trim(),
                dc.step.trim()
            ))
        }

        AnalysisKind::Tran => {
            let tran = &config.tran;
            let step = field(kind, "step", &tran.step)?;
            let stop = field(kind, "stop", &tran.stop)?;
            if step <= 0.0 {
                return Err("tran: step must be positive".to_string());
            }
            if stop <= 0.0 {
                return Err("tran: stop must be positive".to_string());
            }
            let mut line = format!(".tran {} {}", tran.step.trim(), tran.stop.trim());
            if !tran.start.trim().is_empty() {
                let start = field(kind, "start", &tran.start)?;
                if start < 0.0 || start >= stop {
                    return Err("tran: start must lie in [0, stop)".to_string());
                }
                line.push(' ');
                line.push_str(tran.start.trim());
            }
            Ok(line)
        }

        AnalysisKind::Ac => {
            let ac = &config.ac;
            let sweep = ac.sweep.trim().to_ascii_lowercase();
            if !matches!(sweep.as_str(), "dec" | "oct" | "lin") {
                return Err(format!("ac: sweep '{}' must be dec, oct or lin", ac.sweep.trim()));
            }
            let points = ac
                .points
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|p| *p > 0)
                .ok_or_else(|| format!("ac: points '{}' must be a positive integer", ac.points.trim()))?;
            let start = field(kind, "start", &ac.start)?;
            let stop = field(kind, "stop", &ac.stop)?;
            if start <= 0.0 {
                return Err("ac: start frequency must be positive".to_string());
            }
            if stop <= start {
                return Err("ac: stop frequency must exceed start".to_string());
            }
            Ok(format!(
                ".ac {} {} {} {}",
                sweep,
                points,
                ac.start.trim(),
                ac.stop.trim()
            ))
        }
    }
}

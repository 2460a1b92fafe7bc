//! Debounced simulator runs.
//!
//! Time is supplied by the caller as a [`Duration`] since any fixed origin,
//! so the same code runs natively and in a browser.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;

use crate::netlist::{normalize, AnalysisKind};

/// A deadline that is pushed back on every trigger.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Duration>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Arm (or re-arm) the deadline.
    pub fn trigger(&mut self, now: Duration) {
        self.deadline = Some(now + self.delay);
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Check whether the deadline has passed; firing disarms it.
    pub fn poll(&mut self, now: Duration) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}

/// The arguments of one simulator invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationRequest {
    pub kind: AnalysisKind,
    pub netlist: String,
    /// Signals to save, spelled for the simulator
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub signals: Vec<String>,
}

impl SimulationRequest {
    /// Identity of the request for duplicate suppression.
    pub fn signature(&self) -> RunSignature {
        let mut signals: Vec<String> = self.signals.iter().map(|s| s.to_lowercase()).collect();
        signals.sort();
        signals.dedup();
        RunSignature {
            netlist: normalize(&self.netlist),
            signals,
        }
    }

    /// Encode as JSON for the simulator worker.
    pub fn to_json(&self) -> crate::error::Result<String> {
        serde_json::to_string(self).map_err(|source| crate::error::SchemError::Encode { source })
    }
}

/// Normalized netlist text and sorted signal set of a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunSignature {
    pub netlist: String,
    pub signals: Vec<String>,
}

/// Coalesces edits into runs and drops runs that would repeat the last one
/// issued for the same analysis kind.
#[derive(Debug, Clone)]
pub struct RunScheduler {
    debounce: Debouncer,
    last: HashMap<AnalysisKind, RunSignature>,
}

impl RunScheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            debounce: Debouncer::new(delay),
            last: HashMap::new(),
        }
    }

    /// Note an edit; the run fires once edits stop for the debounce delay.
    pub fn trigger(&mut self, now: Duration) {
        self.debounce.trigger(now);
    }

    pub fn is_pending(&self) -> bool {
        self.debounce.is_pending()
    }

    /// Check whether the debounce deadline has passed.
    pub fn due(&mut self, now: Duration) -> bool {
        self.debounce.poll(now)
    }

    /// Record a request about to be issued. Returns `false`, recording
    /// nothing, when it matches the last one issued for its kind.
    pub fn admit(&mut self, request: &SimulationRequest) -> bool {
        let signature = request.signature();
        if self.last.get(&request.kind) == Some(&signature) {
            log::debug!("run: {} unchanged, skipped", request.kind);
            return false;
        }
        self.last.insert(request.kind, signature);
        true
    }

    /// Forget every issued signature so the next run always goes out.
    pub fn reset(&mut self) {
        self.last.clear();
        self.debounce.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    fn request(kind: AnalysisKind, netlist: &str, signals: &[&str]) -> SimulationRequest {
        SimulationRequest {
            kind,
            netlist: netlist.to_string(),
            signals: signals.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_debounce_coalesces() {
        let mut d = Debouncer::new(ms(200));
        d.trigger(ms(0));
        d.trigger(ms(150));
        assert!(!d.poll(ms(300)));
        assert!(d.poll(ms(350)));
        assert!(!d.poll(ms(400)));
        assert!(!d.is_pending());
    }

    #[test]
    fn test_cancel() {
        let mut d = Debouncer::new(ms(350));
        d.trigger(ms(0));
        d.cancel();
        assert!(!d.poll(ms(1000)));
    }

    #[test]
    fn test_signature_ignores_formatting() {
        let a = request(AnalysisKind::Op, "V1 in 0 5\nR1  in 0 1k\n.op\n.end\n", &["v(in)", "i(v1)"]);
        let b = request(AnalysisKind::Op, "* title\nv1 in 0 5\nr1 in 0 1k\n.OP\n.end", &["i(v1)", "v(in)"]);
        assert_eq!(a.signature(), b.signature());
    }

    #[test]
    fn test_admit_skips_repeats_per_kind() {
        let mut runs = RunScheduler::new(ms(200));
        let op = request(AnalysisKind::Op, "V1 in 0 5\n.op\n.end\n", &[]);
        assert!(runs.admit(&op));
        assert!(!runs.admit(&op));

        let mut tran = op.clone();
        tran.kind = AnalysisKind::Tran;
        assert!(runs.admit(&tran));

        let mut changed = op.clone();
        changed.signals.push("v(in)".into());
        assert!(runs.admit(&changed));

        runs.reset();
        assert!(runs.admit(&changed));
    }

    #[test]
    fn test_request_json() {
        let op = request(AnalysisKind::Op, "V1 in 0 5\n.op\n.end\n", &[]);
        assert_eq!(
            op.to_json().unwrap(),
            r#"{"kind":"op","netlist":"V1 in 0 5\n.op\n.end\n"}"#
        );
    }
}

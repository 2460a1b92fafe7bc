//! Canonical signal tokens.
//!
//! Simulators, plots and tables spell the same quantity many ways:
//! `V(out)`, `v:out`, `I(R1)`, `@r1[i]`, `v1#branch`. [`encode`] maps every
//! spelling onto one [`SignalToken`] so the rest of the engine compares
//! tokens, never raw strings.
//!
//! Canonical forms:
//!
//! | Token | Meaning |
//! |-------|---------|
//! | `v:<net>` | voltage of a net against ground |
//! | `vd:<a>,<b>` | differential voltage `V(a) - V(b)` |
//! | `i:<target>` | current through an element or device |
//!
//! Tokens are lowercase and whitespace-free. A differential token whose
//! negative side is ground collapses to the single-ended form.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schematic::GROUND_NET;

/// What a signal token measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Voltage,
    Differential,
    Current,
}

/// A canonical measurable quantity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum SignalToken {
    /// Single-ended node voltage
    Voltage(String),
    /// Differential voltage between two nets (order preserved)
    Differential(String, String),
    /// Branch or device current of a target element
    Current(String),
}

fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

impl SignalToken {
    /// Voltage of a net.
    pub fn voltage(net: &str) -> Self {
        Self::Voltage(normalize(net))
    }

    /// Differential voltage; a ground negative side yields [`SignalToken::Voltage`].
    pub fn differential(pos: &str, neg: &str) -> Self {
        let (pos, neg) = (normalize(pos), normalize(neg));
        if neg == GROUND_NET {
            Self::Voltage(pos)
        } else {
            Self::Differential(pos, neg)
        }
    }

    /// Current through a target.
    pub fn current(target: &str) -> Self {
        Self::Current(normalize(target))
    }

    /// The kind of quantity.
    pub fn kind(&self) -> SignalKind {
        match self {
            Self::Voltage(_) => SignalKind::Voltage,
            Self::Differential(..) => SignalKind::Differential,
            Self::Current(_) => SignalKind::Current,
        }
    }

    /// Nets referenced by a voltage token; empty for currents.
    pub fn nets(&self) -> Vec<&str> {
        match self {
            Self::Voltage(net) => vec![net.as_str()],
            Self::Differential(a, b) => vec![a.as_str(), b.as_str()],
            Self::Current(_) => Vec::new(),
        }
    }

    /// Human-readable label, e.g. `V(out)`, `V(a,b)`, `I(r1)`.
    pub fn label(&self) -> String {
        match self {
            Self::Voltage(net) => format!("V({net})"),
            Self::Differential(a, b) => format!("V({a},{b})"),
            Self::Current(target) => format!("I({target})"),
        }
    }

    /// Spelling understood by the simulator. Device currents use the
    /// `@dev[i]` accessor, element branch currents use `i(x)`.
    pub fn simulator_name(&self, device_current: bool) -> String {
        match self {
            Self::Voltage(net) => format!("v({net})"),
            Self::Differential(a, b) => format!("v({a},{b})"),
            Self::Current(target) if device_current => format!("@{target}[i]"),
            Self::Current(target) => format!("i({target})"),
        }
    }
}

impl fmt::Display for SignalToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Voltage(net) => write!(f, "v:{net}"),
            Self::Differential(a, b) => write!(f, "vd:{a},{b}"),
            Self::Current(target) => write!(f, "i:{target}"),
        }
    }
}

impl From<SignalToken> for String {
    fn from(token: SignalToken) -> Self {
        token.to_string()
    }
}

impl TryFrom<String> for SignalToken {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        decode(&value).ok_or_else(|| format!("not a canonical signal token: {value:?}"))
    }
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

fn pair(s: &str) -> Option<(&str, &str)> {
    let (a, b) = s.split_once(',')?;
    Some((non_empty(a)?, non_empty(b)?))
}

/// Strip a `name(...)` call wrapper, returning the argument text.
fn call_arg<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(name)?.strip_prefix('(')?;
    non_empty(rest.strip_suffix(')')?)
}

/// Parse a canonical token (`v:`, `vd:`, `i:` forms only).
pub fn decode(token: &str) -> Option<SignalToken> {
    let text = normalize(token);
    if let Some(rest) = text.strip_prefix("vd:") {
        let (a, b) = pair(rest)?;
        Some(SignalToken::differential(a, b))
    } else if let Some(rest) = text.strip_prefix("v:") {
        match pair(rest) {
            Some((a, b)) => Some(SignalToken::differential(a, b)),
            None if !rest.contains(',') => Some(SignalToken::Voltage(non_empty(rest)?.to_string())),
            None => None,
        }
    } else if let Some(rest) = text.strip_prefix("i:") {
        Some(SignalToken::Current(non_empty(rest)?.to_string()))
    } else {
        None
    }
}

/// Canonicalize any supported signal spelling.
///
/// Unrecognized text is taken as a net name (`v:<text>`, commas replaced
/// by `_`). Returns `None` only for blank input.
pub fn encode(raw: &str) -> Option<SignalToken> {
    let text = normalize(raw);
    if text.is_empty() {
        return None;
    }
    if let Some(token) = decode(&text) {
        return Some(token);
    }

    // V(a)-V(b)
    if let Some((lhs, rhs)) = text.split_once(")-v(") {
        let pos = lhs.strip_prefix("v(").and_then(non_empty);
        let neg = rhs.strip_suffix(')').and_then(non_empty);
        if let (Some(pos), Some(neg)) = (pos, neg) {
            if !pos.contains(',') && !neg.contains(',') {
                return Some(SignalToken::differential(pos, neg));
            }
        }
    }

    if let Some(arg) = call_arg(&text, "v") {
        if let Some((a, b)) = pair(arg) {
            return Some(SignalToken::differential(a, b));
        }
        if !arg.contains(',') {
            return Some(SignalToken::Voltage(arg.to_string()));
        }
    }

    if let Some(arg) = call_arg(&text, "i") {
        return Some(SignalToken::Current(arg.to_string()));
    }

    if let Some(target) = text
        .strip_prefix('@')
        .and_then(|t| t.strip_suffix("[i]"))
        .and_then(non_empty)
    {
        return Some(SignalToken::Current(target.to_string()));
    }

    if let Some(target) = text.strip_suffix("#branch").and_then(non_empty) {
        return Some(SignalToken::Current(target.to_string()));
    }

    // A comma would read back as a differential pair
    Some(SignalToken::Voltage(text.replace(',', "_")))
}

/// Encode a list of spellings, dropping blanks and repeats (first seen wins).
pub fn encode_all<'a>(raw: impl IntoIterator<Item = &'a str>) -> Vec<SignalToken> {
    let mut tokens: Vec<SignalToken> = Vec::new();
    for token in raw.into_iter().filter_map(encode) {
        if !tokens.contains(&token) {
            tokens.push(token);
        }
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enc(raw: &str) -> String {
        encode(raw).unwrap().to_string()
    }

    #[test]
    fn test_voltage_spellings() {
        assert_eq!(enc("V(out)"), "v:out");
        assert_eq!(enc("v:OUT"), "v:out");
        assert_eq!(enc(" v ( out ) "), "v:out");
        assert_eq!(enc("out"), "v:out");
    }

    #[test]
    fn test_differential_spellings() {
        assert_eq!(enc("V(a,b)"), "vd:a,b");
        assert_eq!(enc("V(a)-V(b)"), "vd:a,b");
        assert_eq!(enc("vd:a,b"), "vd:a,b");
        assert_eq!(enc("v:a,b"), "vd:a,b");
        assert_eq!(enc("V(b,a)"), "vd:b,a");
    }

    #[test]
    fn test_ground_negative_collapses() {
        assert_eq!(encode("V(out,0)"), encode("V(out)"));
        assert_eq!(encode("vd:out,0"), encode("v:out"));
        assert_eq!(encode("V(out)-V(0)"), encode("out"));
        assert_eq!(SignalToken::differential("out", "0"), SignalToken::voltage("out"));
    }

    #[test]
    fn test_current_spellings() {
        assert_eq!(enc("I(R1)"), "i:r1");
        assert_eq!(enc("@r1[i]"), "i:r1");
        assert_eq!(enc("V1#branch"), "i:v1");
        assert_eq!(enc("i:V1"), "i:v1");
    }

    #[test]
    fn test_blank_is_none() {
        assert!(encode("   ").is_none());
        assert!(encode("").is_none());
    }

    #[test]
    fn test_malformed_falls_back_to_net() {
        assert_eq!(enc("v()"), "v:v()");
        assert_eq!(enc("@r1[p]"), "v:@r1[p]");
        assert!(decode("v:").is_none());
        assert!(decode("vd:a").is_none());
    }

    #[test]
    fn test_round_trip_is_stable() {
        for raw in ["V(x)", "I(x)", "@x[i]", "x#branch", "v:x", "vd:a,b", "V(a)-V(b)", "weird", "a,b", "v(a,)", "v:a,"] {
            let once = encode(raw).unwrap();
            let twice = encode(&once.to_string()).unwrap();
            assert_eq!(once, twice, "{raw}");
            assert_eq!(decode(&once.to_string()), Some(once));
        }
    }

    #[test]
    fn test_unrecognized_comma_is_not_a_pair() {
        assert_eq!(encode("a,b"), Some(SignalToken::Voltage("a_b".into())));
        assert_eq!(encode("v(a,)"), Some(SignalToken::Voltage("v(a_)".into())));
    }

    #[test]
    fn test_labels_and_simulator_names() {
        let diff = encode("V(a,b)").unwrap();
        assert_eq!(diff.label(), "V(a,b)");
        assert_eq!(diff.kind(), SignalKind::Differential);
        assert_eq!(diff.nets(), vec!["a", "b"]);
        let cur = encode("I(R1)").unwrap();
        assert_eq!(cur.simulator_name(true), "@r1[i]");
        assert_eq!(cur.simulator_name(false), "i(r1)");
    }

    #[test]
    fn test_encode_all_dedups() {
        let tokens = encode_all(["V(out)", "v:OUT", "", "I(v1)"]);
        assert_eq!(tokens.len(), 2);
    }

    #[test]
    fn test_serde_as_string() {
        let token = encode("V(a,b)").unwrap();
        let json = serde_json::to_string(&token).unwrap();
        assert_eq!(json, "\"vd:a,b\"");
        let back: SignalToken = serde_json::from_str(&json).unwrap();
        assert_eq!(back, token);
    }
}

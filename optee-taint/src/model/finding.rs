use std::fmt;
use std::path::Path;

use sha2::{Digest, Sha256};

/// Which conversation turn produced a finding, used as the precedence
/// order during the global merge (spec.md §5): `End` beats `Middle`
/// beats `Start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// First turn of a chain's conversation.
    Start,
    /// An intermediate turn.
    Middle,
    /// The final turn, carrying the conversation's authoritative verdict.
    End,
}

/// The vulnerability category a finding is classified under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    /// Unencrypted data leaving the TA through an untrusted output parameter.
    Udo,
    /// Insufficiently validated data entering the TA from the untrusted REE.
    Ivw,
    /// Unsafe reuse of a shared-memory buffer across a trust boundary.
    Dus,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Udo => "UDO",
            Self::Ivw => "IVW",
            Self::Dus => "DUS",
        };
        f.write_str(s)
    }
}

/// Severity assigned to a finding by the taint analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational; flagged but unlikely exploitable as written.
    Low,
    /// Exploitable under conditions the model could not fully confirm.
    Medium,
    /// Confirmed exploitable complete path from REE input to sink.
    High,
    /// Confirmed exploitable with no mitigating validation on the path.
    Critical,
}

/// The model's final yes/no/suspected verdict for one candidate flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Confirmed vulnerable.
    Yes,
    /// Confirmed not vulnerable (e.g. sanitized, or guarded by a crypto
    /// primitive that neutralizes the tainted data before the sink).
    No,
    /// The model could not reach a complete-path verdict either way.
    Suspected,
}

/// Width, in lines, of the bucket [`FindingId::derive`] folds `line`
/// into. Matches the global merge's own `±2`-line proximity window
/// (spec.md §5) so two findings that merge into one group also hash
/// to the same id.
pub const LINE_BUCKET_WINDOW: u32 = 2;

/// Stable, content-derived identifier for a [`Finding`].
///
/// 6 bytes (12 hex characters) of a SHA-256 digest over the finding's
/// identity fields, wide enough to make collisions across a single
/// TA's findings set vanishingly unlikely without the churn of a
/// random UUID across re-runs of the same TA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FindingId([u8; 6]);

impl FindingId {
    /// Derives an id from the fields spec.md Testable Property 4
    /// defines as a finding's identity: `(file, function,
    /// primary_rule_id, line_bucket)`. `line` is bucketed rather than
    /// hashed exactly so near-duplicate findings a few lines apart
    /// collapse to the same id instead of each minting their own.
    #[must_use]
    pub fn derive(file: &Path, line: u32, function: &str, rule_id: &str) -> Self {
        let bucket = line / LINE_BUCKET_WINDOW;
        let mut hasher = Sha256::new();
        hasher.update(file.to_string_lossy().as_bytes());
        hasher.update(function.as_bytes());
        hasher.update(rule_id.as_bytes());
        hasher.update(bucket.to_le_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 6];
        bytes.copy_from_slice(&digest[..6]);
        Self(bytes)
    }
}

impl fmt::Display for FindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl serde::Serialize for FindingId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for FindingId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let mut bytes = [0u8; 6];
        for (i, b) in bytes.iter_mut().enumerate() {
            let byte_str = s.get(i * 2..i * 2 + 2).ok_or_else(|| {
                serde::de::Error::custom(format!("finding id `{s}` is not 12 hex characters"))
            })?;
            *b = u8::from_str_radix(byte_str, 16).map_err(serde::de::Error::custom)?;
        }
        Ok(Self(bytes))
    }
}

/// One vulnerability report, after reconciliation, ready for the
/// global merge and final rendering.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Vulnerability {
    /// Category this finding falls under.
    pub category: Category,
    /// Model's verdict.
    pub decision: Decision,
    /// Assigned severity (meaningless when `decision` is `No`).
    pub severity: Severity,
    /// Short machine identifier for the rule that fired, e.g.
    /// `"udo.unencrypted_output"`.
    pub rule_id: String,
    /// Free-text explanation returned by the model.
    pub explanation: String,
    /// Whether the reconciler had to coerce this finding's line number
    /// onto the sink's own line because the model's reported location
    /// didn't resolve to a line in the candidate chain.
    #[serde(default)]
    pub line_coerced: bool,
}

/// A finding as it exists after the global merge: one [`Vulnerability`]
/// plus the bookkeeping needed to render and deduplicate it.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Finding {
    /// Stable identity derived from location + rule.
    pub id: FindingId,
    /// File the finding is anchored to.
    pub file: std::path::PathBuf,
    /// Line the finding is anchored to (after any coercion).
    pub line: u32,
    /// Enclosing function name.
    pub function: String,
    /// Sink function name.
    pub sink_function: String,
    /// The verdict payload.
    pub vulnerability: Vulnerability,
    /// Which conversation phase produced the authoritative copy kept
    /// after merge precedence was applied.
    pub source_phase: Phase,
    /// Identifiers of every chain/candidate-flow this finding was
    /// observed on, accumulated across merges of duplicate findings.
    pub refs: Vec<String>,
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::FindingId;

    #[test]
    fn id_is_stable_across_equal_inputs() {
        let a = FindingId::derive(Path::new("ta/session.c"), 42, "invoke", "udo.x");
        let b = FindingId::derive(Path::new("ta/session.c"), 42, "invoke", "udo.x");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), b.to_string());
    }

    #[test]
    fn id_same_within_line_bucket() {
        // Both lines fall in the same `line / LINE_BUCKET_WINDOW` bucket,
        // so near-duplicate findings a line apart collapse to one id.
        let a = FindingId::derive(Path::new("ta/session.c"), 42, "invoke", "udo.x");
        let b = FindingId::derive(Path::new("ta/session.c"), 43, "invoke", "udo.x");
        assert_eq!(a, b);
    }

    #[test]
    fn id_differs_across_line_bucket_boundary() {
        let a = FindingId::derive(Path::new("ta/session.c"), 42, "invoke", "udo.x");
        let b = FindingId::derive(Path::new("ta/session.c"), 50, "invoke", "udo.x");
        assert_ne!(a, b);
    }

    #[test]
    fn id_round_trips_through_display_and_parse() {
        let id = FindingId::derive(Path::new("ta/session.c"), 7, "f", "r");
        let text = id.to_string();
        assert_eq!(text.len(), 12);
        let parsed: FindingId = serde_json::from_str(&format!("\"{text}\"")).unwrap();
        assert_eq!(id, parsed);
    }
}

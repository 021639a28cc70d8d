//! Data model shared by every phase of the pipeline.
//!
//! Types here are intentionally flat and serde-friendly: every phase
//! writes its output artifact as JSON under the run's results
//! directory, and later phases read it back rather than holding
//! in-memory state across process boundaries (mirrors the teacher's
//! `analyzer/semantic` artifact model).

mod compile;
mod declaration;
mod finding;
mod sink;
mod vd;

pub use compile::CompileEntry;
pub use declaration::{Declaration, DeclarationKind};
pub use finding::{Category, Decision, Finding, FindingId, Phase, Severity, Vulnerability};
pub use sink::{DecisionMethod, Sink, SinkRule};
pub use vd::{CallEdge, CandidateFlow, Chain, VulnerableDestination};

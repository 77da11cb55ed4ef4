//! Agentic question answering over visit transcripts and diagnostics data.

pub mod confidence;
pub mod decision;
pub mod evidence;
pub mod prompts;
pub mod trace;

mod orchestrator;

pub use confidence::{derive_confidence, Confidence};
pub use decision::{extract_query_text, ClarifyDecision, ToolChoice, ToolSelection};
pub use evidence::{EvidenceBundle, SqlEvidence};
pub use orchestrator::{AgenticResponse, Orchestrator};
pub use trace::TraceEntry;

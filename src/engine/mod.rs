//! Epistemic-state derivation engine.
//!
//! Pure functions from breadcrumbs and timestamps to confidence scores,
//! staleness tiers, a recommended action and presentable guidance. Nothing in
//! here touches the database or spawns processes; file-change knowledge comes
//! in through [`oracle::FileChangeOracle`].

pub mod context;
pub mod decay;
pub mod fuzzy;
pub mod guidance;
pub mod oracle;
pub mod state;

pub use context::{build_session_context, BreadcrumbCounts, ContextInputs, SessionContext};
pub use decay::{compute_confidence, FindingConfidence};
pub use fuzzy::{fuzzy_search, RankedResult, SearchItem};
pub use guidance::{build_guidance, partition_findings, Guidance};
pub use oracle::{ChangeSnapshot, FileChangeOracle, NeverChanged};
pub use state::{synthesize_state, EpistemicState};

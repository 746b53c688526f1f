// Extraction job lifecycle: validation, orchestration, history
pub mod error;
pub mod history;
pub mod orchestrator;
pub mod validation;

pub use error::JobError;
pub use orchestrator::{JobEventSink, JobOrchestrator, OrchestratorConfig};
pub use validation::sanitize_subject_label;

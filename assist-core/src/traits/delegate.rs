use crate::models::error::PipelineError;
use crate::models::state::{AssistantState, StreamerState};
use crate::session::assistant::CycleReport;
use crate::session::streamer::StreamReport;

/// Event delegate for the wake-word assistant.
///
/// All methods are called from the assistant thread.
pub trait AssistantDelegate: Send + Sync {
    /// Called on every state transition, including the return to `Idle`.
    fn on_state_changed(&self, state: AssistantState);

    /// Called once per triggered workflow with its outcome.
    fn on_cycle_finished(&self, outcome: &Result<CycleReport, PipelineError>);
}

/// Event delegate for the background image streamer.
///
/// All methods are called from the streamer thread.
pub trait StreamerDelegate: Send + Sync {
    fn on_state_changed(&self, state: StreamerState);

    fn on_iteration_finished(&self, outcome: &Result<StreamReport, PipelineError>);
}

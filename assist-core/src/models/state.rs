/// Wake-word assistant state machine.
///
/// State transitions:
/// ```text
/// idle → listening → triggered → recording → uploading → playing → idle
///           ↓                        ↓            ↓           ↓
///          idle                    idle          idle        idle
/// ```
/// Every failure returns to `Idle`; only the primary task drives these transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssistantState {
    Idle,
    Listening,
    Triggered,
    Recording,
    Uploading,
    Playing,
}

impl AssistantState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Whether the feedback indicator should be lit in this state.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Self::Triggered | Self::Recording | Self::Uploading | Self::Playing
        )
    }

    /// The state reached when the current stage succeeds.
    pub fn next_on_success(&self) -> Self {
        match self {
            Self::Idle => Self::Listening,
            Self::Listening => Self::Triggered,
            Self::Triggered => Self::Recording,
            Self::Recording => Self::Uploading,
            Self::Uploading => Self::Playing,
            Self::Playing => Self::Idle,
        }
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(&self, next: Self) -> bool {
        next == Self::Idle || next == self.next_on_success()
    }
}

/// Background image streamer state, independent of the assistant.
///
/// ```text
/// capturing → uploading → sleeping → capturing ...
///     ↓           ↓
/// capture_failed  sleeping
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamerState {
    Capturing,
    CaptureFailed,
    Uploading,
    Sleeping,
}

impl StreamerState {
    pub fn is_sleeping(&self) -> bool {
        matches!(self, Self::Sleeping)
    }
}

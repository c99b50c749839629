/// Target state definitions for the staged enrichment pipeline
use std::fmt;

/// Position of one target in the escalation pipeline
///
/// Transitions only move forward: a target never re-enters a stage it has
/// left, and no stage is entered before the homepage stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TargetState {
    NotStarted,
    Stage1Homepage,
    Stage2MultiPage,
    Stage3PatternGuess,
    Done,
}

impl TargetState {
    /// Returns true if the state machine may move from `self` to `next`
    pub fn can_transition_to(&self, next: TargetState) -> bool {
        if next <= *self {
            return false;
        }
        !matches!(
            (self, next),
            (Self::NotStarted, Self::Stage2MultiPage) | (Self::NotStarted, Self::Stage3PatternGuess)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Stage number for the three fetch/guess stages
    pub fn stage_number(&self) -> Option<u8> {
        match self {
            Self::Stage1Homepage => Some(1),
            Self::Stage2MultiPage => Some(2),
            Self::Stage3PatternGuess => Some(3),
            Self::NotStarted | Self::Done => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Stage1Homepage => "stage1_homepage",
            Self::Stage2MultiPage => "stage2_multi_page",
            Self::Stage3PatternGuess => "stage3_pattern_guess",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Final outcome of one target's run through the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetStatus {
    /// The required signal was found on the site
    Found,
    /// Only pattern-guessed addresses are available
    Guessed,
    /// Fetched, but nothing matched the required signal and no domain to guess from
    NoSignal,
    /// The homepage could not be reached and no domain to guess from
    Unreachable,
    /// The seed URL could not be parsed
    InvalidSeed,
    /// The run was cancelled before this target finished
    Cancelled,
}

impl TargetStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Found => "found",
            Self::Guessed => "guessed",
            Self::NoSignal => "no_signal",
            Self::Unreachable => "unreachable",
            Self::InvalidSeed => "invalid_seed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "found" => Some(Self::Found),
            "guessed" => Some(Self::Guessed),
            "no_signal" => Some(Self::NoSignal),
            "unreachable" => Some(Self::Unreachable),
            "invalid_seed" => Some(Self::InvalidSeed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn all_statuses() -> Vec<Self> {
        vec![
            Self::Found,
            Self::Guessed,
            Self::NoSignal,
            Self::Unreachable,
            Self::InvalidSeed,
            Self::Cancelled,
        ]
    }
}

impl fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Where a piece of enrichment data came from
///
/// Everything except `PatternGuess` was observed on the target's site and is
/// treated as verified by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SignalSource {
    Stage1,
    Stage2,
    PatternGuess,
}

impl SignalSource {
    pub const PATTERN_GUESS: &'static str = "pattern_guess";

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stage1 => "stage1",
            Self::Stage2 => "stage2",
            Self::PatternGuess => Self::PATTERN_GUESS,
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "stage1" => Some(Self::Stage1),
            "stage2" => Some(Self::Stage2),
            Self::PATTERN_GUESS => Some(Self::PatternGuess),
            _ => None,
        }
    }

    pub fn is_verified(&self) -> bool {
        !matches!(self, Self::PatternGuess)
    }
}

impl fmt::Display for SignalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions_allowed() {
        assert!(TargetState::NotStarted.can_transition_to(TargetState::Stage1Homepage));
        assert!(TargetState::Stage1Homepage.can_transition_to(TargetState::Stage2MultiPage));
        assert!(TargetState::Stage1Homepage.can_transition_to(TargetState::Stage3PatternGuess));
        assert!(TargetState::Stage2MultiPage.can_transition_to(TargetState::Stage3PatternGuess));
        assert!(TargetState::Stage3PatternGuess.can_transition_to(TargetState::Done));
        assert!(TargetState::NotStarted.can_transition_to(TargetState::Done));
    }

    #[test]
    fn test_backward_transitions_rejected() {
        assert!(!TargetState::Stage2MultiPage.can_transition_to(TargetState::Stage1Homepage));
        assert!(!TargetState::Stage3PatternGuess.can_transition_to(TargetState::Stage2MultiPage));
        assert!(!TargetState::Done.can_transition_to(TargetState::Stage1Homepage));
        assert!(!TargetState::Stage1Homepage.can_transition_to(TargetState::Stage1Homepage));
    }

    #[test]
    fn test_later_stages_need_homepage_first() {
        assert!(!TargetState::NotStarted.can_transition_to(TargetState::Stage2MultiPage));
        assert!(!TargetState::NotStarted.can_transition_to(TargetState::Stage3PatternGuess));
    }

    #[test]
    fn test_stage_numbers() {
        assert_eq!(TargetState::Stage1Homepage.stage_number(), Some(1));
        assert_eq!(TargetState::Stage3PatternGuess.stage_number(), Some(3));
        assert_eq!(TargetState::Done.stage_number(), None);
        assert!(TargetState::Done.is_terminal());
    }

    #[test]
    fn test_status_roundtrip_db_string() {
        for status in TargetStatus::all_statuses() {
            let parsed = TargetStatus::from_db_string(status.to_db_string());
            assert_eq!(Some(status), parsed, "Failed roundtrip for {:?}", status);
        }
        assert_eq!(TargetStatus::from_db_string("invalid"), None);
    }

    #[test]
    fn test_signal_source() {
        assert!(SignalSource::Stage1.is_verified());
        assert!(SignalSource::Stage2.is_verified());
        assert!(!SignalSource::PatternGuess.is_verified());
        assert_eq!(SignalSource::PatternGuess.to_string(), "pattern_guess");
        assert_eq!(
            SignalSource::from_db_string("stage2"),
            Some(SignalSource::Stage2)
        );
    }
}

use serde::{Deserialize, Serialize};

/// Where a run currently is; rounds are 0-based
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    RampingUp { round: usize },
    Dispatching { round: usize },
    Aggregating { round: usize },
    Closing,
    Done,
}

impl RunPhase {
    pub fn round(&self) -> Option<usize> {
        match self {
            RunPhase::RampingUp { round }
            | RunPhase::Dispatching { round }
            | RunPhase::Aggregating { round } => Some(*round),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_round() {
        assert_eq!(RunPhase::Dispatching { round: 2 }.round(), Some(2));
        assert_eq!(RunPhase::Closing.round(), None);
        assert_eq!(RunPhase::Aggregating { round: 0 }.round(), Some(0));
    }
}

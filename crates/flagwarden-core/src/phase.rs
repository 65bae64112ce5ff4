//! Match phases and the legal transitions between them.
//!
//! [`MatchPhase`] is a closed set. Which phase may follow which is decided
//! here, once, by [`MatchPhase::can_transition_to`]; the state machine
//! refuses anything else. Phases that end on their own after a fixed
//! duration name their successor through [`timed_successor`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// The phase a match is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MatchPhase {
    /// Players are joining; nothing counts.
    Warmup,
    /// Player introductions before the countdown.
    PlayerIntro,
    /// Short countdown to kick-off.
    Countdown,
    /// Live play.
    InProgress,
    /// Pause between rounds.
    Intermission,
    /// Wrapping up the first half.
    EnteringHalftime,
    /// Halftime break.
    Halftime,
    /// Preparing the second half.
    ExitingHalftime,
    /// Preparing an overtime period.
    EnteringOvertime,
    /// Live overtime play.
    Overtime,
    /// Preparing sudden death.
    EnteringSuddenDeath,
    /// Live play where the next score wins.
    SuddenDeath,
    /// Showing the result of a scoring round.
    RoundScoreSummary,
    /// Blacking out after the summary.
    RoundFadeOut,
    /// Announcing the next round.
    RoundAnnounce,
    /// The match is over. Terminal.
    WaitingPostMatch,
}

impl MatchPhase {
    /// Every phase, in declaration order.
    pub const ALL: [Self; 16] = [
        Self::Warmup,
        Self::PlayerIntro,
        Self::Countdown,
        Self::InProgress,
        Self::Intermission,
        Self::EnteringHalftime,
        Self::Halftime,
        Self::ExitingHalftime,
        Self::EnteringOvertime,
        Self::Overtime,
        Self::EnteringSuddenDeath,
        Self::SuddenDeath,
        Self::RoundScoreSummary,
        Self::RoundFadeOut,
        Self::RoundAnnounce,
        Self::WaitingPostMatch,
    ];

    /// Returns true for phases in which gameplay events count.
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::InProgress | Self::Overtime | Self::SuddenDeath)
    }

    /// Returns true for the terminal phase.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::WaitingPostMatch)
    }

    /// Returns true for phases that last a fixed, configured duration.
    #[must_use]
    pub const fn is_timed(self) -> bool {
        matches!(
            self,
            Self::PlayerIntro
                | Self::Countdown
                | Self::Intermission
                | Self::Halftime
                | Self::RoundScoreSummary
                | Self::RoundFadeOut
                | Self::RoundAnnounce
        )
    }

    /// Returns true if a match in `self` may move to `next`.
    ///
    /// Every non-terminal phase may end the match. Nothing leaves
    /// `WaitingPostMatch`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        use MatchPhase::{
            Countdown, EnteringHalftime, EnteringOvertime, EnteringSuddenDeath, ExitingHalftime,
            Halftime, InProgress, Intermission, Overtime, PlayerIntro, RoundAnnounce,
            RoundFadeOut, RoundScoreSummary, SuddenDeath, WaitingPostMatch, Warmup,
        };
        if self.is_terminal() {
            return false;
        }
        if matches!(next, WaitingPostMatch) {
            return true;
        }
        match self {
            Warmup => matches!(next, PlayerIntro | Countdown),
            PlayerIntro => matches!(next, Countdown),
            Countdown => matches!(next, InProgress | Intermission),
            InProgress => matches!(
                next,
                Intermission | EnteringHalftime | EnteringOvertime | RoundScoreSummary
            ),
            Intermission => matches!(next, InProgress),
            EnteringHalftime => matches!(next, Halftime),
            Halftime => matches!(next, ExitingHalftime),
            ExitingHalftime => matches!(next, InProgress),
            EnteringOvertime => matches!(next, Overtime),
            Overtime => matches!(next, EnteringOvertime | EnteringSuddenDeath),
            EnteringSuddenDeath => matches!(next, SuddenDeath),
            SuddenDeath => false,
            RoundScoreSummary => matches!(next, RoundFadeOut | EnteringOvertime),
            RoundFadeOut => matches!(next, RoundAnnounce),
            RoundAnnounce => matches!(next, Intermission),
            WaitingPostMatch => false,
        }
    }
}

impl fmt::Display for MatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Warmup => "Warmup",
            Self::PlayerIntro => "PlayerIntro",
            Self::Countdown => "Countdown",
            Self::InProgress => "InProgress",
            Self::Intermission => "Intermission",
            Self::EnteringHalftime => "EnteringHalftime",
            Self::Halftime => "Halftime",
            Self::ExitingHalftime => "ExitingHalftime",
            Self::EnteringOvertime => "EnteringOvertime",
            Self::Overtime => "Overtime",
            Self::EnteringSuddenDeath => "EnteringSuddenDeath",
            Self::SuddenDeath => "SuddenDeath",
            Self::RoundScoreSummary => "RoundScoreSummary",
            Self::RoundFadeOut => "RoundFadeOut",
            Self::RoundAnnounce => "RoundAnnounce",
            Self::WaitingPostMatch => "WaitingPostMatch",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Phase epoch
// =============================================================================

/// Serial number of the current phase instance.
///
/// Bumped on every completed transition. Work scheduled during one phase
/// instance carries its epoch and is discarded if the epoch has moved on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct PhaseEpoch(u64);

impl PhaseEpoch {
    /// Returns the following epoch.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw serial.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

// =============================================================================
// Timed successors
// =============================================================================

/// Shape of the pre-game and between-round flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PhaseFlow {
    /// Whether warmup goes through `PlayerIntro`.
    pub play_player_intro: bool,
    /// Whether the countdown leads into an opening intermission.
    pub opening_intermission: bool,
}

/// Returns the phase that follows `current` when its fixed duration runs out.
///
/// `RoundScoreSummary` may instead end the match; that decision needs the
/// scores and belongs to the state machine.
#[must_use]
pub const fn timed_successor(current: MatchPhase, flow: PhaseFlow) -> Option<MatchPhase> {
    match current {
        MatchPhase::PlayerIntro => Some(MatchPhase::Countdown),
        MatchPhase::Countdown => {
            if flow.opening_intermission {
                Some(MatchPhase::Intermission)
            } else {
                Some(MatchPhase::InProgress)
            }
        }
        MatchPhase::Intermission => Some(MatchPhase::InProgress),
        MatchPhase::Halftime => Some(MatchPhase::ExitingHalftime),
        MatchPhase::RoundScoreSummary => Some(MatchPhase::RoundFadeOut),
        MatchPhase::RoundFadeOut => Some(MatchPhase::RoundAnnounce),
        MatchPhase::RoundAnnounce => Some(MatchPhase::Intermission),
        _ => None,
    }
}

/// Returns the phase that follows `Warmup` when the match begins.
#[must_use]
pub const fn opening_phase(flow: PhaseFlow) -> MatchPhase {
    if flow.play_player_intro {
        MatchPhase::PlayerIntro
    } else {
        MatchPhase::Countdown
    }
}

//! Outbound snapshots and presentation cues.
//!
//! Observers never query the engine. They receive a [`MatchSnapshot`]
//! whenever one of its fields changes, plus one-shot [`Cue`]s for things
//! that are not state (announcements, camera focus, freezes).

use serde::{Deserialize, Serialize};

use crate::phase::MatchPhase;
use crate::player::PlayerId;
use crate::team::{TeamId, Winner};

/// State broadcast to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    /// Current phase.
    pub phase: MatchPhase,
    /// Score per team, indexed by team.
    pub team_scores: Vec<u32>,
    /// Whole seconds left on the active countdown, rounded up.
    pub remaining_time: u32,
    /// Current round (0 before the first round starts).
    pub round_number: u32,
    /// Configured number of rounds.
    pub total_rounds: u32,
    /// Team currently holding advantage.
    pub advantage_team: Option<TeamId>,
    /// True only while the match is in the `Intermission` phase.
    pub is_at_intermission: bool,
}

/// Spoken or on-screen announcements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Announcement {
    /// Kick-off countdown started.
    MatchStarting,
    /// A round is about to start.
    RoundStarting {
        /// The upcoming round.
        round: u32,
    },
    /// Objectives can now be picked up.
    FlagsReady,
    /// A team scored.
    Capture {
        /// Scoring team.
        team: TeamId,
        /// Delivering player.
        scorer: PlayerId,
    },
    /// A team won the round.
    RoundWon {
        /// Round winner.
        team: TeamId,
    },
    /// The round ended without a winner.
    RoundDrawn,
    /// Halftime reached.
    Halftime,
    /// Overtime started.
    Overtime,
    /// Sudden death started.
    SuddenDeath,
    /// A team gained advantage.
    AdvantageGained {
        /// The team.
        team: TeamId,
    },
    /// A team lost advantage.
    AdvantageLost {
        /// The team.
        team: TeamId,
    },
    /// A player was brought back in by a teammate's kill.
    Revived {
        /// The revived player.
        player: PlayerId,
    },
    /// Teams traded bases.
    SidesSwapped,
    /// The match is over.
    MatchOver {
        /// Result.
        winner: Winner,
    },
}

/// One-shot presentation instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cue {
    /// Play an announcement.
    Announce(Announcement),
    /// Point every camera at a team's base.
    FocusBase {
        /// The base's team.
        team: TeamId,
    },
    /// Freeze every player.
    FreezePlayers,
    /// Release every player.
    UnfreezePlayers,
    /// Seconds until objectives become available.
    FlagCountdown {
        /// Whole seconds left.
        remaining: u32,
    },
}

/// Receiver for snapshots and cues.
pub trait PresentationSink {
    /// Called with each snapshot that differs from the previous one.
    fn publish(&mut self, snapshot: &MatchSnapshot);

    /// Called with each cue.
    fn cue(&mut self, cue: Cue);
}

/// [`PresentationSink`] that keeps everything it receives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordingSink {
    /// Every published snapshot, oldest first.
    pub snapshots: Vec<MatchSnapshot>,
    /// Every cue, oldest first.
    pub cues: Vec<Cue>,
}

impl RecordingSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recent snapshot.
    #[must_use]
    pub fn last(&self) -> Option<&MatchSnapshot> {
        self.snapshots.last()
    }

    /// Phases in the order they were first published, without repeats.
    #[must_use]
    pub fn phase_history(&self) -> Vec<MatchPhase> {
        let mut phases: Vec<MatchPhase> = Vec::new();
        for snapshot in &self.snapshots {
            if phases.last() != Some(&snapshot.phase) {
                phases.push(snapshot.phase);
            }
        }
        phases
    }

    /// Announcements in order.
    #[must_use]
    pub fn announcements(&self) -> Vec<Announcement> {
        self.cues
            .iter()
            .filter_map(|cue| match cue {
                Cue::Announce(a) => Some(*a),
                _ => None,
            })
            .collect()
    }
}

impl PresentationSink for RecordingSink {
    fn publish(&mut self, snapshot: &MatchSnapshot) {
        self.snapshots.push(snapshot.clone());
    }

    fn cue(&mut self, cue: Cue) {
        self.cues.push(cue);
    }
}

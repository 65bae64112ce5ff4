//! Teams, team records and match outcomes.
//!
//! - [`TeamId`]: zero-based team index
//! - [`TeamRecord`]: per-team score and round bookkeeping
//! - [`Winner`] / [`MatchOutcome`]: how a finished match was decided

use serde::{Deserialize, Serialize};
use std::fmt;

/// Zero-based team index.
///
/// # Example
///
/// ```
/// use flagwarden_core::team::TeamId;
///
/// let red = TeamId::new(0);
/// let blue = TeamId::new(1);
/// assert!(red < blue);
/// assert_eq!(blue.index(), 1);
/// ```
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TeamId(u8);

impl TeamId {
    /// Team 0, conventionally red.
    pub const RED: Self = Self(0);
    /// Team 1, conventionally blue.
    pub const BLUE: Self = Self(1);

    /// Creates a team id from its index.
    #[must_use]
    pub const fn new(index: u8) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self.0
    }

    /// Returns the index as a `usize`, for indexing team tables.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TeamId({})", self.0)
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            0 => write!(f, "red"),
            1 => write!(f, "blue"),
            n => write!(f, "team{n}"),
        }
    }
}

impl From<u8> for TeamId {
    fn from(index: u8) -> Self {
        Self::new(index)
    }
}

// =============================================================================
// TeamRecord
// =============================================================================

/// Score and round bookkeeping for one team.
///
/// The score can only grow through [`TeamRecord::add_score`]; the only way
/// back down is an explicit [`TeamRecord::reset`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRecord {
    team: TeamId,
    score: u32,
    round_wins: u32,
    time_bonus: u32,
    wins_round: bool,
}

impl TeamRecord {
    /// Creates a zeroed record.
    #[must_use]
    pub const fn new(team: TeamId) -> Self {
        Self {
            team,
            score: 0,
            round_wins: 0,
            time_bonus: 0,
            wins_round: false,
        }
    }

    /// The team this record belongs to.
    #[must_use]
    pub const fn team(&self) -> TeamId {
        self.team
    }

    /// Current score.
    #[must_use]
    pub const fn score(&self) -> u32 {
        self.score
    }

    /// Rounds won so far.
    #[must_use]
    pub const fn round_wins(&self) -> u32 {
        self.round_wins
    }

    /// Seconds of time bonus banked from attacking wins; breaks ties on
    /// points.
    #[must_use]
    pub const fn time_bonus(&self) -> u32 {
        self.time_bonus
    }

    /// True while this team is flagged as the winner of the round that just
    /// ended.
    #[must_use]
    pub const fn wins_round(&self) -> bool {
        self.wins_round
    }

    /// Adds `points` to the score and returns the new total.
    pub fn add_score(&mut self, points: u32) -> u32 {
        self.score = self.score.saturating_add(points);
        self.score
    }

    /// Banks `seconds` of time bonus.
    pub fn add_time_bonus(&mut self, seconds: u32) {
        self.time_bonus = self.time_bonus.saturating_add(seconds);
    }

    /// Credits a round win and raises the `wins_round` flag.
    pub fn award_round(&mut self) {
        self.round_wins += 1;
        self.wins_round = true;
    }

    /// Lowers the `wins_round` flag at the start of a new round.
    pub fn clear_round_flag(&mut self) {
        self.wins_round = false;
    }

    /// Explicit reset back to zero.
    pub fn reset(&mut self) {
        self.score = 0;
        self.round_wins = 0;
        self.time_bonus = 0;
        self.wins_round = false;
    }
}

// =============================================================================
// Outcome
// =============================================================================

/// Who won a finished match.
///
/// `NoWinner` is an explicit sentinel; a draw is never reported as team 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winner {
    /// A single team won.
    Team(TeamId),
    /// The match ended without a winner.
    NoWinner,
}

impl Winner {
    /// Returns the winning team, if any.
    #[must_use]
    pub const fn team(self) -> Option<TeamId> {
        match self {
            Self::Team(team) => Some(team),
            Self::NoWinner => None,
        }
    }
}

impl From<Option<TeamId>> for Winner {
    fn from(team: Option<TeamId>) -> Self {
        team.map_or(Self::NoWinner, Self::Team)
    }
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Team(team) => write!(f, "{team}"),
            Self::NoWinner => write!(f, "no winner"),
        }
    }
}

/// Why a match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    /// A team reached the goal score.
    GoalScore,
    /// A team's lead reached the mercy threshold.
    MercyRule,
    /// Regulation or overtime ran out.
    TimeLimit,
    /// A capture during overtime.
    GoldenCap,
    /// The first score during sudden death.
    SuddenDeath,
    /// Every other team ran out of lives in a deciding round.
    Elimination,
    /// The final round was played.
    RoundLimit,
    /// The trailing team could no longer catch up in the rounds left.
    Clinched,
    /// Forced by an operator.
    AdminForced,
    /// A round could not be set up, so the match was abandoned.
    SetupFailed,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::GoalScore => "goal score reached",
            Self::MercyRule => "mercy rule",
            Self::TimeLimit => "time limit",
            Self::GoldenCap => "golden cap",
            Self::SuddenDeath => "sudden death",
            Self::Elimination => "elimination",
            Self::RoundLimit => "round limit",
            Self::Clinched => "clinched",
            Self::AdminForced => "forced by admin",
            Self::SetupFailed => "round setup failed",
        };
        f.write_str(text)
    }
}

/// Final result of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchOutcome {
    /// Who won.
    pub winner: Winner,
    /// How it was decided.
    pub reason: EndReason,
}

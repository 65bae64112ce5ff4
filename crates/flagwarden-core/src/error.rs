//! Error types for the match engine.
//!
//! - [`ConfigError`]: the match cannot start (or a round cannot be set up)
//!   until an operator fixes the configuration
//! - [`EventError`]: an inbound gameplay event was refused
//! - [`TransitionError`]: a phase request was refused

use thiserror::Error;

use crate::objective::SiteId;
use crate::phase::MatchPhase;
use crate::player::PlayerId;
use crate::team::TeamId;

/// Fatal configuration problems.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Fewer than two teams.
    #[error("a match needs at least two teams, got {teams}")]
    TooFewTeams {
        /// Configured team count.
        teams: u8,
    },

    /// A team has no base on the objective board.
    #[error("no base registered for team {team}")]
    MissingBase {
        /// The team without a base.
        team: TeamId,
    },

    /// The variant needs a neutral dispenser and none is registered.
    #[error("no neutral objective dispenser registered")]
    MissingDispenser,

    /// Round settings are missing or contradictory.
    #[error("invalid round configuration: {reason}")]
    InvalidRounds {
        /// What is wrong.
        reason: &'static str,
    },

    /// A duration is negative or not finite.
    #[error("invalid duration for {field}: {value}")]
    InvalidDuration {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// A capture would be worth nothing.
    #[error("flag_cap_score must be at least 1")]
    ZeroCapScore,
}

/// Reasons an inbound event was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    /// The current phase does not accept this event.
    #[error("event not accepted during {phase}")]
    WrongPhase {
        /// Phase at the time of submission.
        phase: MatchPhase,
    },

    /// The match is already decided.
    #[error("match is over")]
    MatchOver,

    /// The player is not in the directory or has no team.
    #[error("unknown player {player}")]
    UnknownPlayer {
        /// The offending player.
        player: PlayerId,
    },

    /// The site is not on the board, or carries no objective right now.
    #[error("no live objective at site {site}")]
    UnknownObjective {
        /// The offending site.
        site: SiteId,
    },

    /// The player does not carry the objective.
    #[error("player {player} is not carrying the objective from site {site}")]
    NotHolder {
        /// The player named in the event.
        player: PlayerId,
        /// The objective's site.
        site: SiteId,
    },

    /// The objective is not being carried.
    #[error("objective from site {site} is not being carried")]
    NotCarried {
        /// The objective's site.
        site: SiteId,
    },

    /// The pickup, return or delivery breaks the variant's rules.
    #[error("player {player} may not do that with the objective from site {site}")]
    NotEligible {
        /// The player named in the event.
        player: PlayerId,
        /// The objective's site.
        site: SiteId,
    },
}

/// Reasons a phase request was refused.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransitionError {
    /// The phase table does not allow this move.
    #[error("illegal transition {from} -> {to}")]
    Illegal {
        /// Current phase.
        from: MatchPhase,
        /// Requested phase.
        to: MatchPhase,
    },

    /// The match is over; nothing follows `WaitingPostMatch`.
    #[error("match is over, cannot enter {to}")]
    Terminal {
        /// Requested phase.
        to: MatchPhase,
    },

    /// Live play cannot start with the current setup.
    #[error("cannot start live play: {0}")]
    Config(#[from] ConfigError),
}

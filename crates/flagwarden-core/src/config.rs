//! Match configuration.
//!
//! One [`MatchConfig`] describes every variant. The variant picks the round
//! strategy and the pickup rule; everything else is a plain knob.
//!
//! # Example
//!
//! ```
//! use flagwarden_core::config::{MatchConfig, Variant};
//!
//! let config = MatchConfig::round_ctf();
//! assert_eq!(config.variant, Variant::RoundCtf);
//! assert_eq!(config.total_rounds, 6);
//! assert!(config.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ConfigError;
use crate::objective::PickupRule;
use crate::phase::PhaseFlow;

/// Match variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    /// Classic capture the flag: two halves, enemy flag pickup.
    Ctf,
    /// Round-based capture the flag with lives per round.
    RoundCtf,
    /// Round-based play around a single neutral flag dispenser.
    Gauntlet,
    /// Rounds of attack and defense: one team runs its own flag to the
    /// other's base, then the roles swap.
    FlagRun,
}

impl Variant {
    /// Returns true for round-based variants.
    #[must_use]
    pub const fn is_round_based(self) -> bool {
        matches!(self, Self::RoundCtf | Self::Gauntlet | Self::FlagRun)
    }

    /// Who may pick up an objective in this variant.
    #[must_use]
    pub const fn pickup_rule(self) -> PickupRule {
        match self {
            Self::Ctf => PickupRule::EnemyOnly,
            Self::RoundCtf | Self::FlagRun => PickupRule::FriendlyOnly,
            Self::Gauntlet => PickupRule::Anyone,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ctf => write!(f, "ctf"),
            Self::RoundCtf => write!(f, "round-ctf"),
            Self::Gauntlet => write!(f, "gauntlet"),
            Self::FlagRun => write!(f, "flag-run"),
        }
    }
}

/// Configuration for one match.
///
/// Durations are seconds. A `time_limit` or `overtime_duration` of zero
/// means the period has no time limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Variant, selects the round strategy.
    pub variant: Variant,
    /// Number of teams.
    pub num_teams: u8,

    // Scoring
    /// Score that ends the match immediately (0 disables).
    pub goal_score: u32,
    /// Lead that ends the match immediately (0 disables).
    pub mercy_score: u32,
    /// Points per capture. Flag run pays this for a late capture.
    pub flag_cap_score: u32,
    /// Flag run: points for a capture with at least `gold_bonus_threshold`
    /// seconds left.
    pub gold_score: u32,
    /// Flag run: points for a capture with at least `silver_bonus_threshold`
    /// seconds left.
    pub silver_score: u32,
    /// Flag run: points for holding out until the round clock runs out.
    pub defense_score: u32,
    /// Flag run: whole seconds left that earn the gold score.
    pub gold_bonus_threshold: u32,
    /// Flag run: whole seconds left that earn the silver score.
    pub silver_bonus_threshold: u32,
    /// Flag run: cap on the time bonus one attacking win adds to the
    /// tiebreak.
    pub max_time_bonus: u32,

    // Clock
    /// Length of each half, round or regulation period.
    pub time_limit: f64,
    /// Whether single-round play is split into two halves.
    pub halftime_enabled: bool,
    /// Length of the halftime break.
    pub halftime_duration: f64,
    /// Whether a tie at the end of the deciding period goes to overtime.
    pub allow_overtime: bool,
    /// Length of each overtime period.
    pub overtime_duration: f64,
    /// Whether a tied overtime goes to sudden death instead of another period.
    pub sudden_death_enabled: bool,

    // Rounds
    /// Whether the match is played in rounds.
    pub rounds_enabled: bool,
    /// Number of regulation rounds (0 means unbounded, goal score only).
    pub total_rounds: u32,
    /// Lives each player starts a round with (0 disables lives).
    pub lives_per_player: u32,
    /// Whole seconds between round start and objectives becoming available.
    pub flag_pickup_delay: u32,
    /// Length of the pause between rounds.
    pub intermission_duration: f64,
    /// Length of the opening intermission before round 1.
    pub first_intermission_duration: f64,
    /// Whether teams trade bases once, midway through the match.
    pub side_swap_enabled: bool,

    // Advantage
    /// Whether the advantage rule may extend a half.
    pub advantage_enabled: bool,
    /// Length of the advantage window.
    pub advantage_duration: f64,
    /// Seconds a contested hold may persist before advantage is revoked.
    pub advantage_grace: u32,

    // Presentation phases
    /// Whether the match opens with player introductions.
    pub play_player_intro: bool,
    /// Length of the player introductions.
    pub player_intro_duration: f64,
    /// Length of the kick-off countdown.
    pub countdown_duration: f64,
    /// Length of the round score summary.
    pub score_summary_duration: f64,
    /// Length of the fade to black.
    pub fade_out_duration: f64,
    /// Length of the round announcement.
    pub round_announce_duration: f64,

    // Objectives
    /// Seconds before a dropped objective returns home on its own.
    pub auto_return_delay: f64,
    /// Distance within which a player standing on a spawn point touches it.
    pub touch_radius: f32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self::ctf()
    }
}

impl MatchConfig {
    /// Classic two-half capture the flag.
    #[must_use]
    pub fn ctf() -> Self {
        Self {
            variant: Variant::Ctf,
            num_teams: 2,
            goal_score: 0,
            mercy_score: 5,
            flag_cap_score: 1,
            gold_score: 3,
            silver_score: 2,
            defense_score: 1,
            gold_bonus_threshold: 120,
            silver_bonus_threshold: 60,
            max_time_bonus: 180,
            time_limit: 600.0,
            halftime_enabled: true,
            halftime_duration: 15.0,
            allow_overtime: true,
            overtime_duration: 300.0,
            sudden_death_enabled: false,
            rounds_enabled: false,
            total_rounds: 0,
            lives_per_player: 0,
            flag_pickup_delay: 0,
            intermission_duration: 0.0,
            first_intermission_duration: 0.0,
            side_swap_enabled: true,
            advantage_enabled: true,
            advantage_duration: 60.0,
            advantage_grace: 5,
            play_player_intro: false,
            player_intro_duration: 8.0,
            countdown_duration: 5.0,
            score_summary_duration: 6.0,
            fade_out_duration: 1.5,
            round_announce_duration: 3.5,
            auto_return_delay: 8.0,
            touch_radius: 1.5,
        }
    }

    /// Round-based capture the flag: six rounds, five lives each.
    #[must_use]
    pub fn round_ctf() -> Self {
        Self {
            variant: Variant::RoundCtf,
            time_limit: 300.0,
            halftime_enabled: false,
            rounds_enabled: true,
            total_rounds: 6,
            lives_per_player: 5,
            flag_pickup_delay: 10,
            intermission_duration: 28.0,
            first_intermission_duration: 6.0,
            advantage_enabled: false,
            ..Self::ctf()
        }
    }

    /// Gauntlet: first to three captures of the neutral flag.
    #[must_use]
    pub fn gauntlet() -> Self {
        Self {
            variant: Variant::Gauntlet,
            goal_score: 3,
            time_limit: 300.0,
            halftime_enabled: false,
            allow_overtime: false,
            rounds_enabled: true,
            total_rounds: 0,
            lives_per_player: 3,
            flag_pickup_delay: 15,
            intermission_duration: 10.0,
            first_intermission_duration: 6.0,
            side_swap_enabled: false,
            advantage_enabled: false,
            ..Self::ctf()
        }
    }

    /// Flag run: six rounds of alternating attack and defense, decided on
    /// points with the time bonus as tiebreak.
    #[must_use]
    pub fn flag_run() -> Self {
        Self {
            variant: Variant::FlagRun,
            mercy_score: 0,
            time_limit: 300.0,
            halftime_enabled: false,
            allow_overtime: false,
            rounds_enabled: true,
            total_rounds: 6,
            lives_per_player: 5,
            flag_pickup_delay: 20,
            intermission_duration: 28.0,
            first_intermission_duration: 6.0,
            side_swap_enabled: false,
            advantage_enabled: false,
            ..Self::ctf()
        }
    }

    /// Preset for `variant`.
    #[must_use]
    pub fn for_variant(variant: Variant) -> Self {
        match variant {
            Variant::Ctf => Self::ctf(),
            Variant::RoundCtf => Self::round_ctf(),
            Variant::Gauntlet => Self::gauntlet(),
            Variant::FlagRun => Self::flag_run(),
        }
    }

    /// Pre-game and between-round flow derived from this configuration.
    #[must_use]
    pub const fn phase_flow(&self) -> PhaseFlow {
        PhaseFlow {
            play_player_intro: self.play_player_intro,
            opening_intermission: self.rounds_enabled,
        }
    }

    /// Returns true if the advantage rule can apply. Never for flag run.
    #[must_use]
    pub const fn advantage_applies(&self) -> bool {
        self.advantage_enabled && self.num_teams == 2 && !matches!(self.variant, Variant::FlagRun)
    }

    /// Checks the configuration for problems that would stop a match.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_teams < 2 {
            return Err(ConfigError::TooFewTeams {
                teams: self.num_teams,
            });
        }
        if self.flag_cap_score == 0 {
            return Err(ConfigError::ZeroCapScore);
        }

        let durations = [
            ("time_limit", self.time_limit),
            ("halftime_duration", self.halftime_duration),
            ("overtime_duration", self.overtime_duration),
            ("intermission_duration", self.intermission_duration),
            ("first_intermission_duration", self.first_intermission_duration),
            ("advantage_duration", self.advantage_duration),
            ("player_intro_duration", self.player_intro_duration),
            ("countdown_duration", self.countdown_duration),
            ("score_summary_duration", self.score_summary_duration),
            ("fade_out_duration", self.fade_out_duration),
            ("round_announce_duration", self.round_announce_duration),
            ("auto_return_delay", self.auto_return_delay),
        ];
        for (field, value) in durations {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidDuration { field, value });
            }
        }
        if !self.touch_radius.is_finite() || self.touch_radius < 0.0 {
            return Err(ConfigError::InvalidDuration {
                field: "touch_radius",
                value: f64::from(self.touch_radius),
            });
        }

        if self.variant.is_round_based() != self.rounds_enabled {
            return Err(ConfigError::InvalidRounds {
                reason: "rounds_enabled must match the variant",
            });
        }
        if self.rounds_enabled {
            if self.total_rounds == 0 && self.goal_score == 0 {
                return Err(ConfigError::InvalidRounds {
                    reason: "unbounded rounds need a goal score",
                });
            }
            if matches!(self.variant, Variant::RoundCtf | Variant::FlagRun)
                && self.total_rounds == 0
            {
                return Err(ConfigError::InvalidRounds {
                    reason: "round ctf and flag run need total_rounds",
                });
            }
        }
        if self.variant == Variant::FlagRun {
            if self.num_teams != 2 {
                return Err(ConfigError::InvalidRounds {
                    reason: "flag run is played by exactly two teams",
                });
            }
            if self.allow_overtime {
                return Err(ConfigError::InvalidRounds {
                    reason: "flag run is decided on points, overtime is not supported",
                });
            }
            if self.silver_bonus_threshold > self.gold_bonus_threshold {
                return Err(ConfigError::InvalidRounds {
                    reason: "silver_bonus_threshold is above gold_bonus_threshold",
                });
            }
        }
        Ok(())
    }
}

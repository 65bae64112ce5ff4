//! Round boundaries.
//!
//! [`RoundLifecycleController`] owns the [`RoundRecord`] and performs the
//! side effects that happen when a round starts or ends: lives are reset,
//! objectives are withdrawn and re-released after the pickup delay, players
//! are frozen, and sides are swapped once. What differs between variants is
//! behind the [`RoundStrategy`] trait.
//!
//! The controller never changes the match phase. It reports what happened
//! and the state machine decides where to go next.

use std::fmt;

use cadence::TimerHandle;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::{MatchConfig, Variant};
use crate::error::ConfigError;
use crate::objective::{ObjectiveBoard, PickupRule, SiteId};
use crate::player::{PlayerDirectory, PlayerFlags, PlayerId};
use crate::presentation::{Announcement, Cue, PresentationSink};
use crate::team::{TeamId, TeamRecord};

// =============================================================================
// RoundRecord
// =============================================================================

/// Round counters and per-round settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundRecord {
    round_number: u32,
    total_rounds: u32,
    lives_per_player: u32,
    flag_pickup_delay: u32,
}

impl RoundRecord {
    /// Current round, 1-based. Zero before the first round starts.
    #[must_use]
    pub const fn round_number(&self) -> u32 {
        self.round_number
    }

    /// Configured number of rounds (0 means unbounded).
    #[must_use]
    pub const fn total_rounds(&self) -> u32 {
        self.total_rounds
    }

    /// Lives each player starts a round with.
    #[must_use]
    pub const fn lives_per_player(&self) -> u32 {
        self.lives_per_player
    }

    /// Seconds before objectives are released.
    #[must_use]
    pub const fn flag_pickup_delay(&self) -> u32 {
        self.flag_pickup_delay
    }

    /// Returns true once the last regulation round has started.
    #[must_use]
    pub const fn is_final_round(&self) -> bool {
        self.total_rounds > 0 && self.round_number >= self.total_rounds
    }
}

// =============================================================================
// RoundStrategy
// =============================================================================

/// Variant-specific round behavior.
pub trait RoundStrategy: fmt::Debug + Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Whether the board needs a dispenser.
    fn needs_dispenser(&self) -> bool {
        false
    }

    /// Puts objectives back for a fresh round.
    ///
    /// Returns auto-return timers that must be cancelled.
    fn reset_objectives(&self, board: &mut ObjectiveBoard) -> Vec<TimerHandle>;

    /// Makes objectives available for `round`. Returns the sites now in play.
    fn release_objectives(&self, board: &mut ObjectiveBoard, round: u32) -> Vec<SiteId>;

    /// Whether round wins go through the score summary sub-phases.
    fn routes_through_summary(&self) -> bool {
        false
    }

    /// Whether an opposing kill brings back an eliminated teammate.
    fn revives_on_kill(&self) -> bool {
        false
    }

    /// Round after which sides are swapped, if any.
    fn swap_after_round(&self, _total_rounds: u32) -> Option<u32> {
        None
    }

    /// The team on attack in `round`, for variants with fixed roles.
    fn attacker(&self, _round: u32) -> Option<TeamId> {
        None
    }

    /// The team on defense in `round`, for variants with fixed roles.
    fn defender(&self, _round: u32) -> Option<TeamId> {
        None
    }

    /// Whether members of `team` spend lives when killed in `round`.
    fn loses_lives(&self, _team: TeamId, _round: u32) -> bool {
        true
    }
}

/// Classic single-round play. Objectives are always available.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleRound;

impl RoundStrategy for SingleRound {
    fn name(&self) -> &'static str {
        "single-round"
    }

    fn reset_objectives(&self, board: &mut ObjectiveBoard) -> Vec<TimerHandle> {
        let stale = board.reset_all();
        board.set_all_pickup(true);
        stale
    }

    fn release_objectives(&self, board: &mut ObjectiveBoard, _round: u32) -> Vec<SiteId> {
        board.set_all_pickup(true);
        board.live_objectives()
    }
}

/// Round-based capture the flag: each base re-arms its own flag per round.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoundCtf;

impl RoundStrategy for RoundCtf {
    fn name(&self) -> &'static str {
        "round-ctf"
    }

    fn reset_objectives(&self, board: &mut ObjectiveBoard) -> Vec<TimerHandle> {
        let stale = board.reset_all();
        board.set_all_pickup(false);
        stale
    }

    fn release_objectives(&self, board: &mut ObjectiveBoard, _round: u32) -> Vec<SiteId> {
        board.set_all_pickup(true);
        board.live_objectives()
    }

    fn swap_after_round(&self, total_rounds: u32) -> Option<u32> {
        (total_rounds >= 2).then_some(total_rounds / 2)
    }
}

/// Gauntlet: a neutral dispenser creates the flag; bases only score.
#[derive(Debug, Clone, Copy, Default)]
pub struct Gauntlet;

impl RoundStrategy for Gauntlet {
    fn name(&self) -> &'static str {
        "gauntlet"
    }

    fn needs_dispenser(&self) -> bool {
        true
    }

    fn reset_objectives(&self, board: &mut ObjectiveBoard) -> Vec<TimerHandle> {
        let stale = board.reset_all();
        board.set_all_pickup(false);
        stale
    }

    fn release_objectives(&self, board: &mut ObjectiveBoard, _round: u32) -> Vec<SiteId> {
        board.dispense_all();
        board.set_all_pickup(true);
        board
            .live_objectives()
            .into_iter()
            .filter(|site| board.site(*site).is_some_and(|s| s.is_dispenser()))
            .collect()
    }

    fn routes_through_summary(&self) -> bool {
        true
    }

    fn revives_on_kill(&self) -> bool {
        true
    }
}

/// Flag run: each round one team carries its own flag to the other's base.
///
/// Red attacks odd rounds and blue even ones. The defending flag stays
/// locked at home, and only the defense spends lives.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlagRun;

impl RoundStrategy for FlagRun {
    fn name(&self) -> &'static str {
        "flag-run"
    }

    fn reset_objectives(&self, board: &mut ObjectiveBoard) -> Vec<TimerHandle> {
        let stale = board.reset_all();
        board.set_all_pickup(false);
        stale
    }

    fn release_objectives(&self, board: &mut ObjectiveBoard, round: u32) -> Vec<SiteId> {
        let Some(site) = self.attacker(round).and_then(|team| board.base_of(team)) else {
            return Vec::new();
        };
        match board.objective_mut(site) {
            Some(objective) => {
                objective.set_pickup_enabled(true);
                vec![site]
            }
            None => Vec::new(),
        }
    }

    fn attacker(&self, round: u32) -> Option<TeamId> {
        match round {
            0 => None,
            n if n % 2 == 1 => Some(TeamId::RED),
            _ => Some(TeamId::BLUE),
        }
    }

    fn defender(&self, round: u32) -> Option<TeamId> {
        self.attacker(round).map(|attacker| {
            if attacker == TeamId::RED {
                TeamId::BLUE
            } else {
                TeamId::RED
            }
        })
    }

    fn loses_lives(&self, team: TeamId, round: u32) -> bool {
        self.defender(round) == Some(team)
    }
}

/// Strategy for `variant`.
#[must_use]
pub fn strategy_for(variant: Variant) -> Box<dyn RoundStrategy> {
    match variant {
        Variant::Ctf => Box::new(SingleRound),
        Variant::RoundCtf => Box::new(RoundCtf),
        Variant::Gauntlet => Box::new(Gauntlet),
        Variant::FlagRun => Box::new(FlagRun),
    }
}

// =============================================================================
// Flag countdown
// =============================================================================

/// Result of one flag countdown step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownStep {
    /// Still counting; whole seconds left.
    Continue(u32),
    /// Reached zero; objectives should be released.
    Finished,
    /// No countdown is running.
    Idle,
}

/// What [`RoundLifecycleController::init_round`] set up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundStart {
    /// The round that just started.
    pub round: u32,
    /// Auto-return timers to cancel.
    pub stale_timers: Vec<TimerHandle>,
    /// True if the pickup countdown is running; false means objectives must
    /// be released right away.
    pub countdown: bool,
    /// True if sides were swapped for this round.
    pub swapped: bool,
}

// =============================================================================
// RoundLifecycleController
// =============================================================================

/// Side effects bound to round boundaries.
#[derive(Debug)]
pub struct RoundLifecycleController {
    record: RoundRecord,
    strategy: Box<dyn RoundStrategy>,
    pickup_rule: PickupRule,
    num_teams: u8,
    touch_radius: f32,
    side_swap_enabled: bool,
    sides_swapped: bool,
    at_intermission: bool,
    flag_countdown: Option<u32>,
    eliminated: Vec<PlayerId>,
}

impl RoundLifecycleController {
    /// Creates a controller for `config`, with the variant's strategy.
    #[must_use]
    pub fn new(config: &MatchConfig) -> Self {
        Self::with_strategy(config, strategy_for(config.variant))
    }

    /// Creates a controller with an explicit strategy.
    #[must_use]
    pub fn with_strategy(config: &MatchConfig, strategy: Box<dyn RoundStrategy>) -> Self {
        Self {
            record: RoundRecord {
                round_number: 0,
                total_rounds: config.total_rounds,
                lives_per_player: config.lives_per_player,
                flag_pickup_delay: config.flag_pickup_delay,
            },
            strategy,
            pickup_rule: config.variant.pickup_rule(),
            num_teams: config.num_teams,
            touch_radius: config.touch_radius,
            side_swap_enabled: config.side_swap_enabled,
            sides_swapped: false,
            at_intermission: false,
            flag_countdown: None,
            eliminated: Vec::new(),
        }
    }

    /// The round record.
    #[must_use]
    pub const fn record(&self) -> &RoundRecord {
        &self.record
    }

    /// The active strategy.
    #[must_use]
    pub fn strategy(&self) -> &dyn RoundStrategy {
        self.strategy.as_ref()
    }

    /// True between the end of a round and the start of the next.
    #[must_use]
    pub const fn is_at_intermission(&self) -> bool {
        self.at_intermission
    }

    /// Seconds left on the pickup countdown.
    #[must_use]
    pub const fn flag_countdown(&self) -> Option<u32> {
        self.flag_countdown
    }

    /// Returns true once sides have been swapped.
    #[must_use]
    pub const fn sides_swapped(&self) -> bool {
        self.sides_swapped
    }

    /// The team on attack this round, for variants with fixed roles.
    #[must_use]
    pub fn attacker(&self) -> Option<TeamId> {
        self.strategy.attacker(self.record.round_number)
    }

    /// The team on defense this round, for variants with fixed roles.
    #[must_use]
    pub fn defender(&self) -> Option<TeamId> {
        self.strategy.defender(self.record.round_number)
    }

    /// Attackers of the regulation rounds still to be played, in order.
    #[must_use]
    pub fn upcoming_attackers(&self) -> Vec<TeamId> {
        (self.record.round_number + 1..=self.record.total_rounds)
            .filter_map(|round| self.strategy.attacker(round))
            .collect()
    }

    /// Whether members of `team` spend lives when killed this round.
    #[must_use]
    pub fn loses_lives(&self, team: TeamId) -> bool {
        self.strategy.loses_lives(team, self.record.round_number)
    }

    /// Checks that the board has everything a round needs.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingBase`] or [`ConfigError::MissingDispenser`].
    pub fn check_ready(&self, board: &ObjectiveBoard) -> Result<(), ConfigError> {
        board.validate(self.num_teams, self.strategy.needs_dispenser())
    }

    /// Starts the next round.
    ///
    /// Increments the round number, restores lives, withdraws objectives
    /// and starts the pickup countdown.
    ///
    /// # Errors
    ///
    /// Aborts without touching anything if a base or dispenser is missing.
    pub fn init_round(
        &mut self,
        board: &mut ObjectiveBoard,
        teams: &mut [TeamRecord],
        players: &mut dyn PlayerDirectory,
        sink: &mut dyn PresentationSink,
    ) -> Result<RoundStart, ConfigError> {
        if let Err(err) = self.check_ready(board) {
            error!(%err, round = self.record.round_number + 1, "round setup aborted");
            return Err(err);
        }

        let swapped = self
            .strategy
            .swap_after_round(self.record.total_rounds)
            .is_some_and(|half| half == self.record.round_number)
            && self.swap_sides_if_configured(board, sink);

        self.record.round_number += 1;
        self.at_intermission = false;
        self.eliminated.clear();
        for team in teams.iter_mut() {
            team.clear_round_flag();
        }

        let lives = self.record.lives_per_player;
        for player in players.player_ids() {
            if players.team_of(player).is_none() {
                continue;
            }
            players.set_lives(player, lives);
            let mut flags = players.flags(player);
            flags.remove(PlayerFlags::OUT_OF_LIVES | PlayerFlags::FROZEN);
            players.set_flags(player, flags);
        }

        let stale_timers = self.strategy.reset_objectives(board);
        let delay = self.record.flag_pickup_delay;
        self.flag_countdown = (delay > 0).then_some(delay);
        if delay > 0 {
            sink.cue(Cue::FlagCountdown { remaining: delay });
        }
        sink.cue(Cue::UnfreezePlayers);
        sink.cue(Cue::Announce(Announcement::RoundStarting {
            round: self.record.round_number,
        }));

        info!(
            round = self.record.round_number,
            strategy = self.strategy.name(),
            pickup_delay = delay,
            "round started"
        );
        Ok(RoundStart {
            round: self.record.round_number,
            stale_timers,
            countdown: delay > 0,
            swapped,
        })
    }

    /// Advances the pickup countdown by one second and re-broadcasts it.
    pub fn tick_flag_countdown(&mut self, sink: &mut dyn PresentationSink) -> CountdownStep {
        let Some(remaining) = self.flag_countdown else {
            return CountdownStep::Idle;
        };
        let remaining = remaining.saturating_sub(1);
        if remaining == 0 {
            self.flag_countdown = None;
            return CountdownStep::Finished;
        }
        self.flag_countdown = Some(remaining);
        sink.cue(Cue::FlagCountdown { remaining });
        CountdownStep::Continue(remaining)
    }

    /// Stops the pickup countdown without releasing objectives.
    pub fn cancel_flag_countdown(&mut self) {
        self.flag_countdown = None;
    }

    /// Releases objectives and runs the first-touch bootstrap.
    ///
    /// A player already standing on a released objective's spawn point, with
    /// line of sight to it, is handed the objective at once. Humans are
    /// preferred over bots, then lower ids; nobody gets two objectives.
    ///
    /// Returns the grants made.
    pub fn flags_are_ready(
        &mut self,
        board: &mut ObjectiveBoard,
        players: &dyn PlayerDirectory,
        sink: &mut dyn PresentationSink,
    ) -> Vec<(SiteId, PlayerId)> {
        self.flag_countdown = None;
        let released = self
            .strategy
            .release_objectives(board, self.record.round_number);
        sink.cue(Cue::Announce(Announcement::FlagsReady));

        let blocked = PlayerFlags::SPECTATOR
            | PlayerFlags::OUT_OF_LIVES
            | PlayerFlags::INACTIVE
            | PlayerFlags::FROZEN;
        let mut candidates: Vec<PlayerId> = players
            .player_ids()
            .into_iter()
            .filter(|p| players.team_of(*p).is_some() && !players.flags(*p).intersects(blocked))
            .collect();
        candidates.sort_by_key(|p| (players.flags(*p).contains(PlayerFlags::BOT), *p));

        let mut grants = Vec::new();
        for site_id in released {
            let Some(site) = board.site(site_id) else {
                continue;
            };
            let spawn = site.position();
            let owner = site.objective().and_then(|o| o.owner());
            let taker = candidates.iter().copied().find(|p| {
                let (Some(team), Some(position)) = (players.team_of(*p), players.position(*p))
                else {
                    return false;
                };
                self.pickup_rule.allows(owner, team)
                    && position.distance(spawn) <= self.touch_radius
                    && players.has_line_of_sight(position, spawn)
            });
            if let Some(player) = taker {
                if let Some(objective) = board.objective_mut(site_id) {
                    objective.take(player);
                    candidates.retain(|p| *p != player);
                    debug!(site = %site_id, %player, "objective taken on release");
                    grants.push((site_id, player));
                }
            }
        }
        grants
    }

    /// Ends the current round.
    ///
    /// Freezes everyone, points cameras at the losing base, credits the
    /// round win and marks the match as at intermission. The caller then
    /// moves the match to the next phase.
    pub fn end_of_round(
        &mut self,
        winner: Option<TeamId>,
        teams: &mut [TeamRecord],
        players: &mut dyn PlayerDirectory,
        sink: &mut dyn PresentationSink,
    ) {
        self.flag_countdown = None;
        for player in players.player_ids() {
            players.set_flag(player, PlayerFlags::FROZEN, true);
        }
        sink.cue(Cue::FreezePlayers);

        match winner {
            Some(team) => {
                if let Some(record) = teams.get_mut(team.index()) {
                    record.award_round();
                }
                let loser = (0..self.num_teams).map(TeamId::new).find(|t| *t != team);
                if let Some(loser) = loser {
                    sink.cue(Cue::FocusBase { team: loser });
                }
                sink.cue(Cue::Announce(Announcement::RoundWon { team }));
            }
            None => sink.cue(Cue::Announce(Announcement::RoundDrawn)),
        }
        self.at_intermission = true;
        info!(
            round = self.record.round_number,
            winner = ?winner,
            "round ended"
        );
    }

    /// Swaps bases once per match, if the configuration asks for it.
    ///
    /// Returns true if a swap happened now.
    pub fn swap_sides_if_configured(
        &mut self,
        board: &mut ObjectiveBoard,
        sink: &mut dyn PresentationSink,
    ) -> bool {
        if !self.side_swap_enabled || self.sides_swapped {
            return false;
        }
        board.swap_sides();
        self.sides_swapped = true;
        sink.cue(Cue::Announce(Announcement::SidesSwapped));
        info!(round = self.record.round_number, "sides swapped");
        true
    }

    /// Notes that `player` has just run out of lives.
    pub fn record_elimination(&mut self, player: PlayerId) {
        if !self.eliminated.contains(&player) {
            self.eliminated.push(player);
        }
    }

    /// Brings back the longest-eliminated member of `team` with one life.
    pub fn revive_for(
        &mut self,
        team: TeamId,
        players: &mut dyn PlayerDirectory,
    ) -> Option<PlayerId> {
        let index = self
            .eliminated
            .iter()
            .position(|p| players.team_of(*p) == Some(team))?;
        let player = self.eliminated.remove(index);
        players.set_lives(player, 1);
        players.set_flag(player, PlayerFlags::OUT_OF_LIVES, false);
        info!(%player, %team, "player revived");
        Some(player)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::Roster;
    use crate::presentation::RecordingSink;
    use glam::Vec2;

    struct Fixture {
        board: ObjectiveBoard,
        teams: Vec<TeamRecord>,
        roster: Roster,
        sink: RecordingSink,
    }

    fn fixture() -> Fixture {
        let mut board = ObjectiveBoard::new();
        board.add_base(TeamId::RED, Vec2::new(-20.0, 0.0));
        board.add_base(TeamId::BLUE, Vec2::new(20.0, 0.0));
        let mut roster = Roster::new();
        roster.add_player(PlayerId::new(1), TeamId::RED, Vec2::new(-20.0, 0.5));
        roster.add_bot(PlayerId::new(2), TeamId::RED, Vec2::new(-20.0, 0.0));
        roster.add_player(PlayerId::new(3), TeamId::BLUE, Vec2::new(0.0, 0.0));
        Fixture {
            board,
            teams: vec![TeamRecord::new(TeamId::RED), TeamRecord::new(TeamId::BLUE)],
            roster,
            sink: RecordingSink::new(),
        }
    }

    mod init_tests {
        use super::*;

        #[test]
        fn init_round_increments_and_restores_lives() {
            let mut f = fixture();
            let mut rounds = RoundLifecycleController::new(&MatchConfig::round_ctf());
            f.roster.set_flag(PlayerId::new(3), PlayerFlags::OUT_OF_LIVES, true);

            let start = rounds
                .init_round(&mut f.board, &mut f.teams, &mut f.roster, &mut f.sink)
                .unwrap();
            assert_eq!(start.round, 1);
            assert!(start.countdown);
            assert_eq!(f.roster.lives(PlayerId::new(3)), 5);
            assert!(!f.roster.flags(PlayerId::new(3)).contains(PlayerFlags::OUT_OF_LIVES));
            assert!(f.sink.cues.contains(&Cue::FlagCountdown { remaining: 10 }));

            rounds
                .init_round(&mut f.board, &mut f.teams, &mut f.roster, &mut f.sink)
                .unwrap();
            assert_eq!(rounds.record().round_number(), 2);
        }

        #[test]
        fn init_round_disarms_objectives() {
            let mut f = fixture();
            let mut rounds = RoundLifecycleController::new(&MatchConfig::round_ctf());
            rounds
                .init_round(&mut f.board, &mut f.teams, &mut f.roster, &mut f.sink)
                .unwrap();
            let red = f.board.base_of(TeamId::RED).unwrap();
            assert!(!f.board.objective(red).unwrap().pickup_enabled());
        }

        #[test]
        fn init_round_aborts_without_base() {
            let mut f = fixture();
            f.board = ObjectiveBoard::new();
            f.board.add_base(TeamId::RED, Vec2::ZERO);
            let mut rounds = RoundLifecycleController::new(&MatchConfig::round_ctf());
            let result = rounds.init_round(&mut f.board, &mut f.teams, &mut f.roster, &mut f.sink);
            assert_eq!(result, Err(ConfigError::MissingBase { team: TeamId::BLUE }));
            assert_eq!(rounds.record().round_number(), 0);
        }

        #[test]
        fn gauntlet_needs_dispenser() {
            let mut f = fixture();
            let mut rounds = RoundLifecycleController::new(&MatchConfig::gauntlet());
            let result = rounds.init_round(&mut f.board, &mut f.teams, &mut f.roster, &mut f.sink);
            assert_eq!(result, Err(ConfigError::MissingDispenser));
        }

        #[test]
        fn sides_swap_once_at_half_point() {
            let mut f = fixture();
            let mut rounds = RoundLifecycleController::new(&MatchConfig::round_ctf());
            let mut swaps = Vec::new();
            for _ in 0..6 {
                let start = rounds
                    .init_round(&mut f.board, &mut f.teams, &mut f.roster, &mut f.sink)
                    .unwrap();
                swaps.push(start.swapped);
            }
            assert_eq!(swaps, vec![false, false, false, true, false, false]);
            assert!(!rounds.swap_sides_if_configured(&mut f.board, &mut f.sink));
        }
    }

    mod countdown_tests {
        use super::*;

        #[test]
        fn countdown_runs_to_finished() {
            let mut f = fixture();
            let config = MatchConfig {
                flag_pickup_delay: 3,
                ..MatchConfig::round_ctf()
            };
            let mut rounds = RoundLifecycleController::new(&config);
            rounds
                .init_round(&mut f.board, &mut f.teams, &mut f.roster, &mut f.sink)
                .unwrap();

            assert_eq!(rounds.tick_flag_countdown(&mut f.sink), CountdownStep::Continue(2));
            assert_eq!(rounds.tick_flag_countdown(&mut f.sink), CountdownStep::Continue(1));
            assert_eq!(rounds.tick_flag_countdown(&mut f.sink), CountdownStep::Finished);
            assert_eq!(rounds.tick_flag_countdown(&mut f.sink), CountdownStep::Idle);
        }

        #[test]
        fn zero_delay_skips_countdown() {
            let mut f = fixture();
            let config = MatchConfig {
                flag_pickup_delay: 0,
                ..MatchConfig::round_ctf()
            };
            let mut rounds = RoundLifecycleController::new(&config);
            let start = rounds
                .init_round(&mut f.board, &mut f.teams, &mut f.roster, &mut f.sink)
                .unwrap();
            assert!(!start.countdown);
            assert_eq!(rounds.flag_countdown(), None);
        }
    }

    mod release_tests {
        use super::*;

        #[test]
        fn first_touch_prefers_humans() {
            let mut f = fixture();
            let mut rounds = RoundLifecycleController::new(&MatchConfig::round_ctf());
            rounds
                .init_round(&mut f.board, &mut f.teams, &mut f.roster, &mut f.sink)
                .unwrap();

            let grants = rounds.flags_are_ready(&mut f.board, &f.roster, &mut f.sink);
            let red = f.board.base_of(TeamId::RED).unwrap();
            assert_eq!(grants, vec![(red, PlayerId::new(1))]);
            assert!(f.board.objective(red).unwrap().is_held());
        }

        #[test]
        fn first_touch_needs_line_of_sight() {
            let mut f = fixture();
            f.roster.add_occluder(Vec2::new(-20.0, 0.3), 0.1);
            let mut rounds = RoundLifecycleController::new(&MatchConfig::round_ctf());
            rounds
                .init_round(&mut f.board, &mut f.teams, &mut f.roster, &mut f.sink)
                .unwrap();

            let grants = rounds.flags_are_ready(&mut f.board, &f.roster, &mut f.sink);
            let red = f.board.base_of(TeamId::RED).unwrap();
            assert_eq!(grants, vec![(red, PlayerId::new(2))]);
        }

        #[test]
        fn first_touch_respects_pickup_rule() {
            let mut f = fixture();
            f.roster.set_position(PlayerId::new(3), Vec2::new(-20.0, 0.0));
            f.roster.set_position(PlayerId::new(1), Vec2::new(0.0, 50.0));
            f.roster.set_position(PlayerId::new(2), Vec2::new(0.0, 50.0));
            let mut rounds = RoundLifecycleController::new(&MatchConfig::round_ctf());
            rounds
                .init_round(&mut f.board, &mut f.teams, &mut f.roster, &mut f.sink)
                .unwrap();
            assert!(rounds.flags_are_ready(&mut f.board, &f.roster, &mut f.sink).is_empty());
            assert!(f.sink.announcements().contains(&Announcement::FlagsReady));
        }

        #[test]
        fn gauntlet_dispenses_neutral_flag() {
            let mut f = fixture();
            f.board = ObjectiveBoard::new();
            f.board.add_score_only_base(TeamId::RED, Vec2::new(-20.0, 0.0));
            f.board.add_score_only_base(TeamId::BLUE, Vec2::new(20.0, 0.0));
            let dispenser = f.board.add_dispenser(None, Vec2::new(0.0, 0.0));
            let mut rounds = RoundLifecycleController::new(&MatchConfig::gauntlet());
            rounds
                .init_round(&mut f.board, &mut f.teams, &mut f.roster, &mut f.sink)
                .unwrap();
            assert!(f.board.objective(dispenser).is_none());

            let grants = rounds.flags_are_ready(&mut f.board, &f.roster, &mut f.sink);
            assert_eq!(grants, vec![(dispenser, PlayerId::new(3))]);
        }
    }

    mod flag_run_tests {
        use super::*;

        #[test]
        fn roles_alternate_from_red() {
            let rounds = RoundLifecycleController::new(&MatchConfig::flag_run());
            assert_eq!(rounds.attacker(), None);
            assert_eq!(
                rounds.upcoming_attackers(),
                vec![
                    TeamId::RED,
                    TeamId::BLUE,
                    TeamId::RED,
                    TeamId::BLUE,
                    TeamId::RED,
                    TeamId::BLUE
                ]
            );
            assert_eq!(FlagRun.attacker(4), Some(TeamId::BLUE));
            assert_eq!(FlagRun.defender(4), Some(TeamId::RED));
            assert!(FlagRun.loses_lives(TeamId::RED, 4));
            assert!(!FlagRun.loses_lives(TeamId::BLUE, 4));
        }

        #[test]
        fn only_the_attacking_flag_is_released() {
            let mut f = fixture();
            let mut rounds = RoundLifecycleController::new(&MatchConfig::flag_run());
            let red = f.board.base_of(TeamId::RED).unwrap();
            let blue = f.board.base_of(TeamId::BLUE).unwrap();

            rounds
                .init_round(&mut f.board, &mut f.teams, &mut f.roster, &mut f.sink)
                .unwrap();
            assert_eq!(rounds.attacker(), Some(TeamId::RED));
            assert_eq!(rounds.upcoming_attackers().len(), 5);
            let grants = rounds.flags_are_ready(&mut f.board, &f.roster, &mut f.sink);
            assert_eq!(grants, vec![(red, PlayerId::new(1))]);
            assert!(!f.board.objective(blue).unwrap().pickup_enabled());

            rounds
                .init_round(&mut f.board, &mut f.teams, &mut f.roster, &mut f.sink)
                .unwrap();
            assert_eq!(rounds.attacker(), Some(TeamId::BLUE));
            assert!(rounds.loses_lives(TeamId::RED));
            rounds.flags_are_ready(&mut f.board, &f.roster, &mut f.sink);
            assert!(f.board.objective(blue).unwrap().pickup_enabled());
            assert!(!f.board.objective(red).unwrap().pickup_enabled());
            assert!(f.board.objective(red).unwrap().is_home());
        }

        #[test]
        fn other_variants_have_no_roles() {
            let rounds = RoundLifecycleController::new(&MatchConfig::round_ctf());
            assert_eq!(rounds.attacker(), None);
            assert!(rounds.upcoming_attackers().is_empty());
            assert!(rounds.loses_lives(TeamId::BLUE));
        }
    }

    mod end_tests {
        use super::*;

        #[test]
        fn end_of_round_freezes_and_focuses_loser() {
            let mut f = fixture();
            let mut rounds = RoundLifecycleController::new(&MatchConfig::round_ctf());
            rounds.end_of_round(Some(TeamId::BLUE), &mut f.teams, &mut f.roster, &mut f.sink);

            assert!(rounds.is_at_intermission());
            assert_eq!(f.teams[1].round_wins(), 1);
            assert!(f.teams[1].wins_round());
            assert!(f.roster.flags(PlayerId::new(1)).contains(PlayerFlags::FROZEN));
            assert!(f.sink.cues.contains(&Cue::FocusBase { team: TeamId::RED }));
        }

        #[test]
        fn draw_awards_nothing() {
            let mut f = fixture();
            let mut rounds = RoundLifecycleController::new(&MatchConfig::round_ctf());
            rounds.end_of_round(None, &mut f.teams, &mut f.roster, &mut f.sink);
            assert_eq!(f.teams[0].round_wins() + f.teams[1].round_wins(), 0);
            assert!(f.sink.announcements().contains(&Announcement::RoundDrawn));
        }

        #[test]
        fn revive_picks_longest_eliminated_teammate() {
            let mut f = fixture();
            let mut rounds = RoundLifecycleController::new(&MatchConfig::gauntlet());
            rounds.record_elimination(PlayerId::new(3));
            rounds.record_elimination(PlayerId::new(2));
            rounds.record_elimination(PlayerId::new(1));

            assert_eq!(
                rounds.revive_for(TeamId::RED, &mut f.roster),
                Some(PlayerId::new(2))
            );
            assert_eq!(f.roster.lives(PlayerId::new(2)), 1);
            assert_eq!(
                rounds.revive_for(TeamId::RED, &mut f.roster),
                Some(PlayerId::new(1))
            );
            assert_eq!(rounds.revive_for(TeamId::RED, &mut f.roster), None);
        }
    }
}

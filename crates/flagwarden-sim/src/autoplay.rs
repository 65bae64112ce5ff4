//! Seeded random matches.
//!
//! Autoplay fills a fixed arena with four players a side and, during live
//! play, throws random gameplay events at the engine. Many of them are
//! refused (delivering without the flag, picking up a frozen objective);
//! that is the point, the engine has to stay consistent regardless.
//!
//! Every match is a pure function of its variant, configuration and seed,
//! so a batch can run in parallel and still be reproduced one seed at a
//! time.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

use flagwarden_core::{
    Cue, GameClock, MatchConfig, MatchContext, MatchEvent, MatchOutcome, MatchSnapshot,
    MatchStateMachine, ObjectiveBoard, ObjectiveState, ObjectiveStatus, PlayerDirectory,
    PlayerFlags, PlayerId, PresentationSink, Roster, SiteId, TeamId, TeamRecord, Variant,
};
use glam::Vec2;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::Result;

/// Simulated seconds per tick.
pub const AUTOPLAY_TICK: f64 = 0.1;

/// Matches still running after this many simulated seconds are abandoned.
pub const MAX_DURATION: f64 = 4.0 * 3600.0;

/// Chance of a random event on each live tick.
const EVENT_CHANCE: f64 = 0.06;

const PLAYERS_PER_TEAM: u32 = 4;

// =============================================================================
// Arena
// =============================================================================

/// Two bases 80 units apart, plus a neutral dispenser for Gauntlet.
#[must_use]
pub fn arena_board(variant: Variant) -> ObjectiveBoard {
    let mut board = ObjectiveBoard::new();
    let red = Vec2::new(-40.0, 0.0);
    let blue = Vec2::new(40.0, 0.0);
    if variant == Variant::Gauntlet {
        board.add_score_only_base(TeamId::RED, red);
        board.add_score_only_base(TeamId::BLUE, blue);
        board.add_dispenser(None, Vec2::new(0.0, 30.0));
    } else {
        board.add_base(TeamId::RED, red);
        board.add_base(TeamId::BLUE, blue);
    }
    board
}

/// Four players a side in midfield; the last of each side is a bot.
#[must_use]
pub fn arena_roster() -> Roster {
    let mut roster = Roster::new();
    for team in [TeamId::RED, TeamId::BLUE] {
        let side = if team == TeamId::RED { -1.0 } else { 1.0 };
        for slot in 0..PLAYERS_PER_TEAM {
            let id = PlayerId::new(u32::from(team.as_u8()) * PLAYERS_PER_TEAM + slot + 1);
            #[allow(clippy::cast_precision_loss)]
            let position = Vec2::new(side * 10.0, slot as f32 * 4.0);
            if slot + 1 == PLAYERS_PER_TEAM {
                roster.add_bot(id, team, position);
            } else {
                roster.add_player(id, team, position);
            }
        }
    }
    roster
}

// =============================================================================
// Single match
// =============================================================================

/// Sink that only counts what it receives.
#[derive(Debug, Default)]
struct TallySink {
    snapshots: usize,
    cues: usize,
}

impl PresentationSink for TallySink {
    fn publish(&mut self, _snapshot: &MatchSnapshot) {
        self.snapshots += 1;
    }

    fn cue(&mut self, _cue: Cue) {
        self.cues += 1;
    }
}

/// Summary of one autoplayed match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AutoplayResult {
    /// Seed the match was played with.
    pub seed: u64,
    /// Variant played.
    pub variant: Variant,
    /// Result, or `None` if the match hit [`MAX_DURATION`].
    pub outcome: Option<MatchOutcome>,
    /// Final score per team.
    pub scores: Vec<u32>,
    /// Number of captures.
    pub captures: usize,
    /// Rounds started.
    pub rounds: u32,
    /// Random events submitted.
    pub events: usize,
    /// Random events the engine refused.
    pub rejected: usize,
    /// Snapshots published.
    pub snapshots: usize,
    /// Cues sent.
    pub cues: usize,
    /// Simulated seconds.
    pub elapsed: f64,
}

/// Plays one match of `variant` with its preset configuration.
///
/// # Errors
///
/// Returns an error only if the match cannot start.
pub fn autoplay(variant: Variant, seed: u64) -> Result<AutoplayResult> {
    autoplay_with(&MatchConfig::for_variant(variant), seed)
}

/// Plays one match with `config`.
///
/// # Errors
///
/// Returns an error only if the match cannot start.
#[allow(clippy::cast_precision_loss)]
pub fn autoplay_with(config: &MatchConfig, seed: u64) -> Result<AutoplayResult> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut machine = MatchStateMachine::new(config.clone(), arena_board(config.variant));
    let mut roster = arena_roster();
    let mut clock = GameClock::new();
    let mut sink = TallySink::default();

    let mut ctx = MatchContext::new(&mut clock, &mut roster, &mut sink);
    machine.begin_match(&mut ctx)?;
    debug!(seed, variant = %config.variant, "autoplay started");

    let mut ticks: u64 = 0;
    let mut events = 0;
    let mut rejected = 0;
    while !machine.phase().is_terminal() && (ticks as f64) * AUTOPLAY_TICK < MAX_DURATION {
        if machine.phase().is_live() && rng.gen_bool(EVENT_CHANCE) {
            if let Some(event) = random_event(&mut rng, &machine, &*ctx.players) {
                events += 1;
                if machine.submit(&mut ctx, event).is_err() {
                    rejected += 1;
                }
            }
        }
        machine.tick(&mut ctx, AUTOPLAY_TICK);
        ticks += 1;
    }

    let elapsed = ticks as f64 * AUTOPLAY_TICK;
    let result = AutoplayResult {
        seed,
        variant: config.variant,
        outcome: machine.outcome(),
        scores: machine.teams().iter().map(TeamRecord::score).collect(),
        captures: machine.scoring_log().len(),
        rounds: machine.round_record().round_number(),
        events,
        rejected,
        snapshots: sink.snapshots,
        cues: sink.cues,
        elapsed,
    };
    debug!(
        seed,
        outcome = ?result.outcome,
        scores = ?result.scores,
        elapsed,
        "autoplay finished"
    );
    Ok(result)
}

/// Picks a plausible gameplay event for the current board.
fn random_event(
    rng: &mut ChaCha8Rng,
    machine: &MatchStateMachine,
    players: &dyn PlayerDirectory,
) -> Option<MatchEvent> {
    let board = machine.board();
    let active: Vec<PlayerId> = players
        .player_ids()
        .into_iter()
        .filter(|p| {
            players.team_of(*p).is_some()
                && !players
                    .flags(*p)
                    .intersects(PlayerFlags::OUT_OF_LIVES | PlayerFlags::FROZEN)
        })
        .collect();
    let objectives = board.live_objectives();
    let with_status = |status: ObjectiveStatus| -> Vec<SiteId> {
        objectives
            .iter()
            .copied()
            .filter(|s| board.objective(*s).map(ObjectiveState::status) == Some(status))
            .collect()
    };

    match rng.gen_range(0..100) {
        0..=39 => {
            let free: Vec<SiteId> = objectives
                .iter()
                .copied()
                .filter(|s| !board.objective(*s).is_some_and(ObjectiveState::is_held))
                .collect();
            let site = *free.choose(rng)?;
            let player = *active.choose(rng)?;
            Some(MatchEvent::ObjectiveTaken { site, player })
        }
        40..=59 => {
            let site = *with_status(ObjectiveStatus::Held).choose(rng)?;
            let player = board.objective(site)?.holder()?;
            let team = players.team_of(player);
            let teammates: Vec<PlayerId> = active
                .iter()
                .copied()
                .filter(|p| *p != player && players.team_of(*p) == team)
                .collect();
            let assists = if rng.gen_bool(0.5) {
                teammates.choose(rng).copied().into_iter().collect()
            } else {
                Vec::new()
            };
            Some(MatchEvent::ObjectiveDelivered {
                site,
                player,
                assists,
            })
        }
        60..=74 => {
            let site = *with_status(ObjectiveStatus::Held).choose(rng)?;
            Some(MatchEvent::ObjectiveDropped { site })
        }
        75..=94 => {
            let victim = *active.choose(rng)?;
            let victim_team = players.team_of(victim);
            let opponents: Vec<PlayerId> = active
                .iter()
                .copied()
                .filter(|p| players.team_of(*p) != victim_team)
                .collect();
            let killer = if rng.gen_bool(0.1) {
                None
            } else {
                opponents.choose(rng).copied()
            };
            Some(MatchEvent::PlayerEliminated { victim, killer })
        }
        _ => {
            let site = *with_status(ObjectiveStatus::Dropped).choose(rng)?;
            Some(MatchEvent::ObjectiveReturned { site })
        }
    }
}

// =============================================================================
// Batches
// =============================================================================

/// Plays one match per seed in parallel, returned in seed order.
///
/// # Errors
///
/// Returns the first error encountered.
pub fn run_batch(variant: Variant, seeds: Range<u64>) -> Result<Vec<AutoplayResult>> {
    let config = MatchConfig::for_variant(variant);
    let results: Vec<AutoplayResult> = seeds
        .clone()
        .into_par_iter()
        .map(|seed| autoplay_with(&config, seed))
        .collect::<Result<_>>()?;
    info!(
        %variant,
        first_seed = seeds.start,
        matches = results.len(),
        "batch finished"
    );
    Ok(results)
}

/// Aggregate statistics over a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    /// Variant played.
    pub variant: Variant,
    /// Matches played.
    pub matches: usize,
    /// Finished matches per winner.
    pub wins: BTreeMap<String, usize>,
    /// Finished matches per end reason.
    pub reasons: BTreeMap<String, usize>,
    /// Matches abandoned at [`MAX_DURATION`].
    pub unfinished: usize,
    /// Average captures per match.
    pub mean_captures: f64,
    /// Average simulated seconds per match.
    pub mean_elapsed: f64,
}

impl BatchSummary {
    /// Tallies `results`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_results(variant: Variant, results: &[AutoplayResult]) -> Self {
        let mut wins = BTreeMap::new();
        let mut reasons = BTreeMap::new();
        let mut unfinished = 0;
        for result in results {
            match result.outcome {
                Some(outcome) => {
                    *wins.entry(outcome.winner.to_string()).or_insert(0) += 1;
                    *reasons.entry(outcome.reason.to_string()).or_insert(0) += 1;
                }
                None => unfinished += 1,
            }
        }
        let count = results.len().max(1) as f64;
        Self {
            variant,
            matches: results.len(),
            wins,
            reasons,
            unfinished,
            mean_captures: results.iter().map(|r| r.captures as f64).sum::<f64>() / count,
            mean_elapsed: results.iter().map(|r| r.elapsed).sum::<f64>() / count,
        }
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} x{}", self.variant, self.matches)?;
        for (winner, count) in &self.wins {
            writeln!(f, "  {winner:<10} {count}")?;
        }
        if self.unfinished > 0 {
            writeln!(f, "  {:<10} {}", "unfinished", self.unfinished)?;
        }
        writeln!(f, "  reasons:")?;
        for (reason, count) in &self.reasons {
            writeln!(f, "    {reason:<18} {count}")?;
        }
        writeln!(f, "  mean captures: {:.2}", self.mean_captures)?;
        writeln!(f, "  mean length:   {:.1}s", self.mean_elapsed)
    }
}

//! Scripted scenarios.
//!
//! A scenario is a JSON document describing an arena (bases, optional
//! dispenser, players), configuration overrides on top of the variant
//! preset, and a timeline of events. [`run_scenario`] plays it at a fixed
//! tick rate and returns a [`MatchReport`].
//!
//! Site ids follow registration order: bases in the order listed, then the
//! dispenser. Timeline events refer to sites by that id.
//!
//! ```
//! use flagwarden_sim::{run_scenario, Scenario};
//!
//! let scenario: Scenario = serde_json::from_str(r#"{
//!     "name": "one cap",
//!     "variant": "ctf",
//!     "config": { "goal_score": 1 },
//!     "players": [
//!         { "id": 1, "team": 0, "position": [-5.0, 0.0] },
//!         { "id": 2, "team": 1, "position": [5.0, 0.0] }
//!     ],
//!     "bases": [
//!         { "team": 0, "position": [-40.0, 0.0] },
//!         { "team": 1, "position": [40.0, 0.0] }
//!     ],
//!     "duration": 60.0,
//!     "timeline": [
//!         { "at": 10.0, "event": { "type": "objective_taken", "site": 0, "player": 2 } },
//!         { "at": 12.0, "event": { "type": "objective_delivered", "site": 0, "player": 2 } }
//!     ]
//! }"#).unwrap();
//!
//! let report = run_scenario(&scenario).unwrap();
//! assert_eq!(report.final_snapshot.team_scores, vec![0, 1]);
//! assert!(report.outcome.is_some());
//! ```

use std::path::Path;

use flagwarden_core::{
    GameClock, MatchConfig, MatchContext, MatchEvent, MatchStateMachine, ObjectiveBoard,
    PlayerId, RecordingSink, Roster, TeamId, Variant,
};
use glam::Vec2;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::{Result, SimError};
use crate::report::{MatchReport, RejectedEvent};

/// Tolerance when comparing event times against the simulated clock.
const TIME_EPSILON: f64 = 1e-9;

fn default_tick_rate() -> f64 {
    10.0
}

/// One participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlayerSpec {
    /// Player id.
    pub id: PlayerId,
    /// Team, or `None` for a spectator.
    #[serde(default)]
    pub team: Option<TeamId>,
    /// Whether the player is a bot.
    #[serde(default)]
    pub bot: bool,
    /// Where the player stands.
    #[serde(default)]
    pub position: Vec2,
}

/// One team base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BaseSpec {
    /// Owning team.
    pub team: TeamId,
    /// Spawn point.
    pub position: Vec2,
    /// A base that only receives deliveries and has no objective of its own.
    #[serde(default)]
    pub score_only: bool,
}

/// An event and the simulated time at which it is submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimedEvent {
    /// Seconds since the match began.
    pub at: f64,
    /// The event.
    pub event: MatchEvent,
}

/// A scripted match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Display name.
    pub name: String,
    /// Variant; selects the configuration preset.
    pub variant: Variant,
    /// Fields overriding the preset, by [`MatchConfig`] field name.
    #[serde(default)]
    pub config: Map<String, Value>,
    /// Participants.
    pub players: Vec<PlayerSpec>,
    /// Team bases, registered in order.
    pub bases: Vec<BaseSpec>,
    /// Neutral dispenser position, registered after the bases.
    #[serde(default)]
    pub dispenser: Option<Vec2>,
    /// Ticks per simulated second.
    #[serde(default = "default_tick_rate")]
    pub tick_rate: f64,
    /// Simulated seconds after which the run stops if the match is not over.
    pub duration: f64,
    /// Scripted events.
    #[serde(default)]
    pub timeline: Vec<TimedEvent>,
}

impl Scenario {
    /// Reads a scenario from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Io`] or [`SimError::Parse`].
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| SimError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Parses a scenario from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Parse`] for malformed input.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// The variant preset with this scenario's overrides applied.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Invalid`] for an unknown field or an attempt to
    /// change the variant, and [`SimError::Parse`] for a value of the wrong
    /// type.
    pub fn match_config(&self) -> Result<MatchConfig> {
        let mut fields = match serde_json::to_value(MatchConfig::for_variant(self.variant))? {
            Value::Object(fields) => fields,
            _ => return Err(SimError::Invalid("configuration is not an object".into())),
        };
        for (key, value) in &self.config {
            if key == "variant" {
                return Err(SimError::Invalid(
                    "the variant is set at the top level, not in config".into(),
                ));
            }
            if !fields.contains_key(key) {
                return Err(SimError::Invalid(format!("unknown config field `{key}`")));
            }
            fields.insert(key.clone(), value.clone());
        }
        Ok(serde_json::from_value(Value::Object(fields))?)
    }

    /// Checks everything that serde cannot.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Invalid`] describing the first problem.
    pub fn validate(&self) -> Result<()> {
        if !(self.tick_rate.is_finite() && self.tick_rate > 0.0) {
            return Err(SimError::Invalid(format!(
                "tick rate must be positive, got {}",
                self.tick_rate
            )));
        }
        if !(self.duration.is_finite() && self.duration > 0.0) {
            return Err(SimError::Invalid(format!(
                "duration must be positive, got {}",
                self.duration
            )));
        }
        if let Some(bad) = self
            .timeline
            .iter()
            .find(|e| !(e.at.is_finite() && e.at >= 0.0))
        {
            return Err(SimError::Invalid(format!("event time {} is invalid", bad.at)));
        }
        let mut ids: Vec<PlayerId> = self.players.iter().map(|p| p.id).collect();
        ids.sort_unstable();
        if let Some(pair) = ids.windows(2).find(|w| w[0] == w[1]) {
            return Err(SimError::Invalid(format!("player {} listed twice", pair[0])));
        }
        Ok(())
    }

    /// Builds the objective board.
    #[must_use]
    pub fn board(&self) -> ObjectiveBoard {
        let mut board = ObjectiveBoard::new();
        for base in &self.bases {
            if base.score_only {
                board.add_score_only_base(base.team, base.position);
            } else {
                board.add_base(base.team, base.position);
            }
        }
        if let Some(position) = self.dispenser {
            board.add_dispenser(None, position);
        }
        board
    }

    /// Builds the roster.
    #[must_use]
    pub fn roster(&self) -> Roster {
        let mut roster = Roster::new();
        for player in &self.players {
            match (player.team, player.bot) {
                (None, _) => roster.add_spectator(player.id),
                (Some(team), false) => roster.add_player(player.id, team, player.position),
                (Some(team), true) => roster.add_bot(player.id, team, player.position),
            }
        }
        roster
    }

    /// Timeline sorted by time, keeping file order for equal times.
    fn ordered_timeline(&self) -> Vec<TimedEvent> {
        let mut timeline = self.timeline.clone();
        timeline.sort_by(|a, b| a.at.total_cmp(&b.at));
        timeline
    }
}

/// Plays a scenario to completion or until its duration runs out.
///
/// Before each tick, every timeline event due at or before the current time
/// is submitted. Refused events are recorded in the report, not treated as
/// failures.
///
/// # Errors
///
/// Returns an error if the scenario is invalid or the match cannot start.
#[allow(clippy::cast_precision_loss)]
pub fn run_scenario(scenario: &Scenario) -> Result<MatchReport> {
    scenario.validate()?;
    let config = scenario.match_config()?;
    let mut machine = MatchStateMachine::new(config, scenario.board());
    let mut roster = scenario.roster();
    let mut clock = GameClock::new();
    let mut sink = RecordingSink::new();

    let dt = 1.0 / scenario.tick_rate;
    let mut timeline = scenario.ordered_timeline().into_iter().peekable();
    let mut rejected = Vec::new();
    let mut ticks: u64 = 0;
    let mut elapsed = 0.0;

    let mut ctx = MatchContext::new(&mut clock, &mut roster, &mut sink);
    machine.begin_match(&mut ctx)?;
    info!(scenario = %scenario.name, variant = %scenario.variant, "scenario started");

    loop {
        while let Some(timed) = timeline.next_if(|e| e.at <= elapsed + TIME_EPSILON) {
            if let Err(err) = machine.submit(&mut ctx, timed.event.clone()) {
                warn!(at = timed.at, event = ?timed.event, %err, "scripted event refused");
                rejected.push(RejectedEvent {
                    at: timed.at,
                    event: timed.event,
                    reason: err.to_string(),
                });
            }
        }
        if machine.phase().is_terminal() || elapsed + TIME_EPSILON >= scenario.duration {
            break;
        }
        machine.tick(&mut ctx, dt);
        ticks += 1;
        elapsed = ticks as f64 * dt;
    }

    let unplayed = timeline.count();
    if unplayed > 0 {
        debug!(unplayed, "timeline events left after the run stopped");
    }
    info!(
        scenario = %scenario.name,
        phase = %machine.phase(),
        elapsed,
        "scenario finished"
    );

    Ok(MatchReport {
        scenario: scenario.name.clone(),
        variant: scenario.variant,
        elapsed,
        ticks,
        final_snapshot: machine.snapshot(&clock),
        outcome: machine.outcome(),
        phase_history: sink.phase_history(),
        scoring_plays: machine.scoring_log().plays().to_vec(),
        announcements: sink.announcements(),
        rejected,
        unplayed,
    })
}

#[cfg(test)]
mod tests {
    use flagwarden_core::{EndReason, MatchPhase, SiteId, Winner};

    use super::*;

    const CTF_GOAL: &str = include_str!("../scenarios/ctf_goal.json");
    const ROUND_CTF: &str = include_str!("../scenarios/round_ctf.json");
    const GAUNTLET: &str = include_str!("../scenarios/gauntlet.json");
    const FLAG_RUN: &str = include_str!("../scenarios/flag_run.json");

    fn minimal(variant: &str) -> Scenario {
        Scenario::from_json(&format!(
            r#"{{
                "name": "minimal",
                "variant": "{variant}",
                "players": [
                    {{ "id": 1, "team": 0, "position": [-5.0, 0.0] }},
                    {{ "id": 2, "team": 1, "position": [5.0, 0.0] }}
                ],
                "bases": [
                    {{ "team": 0, "position": [-40.0, 0.0] }},
                    {{ "team": 1, "position": [40.0, 0.0] }}
                ],
                "duration": 30.0
            }}"#
        ))
        .unwrap()
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    #[test]
    fn overrides_apply_on_top_of_variant_preset() {
        let mut scenario = minimal("round-ctf");
        scenario.config.insert("total_rounds".into(), Value::from(2));

        let config = scenario.match_config().unwrap();
        assert_eq!(config.variant, Variant::RoundCtf);
        assert_eq!(config.total_rounds, 2);
        assert_eq!(config.lives_per_player, MatchConfig::round_ctf().lives_per_player);
    }

    #[test]
    fn unknown_override_is_rejected() {
        let mut scenario = minimal("ctf");
        scenario.config.insert("goal_scroe".into(), Value::from(2));
        assert!(matches!(scenario.match_config(), Err(SimError::Invalid(_))));
    }

    #[test]
    fn variant_cannot_be_overridden() {
        let mut scenario = minimal("ctf");
        scenario.config.insert("variant".into(), Value::from("gauntlet"));
        assert!(matches!(scenario.match_config(), Err(SimError::Invalid(_))));
    }

    #[test]
    fn wrongly_typed_override_is_a_parse_error() {
        let mut scenario = minimal("ctf");
        scenario.config.insert("goal_score".into(), Value::from("three"));
        assert!(matches!(scenario.match_config(), Err(SimError::Parse(_))));
    }

    #[test]
    fn bad_tick_rate_and_duplicate_players_are_invalid() {
        let mut scenario = minimal("ctf");
        scenario.tick_rate = 0.0;
        assert!(matches!(scenario.validate(), Err(SimError::Invalid(_))));

        let mut scenario = minimal("ctf");
        scenario.players.push(scenario.players[0].clone());
        assert!(matches!(scenario.validate(), Err(SimError::Invalid(_))));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = Scenario::load(Path::new("/nonexistent/flagwarden.json")).unwrap_err();
        assert!(matches!(err, SimError::Io { .. }));
    }

    // =========================================================================
    // Arena
    // =========================================================================

    #[test]
    fn site_ids_follow_registration_order() {
        let mut scenario = minimal("gauntlet");
        scenario.dispenser = Some(Vec2::new(0.0, 30.0));
        let board = scenario.board();

        assert_eq!(board.base_of(TeamId::RED), Some(SiteId::new(0)));
        assert_eq!(board.base_of(TeamId::BLUE), Some(SiteId::new(1)));
        assert!(board.site(SiteId::new(2)).unwrap().is_dispenser());
    }

    #[test]
    fn gauntlet_without_dispenser_does_not_start() {
        let scenario = minimal("gauntlet");
        assert!(matches!(run_scenario(&scenario), Err(SimError::Start(_))));
    }

    // =========================================================================
    // Runs
    // =========================================================================

    #[test]
    fn quiet_scenario_stops_at_duration() {
        let report = run_scenario(&minimal("ctf")).unwrap();
        assert!(report.outcome.is_none());
        assert_eq!(report.ticks, 300);
        assert_eq!(report.final_snapshot.phase, MatchPhase::InProgress);
        assert!(report.scoring_plays.is_empty());
    }

    #[test]
    fn early_event_is_recorded_as_rejected() {
        let mut scenario = minimal("ctf");
        scenario.timeline.push(TimedEvent {
            at: 1.0,
            event: MatchEvent::ObjectiveTaken {
                site: SiteId::new(0),
                player: PlayerId::new(2),
            },
        });
        let report = run_scenario(&scenario).unwrap();
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].at, 1.0);
    }

    #[test]
    fn ctf_goal_scenario() {
        let report = run_scenario(&Scenario::from_json(CTF_GOAL).unwrap()).unwrap();
        let outcome = report.outcome.unwrap();
        assert_eq!(outcome.winner, Winner::Team(TeamId::BLUE));
        assert_eq!(outcome.reason, EndReason::GoalScore);
        assert_eq!(report.final_snapshot.team_scores, vec![1, 3]);
        assert_eq!(report.scoring_plays.len(), 4);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.unplayed, 1);
        assert_eq!(report.phase_history.last(), Some(&MatchPhase::WaitingPostMatch));
    }

    #[test]
    fn round_ctf_scenario() {
        let report = run_scenario(&Scenario::from_json(ROUND_CTF).unwrap()).unwrap();
        let outcome = report.outcome.unwrap();
        assert_eq!(outcome.winner, Winner::Team(TeamId::RED));
        assert_eq!(outcome.reason, EndReason::RoundLimit);
        assert_eq!(report.final_snapshot.round_number, 2);
        assert!(report.rejected.is_empty());
    }

    #[test]
    fn gauntlet_scenario() {
        let report = run_scenario(&Scenario::from_json(GAUNTLET).unwrap()).unwrap();
        let outcome = report.outcome.unwrap();
        assert_eq!(outcome.winner, Winner::Team(TeamId::RED));
        assert_eq!(outcome.reason, EndReason::GoalScore);
        assert_eq!(report.final_snapshot.team_scores, vec![2, 0]);
    }

    #[test]
    fn flag_run_scenario() {
        let report = run_scenario(&Scenario::from_json(FLAG_RUN).unwrap()).unwrap();
        let outcome = report.outcome.unwrap();
        assert_eq!(outcome.winner, Winner::Team(TeamId::RED));
        assert_eq!(outcome.reason, EndReason::RoundLimit);
        assert_eq!(report.final_snapshot.team_scores, vec![3, 2]);
        assert_eq!(report.final_snapshot.round_number, 2);
        let points: Vec<u32> = report.scoring_plays.iter().map(|p| p.points).collect();
        assert_eq!(points, vec![3, 2]);
        assert!(report.rejected.is_empty());
    }
}

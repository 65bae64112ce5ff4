//! Determinism checks.
//!
//! Two machines given the same configuration, board and inputs must publish
//! the same snapshots and cues and end with the same scoring log. Hosts rely
//! on this for replays.

use glam::Vec2;

use crate::config::MatchConfig;
use crate::event::MatchEvent;
use crate::phase::MatchPhase;
use crate::player::PlayerId;
use crate::presentation::RecordingSink;
use crate::scoring::ScoringLog;
use crate::team::{MatchOutcome, TeamId};

use super::helpers::{quick_flag_run, quick_round_ctf, Harness, BLUE_1, BLUE_2, RED_1, RED_2};

enum Step {
    Wait(f64),
    Event(MatchEvent),
}

/// A busy match: pickups, drops, captures, kills and long waits.
fn script(h: &Harness) -> Vec<Step> {
    let red_target = h.enemy_flag(TeamId::RED);
    let blue_target = h.enemy_flag(TeamId::BLUE);
    vec![
        Step::Wait(20.0),
        Step::Event(MatchEvent::ObjectiveTaken {
            site: red_target,
            player: RED_1,
        }),
        Step::Wait(2.0),
        Step::Event(MatchEvent::PlayerEliminated {
            victim: RED_1,
            killer: Some(BLUE_2),
        }),
        Step::Event(MatchEvent::ObjectiveTaken {
            site: red_target,
            player: RED_2,
        }),
        Step::Event(MatchEvent::ObjectiveDelivered {
            site: red_target,
            player: RED_2,
            assists: vec![RED_1],
        }),
        Step::Wait(60.0),
        Step::Event(MatchEvent::ObjectiveTaken {
            site: blue_target,
            player: BLUE_1,
        }),
        Step::Event(MatchEvent::ObjectiveDropped { site: blue_target }),
        Step::Wait(10.0),
        Step::Event(MatchEvent::ObjectiveTaken {
            site: blue_target,
            player: BLUE_2,
        }),
        Step::Event(MatchEvent::ObjectiveDelivered {
            site: blue_target,
            player: BLUE_2,
            assists: vec![],
        }),
        Step::Wait(400.0),
        Step::Event(MatchEvent::ClockExpired),
        Step::Wait(60.0),
    ]
}

fn run(config: &MatchConfig) -> (RecordingSink, ScoringLog, Option<MatchOutcome>) {
    let mut h = Harness::new(config.clone());
    h.begin().unwrap();
    for step in script(&h) {
        match step {
            Step::Wait(seconds) => h.run_for(seconds),
            Step::Event(event) => {
                let _ = h.submit(event);
            }
        }
    }
    (h.sink, h.machine.scoring_log().clone(), h.machine.outcome())
}

// =============================================================================
// Replays
// =============================================================================

#[test]
fn identical_inputs_identical_output() {
    let configs = [
        MatchConfig {
            time_limit: 60.0,
            ..MatchConfig::ctf()
        },
        quick_round_ctf(),
        MatchConfig::gauntlet(),
        quick_flag_run(),
    ];
    for config in &configs {
        let (sink1, log1, outcome1) = run(config);
        let (sink2, log2, outcome2) = run(config);

        assert!(!sink1.snapshots.is_empty(), "{}", config.variant);
        assert_eq!(sink1.snapshots, sink2.snapshots, "{}", config.variant);
        assert_eq!(sink1.cues, sink2.cues, "{}", config.variant);
        assert_eq!(log1, log2, "{}", config.variant);
        assert_eq!(outcome1, outcome2, "{}", config.variant);
    }
}

#[test]
fn script_actually_scores() {
    let (sink, log, _) = run(&MatchConfig {
        time_limit: 60.0,
        ..MatchConfig::ctf()
    });
    assert_eq!(log.len(), 2);
    assert_eq!(log.plays()[0].assists, vec![RED_1]);
    assert!(sink.phase_history().contains(&MatchPhase::Halftime));
}

#[test]
fn snapshots_survive_json() {
    let (sink, _, _) = run(&quick_round_ctf());
    let json = serde_json::to_string(&sink.snapshots).unwrap();
    let back: Vec<crate::presentation::MatchSnapshot> = serde_json::from_str(&json).unwrap();
    assert_eq!(back, sink.snapshots);
}

// =============================================================================
// First touch
// =============================================================================

#[test]
fn first_touch_prefers_humans_then_lower_ids() {
    let mut h = Harness::new(quick_round_ctf());
    let spawn = Vec2::new(-50.0, 0.0);
    let bot = PlayerId::new(5);
    h.roster.add_bot(bot, TeamId::RED, spawn);
    h.roster.set_position(RED_2, spawn);
    h.start_live();

    let objective = h.machine.board().objective(h.red_base).unwrap();
    assert_eq!(objective.holder(), Some(RED_2));

    let mut h = Harness::new(quick_round_ctf());
    h.roster.set_position(RED_2, spawn);
    h.roster.set_position(RED_1, spawn);
    h.start_live();

    let objective = h.machine.board().objective(h.red_base).unwrap();
    assert_eq!(objective.holder(), Some(RED_1));
}

#[test]
fn nobody_in_reach_means_no_first_touch() {
    let mut h = Harness::new(quick_round_ctf());
    h.start_live();
    assert!(h.machine.board().all_home());
}

//! Test harness for driving whole matches.
//!
//! Players 1 and 2 are red, 3 and 4 are blue. Everybody stands in midfield,
//! well away from every spawn point, so nothing is picked up by touch unless
//! a test moves someone.

use glam::Vec2;

use crate::clock::GameClock;
use crate::config::{MatchConfig, Variant};
use crate::error::{EventError, TransitionError};
use crate::event::{MatchContext, MatchEvent};
use crate::machine::MatchStateMachine;
use crate::objective::{ObjectiveBoard, SiteId};
use crate::phase::MatchPhase;
use crate::player::{PlayerId, Roster};
use crate::presentation::{Announcement, RecordingSink};
use crate::team::TeamId;

/// Red player.
pub const RED_1: PlayerId = PlayerId::new(1);
/// Red player.
pub const RED_2: PlayerId = PlayerId::new(2);
/// Blue player.
pub const BLUE_1: PlayerId = PlayerId::new(3);
/// Blue player.
pub const BLUE_2: PlayerId = PlayerId::new(4);

/// Step used by [`Harness::run_for`].
pub const STEP: f64 = 0.25;

/// A machine plus everything it talks to.
pub struct Harness {
    pub machine: MatchStateMachine,
    pub clock: GameClock,
    pub roster: Roster,
    pub sink: RecordingSink,
    pub red_base: SiteId,
    pub blue_base: SiteId,
    pub dispenser: Option<SiteId>,
}

impl Harness {
    /// Two bases, plus a neutral dispenser for Gauntlet.
    pub fn new(config: MatchConfig) -> Self {
        let mut board = ObjectiveBoard::new();
        let gauntlet = config.variant == Variant::Gauntlet;
        let (red_base, blue_base) = if gauntlet {
            (
                board.add_score_only_base(TeamId::RED, Vec2::new(-50.0, 0.0)),
                board.add_score_only_base(TeamId::BLUE, Vec2::new(50.0, 0.0)),
            )
        } else {
            (
                board.add_base(TeamId::RED, Vec2::new(-50.0, 0.0)),
                board.add_base(TeamId::BLUE, Vec2::new(50.0, 0.0)),
            )
        };
        let dispenser = gauntlet.then(|| board.add_dispenser(None, Vec2::new(0.0, 40.0)));
        Self::with_board(config, board, red_base, blue_base, dispenser)
    }

    /// Uses a caller-built board.
    pub fn with_board(
        config: MatchConfig,
        board: ObjectiveBoard,
        red_base: SiteId,
        blue_base: SiteId,
        dispenser: Option<SiteId>,
    ) -> Self {
        let mut roster = Roster::new();
        roster.add_player(RED_1, TeamId::RED, Vec2::new(-5.0, 0.0));
        roster.add_player(RED_2, TeamId::RED, Vec2::new(-5.0, 5.0));
        roster.add_player(BLUE_1, TeamId::BLUE, Vec2::new(5.0, 0.0));
        roster.add_player(BLUE_2, TeamId::BLUE, Vec2::new(5.0, 5.0));
        Self {
            machine: MatchStateMachine::new(config, board),
            clock: GameClock::new(),
            roster,
            sink: RecordingSink::new(),
            red_base,
            blue_base,
            dispenser,
        }
    }

    pub fn begin(&mut self) -> Result<(), TransitionError> {
        let mut ctx = MatchContext::new(&mut self.clock, &mut self.roster, &mut self.sink);
        self.machine.begin_match(&mut ctx)
    }

    pub fn request(&mut self, phase: MatchPhase) -> Result<(), TransitionError> {
        let mut ctx = MatchContext::new(&mut self.clock, &mut self.roster, &mut self.sink);
        self.machine.request_phase(&mut ctx, phase)
    }

    pub fn tick(&mut self, dt: f64) {
        let mut ctx = MatchContext::new(&mut self.clock, &mut self.roster, &mut self.sink);
        self.machine.tick(&mut ctx, dt);
    }

    pub fn submit(&mut self, event: MatchEvent) -> Result<(), EventError> {
        let mut ctx = MatchContext::new(&mut self.clock, &mut self.roster, &mut self.sink);
        self.machine.submit(&mut ctx, event)
    }

    /// Ticks in [`STEP`] increments for `seconds`.
    pub fn run_for(&mut self, seconds: f64) {
        let mut elapsed = 0.0;
        while elapsed + 1e-9 < seconds {
            self.tick(STEP);
            elapsed += STEP;
        }
    }

    /// Ticks until the machine reaches `phase`, giving up after `limit`
    /// seconds. Returns true if the phase was reached.
    pub fn run_until(&mut self, phase: MatchPhase, limit: f64) -> bool {
        let mut elapsed = 0.0;
        while self.machine.phase() != phase {
            if elapsed > limit || self.machine.phase().is_terminal() {
                return false;
            }
            self.tick(STEP);
            elapsed += STEP;
        }
        true
    }

    /// Begins the match and plays through to live play.
    pub fn start_live(&mut self) {
        self.begin().unwrap();
        assert!(self.run_until(MatchPhase::InProgress, 120.0));
    }

    /// `player` picks up the objective at `site` and delivers it.
    pub fn capture(&mut self, player: PlayerId, site: SiteId) -> Result<(), EventError> {
        self.submit(MatchEvent::ObjectiveTaken { site, player })?;
        self.deliver(player, site)
    }

    pub fn deliver(&mut self, player: PlayerId, site: SiteId) -> Result<(), EventError> {
        self.submit(MatchEvent::ObjectiveDelivered {
            site,
            player,
            assists: vec![],
        })
    }

    /// The objective the other team captures in this variant.
    pub fn enemy_flag(&self, team: TeamId) -> SiteId {
        if let Some(dispenser) = self.dispenser {
            return dispenser;
        }
        match (self.machine.config().variant, team) {
            (Variant::RoundCtf | Variant::FlagRun, TeamId::RED) | (Variant::Ctf, TeamId::BLUE) => {
                self.red_base
            }
            _ => self.blue_base,
        }
    }

    /// A capture by `team`, through its first player.
    pub fn team_capture(&mut self, team: TeamId) -> Result<(), EventError> {
        let player = if team == TeamId::RED { RED_1 } else { BLUE_1 };
        let site = self.enemy_flag(team);
        self.capture(player, site)
    }

    pub fn kill(&mut self, victim: PlayerId, killer: PlayerId) -> Result<(), EventError> {
        self.submit(MatchEvent::PlayerEliminated {
            victim,
            killer: Some(killer),
        })
    }

    pub fn expire_clock(&mut self) -> Result<(), EventError> {
        self.submit(MatchEvent::ClockExpired)
    }

    pub fn phase_history(&self) -> Vec<MatchPhase> {
        self.sink.phase_history()
    }

    pub fn scores(&self) -> Vec<u32> {
        self.machine.teams().iter().map(|t| t.score()).collect()
    }

    pub fn announced(&self, announcement: Announcement) -> usize {
        self.sink
            .announcements()
            .iter()
            .filter(|a| **a == announcement)
            .count()
    }
}

/// Classic capture the flag without halftime, so regulation is one period.
pub fn single_period_ctf() -> MatchConfig {
    MatchConfig {
        halftime_enabled: false,
        ..MatchConfig::ctf()
    }
}

/// Round capture the flag with one life each and no pickup delay.
pub fn quick_round_ctf() -> MatchConfig {
    MatchConfig {
        lives_per_player: 1,
        flag_pickup_delay: 0,
        ..MatchConfig::round_ctf()
    }
}

/// Flag run with one life each and no pickup delay.
pub fn quick_flag_run() -> MatchConfig {
    MatchConfig {
        lives_per_player: 1,
        flag_pickup_delay: 0,
        ..MatchConfig::flag_run()
    }
}

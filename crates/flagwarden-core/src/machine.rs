//! The match state machine.
//!
//! [`MatchStateMachine`] is the only thing that changes [`MatchPhase`]. It
//! owns the team records, the objective board, the scoring engine, the round
//! controller and a [`TimerService`] for everything that happens later:
//! phase timers, the advantage check, the flag pickup countdown and
//! objective auto-returns.
//!
//! # Transitions
//!
//! [`MatchStateMachine::request_phase`] runs the old phase's exit actions,
//! bumps the [`PhaseEpoch`], then runs the new phase's entry actions. A
//! request made while a transition is running (entry actions that chain into
//! another phase) is queued and applied once the current one completes.
//!
//! # Timers
//!
//! Every scheduled task carries a token: the phase epoch, the round number or
//! the objective it belongs to. When a task fires the machine checks the
//! token against current state and drops the task if it no longer applies.

use std::collections::VecDeque;

use cadence::{Fired, TimerHandle, TimerService, TIME_EPSILON};
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::{MatchConfig, Variant};
use crate::error::{ConfigError, EventError, TransitionError};
use crate::event::{MatchContext, MatchEvent};
use crate::objective::{ObjectiveBoard, ObjectiveStatus, SiteId};
use crate::phase::{opening_phase, timed_successor, MatchPhase, PhaseEpoch};
use crate::player::{PlayerFlags, PlayerId};
use crate::presentation::{Announcement, Cue, MatchSnapshot};
use crate::round::{CountdownStep, RoundLifecycleController, RoundRecord, RoundStrategy};
use crate::scoring::{
    clinched_team, determine_advantage, leading_team, surviving_teams, AdvantageCheck,
    AdvantageState, Capture, Period, RoundWin, ScoreDecision, ScoringEngine, ScoringLog, Standing,
};
use crate::team::{EndReason, MatchOutcome, TeamId, TeamRecord, Winner};

// =============================================================================
// Scheduled tasks
// =============================================================================

/// What a scheduled task does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TaskKind {
    /// The current timed phase ran out.
    PhaseExpired,
    /// Periodic advantage re-evaluation.
    AdvantageCheck,
    /// One second of the flag pickup countdown.
    FlagCountdown,
    /// A dropped objective goes home.
    AutoReturn(SiteId),
}

/// What a scheduled task belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TaskToken {
    /// A single phase instance.
    Phase(PhaseEpoch),
    /// A single round.
    Round(u32),
    /// An objective.
    Objective(SiteId),
}

/// Timer payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ScheduledTask {
    pub(crate) kind: TaskKind,
    pub(crate) token: TaskToken,
}

/// How a round was won.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WinBy {
    Capture,
    Elimination,
    HeldOut,
}

// =============================================================================
// MatchStateMachine
// =============================================================================

/// Authoritative match lifecycle.
///
/// Single-threaded and tick-driven. Collaborators are passed in on every
/// call through a [`MatchContext`].
///
/// # Example
///
/// ```
/// use flagwarden_core::{
///     GameClock, MatchConfig, MatchContext, MatchPhase, MatchStateMachine, ObjectiveBoard,
///     RecordingSink, Roster, TeamId,
/// };
/// use glam::Vec2;
///
/// let mut board = ObjectiveBoard::new();
/// board.add_base(TeamId::RED, Vec2::new(-50.0, 0.0));
/// board.add_base(TeamId::BLUE, Vec2::new(50.0, 0.0));
///
/// let mut machine = MatchStateMachine::new(MatchConfig::ctf(), board);
/// let (mut clock, mut roster, mut sink) = (GameClock::new(), Roster::new(), RecordingSink::new());
/// let mut ctx = MatchContext::new(&mut clock, &mut roster, &mut sink);
///
/// machine.begin_match(&mut ctx).unwrap();
/// assert_eq!(machine.phase(), MatchPhase::Countdown);
///
/// for _ in 0..60 {
///     machine.tick(&mut ctx, 0.1);
/// }
/// assert_eq!(machine.phase(), MatchPhase::InProgress);
/// ```
#[derive(Debug)]
pub struct MatchStateMachine {
    config: MatchConfig,
    phase: MatchPhase,
    epoch: PhaseEpoch,
    transitioning: bool,
    pending: VecDeque<MatchPhase>,
    teams: Vec<TeamRecord>,
    scoring: ScoringEngine,
    advantage: AdvantageState,
    board: ObjectiveBoard,
    rounds: RoundLifecycleController,
    timers: TimerService<ScheduledTask>,
    phase_timer: Option<TimerHandle>,
    countdown_timer: Option<TimerHandle>,
    advantage_timer: Option<TimerHandle>,
    period: Period,
    overtime_index: u8,
    outcome: Option<MatchOutcome>,
    last_published: Option<MatchSnapshot>,
    summary_team: Option<TeamId>,
    setup_error: Option<ConfigError>,
}

impl MatchStateMachine {
    /// Creates a machine in `Warmup` with the variant's round strategy.
    #[must_use]
    pub fn new(config: MatchConfig, board: ObjectiveBoard) -> Self {
        let rounds = RoundLifecycleController::new(&config);
        Self::assemble(config, board, rounds)
    }

    /// Creates a machine with a custom round strategy.
    #[must_use]
    pub fn with_strategy(
        config: MatchConfig,
        board: ObjectiveBoard,
        strategy: Box<dyn RoundStrategy>,
    ) -> Self {
        let rounds = RoundLifecycleController::with_strategy(&config, strategy);
        Self::assemble(config, board, rounds)
    }

    fn assemble(config: MatchConfig, board: ObjectiveBoard, rounds: RoundLifecycleController) -> Self {
        let teams = (0..config.num_teams)
            .map(|index| TeamRecord::new(TeamId::new(index)))
            .collect();
        let period = if config.variant.is_round_based() {
            Period::Round(0)
        } else {
            Period::FirstHalf
        };
        Self {
            scoring: ScoringEngine::new(&config),
            config,
            phase: MatchPhase::Warmup,
            epoch: PhaseEpoch::default(),
            transitioning: false,
            pending: VecDeque::new(),
            teams,
            advantage: AdvantageState::default(),
            board,
            rounds,
            timers: TimerService::new(),
            phase_timer: None,
            countdown_timer: None,
            advantage_timer: None,
            period,
            overtime_index: 0,
            outcome: None,
            last_published: None,
            summary_team: None,
            setup_error: None,
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> MatchPhase {
        self.phase
    }

    /// Serial of the current phase instance.
    #[must_use]
    pub const fn epoch(&self) -> PhaseEpoch {
        self.epoch
    }

    /// The configuration.
    #[must_use]
    pub const fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Team records, indexed by team.
    #[must_use]
    pub fn teams(&self) -> &[TeamRecord] {
        &self.teams
    }

    /// The round record.
    #[must_use]
    pub const fn round_record(&self) -> &RoundRecord {
        self.rounds.record()
    }

    /// The team on attack this round, for variants with fixed roles.
    #[must_use]
    pub fn attacking_team(&self) -> Option<TeamId> {
        self.rounds.attacker()
    }

    /// The advantage state.
    #[must_use]
    pub const fn advantage(&self) -> &AdvantageState {
        &self.advantage
    }

    /// Every capture so far.
    #[must_use]
    pub const fn scoring_log(&self) -> &ScoringLog {
        self.scoring.log()
    }

    /// The result, once decided.
    #[must_use]
    pub const fn outcome(&self) -> Option<MatchOutcome> {
        self.outcome
    }

    /// Why a round could not be set up, if the match was abandoned for it.
    #[must_use]
    pub const fn setup_error(&self) -> Option<&ConfigError> {
        self.setup_error.as_ref()
    }

    /// The period scores are currently credited to.
    #[must_use]
    pub const fn period(&self) -> Period {
        self.period
    }

    /// The objective board.
    #[must_use]
    pub const fn board(&self) -> &ObjectiveBoard {
        &self.board
    }

    /// Mutable board access, for placing sites before the match begins.
    pub fn board_mut(&mut self) -> &mut ObjectiveBoard {
        &mut self.board
    }

    /// Number of tasks waiting in the timer service.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Builds the snapshot observers would see right now.
    #[must_use]
    pub fn snapshot(&self, clock: &dyn Clock) -> MatchSnapshot {
        let remaining = if self.phase.is_live() {
            clock.remaining()
        } else {
            self.phase_timer
                .and_then(|handle| self.timers.remaining(handle))
                .unwrap_or(0.0)
        };
        let record = self.rounds.record();
        MatchSnapshot {
            phase: self.phase,
            team_scores: self.teams.iter().map(TeamRecord::score).collect(),
            remaining_time: whole_seconds(remaining),
            round_number: record.round_number(),
            total_rounds: record.total_rounds(),
            advantage_team: self.advantage.team().filter(|_| self.advantage.is_active()),
            is_at_intermission: self.phase == MatchPhase::Intermission,
        }
    }

    // -------------------------------------------------------------------------
    // Driving the machine
    // -------------------------------------------------------------------------

    /// Leaves `Warmup`.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::Config`] if the configuration or the board
    /// is not usable; the match stays in `Warmup`. Returns
    /// [`TransitionError::Illegal`] if the match has already begun.
    pub fn begin_match(&mut self, ctx: &mut MatchContext<'_>) -> Result<(), TransitionError> {
        let opening = opening_phase(self.config.phase_flow());
        if self.phase != MatchPhase::Warmup {
            return Err(TransitionError::Illegal {
                from: self.phase,
                to: opening,
            });
        }
        let ready = self
            .config
            .validate()
            .and_then(|()| self.rounds.check_ready(&self.board));
        if let Err(err) = ready {
            error!(%err, "match cannot start");
            self.publish(ctx);
            return Err(err.into());
        }
        info!(
            variant = %self.config.variant,
            teams = self.config.num_teams,
            "match starting"
        );
        self.request_phase(ctx, opening)
    }

    /// Moves the match to `to`.
    ///
    /// Requesting the current phase does nothing. A request made from within
    /// a running transition is queued behind it.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] if the move is not allowed; the match
    /// stays where it is.
    pub fn request_phase(
        &mut self,
        ctx: &mut MatchContext<'_>,
        to: MatchPhase,
    ) -> Result<(), TransitionError> {
        if self.transitioning {
            debug!(%to, "phase request queued");
            self.pending.push_back(to);
            return Ok(());
        }
        let result = self.apply_transition(ctx, to);
        while let Some(next) = self.pending.pop_front() {
            match self.apply_transition(ctx, next) {
                Ok(()) => {}
                Err(TransitionError::Config(err)) => self.abort_round_setup(ctx, err),
                Err(err) => debug!(%err, "queued phase request dropped"),
            }
        }
        result
    }

    /// Advances the match by `dt` seconds.
    ///
    /// Collects the timers due within `dt`, runs the clock during live play,
    /// then dispatches what fired. Anything scheduled while handling this
    /// tick starts counting from the end of it.
    pub fn tick(&mut self, ctx: &mut MatchContext<'_>, dt: f64) {
        if !dt.is_finite() || dt < 0.0 {
            debug!(dt, "ignoring invalid tick");
            return;
        }
        let fired = self.timers.advance(dt);
        if self.phase.is_live() && ctx.clock.advance(dt) {
            self.on_time_expired(ctx);
        }
        for task in fired {
            self.dispatch(ctx, task);
        }
        self.publish(ctx);
    }

    /// Submits a gameplay or operator event.
    ///
    /// # Errors
    ///
    /// Returns [`EventError`] if the event does not apply; nothing changes.
    pub fn submit(
        &mut self,
        ctx: &mut MatchContext<'_>,
        event: MatchEvent,
    ) -> Result<(), EventError> {
        debug!(?event, phase = %self.phase, "event submitted");
        let result = match event {
            MatchEvent::ObjectiveTaken { site, player } => self.on_taken(ctx, site, player),
            MatchEvent::ObjectiveDropped { site } => self.on_dropped(site),
            MatchEvent::ObjectiveDelivered {
                site,
                player,
                assists,
            } => self.on_delivered(ctx, site, player, assists),
            MatchEvent::ObjectiveReturned { site } => self.on_returned(ctx, site),
            MatchEvent::PlayerEliminated { victim, killer } => {
                self.on_eliminated(ctx, victim, killer)
            }
            MatchEvent::ClockExpired => self.on_clock_expired(ctx),
            MatchEvent::AdminForceEndMatch { winner } => self.on_admin_end(ctx, winner),
        };
        if let Err(err) = &result {
            warn!(%err, phase = %self.phase, "event rejected");
        }
        self.publish(ctx);
        result
    }

    /// Handles the match clock reaching zero.
    ///
    /// Only regulation and overtime play react; anything else is ignored.
    pub fn on_time_expired(&mut self, ctx: &mut MatchContext<'_>) {
        match self.phase {
            MatchPhase::InProgress => self.regulation_expired(ctx),
            MatchPhase::Overtime => self.overtime_expired(ctx),
            phase => debug!(%phase, "time expiry ignored"),
        }
    }

    // -------------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------------

    fn apply_transition(
        &mut self,
        ctx: &mut MatchContext<'_>,
        to: MatchPhase,
    ) -> Result<(), TransitionError> {
        let from = self.phase;
        if from == to {
            debug!(phase = %to, "already in requested phase");
            return Ok(());
        }
        if from.is_terminal() {
            debug!(%to, "match over, request ignored");
            return Err(TransitionError::Terminal { to });
        }
        if !from.can_transition_to(to) {
            warn!(%from, %to, "illegal phase transition refused");
            return Err(TransitionError::Illegal { from, to });
        }
        if to == MatchPhase::InProgress {
            if let Err(err) = self.rounds.check_ready(&self.board) {
                error!(%err, "live play refused");
                return Err(err.into());
            }
        }

        debug_assert!(!self.transitioning, "re-entrant phase transition");
        self.transitioning = true;
        self.exit_phase(ctx, from, to);
        self.phase = to;
        self.epoch = self.epoch.next();
        info!(%from, %to, epoch = self.epoch.as_u64(), "phase transition");
        self.enter_phase(ctx, from, to);
        self.transitioning = false;

        self.publish(ctx);
        Ok(())
    }

    /// Queues the follow-up phase of a pass-through phase.
    fn follow_with(&mut self, to: MatchPhase) {
        debug_assert!(self.transitioning);
        self.pending.push_back(to);
    }

    /// Requests `to` from outside a transition and logs a refusal.
    ///
    /// A refusal caused by the board abandons the match rather than leaving
    /// it parked in a phase whose timer has already fired.
    fn advance_to(&mut self, ctx: &mut MatchContext<'_>, to: MatchPhase) {
        match self.request_phase(ctx, to) {
            Ok(()) => {}
            Err(TransitionError::Config(err)) => self.abort_round_setup(ctx, err),
            Err(err) => error!(%err, "phase change refused"),
        }
    }

    fn exit_phase(&mut self, ctx: &mut MatchContext<'_>, from: MatchPhase, to: MatchPhase) {
        let epoch = self.epoch;
        self.timers
            .cancel_where(|task| task.token == TaskToken::Phase(epoch));
        self.phase_timer = None;
        self.advantage_timer = None;

        if from.is_live() {
            self.advantage.clear();
            ctx.clock.pause();
        }
        if from == MatchPhase::Intermission && to == MatchPhase::InProgress {
            if let Err(err) = self.start_round(ctx) {
                self.abort_round_setup(ctx, err);
            }
        }
    }

    fn enter_phase(&mut self, ctx: &mut MatchContext<'_>, from: MatchPhase, to: MatchPhase) {
        match to {
            MatchPhase::Warmup => {}
            MatchPhase::PlayerIntro => {
                self.schedule_phase_timer(self.config.player_intro_duration);
            }
            MatchPhase::Countdown => {
                ctx.sink.cue(Cue::Announce(Announcement::MatchStarting));
                self.schedule_phase_timer(self.config.countdown_duration);
            }
            MatchPhase::InProgress => {
                match from {
                    MatchPhase::Countdown => {
                        self.period = Period::FirstHalf;
                        self.reset_objectives();
                    }
                    MatchPhase::ExitingHalftime => self.period = Period::SecondHalf,
                    _ => {}
                }
                start_clock(&mut *ctx.clock, self.config.time_limit);
                if from != MatchPhase::Intermission {
                    unfreeze_all(ctx);
                }
            }
            MatchPhase::Intermission => {
                ctx.clock.pause();
                let duration = if self.rounds.record().round_number() == 0 {
                    self.config.first_intermission_duration
                } else {
                    self.config.intermission_duration
                };
                self.schedule_phase_timer(duration);
            }
            MatchPhase::EnteringHalftime => {
                freeze_all(ctx);
                ctx.sink.cue(Cue::Announce(Announcement::Halftime));
                self.reset_objectives();
                self.follow_with(MatchPhase::Halftime);
            }
            MatchPhase::Halftime => self.schedule_phase_timer(self.config.halftime_duration),
            MatchPhase::ExitingHalftime => {
                self.rounds
                    .swap_sides_if_configured(&mut self.board, &mut *ctx.sink);
                self.reset_objectives();
                self.follow_with(MatchPhase::InProgress);
            }
            MatchPhase::EnteringOvertime => {
                self.overtime_index = self.overtime_index.saturating_add(1);
                ctx.sink.cue(Cue::Announce(Announcement::Overtime));
                if self.config.variant.is_round_based() {
                    if let Err(err) = self.start_round(ctx) {
                        self.abort_round_setup(ctx, err);
                        return;
                    }
                } else if from == MatchPhase::InProgress {
                    self.reset_objectives();
                }
                self.period = Period::Overtime(self.overtime_index);
                info!(overtime = self.overtime_index, "overtime");
                self.follow_with(MatchPhase::Overtime);
            }
            MatchPhase::Overtime => {
                start_clock(&mut *ctx.clock, self.config.overtime_duration);
                unfreeze_all(ctx);
            }
            MatchPhase::EnteringSuddenDeath => {
                ctx.sink.cue(Cue::Announce(Announcement::SuddenDeath));
                if self.config.variant.is_round_based() {
                    if let Err(err) = self.start_round(ctx) {
                        self.abort_round_setup(ctx, err);
                        return;
                    }
                    self.period = Period::Overtime(self.overtime_index);
                }
                self.follow_with(MatchPhase::SuddenDeath);
            }
            MatchPhase::SuddenDeath => {
                ctx.clock.set_remaining(0.0);
                ctx.clock.pause();
                unfreeze_all(ctx);
            }
            MatchPhase::RoundScoreSummary => {
                self.schedule_phase_timer(self.config.score_summary_duration);
            }
            MatchPhase::RoundFadeOut => self.schedule_phase_timer(self.config.fade_out_duration),
            MatchPhase::RoundAnnounce => {
                ctx.sink.cue(Cue::Announce(Announcement::RoundStarting {
                    round: self.rounds.record().round_number() + 1,
                }));
                self.schedule_phase_timer(self.config.round_announce_duration);
            }
            MatchPhase::WaitingPostMatch => self.enter_post_match(ctx),
        }
    }

    fn enter_post_match(&mut self, ctx: &mut MatchContext<'_>) {
        self.timers.clear();
        self.phase_timer = None;
        self.countdown_timer = None;
        self.advantage_timer = None;
        self.rounds.cancel_flag_countdown();
        self.advantage.clear();
        ctx.clock.pause();
        freeze_all(ctx);

        let outcome = *self.outcome.get_or_insert(MatchOutcome {
            winner: Winner::NoWinner,
            reason: EndReason::AdminForced,
        });
        ctx.sink.cue(Cue::Announce(Announcement::MatchOver {
            winner: outcome.winner,
        }));
        info!(winner = %outcome.winner, reason = %outcome.reason, "match over");
    }

    // -------------------------------------------------------------------------
    // Timers
    // -------------------------------------------------------------------------

    fn schedule_once(&mut self, delay: f64, kind: TaskKind, token: TaskToken) -> Option<TimerHandle> {
        match self.timers.schedule_once(delay, ScheduledTask { kind, token }) {
            Ok(handle) => Some(handle),
            Err(err) => {
                error!(%err, ?kind, "task not scheduled");
                None
            }
        }
    }

    fn schedule_repeating(
        &mut self,
        interval: f64,
        kind: TaskKind,
        token: TaskToken,
    ) -> Option<TimerHandle> {
        match self
            .timers
            .schedule_repeating(interval, ScheduledTask { kind, token })
        {
            Ok(handle) => Some(handle),
            Err(err) => {
                error!(%err, ?kind, "task not scheduled");
                None
            }
        }
    }

    fn schedule_phase_timer(&mut self, duration: f64) {
        let token = TaskToken::Phase(self.epoch);
        self.phase_timer = self.schedule_once(duration, TaskKind::PhaseExpired, token);
    }

    fn cancel_timer(&mut self, handle: Option<TimerHandle>) {
        if let Some(handle) = handle {
            self.timers.cancel(handle);
        }
    }

    /// Returns true if a fired task still applies to the current state.
    fn task_is_current(&self, handle: TimerHandle, task: ScheduledTask) -> bool {
        let token_matches = match task.token {
            TaskToken::Phase(epoch) => epoch == self.epoch,
            TaskToken::Round(round) => round == self.rounds.record().round_number(),
            TaskToken::Objective(_) => true,
        };
        token_matches
            && match task.kind {
                TaskKind::PhaseExpired => self.phase_timer == Some(handle),
                TaskKind::AdvantageCheck => {
                    self.advantage.is_active() && self.advantage_timer == Some(handle)
                }
                TaskKind::FlagCountdown => {
                    self.phase.is_live() && self.countdown_timer == Some(handle)
                }
                TaskKind::AutoReturn(site) => self.board.objective(site).is_some_and(|o| {
                    o.status() == ObjectiveStatus::Dropped
                        && o.auto_return_timer() == Some(handle)
                }),
            }
    }

    fn dispatch(&mut self, ctx: &mut MatchContext<'_>, fired: Fired<ScheduledTask>) {
        let task = fired.payload;
        if !self.task_is_current(fired.handle, task) {
            debug!(handle = %fired.handle, kind = ?task.kind, "stale timer discarded");
            return;
        }
        match task.kind {
            TaskKind::PhaseExpired => {
                self.phase_timer = None;
                self.on_phase_timer(ctx);
            }
            TaskKind::AdvantageCheck => self.on_advantage_check(ctx),
            TaskKind::FlagCountdown => self.on_flag_countdown(ctx),
            TaskKind::AutoReturn(site) => {
                debug!(%site, "objective auto-returned");
                self.return_objective(ctx, site);
            }
        }
    }

    fn on_phase_timer(&mut self, ctx: &mut MatchContext<'_>) {
        if self.phase == MatchPhase::RoundScoreSummary {
            self.finish_summary(ctx);
            return;
        }
        match timed_successor(self.phase, self.config.phase_flow()) {
            Some(next) => self.advance_to(ctx, next),
            None => debug!(phase = %self.phase, "phase timer without successor"),
        }
    }

    fn on_flag_countdown(&mut self, ctx: &mut MatchContext<'_>) {
        match self.rounds.tick_flag_countdown(&mut *ctx.sink) {
            CountdownStep::Continue(remaining) => debug!(remaining, "flag countdown"),
            CountdownStep::Finished => self.release_flags(ctx),
            CountdownStep::Idle => {
                let handle = self.countdown_timer.take();
                self.cancel_timer(handle);
            }
        }
    }

    fn on_advantage_check(&mut self, ctx: &mut MatchContext<'_>) {
        let team = self.advantage.team();
        if self.advantage.check(&self.board, self.config.advantage_grace) == AdvantageCheck::Revoked
        {
            info!(team = ?team, "advantage revoked");
            self.end_advantage(ctx);
            self.end_of_period(ctx);
        }
    }

    // -------------------------------------------------------------------------
    // Rounds
    // -------------------------------------------------------------------------

    fn reset_objectives(&mut self) {
        let stale = self.rounds.strategy().reset_objectives(&mut self.board);
        for handle in stale {
            self.timers.cancel(handle);
        }
    }

    fn start_round(&mut self, ctx: &mut MatchContext<'_>) -> Result<(), ConfigError> {
        let start = self.rounds.init_round(
            &mut self.board,
            &mut self.teams,
            &mut *ctx.players,
            &mut *ctx.sink,
        )?;
        for handle in start.stale_timers {
            self.timers.cancel(handle);
        }
        self.period = Period::Round(start.round);
        self.summary_team = None;

        let previous = self.countdown_timer.take();
        self.cancel_timer(previous);
        if start.countdown {
            self.countdown_timer = self.schedule_repeating(
                1.0,
                TaskKind::FlagCountdown,
                TaskToken::Round(start.round),
            );
        } else {
            self.release_flags(ctx);
        }
        Ok(())
    }

    /// Abandons the match after a round failed to set up.
    fn abort_round_setup(&mut self, ctx: &mut MatchContext<'_>, err: ConfigError) {
        warn!(%err, phase = %self.phase, "round setup failed, abandoning match");
        self.setup_error = Some(err);
        self.end_match(ctx, Winner::NoWinner, EndReason::SetupFailed);
    }

    fn release_flags(&mut self, ctx: &mut MatchContext<'_>) {
        let handle = self.countdown_timer.take();
        self.cancel_timer(handle);
        let grants = self
            .rounds
            .flags_are_ready(&mut self.board, &*ctx.players, &mut *ctx.sink);
        info!(grants = grants.len(), "objectives released");
    }

    fn finish_round(&mut self, ctx: &mut MatchContext<'_>, winner: Option<TeamId>) {
        let handle = self.countdown_timer.take();
        self.cancel_timer(handle);
        self.rounds
            .end_of_round(winner, &mut self.teams, &mut *ctx.players, &mut *ctx.sink);
    }

    fn round_won(&mut self, ctx: &mut MatchContext<'_>, team: TeamId, by: WinBy) {
        match self.phase {
            MatchPhase::Overtime | MatchPhase::SuddenDeath => {
                let reason = match (by, self.phase) {
                    (WinBy::Elimination, _) => EndReason::Elimination,
                    (WinBy::HeldOut, _) => EndReason::TimeLimit,
                    (WinBy::Capture, MatchPhase::SuddenDeath) => EndReason::SuddenDeath,
                    (WinBy::Capture, _) => EndReason::GoldenCap,
                };
                self.finish_round(ctx, Some(team));
                self.end_match(ctx, Winner::Team(team), reason);
            }
            _ => {
                self.finish_round(ctx, Some(team));
                if self.decide_if_clinched(ctx) {
                    return;
                }
                if by == WinBy::Capture && self.rounds.strategy().routes_through_summary() {
                    self.summary_team = Some(team);
                    self.advance_to(ctx, MatchPhase::RoundScoreSummary);
                } else if !self.resolve_round_end(ctx) {
                    self.advance_to(ctx, MatchPhase::Intermission);
                }
            }
        }
    }

    /// Scores a round won without a capture, for variants with fixed roles.
    fn score_round_win(&mut self, team: TeamId, win: RoundWin, remaining: u32) {
        let points = self.scoring.on_round_won(&mut self.teams, team, win, remaining);
        if win == RoundWin::Eliminated {
            self.bank_time_bonus(team, remaining);
        }
        info!(%team, ?win, points, "round scored");
    }

    fn bank_time_bonus(&mut self, team: TeamId, remaining: u32) {
        let bonus = self.scoring.time_bonus(remaining);
        if let Some(record) = self.teams.get_mut(team.index()) {
            record.add_time_bonus(bonus);
            debug!(%team, bonus, banked = record.time_bonus(), "time bonus");
        }
    }

    /// Ends the match early once no rival can catch the leader in the
    /// regulation rounds left. Only applies to variants with fixed roles.
    fn decide_if_clinched(&mut self, ctx: &mut MatchContext<'_>) -> bool {
        if self.rounds.attacker().is_none() {
            return false;
        }
        let upcoming = self.rounds.upcoming_attackers();
        if upcoming.is_empty() {
            return false;
        }
        let clinched = clinched_team(
            &self.teams,
            &upcoming,
            self.scoring.max_capture_value(),
            self.scoring.defense_score(),
        );
        let Some(team) = clinched else {
            return false;
        };
        info!(%team, rounds_left = upcoming.len(), "match clinched");
        self.end_match(ctx, Winner::Team(team), EndReason::Clinched);
        true
    }

    /// Decides the match once the final round has been played.
    ///
    /// Returns false if more rounds follow.
    fn resolve_round_end(&mut self, ctx: &mut MatchContext<'_>) -> bool {
        if !self.rounds.record().is_final_round() {
            return false;
        }
        let standing = Standing::for_variant(self.config.variant);
        if let Some(team) = leading_team(&self.teams, standing) {
            self.end_match(ctx, Winner::Team(team), EndReason::RoundLimit);
        } else if self.config.allow_overtime {
            self.advance_to(ctx, MatchPhase::EnteringOvertime);
        } else {
            self.end_match(ctx, Winner::NoWinner, EndReason::RoundLimit);
        }
        true
    }

    fn finish_summary(&mut self, ctx: &mut MatchContext<'_>) {
        if let Some(team) = self.summary_team.take() {
            if let ScoreDecision::EndMatch { winner, reason } =
                self.scoring.evaluate(team, &self.teams)
            {
                self.end_match(ctx, Winner::Team(winner), reason);
                return;
            }
        }
        if !self.resolve_round_end(ctx) {
            self.advance_to(ctx, MatchPhase::RoundFadeOut);
        }
    }

    // -------------------------------------------------------------------------
    // Clock expiry and advantage
    // -------------------------------------------------------------------------

    fn regulation_expired(&mut self, ctx: &mut MatchContext<'_>) {
        if self.advantage.is_active() {
            info!(team = ?self.advantage.team(), "advantage window ran out");
            self.end_advantage(ctx);
            self.end_of_period(ctx);
            return;
        }
        if self.config.advantage_applies() && self.config.advantage_duration > 0.0 {
            if let Some(team) = determine_advantage(&self.board, self.config.num_teams) {
                self.begin_advantage(ctx, team);
                return;
            }
        }
        self.end_of_period(ctx);
    }

    fn begin_advantage(&mut self, ctx: &mut MatchContext<'_>, team: TeamId) {
        self.advantage.activate(team);
        ctx.clock.set_remaining(self.config.advantage_duration);
        ctx.clock.resume();
        let token = TaskToken::Phase(self.epoch);
        self.advantage_timer = self.schedule_repeating(1.0, TaskKind::AdvantageCheck, token);
        ctx.sink
            .cue(Cue::Announce(Announcement::AdvantageGained { team }));
        info!(%team, window = self.config.advantage_duration, "advantage granted");
    }

    fn end_advantage(&mut self, ctx: &mut MatchContext<'_>) {
        if let Some(team) = self.advantage.team() {
            ctx.sink.cue(Cue::Announce(Announcement::AdvantageLost { team }));
        }
        self.advantage.clear();
        let handle = self.advantage_timer.take();
        self.cancel_timer(handle);
    }

    /// Ends the current half or round after time, advantage or a
    /// capture under advantage.
    fn end_of_period(&mut self, ctx: &mut MatchContext<'_>) {
        if let Some(defender) = self.rounds.defender() {
            info!(team = %defender, "defense held out");
            self.score_round_win(defender, RoundWin::HeldOut, 0);
            self.round_won(ctx, defender, WinBy::HeldOut);
            return;
        }
        if self.config.variant.is_round_based() {
            self.finish_round(ctx, None);
            if !self.resolve_round_end(ctx) {
                self.advance_to(ctx, MatchPhase::Intermission);
            }
            return;
        }
        if self.period == Period::FirstHalf && self.config.halftime_enabled {
            self.advance_to(ctx, MatchPhase::EnteringHalftime);
            return;
        }
        if let Some(team) = leading_team(&self.teams, Standing::Score) {
            self.end_match(ctx, Winner::Team(team), EndReason::TimeLimit);
        } else if self.config.allow_overtime {
            self.advance_to(ctx, MatchPhase::EnteringOvertime);
        } else {
            self.end_match(ctx, Winner::NoWinner, EndReason::TimeLimit);
        }
    }

    fn overtime_expired(&mut self, ctx: &mut MatchContext<'_>) {
        if self.config.variant.is_round_based() {
            self.finish_round(ctx, None);
        }
        let standing = Standing::for_variant(self.config.variant);
        if let Some(team) = leading_team(&self.teams, standing) {
            self.end_match(ctx, Winner::Team(team), EndReason::TimeLimit);
        } else if self.config.sudden_death_enabled {
            self.advance_to(ctx, MatchPhase::EnteringSuddenDeath);
        } else {
            self.advance_to(ctx, MatchPhase::EnteringOvertime);
        }
    }

    fn end_match(&mut self, ctx: &mut MatchContext<'_>, winner: Winner, reason: EndReason) {
        if self.outcome.is_some() || self.phase.is_terminal() {
            debug!(%winner, %reason, "match already decided");
            return;
        }
        self.outcome = Some(MatchOutcome { winner, reason });
        info!(%winner, %reason, "match decided");
        self.advance_to(ctx, MatchPhase::WaitingPostMatch);
    }

    // -------------------------------------------------------------------------
    // Events
    // -------------------------------------------------------------------------

    fn ensure_live(&self) -> Result<(), EventError> {
        if self.outcome.is_some() {
            return Err(EventError::MatchOver);
        }
        if !self.phase.is_live() {
            return Err(EventError::WrongPhase { phase: self.phase });
        }
        Ok(())
    }

    fn on_taken(
        &mut self,
        ctx: &mut MatchContext<'_>,
        site: SiteId,
        player: PlayerId,
    ) -> Result<(), EventError> {
        self.ensure_live()?;
        let team = ctx
            .players
            .team_of(player)
            .ok_or(EventError::UnknownPlayer { player })?;
        let blocked = PlayerFlags::SPECTATOR
            | PlayerFlags::OUT_OF_LIVES
            | PlayerFlags::INACTIVE
            | PlayerFlags::FROZEN;
        let (owner, status, pickup_enabled) = self
            .board
            .objective(site)
            .map(|o| (o.owner(), o.status(), o.pickup_enabled()))
            .ok_or(EventError::UnknownObjective { site })?;
        if ctx.players.flags(player).intersects(blocked)
            || !pickup_enabled
            || status == ObjectiveStatus::Held
            || !self.board.carried_by(player).is_empty()
        {
            return Err(EventError::NotEligible { player, site });
        }

        if self.config.variant.pickup_rule().allows(owner, team) {
            let stale = self
                .board
                .objective_mut(site)
                .and_then(|objective| objective.take(player));
            self.cancel_timer(stale);
            debug!(%site, %player, %team, "objective taken");
            Ok(())
        } else if owner == Some(team) && status == ObjectiveStatus::Dropped {
            debug!(%site, %player, "objective returned by touch");
            self.return_objective(ctx, site);
            Ok(())
        } else {
            Err(EventError::NotEligible { player, site })
        }
    }

    fn on_dropped(&mut self, site: SiteId) -> Result<(), EventError> {
        self.ensure_live()?;
        let objective = self
            .board
            .objective(site)
            .ok_or(EventError::UnknownObjective { site })?;
        if !objective.is_held() {
            return Err(EventError::NotCarried { site });
        }
        self.drop_objective(site);
        Ok(())
    }

    fn drop_objective(&mut self, site: SiteId) {
        let Some(objective) = self.board.objective_mut(site) else {
            return;
        };
        objective.drop_in_field();
        let delay = self.config.auto_return_delay;
        if delay > 0.0 {
            let handle = self.schedule_once(
                delay,
                TaskKind::AutoReturn(site),
                TaskToken::Objective(site),
            );
            if let (Some(handle), Some(objective)) = (handle, self.board.objective_mut(site)) {
                objective.set_auto_return(handle);
            }
        }
        debug!(%site, "objective dropped");
    }

    fn on_delivered(
        &mut self,
        ctx: &mut MatchContext<'_>,
        site: SiteId,
        player: PlayerId,
        assists: Vec<PlayerId>,
    ) -> Result<(), EventError> {
        self.ensure_live()?;
        let team = ctx
            .players
            .team_of(player)
            .ok_or(EventError::UnknownPlayer { player })?;
        let objective = self
            .board
            .objective(site)
            .ok_or(EventError::UnknownObjective { site })?;
        if objective.holder() != Some(player) {
            return Err(EventError::NotHolder { player, site });
        }
        if self.config.variant == Variant::Ctf
            && self
                .board
                .status_of_team(team)
                .is_some_and(|status| status != ObjectiveStatus::Home)
        {
            return Err(EventError::NotEligible { player, site });
        }

        let stale = self.board.deliver(site);
        self.cancel_timer(stale);
        let capture = Capture {
            team,
            scorer: player,
            assists,
            remaining_time: whole_seconds(ctx.clock.remaining()),
            period: self.period,
        };
        let remaining = capture.remaining_time;
        let decision = self.scoring.on_objective_delivered(&mut self.teams, capture);
        if self.rounds.attacker() == Some(team) {
            self.bank_time_bonus(team, remaining);
        }
        ctx.sink
            .cue(Cue::Announce(Announcement::Capture { team, scorer: player }));
        info!(
            %team,
            %player,
            %site,
            period = %self.period,
            scores = ?self.teams.iter().map(TeamRecord::score).collect::<Vec<_>>(),
            "capture"
        );

        if let ScoreDecision::EndMatch { winner, reason } = decision {
            self.end_match(ctx, Winner::Team(winner), reason);
            return Ok(());
        }

        let had_advantage = self.advantage.is_active();
        if had_advantage {
            self.end_advantage(ctx);
        }
        if self.config.variant.is_round_based() {
            self.round_won(ctx, team, WinBy::Capture);
            return Ok(());
        }
        match self.phase {
            MatchPhase::Overtime => {
                self.end_match(ctx, Winner::Team(team), EndReason::GoldenCap);
            }
            MatchPhase::SuddenDeath => {
                self.end_match(ctx, Winner::Team(team), EndReason::SuddenDeath);
            }
            MatchPhase::InProgress if had_advantage => self.end_of_period(ctx),
            _ => {}
        }
        Ok(())
    }

    fn on_returned(&mut self, ctx: &mut MatchContext<'_>, site: SiteId) -> Result<(), EventError> {
        self.ensure_live()?;
        let objective = self
            .board
            .objective(site)
            .ok_or(EventError::UnknownObjective { site })?;
        if objective.is_home() {
            debug!(%site, "objective already home");
            return Ok(());
        }
        self.return_objective(ctx, site);
        Ok(())
    }

    fn return_objective(&mut self, ctx: &mut MatchContext<'_>, site: SiteId) {
        let Some(objective) = self.board.objective_mut(site) else {
            return;
        };
        let owner = objective.owner();
        let stale = objective.send_home();
        self.cancel_timer(stale);
        debug!(%site, "objective home");

        if self.phase != MatchPhase::InProgress || !self.advantage.is_active() {
            return;
        }
        // The advantage team was chasing a capture of this objective.
        let chased = owner.is_some() && owner != self.advantage.team();
        if chased || self.board.all_home() {
            info!(%site, team = ?self.advantage.team(), "chased objective home, advantage over");
            self.end_advantage(ctx);
            self.end_of_period(ctx);
        }
    }

    fn on_eliminated(
        &mut self,
        ctx: &mut MatchContext<'_>,
        victim: PlayerId,
        killer: Option<PlayerId>,
    ) -> Result<(), EventError> {
        self.ensure_live()?;
        let victim_team = ctx
            .players
            .team_of(victim)
            .ok_or(EventError::UnknownPlayer { player: victim })?;
        for site in self.board.carried_by(victim) {
            self.drop_objective(site);
        }

        let killer_team = killer
            .and_then(|k| ctx.players.team_of(k))
            .filter(|team| *team != victim_team);
        let Some(killer_team) = killer_team else {
            debug!(%victim, "no opposing killer, no life lost");
            return Ok(());
        };
        if self.config.lives_per_player == 0 {
            return Ok(());
        }
        if !self.rounds.loses_lives(victim_team) {
            debug!(%victim, team = %victim_team, "attacker respawns, no life lost");
            return Ok(());
        }

        let before = ctx.players.lives(victim);
        if before == 0 || ctx.players.flags(victim).contains(PlayerFlags::OUT_OF_LIVES) {
            debug!(%victim, "victim already out, nothing taken");
            return Ok(());
        }
        let lives = before - 1;
        ctx.players.set_lives(victim, lives);
        if lives == 0 {
            ctx.players.set_flag(victim, PlayerFlags::OUT_OF_LIVES, true);
            self.rounds.record_elimination(victim);
            info!(%victim, team = %victim_team, "player out of lives");
        }
        if self.rounds.strategy().revives_on_kill() {
            if let Some(player) = self.rounds.revive_for(killer_team, &mut *ctx.players) {
                ctx.sink
                    .cue(Cue::Announce(Announcement::Revived { player }));
            }
        }

        if self.config.variant.is_round_based() {
            let survivors = surviving_teams(self.config.num_teams, &*ctx.players);
            if let [survivor] = survivors[..] {
                info!(team = %survivor, "last team standing");
                if self.rounds.attacker().is_some() {
                    let win = if self.rounds.attacker() == Some(survivor) {
                        RoundWin::Eliminated
                    } else {
                        RoundWin::HeldOut
                    };
                    let remaining = whole_seconds(ctx.clock.remaining());
                    self.score_round_win(survivor, win, remaining);
                }
                self.round_won(ctx, survivor, WinBy::Elimination);
            }
        }
        Ok(())
    }

    fn on_clock_expired(&mut self, ctx: &mut MatchContext<'_>) -> Result<(), EventError> {
        if self.outcome.is_some() {
            return Err(EventError::MatchOver);
        }
        match self.phase {
            MatchPhase::InProgress | MatchPhase::Overtime => {
                ctx.clock.set_remaining(0.0);
                self.on_time_expired(ctx);
                Ok(())
            }
            phase => Err(EventError::WrongPhase { phase }),
        }
    }

    fn on_admin_end(
        &mut self,
        ctx: &mut MatchContext<'_>,
        winner: Option<TeamId>,
    ) -> Result<(), EventError> {
        if self.outcome.is_some() || self.phase.is_terminal() {
            return Err(EventError::MatchOver);
        }
        self.end_match(ctx, Winner::from(winner), EndReason::AdminForced);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Presentation
    // -------------------------------------------------------------------------

    fn publish(&mut self, ctx: &mut MatchContext<'_>) {
        let snapshot = self.snapshot(&*ctx.clock);
        if self.last_published.as_ref() == Some(&snapshot) {
            return;
        }
        ctx.sink.publish(&snapshot);
        self.last_published = Some(snapshot);
    }

    #[cfg(test)]
    pub(crate) fn dispatch_for_test(
        &mut self,
        ctx: &mut MatchContext<'_>,
        fired: Fired<ScheduledTask>,
    ) {
        self.dispatch(ctx, fired);
    }
}

fn start_clock(clock: &mut dyn Clock, seconds: f64) {
    if seconds > 0.0 {
        clock.set_remaining(seconds);
        clock.resume();
    } else {
        clock.set_remaining(0.0);
        clock.pause();
    }
}

fn freeze_all(ctx: &mut MatchContext<'_>) {
    for player in ctx.players.player_ids() {
        ctx.players.set_flag(player, PlayerFlags::FROZEN, true);
    }
    ctx.sink.cue(Cue::FreezePlayers);
}

fn unfreeze_all(ctx: &mut MatchContext<'_>) {
    for player in ctx.players.player_ids() {
        ctx.players.set_flag(player, PlayerFlags::FROZEN, false);
    }
    ctx.sink.cue(Cue::UnfreezePlayers);
}

/// Rounds a countdown up to whole seconds.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole_seconds(seconds: f64) -> u32 {
    if !seconds.is_finite() || seconds <= TIME_EPSILON {
        return 0;
    }
    (seconds - TIME_EPSILON).ceil().min(f64::from(u32::MAX)) as u32
}

//! Scoring rules.
//!
//! Everything here decides; nothing here changes the phase. The state
//! machine feeds captures into [`ScoringEngine::on_objective_delivered`],
//! reads back a [`ScoreDecision`], and acts on it.
//!
//! # Rules
//!
//! - **Capture**: the scoring team gains `flag_cap_score` and a
//!   [`ScoringPlay`] is appended to the log. Flag run scales the value with
//!   the time left, see [`ScoringEngine::capture_value`].
//! - **Flag run rounds**: a defense that holds out earns `defense_score`;
//!   an attack that eliminates the defense earns what a capture would have.
//!   Attacking wins also bank a time bonus that breaks ties on points, and
//!   [`clinched_team`] ends the match once the trailer cannot catch up.
//! - **Goal score**: reaching `goal_score` (when non-zero) ends the match.
//! - **Mercy**: a lead of `mercy_score` (when non-zero) over the weakest
//!   opponent ends the match.
//! - **Advantage**: see [`determine_advantage`] and [`AdvantageState`].
//! - **Elimination**: see [`is_team_still_alive`].

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{MatchConfig, Variant};
use crate::objective::{ObjectiveBoard, ObjectiveStatus};
use crate::player::{PlayerDirectory, PlayerFlags, PlayerId};
use crate::team::{EndReason, TeamId, TeamRecord};

// =============================================================================
// Scoring plays
// =============================================================================

/// The part of the match a score happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Period {
    /// First half of single-round play.
    FirstHalf,
    /// Second half of single-round play.
    SecondHalf,
    /// Overtime period, starting at 1.
    Overtime(u8),
    /// Regulation round, starting at 1.
    Round(u32),
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FirstHalf => write!(f, "1st half"),
            Self::SecondHalf => write!(f, "2nd half"),
            Self::Overtime(n) => write!(f, "OT{n}"),
            Self::Round(n) => write!(f, "round {n}"),
        }
    }
}

/// A completed capture, kept for display after the fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringPlay {
    /// Scoring team.
    pub team: TeamId,
    /// Delivering player.
    pub scorer: PlayerId,
    /// Players credited with an assist.
    pub assists: Vec<PlayerId>,
    /// Points the capture was worth.
    pub points: u32,
    /// Whole seconds left on the clock at the time of the capture.
    pub remaining_time: u32,
    /// When it happened.
    pub period: Period,
    /// Every team's score right after the capture.
    pub team_scores: Vec<u32>,
}

/// Append-only list of scoring plays.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringLog {
    plays: Vec<ScoringPlay>,
}

impl ScoringLog {
    /// Appends a play.
    pub fn append(&mut self, play: ScoringPlay) {
        self.plays.push(play);
    }

    /// All plays, oldest first.
    #[must_use]
    pub fn plays(&self) -> &[ScoringPlay] {
        &self.plays
    }

    /// Number of plays.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plays.len()
    }

    /// Returns true if nobody has scored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plays.is_empty()
    }
}

// =============================================================================
// ScoringEngine
// =============================================================================

/// A delivery about to be scored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    /// Scoring team.
    pub team: TeamId,
    /// Delivering player.
    pub scorer: PlayerId,
    /// Assisting players.
    pub assists: Vec<PlayerId>,
    /// Whole seconds left on the clock.
    pub remaining_time: u32,
    /// Current period.
    pub period: Period,
}

/// How a flag run round was won without a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundWin {
    /// The defense held out until the round clock ran out.
    HeldOut,
    /// The attack eliminated the defense.
    Eliminated,
}

/// What the match should do after a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreDecision {
    /// Keep playing.
    Continue,
    /// End the match now.
    EndMatch {
        /// The winning team.
        winner: TeamId,
        /// Why.
        reason: EndReason,
    },
}

/// Capture scoring plus goal and mercy evaluation.
///
/// # Example
///
/// ```
/// use flagwarden_core::config::MatchConfig;
/// use flagwarden_core::player::PlayerId;
/// use flagwarden_core::scoring::{Capture, Period, ScoreDecision, ScoringEngine};
/// use flagwarden_core::team::{EndReason, TeamId, TeamRecord};
///
/// let config = MatchConfig { goal_score: 1, ..MatchConfig::ctf() };
/// let mut engine = ScoringEngine::new(&config);
/// let mut teams = vec![TeamRecord::new(TeamId::RED), TeamRecord::new(TeamId::BLUE)];
///
/// let decision = engine.on_objective_delivered(
///     &mut teams,
///     Capture {
///         team: TeamId::RED,
///         scorer: PlayerId::new(1),
///         assists: vec![],
///         remaining_time: 300,
///         period: Period::FirstHalf,
///     },
/// );
/// assert_eq!(
///     decision,
///     ScoreDecision::EndMatch { winner: TeamId::RED, reason: EndReason::GoalScore }
/// );
/// assert_eq!(engine.log().len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    goal_score: u32,
    mercy_score: u32,
    flag_cap_score: u32,
    time_scaled: bool,
    gold_score: u32,
    silver_score: u32,
    gold_threshold: u32,
    silver_threshold: u32,
    defense_score: u32,
    max_time_bonus: u32,
    defer_checks: bool,
    log: ScoringLog,
}

impl ScoringEngine {
    /// Creates an engine with the rules in `config`.
    ///
    /// Gauntlet defers goal and mercy checks to the end of the score summary.
    #[must_use]
    pub fn new(config: &MatchConfig) -> Self {
        Self {
            goal_score: config.goal_score,
            mercy_score: config.mercy_score,
            flag_cap_score: config.flag_cap_score,
            time_scaled: config.variant == Variant::FlagRun,
            gold_score: config.gold_score,
            silver_score: config.silver_score,
            gold_threshold: config.gold_bonus_threshold,
            silver_threshold: config.silver_bonus_threshold,
            defense_score: config.defense_score,
            max_time_bonus: config.max_time_bonus,
            defer_checks: config.variant == Variant::Gauntlet,
            log: ScoringLog::default(),
        }
    }

    /// Returns true if goal and mercy checks wait for the score summary.
    #[must_use]
    pub const fn defers_checks(&self) -> bool {
        self.defer_checks
    }

    /// The scoring log.
    #[must_use]
    pub const fn log(&self) -> &ScoringLog {
        &self.log
    }

    /// Points a capture with `remaining` whole seconds left is worth.
    ///
    /// Flat `flag_cap_score` unless captures are time-scaled, in which case
    /// gold and silver thresholds pay more and anything later pays
    /// `flag_cap_score`.
    #[must_use]
    pub const fn capture_value(&self, remaining: u32) -> u32 {
        if !self.time_scaled {
            self.flag_cap_score
        } else if remaining >= self.gold_threshold {
            self.gold_score
        } else if remaining >= self.silver_threshold {
            self.silver_score
        } else {
            self.flag_cap_score
        }
    }

    /// The most a single attacking round can be worth.
    #[must_use]
    pub fn max_capture_value(&self) -> u32 {
        if self.time_scaled {
            self.gold_score.max(self.silver_score).max(self.flag_cap_score)
        } else {
            self.flag_cap_score
        }
    }

    /// Points a defense earns by holding out.
    #[must_use]
    pub const fn defense_score(&self) -> u32 {
        self.defense_score
    }

    /// Tiebreak seconds banked by an attacking win with `remaining` left.
    #[must_use]
    pub fn time_bonus(&self, remaining: u32) -> u32 {
        remaining.min(self.max_time_bonus)
    }

    /// Scores a round won without a capture and returns the points awarded.
    pub fn on_round_won(
        &self,
        teams: &mut [TeamRecord],
        team: TeamId,
        win: RoundWin,
        remaining: u32,
    ) -> u32 {
        let points = match win {
            RoundWin::HeldOut => self.defense_score,
            RoundWin::Eliminated => self.capture_value(remaining),
        };
        match teams.get_mut(team.index()) {
            Some(record) => {
                let total = record.add_score(points);
                debug!(%team, ?win, points, total, "round win scored");
            }
            None => debug!(%team, "round win for unknown team ignored"),
        }
        points
    }

    /// Scores a capture and decides whether the match is over.
    pub fn on_objective_delivered(
        &mut self,
        teams: &mut [TeamRecord],
        capture: Capture,
    ) -> ScoreDecision {
        let Some(record) = teams.get_mut(capture.team.index()) else {
            debug!(team = %capture.team, "capture for unknown team ignored");
            return ScoreDecision::Continue;
        };
        let points = self.capture_value(capture.remaining_time);
        let total = record.add_score(points);
        debug!(team = %capture.team, points, total, "capture scored");

        self.log.append(ScoringPlay {
            team: capture.team,
            scorer: capture.scorer,
            assists: capture.assists,
            points,
            remaining_time: capture.remaining_time,
            period: capture.period,
            team_scores: teams.iter().map(TeamRecord::score).collect(),
        });

        if self.defer_checks {
            return ScoreDecision::Continue;
        }
        self.evaluate(capture.team, teams)
    }

    /// Goal-score check, then mercy check, for `team`.
    #[must_use]
    pub fn evaluate(&self, team: TeamId, teams: &[TeamRecord]) -> ScoreDecision {
        let Some(record) = teams.get(team.index()) else {
            return ScoreDecision::Continue;
        };
        if self.goal_score > 0 && record.score() >= self.goal_score {
            return ScoreDecision::EndMatch {
                winner: team,
                reason: EndReason::GoalScore,
            };
        }
        if self.mercy_score > 0 {
            let weakest = teams
                .iter()
                .filter(|r| r.team() != team)
                .map(TeamRecord::score)
                .min();
            if let Some(weakest) = weakest {
                if record.score().saturating_sub(weakest) >= self.mercy_score {
                    return ScoreDecision::EndMatch {
                        winner: team,
                        reason: EndReason::MercyRule,
                    };
                }
            }
        }
        ScoreDecision::Continue
    }
}

// =============================================================================
// Standings
// =============================================================================

/// What decides who is ahead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Standing {
    /// Team score.
    Score,
    /// Rounds won, then captures.
    RoundWins,
    /// Points, then banked time bonus.
    PointsThenBonus,
}

impl Standing {
    /// The standing that decides `variant`.
    #[must_use]
    pub const fn for_variant(variant: Variant) -> Self {
        match variant {
            Variant::RoundCtf => Self::RoundWins,
            Variant::FlagRun => Self::PointsThenBonus,
            Variant::Ctf | Variant::Gauntlet => Self::Score,
        }
    }

    /// Sort key of this standing for `record`; higher is better.
    #[must_use]
    pub const fn of(self, record: &TeamRecord) -> u64 {
        match self {
            Self::Score => record.score() as u64,
            Self::RoundWins => ((record.round_wins() as u64) << 32) | record.score() as u64,
            Self::PointsThenBonus => ((record.score() as u64) << 32) | record.time_bonus() as u64,
        }
    }
}

/// The single team strictly ahead, or `None` if the top is shared.
#[must_use]
pub fn leading_team(teams: &[TeamRecord], standing: Standing) -> Option<TeamId> {
    let best = teams.iter().map(|r| standing.of(r)).max()?;
    let mut leaders = teams.iter().filter(|r| standing.of(r) == best);
    let leader = leaders.next()?;
    if leaders.next().is_some() {
        None
    } else {
        Some(leader.team())
    }
}

/// The team no rival can catch in the rounds still to be played, if any.
///
/// `upcoming` lists the attacking team of each remaining round. A rival
/// gains at most `attack_max` in a round it attacks and `defense` in a round
/// it defends; the leader must be strictly ahead of every rival's ceiling.
#[must_use]
pub fn clinched_team(
    teams: &[TeamRecord],
    upcoming: &[TeamId],
    attack_max: u32,
    defense: u32,
) -> Option<TeamId> {
    if teams.len() < 2 {
        return None;
    }
    let ceiling = |rival: &TeamRecord| -> u64 {
        let gain: u64 = upcoming
            .iter()
            .map(|attacker| {
                if *attacker == rival.team() {
                    u64::from(attack_max)
                } else {
                    u64::from(defense)
                }
            })
            .sum();
        u64::from(rival.score()) + gain
    };
    teams
        .iter()
        .find(|leader| {
            teams
                .iter()
                .filter(|rival| rival.team() != leader.team())
                .all(|rival| u64::from(leader.score()) > ceiling(rival))
        })
        .map(TeamRecord::team)
}

/// Returns true if two or more teams share the top.
#[must_use]
pub fn is_tied(teams: &[TeamRecord], standing: Standing) -> bool {
    teams.len() >= 2 && leading_team(teams, standing).is_none()
}

// =============================================================================
// Advantage
// =============================================================================

/// Which team, if any, deserves advantage right now.
///
/// Only defined for two teams. The advantage team is the one carrying the
/// opponent's objective while its own objective is not held. Both idle or
/// both held means no advantage.
#[must_use]
pub fn determine_advantage(board: &ObjectiveBoard, num_teams: u8) -> Option<TeamId> {
    if num_teams != 2 {
        return None;
    }
    let red_held = board.status_of_team(TeamId::RED) == Some(ObjectiveStatus::Held);
    let blue_held = board.status_of_team(TeamId::BLUE) == Some(ObjectiveStatus::Held);
    match (red_held, blue_held) {
        (true, false) => Some(TeamId::BLUE),
        (false, true) => Some(TeamId::RED),
        _ => None,
    }
}

/// Result of a periodic advantage check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvantageCheck {
    /// Advantage stays.
    Hold,
    /// Advantage is gone.
    Revoked,
}

/// Advantage bookkeeping. Only meaningful during live play.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvantageState {
    is_active: bool,
    team: Option<TeamId>,
    grace_counter: u32,
}

impl AdvantageState {
    /// Returns true while a window is running.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.is_active
    }

    /// The team holding advantage.
    #[must_use]
    pub const fn team(&self) -> Option<TeamId> {
        self.team
    }

    /// Consecutive checks the advantage team's own objective has been held.
    #[must_use]
    pub const fn grace_counter(&self) -> u32 {
        self.grace_counter
    }

    /// Starts a window for `team`.
    pub fn activate(&mut self, team: TeamId) {
        self.is_active = true;
        self.team = Some(team);
        self.grace_counter = 0;
    }

    /// Ends any window.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Runs one check against the board.
    ///
    /// Revoked when the carried objective is back home, or when the
    /// advantage team's own objective has been held for `grace_limit`
    /// consecutive checks.
    pub fn check(&mut self, board: &ObjectiveBoard, grace_limit: u32) -> AdvantageCheck {
        let Some(team) = self.team.filter(|_| self.is_active) else {
            return AdvantageCheck::Revoked;
        };
        let opponent = if team == TeamId::RED {
            TeamId::BLUE
        } else {
            TeamId::RED
        };
        if board.status_of_team(opponent) != Some(ObjectiveStatus::Held)
            && board.status_of_team(opponent) != Some(ObjectiveStatus::Dropped)
        {
            return AdvantageCheck::Revoked;
        }
        if board.status_of_team(team) == Some(ObjectiveStatus::Held) {
            self.grace_counter += 1;
            if self.grace_counter >= grace_limit {
                return AdvantageCheck::Revoked;
            }
        } else {
            self.grace_counter = 0;
        }
        AdvantageCheck::Hold
    }
}

// =============================================================================
// Elimination
// =============================================================================

/// Returns true if `team` has any active, non-spectator member with lives left.
#[must_use]
pub fn is_team_still_alive(team: TeamId, players: &dyn PlayerDirectory) -> bool {
    let out = PlayerFlags::SPECTATOR | PlayerFlags::OUT_OF_LIVES | PlayerFlags::INACTIVE;
    players
        .members(team)
        .into_iter()
        .any(|p| !players.flags(p).intersects(out) && players.lives(p) > 0)
}

/// Teams still alive, in team order.
#[must_use]
pub fn surviving_teams(num_teams: u8, players: &dyn PlayerDirectory) -> Vec<TeamId> {
    (0..num_teams)
        .map(TeamId::new)
        .filter(|team| is_team_still_alive(*team, players))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::Roster;
    use glam::Vec2;

    fn teams(scores: &[u32]) -> Vec<TeamRecord> {
        scores
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let mut record = TeamRecord::new(TeamId::new(u8::try_from(i).unwrap()));
                record.add_score(*s);
                record
            })
            .collect()
    }

    fn capture(team: TeamId) -> Capture {
        Capture {
            team,
            scorer: PlayerId::new(1),
            assists: vec![PlayerId::new(2)],
            remaining_time: 120,
            period: Period::SecondHalf,
        }
    }

    mod capture_tests {
        use super::*;

        #[test]
        fn capture_appends_play_with_scores() {
            let mut engine = ScoringEngine::new(&MatchConfig::ctf());
            let mut records = teams(&[0, 2]);
            let decision = engine.on_objective_delivered(&mut records, capture(TeamId::RED));
            assert_eq!(decision, ScoreDecision::Continue);

            let play = &engine.log().plays()[0];
            assert_eq!(play.team_scores, vec![1, 2]);
            assert_eq!(play.assists, vec![PlayerId::new(2)]);
            assert_eq!(play.period, Period::SecondHalf);
        }

        #[test]
        fn cap_score_multiplies() {
            let config = MatchConfig {
                flag_cap_score: 3,
                ..MatchConfig::ctf()
            };
            let mut engine = ScoringEngine::new(&config);
            let mut records = teams(&[0, 0]);
            engine.on_objective_delivered(&mut records, capture(TeamId::BLUE));
            assert_eq!(records[1].score(), 3);
        }

        #[test]
        fn goal_score_checked_before_mercy() {
            let config = MatchConfig {
                goal_score: 3,
                mercy_score: 1,
                ..MatchConfig::ctf()
            };
            let mut engine = ScoringEngine::new(&config);
            let mut records = teams(&[2, 0]);
            assert_eq!(
                engine.on_objective_delivered(&mut records, capture(TeamId::RED)),
                ScoreDecision::EndMatch {
                    winner: TeamId::RED,
                    reason: EndReason::GoalScore
                }
            );
        }

        #[test]
        fn mercy_uses_weakest_opponent() {
            let config = MatchConfig {
                mercy_score: 5,
                num_teams: 3,
                ..MatchConfig::ctf()
            };
            let engine = ScoringEngine::new(&config);
            assert_eq!(
                engine.evaluate(TeamId::RED, &teams(&[5, 4, 0])),
                ScoreDecision::EndMatch {
                    winner: TeamId::RED,
                    reason: EndReason::MercyRule
                }
            );
            assert_eq!(
                engine.evaluate(TeamId::RED, &teams(&[5, 4, 1])),
                ScoreDecision::Continue
            );
        }

        #[test]
        fn gauntlet_defers_checks() {
            let mut engine = ScoringEngine::new(&MatchConfig::gauntlet());
            let mut records = teams(&[2, 0]);
            assert_eq!(
                engine.on_objective_delivered(&mut records, capture(TeamId::RED)),
                ScoreDecision::Continue
            );
            assert!(matches!(
                engine.evaluate(TeamId::RED, &records),
                ScoreDecision::EndMatch { .. }
            ));
        }
    }

    mod flag_run_tests {
        use super::*;

        #[test]
        fn capture_value_follows_time_left() {
            let engine = ScoringEngine::new(&MatchConfig::flag_run());
            assert_eq!(engine.capture_value(300), 3);
            assert_eq!(engine.capture_value(120), 3);
            assert_eq!(engine.capture_value(119), 2);
            assert_eq!(engine.capture_value(60), 2);
            assert_eq!(engine.capture_value(59), 1);
            assert_eq!(engine.capture_value(0), 1);
            assert_eq!(engine.max_capture_value(), 3);

            let flat = ScoringEngine::new(&MatchConfig::ctf());
            assert_eq!(flat.capture_value(300), 1);
        }

        #[test]
        fn logged_capture_carries_its_points() {
            let mut engine = ScoringEngine::new(&MatchConfig::flag_run());
            let mut records = teams(&[0, 0]);
            engine.on_objective_delivered(&mut records, capture(TeamId::BLUE));
            assert_eq!(records[1].score(), 3);
            assert_eq!(engine.log().plays()[0].points, 3);
        }

        #[test]
        fn round_wins_without_capture() {
            let engine = ScoringEngine::new(&MatchConfig::flag_run());
            let mut records = teams(&[0, 0]);
            assert_eq!(
                engine.on_round_won(&mut records, TeamId::RED, RoundWin::HeldOut, 0),
                1
            );
            assert_eq!(
                engine.on_round_won(&mut records, TeamId::BLUE, RoundWin::Eliminated, 70),
                2
            );
            assert_eq!(records[0].score(), 1);
            assert_eq!(records[1].score(), 2);
            assert!(engine.log().is_empty());
        }

        #[test]
        fn time_bonus_is_capped() {
            let engine = ScoringEngine::new(&MatchConfig::flag_run());
            assert_eq!(engine.time_bonus(45), 45);
            assert_eq!(engine.time_bonus(250), 180);
        }

        #[test]
        fn bonus_breaks_ties_on_points() {
            let mut records = teams(&[4, 4]);
            records[0].add_time_bonus(30);
            records[1].add_time_bonus(95);
            assert_eq!(
                leading_team(&records, Standing::PointsThenBonus),
                Some(TeamId::BLUE)
            );
            records[0].add_time_bonus(65);
            assert_eq!(leading_team(&records, Standing::PointsThenBonus), None);
        }

        #[test]
        fn clinch_needs_a_lead_beyond_every_rival_ceiling() {
            // Two rounds left, one attack each: a rival can gain 3 + 1.
            let upcoming = [TeamId::RED, TeamId::BLUE];
            assert_eq!(clinched_team(&teams(&[5, 0]), &upcoming, 3, 1), Some(TeamId::RED));
            assert_eq!(clinched_team(&teams(&[4, 0]), &upcoming, 3, 1), None);

            // Last round, blue attacks: blue can gain 3, red only 1.
            let upcoming = [TeamId::BLUE];
            assert_eq!(clinched_team(&teams(&[4, 0]), &upcoming, 3, 1), Some(TeamId::RED));
            assert_eq!(clinched_team(&teams(&[3, 0]), &upcoming, 3, 1), None);
            assert_eq!(clinched_team(&teams(&[0, 2]), &upcoming, 3, 1), Some(TeamId::BLUE));
            assert_eq!(clinched_team(&teams(&[1, 2]), &upcoming, 3, 1), None);

            // Nothing left to play: any lead is decisive, a tie is not.
            assert_eq!(clinched_team(&teams(&[2, 1]), &[], 3, 1), Some(TeamId::RED));
            assert_eq!(clinched_team(&teams(&[2, 2]), &[], 3, 1), None);
        }
    }

    mod standing_tests {
        use super::*;

        #[test]
        fn leader_and_ties() {
            assert_eq!(leading_team(&teams(&[1, 3]), Standing::Score), Some(TeamId::BLUE));
            assert_eq!(leading_team(&teams(&[2, 2]), Standing::Score), None);
            assert!(is_tied(&teams(&[2, 2, 1]), Standing::Score));
            assert!(!is_tied(&teams(&[3, 2, 2]), Standing::Score));
        }

        #[test]
        fn round_wins_standing() {
            let mut records = teams(&[5, 0]);
            records[1].award_round();
            assert_eq!(
                leading_team(&records, Standing::RoundWins),
                Some(TeamId::BLUE)
            );
        }

        #[test]
        fn captures_break_round_win_ties() {
            let mut records = teams(&[2, 0]);
            records[0].award_round();
            records[1].award_round();
            assert_eq!(
                leading_team(&records, Standing::RoundWins),
                Some(TeamId::RED)
            );
            assert!(is_tied(&teams(&[1, 1]), Standing::RoundWins));
        }
    }

    mod advantage_tests {
        use super::*;
        use crate::objective::SiteId;

        fn board() -> (ObjectiveBoard, SiteId, SiteId) {
            let mut board = ObjectiveBoard::new();
            let red = board.add_base(TeamId::RED, Vec2::new(-10.0, 0.0));
            let blue = board.add_base(TeamId::BLUE, Vec2::new(10.0, 0.0));
            (board, red, blue)
        }

        #[test]
        fn no_holds_means_no_advantage() {
            let (board, _, _) = board();
            assert_eq!(determine_advantage(&board, 2), None);
        }

        #[test]
        fn carrier_team_gets_advantage() {
            let (mut board, red, _) = board();
            board.objective_mut(red).unwrap().take(PlayerId::new(2));
            assert_eq!(determine_advantage(&board, 2), Some(TeamId::BLUE));
            assert_eq!(determine_advantage(&board, 3), None);
        }

        #[test]
        fn both_held_cancels_out() {
            let (mut board, red, blue) = board();
            board.objective_mut(red).unwrap().take(PlayerId::new(2));
            board.objective_mut(blue).unwrap().take(PlayerId::new(1));
            assert_eq!(determine_advantage(&board, 2), None);
        }

        #[test]
        fn revoked_when_carried_objective_returns() {
            let (mut board, red, _) = board();
            board.objective_mut(red).unwrap().take(PlayerId::new(2));
            let mut advantage = AdvantageState::default();
            advantage.activate(TeamId::BLUE);
            assert_eq!(advantage.check(&board, 5), AdvantageCheck::Hold);

            board.objective_mut(red).unwrap().send_home();
            assert_eq!(advantage.check(&board, 5), AdvantageCheck::Revoked);
        }

        #[test]
        fn dropped_carried_objective_keeps_advantage() {
            let (mut board, red, _) = board();
            let flag = board.objective_mut(red).unwrap();
            flag.take(PlayerId::new(2));
            flag.drop_in_field();
            let mut advantage = AdvantageState::default();
            advantage.activate(TeamId::BLUE);
            assert_eq!(advantage.check(&board, 5), AdvantageCheck::Hold);
        }

        #[test]
        fn contested_hold_runs_out_of_grace() {
            let (mut board, red, blue) = board();
            board.objective_mut(red).unwrap().take(PlayerId::new(2));
            let mut advantage = AdvantageState::default();
            advantage.activate(TeamId::BLUE);

            board.objective_mut(blue).unwrap().take(PlayerId::new(1));
            for expected in 1..5 {
                assert_eq!(advantage.check(&board, 5), AdvantageCheck::Hold);
                assert_eq!(advantage.grace_counter(), expected);
            }
            assert_eq!(advantage.check(&board, 5), AdvantageCheck::Revoked);
        }

        #[test]
        fn grace_resets_when_hold_ends() {
            let (mut board, red, blue) = board();
            board.objective_mut(red).unwrap().take(PlayerId::new(2));
            let mut advantage = AdvantageState::default();
            advantage.activate(TeamId::BLUE);

            board.objective_mut(blue).unwrap().take(PlayerId::new(1));
            advantage.check(&board, 5);
            advantage.check(&board, 5);
            board.objective_mut(blue).unwrap().send_home();
            advantage.check(&board, 5);
            assert_eq!(advantage.grace_counter(), 0);
        }

        #[test]
        fn inactive_state_always_revokes() {
            let (board, _, _) = board();
            let mut advantage = AdvantageState::default();
            assert_eq!(advantage.check(&board, 5), AdvantageCheck::Revoked);
            advantage.activate(TeamId::RED);
            advantage.clear();
            assert!(!advantage.is_active());
            assert_eq!(advantage.team(), None);
        }
    }

    mod elimination_tests {
        use super::*;

        #[test]
        fn team_is_out_when_no_member_has_lives() {
            let mut roster = Roster::new();
            roster.add_player(PlayerId::new(1), TeamId::RED, Vec2::ZERO);
            roster.add_bot(PlayerId::new(2), TeamId::RED, Vec2::ZERO);
            roster.add_player(PlayerId::new(3), TeamId::BLUE, Vec2::ZERO);
            roster.set_lives(PlayerId::new(1), 1);
            roster.set_lives(PlayerId::new(3), 2);
            assert!(is_team_still_alive(TeamId::RED, &roster));

            roster.set_lives(PlayerId::new(1), 0);
            assert!(!is_team_still_alive(TeamId::RED, &roster));
            assert_eq!(surviving_teams(2, &roster), vec![TeamId::BLUE]);
        }

        #[test]
        fn out_of_lives_flag_counts_as_out() {
            let mut roster = Roster::new();
            roster.add_player(PlayerId::new(1), TeamId::RED, Vec2::ZERO);
            roster.set_lives(PlayerId::new(1), 3);
            roster.set_flag(PlayerId::new(1), PlayerFlags::OUT_OF_LIVES, true);
            assert!(!is_team_still_alive(TeamId::RED, &roster));
        }

        #[test]
        fn empty_team_is_not_alive() {
            let roster = Roster::new();
            assert!(!is_team_still_alive(TeamId::BLUE, &roster));
        }
    }
}

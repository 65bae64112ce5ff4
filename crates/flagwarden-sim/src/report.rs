//! Results of a scenario run.

use std::fmt;

use flagwarden_core::{
    Announcement, MatchEvent, MatchOutcome, MatchPhase, MatchSnapshot, ScoringPlay, Variant,
};
use serde::Serialize;

/// A scripted event the engine refused.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedEvent {
    /// Scheduled time.
    pub at: f64,
    /// The event.
    pub event: MatchEvent,
    /// Why it was refused.
    pub reason: String,
}

/// Everything observed during one scenario run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchReport {
    /// Scenario name.
    pub scenario: String,
    /// Variant played.
    pub variant: Variant,
    /// Simulated seconds.
    pub elapsed: f64,
    /// Ticks run.
    pub ticks: u64,
    /// State when the run stopped.
    pub final_snapshot: MatchSnapshot,
    /// Result, if the match finished.
    pub outcome: Option<MatchOutcome>,
    /// Phases in the order they were published.
    pub phase_history: Vec<MatchPhase>,
    /// Every capture.
    pub scoring_plays: Vec<ScoringPlay>,
    /// Every announcement cue.
    pub announcements: Vec<Announcement>,
    /// Scripted events that were refused.
    pub rejected: Vec<RejectedEvent>,
    /// Scripted events never submitted because the run stopped first.
    pub unplayed: usize,
}

impl fmt::Display for MatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({})", self.scenario, self.variant)?;
        match self.outcome {
            Some(outcome) => writeln!(f, "  result:  {} ({})", outcome.winner, outcome.reason)?,
            None => writeln!(f, "  result:  unfinished in {}", self.final_snapshot.phase)?,
        }
        let scores: Vec<String> = self
            .final_snapshot
            .team_scores
            .iter()
            .map(u32::to_string)
            .collect();
        writeln!(f, "  score:   {}", scores.join(" - "))?;
        if self.final_snapshot.total_rounds > 0 || self.final_snapshot.round_number > 0 {
            writeln!(
                f,
                "  rounds:  {}/{}",
                self.final_snapshot.round_number, self.final_snapshot.total_rounds
            )?;
        }
        writeln!(f, "  elapsed: {:.1}s ({} ticks)", self.elapsed, self.ticks)?;

        if !self.scoring_plays.is_empty() {
            writeln!(f, "  captures:")?;
            for play in &self.scoring_plays {
                write!(
                    f,
                    "    {} {} by {} with {}s left",
                    play.period, play.team, play.scorer, play.remaining_time
                )?;
                if !play.assists.is_empty() {
                    let assists: Vec<String> =
                        play.assists.iter().map(ToString::to_string).collect();
                    write!(f, " (assists: {})", assists.join(", "))?;
                }
                writeln!(f)?;
            }
        }
        if !self.rejected.is_empty() {
            writeln!(f, "  refused:")?;
            for rejected in &self.rejected {
                writeln!(f, "    t={:.1} {:?}: {}", rejected.at, rejected.event, rejected.reason)?;
            }
        }
        if self.unplayed > 0 {
            writeln!(f, "  {} event(s) not played", self.unplayed)?;
        }
        Ok(())
    }
}

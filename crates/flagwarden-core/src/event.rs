//! Inbound events and the match context.

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::objective::SiteId;
use crate::player::{PlayerDirectory, PlayerId};
use crate::presentation::PresentationSink;
use crate::team::TeamId;

/// Gameplay and operator events delivered to the state machine.
///
/// Every event enters through [`MatchStateMachine::submit`](crate::MatchStateMachine::submit).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchEvent {
    /// A player picked up (or, for a friendly touch, returned) an objective.
    ObjectiveTaken {
        /// Site owning the objective.
        site: SiteId,
        /// The player touching it.
        player: PlayerId,
    },
    /// The carrier lost the objective in the field.
    ObjectiveDropped {
        /// Site owning the objective.
        site: SiteId,
    },
    /// The carrier reached a scoring base.
    ObjectiveDelivered {
        /// Site owning the objective.
        site: SiteId,
        /// The carrier.
        player: PlayerId,
        /// Players credited with an assist.
        #[serde(default)]
        assists: Vec<PlayerId>,
    },
    /// The objective was sent home.
    ObjectiveReturned {
        /// Site owning the objective.
        site: SiteId,
    },
    /// A player died.
    PlayerEliminated {
        /// Who died.
        victim: PlayerId,
        /// Who killed them, if anyone.
        #[serde(default)]
        killer: Option<PlayerId>,
    },
    /// The external clock reached zero.
    ClockExpired,
    /// An operator ended the match.
    AdminForceEndMatch {
        /// Declared winner, if any.
        #[serde(default)]
        winner: Option<TeamId>,
    },
}

/// Collaborators passed to every state machine operation.
///
/// # Example
///
/// ```
/// use flagwarden_core::{GameClock, MatchContext, RecordingSink, Roster};
///
/// let mut clock = GameClock::new();
/// let mut roster = Roster::new();
/// let mut sink = RecordingSink::new();
/// let ctx = MatchContext::new(&mut clock, &mut roster, &mut sink);
/// assert!(ctx.clock.is_paused());
/// ```
pub struct MatchContext<'a> {
    /// The match clock.
    pub clock: &'a mut dyn Clock,
    /// Team membership, lives and positions.
    pub players: &'a mut dyn PlayerDirectory,
    /// Where snapshots and cues go.
    pub sink: &'a mut dyn PresentationSink,
}

impl<'a> MatchContext<'a> {
    /// Bundles the collaborators.
    pub fn new(
        clock: &'a mut dyn Clock,
        players: &'a mut dyn PlayerDirectory,
        sink: &'a mut dyn PresentationSink,
    ) -> Self {
        Self {
            clock,
            players,
            sink,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_use_tagged_json() {
        let event: MatchEvent =
            serde_json::from_str(r#"{ "type": "objective_delivered", "site": 1, "player": 4 }"#)
                .unwrap();
        assert_eq!(
            event,
            MatchEvent::ObjectiveDelivered {
                site: SiteId::new(1),
                player: PlayerId::new(4),
                assists: vec![],
            }
        );

        let event: MatchEvent = serde_json::from_str(r#"{ "type": "clock_expired" }"#).unwrap();
        assert_eq!(event, MatchEvent::ClockExpired);
    }
}

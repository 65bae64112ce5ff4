//! # Flagwarden Core
//!
//! Match lifecycle and scoring engine for team objective matches: capture
//! the flag, round-based capture the flag, Gauntlet and flag run.
//!
//! The engine is deterministic and single-threaded. A host advances it with
//! [`MatchStateMachine::tick`] and feeds gameplay through
//! [`MatchStateMachine::submit`]; everything the engine needs from the rest
//! of the game comes in through a [`MatchContext`].
//!
//! ## Layout
//!
//! - **Phases**: [`MatchPhase`] and its transition table
//! - **Objectives**: [`ObjectiveBoard`] of bases, dispensers and flags
//! - **Scoring**: [`ScoringEngine`], advantage and elimination rules
//! - **Rounds**: [`RoundLifecycleController`] and the per-variant
//!   [`RoundStrategy`]
//! - **State machine**: [`MatchStateMachine`], the only component that
//!   changes the phase
//!
//! ## Usage
//!
//! ```
//! use flagwarden_core::{
//!     GameClock, MatchConfig, MatchContext, MatchEvent, MatchPhase, MatchStateMachine,
//!     ObjectiveBoard, PlayerId, RecordingSink, Roster, TeamId,
//! };
//! use glam::Vec2;
//!
//! let mut board = ObjectiveBoard::new();
//! let red_base = board.add_base(TeamId::RED, Vec2::new(-40.0, 0.0));
//! board.add_base(TeamId::BLUE, Vec2::new(40.0, 0.0));
//!
//! let mut roster = Roster::new();
//! roster.add_player(PlayerId::new(1), TeamId::BLUE, Vec2::ZERO);
//!
//! let config = MatchConfig { goal_score: 1, ..MatchConfig::ctf() };
//! let mut machine = MatchStateMachine::new(config, board);
//! let (mut clock, mut sink) = (GameClock::new(), RecordingSink::new());
//! let mut ctx = MatchContext::new(&mut clock, &mut roster, &mut sink);
//!
//! machine.begin_match(&mut ctx).unwrap();
//! machine.tick(&mut ctx, 5.0);
//! assert_eq!(machine.phase(), MatchPhase::InProgress);
//!
//! let blue = PlayerId::new(1);
//! machine.submit(&mut ctx, MatchEvent::ObjectiveTaken { site: red_base, player: blue }).unwrap();
//! machine
//!     .submit(&mut ctx, MatchEvent::ObjectiveDelivered { site: red_base, player: blue, assists: vec![] })
//!     .unwrap();
//! assert_eq!(machine.phase(), MatchPhase::WaitingPostMatch);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod machine;
pub mod objective;
pub mod phase;
pub mod player;
pub mod presentation;
pub mod round;
pub mod scoring;
pub mod team;

pub use clock::{Clock, GameClock};
pub use config::{MatchConfig, Variant};
pub use error::{ConfigError, EventError, TransitionError};
pub use event::{MatchContext, MatchEvent};
pub use machine::MatchStateMachine;
pub use objective::{ObjectiveBoard, ObjectiveState, ObjectiveStatus, PickupRule, SiteId};
pub use phase::{MatchPhase, PhaseEpoch};
pub use player::{PlayerDirectory, PlayerFlags, PlayerId, Roster};
pub use presentation::{Announcement, Cue, MatchSnapshot, PresentationSink, RecordingSink};
pub use round::{RoundLifecycleController, RoundRecord, RoundStrategy};
pub use scoring::{AdvantageState, Period, ScoringEngine, ScoringLog, ScoringPlay};
pub use team::{EndReason, MatchOutcome, TeamId, TeamRecord, Winner};

#[cfg(test)]
mod tests;

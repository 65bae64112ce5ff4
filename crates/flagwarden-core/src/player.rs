//! Players and the player directory collaborator.
//!
//! The engine never owns player state. It reads team membership, status
//! flags, lives and positions through [`PlayerDirectory`], and writes back
//! only lives and status flags. [`Roster`] is the in-memory implementation
//! used by the simulator and the tests.

use std::collections::BTreeMap;
use std::fmt;

use bitflags::bitflags;
use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::team::TeamId;

/// Unique identifier for a player.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(u32);

impl PlayerId {
    /// Creates a player id from a raw value.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PlayerId({})", self.0)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

impl From<u32> for PlayerId {
    fn from(id: u32) -> Self {
        Self::new(id)
    }
}

bitflags! {
    /// Per-player status bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct PlayerFlags: u8 {
        /// Controlled by AI.
        const BOT = 1 << 0;
        /// Watching only; never counts toward team survival.
        const SPECTATOR = 1 << 1;
        /// Movement and input frozen (round end, halftime).
        const FROZEN = 1 << 2;
        /// No lives left this round.
        const OUT_OF_LIVES = 1 << 3;
        /// Disconnected or idle.
        const INACTIVE = 1 << 4;
    }
}

impl Default for PlayerFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// Directory of match participants.
///
/// Implementations must enumerate players in ascending [`PlayerId`] order so
/// that every decision taken over the roster is deterministic.
pub trait PlayerDirectory {
    /// All known players, sorted by id.
    fn player_ids(&self) -> Vec<PlayerId>;

    /// Team of `player`, or `None` for unknown players and unassigned spectators.
    fn team_of(&self, player: PlayerId) -> Option<TeamId>;

    /// Status flags of `player` (empty for unknown players).
    fn flags(&self, player: PlayerId) -> PlayerFlags;

    /// Overwrites the status flags of `player`.
    fn set_flags(&mut self, player: PlayerId, flags: PlayerFlags);

    /// Lives remaining this round.
    fn lives(&self, player: PlayerId) -> u32;

    /// Overwrites the lives remaining this round.
    fn set_lives(&mut self, player: PlayerId, lives: u32);

    /// Current position, if the player has a body in the world.
    fn position(&self, player: PlayerId) -> Option<Vec2>;

    /// Whether the straight line between two points is unobstructed.
    fn has_line_of_sight(&self, from: Vec2, to: Vec2) -> bool;

    /// Returns true if `player` is known.
    fn contains(&self, player: PlayerId) -> bool {
        self.player_ids().contains(&player)
    }

    /// Members of `team`, sorted by id.
    fn members(&self, team: TeamId) -> Vec<PlayerId> {
        self.player_ids()
            .into_iter()
            .filter(|p| self.team_of(*p) == Some(team))
            .collect()
    }

    /// Sets or clears a single flag.
    fn set_flag(&mut self, player: PlayerId, flag: PlayerFlags, on: bool) {
        let mut flags = self.flags(player);
        flags.set(flag, on);
        self.set_flags(player, flags);
    }
}

// =============================================================================
// Roster
// =============================================================================

/// One roster entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerInfo {
    /// Team membership.
    pub team: Option<TeamId>,
    /// Status bits.
    #[serde(default)]
    pub flags: PlayerFlags,
    /// Lives remaining this round.
    #[serde(default)]
    pub lives: u32,
    /// World position.
    #[serde(default)]
    pub position: Vec2,
}

/// A circular obstruction used for line-of-sight checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Occluder {
    /// Center of the obstruction.
    pub center: Vec2,
    /// Radius of the obstruction.
    pub radius: f32,
}

impl Occluder {
    /// Returns true if the segment `from..to` passes through this occluder.
    #[must_use]
    pub fn blocks(&self, from: Vec2, to: Vec2) -> bool {
        let segment = to - from;
        let length_sq = segment.length_squared();
        let t = if length_sq <= f32::EPSILON {
            0.0
        } else {
            ((self.center - from).dot(segment) / length_sq).clamp(0.0, 1.0)
        };
        let closest = from + segment * t;
        closest.distance_squared(self.center) < self.radius * self.radius
    }
}

/// In-memory [`PlayerDirectory`].
///
/// # Example
///
/// ```
/// use flagwarden_core::player::{PlayerDirectory, PlayerId, Roster};
/// use flagwarden_core::team::TeamId;
/// use glam::Vec2;
///
/// let mut roster = Roster::new();
/// roster.add_player(PlayerId::new(1), TeamId::RED, Vec2::ZERO);
/// roster.add_bot(PlayerId::new(2), TeamId::BLUE, Vec2::new(10.0, 0.0));
///
/// assert_eq!(roster.members(TeamId::BLUE), vec![PlayerId::new(2)]);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Roster {
    players: BTreeMap<PlayerId, PlayerInfo>,
    #[serde(default)]
    occluders: Vec<Occluder>,
}

impl Roster {
    /// Creates an empty roster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a player.
    pub fn insert(&mut self, id: PlayerId, info: PlayerInfo) {
        self.players.insert(id, info);
    }

    /// Adds a human player.
    pub fn add_player(&mut self, id: PlayerId, team: TeamId, position: Vec2) {
        self.insert(
            id,
            PlayerInfo {
                team: Some(team),
                flags: PlayerFlags::empty(),
                lives: 0,
                position,
            },
        );
    }

    /// Adds a bot.
    pub fn add_bot(&mut self, id: PlayerId, team: TeamId, position: Vec2) {
        self.insert(
            id,
            PlayerInfo {
                team: Some(team),
                flags: PlayerFlags::BOT,
                lives: 0,
                position,
            },
        );
    }

    /// Adds a spectator.
    pub fn add_spectator(&mut self, id: PlayerId) {
        self.insert(
            id,
            PlayerInfo {
                team: None,
                flags: PlayerFlags::SPECTATOR,
                lives: 0,
                position: Vec2::ZERO,
            },
        );
    }

    /// Adds an obstruction for line-of-sight checks.
    pub fn add_occluder(&mut self, center: Vec2, radius: f32) {
        self.occluders.push(Occluder { center, radius });
    }

    /// Moves a player.
    pub fn set_position(&mut self, id: PlayerId, position: Vec2) {
        if let Some(info) = self.players.get_mut(&id) {
            info.position = position;
        }
    }

    /// Looks up a player.
    #[must_use]
    pub fn get(&self, id: PlayerId) -> Option<&PlayerInfo> {
        self.players.get(&id)
    }

    /// Number of players.
    #[must_use]
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Returns true if the roster is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

impl PlayerDirectory for Roster {
    fn player_ids(&self) -> Vec<PlayerId> {
        self.players.keys().copied().collect()
    }

    fn team_of(&self, player: PlayerId) -> Option<TeamId> {
        self.players.get(&player).and_then(|info| info.team)
    }

    fn flags(&self, player: PlayerId) -> PlayerFlags {
        self.players
            .get(&player)
            .map_or_else(PlayerFlags::empty, |info| info.flags)
    }

    fn set_flags(&mut self, player: PlayerId, flags: PlayerFlags) {
        if let Some(info) = self.players.get_mut(&player) {
            info.flags = flags;
        }
    }

    fn lives(&self, player: PlayerId) -> u32 {
        self.players.get(&player).map_or(0, |info| info.lives)
    }

    fn set_lives(&mut self, player: PlayerId, lives: u32) {
        if let Some(info) = self.players.get_mut(&player) {
            info.lives = lives;
        }
    }

    fn position(&self, player: PlayerId) -> Option<Vec2> {
        self.players.get(&player).map(|info| info.position)
    }

    fn has_line_of_sight(&self, from: Vec2, to: Vec2) -> bool {
        !self.occluders.iter().any(|o| o.blocks(from, to))
    }

    fn contains(&self, player: PlayerId) -> bool {
        self.players.contains_key(&player)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Roster {
        let mut roster = Roster::new();
        roster.add_player(PlayerId::new(3), TeamId::RED, Vec2::ZERO);
        roster.add_bot(PlayerId::new(1), TeamId::RED, Vec2::ONE);
        roster.add_player(PlayerId::new(2), TeamId::BLUE, Vec2::new(5.0, 0.0));
        roster.add_spectator(PlayerId::new(9));
        roster
    }

    #[test]
    fn ids_are_sorted() {
        let ids = roster().player_ids();
        assert_eq!(
            ids,
            vec![
                PlayerId::new(1),
                PlayerId::new(2),
                PlayerId::new(3),
                PlayerId::new(9)
            ]
        );
    }

    #[test]
    fn members_excludes_other_teams_and_spectators() {
        let roster = roster();
        assert_eq!(
            roster.members(TeamId::RED),
            vec![PlayerId::new(1), PlayerId::new(3)]
        );
        assert_eq!(roster.team_of(PlayerId::new(9)), None);
    }

    #[test]
    fn set_flag_toggles_single_bit() {
        let mut roster = roster();
        let bot = PlayerId::new(1);
        roster.set_flag(bot, PlayerFlags::FROZEN, true);
        assert_eq!(roster.flags(bot), PlayerFlags::BOT | PlayerFlags::FROZEN);
        roster.set_flag(bot, PlayerFlags::FROZEN, false);
        assert_eq!(roster.flags(bot), PlayerFlags::BOT);
    }

    #[test]
    fn unknown_players_are_inert() {
        let mut roster = roster();
        let ghost = PlayerId::new(77);
        roster.set_lives(ghost, 4);
        assert_eq!(roster.lives(ghost), 0);
        assert!(!roster.contains(ghost));
        assert_eq!(roster.position(ghost), None);
    }

    #[test]
    fn occluder_blocks_line_of_sight() {
        let mut roster = roster();
        let from = Vec2::new(-10.0, 0.0);
        let to = Vec2::new(10.0, 0.0);
        assert!(roster.has_line_of_sight(from, to));

        roster.add_occluder(Vec2::ZERO, 1.0);
        assert!(!roster.has_line_of_sight(from, to));
        assert!(roster.has_line_of_sight(Vec2::new(-10.0, 5.0), Vec2::new(10.0, 5.0)));
    }
}

//! Objectives and the sites that own them.
//!
//! An objective ("flag") is always owned by exactly one [`ObjectiveSite`]:
//!
//! - A [`SiteRole::PlainBase`] keeps a team's objective for the whole match,
//!   or none at all when the base only accepts deliveries.
//! - A [`SiteRole::Dispenser`] owns zero or one live objective and creates a
//!   fresh one every round.
//!
//! The role is fixed when the site is registered on the [`ObjectiveBoard`],
//! so nothing ever has to ask what kind of site it is looking at beyond a
//! `match`.

use std::collections::BTreeMap;
use std::fmt;

use cadence::TimerHandle;
use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::player::PlayerId;
use crate::team::TeamId;

/// Identifier of a site on the board.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SiteId(u32);

impl SiteId {
    /// Creates a site id from a raw value.
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

impl fmt::Debug for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SiteId({})", self.0)
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "site{}", self.0)
    }
}

// =============================================================================
// ObjectiveState
// =============================================================================

/// Where an objective is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectiveStatus {
    /// Resting at its site.
    Home,
    /// Carried by a player.
    Held,
    /// Lying where its carrier lost it.
    Dropped,
}

/// Who may pick an objective up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PickupRule {
    /// Only opponents of the owning team. Neutral objectives are open to all.
    EnemyOnly,
    /// Only members of the owning team. Neutral objectives are open to all.
    FriendlyOnly,
    /// Anyone.
    Anyone,
}

impl PickupRule {
    /// Returns true if a member of `taker` may carry an objective owned by
    /// `owner`.
    #[must_use]
    pub fn allows(self, owner: Option<TeamId>, taker: TeamId) -> bool {
        match (self, owner) {
            (Self::Anyone, _) | (_, None) => true,
            (Self::EnemyOnly, Some(owner)) => owner != taker,
            (Self::FriendlyOnly, Some(owner)) => owner == taker,
        }
    }
}

/// Lifecycle of one objective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectiveState {
    owner: Option<TeamId>,
    holder: Option<PlayerId>,
    status: ObjectiveStatus,
    #[serde(skip)]
    auto_return_timer: Option<TimerHandle>,
    pickup_enabled: bool,
}

impl ObjectiveState {
    /// A fresh objective resting at home.
    #[must_use]
    pub const fn new(owner: Option<TeamId>) -> Self {
        Self {
            owner,
            holder: None,
            status: ObjectiveStatus::Home,
            auto_return_timer: None,
            pickup_enabled: true,
        }
    }

    /// Owning team; `None` for neutral objectives.
    #[must_use]
    pub const fn owner(&self) -> Option<TeamId> {
        self.owner
    }

    /// Current carrier.
    #[must_use]
    pub const fn holder(&self) -> Option<PlayerId> {
        self.holder
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> ObjectiveStatus {
        self.status
    }

    /// Returns true while resting at home.
    #[must_use]
    pub fn is_home(&self) -> bool {
        self.status == ObjectiveStatus::Home
    }

    /// Returns true while carried.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.status == ObjectiveStatus::Held
    }

    /// Pending auto-return, if dropped.
    #[must_use]
    pub const fn auto_return_timer(&self) -> Option<TimerHandle> {
        self.auto_return_timer
    }

    /// Whether the objective may be picked up right now.
    #[must_use]
    pub const fn pickup_enabled(&self) -> bool {
        self.pickup_enabled
    }

    /// Allows or forbids pickups.
    pub fn set_pickup_enabled(&mut self, enabled: bool) {
        self.pickup_enabled = enabled;
    }

    /// Hands the objective to `player`.
    ///
    /// Returns the auto-return timer that must now be cancelled, if any.
    pub fn take(&mut self, player: PlayerId) -> Option<TimerHandle> {
        self.status = ObjectiveStatus::Held;
        self.holder = Some(player);
        self.auto_return_timer.take()
    }

    /// Drops the objective where its carrier stands.
    pub fn drop_in_field(&mut self) {
        self.status = ObjectiveStatus::Dropped;
        self.holder = None;
    }

    /// Records the pending auto-return.
    pub fn set_auto_return(&mut self, handle: TimerHandle) {
        self.auto_return_timer = Some(handle);
    }

    /// Sends the objective home.
    ///
    /// Returns the auto-return timer that must now be cancelled, if any.
    pub fn send_home(&mut self) -> Option<TimerHandle> {
        self.status = ObjectiveStatus::Home;
        self.holder = None;
        self.auto_return_timer.take()
    }
}

// =============================================================================
// Sites
// =============================================================================

/// What a site does with objectives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SiteRole {
    /// A team base. `None` means the base only accepts deliveries.
    PlainBase {
        /// The base's own objective.
        objective: Option<ObjectiveState>,
    },
    /// Creates a fresh objective every round.
    Dispenser {
        /// The objective currently in play.
        live: Option<ObjectiveState>,
    },
}

/// A base or dispenser placed in the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveSite {
    id: SiteId,
    team: Option<TeamId>,
    position: Vec2,
    role: SiteRole,
}

impl ObjectiveSite {
    /// Site id.
    #[must_use]
    pub const fn id(&self) -> SiteId {
        self.id
    }

    /// Owning team; `None` for neutral dispensers.
    #[must_use]
    pub const fn team(&self) -> Option<TeamId> {
        self.team
    }

    /// Spawn point of the site's objective.
    #[must_use]
    pub const fn position(&self) -> Vec2 {
        self.position
    }

    /// The site's role.
    #[must_use]
    pub const fn role(&self) -> &SiteRole {
        &self.role
    }

    /// Returns true for dispensers.
    #[must_use]
    pub const fn is_dispenser(&self) -> bool {
        matches!(self.role, SiteRole::Dispenser { .. })
    }

    /// The objective this site currently owns.
    #[must_use]
    pub const fn objective(&self) -> Option<&ObjectiveState> {
        match &self.role {
            SiteRole::PlainBase { objective } => objective.as_ref(),
            SiteRole::Dispenser { live } => live.as_ref(),
        }
    }

    fn objective_mut(&mut self) -> Option<&mut ObjectiveState> {
        match &mut self.role {
            SiteRole::PlainBase { objective } => objective.as_mut(),
            SiteRole::Dispenser { live } => live.as_mut(),
        }
    }
}

// =============================================================================
// ObjectiveBoard
// =============================================================================

/// Every site in the match, keyed by id.
///
/// # Example
///
/// ```
/// use flagwarden_core::objective::{ObjectiveBoard, ObjectiveStatus};
/// use flagwarden_core::team::TeamId;
/// use glam::Vec2;
///
/// let mut board = ObjectiveBoard::new();
/// let red = board.add_base(TeamId::RED, Vec2::new(-50.0, 0.0));
/// board.add_base(TeamId::BLUE, Vec2::new(50.0, 0.0));
///
/// assert_eq!(board.base_of(TeamId::RED), Some(red));
/// assert_eq!(board.status_of_team(TeamId::RED), Some(ObjectiveStatus::Home));
/// assert!(board.validate(2, false).is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveBoard {
    sites: BTreeMap<SiteId, ObjectiveSite>,
    next_id: u32,
}

impl ObjectiveBoard {
    /// Creates an empty board.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&mut self, team: Option<TeamId>, position: Vec2, role: SiteRole) -> SiteId {
        let id = SiteId::new(self.next_id);
        self.next_id += 1;
        self.sites.insert(
            id,
            ObjectiveSite {
                id,
                team,
                position,
                role,
            },
        );
        id
    }

    /// Registers a team base with its own objective.
    pub fn add_base(&mut self, team: TeamId, position: Vec2) -> SiteId {
        self.register(
            Some(team),
            position,
            SiteRole::PlainBase {
                objective: Some(ObjectiveState::new(Some(team))),
            },
        )
    }

    /// Registers a team base that only accepts deliveries.
    pub fn add_score_only_base(&mut self, team: TeamId, position: Vec2) -> SiteId {
        self.register(Some(team), position, SiteRole::PlainBase { objective: None })
    }

    /// Registers a dispenser. `team` is `None` for a neutral dispenser.
    pub fn add_dispenser(&mut self, team: Option<TeamId>, position: Vec2) -> SiteId {
        self.register(team, position, SiteRole::Dispenser { live: None })
    }

    /// Takes a site off the board, along with any objective it holds.
    pub fn remove_site(&mut self, id: SiteId) -> Option<ObjectiveSite> {
        let removed = self.sites.remove(&id);
        if removed.is_some() {
            debug!(site = %id, "site removed");
        }
        removed
    }

    /// Looks up a site.
    #[must_use]
    pub fn site(&self, id: SiteId) -> Option<&ObjectiveSite> {
        self.sites.get(&id)
    }

    /// All sites in id order.
    pub fn sites(&self) -> impl Iterator<Item = &ObjectiveSite> {
        self.sites.values()
    }

    /// The base of `team`.
    #[must_use]
    pub fn base_of(&self, team: TeamId) -> Option<SiteId> {
        self.sites
            .values()
            .find(|s| s.team == Some(team) && !s.is_dispenser())
            .map(ObjectiveSite::id)
    }

    /// The objective at `site`, if one is live there.
    #[must_use]
    pub fn objective(&self, site: SiteId) -> Option<&ObjectiveState> {
        self.sites.get(&site).and_then(ObjectiveSite::objective)
    }

    /// Mutable access to the objective at `site`.
    pub fn objective_mut(&mut self, site: SiteId) -> Option<&mut ObjectiveState> {
        self.sites.get_mut(&site).and_then(ObjectiveSite::objective_mut)
    }

    /// Status of the objective at `team`'s base.
    #[must_use]
    pub fn status_of_team(&self, team: TeamId) -> Option<ObjectiveStatus> {
        self.base_of(team)
            .and_then(|site| self.objective(site))
            .map(ObjectiveState::status)
    }

    /// Sites whose objective `player` carries.
    #[must_use]
    pub fn carried_by(&self, player: PlayerId) -> Vec<SiteId> {
        self.sites
            .values()
            .filter(|s| s.objective().is_some_and(|o| o.holder() == Some(player)))
            .map(ObjectiveSite::id)
            .collect()
    }

    /// Sites with a live objective, in id order.
    #[must_use]
    pub fn live_objectives(&self) -> Vec<SiteId> {
        self.sites
            .values()
            .filter(|s| s.objective().is_some())
            .map(ObjectiveSite::id)
            .collect()
    }

    /// Returns true if every live objective is home.
    #[must_use]
    pub fn all_home(&self) -> bool {
        self.sites
            .values()
            .filter_map(ObjectiveSite::objective)
            .all(ObjectiveState::is_home)
    }

    /// Sends every objective home and withdraws dispensed ones.
    ///
    /// Returns the auto-return timers that must be cancelled.
    pub fn reset_all(&mut self) -> Vec<TimerHandle> {
        let mut stale = Vec::new();
        for site in self.sites.values_mut() {
            match &mut site.role {
                SiteRole::PlainBase { objective } => {
                    if let Some(objective) = objective.as_mut() {
                        stale.extend(objective.send_home());
                    }
                }
                SiteRole::Dispenser { live } => {
                    if let Some(mut objective) = live.take() {
                        stale.extend(objective.send_home());
                    }
                }
            }
        }
        stale
    }

    /// Forbids or allows pickups on every live objective.
    pub fn set_all_pickup(&mut self, enabled: bool) {
        for objective in self.sites.values_mut().filter_map(ObjectiveSite::objective_mut) {
            objective.set_pickup_enabled(enabled);
        }
    }

    /// Makes every empty dispenser create a fresh objective.
    ///
    /// Returns the sites that dispensed.
    pub fn dispense_all(&mut self) -> Vec<SiteId> {
        let mut dispensed = Vec::new();
        for site in self.sites.values_mut() {
            let team = site.team;
            if let SiteRole::Dispenser { live } = &mut site.role {
                if live.is_none() {
                    *live = Some(ObjectiveState::new(team));
                    dispensed.push(site.id);
                }
            }
        }
        dispensed
    }

    /// Removes a delivered objective from play.
    ///
    /// Base objectives return home; dispensed objectives are consumed.
    /// Returns the auto-return timer that must be cancelled, if any.
    pub fn deliver(&mut self, site: SiteId) -> Option<TimerHandle> {
        let site = self.sites.get_mut(&site)?;
        match &mut site.role {
            SiteRole::PlainBase { objective } => objective.as_mut().and_then(ObjectiveState::send_home),
            SiteRole::Dispenser { live } => live.take().and_then(|mut o| o.send_home()),
        }
    }

    /// Rotates base positions among the teams, which for two teams swaps them.
    pub fn swap_sides(&mut self) {
        let mut bases: Vec<(TeamId, SiteId)> = self
            .sites
            .values()
            .filter(|s| !s.is_dispenser())
            .filter_map(|s| s.team.map(|team| (team, s.id)))
            .collect();
        bases.sort();
        if bases.len() < 2 {
            return;
        }
        let positions: Vec<Vec2> = bases
            .iter()
            .filter_map(|(_, id)| self.sites.get(id).map(ObjectiveSite::position))
            .collect();
        for (i, (_, id)) in bases.iter().enumerate() {
            let position = positions[(i + 1) % positions.len()];
            if let Some(site) = self.sites.get_mut(id) {
                site.position = position;
            }
        }
        debug!(bases = bases.len(), "base positions rotated");
    }

    /// Checks that every team has a base and, if required, that a dispenser
    /// exists.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingBase`] or [`ConfigError::MissingDispenser`].
    pub fn validate(&self, num_teams: u8, needs_dispenser: bool) -> Result<(), ConfigError> {
        for index in 0..num_teams {
            let team = TeamId::new(index);
            if self.base_of(team).is_none() {
                return Err(ConfigError::MissingBase { team });
            }
        }
        if needs_dispenser && !self.sites.values().any(ObjectiveSite::is_dispenser) {
            return Err(ConfigError::MissingDispenser);
        }
        Ok(())
    }
}

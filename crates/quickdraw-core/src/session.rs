//! Per-client session context.
//!
//! One [`Session`] exists per running client and per game. It replaces
//! ambient globals: role, identity, stage and the last roster seen are held
//! here and passed explicitly to the node. [`Session::reset`] produces the
//! fresh context for the next game.

/// Participant role, fixed once a room is created or joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Created the room; owns the roster and resolves rounds.
    Host,
    /// Joined a room.
    Player,
}

/// Coarse game stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Waiting for players.
    Lobby,
    /// Rounds are being played.
    Playing,
    /// A participant dropped or the host went away.
    Ended,
}

/// Session context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    role: Role,
    self_id: String,
    member_count: Option<usize>,
    stage: Stage,
    roster: Vec<String>,
}

impl Session {
    /// Session for the host of a room.
    pub fn host(self_id: impl Into<String>) -> Self {
        let self_id = self_id.into();
        Self {
            role: Role::Host,
            roster: vec![self_id.clone()],
            self_id,
            member_count: None,
            stage: Stage::Lobby,
        }
    }

    /// Session for a player joining a room.
    pub fn player(self_id: impl Into<String>) -> Self {
        Self {
            role: Role::Player,
            self_id: self_id.into(),
            member_count: None,
            stage: Stage::Lobby,
            roster: Vec::new(),
        }
    }

    /// Role in the room.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Identity chosen at join time.
    pub fn self_id(&self) -> &str {
        &self.self_id
    }

    /// Locked participant count, host included, once the game started. A
    /// player takes it from the last roster the host sent.
    pub fn member_count(&self) -> Option<usize> {
        self.member_count
    }

    /// Current stage.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Last roster seen, host first.
    pub fn roster(&self) -> &[String] {
        &self.roster
    }

    /// Whether this participant is the host.
    pub fn is_host(&self) -> bool {
        self.role == Role::Host
    }

    pub(crate) fn set_roster(&mut self, roster: Vec<String>) {
        self.roster = roster;
    }

    pub(crate) fn start(&mut self, member_count: Option<usize>) {
        self.stage = Stage::Playing;
        self.member_count = member_count;
    }

    pub(crate) fn end(&mut self) {
        self.stage = Stage::Ended;
    }

    /// Fresh context for a new game with the same role and identity.
    #[must_use]
    pub fn reset(&self) -> Self {
        match self.role {
            Role::Host => Self::host(self.self_id.clone()),
            Role::Player => Self::player(self.self_id.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_roster_starts_with_self() {
        let session = Session::host("ann");
        assert_eq!(session.roster(), ["ann".to_string()]);
        assert_eq!(session.stage(), Stage::Lobby);
        assert!(session.is_host());
    }

    #[test]
    fn reset_returns_to_lobby_keeping_identity() {
        let mut session = Session::player("bo");
        session.set_roster(vec!["ann".into(), "bo".into()]);
        session.start(None);
        session.end();

        let fresh = session.reset();
        assert_eq!(fresh, Session::player("bo"));
        assert_eq!(fresh.stage(), Stage::Lobby);
        assert!(fresh.roster().is_empty());
    }
}

//! Host-side roster.
//!
//! Maps each player identity to the channel it is reachable on. Insertion
//! order is the canonical player order shown to everyone, with the host
//! always first.
//!
//! # Reconnects
//!
//! At most one live channel exists per identity. When an identity connects
//! again, its old channel is detached (and must be closed by the caller) and
//! the new channel is parked until [`Membership::install`] is called one
//! scheduling tick later. The entry keeps its roster position throughout.
//! Because removal is keyed by channel, the stale channel's close
//! notification finds nothing to remove and cannot evict the new entry.

use std::fmt;

use tracing::{debug, info};

/// Opaque handle for one channel, assigned by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Outcome of admitting an inbound channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// A new identity joined and its channel is live.
    Joined {
        /// Identity as registered (possibly renamed).
        identity: String,
    },
    /// A known identity reconnected. Close `stale`, then install the new
    /// channel after a scheduling tick.
    Replacing {
        /// Identity as registered (possibly renamed).
        identity: String,
        /// The identity's previous channel.
        stale: ChannelId,
    },
}

impl Admission {
    /// Registered identity.
    pub fn identity(&self) -> &str {
        match self {
            Self::Joined { identity } | Self::Replacing { identity, .. } => identity,
        }
    }
}

#[derive(Debug, Clone)]
struct Member {
    identity: String,
    live: Option<ChannelId>,
    pending: Option<ChannelId>,
}

/// Ordered roster of connected players.
#[derive(Debug, Clone)]
pub struct Membership {
    host_id: String,
    members: Vec<Member>,
    listening: bool,
}

impl Membership {
    /// Empty roster for a host, accepting connections.
    pub fn new(host_id: impl Into<String>) -> Self {
        Self { host_id: host_id.into(), members: Vec::new(), listening: true }
    }

    /// Whether new connections are accepted.
    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// Stop accepting connections and return the locked participant count
    /// (host included).
    pub fn stop_listening(&mut self) -> usize {
        self.listening = false;
        let count = self.len();
        info!(members = count, "roster locked");
        count
    }

    /// Number of participants, host included.
    pub fn len(&self) -> usize {
        self.members.len() + 1
    }

    /// Always false: the host is a member.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Identity a claimed name is registered under.
    ///
    /// A player claiming the host's own name becomes `"<name> 2"`.
    pub fn resolve_identity(&self, claimed: &str) -> String {
        if claimed == self.host_id { format!("{claimed} 2") } else { claimed.to_string() }
    }

    /// Admit an inbound channel claiming `claimed`.
    ///
    /// Returns `None` when not listening; the caller should close the
    /// channel.
    pub fn admit(&mut self, claimed: &str, channel: ChannelId) -> Option<Admission> {
        if !self.listening {
            debug!(claimed, %channel, "connection refused: not listening");
            return None;
        }

        let identity = self.resolve_identity(claimed);
        if identity != claimed {
            debug!(claimed, %identity, "renamed to avoid clash with host");
        }

        if let Some(member) = self.members.iter_mut().find(|m| m.identity == identity) {
            let previous_pending = member.pending.replace(channel);
            if let Some(stale) = member.live.take().or(previous_pending) {
                info!(%identity, %stale, %channel, "identity reconnected");
                return Some(Admission::Replacing { identity, stale });
            }
            // Entry with neither channel cannot exist; treat as fresh.
            member.pending = None;
            member.live = Some(channel);
            return Some(Admission::Joined { identity });
        }

        info!(%identity, %channel, "player joined");
        self.members.push(Member { identity: identity.clone(), live: Some(channel), pending: None });
        Some(Admission::Joined { identity })
    }

    /// Promote a parked reconnect channel to live.
    ///
    /// Returns false if the channel was superseded or closed meanwhile.
    pub fn install(&mut self, identity: &str, channel: ChannelId) -> bool {
        let Some(member) = self
            .members
            .iter_mut()
            .find(|m| m.identity == identity && m.pending == Some(channel))
        else {
            debug!(identity, %channel, "install skipped: channel no longer pending");
            return false;
        };
        member.pending = None;
        member.live = Some(channel);
        debug!(identity, %channel, "reconnect installed");
        true
    }

    /// Handle a closed channel.
    ///
    /// Returns the identity removed from the roster, or `None` when the
    /// channel was stale or unknown. A closed parked channel only drops the
    /// parked reconnect.
    pub fn remove_channel(&mut self, channel: ChannelId) -> Option<String> {
        let index = self
            .members
            .iter()
            .position(|m| m.live == Some(channel) || m.pending == Some(channel))?;

        let member = &mut self.members[index];
        if member.live == Some(channel) {
            let removed = self.members.remove(index);
            info!(identity = %removed.identity, %channel, "player left");
            return Some(removed.identity);
        }

        member.pending = None;
        if member.live.is_none() {
            let removed = self.members.remove(index);
            info!(identity = %removed.identity, %channel, "player left before reconnect settled");
            return Some(removed.identity);
        }
        None
    }

    /// Identity reachable on `channel`, if live.
    pub fn identity_of(&self, channel: ChannelId) -> Option<&str> {
        self.members.iter().find(|m| m.live == Some(channel)).map(|m| m.identity.as_str())
    }

    /// Live channel for `identity`.
    pub fn channel_of(&self, identity: &str) -> Option<ChannelId> {
        self.members.iter().find(|m| m.identity == identity).and_then(|m| m.live)
    }

    /// Ordered identities, host first.
    pub fn roster(&self) -> Vec<String> {
        std::iter::once(self.host_id.clone())
            .chain(self.members.iter().map(|m| m.identity.clone()))
            .collect()
    }

    /// Live player channels with their identities, in roster order.
    pub fn live_channels(&self) -> impl Iterator<Item = (&str, ChannelId)> {
        self.members.iter().filter_map(|m| m.live.map(|c| (m.identity.as_str(), c)))
    }

    /// Every channel held, live or parked.
    pub fn all_channels(&self) -> Vec<ChannelId> {
        self.members.iter().flat_map(|m| m.live.into_iter().chain(m.pending)).collect()
    }
}

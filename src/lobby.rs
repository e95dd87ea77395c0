//! Clients waiting for a match, and the invitations between them.

use std::collections::{BTreeMap, HashMap};

use log::{debug, info};

use crate::connection::ConnectionHandle;
use crate::protocol::{ClientId, ServerMessage};

/// Which side of a pending invitation a client is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InviteRole {
    Sender,
    Receiver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingInvite {
    pub counterpart: ClientId,
    pub role: InviteRole,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InviteError {
    #[error("cannot invite yourself")]
    SelfInvite,
    #[error("client {0} already has a pending invitation")]
    AlreadyPending(ClientId),
    #[error("client {0} is not in the lobby")]
    NotInLobby(ClientId),
    #[error("no pending invitation from client {0}")]
    NoSuchInvite(ClientId),
}

/// Lobby-resident clients plus the invitation table.
///
/// A client is resident exactly when it is connected and not seated in a live
/// match. Every pending invitation is recorded on both sides, and a client
/// takes part in at most one.
#[derive(Default)]
pub struct LobbyRegistry {
    clients: BTreeMap<ClientId, ConnectionHandle>,
    pending: HashMap<ClientId, PendingInvite>,
}

impl LobbyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a client to the lobby. Returns `false` if it was already there.
    pub fn admit(&mut self, handle: ConnectionHandle) -> bool {
        let id = handle.id();
        if self.clients.contains_key(&id) {
            return false;
        }
        debug!("client {} entered the lobby", id);
        self.clients.insert(id, handle);
        true
    }

    /// Bring a player back from a finished or abandoned match.
    pub fn readmit(&mut self, handle: ConnectionHandle) -> bool {
        let id = handle.id();
        let admitted = self.admit(handle);
        if admitted {
            info!("client {} returned to the lobby", id);
        }
        admitted
    }

    /// Take a client out of the lobby, withdrawing any invitation it was part of.
    pub fn remove(&mut self, id: ClientId) -> Option<ConnectionHandle> {
        self.cancel_invite(id);
        self.clients.remove(&id)
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.clients.contains_key(&id)
    }

    /// Resident ids in ascending order.
    pub fn roster(&self) -> Vec<ClientId> {
        self.clients.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn pending(&self, id: ClientId) -> Option<PendingInvite> {
        self.pending.get(&id).copied()
    }

    pub fn pending_role(&self, id: ClientId) -> Option<InviteRole> {
        self.pending.get(&id).map(|p| p.role)
    }

    /// Whether a client sits in the lobby with no invitation outstanding.
    pub fn is_available(&self, id: ClientId) -> bool {
        self.contains(id) && !self.pending.contains_key(&id)
    }

    /// Send every resident the current roster.
    pub fn broadcast_roster(&self) {
        let roster = self.roster();
        for handle in self.clients.values() {
            handle.send(ServerMessage::ClientList(roster.clone()));
        }
    }

    /// Record an invitation from `from` to `to` and deliver `GAME_INVITE`.
    pub fn invite(&mut self, from: ClientId, to: ClientId) -> Result<(), InviteError> {
        if from == to {
            return Err(InviteError::SelfInvite);
        }
        if !self.contains(from) {
            return Err(InviteError::NotInLobby(from));
        }
        if !self.contains(to) {
            return Err(InviteError::NotInLobby(to));
        }
        if self.pending.contains_key(&from) {
            return Err(InviteError::AlreadyPending(from));
        }
        if self.pending.contains_key(&to) {
            return Err(InviteError::AlreadyPending(to));
        }

        self.pending.insert(
            from,
            PendingInvite {
                counterpart: to,
                role: InviteRole::Sender,
            },
        );
        self.pending.insert(
            to,
            PendingInvite {
                counterpart: from,
                role: InviteRole::Receiver,
            },
        );
        if let Some(handle) = self.clients.get(&to) {
            handle.send(ServerMessage::GameInvite { from });
        }
        info!("client {} invited client {}", from, to);
        Ok(())
    }

    /// Answer the invitation `inviter` sent to `responder`.
    ///
    /// On acceptance both clients leave the lobby and their handles come back
    /// as `(inviter, responder)`; on refusal the inviter is told
    /// `INVITE_DECLINED` and `None` is returned.
    pub fn respond_to_invite(
        &mut self,
        responder: ClientId,
        inviter: ClientId,
        accepted: bool,
    ) -> Result<Option<(ConnectionHandle, ConnectionHandle)>, InviteError> {
        let expected = PendingInvite {
            counterpart: inviter,
            role: InviteRole::Receiver,
        };
        if self.pending.get(&responder) != Some(&expected) {
            return Err(InviteError::NoSuchInvite(inviter));
        }
        self.pending.remove(&responder);
        self.pending.remove(&inviter);

        if !accepted {
            if let Some(handle) = self.clients.get(&inviter) {
                handle.send(ServerMessage::InviteDeclined { by: responder });
            }
            info!("client {} declined client {}", responder, inviter);
            return Ok(None);
        }

        let first = self
            .clients
            .remove(&inviter)
            .ok_or(InviteError::NotInLobby(inviter))?;
        let second = match self.clients.remove(&responder) {
            Some(handle) => handle,
            None => {
                self.clients.insert(inviter, first);
                return Err(InviteError::NotInLobby(responder));
            }
        };
        info!("client {} accepted client {}", responder, inviter);
        Ok(Some((first, second)))
    }

    /// Withdraw whatever invitation `id` takes part in and tell the other side.
    ///
    /// Returns the counterpart, if there was one.
    pub fn cancel_invite(&mut self, id: ClientId) -> Option<ClientId> {
        let invite = self.pending.remove(&id)?;
        let other = invite.counterpart;
        if self.pending.get(&other).map(|p| p.counterpart) == Some(id) {
            self.pending.remove(&other);
        }
        if let Some(handle) = self.clients.get(&other) {
            handle.send(ServerMessage::InviteCanceled(format!(
                "invitation canceled by client {}",
                id
            )));
        }
        debug!("invitation between {} and {} canceled", id, other);
        Some(other)
    }
}

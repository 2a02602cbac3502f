// Copyright 2024. The Tari Project
//
// Redistribution and use in source and binary forms, with or without modification, are permitted provided that the
// following conditions are met:
//
// 1. Redistributions of source code must retain the above copyright notice, this list of conditions and the following
// disclaimer.
//
// 2. Redistributions in binary form must reproduce the above copyright notice, this list of conditions and the
// following disclaimer in the documentation and/or other materials provided with the distribution.
//
// 3. Neither the name of the copyright holder nor the names of its contributors may be used to endorse or promote
// products derived from this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES,
// INCLUDING, BUT NOT LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE
// DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
// SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR
// SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF LIABILITY,
// WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE
// USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

use log::debug;
use thiserror::Error;

use crate::{
    config::{ConfigError, LedgerConfig, Role},
    crypto::SignatureSuite,
    ledger_db::{ClientBackend, MemoryClientDatabase, MemoryPeerDatabase, PeerBackend, PeerDbFlavor, UnconfirmedPool},
    transactions::activity::GroupModulus,
};

pub const LOG_TARGET: &str = "c::ctx";

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// The unit of serialisation for every operation in the core. A context owns its store handles,
/// its overlay, its group-arithmetic state and the counters that drive id assignment, and must
/// not be shared across threads. Several contexts (say one client and one peer) may alternate
/// calls on the same thread; separation is by instance, not by lock.
pub struct ExeContext {
    pub(crate) config: LedgerConfig,
    pub(crate) suite: SignatureSuite,
    pub(crate) modulus: GroupModulus,
    pub(crate) client_db: Option<Box<dyn ClientBackend>>,
    pub(crate) peer_db: Option<Box<dyn PeerBackend>>,
    pub(crate) pool: UnconfirmedPool,

    pub(crate) total_tx: usize,
    pub(crate) total_blocks: usize,
    /// UTXO arrangement consumes previously created outputs round-robin from this cursor.
    pub(crate) input_pointer: usize,
    pub(crate) output_pointer: usize,
    pub(crate) current_users: usize,
    pub(crate) current_outputs: usize,
    pub(crate) deleted_outputs: usize,
}

impl ExeContext {
    /// Create a context with the in-memory reference backends. Durable engines plug in through
    /// [with_backends](Self::with_backends).
    pub fn new(config: LedgerConfig) -> Result<Self, ContextError> {
        let (client_db, peer_db): (Option<Box<dyn ClientBackend>>, Option<Box<dyn PeerBackend>>) = match config.role {
            Role::Client => (Some(Box::new(MemoryClientDatabase::new(config.indexing_enabled))), None),
            Role::Peer => (
                None,
                Some(Box::new(MemoryPeerDatabase::new(
                    PeerDbFlavor::for_model(config.tx_model),
                    config.indexing_enabled,
                ))),
            ),
        };
        Self::with_backends(config, client_db, peer_db)
    }

    pub fn with_backends(
        config: LedgerConfig,
        client_db: Option<Box<dyn ClientBackend>>,
        peer_db: Option<Box<dyn PeerBackend>>,
    ) -> Result<Self, ContextError> {
        config.validate()?;
        debug!(
            target: LOG_TARGET,
            "New {:?} context {} ({}, {:?})", config.role, config.exe_id, config.tx_model, config.sig_scheme
        );
        let suite = SignatureSuite::new(config.sig_scheme);
        Ok(Self {
            config,
            suite,
            modulus: GroupModulus,
            client_db,
            peer_db,
            pool: UnconfirmedPool::new(),
            total_tx: 0,
            total_blocks: 0,
            input_pointer: 0,
            output_pointer: 0,
            current_users: 0,
            current_outputs: 0,
            deleted_outputs: 0,
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn suite(&self) -> &SignatureSuite {
        &self.suite
    }

    pub(crate) fn modulus(&self) -> &GroupModulus {
        &self.modulus
    }

    pub fn role(&self) -> Role {
        self.config.role
    }

    /// Committed transactions so far; the next transaction takes this as its sequence number.
    pub fn total_tx(&self) -> usize {
        self.total_tx
    }

    pub fn total_blocks(&self) -> usize {
        self.total_blocks
    }

    pub fn current_users(&self) -> usize {
        self.current_users
    }

    pub fn current_outputs(&self) -> usize {
        self.current_outputs
    }

    pub fn deleted_outputs(&self) -> usize {
        self.deleted_outputs
    }

    /// The committed peer repository, when this context has the peer role. Block layers read
    /// transaction headers through this handle.
    pub fn peer_backend(&self) -> Option<&dyn PeerBackend> {
        self.peer_db.as_deref()
    }

    pub fn peer_backend_mut<'a>(&'a mut self) -> Option<&'a mut (dyn PeerBackend + 'a)> {
        self.peer_db.as_deref_mut().map(|b| b as &'a mut (dyn PeerBackend + 'a))
    }

    pub fn client_backend(&self) -> Option<&dyn ClientBackend> {
        self.client_db.as_deref()
    }
}

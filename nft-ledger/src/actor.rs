//! Single-writer execution of ledger operations
//!
//! All mutations funnel through one actor task. The actor runs a
//! command's full validate-then-apply sequence and acknowledges it before
//! picking up the next command, so read-modify-write races cannot occur
//! and an acknowledged operation is already durable.
//!
//! ```text
//! callers ──► LedgerHandle (Clone) ──mpsc──► LedgerActor ──► StateMachine
//!                                            one task, one command at a time
//! ```

use crate::{
    error::{Error, Result},
    host::Authorization,
    ops::{Applied, StateMachine},
    types::Principal,
};
use tokio::sync::{mpsc, oneshot};

/// Command processed by the ledger actor
pub enum LedgerCommand {
    /// Register a collection
    CreateCollection {
        /// Authorization presented by the caller
        auth: Box<dyn Authorization>,
        /// Collection author
        author: Principal,
        /// Royalty in basis points
        royalty: u16,
        /// Opaque collection payload
        data: Vec<u8>,
        /// Acknowledgement channel carrying the allocated id
        reply: oneshot::Sender<Result<u64>>,
    },
    /// Register an asset, optionally minting an initial supply
    CreateAsset {
        /// Authorization presented by the caller
        auth: Box<dyn Authorization>,
        /// Owning collection
        collection_id: u64,
        /// Initial supply minted to the author (0 for none)
        supply: u64,
        /// Supply cap
        max_supply: u64,
        /// Opaque asset payload
        data: Vec<u8>,
        /// Acknowledgement channel carrying the allocated id
        reply: oneshot::Sender<Result<u64>>,
    },
    /// Mint units of an asset
    Mint {
        /// Authorization presented by the caller
        auth: Box<dyn Authorization>,
        /// Recipient of the minted units
        to: Principal,
        /// Asset to mint
        asset_id: u64,
        /// Quantity to mint
        amount: i64,
        /// Free-form annotation
        memo: String,
        /// Acknowledgement channel carrying the committed outcome
        reply: oneshot::Sender<Result<Applied>>,
    },
    /// Burn units of an asset from the author's holding
    Burn {
        /// Authorization presented by the caller
        auth: Box<dyn Authorization>,
        /// Asset to burn
        asset_id: u64,
        /// Quantity to burn
        amount: i64,
        /// Free-form annotation
        memo: String,
        /// Acknowledgement channel carrying the committed outcome
        reply: oneshot::Sender<Result<Applied>>,
    },
    /// Move units of an asset between principals
    Transfer {
        /// Authorization presented by the caller
        auth: Box<dyn Authorization>,
        /// Sending principal
        from: Principal,
        /// Receiving principal
        to: Principal,
        /// Asset to move
        asset_id: u64,
        /// Quantity to move
        amount: i64,
        /// Free-form annotation
        memo: String,
        /// Acknowledgement channel carrying the committed outcome
        reply: oneshot::Sender<Result<Applied>>,
    },
    /// Stop the actor after draining commands queued ahead of this one
    Shutdown {
        /// Acknowledged once the actor has stopped and released storage
        reply: oneshot::Sender<()>,
    },
}

/// Actor that executes ledger commands one at a time
pub struct LedgerActor {
    machine: StateMachine,
    mailbox: mpsc::Receiver<LedgerCommand>,
}

impl LedgerActor {
    /// Create an actor over a state machine and its command mailbox
    pub fn new(machine: StateMachine, mailbox: mpsc::Receiver<LedgerCommand>) -> Self {
        Self { machine, mailbox }
    }

    /// Run the actor loop until shutdown or until all handles drop
    pub async fn run(mut self) {
        tracing::info!("Ledger writer started");

        let mut ack = None;
        while let Some(command) = self.mailbox.recv().await {
            match command {
                LedgerCommand::Shutdown { reply } => {
                    ack = Some(reply);
                    break;
                }
                command => self.handle_command(command),
            }
        }

        // Release storage before acknowledging, so an immediate reopen of
        // the same data directory cannot race the RocksDB lock.
        drop(self.machine);
        drop(self.mailbox);
        if let Some(ack) = ack {
            let _ = ack.send(());
        }

        tracing::info!("Ledger writer stopped");
    }

    fn handle_command(&self, command: LedgerCommand) {
        match command {
            LedgerCommand::CreateCollection {
                auth,
                author,
                royalty,
                data,
                reply,
            } => {
                let result = self
                    .machine
                    .create_collection(auth.as_ref(), &author, royalty, data);
                let _ = reply.send(result);
            }
            LedgerCommand::CreateAsset {
                auth,
                collection_id,
                supply,
                max_supply,
                data,
                reply,
            } => {
                let result =
                    self.machine
                        .create_asset(auth.as_ref(), collection_id, supply, max_supply, data);
                let _ = reply.send(result);
            }
            LedgerCommand::Mint {
                auth,
                to,
                asset_id,
                amount,
                memo,
                reply,
            } => {
                let result = self
                    .machine
                    .mint(auth.as_ref(), &to, asset_id, amount, &memo);
                let _ = reply.send(result);
            }
            LedgerCommand::Burn {
                auth,
                asset_id,
                amount,
                memo,
                reply,
            } => {
                let result = self.machine.burn(auth.as_ref(), asset_id, amount, &memo);
                let _ = reply.send(result);
            }
            LedgerCommand::Transfer {
                auth,
                from,
                to,
                asset_id,
                amount,
                memo,
                reply,
            } => {
                let result =
                    self.machine
                        .transfer(auth.as_ref(), &from, &to, asset_id, amount, &memo);
                let _ = reply.send(result);
            }
            LedgerCommand::Shutdown { .. } => {
                // Handled in the run loop
            }
        }
    }
}

/// Cloneable handle that forwards commands to the ledger actor
#[derive(Clone)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerCommand>,
}

impl LedgerHandle {
    /// Create a handle over the actor's command sender
    pub fn new(sender: mpsc::Sender<LedgerCommand>) -> Self {
        Self { sender }
    }

    async fn send(&self, command: LedgerCommand) -> Result<()> {
        self.sender
            .send(command)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))
    }

    /// Register a collection
    pub async fn create_collection(
        &self,
        auth: Box<dyn Authorization>,
        author: Principal,
        royalty: u16,
        data: Vec<u8>,
    ) -> Result<u64> {
        let (reply, rx) = oneshot::channel();
        self.send(LedgerCommand::CreateCollection {
            auth,
            author,
            royalty,
            data,
            reply,
        })
        .await?;
        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Register an asset, optionally minting an initial supply
    pub async fn create_asset(
        &self,
        auth: Box<dyn Authorization>,
        collection_id: u64,
        supply: u64,
        max_supply: u64,
        data: Vec<u8>,
    ) -> Result<u64> {
        let (reply, rx) = oneshot::channel();
        self.send(LedgerCommand::CreateAsset {
            auth,
            collection_id,
            supply,
            max_supply,
            data,
            reply,
        })
        .await?;
        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Mint units of an asset
    pub async fn mint(
        &self,
        auth: Box<dyn Authorization>,
        to: Principal,
        asset_id: u64,
        amount: i64,
        memo: String,
    ) -> Result<Applied> {
        let (reply, rx) = oneshot::channel();
        self.send(LedgerCommand::Mint {
            auth,
            to,
            asset_id,
            amount,
            memo,
            reply,
        })
        .await?;
        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Burn units of an asset from the author's holding
    pub async fn burn(
        &self,
        auth: Box<dyn Authorization>,
        asset_id: u64,
        amount: i64,
        memo: String,
    ) -> Result<Applied> {
        let (reply, rx) = oneshot::channel();
        self.send(LedgerCommand::Burn {
            auth,
            asset_id,
            amount,
            memo,
            reply,
        })
        .await?;
        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Move units of an asset between principals
    pub async fn transfer(
        &self,
        auth: Box<dyn Authorization>,
        from: Principal,
        to: Principal,
        asset_id: u64,
        amount: i64,
        memo: String,
    ) -> Result<Applied> {
        let (reply, rx) = oneshot::channel();
        self.send(LedgerCommand::Transfer {
            auth,
            from,
            to,
            asset_id,
            amount,
            memo,
            reply,
        })
        .await?;
        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Stop the actor once commands queued ahead have been processed
    ///
    /// Resolves after the actor has released storage, so the same data
    /// directory can be reopened immediately.
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(LedgerCommand::Shutdown { reply }).await?;
        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))
    }
}

/// Spawn the ledger writer actor and return a handle to it
///
/// The mailbox is bounded so a burst of callers backpressures instead of
/// growing without limit.
pub fn spawn_ledger_actor(machine: StateMachine, mailbox_capacity: usize) -> LedgerHandle {
    let (sender, receiver) = mpsc::channel(mailbox_capacity);
    let actor = LedgerActor::new(machine, receiver);
    tokio::spawn(actor.run());
    LedgerHandle::new(sender)
}

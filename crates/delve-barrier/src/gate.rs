//! Cross-thread marshal for barrier mutation.
//!
//! Environment mutation belongs to the single authoritative tick task.
//! The runtime calls the [`BarrierController`] directly from that task;
//! anything else goes through a [`BarrierGate`], an actor that owns the
//! controller and its world handle and serializes every request. A
//! caller sends a command with a reply channel and waits for completion,
//! so the environment is never touched from an arbitrary thread.

use delve_world::{CellPos, SessionKey, Volume, World};
use tokio::sync::{mpsc, oneshot};

use crate::{BarrierConfig, BarrierController, BarrierError, BarrierKey, BarrierState};

/// Commands a gate actor accepts. Each carries a reply channel; the
/// caller blocks on it until the mutation has run on the actor task.
enum GateCommand {
    Register {
        key: BarrierKey,
        room: Volume,
        markers: Vec<CellPos>,
        config: BarrierConfig,
        reply: oneshot::Sender<Result<(), BarrierError>>,
    },
    Lock {
        key: BarrierKey,
        reply: oneshot::Sender<Result<bool, BarrierError>>,
    },
    Unlock {
        key: BarrierKey,
        reply: oneshot::Sender<Result<bool, BarrierError>>,
    },
    UnlockAll {
        session: SessionKey,
        reply: oneshot::Sender<Result<usize, BarrierError>>,
    },
    State {
        key: BarrierKey,
        reply: oneshot::Sender<Option<BarrierState>>,
    },
    Shutdown,
}

/// Handle to a running gate actor. Cheap to clone.
#[derive(Clone)]
pub struct BarrierGate {
    sender: mpsc::Sender<GateCommand>,
}

impl BarrierGate {
    /// Spawn a gate actor owning the controller and world handle.
    pub fn spawn<W>(controller: BarrierController, world: W) -> Self
    where
        W: World + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(run_gate(controller, world, rx));
        Self { sender: tx }
    }

    pub async fn register(
        &self,
        key: BarrierKey,
        room: Volume,
        markers: Vec<CellPos>,
        config: BarrierConfig,
    ) -> Result<(), BarrierError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(GateCommand::Register {
                key,
                room,
                markers,
                config,
                reply,
            })
            .await
            .map_err(|_| BarrierError::GateClosed)?;
        rx.await.map_err(|_| BarrierError::GateClosed)?
    }

    pub async fn lock(&self, key: BarrierKey) -> Result<bool, BarrierError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(GateCommand::Lock { key, reply })
            .await
            .map_err(|_| BarrierError::GateClosed)?;
        rx.await.map_err(|_| BarrierError::GateClosed)?
    }

    pub async fn unlock(&self, key: BarrierKey) -> Result<bool, BarrierError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(GateCommand::Unlock { key, reply })
            .await
            .map_err(|_| BarrierError::GateClosed)?;
        rx.await.map_err(|_| BarrierError::GateClosed)?
    }

    pub async fn unlock_all(&self, session: SessionKey) -> Result<usize, BarrierError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(GateCommand::UnlockAll { session, reply })
            .await
            .map_err(|_| BarrierError::GateClosed)?;
        rx.await.map_err(|_| BarrierError::GateClosed)?
    }

    pub async fn state(&self, key: BarrierKey) -> Result<Option<BarrierState>, BarrierError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(GateCommand::State { key, reply })
            .await
            .map_err(|_| BarrierError::GateClosed)?;
        rx.await.map_err(|_| BarrierError::GateClosed)
    }

    pub async fn shutdown(&self) -> Result<(), BarrierError> {
        self.sender
            .send(GateCommand::Shutdown)
            .await
            .map_err(|_| BarrierError::GateClosed)
    }
}

async fn run_gate<W>(
    mut controller: BarrierController,
    mut world: W,
    mut receiver: mpsc::Receiver<GateCommand>,
) where
    W: World + Send + 'static,
{
    tracing::debug!("barrier gate started");
    while let Some(cmd) = receiver.recv().await {
        match cmd {
            GateCommand::Register {
                key,
                room,
                markers,
                config,
                reply,
            } => {
                let _ = reply.send(controller.register(key, &room, &markers, &config));
            }
            GateCommand::Lock { key, reply } => {
                let _ = reply.send(controller.lock(&mut world, &key));
            }
            GateCommand::Unlock { key, reply } => {
                let _ = reply.send(controller.unlock(&mut world, &key));
            }
            GateCommand::UnlockAll { session, reply } => {
                let _ = reply.send(controller.unlock_all(&mut world, &session));
            }
            GateCommand::State { key, reply } => {
                let _ = reply.send(controller.state(&key));
            }
            GateCommand::Shutdown => break,
        }
    }
    tracing::debug!("barrier gate stopped");
}

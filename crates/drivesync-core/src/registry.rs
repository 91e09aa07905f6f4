//! Handler registry
//!
//! Routes each decoded [`Command`] to the use case that executes it. The
//! match is exhaustive, so a new command variant does not compile until it
//! has a handler.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::{
    domain::Command,
    ports::ICommandHandler,
    usecases::{AuthorizeAccountUseCase, SyncFileUseCase},
};

/// Dispatches commands to the authorization and sync use cases
pub struct HandlerRegistry {
    authorize: Arc<AuthorizeAccountUseCase>,
    sync: Arc<SyncFileUseCase>,
}

impl HandlerRegistry {
    pub fn new(authorize: Arc<AuthorizeAccountUseCase>, sync: Arc<SyncFileUseCase>) -> Self {
        Self { authorize, sync }
    }
}

#[async_trait]
impl ICommandHandler for HandlerRegistry {
    async fn handle(&self, command: &Command) -> anyhow::Result<()> {
        debug!(kind = command.kind(), "Dispatching command");

        match command {
            Command::Authorize(cmd) => {
                self.authorize.execute(cmd).await?;
            }
            Command::Sync(cmd) => {
                self.sync.sync(cmd).await?;
            }
            Command::SyncBatch(batch) => {
                self.sync.sync_batch(batch).await?;
            }
        }
        Ok(())
    }
}

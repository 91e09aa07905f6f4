//! Command handler port
//!
//! The single contract the dispatch pipeline drives. Middleware wraps an
//! `ICommandHandler` in another `ICommandHandler`, and the handler registry
//! is the innermost implementation.

use crate::domain::Command;

/// Executes one decoded command
///
/// Returns `Ok(())` only when the command's side effects are complete; any
/// error leaves the originating message unacknowledged.
#[async_trait::async_trait]
pub trait ICommandHandler: Send + Sync {
    async fn handle(&self, command: &Command) -> anyhow::Result<()>;
}

//! drivesync Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `Command`, `IntegrationRecord`, `UploadDescriptor`, `OwnerId`
//! - **Messages** - Envelope decoding into typed commands (`decode`, `encode`)
//! - **Use cases** - `AuthorizeAccountUseCase`, `SyncFileUseCase`
//! - **Handler registry** - Maps each command variant to the use case that executes it
//! - **Port definitions** - Traits for adapters: `ICredentialStore`, `IObjectStorage`,
//!   `IMessageQueue`, `IDriveUploader`, `IAccessTokenSource`, `ICommandHandler`
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain and messages modules are pure and perform no I/O.
//! Ports define trait interfaces that adapter crates implement.
//! Use cases orchestrate domain values through port interfaces.

pub mod config;
pub mod domain;
pub mod messages;
pub mod ports;
pub mod registry;
pub mod usecases;

#[cfg(test)]
mod test_support;

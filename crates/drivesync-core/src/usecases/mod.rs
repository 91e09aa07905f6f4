//! Use cases (application services)
//!
//! Each use case orchestrates domain values through port interfaces.
//!
//! - [`AuthorizeAccountUseCase`] - Persist a refresh token, then validate it
//! - [`SyncFileUseCase`] - Copy stored objects into an owner's drive

pub mod authorize_account;
pub mod sync_file;

pub use authorize_account::{AuthorizationOutcome, AuthorizeAccountUseCase};
pub use sync_file::{BatchOutcome, SyncFileUseCase};

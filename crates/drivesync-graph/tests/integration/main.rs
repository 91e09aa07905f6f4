//! Integration tests for drivesync-graph
//!
//! Uses wiremock to simulate the Microsoft identity token endpoint and the
//! Graph API, and verifies token exchange, rotation, caching and uploads.

mod common;

mod test_token_exchange;
mod test_upload;

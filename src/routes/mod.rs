//! Routers grouped by access tier.
//!
//! Every tier is assembled separately and gated in `create_router` with a
//! `route_layer`, so a handler can never be reached through a weaker tier by
//! accident. Ownership rules on top of the tier live in `access`.

/// Anonymous or signed-in callers. Handlers decide visibility per `Viewer`.
pub mod public;

/// Any signed-in account (`PermissionLevel::User` and above).
pub mod authenticated;

/// Accounts that publish: `Writer` and above.
pub mod writer;

/// `Admin` and above.
pub mod admin;

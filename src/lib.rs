//! trafficsync keeps a central authority and its edge nodes in agreement
//! about per-user traffic quotas and usage.
pub mod admin;
pub mod api;
pub mod authority;
pub mod cli;
pub mod client;
pub mod error;
pub mod events;
pub mod ledger;
pub mod nodes;
pub mod settings;
pub mod sync;

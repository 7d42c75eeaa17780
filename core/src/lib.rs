//! Economy engine for an idle clicker: catalog, player state, purchase
//! rules, idle production and save/restore.

pub mod clock;
pub mod codec;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod shared;
pub mod snapshot;
pub mod state;
pub mod store;
pub mod types;

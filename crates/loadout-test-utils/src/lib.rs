//! Shared test fixtures for the loadout-sync workspace.
//!
//! A dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`memory`]: in-memory collaborators with fault injection
//! - [`fixture`]: [`Fixture`] wiring the in-memory collaborators together
//! - [`game`]: [`TestGame`] builder for file-backed scenarios in a temp dir

pub mod fixture;
pub mod game;
pub mod memory;

pub use fixture::{Fixture, path};
pub use game::TestGame;
pub use memory::{MemoryArchive, MemoryDisk, MemoryLoadout, MemorySnapshot};

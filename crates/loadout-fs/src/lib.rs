//! Filesystem primitives for the loadout synchronizer
//!
//! Provides normalized path handling, atomic locked writes, content hashing
//! and format-agnostic configuration loading.

pub mod checksum;
pub mod config;
pub mod error;
pub mod io;
pub mod path;

pub use checksum::{ContentDigest, digest_bytes, digest_file};
pub use config::{ConfigStore, StateFormat};
pub use error::{Error, Result};
pub use io::RobustnessConfig;
pub use path::{NormalizedPath, validate_relative_path};

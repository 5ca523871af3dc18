//! Signature classification and action resolution

mod actions;
mod resolver;
mod signature;
pub mod table;

pub use actions::Actions;
pub use resolver::{ActionResolver, InstrumentedResolver, ResolverStats, TableResolver};
pub use signature::{Signature, Slot};

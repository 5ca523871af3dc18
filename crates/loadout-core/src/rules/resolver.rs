//! Injectable signature resolution

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{Actions, Signature, table};

/// Maps a signature to the actions that reconcile it.
///
/// Implementations must be pure: the same signature always yields the same
/// actions.
///
/// Only signatures with at least one present channel reach a resolver. A
/// vacant path (a tombstone whose file is already gone everywhere) has
/// nothing to reconcile and is settled as `DoNothing` by the tree builder.
pub trait ActionResolver: Send + Sync {
    /// `None` when the signature has no rule; callers treat that as a defect.
    fn resolve(&self, signature: &Signature) -> Option<Actions>;
}

impl<R: ActionResolver + ?Sized> ActionResolver for &R {
    fn resolve(&self, signature: &Signature) -> Option<Actions> {
        (**self).resolve(signature)
    }
}

impl<R: ActionResolver + ?Sized> ActionResolver for Arc<R> {
    fn resolve(&self, signature: &Signature) -> Option<Actions> {
        (**self).resolve(signature)
    }
}

/// The built-in rule table.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableResolver;

impl ActionResolver for TableResolver {
    fn resolve(&self, signature: &Signature) -> Option<Actions> {
        table::lookup(signature)
    }
}

/// Wraps a resolver and counts what it hands out.
#[derive(Debug, Default)]
pub struct InstrumentedResolver<R> {
    inner: R,
    resolved: AtomicU64,
    unmapped: AtomicU64,
    by_flag: [AtomicU64; 8],
}

/// Counters collected by [`InstrumentedResolver`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ResolverStats {
    pub resolved: u64,
    pub unmapped: u64,
    /// Number of resolutions that included each flag.
    pub by_flag: BTreeMap<&'static str, u64>,
}

impl<R: ActionResolver> InstrumentedResolver<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            resolved: AtomicU64::new(0),
            unmapped: AtomicU64::new(0),
            by_flag: Default::default(),
        }
    }

    pub fn stats(&self) -> ResolverStats {
        let by_flag = (0..8)
            .filter_map(|bit| {
                let name = Actions::from_bit(bit)?.name()?;
                let count = self.by_flag[bit].load(Ordering::Relaxed);
                (count > 0).then_some((name, count))
            })
            .collect();

        ResolverStats {
            resolved: self.resolved.load(Ordering::Relaxed),
            unmapped: self.unmapped.load(Ordering::Relaxed),
            by_flag,
        }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: ActionResolver> ActionResolver for InstrumentedResolver<R> {
    fn resolve(&self, signature: &Signature) -> Option<Actions> {
        let outcome = self.inner.resolve(signature);
        match outcome {
            Some(actions) => {
                self.resolved.fetch_add(1, Ordering::Relaxed);
                for (bit, counter) in self.by_flag.iter().enumerate() {
                    if actions.bits() & (1 << bit) != 0 {
                        counter.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
            None => {
                self.unmapped.fetch_add(1, Ordering::Relaxed);
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Never;

    impl ActionResolver for Never {
        fn resolve(&self, _: &Signature) -> Option<Actions> {
            None
        }
    }

    #[test]
    fn table_resolver_uses_the_table() {
        let signature = Signature::from_shorthand("AAx_xxx_i");
        assert_eq!(
            TableResolver.resolve(&signature),
            Some(Actions::BACKUP_FILE | Actions::DELETE_FROM_DISK)
        );
    }

    #[test]
    fn instrumented_counts_flags() {
        let resolver = InstrumentedResolver::new(TableResolver);
        resolver.resolve(&Signature::from_shorthand("AAA_xxx_i"));
        resolver.resolve(&Signature::from_shorthand("AAx_xxx_i"));
        resolver.resolve(&Signature::from_shorthand("Axx_xxx_i"));

        let stats = resolver.stats();
        assert_eq!(stats.resolved, 3);
        assert_eq!(stats.unmapped, 0);
        assert_eq!(stats.by_flag.get("BackupFile"), Some(&2));
        assert_eq!(stats.by_flag.get("DoNothing"), Some(&1));
        assert_eq!(stats.by_flag.get("WarnOfConflict"), None);
    }

    #[test]
    fn instrumented_counts_unmapped() {
        let resolver = InstrumentedResolver::new(Never);
        assert!(resolver.resolve(&Signature::from_shorthand("AAA_xxx_i")).is_none());
        assert_eq!(resolver.stats().unmapped, 1);
    }

    #[test]
    fn resolvers_compose_through_arc() {
        let shared: Arc<dyn ActionResolver> = Arc::new(TableResolver);
        let signature = Signature::from_shorthand("xxA_xxX_i");
        assert_eq!(shared.resolve(&signature), Some(Actions::EXTRACT_TO_DISK));
    }
}

//! The signature → actions table
//!
//! Rules are listed as shorthand rows and compiled into a dense array when
//! the crate is built. A malformed, unreachable or duplicated row, or a row
//! that breaks the outcome invariants, stops compilation.

use super::{Actions, Signature};

macro_rules! act {
    ($($flag:ident)|+) => {
        Actions::NONE $(.union(Actions::$flag))+
    };
}

const NOTHING: Actions = Actions::DO_NOTHING;
const UNABLE: Actions = Actions::WARN_OF_UNABLE_TO_EXTRACT;
const CONFLICT: Actions = Actions::WARN_OF_CONFLICT;
const EXTRACT: Actions = Actions::EXTRACT_TO_DISK;
const INGEST: Actions = Actions::INGEST_FROM_DISK;
const DELETE: Actions = Actions::DELETE_FROM_DISK;
const REIFY: Actions = Actions::ADD_REIFIED_DELETE;
const BACKUP_INGEST: Actions = act!(BACKUP_FILE | INGEST_FROM_DISK);
const BACKUP_DELETE: Actions = act!(BACKUP_FILE | DELETE_FROM_DISK);
const BACKUP_REPLACE: Actions = act!(BACKUP_FILE | DELETE_FROM_DISK | EXTRACT_TO_DISK);
const REPLACE: Actions = act!(DELETE_FROM_DISK | EXTRACT_TO_DISK);

/// Every reachable signature and its outcome.
pub const RULES: &[(&str, Actions)] = &[
    // Only the loadout knows the file
    ("xxA_xxx_i", UNABLE),
    ("xxA_xxX_i", EXTRACT),
    ("xxA_xxx_I", UNABLE),
    ("xxA_xxX_I", EXTRACT),
    // Deleted on disk and dropped from the loadout
    ("xAx_xxx_i", NOTHING),
    ("xAx_xXx_i", NOTHING),
    ("xAx_xxx_I", NOTHING),
    ("xAx_xXx_I", NOTHING),
    // Deleted on disk, loadout unchanged
    ("xAA_xxx_i", UNABLE),
    ("xAA_xXX_i", REIFY),
    ("xAA_xxx_I", REIFY),
    ("xAA_xXX_I", REIFY),
    // Deleted on disk, loadout changed
    ("xAB_xxx_i", UNABLE),
    ("xAB_xXx_i", UNABLE),
    ("xAB_xxX_i", EXTRACT),
    ("xAB_xXX_i", EXTRACT),
    ("xAB_xxx_I", UNABLE),
    ("xAB_xXx_I", UNABLE),
    ("xAB_xxX_I", EXTRACT),
    ("xAB_xXX_I", EXTRACT),
    // New file on disk
    ("Axx_xxx_i", BACKUP_INGEST),
    ("Axx_Xxx_i", INGEST),
    ("Axx_xxx_I", INGEST),
    ("Axx_Xxx_I", INGEST),
    // Untracked file the loadout now also wants
    ("AxA_xxx_i", NOTHING),
    ("AxA_XxX_i", NOTHING),
    ("AxA_xxx_I", NOTHING),
    ("AxA_XxX_I", NOTHING),
    // Untracked file the loadout wants replaced
    ("AxB_xxx_i", BACKUP_INGEST),
    ("AxB_Xxx_i", INGEST),
    ("AxB_xxX_i", BACKUP_INGEST),
    ("AxB_XxX_i", INGEST),
    ("AxB_xxx_I", BACKUP_INGEST),
    ("AxB_Xxx_I", BACKUP_INGEST),
    ("AxB_xxX_I", BACKUP_REPLACE),
    ("AxB_XxX_I", BACKUP_REPLACE),
    // Removed from the loadout
    ("AAx_xxx_i", BACKUP_DELETE),
    ("AAx_XXx_i", DELETE),
    ("AAx_xxx_I", BACKUP_DELETE),
    ("AAx_XXx_I", DELETE),
    // In sync
    ("AAA_xxx_i", NOTHING),
    ("AAA_XXX_i", NOTHING),
    ("AAA_xxx_I", NOTHING),
    ("AAA_XXX_I", NOTHING),
    // Loadout changed
    ("AAB_xxx_i", UNABLE),
    ("AAB_XXx_i", UNABLE),
    ("AAB_xxX_i", BACKUP_REPLACE),
    ("AAB_XXX_i", REPLACE),
    ("AAB_xxx_I", UNABLE),
    ("AAB_XXx_I", UNABLE),
    ("AAB_xxX_I", BACKUP_REPLACE),
    ("AAB_XXX_I", REPLACE),
    // Changed on disk, dropped from the loadout
    ("ABx_xxx_i", BACKUP_DELETE),
    ("ABx_Xxx_i", DELETE),
    ("ABx_xXx_i", BACKUP_DELETE),
    ("ABx_XXx_i", DELETE),
    ("ABx_xxx_I", BACKUP_DELETE),
    ("ABx_Xxx_I", DELETE),
    ("ABx_xXx_I", BACKUP_DELETE),
    ("ABx_XXx_I", DELETE),
    // Disk and loadout agree on new content
    ("ABA_xxx_i", NOTHING),
    ("ABA_XxX_i", NOTHING),
    ("ABA_xXx_i", NOTHING),
    ("ABA_XXX_i", NOTHING),
    ("ABA_xxx_I", NOTHING),
    ("ABA_XxX_I", NOTHING),
    ("ABA_xXx_I", NOTHING),
    ("ABA_XXX_I", NOTHING),
    // Changed on disk, loadout unchanged
    ("ABB_xxx_i", BACKUP_INGEST),
    ("ABB_Xxx_i", INGEST),
    ("ABB_xXX_i", BACKUP_INGEST),
    ("ABB_XXX_i", INGEST),
    ("ABB_xxx_I", BACKUP_INGEST),
    ("ABB_Xxx_I", INGEST),
    ("ABB_xXX_I", BACKUP_INGEST),
    ("ABB_XXX_I", INGEST),
    // Disk and loadout changed independently
    ("ABC_xxx_i", CONFLICT),
    ("ABC_Xxx_i", UNABLE),
    ("ABC_xXx_i", CONFLICT),
    ("ABC_xxX_i", BACKUP_INGEST),
    ("ABC_XXx_i", BACKUP_INGEST),
    ("ABC_XxX_i", CONFLICT),
    ("ABC_xXX_i", BACKUP_INGEST),
    ("ABC_XXX_i", INGEST),
    ("ABC_xxx_I", BACKUP_INGEST),
    ("ABC_Xxx_I", UNABLE),
    ("ABC_xXx_I", UNABLE),
    ("ABC_xxX_I", BACKUP_REPLACE),
    ("ABC_XXx_I", UNABLE),
    ("ABC_XxX_I", REPLACE),
    ("ABC_xXX_I", BACKUP_REPLACE),
    ("ABC_XXX_I", REPLACE),
];

static TABLE: [Option<Actions>; Signature::KEY_SPACE] = compile(RULES);

const fn compile(rules: &[(&str, Actions)]) -> [Option<Actions>; Signature::KEY_SPACE] {
    let mut table = [None; Signature::KEY_SPACE];
    let mut i = 0;
    while i < rules.len() {
        let (shorthand, actions) = rules[i];
        let signature = Signature::from_shorthand(shorthand);
        let key = signature.key();

        if table[key].is_some() {
            panic!("duplicate rule in action table");
        }
        if actions.is_empty() {
            panic!("rule resolves to an empty action set");
        }
        if actions.intersects(Actions::DO_NOTHING.union(Actions::WARN_OF_CONFLICT).union(Actions::WARN_OF_UNABLE_TO_EXTRACT))
            && !actions.is_singleton_outcome()
        {
            panic!("DoNothing and warnings must be the only flag of a rule");
        }
        if actions.contains(Actions::BACKUP_FILE)
            && !actions.intersects(
                Actions::INGEST_FROM_DISK
                    .union(Actions::DELETE_FROM_DISK)
                    .union(Actions::EXTRACT_TO_DISK),
            )
        {
            panic!("BackupFile must accompany a destructive or ingesting action");
        }
        if signature.is_fixpoint() && actions.bits() != Actions::DO_NOTHING.bits() {
            panic!("a synchronized path must resolve to DoNothing");
        }

        table[key] = Some(actions);
        i += 1;
    }
    table
}

/// Look up the outcome for a signature.
///
/// `None` only for signatures classification cannot produce.
pub fn lookup(signature: &Signature) -> Option<Actions> {
    TABLE[signature.key()]
}

/// The table in key order, for display.
pub fn rules() -> impl Iterator<Item = (Signature, Actions)> {
    Signature::all()
        .into_iter()
        .filter_map(|signature| lookup(&signature).map(|actions| (signature, actions)))
}

/// One line per rule, `AxB_XxX_i => BackupFile | IngestFromDisk`.
pub fn render() -> String {
    rules()
        .map(|(signature, actions)| format!("{signature} => {actions}\n"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_exhaustive() {
        for signature in Signature::all() {
            assert!(lookup(&signature).is_some(), "no rule for {signature}");
        }
        assert_eq!(RULES.len(), Signature::all().len());
    }

    #[test]
    fn fixpoints_do_nothing() {
        for shorthand in ["AAA_xxx_i", "AAA_XXX_i", "AAA_xxx_I", "AAA_XXX_I"] {
            let signature = Signature::from_shorthand(shorthand);
            assert_eq!(lookup(&signature), Some(Actions::DO_NOTHING));
        }
    }

    #[test]
    fn render_lists_every_rule() {
        let rendered = render();
        assert_eq!(rendered.lines().count(), 92);
        assert!(rendered.contains("Axx_xxx_i => BackupFile | IngestFromDisk\n"));
    }
}

//! Properties of the signature classifier and the action table

use loadout_core::rules::{Actions, Signature, Slot, table};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::rstest;

fn rules() -> Vec<(Signature, Actions)> {
    table::rules().collect()
}

#[test]
fn every_reachable_signature_has_exactly_one_rule() {
    let all = Signature::all();
    assert_eq!(all.len(), 92);
    assert_eq!(table::RULES.len(), all.len());
    for signature in all {
        assert!(table::lookup(&signature).is_some(), "no rule for {signature}");
    }
}

#[test]
fn outcome_flags_stand_alone() {
    for (signature, actions) in rules() {
        if actions.intersects(
            Actions::DO_NOTHING
                .union(Actions::WARN_OF_CONFLICT)
                .union(Actions::WARN_OF_UNABLE_TO_EXTRACT),
        ) {
            assert!(
                actions.is_singleton_outcome(),
                "{signature} mixes an outcome with other flags: {actions}"
            );
        }
    }
}

#[test]
fn backups_only_precede_work_on_disk_content() {
    for (signature, actions) in rules() {
        if actions.contains(Actions::BACKUP_FILE) {
            assert!(signature.disk().is_present(), "{signature} backs up nothing");
            assert!(
                actions.intersects(
                    Actions::INGEST_FROM_DISK
                        .union(Actions::DELETE_FROM_DISK)
                        .union(Actions::EXTRACT_TO_DISK)
                ),
                "{signature} backs up without acting"
            );
        }
    }
}

#[test]
fn actions_only_touch_channels_that_exist() {
    for (signature, actions) in rules() {
        if actions.intersects(Actions::INGEST_FROM_DISK.union(Actions::DELETE_FROM_DISK)) {
            assert!(signature.disk().is_present(), "{signature}: {actions}");
        }
        if actions.contains(Actions::EXTRACT_TO_DISK) {
            assert!(
                signature.loadout().is_present() && signature.loadout_archived(),
                "{signature} extracts content the archive does not hold"
            );
        }
        if actions.contains(Actions::ADD_REIFIED_DELETE) {
            assert_eq!(signature.disk(), Slot::Absent, "{signature}");
            assert!(signature.loadout().is_present(), "{signature}");
        }
        if actions == Actions::WARN_OF_UNABLE_TO_EXTRACT {
            assert!(
                signature.loadout().is_present() && !signature.loadout_archived(),
                "{signature} warns about content the archive holds"
            );
        }
    }
}

#[test]
fn disk_matching_loadout_needs_nothing() {
    for (signature, actions) in rules() {
        if signature.disk().is_present() && signature.disk() == signature.loadout() {
            assert_eq!(actions, Actions::DO_NOTHING, "{signature}");
        }
    }
}

#[test]
fn ignored_paths_never_conflict() {
    for (signature, actions) in rules() {
        if signature.ignored() {
            assert_ne!(actions, Actions::WARN_OF_CONFLICT, "{signature}");
        }
    }
}

#[test]
fn fixpoints_resolve_to_do_nothing() {
    let fixpoints: Vec<_> = Signature::all()
        .into_iter()
        .filter(Signature::is_fixpoint)
        .collect();
    assert_eq!(fixpoints.len(), 4);
    for signature in fixpoints {
        assert_eq!(table::lookup(&signature), Some(Actions::DO_NOTHING));
    }
}

#[rstest]
#[case("xxA_xxX_i", Actions::EXTRACT_TO_DISK)]
#[case("Axx_xxx_i", Actions::BACKUP_FILE | Actions::INGEST_FROM_DISK)]
#[case("AAB_XXX_i", Actions::DELETE_FROM_DISK | Actions::EXTRACT_TO_DISK)]
#[case("ABC_xxx_i", Actions::WARN_OF_CONFLICT)]
#[case("xAA_xXX_i", Actions::ADD_REIFIED_DELETE)]
#[case("AAB_xxx_i", Actions::WARN_OF_UNABLE_TO_EXTRACT)]
#[case("ABx_XXx_I", Actions::DELETE_FROM_DISK)]
fn selected_rules(#[case] shorthand: &str, #[case] expected: Actions) {
    let signature = Signature::from_shorthand(shorthand);
    assert_eq!(table::lookup(&signature), Some(expected));
}

#[test]
fn action_table_snapshot() {
    insta::assert_snapshot!("action_table", table::render());
}

fn channel() -> impl Strategy<Value = Option<u8>> {
    prop_oneof![Just(None), (0u8..4).prop_map(Some)]
}

proptest! {
    #[test]
    fn classification_is_canonical_and_mapped(
        values in [channel(), channel(), channel()],
        archived in any::<[bool; 3]>(),
        ignored in any::<bool>(),
    ) {
        prop_assume!(values.iter().any(Option::is_some));

        // Equal content is archived or not as a whole
        let mut archived = archived;
        for i in 0..3 {
            for j in 0..i {
                if values[i].is_some() && values[i] == values[j] {
                    archived[i] = archived[j];
                }
            }
        }

        let signature = Signature::classify(
            [values[0].as_ref(), values[1].as_ref(), values[2].as_ref()],
            archived,
            ignored,
        );
        prop_assert!(signature.is_canonical());
        prop_assert!(table::lookup(&signature).is_some());
        prop_assert_eq!(signature.ignored(), ignored);
    }

    #[test]
    fn classification_ignores_concrete_content(
        values in [channel(), channel(), channel()],
        offset in 1u8..200,
    ) {
        prop_assume!(values.iter().any(Option::is_some));
        let shifted = values.map(|value| value.map(|v| u16::from(v) + u16::from(offset)));

        let original = Signature::classify(
            [values[0].as_ref(), values[1].as_ref(), values[2].as_ref()],
            [false; 3],
            false,
        );
        let relabelled = Signature::classify(
            [shifted[0].as_ref(), shifted[1].as_ref(), shifted[2].as_ref()],
            [false; 3],
            false,
        );
        prop_assert_eq!(original, relabelled);
    }
}

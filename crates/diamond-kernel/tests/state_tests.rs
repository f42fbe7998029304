use diamond_kernel::{allowed_transitions, validate_transition, UpgradeState};
use proptest::prelude::*;

#[test]
fn test_draft_transitions() {
    assert!(validate_transition(UpgradeState::Draft, UpgradeState::ModulesReady).is_ok());
    assert!(validate_transition(UpgradeState::Draft, UpgradeState::Failed).is_ok());

    // Invalid
    assert!(validate_transition(UpgradeState::Draft, UpgradeState::Planned).is_err());
    assert!(validate_transition(UpgradeState::Draft, UpgradeState::Complete).is_err());
}

#[test]
fn test_failed_reachable_from_every_non_terminal_state() {
    for state in UpgradeState::ALL {
        let result = validate_transition(state, UpgradeState::Failed);
        assert_eq!(result.is_ok(), !state.is_terminal(), "{state}");
    }
}

fn any_state() -> impl Strategy<Value = UpgradeState> {
    prop::sample::select(UpgradeState::ALL.to_vec())
}

proptest! {
    #[test]
    fn prop_validation_matches_allowed(from in any_state(), to in any_state()) {
        let res = validate_transition(from, to);
        let allowed = allowed_transitions(from);

        if res.is_ok() {
            prop_assert!(allowed.contains(&to));
        } else {
            prop_assert!(!allowed.contains(&to));
        }
    }

    #[test]
    fn prop_random_walk_ends_terminal(choices in prop::collection::vec(any::<bool>(), 8)) {
        let mut state = UpgradeState::Draft;
        for fail in choices {
            let options = allowed_transitions(state);
            if options.is_empty() {
                break;
            }
            state = if fail { UpgradeState::Failed } else { options[0] };
        }
        prop_assert!(state.is_terminal());
    }
}

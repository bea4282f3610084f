use utgen_core::state::{allowed_transitions, validate_transition, UnitPhase};
use proptest::prelude::*;

fn any_phase() -> impl Strategy<Value = UnitPhase> {
    prop::sample::select(UnitPhase::ALL.to_vec())
}

#[test]
fn test_generating_transitions() {
    assert!(validate_transition(UnitPhase::Generating, UnitPhase::Fixing).is_ok());
    assert!(validate_transition(UnitPhase::Generating, UnitPhase::Exhausted).is_ok());
    assert!(validate_transition(UnitPhase::Generating, UnitPhase::Failed).is_ok());

    // Invalid
    assert!(validate_transition(UnitPhase::Generating, UnitPhase::Converged).is_err());
    assert!(validate_transition(UnitPhase::Generating, UnitPhase::Refining).is_err());
}

#[test]
fn test_refinement_routes_through_fixing() {
    assert!(validate_transition(UnitPhase::Refining, UnitPhase::Fixing).is_ok());
    assert!(validate_transition(UnitPhase::Refining, UnitPhase::Measuring).is_err());
    assert!(validate_transition(UnitPhase::Refining, UnitPhase::Converged).is_err());
}

#[test]
fn test_only_measuring_converges() {
    for from in UnitPhase::ALL {
        let ok = validate_transition(from, UnitPhase::Converged).is_ok();
        assert_eq!(ok, from == UnitPhase::Measuring, "{from}");
    }
}

proptest! {
    #[test]
    fn prop_all_transitions_are_subset_of_allowed(from in any_phase(), to in any_phase()) {
        let res = validate_transition(from, to);
        let allowed = allowed_transitions(from);
        prop_assert_eq!(res.is_ok(), allowed.contains(&to));
    }

    #[test]
    fn prop_random_walks_only_stop_in_terminal_states(
        choices in prop::collection::vec(any::<prop::sample::Index>(), 64)
    ) {
        let mut phase = UnitPhase::Generating;
        for choice in choices {
            let next = allowed_transitions(phase);
            if next.is_empty() {
                prop_assert!(phase.is_terminal());
                break;
            }
            let to = *choice.get(&next);
            prop_assert!(validate_transition(phase, to).is_ok());
            phase = to;
        }
    }

    #[test]
    fn prop_non_terminal_can_always_stop(from in any_phase()) {
        if !from.is_terminal() {
            let allowed = allowed_transitions(from);
            prop_assert!(allowed.contains(&UnitPhase::Exhausted));
            prop_assert!(allowed.contains(&UnitPhase::Failed));
        }
    }
}

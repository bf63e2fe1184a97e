//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::transition::*;
use super::*;
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_state() -> impl Strategy<Value = TurnState> {
    prop_oneof![Just(TurnState::Idle), Just(TurnState::Talking)]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop::sample::select(Event::ALL.to_vec())
}

fn arb_effect() -> impl Strategy<Value = Effect> {
    prop_oneof![
        Just(Effect::Respond),
        Just(Effect::Retract),
        Just(Effect::Backchannel),
    ]
}

/// A table missing an arbitrary subset of rows
fn arb_sparse_table() -> impl Strategy<Value = TransitionTable> {
    proptest::collection::vec(
        (arb_state(), arb_event(), arb_state(), proptest::option::of(arb_effect())),
        0..10,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .fold(TransitionTable::empty(), |table, (from, event, to, effect)| {
                let table = table.with_transition(from, event, to);
                match effect {
                    Some(effect) => table.with_action(from, event, effect),
                    None => table,
                }
            })
    })
}

/// Mirrors the state loop: stop at the first undefined transition
fn run_events(
    table: &TransitionTable,
    events: &[Event],
) -> (TurnState, Option<TransitionError>) {
    let mut state = TurnState::Idle;
    for &event in events {
        match transition(table, state, event) {
            Ok(result) => state = result.new_state,
            Err(e) => return (state, Some(e)),
        }
    }
    (state, None)
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Invariant 1: the loop's final state is the iterated table lookup
    #[test]
    fn prop_final_state_is_iterated_lookup(
        events in proptest::collection::vec(arb_event(), 0..40)
    ) {
        let table = TransitionTable::turn_taking();
        let expected = events.iter().fold(TurnState::Idle, |state, &event| {
            table.next_state(state, event).unwrap()
        });
        let (state, error) = run_events(&table, &events);
        prop_assert!(error.is_none());
        prop_assert_eq!(state, expected);
    }

    // Invariant 2: an undefined pair halts without touching state
    #[test]
    fn prop_undefined_transition_preserves_state(
        table in arb_sparse_table(),
        events in proptest::collection::vec(arb_event(), 1..20)
    ) {
        let mut state = TurnState::Idle;
        for event in events {
            let defined = table.next_state(state, event);
            match transition(&table, state, event) {
                Ok(result) => {
                    prop_assert_eq!(Some(result.new_state), defined);
                    prop_assert_eq!(result.old_state, state);
                    state = result.new_state;
                }
                Err(TransitionError::Undefined { state: at, event: on }) => {
                    prop_assert!(defined.is_none());
                    prop_assert_eq!(at, state);
                    prop_assert_eq!(on, event);
                    break;
                }
            }
        }
    }

    // Invariant 3: retraction only ever fires when leaving `talking`
    #[test]
    fn prop_retract_only_from_talking(state in arb_state(), event in arb_event()) {
        let result = transition(&TransitionTable::turn_taking(), state, event).unwrap();
        if result.effect == Some(Effect::Retract) {
            prop_assert_eq!(result.old_state, TurnState::Talking);
            prop_assert_eq!(result.new_state, TurnState::Idle);
        }
    }

    // Invariant 4: a response is only generated on entering `talking`
    #[test]
    fn prop_respond_enters_talking(state in arb_state(), event in arb_event()) {
        let result = transition(&TransitionTable::turn_taking(), state, event).unwrap();
        if result.effect == Some(Effect::Respond) {
            prop_assert_eq!(result.old_state, TurnState::Idle);
            prop_assert_eq!(result.new_state, TurnState::Talking);
        }
    }

    // Invariant 5: transitions are deterministic
    #[test]
    fn prop_transition_is_pure(state in arb_state(), event in arb_event()) {
        let table = TransitionTable::turn_taking();
        prop_assert_eq!(transition(&table, state, event), transition(&table, state, event));
    }
}

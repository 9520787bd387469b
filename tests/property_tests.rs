//! Property-based tests for parameter staging and transition resolution.
//!
//! These tests use proptest to verify properties hold across
//! many randomly generated inputs.

use phaseline::builder::{MachineBuilder, StateBuilder, TransitionBuilder};
use phaseline::core::{IntoParams, ParamError, ParameterSlots, Phase, Signature};
use phaseline::engine::StateMachine;
use proptest::prelude::*;
use tokio_util::sync::CancellationToken;

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

/// Machine where "go" out of "A" has one candidate per threshold, in order.
/// Candidate `i` passes when the staged value is at least `thresholds[i]`.
fn threshold_machine(thresholds: &[i64]) -> StateMachine<String, &'static str> {
    let mut a = StateBuilder::new("A".to_string()).params::<(i64,)>();
    for (index, threshold) in thresholds.iter().copied().enumerate() {
        a = a.transition(
            TransitionBuilder::new("go", format!("T{index}"))
                .when_next::<(i64,), _>(move |(value,)| value >= threshold),
        );
    }

    let mut builder = MachineBuilder::new().initial("A".to_string(), (0_i64,)).state(a);
    for index in 0..thresholds.len() {
        builder = builder.state(StateBuilder::new(format!("T{index}")).params::<(i64,)>());
    }
    StateMachine::new(builder.build().unwrap())
}

proptest! {
    #[test]
    fn commit_promotes_staged_values(a in any::<i32>(), b in ".*") {
        let mut slots = ParameterSlots::new();
        slots.set_next((a, b.clone()).into_params());
        slots.commit_transition();

        prop_assert_eq!(slots.get_current::<(i32, String)>().unwrap(), (a, b));
        prop_assert!(slots.next().is_none());
    }

    #[test]
    fn rollback_restores_current(a in any::<u64>(), staged in any::<bool>()) {
        let mut slots = ParameterSlots::new();
        slots.set_next((a,).into_params());
        slots.commit_transition();

        slots.begin_transition();
        slots.set_next((staged,).into_params());
        slots.rollback_transition();

        prop_assert_eq!(slots.get_current::<(u64,)>().unwrap(), (a,));
        prop_assert!(slots.previous().is_none());
        prop_assert!(slots.next().is_none());
    }

    #[test]
    fn reading_past_arity_is_rejected(values in prop::collection::vec(any::<i32>(), 0..3)) {
        let params = match values.as_slice() {
            [] => ().into_params(),
            [a] => (*a,).into_params(),
            [a, b] => (*a, *b).into_params(),
            _ => unreachable!(),
        };

        let result = params.get::<(i32, i32, i32)>();
        prop_assert_eq!(
            result.unwrap_err(),
            ParamError::CountMismatch { expected: 3, actual: values.len() }
        );
    }

    #[test]
    fn signature_accepts_only_its_own_types(a in any::<i32>(), s in ".*") {
        let signature = Signature::of::<(i32, String)>();

        prop_assert!(signature.accepts(&(a, s.clone()).into_params()));
        prop_assert!(!signature.accepts(&(s, a).into_params()));
        prop_assert!(!signature.accepts(&(a,).into_params()));
    }

    #[test]
    fn first_passing_candidate_always_wins(
        thresholds in prop::collection::vec(-50_i64..50, 1..5),
        value in -60_i64..60,
        repeats in 1_usize..4,
    ) {
        let expected = thresholds
            .iter()
            .position(|threshold| value >= *threshold)
            .map(|index| format!("T{index}"));

        for _ in 0..repeats {
            let machine = threshold_machine(&thresholds);
            let token = CancellationToken::new();
            let moved = block_on(async {
                machine.activate(&token).await.unwrap();
                machine.try_transition("go", (value,), &token).await.unwrap()
            });

            prop_assert_eq!(moved, expected.is_some());
            let landed = if moved { machine.current_state() } else { None };
            prop_assert_eq!(landed, expected.clone());
        }
    }

    #[test]
    fn can_transition_never_commits(
        thresholds in prop::collection::vec(-50_i64..50, 1..5),
        value in -60_i64..60,
    ) {
        let machine = threshold_machine(&thresholds);
        let token = CancellationToken::new();
        let possible = block_on(async {
            machine.activate(&token).await.unwrap();
            machine.can_transition("go", (value,), &token).await.unwrap()
        });

        prop_assert_eq!(possible, thresholds.iter().any(|threshold| value >= *threshold));
        prop_assert_eq!(machine.phase(), Phase::Active);
        prop_assert_eq!(machine.current_state(), Some("A".to_string()));
        prop_assert_eq!(machine.current::<(i64,)>().unwrap(), (0,));
        prop_assert!(machine.next_parameters().is_none());
    }
}

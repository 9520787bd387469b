//! Definition checks using Validation.

use crate::core::{describe, StateValue, SymbolValue};
use crate::model::{InitialState, MachineDefinition};
use crate::validation::violations::DefinitionViolation;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

/// Check a definition, accumulating ALL violations.
///
/// Returns `Validation::Success(())` if the definition is sound, or
/// `Validation::Failure` with every violation found.
pub fn validate<S: StateValue, T: SymbolValue>(
    definition: &MachineDefinition<S, T>,
) -> Validation<(), NonEmptyVec<DefinitionViolation>> {
    let mut checks: Vec<Validation<(), NonEmptyVec<DefinitionViolation>>> = Vec::new();

    for (index, state) in definition.states.iter().enumerate() {
        // Report each duplicate once, at its second occurrence
        if definition.states[..index]
            .iter()
            .any(|earlier| earlier.value == state.value)
        {
            checks.push(Validation::fail(DefinitionViolation::DuplicateState {
                state: describe(&state.value),
            }));
        }

        for transition in &state.transitions {
            let check = match definition.state(&transition.to) {
                None => Validation::fail(DefinitionViolation::UnknownTarget {
                    from: describe(&transition.from),
                    symbol: describe(&transition.symbol),
                    to: describe(&transition.to),
                }),
                Some(target) => match &transition.mapping_output {
                    Some(produced) if *produced != target.signature => {
                        Validation::fail(DefinitionViolation::MappingMismatch {
                            from: describe(&transition.from),
                            symbol: describe(&transition.symbol),
                            to: describe(&transition.to),
                            produced: format!("{produced:?}"),
                            expected: format!("{:?}", target.signature),
                        })
                    }
                    _ => Validation::success(()),
                },
            };
            checks.push(check);
        }
    }

    // A provider is only checked when it runs
    if let InitialState::Fixed { state, params } = &definition.initial {
        let check = match definition.state(state) {
            None => Validation::fail(DefinitionViolation::UnknownInitialState {
                state: describe(state),
            }),
            Some(initial) => match initial.signature.check(params) {
                Ok(()) => Validation::success(()),
                Err(error) => Validation::fail(DefinitionViolation::InitialParameters {
                    state: describe(state),
                    reason: error.to_string(),
                }),
            },
        };
        checks.push(check);
    }

    if checks.is_empty() {
        return Validation::success(());
    }

    Validation::all_vec(checks).map(|_| ())
}

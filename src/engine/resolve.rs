//! Transition resolution: pick the first candidate whose guards pass.

use crate::core::{describe, ParameterSlots, Params, StateValue, SymbolValue};
use crate::error::EngineError;
use crate::model::{
    Condition, ConditionContext, MachineDefinition, StateDefinition, TransitionDefinition,
};
use tokio_util::sync::CancellationToken;

/// A transition that passed all of its conditions.
pub(crate) struct Resolution<'a, S, T> {
    pub(crate) transition: &'a TransitionDefinition<S, T>,
    pub(crate) target: &'a StateDefinition<S, T>,
    /// Parameters for the target: mapped, or the caller's staged ones.
    pub(crate) next: Params,
}

pub(crate) struct Resolver<'a, S, T> {
    definition: &'a MachineDefinition<S, T>,
    token: &'a CancellationToken,
}

impl<'a, S: StateValue, T: SymbolValue> Resolver<'a, S, T> {
    pub(crate) fn new(
        definition: &'a MachineDefinition<S, T>,
        token: &'a CancellationToken,
    ) -> Self {
        Self { definition, token }
    }

    /// Resolve `symbol` out of `from` against staged slots.
    ///
    /// `staging` holds the exiting state's parameters in `previous` and the
    /// caller's parameters in `next`. Candidates are tried in configuration
    /// order; for each, previous-side conditions run first, then the mapping
    /// (if any), then next-side conditions. Conditions short-circuit on the
    /// first `false`. A candidate without a mapping is only considered when
    /// the staged parameters fit the target state's signature.
    pub(crate) async fn resolve(
        &self,
        from: &'a StateDefinition<S, T>,
        symbol: &T,
        staging: &ParameterSlots,
    ) -> Result<Option<Resolution<'a, S, T>>, EngineError> {
        let previous = staging.previous().cloned().unwrap_or_default();
        let staged = staging.next().cloned().unwrap_or_default();

        for candidate in from.transitions.iter().filter(|t| t.symbol == *symbol) {
            let target = self
                .definition
                .state(&candidate.to)
                .ok_or_else(|| EngineError::UnknownState {
                    state: describe(&candidate.to),
                })?;

            if candidate.mapping.is_none() && !target.signature.accepts(&staged) {
                tracing::trace!(to = ?candidate.to, "staged parameters do not fit target");
                continue;
            }

            if !self.all(&candidate.previous_conditions, &previous).await? {
                continue;
            }

            let next = match &candidate.mapping {
                Some(mapping) => {
                    let input = previous.clone();
                    let mapped = self
                        .definition
                        .error_handling
                        .run(async move { mapping(input) }, self.token)
                        .await?;
                    target.signature.check(&mapped)?;
                    mapped
                }
                None => staged.clone(),
            };

            if !self.all(&candidate.next_conditions, &next).await? {
                continue;
            }

            return Ok(Some(Resolution {
                transition: candidate,
                target,
                next,
            }));
        }

        Ok(None)
    }

    async fn all(&self, conditions: &[Condition], params: &Params) -> Result<bool, EngineError> {
        for condition in conditions {
            let context = ConditionContext {
                params: params.clone(),
                token: self.token.clone(),
            };
            let passed = self
                .definition
                .error_handling
                .run(condition(context), self.token)
                .await?;
            if !passed {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{MachineBuilder, StateBuilder, TransitionBuilder};
    use crate::core::IntoParams;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn staging(previous: Params, next: Params) -> ParameterSlots {
        let mut slots = ParameterSlots::new();
        slots.set_next(previous);
        slots.commit_transition();
        slots.begin_transition();
        slots.set_next(next);
        slots
    }

    #[tokio::test]
    async fn first_passing_candidate_wins() {
        let definition = MachineBuilder::new()
            .initial("A", (5_i32,))
            .state(
                StateBuilder::new("A")
                    .params::<(i32,)>()
                    .transition(TransitionBuilder::new("go", "B").when::<(i32,), _>(|(x,)| x > 10))
                    .transition(TransitionBuilder::new("go", "C").when::<(i32,), _>(|(x,)| x > 0))
                    .transition(TransitionBuilder::new("go", "D")),
            )
            .state(StateBuilder::new("B"))
            .state(StateBuilder::new("C"))
            .state(StateBuilder::new("D"))
            .build()
            .unwrap();

        let token = CancellationToken::new();
        let resolver = Resolver::new(&definition, &token);
        let from = definition.state(&"A").unwrap();
        let slots = staging((5_i32,).into_params(), Params::empty());

        for _ in 0..3 {
            let resolved = resolver.resolve(from, &"go", &slots).await.unwrap().unwrap();
            assert_eq!(resolved.transition.to(), &"C");
        }
    }

    #[tokio::test]
    async fn conditions_short_circuit() {
        let second_calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&second_calls);

        let definition = MachineBuilder::new()
            .initial("A", ())
            .state(
                StateBuilder::new("A").transition(
                    TransitionBuilder::new("go", "B")
                        .when::<(), _>(|()| false)
                        .when::<(), _>(move |()| {
                            counter.fetch_add(1, Ordering::SeqCst);
                            true
                        }),
                ),
            )
            .state(StateBuilder::new("B"))
            .build()
            .unwrap();

        let token = CancellationToken::new();
        let resolver = Resolver::new(&definition, &token);
        let from = definition.state(&"A").unwrap();
        let slots = staging(Params::empty(), Params::empty());

        assert!(resolver.resolve(from, &"go", &slots).await.unwrap().is_none());
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn next_conditions_see_mapped_parameters() {
        let definition = MachineBuilder::new()
            .initial("A", (42_i32,))
            .state(
                StateBuilder::new("A").params::<(i32,)>().transition(
                    TransitionBuilder::new("go", "B")
                        .map(|(x,): (i32,)| (x.to_string(),))
                        .when_next::<(String,), _>(|(s,)| s == "42"),
                ),
            )
            .state(StateBuilder::new("B").params::<(String,)>())
            .build()
            .unwrap();

        let token = CancellationToken::new();
        let resolver = Resolver::new(&definition, &token);
        let from = definition.state(&"A").unwrap();
        let slots = staging((42_i32,).into_params(), Params::empty());

        let resolved = resolver.resolve(from, &"go", &slots).await.unwrap().unwrap();
        assert_eq!(resolved.next.get::<(String,)>().unwrap().0, "42");
        assert_eq!(resolved.target.value(), &"B");
    }

    #[tokio::test]
    async fn staged_parameters_select_by_signature() {
        let definition = MachineBuilder::new()
            .initial("A", ())
            .state(
                StateBuilder::new("A")
                    .transition(TransitionBuilder::new("go", "Count"))
                    .transition(TransitionBuilder::new("go", "Name")),
            )
            .state(StateBuilder::new("Count").params::<(u32,)>())
            .state(StateBuilder::new("Name").params::<(String,)>())
            .build()
            .unwrap();

        let token = CancellationToken::new();
        let resolver = Resolver::new(&definition, &token);
        let from = definition.state(&"A").unwrap();

        let by_name = staging(Params::empty(), ("x".to_string(),).into_params());
        let resolved = resolver.resolve(from, &"go", &by_name).await.unwrap().unwrap();
        assert_eq!(resolved.transition.to(), &"Name");

        let by_count = staging(Params::empty(), (3_u32,).into_params());
        let resolved = resolver.resolve(from, &"go", &by_count).await.unwrap().unwrap();
        assert_eq!(resolved.transition.to(), &"Count");

        let neither = staging(Params::empty(), (1.5_f32,).into_params());
        assert!(resolver.resolve(from, &"go", &neither).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failing_condition_is_raised() {
        let definition = MachineBuilder::new()
            .initial("A", ())
            .state(StateBuilder::new("A").transition(
                TransitionBuilder::new("go", "B").when_async(|_ctx| async {
                    Err::<bool, _>(anyhow::anyhow!("guard exploded"))
                }),
            ))
            .state(StateBuilder::new("B"))
            .build()
            .unwrap();

        let token = CancellationToken::new();
        let resolver = Resolver::new(&definition, &token);
        let from = definition.state(&"A").unwrap();
        let slots = staging(Params::empty(), Params::empty());

        let err = resolver.resolve(from, &"go", &slots).await.err().unwrap();
        assert_eq!(err.to_string(), "guard exploded");
    }
}

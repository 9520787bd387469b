//! Builder for constructing transitions.

use crate::core::{FromParams, ParamTuple, Params, Signature, StateValue, SymbolValue};
use crate::model::{BoxFuture, Condition, ConditionContext, Mapping, TransitionDefinition};
use std::future::Future;
use std::sync::Arc;

/// Builder for one outgoing transition of a state.
///
/// Conditions are evaluated in the order they are added. Previous-side
/// conditions (`when*`) see the exiting state's parameters; next-side
/// conditions (`when_next*`) see the parameters the target will receive.
pub struct TransitionBuilder<S, T> {
    symbol: T,
    to: S,
    previous_conditions: Vec<Condition>,
    next_conditions: Vec<Condition>,
    mapping: Option<(Mapping, Signature)>,
}

impl<S: StateValue, T: SymbolValue> TransitionBuilder<S, T> {
    /// Create a transition fired by `symbol` that enters `to`.
    pub fn new(symbol: T, to: S) -> Self {
        Self {
            symbol,
            to,
            previous_conditions: Vec::new(),
            next_conditions: Vec::new(),
            mapping: None,
        }
    }

    /// Add a previous-side condition over typed parameters.
    pub fn when<P, F>(mut self, predicate: F) -> Self
    where
        P: FromParams + 'static,
        F: Fn(P) -> bool + Send + Sync + 'static,
    {
        self.previous_conditions.push(sync_condition(predicate));
        self
    }

    /// Add an async previous-side condition.
    pub fn when_async<F, Fut>(mut self, condition: F) -> Self
    where
        F: Fn(ConditionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
    {
        self.previous_conditions.push(async_condition(condition));
        self
    }

    /// Add a next-side condition over typed parameters.
    pub fn when_next<P, F>(mut self, predicate: F) -> Self
    where
        P: FromParams + 'static,
        F: Fn(P) -> bool + Send + Sync + 'static,
    {
        self.next_conditions.push(sync_condition(predicate));
        self
    }

    /// Add an async next-side condition.
    pub fn when_next_async<F, Fut>(mut self, condition: F) -> Self
    where
        F: Fn(ConditionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
    {
        self.next_conditions.push(async_condition(condition));
        self
    }

    /// Map the exiting state's parameters to the target's parameters.
    ///
    /// A mapped transition ignores parameters the caller stages.
    pub fn map<P, Q, F>(self, mapping: F) -> Self
    where
        P: ParamTuple,
        Q: ParamTuple,
        F: Fn(P) -> Q + Send + Sync + 'static,
    {
        self.try_map(move |input: P| Ok(mapping(input)))
    }

    /// Like [`map`](Self::map) with a fallible mapping.
    pub fn try_map<P, Q, F>(mut self, mapping: F) -> Self
    where
        P: ParamTuple,
        Q: ParamTuple,
        F: Fn(P) -> anyhow::Result<Q> + Send + Sync + 'static,
    {
        let erased: Mapping = Arc::new(move |params: Params| -> anyhow::Result<Params> {
            let input = params.get::<P>()?;
            Ok(mapping(input)?.into_params())
        });
        self.mapping = Some((erased, Signature::of::<Q>()));
        self
    }

    pub(crate) fn build(self, from: S) -> TransitionDefinition<S, T> {
        let (mapping, mapping_output) = match self.mapping {
            Some((mapping, output)) => (Some(mapping), Some(output)),
            None => (None, None),
        };
        TransitionDefinition {
            from,
            symbol: self.symbol,
            to: self.to,
            previous_conditions: self.previous_conditions,
            next_conditions: self.next_conditions,
            mapping,
            mapping_output,
        }
    }
}

fn sync_condition<P, F>(predicate: F) -> Condition
where
    P: FromParams + 'static,
    F: Fn(P) -> bool + Send + Sync + 'static,
{
    Arc::new(
        move |context: ConditionContext| -> BoxFuture<'static, anyhow::Result<bool>> {
            let outcome = context
                .params
                .get::<P>()
                .map(&predicate)
                .map_err(anyhow::Error::from);
            Box::pin(std::future::ready(outcome))
        },
    )
}

fn async_condition<F, Fut>(condition: F) -> Condition
where
    F: Fn(ConditionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
{
    Arc::new(
        move |context: ConditionContext| -> BoxFuture<'static, anyhow::Result<bool>> {
            Box::pin(condition(context))
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::IntoParams;
    use tokio_util::sync::CancellationToken;

    fn context(params: Params) -> ConditionContext {
        ConditionContext {
            params,
            token: CancellationToken::new(),
        }
    }

    #[test]
    fn transition_builds_with_defaults() {
        let transition = TransitionBuilder::new("go", "B").build("A");

        assert_eq!(transition.from(), &"A");
        assert_eq!(transition.symbol(), &"go");
        assert_eq!(transition.to(), &"B");
        assert!(!transition.has_mapping());
        assert_eq!(transition.previous_condition_count(), 0);
        assert_eq!(transition.next_condition_count(), 0);
    }

    #[test]
    fn conditions_are_kept_per_side() {
        let transition = TransitionBuilder::new("go", "B")
            .when::<(), _>(|()| true)
            .when::<(), _>(|()| true)
            .when_next::<(), _>(|()| true)
            .build("A");

        assert_eq!(transition.previous_condition_count(), 2);
        assert_eq!(transition.next_condition_count(), 1);
    }

    #[tokio::test]
    async fn typed_condition_reads_parameters() {
        let transition = TransitionBuilder::new("go", "B")
            .when::<(i32,), _>(|(x,)| x > 10)
            .build("A");
        let condition = &transition.previous_conditions[0];

        assert!(condition(context((11_i32,).into_params())).await.unwrap());
        assert!(!condition(context((9_i32,).into_params())).await.unwrap());
    }

    #[tokio::test]
    async fn typed_condition_fails_on_wrong_parameters() {
        let transition = TransitionBuilder::new("go", "B")
            .when::<(i32,), _>(|(x,)| x > 10)
            .build("A");
        let condition = &transition.previous_conditions[0];

        let err = condition(context(("x".to_string(),).into_params()))
            .await
            .unwrap_err();
        assert!(err.is::<crate::core::ParamError>());
    }

    #[test]
    fn map_records_output_signature() {
        let transition = TransitionBuilder::new("go", "B")
            .map(|(x,): (i32,)| (x.to_string(), x))
            .build("A");

        assert!(transition.has_mapping());
        assert_eq!(
            transition.mapping_output(),
            Some(&Signature::of::<(String, i32)>())
        );

        let mapping = transition.mapping.as_ref().unwrap();
        let mapped = mapping((42_i32,).into_params()).unwrap();
        assert_eq!(mapped.get::<(String, i32)>().unwrap(), ("42".to_string(), 42));
    }

    #[test]
    fn try_map_surfaces_errors() {
        let transition = TransitionBuilder::new("go", "B")
            .try_map(|(x,): (i32,)| {
                if x < 0 {
                    anyhow::bail!("negative input");
                }
                Ok((x as u32,))
            })
            .build("A");

        let mapping = transition.mapping.as_ref().unwrap();
        assert!(mapping((-1_i32,).into_params()).is_err());
        assert_eq!(
            mapping((3_i32,).into_params()).unwrap().get::<(u32,)>().unwrap(),
            (3,)
        );
    }
}

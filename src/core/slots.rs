//! Previous/current/next parameter staging with commit and rollback.

use super::params::{FromParams, ParamError, Params};

/// The three parameter slots of a machine.
///
/// `current` holds the parameters of the state the machine is in. A
/// transition moves them to `previous` ([`begin_transition`]), stages the
/// target's parameters in `next`, and then either promotes `next`
/// ([`commit_transition`]) or restores `previous` ([`rollback_transition`]).
///
/// [`begin_transition`]: ParameterSlots::begin_transition
/// [`commit_transition`]: ParameterSlots::commit_transition
/// [`rollback_transition`]: ParameterSlots::rollback_transition
///
/// # Example
///
/// ```rust
/// use phaseline::core::{IntoParams, ParameterSlots};
///
/// let mut slots = ParameterSlots::new();
/// slots.set_next((1_i32,).into_params());
/// slots.commit_transition();
/// assert_eq!(slots.get_current::<(i32,)>().unwrap(), (1,));
///
/// slots.begin_transition();
/// slots.set_next(("two".to_string(),).into_params());
/// slots.rollback_transition();
/// assert_eq!(slots.get_current::<(i32,)>().unwrap(), (1,));
/// assert!(slots.next().is_none());
/// ```
#[derive(Clone, Debug, Default)]
pub struct ParameterSlots {
    previous: Option<Params>,
    current: Option<Params>,
    next: Option<Params>,
}

impl ParameterSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slots mid-transition: `previous` set, `current` empty.
    pub fn transitioning(previous: Params, next: Option<Params>) -> Self {
        Self {
            previous: Some(previous),
            current: None,
            next,
        }
    }

    pub fn set_next(&mut self, params: Params) {
        self.next = Some(params);
    }

    pub fn set_next_empty(&mut self) {
        self.next = Some(Params::empty());
    }

    pub fn get_next<P: FromParams>(&self) -> Result<P, ParamError> {
        read(&self.next)
    }

    pub fn get_previous<P: FromParams>(&self) -> Result<P, ParamError> {
        read(&self.previous)
    }

    pub fn get_current<P: FromParams>(&self) -> Result<P, ParamError> {
        read(&self.current)
    }

    pub fn previous(&self) -> Option<&Params> {
        self.previous.as_ref()
    }

    pub fn current(&self) -> Option<&Params> {
        self.current.as_ref()
    }

    pub fn next(&self) -> Option<&Params> {
        self.next.as_ref()
    }

    /// Move `current` into `previous`.
    pub fn begin_transition(&mut self) {
        self.previous = self.current.take();
    }

    /// Promote `next` to `current` and drop `previous`.
    pub fn commit_transition(&mut self) {
        self.current = self.next.take();
        self.previous = None;
    }

    /// Restore `current` from `previous` and drop `next`.
    pub fn rollback_transition(&mut self) {
        self.current = self.previous.take();
        self.next = None;
    }

    pub fn clear(&mut self) {
        self.previous = None;
        self.current = None;
        self.next = None;
    }
}

fn read<P: FromParams>(slot: &Option<Params>) -> Result<P, ParamError> {
    slot.as_ref().ok_or(ParamError::NotSet)?.get()
}

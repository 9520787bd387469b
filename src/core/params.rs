//! Typed heterogeneous parameter tuples.
//!
//! A state declares between zero and [`MAX_ARITY`] parameters. Values are
//! stored type-erased next to the [`ParamType`] they were staged with, and
//! every read goes through a checked downcast that reports a [`ParamError`]
//! instead of panicking.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Largest number of parameters a state may carry.
pub const MAX_ARITY: usize = 4;

/// Errors raised when reading or staging parameters.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParamError {
    #[error("parameters are not set")]
    NotSet,

    #[error("expected {expected} parameters but {actual} are staged")]
    CountMismatch { expected: usize, actual: usize },

    #[error("parameter {index} has type {actual}, requested {expected}")]
    TypeMismatch {
        index: usize,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("at most 4 parameters are supported, got {count}")]
    TooMany { count: usize },
}

/// Static type descriptor recorded alongside each staged value.
#[derive(Clone, Copy)]
pub struct ParamType {
    id: TypeId,
    name: &'static str,
}

impl ParamType {
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is<T: Any>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for ParamType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ParamType {}

impl fmt::Debug for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A single type-erased parameter value.
///
/// Values are reference counted, so cloning a `Param` (and therefore moving
/// tuples between slots) never clones the underlying value.
#[derive(Clone)]
pub struct Param {
    value: Arc<dyn Any + Send + Sync>,
    ty: ParamType,
}

impl Param {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            ty: ParamType::of::<T>(),
        }
    }

    pub fn param_type(&self) -> ParamType {
        self.ty
    }

    /// Clone the value out if it was staged as a `T`.
    pub fn downcast<T: Any + Clone>(&self) -> Option<T> {
        self.value.downcast_ref::<T>().cloned()
    }
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Param<{}>", self.ty.name)
    }
}

/// An ordered tuple of zero to four parameters.
///
/// Nullable parameters are expressed as `Option<T>`: a staged `None` reads
/// back as `None`, the type's default, rather than as an error.
///
/// # Example
///
/// ```rust
/// use phaseline::core::{IntoParams, ParamError, Params};
///
/// let params = (42_i32, "ready".to_string()).into_params();
/// assert_eq!(params.arity(), 2);
///
/// let (count,): (i32,) = params.get().unwrap();
/// assert_eq!(count, 42);
///
/// let wrong = params.get::<(String,)>();
/// assert!(matches!(wrong, Err(ParamError::TypeMismatch { index: 0, .. })));
/// ```
#[derive(Clone, Default)]
pub struct Params {
    values: Vec<Param>,
}

impl Params {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_values(values: Vec<Param>) -> Result<Self, ParamError> {
        if values.len() > MAX_ARITY {
            return Err(ParamError::TooMany {
                count: values.len(),
            });
        }
        Ok(Self { values })
    }

    pub fn arity(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn signature(&self) -> Signature {
        Signature {
            types: self.values.iter().map(Param::param_type).collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.values.iter()
    }

    /// Read the value at `index` as a `T`.
    pub fn value<T: Any + Clone>(&self, index: usize) -> Result<T, ParamError> {
        let param = self.values.get(index).ok_or(ParamError::CountMismatch {
            expected: index + 1,
            actual: self.values.len(),
        })?;
        param.downcast::<T>().ok_or(ParamError::TypeMismatch {
            index,
            expected: std::any::type_name::<T>(),
            actual: param.ty.name,
        })
    }

    /// Read a leading tuple of values.
    ///
    /// Requesting fewer values than are staged reads a prefix; requesting
    /// more fails with [`ParamError::CountMismatch`].
    pub fn get<P: FromParams>(&self) -> Result<P, ParamError> {
        P::from_params(self)
    }

    fn ensure_arity(&self, requested: usize) -> Result<(), ParamError> {
        if requested > self.values.len() {
            return Err(ParamError::CountMismatch {
                expected: requested,
                actual: self.values.len(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.values.iter().map(|p| p.ty))
            .finish()
    }
}

/// The declared parameter types of a state.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Signature {
    types: Vec<ParamType>,
}

impl Signature {
    pub fn of<P: ParamTuple>() -> Self {
        P::signature()
    }

    pub fn arity(&self) -> usize {
        self.types.len()
    }

    pub fn types(&self) -> &[ParamType] {
        &self.types
    }

    /// Check that `params` has exactly this arity and these types.
    pub fn check(&self, params: &Params) -> Result<(), ParamError> {
        if params.arity() != self.arity() {
            return Err(ParamError::CountMismatch {
                expected: self.arity(),
                actual: params.arity(),
            });
        }
        for (index, (declared, staged)) in self.types.iter().zip(params.iter()).enumerate() {
            if *declared != staged.ty {
                return Err(ParamError::TypeMismatch {
                    index,
                    expected: declared.name,
                    actual: staged.ty.name,
                });
            }
        }
        Ok(())
    }

    pub fn accepts(&self, params: &Params) -> bool {
        self.check(params).is_ok()
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tuple = f.debug_tuple("");
        for ty in &self.types {
            tuple.field(ty);
        }
        tuple.finish()
    }
}

/// Conversion of a Rust tuple into staged parameters.
pub trait IntoParams {
    fn into_params(self) -> Params;
}

/// Checked extraction of a Rust tuple from staged parameters.
pub trait FromParams: Sized {
    fn from_params(params: &Params) -> Result<Self, ParamError>;
}

/// A tuple type usable as a state's declared parameter list.
pub trait ParamTuple: IntoParams + FromParams + Send + 'static {
    fn signature() -> Signature;
}

impl IntoParams for Params {
    fn into_params(self) -> Params {
        self
    }
}

impl IntoParams for () {
    fn into_params(self) -> Params {
        Params::empty()
    }
}

impl FromParams for () {
    fn from_params(_params: &Params) -> Result<Self, ParamError> {
        Ok(())
    }
}

impl ParamTuple for () {
    fn signature() -> Signature {
        Signature::default()
    }
}

macro_rules! param_tuple {
    ($arity:expr; $($name:ident => $index:tt),+) => {
        impl<$($name),+> IntoParams for ($($name,)+)
        where
            $($name: Any + Send + Sync),+
        {
            fn into_params(self) -> Params {
                Params {
                    values: vec![$(Param::new(self.$index)),+],
                }
            }
        }

        impl<$($name),+> FromParams for ($($name,)+)
        where
            $($name: Any + Clone),+
        {
            fn from_params(params: &Params) -> Result<Self, ParamError> {
                params.ensure_arity($arity)?;
                Ok(($(params.value::<$name>($index)?,)+))
            }
        }

        impl<$($name),+> ParamTuple for ($($name,)+)
        where
            $($name: Any + Clone + Send + Sync),+
        {
            fn signature() -> Signature {
                Signature {
                    types: vec![$(ParamType::of::<$name>()),+],
                }
            }
        }
    };
}

param_tuple!(1; A => 0);
param_tuple!(2; A => 0, B => 1);
param_tuple!(3; A => 0, B => 1, C => 2);
param_tuple!(4; A => 0, B => 1, C => 2, D => 3);

//! Fallible outcome type
//!
//! [`Outcome`] is returned by every public operation that can fail. It is a
//! thin newtype over [`core::result::Result`] that adds in-place
//! re-assignment, tag-only comparison with `bool` and panicking accessors
//! for code that has already checked the tag.

use core::fmt;

use crate::error::OsError;

/// Either a success value `T` or a failure value `E`, never both.
///
/// `Outcome<(), E>` carries no success payload.
#[must_use = "this `Outcome` may be an error, which should be handled"]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Outcome<T, E = OsError>(core::result::Result<T, E>);

impl<T, E> Outcome<T, E> {
    /// A success outcome holding `value`
    #[inline]
    pub const fn ok(value: T) -> Self {
        Outcome(Ok(value))
    }

    /// A failure outcome holding `error`
    #[inline]
    pub const fn err(error: E) -> Self {
        Outcome(Err(error))
    }

    /// Replace the current payload with a success value.
    ///
    /// The previous payload is dropped before `value` is installed.
    #[inline]
    pub fn assign_value(&mut self, value: T) {
        self.0 = Ok(value);
    }

    /// Replace the current payload with a failure value.
    #[inline]
    pub fn assign_error(&mut self, error: E) {
        self.0 = Err(error);
    }

    /// True if a success value is held
    #[inline]
    pub const fn has_value(&self) -> bool {
        self.0.is_ok()
    }

    /// True if a failure value is held
    #[inline]
    pub const fn is_err(&self) -> bool {
        self.0.is_err()
    }

    /// The success value.
    ///
    /// # Panics
    /// Panics if this outcome holds an error.
    #[track_caller]
    pub fn value(&self) -> &T {
        match &self.0 {
            Ok(v) => v,
            Err(_) => panic!("Outcome::value() called on an error outcome"),
        }
    }

    /// Mutable access to the success value.
    ///
    /// # Panics
    /// Panics if this outcome holds an error.
    #[track_caller]
    pub fn value_mut(&mut self) -> &mut T {
        match &mut self.0 {
            Ok(v) => v,
            Err(_) => panic!("Outcome::value_mut() called on an error outcome"),
        }
    }

    /// Consume the outcome and return the success value.
    ///
    /// # Panics
    /// Panics if this outcome holds an error.
    #[track_caller]
    pub fn into_value(self) -> T {
        match self.0 {
            Ok(v) => v,
            Err(_) => panic!("Outcome::into_value() called on an error outcome"),
        }
    }

    /// The failure value.
    ///
    /// # Panics
    /// Panics if this outcome holds a success value.
    #[track_caller]
    pub fn error(&self) -> &E {
        match &self.0 {
            Err(e) => e,
            Ok(_) => panic!("Outcome::error() called on a success outcome"),
        }
    }

    /// Consume the outcome and return the failure value.
    ///
    /// # Panics
    /// Panics if this outcome holds a success value.
    #[track_caller]
    pub fn into_error(self) -> E {
        match self.0 {
            Err(e) => e,
            Ok(_) => panic!("Outcome::into_error() called on a success outcome"),
        }
    }

    /// Success value, if any
    #[inline]
    pub fn ok_value(self) -> Option<T> {
        self.0.ok()
    }

    /// Failure value, if any
    #[inline]
    pub fn err_value(self) -> Option<E> {
        self.0.err()
    }

    #[inline]
    pub fn as_result(&self) -> core::result::Result<&T, &E> {
        self.0.as_ref()
    }

    #[inline]
    pub fn into_result(self) -> core::result::Result<T, E> {
        self.0
    }

    #[inline]
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U, E> {
        Outcome(self.0.map(f))
    }

    #[inline]
    pub fn map_err<G, F: FnOnce(E) -> G>(self, f: F) -> Outcome<T, G> {
        Outcome(self.0.map_err(f))
    }

    #[inline]
    pub fn and_then<U, F: FnOnce(T) -> Outcome<U, E>>(self, f: F) -> Outcome<U, E> {
        match self.0 {
            Ok(v) => f(v),
            Err(e) => Outcome(Err(e)),
        }
    }

    #[inline]
    pub fn unwrap_or(self, default: T) -> T {
        self.0.unwrap_or(default)
    }
}

impl<E> Outcome<(), E> {
    /// The payload-less success outcome
    #[inline]
    pub const fn success() -> Self {
        Outcome(Ok(()))
    }
}

impl<T, E: Default> Default for Outcome<T, E> {
    /// A failure outcome holding `E::default()`
    fn default() -> Self {
        Outcome(Err(E::default()))
    }
}

impl<T, E> From<core::result::Result<T, E>> for Outcome<T, E> {
    #[inline]
    fn from(r: core::result::Result<T, E>) -> Self {
        Outcome(r)
    }
}

impl<T, E> From<Outcome<T, E>> for core::result::Result<T, E> {
    #[inline]
    fn from(o: Outcome<T, E>) -> Self {
        o.0
    }
}

impl<T, E> PartialEq<bool> for Outcome<T, E> {
    /// Compares the tag only
    #[inline]
    fn eq(&self, other: &bool) -> bool {
        self.has_value() == *other
    }
}

impl<T, E> PartialEq<Outcome<T, E>> for bool {
    #[inline]
    fn eq(&self, other: &Outcome<T, E>) -> bool {
        other.has_value() == *self
    }
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for Outcome<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Ok(v) => f.debug_tuple("Value").field(v).finish(),
            Err(e) => f.debug_tuple("Error").field(e).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_error_with_default_payload() {
        let r: Outcome<u32> = Outcome::default();
        assert!(!r.has_value());
        assert_eq!(*r.error(), OsError::Inval);
    }

    #[test]
    fn void_outcome_has_no_payload() {
        assert_eq!(core::mem::size_of::<Outcome<(), ()>>(), core::mem::size_of::<bool>());
    }
}

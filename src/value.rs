use super::{errors::PoolError, result::TaskResult};
use std::{any::Any, fmt};

const EMPTY: &str = "<empty>";

/// Holds a value of any `Send` type, recovered later with a checked downcast.
///
/// This is the result type of the closed [`Task`](crate::task::Task) style,
/// where the pool cannot know the result type at submission time.
pub struct AnyValue {
    value: Option<Box<dyn Any + Send>>,
    type_name: &'static str,
}

impl AnyValue {
    pub fn new<T: Send + 'static>(value: T) -> Self {
        Self {
            value: Some(Box::new(value)),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn empty() -> Self {
        Self {
            value: None,
            type_name: EMPTY,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    #[inline]
    pub fn is<T: 'static>(&self) -> bool {
        self.value.as_ref().is_some_and(|v| v.is::<T>())
    }

    /// Name of the stored type, as reported by `std::any::type_name` when stored.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.value.as_ref().and_then(|v| v.downcast_ref::<T>())
    }

    /// Moves the stored value out.
    ///
    /// Asking for a type other than the one stored is a caller bug and is
    /// reported as [`PoolError::TypeMismatch`]; nothing is ever coerced.
    pub fn downcast<T: 'static>(self) -> TaskResult<T> {
        let found = self.type_name;
        let mismatch = || PoolError::TypeMismatch {
            expected: std::any::type_name::<T>(),
            found,
        };
        match self.value {
            Some(boxed) => boxed.downcast::<T>().map(|v| *v).map_err(|_| mismatch()),
            None => Err(mismatch()),
        }
    }
}

impl Default for AnyValue {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for AnyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyValue")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downcast_to_stored_type() {
        let value = AnyValue::new(42u64);
        assert!(value.is::<u64>());
        assert_eq!(value.downcast_ref::<u64>(), Some(&42));
        assert_eq!(value.downcast::<u64>(), Ok(42));
    }

    #[test]
    fn downcast_to_other_type_fails_loudly() {
        let value = AnyValue::new(String::from("hello"));
        let err = value.downcast::<i32>().unwrap_err();
        assert_eq!(
            err,
            PoolError::TypeMismatch {
                expected: "i32",
                found: std::any::type_name::<String>(),
            }
        );
    }

    #[test]
    fn empty_value_never_downcasts() {
        let value = AnyValue::default();
        assert!(value.is_empty());
        assert!(!value.is::<()>());
        assert!(matches!(
            value.downcast::<()>(),
            Err(PoolError::TypeMismatch { found: EMPTY, .. })
        ));
    }
}

//! Per-execution argument binding.

use std::sync::Arc;

use crate::error::BindingError;
use crate::types::{AnyType, BindArg, ToSqlValue};

/// One slot per placeholder of a statement seed, all initially unbound.
///
/// Values are validated and encoded through the slot's persistent type as
/// they are set, so a bad value is reported at the `set` call.
#[derive(Debug)]
pub struct ArgBindings {
    types: Vec<Arc<dyn AnyType>>,
    slots: Vec<Option<BindArg>>,
}

impl ArgBindings {
    pub(crate) fn new(types: Vec<Arc<dyn AnyType>>) -> Self {
        let slots = vec![None; types.len()];
        Self { types, slots }
    }

    /// Number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the statement has no placeholders.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn check_index(&self, index: usize) -> Result<(), BindingError> {
        if index < self.slots.len() {
            Ok(())
        } else {
            Err(BindingError::IndexOutOfRange {
                index,
                count: self.slots.len(),
            })
        }
    }

    /// Binds the zero-based placeholder `index`.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::IndexOutOfRange`] for an index outside the
    /// statement, or [`BindingError::InvalidValue`] when the slot's type
    /// rejects the value.
    pub fn set(&mut self, index: usize, value: impl ToSqlValue) -> Result<&mut Self, BindingError> {
        self.check_index(index)?;
        let arg = self.types[index]
            .bind(value.to_sql_value())
            .map_err(|source| BindingError::InvalidValue { index, source })?;
        self.slots[index] = Some(arg);
        Ok(self)
    }

    /// Binds NULL to a nullable slot.
    ///
    /// # Errors
    ///
    /// Same as [`set`](Self::set).
    pub fn set_null(&mut self, index: usize) -> Result<&mut Self, BindingError> {
        self.set(index, crate::types::SqlValue::Null)
    }

    /// Whether `index` has been bound.
    #[must_use]
    pub fn is_bound(&self, index: usize) -> bool {
        self.slots.get(index).is_some_and(Option::is_some)
    }

    /// Unbinds every slot so the binder can be reused.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
    }

    /// The encoded arguments, in placeholder order.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::UnboundArgument`] for the first slot that was
    /// never bound.
    pub fn arguments(&self) -> Result<Vec<BindArg>, BindingError> {
        self.slots
            .iter()
            .enumerate()
            .map(|(index, slot)| slot.clone().ok_or(BindingError::UnboundArgument { index }))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TypeError;
    use crate::types::{LongType, Nullable, StorageClass, TextType, TypeRef};

    fn bindings() -> ArgBindings {
        ArgBindings::new(vec![
            TypeRef::new(TextType).erased().clone(),
            TypeRef::new(Nullable::new(LongType)).erased().clone(),
        ])
    }

    #[test]
    fn test_set_encodes_through_slot_type() {
        let mut args = bindings();
        args.set(0, "Tom Waits").unwrap().set(1, 7_i64).unwrap();
        assert_eq!(
            args.arguments().unwrap(),
            vec![
                BindArg::Text(String::from("Tom Waits")),
                BindArg::Text(String::from("7")),
            ]
        );
    }

    #[test]
    fn test_set_rejects_out_of_range() {
        let mut args = bindings();
        assert_eq!(
            args.set(2, 1_i64).unwrap_err(),
            BindingError::IndexOutOfRange { index: 2, count: 2 }
        );
    }

    #[test]
    fn test_set_rejects_wrong_type() {
        let mut args = bindings();
        let err = args.set(1, "seven").unwrap_err();
        assert_eq!(
            err,
            BindingError::InvalidValue {
                index: 1,
                source: TypeError::TypeMismatch {
                    expected: StorageClass::Integer,
                    found: StorageClass::Text,
                },
            }
        );
        assert!(!args.is_bound(1));
    }

    #[test]
    fn test_unbound_and_null() {
        let mut args = bindings();
        args.set(0, "x").unwrap();
        assert_eq!(
            args.arguments().unwrap_err(),
            BindingError::UnboundArgument { index: 1 }
        );
        args.set_null(1).unwrap();
        assert_eq!(args.arguments().unwrap()[1], BindArg::Null);
        assert!(matches!(
            args.set_null(0),
            Err(BindingError::InvalidValue { index: 0, .. })
        ));
        args.clear();
        assert!(!args.is_bound(0));
    }
}

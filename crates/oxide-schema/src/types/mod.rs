//! Persistent types: codecs between Rust values and SQLite storage.
//!
//! A [`PersistentType`] converts a Rust value into a [`BindArg`] and reads it
//! back from a [`ValueRef`]. Each codec reports exactly one
//! [`StorageClass`], which is also the type declared in DDL.
//!
//! Columns and expressions hold codecs through a [`TypeRef`], which keeps
//! both the typed codec and a type-erased [`AnyType`] view used by bind
//! slots and result mapping.

mod codecs;
mod temporal;
mod value;

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

pub use codecs::{
    BlobType, BoolType, EnumType, IntegerType, LongType, Nullable, RealType, SqlEnum, TextType,
};
pub use temporal::{DateTimeType, DateType};
pub use value::{BindArg, SqlValue, ToSqlValue, Value, ValueRef};

/// SQLite storage classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageClass {
    /// NULL (only ever reported by rows, never declared).
    Null,
    /// Signed integer.
    Integer,
    /// 8-byte float.
    Real,
    /// UTF-8 text.
    Text,
    /// Raw bytes.
    Blob,
}

impl StorageClass {
    /// Returns the SQL type name used in DDL.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Text => "TEXT",
            Self::Blob => "BLOB",
        }
    }
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Rust types that can be carried by a persistent type.
pub trait ValueType: Clone + fmt::Debug + Send + Sync + 'static {}

impl<T: Clone + fmt::Debug + Send + Sync + 'static> ValueType for T {}

/// Storage metadata shared by every codec.
pub trait SqlType: fmt::Debug + Send + Sync + 'static {
    /// The declared storage class.
    fn storage_class(&self) -> StorageClass;

    /// Whether the codec accepts NULL.
    fn nullable(&self) -> bool {
        false
    }

    /// Whether the declared type is `INTEGER`, which makes a single-column
    /// primary key an alias of the ROWID.
    fn is_integer_type(&self) -> bool {
        self.storage_class() == StorageClass::Integer
    }
}

/// A codec between a Rust value and its SQLite representation.
///
/// Implementations must satisfy the round-trip law: reading back the value
/// produced by [`to_bind_arg`](Self::to_bind_arg) yields the original value.
pub trait PersistentType: SqlType {
    /// The Rust value handled by this codec.
    type Value: ValueType;

    /// Encodes a value for binding.
    fn to_bind_arg(&self, value: &Self::Value) -> BindArg;

    /// Decodes a value read from a row.
    ///
    /// # Errors
    ///
    /// Returns [`TypeError::TypeMismatch`] when the stored storage class does
    /// not match, and [`TypeError::UnexpectedNull`] for NULL in a
    /// non-nullable codec.
    fn from_column(&self, value: ValueRef<'_>) -> Result<Self::Value, TypeError>;

    /// Converts a caller-supplied bind value.
    ///
    /// # Errors
    ///
    /// Returns a [`TypeError`] when the value does not fit the codec.
    fn from_sql_value(&self, value: SqlValue) -> Result<Self::Value, TypeError>;

    /// Renders the value as an SQL literal, using the same encoding as
    /// binding.
    fn literal(&self, value: &Self::Value) -> String {
        render_literal(self.storage_class(), &self.to_bind_arg(value))
    }
}

/// Type-erased view of a codec, used where values are not statically typed.
pub trait AnyType: fmt::Debug + Send + Sync {
    /// Storage metadata of the codec.
    fn info(&self) -> &dyn SqlType;

    /// Validates and encodes a caller-supplied bind value.
    ///
    /// # Errors
    ///
    /// Returns a [`TypeError`] when the value does not fit the codec.
    fn bind(&self, value: SqlValue) -> Result<BindArg, TypeError>;

    /// Identifies the concrete codec, for column equality.
    fn codec_id(&self) -> TypeId;
}

impl<P: PersistentType> AnyType for P {
    fn info(&self) -> &dyn SqlType {
        self
    }

    fn bind(&self, value: SqlValue) -> Result<BindArg, TypeError> {
        let value = self.from_sql_value(value)?;
        Ok(self.to_bind_arg(&value))
    }

    fn codec_id(&self) -> TypeId {
        TypeId::of::<P>()
    }
}

/// Shared handle to a codec for values of type `T`.
pub struct TypeRef<T> {
    codec: Arc<dyn PersistentType<Value = T>>,
    erased: Arc<dyn AnyType>,
}

impl<T: ValueType> TypeRef<T> {
    /// Wraps a codec.
    #[must_use]
    pub fn new<P: PersistentType<Value = T>>(codec: P) -> Self {
        let codec = Arc::new(codec);
        Self {
            codec: codec.clone(),
            erased: codec,
        }
    }

    /// The typed codec.
    #[must_use]
    pub fn codec(&self) -> &dyn PersistentType<Value = T> {
        &*self.codec
    }

    /// The type-erased codec.
    #[must_use]
    pub fn erased(&self) -> &Arc<dyn AnyType> {
        &self.erased
    }

    /// Wraps this codec so that it also accepts NULL.
    #[must_use]
    pub fn to_nullable(&self) -> TypeRef<Option<T>> {
        TypeRef::new(Nullable::new(self.clone()))
    }
}

impl<T> Clone for TypeRef<T> {
    fn clone(&self) -> Self {
        Self {
            codec: Arc::clone(&self.codec),
            erased: Arc::clone(&self.erased),
        }
    }
}

impl<T> fmt::Debug for TypeRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeRef").field(&self.codec).finish()
    }
}

impl<T: ValueType> SqlType for TypeRef<T> {
    fn storage_class(&self) -> StorageClass {
        self.codec.storage_class()
    }

    fn nullable(&self) -> bool {
        self.codec.nullable()
    }

    fn is_integer_type(&self) -> bool {
        self.codec.is_integer_type()
    }
}

impl<T: ValueType> PersistentType for TypeRef<T> {
    type Value = T;

    fn to_bind_arg(&self, value: &T) -> BindArg {
        self.codec.to_bind_arg(value)
    }

    fn from_column(&self, value: ValueRef<'_>) -> Result<T, TypeError> {
        self.codec.from_column(value)
    }

    fn from_sql_value(&self, value: SqlValue) -> Result<T, TypeError> {
        self.codec.from_sql_value(value)
    }

    fn literal(&self, value: &T) -> String {
        self.codec.literal(value)
    }
}

/// Rust types with a default codec.
pub trait HasPersistentType: ValueType + Sized {
    /// The default codec for this type.
    type Codec: PersistentType<Value = Self> + Default;

    /// Returns a handle to the default codec.
    #[must_use]
    fn persistent_type() -> TypeRef<Self> {
        TypeRef::new(Self::Codec::default())
    }
}

impl HasPersistentType for i64 {
    type Codec = LongType;
}

impl HasPersistentType for i32 {
    type Codec = IntegerType;
}

impl HasPersistentType for f64 {
    type Codec = RealType;
}

impl HasPersistentType for String {
    type Codec = TextType;
}

impl HasPersistentType for Vec<u8> {
    type Codec = BlobType;
}

impl HasPersistentType for bool {
    type Codec = BoolType;
}

impl<T: HasPersistentType> HasPersistentType for Option<T> {
    type Codec = Nullable<T::Codec>;
}

/// Renders an encoded argument as an SQL literal.
pub(crate) fn render_literal(class: StorageClass, arg: &BindArg) -> String {
    match arg {
        BindArg::Null => String::from("NULL"),
        BindArg::Text(text) => match class {
            StorageClass::Integer | StorageClass::Real => text.clone(),
            _ => quote_text(text),
        },
        BindArg::Blob(bytes) => {
            let hex: String = bytes.iter().map(|byte| format!("{byte:02X}")).collect();
            format!("X'{hex}'")
        }
    }
}

pub(crate) fn quote_text(text: &str) -> String {
    // Escape single quotes by doubling them
    format!("'{}'", text.replace('\'', "''"))
}

pub(crate) fn mismatch(expected: StorageClass, found: StorageClass) -> TypeError {
    if found == StorageClass::Null {
        TypeError::UnexpectedNull
    } else {
        TypeError::TypeMismatch { expected, found }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_quotes_text_only() {
        assert_eq!(TextType.literal(&String::from("it's")), "'it''s'");
        assert_eq!(LongType.literal(&-100), "-100");
        assert_eq!(BlobType.literal(&vec![0x48, 0x45]), "X'4845'");
        assert_eq!(Nullable::new(TextType).literal(&None), "NULL");
    }

    #[test]
    fn test_literal_matches_bind_encoding() {
        let value = String::from("Title");
        let bound = TextType.to_bind_arg(&value);
        assert_eq!(bound, BindArg::Text(value.clone()));
        assert_eq!(TextType.literal(&value), "'Title'");
    }

    #[test]
    fn test_erased_bind_validates() {
        let ty = TypeRef::new(LongType);
        assert_eq!(
            ty.erased().bind(SqlValue::Int(7)),
            Ok(BindArg::Text(String::from("7")))
        );
        assert_eq!(
            ty.erased().bind(SqlValue::Null),
            Err(TypeError::UnexpectedNull)
        );
        assert_eq!(
            ty.erased().bind(SqlValue::Text(String::from("x"))),
            Err(TypeError::TypeMismatch {
                expected: StorageClass::Integer,
                found: StorageClass::Text,
            })
        );
    }

    #[test]
    fn test_nullable_reports_metadata() {
        let ty = <Option<i64>>::persistent_type();
        assert!(ty.nullable());
        assert!(ty.is_integer_type());
        assert_eq!(ty.storage_class(), StorageClass::Integer);
        assert_eq!(ty.erased().bind(SqlValue::Null), Ok(BindArg::Null));
    }

    #[test]
    fn test_codec_identity() {
        let a = TypeRef::new(LongType);
        let b = i64::persistent_type();
        let c = TypeRef::new(BoolType);
        assert_eq!(a.erased().codec_id(), b.erased().codec_id());
        assert_ne!(a.erased().codec_id(), c.erased().codec_id());
    }
}

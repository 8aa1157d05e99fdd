//! Built-in codecs.

use std::fmt;
use std::marker::PhantomData;

use super::{mismatch, BindArg, PersistentType, SqlType, SqlValue, StorageClass, ValueRef};
use crate::error::TypeError;

fn read_integer(value: ValueRef<'_>) -> Result<i64, TypeError> {
    match value {
        ValueRef::Integer(n) => Ok(n),
        other => Err(mismatch(StorageClass::Integer, other.storage_class())),
    }
}

fn bind_integer(value: SqlValue) -> Result<i64, TypeError> {
    match value {
        SqlValue::Int(n) => Ok(n),
        SqlValue::Bool(b) => Ok(i64::from(b)),
        other => Err(mismatch(StorageClass::Integer, other.storage_class())),
    }
}

/// `i64` stored as INTEGER.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LongType;

impl SqlType for LongType {
    fn storage_class(&self) -> StorageClass {
        StorageClass::Integer
    }
}

impl PersistentType for LongType {
    type Value = i64;

    fn to_bind_arg(&self, value: &i64) -> BindArg {
        BindArg::Text(value.to_string())
    }

    fn from_column(&self, value: ValueRef<'_>) -> Result<i64, TypeError> {
        read_integer(value)
    }

    fn from_sql_value(&self, value: SqlValue) -> Result<i64, TypeError> {
        bind_integer(value)
    }
}

/// `i32` stored as INTEGER; wider stored values are rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntegerType;

fn narrow(n: i64) -> Result<i32, TypeError> {
    i32::try_from(n).map_err(|_| TypeError::InvalidValue(format!("{n} does not fit in i32")))
}

impl SqlType for IntegerType {
    fn storage_class(&self) -> StorageClass {
        StorageClass::Integer
    }
}

impl PersistentType for IntegerType {
    type Value = i32;

    fn to_bind_arg(&self, value: &i32) -> BindArg {
        BindArg::Text(value.to_string())
    }

    fn from_column(&self, value: ValueRef<'_>) -> Result<i32, TypeError> {
        narrow(read_integer(value)?)
    }

    fn from_sql_value(&self, value: SqlValue) -> Result<i32, TypeError> {
        narrow(bind_integer(value)?)
    }
}

/// `f64` stored as REAL.
///
/// Integers read from the row are widened; reals are never truncated into
/// an integer codec.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RealType;

impl SqlType for RealType {
    fn storage_class(&self) -> StorageClass {
        StorageClass::Real
    }
}

impl PersistentType for RealType {
    type Value = f64;

    /// Infinities are written as `9e999`, which SQLite reads back as an
    /// infinite REAL. NaN has no storage form; SQLite stores it as NULL.
    fn to_bind_arg(&self, value: &f64) -> BindArg {
        if value.is_nan() {
            BindArg::Null
        } else if value.is_infinite() {
            BindArg::Text(String::from(if *value > 0.0 { "9e999" } else { "-9e999" }))
        } else {
            BindArg::Text(value.to_string())
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn from_column(&self, value: ValueRef<'_>) -> Result<f64, TypeError> {
        match value {
            ValueRef::Real(f) => Ok(f),
            ValueRef::Integer(n) => Ok(n as f64),
            other => Err(mismatch(StorageClass::Real, other.storage_class())),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn from_sql_value(&self, value: SqlValue) -> Result<f64, TypeError> {
        match value {
            SqlValue::Float(f) => Ok(f),
            SqlValue::Int(n) => Ok(n as f64),
            other => Err(mismatch(StorageClass::Real, other.storage_class())),
        }
    }
}

/// `String` stored as TEXT.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextType;

impl SqlType for TextType {
    fn storage_class(&self) -> StorageClass {
        StorageClass::Text
    }
}

impl PersistentType for TextType {
    type Value = String;

    fn to_bind_arg(&self, value: &String) -> BindArg {
        BindArg::Text(value.clone())
    }

    fn from_column(&self, value: ValueRef<'_>) -> Result<String, TypeError> {
        match value {
            ValueRef::Text(s) => Ok(s.to_owned()),
            other => Err(mismatch(StorageClass::Text, other.storage_class())),
        }
    }

    fn from_sql_value(&self, value: SqlValue) -> Result<String, TypeError> {
        match value {
            SqlValue::Text(s) => Ok(s),
            other => Err(mismatch(StorageClass::Text, other.storage_class())),
        }
    }
}

/// `Vec<u8>` stored as BLOB.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlobType;

impl SqlType for BlobType {
    fn storage_class(&self) -> StorageClass {
        StorageClass::Blob
    }
}

impl PersistentType for BlobType {
    type Value = Vec<u8>;

    fn to_bind_arg(&self, value: &Vec<u8>) -> BindArg {
        BindArg::Blob(value.clone())
    }

    fn from_column(&self, value: ValueRef<'_>) -> Result<Vec<u8>, TypeError> {
        match value {
            ValueRef::Blob(b) => Ok(b.to_vec()),
            other => Err(mismatch(StorageClass::Blob, other.storage_class())),
        }
    }

    fn from_sql_value(&self, value: SqlValue) -> Result<Vec<u8>, TypeError> {
        match value {
            SqlValue::Blob(b) => Ok(b),
            other => Err(mismatch(StorageClass::Blob, other.storage_class())),
        }
    }
}

/// `bool` stored as INTEGER 0/1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoolType;

impl SqlType for BoolType {
    fn storage_class(&self) -> StorageClass {
        StorageClass::Integer
    }
}

impl PersistentType for BoolType {
    type Value = bool;

    fn to_bind_arg(&self, value: &bool) -> BindArg {
        BindArg::Text(String::from(if *value { "1" } else { "0" }))
    }

    fn from_column(&self, value: ValueRef<'_>) -> Result<bool, TypeError> {
        read_integer(value).map(|n| n != 0)
    }

    fn from_sql_value(&self, value: SqlValue) -> Result<bool, TypeError> {
        match value {
            SqlValue::Bool(b) => Ok(b),
            SqlValue::Int(0) => Ok(false),
            SqlValue::Int(1) => Ok(true),
            SqlValue::Int(n) => Err(TypeError::InvalidValue(format!(
                "{n} is not a boolean"
            ))),
            other => Err(mismatch(StorageClass::Integer, other.storage_class())),
        }
    }
}

/// Enumerations persisted by name.
pub trait SqlEnum: Clone + fmt::Debug + Send + Sync + Sized + 'static {
    /// The stored name of this variant.
    fn name(&self) -> &'static str;

    /// Looks a variant up by its stored name.
    fn from_name(name: &str) -> Option<Self>;
}

/// An [`SqlEnum`] stored as TEXT.
pub struct EnumType<E> {
    _enum: PhantomData<fn() -> E>,
}

impl<E> EnumType<E> {
    /// Creates the codec.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _enum: PhantomData,
        }
    }
}

impl<E> Default for EnumType<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for EnumType<E> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EnumType<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EnumType<{}>", std::any::type_name::<E>())
    }
}

impl<E: SqlEnum> EnumType<E> {
    fn parse(name: &str) -> Result<E, TypeError> {
        E::from_name(name).ok_or_else(|| {
            TypeError::InvalidValue(format!(
                "'{name}' is not a variant of {}",
                std::any::type_name::<E>()
            ))
        })
    }
}

impl<E: SqlEnum> SqlType for EnumType<E> {
    fn storage_class(&self) -> StorageClass {
        StorageClass::Text
    }
}

impl<E: SqlEnum> PersistentType for EnumType<E> {
    type Value = E;

    fn to_bind_arg(&self, value: &E) -> BindArg {
        BindArg::Text(String::from(value.name()))
    }

    fn from_column(&self, value: ValueRef<'_>) -> Result<E, TypeError> {
        match value {
            ValueRef::Text(s) => Self::parse(s),
            other => Err(mismatch(StorageClass::Text, other.storage_class())),
        }
    }

    fn from_sql_value(&self, value: SqlValue) -> Result<E, TypeError> {
        match value {
            SqlValue::Text(s) => Self::parse(&s),
            other => Err(mismatch(StorageClass::Text, other.storage_class())),
        }
    }
}

/// Makes any codec accept NULL, mapping it to `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Nullable<P>(P);

impl<P> Nullable<P> {
    /// Wraps `inner`.
    #[must_use]
    pub const fn new(inner: P) -> Self {
        Self(inner)
    }

    /// The wrapped codec.
    #[must_use]
    pub const fn inner(&self) -> &P {
        &self.0
    }
}

impl<P: PersistentType> SqlType for Nullable<P> {
    fn storage_class(&self) -> StorageClass {
        self.0.storage_class()
    }

    fn nullable(&self) -> bool {
        true
    }

    fn is_integer_type(&self) -> bool {
        self.0.is_integer_type()
    }
}

impl<P: PersistentType> PersistentType for Nullable<P> {
    type Value = Option<P::Value>;

    fn to_bind_arg(&self, value: &Option<P::Value>) -> BindArg {
        value
            .as_ref()
            .map_or(BindArg::Null, |v| self.0.to_bind_arg(v))
    }

    fn from_column(&self, value: ValueRef<'_>) -> Result<Option<P::Value>, TypeError> {
        if value.is_null() {
            Ok(None)
        } else {
            self.0.from_column(value).map(Some)
        }
    }

    fn from_sql_value(&self, value: SqlValue) -> Result<Option<P::Value>, TypeError> {
        match value {
            SqlValue::Null => Ok(None),
            other => self.0.from_sql_value(other).map(Some),
        }
    }

    fn literal(&self, value: &Option<P::Value>) -> String {
        value
            .as_ref()
            .map_or_else(|| String::from("NULL"), |v| self.0.literal(v))
    }
}

//! # oxide-schema
//!
//! Typed SQLite schema definitions and parameterized statement construction.
//!
//! This crate provides:
//! - Persistent types: codecs between Rust values and SQLite storage classes
//! - A schema model (tables, columns, constraints, indices, views, triggers)
//!   rendering deterministic DDL
//! - A typed expression DSL compiled into parameterized SQL
//! - Statement builders producing a [`StatementSeed`]: SQL text plus the
//!   ordered types of its bind placeholders
//! - A foreign-key dependency resolver ordering table creation and drops
//!
//! Execution is delegated to a [`SqlExecutor`] supplied by the caller.
//!
//! ## Declaring tables
//!
//! ```rust
//! use oxide_schema::{Table, ExprExt};
//!
//! let mut builder = Table::builder("Artist");
//! let id = builder.long("_id", |c| c.primary_key()).unwrap();
//! let name = builder
//!     .text("ArtistName", |c| c.collate_no_case().unique_index())
//!     .unwrap();
//! let artist = builder.build().unwrap();
//!
//! assert_eq!(
//!     artist.ddl(false),
//!     r#"CREATE TABLE IF NOT EXISTS "Artist" ("_id" INTEGER NOT NULL PRIMARY KEY, "ArtistName" TEXT NOT NULL COLLATE NOCASE)"#
//! );
//!
//! let query = artist
//!     .select(&[&id, &name])
//!     .where_clause(name.eq(oxide_schema::bind()))
//!     .to_query();
//! assert_eq!(
//!     query.sql(),
//!     r#"SELECT "Artist"."_id", "Artist"."ArtistName" FROM "Artist" WHERE "Artist"."ArtistName" = ?"#
//! );
//! assert_eq!(query.seed().arg_count(), 1);
//! ```

pub mod builder;
pub mod dependency;
pub mod error;
pub mod executor;
pub mod expr;
pub mod identity;
pub mod query;
pub mod schema;
pub mod types;

pub use builder::{
    ArgBindings, ColumnSet, ColumnValues, Delete, HasAssignments, Insert, IntoColumnSet, Join,
    JoinType, NoAssignments, Select, SelectItem, Selectable, SortOrder, SqlBuilder,
    StatementSeed, Update,
};
pub use dependency::{create_all, drop_all, TableDependencies};
pub use error::{
    BindingError, ConstructionError, CyclicDependencyError, Error, Result, TypeError,
};
pub use executor::{
    ExecutorConfig, ExecutorError, MemoryCursor, MemoryRow, Row, RowCursor, SqlExecutor,
};
pub use expr::{
    bind, count_star, exists, literal, not_exists, AsExpr, Expr, ExprAlias, ExprExt, ExprId,
    IntoOperand, Literal, Placeholder, Predicate, QueryAlias,
};
pub use identity::Identity;
pub use query::{Cursor, Query};
pub use schema::{
    describe_table, AnyColumn, CheckConstraint, Collate, Column, ColumnBuilder, ColumnDef,
    ColumnMetadata, Creatable, FieldType, ForeignKeyAction, ForeignKeyConstraint, Index,
    MasterType, OnConflict, Table, TableAlias, TableBuilder, TableDescription, Trigger,
    TriggerBody, TriggerBuilder, TriggerEvent, TriggerScope, TriggerTiming, View, ViewBuilder,
    ViewColumn,
};
pub use types::{
    AnyType, BindArg, BlobType, BoolType, DateTimeType, DateType, EnumType, HasPersistentType,
    IntegerType, LongType, Nullable, PersistentType, RealType, SqlEnum, SqlType, SqlValue,
    StorageClass, TextType, ToSqlValue, TypeRef, Value, ValueRef, ValueType,
};

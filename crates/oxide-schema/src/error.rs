//! Error types for schema construction, binding, decoding and ordering.

use crate::executor::ExecutorError;
use crate::types::StorageClass;

/// A schema object, expression or statement was composed incorrectly.
///
/// Always reported at the call that builds the offending object.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConstructionError {
    /// A second primary key was declared for a table.
    #[error("Primary key already defined for table '{table}'")]
    DuplicatePrimaryKey {
        /// The table being built.
        table: String,
    },

    /// A column was listed twice in the same primary key.
    #[error("Column '{column}' is already part of the primary key of '{table}'")]
    AlreadyInPrimaryKey {
        /// The table being built.
        table: String,
        /// The repeated column.
        column: String,
    },

    /// Two columns with the same name were declared.
    #[error("Column '{column}' already exists in table '{table}'")]
    DuplicateColumn {
        /// The table being built.
        table: String,
        /// The repeated column name.
        column: String,
    },

    /// A table was built without columns.
    #[error("Table '{table}' has no columns")]
    EmptyTable {
        /// The table being built.
        table: String,
    },

    /// A column of another table was used where a column of this table is required.
    #[error("Column '{column}' does not belong to table '{table}'")]
    ForeignColumn {
        /// The expected owning table.
        table: String,
        /// The offending column, qualified by its own table.
        column: String,
    },

    /// A statement assigned a column that is not part of its target table.
    #[error("Cannot assign '{column}' in a statement targeting '{table}'")]
    ForeignColumnAssignment {
        /// The statement's target table.
        table: String,
        /// The offending column, qualified by its own table.
        column: String,
    },

    /// An UPDATE or INSERT builder finished without assignments where some are required.
    #[error("Statement on '{table}' assigns no columns")]
    NoAssignments {
        /// The statement's target table.
        table: String,
    },

    /// A column constraint was declared in an invalid combination.
    #[error("Invalid constraint on column '{column}': {reason}")]
    InvalidConstraint {
        /// The column being declared.
        column: String,
        /// What is wrong.
        reason: String,
    },

    /// An index was declared without columns.
    #[error("Index '{index}' has no columns")]
    EmptyIndex {
        /// The index name.
        index: String,
    },

    /// A NEW/OLD reference is illegal for the trigger's event or table.
    #[error("Trigger '{trigger}' cannot reference {reference}: {reason}")]
    InvalidTriggerReference {
        /// The trigger being built.
        trigger: String,
        /// The rejected reference, e.g. `NEW.ArtistName`.
        reference: String,
        /// What is wrong.
        reason: String,
    },

    /// A trigger was declared inconsistently (e.g. `UPDATE OF` on a delete trigger).
    #[error("Invalid trigger '{trigger}': {reason}")]
    InvalidTrigger {
        /// The trigger being built.
        trigger: String,
        /// What is wrong.
        reason: String,
    },

    /// A trigger was built without body statements.
    #[error("Trigger '{trigger}' has no body statements")]
    EmptyTriggerBody {
        /// The trigger being built.
        trigger: String,
    },

    /// SQL that is stored in the schema contained bind placeholders.
    #[error("{object} '{name}' cannot contain bind arguments: {sql}")]
    UnexpectedBindArgument {
        /// Kind of schema object (trigger, view, check, ...).
        object: &'static str,
        /// Name of the schema object.
        name: String,
        /// The offending SQL fragment.
        sql: String,
    },

    /// A view declared a column list whose width differs from its query.
    #[error("View '{view}' declares {declared} columns but its query selects {selected}")]
    ViewColumnCount {
        /// The view being built.
        view: String,
        /// Number of declared column aliases.
        declared: usize,
        /// Number of selected expressions.
        selected: usize,
    },

    /// A declared view column does not name exactly one select item.
    #[error("Invalid column '{column}' on view '{view}': {reason}")]
    InvalidViewColumn {
        /// The view being built.
        view: String,
        /// The declared column name.
        column: String,
        /// What is wrong.
        reason: String,
    },

    /// No foreign key links the tables of an inferred join.
    #[error("No foreign key joins '{left}' and '{right}'")]
    NoJoinCondition {
        /// A table already in the join.
        left: String,
        /// The table being joined.
        right: String,
    },

    /// Several foreign keys link the tables of an inferred join.
    #[error("More than one foreign key joins '{left}' and '{right}'")]
    AmbiguousJoinCondition {
        /// A table already in the join.
        left: String,
        /// The table being joined.
        right: String,
    },

    /// An expression is not exposed under a name by an aliased query.
    #[error("Expression {expression} is not a named result of query alias '{alias}'")]
    NotInQueryAlias {
        /// The query alias.
        alias: String,
        /// The rejected expression, rendered as SQL.
        expression: String,
    },
}

/// The argument binder was misused at execution time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindingError {
    /// An index outside the statement's placeholder range.
    #[error("Argument index {index} out of range, statement has {count} arguments")]
    IndexOutOfRange {
        /// The rejected index.
        index: usize,
        /// Number of placeholders in the statement.
        count: usize,
    },

    /// A placeholder was never bound before execution.
    #[error("Argument {index} was never bound")]
    UnboundArgument {
        /// The first unbound index.
        index: usize,
    },

    /// The bound value does not fit the placeholder's persistent type.
    #[error("Argument {index} cannot be bound: {source}")]
    InvalidValue {
        /// The placeholder index.
        index: usize,
        /// Why the codec rejected the value.
        source: TypeError,
    },
}

/// A value could not be converted by a persistent type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeError {
    /// The stored value has a different storage class than the codec expects.
    #[error("Expected {expected} value, found {found}")]
    TypeMismatch {
        /// Storage class required by the codec.
        expected: StorageClass,
        /// Storage class actually found.
        found: StorageClass,
    },

    /// NULL reached a codec that does not accept it.
    #[error("Unexpected NULL for a non-nullable value")]
    UnexpectedNull,

    /// The expression was not selected by the query being read.
    #[error("Expression is not part of the result set")]
    ColumnNotMapped,

    /// The row has fewer columns than the query selected.
    #[error("Row has no column at index {index}")]
    MissingColumn {
        /// The missing ordinal.
        index: usize,
    },

    /// The value has the right storage class but cannot be represented.
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// Foreign keys between the given tables form a cycle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Cyclic foreign key dependency: {}", .tables.join(" -> "))]
pub struct CyclicDependencyError {
    /// Table names along the detected cycle, first table repeated at the end.
    pub tables: Vec<String>,
}

/// Any failure surfaced by this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// See [`ConstructionError`].
    #[error(transparent)]
    Construction(#[from] ConstructionError),

    /// See [`BindingError`].
    #[error(transparent)]
    Binding(#[from] BindingError),

    /// See [`TypeError`].
    #[error(transparent)]
    Type(#[from] TypeError),

    /// See [`CyclicDependencyError`].
    #[error(transparent)]
    CyclicDependency(#[from] CyclicDependencyError),

    /// The executor failed to run a statement.
    #[error("Executor error: {0}")]
    Executor(#[source] ExecutorError),

    /// A query expected to return a row returned none.
    #[error("Query returned no rows: {sql}")]
    NoRows {
        /// The query text.
        sql: String,
    },
}

/// Result type for operations that may reach the executor.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_lists_path() {
        let err = CyclicDependencyError {
            tables: vec!["A".into(), "C".into(), "B".into(), "A".into()],
        };
        assert_eq!(err.to_string(), "Cyclic foreign key dependency: A -> C -> B -> A");
    }

    #[test]
    fn test_binding_error_keeps_source() {
        let err = BindingError::InvalidValue {
            index: 1,
            source: TypeError::UnexpectedNull,
        };
        assert_eq!(
            err.to_string(),
            "Argument 1 cannot be bound: Unexpected NULL for a non-nullable value"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_error_is_transparent() {
        let err: Error = TypeError::ColumnNotMapped.into();
        assert_eq!(err.to_string(), "Expression is not part of the result set");
    }
}

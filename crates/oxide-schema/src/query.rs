//! Compiled queries and typed access to their rows.
//!
//! A [`Query`] keeps the compiled SQL together with a map from the id of
//! every selected expression to its result ordinal. Reading a row through
//! a [`Cursor`] with the same expression that was selected decodes the
//! value with that expression's codec.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::builder::{ArgBindings, SelectItem, StatementSeed};
use crate::error::{BindingError, Error, Result, TypeError};
use crate::executor::{Row, SqlExecutor};
use crate::expr::{AsExpr, ExprId};
use crate::types::{BindArg, PersistentType, StorageClass, ValueRef, ValueType};

/// A compiled SELECT plus the ordinals of its result columns.
#[derive(Debug, Clone)]
pub struct Query {
    seed: StatementSeed,
    items: Arc<[SelectItem]>,
    ordinals: Arc<HashMap<ExprId, usize>>,
}

impl Query {
    pub(crate) fn new(seed: StatementSeed, items: &[SelectItem]) -> Self {
        let mut ordinals = HashMap::with_capacity(items.len() * 2);
        for (index, item) in items.iter().enumerate() {
            ordinals.insert(item.key_id(), index);
        }
        // An aliased expression can also be read through itself.
        for (index, item) in items.iter().enumerate() {
            ordinals.entry(item.expr_id()).or_insert(index);
        }
        Self {
            seed,
            items: items.into(),
            ordinals: Arc::new(ordinals),
        }
    }

    /// A query over hand-written SQL. Its rows can only be read
    /// positionally through [`Cursor::row`].
    #[must_use]
    pub fn raw(seed: StatementSeed) -> Self {
        Self {
            seed,
            items: Arc::new([]),
            ordinals: Arc::default(),
        }
    }

    /// The compiled statement.
    #[must_use]
    pub const fn seed(&self) -> &StatementSeed {
        &self.seed
    }

    /// The SQL text.
    #[must_use]
    pub fn sql(&self) -> &str {
        self.seed.sql()
    }

    /// The select list the query was compiled from.
    #[must_use]
    pub fn items(&self) -> &[SelectItem] {
        &self.items
    }

    /// The result ordinal of `expr`, if it was selected.
    #[must_use]
    pub fn ordinal_of<T, E: AsExpr<T> + ?Sized>(&self, expr: &E) -> Option<usize> {
        self.ordinals.get(&expr.as_expr().id()).copied()
    }

    fn log_query_plan(&self, executor: &mut dyn SqlExecutor, args: &[BindArg]) -> Result<()> {
        let explain = format!("EXPLAIN QUERY PLAN {}", self.sql());
        let mut rows = executor.query(&explain, args).map_err(Error::Executor)?;
        info!(sql = %self.sql(), "Query plan");
        while let Some(row) = rows.next_row().map_err(Error::Executor)? {
            let line = (0..row.column_count())
                .filter_map(|index| row.value(index).as_ref().map(ToString::to_string))
                .collect::<Vec<_>>()
                .join(" ");
            info!(plan = %line, "Query plan step");
        }
        Ok(())
    }

    /// Binds the arguments, runs the query and calls `f` for every row.
    ///
    /// # Errors
    ///
    /// Binding errors are returned before any SQL reaches the executor.
    /// Errors returned by `f` stop the iteration and are passed through.
    pub fn for_each<B, F>(&self, executor: &mut dyn SqlExecutor, bind: B, mut f: F) -> Result<()>
    where
        B: FnOnce(&mut ArgBindings) -> std::result::Result<(), BindingError>,
        F: FnMut(&Cursor<'_>) -> Result<()>,
    {
        let args = self.seed.bind_args(bind)?;
        if executor.config().log_query_plans {
            self.log_query_plan(executor, &args)?;
        }
        debug!(sql = %self.sql(), args = args.len(), "Running query");
        let mut rows = executor.query(self.sql(), &args).map_err(Error::Executor)?;
        while let Some(row) = rows.next_row().map_err(Error::Executor)? {
            f(&Cursor {
                row,
                ordinals: &self.ordinals,
            })?;
        }
        Ok(())
    }

    /// Maps every row through `map` and collects the results.
    ///
    /// # Errors
    ///
    /// Same as [`for_each`](Self::for_each), plus the errors of `map`.
    pub fn collect<R, E, B, F>(&self, executor: &mut dyn SqlExecutor, bind: B, mut map: F) -> Result<Vec<R>>
    where
        E: Into<Error>,
        B: FnOnce(&mut ArgBindings) -> std::result::Result<(), BindingError>,
        F: FnMut(&Cursor<'_>) -> std::result::Result<R, E>,
    {
        let mut results = Vec::new();
        self.for_each(executor, bind, |cursor| {
            results.push(map(cursor).map_err(Into::into)?);
            Ok(())
        })?;
        Ok(results)
    }

    /// Maps the first row through `map`, `None` when there are no rows.
    ///
    /// # Errors
    ///
    /// Same as [`collect`](Self::collect).
    pub fn first<R, E, B, F>(&self, executor: &mut dyn SqlExecutor, bind: B, map: F) -> Result<Option<R>>
    where
        E: Into<Error>,
        B: FnOnce(&mut ArgBindings) -> std::result::Result<(), BindingError>,
        F: FnOnce(&Cursor<'_>) -> std::result::Result<R, E>,
    {
        let args = self.seed.bind_args(bind)?;
        if executor.config().log_query_plans {
            self.log_query_plan(executor, &args)?;
        }
        debug!(sql = %self.sql(), args = args.len(), "Running query for first row");
        let mut rows = executor.query(self.sql(), &args).map_err(Error::Executor)?;
        let Some(row) = rows.next_row().map_err(Error::Executor)? else {
            return Ok(None);
        };
        let cursor = Cursor {
            row,
            ordinals: &self.ordinals,
        };
        map(&cursor).map(Some).map_err(Into::into)
    }

    /// The integer in the first column of the first row, as for
    /// `SELECT COUNT(*) ...`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRows`] for an empty result, and a [`TypeError`]
    /// when the value is not an integer.
    pub fn long_for_query<B>(&self, executor: &mut dyn SqlExecutor, bind: B) -> Result<i64>
    where
        B: FnOnce(&mut ArgBindings) -> std::result::Result<(), BindingError>,
    {
        self.first(executor, bind, |cursor| match cursor.row().value(0) {
            Some(ValueRef::Integer(n)) => Ok(n),
            Some(other) => Err(TypeError::TypeMismatch {
                expected: StorageClass::Integer,
                found: other.storage_class(),
            }),
            None => Err(TypeError::MissingColumn { index: 0 }),
        })?
        .ok_or_else(|| Error::NoRows {
            sql: self.sql().to_owned(),
        })
    }

    /// The SQL counting the rows this query returns.
    ///
    /// A query that already starts with `SELECT COUNT(*)` is returned as is.
    #[must_use]
    pub fn count_sql(&self) -> String {
        let sql = self.sql().trim_start();
        let prefix = "SELECT COUNT(*)";
        let is_count = sql
            .get(..prefix.len())
            .is_some_and(|start| start.eq_ignore_ascii_case(prefix));
        if is_count {
            self.sql().to_owned()
        } else {
            format!("SELECT COUNT(*) FROM ( {} )", self.sql())
        }
    }

    /// Counts the rows this query returns.
    ///
    /// # Errors
    ///
    /// Same as [`long_for_query`](Self::long_for_query).
    pub fn count<B>(&self, executor: &mut dyn SqlExecutor, bind: B) -> Result<i64>
    where
        B: FnOnce(&mut ArgBindings) -> std::result::Result<(), BindingError>,
    {
        let seed = StatementSeed::from_parts(self.count_sql(), self.seed.types().to_vec());
        Self::raw(seed).long_for_query(executor, bind)
    }
}

/// Typed access to the current row of a [`Query`].
pub struct Cursor<'a> {
    row: &'a dyn Row,
    ordinals: &'a HashMap<ExprId, usize>,
}

impl Cursor<'_> {
    fn value_of(&self, id: ExprId) -> std::result::Result<ValueRef<'_>, TypeError> {
        let index = *self.ordinals.get(&id).ok_or(TypeError::ColumnNotMapped)?;
        self.row.value(index).ok_or(TypeError::MissingColumn { index })
    }

    /// Decodes the value selected for `expr`.
    ///
    /// # Errors
    ///
    /// Returns [`TypeError::ColumnNotMapped`] when `expr` was not selected,
    /// [`TypeError::UnexpectedNull`] for NULL in a non-nullable codec, and
    /// [`TypeError::TypeMismatch`] for a conflicting storage class.
    pub fn get<T: ValueType, E: AsExpr<T> + ?Sized>(&self, expr: &E) -> std::result::Result<T, TypeError> {
        let expr = expr.as_expr();
        expr.type_ref().from_column(self.value_of(expr.id())?)
    }

    /// Like [`get`](Self::get), but NULL reads as `None`.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get), except for NULL.
    pub fn get_optional<T: ValueType, E: AsExpr<T> + ?Sized>(
        &self,
        expr: &E,
    ) -> std::result::Result<Option<T>, TypeError> {
        let expr = expr.as_expr();
        match self.value_of(expr.id())? {
            ValueRef::Null => Ok(None),
            value => expr.type_ref().from_column(value).map(Some),
        }
    }

    /// Whether the value selected for `expr` is NULL.
    ///
    /// # Errors
    ///
    /// Returns [`TypeError::ColumnNotMapped`] when `expr` was not selected.
    pub fn is_null<T, E: AsExpr<T> + ?Sized>(&self, expr: &E) -> std::result::Result<bool, TypeError> {
        Ok(self.value_of(expr.as_expr().id())?.is_null())
    }

    /// The raw row, for positional access.
    #[must_use]
    pub fn row(&self) -> &dyn Row {
        self.row
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{ExecutorError, MemoryCursor, RowCursor};
    use crate::expr::ExprExt;
    use crate::schema::Table;
    use crate::types::Value;

    #[derive(Default)]
    struct CannedExecutor {
        rows: Vec<Vec<Value>>,
        queries: Vec<String>,
        explain: bool,
    }

    impl SqlExecutor for CannedExecutor {
        fn exec(&mut self, sql: &str, _args: &[BindArg]) -> std::result::Result<u64, ExecutorError> {
            self.queries.push(sql.to_owned());
            Ok(0)
        }

        fn query(
            &mut self,
            sql: &str,
            _args: &[BindArg],
        ) -> std::result::Result<Box<dyn RowCursor + '_>, ExecutorError> {
            self.queries.push(sql.to_owned());
            Ok(Box::new(MemoryCursor::new(Vec::new(), self.rows.clone())))
        }

        fn config(&self) -> crate::executor::ExecutorConfig {
            crate::executor::ExecutorConfig::new().with_query_plans(self.explain)
        }
    }

    fn artist() -> (Table, crate::schema::Column<i64>, crate::schema::Column<Option<String>>) {
        let mut builder = Table::builder("Artist");
        let id = builder.long("_id", |c| c.primary_key()).unwrap();
        let name = builder.opt_text("ArtistName", |c| c).unwrap();
        (builder.build().unwrap(), id, name)
    }

    #[test]
    fn test_cursor_reads_by_expression() {
        let (artist, id, name) = artist();
        let query = artist.select(&[&id, &name]).to_query();
        let mut executor = CannedExecutor {
            rows: vec![
                vec![Value::Integer(1), Value::Text(String::from("Tom Waits"))],
                vec![Value::Integer(2), Value::Null],
            ],
            ..CannedExecutor::default()
        };
        let rows = query
            .collect(&mut executor, |_| Ok(()), |c| -> std::result::Result<_, TypeError> {
                Ok((c.get(&id)?, c.get(&name)?, c.is_null(&name)?))
            })
            .unwrap();
        assert_eq!(
            rows,
            vec![
                (1, Some(String::from("Tom Waits")), false),
                (2, None, true),
            ]
        );
        assert_eq!(query.ordinal_of(&name), Some(1));
    }

    #[test]
    fn test_unmapped_and_null_errors() {
        let (artist, id, name) = artist();
        let query = artist.select(&[&name]).to_query();
        let mut executor = CannedExecutor {
            rows: vec![vec![Value::Null]],
            ..CannedExecutor::default()
        };
        let err = query
            .first(&mut executor, |_| Ok(()), |c| c.get(&id))
            .unwrap_err();
        assert!(matches!(err, Error::Type(TypeError::ColumnNotMapped)));

        let upper = name.upper();
        let query = artist.select(&[&upper]).to_query();
        let value = query
            .first(&mut executor, |_| Ok(()), |c| c.get_optional(&upper))
            .unwrap();
        assert_eq!(value, Some(None));

        let length = name.length();
        let query = artist.select(&[&length]).to_query();
        let err = query
            .first(&mut executor, |_| Ok(()), |c| c.get(&length))
            .unwrap_err();
        assert!(matches!(err, Error::Type(TypeError::UnexpectedNull)));
    }

    #[test]
    fn test_count_wrapping() {
        let (artist, id, _) = artist();
        let query = artist.select(&[&id]).where_clause(id.gt(crate::expr::bind())).to_query();
        assert_eq!(
            query.count_sql(),
            r#"SELECT COUNT(*) FROM ( SELECT "Artist"."_id" FROM "Artist" WHERE "Artist"."_id" > ? )"#
        );
        let counted = Query::raw(StatementSeed::raw("  select count(*) FROM \"Artist\""));
        assert_eq!(counted.count_sql(), "  select count(*) FROM \"Artist\"");

        let mut executor = CannedExecutor {
            rows: vec![vec![Value::Integer(3)]],
            ..CannedExecutor::default()
        };
        let count = query
            .count(&mut executor, |args| {
                args.set(0, 1_i64)?;
                Ok(())
            })
            .unwrap();
        assert_eq!(count, 3);
        assert!(matches!(
            query.count(&mut executor, |_| Ok(())),
            Err(Error::Binding(BindingError::UnboundArgument { index: 0 }))
        ));
        assert_eq!(executor.queries.len(), 1);
    }

    #[test]
    fn test_query_plan_logging_and_no_rows() {
        let (artist, id, _) = artist();
        let query = artist.select(&[&id]).to_query();
        let mut executor = CannedExecutor {
            explain: true,
            ..CannedExecutor::default()
        };
        query.for_each(&mut executor, |_| Ok(()), |_| Ok(())).unwrap();
        assert_eq!(
            executor.queries,
            vec![
                format!("EXPLAIN QUERY PLAN {}", query.sql()),
                query.sql().to_owned(),
            ]
        );
        assert!(matches!(
            query.long_for_query(&mut executor, |_| Ok(())),
            Err(Error::NoRows { .. })
        ));
    }
}

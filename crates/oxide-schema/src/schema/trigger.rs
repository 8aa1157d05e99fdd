//! Triggers.

use std::sync::Arc;

use crate::builder::{
    ColumnValues, Delete, HasAssignments, Insert, Select, SqlBuilder, StatementSeed, Update,
};
use crate::error::ConstructionError;
use crate::expr::{Expr, NodeKind, Predicate};
use crate::identity::Identity;
use crate::types::ValueType;

use super::column::{AnyColumn, Column};
use super::{Creatable, MasterType, Table};

/// When the trigger fires relative to its event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerTiming {
    /// `BEFORE`
    Before,
    /// `AFTER`
    After,
}

impl TriggerTiming {
    /// The SQL keyword.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Before => "BEFORE",
            Self::After => "AFTER",
        }
    }
}

/// The event firing a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerEvent {
    /// `INSERT`
    Insert,
    /// `UPDATE`
    Update,
    /// `DELETE`
    Delete,
}

impl TriggerEvent {
    /// The SQL keyword.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

/// Row image referenced from a trigger body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerScope {
    /// The row after an INSERT or UPDATE.
    New,
    /// The row before an UPDATE or DELETE.
    Old,
}

impl TriggerScope {
    /// `NEW` or `OLD`.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Old => "OLD",
        }
    }

    const fn allows(self, event: TriggerEvent) -> bool {
        matches!(
            (self, event),
            (Self::New, TriggerEvent::Insert | TriggerEvent::Update)
                | (Self::Old, TriggerEvent::Update | TriggerEvent::Delete)
        )
    }
}

/// The statements run by a trigger, plus its optional WHEN condition.
///
/// Only statements without bind placeholders are accepted: a trigger is
/// stored in the schema and can never be bound.
#[derive(Debug)]
pub struct TriggerBody {
    trigger: Identity,
    table: Table,
    event: TriggerEvent,
    when: Option<String>,
    statements: Vec<String>,
}

impl TriggerBody {
    fn reference<T: ValueType>(
        &self,
        scope: TriggerScope,
        column: &Column<T>,
    ) -> Result<Expr<T>, ConstructionError> {
        let reference = format!("{}.{}", scope.as_sql(), column.name().raw());
        let invalid = |reason: String| ConstructionError::InvalidTriggerReference {
            trigger: self.trigger.raw().to_owned(),
            reference: reference.clone(),
            reason,
        };
        if !scope.allows(self.event) {
            return Err(invalid(format!(
                "{} is not available in {} triggers",
                scope.as_sql(),
                self.event.as_sql()
            )));
        }
        if column.table_name() != self.table.identity() {
            return Err(invalid(format!(
                "column belongs to '{}', not '{}'",
                column.table_name().raw(),
                self.table.name()
            )));
        }
        Ok(Expr::from_kind(
            NodeKind::Trigger {
                scope,
                column: column.name().clone(),
            },
            column.type_ref().clone(),
        ))
    }

    /// `NEW."column"`; legal in INSERT and UPDATE triggers.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError::InvalidTriggerReference`] for a DELETE
    /// trigger or a column of another table.
    pub fn new_ref<T: ValueType>(&self, column: &Column<T>) -> Result<Expr<T>, ConstructionError> {
        self.reference(TriggerScope::New, column)
    }

    /// `OLD."column"`; legal in UPDATE and DELETE triggers.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError::InvalidTriggerReference`] for an INSERT
    /// trigger or a column of another table.
    pub fn old_ref<T: ValueType>(&self, column: &Column<T>) -> Result<Expr<T>, ConstructionError> {
        self.reference(TriggerScope::Old, column)
    }

    fn push(&mut self, seed: &StatementSeed) -> Result<&mut Self, ConstructionError> {
        if seed.has_bind_args() {
            return Err(self.bind_error(seed.sql()));
        }
        self.statements.push(seed.sql().to_owned());
        Ok(self)
    }

    fn bind_error(&self, sql: &str) -> ConstructionError {
        ConstructionError::UnexpectedBindArgument {
            object: "trigger",
            name: self.trigger.raw().to_owned(),
            sql: sql.to_owned(),
        }
    }

    /// Fires the body only when `predicate` holds.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError::UnexpectedBindArgument`] when the
    /// predicate has bind placeholders.
    pub fn when(&mut self, predicate: &Predicate) -> Result<&mut Self, ConstructionError> {
        let mut b = SqlBuilder::new();
        b.push_node(predicate.node());
        if b.arg_count() > 0 {
            return Err(self.bind_error(b.sql()));
        }
        self.when = Some(b.sql().to_owned());
        Ok(self)
    }

    /// Adds an INSERT statement.
    ///
    /// # Errors
    ///
    /// Returns the insert's own construction error, or
    /// [`ConstructionError::UnexpectedBindArgument`].
    pub fn insert<F>(&mut self, insert: &Insert, assign: F) -> Result<&mut Self, ConstructionError>
    where
        F: FnOnce(&mut ColumnValues),
    {
        let seed = insert.values(assign)?;
        self.push(&seed)
    }

    /// Adds an UPDATE statement.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError::UnexpectedBindArgument`].
    pub fn update(&mut self, update: &Update<HasAssignments>) -> Result<&mut Self, ConstructionError> {
        self.push(&update.build())
    }

    /// Adds a DELETE statement.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError::UnexpectedBindArgument`].
    pub fn delete(&mut self, delete: &Delete) -> Result<&mut Self, ConstructionError> {
        self.push(&delete.build())
    }

    /// Adds a SELECT statement, typically calling `RAISE` or a user function.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError::UnexpectedBindArgument`].
    pub fn select(&mut self, select: &Select) -> Result<&mut Self, ConstructionError> {
        self.push(&select.seed())
    }
}

/// Declares a trigger on one table.
#[derive(Debug)]
pub struct TriggerBuilder {
    name: Identity,
    table: Table,
    timing: TriggerTiming,
    event: TriggerEvent,
    update_of: Vec<Identity>,
    temporary: bool,
    error: Option<ConstructionError>,
}

impl TriggerBuilder {
    /// Creates the trigger as TEMP.
    #[must_use]
    pub const fn temporary(mut self) -> Self {
        self.temporary = true;
        self
    }

    /// Restricts an UPDATE trigger to changes of `columns` (`UPDATE OF ...`).
    #[must_use]
    pub fn update_of(mut self, columns: &[&dyn AnyColumn]) -> Self {
        if self.event != TriggerEvent::Update {
            self.error.get_or_insert_with(|| ConstructionError::InvalidTrigger {
                trigger: self.name.raw().to_owned(),
                reason: format!("UPDATE OF requires an UPDATE trigger, not {}", self.event.as_sql()),
            });
            return self;
        }
        for column in columns {
            let def = column.column_def();
            if def.table() != self.table.identity() {
                self.error.get_or_insert_with(|| ConstructionError::ForeignColumn {
                    table: self.table.name().to_owned(),
                    column: def.qualified_name(),
                });
                return self;
            }
            self.update_of.push(def.name().clone());
        }
        self
    }

    /// Declares the body and finishes the trigger.
    ///
    /// # Errors
    ///
    /// Returns an error recorded by the builder, the first error returned by
    /// `body`, or [`ConstructionError::EmptyTriggerBody`].
    pub fn build<F>(self, body: F) -> Result<Trigger, ConstructionError>
    where
        F: FnOnce(&mut TriggerBody) -> Result<(), ConstructionError>,
    {
        if let Some(error) = self.error {
            return Err(error);
        }
        let mut statements = TriggerBody {
            trigger: self.name.clone(),
            table: self.table.clone(),
            event: self.event,
            when: None,
            statements: Vec::new(),
        };
        body(&mut statements)?;
        if statements.statements.is_empty() {
            return Err(ConstructionError::EmptyTriggerBody {
                trigger: self.name.raw().to_owned(),
            });
        }
        Ok(Trigger {
            inner: Arc::new(TriggerInner {
                identity: self.name,
                table: self.table.identity().clone(),
                timing: self.timing,
                event: self.event,
                update_of: self.update_of,
                when: statements.when,
                statements: statements.statements,
                temporary: self.temporary,
            }),
        })
    }
}

#[derive(Debug)]
struct TriggerInner {
    identity: Identity,
    table: Identity,
    timing: TriggerTiming,
    event: TriggerEvent,
    update_of: Vec<Identity>,
    when: Option<String>,
    statements: Vec<String>,
    temporary: bool,
}

/// An immutable trigger definition.
///
/// ```rust
/// use oxide_schema::{ExprExt, Table, Trigger, TriggerEvent, TriggerTiming};
///
/// let mut builder = Table::builder("Artist");
/// let id = builder.long("_id", |c| c.primary_key()).unwrap();
/// let artist = builder.build().unwrap();
/// let mut builder = Table::builder("Album");
/// let artist_id = builder.long("ArtistId", |c| c.references(&id)).unwrap();
/// let album = builder.build().unwrap();
///
/// let trigger = Trigger::builder("artist_delete", &artist, TriggerTiming::After, TriggerEvent::Delete)
///     .build(|body| {
///         let old_id = body.old_ref(&id)?;
///         body.delete(&album.delete().where_clause(artist_id.eq(old_id)))?;
///         Ok(())
///     })
///     .unwrap();
/// assert_eq!(
///     trigger.ddl(false),
///     r#"CREATE TRIGGER IF NOT EXISTS "artist_delete" AFTER DELETE ON "Artist" BEGIN DELETE FROM "Album" WHERE "Album"."ArtistId" = OLD."_id"; END"#
/// );
/// ```
#[derive(Debug, Clone)]
pub struct Trigger {
    inner: Arc<TriggerInner>,
}

impl Trigger {
    /// Starts a trigger on `table`.
    #[must_use]
    pub fn builder(
        name: &str,
        table: &Table,
        timing: TriggerTiming,
        event: TriggerEvent,
    ) -> TriggerBuilder {
        TriggerBuilder {
            name: Identity::new(name),
            table: table.clone(),
            timing,
            event,
            update_of: Vec::new(),
            temporary: false,
            error: None,
        }
    }

    /// The trigger name.
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.inner.identity
    }

    /// The table the trigger is attached to.
    #[must_use]
    pub fn table(&self) -> &Identity {
        &self.inner.table
    }

    /// The CREATE TRIGGER statement.
    #[must_use]
    pub fn ddl(&self, temporary: bool) -> String {
        let inner = &self.inner;
        let mut sql = String::from(if temporary || inner.temporary {
            "CREATE TEMP TRIGGER IF NOT EXISTS "
        } else {
            "CREATE TRIGGER IF NOT EXISTS "
        });
        sql.push_str(inner.identity.quoted());
        sql.push(' ');
        sql.push_str(inner.timing.as_sql());
        sql.push(' ');
        sql.push_str(inner.event.as_sql());
        if !inner.update_of.is_empty() {
            let columns: Vec<&str> = inner.update_of.iter().map(Identity::quoted).collect();
            sql.push_str(" OF ");
            sql.push_str(&columns.join(", "));
        }
        sql.push_str(" ON ");
        sql.push_str(inner.table.quoted());
        if let Some(when) = &inner.when {
            sql.push_str(" WHEN ");
            sql.push_str(when);
        }
        sql.push_str(" BEGIN ");
        for statement in &inner.statements {
            sql.push_str(statement);
            sql.push_str("; ");
        }
        sql.push_str("END");
        sql
    }
}

impl Creatable for Trigger {
    fn master_type(&self) -> MasterType {
        MasterType::Trigger
    }

    fn identity(&self) -> &Identity {
        &self.inner.identity
    }

    fn create_statements(&self, temporary: bool) -> Vec<StatementSeed> {
        vec![StatementSeed::raw(self.ddl(temporary))]
    }

    fn drop_statements(&self) -> Vec<StatementSeed> {
        vec![StatementSeed::raw(format!(
            "DROP TRIGGER IF EXISTS {}",
            self.inner.identity.quoted()
        ))]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{bind, ExprExt};

    struct Music {
        artist: Table,
        artist_id: Column<i64>,
        artist_name: Column<String>,
        album: Table,
        album_artist: Column<i64>,
        album_title: Column<String>,
    }

    fn music() -> Music {
        let mut builder = Table::builder("Artist");
        let artist_id = builder.long("_id", |c| c.primary_key()).unwrap();
        let artist_name = builder.text("ArtistName", |c| c).unwrap();
        let artist = builder.build().unwrap();
        let mut builder = Table::builder("Album");
        let album_artist = builder.long("ArtistId", |c| c.references(&artist_id)).unwrap();
        let album_title = builder.text("Title", |c| c).unwrap();
        let album = builder.build().unwrap();
        Music {
            artist,
            artist_id,
            artist_name,
            album,
            album_artist,
            album_title,
        }
    }

    #[test]
    fn test_update_trigger_with_when_and_update_of() {
        let m = music();
        let trigger = Trigger::builder("rename", &m.artist, TriggerTiming::Before, TriggerEvent::Update)
            .update_of(&[&m.artist_name])
            .temporary()
            .build(|body| {
                let new_name = body.new_ref(&m.artist_name)?;
                let old_name = body.old_ref(&m.artist_name)?;
                body.when(&new_name.ne(&old_name))?;
                let old_id = body.old_ref(&m.artist_id)?;
                let update = m
                    .album
                    .update()
                    .set(|v| {
                        v.set_expr(&m.album_title, new_name.concat(" (renamed)"));
                    })?
                    .where_clause(m.album_artist.eq(old_id));
                body.update(&update)?;
                Ok(())
            })
            .unwrap();
        assert_eq!(
            trigger.ddl(false),
            concat!(
                r#"CREATE TEMP TRIGGER IF NOT EXISTS "rename" BEFORE UPDATE OF "ArtistName" ON "Artist" "#,
                r#"WHEN NEW."ArtistName" != OLD."ArtistName" BEGIN "#,
                r#"UPDATE "Album" SET "Title" = NEW."ArtistName" || ' (renamed)' WHERE "Album"."ArtistId" = OLD."_id"; END"#
            )
        );
        assert_eq!(
            trigger.drop_statements()[0].sql(),
            r#"DROP TRIGGER IF EXISTS "rename""#
        );
    }

    #[test]
    fn test_reference_validation() {
        let m = music();
        let err = Trigger::builder("t", &m.artist, TriggerTiming::After, TriggerEvent::Insert)
            .build(|body| {
                body.old_ref(&m.artist_id)?;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(
            err,
            ConstructionError::InvalidTriggerReference { ref reference, .. } if reference == "OLD._id"
        ));

        let err = Trigger::builder("t", &m.artist, TriggerTiming::After, TriggerEvent::Delete)
            .build(|body| {
                body.new_ref(&m.artist_id)?;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, ConstructionError::InvalidTriggerReference { .. }));

        let err = Trigger::builder("t", &m.artist, TriggerTiming::After, TriggerEvent::Update)
            .build(|body| {
                body.new_ref(&m.album_title)?;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, ConstructionError::InvalidTriggerReference { .. }));
    }

    #[test]
    fn test_body_rules() {
        let m = music();
        assert_eq!(
            Trigger::builder("empty", &m.artist, TriggerTiming::After, TriggerEvent::Insert)
                .build(|_| Ok(()))
                .unwrap_err(),
            ConstructionError::EmptyTriggerBody {
                trigger: String::from("empty"),
            }
        );
        let err = Trigger::builder("bound", &m.artist, TriggerTiming::After, TriggerEvent::Insert)
            .build(|body| {
                body.delete(&m.album.delete().where_clause(m.album_artist.eq(bind())))?;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(
            err,
            ConstructionError::UnexpectedBindArgument { object: "trigger", .. }
        ));
        assert!(matches!(
            Trigger::builder("bad", &m.artist, TriggerTiming::After, TriggerEvent::Delete)
                .update_of(&[&m.artist_name])
                .build(|_| Ok(())),
            Err(ConstructionError::InvalidTrigger { .. })
        ));
    }

    #[test]
    fn test_insert_body() {
        let m = music();
        let trigger = Trigger::builder("audit", &m.artist, TriggerTiming::After, TriggerEvent::Insert)
            .build(|body| {
                let new_id = body.new_ref(&m.artist_id)?;
                body.insert(&m.album.insert(), |v| {
                    v.set_expr(&m.album_artist, new_id).set(&m.album_title, "Untitled");
                })?;
                Ok(())
            })
            .unwrap();
        assert!(trigger.ddl(false).ends_with(
            r#"BEGIN INSERT INTO "Album" ("ArtistId", "Title") VALUES (NEW."_id", 'Untitled'); END"#
        ));
    }
}

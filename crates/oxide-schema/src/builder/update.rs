//! UPDATE statements.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::ConstructionError;
use crate::expr::{and_nodes, NodeRef, Predicate};
use crate::identity::Identity;
use crate::schema::{OnConflict, Table};

use super::{ColumnSet, ColumnValues, IntoColumnSet, SqlBuilder, StatementSeed};

// ============================================================================
// Typestate markers
// ============================================================================

/// Marker: no SET clause yet.
#[derive(Debug, Clone, Copy)]
pub struct NoAssignments;

/// Marker: the SET clause is present.
#[derive(Debug, Clone, Copy)]
pub struct HasAssignments;

/// An UPDATE of one table.
///
/// Only an update with assignments can be built, which the type parameter
/// tracks.
///
/// ```rust
/// use oxide_schema::{bind, ExprExt, Table, Update};
///
/// let mut builder = Table::builder("Album");
/// let id = builder.long("_id", |c| c.primary_key()).unwrap();
/// let name = builder.text("AlbumName", |c| c).unwrap();
/// let album = builder.build().unwrap();
///
/// let seed = Update::new(&album)
///     .set(|v| {
///         v.bind(&name);
///     })
///     .unwrap()
///     .where_clause(id.eq(bind()))
///     .build();
/// assert_eq!(
///     seed.sql(),
///     r#"UPDATE "Album" SET "AlbumName" = ? WHERE "Album"."_id" = ?"#
/// );
/// ```
#[derive(Debug, Clone)]
pub struct Update<State = NoAssignments> {
    table: Table,
    on_conflict: OnConflict,
    assignments: Vec<(Identity, NodeRef)>,
    from: Option<Arc<dyn ColumnSet>>,
    filter: Option<NodeRef>,
    _state: PhantomData<State>,
}

impl Update<NoAssignments> {
    /// Starts an update of `table`.
    #[must_use]
    pub fn new(table: &Table) -> Self {
        Self {
            table: table.clone(),
            on_conflict: OnConflict::Unspecified,
            assignments: Vec::new(),
            from: None,
            filter: None,
            _state: PhantomData,
        }
    }

    /// Sets the conflict resolution (`UPDATE OR ...`).
    #[must_use]
    pub fn on_conflict(mut self, on_conflict: OnConflict) -> Self {
        self.on_conflict = on_conflict;
        self
    }

    /// Provides the SET clause.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError::NoAssignments`] when `assign` assigns
    /// nothing, and [`ConstructionError::ForeignColumnAssignment`] when it
    /// assigns a column of another table.
    pub fn set<F>(self, assign: F) -> Result<Update<HasAssignments>, ConstructionError>
    where
        F: FnOnce(&mut ColumnValues),
    {
        let mut values = ColumnValues::new(self.table.identity().clone());
        assign(&mut values);
        let assignments = values.finish()?;
        if assignments.is_empty() {
            return Err(ConstructionError::NoAssignments {
                table: self.table.name().to_owned(),
            });
        }
        Ok(Update {
            table: self.table,
            on_conflict: self.on_conflict,
            assignments,
            from: None,
            filter: None,
            _state: PhantomData,
        })
    }
}

impl Update<HasAssignments> {
    /// Updates across a join: `UPDATE ... SET ... FROM source`.
    #[must_use]
    pub fn from_source(mut self, source: impl IntoColumnSet) -> Self {
        self.from = Some(source.into_column_set());
        self
    }

    /// Restricts the updated rows, ANDed with any previous condition.
    #[must_use]
    pub fn where_clause(mut self, predicate: Predicate) -> Self {
        self.filter = Some(and_nodes(self.filter.take(), predicate.node().clone()));
        self
    }

    /// Compiles the statement.
    #[must_use]
    pub fn build(&self) -> StatementSeed {
        let mut b = SqlBuilder::new();
        b.push(self.on_conflict.update_keyword())
            .push(" ")
            .push_identity(self.table.identity())
            .push(" SET ");
        for (i, (column, value)) in self.assignments.iter().enumerate() {
            if i > 0 {
                b.push(", ");
            }
            b.push_identity(column).push(" = ").push_node(value);
        }
        if let Some(from) = &self.from {
            b.push(" FROM ");
            from.append_from(&mut b);
        }
        if let Some(filter) = &self.filter {
            b.push(" WHERE ").push_node(filter);
        }
        b.into_seed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{bind, ExprExt};

    #[test]
    fn test_update_all_with_conflict() {
        let mut builder = Table::builder("Album");
        let year = builder.long("Year", |c| c).unwrap();
        let album = builder.build().unwrap();
        let seed = Update::new(&album)
            .on_conflict(OnConflict::Rollback)
            .set(|v| {
                v.set_expr(&year, year.plus(1));
            })
            .unwrap()
            .build();
        assert_eq!(
            seed.sql(),
            r#"UPDATE OR ROLLBACK "Album" SET "Year" = "Album"."Year" + 1"#
        );
    }

    #[test]
    fn test_update_requires_assignments() {
        let mut builder = Table::builder("Album");
        builder.long("Year", |c| c).unwrap();
        let album = builder.build().unwrap();
        assert_eq!(
            Update::new(&album).set(|_| {}).unwrap_err(),
            ConstructionError::NoAssignments {
                table: String::from("Album"),
            }
        );
    }

    #[test]
    fn test_update_from_join_binds_in_order() {
        let mut builder = Table::builder("Artist");
        let artist_id = builder.long("_id", |c| c.primary_key()).unwrap();
        let artist_name = builder.text("ArtistName", |c| c).unwrap();
        let artist = builder.build().unwrap();
        let mut builder = Table::builder("Album");
        let album_artist = builder.long("AlbumArtistId", |c| c).unwrap();
        let album_name = builder.text("AlbumName", |c| c).unwrap();
        let album = builder.build().unwrap();

        let seed = Update::new(&album)
            .set(|v| {
                v.bind(&album_name);
            })
            .unwrap()
            .from_source(&artist)
            .where_clause(album_artist.eq(&artist_id))
            .where_clause(artist_name.eq(bind()))
            .build();
        assert_eq!(
            seed.sql(),
            r#"UPDATE "Album" SET "AlbumName" = ? FROM "Artist" WHERE "Album"."AlbumArtistId" = "Artist"."_id" AND "Artist"."ArtistName" = ?"#
        );
        assert_eq!(seed.arg_count(), 2);
    }
}

//! Foreign-key dependency ordering between tables.
//!
//! A table depends on every other table its foreign keys reference. Tables
//! must be created after their dependencies and dropped before them.
//! Only this pairwise order is guaranteed; among independent tables the
//! order follows the input.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use tracing::{info, warn};

use crate::error::{CyclicDependencyError, Result};
use crate::executor::SqlExecutor;
use crate::identity::Identity;
use crate::schema::{Creatable, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    Unvisited,
    InProgress,
    Done,
}

/// The dependency graph of a set of tables.
///
/// Edges leaving the set and self references are ignored.
#[derive(Debug)]
pub struct TableDependencies<'a> {
    tables: Vec<&'a Table>,
    edges: Vec<Vec<usize>>,
}

impl<'a> TableDependencies<'a> {
    /// Builds the graph. Repeated tables are kept once, at their first
    /// position.
    pub fn new<I: IntoIterator<Item = &'a Table>>(tables: I) -> Self {
        let mut positions: HashMap<&Identity, usize> = HashMap::new();
        let mut unique: Vec<&'a Table> = Vec::new();
        for table in tables {
            if let Entry::Vacant(slot) = positions.entry(table.identity()) {
                slot.insert(unique.len());
                unique.push(table);
            }
        }
        let edges = unique
            .iter()
            .map(|table| {
                let mut targets: Vec<usize> = Vec::new();
                for fk in table.foreign_keys() {
                    if fk.referenced_table() == table.identity() {
                        continue;
                    }
                    if let Some(&target) = positions.get(fk.referenced_table()) {
                        if !targets.contains(&target) {
                            targets.push(target);
                        }
                    }
                }
                targets
            })
            .collect();
        Self {
            tables: unique,
            edges,
        }
    }

    /// The tables of the graph, in input order.
    #[must_use]
    pub fn tables(&self) -> &[&'a Table] {
        &self.tables
    }

    /// Tables of the set that `table` references.
    #[must_use]
    pub fn dependencies_of(&self, table: &Table) -> Vec<&'a Table> {
        self.tables
            .iter()
            .position(|t| *t == table)
            .map(|index| self.edges[index].iter().map(|&i| self.tables[i]).collect())
            .unwrap_or_default()
    }

    /// Whether the foreign keys form a cycle.
    #[must_use]
    pub fn has_cycle(&self) -> bool {
        self.creation_order().is_err()
    }

    fn visit(
        &self,
        index: usize,
        states: &mut [Visit],
        path: &mut Vec<usize>,
        order: &mut Vec<&'a Table>,
    ) -> std::result::Result<(), CyclicDependencyError> {
        match states[index] {
            Visit::Done => return Ok(()),
            Visit::InProgress => {
                let start = path.iter().position(|&i| i == index).unwrap_or(0);
                let tables = path[start..]
                    .iter()
                    .chain(std::iter::once(&index))
                    .map(|&i| self.tables[i].name().to_owned())
                    .collect();
                return Err(CyclicDependencyError { tables });
            }
            Visit::Unvisited => {}
        }
        states[index] = Visit::InProgress;
        path.push(index);
        for &target in &self.edges[index] {
            self.visit(target, states, path, order)?;
        }
        path.pop();
        states[index] = Visit::Done;
        order.push(self.tables[index]);
        Ok(())
    }

    /// Tables ordered so every table follows the tables it references.
    ///
    /// # Errors
    ///
    /// Returns [`CyclicDependencyError`] naming the tables of the first
    /// cycle found.
    pub fn creation_order(&self) -> std::result::Result<Vec<&'a Table>, CyclicDependencyError> {
        let mut states = vec![Visit::Unvisited; self.tables.len()];
        let mut path = Vec::new();
        let mut order = Vec::with_capacity(self.tables.len());
        for index in 0..self.tables.len() {
            self.visit(index, &mut states, &mut path, &mut order)?;
        }
        Ok(order)
    }

    /// The exact reverse of [`creation_order`](Self::creation_order).
    ///
    /// # Errors
    ///
    /// Same as [`creation_order`](Self::creation_order).
    pub fn drop_order(&self) -> std::result::Result<Vec<&'a Table>, CyclicDependencyError> {
        let mut order = self.creation_order()?;
        order.reverse();
        Ok(order)
    }
}

/// Creates `tables` and their indices in dependency order.
///
/// # Errors
///
/// Returns [`Error::CyclicDependency`](crate::Error::CyclicDependency)
/// before executing anything when the tables form a cycle, or the first
/// executor failure.
pub fn create_all<'a, I>(executor: &mut dyn SqlExecutor, tables: I) -> Result<()>
where
    I: IntoIterator<Item = &'a Table>,
{
    let graph = TableDependencies::new(tables);
    let order = graph.creation_order().inspect_err(|error| {
        warn!(%error, "Cannot order tables for creation");
    })?;
    info!(tables = order.len(), "Creating tables");
    for table in order {
        table.create(executor, false)?;
    }
    Ok(())
}

/// Drops `tables` in reverse dependency order.
///
/// # Errors
///
/// Same as [`create_all`].
pub fn drop_all<'a, I>(executor: &mut dyn SqlExecutor, tables: I) -> Result<()>
where
    I: IntoIterator<Item = &'a Table>,
{
    let graph = TableDependencies::new(tables);
    let order = graph.drop_order().inspect_err(|error| {
        warn!(%error, "Cannot order tables for drop");
    })?;
    info!(tables = order.len(), "Dropping tables");
    for table in order {
        table.drop(executor)?;
    }
    Ok(())
}

//! Parameterized WHERE clause builder for list queries.
//!
//! Clauses are collected with their bind parameters in order, so placeholder
//! numbering always matches the binding sequence.

use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::Postgres;
use uuid::Uuid;

use pangbank_core::TaxonFilter;

use crate::escape_like;

/// Type-safe parameter binding for SQL queries.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    Uuid(Uuid),
    String(String),
    Bool(bool),
    Int(i64),
}

/// Accumulates `AND`-joined clauses and their parameters.
#[derive(Debug, Default)]
pub struct FilterBuilder {
    clauses: Vec<String>,
    params: Vec<QueryParam>,
}

impl FilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index the next parameter will take.
    pub fn next_index(&self) -> usize {
        self.params.len() + 1
    }

    /// Add a clause taking one parameter; `clause` receives its placeholder index.
    pub fn push(&mut self, clause: impl FnOnce(usize) -> String, param: QueryParam) -> &mut Self {
        let idx = self.next_index();
        self.clauses.push(clause(idx));
        self.params.push(param);
        self
    }

    /// Add a clause taking two parameters, bound in order.
    pub fn push_pair(
        &mut self,
        clause: impl FnOnce(usize, usize) -> String,
        first: QueryParam,
        second: QueryParam,
    ) -> &mut Self {
        let idx = self.next_index();
        self.clauses.push(clause(idx, idx + 1));
        self.params.push(first);
        self.params.push(second);
        self
    }

    /// Add a clause without parameters.
    pub fn push_raw(&mut self, clause: impl Into<String>) -> &mut Self {
        self.clauses.push(clause.into());
        self
    }

    /// Restrict owners (genomes or pangenomes) to those linked to a matching taxon.
    ///
    /// Exact match compares names as-is; substring match is case-insensitive.
    pub fn taxon(
        &mut self,
        filter: &TaxonFilter,
        link_table: &str,
        link_column: &str,
        owner_id: &str,
    ) -> &mut Self {
        let Some(name) = filter.taxon_name.as_deref() else {
            return self;
        };
        let (predicate, value) = if filter.substring_match {
            (
                "LOWER(tf.name) LIKE",
                format!("%{}%", escape_like(&name.to_lowercase())),
            )
        } else {
            ("tf.name =", name.to_string())
        };
        let escape = if filter.substring_match {
            " ESCAPE '\\'"
        } else {
            ""
        };
        self.push(
            |idx| {
                format!(
                    "EXISTS (SELECT 1 FROM {link_table} lf JOIN taxon tf ON tf.id = lf.taxon_id \
                     WHERE lf.{link_column} = {owner_id} AND {predicate} ${idx}{escape})"
                )
            },
            QueryParam::String(value),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// `WHERE ...` fragment, or an empty string when no clause was added.
    pub fn where_clause(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub fn params(&self) -> &[QueryParam] {
        &self.params
    }
}

/// Bind parameters in order.
pub fn bind_params<'q>(
    mut q: Query<'q, Postgres, PgArguments>,
    params: &'q [QueryParam],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        q = match param {
            QueryParam::Uuid(id) => q.bind(id),
            QueryParam::String(s) => q.bind(s),
            QueryParam::Bool(b) => q.bind(b),
            QueryParam::Int(n) => q.bind(n),
        };
    }
    q
}

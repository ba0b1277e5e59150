//! Dialect translation.
//!
//! All SQL in the codebase is written in logical form: `?`
//! placeholders and no engine-specific functions. [`Dialect`] supplies
//! the engine-specific pieces at well-defined points: placeholder
//! rewriting at execution time, DDL fragments at bootstrap time, and
//! date-grouping expressions for the report catalog. There is no
//! free-form SQL rewriting anywhere else.

use chatarral_core::{Error, Result};

/// The two engines the application runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

/// Granularity for date-bucketed report queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateGrain {
    Day,
    Week,
    Month,
    Year,
}

impl Dialect {
    /// The n-th placeholder (1-based) in this dialect.
    pub fn placeholder(self, n: usize) -> String {
        match self {
            Self::Sqlite => "?".to_string(),
            Self::Postgres => format!("${n}"),
        }
    }

    /// Rewrites logical `?` placeholders into this dialect's form and
    /// verifies the placeholder count against the bound parameter
    /// count. A mismatch is a defect in the query catalog and fails
    /// before anything reaches the database.
    ///
    /// Question marks inside single-quoted string literals are left
    /// alone.
    pub fn translate(self, sql: &str, param_count: usize) -> Result<String> {
        let mut out = String::with_capacity(sql.len() + 8);
        let mut n = 0usize;
        let mut in_literal = false;
        for ch in sql.chars() {
            match ch {
                '\'' => {
                    in_literal = !in_literal;
                    out.push(ch);
                }
                '?' if !in_literal => {
                    n += 1;
                    match self {
                        Self::Sqlite => out.push('?'),
                        Self::Postgres => {
                            out.push('$');
                            out.push_str(&n.to_string());
                        }
                    }
                }
                _ => out.push(ch),
            }
        }
        if n != param_count {
            return Err(Error::QueryShape(format!(
                "la consulta tiene {n} marcadores pero {param_count} parámetros: {sql}"
            )));
        }
        Ok(out)
    }

    /// Boolean literal for fixed (non-bound) predicates.
    pub const fn bool_literal(self, value: bool) -> &'static str {
        match (self, value) {
            (Self::Sqlite, true) => "1",
            (Self::Sqlite, false) => "0",
            (Self::Postgres, true) => "TRUE",
            (Self::Postgres, false) => "FALSE",
        }
    }

    /// DDL fragment for an autoincrementing integer primary key.
    pub const fn autoincrement_pk(self) -> &'static str {
        match self {
            Self::Sqlite => "INTEGER PRIMARY KEY AUTOINCREMENT",
            Self::Postgres => "SERIAL PRIMARY KEY",
        }
    }

    /// DDL fragment for a creation-timestamp column default.
    pub const fn timestamp_default(self) -> &'static str {
        match self {
            Self::Sqlite => "DATETIME DEFAULT CURRENT_TIMESTAMP",
            Self::Postgres => "TIMESTAMP DEFAULT CURRENT_TIMESTAMP",
        }
    }

    /// Expression formatting a date column at the given grain, suitable
    /// for GROUP BY. Buckets are stable within an engine; day, month
    /// and year labels also match across engines (`2024-03-15`,
    /// `2024-03`, `2024`). Week labels differ near year boundaries:
    /// SQLite uses Monday-based `%Y-%W` numbering while Postgres uses
    /// ISO `IYYY-IW`.
    pub fn date_format(self, grain: DateGrain, column: &str) -> String {
        match self {
            Self::Sqlite => {
                let fmt = match grain {
                    DateGrain::Day => "%Y-%m-%d",
                    DateGrain::Week => "%Y-%W",
                    DateGrain::Month => "%Y-%m",
                    DateGrain::Year => "%Y",
                };
                format!("strftime('{fmt}', {column})")
            }
            Self::Postgres => {
                let fmt = match grain {
                    DateGrain::Day => "YYYY-MM-DD",
                    DateGrain::Week => "IYYY-IW",
                    DateGrain::Month => "YYYY-MM",
                    DateGrain::Year => "YYYY",
                };
                format!("to_char({column}, '{fmt}')")
            }
        }
    }

    /// Expression for the day of week as an integer, 0 = domingo on
    /// both engines.
    pub fn weekday(self, column: &str) -> String {
        match self {
            Self::Sqlite => format!("CAST(strftime('%w', {column}) AS INTEGER)"),
            Self::Postgres => format!("CAST(EXTRACT(DOW FROM {column}) AS INTEGER)"),
        }
    }
}

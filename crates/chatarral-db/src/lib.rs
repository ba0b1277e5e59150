//! # chatarral-db
//!
//! The request-to-SQL mapping layer that underlies every route.
//!
//! ## Architecture
//!
//! A route handler never writes SQL text with user input in it.
//! Instead it:
//!
//! 1. normalizes raw query parameters into a typed
//!    [`ListFilter`](filter::ListFilter),
//! 2. asks [`builder`] to compose a [`Statement`](storage::Statement)
//!    against a whitelisted [`TableSpec`](table::TableSpec) — all user
//!    values travel as bound parameters, identifiers only ever come
//!    from the fixed table catalog,
//! 3. hands the statement to a [`Storage`](storage::Storage)
//!    implementation, which translates the logical `?`-placeholder
//!    form into the concrete [`Dialect`](dialect::Dialect) syntax and
//!    executes it,
//! 4. receives canonical [`Row`](row::Row)s, already coerced so that
//!    aggregate columns are numbers (never NULL or numeric strings).

pub mod builder;
pub mod dialect;
pub mod filter;
pub mod row;
pub mod schema;
pub mod storage;
pub mod table;
pub mod value;

pub use builder::{
    build_count, build_delete, build_get, build_insert, build_list, build_list_all, build_update,
};
pub use dialect::{DateGrain, Dialect};
pub use filter::{ListFilter, RawListParams, TipoPrecio, DEFAULT_LIMIT, MAX_LIMIT};
pub use row::Row;
pub use storage::{ExecResult, Statement, Storage};
pub use table::TableSpec;
pub use value::Value;

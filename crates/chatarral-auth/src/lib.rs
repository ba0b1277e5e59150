//! # chatarral-auth
//!
//! Token and password primitives: HS256 JWTs with the access/refresh
//! split the API contract requires, and bcrypt password hashing.

pub mod passwords;
pub mod tokens;

pub use passwords::{hash_password, verify_password};
pub use tokens::{AccessClaims, RefreshClaims, TokenService};

//! Keystone Query
//!
//! Statement parsing and workload handling for the Keystone schema advisor.
//!
//! # Overview
//!
//! Statements are written in a small CQL-like grammar and bound to a
//! [`keystone_model::Model`] at parse time: field and entity references are
//! resolved to handles, paths are validated against the foreign-key graph,
//! and statement invariants (at least one equality predicate, at most one
//! range predicate, no predicates on foreign keys) are enforced before a
//! statement is handed to the planner.
//!
//! # Grammar
//!
//! ```text
//! SELECT <fields|*> FROM <path> [WHERE <cond> (AND <cond>)*]
//!     [ORDER BY <fields>] [LIMIT <n>]
//! UPDATE <entity> [FROM <path>] SET <setting>(, <setting>)* [WHERE ...]
//! INSERT INTO <entity> SET <setting>(, <setting>)*
//! DELETE <entity> [FROM <path>] [WHERE ...]
//! ```
//!
//! # Quick Start
//!
//! ```
//! use keystone_model::{EntityDef, ModelBuilder};
//! use keystone_query::parse_statement;
//!
//! let model = ModelBuilder::new()
//!     .entity(EntityDef::new("User", 100).id("UserId").string("City", 20))
//!     .build()
//!     .unwrap();
//!
//! let stmt = parse_statement(&model, "SELECT UserId FROM User WHERE User.City = ?").unwrap();
//! assert!(stmt.as_query().is_some());
//! ```

pub mod ast;
pub mod error;
pub mod parser;
pub mod workload;

pub use ast::{
    Condition, Delete, Insert, Literal, Operator, Query, Setting, Statement, Update,
};
pub use error::{ParseError, QueryError, QueryResult, StatementError};
pub use parser::parse_statement;
pub use workload::{WeightedStatement, Weights, Workload};

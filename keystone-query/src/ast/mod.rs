//! Statement AST types.
//!
//! All AST nodes are bound to the model: fields and entities appear as
//! handles, never as raw names. Construction validates the statement
//! invariants, so a value of these types is always well-formed.

mod condition;
mod literal;
mod statement;

pub use condition::{Condition, Operator};
pub use literal::Literal;
pub use statement::{Delete, Insert, Query, Setting, Statement, Update};

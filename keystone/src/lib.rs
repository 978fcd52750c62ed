//! Keystone
//!
//! An automated schema advisor for wide-column NoSQL stores. Given a
//! conceptual entity-relationship model and a weighted workload of read
//! queries and mutations, Keystone searches for the set of materialized
//! indexes (column families) that minimizes a cost function under a storage
//! budget, and produces an execution plan for every statement over the
//! chosen indexes.
//!
//! # Pipeline
//!
//! 1. Parse the model and workload ([`loader`] or the builder APIs).
//! 2. Enumerate candidate indexes for every query and every support query
//!    derived from mutations (`keystone-plan`).
//! 3. Search for minimum-cost plans per statement over the candidates.
//! 4. Select the indexes to materialize with a 0/1 program
//!    (`keystone-search`), jointly choosing one plan per query.
//!
//! # Example
//!
//! ```
//! use keystone::{Advisor, AdvisorConfig};
//! use keystone_model::{EntityDef, ModelBuilder};
//! use keystone_query::Workload;
//!
//! let model = ModelBuilder::new()
//!     .entity(
//!         EntityDef::new("User", 100)
//!             .id("UserId")
//!             .string("City", 20)
//!             .string("Username", 30),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let mut workload = Workload::new(model);
//! workload.add("SELECT Username FROM User WHERE User.City = ?", 1.0);
//!
//! let advisor = Advisor::new(AdvisorConfig::default());
//! let recommendation = advisor.advise(&workload).unwrap();
//! assert!(!recommendation.indexes.is_empty());
//! ```

pub mod advisor;
pub mod config;
pub mod error;
pub mod loader;
pub mod schema;

pub use advisor::Advisor;
pub use config::{AdvisorConfig, PlaceholderAction, PlaceholderPolicy};
pub use error::{Error, Result};
pub use loader::load_workload;
pub use schema::{
    IndexDescriptor, QueryRecommendation, Recommendation, UpdateRecommendation,
};

//! Keystone Model
//!
//! This crate provides the conceptual entity-relationship model that the
//! Keystone schema advisor works over.
//!
//! # Overview
//!
//! A [`Model`] is a frozen arena of entities. Each [`Entity`] has a positive
//! expected cardinality and an ordered set of fields; exactly one field per
//! entity is its identifier, and the rest are scalars or foreign keys.
//! Entities and fields are addressed by the integer handles [`EntityId`] and
//! [`FieldId`], so cross-references (foreign keys in particular) never form
//! ownership cycles.
//!
//! Statements and indexes traverse the model along a [`KeyPath`]: a sequence
//! of entities in which every adjacent pair is connected by a foreign key in
//! either direction.
//!
//! # Quick Start
//!
//! ```
//! use keystone_model::{Cardinality, EntityDef, ModelBuilder};
//!
//! let model = ModelBuilder::new()
//!     .entity(
//!         EntityDef::new("User", 100)
//!             .id("UserId")
//!             .string("City", 20)
//!             .string("Username", 30),
//!     )
//!     .entity(
//!         EntityDef::new("Tweet", 1000)
//!             .id("TweetId")
//!             .string("Body", 140)
//!             .foreign_key("User", "User", Cardinality::One),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let user = model.lookup_entity("User").unwrap();
//! let tweet = model.lookup_entity("Tweet").unwrap();
//! assert!(model.connected(user, tweet));
//! ```

pub mod builder;
pub mod entity;
pub mod error;
pub mod field;
pub mod model;
pub mod path;

pub use builder::{EntityDef, ModelBuilder};
pub use entity::Entity;
pub use error::{ModelError, ModelResult};
pub use field::{Cardinality, Field, FieldKind, ScalarKind};
pub use model::{Connection, EntityId, FieldId, Model};
pub use path::KeyPath;

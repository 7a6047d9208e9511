//! Core types, validation, and trait definitions for the Loom ontology
//! store.
//!
//! Deliberately free of database dependencies: the entity types, the batch
//! validator, the hierarchy builder, and the chain verifier are all pure,
//! and storage backends plug in through [`store::OntologyStore`].

pub mod document;
pub mod error;
pub mod hierarchy;
pub mod ontology;
pub mod provenance;
pub mod store;
pub mod validate;

pub use error::{Error, Result, ValidationError};

//! YAML policy schema types with serde deserialization.
//!
//! A policy file is a single [`PolicyDocument`]:
//! - `apiVersion` / `kind` header (kind must be `Policy`)
//! - [`PolicyMetadata`] (id, name, enabled flag)
//! - an ordered list of [`PolicyRule`]s granting or denying actions to users

mod document;
mod metadata;


pub use document::{Effect, PolicyDocument, PolicyRule, POLICY_KIND};
pub use metadata::PolicyMetadata;

//! Filesystem policy loader.
//!
//! Scans the policy directory for YAML files and builds one immutable
//! [`PolicySnapshot`](crate::PolicySnapshot) from all of them, or fails as a
//! whole. The loader never touches the store; callers swap the result in.

mod core;


pub use self::core::{is_policy_file, PolicyLoader, YamlPolicyLoader};

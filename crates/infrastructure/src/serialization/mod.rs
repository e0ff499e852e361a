//! JSON encoding for files written by the client.
//!
//! Output is stable across runs: 2-space indentation, keys in `BTreeMap`
//! order, trailing newline.

mod json;

pub use json::{SerializationError, from_json_bytes, to_json_stable_bytes};

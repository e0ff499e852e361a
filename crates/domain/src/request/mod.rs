//! Request types

mod descriptor;
mod method;

pub use descriptor::{AUTHORIZATION, RequestDescriptor, RequestFlags};
pub use method::HttpMethod;

//! Adapters for the transport and clock ports.

mod reqwest_transport;
mod system_clock;

pub use reqwest_transport::ReqwestTransport;
pub(crate) use reqwest_transport::{USER_AGENT, map_error};
pub use system_clock::SystemClock;

// Application layer: use cases on top of the repository.
// The CLI and the exporters talk to `AccountService` only.

pub mod error;
pub mod service;

pub use error::*;
pub use service::*;

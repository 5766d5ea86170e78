pub mod bell;
pub mod clock;
pub mod error;
pub mod models;
pub mod status;
pub mod sync;

pub use error::ModelError;
pub use status::{resolve_status, CurrentStatus};

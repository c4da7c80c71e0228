mod auth;
mod error;
mod logging;
mod server;

pub use auth::*;
pub use error::*;
pub use logging::*;
pub use server::*;

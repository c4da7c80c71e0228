pub mod dispatch_api;
pub mod domain;
pub mod http;

pub use dispatch_api::*;
pub use domain::*;
pub use http::*;

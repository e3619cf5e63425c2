mod config;
mod entities;
mod error;
mod report;
mod request;
mod response;
mod retry;

pub use config::*;
pub use entities::*;
pub use error::*;
pub use report::*;
pub use request::*;
pub use response::*;
pub use retry::*;

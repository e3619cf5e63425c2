//! Incremental crawler harvesting GitHub repository identity and star counts
//! into PostgreSQL, paced by the GraphQL API rate limits.

mod infrastructure;
mod interface;
mod model;

pub use infrastructure::*;
pub use interface::*;
pub use model::*;

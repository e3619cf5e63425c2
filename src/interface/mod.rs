mod clock;
mod crawler;
mod fetcher;
mod persister;

pub use clock::*;
pub use crawler::*;
pub use fetcher::*;
pub use persister::*;

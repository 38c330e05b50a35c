mod command;
mod fetcher;
mod search;

pub use fetcher::{MediaFetcher, YtdlFetcher};
pub use search::{VideoSearch, YtdlSearch};

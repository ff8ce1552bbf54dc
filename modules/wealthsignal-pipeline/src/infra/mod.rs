pub mod embedder;
pub mod encyclopedia;
pub mod fetcher;
pub mod intelligence;
pub mod search;

pub use embedder::Embedder;
pub use encyclopedia::WikipediaEncyclopedia;
pub use fetcher::{BrowserlessFetcher, HttpFetcher};
pub use intelligence::ClaudeIntelligence;
pub use search::{NoSearch, SerperSearcher};

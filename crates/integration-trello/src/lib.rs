pub mod interface;
pub mod trello;

pub use interface::{CardSource, RemoteCardSummary, SourceError};
pub use trello::{TrelloCardSource, TrelloConfig, DEFAULT_TRELLO_API_URL};

pub mod feed;
pub mod poller;
pub mod stream;

pub use feed::{FeedClient, FeedError, FeedEvent, PhaseEvent};
pub use poller::run_poller;
pub use stream::{IngestorState, StreamConfig, StreamIngestor};

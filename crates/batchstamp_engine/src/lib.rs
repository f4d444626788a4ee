//! Batchstamp engine: IO collaborators and effect execution.
mod batch_log;
mod crawl;
mod engine;
mod persist;
mod query;
mod space;
mod timestamper;
mod types;

pub use batch_log::BatchLog;
pub use crawl::{ChannelCrawlSink, CrawlSink, DiskCrawlJob};
pub use engine::{EngineConfig, EngineEvents, EngineHandle};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use query::{parse_reply_status, timestamp_query, PkiStatus};
pub use space::{FreeSpaceProbe, PartitionTable, SysinfoProbe};
pub use timestamper::{ReqwestTimestamper, Timestamper, TimestamperSettings};
pub use types::{EngineEvent, FailureKind, StampError, StampOutcome};

pub mod machine;
pub mod snapshot;

pub use machine::{BlobRetry, SearchStateMachine};
pub use snapshot::{SearchSnapshot, SNAPSHOT_VERSION};

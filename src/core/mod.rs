pub mod etl;
pub mod laws;
pub mod queue;
pub mod worker;

pub use crate::domain::model::{QueueEntry, QueueState, ThesisDocument};
pub use crate::domain::ports::{ArchiveStore, Embedder, QueueStore, Stores, ThesisSource};
pub use crate::utils::error::Result;

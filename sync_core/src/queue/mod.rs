pub mod job;
pub mod repository;

pub use job::{Job, NewJob};
pub use repository::{EnqueueOutcome, QueueRepository, SeaOrmQueueRepository};

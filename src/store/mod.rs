//! Relational persistence: records, chunks, question sets, sessions, and
//! checkpoints over one shared SQLite pool.

pub mod checkpoints;
pub mod chunks;
pub mod db;
pub mod questions;
pub mod records;
pub mod sessions;

pub use checkpoints::{CheckpointRow, CheckpointStore};
pub use chunks::{cosine_similarity, ChunkStore, NewChunk, StoredChunk};
pub use db::{connect, connect_in_memory};
pub use questions::{NewQuestion, NewQuestionSet, QuestionRow, QuestionSetRow, QuestionStore};
pub use records::{NewRecord, RecordRow, RecordStore};
pub use sessions::{SessionRegistry, SessionRow, SessionStats};

#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    AssessmentRepository, InMemoryRepository, QuestionRepository, ResultRepository, ResultRow,
    Storage, StorageError,
};
pub use sqlite::{SqliteInitError, SqliteRepository};

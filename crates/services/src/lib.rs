#![forbid(unsafe_code)]

pub mod error;
pub mod remote_results;
pub mod sessions;

pub use quiz_core::Clock;

pub use error::{RemoteResultsError, SessionError};
pub use remote_results::{RemoteResultsConfig, RemoteResultsService};

pub use sessions::{
    AnswerRecord, QuestionReview, Score, SessionFinishOutcome, SessionLoopService,
    SessionProgress, SessionService,
};

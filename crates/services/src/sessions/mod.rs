mod progress;
mod scoring;
mod selector;
mod session;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use progress::SessionProgress;
pub use scoring::{Score, category_breakdown, score_answers};
pub use selector::draw_questions;
pub use session::{AnswerRecord, QuestionReview, SessionService};
pub use workflow::{SessionFinishOutcome, SessionLoopService};

mod assessment;
mod ids;
mod question;
mod result;

pub use assessment::{Assessment, AssessmentError, AssessmentSettings};
pub use ids::{AssessmentId, ParseIdError, QuestionId, SessionId, UserId};
pub use question::{Question, QuestionError};
pub use result::{CategoryScore, FinishReason, SessionResult, SessionResultError};

use std::collections::BTreeMap;

use quiz_core::model::{CategoryScore, Question, SessionResult};

use super::session::AnswerRecord;

/// Aggregate score over a session's fixed question sequence.
///
/// `total` is the sequence length; unanswered questions count as incorrect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Score {
    pub correct: u32,
    pub total: u32,
    pub percentage: u8,
}

impl Score {
    /// Whether the score meets a caller-supplied pass threshold.
    #[must_use]
    pub fn is_pass(&self, threshold_percent: u8) -> bool {
        self.percentage >= threshold_percent
    }
}

/// Compute the score from the answer map.
///
/// Always recomputed from the recorded answers; nothing here is cached, so a
/// score can never diverge from the answers that produced it.
#[must_use]
pub fn score_answers(questions: &[Question], answers: &[Option<AnswerRecord>]) -> Score {
    debug_assert_eq!(questions.len(), answers.len());

    let correct = answers
        .iter()
        .flatten()
        .filter(|record| record.is_correct)
        .count();
    let correct = u32::try_from(correct).unwrap_or(u32::MAX);
    let total = u32::try_from(questions.len()).unwrap_or(u32::MAX);

    Score {
        correct,
        total,
        percentage: SessionResult::percentage_for(correct, total),
    }
}

/// Group correctness counts by question category.
///
/// Questions without a category land in the `"uncategorized"` bucket. Entries
/// come back sorted by category name so the breakdown is deterministic.
#[must_use]
pub fn category_breakdown(
    questions: &[Question],
    answers: &[Option<AnswerRecord>],
) -> Vec<CategoryScore> {
    debug_assert_eq!(questions.len(), answers.len());

    let mut buckets: BTreeMap<&str, (u32, u32)> = BTreeMap::new();
    for (question, answer) in questions.iter().zip(answers) {
        let category = question.category().unwrap_or(CategoryScore::UNCATEGORIZED);
        let entry = buckets.entry(category).or_insert((0, 0));
        entry.1 = entry.1.saturating_add(1);
        if answer.as_ref().is_some_and(|record| record.is_correct) {
            entry.0 = entry.0.saturating_add(1);
        }
    }

    buckets
        .into_iter()
        .map(|(category, (correct, total))| CategoryScore {
            category: category.to_string(),
            correct,
            total,
        })
        .collect()
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

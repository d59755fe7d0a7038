use rand::Rng;
use rand::seq::SliceRandom;

use quiz_core::model::Question;

/// Draw a session's question sequence from a pool.
///
/// Returns `min(count, pool.len())` questions with no duplicates, in an order
/// randomized per invocation. The RNG is injected so tests can assert an
/// exact draw; production callers pass `rand::rng()`.
///
/// An empty pool or `count == 0` yields an empty sequence, which the session
/// constructor treats as not-startable.
#[must_use]
pub fn draw_questions<R: Rng + ?Sized>(
    pool: &[Question],
    count: u32,
    rng: &mut R,
) -> Vec<Question> {
    if pool.is_empty() || count == 0 {
        return Vec::new();
    }

    let take = (count as usize).min(pool.len());
    let mut indices: Vec<usize> = (0..pool.len()).collect();
    indices.as_mut_slice().shuffle(rng);
    indices.truncate(take);

    indices.into_iter().map(|i| pool[i].clone()).collect()
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

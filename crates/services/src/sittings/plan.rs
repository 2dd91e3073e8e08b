use rand::rng;
use rand::seq::SliceRandom;

use quiz_core::model::{Question, QuestionId, Quiz};

/// Picks the question order of a new sitting from the quiz settings.
pub struct SittingPlanner<'a> {
    quiz: &'a Quiz,
}

impl<'a> SittingPlanner<'a> {
    #[must_use]
    pub fn new(quiz: &'a Quiz) -> Self {
        Self { quiz }
    }

    /// Questions keep storage order unless shuffled, then get cut to `max_questions`.
    #[must_use]
    pub fn build(self, questions: &[Question]) -> Vec<QuestionId> {
        let mut ids: Vec<QuestionId> = questions.iter().map(|q| q.id).collect();
        if self.quiz.random_order() {
            ids.as_mut_slice().shuffle(&mut rng());
        }
        if let Some(max) = self.quiz.max_questions() {
            ids.truncate(usize::try_from(max).unwrap_or(usize::MAX));
        }
        ids
    }
}

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use quiz_core::model::{Question, QuestionDraft, QuestionId, QuizId};
use storage::repository::QuestionRepository;

use crate::error::QuestionServiceError;

/// Question authoring for all four subclasses.
#[derive(Clone)]
pub struct QuestionService {
    questions: Arc<dyn QuestionRepository>,
}

impl QuestionService {
    #[must_use]
    pub fn new(questions: Arc<dyn QuestionRepository>) -> Self {
        Self { questions }
    }

    /// Sanitize, validate and persist a new question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionServiceError::Question` for validation failures.
    /// Returns `QuestionServiceError::Storage` (`NotFound`) when a quiz id is unknown.
    pub async fn create_question(
        &self,
        draft: QuestionDraft,
    ) -> Result<Question, QuestionServiceError> {
        let validated = sanitize(draft).validate()?;
        let question = self.questions.insert_question(validated).await?;
        tracing::info!(question_id = %question.id, kind = question.type_name(), "question created");
        Ok(question)
    }

    /// Replace a question. Multiple choice answers that carry their id keep it.
    ///
    /// # Errors
    ///
    /// Same as [`QuestionService::create_question`], plus `NotFound` for an unknown question.
    pub async fn update_question(
        &self,
        id: QuestionId,
        draft: QuestionDraft,
    ) -> Result<Question, QuestionServiceError> {
        let validated = sanitize(draft).validate()?;
        Ok(self.questions.update_question(id, validated).await?)
    }

    /// # Errors
    ///
    /// Returns `QuestionServiceError::Storage` (`NotFound`) for an unknown id.
    pub async fn get_question(&self, id: QuestionId) -> Result<Question, QuestionServiceError> {
        Ok(self.questions.get_question(id).await?)
    }

    /// Questions attached to a quiz, in storage order.
    ///
    /// # Errors
    ///
    /// Returns `QuestionServiceError::Storage` if repository access fails.
    pub async fn questions_for_quiz(
        &self,
        quiz: QuizId,
    ) -> Result<Vec<Question>, QuestionServiceError> {
        Ok(self.questions.questions_for_quiz(quiz).await?)
    }
}

fn sanitize(mut draft: QuestionDraft) -> QuestionDraft {
    draft.content = sanitize_html(&draft.content);
    draft.explanation = sanitize_html(&draft.explanation);
    draft
}

/// Keep basic formatting, drop scripts, styles and unknown attributes.
#[must_use]
pub fn sanitize_html(html: &str) -> String {
    let tags: HashSet<&str> = [
        "p", "div", "span", "br", "em", "strong", "b", "i", "u", "sub", "sup", "code", "pre",
        "blockquote", "ul", "ol", "li", "a", "img",
    ]
    .into_iter()
    .collect();

    let mut attributes: HashMap<&str, HashSet<&str>> = HashMap::new();
    attributes.insert("a", ["href"].into_iter().collect());
    attributes.insert("img", ["src", "alt"].into_iter().collect());

    ammonia::Builder::new()
        .tags(tags)
        .tag_attributes(attributes)
        .clean(html)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{OpenAnswerType, QuestionError, QuestionKind, QuestionKindDraft};
    use storage::repository::InMemoryRepository;

    fn open(content: &str, answer: &str) -> QuestionDraft {
        QuestionDraft {
            content: content.into(),
            explanation: "<b>because</b><script>alert(1)</script>".into(),
            category_id: None,
            sub_category_id: None,
            figure: None,
            quiz_ids: Vec::new(),
            kind: QuestionKindDraft::Open {
                answer: answer.into(),
                answer_type: OpenAnswerType::Number,
            },
        }
    }

    #[test]
    fn sanitize_strips_scripts_and_event_handlers() {
        let clean = sanitize_html(r#"<p onclick="x()">Hi<script>alert(1)</script></p>"#);
        assert_eq!(clean, "<p>Hi</p>");
    }

    #[tokio::test]
    async fn create_sanitizes_content_and_explanation() {
        let questions = QuestionService::new(Arc::new(InMemoryRepository::new()));
        let question = questions
            .create_question(open("<em>How many?</em><iframe></iframe>", "42"))
            .await
            .unwrap();
        assert_eq!(question.content, "<em>How many?</em>");
        assert_eq!(question.explanation, "<b>because</b>");
        assert!(matches!(question.kind, QuestionKind::Open { .. }));
        assert_eq!(questions.get_question(question.id).await.unwrap(), question);
    }

    #[tokio::test]
    async fn content_that_sanitizes_to_nothing_is_rejected() {
        let questions = QuestionService::new(Arc::new(InMemoryRepository::new()));
        let err = questions
            .create_question(open("<script>x</script>", "42"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            QuestionServiceError::Question(QuestionError::EmptyContent)
        ));
    }

    #[tokio::test]
    async fn number_questions_need_a_number() {
        let questions = QuestionService::new(Arc::new(InMemoryRepository::new()));
        let err = questions
            .create_question(open("How many?", "many"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            QuestionServiceError::Question(QuestionError::InvalidNumber(_))
        ));
    }
}

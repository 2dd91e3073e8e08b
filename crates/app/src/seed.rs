//! Demo content for a fresh database.

use quiz_core::model::{
    AnswerDraft, OpenAnswerType, QuestionDraft, QuestionKindDraft, QuizDraft, QuizId,
};
use services::{AppServices, QuizServiceError};
use storage::repository::StorageError;

pub const DEMO_SLUG: &str = "demo-quiz";

/// Create a demo category, quiz and one question of each kind.
///
/// Returns `None` when the demo quiz already exists.
pub async fn seed(services: &AppServices) -> Result<Option<QuizId>, Box<dyn std::error::Error>> {
    match services.quizzes().quiz_detail(DEMO_SLUG, None).await {
        Ok(_) => return Ok(None),
        Err(QuizServiceError::Storage(StorageError::NotFound)) => {}
        Err(err) => return Err(err.into()),
    }

    let category = match services.categories().get_by_name("General knowledge").await {
        Ok(existing) => existing,
        Err(_) => {
            services
                .categories()
                .create_category("General knowledge", "Questions about everything.")
                .await?
        }
    };
    let sub = services
        .categories()
        .create_sub_category(category.id(), "Science")
        .await?;

    let quiz = services
        .quizzes()
        .create_quiz(QuizDraft {
            title: "Demo quiz".into(),
            description: "A short quiz showing every question type.".into(),
            url: DEMO_SLUG.into(),
            category_id: Some(category.id()),
            pass_mark: 50,
            success_text: "Well done!".into(),
            fail_text: "Better luck next time.".into(),
            ..QuizDraft::default()
        })
        .await?;

    let question = |content: &str, explanation: &str, kind: QuestionKindDraft| QuestionDraft {
        content: content.into(),
        explanation: explanation.into(),
        category_id: Some(category.id()),
        sub_category_id: Some(sub.id()),
        figure: None,
        quiz_ids: vec![quiz.id()],
        kind,
    };
    let drafts = [
        question(
            "Which planet is closest to the sun?",
            "Mercury orbits at about 58 million km.",
            QuestionKindDraft::MultipleChoice {
                answer_order: None,
                allow_multiple_answers: false,
                answers: vec![
                    AnswerDraft {
                        id: None,
                        content: "Mercury".into(),
                        correct: true,
                    },
                    AnswerDraft {
                        id: None,
                        content: "Venus".into(),
                        correct: false,
                    },
                    AnswerDraft {
                        id: None,
                        content: "Mars".into(),
                        correct: false,
                    },
                ],
            },
        ),
        question(
            "Water boils at 100 degrees Celsius at sea level.",
            "",
            QuestionKindDraft::TrueFalse { correct: true },
        ),
        question(
            "How many legs does a spider have?",
            "All arachnids have eight legs.",
            QuestionKindDraft::Open {
                answer: "8".into(),
                answer_type: OpenAnswerType::Number,
            },
        ),
        question(
            "Explain why the sky is blue.",
            "Look up Rayleigh scattering.",
            QuestionKindDraft::Essay,
        ),
    ];
    for draft in drafts {
        services.questions().create_question(draft).await?;
    }

    Ok(Some(quiz.id()))
}

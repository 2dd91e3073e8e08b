use quiz_core::model::{
    AnswerId, AnswerOption, AnswerOrder, MultipleChoice, OpenAnswerType, Question, QuestionId,
    QuestionKind, QuestionKindDraft, QuizId, ValidatedQuestion,
};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{Row, SqlitePool};

use super::SqliteRepository;
use super::mapping::{
    category_id, db, get_bool, question_id, quiz_id, ser, sub_category_id, to_i64,
};
use crate::repository::{QuestionRepository, StorageError, assemble_question};

const QUESTION_COLUMNS: &str = r"
    q.id, q.question_type, q.content, q.explanation, q.category_id, q.sub_category_id,
    q.figure, q.answer_order, q.allow_multiple_answers, q.tf_correct, q.open_answer,
    q.open_answer_type
";

/// Subclass specific columns of the `questions` table.
struct KindColumns<'a> {
    answer_order: Option<&'static str>,
    allow_multiple_answers: bool,
    tf_correct: Option<bool>,
    open_answer: Option<&'a str>,
    open_answer_type: Option<&'static str>,
}

fn kind_columns(kind: &QuestionKind) -> KindColumns<'_> {
    let mut cols = KindColumns {
        answer_order: None,
        allow_multiple_answers: false,
        tf_correct: None,
        open_answer: None,
        open_answer_type: None,
    };
    match kind {
        QuestionKind::MultipleChoice(mc) => {
            cols.answer_order = mc.answer_order.map(AnswerOrder::as_str);
            cols.allow_multiple_answers = mc.allow_multiple_answers;
        }
        QuestionKind::TrueFalse { correct } => cols.tf_correct = Some(*correct),
        QuestionKind::Open {
            answer,
            answer_type,
        } => {
            cols.open_answer = Some(answer.as_str());
            cols.open_answer_type = Some(answer_type.as_str());
        }
        QuestionKind::Essay => {}
    }
    cols
}

fn id_list_placeholders(start: usize, count: usize) -> String {
    (0..count)
        .map(|i| format!("?{}", i + start))
        .collect::<Vec<_>>()
        .join(", ")
}

async fn next_answer_id(conn: &mut SqliteConnection) -> Result<AnswerId, StorageError> {
    let row = sqlx::query("SELECT COALESCE(MAX(id), 0) + 1 AS next FROM answers")
        .fetch_one(&mut *conn)
        .await
        .map_err(db)?;
    let next: i64 = row.try_get("next").map_err(ser)?;
    Ok(AnswerId::new(u64::try_from(next).map_err(ser)?))
}

async fn stored_answer_ids(
    conn: &mut SqliteConnection,
    id: QuestionId,
) -> Result<Vec<AnswerId>, StorageError> {
    let rows = sqlx::query("SELECT id FROM answers WHERE question_id = ?1")
        .bind(to_i64("question_id", id.value())?)
        .fetch_all(&mut *conn)
        .await
        .map_err(db)?;
    rows.iter()
        .map(|row| {
            let v: i64 = row.try_get("id").map_err(ser)?;
            Ok(AnswerId::new(u64::try_from(v).map_err(ser)?))
        })
        .collect()
}

/// Pre-allocate ids for answers that do not have one yet.
async fn fresh_answer_ids(
    conn: &mut SqliteConnection,
    question: &ValidatedQuestion,
) -> Result<Vec<AnswerId>, StorageError> {
    let missing = match &question.kind {
        QuestionKindDraft::MultipleChoice { answers, .. } => {
            answers.iter().filter(|a| a.id.is_none()).count()
        }
        _ => 0,
    };
    if missing == 0 {
        return Ok(Vec::new());
    }
    let first = next_answer_id(conn).await?.value();
    let missing = u64::try_from(missing).map_err(ser)?;
    Ok((0..missing).map(|i| AnswerId::new(first + i)).collect())
}

/// Write every column and child row of `question`, replacing previous state.
async fn write_question(
    conn: &mut SqliteConnection,
    question: &Question,
    insert: bool,
) -> Result<(), StorageError> {
    let qid = to_i64("question_id", question.id.value())?;
    let cols = kind_columns(&question.kind);
    let sql = if insert {
        r"
        INSERT INTO questions (
            id, question_type, content, explanation, category_id, sub_category_id, figure,
            answer_order, allow_multiple_answers, tf_correct, open_answer, open_answer_type
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "
    } else {
        r"
        UPDATE questions SET
            question_type = ?2,
            content = ?3,
            explanation = ?4,
            category_id = ?5,
            sub_category_id = ?6,
            figure = ?7,
            answer_order = ?8,
            allow_multiple_answers = ?9,
            tf_correct = ?10,
            open_answer = ?11,
            open_answer_type = ?12
        WHERE id = ?1
        "
    };
    let res = sqlx::query(sql)
        .bind(qid)
        .bind(question.type_name())
        .bind(question.content.as_str())
        .bind(question.explanation.as_str())
        .bind(
            question
                .category_id
                .map(|c| to_i64("category_id", c.value()))
                .transpose()?,
        )
        .bind(
            question
                .sub_category_id
                .map(|c| to_i64("sub_category_id", c.value()))
                .transpose()?,
        )
        .bind(question.figure.as_deref())
        .bind(cols.answer_order)
        .bind(cols.allow_multiple_answers)
        .bind(cols.tf_correct)
        .bind(cols.open_answer)
        .bind(cols.open_answer_type)
        .execute(&mut *conn)
        .await
        .map_err(db)?;
    if res.rows_affected() == 0 {
        return Err(StorageError::NotFound);
    }

    let kept: Vec<AnswerId> = match &question.kind {
        QuestionKind::MultipleChoice(mc) => mc.answers.iter().map(|a| a.id).collect(),
        _ => Vec::new(),
    };
    let mut delete = String::from("DELETE FROM answers WHERE question_id = ?1");
    if !kept.is_empty() {
        delete.push_str(" AND id NOT IN (");
        delete.push_str(&id_list_placeholders(2, kept.len()));
        delete.push(')');
    }
    let mut q = sqlx::query(&delete).bind(qid);
    for id in &kept {
        q = q.bind(to_i64("answer_id", id.value())?);
    }
    q.execute(&mut *conn).await.map_err(db)?;

    if let QuestionKind::MultipleChoice(mc) = &question.kind {
        for (position, answer) in mc.answers.iter().enumerate() {
            sqlx::query(
                r"
                INSERT INTO answers (id, question_id, position, content, correct)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(id) DO UPDATE SET
                    position = excluded.position,
                    content = excluded.content,
                    correct = excluded.correct
                ",
            )
            .bind(to_i64("answer_id", answer.id.value())?)
            .bind(qid)
            .bind(i64::try_from(position).map_err(ser)?)
            .bind(answer.content.as_str())
            .bind(answer.correct)
            .execute(&mut *conn)
            .await
            .map_err(db)?;
        }
    }

    sqlx::query("DELETE FROM quiz_questions WHERE question_id = ?1")
        .bind(qid)
        .execute(&mut *conn)
        .await
        .map_err(db)?;
    for quiz in &question.quiz_ids {
        sqlx::query("INSERT INTO quiz_questions (quiz_id, question_id) VALUES (?1, ?2)")
            .bind(to_i64("quiz_id", quiz.value())?)
            .bind(qid)
            .execute(&mut *conn)
            .await
            .map_err(db)?;
    }
    Ok(())
}

async fn load_children(
    pool: &SqlitePool,
    row: &SqliteRow,
) -> Result<Question, StorageError> {
    let id = question_id(row, "id")?;
    let qid = to_i64("question_id", id.value())?;

    let quiz_rows =
        sqlx::query("SELECT quiz_id FROM quiz_questions WHERE question_id = ?1 ORDER BY quiz_id")
            .bind(qid)
            .fetch_all(pool)
            .await
            .map_err(db)?;
    let quiz_ids = quiz_rows
        .iter()
        .map(|r| quiz_id(r, "quiz_id"))
        .collect::<Result<Vec<QuizId>, _>>()?;

    let type_name: String = row.try_get("question_type").map_err(ser)?;
    let kind = match type_name.as_str() {
        "multiple_choice" => {
            let answer_rows = sqlx::query(
                r"
                SELECT id, content, correct FROM answers
                WHERE question_id = ?1
                ORDER BY position ASC, id ASC
                ",
            )
            .bind(qid)
            .fetch_all(pool)
            .await
            .map_err(db)?;
            let mut answers = Vec::with_capacity(answer_rows.len());
            for r in &answer_rows {
                let answer_id: i64 = r.try_get("id").map_err(ser)?;
                answers.push(AnswerOption {
                    id: AnswerId::new(u64::try_from(answer_id).map_err(ser)?),
                    content: r.try_get("content").map_err(ser)?,
                    correct: get_bool(r, "correct")?,
                });
            }
            let answer_order = row
                .try_get::<Option<String>, _>("answer_order")
                .map_err(ser)?
                .map(|s| {
                    AnswerOrder::parse(&s)
                        .ok_or_else(|| StorageError::Serialization(format!("answer_order {s}")))
                })
                .transpose()?;
            QuestionKind::MultipleChoice(MultipleChoice {
                answer_order,
                allow_multiple_answers: get_bool(row, "allow_multiple_answers")?,
                answers,
            })
        }
        "true_false" => QuestionKind::TrueFalse {
            correct: row
                .try_get::<Option<i64>, _>("tf_correct")
                .map_err(ser)?
                .is_some_and(|v| v != 0),
        },
        "open" => {
            let answer_type: String = row
                .try_get::<Option<String>, _>("open_answer_type")
                .map_err(ser)?
                .unwrap_or_default();
            QuestionKind::Open {
                answer: row
                    .try_get::<Option<String>, _>("open_answer")
                    .map_err(ser)?
                    .unwrap_or_default(),
                answer_type: OpenAnswerType::parse(&answer_type).ok_or_else(|| {
                    StorageError::Serialization(format!("open_answer_type {answer_type}"))
                })?,
            }
        }
        "essay" => QuestionKind::Essay,
        other => {
            return Err(StorageError::Serialization(format!(
                "unknown question type: {other}"
            )));
        }
    };

    Ok(Question {
        id,
        content: row.try_get("content").map_err(ser)?,
        explanation: row.try_get("explanation").map_err(ser)?,
        category_id: category_id(row, "category_id")?,
        sub_category_id: sub_category_id(row, "sub_category_id")?,
        figure: row.try_get("figure").map_err(ser)?,
        quiz_ids,
        kind,
    })
}

impl SqliteRepository {
    async fn load_question(&self, id: QuestionId) -> Result<Question, StorageError> {
        let sql = format!("SELECT {QUESTION_COLUMNS} FROM questions q WHERE q.id = ?1");
        let row = sqlx::query(&sql)
            .bind(to_i64("question_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?
            .ok_or(StorageError::NotFound)?;
        load_children(&self.pool, &row).await
    }
}

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn insert_question(
        &self,
        question: ValidatedQuestion,
    ) -> Result<Question, StorageError> {
        let mut tx = self.pool.begin().await.map_err(db)?;
        let row = sqlx::query("SELECT COALESCE(MAX(id), 0) + 1 AS next FROM questions")
            .fetch_one(&mut *tx)
            .await
            .map_err(db)?;
        let next: i64 = row.try_get("next").map_err(ser)?;
        let id = QuestionId::new(u64::try_from(next).map_err(ser)?);

        let mut fresh = fresh_answer_ids(&mut *tx, &question).await?.into_iter();
        let assembled = assemble_question(id, question, &[], || {
            fresh.next().ok_or(StorageError::Conflict)
        })?;
        write_question(&mut *tx, &assembled, true).await?;
        tx.commit().await.map_err(db)?;
        Ok(assembled)
    }

    async fn update_question(
        &self,
        id: QuestionId,
        question: ValidatedQuestion,
    ) -> Result<Question, StorageError> {
        let mut tx = self.pool.begin().await.map_err(db)?;
        let existing = stored_answer_ids(&mut *tx, id).await?;
        let mut fresh = fresh_answer_ids(&mut *tx, &question).await?.into_iter();
        let assembled = assemble_question(id, question, &existing, || {
            fresh.next().ok_or(StorageError::Conflict)
        })?;
        write_question(&mut *tx, &assembled, false).await?;
        tx.commit().await.map_err(db)?;
        Ok(assembled)
    }

    async fn get_question(&self, id: QuestionId) -> Result<Question, StorageError> {
        self.load_question(id).await
    }

    async fn questions_for_quiz(&self, quiz: QuizId) -> Result<Vec<Question>, StorageError> {
        let sql = format!(
            r"
            SELECT {QUESTION_COLUMNS}
            FROM questions q
            JOIN quiz_questions qq ON qq.question_id = q.id
            WHERE qq.quiz_id = ?1
            ORDER BY q.id ASC
            "
        );
        let rows = sqlx::query(&sql)
            .bind(to_i64("quiz_id", quiz.value())?)
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;
        let mut questions = Vec::with_capacity(rows.len());
        for row in &rows {
            questions.push(load_children(&self.pool, row).await?);
        }
        Ok(questions)
    }

    async fn set_quiz_questions(
        &self,
        quiz: QuizId,
        ids: &[QuestionId],
    ) -> Result<(), StorageError> {
        let quiz_i64 = to_i64("quiz_id", quiz.value())?;
        let mut tx = self.pool.begin().await.map_err(db)?;

        let exists = sqlx::query("SELECT 1 FROM quizzes WHERE id = ?1")
            .bind(quiz_i64)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db)?;
        if exists.is_none() {
            return Err(StorageError::NotFound);
        }

        sqlx::query("DELETE FROM quiz_questions WHERE quiz_id = ?1")
            .bind(quiz_i64)
            .execute(&mut *tx)
            .await
            .map_err(db)?;
        for id in ids {
            sqlx::query(
                r"
                INSERT INTO quiz_questions (quiz_id, question_id) VALUES (?1, ?2)
                ON CONFLICT(quiz_id, question_id) DO NOTHING
                ",
            )
            .bind(quiz_i64)
            .bind(to_i64("question_id", id.value())?)
            .execute(&mut *tx)
            .await
            .map_err(db)?;
        }
        tx.commit().await.map_err(db)?;
        Ok(())
    }

    async fn delete_question(&self, id: QuestionId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM questions WHERE id = ?1")
            .bind(to_i64("question_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(db)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}

use quiz_core::model::{
    AnswerMap, AnswerRecord, FinalizedAttempt, Profile, QuestionId, Subject, SubjectId, TestId,
    UserId,
};
use sqlx::Row;

use crate::repository::{AttemptRow, QuestionRecord, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn subject_id_from_i64(v: i64) -> Result<SubjectId, StorageError> {
    u64::try_from(v)
        .map(SubjectId::new)
        .map_err(|_| StorageError::Serialization("subject_id sign overflow".into()))
}

pub(crate) fn user_id_from_str(s: &str) -> Result<UserId, StorageError> {
    s.parse::<UserId>()
        .map_err(|e| StorageError::Serialization(format!("invalid user_id {s:?}: {e}")))
}

pub(crate) fn map_subject_row(row: &sqlx::sqlite::SqliteRow) -> Result<Subject, StorageError> {
    Subject::new(
        subject_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        row.try_get::<String, _>("name").map_err(ser)?,
        row.try_get::<Option<String>, _>("description").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_question_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<QuestionRecord, StorageError> {
    let options_json: String = row.try_get("options").map_err(ser)?;
    let options: Vec<String> = serde_json::from_str(&options_json).map_err(ser)?;
    Ok(QuestionRecord {
        id: row.try_get("id").map_err(ser)?,
        prompt: row.try_get("prompt").map_err(ser)?,
        options,
        correct_index: row.try_get("correct_index").map_err(ser)?,
        explanation: row.try_get("explanation").map_err(ser)?,
    })
}

pub(crate) fn map_attempt_row(row: &sqlx::sqlite::SqliteRow) -> Result<AttemptRow, StorageError> {
    let id: i64 = row.try_get("id").map_err(ser)?;
    let user_id = user_id_from_str(&row.try_get::<String, _>("user_id").map_err(ser)?)?;
    let test_id = TestId::new(row.try_get::<String, _>("test_id").map_err(ser)?).map_err(ser)?;
    let score_i64: i64 = row.try_get("score").map_err(ser)?;
    let score = u8::try_from(score_i64)
        .map_err(|_| StorageError::Serialization(format!("invalid score: {score_i64}")))?;
    let answers_json: String = row.try_get("answers").map_err(ser)?;
    let answers: AnswerMap = serde_json::from_str(&answers_json).map_err(ser)?;

    let attempt = FinalizedAttempt::from_persisted(
        test_id,
        row.try_get("subject").map_err(ser)?,
        user_id,
        score,
        u32_from_i64(
            "correct_count",
            row.try_get::<i64, _>("correct_count").map_err(ser)?,
        )?,
        u32_from_i64(
            "total_questions",
            row.try_get::<i64, _>("total_questions").map_err(ser)?,
        )?,
        answers,
        row.try_get("started_at").map_err(ser)?,
        row.try_get("completed_at").map_err(ser)?,
    )
    .map_err(ser)?;
    Ok(AttemptRow::new(id, attempt))
}

pub(crate) fn map_answer_row(row: &sqlx::sqlite::SqliteRow) -> Result<AnswerRecord, StorageError> {
    Ok(AnswerRecord {
        question_index: u32_from_i64(
            "question_index",
            row.try_get::<i64, _>("question_index").map_err(ser)?,
        )?,
        question_id: QuestionId::new(row.try_get::<String, _>("question_id").map_err(ser)?)
            .map_err(ser)?,
        question_text: row.try_get("question_text").map_err(ser)?,
        selected_answer: row.try_get("selected_answer").map_err(ser)?,
        correct_answer: row.try_get("correct_answer").map_err(ser)?,
        is_correct: row.try_get("is_correct").map_err(ser)?,
        subject: row.try_get("subject").map_err(ser)?,
    })
}

pub(crate) fn map_profile_row(row: &sqlx::sqlite::SqliteRow) -> Result<Profile, StorageError> {
    Profile::new(
        user_id_from_str(&row.try_get::<String, _>("user_id").map_err(ser)?)?,
        row.try_get::<String, _>("display_name").map_err(ser)?,
        row.try_get::<Option<String>, _>("avatar_url").map_err(ser)?,
    )
    .map_err(ser)
}

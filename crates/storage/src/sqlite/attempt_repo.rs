use quiz_core::model::{AnswerRecord, UserId};

use super::SqliteRepository;
use super::mapping::{conn, map_answer_row, map_attempt_row, ser};
use crate::repository::{AttemptId, AttemptRepository, AttemptRow, NewAttemptRecord, StorageError};

const ATTEMPT_COLUMNS: &str = r"
    id, user_id, test_id, subject, score, correct_count, total_questions,
    answers, started_at, completed_at
";

#[async_trait::async_trait]
impl AttemptRepository for SqliteRepository {
    async fn append_attempt(&self, record: &NewAttemptRecord) -> Result<AttemptId, StorageError> {
        let attempt = &record.attempt;
        let answers_json = serde_json::to_string(attempt.answers()).map_err(ser)?;

        let mut tx = self.pool.begin().await.map_err(conn)?;

        let res = sqlx::query(
            r"
                INSERT INTO quiz_sessions (
                    user_id, test_id, subject, score, correct_count, total_questions,
                    answers, started_at, completed_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
        )
        .bind(attempt.user_id().to_string())
        .bind(attempt.test_id().as_str())
        .bind(attempt.subject())
        .bind(i64::from(attempt.score()))
        .bind(i64::from(attempt.correct_count()))
        .bind(i64::from(attempt.total_questions()))
        .bind(answers_json)
        .bind(attempt.started_at())
        .bind(attempt.completed_at())
        .execute(&mut *tx)
        .await
        .map_err(conn)?;
        let session_id = res.last_insert_rowid();

        for answer in &record.answers {
            sqlx::query(
                r"
                    INSERT INTO quiz_answers (
                        session_id, question_index, question_id, question_text,
                        selected_answer, correct_answer, is_correct, subject
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ",
            )
            .bind(session_id)
            .bind(i64::from(answer.question_index))
            .bind(answer.question_id.as_str())
            .bind(answer.question_text.as_str())
            .bind(answer.selected_answer.as_deref())
            .bind(answer.correct_answer.as_str())
            .bind(answer.is_correct)
            .bind(answer.subject.as_str())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(session_id)
    }

    async fn get_attempt(&self, id: AttemptId) -> Result<AttemptRow, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM quiz_sessions WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        map_attempt_row(&row)
    }

    async fn list_attempts_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<AttemptRow>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM quiz_sessions
             WHERE user_id = ?1
             ORDER BY completed_at DESC, id DESC"
        ))
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_attempt_row).collect()
    }

    async fn list_all_attempts(&self) -> Result<Vec<AttemptRow>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM quiz_sessions
             ORDER BY completed_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_attempt_row).collect()
    }

    async fn list_recent_attempts(&self, limit: u32) -> Result<Vec<AttemptRow>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM quiz_sessions
             ORDER BY completed_at DESC, id DESC
             LIMIT ?1"
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_attempt_row).collect()
    }

    async fn answers_for_attempt(&self, id: AttemptId) -> Result<Vec<AnswerRecord>, StorageError> {
        let exists = sqlx::query("SELECT 1 FROM quiz_sessions WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        if exists.is_none() {
            return Err(StorageError::NotFound);
        }

        let rows = sqlx::query(
            r"
                SELECT question_index, question_id, question_text, selected_answer,
                       correct_answer, is_correct, subject
                FROM quiz_answers
                WHERE session_id = ?1
                ORDER BY question_index ASC
            ",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_answer_row).collect()
    }
}

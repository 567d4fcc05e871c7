use quiz_core::model::{Exam, Subject, SubjectId, TestId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, id_i64, map_question_row, map_subject_row, ser};
use crate::repository::{CatalogRepository, ExamRecord, QuestionRecord, StorageError};

fn map_insert_error(e: sqlx::Error) -> StorageError {
    match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
        other => conn(other),
    }
}

fn map_exam_header(row: &sqlx::sqlite::SqliteRow) -> Result<ExamRecord, StorageError> {
    Ok(ExamRecord {
        id: row.try_get("id").map_err(ser)?,
        title: row.try_get("title").map_err(ser)?,
        subject: row.try_get("subject_name").map_err(ser)?,
        description: row.try_get("description").map_err(ser)?,
        time_limit_minutes: row.try_get("time_limit_minutes").map_err(ser)?,
        questions: Vec::new(),
    })
}

impl SqliteRepository {
    async fn question_records(&self, exam_id: &str) -> Result<Vec<QuestionRecord>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, prompt, options, correct_index, explanation
                FROM questions
                WHERE exam_id = ?1
                ORDER BY position ASC
            ",
        )
        .bind(exam_id)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_question_row).collect()
    }

    async fn load_exam(&self, mut header: ExamRecord) -> Result<Exam, StorageError> {
        header.questions = self.question_records(&header.id).await?;
        header.into_exam()
    }
}

#[async_trait::async_trait]
impl CatalogRepository for SqliteRepository {
    async fn insert_subject(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Subject, StorageError> {
        // Validate before touching the table.
        let draft =
            Subject::new(SubjectId::new(0), name, description.map(str::to_owned)).map_err(ser)?;

        let res = sqlx::query(
            r"
                INSERT INTO subjects (name, description)
                VALUES (?1, ?2)
            ",
        )
        .bind(draft.name())
        .bind(draft.description())
        .execute(&self.pool)
        .await
        .map_err(map_insert_error)?;

        let id = u64::try_from(res.last_insert_rowid())
            .map_err(|_| StorageError::Serialization("subject_id sign overflow".into()))?;
        Subject::new(
            SubjectId::new(id),
            draft.name(),
            draft.description().map(str::to_owned),
        )
        .map_err(ser)
    }

    async fn subject_by_name(&self, name: &str) -> Result<Option<Subject>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT id, name, description
                FROM subjects
                WHERE name = ?1
            ",
        )
        .bind(name.trim())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_subject_row).transpose()
    }

    async fn list_subjects(&self) -> Result<Vec<Subject>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, name, description
                FROM subjects
                ORDER BY name ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_subject_row).collect()
    }

    async fn upsert_exam(&self, exam: &Exam) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let subject_id: i64 = sqlx::query("SELECT id FROM subjects WHERE name = ?1")
            .bind(exam.subject())
            .fetch_optional(&mut *tx)
            .await
            .map_err(conn)?
            .ok_or(StorageError::NotFound)?
            .try_get("id")
            .map_err(ser)?;

        sqlx::query(
            r"
                INSERT INTO exams (id, subject_id, title, description, time_limit_minutes)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(id) DO UPDATE SET
                    subject_id = excluded.subject_id,
                    title = excluded.title,
                    description = excluded.description,
                    time_limit_minutes = excluded.time_limit_minutes
            ",
        )
        .bind(exam.id().as_str())
        .bind(subject_id)
        .bind(exam.title())
        .bind(exam.description())
        .bind(i64::from(exam.time_limit_minutes()))
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        // Question lists are replaced wholesale so positions stay dense.
        sqlx::query("DELETE FROM questions WHERE exam_id = ?1")
            .bind(exam.id().as_str())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for (position, question) in exam.questions().iter().enumerate() {
            let options = serde_json::to_string(question.options()).map_err(ser)?;
            sqlx::query(
                r"
                    INSERT INTO questions (
                        exam_id, id, position, prompt, options, correct_index, explanation
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ",
            )
            .bind(exam.id().as_str())
            .bind(question.id().as_str())
            .bind(id_i64("position", position as u64)?)
            .bind(question.prompt())
            .bind(options)
            .bind(id_i64("correct_index", question.correct_index() as u64)?)
            .bind(question.explanation())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn get_exam(&self, id: &TestId) -> Result<Option<Exam>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT e.id, e.title, e.description, e.time_limit_minutes,
                       s.name AS subject_name
                FROM exams e
                JOIN subjects s ON s.id = e.subject_id
                WHERE e.id = ?1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        let Some(header) = row.as_ref().map(map_exam_header).transpose()? else {
            return Ok(None);
        };
        drop(row);
        self.load_exam(header).await.map(Some)
    }

    async fn list_exams(&self) -> Result<Vec<Exam>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT e.id, e.title, e.description, e.time_limit_minutes,
                       s.name AS subject_name
                FROM exams e
                JOIN subjects s ON s.id = e.subject_id
                ORDER BY e.id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let headers = rows
            .iter()
            .map(map_exam_header)
            .collect::<Result<Vec<_>, _>>()?;
        drop(rows);

        let mut out = Vec::with_capacity(headers.len());
        for header in headers {
            out.push(self.load_exam(header).await?);
        }
        Ok(out)
    }

    async fn delete_exam(&self, id: &TestId) -> Result<bool, StorageError> {
        let res = sqlx::query("DELETE FROM exams WHERE id = ?1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(res.rows_affected() > 0)
    }
}

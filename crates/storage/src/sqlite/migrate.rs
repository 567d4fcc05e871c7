use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs a single, consolidated migration for the current schema.
///
/// Creates the full schema (subjects, exams with ordered questions, finalized
/// quiz sessions with their answers, profiles, and indexes).
#[allow(clippy::too_many_lines)]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: full schema.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS subjects (
                    id INTEGER PRIMARY KEY,
                    name TEXT NOT NULL UNIQUE,
                    description TEXT
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS exams (
                    id TEXT PRIMARY KEY,
                    subject_id INTEGER NOT NULL,
                    title TEXT NOT NULL,
                    description TEXT,
                    time_limit_minutes INTEGER NOT NULL CHECK (time_limit_minutes > 0),
                    FOREIGN KEY (subject_id) REFERENCES subjects(id) ON DELETE RESTRICT
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS questions (
                    exam_id TEXT NOT NULL,
                    id TEXT NOT NULL,
                    position INTEGER NOT NULL CHECK (position >= 0),
                    prompt TEXT NOT NULL,
                    options TEXT NOT NULL,
                    correct_index INTEGER NOT NULL,
                    explanation TEXT,
                    PRIMARY KEY (exam_id, id),
                    FOREIGN KEY (exam_id) REFERENCES exams(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        // Finalized attempts outlive the exam they were taken on.
        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS quiz_sessions (
                    id INTEGER PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    test_id TEXT NOT NULL,
                    subject TEXT NOT NULL,
                    score INTEGER NOT NULL CHECK (score BETWEEN 0 AND 100),
                    correct_count INTEGER NOT NULL CHECK (correct_count >= 0),
                    total_questions INTEGER NOT NULL CHECK (total_questions >= correct_count),
                    answers TEXT NOT NULL,
                    started_at TEXT NOT NULL,
                    completed_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS quiz_answers (
                    id INTEGER PRIMARY KEY,
                    session_id INTEGER NOT NULL,
                    question_index INTEGER NOT NULL CHECK (question_index >= 0),
                    question_id TEXT NOT NULL,
                    question_text TEXT NOT NULL,
                    selected_answer TEXT,
                    correct_answer TEXT NOT NULL,
                    is_correct INTEGER NOT NULL CHECK (is_correct IN (0, 1)),
                    subject TEXT NOT NULL,
                    FOREIGN KEY (session_id) REFERENCES quiz_sessions(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS profiles (
                    user_id TEXT PRIMARY KEY,
                    display_name TEXT NOT NULL,
                    avatar_url TEXT,
                    updated_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_questions_exam_position
                    ON questions(exam_id, position);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_quiz_sessions_user_completed
                    ON quiz_sessions(user_id, completed_at);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_quiz_sessions_completed
                    ON quiz_sessions(completed_at);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_quiz_answers_session
                    ON quiz_answers(session_id, question_index);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}

use crate::error::{Error, Result};
use crate::models::quiz::{Quiz, QuizQuestion, QuizResult};
use chrono::Utc;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

/// Quiz delivery collaborator: grades a submission against the stored
/// question set and appends the immutable result row. Award derivation from
/// that result is the orchestrator's job, not this service's.
#[derive(Clone)]
pub struct QuizService {
    pool: PgPool,
}

impl QuizService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_active_quiz(&self, module_id: Uuid) -> Result<Quiz> {
        let quiz = sqlx::query_as::<_, Quiz>(
            r#"
            SELECT id, module_id, title, passing_score, is_active
            FROM quizzes
            WHERE module_id = $1 AND is_active = TRUE
            LIMIT 1
            "#,
        )
        .bind(module_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("No active quiz for module {}", module_id)))?;
        Ok(quiz)
    }

    /// Grades the answers, persists one result row and returns it. Every
    /// attempt is kept; history is append-only.
    pub async fn submit(
        &self,
        user_id: Uuid,
        module_id: Uuid,
        answers: &HashMap<String, String>,
    ) -> Result<QuizResult> {
        let quiz = self.get_active_quiz(module_id).await?;

        let questions = sqlx::query_as::<_, QuizQuestion>(
            r#"
            SELECT id, quiz_id, question_text, correct_answer, points
            FROM quiz_questions
            WHERE quiz_id = $1
            "#,
        )
        .bind(quiz.id)
        .fetch_all(&self.pool)
        .await?;

        let graded = grade_answers(&questions, answers);
        let passed = graded.percentage >= quiz.passing_score;

        let result = sqlx::query_as::<_, QuizResult>(
            r#"
            INSERT INTO quiz_results
                (id, user_id, quiz_id, score, max_score, percentage, passed,
                 answers, correct_answers, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, user_id, quiz_id, score, max_score, percentage, passed,
                      answers, correct_answers, completed_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(quiz.id)
        .bind(graded.score)
        .bind(graded.max_score)
        .bind(graded.percentage)
        .bind(passed)
        .bind(serde_json::to_value(answers)?)
        .bind(serde_json::to_value(&graded.correct_answers)?)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            user_id = %user_id,
            quiz_id = %quiz.id,
            score = graded.score,
            max_score = graded.max_score,
            passed,
            "Quiz submitted"
        );
        Ok(result)
    }
}

#[derive(Debug, Clone)]
pub struct GradedSubmission {
    pub score: i32,
    pub max_score: i32,
    pub percentage: f64,
    pub correct_answers: HashMap<String, String>,
}

/// Exact-match grading keyed by question id. A quiz with no questions grades
/// to zero percent rather than dividing by zero.
pub fn grade_answers(
    questions: &[QuizQuestion],
    answers: &HashMap<String, String>,
) -> GradedSubmission {
    let mut score = 0;
    let mut max_score = 0;
    let mut correct_answers = HashMap::new();

    for question in questions {
        max_score += question.points;
        let key = question.id.to_string();
        correct_answers.insert(key.clone(), question.correct_answer.clone());
        if answers.get(&key) == Some(&question.correct_answer) {
            score += question.points;
        }
    }

    let percentage = if max_score > 0 {
        (score as f64 / max_score as f64) * 100.0
    } else {
        0.0
    };

    GradedSubmission {
        score,
        max_score,
        percentage,
        correct_answers,
    }
}

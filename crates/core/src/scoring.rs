//! Scoring for multiple-choice attempts.
//!
//! `is_answer_correct` is the only place an answer is compared against the
//! key. Live feedback and final grading both go through it.

use serde::Serialize;

use crate::model::{AnswerMap, Question, QuestionId};

/// Grading outcome for a single question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionResult {
    pub question_id: QuestionId,
    pub selected: Option<usize>,
    pub correct_index: usize,
    pub is_correct: bool,
    pub explanation: Option<String>,
}

/// Grading outcome for a whole attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreReport {
    score: u8,
    correct: u32,
    total: u32,
    per_question: Vec<QuestionResult>,
}

impl ScoreReport {
    /// Percentage score, 0..=100.
    #[must_use]
    pub fn score(&self) -> u8 {
        self.score
    }

    #[must_use]
    pub fn correct(&self) -> u32 {
        self.correct
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    #[must_use]
    pub fn per_question(&self) -> &[QuestionResult] {
        &self.per_question
    }

    #[must_use]
    pub fn result_for(&self, id: &QuestionId) -> Option<&QuestionResult> {
        self.per_question.iter().find(|r| &r.question_id == id)
    }

    #[must_use]
    pub fn unanswered(&self) -> usize {
        self.per_question
            .iter()
            .filter(|r| r.selected.is_none())
            .count()
    }
}

/// Returns true when `selected` is the question's correct option.
///
/// `None` (unanswered) is always incorrect.
#[must_use]
pub fn is_answer_correct(question: &Question, selected: Option<usize>) -> bool {
    selected == Some(question.correct_index())
}

/// `round(100 * correct / total)` with halves rounded up, in integer math.
///
/// An empty total scores 0. `correct` is clamped to `total`.
#[must_use]
pub fn percent(correct: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let correct = u64::from(correct.min(total));
    let total = u64::from(total);
    let rounded = (200 * correct + total) / (2 * total);
    // correct <= total keeps this within 0..=100.
    u8::try_from(rounded).unwrap_or(100)
}

/// Grades `answers` against `questions`.
///
/// Answers for ids not present in `questions` are ignored.
#[must_use]
pub fn score(questions: &[Question], answers: &AnswerMap) -> ScoreReport {
    let per_question: Vec<QuestionResult> = questions
        .iter()
        .map(|q| {
            let selected = answers.get(q.id()).copied();
            QuestionResult {
                question_id: q.id().clone(),
                selected,
                correct_index: q.correct_index(),
                is_correct: is_answer_correct(q, selected),
                explanation: q.explanation().map(str::to_owned),
            }
        })
        .collect();

    let total = u32::try_from(per_question.len()).unwrap_or(u32::MAX);
    let correct = u32::try_from(per_question.iter().filter(|r| r.is_correct).count())
        .unwrap_or(u32::MAX);

    ScoreReport {
        score: percent(correct, total),
        correct,
        total,
        per_question,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: &str, correct: usize) -> Question {
        Question::new(
            QuestionId::new(id).unwrap(),
            format!("Prompt {id}"),
            vec!["a".into(), "b".into(), "c".into()],
            correct,
            Some(format!("because {id}")),
        )
        .unwrap()
    }

    fn answers(pairs: &[(&str, usize)]) -> AnswerMap {
        pairs
            .iter()
            .map(|(id, idx)| (QuestionId::new(*id).unwrap(), *idx))
            .collect()
    }

    #[test]
    fn two_of_three_rounds_to_67() {
        let qs = vec![question("q1", 0), question("q2", 1), question("q3", 2)];
        let report = score(&qs, &answers(&[("q1", 0), ("q2", 2), ("q3", 2)]));

        assert_eq!(report.score(), 67);
        assert_eq!(report.correct(), 2);
        assert_eq!(report.total(), 3);
        assert!(report.per_question()[0].is_correct);
        assert!(!report.per_question()[1].is_correct);
        assert_eq!(report.per_question()[1].selected, Some(2));
        assert_eq!(report.per_question()[1].correct_index, 1);
        assert_eq!(
            report.per_question()[2].explanation.as_deref(),
            Some("because q3")
        );
    }

    #[test]
    fn empty_answers_score_zero_and_count_unanswered() {
        let qs = vec![question("q1", 0), question("q2", 1)];
        let report = score(&qs, &AnswerMap::new());
        assert_eq!(report.score(), 0);
        assert_eq!(report.unanswered(), 2);
        assert!(report.per_question().iter().all(|r| !r.is_correct));
    }

    #[test]
    fn unknown_answer_keys_are_ignored() {
        let qs = vec![question("q1", 0)];
        let report = score(&qs, &answers(&[("q1", 0), ("ghost", 0)]));
        assert_eq!(report.score(), 100);
        assert_eq!(report.per_question().len(), 1);
    }

    #[test]
    fn percent_rounds_half_up() {
        assert_eq!(percent(1, 8), 13); // 12.5
        assert_eq!(percent(1, 2), 50);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(5, 5), 100);
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(9, 4), 100);
    }

    #[test]
    fn percent_matches_float_rounding_for_small_tests() {
        for total in 1..=40_u32 {
            for correct in 0..=total {
                let expected = (100.0 * f64::from(correct) / f64::from(total) + 0.5).floor();
                assert_eq!(f64::from(percent(correct, total)), expected, "{correct}/{total}");
            }
        }
    }

    #[test]
    fn live_and_final_comparison_agree() {
        let q = question("q1", 2);
        for selected in [None, Some(0), Some(1), Some(2)] {
            let report = score(
                std::slice::from_ref(&q),
                &selected
                    .map(|s| answers(&[("q1", s)]))
                    .unwrap_or_default(),
            );
            assert_eq!(report.per_question()[0].is_correct, is_answer_correct(&q, selected));
        }
    }
}

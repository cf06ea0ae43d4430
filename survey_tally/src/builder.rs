pub use crate::config::*;

use std::collections::HashSet;

/// A builder for collecting attempts before tabulating them.
///
/// The catalog is checked once when the builder is created, and the ids of the
/// attempts are checked as they are added.
///
/// ```
/// pub use survey_tally::builder::Builder;
/// # use survey_tally::{ChoiceOption, Question, QuestionKind, TallyErrors};
///
/// let catalog = vec![Question::new(
///     "repeat_year",
///     "Did you repeat a year?",
///     QuestionKind::SingleChoice(vec![
///         ChoiceOption::new("yes", "Yes"),
///         ChoiceOption::new("no", "No"),
///     ]),
/// )];
/// let mut builder = Builder::new(&catalog)?;
///
/// builder.add_attempt_simple(&[("repeat_year", "no")])?;
/// builder.add_attempt_simple(&[("repeat_year", "yes")])?;
///
/// let result = builder.aggregate()?;
/// assert_eq!(result.get("repeat_year").map(|t| t.total), Some(2));
/// # Ok::<(), TallyErrors>(())
/// ```
pub struct Builder {
    pub(crate) _questions: Vec<Question>,
    pub(crate) _attempts: Vec<Attempt>,
    pub(crate) _ids: HashSet<String>,
}

impl Builder {
    pub fn new(questions: &[Question]) -> Result<Builder, TallyErrors> {
        crate::check_catalog(questions)?;
        Ok(Builder {
            _questions: questions.to_vec(),
            _attempts: Vec::new(),
            _ids: HashSet::new(),
        })
    }

    /// Adds an attempt made only of text answers.
    ///
    /// The attempt gets the next number and an id derived from it.
    pub fn add_attempt_simple(&mut self, answers: &[(&str, &str)]) -> Result<(), TallyErrors> {
        let number = self.next_attempt_number();
        let mut attempt = Attempt::new(&format!("attempt-{:08}", number), number, 0);
        for (qid, value) in answers {
            attempt = attempt.with_answer(qid, Answer::text(value));
        }
        self.add_attempt(&attempt)
    }

    pub fn add_attempt(&mut self, attempt: &Attempt) -> Result<(), TallyErrors> {
        if !self._ids.insert(attempt.id.clone()) {
            return Err(TallyErrors::DuplicateAttempt(attempt.id.clone()));
        }
        self._attempts.push(attempt.clone());
        Ok(())
    }

    /// One more than the highest number added so far, starting at 1.
    pub fn next_attempt_number(&self) -> u64 {
        self._attempts.iter().map(|a| a.number).max().unwrap_or(0) + 1
    }

    pub fn attempts(&self) -> &[Attempt] {
        &self._attempts
    }

    pub fn aggregate(&self) -> Result<AggregationResult, TallyErrors> {
        crate::aggregate(&self._questions, &self._attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_follow_the_highest() {
        let mut builder = Builder::new(&[]).unwrap();
        builder.add_attempt(&Attempt::new("late", 7, 0)).unwrap();
        builder.add_attempt(&Attempt::new("early", 2, 0)).unwrap();
        assert_eq!(builder.next_attempt_number(), 8);
        builder.add_attempt_simple(&[]).unwrap();
        assert_eq!(builder.attempts()[2].id, "attempt-00000008");
        assert!(matches!(
            builder.add_attempt(&Attempt::new("late", 9, 0)),
            Err(TallyErrors::DuplicateAttempt(_))
        ));
    }
}

pub mod builder;
mod config;
pub mod manual;

use log::{debug, info};

use std::collections::HashSet;

use indexmap::IndexMap;

pub use crate::config::*;

// **** Private structures ****

// The bucket an answer falls in, once its shape has been checked.
#[derive(Eq, PartialEq, Debug, Clone)]
enum Recorded {
    Nothing,
    // Shape does not match the kind of the question.
    Malformed,
    Values(Vec<String>),
}

#[derive(Debug, Clone, Default)]
struct Counter {
    counts: IndexMap<String, u64>,
    total: u64,
}

impl Counter {
    fn add(&mut self, key: String) {
        *self.counts.entry(key).or_insert(0) += 1;
        self.total += 1;
    }

    fn into_tally(self, question_id: &str) -> QuestionTally {
        let total = self.total;
        // With no answers, the percentages stay empty.
        let percentages: IndexMap<String, f64> = self
            .counts
            .iter()
            .map(|(k, c)| (k.clone(), (*c as f64 / total as f64) * 100.0))
            .collect();
        QuestionTally {
            question_id: question_id.to_string(),
            counts: self.counts,
            percentages,
            total,
        }
    }
}

/// Tabulates the answers of all the attempts for every eligible question.
///
/// Arguments:
/// * `questions` the catalog, in display order
/// * `attempts` all the attempts to take into account
///
/// Free-text and date questions are not tabulated. Answers that are missing or
/// whose shape does not match the question are skipped.
pub fn aggregate(
    questions: &[Question],
    attempts: &[Attempt],
) -> Result<AggregationResult, TallyErrors> {
    info!(
        "aggregate: processing {:?} attempts over {:?} questions",
        attempts.len(),
        questions.len()
    );
    checks(questions, attempts)?;

    let mut tallies: IndexMap<String, QuestionTally> = IndexMap::new();
    for question in questions.iter().filter(|q| q.is_eligible()) {
        let mut counter = Counter::default();
        for attempt in attempts.iter() {
            let answer = match attempt.answers.get(&question.id) {
                Some(a) => a,
                None => continue,
            };
            match recorded_values(question, answer) {
                Recorded::Values(keys) => {
                    for key in keys {
                        counter.add(key);
                    }
                }
                Recorded::Malformed => {
                    debug!(
                        "aggregate: attempt {}: skipping malformed answer for {}: {:?}",
                        attempt.id, question.id, answer.value
                    );
                }
                Recorded::Nothing => {}
            }
        }
        debug!(
            "aggregate: question {}: total {:?} counts {:?}",
            question.id, counter.total, counter.counts
        );
        tallies.insert(question.id.clone(), counter.into_tally(&question.id));
    }
    Ok(AggregationResult { tallies })
}

impl AggregationResult {
    /// The same result, without the given question ids.
    pub fn without(&self, excluded: &[String]) -> AggregationResult {
        let excluded: HashSet<&String> = excluded.iter().collect();
        AggregationResult {
            tallies: self
                .tallies
                .iter()
                .filter(|(qid, _)| !excluded.contains(qid))
                .map(|(qid, t)| (qid.clone(), t.clone()))
                .collect(),
        }
    }

    pub fn get(&self, question_id: &str) -> Option<&QuestionTally> {
        self.tallies.get(question_id)
    }
}

impl QuestionTally {
    pub fn count(&self, value: &str) -> u64 {
        self.counts.get(value).cloned().unwrap_or(0)
    }

    pub fn percentage(&self, value: &str) -> f64 {
        self.percentages.get(value).cloned().unwrap_or(0.0)
    }

    /// The rows of the table in the order the question declares its options.
    ///
    /// Values that are not declared options come last, in order of first observation.
    pub fn ordered_counts(&self, question: &Question) -> Vec<(String, u64, f64)> {
        let order: Vec<String> = display_order(question);
        let mut rows: Vec<(usize, usize, String)> = self
            .counts
            .keys()
            .enumerate()
            .map(|(seen, k)| {
                let rank = order.iter().position(|o| o == k).unwrap_or(order.len());
                (rank, seen, k.clone())
            })
            .collect();
        rows.sort();
        rows.into_iter()
            .map(|(_, _, k)| {
                let c = self.count(&k);
                let p = self.percentage(&k);
                (k, c, p)
            })
            .collect()
    }
}

/// Rounds a percentage to two decimals, the precision used in reports.
pub fn round_percentage(p: f64) -> f64 {
    (p * 100.0).round() / 100.0
}

/// The key under which a number is counted.
pub fn number_key(n: f64) -> String {
    n.to_string()
}

/// The key under which the answer to a group part is counted.
pub fn part_key(part_id: &str, value: &str) -> String {
    format!("{}:{}", part_id, value)
}

fn display_order(question: &Question) -> Vec<String> {
    match &question.kind {
        QuestionKind::Group(parts) => parts
            .iter()
            .flat_map(|p| p.options().iter().map(|o| part_key(&p.id, &o.value)))
            .collect(),
        _ => question.options().iter().map(|o| o.value.clone()).collect(),
    }
}

fn scalar_key(value: &AnswerValue) -> Recorded {
    match value {
        AnswerValue::Text(s) if s.trim().is_empty() => Recorded::Nothing,
        AnswerValue::Text(s) => Recorded::Values(vec![s.clone()]),
        AnswerValue::Number(n) if n.is_finite() => Recorded::Values(vec![number_key(*n)]),
        AnswerValue::Number(_) => Recorded::Malformed,
        AnswerValue::Choices(_) => Recorded::Malformed,
        AnswerValue::Invalid => Recorded::Malformed,
    }
}

fn list_keys(value: &AnswerValue) -> Recorded {
    match value {
        AnswerValue::Choices(l) => {
            let keys: Vec<String> = l.iter().filter(|s| !s.trim().is_empty()).cloned().collect();
            if keys.is_empty() {
                Recorded::Nothing
            } else {
                Recorded::Values(keys)
            }
        }
        _ => Recorded::Malformed,
    }
}

// The keys contributed by one answer. Sub-question answers are never looked at.
fn recorded_values(question: &Question, answer: &Answer) -> Recorded {
    match &question.kind {
        QuestionKind::FreeText | QuestionKind::Date => Recorded::Nothing,
        QuestionKind::MultiChoice(_) => answer.value.as_ref().map_or(Recorded::Nothing, list_keys),
        QuestionKind::Numeric | QuestionKind::SingleChoice(_) => {
            answer.value.as_ref().map_or(Recorded::Nothing, scalar_key)
        }
        QuestionKind::Group(parts) => {
            let mut keys: Vec<String> = Vec::new();
            let mut malformed = false;
            if let Some(v) = answer.value.as_ref() {
                match scalar_key(v) {
                    Recorded::Values(mut ks) => keys.append(&mut ks),
                    Recorded::Malformed => malformed = true,
                    Recorded::Nothing => {}
                }
            }
            for part in parts.iter().filter(|p| p.is_eligible()) {
                if let Some(part_answer) = answer.part(&part.id) {
                    match recorded_values(part, part_answer) {
                        Recorded::Values(ks) => {
                            keys.extend(ks.iter().map(|k| part_key(&part.id, k)));
                        }
                        Recorded::Malformed => malformed = true,
                        Recorded::Nothing => {}
                    }
                }
            }
            match (keys.is_empty(), malformed) {
                (false, _) => Recorded::Values(keys),
                (true, true) => Recorded::Malformed,
                (true, false) => Recorded::Nothing,
            }
        }
    }
}

/// Checks that the catalog can be used: all the ids are set and unique,
/// including the ids of parts and sub-questions.
pub fn check_catalog(questions: &[Question]) -> Result<(), TallyErrors> {
    fn visit<'a>(
        q: &'a Question,
        position: usize,
        seen: &mut HashSet<&'a str>,
    ) -> Result<(), TallyErrors> {
        if q.id.is_empty() {
            return Err(TallyErrors::EmptyQuestionId { position });
        }
        if !seen.insert(q.id.as_str()) {
            return Err(TallyErrors::DuplicateQuestion(q.id.clone()));
        }
        for part in q.parts() {
            visit(part, position, seen)?;
        }
        if let Some(sub) = q.sub_question.as_deref() {
            visit(sub, position, seen)?;
        }
        Ok(())
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for (idx, q) in questions.iter().enumerate() {
        visit(q, idx + 1, &mut seen)?;
    }
    Ok(())
}

fn checks(questions: &[Question], attempts: &[Attempt]) -> Result<(), TallyErrors> {
    check_catalog(questions)?;
    let mut seen: HashSet<&str> = HashSet::new();
    for a in attempts.iter() {
        if !seen.insert(a.id.as_str()) {
            return Err(TallyErrors::DuplicateAttempt(a.id.clone()));
        }
    }
    debug!(
        "checks: {:?} questions, {:?} attempts",
        questions.len(),
        attempts.len()
    );
    Ok(())
}

// Browsing, summarizing and editing the stored attempts.

use crate::survey::io_common::answer_cell;
use crate::survey::store::{AttemptRecord, AttemptStore};
use crate::survey::wizard::{parse_input, DATE_FORMAT};
use crate::survey::*;

use chrono::NaiveDate;
use indexmap::IndexMap;

pub fn total_pages(num_records: usize, page_size: usize) -> usize {
    let size = page_size.max(1);
    (num_records + size - 1) / size
}

/// The attempts shown on a page. Pages start at 1; pages out of range are empty.
pub fn paginate(records: &[AttemptRecord], page_size: usize, page: usize) -> &[AttemptRecord] {
    let size = page_size.max(1);
    if page == 0 {
        return &[];
    }
    let start = (page - 1).saturating_mul(size);
    if start >= records.len() {
        return &[];
    }
    let end = (start + size).min(records.len());
    &records[start..end]
}

pub fn table_header(catalog: &[Question], settings: &ResponsesSettings) -> Vec<String> {
    let mut header = vec!["#".to_string(), "Attempt ID".to_string()];
    header.extend(settings.table_questions.iter().map(|qid| {
        find_question(catalog, qid)
            .map(|q| q.text.clone())
            .unwrap_or_else(|| qid.clone())
    }));
    header
}

/// The group a part belongs to, if the id is a group part.
fn parent_group<'a>(catalog: &'a [Question], question_id: &str) -> Option<&'a Question> {
    catalog
        .iter()
        .find(|g| g.parts().iter().any(|p| p.id == question_id))
}

/// The stored answer of a question. Group parts are read inside the answer
/// of their group.
fn stored_answer<'a>(
    catalog: &[Question],
    record: &'a AttemptRecord,
    question_id: &str,
) -> Option<&'a JSValue> {
    match parent_group(catalog, question_id) {
        Some(g) => record
            .answers
            .get(&g.id)
            .and_then(|js| js.get(question_id)),
        None => record.answers.get(question_id),
    }
}

pub fn table_row(
    catalog: &[Question],
    record: &AttemptRecord,
    settings: &ResponsesSettings,
) -> Vec<String> {
    let mut row = vec![record.attempt_number.to_string(), record.attempt_id.clone()];
    row.extend(
        settings
            .table_questions
            .iter()
            .map(|qid| answer_cell(stored_answer(catalog, record, qid))),
    );
    row
}

#[derive(PartialEq, Debug, Clone, Default)]
pub struct ResponsesSummary {
    pub total: usize,
    /// Attempts per value of the breakdown question, in order of first observation.
    pub breakdown: IndexMap<String, u64>,
    /// For each flag question, the number of attempts that answered `yes`.
    pub flags: Vec<(String, usize)>,
}

fn scalar_value<'a>(
    catalog: &[Question],
    record: &'a AttemptRecord,
    question_id: &str,
) -> Option<&'a str> {
    stored_answer(catalog, record, question_id)
        .and_then(|js| js.get("value").or(Some(js)))
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
}

pub fn summarize(
    catalog: &[Question],
    records: &[AttemptRecord],
    settings: &ResponsesSettings,
) -> ResponsesSummary {
    let mut breakdown: IndexMap<String, u64> = IndexMap::new();
    if let Some(qid) = settings.breakdown_question.as_ref() {
        for v in records.iter().filter_map(|r| scalar_value(catalog, r, qid)) {
            *breakdown.entry(v.to_string()).or_insert(0) += 1;
        }
    }
    let flags = settings
        .flag_questions
        .iter()
        .map(|qid| {
            let n = records
                .iter()
                .filter(|r| scalar_value(catalog, r, qid) == Some("yes"))
                .count();
            (qid.clone(), n)
        })
        .collect();
    ResponsesSummary {
        total: records.len(),
        breakdown,
        flags,
    }
}

/// The problems that prevent an attempt from being saved after an edit, as
/// `(question id, reason)`.
pub fn validate_record(
    catalog: &[Question],
    settings: &ResponsesSettings,
    record: &AttemptRecord,
) -> Vec<(String, String)> {
    let mut errors: Vec<(String, String)> = Vec::new();
    for qid in settings.required_questions.iter() {
        let question = match find_question(catalog, qid) {
            Some(q) => q,
            None => continue,
        };
        let answer = stored_answer(catalog, record, qid).map(decode_answer);
        match answer.as_ref().and_then(|a| a.value.as_ref()) {
            _ if answer.as_ref().map_or(true, |a| a.is_blank()) => {
                errors.push((qid.clone(), "an answer is required".to_string()));
            }
            Some(AnswerValue::Text(s)) if question.kind == QuestionKind::Date => {
                if NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).is_err() {
                    errors.push((qid.clone(), format!("{:?} is not a valid date", s)));
                }
            }
            _ => {}
        }
    }
    errors
}

fn set_value(slot: &mut JSMap<String, JSValue>, key: &str, value: Option<&AnswerValue>) {
    let mut obj = match slot.remove(key) {
        Some(JSValue::Object(obj)) => obj,
        _ => JSMap::new(),
    };
    match value {
        Some(v) => {
            obj.insert("value".to_string(), encode_value(v));
        }
        None => {
            obj.remove("value");
        }
    }
    if !obj.is_empty() {
        slot.insert(key.to_string(), JSValue::Object(obj));
    }
}

/// Sets the answer of one question (or one group part) of a stored attempt.
///
/// The raw value is read like in the wizard. The attempt is validated before
/// it is saved.
pub fn edit_answer(
    survey: &Survey,
    store: &AttemptStore,
    attempt_id: &str,
    question_id: &str,
    raw: &str,
) -> SurveyResult<AttemptRecord> {
    let question = survey.question(question_id)?;
    let value = parse_input(question, raw)?;
    let mut record = store.find(attempt_id)?;

    match parent_group(&survey.catalog, question_id) {
        Some(g) => {
            let mut parts = match record.answers.remove(&g.id) {
                Some(JSValue::Object(obj)) => obj,
                _ => JSMap::new(),
            };
            set_value(&mut parts, question_id, value.as_ref());
            if !parts.is_empty() {
                record.answers.insert(g.id.clone(), JSValue::Object(parts));
            }
        }
        None => set_value(&mut record.answers, question_id, value.as_ref()),
    }
    debug!("edit_answer: {:?}", record);

    let settings = survey.config.responses_settings();
    let errors = validate_record(&survey.catalog, &settings, &record);
    if !errors.is_empty() {
        let errors = errors
            .iter()
            .map(|(qid, reason)| format!("{}: {}", qid, reason))
            .collect::<Vec<String>>()
            .join("; ");
        return ValidationFailedSnafu {
            attempt_id,
            errors,
        }
        .fail();
    }
    store.save(&record)?;
    Ok(record)
}

pub fn render_page(
    catalog: &[Question],
    settings: &ResponsesSettings,
    records: &[AttemptRecord],
    page: usize,
) -> String {
    let mut lines: Vec<String> = Vec::new();
    let summary = summarize(catalog, records, settings);
    lines.push(format!("Total responses: {}", summary.total));
    if let Some(bq) = settings
        .breakdown_question
        .as_ref()
        .and_then(|qid| find_question(catalog, qid))
    {
        lines.push(format!("{}:", bq.text));
        for (value, count) in summary.breakdown.iter() {
            lines.push(format!("  {}: {}", bq.label_of(value).unwrap_or(value.as_str()), count));
        }
    }
    for (qid, count) in summary.flags.iter() {
        let text = find_question(catalog, qid).map_or(qid.as_str(), |q| q.text.as_str());
        lines.push(format!("{} (yes): {}", text, count));
    }

    let pages = total_pages(records.len(), settings.page_size);
    lines.push(format!("Page {} of {}", page, pages));
    lines.push(table_header(catalog, settings).join(" | "));
    for r in paginate(records, settings.page_size, page) {
        lines.push(table_row(catalog, r, settings).join(" | "));
    }
    lines.join("\n")
}

// The analysis report: summary JSON, text tables, per-question CSV and chart data.

use crate::survey::*;

use serde::Serialize;
use text_diff::print_diff;

#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
struct OutputConfig {
    survey: String,
    attempts: String,
}

/// The text shown for a counted value.
///
/// Declared options show their label. Values counted for a group part are shown
/// as `<part text>: <label>`.
pub fn display_label(question: &Question, key: &str) -> String {
    if let QuestionKind::Group(parts) = &question.kind {
        if let Some((part_id, value)) = key.split_once(':') {
            if let Some(part) = parts.iter().find(|p| p.id == part_id) {
                return format!("{}: {}", part.text, part.label_of(value).unwrap_or(value));
            }
        }
    }
    question.label_of(key).unwrap_or(key).to_string()
}

fn format_percentage(p: f64) -> String {
    format!("{:.2}", round_percentage(p))
}

fn tally_to_json(question: &Question, tally: &QuestionTally) -> JSValue {
    let mut counts: JSMap<String, JSValue> = JSMap::new();
    let mut percentages: JSMap<String, JSValue> = JSMap::new();
    for (key, count, p) in tally.ordered_counts(question) {
        counts.insert(key.clone(), json!(count.to_string()));
        percentages.insert(key, json!(format_percentage(p)));
    }
    json!({
        "id": question.id,
        "text": question.text,
        "counts": counts,
        "percentages": percentages,
        "total": tally.total.to_string()
    })
}

pub fn build_summary_js(survey: &Survey, result: &AggregationResult, num_attempts: usize) -> JSValue {
    let c = OutputConfig {
        survey: survey.config.survey_settings.survey_name.clone(),
        attempts: num_attempts.to_string(),
    };
    let results: Vec<JSValue> = survey
        .catalog
        .iter()
        .filter_map(|q| result.get(&q.id).map(|t| tally_to_json(q, t)))
        .collect();
    json!({
        "config": c,
        "results": results
    })
}

pub fn read_summary(path: &str) -> SurveyResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    debug!("read_summary: {} bytes from {:?}", contents.len(), path);
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    Ok(js)
}

/// Compares a computed summary with a reference summary file.
///
/// Both are compared in their pretty-printed form. Differences are printed.
pub fn check_reference(pretty_summary: &str, reference_path: &str) -> SurveyResult<()> {
    let summary_ref = read_summary(reference_path)?;
    let pretty_ref = serde_json::to_string_pretty(&summary_ref).context(SerializingJsonSnafu {})?;
    if pretty_ref != pretty_summary {
        warn!("Found differences with the reference summary {:?}", reference_path);
        print_diff(pretty_ref.as_str(), pretty_summary, "\n");
        return ReferenceMismatchSnafu {}.fail();
    }
    info!("Summary matches the reference {:?}", reference_path);
    Ok(())
}

pub fn render_table(question: &Question, tally: &QuestionTally) -> String {
    let rows: Vec<(String, u64, f64)> = tally
        .ordered_counts(question)
        .into_iter()
        .map(|(k, c, p)| (display_label(question, &k), c, p))
        .collect();
    let width = rows
        .iter()
        .map(|(l, _, _)| l.chars().count())
        .chain(std::iter::once("Option".len()))
        .max()
        .unwrap_or(0);

    let mut lines: Vec<String> = vec![question.text.clone()];
    lines.push(format!(
        "{:<width$} | {:>6} | {:>10}",
        "Option",
        "Count",
        "Percentage",
        width = width
    ));
    lines.push(format!("{}-+-{}-+-{}", "-".repeat(width), "-".repeat(6), "-".repeat(10)));
    for (label, count, p) in rows.iter() {
        lines.push(format!(
            "{:<width$} | {:>6} | {:>9}%",
            label,
            count,
            format_percentage(*p),
            width = width
        ));
    }
    let total_p = if tally.total > 0 { "100%" } else { "0%" };
    lines.push(format!(
        "{:<width$} | {:>6} | {:>10}",
        "Total",
        tally.total,
        total_p,
        width = width
    ));
    lines.join("\n")
}

/// The frequency table of one question as CSV.
pub fn tally_csv(question: &Question, tally: &QuestionTally) -> SurveyResult<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["Option", "Count", "Percentage"])
        .context(CsvWriteSnafu {})?;
    for (key, count, p) in tally.ordered_counts(question) {
        wtr.write_record([
            display_label(question, &key),
            count.to_string(),
            format!("{}%", format_percentage(p)),
        ])
        .context(CsvWriteSnafu {})?;
    }
    let data = wtr
        .into_inner()
        .map_err(|e| e.into_error())
        .context(WritingFileSnafu {
            path: format!("{}_analysis.csv", question.id),
        })?;
    String::from_utf8(data).context(CsvEncodingSnafu {})
}

/// Writes `<question id>_analysis.csv` in the given directory, creating it if needed.
pub fn write_tally_csv(
    dir: &Path,
    question: &Question,
    tally: &QuestionTally,
) -> SurveyResult<PathBuf> {
    let p = dir.join(format!("{}_analysis.csv", question.id));
    let path = p.display().to_string();
    let content = tally_csv(question, tally)?;
    fs::create_dir_all(dir).context(WritingFileSnafu { path: &path })?;
    fs::write(&p, content).context(WritingFileSnafu { path })?;
    debug!("write_tally_csv: {:?}", p);
    Ok(p)
}

/// The data needed to draw the bar chart of one question.
pub fn chart_data(question: &Question, tally: &QuestionTally) -> JSValue {
    let rows = tally.ordered_counts(question);
    let labels: Vec<String> = rows
        .iter()
        .map(|(k, _, _)| display_label(question, k))
        .collect();
    let values: Vec<u64> = rows.iter().map(|(_, c, _)| *c).collect();
    json!({
        "question": question.text,
        "labels": labels,
        "values": values
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repeat_year() -> Question {
        Question::new(
            "repeat_year",
            "Did you repeat a year?",
            QuestionKind::SingleChoice(vec![
                ChoiceOption::new("yes", "Yes"),
                ChoiceOption::new("no", "No"),
            ]),
        )
    }

    fn tally_of(question: &Question, answers: &[&str]) -> QuestionTally {
        let attempts: Vec<Attempt> = answers
            .iter()
            .enumerate()
            .map(|(i, a)| {
                Attempt::new(&format!("a{}", i), i as u64 + 1, 0)
                    .with_answer(&question.id, Answer::text(a))
            })
            .collect();
        let res = survey_tally::aggregate(&[question.clone()], &attempts).unwrap();
        res.get(&question.id).unwrap().clone()
    }

    #[test]
    fn table_lists_options_in_order() {
        let q = repeat_year();
        let t = tally_of(&q, &["no", "yes", "yes"]);
        let table = render_table(&q, &t);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "Did you repeat a year?");
        assert_eq!(lines[1], "Option |  Count | Percentage");
        assert_eq!(lines[3], "Yes    |      2 |     66.67%");
        assert_eq!(lines[4], "No     |      1 |     33.33%");
        assert_eq!(lines[5], "Total  |      3 |       100%");
    }

    #[test]
    fn csv_rows() {
        let q = repeat_year();
        let t = tally_of(&q, &["no", "yes", "yes"]);
        assert_eq!(
            tally_csv(&q, &t).unwrap(),
            "Option,Count,Percentage\nYes,2,66.67%\nNo,1,33.33%\n"
        );
    }

    #[test]
    fn csv_directory_is_created() {
        let q = repeat_year();
        let t = tally_of(&q, &["yes"]);
        let root = std::env::temp_dir().join(format!("surveytab-csv-{}", uuid::Uuid::new_v4()));
        let dir = root.join("reports").join("latest");
        let p = write_tally_csv(&dir, &q, &t).unwrap();
        assert_eq!(p, dir.join("repeat_year_analysis.csv"));
        assert_eq!(
            fs::read_to_string(&p).unwrap(),
            "Option,Count,Percentage\nYes,1,100.00%\n"
        );
        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn chart() {
        let q = repeat_year();
        let t = tally_of(&q, &["no", "yes", "yes"]);
        assert_eq!(
            chart_data(&q, &t),
            json!({"question": "Did you repeat a year?", "labels": ["Yes", "No"], "values": [2, 1]})
        );
    }

    #[test]
    fn empty_tally() {
        let q = repeat_year();
        let t = tally_of(&q, &[]);
        let table = render_table(&q, &t);
        assert!(table.ends_with("Total  |      0 |         0%"));
        assert_eq!(
            tally_to_json(&q, &t),
            json!({"id": "repeat_year", "text": "Did you repeat a year?",
                   "counts": {}, "percentages": {}, "total": "0"})
        );
    }

    #[test]
    fn group_labels() {
        let q = Question::new(
            "parents_interest",
            "Parents interest",
            QuestionKind::Group(vec![Question::new(
                "father_interest",
                "Father",
                QuestionKind::SingleChoice(vec![ChoiceOption::new("always", "Always")]),
            )]),
        );
        assert_eq!(display_label(&q, "father_interest:always"), "Father: Always");
        assert_eq!(display_label(&q, "father_interest:never"), "Father: never");
        assert_eq!(display_label(&q, "unknown"), "unknown");
    }

    #[test]
    fn summary_entries_use_strings() {
        let q = repeat_year();
        let t = tally_of(&q, &["no", "yes", "yes"]);
        let js = tally_to_json(&q, &t);
        assert_eq!(js["counts"], json!({"yes": "2", "no": "1"}));
        assert_eq!(js["percentages"], json!({"yes": "66.67", "no": "33.33"}));
        assert_eq!(js["total"], json!("3"));
    }

    #[test]
    fn reference_mismatch_is_an_error() {
        let p = std::env::temp_dir().join(format!("surveytab-ref-{}.json", uuid::Uuid::new_v4()));
        fs::write(&p, "{\"results\": []}").unwrap();
        let path = p.display().to_string();
        assert!(check_reference("{\n  \"results\": []\n}", &path).is_ok());
        assert!(matches!(
            check_reference("{\n  \"results\": [1]\n}", &path),
            Err(SurveyError::ReferenceMismatch {})
        ));
        fs::remove_file(&p).unwrap();
    }
}

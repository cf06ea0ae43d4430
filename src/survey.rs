use log::{debug, info, warn};

use snafu::{prelude::*, Snafu};
use survey_tally::builder::Builder;
use survey_tally::*;

use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;

pub mod config_reader;
mod io_common;
mod io_csv;
mod io_json;
mod io_xlsx;
pub mod report;
pub mod responses;
pub mod store;
pub mod wizard;

use crate::args::{Args, Command};
use crate::survey::config_reader::*;
use crate::survey::store::*;

#[derive(Debug, Snafu)]
pub enum SurveyError {
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON in {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error writing file {path}"))]
    WritingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error reading input"))]
    ReadingInput { source: std::io::Error },
    #[snafu(display("Error serializing to JSON"))]
    SerializingJson { source: serde_json::Error },
    #[snafu(display("{path}: expected a list of attempts"))]
    NotAnAttemptList { path: String },
    #[snafu(display("{path}: attempt at position {index} is not well formed: {reason}"))]
    MalformedAttempt {
        path: String,
        index: usize,
        reason: String,
    },
    #[snafu(display("Invalid or empty import data"))]
    EmptyImport {},
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("The spreadsheet is empty"))]
    EmptyExcel {},
    #[snafu(display("Line {lineno}: could not read cell {content}"))]
    ExcelWrongCellType { lineno: u64, content: String },
    #[snafu(display("The spreadsheet has {count} worksheets, the worksheet name must be provided"))]
    ExcelAmbiguousWorksheet { count: usize },
    #[snafu(display("Error writing CSV"))]
    CsvWrite { source: csv::Error },
    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Line {lineno}: could not parse CSV"))]
    CsvLineParse { source: csv::Error, lineno: usize },
    #[snafu(display("CSV output is not valid UTF-8"))]
    CsvEncoding { source: std::string::FromUtf8Error },
    #[snafu(display("No {what} available for export"))]
    NothingToExport { what: String },
    #[snafu(display("Unknown export format {format:?}"))]
    UnknownExportFormat { format: String },
    #[snafu(display("Unknown question {id:?}"))]
    UnknownQuestion { id: String },
    #[snafu(display("Unknown attempt {id:?}"))]
    UnknownAttempt { id: String },
    #[snafu(display("Question {id:?}: unknown type {kind:?}"))]
    UnknownQuestionKind { id: String, kind: String },
    #[snafu(display("Question {id:?}: choice questions need options"))]
    MissingOptions { id: String },
    #[snafu(display("Question {id:?}: group questions need sub-questions"))]
    EmptyGroup { id: String },
    #[snafu(display("Question {question_id:?}: {reason}"))]
    InvalidAnswer { question_id: String, reason: String },
    #[snafu(display("Attempt {attempt_id} is not valid: {errors}"))]
    ValidationFailed { attempt_id: String, errors: String },
    #[snafu(display("Invalid catalog or attempts"))]
    Tally { source: TallyErrors },
    #[snafu(display("Difference detected between calculated summary and reference summary"))]
    ReferenceMismatch {},

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type SurveyResult<T> = Result<T, SurveyError>;

/// A survey, as described by its configuration file.
#[derive(Debug, Clone)]
pub struct Survey {
    pub config: SurveyConfig,
    pub catalog: Vec<Question>,
    // The directory relative paths are resolved against.
    pub root: PathBuf,
}

impl Survey {
    pub fn load(config_path: &str) -> SurveyResult<Survey> {
        let config = read_config(config_path)?;
        debug!("config: {:?}", config);
        let catalog = validate_catalog(&config.questions)?;
        let root = Path::new(config_path)
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_default();
        info!(
            "Survey {:?}: {} questions",
            config.survey_settings.survey_name,
            catalog.len()
        );
        Ok(Survey {
            config,
            catalog,
            root,
        })
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.root.join(p)
        }
    }

    pub fn store(&self) -> AttemptStore {
        let path = self
            .config
            .survey_settings
            .store_path
            .clone()
            .unwrap_or_else(|| DEFAULT_STORE_FILE.to_string());
        AttemptStore::open(&self.resolve(&path))
    }

    /// Finds a question of the catalog, including group parts.
    pub fn question(&self, id: &str) -> SurveyResult<&Question> {
        find_question(&self.catalog, id).context(UnknownQuestionSnafu { id })
    }
}

/// Looks for a question by id among the top-level questions and the group parts.
pub fn find_question<'a>(catalog: &'a [Question], id: &str) -> Option<&'a Question> {
    catalog.iter().find_map(|q| {
        if q.id == id {
            Some(q)
        } else {
            q.parts().iter().find(|p| p.id == id)
        }
    })
}

// ******** Answers as stored ***********

/// Reads a stored answer.
///
/// Both the wrapped form `{"value": .., "subQuestion": ..}` and bare values are
/// accepted. Objects without a `value` key are group answers keyed by part id.
pub fn decode_answer(js: &JSValue) -> Answer {
    match js {
        JSValue::Object(obj) => {
            let value = obj.get("value").and_then(decode_value);
            let sub_answer = obj.get("subQuestion").map(|s| Box::new(decode_answer(s)));
            let parts: Vec<(String, Answer)> = obj
                .iter()
                .filter(|(k, _)| k.as_str() != "value" && k.as_str() != "subQuestion")
                .map(|(k, v)| (k.clone(), decode_answer(v)))
                .collect();
            Answer {
                value,
                sub_answer,
                parts,
            }
        }
        _ => Answer {
            value: decode_value(js),
            ..Answer::default()
        },
    }
}

fn decode_value(js: &JSValue) -> Option<AnswerValue> {
    match js {
        JSValue::Null => None,
        JSValue::String(s) => Some(AnswerValue::Text(s.clone())),
        JSValue::Number(n) => Some(n.as_f64().map_or(AnswerValue::Invalid, AnswerValue::Number)),
        JSValue::Array(l) => {
            let choices: Option<Vec<String>> =
                l.iter().map(|x| x.as_str().map(|s| s.to_string())).collect();
            Some(choices.map_or(AnswerValue::Invalid, AnswerValue::Choices))
        }
        JSValue::Bool(_) | JSValue::Object(_) => Some(AnswerValue::Invalid),
    }
}

/// Writes an answer in the stored form.
pub fn encode_answer(answer: &Answer) -> JSValue {
    let mut obj: JSMap<String, JSValue> = JSMap::new();
    if let Some(v) = answer.value.as_ref() {
        obj.insert("value".to_string(), encode_value(v));
    }
    for (part_id, part) in answer.parts.iter() {
        obj.insert(part_id.clone(), encode_answer(part));
    }
    if let Some(sub) = answer.sub_answer.as_deref() {
        obj.insert("subQuestion".to_string(), encode_answer(sub));
    }
    JSValue::Object(obj)
}

fn encode_value(v: &AnswerValue) -> JSValue {
    match v {
        AnswerValue::Text(s) => json!(s),
        AnswerValue::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => json!(*n as i64),
        AnswerValue::Number(n) => json!(n),
        AnswerValue::Choices(l) => json!(l),
        AnswerValue::Invalid => JSValue::Null,
    }
}

fn record_to_attempt(record: &AttemptRecord) -> Attempt {
    let mut attempt = Attempt::new(
        &record.attempt_id,
        record.attempt_number,
        record.start_time,
    );
    for (qid, js) in record.answers.iter() {
        attempt.answers.insert(qid.clone(), decode_answer(js));
    }
    attempt
}

// ******** Commands ***********

/// Tabulates all the stored attempts and applies the display exclusions.
pub fn run_analysis(survey: &Survey, records: &[AttemptRecord]) -> SurveyResult<AggregationResult> {
    let mut builder = Builder::new(&survey.catalog).context(TallySnafu {})?;
    for r in records.iter() {
        builder
            .add_attempt(&record_to_attempt(r))
            .context(TallySnafu {})?;
    }
    let result = builder.aggregate().context(TallySnafu {})?;
    let excluded = survey.config.excluded_questions();
    debug!("run_analysis: excluded questions {:?}", excluded);
    Ok(result.without(&excluded))
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum ExportFormat {
    Spreadsheet,
    Json,
}

impl ExportFormat {
    pub fn parse(s: &str) -> SurveyResult<ExportFormat> {
        match s {
            "csv" | "spreadsheet" => Ok(ExportFormat::Spreadsheet),
            "json" => Ok(ExportFormat::Json),
            x => UnknownExportFormatSnafu { format: x }.fail(),
        }
    }

    pub fn default_file_name(&self) -> &'static str {
        match self {
            ExportFormat::Spreadsheet => "survey_results.csv",
            ExportFormat::Json => "survey_results.json",
        }
    }
}

/// Exports all the attempts. Fails if there is nothing to export.
pub fn export_data(
    catalog: &[Question],
    records: &[AttemptRecord],
    format: ExportFormat,
    path: &Path,
) -> SurveyResult<()> {
    ensure!(
        !catalog.is_empty(),
        NothingToExportSnafu {
            what: "questions".to_string()
        }
    );
    ensure!(
        !records.is_empty(),
        NothingToExportSnafu {
            what: "attempts".to_string()
        }
    );
    info!(
        "Exporting {} attempts as {:?} to {:?}",
        records.len(),
        format,
        path
    );
    match format {
        ExportFormat::Spreadsheet => io_csv::write_spreadsheet(catalog, records, path),
        ExportFormat::Json => io_json::write_attempts(records, path),
    }
}

/// Reads attempts from a JSON export or a spreadsheet (xlsx or CSV) and merges
/// them into the store.
pub fn import_data(
    survey: &Survey,
    store: &AttemptStore,
    path: &str,
    worksheet: Option<&str>,
) -> SurveyResult<usize> {
    let records = if path.ends_with(".xlsx") {
        io_xlsx::read_attempts(path, worksheet, &survey.catalog)?
    } else if path.ends_with(".csv") {
        io_csv::read_attempts(path, &survey.catalog)?
    } else {
        io_json::read_attempts(path)?
    };
    store.import(records)
}

fn write_output(out: &str, content: &str) -> SurveyResult<()> {
    if out == "stdout" {
        println!("{}", content);
        Ok(())
    } else {
        fs::write(out, content).context(WritingFileSnafu { path: out })
    }
}

fn run_fill<R: BufRead, W: Write>(
    survey: &Survey,
    store: &AttemptStore,
    input: &mut R,
    output: &mut W,
) -> SurveyResult<()> {
    let number = store.next_attempt_number()?;
    match wizard::run_interactive(&survey.catalog, number, input, output)? {
        Some(record) => {
            store.save(&record)?;
            info!(
                "Saved attempt {} (number {})",
                record.attempt_id, record.attempt_number
            );
            Ok(())
        }
        None => {
            warn!("Survey cancelled, nothing saved");
            Ok(())
        }
    }
}

pub fn run_command(args: &Args) -> SurveyResult<()> {
    let survey = Survey::load(&args.config)?;
    let store = survey.store();
    match &args.command {
        Command::Fill => {
            let stdin = std::io::stdin();
            let stdout = std::io::stdout();
            run_fill(&survey, &store, &mut stdin.lock(), &mut stdout.lock())
        }
        Command::Analyze {
            out,
            reference,
            question,
            csv_dir,
            chart,
        } => {
            let records = store.load()?;
            let result = run_analysis(&survey, &records)?;
            let shown: Vec<&Question> = match question {
                Some(qid) => vec![survey.question(qid)?],
                None => survey.catalog.iter().collect(),
            };
            for q in shown.iter() {
                if let Some(tally) = result.get(&q.id) {
                    println!("{}", report::render_table(q, tally));
                    if *chart {
                        let chart_js = report::chart_data(q, tally);
                        let s = serde_json::to_string_pretty(&chart_js)
                            .context(SerializingJsonSnafu {})?;
                        println!("{}", s);
                    }
                    if let Some(dir) = csv_dir {
                        report::write_tally_csv(Path::new(dir), q, tally)?;
                    }
                }
            }

            let summary = report::build_summary_js(&survey, &result, records.len());
            let pretty = serde_json::to_string_pretty(&summary).context(SerializingJsonSnafu {})?;
            if let Some(o) = out {
                write_output(o, &pretty)?;
            }
            if let Some(reference_path) = reference {
                report::check_reference(&pretty, reference_path)?;
            }
            Ok(())
        }
        Command::Responses { page } => {
            let records = store.load()?;
            let settings = survey.config.responses_settings();
            println!(
                "{}",
                responses::render_page(&survey.catalog, &settings, &records, *page)
            );
            Ok(())
        }
        Command::Edit {
            attempt,
            question,
            value,
        } => {
            let record = responses::edit_answer(&survey, &store, attempt, question, value)?;
            info!("Updated attempt {}", record.attempt_id);
            Ok(())
        }
        Command::Delete { attempt } => store.delete(attempt),
        Command::Clear { yes } => {
            if !*yes {
                whatever!("Refusing to delete all the attempts without --yes")
            }
            store.clear()
        }
        Command::Export { format, out } => {
            let format = ExportFormat::parse(format)?;
            let records = store.load()?;
            let path = match out {
                Some(o) => PathBuf::from(o),
                None => {
                    let dir = survey
                        .config
                        .survey_settings
                        .output_directory
                        .clone()
                        .unwrap_or_else(|| ".".to_string());
                    survey.resolve(&dir).join(format.default_file_name())
                }
            };
            export_data(&survey.catalog, &records, format, &path)
        }
        Command::Import { file, worksheet } => {
            let added = import_data(&survey, &store, file, worksheet.as_deref())?;
            println!("Imported {} attempts", added);
            Ok(())
        }
    }
}

#[cfg(test)]
fn run_analysis_test(test_name: &str) {
    let test_dir = option_env!("SURVEY_TEST_DIR").unwrap_or(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/fixtures"
    ));
    info!("Running test {}", test_name);
    let config_path = format!("{}/{}/{}_config.json", test_dir, test_name, test_name);
    let summary_path = format!("{}/{}/{}_expected_summary.json", test_dir, test_name, test_name);
    let survey = Survey::load(&config_path).unwrap();
    let records = survey.store().load().unwrap();
    let result = run_analysis(&survey, &records).unwrap();
    let summary = report::build_summary_js(&survey, &result, records.len());
    let pretty = serde_json::to_string_pretty(&summary).unwrap();
    report::check_reference(&pretty, &summary_path).unwrap();
}

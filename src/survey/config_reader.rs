use crate::survey::*;

use serde::{Deserialize, Serialize};

pub const DEFAULT_STORE_FILE: &str = "attempts.json";
pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SurveySettings {
    #[serde(rename = "surveyName")]
    pub survey_name: String,
    #[serde(rename = "storePath")]
    pub store_path: Option<String>,
    #[serde(rename = "outputDirectory")]
    pub output_directory: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct QuestionOption {
    pub value: String,
    pub label: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct QuestionConfig {
    pub id: String,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub options: Option<Vec<QuestionOption>>,
    #[serde(rename = "subQuestion")]
    pub sub_question: Option<Box<QuestionConfig>>,
    #[serde(rename = "subQuestions")]
    pub sub_questions: Option<Vec<QuestionConfig>>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReportSettings {
    #[serde(rename = "excludedQuestions")]
    pub excluded_questions: Option<Vec<String>>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResponsesConfig {
    #[serde(rename = "pageSize")]
    pub page_size: Option<usize>,
    #[serde(rename = "tableQuestions")]
    pub table_questions: Option<Vec<String>>,
    #[serde(rename = "requiredQuestions")]
    pub required_questions: Option<Vec<String>>,
    #[serde(rename = "breakdownQuestion")]
    pub breakdown_question: Option<String>,
    #[serde(rename = "flagQuestions")]
    pub flag_questions: Option<Vec<String>>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SurveyConfig {
    #[serde(rename = "surveySettings")]
    pub survey_settings: SurveySettings,
    pub questions: Vec<QuestionConfig>,
    pub report: Option<ReportSettings>,
    pub responses: Option<ResponsesConfig>,
}

/// The settings of the responses view, with the defaults filled in.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ResponsesSettings {
    pub page_size: usize,
    pub table_questions: Vec<String>,
    pub required_questions: Vec<String>,
    pub breakdown_question: Option<String>,
    pub flag_questions: Vec<String>,
}

fn strings(l: &[&str]) -> Vec<String> {
    l.iter().map(|s| s.to_string()).collect()
}

impl SurveyConfig {
    /// Questions left out of the analysis report, on top of the text and date questions.
    pub fn excluded_questions(&self) -> Vec<String> {
        self.report
            .as_ref()
            .and_then(|r| r.excluded_questions.clone())
            .unwrap_or_else(|| strings(&["student_name", "birth_place", "address"]))
    }

    pub fn responses_settings(&self) -> ResponsesSettings {
        let r = self.responses.clone().unwrap_or_default();
        let table_questions = r.table_questions.unwrap_or_else(|| {
            strings(&[
                "student_name",
                "birth_date",
                "repeat_year",
                "preferred_branch",
                "counselor_discussion",
            ])
        });
        ResponsesSettings {
            // A zero page size would never end.
            page_size: r.page_size.filter(|n| *n > 0).unwrap_or(DEFAULT_PAGE_SIZE),
            required_questions: r
                .required_questions
                .unwrap_or_else(|| table_questions.clone()),
            table_questions,
            breakdown_question: r
                .breakdown_question
                .or_else(|| Some("preferred_branch".to_string())),
            flag_questions: r
                .flag_questions
                .unwrap_or_else(|| strings(&["study_difficulties", "counselor_discussion"])),
        }
    }
}

pub fn read_config(path: &str) -> SurveyResult<SurveyConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: SurveyConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    Ok(config)
}

/// Turns the questions of the configuration into the catalog used for tabulation.
pub fn validate_catalog(questions: &[QuestionConfig]) -> SurveyResult<Vec<Question>> {
    let catalog: Vec<Question> = questions
        .iter()
        .map(validate_question)
        .collect::<SurveyResult<Vec<Question>>>()?;
    survey_tally::check_catalog(&catalog).context(TallySnafu {})?;
    Ok(catalog)
}

fn validate_question(qc: &QuestionConfig) -> SurveyResult<Question> {
    let options = || -> SurveyResult<Vec<ChoiceOption>> {
        let opts = qc
            .options
            .as_ref()
            .filter(|o| !o.is_empty())
            .context(MissingOptionsSnafu { id: &qc.id })?;
        Ok(opts
            .iter()
            .map(|o| ChoiceOption::new(&o.value, &o.label))
            .collect())
    };
    let kind = match qc.kind.as_str() {
        "text" => QuestionKind::FreeText,
        "date" => QuestionKind::Date,
        "number" => QuestionKind::Numeric,
        "dropdown" => QuestionKind::SingleChoice(options()?),
        "multiselect" => QuestionKind::MultiChoice(options()?),
        "group" => {
            let parts = qc
                .sub_questions
                .as_ref()
                .filter(|l| !l.is_empty())
                .context(EmptyGroupSnafu { id: &qc.id })?;
            QuestionKind::Group(
                parts
                    .iter()
                    .map(validate_question)
                    .collect::<SurveyResult<Vec<Question>>>()?,
            )
        }
        x => {
            return UnknownQuestionKindSnafu {
                id: &qc.id,
                kind: x,
            }
            .fail()
        }
    };
    let mut q = Question::new(&qc.id, &qc.text, kind);
    if let Some(sub) = qc.sub_question.as_deref() {
        q = q.with_sub_question(validate_question(sub)?);
    }
    Ok(q)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(js: JSValue) -> SurveyResult<Vec<Question>> {
        let qs: Vec<QuestionConfig> = serde_json::from_value(js).unwrap();
        validate_catalog(&qs)
    }

    #[test]
    fn reads_all_kinds() {
        let catalog = parse(json!([
            {"id": "student_name", "text": "Name", "type": "text"},
            {"id": "birth_date", "text": "Birth date", "type": "date"},
            {"id": "num_brothers", "text": "Brothers", "type": "number"},
            {"id": "repeat_year", "text": "Repeat", "type": "dropdown",
             "options": [{"value": "yes", "label": "Yes"}, {"value": "no", "label": "No"}]},
            {"id": "subjects", "text": "Subjects", "type": "multiselect",
             "options": [{"value": "math", "label": "Math"}],
             "subQuestion": {"id": "subjects_reason", "text": "Why?", "type": "text"}},
            {"id": "parents_interest", "text": "Parents", "type": "group",
             "subQuestions": [{"id": "father_interest", "text": "Father", "type": "dropdown",
                               "options": [{"value": "always", "label": "Always"}]}]}
        ]))
        .unwrap();
        assert_eq!(catalog.len(), 6);
        assert_eq!(catalog[0].kind, QuestionKind::FreeText);
        assert_eq!(catalog[3].label_of("no"), Some("No"));
        assert_eq!(
            catalog[4].sub_question.as_ref().map(|q| q.id.as_str()),
            Some("subjects_reason")
        );
        assert_eq!(catalog[5].parts()[0].id, "father_interest");
    }

    #[test]
    fn rejects_bad_questions() {
        let res = parse(json!([{"id": "q", "text": "Q", "type": "dropdown"}]));
        assert!(matches!(res, Err(SurveyError::MissingOptions { .. })));

        let res = parse(json!([{"id": "q", "text": "Q", "type": "slider"}]));
        assert!(matches!(res, Err(SurveyError::UnknownQuestionKind { kind, .. }) if kind == "slider"));

        let res = parse(json!([{"id": "q", "text": "Q", "type": "group", "subQuestions": []}]));
        assert!(matches!(res, Err(SurveyError::EmptyGroup { .. })));

        let res = parse(json!([
            {"id": "q", "text": "Q", "type": "text"},
            {"id": "q", "text": "Q again", "type": "number"}
        ]));
        assert!(matches!(
            res,
            Err(SurveyError::Tally {
                source: TallyErrors::DuplicateQuestion(_)
            })
        ));
    }

    #[test]
    fn default_settings() {
        let config: SurveyConfig = serde_json::from_value(json!({
            "surveySettings": {"surveyName": "test"},
            "questions": []
        }))
        .unwrap();
        assert_eq!(
            config.excluded_questions(),
            vec!["student_name", "birth_place", "address"]
        );
        let r = config.responses_settings();
        assert_eq!(r.page_size, 10);
        assert_eq!(r.required_questions, r.table_questions);
        assert_eq!(r.breakdown_question.as_deref(), Some("preferred_branch"));
        assert_eq!(r.flag_questions.len(), 2);
    }

    #[test]
    fn configured_settings() {
        let config: SurveyConfig = serde_json::from_value(json!({
            "surveySettings": {"surveyName": "test", "storePath": "data/attempts.json"},
            "questions": [],
            "report": {"excludedQuestions": []},
            "responses": {"pageSize": 0, "tableQuestions": ["a"], "requiredQuestions": []}
        }))
        .unwrap();
        assert!(config.excluded_questions().is_empty());
        let r = config.responses_settings();
        assert_eq!(r.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(r.table_questions, vec!["a"]);
        assert!(r.required_questions.is_empty());
    }
}

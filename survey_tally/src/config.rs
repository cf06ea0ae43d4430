// ********* Input data structures ***********

use std::collections::HashMap;
use std::error::Error;
use std::fmt::Display;

use indexmap::IndexMap;

/// One selectable entry of a choice question.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct ChoiceOption {
    /// The value recorded in the answers.
    pub value: String,
    /// The text shown to the respondent.
    pub label: String,
}

impl ChoiceOption {
    pub fn new(value: &str, label: &str) -> ChoiceOption {
        ChoiceOption {
            value: value.to_string(),
            label: label.to_string(),
        }
    }
}

/// All the kinds of questions that can be part of a catalog.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum QuestionKind {
    /// Free-form text. Never tabulated.
    FreeText,
    /// A calendar date. Never tabulated.
    Date,
    /// A number. Every distinct number is its own bucket.
    Numeric,
    /// Exactly one option out of the list.
    SingleChoice(Vec<ChoiceOption>),
    /// Any number of options out of the list. Each selection is counted.
    MultiChoice(Vec<ChoiceOption>),
    /// A set of part questions answered together, in order.
    Group(Vec<Question>),
}

/// A question of the catalog.
///
/// Questions form a tree: a group holds its parts, and any question may carry
/// one sub-question that elaborates on the parent answer.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub kind: QuestionKind,
    pub sub_question: Option<Box<Question>>,
}

impl Question {
    pub fn new(id: &str, text: &str, kind: QuestionKind) -> Question {
        Question {
            id: id.to_string(),
            text: text.to_string(),
            kind,
            sub_question: None,
        }
    }

    pub fn with_sub_question(self, sub_question: Question) -> Question {
        Question {
            sub_question: Some(Box::new(sub_question)),
            ..self
        }
    }

    /// True if the answers to this question can be tabulated as frequencies.
    pub fn is_eligible(&self) -> bool {
        !matches!(self.kind, QuestionKind::FreeText | QuestionKind::Date)
    }

    /// The declared options, in order. Empty for the kinds without options.
    pub fn options(&self) -> &[ChoiceOption] {
        match &self.kind {
            QuestionKind::SingleChoice(opts) | QuestionKind::MultiChoice(opts) => opts,
            _ => &[],
        }
    }

    /// The part questions of a group. Empty for the other kinds.
    pub fn parts(&self) -> &[Question] {
        match &self.kind {
            QuestionKind::Group(parts) => parts,
            _ => &[],
        }
    }

    /// Finds the label of an option value, if it is declared.
    pub fn label_of(&self, value: &str) -> Option<&str> {
        self.options()
            .iter()
            .find(|o| o.value == value)
            .map(|o| o.label.as_str())
    }
}

/// The raw value of an answer, as recorded.
///
/// Nothing guarantees that the shape of the value matches the kind of the
/// question: this is checked when tabulating.
#[derive(PartialEq, Debug, Clone)]
pub enum AnswerValue {
    Text(String),
    Number(f64),
    Choices(Vec<String>),
    /// A value that could not be understood when it was read.
    Invalid,
}

/// The answer to one question in an attempt.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct Answer {
    pub value: Option<AnswerValue>,
    /// The answer to the sub-question, if any.
    pub sub_answer: Option<Box<Answer>>,
    /// For group questions, the answers of the parts keyed by part id.
    pub parts: Vec<(String, Answer)>,
}

impl Answer {
    pub fn text(s: &str) -> Answer {
        Answer::from_value(AnswerValue::Text(s.to_string()))
    }

    pub fn number(n: f64) -> Answer {
        Answer::from_value(AnswerValue::Number(n))
    }

    pub fn choices(values: &[&str]) -> Answer {
        Answer::from_value(AnswerValue::Choices(
            values.iter().map(|s| s.to_string()).collect(),
        ))
    }

    pub fn from_value(value: AnswerValue) -> Answer {
        Answer {
            value: Some(value),
            ..Answer::default()
        }
    }

    pub fn group(parts: Vec<(String, Answer)>) -> Answer {
        Answer {
            parts,
            ..Answer::default()
        }
    }

    pub fn with_sub_answer(self, sub_answer: Answer) -> Answer {
        Answer {
            sub_answer: Some(Box::new(sub_answer)),
            ..self
        }
    }

    pub fn part(&self, part_id: &str) -> Option<&Answer> {
        self.parts
            .iter()
            .find(|(id, _)| id == part_id)
            .map(|(_, a)| a)
    }

    /// True if nothing meaningful was recorded.
    pub fn is_blank(&self) -> bool {
        let value_blank = match &self.value {
            None => true,
            Some(AnswerValue::Text(s)) => s.trim().is_empty(),
            Some(AnswerValue::Choices(l)) => l.iter().all(|s| s.is_empty()),
            Some(AnswerValue::Number(n)) => !n.is_finite(),
            Some(AnswerValue::Invalid) => true,
        };
        value_blank && self.parts.iter().all(|(_, a)| a.is_blank())
    }
}

/// One submission of the whole questionnaire.
#[derive(PartialEq, Debug, Clone)]
pub struct Attempt {
    pub id: String,
    pub number: u64,
    /// Milliseconds since the Unix epoch.
    pub started_at: i64,
    pub answers: HashMap<String, Answer>,
}

impl Attempt {
    pub fn new(id: &str, number: u64, started_at: i64) -> Attempt {
        Attempt {
            id: id.to_string(),
            number,
            started_at,
            answers: HashMap::new(),
        }
    }

    pub fn with_answer(mut self, question_id: &str, answer: Answer) -> Attempt {
        self.answers.insert(question_id.to_string(), answer);
        self
    }
}

// ******** Output data structures *********

/// The frequency table of one question.
#[derive(PartialEq, Debug, Clone)]
pub struct QuestionTally {
    pub question_id: String,
    /// Occurrences of each value, in order of first observation.
    pub counts: IndexMap<String, u64>,
    /// Same keys as `counts`, expressed in percent of `total`.
    pub percentages: IndexMap<String, f64>,
    /// Number of recorded answers. A multi-choice answer counts once per selection.
    pub total: u64,
}

#[derive(PartialEq, Debug, Clone, Default)]
pub struct AggregationResult {
    /// Keyed by question id, in catalog order.
    pub tallies: IndexMap<String, QuestionTally>,
}

/// Errors that prevent the aggregation from completing.
///
/// Problems with individual answers are never reported: those answers are
/// skipped.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum TallyErrors {
    EmptyQuestionId { position: usize },
    DuplicateQuestion(String),
    DuplicateAttempt(String),
}

impl Error for TallyErrors {}

impl Display for TallyErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TallyErrors::EmptyQuestionId { position } => {
                write!(f, "question at position {} has an empty id", position)
            }
            TallyErrors::DuplicateQuestion(id) => {
                write!(f, "question id {:?} is declared more than once", id)
            }
            TallyErrors::DuplicateAttempt(id) => {
                write!(f, "attempt id {:?} appears more than once", id)
            }
        }
    }
}

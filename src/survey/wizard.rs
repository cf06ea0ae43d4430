// Filling in the questionnaire, one question at a time.

use crate::survey::io_common::now_millis;
use crate::survey::store::AttemptRecord;
use crate::survey::*;

use chrono::NaiveDate;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// The state of one attempt being filled in.
#[derive(Debug, Clone)]
pub struct Wizard<'a> {
    catalog: &'a [Question],
    current: usize,
    answers: JSMap<String, JSValue>,
    attempt_number: u64,
    started_at: i64,
    cancelled: bool,
}

impl<'a> Wizard<'a> {
    pub fn new(catalog: &'a [Question], attempt_number: u64) -> Wizard<'a> {
        Wizard {
            catalog,
            current: 0,
            answers: JSMap::new(),
            attempt_number,
            started_at: now_millis(),
            cancelled: false,
        }
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_question(&self) -> Option<&'a Question> {
        self.catalog.get(self.current)
    }

    /// Moves to the next question. Returns false on the last question.
    pub fn next(&mut self) -> bool {
        if self.is_last() || self.catalog.is_empty() {
            false
        } else {
            self.current += 1;
            true
        }
    }

    /// Moves to the previous question. Returns false on the first question.
    pub fn prev(&mut self) -> bool {
        if self.is_first() {
            false
        } else {
            self.current -= 1;
            true
        }
    }

    pub fn is_first(&self) -> bool {
        self.current == 0
    }

    pub fn is_last(&self) -> bool {
        self.current + 1 >= self.catalog.len()
    }

    /// How far along the questionnaire the current question is, in percent.
    pub fn progress(&self) -> f64 {
        if self.catalog.is_empty() {
            0.0
        } else {
            (self.current + 1) as f64 / self.catalog.len() as f64 * 100.0
        }
    }

    /// Records an answer. A blank answer removes any previous answer.
    pub fn set_answer(&mut self, question_id: &str, answer: &Answer) {
        if answer.is_blank() {
            self.answers.remove(question_id);
        } else {
            self.answers
                .insert(question_id.to_string(), encode_answer(answer));
        }
    }

    pub fn answer(&self, question_id: &str) -> Option<Answer> {
        self.answers.get(question_id).map(decode_answer)
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    /// The finished attempt, or nothing if the wizard was cancelled.
    pub fn complete(self) -> Option<AttemptRecord> {
        if self.cancelled {
            return None;
        }
        let id = uuid::Uuid::new_v4().to_string();
        let mut record = AttemptRecord::new(&id, self.attempt_number, self.started_at);
        record.answers = self.answers;
        record.current_question_index = Some(self.current);
        Some(record)
    }
}

fn invalid<T>(question: &Question, reason: &str) -> SurveyResult<T> {
    InvalidAnswerSnafu {
        question_id: &question.id,
        reason,
    }
    .fail()
}

// An option given by value, by label or by its 1-based position.
fn resolve_option(question: &Question, token: &str) -> SurveyResult<String> {
    let opts = question.options();
    if let Some(o) = opts
        .iter()
        .find(|o| o.value == token || o.label.eq_ignore_ascii_case(token))
    {
        return Ok(o.value.clone());
    }
    match token.parse::<usize>() {
        Ok(idx) if idx >= 1 && idx <= opts.len() => Ok(opts[idx - 1].value.clone()),
        _ => invalid(question, &format!("{:?} is not one of the options", token)),
    }
}

/// Reads the value typed for a question.
///
/// An empty line means no answer. Group questions are answered part by part
/// and have no value of their own.
pub fn parse_input(question: &Question, raw: &str) -> SurveyResult<Option<AnswerValue>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let value = match &question.kind {
        QuestionKind::FreeText => AnswerValue::Text(raw.to_string()),
        QuestionKind::Date => match NaiveDate::parse_from_str(raw, DATE_FORMAT) {
            Ok(_) => AnswerValue::Text(raw.to_string()),
            Err(_) => return invalid(question, "expected a date as YYYY-MM-DD"),
        },
        QuestionKind::Numeric => match raw.parse::<f64>() {
            Ok(n) if n.is_finite() => AnswerValue::Number(n),
            _ => return invalid(question, "expected a number"),
        },
        QuestionKind::SingleChoice(_) => AnswerValue::Text(resolve_option(question, raw)?),
        QuestionKind::MultiChoice(_) => {
            let mut values: Vec<String> = Vec::new();
            for token in raw.split(',').map(|t| t.trim()).filter(|t| !t.is_empty()) {
                let v = resolve_option(question, token)?;
                if !values.contains(&v) {
                    values.push(v);
                }
            }
            AnswerValue::Choices(values)
        }
        QuestionKind::Group(_) => {
            return invalid(question, "group questions are answered part by part")
        }
    };
    Ok(Some(value))
}

// ******** Line-based driver ***********

enum Step<T> {
    Value(T),
    Prev,
    Cancel,
}

fn say<W: Write>(output: &mut W, line: &str) -> SurveyResult<()> {
    writeln!(output, "{}", line).context(WritingFileSnafu { path: "stdout" })
}

fn read_line<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> SurveyResult<Step<String>> {
    write!(output, "> ").context(WritingFileSnafu { path: "stdout" })?;
    output.flush().context(WritingFileSnafu { path: "stdout" })?;
    let mut line = String::new();
    let n = input.read_line(&mut line).context(ReadingInputSnafu {})?;
    // End of input cancels the attempt.
    if n == 0 {
        return Ok(Step::Cancel);
    }
    Ok(match line.trim() {
        ":prev" => Step::Prev,
        ":cancel" => Step::Cancel,
        s => Step::Value(s.to_string()),
    })
}

fn show_question<W: Write>(question: &Question, output: &mut W) -> SurveyResult<()> {
    let hint = match &question.kind {
        QuestionKind::Date => " (YYYY-MM-DD)",
        QuestionKind::Numeric => " (number)",
        QuestionKind::MultiChoice(_) => " (comma separated)",
        _ => "",
    };
    say(output, &format!("{}{}", question.text, hint))?;
    for (idx, o) in question.options().iter().enumerate() {
        say(output, &format!("  {}) {}", idx + 1, o.label))?;
    }
    Ok(())
}

fn ask_value<R: BufRead, W: Write>(
    question: &Question,
    input: &mut R,
    output: &mut W,
) -> SurveyResult<Step<Option<AnswerValue>>> {
    show_question(question, output)?;
    loop {
        match read_line(input, output)? {
            Step::Value(raw) => match parse_input(question, &raw) {
                Ok(v) => return Ok(Step::Value(v)),
                Err(e) => {
                    debug!("ask_value: {:?}", e);
                    say(output, &e.to_string())?;
                }
            },
            Step::Prev => return Ok(Step::Prev),
            Step::Cancel => return Ok(Step::Cancel),
        }
    }
}

fn ask_answer<R: BufRead, W: Write>(
    question: &Question,
    input: &mut R,
    output: &mut W,
) -> SurveyResult<Step<Answer>> {
    let mut answer = match &question.kind {
        QuestionKind::Group(parts) => {
            say(output, &question.text)?;
            let mut collected: Vec<(String, Answer)> = Vec::new();
            for part in parts.iter() {
                match ask_answer(part, input, output)? {
                    Step::Value(a) if a.is_blank() => {}
                    Step::Value(a) => collected.push((part.id.clone(), a)),
                    Step::Prev => return Ok(Step::Prev),
                    Step::Cancel => return Ok(Step::Cancel),
                }
            }
            Answer::group(collected)
        }
        _ => match ask_value(question, input, output)? {
            Step::Value(value) => Answer {
                value,
                ..Answer::default()
            },
            Step::Prev => return Ok(Step::Prev),
            Step::Cancel => return Ok(Step::Cancel),
        },
    };
    // The sub-question only follows an actual answer.
    if let Some(sub) = question.sub_question.as_deref() {
        if !answer.is_blank() {
            match ask_answer(sub, input, output)? {
                Step::Value(a) if a.is_blank() => {}
                Step::Value(a) => answer = answer.with_sub_answer(a),
                Step::Prev => return Ok(Step::Prev),
                Step::Cancel => return Ok(Step::Cancel),
            }
        }
    }
    Ok(Step::Value(answer))
}

/// Runs the whole questionnaire over a line-based input.
///
/// `:prev` goes back one question and `:cancel` (or the end of the input)
/// abandons the attempt, in which case nothing is returned.
pub fn run_interactive<R: BufRead, W: Write>(
    catalog: &[Question],
    attempt_number: u64,
    input: &mut R,
    output: &mut W,
) -> SurveyResult<Option<AttemptRecord>> {
    let mut wizard = Wizard::new(catalog, attempt_number);
    say(
        output,
        &format!("Attempt number {} ({} questions)", attempt_number, catalog.len()),
    )?;
    while let Some(question) = wizard.current_question() {
        say(
            output,
            &format!(
                "[{}/{}] {:.0}%",
                wizard.current_index() + 1,
                catalog.len(),
                wizard.progress()
            ),
        )?;
        match ask_answer(question, input, output)? {
            Step::Value(answer) => {
                wizard.set_answer(&question.id, &answer);
                if !wizard.next() {
                    break;
                }
            }
            Step::Prev => {
                wizard.prev();
            }
            Step::Cancel => {
                wizard.cancel();
                break;
            }
        }
    }
    Ok(wizard.complete())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn yes_no() -> Vec<ChoiceOption> {
        vec![ChoiceOption::new("yes", "Yes"), ChoiceOption::new("no", "No")]
    }

    fn catalog() -> Vec<Question> {
        vec![
            Question::new("student_name", "Name", QuestionKind::FreeText),
            Question::new("repeat_year", "Repeated a year?", QuestionKind::SingleChoice(yes_no())),
            Question::new(
                "subjects",
                "Preferred subjects",
                QuestionKind::MultiChoice(vec![
                    ChoiceOption::new("math", "Mathematics"),
                    ChoiceOption::new("physics", "Physics"),
                    ChoiceOption::new("biology", "Biology"),
                ]),
            )
            .with_sub_question(Question::new("subjects_reason", "Why?", QuestionKind::FreeText)),
            Question::new(
                "parents_interest",
                "Parents interest",
                QuestionKind::Group(vec![
                    Question::new("father_interest", "Father", QuestionKind::SingleChoice(yes_no())),
                    Question::new("mother_interest", "Mother", QuestionKind::SingleChoice(yes_no())),
                ]),
            ),
        ]
    }

    #[test]
    fn navigation_is_clamped() {
        let catalog = catalog();
        let mut w = Wizard::new(&catalog, 1);
        assert!(w.is_first());
        assert!(!w.prev());
        assert_eq!(w.progress(), 25.0);
        assert!(w.next());
        assert!(w.next());
        assert!(w.next());
        assert!(w.is_last());
        assert!(!w.next());
        assert_eq!(w.current_index(), 3);
        assert_eq!(w.progress(), 100.0);
        assert!(w.prev());
        assert_eq!(w.current_index(), 2);
    }

    #[test]
    fn empty_catalog() {
        let mut w = Wizard::new(&[], 1);
        assert_eq!(w.progress(), 0.0);
        assert!(!w.next());
        assert!(w.current_question().is_none());
    }

    #[test]
    fn answers_and_completion() {
        let catalog = catalog();
        let mut w = Wizard::new(&catalog, 7);
        w.set_answer("repeat_year", &Answer::text("no"));
        assert_eq!(w.answer("repeat_year"), Some(Answer::text("no")));
        w.set_answer("repeat_year", &Answer::text(""));
        assert_eq!(w.answer("repeat_year"), None);
        w.set_answer("student_name", &Answer::text("Amina"));
        let r = w.complete().unwrap();
        assert_eq!(r.attempt_number, 7);
        assert_eq!(r.answers.len(), 1);
        assert_eq!(r.attempt_id.len(), 36);
        assert!(r.start_time > 0);

        let mut w = Wizard::new(&catalog, 8);
        w.set_answer("student_name", &Answer::text("Karim"));
        w.cancel();
        assert!(w.complete().is_none());
    }

    #[test]
    fn input_parsing() {
        let c = catalog();
        assert_eq!(parse_input(&c[0], "  ").unwrap(), None);
        assert_eq!(
            parse_input(&c[0], " Amina ").unwrap(),
            Some(AnswerValue::Text("Amina".to_string()))
        );
        assert_eq!(
            parse_input(&c[1], "2").unwrap(),
            Some(AnswerValue::Text("no".to_string()))
        );
        assert_eq!(
            parse_input(&c[1], "Yes").unwrap(),
            Some(AnswerValue::Text("yes".to_string()))
        );
        assert!(matches!(
            parse_input(&c[1], "3"),
            Err(SurveyError::InvalidAnswer { .. })
        ));
        assert_eq!(
            parse_input(&c[2], "3, math,3").unwrap(),
            Some(AnswerValue::Choices(vec![
                "biology".to_string(),
                "math".to_string()
            ]))
        );
        assert!(parse_input(&c[3], "x").is_err());

        let date = Question::new("birth_date", "Birth date", QuestionKind::Date);
        assert_eq!(
            parse_input(&date, "2010-02-03").unwrap(),
            Some(AnswerValue::Text("2010-02-03".to_string()))
        );
        assert!(parse_input(&date, "03/02/2010").is_err());

        let num = Question::new("num_brothers", "Brothers", QuestionKind::Numeric);
        assert_eq!(parse_input(&num, "0").unwrap(), Some(AnswerValue::Number(0.0)));
        assert!(parse_input(&num, "two").is_err());
    }

    #[test]
    fn interactive_session() {
        let catalog = catalog();
        let lines = [
            "Amina",
            "2",
            ":prev",
            "maybe",
            "yes",
            "1, biology",
            "I like it",
            "yes",
            "",
        ];
        let mut input = Cursor::new(lines.join("\n") + "\n");
        let mut output: Vec<u8> = Vec::new();
        let r = run_interactive(&catalog, 5, &mut input, &mut output)
            .unwrap()
            .unwrap();
        assert_eq!(r.attempt_number, 5);
        assert_eq!(r.current_question_index, Some(3));
        assert_eq!(r.answers["student_name"], json!({"value": "Amina"}));
        assert_eq!(r.answers["repeat_year"], json!({"value": "yes"}));
        assert_eq!(
            r.answers["subjects"],
            json!({"value": ["math", "biology"], "subQuestion": {"value": "I like it"}})
        );
        assert_eq!(
            r.answers["parents_interest"],
            json!({"father_interest": {"value": "yes"}})
        );

        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("[1/4] 25%"));
        assert!(text.contains("\"maybe\" is not one of the options"));
        assert!(text.contains("  3) Biology"));
    }

    #[test]
    fn sub_question_needs_a_parent_answer() {
        let catalog = vec![catalog().remove(2)];
        let mut input = Cursor::new("\n");
        let mut output: Vec<u8> = Vec::new();
        let r = run_interactive(&catalog, 1, &mut input, &mut output)
            .unwrap()
            .unwrap();
        assert!(r.answers.is_empty());
        assert!(!String::from_utf8(output).unwrap().contains("Why?"));
    }

    #[test]
    fn cancelled_sessions_produce_nothing() {
        let catalog = catalog();
        let mut output: Vec<u8> = Vec::new();
        let mut input = Cursor::new("Amina\n:cancel\n");
        assert!(run_interactive(&catalog, 1, &mut input, &mut output)
            .unwrap()
            .is_none());
        let mut input = Cursor::new("Amina\n");
        assert!(run_interactive(&catalog, 1, &mut input, &mut output)
            .unwrap()
            .is_none());
    }
}

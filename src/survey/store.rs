// The attempts, kept in a single JSON file.

use crate::survey::*;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One attempt, in the form it is stored and exported.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    #[serde(rename = "attemptId")]
    pub attempt_id: String,
    #[serde(rename = "attemptNumber")]
    pub attempt_number: u64,
    /// Milliseconds since the Unix epoch.
    #[serde(rename = "startTime")]
    pub start_time: i64,
    pub answers: JSMap<String, JSValue>,
    #[serde(
        rename = "currentQuestionIndex",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub current_question_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(rename = "schoolName", default, skip_serializing_if = "Option::is_none")]
    pub school_name: Option<String>,
    #[serde(
        rename = "guidanceCenter",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub guidance_center: Option<String>,
}

impl AttemptRecord {
    pub fn new(attempt_id: &str, attempt_number: u64, start_time: i64) -> AttemptRecord {
        AttemptRecord {
            attempt_id: attempt_id.to_string(),
            attempt_number,
            start_time,
            answers: JSMap::new(),
            current_question_index: None,
            class: None,
            school_name: None,
            guidance_center: None,
        }
    }
}

pub struct AttemptStore {
    path: PathBuf,
}

impl AttemptStore {
    pub fn open(path: &Path) -> AttemptStore {
        AttemptStore {
            path: path.to_path_buf(),
        }
    }

    fn path_str(&self) -> String {
        self.path.display().to_string()
    }

    /// All the stored attempts, in the order they were saved.
    pub fn load(&self) -> SurveyResult<Vec<AttemptRecord>> {
        if !self.path.exists() {
            debug!("load: no store at {:?}", self.path);
            return Ok(Vec::new());
        }
        let path = self.path_str();
        let contents = fs::read_to_string(&self.path).context(OpeningJsonSnafu { path: &path })?;
        let js: JSValue =
            serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path: &path })?;
        let records = parse_records(&js, &path)?;
        debug!("load: {} attempts from {:?}", records.len(), path);
        Ok(records)
    }

    fn write(&self, records: &[AttemptRecord]) -> SurveyResult<()> {
        let path = self.path_str();
        let s = serde_json::to_string_pretty(records).context(SerializingJsonSnafu {})?;
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).context(WritingFileSnafu { path: &path })?;
        }
        fs::write(&self.path, s).context(WritingFileSnafu { path })
    }

    /// Replaces the attempt with the same id, or appends it.
    pub fn save(&self, record: &AttemptRecord) -> SurveyResult<()> {
        let mut records = self.load()?;
        match records
            .iter_mut()
            .find(|r| r.attempt_id == record.attempt_id)
        {
            Some(existing) => {
                debug!("save: replacing attempt {}", record.attempt_id);
                *existing = record.clone();
            }
            None => {
                debug!("save: new attempt {}", record.attempt_id);
                records.push(record.clone());
            }
        }
        self.write(&records)
    }

    pub fn find(&self, attempt_id: &str) -> SurveyResult<AttemptRecord> {
        self.load()?
            .into_iter()
            .find(|r| r.attempt_id == attempt_id)
            .context(UnknownAttemptSnafu { id: attempt_id })
    }

    pub fn delete(&self, attempt_id: &str) -> SurveyResult<()> {
        let records = self.load()?;
        let before = records.len();
        let remaining: Vec<AttemptRecord> = records
            .into_iter()
            .filter(|r| r.attempt_id != attempt_id)
            .collect();
        ensure!(
            remaining.len() < before,
            UnknownAttemptSnafu { id: attempt_id }
        );
        info!("Deleted attempt {}", attempt_id);
        self.write(&remaining)
    }

    /// Removes every attempt.
    pub fn clear(&self) -> SurveyResult<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).context(WritingFileSnafu {
                path: self.path_str(),
            })?;
        }
        info!("Cleared all attempts from {:?}", self.path);
        Ok(())
    }

    /// Merges imported attempts into the store. Returns how many were added.
    ///
    /// Attempts whose id is already stored are skipped. Attempts without a
    /// number, or with a number already in use, are numbered after the
    /// highest stored number.
    pub fn import(&self, imported: Vec<AttemptRecord>) -> SurveyResult<usize> {
        ensure!(!imported.is_empty(), EmptyImportSnafu {});
        let mut records = self.load()?;
        let mut ids: HashSet<String> = records.iter().map(|r| r.attempt_id.clone()).collect();
        let mut numbers: HashSet<u64> = records.iter().map(|r| r.attempt_number).collect();
        let mut added = 0;
        for mut r in imported {
            if !ids.insert(r.attempt_id.clone()) {
                warn!("import: skipping attempt {}: already stored", r.attempt_id);
                continue;
            }
            if r.attempt_number == 0 || numbers.contains(&r.attempt_number) {
                let n = max_attempt_number(&records) + 1;
                debug!(
                    "import: attempt {} renumbered from {} to {}",
                    r.attempt_id, r.attempt_number, n
                );
                r.attempt_number = n;
            }
            numbers.insert(r.attempt_number);
            records.push(r);
            added += 1;
        }
        self.write(&records)?;
        info!("Imported {} attempts", added);
        Ok(added)
    }

    /// The number of the next attempt: one more than the highest stored number.
    pub fn next_attempt_number(&self) -> SurveyResult<u64> {
        Ok(max_attempt_number(&self.load()?) + 1)
    }
}

fn max_attempt_number(records: &[AttemptRecord]) -> u64 {
    records.iter().map(|r| r.attempt_number).max().unwrap_or(0)
}

fn parse_records(js: &JSValue, path: &str) -> SurveyResult<Vec<AttemptRecord>> {
    let l = js.as_array().context(NotAnAttemptListSnafu { path })?;
    let mut res: Vec<AttemptRecord> = Vec::new();
    for (index, x) in l.iter().enumerate() {
        let r: AttemptRecord = match serde_json::from_value(x.clone()) {
            Ok(r) => r,
            Err(e) => {
                return MalformedAttemptSnafu {
                    path,
                    index,
                    reason: e.to_string(),
                }
                .fail()
            }
        };
        res.push(r);
    }
    Ok(res)
}

/// Checks a document of imported attempts.
///
/// It must be a non-empty list, and every attempt must have an id, a number, a
/// start time and answers.
pub fn validate_import(js: &JSValue, path: &str) -> SurveyResult<Vec<AttemptRecord>> {
    let l = js.as_array().context(NotAnAttemptListSnafu { path })?;
    ensure!(!l.is_empty(), EmptyImportSnafu {});
    for (index, x) in l.iter().enumerate() {
        let reason = if x.get("attemptId").and_then(|v| v.as_str()).map_or(true, |s| s.is_empty()) {
            Some("missing attemptId")
        } else if x.get("attemptNumber").and_then(|v| v.as_u64()).map_or(true, |n| n == 0) {
            Some("missing attemptNumber")
        } else if x.get("startTime").and_then(|v| v.as_i64()).map_or(true, |n| n == 0) {
            Some("missing startTime")
        } else if !x.get("answers").map_or(false, |v| v.is_object()) {
            Some("missing answers")
        } else {
            None
        };
        if let Some(reason) = reason {
            return MalformedAttemptSnafu {
                path,
                index,
                reason,
            }
            .fail();
        }
    }
    parse_records(js, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(name: &str) -> AttemptStore {
        let dir = std::env::temp_dir().join(format!("surveytab-{}-{}", name, uuid::Uuid::new_v4()));
        AttemptStore::open(&dir.join("attempts.json"))
    }

    fn record(id: &str, number: u64) -> AttemptRecord {
        let mut r = AttemptRecord::new(id, number, 1_700_000_000_000);
        r.answers
            .insert("repeat_year".to_string(), json!({"value": "no"}));
        r
    }

    #[test]
    fn missing_store_is_empty() {
        let store = temp_store("missing");
        assert!(store.load().unwrap().is_empty());
        assert_eq!(store.next_attempt_number().unwrap(), 1);
    }

    #[test]
    fn save_upserts_by_id() {
        let store = temp_store("save");
        store.save(&record("a", 1)).unwrap();
        store.save(&record("b", 2)).unwrap();
        let mut edited = record("a", 1);
        edited
            .answers
            .insert("repeat_year".to_string(), json!({"value": "yes"}));
        store.save(&edited).unwrap();

        let records = store.load().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].answers["repeat_year"]["value"], json!("yes"));
        assert_eq!(store.next_attempt_number().unwrap(), 3);
        assert_eq!(store.find("b").unwrap().attempt_number, 2);
        store.clear().unwrap();
    }

    #[test]
    fn delete_and_clear() {
        let store = temp_store("delete");
        store.save(&record("a", 1)).unwrap();
        store.save(&record("b", 2)).unwrap();
        store.delete("a").unwrap();
        assert_eq!(store.load().unwrap().len(), 1);
        assert!(matches!(
            store.delete("a"),
            Err(SurveyError::UnknownAttempt { .. })
        ));
        store.clear().unwrap();
        assert!(store.load().unwrap().is_empty());
        // Clearing twice is fine.
        store.clear().unwrap();
    }

    #[test]
    fn import_skips_known_ids() {
        let store = temp_store("import");
        store.save(&record("a", 1)).unwrap();
        let added = store
            .import(vec![record("a", 1), record("c", 2), record("d", 3)])
            .unwrap();
        assert_eq!(added, 2);
        assert_eq!(store.load().unwrap().len(), 3);
        assert!(matches!(
            store.import(vec![]),
            Err(SurveyError::EmptyImport {})
        ));
        store.clear().unwrap();
    }

    #[test]
    fn numbers_keep_increasing_after_import() {
        let store = temp_store("numbers");
        store.save(&record("a", 5)).unwrap();
        store.import(vec![record("b", 1)]).unwrap();
        assert_eq!(store.next_attempt_number().unwrap(), 6);

        store
            .import(vec![record("c", 5), record("d", 0), record("e", 9)])
            .unwrap();
        let numbers: Vec<u64> = store
            .load()
            .unwrap()
            .iter()
            .map(|r| r.attempt_number)
            .collect();
        assert_eq!(numbers, vec![5, 1, 6, 7, 9]);
        assert_eq!(store.next_attempt_number().unwrap(), 10);
        store.clear().unwrap();
    }

    #[test]
    fn store_must_hold_a_list() {
        let store = temp_store("structure");
        store.save(&record("a", 1)).unwrap();
        fs::write(&store.path, "{\"attemptId\": \"a\"}").unwrap();
        assert!(matches!(
            store.load(),
            Err(SurveyError::NotAnAttemptList { .. })
        ));
        fs::write(&store.path, "[{\"attemptId\": \"a\"}]").unwrap();
        assert!(matches!(
            store.load(),
            Err(SurveyError::MalformedAttempt { index: 0, .. })
        ));
        store.clear().unwrap();
    }

    #[test]
    fn import_validation() {
        let ok = json!([{"attemptId": "x", "attemptNumber": 4, "startTime": 1700000000000_i64,
                         "answers": {"q": {"value": "v"}}, "currentQuestionIndex": 3}]);
        let records = validate_import(&ok, "in.json").unwrap();
        assert_eq!(records[0].attempt_number, 4);
        assert_eq!(records[0].current_question_index, Some(3));

        assert!(matches!(
            validate_import(&json!([]), "in.json"),
            Err(SurveyError::EmptyImport {})
        ));
        assert!(matches!(
            validate_import(&json!({"attemptId": "x"}), "in.json"),
            Err(SurveyError::NotAnAttemptList { .. })
        ));
        let no_number = json!([{"attemptId": "x", "attemptNumber": 0, "startTime": 1, "answers": {}}]);
        assert!(matches!(
            validate_import(&no_number, "in.json"),
            Err(SurveyError::MalformedAttempt { reason, .. }) if reason == "missing attemptNumber"
        ));
        let no_answers = json!([{"attemptId": "x", "attemptNumber": 1, "startTime": 1}]);
        assert!(matches!(
            validate_import(&no_answers, "in.json"),
            Err(SurveyError::MalformedAttempt { reason, .. }) if reason == "missing answers"
        ));
    }
}

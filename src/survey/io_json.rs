// JSON export and import of the attempts.

use crate::survey::*;

use crate::survey::store::{validate_import, AttemptRecord};

pub fn write_attempts(records: &[AttemptRecord], path: &Path) -> SurveyResult<()> {
    let s = serde_json::to_string_pretty(records).context(SerializingJsonSnafu {})?;
    fs::write(path, s).context(WritingFileSnafu {
        path: path.display().to_string(),
    })
}

pub fn read_attempts(path: &str) -> SurveyResult<Vec<AttemptRecord>> {
    info!("Attempting to read attempts from {:?}", path);
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    validate_import(&js, path)
}

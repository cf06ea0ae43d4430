// Spreadsheet export and import, as CSV.

use calamine::DataType;

use crate::survey::{io_common::*, *};

use crate::survey::io_xlsx::attempts_from_rows;
use crate::survey::store::AttemptRecord;

pub const FIXED_COLUMNS: [&str; 3] = ["Attempt ID", "Attempt Number", "Start Time"];

/// The header followed by one row per attempt.
pub fn spreadsheet_rows(catalog: &[Question], records: &[AttemptRecord]) -> Vec<Vec<String>> {
    let mut header: Vec<String> = FIXED_COLUMNS.iter().map(|s| s.to_string()).collect();
    header.extend(catalog.iter().map(|q| q.text.clone()));

    let mut rows: Vec<Vec<String>> = vec![header];
    for r in records.iter() {
        let mut row: Vec<String> = vec![
            r.attempt_id.clone(),
            r.attempt_number.to_string(),
            format_start_time(r.start_time),
        ];
        row.extend(catalog.iter().map(|q| answer_cell(r.answers.get(&q.id))));
        debug!("spreadsheet_rows: {:?}", row);
        rows.push(row);
    }
    rows
}

pub fn write_spreadsheet(
    catalog: &[Question],
    records: &[AttemptRecord],
    path: &Path,
) -> SurveyResult<()> {
    let mut wtr = csv::Writer::from_path(path).context(CsvWriteSnafu {})?;
    for row in spreadsheet_rows(catalog, records) {
        wtr.write_record(&row).context(CsvWriteSnafu {})?;
    }
    wtr.flush().context(WritingFileSnafu {
        path: path.display().to_string(),
    })?;
    Ok(())
}

/// Reads back a spreadsheet export saved as CSV.
///
/// The first line is the header. Columns are mapped to questions the same way
/// as for an Excel spreadsheet.
pub fn read_attempts(path: &str, catalog: &[Question]) -> SurveyResult<Vec<AttemptRecord>> {
    info!("Attempting to read attempts from CSV file {:?}", path);
    let rows = get_records(path)?;
    let (header, rest) = rows.split_first().context(EmptyImportSnafu {})?;
    debug!("read_attempts: header: {:?}", header);
    let refs: Vec<&[DataType]> = rest.iter().map(|r| r.as_slice()).collect();
    attempts_from_rows(catalog, header, &refs, make_default_id(path))
}

fn get_records(path: &str) -> SurveyResult<Vec<Vec<DataType>>> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;
    let mut res: Vec<Vec<DataType>> = Vec::new();
    for (idx, line_r) in rdr.into_records().enumerate() {
        let lineno = idx + 1;
        let line = line_r.context(CsvLineParseSnafu { lineno })?;
        res.push(
            line.iter()
                .map(|s| {
                    if s.is_empty() {
                        DataType::Empty
                    } else {
                        DataType::String(s.to_string())
                    }
                })
                .collect(),
        );
    }
    Ok(res)
}

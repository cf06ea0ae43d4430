// Reading back attempts from a spreadsheet laid out like the export.

use calamine::{open_workbook, DataType, Range, Reader, Xlsx};

use crate::survey::io_csv::FIXED_COLUMNS;
use crate::survey::store::AttemptRecord;
use crate::survey::{io_common::*, *};

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
enum Column {
    Id,
    Number,
    StartTime,
    // Index in the catalog
    Answer(usize),
    Ignored,
}

pub fn read_attempts(
    path: &str,
    worksheet: Option<&str>,
    catalog: &[Question],
) -> SurveyResult<Vec<AttemptRecord>> {
    info!("Attempting to read attempts from spreadsheet {:?}", path);
    let wrange = get_range(path, worksheet)?;
    let mut iter = wrange.rows();
    let header = iter.next().context(EmptyExcelSnafu {})?;
    debug!("read_attempts: header: {:?}", header);
    let rows: Vec<&[DataType]> = iter.collect();
    attempts_from_rows(catalog, header, &rows, make_default_id(path))
}

fn get_range(path: &str, worksheet: Option<&str>) -> SurveyResult<Range<DataType>> {
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;

    // A worksheet name was provided, use it.
    if let Some(worksheet_name) = worksheet {
        debug!("get_range: path: {:?} worksheet: {:?}", path, worksheet_name);
        workbook
            .worksheet_range(worksheet_name)
            .context(EmptyExcelSnafu {})?
            .context(OpeningExcelSnafu { path })
    } else {
        let all_worksheets = workbook.worksheets();
        match all_worksheets.as_slice() {
            [] => EmptyExcelSnafu {}.fail(),
            [(worksheet_name, wrange)] => {
                debug!("get_range: path: {:?} worksheet: {:?}", path, worksheet_name);
                Ok(wrange.clone())
            }
            l => ExcelAmbiguousWorksheetSnafu { count: l.len() }.fail(),
        }
    }
}

fn map_columns(catalog: &[Question], header: &[DataType]) -> Vec<Column> {
    header
        .iter()
        .map(|cell| match cell {
            DataType::String(s) if s == FIXED_COLUMNS[0] => Column::Id,
            DataType::String(s) if s == FIXED_COLUMNS[1] => Column::Number,
            DataType::String(s) if s == FIXED_COLUMNS[2] => Column::StartTime,
            DataType::String(s) => catalog
                .iter()
                .position(|q| q.text == *s || q.id == *s)
                .map(Column::Answer)
                .unwrap_or_else(|| {
                    debug!("map_columns: ignoring column {:?}", s);
                    Column::Ignored
                }),
            _ => Column::Ignored,
        })
        .collect()
}

fn cell_text(cell: &DataType) -> Option<String> {
    match cell {
        DataType::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        DataType::Int(i) => Some(i.to_string()),
        DataType::Float(f) => Some(survey_tally::number_key(*f)),
        _ => None,
    }
}

fn cell_number(cell: &DataType) -> Option<u64> {
    match cell {
        DataType::Int(i) if *i > 0 => Some(*i as u64),
        DataType::Float(f) if *f >= 1.0 => Some(*f as u64),
        DataType::String(s) => s.trim().parse::<u64>().ok().filter(|n| *n > 0),
        _ => None,
    }
}

fn cell_answer(q: &Question, cell: &DataType, lineno: usize) -> SurveyResult<Option<JSValue>> {
    let value: JSValue = match (&q.kind, cell) {
        (_, DataType::Empty) => return Ok(None),
        (_, DataType::String(s)) if s.trim().is_empty() => return Ok(None),
        (QuestionKind::MultiChoice(_), DataType::String(s)) => {
            let l: Vec<&str> = s
                .split(',')
                .map(|x| x.trim())
                .filter(|x| !x.is_empty())
                .collect();
            json!(l)
        }
        // Group answers were exported as JSON.
        (QuestionKind::Group(_), DataType::String(s)) => {
            match serde_json::from_str::<JSValue>(s) {
                Ok(js @ JSValue::Object(_)) => return Ok(Some(js)),
                _ => json!(s),
            }
        }
        (QuestionKind::Numeric, DataType::String(s)) => match s.trim().parse::<f64>() {
            Ok(n) => return Ok(Some(encode_answer(&Answer::number(n)))),
            Err(_) => json!(s),
        },
        (_, DataType::String(s)) => json!(s),
        (QuestionKind::Numeric, DataType::Int(i)) => json!(i),
        (QuestionKind::Numeric, DataType::Float(f)) => {
            return Ok(Some(encode_answer(&Answer::number(*f))))
        }
        (_, DataType::Int(_)) | (_, DataType::Float(_)) => json!(cell_text(cell)),
        (_, DataType::Bool(b)) => json!(b.to_string()),
        _ => {
            return ExcelWrongCellTypeSnafu {
                lineno: lineno as u64,
                content: format!("{:?}", cell),
            }
            .fail()
        }
    };
    Ok(Some(json!({ "value": value })))
}

/// Builds attempts out of the rows of a spreadsheet.
///
/// Columns are matched with the catalog by question text (or id). Rows without
/// an attempt id get one derived from the file name and line number. Rows
/// without an attempt number keep 0 and are numbered when imported in the store.
pub fn attempts_from_rows(
    catalog: &[Question],
    header: &[DataType],
    rows: &[&[DataType]],
    default_id: impl Fn(usize) -> String,
) -> SurveyResult<Vec<AttemptRecord>> {
    let columns = map_columns(catalog, header);
    debug!("attempts_from_rows: columns: {:?}", columns);
    let started_at = now_millis();

    let mut res: Vec<AttemptRecord> = Vec::new();
    for (idx, row) in rows.iter().enumerate() {
        // The header is the first line.
        let lineno = idx + 2;
        if row.iter().all(|c| cell_text(c).is_none()) {
            debug!("attempts_from_rows: skipping empty line {}", lineno);
            continue;
        }
        let mut r = AttemptRecord::new(&default_id(lineno), 0, started_at);
        for (col, cell) in columns.iter().zip(row.iter()) {
            match col {
                Column::Id => {
                    if let Some(s) = cell_text(cell) {
                        r.attempt_id = s;
                    }
                }
                Column::Number => {
                    if let Some(n) = cell_number(cell) {
                        r.attempt_number = n;
                    }
                }
                Column::StartTime => {
                    if let Some(t) = cell_text(cell).as_deref().and_then(parse_start_time) {
                        r.start_time = t;
                    }
                }
                Column::Answer(qi) => {
                    let q = &catalog[*qi];
                    if let Some(js) = cell_answer(q, cell, lineno)? {
                        r.answers.insert(q.id.clone(), js);
                    }
                }
                Column::Ignored => {}
            }
        }
        debug!("attempts_from_rows: line {}: {:?}", lineno, r);
        res.push(r);
    }
    Ok(res)
}

use calamine::{open_workbook, DataType, Range, Reader, Xlsx};
use log::{debug, info};

use crate::tally::config_reader::BallotSource;
use crate::tally::*;

/// Reads one ballot per row, after the header row.
pub fn read_xlsx_ballots(path: &str, source: &BallotSource) -> TallyResult<Vec<Vec<String>>> {
    let wrange = get_range(path, source)?;

    let header = wrange.rows().next().context(EmptyExcelSnafu { path })?;
    debug!("read_xlsx_ballots: header: {:?}", header);
    let start_range = source.first_vote_column_index()?;

    let mut res: Vec<Vec<String>> = Vec::new();
    for (idx, row) in wrange.rows().enumerate().skip(1) {
        let ballot = read_ballot_row(row, start_range, idx + 1)?;
        debug!("read_xlsx_ballots: row {:?}: {:?}", idx + 1, ballot);
        res.push(ballot);
    }
    info!(
        "read_xlsx_ballots: read {:?} ballots from {:?}",
        res.len(),
        path
    );
    Ok(res)
}

fn get_range(path: &str, source: &BallotSource) -> TallyResult<Range<DataType>> {
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;
    let wrange = match &source.excel_worksheet_name {
        Some(name) => workbook
            .worksheet_range(name)
            .context(MissingWorksheetSnafu { path, name })?
            .context(OpeningExcelSnafu { path })?,
        None => workbook
            .worksheet_range_at(0)
            .context(EmptyExcelSnafu { path })?
            .context(OpeningExcelSnafu { path })?,
    };
    Ok(wrange)
}

// The first empty cell ends the ballot.
fn read_ballot_row(row: &[DataType], start_range: usize, lineno: usize) -> TallyResult<Vec<String>> {
    let mut ballot: Vec<String> = Vec::new();
    for cell in row.iter().skip(start_range) {
        match cell {
            DataType::Empty => break,
            DataType::String(s) if s.trim().is_empty() => break,
            DataType::String(s) => ballot.push(s.trim().to_string()),
            // Numeric identifiers are stored as numbers by Excel.
            DataType::Int(i) => ballot.push(i.to_string()),
            DataType::Float(f) if f.fract() == 0.0 => ballot.push((*f as i64).to_string()),
            _ => {
                return ExcelWrongCellTypeSnafu {
                    lineno,
                    content: format!("{:?}", cell),
                }
                .fail();
            }
        }
    }
    Ok(ballot)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(x: &str) -> DataType {
        DataType::String(x.to_string())
    }

    #[test]
    fn ballot_rows() {
        let row = vec![s("voter-1"), s("c2"), s("c1"), DataType::Empty, s("c3")];
        assert_eq!(
            read_ballot_row(&row, 1, 1).unwrap(),
            vec!["c2".to_string(), "c1".to_string()]
        );
        let row = vec![DataType::Float(3.0), DataType::Int(1), s(" ")];
        assert_eq!(
            read_ballot_row(&row, 0, 2).unwrap(),
            vec!["3".to_string(), "1".to_string()]
        );
        assert_eq!(read_ballot_row(&row, 5, 3).unwrap(), Vec::<String>::new());
    }

    #[test]
    fn wrong_cell_type() {
        let row = vec![DataType::Bool(true)];
        assert!(matches!(
            read_ballot_row(&row, 0, 4),
            Err(TallyError::ExcelWrongCellType { lineno: 4, .. })
        ));
    }
}

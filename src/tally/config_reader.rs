use crate::tally::*;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;
use std::collections::HashMap;
use std::fs;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ElectionConfig {
    #[serde(rename = "electionName")]
    pub election_name: String,
    pub positions: Vec<PositionConfig>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct PositionConfig {
    pub id: String,
    pub name: String,
    pub vacancies: u32,
    pub candidates: Vec<CandidateConfig>,
    pub ballots: Option<Vec<Vec<String>>>,
    #[serde(rename = "ballotSource")]
    pub ballot_source: Option<BallotSource>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CandidateConfig {
    pub id: String,
    pub name: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct BallotSource {
    pub provider: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
    #[serde(rename = "firstVoteColumnIndex")]
    _first_vote_column_index: Option<JSValue>,
}

impl BallotSource {
    /// The 0-based column of the first preference. The configuration is 1-based.
    pub fn first_vote_column_index(&self) -> TallyResult<usize> {
        match &self._first_vote_column_index {
            None => Ok(0),
            x => {
                let idx = read_js_int(x)?;
                if idx < 1 {
                    whatever!("firstVoteColumnIndex starts at 1, got {:?}", idx)
                }
                Ok(idx - 1)
            }
        }
    }
}

pub fn read_election_config(path: &str) -> TallyResult<ElectionConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: ElectionConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(config)
}

/// Reads the decisions for the multiple position winners:
/// candidate id -> kept position id.
pub fn read_choices(path: &str) -> TallyResult<HashMap<String, String>> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    debug!("read_choices: {:?}", contents);
    let choices: HashMap<String, String> =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(choices)
}

pub fn read_summary(path: &str) -> TallyResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    debug!("read content: {:?}", contents);
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}

fn read_js_int(x: &Option<JSValue>) -> TallyResult<usize> {
    match x {
        Some(JSValue::Number(n)) => n
            .as_u64()
            .map(|x| x as usize)
            .context(ParsingJsonNumberSnafu {}),
        Some(JSValue::String(s)) => s.parse::<usize>().ok().context(ParsingJsonNumberSnafu {}),
        _ => None.context(ParsingJsonNumberSnafu {}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(js: &str) -> BallotSource {
        serde_json::from_str(js).unwrap()
    }

    #[test]
    fn first_vote_column_index() {
        let s = source(r#"{"provider": "xlsx", "filePath": "b.xlsx"}"#);
        assert_eq!(s.first_vote_column_index().unwrap(), 0);
        let s = source(r#"{"provider": "xlsx", "filePath": "b.xlsx", "firstVoteColumnIndex": 3}"#);
        assert_eq!(s.first_vote_column_index().unwrap(), 2);
        let s =
            source(r#"{"provider": "xlsx", "filePath": "b.xlsx", "firstVoteColumnIndex": "2"}"#);
        assert_eq!(s.first_vote_column_index().unwrap(), 1);
        let s = source(r#"{"provider": "xlsx", "filePath": "b.xlsx", "firstVoteColumnIndex": 0}"#);
        assert!(s.first_vote_column_index().is_err());
        let s =
            source(r#"{"provider": "xlsx", "filePath": "b.xlsx", "firstVoteColumnIndex": "x"}"#);
        assert!(s.first_vote_column_index().is_err());
    }

    #[test]
    fn optional_fields() {
        let config: ElectionConfig = serde_json::from_str(
            r#"{"electionName": "AGM", "positions": [
                {"id": "p1", "name": "President", "vacancies": 1,
                 "candidates": [{"id": "c1", "name": "Alice"}]}]}"#,
        )
        .unwrap();
        assert_eq!(config.positions[0].ballots, None);
        assert_eq!(config.positions[0].ballot_source, None);
    }
}

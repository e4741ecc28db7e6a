use log::{debug, info, warn};

use hare_clark::*;
use snafu::{prelude::*, Snafu};

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;

mod config_reader;
mod io_xlsx;

use crate::tally::config_reader::*;

// Resolution rounds before the choices are considered not to converge.
const MAX_ROUNDS: u32 = 10;

#[derive(Debug, Snafu)]
pub enum TallyError {
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("No data found in {path}"))]
    EmptyExcel { path: String },
    #[snafu(display("Worksheet {name} not found in {path}"))]
    MissingWorksheet { path: String, name: String },
    #[snafu(display("Row {lineno}: cannot read a candidate from cell {content}"))]
    ExcelWrongCellType { lineno: usize, content: String },
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Expected a positive integer"))]
    ParsingJsonNumber {},
    #[snafu(display("Error writing the summary to {path}"))]
    WritingSummary {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Reconciliation failed: {source}"))]
    Reconciling { source: ReconcileError },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type TallyResult<T> = Result<T, TallyError>;

fn read_ballots(root_path: &Path, source: &BallotSource) -> TallyResult<Vec<Vec<String>>> {
    let p: PathBuf = root_path.join(&source.file_path);
    let p2 = p.as_path().display().to_string();
    info!("Attempting to read ballot file {:?}", p2);
    match source.provider.as_str() {
        "xlsx" => io_xlsx::read_xlsx_ballots(&p2, source),
        x => whatever!("Provider not implemented {:?}", x),
    }
}

fn build_election(config: &ElectionConfig, root_path: &Path) -> TallyResult<Election> {
    let mut positions: Vec<PositionInput> = Vec::new();
    for pos in config.positions.iter() {
        let mut ballots: Vec<Vec<String>> = pos.ballots.clone().unwrap_or_default();
        if let Some(source) = &pos.ballot_source {
            let mut file_ballots = read_ballots(root_path, source)?;
            ballots.append(&mut file_ballots);
        }
        debug!(
            "build_election: position {:?}: {:?} ballots",
            pos.id,
            ballots.len()
        );
        positions.push(PositionInput {
            id: pos.id.clone(),
            name: pos.name.clone(),
            vacancies: pos.vacancies,
            candidates: pos
                .candidates
                .iter()
                .map(|c| Candidate::new(&c.id, &c.name))
                .collect(),
            ballots,
        });
    }
    Election::new(positions).context(ReconcilingSnafu {})
}

fn describe_conflicts(pending: &AwaitingResolution) -> TallyResult<String> {
    let mut lines: Vec<String> = Vec::new();
    for c in pending.conflicts() {
        let options = pending
            .options(&c.candidate_id)
            .context(ReconcilingSnafu {})?;
        let labels: Vec<String> = options
            .iter()
            .map(|o| format!("{} ({}, {:?})", o.position_id, o.position_name, o.availability))
            .collect();
        lines.push(format!(
            "{} ({}) won: {}",
            c.candidate_id,
            c.candidate_name,
            labels.join(", ")
        ));
    }
    Ok(lines.join("\n"))
}

fn reconcile(
    election: Election,
    choices: HashMap<String, String>,
    force: bool,
) -> TallyResult<Finalized> {
    let mut resolver = choices;
    let res = run_reconciliation(election, &mut resolver, MAX_ROUNDS).context(ReconcilingSnafu {})?;
    match res {
        Reconciliation::Finalized(f) => Ok(f),
        Reconciliation::AwaitingResolution(pending) if force => {
            warn!(
                "Forcing the results with {:?} multiple position winner(s)",
                pending.conflicts().len()
            );
            Ok(pending.force_finalize())
        }
        Reconciliation::AwaitingResolution(pending) => {
            for w in pending.pending_warnings() {
                warn!("{}", w);
            }
            let msg = describe_conflicts(&pending)?;
            whatever!(
                "Some candidates won multiple positions, pass their choices with --choices or use --force:\n{}",
                msg
            )
        }
    }
}

fn round_stats_to_json(stats: &[RoundStats]) -> Vec<JSValue> {
    let mut l: Vec<JSValue> = Vec::new();
    for round_stat in stats.iter() {
        let mut tally: JSMap<String, JSValue> = JSMap::new();
        for (cid, count) in round_stat.tally.iter() {
            tally.insert(cid.clone(), json!(count));
        }
        let action = match &round_stat.action {
            RoundAction::Elected {
                candidate,
                transfer_value,
            } => json!({"elected": candidate, "transferValue": transfer_value}),
            RoundAction::Eliminated { candidate } => json!({ "eliminated": candidate }),
        };
        l.push(json!({"round": round_stat.round, "tally": tally, "tallyResult": action}));
    }
    l
}

fn position_to_json(r: &PositionResult) -> JSValue {
    let candidates: Vec<JSValue> = r
        .candidates
        .iter()
        .map(|c| {
            json!({
                "id": c.id,
                "name": c.name,
                "ranking": c.ranking,
                "totalPoints": c.total_points,
                "bordaPoints": c.borda_points,
            })
        })
        .collect();
    let winners: Vec<JSValue> = r
        .winners
        .iter()
        .map(|w| json!({"id": w.id, "name": w.name, "ranking": w.ranking}))
        .collect();
    json!({
        "positionId": r.position_id,
        "positionName": r.position_name,
        "vacancies": r.vacancies,
        "quota": r.quota,
        "candidates": candidates,
        "winners": winners,
        "roundStats": round_stats_to_json(&r.round_stats),
    })
}

fn build_summary_js(config: &ElectionConfig, f: &Finalized) -> JSValue {
    let results: Vec<JSValue> = f.results().iter().map(position_to_json).collect();
    let warnings: Vec<String> = f.warnings().iter().map(|w| w.to_string()).collect();
    json!({
        "election": config.election_name,
        "rounds": f.round(),
        "results": results,
        "warnings": warnings,
    })
}

pub fn run_election(args: &Args) -> TallyResult<()> {
    let config = read_election_config(&args.config)?;
    info!("config: {:?}", config);

    let config_p = Path::new(args.config.as_str());
    let root_p = config_p.parent().unwrap_or_else(|| Path::new("."));
    let election = build_election(&config, root_p)?;

    let choices = match &args.choices {
        Some(p) => read_choices(p)?,
        None => HashMap::new(),
    };

    let finalized = reconcile(election, choices, args.force)?;

    // Assemble the final json
    let result_js = build_summary_js(&config, &finalized);
    let pretty_js_stats = serde_json::to_string_pretty(&result_js).context(ParsingJsonSnafu {})?;

    match args.out.as_deref() {
        None | Some("stdout") | Some("") => println!("{}", pretty_js_stats),
        Some(out_path) => {
            info!("Writing the summary to {:?}", out_path);
            fs::write(out_path, pretty_js_stats.as_bytes())
                .context(WritingSummarySnafu { path: out_path })?;
        }
    }

    // The reference summary, if provided for comparison
    if let Some(summary_p) = &args.reference {
        let summary_ref = read_summary(summary_p)?;
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
        if pretty_js_summary_ref != pretty_js_stats {
            warn!("Found differences with the reference string");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_stats.as_ref(),
                "\n",
            );
            whatever!("Difference detected between calculated summary and reference summary")
        }
    }

    Ok(())
}

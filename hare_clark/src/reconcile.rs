/*!
Reconciliation of the winners between the positions of one election.

A candidate may be nominated for several positions and win more than one of
them. Each such candidate must keep a single seat. The reconciliation is a
state machine passed by value between the calls:

```text
Election --tabulate--> Reconciliation::Finalized
                   \-> Reconciliation::AwaitingResolution --resolve--> (tabulated again)
                                                          \--force_finalize--> Finalized
```

The choices of the operator are recorded on [AwaitingResolution]. Once every
conflicting candidate has a kept position, [AwaitingResolution::resolve]
excludes each of them from every other position and counts again only the
positions whose exclusions changed.
*/

use log::{debug, info, warn};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::config::*;

/// For each position id, the candidates removed from the pool and from the
/// ballots of that position.
pub type Exclusions = BTreeMap<String, BTreeSet<String>>;

/// A candidate who won more than one position in the latest pass.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Conflict {
    pub candidate_id: String,
    pub candidate_name: String,
    /// Won positions that had other candidates.
    pub positions: Vec<String>,
    /// Won positions where this candidate was the only nominee.
    pub solo_positions: Vec<String>,
}

impl Conflict {
    pub fn all_positions(&self) -> impl Iterator<Item = &String> {
        self.positions.iter().chain(self.solo_positions.iter())
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Availability {
    Available,
    /// The position is full without this candidate.
    AtCapacity,
    /// Keeping the position would put it over its vacancies. Cannot be chosen.
    Full,
    OnlyCandidate,
}

impl Availability {
    pub fn is_enabled(&self) -> bool {
        *self != Availability::Full
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct PositionOption {
    pub position_id: String,
    pub position_name: String,
    pub availability: Availability,
}

/// The positions of an election, before any count.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Election {
    positions: Vec<PositionInput>,
}

impl Election {
    /// Validates the positions. The vacancies must be positive and the
    /// ballots may only rank candidates nominated for their position.
    pub fn new(positions: Vec<PositionInput>) -> Result<Election, ReconcileError> {
        let mut position_ids: HashSet<&String> = HashSet::new();
        for pos in positions.iter() {
            if !position_ids.insert(&pos.id) {
                return Err(ReconcileError::DuplicatePosition(pos.id.clone()));
            }
            if pos.vacancies < 1 {
                return Err(ReconcileError::InvalidVacancies {
                    position: pos.id.clone(),
                });
            }
            let mut nominated: HashSet<&String> = HashSet::new();
            for c in pos.candidates.iter() {
                if !nominated.insert(&c.id) {
                    return Err(ReconcileError::DuplicateCandidate {
                        position: pos.id.clone(),
                        candidate: c.id.clone(),
                    });
                }
            }
            if let Some(unknown) = pos
                .ballots
                .iter()
                .flatten()
                .find(|cid| !nominated.contains(cid))
            {
                return Err(ReconcileError::UnknownCandidate {
                    position: pos.id.clone(),
                    candidate: unknown.clone(),
                });
            }
        }
        Ok(Election { positions })
    }

    pub fn positions(&self) -> &[PositionInput] {
        &self.positions
    }

    /// Counts every position and looks for multiple position winners.
    pub fn tabulate(self) -> Reconciliation {
        info!(
            "Election: tabulating {:?} position(s)",
            self.positions.len()
        );
        let exclusions = Exclusions::new();
        let results: Vec<PositionResult> = self
            .positions
            .iter()
            .map(|pos| tabulate_position(pos, &BTreeSet::new()))
            .collect();
        tabulated(Round {
            positions: self.positions,
            results,
            exclusions,
            pinned: BTreeMap::new(),
            round: 1,
        })
    }
}

// The data shared by all the states after the first count.
#[derive(PartialEq, Debug, Clone)]
struct Round {
    positions: Vec<PositionInput>,
    // Same order as the positions.
    results: Vec<PositionResult>,
    // Cumulative over the rounds.
    exclusions: Exclusions,
    // Candidate id -> kept position id.
    pinned: BTreeMap<String, String>,
    round: u32,
}

impl Round {
    fn result(&self, position_id: &str) -> Option<&PositionResult> {
        self.results.iter().find(|r| r.position_id == position_id)
    }

    fn warnings(&self) -> Vec<Warning> {
        let mut res = underfill_warnings(&self.results, &self.exclusions, false);
        for r in self.results.iter() {
            if let Some(tie) = &r.tie {
                res.push(Warning::Tie {
                    position_id: r.position_id.clone(),
                    position_name: r.position_name.clone(),
                    candidates: tie.candidates.clone(),
                });
            }
        }
        res
    }
}

#[derive(PartialEq, Debug, Clone)]
pub enum Reconciliation {
    AwaitingResolution(AwaitingResolution),
    Finalized(Finalized),
}

impl Reconciliation {
    pub fn is_finalized(&self) -> bool {
        matches!(self, Reconciliation::Finalized(_))
    }

    pub fn results(&self) -> &[PositionResult] {
        match self {
            Reconciliation::AwaitingResolution(a) => a.results(),
            Reconciliation::Finalized(f) => f.results(),
        }
    }
}

/// Multiple position winners were found and wait for a decision.
#[derive(PartialEq, Debug, Clone)]
pub struct AwaitingResolution {
    state: Round,
    conflicts: Vec<Conflict>,
    // Candidate id -> kept position id, for this round only.
    choices: BTreeMap<String, String>,
}

impl AwaitingResolution {
    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    pub fn results(&self) -> &[PositionResult] {
        &self.state.results
    }

    pub fn choices(&self) -> &BTreeMap<String, String> {
        &self.choices
    }

    pub fn round(&self) -> u32 {
        self.state.round
    }

    pub fn exclusions(&self) -> &Exclusions {
        &self.state.exclusions
    }

    /// Warnings of the latest count, available for a forced finalization.
    pub fn warnings(&self) -> Vec<Warning> {
        self.state.warnings()
    }

    pub fn is_complete(&self) -> bool {
        self.conflicts
            .iter()
            .all(|c| self.choices.contains_key(&c.candidate_id))
    }

    fn conflict(&self, candidate_id: &str) -> Result<&Conflict, ReconcileError> {
        self.conflicts
            .iter()
            .find(|c| c.candidate_id == candidate_id)
            .ok_or_else(|| ReconcileError::UnknownConflict(candidate_id.to_string()))
    }

    /// The positions that the candidate may keep.
    ///
    /// The capacity of each position is checked against the choices recorded
    /// so far, with this position as the tentative choice of the candidate.
    /// Conflicting winners without a choice are not counted.
    pub fn options(&self, candidate_id: &str) -> Result<Vec<PositionOption>, ReconcileError> {
        let conflict = self.conflict(candidate_id)?;
        let mut res: Vec<PositionOption> = Vec::new();
        for pid in conflict.positions.iter() {
            let pos = match self.state.result(pid) {
                Some(p) => p,
                None => continue,
            };
            let mut simulated = self.choices.clone();
            simulated.insert(candidate_id.to_string(), pid.clone());
            let projected: Vec<&Winner> = pos
                .winners
                .iter()
                .filter(|w| {
                    if self.conflicts.iter().any(|c| c.candidate_id == w.id) {
                        simulated.get(&w.id) == Some(pid)
                    } else {
                        true
                    }
                })
                .collect();
            let vacancies = pos.vacancies as usize;
            let availability = if projected.len() > vacancies {
                Availability::Full
            } else if projected.len() >= vacancies
                && !projected.iter().any(|w| w.id == candidate_id)
            {
                Availability::AtCapacity
            } else {
                Availability::Available
            };
            res.push(PositionOption {
                position_id: pid.clone(),
                position_name: pos.position_name.clone(),
                availability,
            });
        }
        for pid in conflict.solo_positions.iter() {
            if let Some(pos) = self.state.result(pid) {
                res.push(PositionOption {
                    position_id: pid.clone(),
                    position_name: pos.position_name.clone(),
                    availability: Availability::OnlyCandidate,
                });
            }
        }
        Ok(res)
    }

    /// Records the position kept by a conflicting candidate. A later call for
    /// the same candidate replaces the choice.
    pub fn choose(&mut self, candidate_id: &str, position_id: &str) -> Result<(), ReconcileError> {
        let conflict = self.conflict(candidate_id)?;
        if !conflict.all_positions().any(|p| p == position_id) {
            return Err(ReconcileError::PositionNotWon {
                candidate: candidate_id.to_string(),
                position: position_id.to_string(),
            });
        }
        let option = self
            .options(candidate_id)?
            .into_iter()
            .find(|o| o.position_id == position_id);
        if let Some(o) = option {
            if !o.availability.is_enabled() {
                return Err(ReconcileError::OverCapacity {
                    candidate: candidate_id.to_string(),
                    position: position_id.to_string(),
                });
            }
        }
        debug!(
            "choose: candidate {:?} keeps position {:?}",
            candidate_id, position_id
        );
        self.choices
            .insert(candidate_id.to_string(), position_id.to_string());
        Ok(())
    }

    /// The underfilled positions if the choices recorded so far were applied.
    pub fn pending_warnings(&self) -> Vec<Warning> {
        let mut simulated = self.state.exclusions.clone();
        for (cid, keep) in self.choices.iter() {
            for pos in self.state.positions.iter().filter(|p| p.id != *keep) {
                simulated
                    .entry(pos.id.clone())
                    .or_default()
                    .insert(cid.clone());
            }
        }
        underfill_warnings(&self.state.results, &simulated, true)
    }

    /// Applies the choices and counts again the affected positions.
    ///
    /// Nothing happens while a conflicting candidate has no choice: the same
    /// state is returned.
    pub fn resolve(self) -> Reconciliation {
        if !self.is_complete() {
            debug!(
                "resolve: {:?} of {:?} choice(s) recorded, still waiting",
                self.choices.len(),
                self.conflicts.len()
            );
            return Reconciliation::AwaitingResolution(self);
        }
        let AwaitingResolution {
            mut state, choices, ..
        } = self;

        let mut touched: BTreeSet<String> = BTreeSet::new();
        for (cid, keep) in choices.into_iter() {
            for pos in state.positions.iter().filter(|p| p.id != keep) {
                let added = state
                    .exclusions
                    .entry(pos.id.clone())
                    .or_default()
                    .insert(cid.clone());
                if added && pos.candidates.iter().any(|c| c.id == cid) {
                    touched.insert(pos.id.clone());
                }
            }
            info!("resolve: {:?} keeps position {:?}", cid, keep);
            state.pinned.insert(cid, keep);
        }

        for (idx, pos) in state.positions.iter().enumerate() {
            if touched.contains(&pos.id) {
                let excluded = state.exclusions.get(&pos.id).cloned().unwrap_or_default();
                debug!(
                    "resolve: counting again position {:?} without {:?}",
                    pos.id, excluded
                );
                state.results[idx] = tabulate_position(pos, &excluded);
            }
        }
        state.round += 1;
        tabulated(state)
    }

    /// Ends the reconciliation with the current results, conflicts included.
    pub fn force_finalize(self) -> Finalized {
        let warnings = self.state.warnings();
        warn!(
            "force_finalize: finalizing with {:?} unresolved conflict(s) and {:?} warning(s)",
            self.conflicts.len(),
            warnings.len()
        );
        Finalized {
            state: self.state,
            warnings,
        }
    }
}

/// The authoritative results.
#[derive(PartialEq, Debug, Clone)]
pub struct Finalized {
    state: Round,
    warnings: Vec<Warning>,
}

impl Finalized {
    pub fn results(&self) -> &[PositionResult] {
        &self.state.results
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn exclusions(&self) -> &Exclusions {
        &self.state.exclusions
    }

    /// Candidate id -> position kept after a conflict.
    pub fn pinned(&self) -> &BTreeMap<String, String> {
        &self.state.pinned
    }

    pub fn round(&self) -> u32 {
        self.state.round
    }

    pub fn into_results(self) -> Vec<PositionResult> {
        self.state.results
    }
}

/// Supplies the decisions of an operator between two rounds.
pub trait Resolver {
    /// Returns pairs of (candidate id, kept position id).
    fn choices(&mut self, pending: &AwaitingResolution) -> Vec<(String, String)>;
}

/// A fixed table of decisions: candidate id -> kept position id.
impl Resolver for HashMap<String, String> {
    fn choices(&mut self, pending: &AwaitingResolution) -> Vec<(String, String)> {
        pending
            .conflicts()
            .iter()
            .filter_map(|c| {
                self.get(&c.candidate_id)
                    .map(|p| (c.candidate_id.clone(), p.clone()))
            })
            .collect()
    }
}

/// Runs the reconciliation until no candidate holds more than one seat.
///
/// When the resolver leaves a conflict undecided, the pending state is
/// returned so that the caller can ask again or force the finalization.
/// More than `max_rounds` resolution rounds is an error.
pub fn run_reconciliation<R: Resolver>(
    election: Election,
    resolver: &mut R,
    max_rounds: u32,
) -> Result<Reconciliation, ReconcileError> {
    let mut state = election.tabulate();
    let mut rounds = 0;
    loop {
        match state {
            Reconciliation::Finalized(_) => return Ok(state),
            Reconciliation::AwaitingResolution(mut pending) => {
                if rounds >= max_rounds {
                    return Err(ReconcileError::NoConvergence);
                }
                for (cid, pid) in resolver.choices(&pending) {
                    pending.choose(&cid, &pid)?;
                }
                if !pending.is_complete() {
                    return Ok(Reconciliation::AwaitingResolution(pending));
                }
                rounds += 1;
                state = pending.resolve();
            }
        }
    }
}

fn tabulated(state: Round) -> Reconciliation {
    let conflicts = find_conflicts(&state.results);
    if conflicts.is_empty() {
        let warnings = state.warnings();
        for w in warnings.iter() {
            warn!("{}", w);
        }
        info!(
            "tabulated: no multiple position winners after round {:?}",
            state.round
        );
        Reconciliation::Finalized(Finalized { state, warnings })
    } else {
        info!(
            "tabulated: round {:?}: {:?} candidate(s) won multiple positions",
            state.round,
            conflicts.len()
        );
        Reconciliation::AwaitingResolution(AwaitingResolution {
            state,
            conflicts,
            choices: BTreeMap::new(),
        })
    }
}

// Conflicts are listed in the order of their first win.
fn find_conflicts(results: &[PositionResult]) -> Vec<Conflict> {
    let mut all: Vec<Conflict> = Vec::new();
    for pos in results.iter() {
        for w in pos.winners.iter() {
            let idx = match all.iter().position(|c| c.candidate_id == w.id) {
                Some(idx) => idx,
                None => {
                    all.push(Conflict {
                        candidate_id: w.id.clone(),
                        candidate_name: w.name.clone(),
                        positions: Vec::new(),
                        solo_positions: Vec::new(),
                    });
                    all.len() - 1
                }
            };
            if pos.candidates.len() == 1 {
                all[idx].solo_positions.push(pos.position_id.clone());
            } else {
                all[idx].positions.push(pos.position_id.clone());
            }
        }
    }
    all.retain(|c| c.all_positions().count() > 1);
    all
}

fn underfill_warnings(
    results: &[PositionResult],
    exclusions: &Exclusions,
    projected: bool,
) -> Vec<Warning> {
    let empty = BTreeSet::new();
    results
        .iter()
        .filter_map(|pos| {
            let excluded = exclusions.get(&pos.position_id).unwrap_or(&empty);
            let winners = pos
                .winners
                .iter()
                .filter(|w| !excluded.contains(&w.id))
                .count();
            if winners < pos.vacancies as usize {
                Some(Warning::Underfill {
                    position_id: pos.position_id.clone(),
                    position_name: pos.position_name.clone(),
                    winners,
                    vacancies: pos.vacancies,
                    projected,
                })
            } else {
                None
            }
        })
        .collect()
}

/// Counts one position without the excluded candidates, and ranks all the
/// remaining candidates.
fn tabulate_position(pos: &PositionInput, excluded: &BTreeSet<String>) -> PositionResult {
    let candidates: Vec<&Candidate> = pos
        .candidates
        .iter()
        .filter(|c| !excluded.contains(&c.id))
        .collect();
    let ballots: Vec<Vec<String>> = pos
        .ballots
        .iter()
        .map(|b| b.iter().filter(|c| !excluded.contains(*c)).cloned().collect())
        .collect();
    let ids: Vec<String> = candidates.iter().map(|c| c.id.clone()).collect();

    let tr = if ids.is_empty() {
        debug!("tabulate_position: {:?} has no candidates", pos.id);
        None
    } else {
        Some(crate::tabulate(&ids, &ballots, pos.vacancies))
    };
    let elected: Vec<String> = tr.as_ref().map(|t| t.elected.clone()).unwrap_or_default();
    let points: HashMap<&str, f64> = tr
        .as_ref()
        .map(|t| {
            t.candidates
                .iter()
                .map(|ct| (ct.id.as_str(), ct.total_points))
                .collect()
        })
        .unwrap_or_default();
    // Scored on the ballots as cast, excluded candidates included.
    let borda = borda_points(&pos.ballots);

    let mut winners_first: Vec<&Candidate> = elected
        .iter()
        .filter_map(|id| candidates.iter().find(|c| c.id == *id).copied())
        .collect();
    let mut others: Vec<&Candidate> = candidates
        .iter()
        .filter(|c| !elected.contains(&c.id))
        .copied()
        .collect();
    // Without ballots, the candidates keep the nomination order.
    if !pos.ballots.is_empty() {
        others.sort_by(|a, b| {
            let pa = points.get(a.id.as_str()).copied().unwrap_or(0.0);
            let pb = points.get(b.id.as_str()).copied().unwrap_or(0.0);
            pb.partial_cmp(&pa)
                .unwrap_or(Ordering::Equal)
                .then_with(|| {
                    let ba = borda.get(&a.id).copied().unwrap_or(0);
                    let bb = borda.get(&b.id).copied().unwrap_or(0);
                    bb.cmp(&ba)
                })
                .then_with(|| a.name.cmp(&b.name))
        });
    }
    winners_first.extend(others);

    let ranked: Vec<CandidateResult> = winners_first
        .iter()
        .enumerate()
        .map(|(idx, c)| CandidateResult {
            id: c.id.clone(),
            name: c.name.clone(),
            ranking: (idx + 1) as u32,
            total_points: points.get(c.id.as_str()).copied().unwrap_or(0.0),
            borda_points: borda.get(&c.id).copied().unwrap_or(0),
        })
        .collect();
    let winners: Vec<Winner> = ranked
        .iter()
        .filter(|c| elected.contains(&c.id))
        .map(|c| Winner {
            id: c.id.clone(),
            name: c.name.clone(),
            ranking: c.ranking,
        })
        .collect();

    PositionResult {
        position_id: pos.id.clone(),
        position_name: pos.name.clone(),
        vacancies: pos.vacancies,
        candidates: ranked,
        winners,
        quota: tr.as_ref().map(|t| t.quota).unwrap_or(0.0),
        round_stats: tr.as_ref().map(|t| t.round_stats.clone()).unwrap_or_default(),
        tie: tr.and_then(|t| t.tie),
    }
}

// A candidate ranked at index i on a ballot of length n gets n - i points.
fn borda_points(ballots: &[Vec<String>]) -> HashMap<String, u64> {
    let mut res: HashMap<String, u64> = HashMap::new();
    for b in ballots.iter() {
        let n = b.len();
        for (i, cid) in b.iter().enumerate() {
            *res.entry(cid.clone()).or_insert(0) += (n - i) as u64;
        }
    }
    res
}

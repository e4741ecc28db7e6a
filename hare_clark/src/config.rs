// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

/// A candidate nominated for a position.
///
/// The identifier is opaque (a UUID in practice). The name is only used for
/// display and as the last tie-break when ordering the result records.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct Candidate {
    pub id: String,
    pub name: String,
}

impl Candidate {
    pub fn new(id: &str, name: &str) -> Candidate {
        Candidate {
            id: id.to_string(),
            name: name.to_string(),
        }
    }
}

/// One position of an election, with all the ballots cast for it.
///
/// Every ballot lists candidate ids, most preferred first. A ballot may stop
/// before ranking every candidate.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct PositionInput {
    pub id: String,
    pub name: String,
    pub vacancies: u32,
    pub candidates: Vec<Candidate>,
    pub ballots: Vec<Vec<String>>,
}

// ******** Output data structures *********

/// How a candidate left the count.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum CandidateStatus {
    /// Reached the quota and had the surplus transferred.
    Elected,
    /// Filled a seat that was left over when the count stopped.
    ElectedByDefault,
    /// Excluded, with all the ballots transferred at full weight.
    Eliminated,
    /// Still in the count when it stopped, without a seat.
    Continuing,
}

#[derive(PartialEq, Debug, Clone)]
pub struct CandidateTally {
    pub id: String,
    /// The last live tally of the candidate: at the time of election or
    /// elimination, or at the end of the count.
    pub total_points: f64,
    pub status: CandidateStatus,
}

#[derive(PartialEq, Debug, Clone)]
pub enum RoundAction {
    Elected {
        candidate: String,
        transfer_value: f64,
    },
    Eliminated {
        candidate: String,
    },
}

/// Statistics for one round of counting
#[derive(PartialEq, Debug, Clone)]
pub struct RoundStats {
    pub round: u32,
    /// The tally of the continuing candidates at the start of the round.
    pub tally: Vec<(String, f64)>,
    pub action: RoundAction,
}

/// The leading and the trailing candidates had the same tally.
///
/// The count stops on this condition instead of picking a candidate.
#[derive(PartialEq, Debug, Clone)]
pub struct TieCondition {
    pub round: u32,
    /// All the candidates that were still continuing, in input order.
    pub candidates: Vec<String>,
    pub tally: f64,
}

#[derive(PartialEq, Debug, Clone)]
pub struct TabulationResult {
    /// The elected candidates, in order of election then default fill.
    pub elected: Vec<String>,
    pub quota: f64,
    /// One entry per distinct candidate, in input order.
    pub candidates: Vec<CandidateTally>,
    pub round_stats: Vec<RoundStats>,
    pub tie: Option<TieCondition>,
}

#[derive(PartialEq, Debug, Clone)]
pub struct CandidateResult {
    pub id: String,
    pub name: String,
    pub ranking: u32,
    pub total_points: f64,
    pub borda_points: u64,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Winner {
    pub id: String,
    pub name: String,
    pub ranking: u32,
}

/// The outcome of one position for one tabulation pass.
#[derive(PartialEq, Debug, Clone)]
pub struct PositionResult {
    pub position_id: String,
    pub position_name: String,
    pub vacancies: u32,
    /// Winners first, then the other candidates by points.
    pub candidates: Vec<CandidateResult>,
    pub winners: Vec<Winner>,
    pub quota: f64,
    pub round_stats: Vec<RoundStats>,
    pub tie: Option<TieCondition>,
}

/// Advisory conditions. None of them prevents finalizing an election.
#[derive(PartialEq, Debug, Clone)]
pub enum Warning {
    /// A position ends up with fewer winners than vacancies.
    /// `projected` is set for warnings computed from choices that have not
    /// been applied yet.
    Underfill {
        position_id: String,
        position_name: String,
        winners: usize,
        vacancies: u32,
        projected: bool,
    },
    /// The count of a position stopped on a tie.
    Tie {
        position_id: String,
        position_name: String,
        candidates: Vec<String>,
    },
}

impl Warning {
    pub fn position_id(&self) -> &str {
        match self {
            Warning::Underfill { position_id, .. } => position_id,
            Warning::Tie { position_id, .. } => position_id,
        }
    }

    /// Number of seats left empty. Zero for ties.
    pub fn shortfall(&self) -> u32 {
        match self {
            Warning::Underfill {
                winners, vacancies, ..
            } => vacancies.saturating_sub(*winners as u32),
            Warning::Tie { .. } => 0,
        }
    }
}

impl Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::Underfill {
                position_name,
                winners,
                vacancies,
                projected,
                ..
            } => write!(
                f,
                "{} {} {} winner(s) but needs {} (short by {})",
                position_name,
                if *projected { "would have" } else { "has" },
                winners,
                vacancies,
                self.shortfall()
            ),
            Warning::Tie {
                position_name,
                candidates,
                ..
            } => write!(
                f,
                "{}: tie between {}, remaining seats were filled by default",
                position_name,
                candidates.join(", ")
            ),
        }
    }
}

/// Errors for inputs rejected before counting starts.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum TabulationErrors {
    InvalidVacancies,
    DuplicateCandidate(String),
    UnknownCandidate(String),
}

impl Error for TabulationErrors {}

impl Display for TabulationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TabulationErrors::InvalidVacancies => write!(f, "at least one vacancy is required"),
            TabulationErrors::DuplicateCandidate(c) => {
                write!(f, "candidate {} is registered twice", c)
            }
            TabulationErrors::UnknownCandidate(c) => {
                write!(f, "ballot ranks unregistered candidate {}", c)
            }
        }
    }
}

/// Errors of the reconciliation between positions.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ReconcileError {
    InvalidVacancies { position: String },
    DuplicatePosition(String),
    DuplicateCandidate { position: String, candidate: String },
    UnknownCandidate { position: String, candidate: String },
    /// The candidate is not in conflict in the current round.
    UnknownConflict(String),
    PositionNotWon { candidate: String, position: String },
    OverCapacity { candidate: String, position: String },
    NoConvergence,
}

impl Error for ReconcileError {}

impl Display for ReconcileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconcileError::InvalidVacancies { position } => {
                write!(f, "position {} needs at least one vacancy", position)
            }
            ReconcileError::DuplicatePosition(p) => write!(f, "position {} is declared twice", p),
            ReconcileError::DuplicateCandidate {
                position,
                candidate,
            } => write!(
                f,
                "candidate {} is nominated twice for position {}",
                candidate, position
            ),
            ReconcileError::UnknownCandidate {
                position,
                candidate,
            } => write!(
                f,
                "a ballot for position {} ranks candidate {} who is not nominated",
                position, candidate
            ),
            ReconcileError::UnknownConflict(c) => {
                write!(f, "candidate {} did not win multiple positions", c)
            }
            ReconcileError::PositionNotWon {
                candidate,
                position,
            } => write!(f, "candidate {} did not win position {}", candidate, position),
            ReconcileError::OverCapacity {
                candidate,
                position,
            } => write!(
                f,
                "position {} is full, it cannot be kept by candidate {}",
                position, candidate
            ),
            ReconcileError::NoConvergence => {
                write!(f, "multiple position winners remain after the last round")
            }
        }
    }
}

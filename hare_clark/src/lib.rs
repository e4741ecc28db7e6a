mod config;
use log::{debug, info, warn};

use std::collections::HashMap;

pub mod builder;
pub mod manual;
pub mod reconcile;

pub use crate::config::*;
pub use crate::reconcile::{
    run_reconciliation, AwaitingResolution, Availability, Conflict, Election, Exclusions,
    Finalized, PositionOption, Reconciliation, Resolver,
};

// **** Private structures ****

// Index of a candidate in the input order.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
struct CandidateId(u32);

// The state of a candidate in the tally. Only live entries carry a count, so
// an elected or eliminated candidate can never be compared as a vote total.
#[derive(PartialEq, Debug, Clone, Copy)]
enum TallyEntry {
    Live(f64),
    Eliminated,
    Elected,
}

// A ballot with a cursor on its current preference.
// The ranks keep the order of the voter and are never modified.
#[derive(PartialEq, Debug, Clone)]
struct WeightedBallot {
    ranks: Vec<CandidateId>,
    cursor: usize,
    weight: f64,
}

impl WeightedBallot {
    fn new(ranks: Vec<CandidateId>) -> WeightedBallot {
        WeightedBallot {
            ranks,
            cursor: 0,
            weight: 1.0,
        }
    }

    fn current(&self) -> Option<CandidateId> {
        self.ranks.get(self.cursor).copied()
    }

    /// Moves past every candidate that is not live anymore and returns the
    /// new current preference, if the ballot is not exhausted.
    fn advance(&mut self, tally: &[TallyEntry]) -> Option<CandidateId> {
        while let Some(cid) = self.current() {
            if matches!(tally[cid.0 as usize], TallyEntry::Live(_)) {
                break;
            }
            self.cursor += 1;
        }
        self.current()
    }
}

struct Count {
    tally: Vec<TallyEntry>,
    // Last live count, kept after the candidate leaves the count.
    points: Vec<f64>,
}

impl Count {
    fn new(num_candidates: usize) -> Count {
        Count {
            tally: vec![TallyEntry::Live(0.0); num_candidates],
            points: vec![0.0; num_candidates],
        }
    }

    fn credit(&mut self, cid: CandidateId, weight: f64) {
        if let TallyEntry::Live(v) = self.tally[cid.0 as usize] {
            let nv = v + weight;
            self.tally[cid.0 as usize] = TallyEntry::Live(nv);
            self.points[cid.0 as usize] = nv;
        }
    }

    fn active(&self) -> impl Iterator<Item = (CandidateId, f64)> + '_ {
        self.tally
            .iter()
            .enumerate()
            .filter_map(|(idx, entry)| match entry {
                TallyEntry::Live(v) => Some((CandidateId(idx as u32), *v)),
                _ => None,
            })
    }

    /// Finds the leading and the trailing candidates in a single scan over
    /// the input order. Among equal counts, the last one seen leads and the
    /// first one seen trails.
    fn leader_and_trailer(&self) -> Option<((CandidateId, f64), (CandidateId, f64))> {
        let mut leader: Option<(CandidateId, f64)> = None;
        let mut trailer: Option<(CandidateId, f64)> = None;
        for (cid, v) in self.active() {
            match leader {
                Some((_, lv)) if v < lv => {}
                _ => leader = Some((cid, v)),
            }
            match trailer {
                Some((_, tv)) if v >= tv => {}
                _ => trailer = Some((cid, v)),
            }
        }
        leader.zip(trailer)
    }

    /// Removes the candidate from the count and moves all the ballots
    /// currently sitting on this candidate to their next live preference,
    /// after scaling them by the transfer value.
    fn transfer(
        &mut self,
        cid: CandidateId,
        final_state: TallyEntry,
        transfer_value: f64,
        ballots: &mut [WeightedBallot],
    ) -> f64 {
        self.tally[cid.0 as usize] = final_state;
        let mut exhausted = 0.0;
        for wb in ballots.iter_mut().filter(|wb| wb.current() == Some(cid)) {
            wb.weight *= transfer_value;
            match wb.advance(&self.tally) {
                Some(next) => self.credit(next, wb.weight),
                None => exhausted += wb.weight,
            }
        }
        exhausted
    }
}

/// Runs the Hare-Clark count for one position.
///
/// Arguments:
/// * `candidates` the candidates running for the position. The order matters
/// for the tie-breaks and the default fill.
/// * `ballots` the ranked ballots, most preferred candidate first. Candidates
/// that are not registered are skipped.
/// * `vacancies` the number of seats. It is not validated here, see
/// [builder::Builder] for a checked entry point.
///
/// The quota is `ballots / (vacancies + 1) + 1`, without rounding. The count
/// stops early when the leading and the trailing candidates are tied; the
/// condition is reported in [TabulationResult::tie] and the remaining seats
/// are filled by default.
pub fn tabulate(candidates: &[String], ballots: &[Vec<String>], vacancies: u32) -> TabulationResult {
    info!(
        "tabulate: {:?} ballots, {:?} candidates, {:?} vacancies",
        ballots.len(),
        candidates.len(),
        vacancies
    );

    // Duplicated registrations count once, at their first position.
    let mut names: Vec<&String> = Vec::new();
    let mut index: HashMap<&str, CandidateId> = HashMap::new();
    for c in candidates.iter() {
        if !index.contains_key(c.as_str()) {
            index.insert(c.as_str(), CandidateId(names.len() as u32));
            names.push(c);
        }
    }

    let mut wballots: Vec<WeightedBallot> = ballots
        .iter()
        .map(|b| {
            WeightedBallot::new(
                b.iter()
                    .filter_map(|c| index.get(c.as_str()).copied())
                    .collect(),
            )
        })
        .collect();

    let quota = ballots.len() as f64 / (vacancies as f64 + 1.0) + 1.0;
    debug!("tabulate: quota: {:?}", quota);

    let mut count = Count::new(names.len());
    for wb in wballots.iter() {
        if let Some(cid) = wb.current() {
            count.credit(cid, wb.weight);
        }
    }

    let mut remaining = vacancies as usize;
    let mut elected: Vec<CandidateId> = Vec::new();
    let mut eliminated: Vec<CandidateId> = Vec::new();
    let mut round_stats: Vec<RoundStats> = Vec::new();
    let mut tie: Option<TieCondition> = None;

    if ballots.is_empty() {
        debug!("tabulate: no ballots, all the seats are filled by default");
    }

    while !ballots.is_empty() && remaining > 0 && count.active().count() > remaining {
        let round = (round_stats.len() + 1) as u32;
        let ((leader, leader_count), (trailer, trailer_count)) = match count.leader_and_trailer()
        {
            Some(p) => p,
            None => break,
        };
        debug!(
            "tabulate: round {:?}: leader {:?} ({:?}), trailer {:?} ({:?})",
            round, names[leader.0 as usize], leader_count, names[trailer.0 as usize], trailer_count
        );

        if leader_count == trailer_count {
            let tied: Vec<String> = count
                .active()
                .map(|(cid, _)| names[cid.0 as usize].clone())
                .collect();
            warn!(
                "tabulate: round {:?}: tie between {:?} with {:?} votes, stopping the count",
                round, tied, leader_count
            );
            tie = Some(TieCondition {
                round,
                candidates: tied,
                tally: leader_count,
            });
            break;
        }

        let tally: Vec<(String, f64)> = count
            .active()
            .map(|(cid, v)| (names[cid.0 as usize].clone(), v))
            .collect();

        let action = if leader_count > quota {
            let transfer_value = (leader_count - quota) / leader_count;
            let exhausted =
                count.transfer(leader, TallyEntry::Elected, transfer_value, &mut wballots);
            info!(
                "Round {} (quota: {:.3}): {} elected with {:.3}, transfer value {:.5}, {:.3} exhausted",
                round, quota, names[leader.0 as usize], leader_count, transfer_value, exhausted
            );
            elected.push(leader);
            remaining -= 1;
            RoundAction::Elected {
                candidate: names[leader.0 as usize].clone(),
                transfer_value,
            }
        } else {
            let exhausted = count.transfer(trailer, TallyEntry::Eliminated, 1.0, &mut wballots);
            info!(
                "Round {} (quota: {:.3}): {} eliminated with {:.3}, {:.3} exhausted",
                round, quota, names[trailer.0 as usize], trailer_count, exhausted
            );
            eliminated.push(trailer);
            RoundAction::Eliminated {
                candidate: names[trailer.0 as usize].clone(),
            }
        };
        round_stats.push(RoundStats {
            round,
            tally,
            action,
        });
    }

    let by_default: Vec<CandidateId> = count
        .active()
        .map(|(cid, _)| cid)
        .take(remaining)
        .collect();
    if !by_default.is_empty() {
        debug!(
            "tabulate: filling {:?} seat(s) by default: {:?}",
            by_default.len(),
            by_default
                .iter()
                .map(|cid| names[cid.0 as usize])
                .collect::<Vec<_>>()
        );
    }

    let candidate_tallies: Vec<CandidateTally> = names
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let cid = CandidateId(idx as u32);
            let status = if elected.contains(&cid) {
                CandidateStatus::Elected
            } else if by_default.contains(&cid) {
                CandidateStatus::ElectedByDefault
            } else if eliminated.contains(&cid) {
                CandidateStatus::Eliminated
            } else {
                CandidateStatus::Continuing
            };
            CandidateTally {
                id: (*name).clone(),
                total_points: count.points[idx],
                status,
            }
        })
        .collect();

    let winners: Vec<String> = elected
        .iter()
        .chain(by_default.iter())
        .map(|cid| names[cid.0 as usize].clone())
        .collect();
    info!("tabulate: elected {:?}", winners);

    TabulationResult {
        elected: winners,
        quota,
        candidates: candidate_tallies,
        round_stats,
        tie,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn ids(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    fn parse_ballots(lines: &[&str]) -> Vec<Vec<String>> {
        lines
            .iter()
            .map(|l| l.split_whitespace().map(|s| s.to_string()).collect())
            .collect()
    }

    fn eight() -> Vec<String> {
        (0..8).map(|i| i.to_string()).collect()
    }

    const BASIC: [&str; 8] = [
        "4 0 6 5 2 3 7 1",
        "1 4 6 5 3 7 2 0",
        "2 4 7 1 0 5 6 3",
        "0 3 4 7 6 2 5 1",
        "5 7 0 3 4 6 1 2",
        "2 1 4 0 5 3 7 6",
        "0 6 4 2 5 7 3 1",
        "2 4 6 5 3 0 7 1",
    ];

    const EXTENDED: [&str; 24] = [
        "6 5 1 4 3 0 2 7",
        "5 1 0 3 7 4 2 6",
        "5 6 3 0 2 4 1 7",
        "3 0 1 4 5 6 7 2",
        "5 0 1 3 4 2 7 6",
        "0 5 4 6 7 3 2 1",
        "5 4 7 2 1 0 3 6",
        "5 2 0 7 1 4 3 6",
        "2 3 1 4 5 0 7 6",
        "4 5 7 1 2 3 6 0",
        "1 5 4 2 6 3 0 7",
        "2 5 1 7 4 3 6 0",
        "3 6 2 4 1 5 7 0",
        "6 1 0 7 3 5 2 4",
        "4 3 0 6 5 1 2 7",
        "0 2 6 4 3 7 1 5",
        "7 0 6 5 3 1 2 4",
        "4 0 2 7 5 6 3 1",
        "6 0 4 5 2 3 1 7",
        "3 6 7 4 0 5 2 1",
        "1 3 5 7 6 4 0 2",
        "5 4 6 3 0 1 7 2",
        "0 4 2 1 5 7 3 6",
        "6 5 3 0 4 7 2 1",
    ];

    fn extended_ballots() -> Vec<Vec<String>> {
        let mut ballots = parse_ballots(&BASIC);
        ballots.extend(parse_ballots(&EXTENDED));
        ballots
    }

    #[test]
    fn basic() {
        init();
        let res = tabulate(&eight(), &parse_ballots(&BASIC), 2);
        let mut elected = res.elected.clone();
        elected.sort();
        assert_eq!(elected, ids(&["0", "2"]));
        assert_eq!(res.quota, 8.0 / 3.0 + 1.0);
        assert_eq!(res.tie, None);
    }

    #[test]
    fn extended() {
        init();
        let ballots = extended_ballots();
        assert_eq!(ballots.len(), 32);
        let res = tabulate(&eight(), &ballots, 4);
        let mut elected = res.elected.clone();
        elected.sort();
        assert_eq!(elected, ids(&["0", "4", "5", "6"]));
    }

    #[test]
    fn deterministic() {
        let ballots = extended_ballots();
        let first = tabulate(&eight(), &ballots, 4);
        let second = tabulate(&eight(), &ballots, 4);
        assert_eq!(first, second);
    }

    #[test]
    fn surplus_elections_exceed_quota() {
        let res = tabulate(&eight(), &extended_ballots(), 4);
        for rs in res.round_stats.iter() {
            if let RoundAction::Elected { candidate, .. } = &rs.action {
                let (_, count) = rs.tally.iter().find(|(c, _)| c == candidate).unwrap();
                assert!(*count > res.quota, "{} elected below quota", candidate);
                let status = res
                    .candidates
                    .iter()
                    .find(|ct| ct.id == *candidate)
                    .unwrap()
                    .status;
                assert_eq!(status, CandidateStatus::Elected);
            }
        }
    }

    #[test]
    fn winner_count_is_bounded() {
        let ballots = parse_ballots(&BASIC);
        for vacancies in 1..12 {
            let res = tabulate(&eight(), &ballots, vacancies);
            assert_eq!(res.elected.len(), std::cmp::min(vacancies as usize, 8));
        }
        for n in 1..5 {
            let cands: Vec<String> = (0..n).map(|i| i.to_string()).collect();
            for vacancies in 1..6 {
                let res = tabulate(&cands, &ballots, vacancies);
                assert_eq!(res.elected.len(), std::cmp::min(vacancies as usize, n));
            }
        }
    }

    #[test]
    fn string_identifiers() {
        let cands = ids(&[
            "0ee9c076-41ef-4e26-978e-4fbf4a6936a9",
            "add75ad8-afd3-4983-8b13-c5008ecd98af",
            "8f6ebdd4-80a0-46b9-b64b-8426e3862a63",
            "0294d4b1-6838-493d-b44d-d137dcf33253",
            "75bf8000-9696-40f4-b594-9a944d5bd961",
        ]);
        let ballots = vec![
            vec![cands[0].clone(), cands[1].clone(), cands[2].clone(), cands[3].clone()],
            vec![cands[0].clone(), cands[1].clone(), cands[2].clone(), cands[3].clone()],
            vec![cands[3].clone(), cands[1].clone(), cands[0].clone(), cands[2].clone()],
            vec![cands[3].clone(), cands[0].clone(), cands[2].clone(), cands[1].clone()],
            vec![cands[0].clone(), cands[3].clone(), cands[1].clone(), cands[2].clone()],
        ];
        let res = tabulate(&cands, &ballots, 2);
        assert_eq!(res.elected.len(), 2);
    }

    #[test]
    fn no_ballots() {
        let res = tabulate(&ids(&["A", "B", "C"]), &[], 2);
        assert_eq!(res.elected, ids(&["A", "B"]));
        assert_eq!(res.tie, None);
        assert!(res.round_stats.is_empty());
        assert_eq!(res.candidates[2].status, CandidateStatus::Continuing);
        assert_eq!(res.candidates[0].status, CandidateStatus::ElectedByDefault);
    }

    #[test]
    fn more_vacancies_than_candidates() {
        let ballots = vec![ids(&["B", "A"]), ids(&["B"])];
        let res = tabulate(&ids(&["A", "B"]), &ballots, 5);
        assert_eq!(res.elected, ids(&["A", "B"]));
        assert_eq!(res.candidates[1].total_points, 2.0);
    }

    #[test]
    fn tie_stops_the_count() {
        init();
        let ballots = vec![ids(&["A"]), ids(&["B"])];
        let res = tabulate(&ids(&["A", "B"]), &ballots, 1);
        let tie = res.tie.clone().unwrap();
        assert_eq!(tie.candidates, ids(&["A", "B"]));
        assert_eq!(tie.tally, 1.0);
        assert_eq!(tie.round, 1);
        // The seat is still filled, by default in input order.
        assert_eq!(res.elected, ids(&["A"]));
    }

    #[test]
    fn exhausted_ballots_leave_seats_to_default_fill() {
        // Quota is 4 / 3 + 1: nobody reaches it, B is eliminated and its ballot exhausts.
        let ballots = vec![ids(&["A"]), ids(&["A"]), ids(&["B"]), ids(&["C"])];
        let res = tabulate(&ids(&["A", "B", "C"]), &ballots, 2);
        assert_eq!(res.elected, ids(&["A", "C"]));
        assert_eq!(res.candidates[1].status, CandidateStatus::Eliminated);
        assert_eq!(res.candidates[0].status, CandidateStatus::ElectedByDefault);
        assert_eq!(
            res.round_stats[0].action,
            RoundAction::Eliminated {
                candidate: "B".to_string()
            }
        );
    }

    #[test]
    fn surplus_is_transferred_at_fractional_weight() {
        // Quota is 5 / 3 + 1 = 2.666.., A has 4 votes: surplus weight (4 - q) / 4 goes to B.
        let ballots = vec![
            ids(&["A", "B"]),
            ids(&["A", "B"]),
            ids(&["A", "B"]),
            ids(&["A", "B"]),
            ids(&["C"]),
        ];
        let res = tabulate(&ids(&["A", "B", "C"]), &ballots, 2);
        let quota = 5.0 / 3.0 + 1.0;
        let transfer_value = (4.0 - quota) / 4.0;
        assert_eq!(
            res.round_stats[0].action,
            RoundAction::Elected {
                candidate: "A".to_string(),
                transfer_value
            }
        );
        let b = res.candidates.iter().find(|c| c.id == "B").unwrap();
        assert!((b.total_points - 4.0 * transfer_value).abs() < 1e-9);
        assert_eq!(res.elected[0], "A");
        assert_eq!(res.elected.len(), 2);
    }

    #[test]
    fn unknown_candidates_are_skipped() {
        let ballots = vec![ids(&["X", "A"]), ids(&["A"]), ids(&["B"])];
        let res = tabulate(&ids(&["A", "B"]), &ballots, 1);
        let a = res.candidates.iter().find(|c| c.id == "A").unwrap();
        assert_eq!(a.total_points, 2.0);
        assert_eq!(res.elected, ids(&["A"]));
    }

    #[test]
    fn input_ballots_are_untouched() {
        let ballots = parse_ballots(&BASIC);
        let copy = ballots.clone();
        tabulate(&eight(), &ballots, 2);
        assert_eq!(ballots, copy);
    }

    #[test]
    fn leader_scan_prefers_later_candidate() {
        let mut count = Count::new(3);
        count.credit(CandidateId(0), 2.0);
        count.credit(CandidateId(1), 2.0);
        count.credit(CandidateId(2), 1.0);
        let ((leader, _), (trailer, _)) = count.leader_and_trailer().unwrap();
        assert_eq!(leader, CandidateId(1));
        assert_eq!(trailer, CandidateId(2));
    }

    #[test]
    fn cross_position_pin() {
        let ballots_x = vec![
            ids(&["A", "B", "C"]),
            ids(&["B", "A", "C"]),
            ids(&["A", "C", "B"]),
            ids(&["C", "A", "B"]),
        ];
        let ballots_y = vec![
            ids(&["A", "D", "E"]),
            ids(&["D", "A", "E"]),
            ids(&["A", "E", "D"]),
            ids(&["E", "A", "D"]),
        ];
        assert_eq!(tabulate(&ids(&["A", "B", "C"]), &ballots_x, 1).elected, ids(&["A"]));
        assert_eq!(tabulate(&ids(&["A", "D", "E"]), &ballots_y, 1).elected, ids(&["A"]));

        let ballots_y2: Vec<Vec<String>> = ballots_y
            .iter()
            .map(|b| b.iter().filter(|c| *c != "A").cloned().collect())
            .collect();
        let res = tabulate(&ids(&["D", "E"]), &ballots_y2, 1);
        assert_eq!(res.elected.len(), 1);
        assert!(["D", "E"].contains(&res.elected[0].as_str()));
    }
}

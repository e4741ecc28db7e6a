pub use crate::config::*;

use std::collections::HashSet;

/// A builder that validates the inputs of a count before running it.
///
/// [crate::tabulate] trusts its caller. The builder is the checked entry
/// point: it rejects zero vacancies, candidates registered twice and ballots
/// ranking candidates that are not registered.
///
/// ```
/// use hare_clark::builder::Builder;
/// # use hare_clark::TabulationErrors;
///
/// let mut builder = Builder::new(1)?
///     .candidates(&["Anna".to_string(), "Bob".to_string()])?;
///
/// builder.add_ballot(&["Anna".to_string(), "Bob".to_string()])?;
/// builder.add_ballot(&["Anna".to_string()])?;
/// builder.add_ballot(&["Bob".to_string()])?;
///
/// let res = builder.tabulate();
/// assert_eq!(res.elected, vec!["Anna".to_string()]);
///
/// # Ok::<(), TabulationErrors>(())
/// ```
pub struct Builder {
    pub(crate) _vacancies: u32,
    pub(crate) _candidates: Vec<String>,
    pub(crate) _ballots: Vec<Vec<String>>,
}

impl Builder {
    pub fn new(vacancies: u32) -> Result<Builder, TabulationErrors> {
        if vacancies < 1 {
            return Err(TabulationErrors::InvalidVacancies);
        }
        Ok(Builder {
            _vacancies: vacancies,
            _candidates: Vec::new(),
            _ballots: Vec::new(),
        })
    }

    /// Registers the candidates. The order is significant for tie-breaks
    /// and the default fill.
    pub fn candidates(self, cands: &[String]) -> Result<Builder, TabulationErrors> {
        let mut seen: HashSet<&String> = HashSet::new();
        for c in cands.iter() {
            if !seen.insert(c) {
                return Err(TabulationErrors::DuplicateCandidate(c.clone()));
            }
        }
        Ok(Builder {
            _vacancies: self._vacancies,
            _candidates: cands.to_vec(),
            _ballots: Vec::new(),
        })
    }

    /// Adds a ballot, most preferred candidate first.
    ///
    /// An empty ballot is accepted: it counts for the quota but never
    /// transfers.
    pub fn add_ballot(&mut self, preferences: &[String]) -> Result<(), TabulationErrors> {
        if let Some(unknown) = preferences.iter().find(|c| !self._candidates.contains(c)) {
            return Err(TabulationErrors::UnknownCandidate(unknown.clone()));
        }
        self._ballots.push(preferences.to_vec());
        Ok(())
    }

    pub fn tabulate(&self) -> TabulationResult {
        crate::tabulate(&self._candidates, &self._ballots, self._vacancies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn rejects_zero_vacancies() {
        assert_eq!(
            Builder::new(0).err(),
            Some(TabulationErrors::InvalidVacancies)
        );
    }

    #[test]
    fn rejects_duplicate_candidates() {
        let res = Builder::new(1).and_then(|b| b.candidates(&ids(&["A", "B", "A"])));
        assert_eq!(
            res.err(),
            Some(TabulationErrors::DuplicateCandidate("A".to_string()))
        );
    }

    #[test]
    fn rejects_unknown_candidates() {
        let mut builder = Builder::new(1)
            .and_then(|b| b.candidates(&ids(&["A", "B"])))
            .unwrap();
        assert_eq!(
            builder.add_ballot(&ids(&["A", "Z"])),
            Err(TabulationErrors::UnknownCandidate("Z".to_string()))
        );
        assert!(builder.add_ballot(&[]).is_ok());
        assert_eq!(builder._ballots.len(), 1);
    }
}

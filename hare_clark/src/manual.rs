/*!

This is the long-form manual for `hare_clark` and `myvotetab`.

## Counting rules

Each position is counted on its own with the Hare-Clark method, a single
transferable vote with fractional transfers of the surplus.

* The quota is `ballots / (vacancies + 1) + 1`. It is not rounded.
* Every ballot starts with a weight of 1 on its most preferred candidate.
* At each round, the continuing candidate with the most votes is elected if
  its tally exceeds the quota. The ballots sitting on this candidate move on
  to their next continuing preference with a weight multiplied by
  `(tally - quota) / tally`.
* Otherwise the candidate with the fewest votes is eliminated and the ballots
  move on at their current weight.
* The count stops when all the seats are filled, when no more candidates
  than seats remain, or when the leading and the trailing candidates have
  the same tally. In the last case a tie is reported.
* Seats still open at the end are filled by the continuing candidates, in the
  order of the nomination.

Ties between candidates with equal tallies are broken by the nomination
order: the last one of the leading candidates is considered first for
election, and the first one of the trailing candidates is considered first
for elimination.

## Multiple position winners

The positions of an election share candidates. When a candidate wins more
than one position, the operator decides which one the candidate keeps. The
candidate is then removed from the other positions, from the list of
nominees and from every ballot, and only these positions are counted again.
This may produce new multiple position winners, and the process repeats.

A candidate who kept a position is never considered for the others in the
later rounds.

If a position ends up with fewer winners than vacancies, a warning is
reported. Warnings never prevent the finalization of the results.

## Election file

`myvotetab` reads the election from a JSON file:

```text
{
  "electionName": "Annual general meeting",
  "positions": [
    {
      "id": "p1",
      "name": "President",
      "vacancies": 1,
      "candidates": [{"id": "c1", "name": "Alice"}, {"id": "c2", "name": "Bob"}],
      "ballots": [["c1", "c2"], ["c2"]]
    },
    {
      "id": "p2",
      "name": "Committee",
      "vacancies": 3,
      "candidates": [{"id": "c1", "name": "Alice"}, {"id": "c3", "name": "Carol"}],
      "ballotSource": {
        "provider": "xlsx",
        "filePath": "committee.xlsx",
        "excelWorksheetName": "Committee",
        "firstVoteColumnIndex": 2
      }
    }
  ]
}
```

The ballots may be given inline, read from a file, or both.

### `xlsx` ballot source

An Excel spreadsheet with one ballot per row, after a header row. The cells
hold candidate ids, most preferred first, starting at the column
`firstVoteColumnIndex` (1-based, default 1). The first empty cell ends the
ballot. The paths are relative to the election file.

## Choices file

The decisions for the multiple position winners are passed with `--choices`:

```text
{ "c1": "p2" }
```

Each key is a candidate id and each value is the id of the position the
candidate keeps. Without a decision for every conflicting candidate,
`myvotetab` stops and lists the pending conflicts, unless `--force` is given.

 */

use clap::Parser;

/// Tabulates the positions of an election with the Hare-Clark method and
/// reconciles the candidates who win more than one position.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The file containing the election: positions, candidates and ballots in JSON format.
    #[clap(short, long, value_parser)]
    pub config: String,

    /// (file path, optional) The positions kept by the multiple position winners, as a JSON object
    /// mapping each candidate id to a position id.
    #[clap(long, value_parser)]
    pub choices: Option<String>,

    /// If passed as an argument, the results are finalized even if some candidates still win
    /// more than one position.
    #[clap(long, takes_value = false)]
    pub force: bool,

    /// (file path, 'stdout' or empty) If specified, the summary of the election will be written in JSON format to the given
    /// location.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) A reference file containing the outcome of an election in JSON format. If provided, myvotetab will
    /// check that the tabulated output matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}

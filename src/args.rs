use clap::Parser;

/// This is a tabulation program for health-survey responses.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The JSON file describing the report: where the responses come from,
    /// which filters to apply and how to present the results. See the manual for the format.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,
    /// (file path) A reference file containing the expected report in JSON format. If provided,
    /// surveystat will check that the computed report matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the report will be written in JSON format to
    /// the given location. Setting this option overrides the path that may be specified with the
    /// --config option.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path or URL) The responses to read. For the 'backend' input type, this is the base URL
    /// of the API. Setting this option overrides the source that may be specified with the
    /// --config option.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (default json) The type of the input: backend, json, csv or xlsx.
    #[clap(long, value_parser)]
    pub input_type: Option<String>,

    /// (text) Only keep the table rows containing this text.
    #[clap(long, value_parser)]
    pub search: Option<String>,

    /// (default 1) The page of the table to output.
    #[clap(long, value_parser)]
    pub page: Option<usize>,

    /// (default 10) The number of table rows per page.
    #[clap(long, value_parser)]
    pub page_size: Option<usize>,

    /// (pins, clusters or heat) How the surveys with a location are put on the map.
    #[clap(long, value_parser)]
    pub map_mode: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}

use clap::{Parser, Subcommand};

/// This is a survey program: it collects the answers to a questionnaire and tabulates them.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The file containing the description of the survey, in JSON format.
    /// Relative paths inside this file are resolved against its directory.
    #[clap(short, long, value_parser)]
    pub config: String,

    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Fills in a new attempt of the questionnaire, one question at a time.
    /// Type :prev to go back to the previous question and :cancel to abandon the attempt.
    Fill,

    /// Tabulates the stored attempts and prints a table per question.
    Analyze {
        /// (file path or 'stdout') If specified, the summary of the analysis will be written
        /// in JSON format to the given location.
        #[clap(short, long, value_parser)]
        out: Option<String>,

        /// (file path) A reference file containing a summary in JSON format. If provided,
        /// surveytab will check that the computed summary matches the reference.
        #[clap(short, long, value_parser)]
        reference: Option<String>,

        /// (question id) Only show the table of this question.
        #[clap(short, long, value_parser)]
        question: Option<String>,

        /// (directory) If specified, writes one CSV file per question in this directory.
        #[clap(long, value_parser)]
        csv_dir: Option<String>,

        /// Also prints the data of the bar chart of each question.
        #[clap(long, takes_value = false)]
        chart: bool,
    },

    /// Lists the stored attempts, one page at a time.
    Responses {
        /// (default 1) The page to show.
        #[clap(short, long, value_parser, default_value_t = 1)]
        page: usize,
    },

    /// Changes the answer of one question in a stored attempt.
    Edit {
        #[clap(value_parser)]
        attempt: String,
        #[clap(value_parser)]
        question: String,
        /// The new answer, typed like in the questionnaire. Empty to remove it.
        #[clap(value_parser)]
        value: String,
    },

    /// Deletes one stored attempt.
    Delete {
        #[clap(value_parser)]
        attempt: String,
    },

    /// Deletes all the stored attempts.
    Clear {
        /// Confirms the deletion.
        #[clap(long, takes_value = false)]
        yes: bool,
    },

    /// Exports all the stored attempts.
    Export {
        /// (default json) 'json' or 'csv'.
        #[clap(short, long, value_parser, default_value = "json")]
        format: String,

        /// (file path) Where to write the export. Defaults to the output directory of the survey.
        #[clap(short, long, value_parser)]
        out: Option<String>,
    },

    /// Imports attempts from a JSON export or an Excel spreadsheet.
    Import {
        #[clap(value_parser)]
        file: String,

        /// When using an Excel file with several worksheets, the name of the worksheet to use.
        #[clap(long, value_parser)]
        worksheet: Option<String>,
    },
}

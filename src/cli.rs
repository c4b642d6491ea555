use clap::{ArgAction, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "trkpt-import",
    about = "Import existing GPX files into a trkpt database",
    long_about = "Import existing GPX files into a trkpt database.\n\n\
        Stop and close trkpt before modifying the database so that the changes \
        don't clash with an ongoing recording."
)]
pub struct Cli {
    /// Path to the .db file.
    #[arg(value_name = "DBFILE")]
    pub dbfile: PathBuf,

    /// One or more glob patterns that will match your .gpx files.
    #[arg(value_name = "PATTERNS", required = true, num_args = 1..)]
    pub patterns: Vec<String>,

    /// Increase log verbosity (-v, -vv). Defaults to INFO.
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Decrease log verbosity (-q, -qq). Defaults to INFO.
    #[arg(short = 'q', long, action = ArgAction::Count, global = true)]
    pub quiet: u8,
}

#![deny(
    warnings,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo
)]
#![allow(clippy::multiple_crate_versions)]

use anyhow::Result;
use clap::Parser;
use trkpt_import::{cli, database, ingest, utils};

#[macro_use]
extern crate trkpt_import;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    utils::init_logging(cli.verbose, cli.quiet);

    dlog!(
        "mode=import db={} patterns={:?}",
        cli.dbfile.display(),
        cli.patterns
    );

    let files = utils::glob_many_files(&cli.patterns)?;
    tracing::info!(files = files.len(), "found gpx files");

    let mut conn = database::open_trkpt_db(&cli.dbfile)?;
    let stats = ingest::import_files(&mut conn, &files)?;

    dlog!(
        "done files={} points={} inserted={} duplicates={}",
        stats.files,
        stats.points,
        stats.inserted,
        stats.duplicates
    );

    Ok(())
}

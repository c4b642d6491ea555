pub mod cli;
pub mod database;
pub mod gpx;
pub mod ingest;
pub mod types;
pub mod utils;

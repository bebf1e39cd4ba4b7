//! CLI argument definitions using clap derive macros.

use clap::Parser;

/// Bulk-download every video published by one profile.
///
/// Harvester opens the profile page, scrolls until no more videos load,
/// then downloads each video sequentially with retries and a recovery sweep.
/// A JSON report of the run is written at the end.
#[derive(Parser, Debug)]
#[command(name = "harvester")]
#[command(author, version, about)]
pub struct Args {
    /// Profile page URL, e.g. https://www.tiktok.com/@someone
    pub profile_url: String,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

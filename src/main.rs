//! # media-dedup CLI
//!
//! Command-line interface for the media organizer.
//!
//! ## Usage
//! ```bash
//! media-dedup organize ~/Import --dest ~/Library --dry-run
//! media-dedup scan ~/Pictures --output json
//! ```

mod cli;

use console::style;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{} {}", style("error:").red().bold(), e);
        std::process::exit(1);
    }
}

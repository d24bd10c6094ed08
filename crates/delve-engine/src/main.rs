//! # Delve
//!
//! Headless driver for the Delve gameplay core.
//!
//! Loads a level image or an outdoor heightmap, runs the simulation for a
//! fixed number of frames and reports what happened.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod app;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Main entry point.
fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("delve=info".parse()?))
        .init();

    info!("Delve {} starting", env!("CARGO_PKG_VERSION"));

    let options = app::RunOptions::parse();
    let tally = app::run(&options)?;
    tally.log();
    if tally.get("player_died") > 0 {
        info!("The player did not survive");
    }

    info!("Delve shutdown complete");
    Ok(())
}

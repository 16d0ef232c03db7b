use std::path::PathBuf;

use anyhow::{Context as _, Result};
use chrono::Utc;
use clap::Args;
use nightwatch_core::classify::classify_frame;
use nightwatch_core::frame::Frame;
use nightwatch_core::metadata::{self, HeaderOverlay};

use super::Context;

#[derive(Args)]
pub struct InfoArgs {
    /// Raw or FITS frame inside a night directory
    pub frame: PathBuf,
}

pub fn run(args: &InfoArgs, ctx: &Context) -> Result<()> {
    let config = &ctx.config;
    let frame = Frame::from_path(&args.frame, Utc::now())
        .with_context(|| format!("Cannot locate night of {}", args.frame.display()))?;
    let sidecar = metadata::sidecar_path(config, &frame);

    println!("Frame:       {}", frame.file_name());
    println!("Night:       {}", frame.night);
    println!("Sidecar:     {}", sidecar.display());
    println!("Type:        {}", classify_frame(config, &frame));

    let mut overlay = match metadata::read_overlay(config, &frame) {
        Ok(overlay) => overlay,
        Err(e) => {
            println!("Metadata:    {e}");
            HeaderOverlay::new()
        }
    };
    overlay.extend(HeaderOverlay::site(&config.site));

    println!("Header cards:");
    for (key, value) in overlay.entries() {
        println!("  {key:<10}{value}");
    }
    Ok(())
}

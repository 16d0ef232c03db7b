use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use clap::{Args, ValueEnum};
use nightwatch_core::config::Channel;
use nightwatch_core::processor::convert::{default_output, raw_to_fits, raw_to_fits_all_channels};

use super::Context;

#[derive(Args)]
pub struct ConvertArgs {
    /// Raw camera frame (.CR2)
    pub raw: PathBuf,

    /// Output FITS file (defaults to the raw name with .fits)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Colour plane to keep (defaults to the configured channel)
    #[arg(long, value_enum, conflicts_with = "all_channels")]
    pub channel: Option<ChannelArg>,

    /// Keep red, green and blue: red as the primary image, the others as
    /// GREEN and BLUE extensions
    #[arg(long)]
    pub all_channels: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ChannelArg {
    Red,
    Green,
    Blue,
    Luminance,
}

impl From<ChannelArg> for Channel {
    fn from(arg: ChannelArg) -> Self {
        match arg {
            ChannelArg::Red => Channel::Red,
            ChannelArg::Green => Channel::Green,
            ChannelArg::Blue => Channel::Blue,
            ChannelArg::Luminance => Channel::Luminance,
        }
    }
}

pub fn run(args: &ConvertArgs, ctx: &Context) -> Result<()> {
    let tools = &ctx.config.tools;
    let output = args.output.clone().unwrap_or_else(|| default_output(&args.raw));
    let channel = args.channel.map(Channel::from).unwrap_or(tools.channel);
    // The intermediate PPM sits next to the output, as dcraw would leave it.
    let scratch = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    if args.all_channels {
        raw_to_fits_all_channels(&tools.dcraw, &args.raw, &output, scratch)
            .with_context(|| format!("Failed to convert {}", args.raw.display()))?;
        println!("RGB planes saved to {}", output.display());
        return Ok(());
    }

    raw_to_fits(&tools.dcraw, channel, &args.raw, &output, scratch)
        .with_context(|| format!("Failed to convert {}", args.raw.display()))?;
    println!("{} channel saved to {}", channel, output.display());
    Ok(())
}

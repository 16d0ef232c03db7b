use anyhow::{Context as _, Result};
use clap::Args;
use nightwatch_core::clock::SystemClock;
use nightwatch_core::monitor::{FrameRunner, InProcessRunner, Monitor, MonitorSummary, SubprocessRunner};
use nightwatch_core::processor::ToolchainProcessor;

use super::{tonight, Context};
use crate::summary;

#[derive(Args)]
pub struct MonitorArgs {
    /// Night to watch, YYYY-MM-DD (defaults to today, UTC)
    #[arg(short, long)]
    pub night: Option<String>,

    /// Reset the night's log, HTML table and summary on the first frame
    #[arg(long)]
    pub clobber: bool,

    /// Measure frames in this process instead of one subprocess each
    #[arg(long)]
    pub in_process: bool,
}

pub fn run(args: &MonitorArgs, ctx: &Context) -> Result<()> {
    let config = &ctx.config;
    let night = args.night.clone().unwrap_or_else(tonight);
    summary::print_config_summary(config, "Night Monitor", &night, args.clobber);

    let result = if args.in_process {
        let processor = ToolchainProcessor::new(config.tools.clone());
        let mut runner = InProcessRunner::new(config, &processor);
        watch(ctx, &night, args.clobber, &mut runner)
    } else {
        let mut runner = SubprocessRunner::current_exe(
            ctx.config_file.as_deref(),
            ctx.verbose,
            config.monitor.dispatch_timeout(),
        )?
        .with_scratch_root(config.layout.tmp_dir.clone());
        watch(ctx, &night, args.clobber, &mut runner)
    };
    let monitor_summary = result?;

    summary::print_monitor_summary(&monitor_summary);
    Ok(())
}

fn watch(
    ctx: &Context,
    night: &str,
    clobber: bool,
    runner: &mut dyn FrameRunner,
) -> Result<MonitorSummary> {
    let clock = SystemClock;
    let mut monitor = Monitor::new(&ctx.config, night, runner, &clock, clobber)
        .with_context(|| format!("Cannot watch night {night}"))?;
    Ok(monitor.run()?)
}

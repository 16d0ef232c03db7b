use anyhow::{Context as _, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use nightwatch_core::batch::{run_night, BatchProgress, NightSummary};
use nightwatch_core::monitor::{DispatchOutcome, FrameRunner, InProcessRunner, SubprocessRunner};
use nightwatch_core::processor::ToolchainProcessor;

use super::{tonight, Context};
use crate::summary;

#[derive(Args)]
pub struct NightArgs {
    /// Night to process, YYYY-MM-DD (defaults to today, UTC)
    #[arg(short, long)]
    pub night: Option<String>,

    /// Reset the night's log, HTML table and summary first
    #[arg(long)]
    pub clobber: bool,

    /// Measure frames in this process instead of one subprocess each
    #[arg(long)]
    pub in_process: bool,
}

struct BarProgress {
    bar: ProgressBar,
}

impl BatchProgress for BarProgress {
    fn begin(&self, total: usize) {
        self.bar.set_length(total as u64);
    }

    fn frame_done(&self, name: &str, outcome: Option<&DispatchOutcome>) {
        let status = match outcome {
            None => "skipped".to_string(),
            Some(outcome) => outcome.to_string(),
        };
        self.bar.set_message(format!("{name} {status}"));
        self.bar.inc(1);
    }

    fn finish(&self) {
        self.bar.finish_with_message("Done");
    }
}

pub fn run(args: &NightArgs, ctx: &Context) -> Result<()> {
    let config = &ctx.config;
    let night = args.night.clone().unwrap_or_else(tonight);
    summary::print_config_summary(config, "Night Batch", &night, args.clobber);

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg:32} [{bar:40}] {pos}/{len}")?
            .progress_chars("=> "),
    );
    let progress = BarProgress { bar: pb };

    let result = if args.in_process {
        let processor = ToolchainProcessor::new(config.tools.clone());
        let mut runner = InProcessRunner::new(config, &processor);
        process(ctx, &night, args.clobber, &mut runner, &progress)
    } else {
        let mut runner = SubprocessRunner::current_exe(
            ctx.config_file.as_deref(),
            ctx.verbose,
            config.monitor.dispatch_timeout(),
        )?
        .with_scratch_root(config.layout.tmp_dir.clone());
        process(ctx, &night, args.clobber, &mut runner, &progress)
    };
    let night_summary = result?;

    summary::print_night_summary(&night_summary);
    Ok(())
}

fn process(
    ctx: &Context,
    night: &str,
    clobber: bool,
    runner: &mut dyn FrameRunner,
    progress: &BarProgress,
) -> Result<NightSummary> {
    run_night(&ctx.config, night, clobber, runner, progress)
        .with_context(|| format!("Cannot process night {night}"))
}

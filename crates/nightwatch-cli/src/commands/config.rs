use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;

use super::Context;

#[derive(Args)]
pub struct ConfigArgs {
    /// Write config to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Print or save the effective configuration (defaults unless `--config`
/// was given) as TOML.
pub fn run(args: &ConfigArgs, ctx: &Context) -> Result<()> {
    let toml_str = toml::to_string_pretty(&ctx.config)?;

    if let Some(ref path) = args.output {
        std::fs::write(path, &toml_str)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        println!("Config saved to {}", path.display());
    } else {
        print!("{}", toml_str);
    }

    Ok(())
}

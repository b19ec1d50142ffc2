use anyhow::{Context, Result};
use clap::Parser;
use replay::codec::Type;
use replay_tools::{resolve_layout, LayoutReport};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Prints the size, alignment and field offsets of a type on one or more
/// targets.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// JSON file holding a serialized `Type`.
    ty: PathBuf,

    /// Layout preset (x86, x86_64, armv7a, arm64) or a layout JSON file.
    /// May be repeated.
    #[arg(short, long = "layout", default_value = "x86_64")]
    layouts: Vec<String>,

    /// Emit JSON instead of text.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_env("RP_LOG"))
        .with_writer(io::stderr)
        .init();

    let text = std::fs::read_to_string(&args.ty)
        .with_context(|| format!("cannot read {}", args.ty.display()))?;
    let ty: Type = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a type description", args.ty.display()))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for name in &args.layouts {
        let layout = resolve_layout(name)?;
        tracing::debug!(layout = %name, "placing {ty}");
        let report = LayoutReport::new(&ty, &layout);
        if args.json {
            serde_json::to_writer(&mut out, &report)?;
            writeln!(out)?;
        } else {
            writeln!(out, "[{name}]")?;
            write!(out, "{report}")?;
        }
    }
    Ok(())
}

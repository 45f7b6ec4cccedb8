//! IPFB CLI - pack and unpack IPFB game-asset archives.
//!
//! Direction is decided by the positional arguments: a `.pak` source means
//! unpack, a `.pak` destination means pack.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use ipfb::prelude::*;

/// IPFB archive pack/unpack tool
#[derive(Parser)]
#[command(name = "ipfbtool")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "\
Directions:
  ipfbtool <xxx.pak> <output dir>   unpack an archive
  ipfbtool <input dir> <xxx.pak>    pack a directory")]
struct Cli {
    /// Source: a .pak archive (unpack) or a directory (pack)
    source: PathBuf,

    /// Destination: a directory (unpack) or a .pak archive (pack)
    dest: PathBuf,

    /// Transformer filter: "all", "none", or a comma list of
    /// name/+name/-name tokens
    #[arg(short, long, env = "IPFB_TRANSFORMERS", default_value = "all")]
    transformers: String,
}

fn main() {
    // Usage and validation problems exit 1; clap's own exit codes are
    // bypassed so the contract holds for every argument error.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            std::process::exit(if e.use_stderr() { 1 } else { 0 });
        }
    };

    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut registry = Registry::standard();
    let filter: Filter = cli
        .transformers
        .parse()
        .context("invalid transformer filter")?;
    registry
        .apply_filter(&filter)
        .context("invalid transformer filter")?;

    let source_is_pak = is_pak(&cli.source);
    let dest_is_pak = is_pak(&cli.dest);

    match (source_is_pak, dest_is_pak) {
        (true, false) => cmd_unpack(&cli.source, &cli.dest, &registry),
        (false, true) => cmd_pack(&cli.source, &cli.dest, &registry),
        _ => anyhow::bail!(
            "ambiguous arguments: exactly one of source and destination must be a .pak \
             (got {} and {})",
            cli.source.display(),
            cli.dest.display()
        ),
    }
}

fn cmd_unpack(pak: &Path, out_dir: &Path, registry: &Registry) -> Result<()> {
    println!("Unpacking {} -> {}", pak.display(), out_dir.display());

    let start = Instant::now();
    let pb = progress_bar();

    let stats = unpack_archive(pak, out_dir, registry, |done, total| {
        pb.set_length(total as u64);
        pb.set_position(done as u64);
    })
    .context("failed to unpack archive")?;

    pb.finish_with_message("Done");
    println!(
        "Extracted {} entries from {} part file(s) in {:?} ({} named, {} hash-coded)",
        stats.entries,
        stats.parts,
        start.elapsed(),
        stats.named,
        stats.entries - stats.named
    );

    Ok(())
}

fn cmd_pack(input: &Path, pak: &Path, registry: &Registry) -> Result<()> {
    if !input.is_dir() {
        anyhow::bail!("input directory does not exist: {}", input.display());
    }

    println!("Packing {} -> {}", input.display(), pak.display());

    let start = Instant::now();
    let pb = progress_bar();

    let stats = pack_directory(input, pak, registry, |done, total| {
        pb.set_length(total as u64);
        pb.set_position(done as u64);
    })
    .context("failed to pack directory")?;

    pb.finish_with_message("Done");
    println!(
        "Wrote {} entries ({} files, {} rebuilt from manifest) in {:?}",
        stats.entries,
        stats.files,
        stats.replayed,
        start.elapsed()
    );

    Ok(())
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

fn is_pak(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pak"))
}

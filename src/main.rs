//! CLI entrypoint for `potfile`.
//!
//! Loads a hash list for one hash mode, re-applies the potfile to it, and
//! prints either `--show` / `--left` records or a recovered-hashes summary.
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use log::{LevelFilter, error, info};
use potfile::{
    config::{Potfile, RunOptions},
    hashlist::load_hashlist,
    hexify::HexPolicy,
    io::DEFAULT_MMAP_THRESHOLD_BYTES,
    mode::{HashMode, builtin},
    report,
    sink::{Loopback, LoopbackFile, WriteSink},
};

#[derive(Parser, Debug)]
#[command(
    name = "potfile",
    version,
    about = "Re-apply recovered plaintexts from a hashcat potfile to a hash list"
)]
struct Args {
    /// Hash mode id (0 MD5, 100 SHA1, 1000 NTLM, 3000 LM, ...)
    #[arg(short = 'm', long = "hash-type")]
    hash_mode: u32,

    /// Path to the hash list
    hashfile: PathBuf,

    /// Print cracked hashes with their plaintexts
    #[arg(long = "show", conflicts_with = "left")]
    show: bool,

    /// Print hashes not cracked yet
    #[arg(long = "left")]
    left: bool,

    /// Hash list lines are prefixed with `user:`
    #[arg(long = "username")]
    username: bool,

    /// Use this potfile instead of the profile default
    #[arg(long = "potfile-path")]
    potfile_path: Option<PathBuf>,

    /// Do not read the potfile
    #[arg(long = "potfile-disable")]
    potfile_disable: bool,

    /// Profile directory holding `hashcat.potfile`
    #[arg(long = "profile-dir")]
    profile_dir: Option<PathBuf>,

    /// Print plaintexts raw instead of `$HEX[...]`-escaping them
    #[arg(long = "outfile-autohex-disable")]
    outfile_autohex_disable: bool,

    /// Append every plaintext recovered from the potfile to this file
    #[arg(long = "loopback")]
    loopback: Option<PathBuf>,

    /// Override mmap threshold in bytes. If zero, disable mmap.
    #[arg(long = "mmap-threshold", default_value_t = DEFAULT_MMAP_THRESHOLD_BYTES)]
    mmap_threshold: u64,

    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log counts of skipped/malformed lines encountered during parsing
    #[arg(long = "log-parse-stats")]
    log_parse_stats: bool,

    /// Control color output (auto, always, never)
    #[arg(long = "color", value_enum, default_value_t = ColorChoice::Auto)]
    color: ColorChoice,

    /// Suppress the summary
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

fn init_logger(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level)
        .try_init();
}

fn verify_inputs(args: &Args) -> Result<Box<dyn HashMode>> {
    let Some(mode) = builtin(args.hash_mode) else {
        bail!("unsupported hash mode: {}", args.hash_mode);
    };
    if !args.hashfile.is_file() {
        bail!("hash file not found: {}", args.hashfile.display());
    }
    Ok(mode)
}

fn profile_dir(args: &Args) -> PathBuf {
    args.profile_dir.clone().unwrap_or_else(|| {
        dirs::data_local_dir()
            .map(|d| d.join("hashcat"))
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

fn run_options(args: &Args) -> RunOptions {
    RunOptions {
        potfile_disable: args.potfile_disable,
        potfile_path: args.potfile_path.clone(),
        username: args.username,
        show: args.show,
        left: args.left,
        outfile_autohex: !args.outfile_autohex_disable,
        ..RunOptions::default()
    }
}

fn open_loopback(path: &Path) -> Result<LoopbackFile> {
    LoopbackFile::open(path)
        .with_context(|| format!("failed to open loopback file {}", path.display()))
}

fn main() {
    let args = Args::parse();
    init_logger(args.verbose);
    match args.color {
        ColorChoice::Always => colored::control::set_override(true),
        ColorChoice::Never => colored::control::set_override(false),
        ColorChoice::Auto => {}
    }
    let mode = match verify_inputs(&args) {
        Ok(m) => m,
        Err(e) => {
            error!("{}", e);
            std::process::exit(2);
        }
    };
    let threshold = if args.mmap_threshold == 0 {
        u64::MAX
    } else {
        args.mmap_threshold
    };
    let opts = run_options(&args);

    let (mut catalog, load_stats) =
        match load_hashlist(&args.hashfile, mode.as_ref(), &opts, threshold) {
            Ok(loaded) => loaded,
            Err(e) => {
                error!("failed to load {}: {:#}", args.hashfile.display(), e);
                std::process::exit(3);
            }
        };
    if catalog.is_empty() {
        error!("no hashes loaded from {}", args.hashfile.display());
        std::process::exit(3);
    }

    let potfile = Potfile::init(&opts, &profile_dir(&args), mode.as_ref())
        .map(|p| p.with_mmap_threshold(threshold));
    let mut reconcile_stats = None;
    if let Some(potfile) = &potfile {
        let mut loopback = match args.loopback.as_deref().map(open_loopback).transpose() {
            Ok(lb) => lb,
            Err(e) => {
                error!("{:#}", e);
                std::process::exit(2);
            }
        };
        let lb = loopback.as_mut().map(|l| l as &mut dyn Loopback);
        match potfile.reconcile(&mut catalog, mode.as_ref(), lb) {
            Ok(stats) => reconcile_stats = Some(stats),
            Err(e) => {
                error!("failed to reconcile potfile: {}", e);
                std::process::exit(4);
            }
        }
    }

    if args.show || args.left {
        let shown = catalog.shown_bitmap();
        let policy = match &potfile {
            Some(p) => *p.policy(),
            None => HexPolicy {
                separator: mode.separator(),
                always_ascii: mode.always_ascii(),
                autohex: opts.outfile_autohex,
            },
        };
        let stdout = io::stdout();
        let mut sink = WriteSink::new(BufWriter::new(stdout.lock()));
        if args.show {
            report::show(&catalog, &shown, mode.as_ref(), &policy, &mut sink);
        } else {
            report::left(&catalog, &shown, mode.as_ref(), &policy, &mut sink);
        }
        if let Err(e) = sink.finish() {
            if e.kind() != io::ErrorKind::BrokenPipe {
                error!("failed to write report: {}", e);
                std::process::exit(4);
            }
        }
    } else if !args.quiet {
        let total = catalog.len();
        let recovered = catalog.cracked_count();
        let pct = recovered as f64 * 100.0 / total as f64;
        println!(
            "{} {} ({}) {}",
            "Recovered:".bold(),
            format!("{}/{}", recovered, total).green(),
            format!("{:.2}%", pct).yellow(),
            mode.name().dimmed()
        );
    }

    if args.log_parse_stats {
        info!(
            "parse stats: hashlist_lines={}, hashlist_malformed={}",
            load_stats.lines, load_stats.malformed
        );
        match reconcile_stats {
            Some(s) => info!(
                "parse stats: pot_lines={}, pot_malformed={}, pot_unmatched={}, pot_cracked={}",
                s.lines, s.malformed, s.unmatched, s.cracked
            ),
            None => info!("parse stats: potfile disabled for this run"),
        }
    }
}

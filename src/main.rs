use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use wfc::{
    io_util, render, AnalyzerOptions, Backtracker, BacktrackerConfig, Config, PatternCatalog,
    RuleTable, Solver, SolverConfig, Status,
};

/// Generates a larger texture from a small exemplar via overlapping-model
/// Wave Function Collapse.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the exemplar texture.
    input_texture: PathBuf,

    /// Path to write the solved (or, on contradiction, diagnostic) image.
    #[arg(short = 'o', long = "output", default_value = "solution.png")]
    output: PathBuf,

    /// The pattern (kernel) size, N.
    #[arg(short = 's', long = "size", default_value = "3")]
    pattern_size: usize,

    /// The width of the output image.
    #[arg(long = "width", default_value = "32")]
    width: usize,

    /// The height of the output image.
    #[arg(long = "height", default_value = "32")]
    height: usize,

    /// Also emit patterns reflected across their horizontal/vertical axis.
    #[arg(long = "flip")]
    flip: bool,

    /// Also emit patterns rotated by 90/180/270 degrees.
    #[arg(long = "rotate")]
    rotate: bool,

    /// Enable backtracking recovery on contradiction.
    #[arg(long = "enable-backtracking")]
    enable_backtracking: bool,

    /// Maximum number of snapshots the backtracker retains.
    #[arg(long = "max-depth", default_value = "50")]
    max_depth: usize,

    /// Retries allowed at a single backtracking level before popping it.
    #[arg(long = "max-iterations", default_value = "3")]
    max_iterations: usize,

    /// Fix the PRNG seed for a reproducible run.
    #[arg(long = "seed")]
    seed: Option<u64>,

    /// Write `patterns_preview.png` alongside the output.
    #[arg(long = "save-patterns")]
    save_patterns: bool,

    /// Write a numbered snapshot of the grid after every iteration, under
    /// `iterations/`.
    #[arg(long = "save-iterations")]
    save_iterations: bool,

    /// Scale factor applied to pattern previews and saved snapshots.
    #[arg(long = "preview-scale", default_value = "4")]
    preview_scale: u32,

    /// Increase log verbosity; may be repeated (-v, -vv, -vvv).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

fn level_for(verbose: u8) -> log::LevelFilter {
    match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

fn main() -> ExitCode {
    let args = Cli::parse();
    env_logger::Builder::new()
        .filter_level(level_for(args.verbose))
        .init();

    match run(&args) {
        Ok(Status::Solution) => ExitCode::from(0),
        Ok(Status::Contradiction) => ExitCode::from(1),
        Ok(_) => unreachable!("run() only returns terminal statuses"),
        Err(err) => {
            error!("{err}");
            ExitCode::from(2)
        }
    }
}

fn run(args: &Cli) -> wfc::Result<Status> {
    let exemplar = image::open(&args.input_texture)?.to_rgb8();

    let config = Config {
        analyzer: AnalyzerOptions {
            pattern_size: args.pattern_size,
            allow_rotate: args.rotate,
            allow_flip: args.flip,
        },
        solver: SolverConfig {
            output_width: args.width,
            output_height: args.height,
        },
        backtracker: BacktrackerConfig {
            max_depth: args.max_depth,
            max_iterations: args.max_iterations,
            enabled: args.enable_backtracking,
        },
        seed: args.seed,
    };
    config.solver.validate()?;

    let catalog = PatternCatalog::analyze(&exemplar, &config.analyzer)?;
    info!("extracted {} distinct patterns", catalog.len());

    if args.save_patterns {
        let preview_path = output_sibling(&args.output, "patterns_preview.png");
        catalog.save_preview(&preview_path, args.preview_scale, 1)?;
    }

    let rules = RuleTable::new(catalog.patterns(), config.analyzer.pattern_size);
    let backtracker = Backtracker::new(config.backtracker);
    let mut solver = Solver::new(
        catalog.len(),
        catalog.probability(),
        &rules,
        config.solver,
        backtracker,
        config.seed,
    );

    let iterations_dir = output_sibling(&args.output, "iterations");
    if args.save_iterations {
        io_util::ensure_dir(&iterations_dir)?;
    }

    let outcome = solver.run_with(|solver| {
        if args.save_iterations {
            let frame = render::render(&catalog, solver.grid());
            let frame = render::scale(
                &frame,
                frame.width() * args.preview_scale,
                frame.height() * args.preview_scale,
            );
            let path = io_util::unique_path(&iterations_dir.join(format!("{:05}.png", solver.iteration())));
            if let Err(err) = frame.save(&path) {
                error!("failed to save iteration snapshot {}: {err}", path.display());
            }
        }
        std::ops::ControlFlow::Continue(())
    });

    let image = render::render(&catalog, solver.grid());
    let image = if args.preview_scale > 1 {
        render::scale(
            &image,
            image.width() * args.preview_scale,
            image.height() * args.preview_scale,
        )
    } else {
        image
    };

    let output_path = match outcome.status {
        Status::Solution => args.output.clone(),
        Status::Contradiction => output_sibling(&args.output, "contradiction.png"),
        _ => args.output.clone(),
    };
    io_util::ensure_parent_dir(&output_path)?;
    let output_path = io_util::unique_path(&output_path);
    image.save(&output_path)?;

    info!(
        "finished with status {:?} after {} iterations, wrote {}",
        outcome.status,
        outcome.iterations,
        output_path.display()
    );

    Ok(outcome.status)
}

fn output_sibling(output: &PathBuf, name: &str) -> PathBuf {
    output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.join(name))
        .unwrap_or_else(|| PathBuf::from(name))
}

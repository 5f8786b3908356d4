use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use framepipe::{
    CallKind, CallLog, FrameStats, HeadlessTarget, Scheduler, SchedulerOpts, ThreadingModel,
};

#[derive(Parser, Debug)]
#[command(name = "framepipe", version)]
struct Cli {
    /// Log scheduler activity to stderr (repeat for more detail).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Drive headless targets through full frames and report statistics.
    Run(RunArgs),
    /// Print the stage assignment a threading-model descriptor resolves to.
    Describe(DescribeArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Number of headless targets. Each one's index is its sort key.
    #[arg(
        long,
        default_value_t = 3,
        value_parser = clap::value_parser!(u32).range(..=i64::from(i32::MAX))
    )]
    targets: u32,

    /// Number of frames to run.
    #[arg(long, default_value_t = 10)]
    frames: u64,

    /// Threading model(s), assigned to targets round-robin (e.g. `A`, `A/B`, `W:A/B`).
    #[arg(long = "threading")]
    threading: Vec<String>,

    /// Scheduler options JSON file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Artificial delay per drawn region, in microseconds.
    #[arg(long, default_value_t = 0)]
    draw_delay_us: u64,

    /// Print the summary as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Parser, Debug)]
struct DescribeArgs {
    /// Threading-model descriptor.
    model: String,
}

#[derive(Debug, Default, serde::Serialize)]
struct RunSummary {
    frames: u64,
    targets: u32,
    workers: Vec<String>,
    targets_drawn: u64,
    targets_skipped: u64,
    regions_drawn: u64,
    tasks_dispatched: u64,
    flips: usize,
    elapsed_ms: f64,
    last_frame: FrameStats,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match cli.cmd {
        Command::Run(args) => cmd_run(args),
        Command::Describe(args) => cmd_describe(args),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_thread_names(true)
        .init();
}

fn cmd_run(args: RunArgs) -> anyhow::Result<()> {
    let opts = match &args.config {
        Some(path) => SchedulerOpts::from_json_file(path)
            .with_context(|| format!("load scheduler options '{}'", path.display()))?,
        None => SchedulerOpts::default(),
    };
    let models = args
        .threading
        .iter()
        .map(|m| ThreadingModel::parse(m).with_context(|| format!("threading model '{m}'")))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let log = CallLog::new();
    let mut scheduler = Scheduler::new(opts)?;
    for i in 0..args.targets {
        let target = HeadlessTarget::new(format!("target-{i}")).with_log(log.clone());
        target
            .controls()
            .set_draw_delay(Duration::from_micros(args.draw_delay_us));
        let threading = if models.is_empty() {
            None
        } else {
            Some(models[i as usize % models.len()].clone())
        };
        let sort_key = i32::try_from(i).with_context(|| format!("sort key for target {i}"))?;
        scheduler.make_target(
            target,
            framepipe::TargetOpts {
                sort_key,
                threading,
            },
        )?;
    }

    let started = Instant::now();
    let mut summary = RunSummary {
        targets: args.targets,
        workers: scheduler
            .worker_contexts()
            .iter()
            .map(|c| c.name().to_string())
            .collect(),
        ..RunSummary::default()
    };
    for _ in 0..args.frames {
        let stats = scheduler.run_frame()?;
        summary.frames += 1;
        summary.targets_drawn += stats.targets_drawn;
        summary.targets_skipped += stats.targets_skipped;
        summary.regions_drawn += stats.regions_drawn;
        summary.tasks_dispatched += stats.tasks_dispatched;
        summary.last_frame = stats;
    }
    scheduler.terminate_threads()?;
    summary.elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    summary.flips = log.total(CallKind::Flip);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "frames={} targets={} workers=[{}] drawn={} skipped={} regions={} flips={} elapsed_ms={:.3}",
            summary.frames,
            summary.targets,
            summary.workers.join(","),
            summary.targets_drawn,
            summary.targets_skipped,
            summary.regions_drawn,
            summary.flips,
            summary.elapsed_ms,
        );
    }
    Ok(())
}

fn cmd_describe(args: DescribeArgs) -> anyhow::Result<()> {
    let model = ThreadingModel::parse(&args.model)
        .with_context(|| format!("threading model '{}'", args.model))?;
    let assignment = model.assignment();
    println!("model  {model}");
    println!("window {}", assignment.window);
    println!("cull   {}", assignment.cull);
    println!("draw   {}", assignment.draw);
    Ok(())
}

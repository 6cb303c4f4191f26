use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::process::ExitCode;
use std::time::Instant;
use tokio::runtime::Runtime;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use wikijson::config::{
    PipelineConfig, DEFAULT_LINK_BASE, DEFAULT_QUEUE_CAPACITY, WRITE_BUFFER_SIZE,
};
use wikijson::parser::DumpReader;
use wikijson::pipeline::{CancelToken, Outcome, Pipeline};
use wikijson::writer::JsonArrayWriter;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Exit status after an interrupt, as shells report SIGINT.
const EXIT_CANCELLED: u8 = 130;

#[derive(Parser)]
#[command(name = "wikijson")]
#[command(about = "Convert Wikipedia XML dumps into a JSON array of cleaned articles")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract pages from a dump into a JSON array
    Extract(ExtractArgs),
    /// Clean a single wikitext document to plain text
    Clean(CleanArgs),
}

#[derive(Args)]
struct ExtractArgs {
    /// Path to the Wikipedia dump (.xml or .xml.bz2, `-` for stdin)
    #[arg(short, long)]
    input: String,

    /// Output JSON file (`-` for stdout)
    #[arg(short, long)]
    output: String,

    /// Namespace ids to keep (repeatable)
    #[arg(long = "namespace", default_values_t = [0])]
    namespaces: Vec<i32>,

    /// URL prefix for the `link` field
    #[arg(long, default_value = DEFAULT_LINK_BASE)]
    link_base: String,

    /// Stop after this many records (for testing)
    #[arg(long)]
    limit: Option<u64>,

    /// Indent each record
    #[arg(long)]
    pretty: bool,

    /// Read the dump on a separate task from cleaning and writing
    #[arg(long)]
    pipelined: bool,

    /// Pages buffered between reader and writer in pipelined mode
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    queue_capacity: usize,
}

#[derive(Args)]
struct CleanArgs {
    /// Wikitext file to clean (stdin when omitted)
    #[arg(short, long)]
    input: Option<String>,
}

fn open_output(path: &str) -> Result<Box<dyn Write + Send>> {
    if path == "-" {
        return Ok(Box::new(BufWriter::with_capacity(
            WRITE_BUFFER_SIZE,
            io::stdout(),
        )));
    }
    let file =
        File::create(path).with_context(|| format!("Failed to create output file: {}", path))?;
    Ok(Box::new(BufWriter::with_capacity(WRITE_BUFFER_SIZE, file)))
}

fn run_extract(args: ExtractArgs, rt: &Runtime, cancel: &CancelToken) -> Result<Outcome> {
    let config = PipelineConfig {
        namespaces: args.namespaces,
        link_base: args.link_base,
        limit: args.limit,
        show_progress: args.output != "-",
    };

    let out = open_output(&args.output)?;
    let writer = JsonArrayWriter::new(out).pretty(args.pretty);
    let mut pipeline = Pipeline::new(config, writer);

    let reader = DumpReader::open(&args.input)
        .with_context(|| format!("Failed to open dump: {}", args.input))?
        .with_stats(pipeline.stats());

    info!(
        input = %args.input,
        output = %args.output,
        pipelined = args.pipelined,
        "Starting extraction"
    );
    let start = Instant::now();
    let result = if args.pipelined {
        rt.block_on(pipeline.run_pipelined(reader, cancel, args.queue_capacity))
    } else {
        pipeline.run(reader, cancel)
    };
    let summary = result.with_context(|| format!("Extraction failed for {}", args.input))?;
    let duration = start.elapsed();

    let stats = &summary.stats;
    eprintln!();
    eprintln!("=== Summary ===");
    eprintln!("Outcome:            {:?}", summary.outcome);
    eprintln!("Total time:         {:.2}s", duration.as_secs_f64());
    eprintln!();
    eprintln!("Pages read:         {}", stats.pages_read);
    eprintln!("Records written:    {}", stats.records_written);
    eprintln!("Redirects skipped:  {}", stats.redirects_skipped);
    eprintln!("Other namespaces:   {}", stats.namespace_skipped);
    eprintln!("Raw bytes:          {}", stats.raw_bytes);
    eprintln!("Plain bytes:        {}", stats.plain_bytes);

    Ok(summary.outcome)
}

fn run_clean(args: CleanArgs) -> Result<()> {
    let mut raw = String::new();
    match &args.input {
        Some(path) => {
            File::open(path)
                .and_then(|mut f| f.read_to_string(&mut raw))
                .with_context(|| format!("Failed to read wikitext: {}", path))?;
        }
        None => {
            io::stdin()
                .read_to_string(&mut raw)
                .context("Failed to read wikitext from stdin")?;
        }
    }

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", wikijson::content::clean(&raw))?;
    Ok(())
}

fn install_interrupt_handler(rt: &Runtime, cancel: CancelToken) {
    rt.spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupt received, stopping after the current page");
                cancel.cancel();
            }
            Err(e) => warn!(error = %e, "Failed to listen for interrupts"),
        }
    });
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    let result = match cli.command {
        Commands::Extract(args) => tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("wikijson-worker")
            .enable_all()
            .build()
            .context("Failed to start runtime")
            .and_then(|rt| {
                let cancel = CancelToken::new();
                install_interrupt_handler(&rt, cancel.clone());
                run_extract(args, &rt, &cancel)
            }),
        Commands::Clean(args) => run_clean(args).map(|()| Outcome::Done),
    };

    match result {
        Ok(Outcome::Done) => {
            info!("Completed successfully");
            ExitCode::SUCCESS
        }
        Ok(Outcome::Cancelled) => {
            warn!("Cancelled; output holds the records written so far");
            ExitCode::from(EXIT_CANCELLED)
        }
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

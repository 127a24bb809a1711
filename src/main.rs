//! schedsim demo driver
//!
//! Builds a small process table, exchanges a few messages, runs the
//! producer/consumer buffer and then drives the scheduler for a fixed number
//! of cycles, printing one line (or one JSON object) per event.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result as AnyhowResult};
use clap::Parser;
use env_logger::{Builder as LogBuilder, Env};
use log::{debug, info, warn, LevelFilter};

use schedsim::{CycleEvent, ProcessId, ProcessService, SimConfig};

/// Command-line arguments for the simulator
#[derive(Parser, Debug)]
#[command(name = "schedsim")]
#[command(about = "Discrete-cycle CPU scheduling and IPC simulator")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct SimArgs {
    /// JSON configuration file; flags below override its fields
    #[arg(long, short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    /// Scheduling algorithm: fcfs, sjf, priority or round_robin
    #[arg(long, short = 'a')]
    algorithm: Option<String>,

    /// Round-robin quantum in cycles
    #[arg(long, short = 'q')]
    quantum: Option<u32>,

    /// Memory pool size in MB
    #[arg(long)]
    total_memory: Option<u64>,

    /// Producer/consumer buffer capacity
    #[arg(long)]
    buffer_size: Option<usize>,

    /// Number of cycles to run
    #[arg(long, default_value_t = 30)]
    cycles: usize,

    /// Print events and statistics as JSON lines
    #[arg(long, action = clap::ArgAction::SetTrue)]
    json: bool,

    /// Verbose logging output
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Demo workload: (priority, memory MB, burst cycles)
const DEMO_PROCESSES: [(u32, u64, u32); 4] = [(3, 512, 5), (1, 256, 3), (2, 1024, 8), (1, 128, 2)];

fn main() -> AnyhowResult<()> {
    let args = SimArgs::parse();
    initialize_logging(args.verbose);

    let config = load_configuration(&args)?;
    debug!("effective configuration: {:?}", config);

    let mut service = ProcessService::new(config).context("invalid simulator configuration")?;
    info!("scheduler: {}", service.algorithm());

    let mut created = Vec::new();
    for (priority, memory, burst) in DEMO_PROCESSES {
        match service.create_process(priority, memory, burst) {
            Ok(process) => {
                report_line(args.json, &process, || {
                    format!(
                        "created process {} (priority {}, {} MB, burst {})",
                        process.pid, priority, memory, burst
                    )
                })?;
                created.push(process.pid);
            }
            Err(e) => warn!("could not create process: {}", e),
        }
    }

    match created[..] {
        [first, second, ..] => {
            run_messaging_demo(&service, first, second, args.json)?;
            run_buffer_demo(&service, first, second, args.json)?;
        }
        _ => warn!(
            "only {} demo process(es) fit in memory; skipping the IPC demos",
            created.len()
        ),
    }

    for _ in 0..args.cycles {
        let event = service.execute_cycle();
        let time = service.time();
        report_line(args.json, &event, || format_event(time, &event))?;
    }

    let stats = service.system_stats();
    report_line(args.json, &stats, || {
        format!(
            "t={} total={} running={} ready={} waiting={} terminated={}",
            stats.time,
            stats.total_processes,
            stats.running_processes,
            stats.ready_processes,
            stats.waiting_processes,
            stats.terminated_processes
        )
    })?;

    let resources = service.resources();
    report_line(args.json, &resources, || {
        format!(
            "memory {}/{} MB in use, cpu {}",
            resources.used_memory(),
            resources.total_memory,
            if resources.cpu_available { "free" } else { "busy" }
        )
    })?;

    Ok(())
}

/// Initialize logging from RUST_LOG (warnings by default); each -v raises the level
fn initialize_logging(verbosity: u8) {
    let mut builder = LogBuilder::from_env(Env::default().default_filter_or("warn"));
    let log_level = match verbosity {
        0 => None,
        1 => Some(LevelFilter::Info),
        2 => Some(LevelFilter::Debug),
        _ => Some(LevelFilter::Trace),
    };
    // -v wins over RUST_LOG
    if let Some(level) = log_level {
        builder.filter_level(level);
    }
    builder.format_timestamp_secs().init();
}

/// Merge the optional config file with command-line overrides
fn load_configuration(args: &SimArgs) -> AnyhowResult<SimConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse {}", path.display()))?
        }
        None => SimConfig::default(),
    };

    if let Some(algorithm) = &args.algorithm {
        config.algorithm = algorithm.clone();
    }
    if let Some(quantum) = args.quantum {
        config.quantum = quantum;
    }
    if let Some(total_memory) = args.total_memory {
        config.total_memory = total_memory;
    }
    if let Some(buffer_size) = args.buffer_size {
        config.buffer_capacity = buffer_size;
    }
    Ok(config)
}

fn run_messaging_demo(
    service: &ProcessService,
    first: ProcessId,
    second: ProcessId,
    json: bool,
) -> AnyhowResult<()> {
    service.send_message(first, second, &format!("hello from {}", first));
    service.send_message(second, first, "ack");
    service.send_message(first, second, "bye");

    for pid in [first, second] {
        while let Some(message) = service.receive_message(pid) {
            report_line(json, &message, || {
                format!(
                    "process {} received #{} from {}: {}",
                    pid, message.id, message.sender, message.content
                )
            })?;
        }
    }
    Ok(())
}

fn run_buffer_demo(
    service: &ProcessService,
    producer: ProcessId,
    consumer: ProcessId,
    json: bool,
) -> AnyhowResult<()> {
    service.register_producer(producer)?;
    service.register_consumer(consumer)?;

    let capacity = service.buffer().capacity();
    for n in 0..=capacity {
        let item = format!("item-{}", n);
        if !service.produce(&item)? {
            debug!("buffer full after {} items", n);
        }
    }
    while service.consume()?.is_some() {}

    for entry in service.buffer_logs() {
        report_line(json, &entry, || entry.to_string())?;
    }
    let status = service.buffer_status();
    report_line(json, &status, || {
        format!(
            "buffer {}/{} mutex={} empty={} full={}",
            status.items.len(),
            status.capacity,
            status.mutex_value,
            status.empty_slots,
            status.full_slots
        )
    })
}

fn format_event(time: u64, event: &CycleEvent) -> String {
    match event.process() {
        Some(p) => format!(
            "t={:<3} {:<18} pid={} state={} burst_left={} cpu_time={}",
            time,
            event.kind(),
            p.pid,
            p.state,
            p.burst_time,
            p.cpu_time
        ),
        None => format!("t={:<3} {}", time, event.kind()),
    }
}

/// Print `value` as a JSON line, or the human-readable line otherwise
fn report_line<T, F>(json: bool, value: &T, text: F) -> AnyhowResult<()>
where
    T: serde::Serialize,
    F: FnOnce() -> String,
{
    if json {
        println!("{}", serde_json::to_string(value)?);
    } else {
        println!("{}", text());
    }
    Ok(())
}

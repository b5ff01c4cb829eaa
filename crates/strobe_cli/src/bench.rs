//! The `strobe run` command: a sender wired straight into a receiver.

use std::error::Error;
use std::path::PathBuf;

use serde::Serialize;
use strobe_config::{BenchConfig, ResetSection};
use strobe_handshake::{
    drive_random, receive, reset, send, start_watchdog, Bus, Flit, Payload, ReceiveOptions,
    SendOptions,
};
use strobe_sim::{build_simulator, Clock, SimError, Signal};
use tracing::info;

use crate::check::resolve_config;
use crate::payload::{default_payload, parse_payload};
use crate::{GlobalArgs, RunArgs};

/// Outcome of one loopback run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BenchReport {
    /// Flits handed to the sender.
    pub sent: usize,
    /// Flits captured by the receiver.
    pub received: usize,
    /// Whether the captured flits equal the sent ones, in order.
    pub matched: bool,
    /// Simulated time when the run ended.
    pub final_time: String,
    /// Settle passes over the whole run.
    pub deltas: u64,
    /// The error that ended the run, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Captured flits, in arrival order.
    pub flits: Vec<Flit>,
}

impl BenchReport {
    /// True when every flit came through and nothing failed.
    pub fn passed(&self) -> bool {
        self.matched && self.error.is_none()
    }
}

/// Runs the `strobe run` command.
pub fn run(args: &RunArgs, global: &GlobalArgs) -> Result<i32, Box<dyn Error>> {
    let mut config = resolve_config(global)?;
    if let Some(seed) = args.seed {
        config.sim.seed = seed;
    }
    if let Some(path) = &args.waveform {
        config.sim.waveform = Some(PathBuf::from(path));
    }

    let payload = match &args.payload {
        Some(text) => parse_payload(text)?,
        None => default_payload(),
    };
    let lanes = args
        .lanes
        .unwrap_or_else(|| payload.flits().first().map_or(0, Flit::arity));

    if !global.quiet {
        eprintln!(
            "   Running loopback: {} flits, {} data lanes",
            payload.len(),
            lanes
        );
    }

    let report = run_loopback(&config, payload, lanes, args.fuzz_cycles)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !global.quiet || !report.passed() {
        print_report(&report);
    }

    Ok(if report.passed() { 0 } else { 1 })
}

fn print_report(report: &BenchReport) {
    let status = if report.passed() { "Passed" } else { "Failed" };
    eprintln!(
        "      {status} {}/{} flits at {} ({} deltas)",
        report.received, report.sent, report.final_time, report.deltas
    );
    if let Some(error) = &report.error {
        eprintln!("      {error}");
    }
    for (index, flit) in report.flits.iter().enumerate() {
        println!("flit {index}: {:?}", flit.values());
    }
}

/// Builds the bench from `config` and exchanges `payload` over `lanes` data signals.
///
/// With no lanes bound every flit travels as an empty placeholder. Failures
/// inside the simulation land in the report; only bench setup errors are
/// returned.
pub fn run_loopback(
    config: &BenchConfig,
    payload: Payload,
    lanes: usize,
    fuzz_cycles: Option<u64>,
) -> Result<BenchReport, Box<dyn Error>> {
    let payload = if lanes == 0 {
        payload.iter().map(|_| Flit::empty()).collect()
    } else {
        payload
    };

    let mut sim = build_simulator(&config.sim_config()?)?;
    let width = config.handshake.data_width;
    let clk = sim.signal("clk", 1)?;
    let rst_n = sim.signal("rst_n", 1)?;
    let data = (0..lanes)
        .map(|i| sim.signal(format!("data{i}"), width))
        .collect::<Result<Vec<_>, _>>()?;
    let bus = Bus::new()
        .with_data(data)
        .with_valid(sim.signal("valid", 1)?)
        .with_ready(sim.signal("ready", 1)?)
        .with_last(sim.signal("last", 1)?);

    Clock::new(clk.clone(), config.clock.period, config.clock.unit)?
        .start(config.clock.start_high);
    if let Some(watchdog) = &config.watchdog {
        start_watchdog(&sim.handle(), watchdog.delay, watchdog.unit);
    }
    if let Some(cycles) = fuzz_cycles {
        let fuzz = sim.signal("fuzz", width)?;
        sim.spawn("fuzz", drive_random(fuzz, clk.clone(), cycles));
    }

    let sent = payload.len();
    let expected = payload.clone();
    let outcome = sim.run(exchange(
        Link {
            clk,
            rst_n,
            bus,
            reset: config.reset.clone(),
        },
        payload,
        config.send_options(),
        config.receive_options(),
    ));

    let summary = sim.summary();
    let (received, error) = match outcome {
        Ok(flits) => (flits, None),
        Err(err) => (Vec::new(), Some(err.to_string())),
    };
    let report = BenchReport {
        sent,
        received: received.len(),
        matched: expected.flits() == received.as_slice(),
        final_time: summary.final_time.to_string(),
        deltas: summary.total_deltas,
        error,
        flits: received,
    };
    info!(
        sent = report.sent,
        received = report.received,
        matched = report.matched,
        "loopback finished"
    );
    Ok(report)
}

struct Link {
    clk: Signal,
    rst_n: Signal,
    bus: Bus,
    reset: ResetSection,
}

/// Pulses reset, then runs the sender as a sibling while the test receives.
async fn exchange(
    link: Link,
    payload: Payload,
    send_options: SendOptions,
    receive_options: ReceiveOptions,
) -> Result<Vec<Flit>, SimError> {
    let Link {
        clk,
        rst_n,
        bus,
        reset: pulse,
    } = link;
    reset(rst_n, pulse.delay, pulse.unit, pulse.active_low).await?;

    let sender = clk
        .sim()
        .spawn("send", send(payload, clk.clone(), bus.clone(), send_options));
    let flits = receive(clk, bus, receive_options).await?;
    sender.await?;
    Ok(flits)
}

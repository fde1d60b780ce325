use std::io::{self, Write};
use std::sync::Arc;

use clap::Parser;
use crossterm::execute;
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use rand_chacha::ChaCha20Rng;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use vdf_beacon::beacon::{
    BeaconOrchestrator, BeaconOutput, EntropyContributor, EscrowLedger, MemoryLedger,
    ParticipantId,
};
use vdf_beacon::config::BeaconConfig;
use vdf_beacon::primitives::{round_stream, RandomPrimes, SecureRng};
use vdf_beacon::DropoutPolicy;

#[derive(Parser, Debug)]
#[command(name = "beacon")]
#[command(about = "Runs rounds of the delay-function random beacon", long_about = None)]
#[command(version)]
struct Args {
    /// Bit length of each modulus prime
    #[arg(short, long)]
    bits: Option<u64>,

    /// Number of sequential squarings
    #[arg(short = 't', long)]
    delay: Option<u64>,

    /// Contributors per round
    #[arg(short, long)]
    participants: Option<usize>,

    /// Exclude dropouts while at least this many participants remain
    #[arg(long)]
    min_participants: Option<usize>,

    /// Squarings between progress reports, 0 disables them
    #[arg(short, long)]
    checkpoint: Option<u64>,

    /// Number of rounds to run concurrently
    #[arg(short, long, default_value = "1")]
    rounds: u64,

    /// Seed for reproducible runs; omitted means OS entropy
    #[arg(short, long, env = "BEACON_SEED")]
    seed: Option<u64>,

    /// Enable metrics endpoint
    #[arg(long, env = "METRICS_ENABLED", default_value = "false")]
    metrics: bool,

    /// Metrics port
    #[arg(long, env = "METRICS_PORT")]
    metrics_port: Option<u16>,
}

impl Args {
    fn apply(&self, config: &mut BeaconConfig) {
        if let Some(bits) = self.bits {
            config.round.modulus_bits = bits;
        }
        if let Some(delay) = self.delay {
            config.round.delay = delay;
        }
        if let Some(checkpoint) = self.checkpoint {
            config.round.checkpoint = checkpoint;
        }
        if let Some(participants) = self.participants {
            config.participants = participants;
        }
        if let Some(min_participants) = self.min_participants {
            config.round.dropout = DropoutPolicy::Exclude { min_participants };
        }
        if self.metrics {
            config.metrics.enabled = true;
        }
        if let Some(port) = self.metrics_port {
            config.metrics.port = port;
        }
    }
}

fn print_colored(color: Color, text: &str) {
    let mut stdout = io::stdout();
    execute!(stdout, SetForegroundColor(color), Print(text), ResetColor).ok();
    stdout.flush().ok();
}

fn println_colored(color: Color, text: &str) {
    print_colored(color, text);
    println!();
}

fn display_banner() {
    println!();
    println_colored(
        Color::Cyan,
        "+---------------------------------------------------------+",
    );
    println_colored(
        Color::Cyan,
        "|            Delay-Function Random Beacon                 |",
    );
    println_colored(
        Color::Cyan,
        "+---------------------------------------------------------+",
    );
    println!();
}

fn display_output(output: &BeaconOutput) {
    println_colored(Color::Green, &format!("Round {} finalized", output.round));
    let ids: Vec<String> = output.participants.iter().map(ToString::to_string).collect();
    println_colored(Color::White, &format!("  Participants: {}", ids.join(" ")));
    if !output.excluded.is_empty() {
        let excluded: Vec<String> = output.excluded.iter().map(ToString::to_string).collect();
        println_colored(
            Color::Yellow,
            &format!("  Excluded: {}", excluded.join(" ")),
        );
    }
    println_colored(
        Color::White,
        &format!("  Combined: {:x}", output.combined),
    );
    println_colored(
        Color::White,
        &format!("  Modulus: {:x}", output.params.modulus()),
    );
    println_colored(Color::White, &format!("  Base: {:x}", output.params.base()));
    println_colored(
        Color::White,
        &format!("  Delay: {} squarings -> {:x}", output.delay, output.delay_output),
    );
    let t = &output.timings;
    println_colored(
        Color::White,
        &format!(
            "  Timings: collect {:?}, combine {:?}, setup {:?}, compute {:?}, verify {:?}, finalize {:?}",
            t.collect, t.combine, t.setup, t.compute, t.verify, t.finalize
        ),
    );
    println_colored(Color::Magenta, &format!("  Randomness: {}", output.randomness));
    println!();
}

/// Builds the random sources of one round: prime generation, delay base and
/// one per contributor.
fn round_rngs(
    seed: Option<u64>,
    round: u64,
    participants: usize,
) -> vdf_beacon::Result<Vec<ChaCha20Rng>> {
    let mut entropy = SecureRng::new();
    (0..participants as u64 + 2)
        .map(|component| match seed {
            Some(seed) => round_stream(seed, round, component),
            None => entropy.fork(),
        })
        .collect()
}

fn run_round(
    config: &BeaconConfig,
    round: u64,
    seed: Option<u64>,
    ledger: Arc<dyn EscrowLedger>,
) -> vdf_beacon::Result<BeaconOutput> {
    let mut rngs = round_rngs(seed, round, config.participants)?.into_iter();
    let (Some(prime_rng), Some(base_rng)) = (rngs.next(), rngs.next()) else {
        return Err(vdf_beacon::Error::InvalidParameter(
            "missing round randomness".to_string(),
        ));
    };

    let mut orchestrator = BeaconOrchestrator::new(
        config.round.clone(),
        round,
        RandomPrimes::new(prime_rng),
        base_rng,
    )?
    .with_ledger(ledger);
    if config.round.checkpoint != 0 {
        orchestrator = orchestrator.with_progress(move |done, total| {
            println_colored(
                Color::DarkGrey,
                &format!("  Round {round}: {done}/{total} squarings"),
            );
        });
    }

    for (id, rng) in (0u32..).zip(rngs) {
        orchestrator.register(EntropyContributor::new(ParticipantId(id), rng))?;
    }

    orchestrator.run()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    display_banner();

    let mut config = BeaconConfig::from_env().unwrap_or_else(|e| {
        error!("Failed to load configuration: {e}");
        info!("Using default configuration");
        BeaconConfig::default()
    });
    args.apply(&mut config);

    if let Err(e) = config.validate() {
        println_colored(Color::Red, &format!("Configuration validation failed: {e}"));
        return Err(format!("Invalid configuration: {e}").into());
    }

    if config.metrics.enabled {
        let metrics_addr = config.metrics.addr()?;
        match metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(metrics_addr)
            .install()
        {
            Ok(()) => info!("Metrics server started on {metrics_addr}"),
            Err(e) => error!("Failed to start metrics server: {e}"),
        }
    }

    println_colored(
        Color::White,
        &format!(
            "  Rounds: {}, participants: {}, prime bits: {}, delay: {}",
            args.rounds, config.participants, config.round.modulus_bits, config.round.delay
        ),
    );
    println_colored(
        Color::White,
        &format!("  Dropout policy: {:?}", config.round.dropout),
    );
    if let Some(seed) = args.seed {
        println_colored(Color::Yellow, &format!("  Seeded run ({seed}), not for production"));
    }
    println!();

    let config = Arc::new(config);
    let ledger = Arc::new(MemoryLedger::new());

    let handles: Vec<_> = (1..=args.rounds)
        .map(|round| {
            let config = config.clone();
            let ledger: Arc<dyn EscrowLedger> = ledger.clone();
            let seed = args.seed;
            tokio::task::spawn_blocking(move || run_round(&config, round, seed, ledger))
        })
        .collect();

    let mut failures = 0usize;
    for (round, handle) in (1u64..).zip(handles) {
        match handle.await {
            Ok(Ok(output)) => display_output(&output),
            Ok(Err(e)) => {
                failures += 1;
                println_colored(Color::Red, &format!("Round {round} failed: {e}"));
            }
            Err(e) => {
                failures += 1;
                println_colored(Color::Red, &format!("Round {round} panicked: {e}"));
            }
        }
    }

    println_colored(
        Color::Cyan,
        &format!(
            "Ledger: {} deposits, {} slashed participants",
            ledger.deposits().len(),
            ledger.slashed().len()
        ),
    );
    println!();

    if failures > 0 {
        return Err(format!("{failures} of {} rounds failed", args.rounds).into());
    }
    Ok(())
}

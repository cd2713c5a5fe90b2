//! accrue-sim: drives the incentives engine through a run of epochs against
//! in-memory bank, lock, pool and epoch registries.
//!
//! Startup sequence:
//!   1. Open (or create) the gauge store
//!   2. Load params, then either import a genesis file or seed a scenario
//!   3. Advance the distribution epoch, growing pool volumes as it goes
//!   4. Report balances and optionally export the final state

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{TimeZone, Utc};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use accrue_core::constants::INCENTIVES_MODULE_NAME;
use accrue_core::epoch::EpochInfo;
use accrue_core::params::Params;
use accrue_core::types::{AccountId, Timestamp};
use accrue_incentives::memory::{MemoryBank, MemoryEpochs, MemoryLocks, MemoryPools};
use accrue_incentives::{GenesisState, Keeper};
use accrue_state::GaugeStore;

mod scenario;

use scenario::{LoggingHooks, Scenario};

#[derive(Parser, Debug)]
#[command(
    name = "accrue-sim",
    version,
    about = "Epoch-by-epoch simulation of gauge reward distribution"
)]
struct Args {
    /// Directory for the gauge store. A throwaway store is used if omitted.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Path to a params JSON file. Missing fields take their defaults.
    #[arg(long)]
    params: Option<PathBuf>,

    /// Genesis JSON to import instead of seeding a scenario.
    #[arg(long)]
    genesis: Option<PathBuf>,

    /// Write the final state as genesis JSON to this path.
    #[arg(long)]
    export: Option<PathBuf>,

    /// Number of distribution epochs to run.
    #[arg(long, default_value_t = 7)]
    epochs: u64,

    /// Length of the distribution epoch in seconds.
    #[arg(long, default_value_t = 86_400)]
    epoch_secs: u64,

    /// Pools in the seeded scenario.
    #[arg(long, default_value_t = 3)]
    pools: u64,

    /// Lock holders in the seeded scenario.
    #[arg(long, default_value_t = 5)]
    lockers: u8,

    /// RNG seed for lock sizes and volume growth.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Unix time of the first epoch. Defaults to now.
    #[arg(long)]
    start: Option<Timestamp>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,accrue=debug")),
        )
        .init();

    let args = Args::parse();
    info!("accrue simulator starting");

    // ── Gauge store ───────────────────────────────────────────────────────────
    let store = match &args.data_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating data dir {}", dir.display()))?;
            GaugeStore::open(dir).context("opening gauge store")?
        }
        None => GaugeStore::temporary().context("opening temporary gauge store")?,
    };
    let store = Arc::new(store);

    // ── Params and epoch clock ────────────────────────────────────────────────
    let genesis = match &args.genesis {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading genesis {}", path.display()))?;
            Some(GenesisState::from_json(&json).context("parsing genesis")?)
        }
        None => None,
    };
    let params = match &genesis {
        Some(g) => g.params.clone(),
        None => load_params(args.params.as_deref())?,
    };
    let start = args.start.unwrap_or_else(|| Utc::now().timestamp());
    let epoch_duration = Duration::from_secs(args.epoch_secs.max(1));

    let module = AccountId::module(INCENTIVES_MODULE_NAME);
    let bank = Arc::new(MemoryBank::new(module));
    let locks = Arc::new(MemoryLocks::new());
    let longest = params
        .lockable_durations
        .iter()
        .max()
        .copied()
        .unwrap_or(epoch_duration);
    let pools = Arc::new(MemoryPools::new(longest));
    let epochs = Arc::new(MemoryEpochs::new());
    epochs.set(EpochInfo {
        identifier: params.distr_epoch_identifier.clone(),
        duration: epoch_duration,
        current_epoch: 0,
        current_epoch_start_time: start,
    });

    let keeper = Keeper::new(
        Arc::clone(&store),
        bank.clone(),
        locks.clone(),
        pools.clone(),
        epochs.clone(),
    )
    .with_hooks(Arc::new(LoggingHooks));

    // ── Genesis or seeded scenario ────────────────────────────────────────────
    let rng = StdRng::seed_from_u64(args.seed);
    let mut scenario = Scenario::new(&keeper, &bank, &locks, &pools, rng);
    if let Some(genesis) = &genesis {
        keeper.init_genesis(genesis, start).context("importing genesis")?;
    } else {
        keeper.set_params(&params).context("storing params")?;
        scenario
            .seed(args.pools, args.lockers, args.epochs, start)
            .context("seeding scenario")?;
    }

    if let Some(first_locker) = scenario.lockers().first() {
        let estimate = keeper
            .rewards_est(first_locker, &[], args.epochs as i64, start)
            .context("estimating rewards")?;
        info!(account = %first_locker, %estimate, "estimated rewards over the run");
    }

    // ── Epoch loop ────────────────────────────────────────────────────────────
    let identifier = keeper.params()?.distr_epoch_identifier;
    for _ in 0..args.epochs {
        let number = epochs.advance(&identifier)?;
        let now = keeper.epoch_info()?.current_epoch_start_time;
        scenario.grow_volumes();

        keeper.before_epoch_start(&identifier, number)?;
        let summary = keeper
            .after_epoch_end(&identifier, number, now)
            .with_context(|| format!("running epoch {}", number))?;
        info!(
            epoch = number,
            at = %format_time(now),
            promoted = summary.promoted.len(),
            distributed = %summary.distributed,
            allocated = %summary.allocated,
            "epoch done"
        );
    }

    // ── Report ────────────────────────────────────────────────────────────────
    for account in scenario.lockers() {
        info!(%account, balance = %bank.balance(account), "locker balance");
    }
    info!(
        to_distribute = %keeper.module_to_distribute_coins()?,
        distributed = %keeper.module_distributed_coins()?,
        schedules = pools.schedules().len(),
        "run complete"
    );

    if let Some(path) = &args.export {
        let json = keeper.export_genesis()?.to_json()?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "state exported");
    }
    store.flush().context("flushing gauge store")?;
    Ok(())
}

fn load_params(path: Option<&Path>) -> anyhow::Result<Params> {
    match path {
        Some(p) => {
            let json = std::fs::read_to_string(p)
                .with_context(|| format!("reading params {}", p.display()))?;
            Params::from_json(&json).context("parsing params")
        }
        None => Ok(Params {
            distr_epoch_identifier: "day".into(),
            ..Params::default()
        }),
    }
}

fn format_time(ts: Timestamp) -> String {
    Utc.timestamp_opt(ts, 0)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}

mod manifest;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use worldforge_common::{InstanceHandle, TemplateId};
use worldforge_factory::{
    FactoryEvent, FactorySettings, MeteringPolicy, SpawnRequest, StepMeter, WorldFactory,
};
use worldforge_kernel::{Ledger, Template, WorldDispatch};
use worldforge_tools::LedgerInspector;

use crate::manifest::Manifest;

#[derive(Parser)]
#[command(name = "worldforge-cli", about = "CLI tool for worldforge operations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and crate info
    Info,
    /// Spawn "TestWorld" with component Foo and system Bar from template 0x420
    Demo {
        /// Step budget for the spawn; too small a budget shows the rollback
        #[arg(short, long)]
        budget: Option<u64>,
    },
    /// Declare templates and spawn worlds described by a JSON manifest
    Spawn {
        /// Path to the manifest file
        manifest: PathBuf,
        /// Override the manifest's metering with this step limit
        #[arg(long)]
        step_limit: Option<u64>,
        /// Print spawned worlds as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match cli.command {
        Commands::Info => {
            println!("worldforge-cli v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "metering: {:?}",
                FactorySettings::default().metering
            );
            println!("{}", LedgerInspector::summary(&Ledger::new()));
        }
        Commands::Demo { budget } => run_demo(budget)?,
        Commands::Spawn {
            manifest,
            step_limit,
            json,
        } => run_manifest(&manifest, step_limit, json)?,
    }

    Ok(())
}

fn run_demo(budget: Option<u64>) -> anyhow::Result<()> {
    let world_template = TemplateId(0x420);
    let executor = InstanceHandle(0x69);

    let mut ledger = Ledger::new();
    ledger.declare_at(world_template, Template::world("world"))?;
    let foo = ledger.declare(Template::component("Foo"));
    let bar = ledger.declare(Template::system("Bar"));

    let mut factory = WorldFactory::with_config(world_template, executor, FactorySettings::default())?;
    println!(
        "Factory: world_template={} executor={}",
        factory.world_template()?,
        factory.executor()?
    );

    let request = SpawnRequest::new("TestWorld")
        .with_components([foo])
        .with_systems([bar]);
    let result = match budget {
        Some(steps) => factory.spawn_metered(&mut ledger, &request, StepMeter::steps(steps)),
        None => factory.spawn(&mut ledger, &request),
    };

    match result {
        Ok(handle) => {
            println!(
                "Spawned {handle}: Foo -> {:?}, Bar -> {:?}",
                ledger.resolve_component(handle, "Foo"),
                ledger.resolve_system(handle, "Bar")
            );
            if let Some(info) = LedgerInspector::inspect_world(&ledger, handle) {
                print!("{info}");
            }
        }
        Err(err) => println!("Spawn failed and was rolled back: {err}"),
    }

    print_events(&mut factory);
    println!("{}", LedgerInspector::summary(&ledger));
    Ok(())
}

fn run_manifest(path: &Path, step_limit: Option<u64>, json: bool) -> anyhow::Result<()> {
    let mut manifest = Manifest::load(path)?;
    if let Some(step_limit) = step_limit {
        manifest.settings.metering = MeteringPolicy::Metered {
            step_limit,
            cost_per_registration: 1,
        };
    }

    let mut ledger = Ledger::new();
    let mut factory = manifest.build(&mut ledger)?;
    let requests = manifest.requests(&ledger)?;
    tracing::info!(spawns = requests.len(), path = %path.display(), "manifest loaded");

    let mut spawned = Vec::new();
    for request in &requests {
        match factory.spawn(&mut ledger, request) {
            Ok(handle) => {
                println!("{}: spawned at {handle}", request.name);
                spawned.push(handle);
            }
            Err(err) => println!("{}: failed: {err}", request.name),
        }
    }

    let infos: Vec<_> = spawned
        .iter()
        .filter_map(|h| LedgerInspector::inspect_world(&ledger, *h))
        .collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&infos)?);
    } else {
        for info in &infos {
            print!("{info}");
        }
    }

    print_events(&mut factory);
    println!("{}", LedgerInspector::summary(&ledger));
    Ok(())
}

fn print_events(factory: &mut WorldFactory) {
    for event in factory.drain_events() {
        match event {
            FactoryEvent::WorldCreated { handle } => println!("event: WorldCreated {{ handle: {handle} }}"),
        }
    }
}

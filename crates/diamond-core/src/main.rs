//! `diamond-cut` command line: selector lookup, offline planning and a local demo upgrade

use anyhow::{bail, Context};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use diamond_core::fixtures::{
    character_interface, character_v2_interface, cut_interface, loupe_interface,
};
use diamond_core::{
    InitRequest, LocalDeployer, ModuleRequest, UpgradeConfig, UpgradeOrchestrator, UpgradeReport,
    UpgradeRequest,
};
use diamond_cut::{CutPlanner, UpgradeTarget};
use diamond_kernel::{InitError, LocalAuthority, OperatorId};
use diamond_selector::{canonicalize, ModuleAddress, ModuleInterface, Selector};
use diamond_table::{DispatchTable, StagedTable, TableSnapshot};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Command::new("diamond-cut")
        .version(diamond_core::VERSION)
        .about("Plan and run facet dispatch table upgrades")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .subcommand(
            Command::new("selectors")
                .about("Print canonical forms and selectors of signatures")
                .arg(
                    Arg::new("signatures")
                        .required(true)
                        .num_args(1..)
                        .help("Function signatures, e.g. 'transfer(address to, uint256 amount)'"),
                ),
        )
        .subcommand(
            Command::new("plan")
                .about("Plan the cuts from a table snapshot to a target")
                .arg(
                    Arg::new("target")
                        .long("target")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON upgrade target"),
                )
                .arg(
                    Arg::new("snapshot")
                        .long("snapshot")
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON table snapshot (empty table if omitted)"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("demo")
                .about("Run the loupe, character and purge upgrades against a local table")
                .arg(
                    Arg::new("address-book")
                        .long("address-book")
                        .value_parser(value_parser!(PathBuf))
                        .help("Persist deployments to this JSON file"),
                )
                .arg(
                    Arg::new("audit-log")
                        .long("audit-log")
                        .value_parser(value_parser!(PathBuf))
                        .help("Mirror audit records to this JSON-lines file"),
                ),
        );

    let matches = cli.get_matches();
    let config = load_config(&matches)?;

    match matches.subcommand() {
        Some(("selectors", args)) => print_selectors(args),
        Some(("plan", args)) => print_plan(&config, args),
        Some(("demo", args)) => run_demo(config, args).await,
        _ => bail!("unknown subcommand"),
    }
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<UpgradeConfig> {
    match matches.get_one::<PathBuf>("config") {
        Some(path) => UpgradeConfig::load(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(UpgradeConfig::new()),
    }
}

fn print_selectors(args: &ArgMatches) -> anyhow::Result<()> {
    for signature in args.get_many::<String>("signatures").into_iter().flatten() {
        let canonical = canonicalize(signature)?;
        println!("{}  {canonical}", Selector::from_canonical(&canonical));
    }
    Ok(())
}

fn print_plan(config: &UpgradeConfig, args: &ArgMatches) -> anyhow::Result<()> {
    let target_path = args
        .get_one::<PathBuf>("target")
        .context("--target is required")?;
    let target: UpgradeTarget = read_json(target_path)?;
    let target = target.with_protected(config.protected_selectors()?);

    let snapshot: TableSnapshot = match args.get_one::<PathBuf>("snapshot") {
        Some(path) => read_json(path)?,
        None => TableSnapshot::default(),
    };

    let plan = CutPlanner::with_extractor(config.extractor()?).plan(&snapshot, &target)?;

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else if plan.is_empty() {
        println!("Table already matches the target");
    } else {
        println!("Plan against revision {}:", plan.base_revision());
        for cut in plan.cuts() {
            println!("  {cut}");
        }
    }
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

async fn run_demo(mut config: UpgradeConfig, args: &ArgMatches) -> anyhow::Result<()> {
    if let Some(path) = args.get_one::<PathBuf>("address-book") {
        config = config.with_address_book(path);
    }
    if let Some(path) = args.get_one::<PathBuf>("audit-log") {
        config = config.with_audit_log(path);
    }

    let owner = OperatorId::new(config.operator.clone());
    let authority = Arc::new(LocalAuthority::new(Arc::new(DispatchTable::new()), owner));
    let init_address = ModuleAddress::derive(b"CharacterInit");
    authority.register_initializer(
        init_address,
        Arc::new(|staged: &StagedTable, calldata: &[u8]| {
            if calldata.is_empty() {
                return Err(InitError::new("missing migration version"));
            }
            tracing::info!(routes = staged.len(), version = calldata[0], "Migrating characters");
            Ok(())
        }),
    );

    let orchestrator = UpgradeOrchestrator::new(
        config,
        authority.clone(),
        Arc::new(LocalDeployer::new(b"demo".to_vec())),
    )?;
    println!(
        "Network {} at {}",
        orchestrator.config().network.name,
        orchestrator.endpoint().unwrap_or("<no endpoint>")
    );

    println!("1. Diamond cut and loupe facets");
    let report = orchestrator
        .run(
            UpgradeRequest::new()
                .with_module(ModuleRequest::deploy(cut_interface()))
                .with_module(ModuleRequest::deploy(loupe_interface())),
        )
        .await?;
    print_report(&report);

    println!("2. Character facet");
    let report = orchestrator
        .run(UpgradeRequest::new().with_module(ModuleRequest::deploy(character_interface())))
        .await?;
    print_report(&report);

    println!("3. Character facet v2 with migration");
    let report = orchestrator
        .run(
            UpgradeRequest::new()
                .with_module(ModuleRequest::deploy(character_v2_interface()).superseding_previous())
                .with_init(InitRequest::at(
                    ModuleInterface::new("CharacterInit", ["init(bytes)"]),
                    init_address,
                    vec![2],
                )),
        )
        .await?;
    print_report(&report);

    println!("4. Purge everything but the cut and loupe entry points");
    let report = orchestrator.run(UpgradeRequest::new().purging_all()).await?;
    print_report(&report);

    println!("Final table revision {}:", authority.table().revision());
    for (selector, module) in authority.table().snapshot().iter() {
        println!("  {selector} -> {module}");
    }
    println!("Audit records: {}", orchestrator.audit_log().len());
    Ok(())
}

fn print_report(report: &UpgradeReport) {
    println!("   transaction {} ({})", report.transaction_id, report.reference);
    for module in &report.modules {
        println!("   {} v{} at {}", module.name, module.version, module.address);
    }
    for cut in report.plan.cuts() {
        println!("   {cut}");
    }
    for warning in &report.warnings {
        println!("   warning: {warning}");
    }
}

use anyhow::Result;
use bridge_launcher::{
    exit_status, prepare_env, BridgePaths, BridgeSettings, Identifier, Launcher,
    LauncherConfigManager,
};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Sovereign Bridge Launcher
///
/// Writes the wallet, proxy and contract addresses into the bridge server's
/// .env file, then builds the server and runs it in the foreground.
#[derive(Parser)]
#[command(name = "bridge-launcher")]
#[command(about = "Configure, build and run the sovereign bridge service")]
#[command(version)]
struct Args {
    /// Path to the wallet PEM file (WALLET_PATH)
    #[arg(value_name = "WALLET_PATH")]
    wallet: String,

    /// MultiversX proxy URL (MULTIVERSX_PROXY)
    #[arg(value_name = "PROXY_URL")]
    proxy: String,

    /// ESDT safe contract address (ESDT_SAFE_SC_ADDRESS)
    #[arg(value_name = "ESDT_SAFE_ADDRESS")]
    esdt_safe_address: String,

    /// Multisig contract address (MULTISIG_SC_ADDRESS)
    #[arg(value_name = "MULTISIG_ADDRESS")]
    multisig_address: String,

    /// Bridge service directory
    ///
    /// If not provided, the directory is found next to the mx-chain-go
    /// checkout containing the current working directory.
    #[arg(long)]
    bridge_dir: Option<PathBuf>,

    /// Launcher settings file (defaults to ./bridge-launcher.json if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Fail when one of the identifiers is missing from the env file
    #[arg(long)]
    strict: bool,

    /// Only rewrite the env file; skip build and run
    #[arg(long)]
    patch_only: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("bridge_launcher=info")),
        )
        .init();

    let args = Args::parse();

    let (code, message) = exit_status(&run(args).await);
    if let Some(message) = message {
        println!("{message}");
    }
    ExitCode::from(code)
}

async fn run(args: Args) -> Result<()> {
    let config = match args.config {
        Some(path) => LauncherConfigManager::from_file(path)?,
        None => LauncherConfigManager::new(None)?,
    }
    .into_config();

    let paths = match args.bridge_dir {
        Some(ref dir) => BridgePaths::from_bridge_dir(dir, &config)?,
        None => BridgePaths::from_working_dir(&std::env::current_dir()?, &config)?,
    };
    tracing::info!("env file: {:?}", paths.env_file);

    let settings = BridgeSettings::new(
        &args.wallet,
        &args.proxy,
        &args.esdt_safe_address,
        &args.multisig_address,
    );
    let strict = args.strict || config.strict_identifiers;
    let report = prepare_env(&paths, &settings, strict)?;
    let total = Identifier::ALL.len();
    println!(
        "📝 Updated {} ({} of {total} keys found)",
        paths.env_file.display(),
        total - report.missing().len()
    );

    if args.patch_only {
        return Ok(());
    }

    let launcher = Launcher::from_config(&paths, &config);
    launcher.launch(|event| println!("{event}")).await?;
    Ok(())
}

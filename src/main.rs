//! deskhand CLI entry point

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "deskhand")]
#[command(about = "Autonomous desktop AI agent - files, browser, spreadsheets")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize deskhand configuration
    Onboard,

    /// Chat with the agent
    Chat {
        /// Single message to send; omit for interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Show configuration status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Double Ctrl+C to exit; a single press is easy to fat-finger while
    // the agent is mid-task.
    let exit_flag = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let r = exit_flag.clone();
    ctrlc::set_handler(move || {
        if r.load(std::sync::atomic::Ordering::SeqCst) {
            println!("\nBye!");
            std::process::exit(0);
        } else {
            println!("\nPress Ctrl+C again to exit");
            r.store(true, std::sync::atomic::Ordering::SeqCst);

            let r2 = r.clone();
            std::thread::spawn(move || {
                std::thread::sleep(std::time::Duration::from_secs(3));
                r2.store(false, std::sync::atomic::Ordering::SeqCst);
            });
        }
    })
    .ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Onboard => {
            println!("Setting up deskhand...");
            deskhand::config::onboard()?;
            println!("Ready. Chat with: deskhand chat -m \"list files on desktop\"");
        }

        Commands::Chat { message } => {
            let config = deskhand::config::load()?;
            let mut session = deskhand::session::Session::new(config);

            if let Some(msg) = message {
                let answer = session.run_once(&msg).await?;
                println!("\n{}", answer);
                session.shutdown().await;
            } else {
                session.run_interactive().await?;
            }
        }

        Commands::Status => {
            let path = deskhand::config::config_path();
            match deskhand::config::load() {
                Ok(config) => {
                    println!("Config: {}", path.display());
                    println!("Fast model:  {}", config.fast_model);
                    println!("Smart model: {} (cap {}/day)", config.smart_model, config.smart_daily_cap);
                    println!("Output dir:  {}", config.output_dir.display());
                    println!("Bridge port: {}", config.bridge_port);
                }
                Err(e) => {
                    println!("Not configured ({}).", e);
                    println!("Run: deskhand onboard");
                }
            }
        }
    }

    Ok(())
}

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use lifeplan::api::{ServeConfig, run_http_server};
use lifeplan::cli::{Cli, Command, run_cashflow, run_retirement};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Serve { port, store } => {
            let config = ServeConfig {
                port,
                store_path: store,
            };
            if let Err(e) = run_http_server(config).await {
                eprintln!("Server error: {e}");
                std::process::exit(1);
            }
            return;
        }
        Command::Cashflow(args) => {
            run_cashflow(&args, &mut std::io::stdout().lock(), &mut std::io::stderr())
        }
        Command::Retirement(args) => {
            run_retirement(&args, &mut std::io::stdout().lock(), &mut std::io::stderr())
        }
    };
    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

mod game;

use std::path::PathBuf;

use boardroom::prelude::*;
use clap::Parser;

use crate::game::TicTacToe;

/// Tic-tac-toe on a Boardroom server. Seat the built-in `random` agent
/// to play against the machine.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Address to listen on. Overrides the config file.
    #[arg(long)]
    bind: Option<String>,

    /// TOML server config.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), BoardroomError> {
    init_tracing();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    tracing::info!(bind = %config.bind, "starting tic-tac-toe server");

    let server = BoardroomServer::builder()
        .config(config)
        .game(TicTacToe)
        .build()
        .await?;

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}

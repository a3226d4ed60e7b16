use std::process::ExitCode;

use clap::Parser;
use log::info;

use dnc_server::config::{Cli, Settings};
use dnc_server::error::ServerError;
use dnc_server::protocol::DncProtocol;
use dnc_server::server::Server;
use dnc_server::{logging, RFC};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.rfc {
        print!("{RFC}");
        return ExitCode::SUCCESS;
    }

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<(), ServerError> {
    let settings = Settings::load(cli)?;
    logging::init(settings.verbose, &settings.log_file)?;

    info!("Starting server");
    let protocol = DncProtocol::new(settings.file_request_ttl);
    let server = Server::bind(settings.address(), protocol)?;
    server.run_forever(settings.poll_interval).await?;
    info!("Server is closed");

    Ok(())
}

#[macro_use] extern crate log;
extern crate env_logger;

use async_std::channel;
use async_std::task;
use clap::Parser;

use loadwaves::config::{ CliArgs, ConfigError, OutputKind, Settings };
use loadwaves::overlay::{ JsonLinesSink, LogSink };
use loadwaves::runtime;
use loadwaves::stats::websocket::WebSocketTransport;

fn main() -> Result<(), ConfigError> {
    let args = CliArgs::parse();
    let settings = Settings::resolve(&args)?;

    env_logger::Builder::new()
        .filter_level(settings.log_level)
        .parse_default_env()
        .init();

    let (shutdown_sender, shutdown_receiver) = channel::bounded(1);
    if let Err(err) = ctrlc::set_handler(move || {
        let _ = shutdown_sender.try_send(());
    }) {
        warn!("Could not install Ctrl-C handler: {}", err);
    }

    info!("Streaming stats from {} at {} fps", settings.endpoint, settings.frame_rate);

    let mut transport = WebSocketTransport;
    task::block_on(async {
        match settings.output {
            OutputKind::Log => runtime::run(&settings, &mut transport, LogSink::new(), shutdown_receiver).await,
            OutputKind::Json => runtime::run(&settings, &mut transport, JsonLinesSink::new(std::io::stdout()), shutdown_receiver).await,
        }
    });

    Ok(())
}

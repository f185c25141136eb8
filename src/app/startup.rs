//! Binary startup and the stdin processing loop

use super::cli::Args;
use super::records::{format_record, parse_record};
use crate::barrier::api::{
    BarrierConfig, BarrierResult, ChannelRef, Message, MessageBarrierHandler, QueueChannel,
    SequenceSizeCompletion,
};
use crate::core::error_handling::log_error_with_context;
use crate::core::logging::{init_logging, level_for_verbosity, LogFormat};
use crate::core::shutdown::ShutdownCoordinator;
use clap::Parser;
use colored::Colorize;
use std::io::IsTerminal;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

const CHANNEL_CAPACITY: usize = 1024;

/// Parse arguments, run to completion and return the process exit code
pub fn startup() -> i32 {
    let args = Args::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: unable to start async runtime: {}", e);
            return 1;
        }
    };

    runtime.block_on(run(args))
}

async fn run(args: Args) -> i32 {
    let use_color = (args.color || std::io::stdout().is_terminal()) && !args.no_color;
    colored::control::set_override(use_color);

    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| level_for_verbosity(args.verbosity()).to_string());
    let format = LogFormat::parse(args.log_format.as_deref().unwrap_or("text"));
    if let Err(e) = init_logging(Some(level.as_str()), format, args.log_file(), use_color) {
        eprintln!("Error: unable to initialise logging: {}", e);
        return 1;
    }

    log::info!("msgbarrier {} starting", crate::long_version());

    let config = match args.barrier_config() {
        Ok(config) => config,
        Err(e) => {
            log_error_with_context(&e, "Loading barrier configuration");
            return 1;
        }
    };

    let (coordinator, shutdown_rx) = ShutdownCoordinator::new();
    coordinator.install_signal_handlers();

    let stdin = BufReader::new(tokio::io::stdin());
    match process(stdin, config, shutdown_rx).await {
        Ok(()) => 0,
        Err(e) => {
            log_error_with_context(&e, "Processing input");
            1
        }
    }
}

/// Feed every record from `input` through a barrier until end of input or
/// shutdown, printing releases to stdout and discards to stderr
pub async fn process<R>(
    input: R,
    config: BarrierConfig,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> BarrierResult<()>
where
    R: AsyncBufRead + Unpin,
{
    let (output, released) = QueueChannel::bounded("stdout", CHANNEL_CAPACITY);
    let (discards, discarded) = QueueChannel::bounded("stderr", CHANNEL_CAPACITY);

    let handler = MessageBarrierHandler::<Vec<Message>>::builder(SequenceSizeCompletion)
        .config(config)
        .output_channel(ChannelRef::new(output))
        .discard_channel(ChannelRef::new(discards))
        .build()?;

    let printers = [
        spawn_printer(released, |line| println!("{}", line)),
        spawn_printer(discarded, |line| eprintln!("{} {}", "discarded:".yellow(), line)),
    ];

    let mut lines = input.lines();
    let mut line_number = 0usize;
    loop {
        let line = tokio::select! {
            _ = shutdown_rx.recv() => {
                log::info!("Shutdown requested, stopping input");
                break;
            }
            line = lines.next_line() => line,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                log::error!("Failed to read input: {}", e);
                break;
            }
        };
        line_number += 1;

        let message = match parse_record(&line) {
            Ok(Some(message)) => message,
            Ok(None) => continue,
            Err(e) => {
                log::warn!("Line {}: {}", line_number, e);
                continue;
            }
        };

        if let Err(e) = handler.handle(message).await {
            log::error!("Line {}: {}", line_number, e);
        }
    }

    handler.stop()?;
    let stats = handler.stats();
    if stats.live_barriers > 0 {
        log::warn!(
            "{} group(s) still incomplete at end of input",
            stats.live_barriers
        );
    }
    log::info!(
        "Processed {} line(s): {} admitted, {} released, {} discarded, {} timed out",
        line_number,
        stats.admitted,
        stats.released,
        stats.discarded,
        stats.timed_out
    );

    // Closing the handler's channels lets the printers drain and finish
    drop(handler);
    for printer in printers {
        if let Err(e) = printer.await {
            log::warn!("Output task ended abnormally: {}", e);
        }
    }

    Ok(())
}

fn spawn_printer(
    mut receiver: mpsc::Receiver<Message>,
    print: impl Fn(String) + Send + 'static,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = receiver.recv().await {
            print(format_record(&message));
        }
    })
}

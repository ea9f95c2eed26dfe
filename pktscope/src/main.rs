// Project lints
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(unsafe_code)]

use crate::cli::Cli;
use crate::config::Config;
use crate::net::interface::{PcapProvider, PcapSession};
use crate::net::provider::{CaptureProvider, ProviderSession};
use crate::report::{OutputFormat, Reporter};
use crate::session::{CaptureLimits, CaptureSession, StopHandle, Termination};
use clap::Parser;
use std::fmt::Display;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Reading config
    let mut config = match Config::from_file(cli.config.as_deref()) {
        Ok(value) => value,
        Err(err) => {
            return failure("Config initialization failed.", &err, err.additional_info());
        },
    };
    if let Some(format) = cli.format {
        config.output = format;
    }

    // Logging setup
    if let Err(err) = logging::setup(&config) {
        return failure("Logger initialization failed.", &err, err.additional_info());
    }

    log::info!("Starting...");
    log::debug!("Config loaded: {:#?}", config);

    let provider = PcapProvider::new(&config);
    if cli.list {
        return list_devices(&provider);
    }

    let Some(selector) = cli.device.as_deref() else {
        eprintln!("No device given. Use --list to see the devices.");
        return ExitCode::FAILURE;
    };
    let device = match provider
        .list_devices()
        .map_err(net::interface::InterfaceError::from)
        .and_then(|devices| net::interface::resolve_device(&devices, selector))
    {
        Ok(device) => device,
        Err(err) => return failure("Device selection failed.", &err, err.additional_info()),
    };

    let provider_session = match provider.open(&device, &cli.filter) {
        Ok(session) => session,
        Err(err) => return failure("Device opening failed.", &err, err.additional_info()),
    };
    log::info!("Device opened: {}", device.display_name());

    if cli.send {
        return send_probe(provider_session);
    }

    capture(provider_session, cli.limits(), config.output)
}

fn list_devices(provider: &PcapProvider) -> ExitCode {
    match provider.list_devices() {
        Ok(devices) => {
            for (index, device) in devices.iter().enumerate() {
                println!("{}) {}", index + 1, device.display_name());
            }
            ExitCode::SUCCESS
        },
        Err(err) => failure("Device listing failed.", &err, err.additional_info()),
    }
}

fn send_probe(mut provider_session: PcapSession) -> ExitCode {
    let result = injector::inject(&mut provider_session);
    provider_session.close();

    match result {
        Ok(()) => {
            println!("-- Packet sent successfully.");
            ExitCode::SUCCESS
        },
        Err(err) => {
            println!("-- Could not send packet: {err}");
            ExitCode::FAILURE
        },
    }
}

fn capture(provider_session: PcapSession, limits: CaptureLimits, format: OutputFormat) -> ExitCode {
    let mut session = CaptureSession::new(provider_session, limits);

    let mut reporter = Reporter::new(std::io::stdout(), format);
    let started = session.start(move |metadata| {
        if let Err(err) = reporter.report(metadata) {
            log::error!("{} {}", err, err.additional_info().unwrap_or_default());
        }
    });
    if let Err(err) = started {
        return failure("Capture start failed.", &err, err.additional_info());
    }

    // Stop requests are only accepted from a started session
    let ctrlc_handle = session.stop_handle();
    if let Err(err) = ctrlc::set_handler(move || {
        ctrlc_handle.stop();
    }) {
        log::warn!("Ctrl+C handler is not installed: {}", err);
    }
    listen_for_enter(session.stop_handle());
    eprintln!("-- Capturing. Press Enter or Ctrl+C to stop.");

    match session.wait() {
        Ok(Termination::ProviderFailure(err)) => {
            failure("Capture failed.", &err, err.additional_info())
        },
        Ok(termination) => {
            log::info!("Captured {} frames, {}.", session.packets(), termination);
            ExitCode::SUCCESS
        },
        Err(err) => failure("Capture failed.", &err, err.additional_info()),
    }
}

fn listen_for_enter(handle: StopHandle) {
    let listener = std::thread::Builder::new()
        .name("stdin-stop".to_string())
        .spawn(move || {
            let mut line = String::new();
            match std::io::stdin().read_line(&mut line) {
                // Closed stdin is not a stop request
                Ok(0) => {},
                Ok(_) => {
                    handle.stop();
                },
                Err(err) => log::warn!("Failed to read stdin: {}", err),
            }
        });

    if let Err(err) = listener {
        log::warn!("Enter listener is not started: {}", err);
    }
}

fn failure(title: &str, err: &dyn Display, additional_info: Option<String>) -> ExitCode {
    let mut message = format!("{title} Error: {err}");
    if let Some(additional_info) = additional_info {
        message.push_str(&format!(" Additional_info: {additional_info}"));
    }
    eprintln!("{}", message);

    ExitCode::FAILURE
}

mod cli;
mod config;
mod injector;
mod logging;
mod net;
mod report;
mod session;

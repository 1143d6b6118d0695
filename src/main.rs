use anyhow::Context;
use clap::Parser;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use vmprov_lib::cli::{self, Cli, Mode};
use vmprov_lib::{config, shutdown};
use vmprov_vsphere::{inspect_vm, provision, ProvisionError, VsphereClient};

fn install_tracing(json: bool) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter_layer);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        let format = fmt::format().with_target(false).compact();
        registry
            .with(fmt::layer().event_format(format).with_writer(std::io::stderr))
            .init();
    }
}

async fn execute(cli: &Cli, token: &CancellationToken) -> Result<(), ProvisionError> {
    config::load_env_file(cli.env_file.as_deref())?;
    let vsphere = config::from_env()?;
    let mode = cli.mode()?;

    let mut client = VsphereClient::new(&vsphere)?;
    info!(host = %vsphere.host, user = %vsphere.username, insecure = vsphere.insecure, "Connecting to vCenter");
    tokio::select! {
        biased;
        _ = token.cancelled() => return Err(ProvisionError::cancelled("Aborted while connecting").during("connect")),
        res = client.login() => res.map_err(|e| e.during("connect"))?,
    }

    let result = match mode {
        Mode::Inspect { datacenter, vm_name } => {
            inspect_vm(&client, token, &datacenter, &vm_name, cli.ambiguity())
                .await
                .map(|report| print!("{report}"))
        }
        Mode::Provision(params) => provision(&client, token, &params).await.map(|report| {
            if !report.degraded_adapters.is_empty() {
                warn!(keys = ?report.degraded_adapters, "Some adapters were edited through the generic ethernet card type");
            }
            match serde_json::to_string(&report) {
                Ok(json) => println!("{json}"),
                Err(e) => warn!(error = %e, "Cannot render the run summary"),
            }
        }),
    };

    client.logout(token).await;
    result
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    install_tracing(cli.log_json);

    let run = || -> anyhow::Result<Result<(), ProvisionError>> {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("Init tokio runtime")?;
        Ok(rt.block_on(async {
            let token = CancellationToken::new();
            let watchdog = shutdown::spawn_watchdog(token.clone(), cli.deadline());
            let result = execute(&cli, &token).await;
            watchdog.abort();
            result
        }))
    };

    match run() {
        Ok(Ok(())) => ExitCode::from(cli::EXIT_OK),
        Ok(Err(e)) => {
            error!(kind = ?e.kind, step = e.step.as_deref(), detail = e.platform_detail.as_deref(), "{}", e.message);
            ExitCode::from(cli::exit_code(&e))
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(cli::EXIT_FAILURE)
        }
    }
}

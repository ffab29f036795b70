mod cli;
mod commands;
mod domain;
mod services;

pub use cli::{Cli, Group};
pub use commands::Scenario;
pub use domain::constants::*;
pub use domain::models::*;
pub use services::classifier::ExpectedFailure;
pub use services::fixtures::{FakeAccount, Fixtures};
pub use services::invoker::{
    CallError, Credentials, Invocation, ProcessInvoker, ResponseShape, ToolContext,
};
pub use services::ledger::Ledger;
pub use services::output::{print_error, print_summary};
pub use services::payload::{display_state, Extract, ExtractError, FieldPath, Payload};
pub use services::poller::{Clock, Poller, SystemClock};
pub use services::runner::{Check, CheckOutcome, Gate, Runner};
pub use services::settings::{load_config, ConfigError, Overrides, Settings};

use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use tracing::{debug, info};

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            let code = e
                .downcast_ref::<ConfigError>()
                .map_or("startup_failed", ConfigError::code);
            print_error(cli.json, code, &format!("{:#}", e));
            ExitCode::from(2)
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<u8> {
    // a missing .env is fine; variables already set win
    dotenvy::dotenv().ok();
    let env = |key: &str| std::env::var(key).ok();
    let config = load_config(cli.config.as_deref(), env)?;
    let ci = Path::new(&config.service.ci_marker).exists();
    let overrides = Overrides {
        url: cli.url.clone(),
        user: cli.user.clone(),
        password: cli.password.clone(),
        timeout_secs: cli.timeout_secs,
        log_file: cli.log_file.clone(),
    };
    let settings = Settings::resolve(config, overrides, ci, env)?;
    services::telemetry::init(&settings.log_file)?;
    info!(
        "main | driving `{}` against {}",
        settings.command_prefix, settings.api_url
    );

    let ledger = Ledger::new();
    let invoker = ProcessInvoker::new(settings.tool_timeout);
    let runner = Runner::new(&invoker, &ledger, Poller::new(SystemClock))
        .dump_responses(settings.dump_responses);
    let fixtures = Fixtures::new();
    let scenario = Scenario {
        runner: &runner,
        ctx: settings.root_context(),
        fixtures: &fixtures,
        settings: &settings,
    };

    if !cli.skip_system_wait {
        commands::system::wait_for_service(&scenario);
    }
    commands::run_group(&scenario, cli.group);

    let summary = ledger.summary();
    for line in summary.render_lines() {
        debug!("{}", line);
    }
    info!(
        "main | {} checks recorded, {} skipped",
        ledger.total(),
        summary.counts.skipped
    );
    print_summary(cli.json, &summary)?;
    Ok(u8::try_from(ledger.exit_code()).unwrap_or(1))
}

//! Command line interface of the load test binary.

use std::path::PathBuf;

use anyhow::Result;
use argh::FromArgs;

use crate::config::Config;
use crate::feeder::Feeder;
use crate::http::HttpRemote;
use crate::observability;
use crate::runner::{self, Injection};

/// Load test for a RESTful objects API.
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the YAML configuration file
    #[argh(option, short = 'c')]
    pub config: Option<PathBuf>,

    /// URL of the objects collection, overriding the configuration
    #[argh(option)]
    pub base_url: Option<String>,

    #[argh(subcommand)]
    pub command: Command,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum Command {
    Run(RunCommand),
    Version(VersionCommand),
}

/// run the load test and print a report
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "run")]
struct RunCommand {
    /// exit with an error if any iteration failed
    #[argh(switch)]
    fail_on_error: bool,
}

/// print the version
#[derive(Default, Debug, FromArgs)]
#[argh(subcommand, name = "version")]
struct VersionCommand {}

/// Bootstrap the runtime and execute the CLI command.
pub fn execute() -> Result<()> {
    let args: Args = argh::from_env();

    let RunCommand { fail_on_error } = match args.command {
        Command::Run(command) => command,
        Command::Version(_) => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
    };

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("loadtest-rt")
        .enable_all()
        .build()?;
    let _runtime_guard = runtime.enter();

    observability::init_tracing(&config);
    tracing::debug!(?config);

    let feeder = match config.feeder {
        Some(ref path) => Feeder::from_path(path)?,
        None => Feeder::sample()?,
    };
    let remote = HttpRemote::new(&config.base_url, config.request_timeout)?;
    let injection = Injection {
        users: config.users,
        duration: config.duration,
    };

    let report = runtime.block_on(runner::run(remote, feeder, injection))?;
    report.print();

    let failures = report.metrics.failures();
    if fail_on_error && failures > 0 {
        anyhow::bail!("{failures} of {} iterations failed", report.metrics.iterations());
    }

    Ok(())
}

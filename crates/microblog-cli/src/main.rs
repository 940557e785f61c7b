// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod logging;
mod runtime;
mod session_store;

use anyhow::{Context, Result, anyhow, bail};
use config::Config;
use microblog_api::Client;
use microblog_app::AppState;
use microblog_tui::UiOptions;
use runtime::ApiRuntime;
use session_store::SessionStore;
use std::env;
use std::path::PathBuf;
use tracing::info;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print!("{USAGE}");
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `microblog-admin --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;

    let session_path = config.session_path()?;
    if options.print_session_path {
        println!("{}", session_path.display());
        return Ok(());
    }

    let store = SessionStore::new(session_path);
    if options.logout {
        if store.clear()? {
            println!("signed out; removed {}", store.path().display());
        } else {
            println!("no saved session at {}", store.path().display());
        }
        return Ok(());
    }

    let client = Client::new(&config.api_base_url()?, config.api_timeout()?).with_context(|| {
        format!(
            "invalid [api] config in {}; fix base_url/timeout values",
            options.config_path.display()
        )
    })?;
    if options.check_only {
        store.load()?;
        return Ok(());
    }

    let log_path = config.log_path()?;
    if let Err(error) = logging::init(config.log_level(), &log_path) {
        eprintln!("logging disabled: {error:#}");
    }
    info!(base_url = client.base_url(), "starting admin panel");

    let mut state = AppState::with_session(store.load()?);
    let mut runtime = ApiRuntime::new(client, store, config.comment_article_limit());
    microblog_tui::run_app(
        &mut state,
        &mut runtime,
        UiOptions {
            page_size: config.page_size(),
        },
    )
}

const USAGE: &str = "\
usage: microblog-admin [options]

  --config <path>          Use a specific config path
  --print-config-path      Print resolved config path
  --print-session-path     Print resolved session file path
  --print-example-config   Print a config template
  --logout                 Forget the saved session and exit
  --check                  Validate config, API settings, and saved session
  -h, --help               Show this help
";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_session_path: bool,
    print_example: bool,
    logout: bool,
    check_only: bool,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        ..CliOptions::default()
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        let flag = match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
                continue;
            }
            "--print-config-path" => &mut options.print_config_path,
            "--print-session-path" => &mut options.print_session_path,
            "--print-example-config" => &mut options.print_example,
            "--logout" => &mut options.logout,
            "--check" => &mut options.check_only,
            "--help" | "-h" => &mut options.show_help,
            unknown => {
                bail!("unknown argument {unknown:?}; run with --help to see supported options")
            }
        };
        *flag = true;
    }

    Ok(options)
}

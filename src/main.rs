//! KYC API test harness
//!
//! Runs dependency-ordered suites of HTTP test cases against a KYC service
//! whose business payloads are RSA encrypted and signed.
//!
//! ## Features
//!
//! - YAML test suites with `${var}` placeholders and case dependencies
//! - Request sealing (encrypt + sign) and response verification (verify + decrypt)
//! - Synthetic 18-digit id numbers injected into every request
//! - Concurrent repeated runs with a success threshold
//! - Table, JSON and summary output, YAML run snapshot, CSV failure export
//!
//! ## Usage
//!
//! ```bash
//! # Run a suite once
//! kyc-apitest run suites/credit.yaml --base-url http://127.0.0.1:8080 --keys config/rsa_config.yaml
//!
//! # Run it 20 times on 5 workers and require more than 90% successful runs
//! kyc-apitest concurrent suites/credit.yaml --repeat 20 --workers 5 --threshold 0.9
//!
//! # Show the execution order
//! kyc-apitest order suites/credit.yaml
//!
//! # Generate ids and keys
//! kyc-apitest gen-id -n 5 --mode province
//! kyc-apitest keygen --bits 2048 --output config/rsa_config.yaml
//! ```

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

mod cli;
mod config;
mod crypto;
mod executor;
mod fixtures;
mod http;
mod models;
mod output;
mod resolver;
mod results;
mod utils;

use cli::{Args, Command, ConfigAction, SuiteArgs};
use config::{AppConfig, ConfigFile, EnvConfig, KeyMaterial, RequiredKeys};
use executor::{ConcurrentRunner, RunOptions, SuiteRunner, TransportFactory};
use fixtures::{IdNumberGenerator, RegionMode};
use http::{HttpClient, HttpError, Transport};
use models::TestSuite;
use output::{OutputFormat, ResultFormatter};
use results::RunSnapshot;
use utils::{init_logger, LogLevel};

#[tokio::main]
async fn main() -> Result<()> {
    let Args {
        command,
        verbose,
        config: config_path,
        env: environment,
    } = Args::parse();

    let env = EnvConfig::load();
    init_logger(LogLevel::from_verbose(verbose || env.verbose.unwrap_or(false)));

    let settings = Settings {
        config_path: config_path.or_else(|| env.config_file.clone()),
        environment: environment.or_else(|| env.environment.clone()),
        env,
    };

    match command {
        Command::Run(run_args) => {
            run_once(&settings, run_args.suite).await?;
        }
        Command::Concurrent(concurrent_args) => {
            run_concurrent(&settings, concurrent_args).await?;
        }
        Command::Order { suite } => {
            show_order(&suite)?;
        }
        Command::GenId { count, mode, seed } => {
            generate_ids(count, &mode, seed)?;
        }
        Command::Keygen {
            bits,
            output,
            slot,
        } => {
            generate_keys(bits, output.as_deref(), &slot)?;
        }
        Command::Config(config_args) => {
            manage_config(&settings, config_args)?;
        }
    }

    Ok(())
}

/// Where configuration comes from, resolved once from flags and environment
struct Settings {
    config_path: Option<String>,
    environment: Option<String>,
    env: EnvConfig,
}

impl Settings {
    fn config_file(&self) -> Result<ConfigFile> {
        match &self.config_path {
            Some(path) => ConfigFile::load(path),
            None => ConfigFile::load_default(),
        }
    }

    /// File settings, then the selected environment, then environment variables
    fn app_config(&self) -> Result<AppConfig> {
        let mut app = self.config_file()?.app_for(self.environment.as_deref())?;
        app.apply_env(&self.env);
        Ok(app)
    }
}

/// Command-line flags take precedence over every other source
fn apply_suite_args(app: &mut AppConfig, args: &SuiteArgs) {
    if let Some(base_url) = &args.base_url {
        app.base_url = Some(base_url.clone());
    }
    if let Some(timeout) = args.timeout {
        app.timeout_secs = timeout;
    }
    if let Some(keys) = &args.keys {
        app.keys_file = Some(keys.into());
    }
    if let Some(snapshot) = &args.snapshot {
        app.snapshot_path = Some(snapshot.into());
    }
    if args.skip_on_dependency_failure {
        app.skip_on_dependency_failure = true;
    }
}

/// Key file, then environment variables, then suite variables
fn load_keys(app: &AppConfig, env: &EnvConfig, suite: &TestSuite) -> Result<RequiredKeys> {
    let mut material = match &app.keys_file {
        Some(path) => KeyMaterial::load(path)?,
        None => KeyMaterial::default(),
    };
    material.apply_env(env);
    material.fill_from_variables(&suite.variables);
    Ok(material.require()?)
}

fn run_options(app: &AppConfig, args: &SuiteArgs) -> Result<RunOptions> {
    let region_mode = RegionMode::from_str(&args.id_mode)
        .ok_or_else(|| anyhow::anyhow!("Unknown id mode: {}", args.id_mode))?;
    Ok(RunOptions {
        skip_on_dependency_failure: app.skip_on_dependency_failure,
        region_mode,
    })
}

fn formatter(args: &SuiteArgs) -> Result<ResultFormatter> {
    let format = OutputFormat::from_str(&args.format)
        .ok_or_else(|| anyhow::anyhow!("Unknown output format: {}", args.format))?;
    let formatter = ResultFormatter::new(format);
    Ok(if args.no_color {
        formatter.no_color()
    } else {
        formatter
    })
}

fn http_transport(app: &AppConfig) -> Result<Arc<dyn Transport>, HttpError> {
    let mut client = HttpClient::with_timeout(app.timeout_secs)?;
    if let Some(base_url) = &app.base_url {
        client = client.base_url(base_url.clone());
    }
    Ok(Arc::new(client))
}

fn write_outputs(app: &AppConfig, args: &SuiteArgs, snapshot: &RunSnapshot) -> Result<()> {
    if let Some(path) = &app.snapshot_path {
        snapshot.save(path)?;
    }
    if let Some(path) = &args.failures_csv {
        snapshot.export_failures_csv(Path::new(path))?;
    }
    Ok(())
}

async fn run_once(settings: &Settings, args: SuiteArgs) -> Result<()> {
    let mut app = settings.app_config()?;
    apply_suite_args(&mut app, &args);
    app.validate()?;

    let formatter = formatter(&args)?;
    let mut suite = TestSuite::from_yaml(&args.suite)?;
    let keys = load_keys(&app, &settings.env, &suite)?;

    let transport = http_transport(&app)?;
    let mut runner =
        SuiteRunner::new(transport.clone(), keys).with_options(run_options(&app, &args)?);
    if let Some(seed) = args.seed {
        runner = runner.with_id_generator(IdNumberGenerator::seeded(seed));
    }

    let started_at = Utc::now();
    let result = runner.run(&mut suite, 1).await;
    transport.close();
    let result = result?;

    println!("{}", formatter.format_run(&result));
    write_outputs(&app, &args, &RunSnapshot::from_run(&result, started_at))?;

    if !result.is_success() {
        anyhow::bail!(
            "{} of {} cases did not pass",
            result.total - result.passed,
            result.total
        );
    }
    Ok(())
}

async fn run_concurrent(settings: &Settings, args: cli::ConcurrentArgs) -> Result<()> {
    let mut app = settings.app_config()?;
    apply_suite_args(&mut app, &args.suite);
    if let Some(repeat) = args.repeat {
        app.repeat_times = repeat;
    }
    if let Some(workers) = args.workers {
        app.max_workers = workers;
    }
    if let Some(threshold) = args.threshold {
        app.success_threshold = threshold;
    }
    app.validate()?;

    let formatter = formatter(&args.suite)?;
    let suite = TestSuite::from_yaml(&args.suite.suite)?;
    let keys = load_keys(&app, &settings.env, &suite)?;

    let factory_config = app.clone();
    let factory: TransportFactory = Arc::new(move || http_transport(&factory_config));

    let mut runner = ConcurrentRunner::new(factory, keys)
        .repeat_times(app.repeat_times)
        .max_workers(app.max_workers)
        .with_options(run_options(&app, &args.suite)?);
    if let Some(seed) = args.suite.seed {
        runner = runner.with_seed(seed);
    }

    let started_at = Utc::now();
    let report = runner.run(&suite).await?;

    println!("{}", formatter.format_aggregate(&report));
    write_outputs(&app, &args.suite, &RunSnapshot::from_aggregate(&report, started_at))?;

    if !report.meets_threshold(app.success_threshold) {
        anyhow::bail!(
            "Success rate {:.2}% does not exceed threshold {:.2}%",
            report.success_ratio() * 100.0,
            app.success_threshold * 100.0
        );
    }
    info!(
        "Success rate {:.2}% exceeds threshold {:.2}%",
        report.success_ratio() * 100.0,
        app.success_threshold * 100.0
    );
    Ok(())
}

fn show_order(path: &str) -> Result<()> {
    let suite = TestSuite::from_yaml(path)?;
    let order = suite.execution_order()?;

    println!("\nExecution order for '{}' ({} cases)\n", suite.name, order.len());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    for (i, id) in order.iter().enumerate() {
        let Some(case) = suite.cases.get(id) else {
            continue;
        };
        let deps = if case.dependencies.is_empty() {
            String::new()
        } else {
            format!("  <- {}", case.dependencies.join(", "))
        };
        println!(
            "{:3}. {:16} {:6} {}{}",
            i + 1,
            id,
            case.method,
            case.api_path,
            deps
        );
    }
    Ok(())
}

fn generate_ids(count: usize, mode: &str, seed: Option<u64>) -> Result<()> {
    let mode =
        RegionMode::from_str(mode).ok_or_else(|| anyhow::anyhow!("Unknown id mode: {mode}"))?;
    let mut generator = seed
        .map(IdNumberGenerator::seeded)
        .unwrap_or_else(IdNumberGenerator::from_os_rng)
        .with_mode(mode);

    for _ in 0..count {
        let id = generator.generate();
        let birth = fixtures::birth_date(&id).unwrap_or_default();
        println!("{id}  {birth}");
    }
    Ok(())
}

fn generate_keys(bits: usize, output: Option<&str>, slot: &str) -> Result<()> {
    info!("Generating {}-bit RSA key pair", bits);
    let pair = crypto::generate_key_pair(bits)?;

    let Some(output) = output else {
        println!("{}", serde_yaml::to_string(&pair)?);
        return Ok(());
    };

    let path = Path::new(output);
    let mut material = if path.exists() {
        KeyMaterial::load(path)?
    } else {
        KeyMaterial::default()
    };

    let target = match slot.to_lowercase().as_str() {
        "channel" => &mut material.channel_rsa,
        "platform" => &mut material.platform_rsa,
        other => anyhow::bail!("Unknown key slot: {other} (expected channel or platform)"),
    };
    target.private_key = Some(pair.private_key);
    target.public_key = Some(pair.public_key);

    material.save(path)?;
    println!("✓ {slot} key pair written to {output}");
    Ok(())
}

fn manage_config(settings: &Settings, args: cli::ConfigArgs) -> Result<()> {
    match args.action {
        ConfigAction::Init { output, force } => {
            let path = Path::new(&output);
            if path.exists() && !force {
                anyhow::bail!(
                    "Configuration file already exists: {output}. Use --force to overwrite."
                );
            }

            ConfigFile::example().save(path)?;
            println!("✓ Configuration file created: {output}");
            println!("\nEdit the file to customize your settings.");
        }

        ConfigAction::Show { env_vars, format } => {
            if env_vars {
                settings.env.print_summary();
            } else {
                let config = settings.config_file()?;
                let output = if format == "json" {
                    serde_json::to_string_pretty(&config)?
                } else {
                    serde_yaml::to_string(&config)?
                };
                println!("{output}");
                if settings.env.has_any() {
                    warn!("Environment variables override some of these values");
                }
            }
        }

        ConfigAction::Validate { file } => {
            let path = file
                .or_else(|| settings.config_path.clone())
                .or_else(|| ConfigFile::find().map(|p| p.to_string_lossy().to_string()))
                .context("No configuration file found")?;

            match ConfigFile::load(&path) {
                Ok(_) => {
                    println!("✓ Configuration file is valid: {path}");
                }
                Err(e) => {
                    println!("✗ Configuration file is invalid: {path}");
                    println!("  Error: {e}");
                    return Err(e);
                }
            }
        }

        ConfigAction::EnvHelp => {
            config::print_env_help();
        }
    }

    Ok(())
}

//! Thin CLI layer: parse args, styled output, and call into yap-core.

use clap::{Arg, ArgAction, Command};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use yap_core::types::PackageRef;

fn use_color() -> bool {
    std::io::stdout().is_terminal() && std::env::var("NO_COLOR").unwrap_or_default().is_empty()
}

fn success(msg: &str) {
    if use_color() {
        println!("{}", msg.green());
    } else {
        println!("{msg}");
    }
}

fn error(msg: &str) {
    if use_color() {
        eprintln!("{}", msg.red());
    } else {
        eprintln!("{msg}");
    }
}

fn info(msg: &str) {
    if use_color() {
        println!("{}", msg.cyan());
    } else {
        println!("{msg}");
    }
}

fn dim(msg: &str) {
    if use_color() {
        println!("{}", msg.dimmed());
    } else {
        println!("{msg}");
    }
}

fn project_root() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Runs a long task on a background thread. In quiet mode (`YAP_QUIET`) the
/// pipeline's own per-package log lines are suppressed, so a spinner stands
/// in to show something is still happening; otherwise the task just runs
/// inline and its own logging is the progress indicator.
fn run_with_spinner<F>(message: &str, f: F) -> yap_core::Result<()>
where
    F: FnOnce() -> yap_core::Result<()> + Send + 'static,
{
    if !yap_core::log::is_quiet() {
        return f();
    }

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(f());
    });

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⠈⠐⠠⠰⠸⠹")
            .template("{spinner:.dim} {msg}")
            .unwrap(),
    );
    spinner.set_message(message.to_string());

    loop {
        match rx.try_recv() {
            Ok(result) => {
                spinner.finish_and_clear();
                return result;
            }
            Err(mpsc::TryRecvError::Disconnected) => {
                spinner.finish_and_clear();
                return Ok(());
            }
            Err(mpsc::TryRecvError::Empty) => {}
        }
        spinner.tick();
        thread::sleep(Duration::from_millis(80));
    }
}

fn cli() -> Command {
    Command::new("yap")
        .about("A package manager for the npm ecosystem")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("install")
                .alias("i")
                .about("Resolve and install the project's dependencies")
                .arg(
                    Arg::new("force")
                        .short('f')
                        .long("force")
                        .action(ArgAction::SetTrue)
                        .help("Ignore yap.lockb and re-resolve from scratch"),
                ),
        )
        .subcommand(
            Command::new("list")
                .alias("ls")
                .about("Print the decoded lockfile")
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print as JSON instead of plain text"),
                ),
        )
        .subcommand(
            Command::new("add")
                .about("Resolve and install a single additional package")
                .arg(Arg::new("package").required(true).help("name@version, e.g. lodash@4.17.21")),
        )
        .subcommand(
            Command::new("config")
                .about("Inspect or change the global configuration")
                .subcommand_required(true)
                .subcommand(Command::new("list").about("Print the effective configuration"))
                .subcommand(
                    Command::new("get")
                        .arg(Arg::new("key").required(true)),
                )
                .subcommand(
                    Command::new("set")
                        .arg(Arg::new("key").required(true))
                        .arg(Arg::new("value").required(true)),
                ),
        )
}

fn main() -> ExitCode {
    let matches = cli().get_matches();

    let result = match matches.subcommand() {
        Some(("install", sub)) => run_install(sub.get_flag("force")),
        Some(("list", sub)) => run_list(sub.get_flag("json")),
        Some(("add", sub)) => run_add(sub.get_one::<String>("package").expect("required")),
        Some(("config", sub)) => run_config(sub),
        _ => unreachable!("clap enforces subcommand_required"),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error(&format!("{e}"));
            ExitCode::FAILURE
        }
    }
}

fn run_install(force: bool) -> yap_core::Result<()> {
    let root = project_root();
    let config = yap_core::load_config(&root)?;
    info(&format!("Installing into {}", root.display()));

    let count = std::sync::Arc::new(std::sync::Mutex::new(0usize));
    let count_clone = std::sync::Arc::clone(&count);
    run_with_spinner("Installing packages", move || {
        let lockfile = yap_core::install(&root, &config, force)?;
        *count_clone.lock().unwrap_or_else(|e| e.into_inner()) = lockfile.resolutions.len();
        Ok(())
    })?;

    let installed = *count.lock().unwrap_or_else(|e| e.into_inner());
    success(&format!("Installed {installed} package(s)"));
    Ok(())
}

fn run_add(spec: &str) -> yap_core::Result<()> {
    let (name, version) = parse_name_at_version(spec);
    let root = project_root();
    let config = yap_core::load_config(&root)?;
    let pkg = PackageRef::new(name.clone(), version);
    info(&format!("Adding {spec}"));
    let lockfile = yap_core::add_package(&root, &config, pkg)?;
    success(&format!(
        "Added {name}; {} package(s) total",
        lockfile.resolutions.len()
    ));
    Ok(())
}

/// Splits `name@version` on the last `@`, so scoped names like
/// `@babel/core@7.2.0` keep their leading `@` intact. A bare name with no
/// `@version` suffix (or a scope with nothing after it) resolves to `latest`.
fn parse_name_at_version(spec: &str) -> (String, String) {
    let search_from = if spec.starts_with('@') { 1 } else { 0 };
    match spec[search_from..].rfind('@') {
        Some(idx) => {
            let split_at = search_from + idx;
            (spec[..split_at].to_string(), spec[split_at + 1..].to_string())
        }
        None => (spec.to_string(), "latest".to_string()),
    }
}

fn run_list(as_json: bool) -> yap_core::Result<()> {
    let root = project_root();
    let Some(lockfile) = yap_core::read_lockfile(&root)? else {
        if as_json {
            println!("null");
        } else {
            dim("No yap.lockb found. Run `yap install` first.");
        }
        return Ok(());
    };

    if as_json {
        let core_dependencies: Vec<_> = lockfile
            .core_dependencies
            .iter()
            .map(|pkg| serde_json::json!({"name": pkg.name, "spec": pkg.spec}))
            .collect();
        let resolutions: Vec<_> = lockfile
            .resolutions
            .iter()
            .map(|pkg| serde_json::json!({"name": pkg.name, "version": pkg.version}))
            .collect();
        let doc = serde_json::json!({
            "coreDependencies": core_dependencies,
            "resolutions": resolutions,
        });
        println!("{}", serde_json::to_string_pretty(&doc).unwrap_or_default());
        return Ok(());
    }

    for pkg in &lockfile.core_dependencies {
        println!("{} {}", pkg.name, pkg.spec);
    }
    dim(&format!("({} resolved package(s))", lockfile.resolutions.len()));
    Ok(())
}

fn run_config(sub: &clap::ArgMatches) -> yap_core::Result<()> {
    let root = project_root();
    match sub.subcommand() {
        Some(("list", _)) => {
            let config = yap_core::load_config(&root)?;
            println!("registry={}", config.registry);
            println!("authToken={}", config.auth_token.as_deref().unwrap_or(""));
            println!("logLevel={}", config.log_level);
            Ok(())
        }
        Some(("get", get_sub)) => {
            let config = yap_core::load_config(&root)?;
            let key = get_sub.get_one::<String>("key").expect("required");
            match key.as_str() {
                "registry" => println!("{}", config.registry),
                "authToken" => println!("{}", config.auth_token.unwrap_or_default()),
                "logLevel" => println!("{}", config.log_level),
                other => error(&format!("unknown config key: {other}")),
            }
            Ok(())
        }
        Some(("set", set_sub)) => {
            let mut config = yap_core::load_config(&root)?;
            let key = set_sub.get_one::<String>("key").expect("required");
            let value = set_sub.get_one::<String>("value").expect("required");
            match key.as_str() {
                "registry" => config.registry = value.clone(),
                "authToken" => config.auth_token = Some(value.clone()),
                "logLevel" => config.log_level = value.clone(),
                other => {
                    error(&format!("unknown config key: {other}"));
                    return Ok(());
                }
            }
            yap_core::config::write_global_config(&config)?;
            success(&format!("Set {key}={value}"));
            Ok(())
        }
        _ => unreachable!("clap enforces subcommand_required"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_name_and_version() {
        assert_eq!(
            parse_name_at_version("lodash@4.17.21"),
            ("lodash".to_string(), "4.17.21".to_string())
        );
    }

    #[test]
    fn parses_scoped_name_and_version() {
        assert_eq!(
            parse_name_at_version("@babel/core@7.2.0"),
            ("@babel/core".to_string(), "7.2.0".to_string())
        );
    }

    #[test]
    fn bare_name_defaults_to_latest() {
        assert_eq!(
            parse_name_at_version("is-odd"),
            ("is-odd".to_string(), "latest".to_string())
        );
    }

    #[test]
    fn bare_scoped_name_defaults_to_latest() {
        assert_eq!(
            parse_name_at_version("@babel/core"),
            ("@babel/core".to_string(), "latest".to_string())
        );
    }
}

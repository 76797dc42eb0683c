//! Lifecycle subcommands: build the config, pick the family, act on it.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use service_platform::options::{USER_SERVICE, USER_SERVICE_DEFAULT};
use service_platform::{Config, Service};

use crate::heartbeat::{Heartbeat, DEFAULT_INTERVAL};
use crate::systems;
use crate::Commands;

const DEFAULT_NAME: &str = "servicectl";

/// Command line values that win over the config file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub user: bool,
}

pub fn load_config(path: Option<&Path>, overrides: Overrides) -> Result<Config> {
    let (mut config, config_path) = match path {
        Some(path) => {
            let absolute = std::fs::canonicalize(path)
                .with_context(|| format!("config file not found: {}", path.display()))?;
            info!("loading config from {}", absolute.display());
            (Config::load(&absolute)?, Some(absolute))
        }
        None => (Config::new(DEFAULT_NAME), None),
    };

    if let Some(name) = overrides.name {
        config.name = name;
    }
    if let Some(display_name) = overrides.display_name {
        config.display_name = display_name;
    }
    if let Some(description) = overrides.description {
        config.description = description;
    }
    if overrides.user {
        config.options.set(USER_SERVICE, true);
    }

    if config.arguments.is_empty() {
        config.arguments = run_arguments(&config, config_path.as_deref());
    }
    Ok(config)
}

/// What the service manager passes back to us: `run` with enough flags
/// to rebuild the same config.
fn run_arguments(config: &Config, config_path: Option<&Path>) -> Vec<String> {
    let mut args = vec!["run".to_string()];
    match config_path {
        Some(path) => {
            args.push("--config".into());
            args.push(path.display().to_string());
        }
        None => {
            args.push("--name".into());
            args.push(config.name.clone());
        }
    }
    if config.options.bool(USER_SERVICE, USER_SERVICE_DEFAULT) {
        args.push("--user".into());
    }
    args
}

pub fn dispatch(command: Commands, config: Config) -> Result<()> {
    let user = config.options.bool(USER_SERVICE, USER_SERVICE_DEFAULT);
    if command != Commands::Run && command != Commands::Status {
        ensure_elevated(user)?;
    }

    let registry = systems::register()?;
    let workload = Arc::new(Heartbeat::new(DEFAULT_INTERVAL));
    let service = registry.system().new_service(workload, config)?;

    run_command(command, service.as_ref())
}

fn run_command(command: Commands, service: &dyn Service) -> Result<()> {
    match command {
        Commands::Install => {
            service.install()?;
            println!("{} installed ({})", service, service.platform());
        }
        Commands::Uninstall => {
            service.uninstall()?;
            println!("{} uninstalled", service);
        }
        Commands::Start => service.start()?,
        Commands::Stop => service.stop()?,
        Commands::Restart => service.restart()?,
        Commands::Status => {
            let status = service.status()?;
            println!("{}: {}", service, status);
        }
        Commands::Run => service.run()?,
    }
    Ok(())
}

// ── Privilege checks ───────────────────────────────────────────────────────

/// System-wide descriptors live in root-owned directories. The SCM does its
/// own access check, so Windows is left to fail there.
fn ensure_elevated(user: bool) -> Result<()> {
    if user {
        return Ok(());
    }
    #[cfg(unix)]
    {
        if !nix::unistd::Uid::effective().is_root() {
            anyhow::bail!("system services must be managed as root (use sudo or --user)");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use service_core::testing::StubService;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_config_file() {
        let config = load_config(None, Overrides::default()).unwrap();
        assert_eq!(config.name, "servicectl");
        assert_eq!(config.arguments, vec!["run", "--name", "servicectl"]);
    }

    #[test]
    fn test_flags_override_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("svc.json");
        fs::write(
            &path,
            r#"{"name": "from-file", "description": "file desc", "options": {"KeepAlive": false}}"#,
        )
        .unwrap();

        let config = load_config(
            Some(&path),
            Overrides {
                name: Some("from-flag".into()),
                user: true,
                ..Overrides::default()
            },
        )
        .unwrap();

        assert_eq!(config.name, "from-flag");
        assert_eq!(config.description, "file desc");
        assert!(config.options.bool(USER_SERVICE, false));
        assert!(!config.options.bool("KeepAlive", true));

        let canonical = fs::canonicalize(&path).unwrap();
        assert_eq!(
            config.arguments,
            vec![
                "run".to_string(),
                "--config".to_string(),
                canonical.display().to_string(),
                "--user".to_string(),
            ]
        );
    }

    #[test]
    fn test_explicit_arguments_are_kept() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("svc.json");
        fs::write(&path, r#"{"name": "demo", "arguments": ["serve", "--port", "80"]}"#).unwrap();
        let config = load_config(Some(&path), Overrides::default()).unwrap();
        assert_eq!(config.arguments, vec!["serve", "--port", "80"]);
    }

    #[test]
    fn test_missing_config_file() {
        let err = load_config(Some(Path::new("/nonexistent/svc.json")), Overrides::default())
            .unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn test_user_scope_skips_elevation() {
        ensure_elevated(true).unwrap();
    }

    #[test]
    fn test_run_command_against_stub() {
        for command in [Commands::Install, Commands::Start, Commands::Status, Commands::Run] {
            run_command(command, &StubService).unwrap();
        }
    }
}

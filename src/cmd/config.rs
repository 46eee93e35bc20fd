//! `protobuilder config`: show or initialize the project configuration.

use anyhow::{Context, Result};
use console::style;
use std::path::Path;

use protobuilder::config::AppConfig;
use protobuilder_runtime::RuntimeConfig;

use super::super::ConfigCommands;

pub fn cmd_config(project_dir: &Path, command: Option<ConfigCommands>) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => show(project_dir),
        Some(ConfigCommands::Init) => init(project_dir),
    }
}

fn show(project_dir: &Path) -> Result<()> {
    let app_path = AppConfig::path_for(project_dir);
    let runtime_path = RuntimeConfig::path_for(project_dir);
    let app = AppConfig::resolve(project_dir)?;
    let runtime = RuntimeConfig::load(project_dir)?;

    println!("{}", style("protobuilder configuration").bold());
    println!();
    println!("{} {}", describe(&app_path), app_path.display());
    println!(
        "{}",
        toml::to_string_pretty(&app).context("Failed to render config.toml")?
    );
    println!("{} {}", describe(&runtime_path), runtime_path.display());
    println!("{}", runtime.to_toml());
    Ok(())
}

fn describe(path: &Path) -> console::StyledObject<&'static str> {
    if path.exists() {
        style("# from").dim()
    } else {
        style("# defaults, no file at").dim()
    }
}

fn init(project_dir: &Path) -> Result<()> {
    let app_path = AppConfig::path_for(project_dir);
    if app_path.exists() {
        println!("{} {}", style("Exists").yellow(), app_path.display());
    } else {
        AppConfig::default().save(&app_path)?;
        println!("{} {}", style("Wrote").green(), app_path.display());
    }

    let runtime_path = RuntimeConfig::path_for(project_dir);
    if runtime_path.exists() {
        println!("{} {}", style("Exists").yellow(), runtime_path.display());
    } else {
        std::fs::write(&runtime_path, RuntimeConfig::default().to_toml())
            .with_context(|| format!("Failed to write {}", runtime_path.display()))?;
        println!("{} {}", style("Wrote").green(), runtime_path.display());
    }
    Ok(())
}

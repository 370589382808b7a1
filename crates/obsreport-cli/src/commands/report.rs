use std::path::PathBuf;

use obsreport_core::{IdentityResolver, OutputMode, ReportConfig, run_all, run_erase};

pub struct ReportCommandConfig<'a> {
    pub kinds: &'a [String],
    pub config_path: Option<&'a str>,
    pub workdir: Option<&'a str>,
    pub output: Option<&'a str>,
    pub html: bool,
    pub xml: bool,
    pub purge: bool,
    pub high_resolution: bool,
    pub no_scaling: bool,
    pub titles: bool,
    pub timestamps: bool,
    pub now: Option<&'a str>,
    pub host: Option<&'a str>,
    pub erase: Option<&'a str>,
}

/// Merge the configuration file with command-line overrides.
pub fn build_config(cmd: &ReportCommandConfig<'_>) -> Result<ReportConfig, String> {
    let mut config = super::load_config(cmd.config_path)?;

    if !cmd.kinds.is_empty() {
        config.reports = super::parse_kinds(cmd.kinds)?;
    }
    if let Some(w) = cmd.workdir {
        config.workdir = PathBuf::from(w);
    }
    if let Some(o) = cmd.output {
        config.output_dir = Some(PathBuf::from(o));
    }
    if cmd.html {
        config.mode = OutputMode::Html;
    } else if cmd.xml {
        config.mode = OutputMode::Xml;
    }
    config.purge |= cmd.purge;
    config.high_resolution |= cmd.high_resolution;
    if cmd.no_scaling {
        config.scaling = false;
    }
    config.titles |= cmd.titles;
    config.timestamps |= cmd.timestamps;
    if let Some(t) = cmd.now {
        config.now = Some(super::parse_time(t)?);
    }
    if let Some(h) = cmd.host {
        config.host_name = Some(h.to_string());
    }
    if let Some(e) = cmd.erase {
        config.erase = super::split_list(e);
    }

    config.validate().map_err(|e| e.to_string())?;
    if config.reports.is_empty() && config.erase.is_empty() {
        return Err("nothing to do: name at least one report or --erase".to_string());
    }
    Ok(config)
}

pub fn run(cmd: ReportCommandConfig<'_>) {
    let config = match build_config(&cmd) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    log::debug!(
        "workdir={} mode={:?} reports={:?}",
        config.workdir.display(),
        config.mode,
        config.reports
    );

    let outcomes = match run_all(&config, &IdentityResolver) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let dir = config.output_path();
    println!("Reports in {}", dir.display());
    let mut failed = 0;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(files) => println!("  {:<16} {} file(s)", outcome.kind.as_str(), files.len()),
            Err(e) => {
                failed += 1;
                eprintln!("  {:<16} FAILED: {e}", outcome.kind.as_str());
            }
        }
    }

    if !config.erase.is_empty() {
        match run_erase(&config) {
            Ok(n) => println!(
                "Erased history of {} in {n} bucket(s)",
                config.erase.join(", ")
            ),
            Err(e) => {
                failed += 1;
                eprintln!("Erase failed: {e}");
            }
        }
    }

    if failed > 0 {
        std::process::exit(1);
    }
}

//! Command-line front end for obsreport.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "obsreport")]
#[command(about = "Render a monitoring agent's stored history as reports and plots")]
#[command(version = obsreport_core::VERSION)]
struct Cli {
    /// Log progress (info level)
    #[arg(long, global = true)]
    verbose: bool,

    /// Log everything (debug level)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one or more reports: lastseen, performance, classes, all_locks,
    /// active_locks, audit, monitor_now, monitor_history
    Report {
        /// Report kinds to run, in order
        kinds: Vec<String>,

        /// JSON configuration file; flags override its values
        #[arg(long)]
        config: Option<String>,

        /// Agent work directory holding the stores
        #[arg(long)]
        workdir: Option<String>,

        /// Output directory (default: <workdir>/reports)
        #[arg(long)]
        output: Option<String>,

        /// Write HTML reports
        #[arg(long, conflicts_with = "xml")]
        html: bool,

        /// Write XML reports
        #[arg(long)]
        xml: bool,

        /// Delete expired ledger entries while reporting
        #[arg(long)]
        purge: bool,

        /// One plot point per measurement interval instead of hourly chunks
        #[arg(long)]
        resolution: bool,

        /// Plot raw values instead of values normalized by the weekly maxima
        #[arg(long)]
        no_scaling: bool,

        /// Write column titles into graph matrices
        #[arg(long)]
        titles: bool,

        /// Append a time stamp to the output directory name
        #[arg(long)]
        timestamps: bool,

        /// Reference time: Unix seconds or RFC 3339 (default: now)
        #[arg(long)]
        now: Option<String>,

        /// Host name used in report titles
        #[arg(long)]
        host: Option<String>,

        /// Comma-separated observables whose history is erased after reporting
        #[arg(long)]
        erase: Option<String>,
    },

    /// List report kinds and observables
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    commands::init_logging(cli.verbose, cli.debug);

    match cli.command {
        Commands::Report {
            kinds,
            config,
            workdir,
            output,
            html,
            xml,
            purge,
            resolution,
            no_scaling,
            titles,
            timestamps,
            now,
            host,
            erase,
        } => commands::report::run(commands::report::ReportCommandConfig {
            kinds: &kinds,
            config_path: config.as_deref(),
            workdir: workdir.as_deref(),
            output: output.as_deref(),
            html,
            xml,
            purge,
            high_resolution: resolution,
            no_scaling,
            titles,
            timestamps,
            now: now.as_deref(),
            host: host.as_deref(),
            erase: erase.as_deref(),
        }),
        Commands::List { json } => commands::list::run(json),
    }
}

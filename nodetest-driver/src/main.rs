// Batch schedulers driven by this tool only run on Unix systems
#[cfg(not(unix))]
fn main() {
    eprintln!("nodetest-driver is only supported on Unix systems (Linux/macOS).");
    std::process::exit(1);
}

#[cfg(unix)]
mod unix_main {
    use anyhow::{Context, Result};
    use clap::{Parser, builder::styling};
    use env_logger::Builder;
    use log::{LevelFilter, error, info};
    use std::path::PathBuf;

    use nodetest::config::NodetestConfig;
    use nodetest::driver::NodeTestDriver;
    use nodetest::scheduler::{BatchSystem, create_scheduler_interface};
    use nodetest::status::ConsoleSink;

    const STYLES: styling::Styles = styling::Styles::styled()
        .header(styling::AnsiColor::Green.on_default().bold())
        .usage(styling::AnsiColor::Green.on_default().bold())
        .literal(styling::AnsiColor::Cyan.on_default().bold())
        .placeholder(styling::AnsiColor::Cyan.on_default());

    #[derive(Parser, Debug)]
    #[command(name = "nodetest-driver")]
    #[command(about = "Run paired diagnostic jobs to test node and interconnect integrity", long_about = None)]
    #[command(styles = STYLES)]
    struct Args {
        /// Batch system to use (LSF or PBS)
        #[arg(required_unless_present = "print_config")]
        batch: Option<String>,

        /// Project allocation charged for the jobs
        #[arg(short, long)]
        account: Option<String>,

        /// Queue (or PBS reservation) on which tests are submitted
        #[arg(short, long)]
        queue: Option<String>,

        /// Search pattern for nodes
        #[arg(short, long)]
        nodes: Option<String>,

        /// Case template directory to execute
        #[arg(short, long)]
        case: Option<PathBuf>,

        /// Submit reserved pairs held and force them onto the reserved nodes
        #[arg(short, long)]
        force: bool,

        /// Root directory for run output
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Enable debug logging
        #[arg(short, long)]
        verbose: bool,

        /// Configuration file read after the standard locations
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print the effective configuration and exit
        #[arg(long)]
        print_config: bool,
    }

    fn load_config(args: &Args) -> Result<NodetestConfig> {
        let mut config = match &args.config {
            Some(path) => {
                let mut files: Vec<PathBuf> = nodetest::config::ConfigPaths::new()
                    .existing_paths()
                    .into_iter()
                    .cloned()
                    .collect();
                files.push(path.clone());
                NodetestConfig::load_from_files(&files)?
            }
            None => NodetestConfig::load()?,
        };

        let run = &mut config.run;
        if let Some(batch) = &args.batch {
            run.batch = batch.clone();
        }
        if let Some(account) = &args.account {
            run.account = account.clone();
        }
        if let Some(queue) = &args.queue {
            run.queue = queue.clone();
        }
        if let Some(nodes) = &args.nodes {
            run.node_filter = nodes.clone();
        }
        if let Some(case) = &args.case {
            run.case_path = case.clone();
        }
        if let Some(output) = &args.output {
            run.output_path = output.clone();
        }
        run.force |= args.force;
        run.verbose |= args.verbose;

        if let Err(errors) = config.validate() {
            anyhow::bail!("Invalid configuration:\n  {}", errors.join("\n  "));
        }
        Ok(config)
    }

    fn run(config: NodetestConfig) -> Result<bool> {
        let batch: BatchSystem = config.run.batch.parse()?;
        let scheduler = create_scheduler_interface(batch, &config.scheduler)
            .context("Failed to create scheduler interface")?;

        let summary = NodeTestDriver::new(config, scheduler)
            .with_sink(Box::new(ConsoleSink::new(true)))
            .run()?;

        info!(
            "{} pairs tested, {} with errors",
            summary.total_jobs, summary.error_count
        );
        println!("\nNodetest complete!");
        println!("Results in: {}", summary.results_dir.display());
        Ok(summary.passed())
    }

    pub fn main() {
        let args = Args::parse();

        let config = match load_config(&args) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {:#}", e);
                std::process::exit(1);
            }
        };

        if args.print_config {
            match config.to_toml() {
                Ok(content) => print!("{}", content),
                Err(e) => {
                    eprintln!("Error: {:#}", e);
                    std::process::exit(1);
                }
            }
            return;
        }

        let level = if config.run.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        };
        Builder::new().filter_level(level).parse_default_env().init();

        match run(config) {
            Ok(true) => {}
            Ok(false) => std::process::exit(2),
            Err(e) => {
                error!("Node test failed: {:#}", e);
                std::process::exit(1);
            }
        }
    }
}

#[cfg(unix)]
fn main() {
    unix_main::main();
}

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use rsice::icepack::HistoryPlot;
use rsice::pipeline;
use rsice::render::render_svg_file;
use rsice_components::components::mebm::{
    default_initial_temperature, Mebm, MebmGrid, MebmOptions,
};
use rsice_core::config::PipelineConfig;
use rsice_core::history::{HistoryOptions, TracerName};
use rsice_core::transforms::SeriesTransform;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(author, version, about = "Sea-ice ensemble statistics and plots")]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Plot ensemble members with mean and ±σ for one month
    Plot {
        /// Pipeline configuration (TOML)
        #[arg(long)]
        config: PathBuf,
        /// Calendar month 1-12, overrides the configuration
        #[arg(long)]
        month: Option<u32>,
        /// SVG output path, overrides the configuration
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print mean and σ per year for one month
    Stats {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        month: Option<u32>,
    },
    /// Plot one Icepack history variable at one grid cell for several runs
    Icepack {
        /// Directory containing `runs/<run>/history`
        #[arg(long, default_value = ".")]
        icepack_dirs: PathBuf,
        /// Run name, repeat for several runs
        #[arg(long = "run", required = true)]
        runs: Vec<String>,
        /// History file name, the first file of each run by default
        #[arg(long)]
        file: Option<String>,
        /// Variable to plot
        #[arg(long)]
        var: String,
        /// Grid cell on `ni`
        #[arg(long, default_value_t = 0)]
        cell: usize,
        /// Average blocks of this many history steps
        #[arg(long)]
        resample: Option<usize>,
        /// Plot the running total
        #[arg(long)]
        cumulative: bool,
        /// Multiply values by this factor after accumulating
        #[arg(long, default_value_t = 1.0)]
        mult: f64,
        /// Add pond volume `volp`/`volpn`
        #[arg(long)]
        volp: bool,
        /// Add net surface heat flux `snhf`
        #[arg(long)]
        snhf: bool,
        /// Add the pond freshwater budget (needs --volp)
        #[arg(long)]
        pnd_budget: bool,
        #[arg(long)]
        no_sst_above_frz: bool,
        /// Copy a tracer out of `trcr`, as <index>=<name>
        #[arg(long)]
        trcr: Vec<TracerName>,
        /// Copy a category tracer out of `trcrn`, as <index>=<name>
        #[arg(long)]
        trcrn: Vec<TracerName>,
        #[arg(long, default_value = "icepack.svg")]
        output: PathBuf,
    },
    /// Run the single-column moist energy balance model
    Mebm {
        /// Years to integrate
        #[arg(long, default_value_t = 30)]
        years: usize,
        /// Radiative forcing [W m^-2]
        #[arg(long, default_value_t = 0.0)]
        forcing: f64,
        #[arg(long)]
        no_albedo_feedback: bool,
        #[arg(long)]
        no_ice_thermodynamics: bool,
        /// Write annual-mean profiles as CSV
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "rsice=debug,rsice_core=debug,rsice_components=debug"
    } else {
        "rsice=info,rsice_core=info,rsice_components=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_config(path: &Path) -> anyhow::Result<PipelineConfig> {
    PipelineConfig::from_file(path)
        .with_context(|| format!("reading configuration {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Plot {
            config,
            month,
            output,
        } => {
            let cfg = load_config(&config)?;
            let result = pipeline::run(&cfg, month)?;
            let spec = result.plot_spec(&cfg)?;
            let path = output.unwrap_or_else(|| cfg.plot.output.clone());
            render_svg_file(&spec, &path)?;
            println!("Figure: {}", path.display());
        }
        Command::Stats { config, month } => {
            let cfg = load_config(&config)?;
            let result = pipeline::run(&cfg, month)?;
            print!("{}", result.stats_table()?);
        }
        Command::Icepack {
            icepack_dirs,
            runs,
            file,
            var,
            cell,
            resample,
            cumulative,
            mult,
            volp,
            snhf,
            pnd_budget,
            no_sst_above_frz,
            trcr,
            trcrn,
            output,
        } => {
            let plot = HistoryPlot {
                filename: file,
                cell,
                options: HistoryOptions {
                    sst_above_frz: !no_sst_above_frz,
                    volp,
                    snhf,
                    pnd_budget,
                    trcr,
                    trcrn,
                },
                transform: SeriesTransform {
                    resample,
                    cumulative,
                    mult,
                },
                ..HistoryPlot::new(&icepack_dirs, runs, &var)
            };
            let spec = plot.plot_spec()?;
            render_svg_file(&spec, &output)?;
            println!("Figure: {}", output.display());
        }
        Command::Mebm {
            years,
            forcing,
            no_albedo_feedback,
            no_ice_thermodynamics,
            output,
        } => {
            let grid = MebmGrid {
                years,
                ..MebmGrid::default()
            };
            let options = MebmOptions {
                forcing,
                sea_ice_albedo: !no_albedo_feedback,
                sea_ice_thermodynamics: !no_ice_thermodynamics,
            };
            let model = Mebm::default();
            let out = model.run(&grid, &default_initial_temperature(&grid.x()), &options)?;

            println!(
                "Global-mean surface temperature = {:.1} °C",
                out.diagnostics.global_mean_temperature
            );
            println!(
                "Equator-to-pole surface temperature difference = {:.1} °C",
                out.diagnostics.equator_to_pole_difference
            );
            println!(
                "Global-mean top-of-atmosphere energy imbalance = {:.1} W m^-2",
                out.diagnostics.toa_imbalance
            );

            if let Some(path) = output {
                std::fs::write(&path, out.annual_mean_csv())
                    .with_context(|| format!("writing {}", path.display()))?;
                println!("Profiles: {}", path.display());
            }
        }
    }

    Ok(())
}

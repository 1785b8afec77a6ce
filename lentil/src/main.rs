use clap::{Parser, Subcommand};
use lentil::run_fit::{run_fit, FitArgs};
use lentil::run_sim::{run_sim_rating_data, SimArgs};

/// Cross-classified linear mixed-effects modeling of rating data
#[derive(Parser, Debug)]
#[command(version, about, long_about, term_width = 80)]
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fit the mixed-effects model with variational inference
    Fit(FitArgs),

    /// Simulate rating data from the generative model
    Simulate(SimArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.commands {
        Commands::Fit(args) => {
            run_fit(args)?;
        }
        Commands::Simulate(args) => {
            run_sim_rating_data(args)?;
        }
    }

    Ok(())
}

use clap::{Parser, Subcommand};
use sample_builder::{
    check_no_identical_build_files, clean_samples, prepare_samples, GeneratorOptions,
    DEFAULT_BUILD_FILE_SUFFIX,
};
use std::path::PathBuf;

/// For example: `cargo run --bin sample-builder -- --samples-file samples.toml prepare --max-projects 10`
#[derive(Parser)]
#[command(about, long_about = None)]
struct Cli {
    /// The samples definition file
    #[arg(long, default_value = "samples.toml")]
    samples_file: PathBuf,

    /// Where generated samples are written
    #[arg(long, default_value = "build/samples")]
    out_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate every configured sample
    Prepare {
        #[arg(long)]
        max_projects: Option<usize>,
    },
    /// Remove generated samples
    Clean,
    /// Fail when two generated build files have identical content
    Check {
        #[arg(long, default_value = DEFAULT_BUILD_FILE_SUFFIX)]
        suffix: String,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let options = GeneratorOptions::default()
        .samples_file(cli.samples_file)
        .out_dir(cli.out_dir);

    match cli.command {
        Command::Prepare { max_projects } => {
            let fingerprints = prepare_samples(&options.max_projects(max_projects))?;
            for (name, fingerprint) in fingerprints {
                println!("{name} {fingerprint}");
            }
        }
        Command::Clean => clean_samples(&options)?,
        Command::Check { suffix } => {
            let duplicates = check_no_identical_build_files(&options.out_dir, &suffix)?;
            if !duplicates.is_empty() {
                anyhow::bail!("Found {} groups of identical build files", duplicates.len());
            }
        }
    }

    Ok(())
}

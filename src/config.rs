use std::path::PathBuf;

use clap::Parser;

use crate::{bench::DEFAULT_GAS, revision::Revision};

/// Colon-separated list of directories to look for contract files in.
pub const SEARCH_DIRS_VAR: &str = "EVM_RUNNER_SEARCH_DIRS";

/// Deploy a contract and time repeated calls to it
#[derive(Parser, Debug)]
#[command(name = "runner", version, about, long_about = None)]
pub struct Args {
    /// Path to the hex contract code to deploy and run
    #[arg(long)]
    pub contract_code_path: PathBuf,

    /// Hex of calldata to use when calling the contract
    #[arg(long)]
    pub calldata: String,

    /// Number of times to run the benchmark
    #[arg(long)]
    pub num_runs: usize,

    /// Gas limit for both the deployment and every call
    #[arg(long, default_value_t = DEFAULT_GAS, allow_negative_numbers = true)]
    pub gas: i64,

    /// Hard fork to execute under
    #[arg(long, default_value_t = Revision::London)]
    pub revision: Revision,

    /// Extra directory to look for a relative contract path in (repeatable)
    #[arg(long = "search-dir")]
    pub search_dir: Vec<PathBuf>,

    /// Dump the execution trace of the first call to stderr as JSON lines
    #[arg(long)]
    pub trace: bool,
}

impl Args {
    /// Search directories: command line first, then the environment, then `../..`.
    pub fn search_dirs(&self) -> Vec<PathBuf> {
        self.search_dirs_from(std::env::var(SEARCH_DIRS_VAR).ok().as_deref())
    }

    fn search_dirs_from(&self, env: Option<&str>) -> Vec<PathBuf> {
        let mut dirs = self.search_dir.clone();
        if let Some(env) = env {
            dirs.extend(
                env.split(':')
                    .filter(|dir| !dir.is_empty())
                    .map(PathBuf::from),
            );
        }
        dirs.push(PathBuf::from("../.."));
        dirs
    }
}

use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use thiserror::Error;

use crate::{
    common::{
        self, Word,
        address::{Address, addr},
        decode_hex,
        message::Message,
        word::decode_error_string,
    },
    executor::{ExecutionResult, Executor, Status},
    host::Host,
    revision::Revision,
};

pub const DEFAULT_GAS: i64 = 1_000_000_000;

pub const CALLER: Address = addr("0x1000000000000000000000000000000000000001");

/// 1 ETH in wei.
pub const CALLER_BALANCE: u64 = 1_000_000_000_000_000_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Deploy,
    Call,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Deploy => f.write_str("deploy"),
            Stage::Call => f.write_str("call"),
        }
    }
}

#[derive(Error, Debug)]
pub enum BenchError {
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    MalformedHex(#[from] common::error::Error),
    #[error("Engine error: {0}")]
    EngineInit(String),
    #[error("{stage} failed with status: {status}")]
    Execution { stage: Stage, status: Status },
}

/// Execution engine handle, acquired once per run and passed around explicitly.
pub struct Engine {
    revision: Revision,
    executor: Executor,
}

impl Engine {
    pub fn acquire(revision: Revision) -> Self {
        tracing::debug!(%revision, "engine acquired");
        Self {
            revision,
            executor: Executor::new(),
        }
    }

    pub fn revision(&self) -> Revision {
        self.revision
    }

    pub fn release(self) {
        drop(self);
    }

    pub fn execute<H: Host>(&mut self, message: &Message<'_>, host: &mut H) -> ExecutionResult {
        self.executor.execute(self.revision, message, host)
    }

    /// Run `code` as init code and return where the runtime code landed.
    pub fn deploy<H: Host>(
        &mut self,
        host: &mut H,
        sender: Address,
        code: &[u8],
        gas: i64,
    ) -> Result<Deployment, BenchError> {
        let message = Message::create(sender, code, gas);
        let result = self.execute(&message, host);
        tracing::debug!(status = %result.status, "create");
        if !result.is_success() {
            log_revert(&result);
            return Err(BenchError::Execution {
                stage: Stage::Deploy,
                status: result.status,
            });
        }

        let address = result
            .create_address
            .ok_or_else(|| BenchError::EngineInit("create returned no address".to_string()))?;
        let code_size = host.code_size(&address);
        tracing::info!(%address, code_size, "deployed");
        Ok(Deployment {
            address,
            gas_used: result.gas_used,
            code_size,
        })
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        tracing::debug!(revision = %self.revision, "engine released");
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Deployment {
    pub address: Address,
    pub gas_used: i64,
    pub code_size: usize,
}

#[derive(Clone, Copy, Debug)]
pub struct Measurement {
    pub elapsed: Duration,
    pub gas_used: i64,
}

impl Measurement {
    pub fn millis(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}

/// Timed repetitions of one message. Stops after the first failed execution.
pub struct Benchmark<'e, 'h, 'm, H: Host> {
    engine: &'e mut Engine,
    host: &'h mut H,
    message: Message<'m>,
    remaining: usize,
}

pub fn run_benchmarks<'e, 'h, 'm, H: Host>(
    engine: &'e mut Engine,
    message: Message<'m>,
    host: &'h mut H,
    n: usize,
) -> Benchmark<'e, 'h, 'm, H> {
    Benchmark {
        engine,
        host,
        message,
        remaining: n,
    }
}

impl<H: Host> Iterator for Benchmark<'_, '_, '_, H> {
    type Item = Result<Measurement, BenchError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let start = Instant::now();
        let result = self.engine.execute(&self.message, self.host);
        let elapsed = start.elapsed();

        if !result.is_success() {
            log_revert(&result);
            self.remaining = 0;
            return Some(Err(BenchError::Execution {
                stage: Stage::Call,
                status: result.status,
            }));
        }
        Some(Ok(Measurement {
            elapsed,
            gas_used: result.gas_used,
        }))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

fn log_revert(result: &ExecutionResult) {
    if result.status != Status::Revert {
        return;
    }
    match decode_error_string(&result.output) {
        Some(reason) => tracing::warn!(reason = %reason, "reverted"),
        None => tracing::warn!(output = %common::encode_hex(&result.output), "reverted"),
    }
}

/// Read hex-encoded code from `path`, falling back to each of `search_dirs`
/// for a relative path that does not exist.
pub fn load_contract(path: &Path, search_dirs: &[PathBuf]) -> Result<Vec<u8>, BenchError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && path.is_relative() => {
            let found = search_dirs
                .iter()
                .map(|dir| dir.join(path))
                .find(|candidate| candidate.is_file());
            let Some(candidate) = found else {
                return Err(BenchError::Io {
                    path: path.to_path_buf(),
                    source: e,
                });
            };
            tracing::debug!(path = %candidate.display(), "contract found in search dir");
            std::fs::read_to_string(&candidate).map_err(|source| BenchError::Io {
                path: candidate.clone(),
                source,
            })?
        }
        Err(source) => {
            return Err(BenchError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    Ok(decode_hex(text.trim())?)
}

/// Host pre-state for a run: the caller holds 1 ETH.
pub fn fund_caller<H: Host>(host: &mut H) {
    host.set_balance(&CALLER, Word::from(CALLER_BALANCE));
}

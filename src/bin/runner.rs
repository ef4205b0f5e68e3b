use std::io::Write;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use evm_runner::{
    bench::{CALLER, Engine, fund_caller, load_contract, run_benchmarks},
    common::{decode_hex, message::Message},
    config::Args,
    executor::Executor,
    host::MockedHost,
    revision::Revision,
    tracer::{EventTracer as _, LoggingTracer},
};

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> eyre::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let code = load_contract(&args.contract_code_path, &args.search_dirs())?;
    let calldata = decode_hex(&args.calldata)?;
    tracing::debug!(
        revision = %args.revision,
        gas = args.gas,
        code = code.len(),
        calldata = calldata.len(),
        "starting"
    );

    let mut host = MockedHost::new();
    fund_caller(&mut host);

    let mut engine = Engine::acquire(args.revision);
    let deployment = engine.deploy(&mut host, CALLER, &code, args.gas)?;
    tracing::info!(gas_used = deployment.gas_used, "deploy");
    let message = Message::call(CALLER, deployment.address, &calldata, args.gas);

    if args.trace {
        trace(engine.revision(), &message, &host)?;
    }

    let mut stdout = std::io::stdout().lock();
    for measurement in run_benchmarks(&mut engine, message, &mut host, args.num_runs) {
        let measurement = measurement?;
        tracing::info!(gas_used = measurement.gas_used, "run");
        writeln!(stdout, "{}", measurement.millis())?;
    }

    engine.release();
    Ok(())
}

/// Execute `message` once on a copy of the host and print every event.
fn trace(revision: Revision, message: &Message<'_>, host: &MockedHost) -> eyre::Result<()> {
    let mut host = host.clone();
    let mut executor = Executor::with_tracer(LoggingTracer::default());
    let result = executor.execute(revision, message, &mut host);
    tracing::info!(status = %result.status, gas_used = result.gas_used, "traced");

    let mut stderr = std::io::stderr().lock();
    for event in executor.tracer_mut().take() {
        writeln!(stderr, "{}", serde_json::to_string(&event)?)?;
    }
    Ok(())
}

use evm_runner::{
    bench::{CALLER, DEFAULT_GAS, Engine, fund_caller, run_benchmarks},
    common::{Word, address::Address, decode_hex, encode_hex, message::Message},
    executor::{Executor, Status},
    host::{Host, MockedHost},
    revision::Revision,
};
use pretty_assertions::assert_eq;

/// Init code that returns `runtime` as the code to deploy.
fn init_for(runtime: &[u8]) -> Vec<u8> {
    let len = runtime.len() as u16;
    let [hi, lo] = len.to_be_bytes();
    // PUSH2 len DUP1 PUSH1 12 PUSH1 0 CODECOPY PUSH1 0 RETURN
    let mut code = vec![0x61, hi, lo, 0x80, 0x60, 0x0c, 0x60, 0x00, 0x39, 0x60, 0x00, 0xf3];
    code.extend_from_slice(runtime);
    code
}

fn funded() -> MockedHost {
    let mut host = MockedHost::new();
    fund_caller(&mut host);
    host
}

#[test]
fn test_store_calldata() -> eyre::Result<()> {
    let mut host = funded();
    let mut engine = Engine::acquire(Revision::London);
    let runtime = decode_hex("600035600055")?;
    let deployment = engine.deploy(&mut host, CALLER, &init_for(&runtime), DEFAULT_GAS)?;
    assert_eq!(deployment.address, CALLER.create(0));
    assert_eq!(host.code(&deployment.address), runtime);

    let input = decode_hex(&format!("{}01", "00".repeat(31)))?;
    let message = Message::call(CALLER, deployment.address, &input, DEFAULT_GAS);
    let result = engine.execute(&message, &mut host);
    assert_eq!(result.status, Status::Success);
    assert!(result.output.is_empty());
    // PUSH1 + CALLDATALOAD + PUSH1 + cold SSTORE of a fresh slot
    assert_eq!(result.gas_used, 3 + 3 + 3 + 22100);
    assert_eq!(
        host.get_storage(&deployment.address, &Word::zero()),
        Word::from_bytes(&input)
    );
    Ok(())
}

#[test]
fn test_empty_calldata() -> eyre::Result<()> {
    let calldata = decode_hex("")?;
    assert!(calldata.is_empty());

    let mut host = funded();
    let mut engine = Engine::acquire(Revision::London);
    let deployment = engine.deploy(
        &mut host,
        CALLER,
        &init_for(&decode_hex("600035600055")?),
        DEFAULT_GAS,
    )?;
    let message = Message::call(CALLER, deployment.address, &calldata, DEFAULT_GAS);
    let result = engine.execute(&message, &mut host);
    assert_eq!(result.status, Status::Success);
    assert_eq!(host.get_storage(&deployment.address, &Word::zero()), Word::zero());
    Ok(())
}

#[test]
fn test_create_invalid_opcode() -> eyre::Result<()> {
    let mut host = funded();
    let message = Message::create(CALLER, &[0x60, 0x01, 0xfe], DEFAULT_GAS);
    let result = Executor::new().execute(Revision::London, &message, &mut host);
    assert_eq!(result.status, Status::Failure);
    assert_eq!(result.gas_left, 0);
    assert_eq!(result.create_address, None);
    assert_eq!(host.nonce(&CALLER), 0);
    assert!(!host.exists(&CALLER.create(0)));
    assert!(host.accounts.values().all(|acc| acc.code.is_empty()));
    Ok(())
}

#[test]
fn test_create_with_exhausted_nonce() -> eyre::Result<()> {
    let mut host = funded();
    host.set_nonce(&CALLER, u64::MAX);
    let accounts = host.accounts.len();

    let message = Message::create(CALLER, &[0x00], 100_000);
    let result = Executor::new().execute(Revision::London, &message, &mut host);
    assert_eq!(result.status, Status::Failure);
    assert_eq!(result.create_address, None);
    assert_eq!(host.nonce(&CALLER), u64::MAX);
    assert_eq!(host.accounts.len(), accounts);
    assert!(!host.exists(&CALLER.create(u64::MAX)));
    Ok(())
}

#[test]
fn test_create_result() -> eyre::Result<()> {
    let mut host = funded();
    let runtime = decode_hex("600035600055")?;
    let init = init_for(&runtime);
    let message = Message::create(CALLER, &init, DEFAULT_GAS);
    let result = Executor::new().execute(Revision::London, &message, &mut host);
    assert_eq!(result.status, Status::Success);
    assert_eq!(result.output, runtime);

    let address = CALLER.create(0);
    assert_eq!(result.create_address, Some(address));
    assert_eq!(host.nonce(&CALLER), 1);
    assert_eq!(host.nonce(&address), 1);
    // 4 pushes, DUP1, CODECOPY with one word of memory, code deposit
    assert_eq!(result.gas_used, 4 * 3 + 3 + (3 + 3 + 3) + 6 * 200);
    Ok(())
}

#[test]
fn test_second_deployment_gets_next_address() -> eyre::Result<()> {
    let mut host = funded();
    let mut engine = Engine::acquire(Revision::London);
    let init = init_for(&[0x00]);
    let first = engine.deploy(&mut host, CALLER, &init, DEFAULT_GAS)?;
    let second = engine.deploy(&mut host, CALLER, &init, DEFAULT_GAS)?;
    assert_eq!(first.address, CALLER.create(0));
    assert_eq!(second.address, CALLER.create(1));
    assert_ne!(first.address, second.address);
    Ok(())
}

#[test]
fn test_code_size_limit() -> eyre::Result<()> {
    let mut host = funded();
    let max = vec![0u8; 0x6000];
    let message = Message::create(CALLER, &init_for(&max), DEFAULT_GAS);
    let result = Executor::new().execute(Revision::London, &message, &mut host);
    assert_eq!(result.status, Status::Success);
    assert_eq!(host.code_size(&CALLER.create(0)), 0x6000);

    let oversized = vec![0u8; 0x6000 + 1];
    let message = Message::create(CALLER, &init_for(&oversized), DEFAULT_GAS);
    let result = Executor::new().execute(Revision::London, &message, &mut host);
    assert_eq!(result.status, Status::Failure);
    assert_eq!(result.gas_left, 0);
    assert!(result.output.is_empty());
    assert_eq!(host.code_size(&CALLER.create(1)), 0);
    Ok(())
}

#[test]
fn test_ef_prefix_rejected_from_london() -> eyre::Result<()> {
    let init = init_for(&[0xef]);

    let mut host = funded();
    let message = Message::create(CALLER, &init, DEFAULT_GAS);
    let result = Executor::new().execute(Revision::Berlin, &message, &mut host);
    assert_eq!(result.status, Status::Success);

    let mut host = funded();
    let result = Executor::new().execute(Revision::London, &message, &mut host);
    assert_eq!(result.status, Status::Failure);
    Ok(())
}

#[test]
fn test_create_with_value() -> eyre::Result<()> {
    let mut host = funded();
    let balance = host.balance(&CALLER);
    let init = init_for(&[0x00]);

    let message = Message::create(CALLER, &init, DEFAULT_GAS).with_value(Word::from(1000u64));
    let result = Executor::new().execute(Revision::London, &message, &mut host);
    assert_eq!(result.status, Status::Success);
    assert_eq!(host.balance(&CALLER.create(0)), Word::from(1000u64));
    assert_eq!(host.balance(&CALLER), balance - Word::from(1000u64));

    let poor = Address::from([0x42; 20]);
    let message = Message::create(poor, &init, DEFAULT_GAS).with_value(Word::one());
    let result = Executor::new().execute(Revision::London, &message, &mut host);
    assert_eq!(result.status, Status::Failure);
    assert!(!host.exists(&poor));
    Ok(())
}

#[test]
fn test_call_empty_code() -> eyre::Result<()> {
    let mut host = funded();
    let target = Address::from([0x77; 20]);
    let message = Message::call(CALLER, target, &[1, 2, 3], DEFAULT_GAS);
    let result = Executor::new().execute(Revision::London, &message, &mut host);
    assert_eq!(result.status, Status::Success);
    assert!(result.output.is_empty());
    assert_eq!(result.gas_used, 0);
    assert_eq!(result.gas_left, DEFAULT_GAS);
    Ok(())
}

#[test]
fn test_call_transfers_value() -> eyre::Result<()> {
    let mut host = funded();
    let target = Address::from([0x77; 20]);
    let message = Message::call(CALLER, target, &[], DEFAULT_GAS).with_value(Word::from(5u64));
    let result = Executor::new().execute(Revision::London, &message, &mut host);
    assert_eq!(result.status, Status::Success);
    assert_eq!(host.balance(&target), Word::from(5u64));

    let broke = Address::from([0x55; 20]);
    let message = Message::call(broke, target, &[], DEFAULT_GAS).with_value(Word::from(5u64));
    let result = Executor::new().execute(Revision::London, &message, &mut host);
    assert_eq!(result.status, Status::Failure);
    assert_eq!(result.gas_left, 0);
    assert_eq!(host.balance(&target), Word::from(5u64));
    Ok(())
}

#[test]
fn test_repeated_calls_are_deterministic() -> eyre::Result<()> {
    let runtime = decode_hex("600035600055")?;
    let input = decode_hex(&format!("{}2a", "00".repeat(31)))?;

    let run = || -> eyre::Result<_> {
        let mut host = funded();
        let mut engine = Engine::acquire(Revision::London);
        let deployment = engine.deploy(&mut host, CALLER, &init_for(&runtime), DEFAULT_GAS)?;
        let message = Message::call(CALLER, deployment.address, &input, DEFAULT_GAS);
        let first = engine.execute(&message, &mut host);
        let second = engine.execute(&message, &mut host);
        Ok((first, second))
    };

    let (first, second) = run()?;
    assert_eq!(first.status, second.status);
    assert_eq!(first.output, second.output);
    // the slot is no longer fresh on the second call
    assert!(second.gas_used < first.gas_used);

    let (again, _) = run()?;
    assert_eq!(again, first);
    Ok(())
}

#[test]
fn test_gas_used_within_limit() -> eyre::Result<()> {
    let codes = [
        "",
        "00",
        "600035600055",
        "6001600101",
        "60006000fd",
        "fe",
        "5b600056",
    ];
    for gas in [0, 10, 30_000, 1_000_000] {
        for code in codes {
            let mut host = funded();
            let target = Address::from([0x99; 20]);
            host.set_code(&target, decode_hex(code)?);
            let message = Message::call(CALLER, target, &[], gas);
            let result = Executor::new().execute(Revision::London, &message, &mut host);
            assert!(result.gas_used >= 0, "{code} with {gas}");
            assert!(result.gas_used <= gas, "{code} with {gas}");
            assert_eq!(result.gas_used + result.gas_left, gas);
        }
    }
    Ok(())
}

#[test]
fn test_initcode_size_limit() -> eyre::Result<()> {
    // 49152 bytes of STOP is the largest init code accepted from Shanghai
    let at_limit = vec![0x00; 49152];
    let over_limit = vec![0x00; 49153];
    for (revision, code, status) in [
        (Revision::Shanghai, &at_limit, Status::Success),
        (Revision::Shanghai, &over_limit, Status::Failure),
        (Revision::London, &over_limit, Status::Success),
    ] {
        let mut host = funded();
        let message = Message::create(CALLER, code, DEFAULT_GAS);
        let result = Executor::new().execute(revision, &message, &mut host);
        assert_eq!(result.status, status, "{revision} with {}", code.len());
        if status == Status::Failure {
            assert_eq!(host.nonce(&CALLER), 0);
        }
    }
    Ok(())
}

#[test]
fn test_zero_runs() -> eyre::Result<()> {
    let mut host = funded();
    let mut engine = Engine::acquire(Revision::London);
    let deployment = engine.deploy(&mut host, CALLER, &init_for(&[0x00]), DEFAULT_GAS)?;
    let message = Message::call(CALLER, deployment.address, &[], DEFAULT_GAS);
    let lines = run_benchmarks(&mut engine, message, &mut host, 0)
        .map(|m| m.map(|m| m.millis().to_string()))
        .collect::<Result<Vec<_>, _>>()?;
    assert!(lines.is_empty());
    engine.release();
    Ok(())
}

#[test]
fn test_hex_round_trip() -> eyre::Result<()> {
    for (text, normalized) in [
        ("0x600035600055", "600035600055"),
        ("0XABcd", "abcd"),
        ("", ""),
        ("0x", ""),
    ] {
        assert_eq!(encode_hex(&decode_hex(text)?), normalized);
    }
    assert!(decode_hex("0x123").is_err());
    assert!(decode_hex("xyz0").is_err());
    Ok(())
}

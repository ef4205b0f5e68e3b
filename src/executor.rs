use std::collections::{HashMap, HashSet};

use serde::Serialize;
use thiserror::Error;

use crate::{
    common::{
        Word,
        address::Address,
        hash::keccak256,
        message::{Call, Message, MessageKind},
    },
    decoder::{Bytecode, Decoder, Instruction},
    gas::{self, Schedule},
    host::{Host, Log, TxContext},
    revision::Revision,
    tracer::{CallType, Event, EventData, EventTracer, NoopTracer, StateEvent},
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("Stack overflow")]
    StackOverflow,
    #[error("Stack underflow")]
    StackUnderflow,
    #[error("Call depth limit reached")]
    CallDepthLimitReached,
    #[error("Invalid jump")]
    InvalidJump,
    #[error("Invalid opcode: {0:#02x}")]
    InvalidOpcode(u8),
    #[error("Undefined opcode: {0:#02x}")]
    UndefinedOpcode(u8),
    #[error("Call run out of gas")]
    OutOfGas,
    #[error("Negative gas limit: {0}")]
    NegativeGas(i64),
    #[error("Missing recipient")]
    MissingRecipient,
    #[error("Insufficient funds: have {have:?}, need {need:?}")]
    InsufficientFunds { have: Word, need: Word },
    #[error("Unallowed opcode from static call: {0:#02x}")]
    StaticCallViolation(u8),
    #[error("Return data out of bounds")]
    ReturnDataOutOfBounds,
    #[error("Code size {0} exceeds the limit")]
    CodeSizeLimit(usize),
    #[error("Init code size {0} exceeds the limit")]
    InitCodeSizeLimit(usize),
    #[error("Deployed code starts with 0xef")]
    InvalidCodePrefix,
    #[error("Address collision: {0}")]
    AddressCollision(Address),
    #[error("Nonce overflow: {0}")]
    NonceOverflow(Address),
}

impl ExecutorError {
    pub fn status(&self) -> Status {
        match self {
            ExecutorError::OutOfGas => Status::OutOfGas,
            _ => Status::Failure,
        }
    }
}

const STACK_LIMIT: usize = 1024;

const CALL_DEPTH_LIMIT: usize = 1024;

/// Nested frames recurse on the native stack; every this many levels
/// execution continues on a fresh thread.
const FRAMES_PER_STACK: usize = 16;

const FRAME_STACK_SIZE: usize = 16 * 1024 * 1024;

/// Offsets and sizes above this can never be paid for.
const MEMORY_LIMIT: u64 = u32::MAX as u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Revert,
    Failure,
    OutOfGas,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Status::Success => "success",
            Status::Revert => "revert",
            Status::Failure => "failure",
            Status::OutOfGas => "out of gas",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionResult {
    pub status: Status,
    pub gas_left: i64,
    pub gas_used: i64,
    /// Already included in `gas_left`.
    pub gas_refund: i64,
    pub output: Vec<u8>,
    pub create_address: Option<Address>,
}

impl ExecutionResult {
    fn failed(gas: i64, status: Status) -> Self {
        Self {
            status,
            gas_left: 0,
            gas_used: gas.max(0),
            gas_refund: 0,
            output: vec![],
            create_address: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

/// Storage access: (address, key, value before, value written).
/// A touch without a written value marks the slot as warm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTouch(pub Address, pub Word, pub Word, pub Option<Word>);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountTouch {
    Created(Address),
    Warm(Address),
    Nonce(Address, u64, u64),
    Value(Address, Word, Word),
    /// Code before the write.
    Code(Address, Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransientTouch(pub Address, pub Word, pub Word);

/// Machine state of a single call frame plus the journal of everything it changed.
#[derive(Debug, Default)]
pub struct Evm {
    pub memory: Vec<u8>,
    pub stack: Vec<Word>,
    pub gas: Gas,
    pub pc: usize,
    pub stopped: bool,
    pub reverted: bool,
    /// Output of this frame.
    pub ret: Vec<u8>,
    /// Output of the last nested call.
    pub returned: Vec<u8>,

    pub mem_cost: u64,
    pub logs: Vec<Log>,
    pub state: Vec<StateTouch>,
    pub account: Vec<AccountTouch>,
    pub transient: Vec<TransientTouch>,
}

impl Evm {
    pub fn new(gas: i64) -> Self {
        Self {
            gas: Gas::new(gas),
            ..Default::default()
        }
    }

    pub fn push(&mut self, value: Word) -> Result<(), ExecutorError> {
        if self.stack.len() >= STACK_LIMIT {
            return Err(ExecutorError::StackOverflow);
        }
        self.stack.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<Word, ExecutorError> {
        self.stack.pop().ok_or(ExecutorError::StackUnderflow)
    }

    pub fn gas(&mut self, cost: u64) -> Result<(), ExecutorError> {
        self.gas.sub(cost)
    }

    /// Charge for and grow memory to cover `size` bytes at `offset`.
    /// Returns the range as `usize`; zero-sized ranges never expand.
    pub fn expand(&mut self, offset: &Word, size: &Word) -> Result<(usize, usize), ExecutorError> {
        if size.is_zero() {
            return Ok((0, 0));
        }
        let (offset, size) = match (offset.to_u64(), size.to_u64()) {
            (Some(offset), Some(size)) if offset <= MEMORY_LIMIT && size <= MEMORY_LIMIT => {
                (offset, size)
            }
            _ => return Err(ExecutorError::OutOfGas),
        };
        let words = (offset + size).div_ceil(32);
        let cost = gas::memory_cost(words);
        if cost > self.mem_cost {
            self.gas(cost - self.mem_cost)?;
            self.mem_cost = cost;
            self.memory.resize(words as usize * 32, 0);
        }
        Ok((offset as usize, size as usize))
    }

    /// Hand the journal of a successful nested frame to this one.
    pub fn merge(&mut self, other: Evm) {
        self.state.extend(other.state);
        self.account.extend(other.account);
        self.transient.extend(other.transient);
        self.logs.extend(other.logs);
        self.gas.refund += other.gas.refund;
    }

    /// Undo every change recorded by this frame, newest first.
    pub(crate) fn revert<H: Host>(self, tx: &mut Tx<'_, H>) {
        for StateTouch(address, key, val, new) in self.state.into_iter().rev() {
            if new.is_some() {
                tx.host.set_storage(&address, key, val);
            } else {
                tx.warm.remove(&(address, key));
            }
        }
        for touch in self.account.into_iter().rev() {
            match touch {
                AccountTouch::Created(address) => tx.host.remove(&address),
                AccountTouch::Warm(address) => {
                    tx.accessed.remove(&address);
                }
                AccountTouch::Nonce(address, val, _new) => tx.host.set_nonce(&address, val),
                AccountTouch::Value(address, val, _new) => tx.host.set_balance(&address, val),
                AccountTouch::Code(address, code) => tx.host.set_code(&address, code),
            }
        }
        for TransientTouch(address, key, val) in self.transient.into_iter().rev() {
            tx.transient.insert((address, key), val);
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Gas {
    pub limit: i64,
    pub used: i64,
    pub refund: i64,
}

impl Gas {
    pub fn new(limit: i64) -> Self {
        Self {
            limit,
            used: 0,
            refund: 0,
        }
    }

    pub fn remaining(&self) -> i64 {
        self.limit - self.used
    }

    /// Give back gas a nested frame did not use.
    pub fn reclaim(&mut self, gas: i64) {
        self.used -= gas;
    }

    pub fn sub(&mut self, gas: u64) -> Result<(), ExecutorError> {
        if gas > self.remaining() as u64 {
            return Err(ExecutorError::OutOfGas);
        }
        self.used += gas as i64;
        Ok(())
    }

    pub fn consume_all(&mut self) {
        self.used = self.limit;
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Context {
    pub origin: Address,
    pub depth: usize,
    pub call_type: CallType,
    pub is_static: bool,
}

/// Transaction-wide bookkeeping shared by all frames of one `execute`.
pub(crate) struct Tx<'h, H: Host> {
    pub(crate) host: &'h mut H,
    pub(crate) revision: Revision,
    pub(crate) schedule: &'static Schedule,
    pub(crate) context: TxContext,
    pub(crate) accessed: HashSet<Address>,
    pub(crate) warm: HashSet<(Address, Word)>,
    pub(crate) original: HashMap<(Address, Word), Word>,
    pub(crate) transient: HashMap<(Address, Word), Word>,
}

impl<'h, H: Host> Tx<'h, H> {
    fn new(host: &'h mut H, revision: Revision) -> Self {
        let context = host.tx_context();
        Self {
            host,
            revision,
            schedule: revision.schedule(),
            context,
            accessed: HashSet::new(),
            warm: HashSet::new(),
            original: HashMap::new(),
            transient: HashMap::new(),
        }
    }

    /// Warm up the account and return the cost of accessing it.
    fn access_account(&mut self, evm: &mut Evm, address: &Address) -> u64 {
        let cold = self.accessed.insert(*address);
        if cold {
            evm.account.push(AccountTouch::Warm(*address));
        }
        self.schedule.account_access_cost(cold)
    }

    fn is_cold_slot(&self, address: &Address, key: &Word) -> bool {
        !self.warm.contains(&(*address, *key))
    }

    fn warm_slot(&mut self, evm: &mut Evm, address: &Address, key: &Word, val: Word) {
        if self.warm.insert((*address, *key)) {
            evm.state.push(StateTouch(*address, *key, val, None));
        }
    }

    /// EIP-161 empty or non-existent.
    fn is_dead(&self, address: &Address) -> bool {
        !self.host.exists(address)
            || (self.host.nonce(address) == 0
                && self.host.balance(address).is_zero()
                && self.host.code_size(address) == 0)
    }

    fn ensure(&mut self, evm: &mut Evm, address: &Address) {
        if !self.host.exists(address) {
            evm.account.push(AccountTouch::Created(*address));
        }
    }

    fn set_nonce(&mut self, evm: &mut Evm, address: &Address, nonce: u64) {
        self.ensure(evm, address);
        let val = self.host.nonce(address);
        self.host.set_nonce(address, nonce);
        evm.account.push(AccountTouch::Nonce(*address, val, nonce));
    }

    fn set_balance(&mut self, evm: &mut Evm, address: &Address, balance: Word) {
        self.ensure(evm, address);
        let val = self.host.balance(address);
        self.host.set_balance(address, balance);
        evm.account.push(AccountTouch::Value(*address, val, balance));
    }

    fn set_code(&mut self, evm: &mut Evm, address: &Address, code: Vec<u8>) {
        self.ensure(evm, address);
        let val = self.host.code(address);
        self.host.set_code(address, code);
        evm.account.push(AccountTouch::Code(*address, val));
    }

    fn sstore(&mut self, evm: &mut Evm, address: &Address, key: Word, val: Word, new: Word) {
        self.ensure(evm, address);
        self.host.set_storage(address, key, new);
        evm.state.push(StateTouch(*address, key, val, Some(new)));
    }

    fn tstore(&mut self, evm: &mut Evm, address: &Address, key: Word, new: Word) {
        let val = self.transient.insert((*address, key), new).unwrap_or_default();
        evm.transient.push(TransientTouch(*address, key, val));
    }

    fn transfer(
        &mut self,
        evm: &mut Evm,
        from: &Address,
        to: &Address,
        value: Word,
    ) -> Result<(), ExecutorError> {
        if value.is_zero() {
            return Ok(());
        }
        let src = self.host.balance(from);
        if src < value {
            return Err(ExecutorError::InsufficientFunds {
                have: src,
                need: value,
            });
        }
        if from == to {
            return Ok(());
        }
        self.set_balance(evm, from, src - value);
        let dst = self.host.balance(to);
        let (dst, _) = dst.overflowing_add(value);
        self.set_balance(evm, to, dst);
        Ok(())
    }
}

/// Copy `src[offset..]` into `dst`, padding with zeros past the end of `src`.
fn copy_padded(dst: &mut [u8], src: &[u8], offset: &Word) {
    match offset.to_usize() {
        Some(offset) if offset < src.len() => {
            let n = dst.len().min(src.len() - offset);
            dst[..n].copy_from_slice(&src[offset..offset + n]);
            dst[n..].fill(0);
        }
        _ => dst.fill(0),
    }
}

#[derive(Default)]
pub struct Executor<T: EventTracer = NoopTracer> {
    tracer: T,
}

impl Executor<NoopTracer> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: EventTracer> Executor<T> {
    pub fn with_tracer(tracer: T) -> Self {
        Self { tracer }
    }

    pub fn tracer_mut(&mut self) -> &mut T {
        &mut self.tracer
    }

    /// Execute a top-level message against `host`.
    ///
    /// State changes are applied to `host` only if the result is
    /// [`Status::Success`]; any other outcome leaves it untouched.
    pub fn execute<H: Host>(
        &mut self,
        revision: Revision,
        message: &Message<'_>,
        host: &mut H,
    ) -> ExecutionResult {
        if message.gas < 0 {
            tracing::debug!("rejected: {}", ExecutorError::NegativeGas(message.gas));
            return ExecutionResult::failed(0, Status::Failure);
        }
        if message.depth > CALL_DEPTH_LIMIT {
            tracing::debug!("rejected: {}", ExecutorError::CallDepthLimitReached);
            return ExecutionResult::failed(message.gas, Status::Failure);
        }

        let mut tx = Tx::new(host, revision);
        let origin = if tx.context.origin.is_zero() {
            message.sender
        } else {
            tx.context.origin
        };
        let mut root = Evm::default();
        tx.access_account(&mut root, &message.sender);
        if tx.schedule.warm_coinbase {
            let coinbase = tx.context.coinbase;
            tx.access_account(&mut root, &coinbase);
        }

        let (status, evm, created) = match message.kind {
            MessageKind::Create => {
                let nonce = tx.host.nonce(&message.sender);
                if nonce == u64::MAX {
                    tracing::debug!("rejected: {}", ExecutorError::NonceOverflow(message.sender));
                    return ExecutionResult::failed(message.gas, Status::Failure);
                }
                let address = message.sender.create(nonce);
                tx.set_nonce(&mut root, &message.sender, nonce + 1);
                tx.access_account(&mut root, &address);

                let call = Call {
                    data: vec![],
                    value: message.value,
                    from: message.sender,
                    to: address,
                    gas: message.gas,
                };
                let ctx = Context {
                    origin,
                    depth: message.depth,
                    call_type: CallType::Create,
                    is_static: false,
                };
                let (status, evm) = self.create(&mut tx, call, message.input.to_vec(), ctx);
                (status, evm, Some(address))
            }
            MessageKind::Call => {
                let Some(to) = message.recipient else {
                    tracing::debug!("rejected: {}", ExecutorError::MissingRecipient);
                    return ExecutionResult::failed(message.gas, Status::Failure);
                };
                tx.access_account(&mut root, &to);

                let call = Call {
                    data: message.input.to_vec(),
                    value: message.value,
                    from: message.sender,
                    to,
                    gas: message.gas,
                };
                let ctx = Context {
                    origin,
                    depth: message.depth,
                    call_type: CallType::Call,
                    is_static: false,
                };
                let code = tx.host.code(&to);
                let (status, evm) = self.call(&mut tx, call, code, ctx);
                (status, evm, None)
            }
        };

        let mut gas_left = evm.gas.remaining();
        let mut gas_refund = 0;
        let output = evm.ret.clone();
        if status == Status::Success {
            root.merge(evm);
            let gas_used = message.gas - gas_left;
            gas_refund = root.gas.refund.max(0).min(gas_used / tx.schedule.refund_quotient);
            gas_left += gas_refund;
            for log in std::mem::take(&mut root.logs) {
                tx.host.emit_log(log);
            }
        } else {
            evm.revert(&mut tx);
            root.revert(&mut tx);
        }

        ExecutionResult {
            status,
            gas_left,
            gas_used: message.gas - gas_left,
            gas_refund,
            output,
            create_address: created.filter(|_| status == Status::Success),
        }
    }

    /// Run `code` as a message call frame. Moves `call.value` for CALL and CALLCODE.
    fn call<H: Host>(
        &mut self,
        tx: &mut Tx<'_, H>,
        call: Call,
        code: Vec<u8>,
        ctx: Context,
    ) -> (Status, Evm) {
        let mut evm = Evm::new(call.gas);
        self.enter(&call, &ctx);

        if matches!(ctx.call_type, CallType::Call | CallType::Callcode) {
            if let Err(e) = tx.transfer(&mut evm, &call.from, &call.to, call.value) {
                let status = self.halt(&mut evm, e, &ctx);
                return self.leave(status, evm, &ctx);
            }
        }

        let status = if code.is_empty() {
            Status::Success
        } else {
            let code = Decoder::decode(code);
            self.run(tx, &code, &call, &mut evm, ctx)
        };
        self.leave(status, evm, &ctx)
    }

    /// Run `init_code` for a new account at `call.to` and deploy what it returns.
    fn create<H: Host>(
        &mut self,
        tx: &mut Tx<'_, H>,
        call: Call,
        init_code: Vec<u8>,
        ctx: Context,
    ) -> (Status, Evm) {
        let address = call.to;
        let mut evm = Evm::new(call.gas);
        self.enter(&call, &ctx);

        if let Some(limit) = tx.schedule.max_initcode_size {
            if init_code.len() > limit {
                let status = self.halt(
                    &mut evm,
                    ExecutorError::InitCodeSizeLimit(init_code.len()),
                    &ctx,
                );
                return self.leave(status, evm, &ctx);
            }
        }
        if tx.host.nonce(&address) != 0 || tx.host.code_size(&address) > 0 {
            let status = self.halt(&mut evm, ExecutorError::AddressCollision(address), &ctx);
            return self.leave(status, evm, &ctx);
        }

        tx.set_nonce(&mut evm, &address, 1);
        if let Err(e) = tx.transfer(&mut evm, &call.from, &address, call.value) {
            let status = self.halt(&mut evm, e, &ctx);
            return self.leave(status, evm, &ctx);
        }

        let code = Decoder::decode(init_code);
        let mut status = self.run(tx, &code, &call, &mut evm, ctx);
        if status == Status::Success {
            if let Err(e) = self.deposit(tx, &mut evm, &address, &ctx) {
                status = self.halt(&mut evm, e, &ctx);
            }
        }
        self.leave(status, evm, &ctx)
    }

    fn deposit<H: Host>(
        &mut self,
        tx: &mut Tx<'_, H>,
        evm: &mut Evm,
        address: &Address,
        ctx: &Context,
    ) -> Result<(), ExecutorError> {
        let size = evm.ret.len();
        if size > tx.schedule.max_code_size {
            return Err(ExecutorError::CodeSizeLimit(size));
        }
        if tx.schedule.reject_ef_code && evm.ret.first() == Some(&0xef) {
            return Err(ExecutorError::InvalidCodePrefix);
        }
        evm.gas(gas::CODE_DEPOSIT_PER_BYTE * size as u64)?;

        let code = evm.ret.clone();
        tx.set_code(evm, address, code);
        if self.tracer.enabled() {
            self.tracer.push(Event {
                data: EventData::Deploy {
                    address: *address,
                    size,
                },
                depth: ctx.depth,
                reverted: false,
            });
        }
        Ok(())
    }

    fn run<H: Host>(
        &mut self,
        tx: &mut Tx<'_, H>,
        code: &Bytecode,
        call: &Call,
        evm: &mut Evm,
        ctx: Context,
    ) -> Status {
        while !evm.stopped && evm.pc < code.instructions.len() {
            let instruction = &code.instructions[evm.pc];

            if self.tracer.enabled() {
                self.tracer.push(Event {
                    data: EventData::OpCode {
                        pc: instruction.offset,
                        op: instruction.opcode.code,
                        name: instruction.opcode.name(),
                        gas: evm.gas.remaining(),
                        stack: evm.stack.len(),
                    },
                    depth: ctx.depth,
                    reverted: false,
                });
            }

            if let Err(e) = self.execute_instruction(tx, code, call, evm, ctx, instruction) {
                return self.halt(evm, e, &ctx);
            }
        }

        if evm.reverted {
            Status::Revert
        } else {
            Status::Success
        }
    }

    /// Exceptional halt: all gas is consumed and the output dropped.
    fn halt(&mut self, evm: &mut Evm, e: ExecutorError, ctx: &Context) -> Status {
        tracing::debug!(depth = ctx.depth, pc = evm.pc, "halt: {e}");
        evm.stopped = true;
        evm.reverted = true;
        evm.gas.consume_all();
        evm.ret.clear();
        e.status()
    }

    fn enter(&mut self, call: &Call, ctx: &Context) {
        if self.tracer.enabled() {
            self.tracer.push(Event {
                data: EventData::Call {
                    call_type: ctx.call_type,
                    from: call.from,
                    to: call.to,
                    value: call.value,
                    gas: call.gas,
                    data: call.data.as_slice().into(),
                },
                depth: ctx.depth,
                reverted: false,
            });
        }
    }

    fn leave(&mut self, status: Status, evm: Evm, ctx: &Context) -> (Status, Evm) {
        if self.tracer.enabled() {
            self.tracer.push(Event {
                data: EventData::Return {
                    status,
                    data: evm.ret.as_slice().into(),
                    gas_used: evm.gas.used,
                },
                depth: ctx.depth,
                reverted: status != Status::Success,
            });
        }
        (status, evm)
    }

    /// Run `f` for a frame at `depth` against a forked tracer and join it back afterwards.
    fn nested(
        &mut self,
        depth: usize,
        f: impl FnOnce(&mut Self) -> (Status, Evm) + Send,
    ) -> (Status, Evm) {
        let fork = self.tracer.fork();
        let parent = std::mem::replace(&mut self.tracer, fork);
        let (status, evm) = if depth % FRAMES_PER_STACK == 0 {
            self.on_fresh_stack(f)
        } else {
            f(self)
        };
        let child = std::mem::replace(&mut self.tracer, parent);
        self.tracer.join(child, status != Status::Success);
        (status, evm)
    }

    fn on_fresh_stack(
        &mut self,
        f: impl FnOnce(&mut Self) -> (Status, Evm) + Send,
    ) -> (Status, Evm) {
        std::thread::scope(|scope| {
            let spawned = std::thread::Builder::new()
                .name("evm-frames".to_string())
                .stack_size(FRAME_STACK_SIZE)
                .spawn_scoped(scope, move || f(self));
            match spawned {
                Ok(handle) => match handle.join() {
                    Ok(result) => result,
                    Err(panic) => std::panic::resume_unwind(panic),
                },
                Err(e) => {
                    tracing::warn!("failed to spawn frame thread: {e}");
                    (Status::Failure, Evm::default())
                }
            }
        })
    }

    fn execute_instruction<H: Host>(
        &mut self,
        tx: &mut Tx<'_, H>,
        code: &Bytecode,
        call: &Call,
        evm: &mut Evm,
        ctx: Context,
        instruction: &Instruction,
    ) -> Result<(), ExecutorError> {
        let opcode = instruction.opcode.code;
        if !instruction.opcode.is_defined() || !tx.revision.supports(opcode) {
            return Err(ExecutorError::UndefinedOpcode(opcode));
        }
        evm.gas(instruction.opcode.gas as u64)?;

        let mut pc_increment = true;
        let this = call.to;

        match opcode {
            // 0x00: STOP
            0x00 => {
                evm.stopped = true;
                evm.ret.clear();
            }
            // 0x01..0x0b: Arithmetic Operations
            0x01 => {
                // ADD
                let a = evm.pop()?;
                let b = evm.pop()?;
                let (res, _) = a.overflowing_add(b);
                evm.push(res)?;
            }
            0x02 => {
                // MUL
                let a = evm.pop()?;
                let b = evm.pop()?;
                let (res, _) = a.overflowing_mul(b);
                evm.push(res)?;
            }
            0x03 => {
                // SUB
                let a = evm.pop()?;
                let b = evm.pop()?;
                let (res, _) = a.overflowing_sub(b);
                evm.push(res)?;
            }
            0x04 => {
                // DIV
                let a = evm.pop()?;
                let b = evm.pop()?;
                if b.is_zero() {
                    evm.push(Word::zero())?;
                } else {
                    evm.push(a / b)?;
                }
            }
            0x05 => {
                // SDIV
                let a = evm.pop()?;
                let b = evm.pop()?;
                evm.push(a.signed_div(b))?;
            }
            0x06 => {
                // MOD
                let a = evm.pop()?;
                let b = evm.pop()?;
                if b.is_zero() {
                    evm.push(Word::zero())?;
                } else {
                    evm.push(a % b)?;
                }
            }
            0x07 => {
                // SMOD
                let a = evm.pop()?;
                let b = evm.pop()?;
                evm.push(a.signed_rem(b))?;
            }
            0x08 => {
                // ADDMOD
                let a = evm.pop()?;
                let b = evm.pop()?;
                let n = evm.pop()?;
                evm.push(a.add_modulo(&b, &n))?;
            }
            0x09 => {
                // MULMOD
                let a = evm.pop()?;
                let b = evm.pop()?;
                let n = evm.pop()?;
                evm.push(a.mul_modulo(&b, &n))?;
            }
            0x0a => {
                // EXP
                let base = evm.pop()?;
                let exponent = evm.pop()?;
                evm.gas(gas::EXP_BYTE * exponent.byte_len() as u64)?;
                evm.push(base.pow(exponent))?;
            }
            0x0b => {
                // SIGNEXTEND
                let size = evm.pop()?;
                let value = evm.pop()?;
                evm.push(value.sign_extend(&size))?;
            }

            // 0x10s: Comparison & Bitwise Logic
            0x10 => {
                // LT
                let a = evm.pop()?;
                let b = evm.pop()?;
                evm.push((a < b).into())?;
            }
            0x11 => {
                // GT
                let a = evm.pop()?;
                let b = evm.pop()?;
                evm.push((a > b).into())?;
            }
            0x12 => {
                // SLT
                let a = evm.pop()?;
                let b = evm.pop()?;
                evm.push(a.signed_lt(&b).into())?;
            }
            0x13 => {
                // SGT
                let a = evm.pop()?;
                let b = evm.pop()?;
                evm.push(a.signed_gt(&b).into())?;
            }
            0x14 => {
                // EQ
                let a = evm.pop()?;
                let b = evm.pop()?;
                evm.push((a == b).into())?;
            }
            0x15 => {
                // ISZERO
                let a = evm.pop()?;
                evm.push(a.is_zero().into())?;
            }
            0x16 => {
                // AND
                let a = evm.pop()?;
                let b = evm.pop()?;
                evm.push(a & b)?;
            }
            0x17 => {
                // OR
                let a = evm.pop()?;
                let b = evm.pop()?;
                evm.push(a | b)?;
            }
            0x18 => {
                // XOR
                let a = evm.pop()?;
                let b = evm.pop()?;
                evm.push(a ^ b)?;
            }
            0x19 => {
                // NOT
                let a = evm.pop()?;
                evm.push(!a)?;
            }
            0x1a => {
                // BYTE
                let index = evm.pop()?;
                let value = evm.pop()?;
                evm.push(value.byte(&index))?;
            }
            0x1b => {
                // SHL
                let shift = evm.pop()?;
                let value = evm.pop()?;
                let ret = shift.to_usize().map(|s| value << s).unwrap_or_default();
                evm.push(ret)?;
            }
            0x1c => {
                // SHR
                let shift = evm.pop()?;
                let value = evm.pop()?;
                let ret = shift.to_usize().map(|s| value >> s).unwrap_or_default();
                evm.push(ret)?;
            }
            0x1d => {
                // SAR
                let shift = evm.pop()?;
                let value = evm.pop()?;
                evm.push(value.sar(&shift))?;
            }

            0x20 => {
                // SHA3 (KECCAK256)
                let offset = evm.pop()?;
                let size = evm.pop()?;
                let (offset, size) = evm.expand(&offset, &size)?;
                evm.gas(gas::KECCAK_WORD * (size as u64).div_ceil(32))?;
                let hash = keccak256(&evm.memory[offset..offset + size]);
                evm.push(Word::from_bytes(&hash))?;
            }

            // 30-3f
            0x30 => {
                // ADDRESS
                evm.push((&this).into())?;
            }
            0x31 => {
                // BALANCE
                let address: Address = (&evm.pop()?).into();
                let cost = tx.access_account(evm, &address);
                evm.gas(cost)?;
                evm.push(tx.host.balance(&address))?;
            }
            0x32 => {
                // ORIGIN
                evm.push((&ctx.origin).into())?;
            }
            0x33 => {
                // CALLER
                evm.push((&call.from).into())?;
            }
            0x34 => {
                // CALLVALUE
                evm.push(call.value)?;
            }
            0x35 => {
                // CALLDATALOAD
                let offset = evm.pop()?;
                let mut data = [0u8; 32];
                copy_padded(&mut data, &call.data, &offset);
                evm.push(Word::from_bytes(&data))?;
            }
            0x36 => {
                // CALLDATASIZE
                evm.push(Word::from(call.data.len()))?;
            }
            0x37 => {
                // CALLDATACOPY
                let dest_offset = evm.pop()?;
                let offset = evm.pop()?;
                let size = evm.pop()?;
                let (dest, size) = evm.expand(&dest_offset, &size)?;
                evm.gas(gas::copy_cost(size))?;
                copy_padded(&mut evm.memory[dest..dest + size], &call.data, &offset);
            }
            0x38 => {
                // CODESIZE
                evm.push(code.bytecode.len().into())?;
            }
            0x39 => {
                // CODECOPY
                let dest_offset = evm.pop()?;
                let offset = evm.pop()?;
                let size = evm.pop()?;
                let (dest, size) = evm.expand(&dest_offset, &size)?;
                evm.gas(gas::copy_cost(size))?;
                copy_padded(&mut evm.memory[dest..dest + size], &code.bytecode, &offset);
            }
            0x3a => {
                // GASPRICE
                evm.push(tx.context.gas_price)?;
            }
            0x3b => {
                // EXTCODESIZE
                let address: Address = (&evm.pop()?).into();
                let cost = tx.access_account(evm, &address);
                evm.gas(cost)?;
                evm.push(Word::from(tx.host.code_size(&address)))?;
            }
            0x3c => {
                // EXTCODECOPY
                let address: Address = (&evm.pop()?).into();
                let dest_offset = evm.pop()?;
                let offset = evm.pop()?;
                let size = evm.pop()?;
                let cost = tx.access_account(evm, &address);
                evm.gas(cost)?;
                let (dest, size) = evm.expand(&dest_offset, &size)?;
                evm.gas(gas::copy_cost(size))?;
                let ext = tx.host.code(&address);
                copy_padded(&mut evm.memory[dest..dest + size], &ext, &offset);
            }
            0x3d => {
                // RETURNDATASIZE
                evm.push(evm.returned.len().into())?;
            }
            0x3e => {
                // RETURNDATACOPY
                let dest_offset = evm.pop()?;
                let offset = evm.pop()?;
                let size = evm.pop()?;
                let end = offset
                    .checked_add(size)
                    .and_then(|end| end.to_usize())
                    .ok_or(ExecutorError::ReturnDataOutOfBounds)?;
                if end > evm.returned.len() {
                    return Err(ExecutorError::ReturnDataOutOfBounds);
                }
                let (dest, size) = evm.expand(&dest_offset, &size)?;
                evm.gas(gas::copy_cost(size))?;
                let start = end - size;
                let data = evm.returned[start..end].to_vec();
                evm.memory[dest..dest + size].copy_from_slice(&data);
            }
            0x3f => {
                // EXTCODEHASH
                let address: Address = (&evm.pop()?).into();
                let cost = tx.access_account(evm, &address);
                evm.gas(cost)?;
                if tx.is_dead(&address) {
                    evm.push(Word::zero())?;
                } else {
                    evm.push(tx.host.code_hash(&address))?;
                }
            }

            // 40-4a
            0x40 => {
                // BLOCKHASH
                let number = evm.pop()?;
                let current = tx.context.number;
                let hash = match number.to_u64() {
                    Some(number) if number < current && current - number <= 256 => {
                        tx.host.block_hash(number)
                    }
                    _ => Word::zero(),
                };
                evm.push(hash)?;
            }
            0x41 => {
                // COINBASE
                evm.push((&tx.context.coinbase).into())?;
            }
            0x42 => {
                // TIMESTAMP
                evm.push(tx.context.timestamp.into())?;
            }
            0x43 => {
                // NUMBER
                evm.push(tx.context.number.into())?;
            }
            0x44 => {
                // PREVRANDAO
                evm.push(tx.context.prev_randao)?;
            }
            0x45 => {
                // GASLIMIT
                evm.push(tx.context.gas_limit.into())?;
            }
            0x46 => {
                // CHAINID
                evm.push(tx.context.chain_id)?;
            }
            0x47 => {
                // SELFBALANCE
                evm.push(tx.host.balance(&this))?;
            }
            0x48 => {
                // BASEFEE
                evm.push(tx.context.base_fee)?;
            }
            0x49 => {
                // BLOBHASH
                let index = evm.pop()?;
                let hash = index
                    .to_usize()
                    .and_then(|index| tx.context.blob_hashes.get(index))
                    .copied()
                    .unwrap_or_default();
                evm.push(hash)?;
            }
            0x4a => {
                // BLOBBASEFEE
                evm.push(tx.context.blob_base_fee)?;
            }

            // 0x50s: Stack, Memory, Storage and Flow Operations
            0x50 => {
                // POP
                evm.pop()?;
            }
            0x51 => {
                // MLOAD
                let offset = evm.pop()?;
                let (offset, _) = evm.expand(&offset, &Word::from(32u64))?;
                let value = Word::from_bytes(&evm.memory[offset..offset + 32]);
                evm.push(value)?;
            }
            0x52 => {
                // MSTORE
                let offset = evm.pop()?;
                let value = evm.pop()?;
                let (offset, _) = evm.expand(&offset, &Word::from(32u64))?;
                evm.memory[offset..offset + 32].copy_from_slice(&value.into_bytes());
            }
            0x53 => {
                // MSTORE8
                let offset = evm.pop()?;
                let value = evm.pop()?;
                let (offset, _) = evm.expand(&offset, &Word::one())?;
                evm.memory[offset] = value.into_bytes()[31];
            }
            0x54 => {
                // SLOAD
                let key = evm.pop()?;
                let cold = tx.is_cold_slot(&this, &key);
                evm.gas(tx.schedule.sload_cost(cold))?;
                let val = tx.host.get_storage(&this, &key);
                tx.warm_slot(evm, &this, &key, val);
                evm.push(val)?;
                if self.tracer.enabled() {
                    self.tracer.push(Event {
                        data: EventData::State(StateEvent::Get {
                            address: this,
                            key,
                            val,
                        }),
                        depth: ctx.depth,
                        reverted: false,
                    });
                }
            }
            0x55 => {
                // SSTORE
                if ctx.is_static {
                    return Err(ExecutorError::StaticCallViolation(opcode));
                }
                let key = evm.pop()?;
                let new = evm.pop()?;
                // EIP-2200: no SSTORE within the call stipend
                if evm.gas.remaining() <= gas::CALL_STIPEND {
                    return Err(ExecutorError::OutOfGas);
                }

                let val = tx.host.get_storage(&this, &key);
                let original = *tx.original.entry((this, key)).or_insert(val);
                let cold = tx.is_cold_slot(&this, &key);
                let (cost, refund) = tx.schedule.sstore_cost(&original, &val, &new, cold);
                evm.gas(cost)?;
                evm.gas.refund += refund;

                tx.warm_slot(evm, &this, &key, val);
                tx.sstore(evm, &this, key, val, new);
                if self.tracer.enabled() {
                    self.tracer.push(Event {
                        data: EventData::State(StateEvent::Put {
                            address: this,
                            key,
                            val,
                            new,
                        }),
                        depth: ctx.depth,
                        reverted: false,
                    });
                }
            }
            0x56 => {
                // JUMP
                let dest = evm.pop()?;
                evm.pc = dest
                    .to_usize()
                    .and_then(|dest| code.resolve_jump(dest))
                    .ok_or(ExecutorError::InvalidJump)?;
                pc_increment = false;
            }
            0x57 => {
                // JUMPI
                let dest = evm.pop()?;
                let cond = evm.pop()?;
                if !cond.is_zero() {
                    evm.pc = dest
                        .to_usize()
                        .and_then(|dest| code.resolve_jump(dest))
                        .ok_or(ExecutorError::InvalidJump)?;
                    pc_increment = false;
                }
            }
            0x58 => {
                // PC
                evm.push(Word::from(instruction.offset))?;
            }
            0x59 => {
                // MSIZE
                evm.push(Word::from(evm.memory.len()))?;
            }
            0x5a => {
                // GAS
                evm.push(Word::from(evm.gas.remaining() as u64))?;
            }
            0x5b => {
                // JUMPDEST: noop, a valid destination for JUMP/JUMPI
            }
            0x5c => {
                // TLOAD
                let key = evm.pop()?;
                let val = tx.transient.get(&(this, key)).copied().unwrap_or_default();
                evm.push(val)?;
            }
            0x5d => {
                // TSTORE
                if ctx.is_static {
                    return Err(ExecutorError::StaticCallViolation(opcode));
                }
                let key = evm.pop()?;
                let val = evm.pop()?;
                tx.tstore(evm, &this, key, val);
            }
            0x5e => {
                // MCOPY
                let dest_offset = evm.pop()?;
                let offset = evm.pop()?;
                let size = evm.pop()?;
                evm.expand(&offset, &size)?;
                let (dest, size) = evm.expand(&dest_offset, &size)?;
                evm.gas(gas::copy_cost(size))?;
                if size > 0 {
                    // both ranges are in memory after the expansion above
                    let src = offset.to_usize().ok_or(ExecutorError::OutOfGas)?;
                    evm.memory.copy_within(src..src + size, dest);
                }
            }
            0x5f => {
                // PUSH0
                evm.push(Word::zero())?;
            }

            0x60..=0x7f => {
                // PUSH1..PUSH32
                let arg = instruction.argument.as_deref().unwrap_or_default();
                evm.push(Word::from_bytes(arg))?;
            }

            0x80..=0x8f => {
                // DUP1..DUP16
                let n = instruction.opcode.n as usize;
                if evm.stack.len() < n {
                    return Err(ExecutorError::StackUnderflow);
                }
                let val = evm.stack[evm.stack.len() - n];
                evm.push(val)?;
            }

            0x90..=0x9f => {
                // SWAP1..SWAP16
                let n = instruction.opcode.n as usize;
                if evm.stack.len() <= n {
                    return Err(ExecutorError::StackUnderflow);
                }
                let stack_len = evm.stack.len();
                evm.stack.swap(stack_len - 1, stack_len - 1 - n);
            }

            0xa0..=0xa4 => {
                // LOG0..LOG4
                if ctx.is_static {
                    return Err(ExecutorError::StaticCallViolation(opcode));
                }
                let n = instruction.opcode.n as usize;
                let offset = evm.pop()?;
                let size = evm.pop()?;
                let mut topics = Vec::with_capacity(n);
                for _ in 0..n {
                    topics.push(evm.pop()?);
                }

                let (offset, size) = evm.expand(&offset, &size)?;
                evm.gas(gas::LOG_TOPIC * n as u64 + gas::LOG_DATA_BYTE * size as u64)?;
                let data = evm.memory[offset..offset + size].to_vec();
                evm.logs.push(Log {
                    address: this,
                    topics,
                    data: data.into(),
                });
            }

            0xf0 => {
                // CREATE
                if ctx.is_static {
                    return Err(ExecutorError::StaticCallViolation(opcode));
                }
                self.create_op(tx, call, evm, ctx, CallType::Create)?;
            }
            0xf1 => {
                // CALL
                self.call_op(tx, call, evm, ctx, CallType::Call)?;
            }
            0xf2 => {
                // CALLCODE
                // Creates a new sub context as if calling itself, but with the code of the given account.
                // In particular the storage [, the current sender and the current value] remain the same.
                // DELEGATECALL difference:  ^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^
                self.call_op(tx, call, evm, ctx, CallType::Callcode)?;
            }
            0xf3 | 0xfd => {
                // RETURN | REVERT
                let offset = evm.pop()?;
                let size = evm.pop()?;
                let (offset, size) = evm.expand(&offset, &size)?;
                evm.ret = evm.memory[offset..offset + size].to_vec();
                evm.stopped = true;
                evm.reverted = opcode == 0xfd;
            }
            0xf4 => {
                // DELEGATECALL
                self.call_op(tx, call, evm, ctx, CallType::Delegate)?;
            }
            0xf5 => {
                // CREATE2
                if ctx.is_static {
                    return Err(ExecutorError::StaticCallViolation(opcode));
                }
                self.create_op(tx, call, evm, ctx, CallType::Create2)?;
            }
            0xfa => {
                // STATICCALL
                self.call_op(tx, call, evm, ctx, CallType::Static)?;
            }
            0xfe => {
                // INVALID
                return Err(ExecutorError::InvalidOpcode(opcode));
            }
            0xff => {
                // SELFDESTRUCT
                if ctx.is_static {
                    return Err(ExecutorError::StaticCallViolation(opcode));
                }
                let beneficiary: Address = (&evm.pop()?).into();
                let balance = tx.host.balance(&this);

                let mut cost = tx.schedule.selfdestruct;
                let cold = !tx.accessed.contains(&beneficiary);
                if tx.schedule.access_lists && cold {
                    cost += tx.schedule.cold_account;
                }
                if !balance.is_zero() && tx.is_dead(&beneficiary) {
                    cost += gas::NEW_ACCOUNT;
                }
                evm.gas(cost)?;
                tx.access_account(evm, &beneficiary);

                if beneficiary != this {
                    tx.transfer(evm, &this, &beneficiary, balance)?;
                }
                evm.stopped = true;
                evm.ret.clear();
            }
            _ => {
                return Err(ExecutorError::UndefinedOpcode(opcode));
            }
        }

        if pc_increment {
            evm.pc += 1;
        }

        Ok(())
    }

    fn call_op<H: Host>(
        &mut self,
        tx: &mut Tx<'_, H>,
        call: &Call,
        evm: &mut Evm,
        ctx: Context,
        call_type: CallType,
    ) -> Result<(), ExecutorError> {
        let this = call.to;
        let requested = evm.pop()?;
        let address: Address = (&evm.pop()?).into();
        let value = if matches!(call_type, CallType::Call | CallType::Callcode) {
            evm.pop()?
        } else {
            Word::zero()
        };
        let args_offset = evm.pop()?;
        let args_size = evm.pop()?;
        let ret_offset = evm.pop()?;
        let ret_size = evm.pop()?;

        if ctx.is_static && call_type == CallType::Call && !value.is_zero() {
            return Err(ExecutorError::StaticCallViolation(0xf1));
        }

        let (args_offset, args_size) = evm.expand(&args_offset, &args_size)?;
        let (ret_offset, ret_size) = evm.expand(&ret_offset, &ret_size)?;

        let mut cost = tx.access_account(evm, &address);
        if !value.is_zero() {
            cost += gas::CALL_VALUE;
            if call_type == CallType::Call && tx.is_dead(&address) {
                cost += gas::NEW_ACCOUNT;
            }
        }
        evm.gas(cost)?;

        let available = gas::all_but_one_64th(evm.gas.remaining());
        let limit = requested
            .to_u64()
            .map_or(i64::MAX, |gas| gas.min(i64::MAX as u64) as i64)
            .min(available);
        evm.gas(limit as u64)?;
        let stipend = if value.is_zero() { 0 } else { gas::CALL_STIPEND };
        let inner_gas = limit + stipend;

        evm.returned.clear();
        if ctx.depth + 1 > CALL_DEPTH_LIMIT || tx.host.balance(&this) < value {
            tracing::debug!(depth = ctx.depth, "nested call rejected");
            evm.gas.reclaim(inner_gas);
            return evm.push(Word::zero());
        }

        let data = evm.memory[args_offset..args_offset + args_size].to_vec();
        let inner_call = match call_type {
            CallType::Callcode => Call {
                data,
                value,
                from: this,
                to: this,
                gas: inner_gas,
            },
            CallType::Delegate => Call {
                data,
                value: call.value,
                from: call.from,
                to: this,
                gas: inner_gas,
            },
            _ => Call {
                data,
                value,
                from: this,
                to: address,
                gas: inner_gas,
            },
        };
        let inner_ctx = Context {
            depth: ctx.depth + 1,
            call_type,
            is_static: ctx.is_static || call_type == CallType::Static,
            ..ctx
        };

        let code = tx.host.code(&address);
        let (status, mut inner_evm) = self.nested(inner_ctx.depth, |exe| {
            exe.call(tx, inner_call, code, inner_ctx)
        });

        evm.gas.reclaim(inner_evm.gas.remaining());
        let ret = std::mem::take(&mut inner_evm.ret);
        let copy = ret_size.min(ret.len());
        evm.memory[ret_offset..ret_offset + copy].copy_from_slice(&ret[..copy]);
        evm.returned = ret;

        if status == Status::Success {
            evm.merge(inner_evm);
            evm.push(Word::one())
        } else {
            inner_evm.revert(tx);
            evm.push(Word::zero())
        }
    }

    fn create_op<H: Host>(
        &mut self,
        tx: &mut Tx<'_, H>,
        call: &Call,
        evm: &mut Evm,
        ctx: Context,
        call_type: CallType,
    ) -> Result<(), ExecutorError> {
        let this = call.to;
        let value = evm.pop()?;
        let offset = evm.pop()?;
        let size = evm.pop()?;
        let salt = if call_type == CallType::Create2 {
            evm.pop()?
        } else {
            Word::zero()
        };

        let (offset, size) = evm.expand(&offset, &size)?;
        if let Some(limit) = tx.schedule.max_initcode_size {
            if size > limit {
                return Err(ExecutorError::InitCodeSizeLimit(size));
            }
        }
        let words = (size as u64).div_ceil(32);
        let mut cost = tx.schedule.initcode_word * words;
        if call_type == CallType::Create2 {
            cost += gas::KECCAK_WORD * words;
        }
        evm.gas(cost)?;

        let init_code = evm.memory[offset..offset + size].to_vec();
        evm.returned.clear();

        let nonce = tx.host.nonce(&this);
        if ctx.depth + 1 > CALL_DEPTH_LIMIT || tx.host.balance(&this) < value || nonce == u64::MAX {
            tracing::debug!(depth = ctx.depth, "nested create rejected");
            return evm.push(Word::zero());
        }

        tx.set_nonce(evm, &this, nonce + 1);
        let address = if call_type == CallType::Create2 {
            this.create2(&salt, &keccak256(&init_code))
        } else {
            this.create(nonce)
        };
        tx.access_account(evm, &address);

        let limit = gas::all_but_one_64th(evm.gas.remaining());
        evm.gas(limit as u64)?;

        let inner_call = Call {
            data: vec![],
            value,
            from: this,
            to: address,
            gas: limit,
        };
        let inner_ctx = Context {
            depth: ctx.depth + 1,
            call_type,
            ..ctx
        };
        let (status, mut inner_evm) =
            self.nested(inner_ctx.depth, |exe| {
                exe.create(tx, inner_call, init_code, inner_ctx)
            });

        evm.gas.reclaim(inner_evm.gas.remaining());
        if status == Status::Success {
            evm.merge(inner_evm);
            evm.push((&address).into())
        } else {
            evm.returned = std::mem::take(&mut inner_evm.ret);
            inner_evm.revert(tx);
            evm.push(Word::zero())
        }
    }
}

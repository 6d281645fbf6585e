/// In-memory stand-ins for the I2C bus and delay provider used by unit tests
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};

#[derive(Default)]
struct Registers {
    values: HashMap<u8, u8>,
    scripted: HashMap<u8, VecDeque<u8>>,
    raw_reads: VecDeque<u8>,
    writes: Vec<(u8, u8)>,
    commands: Vec<Vec<u8>>,
    failing: Option<u8>,
    pointer: Option<u8>,
}

/// Register map behind a single device address. Clones share state, so a
/// test can keep a handle while a driver owns another.
#[derive(Clone, Default)]
pub struct FakeBus {
    inner: Rc<RefCell<Registers>>,
}

impl FakeBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, register: u8, value: u8) {
        self.inner.borrow_mut().values.insert(register, value);
    }

    pub fn get(&self, register: u8) -> u8 {
        self.inner
            .borrow()
            .values
            .get(&register)
            .copied()
            .unwrap_or_default()
    }

    /// Queue values returned by successive reads of `register` before it
    /// falls back to the stored value.
    pub fn script(&self, register: u8, values: &[u8]) {
        self.inner
            .borrow_mut()
            .scripted
            .entry(register)
            .or_default()
            .extend(values.iter().copied());
    }

    /// Bytes returned by pointer-less reads.
    pub fn queue_raw(&self, bytes: &[u8]) {
        self.inner.borrow_mut().raw_reads.extend(bytes.iter().copied());
    }

    pub fn fail_on(&self, register: u8) {
        self.inner.borrow_mut().failing = Some(register);
    }

    pub fn writes(&self) -> Vec<(u8, u8)> {
        self.inner.borrow().writes.clone()
    }

    pub fn commands(&self) -> Vec<Vec<u8>> {
        self.inner.borrow().commands.clone()
    }
}

impl ErrorType for FakeBus {
    type Error = ErrorKind;
}

impl I2c for FakeBus {
    fn transaction(
        &mut self,
        _address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut guard = self.inner.borrow_mut();
        let regs = &mut *guard;
        regs.pointer = None;
        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => {
                    if let Some(&register) = bytes.first() {
                        if regs.failing == Some(register) {
                            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data));
                        }
                    }
                    match *bytes {
                        [register] => regs.pointer = Some(*register),
                        [register, value] => {
                            regs.writes.push((*register, *value));
                            regs.values.insert(*register, *value);
                            regs.commands.push(bytes.to_vec());
                        }
                        _ => regs.commands.push(bytes.to_vec()),
                    }
                }
                Operation::Read(buf) => match regs.pointer {
                    Some(register) => {
                        for (offset, slot) in buf.iter_mut().enumerate() {
                            let reg = register.wrapping_add(offset as u8);
                            let scripted = regs.scripted.get_mut(&reg).and_then(VecDeque::pop_front);
                            *slot = scripted
                                .or_else(|| regs.values.get(&reg).copied())
                                .unwrap_or_default();
                        }
                    }
                    None => {
                        for slot in buf.iter_mut() {
                            *slot = regs.raw_reads.pop_front().unwrap_or_default();
                        }
                    }
                },
            }
        }
        Ok(())
    }
}

pub struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

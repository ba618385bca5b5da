use chan_block::{Channel, Registers};

use crate::rng::Rng;

enum Opcode {
    End,
    Reserved,
    Unknown,
    Copy { len: u8, addr_hi: u8 },
    MemOp { op: u8, addr_hi: u8 },
    MathOp { op: u8, addr_hi: u8 },
    Set { base_b: bool, offset: u8 },
}

fn decode(op: u8) -> Opcode {
    if op & 0x80 != 0 {
        return Opcode::Set {
            base_b: op & 0x40 != 0,
            offset: op & 0x3F,
        };
    }
    match op & 0xF0 {
        0x40 => Opcode::MemOp {
            op: (op >> 2) & 0x3,
            addr_hi: op & 0x3,
        },
        0x50 => Opcode::MathOp {
            op: (op >> 2) & 0x3,
            addr_hi: op & 0x3,
        },
        0x10 => Opcode::Reserved,
        _ => match op & 0xE0 {
            0x00 => Opcode::End,
            0x20 => Opcode::Copy {
                len: ((op >> 3) & 0x3) + 1,
                addr_hi: op & 0x7,
            },
            _ => Opcode::Unknown,
        },
    }
}

/// Run one module (a short immutable bytecode program) to completion
/// against the shared register space. Never fails: an unknown opcode
/// advances one byte and continues, and a module that runs off its own
/// end simply stops, exactly as if it had hit `END`.
pub fn run_module(module: &[u8], registers: &mut Registers, rng: &mut Rng) {
    let mut pc = 0usize;
    while pc < module.len() {
        match decode(module[pc]) {
            Opcode::End => break,
            Opcode::Reserved => pc += 2,
            Opcode::Unknown => pc += 1,
            Opcode::Copy { len, addr_hi } => {
                let Some(&addr_low) = module.get(pc + 1) else {
                    break;
                };
                let base = ((addr_hi as u16) << 8) | addr_low as u16;
                let data_start = pc + 2;
                for i in 0..len as usize {
                    let Some(&byte) = module.get(data_start + i) else {
                        break;
                    };
                    registers.write(base + i as u16, byte);
                }
                pc = data_start + len as usize;
            }
            Opcode::MemOp { op, addr_hi } => {
                let Some(&addr_low) = module.get(pc + 1) else {
                    break;
                };
                let addr = ((addr_hi as u16) << 8) | addr_low as u16;
                exec_memop(op, addr, registers, rng);
                pc += 2;
            }
            Opcode::MathOp { op, addr_hi } => {
                if pc + 2 >= module.len() {
                    break;
                }
                let addr_low = module[pc + 1];
                let operand = module[pc + 2];
                let addr = ((addr_hi as u16) << 8) | addr_low as u16;
                exec_mathop(op, addr, operand, registers);
                pc += 3;
            }
            Opcode::Set { base_b, offset } => {
                let Some(&value) = module.get(pc + 1) else {
                    break;
                };
                exec_set(base_b, offset, value, registers);
                pc += 2;
            }
        }
    }
}

fn exec_memop(op: u8, addr: u16, registers: &mut Registers, rng: &mut Rng) {
    if op & 0x3 == 2 {
        let byte = registers.read(addr);
        registers.write(addr, byte >> 1);
        return;
    }

    let Some(channel) = Registers::channel_of(addr) else {
        return;
    };

    match op & 0x3 {
        0 => {
            let byte = registers.read(addr);
            registers.block_mut(channel).set_bank(byte);
        }
        1 => {
            let bank = registers.block(channel).bank();
            registers.write(addr, bank);
        }
        _ => {
            let (min, max) = {
                let block = registers.block(channel);
                (block.random_min(), block.random_max())
            };
            let value = rng.range_inclusive(min, max);
            registers.write(addr, value);
        }
    }
}

fn exec_mathop(op: u8, addr: u16, operand: u8, registers: &mut Registers) {
    let byte = registers.read(addr);
    let result = match op & 0x3 {
        0 => byte.wrapping_add(operand),
        1 => byte & operand,
        2 => byte | operand,
        _ => byte ^ operand,
    };
    registers.write(addr, result);
}

fn exec_set(base_b: bool, offset: u8, value: u8, registers: &mut Registers) {
    if base_b {
        registers.block_mut(Channel::B).set(offset, value);
        return;
    }
    let mask = registers.block(Channel::A).apply_channel_mask();
    if mask & 0x01 != 0 {
        registers.block_mut(Channel::A).set(offset, value);
    }
    if mask & 0x02 != 0 {
        registers.block_mut(Channel::B).set(offset, value);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chan_block::BASE_A;

    #[test]
    fn end_halts_immediately() {
        let mut regs = Registers::new();
        let mut rng = Rng::new(1);
        run_module(&[0x00], &mut regs, &mut rng);
        // no writes; a zeroed-then-defaulted block is unchanged
        assert_eq!(regs.a, Registers::new().a);
    }

    #[test]
    fn unknown_opcode_advances_one_byte() {
        let mut regs = Registers::new();
        let mut rng = Rng::new(1);
        // 0x60 is unclassified (top3 = 011); followed by a SET that
        // must still execute, proving we advanced past it by one byte.
        let module = [0x60, 0x80 | 0x00, 0x2A, 0x00];
        run_module(&module, &mut regs, &mut rng);
        assert_eq!(regs.read(BASE_A), 0x2A);
    }

    #[test]
    fn set_honors_apply_channel_mask() {
        let mut regs = Registers::new();
        regs.block_mut(Channel::A).set_apply_channel_mask(0x03);
        let mut rng = Rng::new(1);
        // SET base-A, offset 0x00, value 0x11
        run_module(&[0x80, 0x11, 0x00], &mut regs, &mut rng);
        assert_eq!(regs.block(Channel::A).get(0x00), 0x11);
        assert_eq!(regs.block(Channel::B).get(0x00), 0x11);
    }

    #[test]
    fn set_a_only_mask_does_not_mirror() {
        let mut regs = Registers::new();
        regs.block_mut(Channel::A).set_apply_channel_mask(0x01);
        let mut rng = Rng::new(1);
        run_module(&[0x80, 0x11, 0x00], &mut regs, &mut rng);
        assert_eq!(regs.block(Channel::A).get(0x00), 0x11);
        assert_eq!(regs.block(Channel::B).get(0x00), 0x00);
    }

    #[test]
    fn set_base_b_writes_b_directly() {
        let mut regs = Registers::new();
        regs.block_mut(Channel::A).set_apply_channel_mask(0x01); // A-only, irrelevant to c=1
        let mut rng = Rng::new(1);
        // SET base-B (c=1), offset 0x05, value 0x99
        run_module(&[0x80 | 0x40 | 0x05, 0x99, 0x00], &mut regs, &mut rng);
        assert_eq!(regs.block(Channel::B).get(0x05), 0x99);
    }

    #[test]
    fn copy_writes_consecutive_bytes() {
        let mut regs = Registers::new();
        let mut rng = Rng::new(1);
        // COPY opcode: top3=001, l=3 (4 bytes), aaa = high bits of BASE_A
        let addr_hi = (BASE_A >> 8) as u8 & 0x7;
        let addr_low = (BASE_A & 0xFF) as u8;
        let opcode = 0x20 | (0x3 << 3) | addr_hi;
        let module = [opcode, addr_low, 0x01, 0x02, 0x03, 0x04, 0x00];
        run_module(&module, &mut regs, &mut rng);
        assert_eq!(regs.block(Channel::A).get(0x00), 0x01);
        assert_eq!(regs.block(Channel::A).get(0x01), 0x02);
        assert_eq!(regs.block(Channel::A).get(0x02), 0x03);
        assert_eq!(regs.block(Channel::A).get(0x03), 0x04);
    }

    #[test]
    fn memop_store_and_load_bank() {
        let mut regs = Registers::new();
        let mut rng = Rng::new(1);
        regs.block_mut(Channel::A).set(0x00, 0x55);
        let addr_hi = (BASE_A >> 8) as u8 & 0x3;
        let addr_low = (BASE_A & 0xFF) as u8;
        // store-to-bank (op=0) from offset 0x00
        run_module(&[0x40 | addr_hi, addr_low, 0x00], &mut regs, &mut rng);
        assert_eq!(regs.block(Channel::A).bank(), 0x55);

        // load-from-bank (op=1) into offset 0x01
        let addr_low2 = ((BASE_A + 1) & 0xFF) as u8;
        run_module(&[0x40 | 0x04 | addr_hi, addr_low2, 0x00], &mut regs, &mut rng);
        assert_eq!(regs.block(Channel::A).get(0x01), 0x55);
    }

    #[test]
    fn memop_right_shift() {
        let mut regs = Registers::new();
        let mut rng = Rng::new(1);
        regs.block_mut(Channel::A).set(0x00, 0b1000_0010);
        let addr_hi = (BASE_A >> 8) as u8 & 0x3;
        let addr_low = (BASE_A & 0xFF) as u8;
        run_module(&[0x40 | 0x08 | addr_hi, addr_low, 0x00], &mut regs, &mut rng);
        assert_eq!(regs.block(Channel::A).get(0x00), 0b0100_0001);
    }

    #[test]
    fn memop_random_within_bounds() {
        let mut regs = Registers::new();
        regs.block_mut(Channel::A).set_random_min(10);
        regs.block_mut(Channel::A).set_random_max(20);
        let mut rng = Rng::new(7);
        let addr_hi = (BASE_A >> 8) as u8 & 0x3;
        let addr_low = (BASE_A & 0xFF) as u8;
        run_module(&[0x40 | 0x0C | addr_hi, addr_low, 0x00], &mut regs, &mut rng);
        let v = regs.block(Channel::A).get(0x00);
        assert!((10..=20).contains(&v));
    }

    #[test]
    fn mathop_add_and_xor() {
        let mut regs = Registers::new();
        let mut rng = Rng::new(1);
        regs.block_mut(Channel::A).set(0x00, 10);
        let addr_hi = (BASE_A >> 8) as u8 & 0x3;
        let addr_low = (BASE_A & 0xFF) as u8;
        // add op=0, operand 5
        run_module(&[0x50 | addr_hi, addr_low, 5, 0x00], &mut regs, &mut rng);
        assert_eq!(regs.block(Channel::A).get(0x00), 15);

        // xor op=3, operand 0xFF
        run_module(&[0x50 | 0x0C | addr_hi, addr_low, 0xFF, 0x00], &mut regs, &mut rng);
        assert_eq!(regs.block(Channel::A).get(0x00), !15u8);
    }

    #[test]
    fn reserved_opcode_consumes_two_bytes_no_effect() {
        let mut regs = Registers::new();
        let mut rng = Rng::new(1);
        let before = regs.a.clone();
        run_module(&[0x10, 0xFF, 0x00], &mut regs, &mut rng);
        assert_eq!(regs.a, before);
    }

    #[test]
    fn truncated_module_stops_without_panicking() {
        let mut regs = Registers::new();
        let mut rng = Rng::new(1);
        // SET opcode with no value byte following.
        run_module(&[0x80], &mut regs, &mut rng);
    }
}

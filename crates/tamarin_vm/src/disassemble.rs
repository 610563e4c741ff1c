use std::fmt::Write as _;

use crate::chunk::Chunk;
use crate::opcode::Op;

/// Renders every instruction in `chunk`, one line each: offset, source line
/// (or `|` when unchanged from the previous instruction), mnemonic, and any
/// decoded operand. Walks the chunk with the exact opcode-to-operand-width
/// table the VM's dispatch loop uses, so it never drifts out of sync with
/// what actually executes.
pub fn disassemble_chunk(chunk: &Chunk, name: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {name} ==");
    let mut offset = 0;
    while offset < chunk.len() {
        let (line, next) = disassemble_instruction(chunk, offset);
        out.push_str(&line);
        out.push('\n');
        offset = next;
    }
    out
}

/// Disassembles the single instruction at `offset`, returning its rendered
/// line and the offset of the next instruction.
pub fn disassemble_instruction(chunk: &Chunk, offset: usize) -> (String, usize) {
    let mut line = format!("{offset:04} ");

    if offset > 0 && chunk.line_at(offset) == chunk.line_at(offset - 1) {
        line.push_str("   | ");
    } else {
        let _ = write!(line, "{:4} ", chunk.line_at(offset));
    }

    let byte = chunk.byte_at(offset);
    let Some(op) = Op::from_u8(byte) else {
        let _ = write!(line, "Unknown opcode {byte}");
        return (line, offset + 1);
    };

    let operand_start = offset + 1;
    match op {
        Op::Constant | Op::GetGlobal | Op::DefineGlobal | Op::SetGlobal | Op::GetProperty
        | Op::SetProperty | Op::GetSuper | Op::Class | Op::Method => {
            let idx = chunk.byte_at(operand_start) as usize;
            render_constant_instr(&mut line, mnemonic(op), idx, chunk);
            (line, operand_start + 1)
        }
        Op::ConstantLong | Op::GetGlobalLong | Op::DefineGlobalLong | Op::SetGlobalLong
        | Op::GetPropertyLong | Op::SetPropertyLong | Op::GetSuperLong | Op::ClassLong
        | Op::MethodLong => {
            let idx = chunk.read_u24(operand_start);
            render_constant_instr(&mut line, mnemonic(op), idx, chunk);
            (line, operand_start + 3)
        }
        Op::GetLocal | Op::SetLocal => {
            let slot = chunk.byte_at(operand_start);
            let _ = write!(line, "{:-16} {slot:4}", mnemonic(op));
            (line, operand_start + 1)
        }
        Op::GetLocalLong | Op::SetLocalLong => {
            let slot = chunk.read_u24(operand_start);
            let _ = write!(line, "{:-16} {slot:4}", mnemonic(op));
            (line, operand_start + 3)
        }
        Op::Call => {
            let argc = chunk.byte_at(operand_start);
            let _ = write!(line, "{:-16} ({argc} args)", mnemonic(op));
            (line, operand_start + 1)
        }
        Op::Jump | Op::JumpIfFalse => {
            let delta = chunk.read_u16(operand_start) as usize;
            let target = operand_start + 2 + delta;
            let _ = write!(line, "{:-16} {offset:4} -> {target}", mnemonic(op));
            (line, operand_start + 2)
        }
        Op::Loop => {
            let delta = chunk.read_u16(operand_start) as usize;
            let target = (operand_start + 2).saturating_sub(delta);
            let _ = write!(line, "{:-16} {offset:4} -> {target}", mnemonic(op));
            (line, operand_start + 2)
        }
        Op::Nil | Op::True | Op::False | Op::Pop | Op::Equal | Op::Greater | Op::Less
        | Op::Add | Op::Subtract | Op::Multiply | Op::Divide | Op::Not | Op::Negate
        | Op::Print | Op::Inherit | Op::Return => {
            line.push_str(mnemonic(op));
            (line, operand_start)
        }
    }
}

fn render_constant_instr(line: &mut String, name: &str, idx: usize, chunk: &Chunk) {
    match chunk.constants().get(idx) {
        Some(value) => {
            let _ = write!(line, "{name:-16} {idx:4} '{value}'");
        }
        None => {
            let _ = write!(line, "{name:-16} {idx:4} '<out of range>'");
        }
    }
}

fn mnemonic(op: Op) -> &'static str {
    match op {
        Op::Constant => "OP_CONSTANT",
        Op::ConstantLong => "OP_CONSTANT_LONG",
        Op::Nil => "OP_NIL",
        Op::True => "OP_TRUE",
        Op::False => "OP_FALSE",
        Op::Pop => "OP_POP",
        Op::GetLocal => "OP_GET_LOCAL",
        Op::GetLocalLong => "OP_GET_LOCAL_LONG",
        Op::SetLocal => "OP_SET_LOCAL",
        Op::SetLocalLong => "OP_SET_LOCAL_LONG",
        Op::GetGlobal => "OP_GET_GLOBAL",
        Op::GetGlobalLong => "OP_GET_GLOBAL_LONG",
        Op::DefineGlobal => "OP_DEFINE_GLOBAL",
        Op::DefineGlobalLong => "OP_DEFINE_GLOBAL_LONG",
        Op::SetGlobal => "OP_SET_GLOBAL",
        Op::SetGlobalLong => "OP_SET_GLOBAL_LONG",
        Op::GetProperty => "OP_GET_PROPERTY",
        Op::GetPropertyLong => "OP_GET_PROPERTY_LONG",
        Op::SetProperty => "OP_SET_PROPERTY",
        Op::SetPropertyLong => "OP_SET_PROPERTY_LONG",
        Op::GetSuper => "OP_GET_SUPER",
        Op::GetSuperLong => "OP_GET_SUPER_LONG",
        Op::Equal => "OP_EQUAL",
        Op::Greater => "OP_GREATER",
        Op::Less => "OP_LESS",
        Op::Add => "OP_ADD",
        Op::Subtract => "OP_SUBTRACT",
        Op::Multiply => "OP_MULTIPLY",
        Op::Divide => "OP_DIVIDE",
        Op::Not => "OP_NOT",
        Op::Negate => "OP_NEGATE",
        Op::Print => "OP_PRINT",
        Op::Jump => "OP_JUMP",
        Op::JumpIfFalse => "OP_JUMP_IF_FALSE",
        Op::Loop => "OP_LOOP",
        Op::Call => "OP_CALL",
        Op::Class => "OP_CLASS",
        Op::ClassLong => "OP_CLASS_LONG",
        Op::Inherit => "OP_INHERIT",
        Op::Method => "OP_METHOD",
        Op::MethodLong => "OP_METHOD_LONG",
        Op::Return => "OP_RETURN",
    }
}

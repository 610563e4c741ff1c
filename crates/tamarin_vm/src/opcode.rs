/// Every instruction the VM can execute.
///
/// Variants suffixed `Long` take a 3-byte little-endian operand instead of a
/// 1-byte one, so the constant pool / local table / global table may exceed
/// 256 entries. `operand_bytes` is the single source of truth the compiler's
/// emitter, the VM's dispatch loop, and the disassembler all consult, so the
/// three never disagree about how many bytes follow an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Op {
    Constant,
    ConstantLong,
    Nil,
    True,
    False,
    Pop,
    GetLocal,
    GetLocalLong,
    SetLocal,
    SetLocalLong,
    GetGlobal,
    GetGlobalLong,
    DefineGlobal,
    DefineGlobalLong,
    SetGlobal,
    SetGlobalLong,
    GetProperty,
    GetPropertyLong,
    SetProperty,
    SetPropertyLong,
    GetSuper,
    GetSuperLong,
    Equal,
    Greater,
    Less,
    Add,
    Subtract,
    Multiply,
    Divide,
    Not,
    Negate,
    Print,
    Jump,
    JumpIfFalse,
    Loop,
    Call,
    Class,
    ClassLong,
    Inherit,
    Method,
    MethodLong,
    Return,
}

impl Op {
    /// Number of operand bytes immediately following this opcode in the
    /// instruction stream.
    pub fn operand_bytes(self) -> usize {
        use Op::*;
        match self {
            Constant | GetLocal | SetLocal | GetGlobal | DefineGlobal | SetGlobal
            | GetProperty | SetProperty | GetSuper | Class | Method | Call => 1,
            Jump | JumpIfFalse | Loop => 2,
            ConstantLong | GetLocalLong | SetLocalLong | GetGlobalLong | DefineGlobalLong
            | SetGlobalLong | GetPropertyLong | SetPropertyLong | GetSuperLong | ClassLong
            | MethodLong => 3,
            Nil | True | False | Pop | Equal | Greater | Less | Add | Subtract | Multiply
            | Divide | Not | Negate | Print | Inherit | Return => 0,
        }
    }

    /// Decodes a raw byte back into an opcode. Bytecode is produced only by
    /// this crate's own compiler, so an unrecognised byte is a bug in that
    /// compiler rather than a condition callers need to recover from.
    pub fn from_u8(byte: u8) -> Option<Op> {
        use Op::*;
        let op = match byte {
            0 => Constant,
            1 => ConstantLong,
            2 => Nil,
            3 => True,
            4 => False,
            5 => Pop,
            6 => GetLocal,
            7 => GetLocalLong,
            8 => SetLocal,
            9 => SetLocalLong,
            10 => GetGlobal,
            11 => GetGlobalLong,
            12 => DefineGlobal,
            13 => DefineGlobalLong,
            14 => SetGlobal,
            15 => SetGlobalLong,
            16 => GetProperty,
            17 => GetPropertyLong,
            18 => SetProperty,
            19 => SetPropertyLong,
            20 => GetSuper,
            21 => GetSuperLong,
            22 => Equal,
            23 => Greater,
            24 => Less,
            25 => Add,
            26 => Subtract,
            27 => Multiply,
            28 => Divide,
            29 => Not,
            30 => Negate,
            31 => Print,
            32 => Jump,
            33 => JumpIfFalse,
            34 => Loop,
            35 => Call,
            36 => Class,
            37 => ClassLong,
            38 => Inherit,
            39 => Method,
            40 => MethodLong,
            41 => Return,
            _ => return None,
        };
        Some(op)
    }
}

impl From<Op> for u8 {
    fn from(op: Op) -> u8 {
        op as u8
    }
}

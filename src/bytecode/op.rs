use serde::{Deserialize, Serialize};

// =============================================================================
// OPCODE - Stack machine instruction set
// =============================================================================

/// Instruction set of the target stack machine.
///
/// Operands are `u32`. Resource operands are ids from the module's resource
/// pool; relative jumps carry a two's complement displacement measured from
/// the jump itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    // resources
    /// Push the resource with the given id.
    Push,
    /// Push a reference to the memory cell named by an identifier id.
    PushM,
    /// Pop into the memory cell named by an identifier id.
    PopM,
    /// Replace a cell reference on top of the stack with its value.
    Slv,

    // stack ops
    Dup,
    Drop,
    /// ( x_n .. x_1 n -- x_1 .. x_n )
    Reverse,
    /// ( x_n .. x_1 n -- x_n-1 .. x_1 x_n ) moves the n-th cell to the top;
    /// `PUSH #3; PICK` is False's rotate
    Pick,
    /// ( .. x_n .. n -- .. x_n .. x_n ) copies the n-th cell to the top
    PickCp,

    // arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Neg,

    // comparison
    Eq,
    Ne,
    Lt,
    Gt,

    // logic
    AndL,
    OrL,
    NotL,

    // I/O
    Print,
    /// Fast library call; the operand is a [`FastLib`] routine.
    FastLib,

    // ==========================================================================
    // Control flow
    // ==========================================================================
    /// Unconditional jump, displacement relative to this instruction.
    Jmpr,
    /// Pop a value, jump relative if it is nonzero.
    Jmpcr,
    /// Unconditional jump to an absolute address.
    Jmp,
    /// Pop a value, jump to an absolute address if it is nonzero.
    Jmpc,

    // ==========================================================================
    // Procedures
    // ==========================================================================
    /// Bind the caller's arguments to the identifier id in the operand.
    Argc,
    /// Push a closure whose entry is the absolute address in the operand.
    LambdaMk,
    /// ( args.. argc fn -- ret ) call a closure value.
    CallC,
    Return,
    Nop,
}

impl Opcode {
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Push => "PUSH",
            Opcode::PushM => "PUSHM",
            Opcode::PopM => "POPM",
            Opcode::Slv => "SLV",
            Opcode::Dup => "DUP",
            Opcode::Drop => "DROP",
            Opcode::Reverse => "REVERSE",
            Opcode::Pick => "PICK",
            Opcode::PickCp => "PICKCP",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::Div => "DIV",
            Opcode::Neg => "NEG",
            Opcode::Eq => "EQ",
            Opcode::Ne => "NE",
            Opcode::Lt => "L",
            Opcode::Gt => "G",
            Opcode::AndL => "ANDL",
            Opcode::OrL => "ORL",
            Opcode::NotL => "NOTL",
            Opcode::Print => "PRINT",
            Opcode::FastLib => "FASTLIB",
            Opcode::Jmpr => "JMPR",
            Opcode::Jmpcr => "JMPCR",
            Opcode::Jmp => "JMP",
            Opcode::Jmpc => "JMPC",
            Opcode::Argc => "ARGC",
            Opcode::LambdaMk => "LAMBDAMK",
            Opcode::CallC => "CALLC",
            Opcode::Return => "RETURN",
            Opcode::Nop => "NOP",
        }
    }

    pub fn is_relative_jump(self) -> bool {
        matches!(self, Opcode::Jmpr | Opcode::Jmpcr)
    }

    /// Whether the operand is a resource id.
    pub fn takes_resource(self) -> bool {
        matches!(
            self,
            Opcode::Push | Opcode::PushM | Opcode::PopM | Opcode::Argc
        )
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Routines reachable through [`Opcode::FastLib`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum FastLib {
    PutChar = 1,
    GetChar = 2,
    Flush = 3,
}

impl FastLib {
    pub fn from_operand(operand: u32) -> Option<Self> {
        match operand {
            1 => Some(FastLib::PutChar),
            2 => Some(FastLib::GetChar),
            3 => Some(FastLib::Flush),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FastLib::PutChar => "putchar",
            FastLib::GetChar => "getchar",
            FastLib::Flush => "flush",
        }
    }
}

/// One resolved (opcode, operand) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operand: u32,
}

impl Instruction {
    pub fn new(opcode: Opcode, operand: u32) -> Self {
        Self { opcode, operand }
    }

    /// Signed displacement of a relative jump.
    pub fn displacement(&self) -> i32 {
        self.operand as i32
    }

    /// Absolute target of a relative jump located at `address`.
    pub fn jump_target(&self, address: u32) -> Option<u32> {
        if !self.opcode.is_relative_jump() {
            return None;
        }
        address.checked_add_signed(self.displacement())
    }
}

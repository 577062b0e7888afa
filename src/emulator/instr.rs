//! Declaração das instruções e o decoder das mesmas.
//!
//! O subset implementado é o MIPS I inteiro: aritmética, lógica,
//! shifts, hi/lo, loads/stores (incluindo os desalinhados lwl/lwr/
//! swl/swr), jumps e branches.

use color_eyre::eyre::{eyre, Result};

use super::profile::InstrKind;
use super::Register;

/// Faz sign extension de um valor de `bits` bits para 32.
pub fn sign_extend(val: u32, bits: u32) -> u32 {
    let shift = 32 - bits;
    (((val << shift) as i32) >> shift) as u32
}

/// Os campos de uma instrução de formato R.
pub struct RArgs {
    pub(crate) rs: Register,
    pub(crate) rt: Register,
    pub(crate) rd: Register,
    pub(crate) shamt: u32,
}

/// Os campos de uma instrução de formato I.
pub struct IArgs {
    pub(crate) rs: Register,
    pub(crate) rt: Register,
    pub(crate) imm: u32,
}

/// O campo de endereço de uma instrução de formato J.
pub struct JArgs {
    pub(crate) target: u32,
}

#[allow(non_camel_case_types)]
pub enum Instruction {
    // Formato R
    SLL(RArgs),
    SRL(RArgs),
    SRA(RArgs),
    SLLV(RArgs),
    SRLV(RArgs),
    SRAV(RArgs),
    JR(RArgs),
    JALR(RArgs),
    SYSCALL,
    BREAK,
    MFHI(RArgs),
    MTHI(RArgs),
    MFLO(RArgs),
    MTLO(RArgs),
    MULT(RArgs),
    MULTU(RArgs),
    DIV(RArgs),
    DIVU(RArgs),
    ADD(RArgs),
    ADDU(RArgs),
    SUB(RArgs),
    SUBU(RArgs),
    AND(RArgs),
    OR(RArgs),
    XOR(RArgs),
    NOR(RArgs),
    SLT(RArgs),
    SLTU(RArgs),
    NOP,

    // Formato I
    BEQ(IArgs),
    BNE(IArgs),
    BLEZ(IArgs),
    BGTZ(IArgs),
    BLTZ(IArgs),
    BGEZ(IArgs),
    BLTZAL(IArgs),
    BGEZAL(IArgs),
    ADDI(IArgs),
    ADDIU(IArgs),
    SLTI(IArgs),
    SLTIU(IArgs),
    ANDI(IArgs),
    ORI(IArgs),
    XORI(IArgs),
    LUI(IArgs),
    LB(IArgs),
    LH(IArgs),
    LWL(IArgs),
    LW(IArgs),
    LBU(IArgs),
    LHU(IArgs),
    LWR(IArgs),
    SB(IArgs),
    SH(IArgs),
    SWL(IArgs),
    SW(IArgs),
    SWR(IArgs),

    // Formato J
    J(JArgs),
    JAL(JArgs),
}

impl Instruction {
    pub fn decode(word: u32) -> Result<Instruction> {
        // A palavra toda zerada é o nop canônico (sll $zero, $zero, 0).
        if word == 0 {
            return Ok(Instruction::NOP);
        }

        let opcode = (word & (63 << 26)) >> 26;

        match opcode {
            0 => decode_r_instr(word),
            1 => decode_regimm_instr(word),
            2 | 3 => decode_j_instr(word),
            _ => decode_i_instr(word),
        }
    }

    /// Os operandos que o perfilador enxerga, seguindo o formato da
    /// instrução. `None` é um slot que a instrução não usa; o destino
    /// de formato R em $zero também vira `None`, já que essa escrita
    /// não produz valor nenhum.
    pub fn context(
        &self,
    ) -> (
        Option<Register>,
        Option<Register>,
        Option<Register>,
        InstrKind,
    ) {
        use Instruction::*;

        fn dest(r: Register) -> Option<Register> {
            if r.0 == 0 {
                None
            } else {
                Some(r)
            }
        }

        match self {
            SLL(a) | SRL(a) | SRA(a) | SLLV(a) | SRLV(a) | SRAV(a) | JR(a) | JALR(a)
            | MFHI(a) | MTHI(a) | MFLO(a) | MTLO(a) | MULT(a) | MULTU(a) | DIV(a) | DIVU(a)
            | ADD(a) | ADDU(a) | SUB(a) | SUBU(a) | AND(a) | OR(a) | XOR(a) | NOR(a) | SLT(a)
            | SLTU(a) => (dest(a.rd), Some(a.rs), Some(a.rt), InstrKind::Normal),

            // nop/syscall/break são formato R com os campos zerados.
            NOP | SYSCALL | BREAK => (
                None,
                Some(Register(0)),
                Some(Register(0)),
                InstrKind::Normal,
            ),

            J(_) | JAL(_) => (None, None, None, InstrKind::Normal),

            LB(a) | LH(a) | LWL(a) | LW(a) | LBU(a) | LHU(a) | LWR(a) => {
                (Some(a.rt), Some(a.rs), None, InstrKind::MemoryRead)
            }

            SB(a) | SH(a) | SWL(a) | SW(a) | SWR(a) => {
                (None, Some(a.rs), Some(a.rt), InstrKind::Normal)
            }

            BEQ(a) | BNE(a) => (None, Some(a.rs), Some(a.rt), InstrKind::Normal),

            BLEZ(a) | BGTZ(a) | BLTZ(a) | BGEZ(a) => {
                (None, Some(a.rs), None, InstrKind::Normal)
            }

            // As variantes "and link" escrevem em $ra.
            BLTZAL(a) | BGEZAL(a) => {
                (Some(Register(31)), Some(a.rs), None, InstrKind::Normal)
            }

            ADDI(a) | ADDIU(a) | SLTI(a) | SLTIU(a) | ANDI(a) | ORI(a) | XORI(a) => {
                (Some(a.rt), Some(a.rs), None, InstrKind::Normal)
            }

            LUI(a) => (Some(a.rt), None, None, InstrKind::Normal),
        }
    }
}

fn decode_r_instr(word: u32) -> Result<Instruction> {
    let funct = word & 63;
    let shamt = (word & (31 << 6)) >> 6;
    let rd = Register((word & (31 << 11)) >> 11);
    let rt = Register((word & (31 << 16)) >> 16);
    let rs = Register((word & (31 << 21)) >> 21);

    let args = RArgs { rs, rt, rd, shamt };

    match funct {
        0x00 => Ok(Instruction::SLL(args)),
        0x02 => Ok(Instruction::SRL(args)),
        0x03 => Ok(Instruction::SRA(args)),
        0x04 => Ok(Instruction::SLLV(args)),
        0x06 => Ok(Instruction::SRLV(args)),
        0x07 => Ok(Instruction::SRAV(args)),
        0x08 => Ok(Instruction::JR(args)),
        0x09 => Ok(Instruction::JALR(args)),
        0x0C => Ok(Instruction::SYSCALL),
        0x0D => Ok(Instruction::BREAK),
        0x10 => Ok(Instruction::MFHI(args)),
        0x11 => Ok(Instruction::MTHI(args)),
        0x12 => Ok(Instruction::MFLO(args)),
        0x13 => Ok(Instruction::MTLO(args)),
        0x18 => Ok(Instruction::MULT(args)),
        0x19 => Ok(Instruction::MULTU(args)),
        0x1A => Ok(Instruction::DIV(args)),
        0x1B => Ok(Instruction::DIVU(args)),
        0x20 => Ok(Instruction::ADD(args)),
        0x21 => Ok(Instruction::ADDU(args)),
        0x22 => Ok(Instruction::SUB(args)),
        0x23 => Ok(Instruction::SUBU(args)),
        0x24 => Ok(Instruction::AND(args)),
        0x25 => Ok(Instruction::OR(args)),
        0x26 => Ok(Instruction::XOR(args)),
        0x27 => Ok(Instruction::NOR(args)),
        0x2A => Ok(Instruction::SLT(args)),
        0x2B => Ok(Instruction::SLTU(args)),
        _ => Err(eyre!("Instrução R desconhecida: funct {:#x}", funct)),
    }
}

/// O opcode 1 multiplexa os branches de comparação com zero pelo campo
/// rt.
fn decode_regimm_instr(word: u32) -> Result<Instruction> {
    let imm = word & 0xFFFF;
    let rt = (word & (31 << 16)) >> 16;
    let rs = Register((word & (31 << 21)) >> 21);

    let args = IArgs {
        rs,
        rt: Register(rt),
        imm,
    };

    match rt {
        0x00 => Ok(Instruction::BLTZ(args)),
        0x01 => Ok(Instruction::BGEZ(args)),
        0x10 => Ok(Instruction::BLTZAL(args)),
        0x11 => Ok(Instruction::BGEZAL(args)),
        _ => Err(eyre!("Instrução REGIMM desconhecida: rt {:#x}", rt)),
    }
}

fn decode_i_instr(word: u32) -> Result<Instruction> {
    let imm = word & 0xFFFF;
    let rt = Register((word & (31 << 16)) >> 16);
    let rs = Register((word & (31 << 21)) >> 21);
    let opcode = (word & (63 << 26)) >> 26;

    let args = IArgs { rs, rt, imm };

    match opcode {
        0x04 => Ok(Instruction::BEQ(args)),
        0x05 => Ok(Instruction::BNE(args)),
        0x06 => Ok(Instruction::BLEZ(args)),
        0x07 => Ok(Instruction::BGTZ(args)),
        0x08 => Ok(Instruction::ADDI(args)),
        0x09 => Ok(Instruction::ADDIU(args)),
        0x0A => Ok(Instruction::SLTI(args)),
        0x0B => Ok(Instruction::SLTIU(args)),
        0x0C => Ok(Instruction::ANDI(args)),
        0x0D => Ok(Instruction::ORI(args)),
        0x0E => Ok(Instruction::XORI(args)),
        0x0F => Ok(Instruction::LUI(args)),
        0x20 => Ok(Instruction::LB(args)),
        0x21 => Ok(Instruction::LH(args)),
        0x22 => Ok(Instruction::LWL(args)),
        0x23 => Ok(Instruction::LW(args)),
        0x24 => Ok(Instruction::LBU(args)),
        0x25 => Ok(Instruction::LHU(args)),
        0x26 => Ok(Instruction::LWR(args)),
        0x28 => Ok(Instruction::SB(args)),
        0x29 => Ok(Instruction::SH(args)),
        0x2A => Ok(Instruction::SWL(args)),
        0x2B => Ok(Instruction::SW(args)),
        0x2E => Ok(Instruction::SWR(args)),
        _ => Err(eyre!("Instrução I desconhecida: opcode {:#x}", opcode)),
    }
}

fn decode_j_instr(word: u32) -> Result<Instruction> {
    let target = word & 0x03FF_FFFF;
    let opcode = (word & (63 << 26)) >> 26;

    match opcode {
        2 => Ok(Instruction::J(JArgs { target })),
        3 => Ok(Instruction::JAL(JArgs { target })),
        _ => Err(eyre!("Instrução J desconhecida: opcode {:#x}", opcode)),
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use Instruction::*;

        match self {
            NOP => write!(f, "NOP"),
            SYSCALL => write!(f, "SYSCALL"),
            BREAK => write!(f, "BREAK"),

            ADD(a) => write!(f, "ADD {}, {}, {}", a.rd, a.rs, a.rt),
            ADDU(a) => write!(f, "ADDU {}, {}, {}", a.rd, a.rs, a.rt),
            SUB(a) => write!(f, "SUB {}, {}, {}", a.rd, a.rs, a.rt),
            SUBU(a) => write!(f, "SUBU {}, {}, {}", a.rd, a.rs, a.rt),
            AND(a) => write!(f, "AND {}, {}, {}", a.rd, a.rs, a.rt),
            OR(a) => write!(f, "OR {}, {}, {}", a.rd, a.rs, a.rt),
            XOR(a) => write!(f, "XOR {}, {}, {}", a.rd, a.rs, a.rt),
            NOR(a) => write!(f, "NOR {}, {}, {}", a.rd, a.rs, a.rt),
            SLT(a) => write!(f, "SLT {}, {}, {}", a.rd, a.rs, a.rt),
            SLTU(a) => write!(f, "SLTU {}, {}, {}", a.rd, a.rs, a.rt),

            SLL(a) => write!(f, "SLL {}, {}, {}", a.rd, a.rt, a.shamt),
            SRL(a) => write!(f, "SRL {}, {}, {}", a.rd, a.rt, a.shamt),
            SRA(a) => write!(f, "SRA {}, {}, {}", a.rd, a.rt, a.shamt),
            SLLV(a) => write!(f, "SLLV {}, {}, {}", a.rd, a.rt, a.rs),
            SRLV(a) => write!(f, "SRLV {}, {}, {}", a.rd, a.rt, a.rs),
            SRAV(a) => write!(f, "SRAV {}, {}, {}", a.rd, a.rt, a.rs),

            JR(a) => write!(f, "JR {}", a.rs),
            JALR(a) => write!(f, "JALR {}, {}", a.rd, a.rs),

            MFHI(a) => write!(f, "MFHI {}", a.rd),
            MTHI(a) => write!(f, "MTHI {}", a.rs),
            MFLO(a) => write!(f, "MFLO {}", a.rd),
            MTLO(a) => write!(f, "MTLO {}", a.rs),
            MULT(a) => write!(f, "MULT {}, {}", a.rs, a.rt),
            MULTU(a) => write!(f, "MULTU {}, {}", a.rs, a.rt),
            DIV(a) => write!(f, "DIV {}, {}", a.rs, a.rt),
            DIVU(a) => write!(f, "DIVU {}, {}", a.rs, a.rt),

            BEQ(a) => write!(f, "BEQ {}, {}, {}", a.rs, a.rt, a.imm as i16),
            BNE(a) => write!(f, "BNE {}, {}, {}", a.rs, a.rt, a.imm as i16),
            BLEZ(a) => write!(f, "BLEZ {}, {}", a.rs, a.imm as i16),
            BGTZ(a) => write!(f, "BGTZ {}, {}", a.rs, a.imm as i16),
            BLTZ(a) => write!(f, "BLTZ {}, {}", a.rs, a.imm as i16),
            BGEZ(a) => write!(f, "BGEZ {}, {}", a.rs, a.imm as i16),
            BLTZAL(a) => write!(f, "BLTZAL {}, {}", a.rs, a.imm as i16),
            BGEZAL(a) => write!(f, "BGEZAL {}, {}", a.rs, a.imm as i16),

            ADDI(a) => write!(f, "ADDI {}, {}, {}", a.rt, a.rs, a.imm as i16),
            ADDIU(a) => write!(f, "ADDIU {}, {}, {}", a.rt, a.rs, a.imm as i16),
            SLTI(a) => write!(f, "SLTI {}, {}, {}", a.rt, a.rs, a.imm as i16),
            SLTIU(a) => write!(f, "SLTIU {}, {}, {}", a.rt, a.rs, a.imm as i16),
            ANDI(a) => write!(f, "ANDI {}, {}, {:#x}", a.rt, a.rs, a.imm),
            ORI(a) => write!(f, "ORI {}, {}, {:#x}", a.rt, a.rs, a.imm),
            XORI(a) => write!(f, "XORI {}, {}, {:#x}", a.rt, a.rs, a.imm),
            LUI(a) => write!(f, "LUI {}, {:#x}", a.rt, a.imm),

            LB(a) => write!(f, "LB {}, {}({})", a.rt, a.imm as i16, a.rs),
            LH(a) => write!(f, "LH {}, {}({})", a.rt, a.imm as i16, a.rs),
            LWL(a) => write!(f, "LWL {}, {}({})", a.rt, a.imm as i16, a.rs),
            LW(a) => write!(f, "LW {}, {}({})", a.rt, a.imm as i16, a.rs),
            LBU(a) => write!(f, "LBU {}, {}({})", a.rt, a.imm as i16, a.rs),
            LHU(a) => write!(f, "LHU {}, {}({})", a.rt, a.imm as i16, a.rs),
            LWR(a) => write!(f, "LWR {}, {}({})", a.rt, a.imm as i16, a.rs),
            SB(a) => write!(f, "SB {}, {}({})", a.rt, a.imm as i16, a.rs),
            SH(a) => write!(f, "SH {}, {}({})", a.rt, a.imm as i16, a.rs),
            SWL(a) => write!(f, "SWL {}, {}({})", a.rt, a.imm as i16, a.rs),
            SW(a) => write!(f, "SW {}, {}({})", a.rt, a.imm as i16, a.rs),
            SWR(a) => write!(f, "SWR {}, {}({})", a.rt, a.imm as i16, a.rs),

            J(a) => write!(f, "J {:#010x}", a.target << 2),
            JAL(a) => write!(f, "JAL {:#010x}", a.target << 2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emulator::profile::InstrKind;

    #[test]
    fn sign_extend_works() {
        assert_eq!(sign_extend(0xFFFE, 16), 0xFFFF_FFFE);
        assert_eq!(sign_extend(0x7FFF, 16), 0x0000_7FFF);
        assert_eq!(sign_extend(0x80, 8), 0xFFFF_FF80);
    }

    #[test]
    fn decodes_r_format() {
        // add $t2, $t0, $t1
        let instr = Instruction::decode(0x0109_5020).unwrap();
        assert_eq!(format!("{}", instr), "ADD $t2, $t0, $t1");
    }

    #[test]
    fn decodes_i_format() {
        // addiu $t0, $zero, 5
        let instr = Instruction::decode(0x2408_0005).unwrap();
        assert_eq!(format!("{}", instr), "ADDIU $t0, $zero, 5");

        // lw $a0, 4($sp)
        let instr = Instruction::decode(0x8FA4_0004).unwrap();
        assert_eq!(format!("{}", instr), "LW $a0, 4($sp)");

        // beq $t0, $zero, -2
        let instr = Instruction::decode(0x1100_FFFE).unwrap();
        assert_eq!(format!("{}", instr), "BEQ $t0, $zero, -2");
    }

    #[test]
    fn decodes_regimm_format() {
        // bgez $s0, 3
        let instr = Instruction::decode(0x0601_0003).unwrap();
        assert_eq!(format!("{}", instr), "BGEZ $s0, 3");
    }

    #[test]
    fn decodes_j_format() {
        // jal 0x00400000
        let instr = Instruction::decode(0x0C10_0000).unwrap();
        assert_eq!(format!("{}", instr), "JAL 0x00400000");
    }

    #[test]
    fn zero_word_is_nop() {
        let instr = Instruction::decode(0).unwrap();
        assert_eq!(format!("{}", instr), "NOP");
    }

    #[test]
    fn unknown_encodings_are_errors() {
        // funct 0x3F não existe no MIPS I
        assert!(Instruction::decode(0x0000_003F).is_err());
        // opcode 0x3F também não
        assert!(Instruction::decode(0xFC00_0000).is_err());
    }

    #[test]
    fn load_context_is_a_memory_read() {
        let instr = Instruction::decode(0x8FA4_0004).unwrap(); // lw $a0, 4($sp)
        let (dest, src1, src2, kind) = instr.context();
        assert_eq!(dest, Some(Register(4)));
        assert_eq!(src1, Some(Register(29)));
        assert_eq!(src2, None);
        assert_eq!(kind, InstrKind::MemoryRead);
    }

    #[test]
    fn r_format_dest_zero_is_none() {
        // add $zero, $t0, $t1
        let word = (8 << 21) | (9 << 16) | 0x20;
        let instr = Instruction::decode(word).unwrap();
        let (dest, _, _, kind) = instr.context();
        assert_eq!(dest, None);
        assert_eq!(kind, InstrKind::Normal);
    }

    #[test]
    fn store_context_reads_both_registers() {
        // sw $t1, 0($t0)
        let word: u32 = (0x2B << 26) | (8 << 21) | (9 << 16);
        let instr = Instruction::decode(word).unwrap();
        let (dest, src1, src2, kind) = instr.context();
        assert_eq!(dest, None);
        assert_eq!(src1, Some(Register(8)));
        assert_eq!(src2, Some(Register(9)));
        assert_eq!(kind, InstrKind::Normal);
    }

    #[test]
    fn link_branches_write_ra() {
        // bgezal $s0, 3
        let word = (1 << 26) | (16 << 21) | (0x11 << 16) | 3;
        let instr = Instruction::decode(word).unwrap();
        let (dest, src1, _, _) = instr.context();
        assert_eq!(dest, Some(Register(31)));
        assert_eq!(src1, Some(Register(16)));
    }
}

//! Detecção de hazards load-use entre instruções adjacentes.
//!
//! O modelo é um pipeline in-order de profundidade 1, sem forwarding:
//! se a instrução anterior é uma leitura de memória e a instrução atual
//! lê o registrador que ela vai escrever, temos um hazard.

use crate::emulator::Register;

/// A categoria de uma instrução, do ponto de vista do detector.
/// Só nos interessa saber se ela lê da memória ou não.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InstrKind {
    /// Nenhuma instrução foi registrada ainda.
    Uninitialized,
    /// A instrução escreve num registrador um valor vindo da memória.
    MemoryRead,
    /// Qualquer outra instrução.
    Normal,
}

/// Os operandos de uma instrução que importam para o detector.
/// `None` significa que o slot não é usado pela instrução.
#[derive(Copy, Clone, Debug)]
struct InstructionContext {
    dest: Option<Register>,
    src1: Option<Register>,
    src2: Option<Register>,
    kind: InstrKind,
}

impl InstructionContext {
    fn uninitialized() -> InstructionContext {
        InstructionContext {
            dest: None,
            src1: None,
            src2: None,
            kind: InstrKind::Uninitialized,
        }
    }
}

/// O detector em si. Guarda o contexto da instrução atual e da anterior,
/// e um contador monotônico de hazards.
pub struct HazardTracker {
    current: InstructionContext,
    previous: InstructionContext,
    hazards: u64,
    /// Verdadeiro entre um `record_instruction` e o `check_hazard`
    /// correspondente.
    armed: bool,
}

impl HazardTracker {
    pub fn new() -> HazardTracker {
        HazardTracker {
            current: InstructionContext::uninitialized(),
            previous: InstructionContext::uninitialized(),
            hazards: 0,
            armed: false,
        }
    }

    /// Zera o detector, como no início da simulação.
    pub fn reset(&mut self) {
        self.current = InstructionContext::uninitialized();
        self.previous = InstructionContext::uninitialized();
        self.hazards = 0;
        self.armed = false;
    }

    /// Registra os operandos da instrução que está aposentando.
    /// O contexto atual vira o anterior, exceto na primeira chamada
    /// depois do reset.
    pub fn record_instruction(
        &mut self,
        dest: Option<Register>,
        src1: Option<Register>,
        src2: Option<Register>,
        kind: InstrKind,
    ) {
        if self.current.kind != InstrKind::Uninitialized {
            self.previous = self.current;
        }

        self.current = InstructionContext {
            dest,
            src1,
            src2,
            kind,
        };
        self.armed = true;
    }

    /// Compara a instrução atual com a anterior e conta um hazard se a
    /// anterior é um load cujo destino é lido agora. Deve ser chamado
    /// exatamente uma vez por instrução, logo depois de
    /// `record_instruction`; chamar fora de ordem é bug no chamador.
    pub fn check_hazard(&mut self) {
        assert!(
            self.armed,
            "check_hazard chamado sem um record_instruction antes"
        );
        self.armed = false;

        if self.previous.kind == InstrKind::MemoryRead && self.previous.dest.is_some() {
            if self.previous.dest == self.current.src1 || self.previous.dest == self.current.src2 {
                self.hazards += 1;
            }
        }
    }

    pub fn hazards(&self) -> u64 {
        self.hazards
    }
}

//! Esse módulo é o perfilador microarquitetural: tudo que a CPU conta
//! sobre a execução além do resultado das instruções.
//!
//! São três simuladores independentes (detector de hazards, caches de
//! dados e de instruções, banco de preditores de desvio) mais os
//! contadores globais de instruções e acessos. A CPU enxerga só essa
//! fachada: um `Profiler`, chamado uma vez por instrução aposentada.

pub mod cache;
pub mod hazard;
pub mod predictor;
pub mod reporter;

use std::sync::mpsc::Sender;

pub use cache::{CacheConfig, CacheSim};
pub use hazard::{HazardTracker, InstrKind};
pub use predictor::{PredictorBank, Scores, DEFAULT_INDEX_BITS};
pub use reporter::{AccessEvent, AccessReporter};

use crate::emulator::Register;

/// A configuração completa do perfilador: geometria das duas caches e
/// largura do índice dos preditores.
#[derive(Copy, Clone, Debug)]
pub struct ProfileConfig {
    pub data: CacheConfig,
    pub instr: CacheConfig,
    pub index_bits: usize,
}

impl Default for ProfileConfig {
    fn default() -> ProfileConfig {
        ProfileConfig {
            data: CacheConfig {
                rows: 64,
                words_per_line: 4,
            },
            instr: CacheConfig {
                rows: 64,
                words_per_line: 4,
            },
            index_bits: DEFAULT_INDEX_BITS,
        }
    }
}

/// A fachada que a CPU usa. Dona de todo o estado de profiling.
pub struct Profiler {
    hazard: HazardTracker,
    dcache: CacheSim,
    icache: CacheSim,
    predictors: PredictorBank,
    instructions: u64,
    mem_accesses: u64,
    trace: Option<Sender<AccessEvent>>,
}

impl Profiler {
    /// Cria um perfilador zerado. `trace` é o write end do
    /// `AccessReporter`, se o usuário pediu um trace de acessos.
    pub fn new(config: ProfileConfig, trace: Option<Sender<AccessEvent>>) -> Profiler {
        Profiler {
            hazard: HazardTracker::new(),
            dcache: CacheSim::new(config.data),
            icache: CacheSim::new(config.instr),
            predictors: PredictorBank::new(config.index_bits),
            instructions: 0,
            mem_accesses: 0,
            trace,
        }
    }

    /// Zera contadores, invalida as caches e esquece o histórico de
    /// desvios, como no início da simulação.
    pub fn reset(&mut self) {
        self.hazard.reset();
        self.dcache.reset();
        self.icache.reset();
        self.predictors.reset();
        self.instructions = 0;
        self.mem_accesses = 0;
    }

    /// Verifica a busca de uma instrução na cache de instruções.
    /// Chamado uma vez por instrução, com o PC do fetch.
    pub fn instruction_fetch(&mut self, pc: u32) {
        let before = self.icache.misses();
        self.icache.verify_fetch(pc);
        self.instructions += 1;

        if let Some(ref tx) = self.trace {
            let row = self.icache.row_of(pc);
            tx.send(AccessEvent::InstrFetch(pc, row, self.icache.misses() - before))
                .unwrap();
        }
    }

    /// Registra os operandos da instrução que está aposentando.
    pub fn record_instruction(
        &mut self,
        dest: Option<Register>,
        src1: Option<Register>,
        src2: Option<Register>,
        kind: InstrKind,
    ) {
        self.hazard.record_instruction(dest, src1, src2, kind);
    }

    /// Confere o load-use hazard da instrução recém registrada.
    pub fn check_hazard(&mut self) {
        self.hazard.check_hazard();
    }

    /// Verifica uma leitura de dados no endereço efetivo dado.
    pub fn data_read(&mut self, addr: u32) {
        let before = self.dcache.misses();
        self.dcache.verify_read(addr);
        self.mem_accesses += 1;

        if let Some(ref tx) = self.trace {
            let row = self.dcache.row_of(addr);
            tx.send(AccessEvent::DataRead(addr, row, self.dcache.misses() - before))
                .unwrap();
        }
    }

    /// Verifica uma escrita de dados no endereço efetivo dado.
    pub fn data_write(&mut self, addr: u32) {
        let before = self.dcache.misses();
        self.dcache.verify_write(addr);
        self.mem_accesses += 1;

        if let Some(ref tx) = self.trace {
            let row = self.dcache.row_of(addr);
            tx.send(AccessEvent::DataWrite(addr, row, self.dcache.misses() - before))
                .unwrap();
        }
    }

    /// Um desvio condicional foi tomado.
    pub fn branch_taken(&mut self, pc: u32, target: u32) {
        self.predictors.branch_taken(pc, target);
    }

    /// Um desvio condicional não foi tomado. `target` é o destino que
    /// ele teria.
    pub fn branch_not_taken(&mut self, pc: u32, target: u32) {
        self.predictors.branch_not_taken(pc, target);
    }

    // Leituras para o relatório final.

    pub fn hazards(&self) -> u64 {
        self.hazard.hazards()
    }

    pub fn data_cache_misses(&self) -> u64 {
        self.dcache.misses()
    }

    pub fn instr_cache_misses(&self) -> u64 {
        self.icache.misses()
    }

    pub fn unaligned_accesses(&self) -> u64 {
        self.dcache.unaligned()
    }

    pub fn instructions(&self) -> u64 {
        self.instructions
    }

    pub fn mem_accesses(&self) -> u64 {
        self.mem_accesses
    }

    pub fn index_bits(&self) -> usize {
        self.predictors.index_bits()
    }

    pub fn scores(&self) -> &Scores {
        self.predictors.scores()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn profiler() -> Profiler {
        Profiler::new(ProfileConfig::default(), None)
    }

    #[test]
    fn counts_instructions_and_accesses() {
        let mut prof = profiler();

        prof.instruction_fetch(0x0040_0000);
        prof.instruction_fetch(0x0040_0004);
        prof.data_read(0x1001_0000);
        prof.data_write(0x1001_0004);

        assert_eq!(prof.instructions(), 2);
        assert_eq!(prof.mem_accesses(), 2);
    }

    #[test]
    fn caches_are_independent() {
        let mut prof = profiler();

        // Mesmo endereço nas duas caches: cada uma paga seu próprio
        // miss frio.
        prof.instruction_fetch(0x0040_0000);
        prof.data_read(0x0040_0000);

        assert_eq!(prof.instr_cache_misses(), 1);
        assert_eq!(prof.data_cache_misses(), 1);
    }

    #[test]
    fn reset_zeroes_the_world() {
        let mut prof = profiler();

        prof.instruction_fetch(0x0040_0000);
        prof.data_read(0x1001_0003);
        prof.record_instruction(Some(Register(8)), None, None, InstrKind::MemoryRead);
        prof.check_hazard();
        prof.branch_taken(0x0040_0000, 0x0040_0100);

        prof.reset();

        assert_eq!(prof.instructions(), 0);
        assert_eq!(prof.mem_accesses(), 0);
        assert_eq!(prof.data_cache_misses(), 0);
        assert_eq!(prof.instr_cache_misses(), 0);
        assert_eq!(prof.unaligned_accesses(), 0);
        assert_eq!(prof.hazards(), 0);
        assert_eq!(prof.scores().always_taken.hits, 0);
    }

    #[test]
    fn trace_events_carry_the_miss_cost() {
        let (tx, rx) = mpsc::channel();
        let mut prof = Profiler::new(ProfileConfig::default(), Some(tx));

        prof.data_read(0x1001_0000); // miss frio
        prof.data_read(0x1001_0000); // hit

        let first = rx.recv().unwrap();
        let second = rx.recv().unwrap();

        match first {
            AccessEvent::DataRead(addr, _, misses) => {
                assert_eq!(addr, 0x1001_0000);
                assert_eq!(misses, 1);
            }
            other => panic!("evento inesperado: {:?}", other),
        }
        match second {
            AccessEvent::DataRead(_, _, misses) => assert_eq!(misses, 0),
            other => panic!("evento inesperado: {:?}", other),
        }
    }
}

//! As quatro estratégias de previsão de desvio, competindo sobre o
//! mesmo histórico real de desvios do programa.
//!
//! Cada estratégia tem sua própria tabela, indexada por um hash do PC
//! (`(pc >> 2) & (2^K - 1)`). Não há checagem de tag: dois desvios que
//! caem no mesmo índice corrompem o estado um do outro, e isso é
//! aceito. O alvo previsto (a entrada de BTB) mora junto do estado de
//! direção, então errar o alvo custa um miss mesmo com a direção certa.

/// Largura padrão do índice das tabelas, em bits.
pub const DEFAULT_INDEX_BITS: usize = 15;

/// O estado do preditor de 1 bit: repete o último resultado.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum OneBitState {
    Taken,
    NotTaken,
}

/// O estado do preditor de 2 bits com saturação.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum TwoBitState {
    StronglyTaken,
    WeaklyTaken,
    WeaklyNotTaken,
    StronglyNotTaken,
}

impl TwoBitState {
    fn predicts_taken(self) -> bool {
        match self {
            TwoBitState::StronglyTaken | TwoBitState::WeaklyTaken => true,
            TwoBitState::WeaklyNotTaken | TwoBitState::StronglyNotTaken => false,
        }
    }
}

#[derive(Copy, Clone, Debug)]
struct OneBitEntry {
    state: OneBitState,
    target: u32,
}

#[derive(Copy, Clone, Debug)]
struct TwoBitEntry {
    state: TwoBitState,
    target: u32,
}

// As tabelas nascem apostando em taken: é o que faz o primeiro desvio
// não-tomado de um loop custar exatamente um miss nos dois preditores
// dinâmicos.

impl Default for OneBitEntry {
    fn default() -> OneBitEntry {
        OneBitEntry {
            state: OneBitState::Taken,
            target: 0,
        }
    }
}

impl Default for TwoBitEntry {
    fn default() -> TwoBitEntry {
        TwoBitEntry {
            state: TwoBitState::WeaklyTaken,
            target: 0,
        }
    }
}

/// Contadores de acerto/erro de uma estratégia.
#[derive(Copy, Clone, Debug, Default)]
pub struct HitMiss {
    pub hits: u64,
    pub misses: u64,
}

/// O placar das quatro estratégias.
#[derive(Copy, Clone, Debug, Default)]
pub struct Scores {
    pub always_taken: HitMiss,
    pub never_taken: HitMiss,
    pub one_bit: HitMiss,
    pub two_bit: HitMiss,
}

/// O banco de preditores. As estratégias fixas (always/never) não
/// precisam de tabela nenhuma: o placar delas é função só da direção
/// real de cada desvio.
pub struct PredictorBank {
    index_bits: usize,
    index_mask: u32,
    one_bit: Vec<OneBitEntry>,
    two_bit: Vec<TwoBitEntry>,
    scores: Scores,
}

impl PredictorBank {
    pub fn new(index_bits: usize) -> PredictorBank {
        assert!(
            index_bits > 0 && index_bits <= 24,
            "largura de índice fora do razoável: {}",
            index_bits
        );

        let size = 1usize << index_bits;

        PredictorBank {
            index_bits,
            index_mask: (size - 1) as u32,
            one_bit: vec![OneBitEntry::default(); size],
            two_bit: vec![TwoBitEntry::default(); size],
            scores: Scores::default(),
        }
    }

    /// Volta todas as tabelas ao estado inicial e zera o placar.
    pub fn reset(&mut self) {
        for entry in self.one_bit.iter_mut() {
            *entry = OneBitEntry::default();
        }
        for entry in self.two_bit.iter_mut() {
            *entry = TwoBitEntry::default();
        }
        self.scores = Scores::default();
    }

    pub fn index_bits(&self) -> usize {
        self.index_bits
    }

    pub fn scores(&self) -> &Scores {
        &self.scores
    }

    fn index(&self, pc: u32) -> usize {
        ((pc >> 2) & self.index_mask) as usize
    }

    /// Um desvio em `pc` foi tomado, com destino `target`.
    pub fn branch_taken(&mut self, pc: u32, target: u32) {
        let idx = self.index(pc);

        self.scores.always_taken.hits += 1;
        self.scores.never_taken.misses += 1;

        // 1 bit: erra se a direção guardada era not-taken, ou se a
        // direção estava certa mas o alvo guardado envelheceu.
        let entry = &mut self.one_bit[idx];
        if entry.state == OneBitState::NotTaken {
            self.scores.one_bit.misses += 1;
            entry.state = OneBitState::Taken;
            entry.target = target;
        } else if entry.target != target {
            self.scores.one_bit.misses += 1;
            entry.target = target;
        } else {
            self.scores.one_bit.hits += 1;
        }

        // 2 bits.
        let entry = &mut self.two_bit[idx];
        if !entry.state.predicts_taken() {
            // Direção errada: anda um passo em direção a taken.
            entry.state = match entry.state {
                TwoBitState::StronglyNotTaken => TwoBitState::WeaklyNotTaken,
                _ => TwoBitState::WeaklyTaken,
            };

            // Só grava o alvo se já chegou do lado taken.
            if entry.state == TwoBitState::WeaklyTaken {
                entry.target = target;
            }

            self.scores.two_bit.misses += 1;
        } else if entry.target != target {
            // Direção certa, alvo errado: troca o alvo e perde um grau
            // de confiança.
            self.scores.two_bit.misses += 1;
            entry.target = target;
            entry.state = match entry.state {
                TwoBitState::WeaklyTaken => TwoBitState::WeaklyNotTaken,
                _ => TwoBitState::WeaklyTaken,
            };
        } else {
            self.scores.two_bit.hits += 1;
            entry.state = TwoBitState::StronglyTaken;
            entry.target = target;
        }
    }

    /// Um desvio em `pc` não foi tomado. `target` é o destino que o
    /// desvio teria se tivesse sido tomado.
    pub fn branch_not_taken(&mut self, pc: u32, target: u32) {
        let idx = self.index(pc);
        let fallthrough = pc.wrapping_add(4);

        self.scores.always_taken.misses += 1;
        self.scores.never_taken.hits += 1;

        // 1 bit: do lado not-taken não há alvo pra conferir.
        let entry = &mut self.one_bit[idx];
        if entry.state == OneBitState::Taken {
            self.scores.one_bit.misses += 1;
            entry.state = OneBitState::NotTaken;
            entry.target = fallthrough;
        } else {
            self.scores.one_bit.hits += 1;
        }

        // 2 bits.
        let entry = &mut self.two_bit[idx];
        if entry.state.predicts_taken() {
            entry.state = match entry.state {
                TwoBitState::WeaklyTaken => TwoBitState::WeaklyNotTaken,
                _ => TwoBitState::WeaklyTaken,
            };

            // Se ainda sobrou confiança no lado taken, o alvo guardado
            // continua sendo o destino do desvio; senão, o fallthrough.
            entry.target = if entry.state == TwoBitState::WeaklyTaken {
                target
            } else {
                fallthrough
            };

            self.scores.two_bit.misses += 1;
        } else {
            self.scores.two_bit.hits += 1;
            entry.state = TwoBitState::StronglyNotTaken;
            entry.target = fallthrough;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PC: u32 = 0x0040_0100;
    const TARGET: u32 = 0x0040_0040;

    #[test]
    fn hits_and_misses_partition_the_branches() {
        let mut bank = PredictorBank::new(4);

        let outcomes = [true, false, true, true, false, false, true, false];
        for (i, &taken) in outcomes.iter().enumerate() {
            let pc = PC + (i as u32 % 3) * 4;
            if taken {
                bank.branch_taken(pc, TARGET);
            } else {
                bank.branch_not_taken(pc, TARGET);
            }
        }

        let n = outcomes.len() as u64;
        let scores = bank.scores();
        assert_eq!(scores.always_taken.hits + scores.always_taken.misses, n);
        assert_eq!(scores.never_taken.hits + scores.never_taken.misses, n);
        assert_eq!(scores.one_bit.hits + scores.one_bit.misses, n);
        assert_eq!(scores.two_bit.hits + scores.two_bit.misses, n);
    }

    #[test]
    fn always_and_never_are_complementary() {
        let mut bank = PredictorBank::new(4);

        for i in 0..20u32 {
            if i % 3 == 0 {
                bank.branch_taken(PC + i * 4, TARGET);
            } else {
                bank.branch_not_taken(PC + i * 4, TARGET);
            }
        }

        let scores = bank.scores();
        assert_eq!(scores.always_taken.hits, scores.never_taken.misses);
        assert_eq!(scores.always_taken.misses, scores.never_taken.hits);
    }

    #[test]
    fn all_not_taken_loop() {
        let mut bank = PredictorBank::new(4);

        for _ in 0..10 {
            bank.branch_not_taken(PC, TARGET);
        }

        let scores = bank.scores();
        assert_eq!(scores.always_taken.hits, 0);
        assert_eq!(scores.always_taken.misses, 10);
        assert_eq!(scores.never_taken.hits, 10);
        assert_eq!(scores.never_taken.misses, 0);
        // As tabelas nascem do lado taken: o primeiro not-taken é o
        // único erro dos preditores dinâmicos.
        assert_eq!(scores.one_bit.hits, 9);
        assert_eq!(scores.one_bit.misses, 1);
        assert_eq!(scores.two_bit.hits, 9);
        assert_eq!(scores.two_bit.misses, 1);
    }

    #[test]
    fn one_bit_charges_stale_targets() {
        let mut bank = PredictorBank::new(4);

        // Estado inicial é taken com alvo 0: o primeiro taken de
        // verdade erra só pelo alvo.
        bank.branch_taken(PC, TARGET);
        assert_eq!(bank.scores().one_bit.misses, 1);

        bank.branch_taken(PC, TARGET);
        assert_eq!(bank.scores().one_bit.hits, 1);

        // Mesmo índice, alvo novo: erra de novo.
        bank.branch_taken(PC, TARGET + 8);
        assert_eq!(bank.scores().one_bit.misses, 2);

        bank.branch_taken(PC, TARGET + 8);
        assert_eq!(bank.scores().one_bit.hits, 2);
    }

    #[test]
    fn one_bit_flips_on_direction_change() {
        let mut bank = PredictorBank::new(4);

        bank.branch_taken(PC, TARGET); // miss (alvo frio)
        bank.branch_taken(PC, TARGET); // hit
        bank.branch_not_taken(PC, TARGET); // miss, vira not-taken
        bank.branch_not_taken(PC, TARGET); // hit
        bank.branch_taken(PC, TARGET); // miss, volta pra taken
        bank.branch_taken(PC, TARGET); // hit

        let scores = bank.scores();
        assert_eq!(scores.one_bit.hits, 3);
        assert_eq!(scores.one_bit.misses, 3);
    }

    #[test]
    fn two_bit_needs_two_flips_to_change_direction() {
        let mut bank = PredictorBank::new(4);

        // Leva a entrada até strongly-not-taken.
        bank.branch_not_taken(PC, TARGET); // miss: WT -> WNT
        bank.branch_not_taken(PC, TARGET); // hit: -> SNT
        assert_eq!(bank.scores().two_bit.misses, 1);

        // Um taken isolado não muda a previsão...
        bank.branch_taken(PC, TARGET); // miss: SNT -> WNT
        bank.branch_not_taken(PC, TARGET); // hit: -> SNT
        assert_eq!(bank.scores().two_bit.misses, 2);
        assert_eq!(bank.scores().two_bit.hits, 2);

        // ...mas dois seguidos sim.
        bank.branch_taken(PC, TARGET); // miss: SNT -> WNT
        bank.branch_taken(PC, TARGET); // miss: WNT -> WT, alvo gravado
        bank.branch_taken(PC, TARGET); // hit: -> ST
        assert_eq!(bank.scores().two_bit.misses, 4);
        assert_eq!(bank.scores().two_bit.hits, 3);
    }

    #[test]
    fn two_bit_demotes_on_stale_target() {
        let mut bank = PredictorBank::new(4);

        // Sobe até strongly-taken com o alvo A.
        bank.branch_taken(PC, TARGET); // miss: alvo frio, WT -> WNT
        bank.branch_taken(PC, TARGET); // miss: WNT -> WT, alvo <- A
        bank.branch_taken(PC, TARGET); // hit: -> ST
        assert_eq!(bank.scores().two_bit.misses, 2);

        // Direção certa, alvo trocado: miss e um degrau de confiança a
        // menos.
        bank.branch_taken(PC, TARGET + 16); // miss: ST -> WT, alvo <- B
        bank.branch_taken(PC, TARGET + 16); // hit: -> ST
        assert_eq!(bank.scores().two_bit.misses, 3);
        assert_eq!(bank.scores().two_bit.hits, 2);
    }

    #[test]
    fn aliased_branches_share_an_entry() {
        let mut bank = PredictorBank::new(2);

        // Com 4 entradas, PC e PC+16 caem no mesmo índice.
        let a = PC;
        let b = PC + 16;
        assert_eq!(bank.index(a), bank.index(b));

        bank.branch_taken(a, TARGET);
        bank.branch_taken(a, TARGET);
        assert_eq!(bank.scores().one_bit.hits, 1);

        // O vizinho de índice herda a direção mas não o alvo.
        bank.branch_taken(b, TARGET + 64);
        assert_eq!(bank.scores().one_bit.misses, 2);
    }

    #[test]
    fn distinct_indices_are_independent() {
        let mut bank = PredictorBank::new(8);

        bank.branch_taken(PC, TARGET);
        bank.branch_taken(PC, TARGET);
        bank.branch_not_taken(PC + 4, TARGET);

        // O not-taken em outro índice não mexe na entrada de PC.
        bank.branch_taken(PC, TARGET);
        let scores = bank.scores();
        assert_eq!(scores.one_bit.hits, 2);
        assert_eq!(scores.one_bit.misses, 2); // alvo frio + flip do índice vizinho
    }

    #[test]
    fn reset_restores_the_initial_bet() {
        let mut bank = PredictorBank::new(4);

        bank.branch_not_taken(PC, TARGET);
        bank.branch_not_taken(PC, TARGET);
        bank.reset();

        assert_eq!(bank.scores().one_bit.misses, 0);

        // Depois do reset a entrada volta a apostar em taken.
        bank.branch_not_taken(PC, TARGET);
        assert_eq!(bank.scores().one_bit.misses, 1);
    }
}

//! Reportador de estatísticas de execução.
//!
//! Junta o relatório humano do fim da simulação (hazards, caches,
//! preditores, tempo de parede) e a linha estruturada que vai pro
//! arquivo de bench, uma por execução.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::time::Instant;

use color_eyre::eyre::{eyre, Result};

use super::profile::Profiler;

/// Um reportador de estatísticas de execução. Armazena os instantes de
/// início e fim da execução; todos os contadores em si moram no
/// `Profiler`.
pub struct StatsReporter {
    /// O instante em que a execução começou.
    start: Option<Instant>,
    /// O instante em que a execução terminou.
    finish: Option<Instant>,
}

impl StatsReporter {
    /// Cria um novo `StatsReporter` zerado.
    pub fn new() -> StatsReporter {
        StatsReporter {
            start: None,
            finish: None,
        }
    }

    /// Inicia a contagem de tempo.
    pub fn start(&mut self) {
        self.start = Some(Instant::now());
    }

    /// Termina a contagem de tempo.
    pub fn finish(&mut self) {
        self.finish = Some(Instant::now());
    }

    /// Imprime o relatório completo na saída padrão.
    pub fn print_stats(&self, prof: &Profiler) -> Result<()> {
        let start = *self
            .start
            .as_ref()
            .ok_or_else(|| eyre!("StatsReporter did not start!"))?;
        let finish = *self
            .finish
            .as_ref()
            .ok_or_else(|| eyre!("StatsReporter did not finish!"))?;

        let delta = finish - start;
        let total = prof.instructions();
        let ips = total as f64 / delta.as_secs_f64();

        println!();
        println!("Execution finished successfully!");
        println!("--------------------------");
        println!("Instruction count: {}", total);
        println!("Simulation time: {:.2} sec", delta.as_secs_f32());
        println!("Average IPS: {:.2}", ips);

        println!();
        println!("Pipeline");
        println!("--------------------------");
        println!("Load-use hazards: {}", prof.hazards());

        println!();
        println!("Caches");
        println!("--------------------------");
        println!("Data cache misses: {}", prof.data_cache_misses());
        println!("Memory accesses: {}", prof.mem_accesses());
        if prof.mem_accesses() > 0 {
            println!(
                "dataMiss/memAccess: {:.6}",
                prof.data_cache_misses() as f64 / prof.mem_accesses() as f64
            );
        }
        println!("Instruction cache misses: {}", prof.instr_cache_misses());
        if total > 0 {
            println!(
                "instrMiss/instrCount: {:.6}",
                prof.instr_cache_misses() as f64 / total as f64
            );
        }
        println!("Unaligned accesses: {}", prof.unaligned_accesses());

        let scores = prof.scores();

        println!();
        println!("Branch prediction (K = {})", prof.index_bits());
        println!("--------------------------");
        println!(
            "Always taken: [ {} ] hits and [ {} ] misses",
            scores.always_taken.hits, scores.always_taken.misses
        );
        println!(
            "Never taken: [ {} ] hits and [ {} ] misses",
            scores.never_taken.hits, scores.never_taken.misses
        );
        println!(
            "One-bit prediction: [ {} ] hits and [ {} ] misses",
            scores.one_bit.hits, scores.one_bit.misses
        );
        println!(
            "Two-bit prediction: [ {} ] hits and [ {} ] misses",
            scores.two_bit.hits, scores.two_bit.misses
        );

        Ok(())
    }
}

/// Anexa a linha de resumo dos preditores no arquivo de bench: a
/// largura do índice e os misses de cada estratégia, uma execução por
/// linha.
pub fn append_bench(path: impl AsRef<Path>, prof: &Profiler) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path.as_ref())?;

    let scores = prof.scores();
    writeln!(
        file,
        "[K = {}] {}\t\t{}\t\t{}\t\t{}",
        prof.index_bits(),
        scores.always_taken.misses,
        scores.never_taken.misses,
        scores.one_bit.misses,
        scores.two_bit.misses
    )?;

    Ok(())
}

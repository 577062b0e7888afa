//! octane: um emulador de MIPS I que, além de executar o programa,
//! conta o que a microarquitetura sentiria no caminho: hazards
//! load-use, misses nas caches de dados e de instruções, acessos
//! desalinhados e o placar de quatro estratégias de previsão de desvio.
//!
//! O arquivo [main.rs](src/main.rs) toma conta apenas do CLI.
//! Implementação do emulador em si está no módulo `emulator`.

use clap::{crate_version, App, Arg, SubCommand};
use color_eyre::eyre::{eyre, Result};
use goblin::elf::Elf;

use std::fs::File;
use std::io::Read;

pub(crate) mod emulator;

use emulator::profile::{AccessEvent, AccessReporter, CacheConfig, ProfileConfig};
use emulator::stats::{self, StatsReporter};
use emulator::{Cpu, Instruction, Profiler, Ram};

/// Carrega o arquivo num vetor de palavras de 32 bits.
fn u32_vec_from_file(mut file: File) -> Vec<u32> {
    let mut data = Vec::new();
    file.read_to_end(&mut data).unwrap();

    data.chunks(4)
        .map(|b| {
            let mut owned_b = [0u8; 4];
            owned_b[..b.len()].copy_from_slice(b);
            u32::from_le_bytes(owned_b)
        })
        .collect()
}

/// Encapsula uma dupla .text/.data de palavras de 32 bits.
#[derive(Debug)]
pub struct Executable {
    pub text: Vec<u32>,
    pub data: Option<Vec<u32>>,
    pub rodata: Option<Vec<u32>>,
}

impl Executable {
    /// Lê os arquivos `pfx.text` e `pfx.data` e retorna um Executable contendo os dados
    pub fn from_naked_files(pfx: impl AsRef<str>) -> Result<Executable> {
        let text = u32_vec_from_file(File::open(format!("{}.text", pfx.as_ref()))?);
        let data = File::open(format!("{}.data", pfx.as_ref()))
            .ok()
            .map(u32_vec_from_file);
        let rodata = File::open(format!("{}.rodata", pfx.as_ref()))
            .ok()
            .map(u32_vec_from_file);

        Ok(Executable { text, data, rodata })
    }
}

/// Monta a configuração do perfilador a partir do índice escolhido no
/// CLI.
fn profile_config(conf: &str, index_bits: usize) -> Result<ProfileConfig> {
    let (data, instr) = match conf {
        "1" => (
            CacheConfig {
                rows: 64,
                words_per_line: 4,
            },
            CacheConfig {
                rows: 64,
                words_per_line: 4,
            },
        ),
        "2" => (
            CacheConfig {
                rows: 32,
                words_per_line: 4,
            },
            CacheConfig {
                rows: 256,
                words_per_line: 1,
            },
        ),
        "3" => (
            CacheConfig {
                rows: 256,
                words_per_line: 8,
            },
            CacheConfig {
                rows: 256,
                words_per_line: 8,
            },
        ),
        c => return Err(eyre!("Configuração de cache {} não conhecida!", c)),
    };

    Ok(ProfileConfig {
        data,
        instr,
        index_bits,
    })
}

/// Carrega os segmentos de um `Executable` nos endereços de costume.
fn load_executable(ram: &mut Ram, executable: &Executable) -> Result<()> {
    ram.load_slice_into_addr(0x0040_0000, &executable.text[..])?;
    if let Some(ref data) = executable.data {
        ram.load_slice_into_addr(0x1001_0000, &data[..])?;
    }
    if let Some(ref data) = executable.rodata {
        ram.load_slice_into_addr(0x0080_0000, &data[..])?;
    }

    Ok(())
}

fn main() -> Result<()> {
    color_eyre::install()?;
    env_logger::init();

    // Aqui é descrito o CLI do emulador.
    // Não vou comentar porque a API do clap é bem auto-descritiva
    let matches = App::new("octane")
        .version(crate_version!())
        .author("Edu Renesto, eduardo.renesto@aluno.ufabc.edu.br")
        .arg(
            Arg::with_name("conf")
                .required(false)
                .default_value("1")
                .help("Índice da configuração das caches"),
        )
        .arg(
            Arg::with_name("pred-bits")
                .long("pred-bits")
                .short("k")
                .required(false)
                .default_value("15")
                .help("Largura K, em bits, do índice dos preditores de desvio"),
        )
        .arg(
            Arg::with_name("bench")
                .long("bench")
                .required(false)
                .default_value("bench.txt")
                .help("Arquivo onde anexar o resumo dos preditores a cada execução"),
        )
        .subcommand(
            SubCommand::with_name("decode")
                .about("Desconstrói o binário, mostrando o código Assembly equivalente")
                .arg(Arg::with_name("file").index(1).required(true)),
        )
        .subcommand(
            SubCommand::with_name("run")
                .about("Carrega o binário, o executa e imprime as estatísticas")
                .arg(
                    Arg::with_name("entry")
                        .long("entry")
                        .short("e")
                        .required(false)
                        .default_value("0x00400000")
                        .help("Endereço da primeira instrução"),
                )
                .arg(Arg::with_name("file").index(1).required(true)),
        )
        .subcommand(
            SubCommand::with_name("trace")
                .about("Executa o binário, escrevendo cada acesso verificado nas caches no arquivo")
                .arg(
                    Arg::with_name("entry")
                        .long("entry")
                        .short("e")
                        .required(false)
                        .default_value("0x00400000")
                        .help("Endereço da primeira instrução"),
                )
                .arg(
                    Arg::with_name("outfile")
                        .long("outfile")
                        .short("o")
                        .required(false)
                        .default_value("octane.trace")
                        .help("Arquivo onde escrever os acessos verificados"),
                )
                .arg(Arg::with_name("file").index(1).required(true)),
        )
        .subcommand(
            SubCommand::with_name("runelf")
                .about("Carrega um arquivo ELF e o executa (bonus!)")
                .arg(Arg::with_name("file").index(1).required(true)),
        )
        .subcommand(
            SubCommand::with_name("decodeelf")
                .about("Carrega um arquivo ELF e o desconstrói, mostrando o código Assembly equivalente (bonus!)")
                .arg(Arg::with_name("file").index(1).required(true)),
        )
        .get_matches();

    let conf = matches.value_of("conf").unwrap();
    let index_bits = matches.value_of("pred-bits").unwrap().parse::<usize>()?;
    let bench = matches.value_of("bench").unwrap();

    if let Some(matches) = matches.subcommand_matches("decode") {
        // Desmonta o binário
        let executable = Executable::from_naked_files(matches.value_of("file").unwrap())?;

        let mut addr = 0x0040_0000;

        for word in executable.text {
            println!(
                "{:08x}:\t{:08x}\t{}",
                addr,
                word,
                Instruction::decode(word)?
            );
            addr += 4;
        }

        Ok(())
    } else if let Some(matches) = matches.subcommand_matches("run") {
        let mut ram = Ram::new();

        // Executa o binário
        let entry = u32::from_str_radix(&matches.value_of("entry").unwrap()[2..], 16)?;
        let executable = Executable::from_naked_files(matches.value_of("file").unwrap())?;
        load_executable(&mut ram, &executable)?;

        let profiler = Profiler::new(profile_config(conf, index_bits)?, None);
        let mut cpu = Cpu::new(ram, profiler, entry, 0x7FFF_EFFC, 0x1000_8000);

        let mut stats = StatsReporter::new();
        stats.start();
        cpu.run()?;
        stats.finish();

        stats.print_stats(cpu.profiler())?;
        stats::append_bench(bench, cpu.profiler())?;

        Ok(())
    } else if let Some(matches) = matches.subcommand_matches("trace") {
        let mut ram = Ram::new();

        let entry = u32::from_str_radix(&matches.value_of("entry").unwrap()[2..], 16)?;
        let executable = Executable::from_naked_files(matches.value_of("file").unwrap())?;
        load_executable(&mut ram, &executable)?;

        let out_file = matches.value_of("outfile").unwrap();
        let out_file = File::create(out_file)?;
        let (rep_thread, tx) = AccessReporter::new(out_file);

        let profiler = Profiler::new(profile_config(conf, index_bits)?, Some(tx.clone()));
        let mut cpu = Cpu::new(ram, profiler, entry, 0x7FFF_EFFC, 0x1000_8000);

        let mut stats = StatsReporter::new();
        stats.start();
        cpu.run()?;
        stats.finish();

        tx.send(AccessEvent::Finish).unwrap();
        rep_thread.join().unwrap();

        stats.print_stats(cpu.profiler())?;
        stats::append_bench(bench, cpu.profiler())?;

        Ok(())
    } else if let Some(matches) = matches.subcommand_matches("runelf") {
        let mut ram = Ram::new();

        // Executa o elf
        let mut file = File::open(matches.value_of("file").unwrap())?;
        let mut file_bytes = Vec::new();
        file.read_to_end(&mut file_bytes)?;

        let elf = Elf::parse(&file_bytes[..])?;

        // Carrega cada seção carregável em seu respectivo endereço
        for section in elf.program_headers {
            if section.p_type == goblin::elf::program_header::PT_LOAD {
                println!(
                    "elf: loading {} bytes to {:#010x}...",
                    section.p_memsz, section.p_paddr
                );
                let offset = section.p_offset as usize;
                let size = section.p_filesz as usize;

                let section_bytes: Vec<u32> = file_bytes[offset..offset + size]
                    .chunks(4)
                    .map(|b| {
                        let mut owned_b = [0u8; 4];
                        owned_b[..b.len()].copy_from_slice(b);
                        u32::from_le_bytes(owned_b)
                    })
                    .collect();

                ram.load_slice_into_addr(section.p_paddr as u32, &section_bytes[..])?;
            }
        }

        let profiler = Profiler::new(profile_config(conf, index_bits)?, None);

        // Seta o PC para o entry point do arquivo ELF
        let mut cpu = Cpu::new(ram, profiler, elf.entry as u32, 0x7FFF_EFFC, 0x1000_8000);

        let mut stats = StatsReporter::new();
        stats.start();
        cpu.run()?;
        stats.finish();

        stats.print_stats(cpu.profiler())?;
        stats::append_bench(bench, cpu.profiler())?;

        Ok(())
    } else if let Some(matches) = matches.subcommand_matches("decodeelf") {
        // Disassemble do arquivo ELF
        let mut file = File::open(matches.value_of("file").unwrap())?;
        let mut file_bytes = Vec::new();
        file.read_to_end(&mut file_bytes)?;

        let elf = Elf::parse(&file_bytes[..])?;

        // Só desmonte as seções que vão ser carregadas na memória
        for section in elf.section_headers {
            if section.sh_type == goblin::elf::section_header::SHT_PROGBITS
                && section.sh_flags & goblin::elf::section_header::SHF_ALLOC as u64 != 0
            {
                println!(
                    "Diassemble of section {}:",
                    &elf.shdr_strtab[section.sh_name]
                );
                let offset = section.sh_offset as usize;
                let size = section.sh_size as usize;

                let section_bytes: Vec<u32> = file_bytes[offset..offset + size]
                    .chunks(4)
                    .map(|b| {
                        let mut owned_b = [0u8; 4];
                        owned_b[..b.len()].copy_from_slice(b);
                        u32::from_le_bytes(owned_b)
                    })
                    .collect();

                let offset = section.sh_addr;
                let mut pos = 0;
                for word in section_bytes {
                    match Instruction::decode(word) {
                        Ok(instr) => print!("{:#010x}: {}", offset + pos, instr),
                        Err(_) => print!("{:#010x}: ???", offset + pos),
                    }
                    if offset + pos == elf.entry {
                        println!(" # <- entry");
                    } else {
                        println!();
                    }
                    pos += 4;
                }
                println!();
            }
        }

        Ok(())
    } else {
        eprintln!("{}", matches.usage());
        Ok(())
    }
}

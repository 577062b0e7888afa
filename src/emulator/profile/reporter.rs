//! Escreve num arquivo, linha a linha, cada acesso verificado pelas
//! caches simuladas.
//!
//! A escrita acontece numa thread separada, alimentada por um channel:
//! assim a thread principal não para pra esvaziar buffer de arquivo no
//! meio da emulação.

use std::fs::File;
use std::io::Write;
use std::sync::mpsc;
use std::thread;

/// As mensagens que o reporter pode receber.
#[derive(Copy, Clone, Debug)]
pub enum AccessEvent {
    /// Uma leitura de dados: endereço, linha da cache e quantos misses
    /// o acesso custou.
    DataRead(u32, usize, u64),
    /// Uma escrita de dados: endereço, linha e misses.
    DataWrite(u32, usize, u64),
    /// Uma busca de instrução: endereço, linha e misses.
    InstrFetch(u32, usize, u64),
    /// Finaliza o reporter.
    Finish,
}

/// O `AccessReporter` spawna a thread de escrita e devolve o join
/// handle junto com o write end do channel.
pub struct AccessReporter;

impl AccessReporter {
    pub fn new(file: File) -> (thread::JoinHandle<()>, mpsc::Sender<AccessEvent>) {
        let (tx, rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            let mut file = file;
            while let Ok(msg) = rx.recv() {
                match msg {
                    AccessEvent::DataRead(addr, row, misses) => {
                        writeln!(file, "R {:#010x} (row {:#05x}) misses={}", addr, row, misses)
                            .unwrap();
                    }
                    AccessEvent::DataWrite(addr, row, misses) => {
                        writeln!(file, "W {:#010x} (row {:#05x}) misses={}", addr, row, misses)
                            .unwrap();
                    }
                    AccessEvent::InstrFetch(addr, row, misses) => {
                        writeln!(file, "I {:#010x} (row {:#05x}) misses={}", addr, row, misses)
                            .unwrap();
                    }
                    AccessEvent::Finish => {
                        file.flush().unwrap();
                        break;
                    }
                }
            }
        });

        (handle, tx)
    }
}

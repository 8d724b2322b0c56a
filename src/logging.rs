//! Capacidade de logging injetada
//!
//! O coordenador OAuth e o transporte HTTP recebem um `Logger` na construção;
//! não existe logger global. `TracingLogger` é a implementação padrão.

use std::sync::{Arc, Mutex};
use tracing::{debug, error, info};

/// Destino dos logs emitidos em cada ponto de decisão e falha
pub trait Logger: Send + Sync {
    fn debug(&self, message: &str);

    fn error(&self, message: &str);

    fn info(&self, message: &str) {
        self.debug(message);
    }
}

/// Encaminha para as macros do `tracing` (target `live_connect`)
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn debug(&self, message: &str) {
        debug!(target: "live_connect", "{}", message);
    }

    fn error(&self, message: &str) {
        error!(target: "live_connect", "{}", message);
    }

    fn info(&self, message: &str) {
        info!(target: "live_connect", "{}", message);
    }
}

/// Nível de uma linha capturada pelo `MemoryLogger`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Debug,
    Info,
    Error,
}

/// Logger que guarda as mensagens em memória (útil em testes)
#[derive(Debug, Clone, Default)]
pub struct MemoryLogger {
    lines: Arc<Mutex<Vec<(Level, String)>>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, level: Level, message: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push((level, message.to_string()));
        }
    }

    /// Todas as linhas capturadas, em ordem
    pub fn lines(&self) -> Vec<(Level, String)> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Mensagens de erro capturadas
    pub fn errors(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|(level, _)| *level == Level::Error)
            .map(|(_, message)| message)
            .collect()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|(_, message)| message.contains(needle))
    }
}

impl Logger for MemoryLogger {
    fn debug(&self, message: &str) {
        self.push(Level::Debug, message);
    }

    fn error(&self, message: &str) {
        self.push(Level::Error, message);
    }

    fn info(&self, message: &str) {
        self.push(Level::Info, message);
    }
}

/// Trunca uma string sem cortar caracteres UTF-8 no meio.
///
/// Usado para não vazar tokens, códigos e segredos completos nos logs.
pub fn truncate_safe(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }

    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }

    &s[..end]
}

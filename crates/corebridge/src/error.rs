use std::path::PathBuf;

use thiserror::Error;

use crate::memory::MemoryKind;

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to open core module {}: {reason}", path.display())]
    OpenFailed { path: PathBuf, reason: String },

    #[error("core module is missing required symbol `{0}`")]
    SymbolMissing(&'static str),

    #[error("no core registered under `{0}`")]
    CoreNotFound(String),

    #[error("core interface table has no `{0}` entry")]
    IncompleteCore(&'static str),

    #[error("another bridge session is already active")]
    SessionBusy,

    #[error("no core is loaded")]
    NoCoreLoaded,

    #[error("a core is already loaded")]
    CoreAlreadyLoaded,

    #[error("no game is loaded")]
    NoGameLoaded,

    #[error("a game is already loaded")]
    GameAlreadyLoaded,

    #[error("core rejected content {0}")]
    GameRejected(String),

    #[error("core requires content as a filesystem path")]
    PathRequired,

    #[error("core does not support running without content")]
    NoGameUnsupported,

    #[error("path cannot be passed to a core: {}", .0.display())]
    InvalidPath(PathBuf),

    #[error("string contains an interior NUL byte")]
    InvalidString,

    #[error("core does not implement {0}")]
    Unsupported(&'static str),

    #[error("core failed to serialize its state")]
    SerializeFailed,

    #[error("core failed to restore state; emulated state may be corrupted, consider a reset")]
    UnserializeFailed,

    #[error("core does not expose {0} memory")]
    MemoryUnavailable(MemoryKind),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

//! Error types untuk mapping dan storage
//!
//! Semua kegagalan konstruksi membawa konteks (path/direktori) supaya
//! bisa didiagnosa tanpa stack trace. Misuse (akses setelah release)
//! bukan error di sini - itu panic.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to map {} into memory: {source}", Error::describe_path(path))]
    Map {
        path: Option<PathBuf>,
        #[source]
        source: io::Error,
    },

    #[error("failed to open file {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to create temp file in directory {directory:?}: {source}")]
    CreateTemp {
        directory: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write data into {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no write access to directory {directory:?}: {source}")]
    Probe {
        directory: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to flush mapping: {source}")]
    Flush {
        #[source]
        source: io::Error,
    },

    #[error("failed to release shared resource: {source}")]
    Release {
        #[source]
        source: io::Error,
    },
}

impl Error {
    fn describe_path(path: &Option<PathBuf>) -> String {
        match path {
            Some(p) => format!("{:?}", p),
            None => "open file".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

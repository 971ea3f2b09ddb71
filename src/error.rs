use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CartridgeError {
    #[error("failed to read ROM {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("ROM image is {0} bytes; the header alone needs 0x150")]
    TooSmall(usize),
}

#[derive(Debug, Error)]
pub enum EmuError {
    #[error(transparent)]
    Cartridge(#[from] CartridgeError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to write image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

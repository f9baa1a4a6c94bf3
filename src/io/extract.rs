//! Archive extraction module.
//!
//! Handles tar.gz, tar.zst, plain tar, and zip archives. Extraction only
//! ever runs on an archive whose checksum has already been verified.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path};

use flate2::read::GzDecoder;
use thiserror::Error;
use zip::ZipArchive;
use zstd::stream::Decoder as ZstdDecoder;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("unsupported archive format: {0}")]
    UnsupportedFormat(String),

    #[error("archive error: {0}")]
    Archive(String),
}

/// Archive format, detected from the download's file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    TarZst,
    Tar,
    Zip,
}

impl ArchiveFormat {
    pub fn detect(filename: &str) -> Result<Self, ExtractError> {
        if filename.ends_with(".tar.gz") || filename.ends_with(".tgz") {
            Ok(Self::TarGz)
        } else if filename.ends_with(".tar.zst") {
            Ok(Self::TarZst)
        } else if filename.ends_with(".tar") {
            Ok(Self::Tar)
        } else if filename.ends_with(".zip") {
            Ok(Self::Zip)
        } else {
            Err(ExtractError::UnsupportedFormat(filename.to_string()))
        }
    }
}

/// Extract an archive into `dest_dir`, detecting the format from its name.
pub fn extract_auto(archive_path: &Path, dest_dir: &Path) -> Result<(), ExtractError> {
    let filename = archive_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();

    match ArchiveFormat::detect(filename)? {
        ArchiveFormat::TarGz => {
            let reader = BufReader::new(File::open(archive_path)?);
            extract_tar(GzDecoder::new(reader), dest_dir)
        }
        ArchiveFormat::TarZst => {
            let reader = BufReader::new(File::open(archive_path)?);
            extract_tar(ZstdDecoder::new(reader)?, dest_dir)
        }
        ArchiveFormat::Tar => {
            let reader = BufReader::new(File::open(archive_path)?);
            extract_tar(reader, dest_dir)
        }
        ArchiveFormat::Zip => extract_zip(archive_path, dest_dir),
    }
}

/// Extract a tar stream, refusing entries that escape the destination.
fn extract_tar<R: Read>(reader: R, dest_dir: &Path) -> Result<(), ExtractError> {
    fs::create_dir_all(dest_dir)?;

    let mut archive = tar::Archive::new(reader);
    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_path = entry.path()?.into_owned();

        if entry.header().entry_type().is_dir() {
            continue;
        }

        // Reject absolute paths and parent-directory components outright.
        let sane = entry_path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !sane {
            return Err(ExtractError::Archive(format!(
                "unsafe path in archive: {}",
                entry_path.display()
            )));
        }

        let target = dest_dir.join(&entry_path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        entry.unpack(&target)?;
    }

    Ok(())
}

fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<(), ExtractError> {
    fs::create_dir_all(dest_dir)?;
    let file = File::open(archive_path)?;
    let mut archive =
        ZipArchive::new(file).map_err(|e| ExtractError::Archive(e.to_string()))?;
    archive
        .extract(dest_dir)
        .map_err(|e| ExtractError::Archive(e.to_string()))
}

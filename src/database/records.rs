//! Sequence record extraction.
//!
//! Scans a directory of per-taxon reference files (`taxid_<id>_*`, gzip,
//! bzip2 or zstd compressed) and turns every FASTA header into a
//! [`SequenceRecord`]. A file with an unparsable header is skipped as a
//! whole; the rest of the directory is still scanned. Read and decompression
//! failures abort the scan.

use bzip2::read::MultiBzDecoder;
use flate2::read::MultiGzDecoder;
use log::{debug, info, warn};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name prefix of per-taxon sequence files.
pub const FILE_PREFIX: &str = "taxid_";

const HEADER_MARKER: char = '>';
const LENGTH_TOKEN_POSITION: usize = 2;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Sequence directory not found: {0}")]
    MissingDirectory(PathBuf),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Header format error in {path} at line {line}: {reason}")]
    HeaderFormat {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

/// One sequence header of a per-taxon file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRecord {
    pub accession: String,
    pub taxon_id: String,
    pub length: u64,
}

/// Compression formats accepted for sequence files, picked by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    Bzip2,
    Zstd,
}

impl Compression {
    pub fn from_path(path: &Path) -> Option<Compression> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("gz") => Some(Compression::Gzip),
            Some("bz2") => Some(Compression::Bzip2),
            Some("zst") => Some(Compression::Zstd),
            _ => None,
        }
    }
}

/// Extracts the taxon id from a `taxid_<id>_...` file name.
///
/// Returns `None` when the name does not follow the convention.
pub fn taxon_id_from_file_name(file_name: &str) -> Option<&str> {
    let rest = file_name.strip_prefix(FILE_PREFIX)?;
    let (taxon_id, _) = rest.split_once('_')?;
    if taxon_id.is_empty() {
        None
    } else {
        Some(taxon_id)
    }
}

/// Opens a compressed sequence file as a line reader.
pub fn open_decompressed(path: &Path, compression: Compression) -> io::Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    let reader: Box<dyn BufRead> = match compression {
        Compression::Gzip => Box::new(BufReader::new(MultiGzDecoder::new(file))),
        Compression::Bzip2 => Box::new(BufReader::new(MultiBzDecoder::new(file))),
        Compression::Zstd => Box::new(BufReader::new(zstd::stream::read::Decoder::new(file)?)),
    };
    Ok(reader)
}

/// Parses `>ACCESSION <token> length=<N> ...` into accession and length.
///
/// The length is read from the third whitespace-separated token, which must
/// be a `key=value` pair with an unsigned integer value.
pub fn parse_header(header: &str) -> Result<(String, u64), String> {
    let tokens: Vec<&str> = header.split_whitespace().collect();
    let accession = tokens
        .first()
        .map(|t| t.strip_prefix(HEADER_MARKER).unwrap_or(t))
        .filter(|a| !a.is_empty())
        .ok_or_else(|| "missing accession".to_string())?;

    let token = tokens
        .get(LENGTH_TOKEN_POSITION)
        .ok_or_else(|| format!("expected a length token at position {LENGTH_TOKEN_POSITION}"))?;
    let (_, value) = token
        .split_once('=')
        .ok_or_else(|| format!("length token '{token}' is not key=value"))?;
    let length = value
        .parse::<u64>()
        .map_err(|e| format!("invalid length '{value}': {e}"))?;

    Ok((accession.to_string(), length))
}

/// Reads every header of one sequence file.
pub fn scan_file(
    path: &Path,
    compression: Compression,
    taxon_id: &str,
) -> Result<Vec<SequenceRecord>, ScanError> {
    let reader = open_decompressed(path, compression)?;
    let mut records = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if !line.starts_with(HEADER_MARKER) {
            continue;
        }
        let (accession, length) = parse_header(&line).map_err(|reason| ScanError::HeaderFormat {
            path: path.to_path_buf(),
            line: index + 1,
            reason,
        })?;
        records.push(SequenceRecord {
            accession,
            taxon_id: taxon_id.to_string(),
            length,
        });
    }

    debug!("{}: {} records", path.display(), records.len());
    Ok(records)
}

/// Lists the per-taxon sequence files of `dir`, sorted by file name.
fn find_taxon_files(dir: &Path) -> Result<Vec<(PathBuf, Compression, String)>, ScanError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let taxon_id = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(taxon_id_from_file_name)
            .map(str::to_string);
        match (taxon_id, Compression::from_path(&path)) {
            (Some(taxon_id), Some(compression)) => files.push((path, compression, taxon_id)),
            _ => debug!("Ignoring non sequence file: {:?}", path),
        }
    }
    files.sort_by(|a, b| a.0.file_name().cmp(&b.0.file_name()));
    Ok(files)
}

/// Scans every per-taxon sequence file in `dir`.
///
/// Records are returned in file-name order, then in file order. Files with a
/// malformed header are skipped with a warning; any I/O error is returned.
pub fn scan_directory(dir: impl AsRef<Path>) -> Result<Vec<SequenceRecord>, ScanError> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(ScanError::MissingDirectory(dir.to_path_buf()));
    }

    let files = find_taxon_files(dir)?;
    info!("Scanning {} sequence file(s) in {}.", files.len(), dir.display());

    let mut records = Vec::new();
    let mut skipped = 0;
    for (path, compression, taxon_id) in files {
        match scan_file(&path, compression, &taxon_id) {
            Ok(file_records) => records.extend(file_records),
            Err(e @ ScanError::HeaderFormat { .. }) => {
                warn!("Skipping {}: {}", path.display(), e);
                skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        "Collected {} sequence records ({} file(s) skipped).",
        records.len(),
        skipped
    );
    Ok(records)
}

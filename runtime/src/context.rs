//! Build context assembly.
//!
//! Packs the top-level files of a source directory into an in-memory tar
//! archive that is sent to the engine as the build context. Subdirectories
//! are never descended into.

use std::fs::{self, File, Metadata};
use std::io::{self, Read};
use std::path::Path;

use bytes::Bytes;
use dockrun_core::error::{ArchivePhase, BuildError, Result};
use dockrun_core::{BuildOptions, ContextMode};

/// Metadata for a single file in the build context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextEntry {
    /// File name, relative to the context root
    pub name: String,
    /// Content length in bytes
    pub size: u64,
    /// Permission bits
    pub mode: u32,
}

/// A finalized build context archive.
#[derive(Debug, Clone)]
pub struct BuildContext {
    archive: Bytes,
    entries: Vec<ContextEntry>,
}

impl BuildContext {
    /// Raw tar bytes, terminated and ready for transmission.
    pub fn archive(&self) -> &Bytes {
        &self.archive
    }

    /// Entries in archive order.
    pub fn entries(&self) -> &[ContextEntry] {
        &self.entries
    }

    pub fn into_archive(self) -> Bytes {
        self.archive
    }

    /// Sum of the content sizes of all entries.
    pub fn content_size(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }
}

/// Build the context archive for `src` according to `options.mode`.
pub fn build_context(src: &Path, options: &BuildOptions) -> Result<BuildContext> {
    match options.mode {
        ContextMode::AllFiles => archive_all_files(src),
        ContextMode::DockerfileOnly => archive_dockerfile(src, &options.dockerfile),
    }
}

/// Archive every regular file directly inside `src`.
///
/// Entries follow directory listing order, which is platform dependent.
pub fn archive_all_files(src: &Path) -> Result<BuildContext> {
    let context_dir = resolve_context_dir(src)?;

    let read_dir = fs::read_dir(&context_dir).map_err(|e| BuildError::ContextDirRead {
        path: context_dir.clone(),
        source: e,
    })?;

    let mut writer = ContextWriter::new();

    for entry in read_dir {
        let entry = entry.map_err(|e| BuildError::ContextDirRead {
            path: context_dir.clone(),
            source: e,
        })?;

        let path = entry.path();
        let file_name = entry.file_name();

        // Follows symlinks, so a link to a directory is skipped as well
        let metadata = fs::metadata(&path)
            .map_err(|e| file_error(&file_name.to_string_lossy(), ArchivePhase::Open, e))?;
        if metadata.is_dir() {
            tracing::debug!(name = ?file_name, "Skipping subdirectory");
            continue;
        }
        // Sockets, FIFOs and device nodes
        if !metadata.is_file() {
            tracing::debug!(name = ?file_name, "Skipping non-regular file");
            continue;
        }

        let name = file_name.into_string().map_err(|raw| {
            file_error(
                &raw.to_string_lossy(),
                ArchivePhase::Header,
                io::Error::new(io::ErrorKind::InvalidData, "file name is not valid UTF-8"),
            )
        })?;
        let data = read_file(&path, &name)?;
        writer.append(&name, &metadata, &data)?;
    }

    let context = writer.finish()?;
    tracing::info!(
        context = %context_dir.display(),
        files = context.entries.len(),
        bytes = context.archive.len(),
        "Build context archived"
    );
    Ok(context)
}

/// Archive only the Dockerfile named `dockerfile` from `src`.
pub fn archive_dockerfile(src: &Path, dockerfile: &str) -> Result<BuildContext> {
    let context_dir = resolve_context_dir(src)?;
    let path = context_dir.join(dockerfile);

    let metadata =
        fs::metadata(&path).map_err(|e| file_error(dockerfile, ArchivePhase::Open, e))?;
    if !metadata.is_file() {
        return Err(file_error(
            dockerfile,
            ArchivePhase::Open,
            io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
        ));
    }
    let data = read_file(&path, dockerfile)?;

    let mut writer = ContextWriter::new();
    writer.append(dockerfile, &metadata, &data)?;
    let context = writer.finish()?;

    tracing::info!(
        dockerfile = %path.display(),
        bytes = context.archive.len(),
        "Dockerfile-only build context archived"
    );
    Ok(context)
}

fn resolve_context_dir(src: &Path) -> Result<std::path::PathBuf> {
    src.canonicalize()
        .map_err(|e| BuildError::ContextPathNotFound {
            path: src.to_path_buf(),
            source: e,
        })
}

/// Read a whole file. The handle is closed before returning.
fn read_file(path: &Path, name: &str) -> Result<Vec<u8>> {
    let mut file = File::open(path).map_err(|e| file_error(name, ArchivePhase::Open, e))?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)
        .map_err(|e| file_error(name, ArchivePhase::Read, e))?;
    Ok(data)
}

fn file_error(name: &str, phase: ArchivePhase, source: io::Error) -> BuildError {
    BuildError::ContextFileRead {
        name: name.to_string(),
        phase,
        source,
    }
}

/// Accumulates tar entries in memory.
struct ContextWriter {
    builder: tar::Builder<Vec<u8>>,
    entries: Vec<ContextEntry>,
}

impl ContextWriter {
    fn new() -> Self {
        Self {
            builder: tar::Builder::new(Vec::new()),
            entries: Vec::new(),
        }
    }

    fn append(&mut self, name: &str, metadata: &Metadata, data: &[u8]) -> Result<()> {
        let size = data.len() as u64;
        let mode = file_mode(metadata);

        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(size);
        header.set_mode(mode);
        header.set_mtime(modified_secs(metadata));

        // Sets the path (with a GNU long-name record when needed) and checksum.
        // Writes into a Vec cannot fail, so any error comes from the name.
        self.builder
            .append_data(&mut header, name, data)
            .map_err(|e| file_error(name, ArchivePhase::Header, e))?;

        tracing::debug!(name = %name, size, mode = %format!("{:o}", mode), "Added file to build context");
        self.entries.push(ContextEntry {
            name: name.to_string(),
            size,
            mode,
        });
        Ok(())
    }

    /// Write the end-of-archive blocks and hand back the buffer.
    fn finish(self) -> Result<BuildContext> {
        let archive = self
            .builder
            .into_inner()
            .map_err(|e| BuildError::ContextArchive { source: e })?;
        Ok(BuildContext {
            archive: Bytes::from(archive),
            entries: self.entries,
        })
    }
}

#[cfg(unix)]
fn file_mode(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn file_mode(metadata: &Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

fn modified_secs(metadata: &Metadata) -> u64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

use std::path::Path;

use tokio::{
    fs::File,
    io::{self, AsyncBufReadExt, Lines},
};

/// Read a file from the given path into a list of strings
pub async fn read_file(path: impl AsRef<Path>) -> io::Result<Vec<String>> {
    let mut r = file_reader(path).await?;
    let mut lines = Vec::new();

    while let Some(line) = r.next_line().await? {
        lines.push(line);
    }

    Ok(lines)
}

/// Read a whole file as text
pub async fn read_text(path: impl AsRef<Path>) -> io::Result<String> {
    tokio::fs::read_to_string(path).await
}

/// Read a whole file as bytes
pub async fn read_bytes(path: impl AsRef<Path>) -> io::Result<Vec<u8>> {
    tokio::fs::read(path).await
}

async fn file_reader(path: impl AsRef<Path>) -> io::Result<Lines<io::BufReader<File>>> {
    let f = File::open(path).await?;

    Ok(io::BufReader::new(f).lines())
}

/// Write `contents` next to `path` and rename it into place, so a reader never observes a
/// partially written file and a failed write leaves the previous version intact
pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let staging = staging_path(path);

    std::fs::write(&staging, contents)?;
    std::fs::rename(&staging, path)
}

/// The temporary sibling used while `path` is being replaced
pub fn staging_path(path: &Path) -> std::path::PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".next");

    path.with_file_name(name)
}

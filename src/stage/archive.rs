use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::WorkgenError;

/// Package a set of named files into one archive.
///
/// Entries are stored flat under the given names, in the order supplied.
pub fn pack(archive_path: &Path, entries: &[(String, PathBuf)]) -> Result<(), WorkgenError> {
    let file = File::create(archive_path)?;
    let mut writer = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, path) in entries {
        writer.start_file(name.as_str(), options)?;
        let mut source = File::open(path)?;
        io::copy(&mut source, &mut writer)?;
    }

    writer.finish()?;
    Ok(())
}

/// Unpack every entry of an archive into a directory.
pub fn unpack(archive_path: &Path, dest: &Path) -> Result<(), WorkgenError> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file)?;
    archive.extract(dest)?;
    Ok(())
}

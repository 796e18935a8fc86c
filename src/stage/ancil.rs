use std::fs;
use std::io;
use std::os::unix::fs::symlink;
use std::path::Path;

use log::{info, warn};

use crate::config::ProjectDir;
use crate::descriptor::parse::{IfsdataRefs, WorkunitSpec};
use crate::error::WorkgenError;
use crate::stage::archive;

/// Stage the initial-condition archive as `ic_ancil_<wuid>.zip`.
///
/// The archive is located under the ancillary tree by experiment id, start
/// date, and analysis member number, and linked (not copied) into the
/// delivery area. A missing archive is logged, not fatal: registration will
/// reject the workunit later if the file never appears.
pub fn stage_ic_ancil(
    project: &ProjectDir,
    spec: &WorkunitSpec,
    start_date: &str,
    wuid: i64,
) -> Result<String, WorkgenError> {
    let source = project
        .ancil_dir()
        .join("ic_ancil")
        .join(&spec.exptid)
        .join(start_date)
        .join(&spec.analysis_member_number)
        .join(&spec.ic_ancil_zip);
    if !source.exists() {
        warn!(
            "The following file is not present in the ancillary files: {}",
            spec.ic_ancil_zip
        );
    }

    let link_name = format!("ic_ancil_{wuid}.zip");
    link_into_download(project, &source, &link_name)?;
    Ok(link_name)
}

/// Combine the three model-data sub-archives into `ifsdata_<wuid>.zip`.
///
/// Each sub-archive is copied into the scratch area, unpacked there, and the
/// union of extracted entries re-packed in name order. The combined archive
/// is regenerated for every workunit even when the inputs repeat.
pub fn combine_ifsdata(
    project: &ProjectDir,
    refs: &IfsdataRefs,
    wuid: i64,
) -> Result<String, WorkgenError> {
    let scratch = project.scratch_dir();
    let sources = [
        ("CFC_files", &refs.cfc_zip),
        ("radiation_files", &refs.radiation_zip),
        ("SO4_files", &refs.so4_zip),
    ];
    for (subdir, name) in sources {
        let source = project.ancil_dir().join("ifsdata").join(subdir).join(name);
        let staged = scratch.join(name);
        fs::copy(&source, &staged)?;
        archive::unpack(&staged, &scratch)?;
    }

    let mut entries = Vec::new();
    for entry in fs::read_dir(&scratch)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name == refs.cfc_zip || name == refs.radiation_zip || name == refs.so4_zip {
            continue;
        }
        entries.push((name, entry.path()));
    }
    entries.sort();

    let archive_name = format!("ifsdata_{wuid}.zip");
    archive::pack(&project.download_dir().join(&archive_name), &entries)?;
    info!("Combined {} model data files into {archive_name}", entries.len());
    Ok(archive_name)
}

/// Stage the climate-data archive as `clim_data_<wuid>.zip`, by reference.
pub fn stage_climate_data(
    project: &ProjectDir,
    archive_name: &str,
    wuid: i64,
) -> Result<String, WorkgenError> {
    let source = project.ancil_dir().join("climate_data").join(archive_name);
    if !source.exists() {
        warn!(
            "The following file is not present in the ancillary files: {}",
            archive_name
        );
    }

    let link_name = format!("clim_data_{wuid}.zip");
    link_into_download(project, &source, &link_name)?;
    Ok(link_name)
}

fn link_into_download(project: &ProjectDir, source: &Path, link_name: &str) -> io::Result<()> {
    let dest = project.download_dir().join(link_name);
    // a leftover link from an aborted run would make symlink fail
    if dest.symlink_metadata().is_ok() {
        fs::remove_file(&dest)?;
    }
    symlink(source, &dest)
}

use std::fs;

use crate::config::ProjectDir;
use crate::error::WorkgenError;
use crate::stage::archive;

/// Lines starting with this marker are dropped during rendering.
const COMMENT_MARKER: &str = "!!";

/// Apply an ordered list of exact-token substitutions to template text.
///
/// Tokens are replaced literally, line by line, each once and in the order
/// given; values are never re-scanned for further tokens. Ordering matters
/// where one token contains another (`_NUM_TIMESTEPS` before `_TIMESTEP`).
pub fn render(template: &str, substitutions: &[(&str, String)], strip_comments: bool) -> String {
    let mut out = String::with_capacity(template.len());
    for line in template.split_inclusive('\n') {
        let mut rendered = line.to_string();
        for (token, value) in substitutions {
            rendered = rendered.replace(token, value);
        }
        if strip_comments && rendered.starts_with(COMMENT_MARKER) {
            continue;
        }
        out.push_str(&rendered);
    }
    out
}

/// Convert Windows line endings to Unix ones.
pub fn normalise_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n")
}

/// Per-workunit values substituted into the model namelist.
pub struct NamelistInputs<'a> {
    pub exptid: &'a str,
    pub unique_member_id: &'a str,
    /// Delivery name of the initial-condition archive, without extension.
    pub ic_ancil_file: String,
    pub ifsdata_file: String,
    pub climate_data_file: String,
    pub horiz_resolution: &'a str,
    pub grid_type: &'a str,
    pub num_timesteps: u64,
    pub timestep: u64,
    pub ensemble_member_number: &'a str,
}

/// Render the model namelist and concatenate it after the post-processing
/// namelist.
///
/// The post-processing namelist is normalised to Unix line endings first;
/// both parts have comment lines stripped.
pub fn render_model_namelist(template: &str, fullpos: &str, inputs: &NamelistInputs) -> String {
    let substitutions = [
        ("_EXPTID", inputs.exptid.to_string()),
        ("_UNIQUE_MEMBER_ID", inputs.unique_member_id.to_string()),
        ("_IC_ANCIL_FILE", inputs.ic_ancil_file.clone()),
        ("_IFSDATA_FILE", inputs.ifsdata_file.clone()),
        ("_CLIMATE_DATA_FILE", inputs.climate_data_file.clone()),
        ("_HORIZ_RESOLUTION", inputs.horiz_resolution.to_string()),
        ("_GRID_TYPE", inputs.grid_type.to_string()),
        ("_NUM_TIMESTEPS", inputs.num_timesteps.to_string()),
        ("_TIMESTEP", inputs.timestep.to_string()),
        ("_ENSEMBLE_MEMBER_NUMBER", inputs.ensemble_member_number.to_string()),
    ];

    let fullpos_part = render(&normalise_line_endings(fullpos), &[], true);
    let model_part = render(template, &substitutions, true);
    fullpos_part + &model_part
}

/// Render the wave-model namelist. Substitution only; comments are kept.
pub fn render_wam_namelist(template: &str, start_date: &str, exptid: &str) -> String {
    let substitutions = [
        ("_START_DATE", start_date.to_string()),
        ("_EXPTID", exptid.to_string()),
    ];
    render(template, &substitutions, false)
}

/// Write the two rendered namelists to transient files and package them into
/// the per-workunit delivery archive.
///
/// The transient `fort.4` and `wam_namelist` files are removed whether or not
/// packaging succeeds, so they cannot leak into the next iteration.
pub fn package_namelists(
    project: &ProjectDir,
    workunit_name: &str,
    fort4: &str,
    wam: &str,
) -> Result<String, WorkgenError> {
    let scratch = project.scratch_dir();
    let fort4_path = scratch.join("fort.4");
    let wam_path = scratch.join("wam_namelist");
    fs::write(&fort4_path, fort4)?;
    fs::write(&wam_path, wam)?;

    let archive_name = format!("{workunit_name}.zip");
    let result = archive::pack(
        &project.download_dir().join(&archive_name),
        &[
            ("fort.4".to_string(), fort4_path.clone()),
            ("wam_namelist".to_string(), wam_path.clone()),
        ],
    );

    let _ = fs::remove_file(&fort4_path);
    let _ = fs::remove_file(&wam_path);

    result.map(|_| archive_name)
}

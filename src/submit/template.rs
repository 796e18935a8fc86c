use std::fs;

use log::info;
use serde::Serialize;
use tinytemplate::{format_unescaped, TinyTemplate};

use crate::config::ProjectDir;
use crate::error::WorkgenError;

/// Rendering context for the per-batch result template
#[derive(Serialize)]
struct ResultContext {
    upload_handler: String,
}

/// Rendering context for the per-workunit input template
#[derive(Serialize)]
pub struct InputContext {
    pub workunit_zip: String,
    pub ic_ancil_zip: String,
    pub ifsdata_zip: String,
    pub climate_data_zip: String,
    pub start_date: String,
    pub exptid: String,
    pub unique_member_id: String,
    pub batch_id: i64,
    pub workunit_id: i64,
    pub fclen: u64,
    pub fpops_est: u64,
    pub fpops_bound: u64,
}

/// Create the batch's result template if it is not already on disk.
///
/// The template is derived from the upload endpoint and cached between runs;
/// an existing file is left untouched. Returns the project-relative name.
pub fn ensure_result_template(
    project: &ProjectDir,
    prefix: &str,
    number_of_uploads: u32,
    upload_handler: &str,
) -> Result<String, WorkgenError> {
    let name = format!("{prefix}_n{number_of_uploads}.xml");
    let path = project.path.join(&name);
    if path.exists() {
        info!("Result template {name} already present");
        return Ok(name);
    }

    /// included result template document
    static RESULT: &str =
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/result_template.xml"));
    let mut tt = TinyTemplate::new();
    tt.set_default_formatter(&format_unescaped);
    tt.add_template("result", RESULT).expect("Template");

    let context = ResultContext { upload_handler: upload_handler.to_string() };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, tt.render("result", &context)?)?;
    info!("Created result template {name}");
    Ok(name)
}

/// Write the workunit's input template under the templates directory.
///
/// The document enumerates the four file slots, the command line handed to
/// the client, and the fixed resource and redundancy policy. Returns the
/// project-relative path the registration mechanism is given.
pub fn write_input_template(
    project: &ProjectDir,
    app_name: &str,
    context: &InputContext,
) -> Result<String, WorkgenError> {
    /// included input template document
    static INPUT: &str =
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/input_template.xml"));
    let mut tt = TinyTemplate::new();
    tt.set_default_formatter(&format_unescaped);
    tt.add_template("input", INPUT).expect("Template");

    let name = format!("{app_name}_in_{}", context.workunit_id);
    fs::write(project.templates_dir().join(&name), tt.render("input", context)?)?;
    Ok(format!("templates/{name}"))
}

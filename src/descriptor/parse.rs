use std::fmt;
use std::path::Path;

use log::info;
use roxmltree::{Document, Node};

use crate::error::WorkgenError;

/// One descriptor document, parsed. Batches whose model class does not match
/// the target application are counted but produce no descriptor.
#[derive(Debug)]
pub struct ParsedDocument {
    pub batches: Vec<BatchDescriptor>,
    pub skipped: usize,
}

/// A named group of workunits sharing ownership and submission metadata.
#[derive(Debug)]
pub struct BatchDescriptor {
    pub model_class: String,
    /// Name of the model configuration document to resolve.
    pub model_config: String,
    /// File name of the post-processing namelist under the ancillary tree.
    pub fullpos_namelist: String,
    pub upload_infos: Vec<UploadInfo>,
    pub info: BatchInfo,
    pub workunits: Vec<WorkunitSpec>,
}

#[derive(Debug)]
pub struct UploadInfo {
    pub upload_handler: String,
    pub result_template_prefix: String,
}

#[derive(Debug)]
pub struct BatchInfo {
    pub name: String,
    pub description: String,
    pub owner: String,
    pub project: String,
    pub tech_info: String,
    pub umid_start: String,
    pub umid_end: String,
}

/// One simulation run request.
#[derive(Debug)]
pub struct WorkunitSpec {
    pub analysis_member_number: String,
    pub ensemble_member_number: String,
    pub exptid: String,
    pub fclen: u64,
    pub fclen_units: String,
    pub start_date: StartDate,
    pub unique_member_id: String,
    pub ic_ancil_zip: String,
    pub ifsdata: IfsdataRefs,
    pub climate_data_zip: String,
}

/// The three model-data sub-archives combined into one delivery archive.
#[derive(Debug)]
pub struct IfsdataRefs {
    pub cfc_zip: String,
    pub radiation_zip: String,
    pub so4_zip: String,
}

/// Simulation start date; components are individually unset-or-zero.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StartDate {
    pub year: i32,
    pub month: i32,
    pub day: i32,
    pub hour: i32,
}

/// Ten-character date string used in workunit names, ancillary paths, and the
/// command line: a four-digit year and two digits each for month, day, and
/// hour, with unset components rendered as zeros.
impl fmt::Display for StartDate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.year <= 0 {
            write!(f, "0000")?;
        } else {
            write!(f, "{:04}", self.year)?;
        }
        for part in [self.month, self.day, self.hour] {
            if part <= 0 {
                write!(f, "00")?;
            } else {
                write!(f, "{:02}", part)?;
            }
        }
        Ok(())
    }
}

/// Parse a descriptor document into its batches.
///
/// A batch carrying a different model class is skipped, not failed: it
/// consumes no identifiers and writes no rows. Any missing required element
/// is fatal for the whole document.
pub fn parse_document(
    path: &Path,
    text: &str,
    target_model: &str,
) -> Result<ParsedDocument, WorkgenError> {
    let doc = Document::parse(text).map_err(|source| WorkgenError::Xml {
        path: path.to_path_buf(),
        source,
    })?;

    let mut batches = Vec::new();
    let mut skipped = 0;
    for batch_node in doc.descendants().filter(|n| n.has_tag_name("batch")) {
        let model_class = child_text(batch_node, "model_class", path)?;
        info!("model_class: {model_class}");
        if model_class != target_model {
            info!("model class is not {target_model}, skipping batch");
            skipped += 1;
            continue;
        }
        batches.push(parse_batch(batch_node, model_class, path)?);
    }

    Ok(ParsedDocument { batches, skipped })
}

fn parse_batch(
    node: Node,
    model_class: String,
    path: &Path,
) -> Result<BatchDescriptor, WorkgenError> {
    let upload_infos = node
        .descendants()
        .filter(|n| n.has_tag_name("upload_info"))
        .map(|n| {
            Ok(UploadInfo {
                upload_handler: child_text(n, "upload_handler", path)?,
                result_template_prefix: child_text(n, "result_template_prefix", path)?,
            })
        })
        .collect::<Result<Vec<_>, WorkgenError>>()?;
    if upload_infos.is_empty() {
        return Err(malformed(path, "missing <upload_info>".to_string()));
    }

    let info_node = node
        .descendants()
        .find(|n| n.has_tag_name("batch_info"))
        .ok_or_else(|| malformed(path, "missing <batch_info>".to_string()))?;
    let info = BatchInfo {
        name: child_text(info_node, "name", path)?,
        description: child_text(info_node, "desc", path)?,
        owner: child_text(info_node, "owner", path)?,
        project: child_text(info_node, "proj", path)?,
        tech_info: child_text(info_node, "tech_info", path)?,
        umid_start: child_text(info_node, "umid_start", path)?,
        umid_end: child_text(info_node, "umid_end", path)?,
    };

    let workunits = node
        .descendants()
        .filter(|n| n.has_tag_name("workunit"))
        .map(|n| parse_workunit(n, path))
        .collect::<Result<Vec<_>, WorkgenError>>()?;

    Ok(BatchDescriptor {
        model_class,
        model_config: child_text(node, "model_config", path)?,
        fullpos_namelist: child_text(node, "fullpos_namelist", path)?,
        upload_infos,
        info,
        workunits,
    })
}

fn parse_workunit(node: Node, path: &Path) -> Result<WorkunitSpec, WorkgenError> {
    let start_date = StartDate {
        year: optional_int_child(node, "start_year", path)?,
        month: optional_int_child(node, "start_month", path)?,
        day: optional_int_child(node, "start_day", path)?,
        hour: optional_int_child(node, "start_hour", path)?,
    };

    let ifsdata = IfsdataRefs {
        cfc_zip: child_text(node, "CFC_zip", path)?,
        radiation_zip: child_text(node, "radiation_zip", path)?,
        so4_zip: child_text(node, "SO4_zip", path)?,
    };

    Ok(WorkunitSpec {
        analysis_member_number: child_text(node, "analysis_member_number", path)?,
        ensemble_member_number: child_text(node, "ensemble_member_number", path)?,
        exptid: child_text(node, "exptid", path)?,
        fclen: int_child(node, "fclen", path)?,
        fclen_units: child_text(node, "fclen_units", path)?,
        start_date,
        unique_member_id: child_text(node, "unique_member_id", path)?,
        ic_ancil_zip: child_text(node, "ic_ancil_zip", path)?,
        ifsdata,
        climate_data_zip: child_text(node, "climate_data_zip", path)?,
    })
}

pub(crate) fn child_text(node: Node, name: &str, path: &Path) -> Result<String, WorkgenError> {
    node.descendants()
        .find(|n| n.has_tag_name(name))
        .and_then(|n| n.text())
        .map(|t| t.trim().to_string())
        .ok_or_else(|| malformed(path, format!("missing <{name}>")))
}

fn int_child(node: Node, name: &str, path: &Path) -> Result<u64, WorkgenError> {
    child_text(node, name, path)?
        .parse()
        .map_err(|_| malformed(path, format!("<{name}> is not an integer")))
}

fn optional_int_child(node: Node, name: &str, path: &Path) -> Result<i32, WorkgenError> {
    match node
        .descendants()
        .find(|n| n.has_tag_name(name))
        .and_then(|n| n.text())
    {
        None => Ok(0),
        Some(text) => text
            .trim()
            .parse()
            .map_err(|_| malformed(path, format!("<{name}> is not an integer"))),
    }
}

pub(crate) fn malformed(path: &Path, problem: String) -> WorkgenError {
    WorkgenError::MalformedDescriptor {
        path: path.to_path_buf(),
        problem,
    }
}

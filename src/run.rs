//! Drives one submission run end to end
//!
//! The whole run executes under the submission lock: parse each incoming
//! descriptor document, compile and register every workunit of each accepted
//! batch, record the metadata rows, and archive the consumed descriptor.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use log::info;
use rusqlite::Connection;

use crate::config::{Config, DescriptorOrder, ProjectDir};
use crate::db::record::{self, ParamType};
use crate::db::open;
use crate::descriptor::model::ModelConfig;
use crate::descriptor::parse::{self, BatchDescriptor, WorkunitSpec};
use crate::error::WorkgenError;
use crate::id::IdAllocator;
use crate::stage::{ancil, namelist};
use crate::submit::{create_work, template};

/// State carried through every pipeline stage of one run.
///
/// Holds the two store connections and the id allocator; the run lock is held
/// by the caller for at least as long as this lives.
pub struct RunContext {
    pub primary: Connection,
    pub secondary: Connection,
    pub ids: IdAllocator,
    pub app_id: i64,
}

/// Counts reported when a run finishes.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub documents: usize,
    pub batches_submitted: usize,
    pub batches_skipped: usize,
    pub workunits: usize,
}

/// Per-batch inputs shared by all of the batch's workunits.
struct BatchAssets<'a> {
    batch_id: i64,
    model: &'a ModelConfig,
    result_template: &'a str,
    namelist_template: &'a str,
    wam_template: &'a str,
    fullpos: &'a str,
    fullpos_name: &'a str,
}

/// Execute one submission run. The caller holds the run lock.
pub fn run(config: &Config, project: &ProjectDir, app_name: &str) -> Result<RunSummary, WorkgenError> {
    info!("--------------------------------------");
    info!("Starting submission run: {}", Utc::now());
    info!("--------------------------------------");

    let primary = open::open_primary(&config.primary_db)?;
    let secondary = open::open_secondary(&config.secondary_db)?;

    let app_id = open::app_id(&primary, app_name)?;
    info!("appid: {app_id}");
    let last_workunit_id = open::last_workunit_id(&primary)?;
    let last_batch_id = open::last_batch_id(&secondary)?;
    info!("Last workunit id: {last_workunit_id}");
    info!("Last batch id: {last_batch_id}");

    let mut ctx = RunContext {
        primary,
        secondary,
        ids: IdAllocator::seed(last_workunit_id, last_batch_id),
        app_id,
    };

    for dir in [project.download_dir(), project.templates_dir(), project.sent_dir()] {
        fs::create_dir_all(dir)?;
    }
    reset_scratch(project)?;

    let mut summary = RunSummary::default();
    let mut outcome = Ok(());
    for document in descriptor_documents(project, config.descriptor_order)? {
        match process_document(&mut ctx, config, project, app_name, &document, &mut summary) {
            Ok(()) => summary.documents += 1,
            Err(err) if err.is_fatal_config() => {
                // remaining documents are not processed; scratch and lock
                // still get cleaned up on the way out
                outcome = Err(err);
                break;
            }
            Err(err) => return Err(err),
        }
    }

    remove_scratch(project)?;
    info!("--------------------------------------");
    info!("Finishing submission: {}", Utc::now());
    info!("--------------------------------------");

    outcome.map(|_| summary)
}

/// Every .xml document in the incoming directory, in the configured order.
fn descriptor_documents(
    project: &ProjectDir,
    order: DescriptorOrder,
) -> Result<Vec<PathBuf>, WorkgenError> {
    let mut paths: Vec<PathBuf> = fs::read_dir(project.incoming_dir())?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, io::Error>>()?
        .into_iter()
        .filter(|path| path.extension().map_or(false, |ext| ext == "xml"))
        .collect();
    if order == DescriptorOrder::Lexicographic {
        paths.sort();
    }
    Ok(paths)
}

fn process_document(
    ctx: &mut RunContext,
    config: &Config,
    project: &ProjectDir,
    app_name: &str,
    path: &Path,
    summary: &mut RunSummary,
) -> Result<(), WorkgenError> {
    info!("--------------------------------------");
    info!("Processing descriptor document: {}", path.display());

    let text = fs::read_to_string(path)?;
    let parsed = parse::parse_document(path, &text, app_name)?;
    summary.batches_skipped += parsed.skipped;

    let mut first_workunit_id = None;
    let mut last_accepted_batch = None;
    for batch in &parsed.batches {
        let (batch_id, batch_first_wuid) = process_batch(ctx, config, project, app_name, batch)?;
        first_workunit_id.get_or_insert(batch_first_wuid);
        last_accepted_batch = Some(batch_id);
        summary.batches_submitted += 1;
        summary.workunits += batch.workunits.len();
    }

    // the rewritten copy in the sent area is the batch's durable
    // "processed" marker; a document with no accepted batch stays put
    if let (Some(first), Some(batch_id)) = (first_workunit_id, last_accepted_batch) {
        archive_descriptor(project, path, &text, first, ctx.ids.last_workunit_id(), batch_id)?;
    }
    Ok(())
}

/// Compile and register every workunit of one accepted batch, then record the
/// batch row. Returns the batch id and the batch's first workunit id.
fn process_batch(
    ctx: &mut RunContext,
    config: &Config,
    project: &ProjectDir,
    app_name: &str,
    batch: &BatchDescriptor,
) -> Result<(i64, i64), WorkgenError> {
    // only an accepted batch consumes a batch id
    let batch_id = ctx.ids.next_batch_id();

    info!("Compiling {} batch '{}'", batch.model_class, batch.info.name);
    info!("batch_desc: {}", batch.info.description);
    info!("batch_owner: {}", batch.info.owner);
    info!("project_name: {}", batch.info.project);
    info!("tech_info: {}", batch.info.tech_info);

    let upload = batch.upload_infos.last().expect("parser requires an upload target");
    let result_template = template::ensure_result_template(
        project,
        &upload.result_template_prefix,
        config.number_of_uploads,
        &upload.upload_handler,
    )?;
    let project_id = open::project_id(&ctx.secondary, &batch.info.project)?;

    let model = ModelConfig::load(
        &project.model_configs_dir().join(format!("{}.xml", batch.model_config)),
    )?;
    info!("namelist_template: {}", model.namelist_template);
    info!("wam_namelist_template: {}", model.wam_namelist_template);
    info!(
        "model resolution: {} horizontal, {} vertical, {} grid, timestep {} {}",
        model.horiz_resolution,
        model.vert_resolution,
        model.grid_type,
        model.timestep,
        model.timestep_units
    );

    let namelist_template =
        fs::read_to_string(project.namelist_templates_dir().join(&model.namelist_template))?;
    let wam_template =
        fs::read_to_string(project.namelist_templates_dir().join(&model.wam_namelist_template))?;
    let fullpos = fs::read_to_string(
        project.ancil_dir().join("fullpos_namelist").join(&batch.fullpos_namelist),
    )?;

    let assets = BatchAssets {
        batch_id,
        model: &model,
        result_template: &result_template,
        namelist_template: &namelist_template,
        wam_template: &wam_template,
        fullpos: &fullpos,
        fullpos_name: &batch.fullpos_namelist,
    };

    let mut first_workunit_id = 0;
    let mut first_start_year = 9999;
    let mut last_start_year = 0;
    for spec in &batch.workunits {
        let workunit_id = process_workunit(ctx, config, project, app_name, &assets, spec)?;
        if first_workunit_id == 0 {
            first_workunit_id = workunit_id;
        }
        first_start_year = first_start_year.min(spec.start_date.year);
        last_start_year = last_start_year.max(spec.start_date.year);
    }

    let row = record::BatchRow {
        id: batch_id,
        name: batch.info.name.clone(),
        description: batch.info.description.clone(),
        first_start_year,
        app_id: ctx.app_id,
        server_cgi: server_cgi(&upload.upload_handler),
        owner: batch.info.owner.clone(),
        upload_files: config.number_of_uploads,
        tech_info: batch.info.tech_info.clone(),
        umid_start: batch.info.umid_start.clone(),
        umid_end: batch.info.umid_end.clone(),
        project_id,
        last_start_year,
        number_of_workunits: batch.workunits.len() as i64,
        max_results_per_workunit: config.max_results_per_workunit,
        region_id: config.region_id,
    };
    row.insert(&ctx.secondary)?;

    Ok((batch_id, first_workunit_id))
}

fn process_workunit(
    ctx: &mut RunContext,
    config: &Config,
    project: &ProjectDir,
    app_name: &str,
    assets: &BatchAssets,
    spec: &WorkunitSpec,
) -> Result<i64, WorkgenError> {
    let workunit_id = ctx.ids.next_workunit_id();
    let start_date = spec.start_date.to_string();
    let workunit_name = format!(
        "{app_name}_{}_{}_{}_{}_{}",
        spec.unique_member_id, start_date, spec.fclen, assets.batch_id, workunit_id
    );

    info!("--------------------------------------");
    info!("wuid: {workunit_id}");
    info!("batchid: {}", assets.batch_id);

    let ic_ancil_zip = ancil::stage_ic_ancil(project, spec, &start_date, workunit_id)?;
    let ifsdata_zip = ancil::combine_ifsdata(project, &spec.ifsdata, workunit_id)?;
    let climate_data_zip = ancil::stage_climate_data(project, &spec.climate_data_zip, workunit_id)?;

    let num_timesteps = assets.model.num_timesteps(spec.fclen, &spec.fclen_units)?;
    let inputs = namelist::NamelistInputs {
        exptid: &spec.exptid,
        unique_member_id: &spec.unique_member_id,
        ic_ancil_file: format!("ic_ancil_{workunit_id}"),
        ifsdata_file: format!("ifsdata_{workunit_id}"),
        climate_data_file: format!("clim_data_{workunit_id}"),
        horiz_resolution: &assets.model.horiz_resolution,
        grid_type: assets.model.grid_type.as_str(),
        num_timesteps,
        timestep: assets.model.timestep,
        ensemble_member_number: &spec.ensemble_member_number,
    };
    let fort4 = namelist::render_model_namelist(assets.namelist_template, assets.fullpos, &inputs);
    let wam = namelist::render_wam_namelist(assets.wam_template, &start_date, &spec.exptid);
    let workunit_zip = namelist::package_namelists(project, &workunit_name, &fort4, &wam)?;

    let fpops_est = config.flops_factor.saturating_mul(spec.fclen);
    let input_context = template::InputContext {
        workunit_zip: workunit_zip.clone(),
        ic_ancil_zip: ic_ancil_zip.clone(),
        ifsdata_zip: ifsdata_zip.clone(),
        climate_data_zip: climate_data_zip.clone(),
        start_date: start_date.clone(),
        exptid: spec.exptid.clone(),
        unique_member_id: spec.unique_member_id.clone(),
        batch_id: assets.batch_id,
        workunit_id,
        fclen: spec.fclen,
        fpops_est,
        fpops_bound: fpops_est.saturating_mul(10),
    };
    let input_template = template::write_input_template(project, app_name, &input_context)?;

    let request = create_work::RegistrationRequest {
        app_name,
        workunit_name: &workunit_name,
        input_template: &input_template,
        result_template: assets.result_template,
        archives: [&workunit_zip, &ic_ancil_zip, &ifsdata_zip, &climate_data_zip],
    };
    create_work::register(project, &request, Duration::from_secs(config.submit_delay_secs))?;

    let run_years = if spec.fclen_units == "days" {
        0.00274 * spec.fclen as f64
    } else {
        0.0
    };
    record::WorkunitRow {
        id: workunit_id,
        batch_id: assets.batch_id,
        unique_member_id: spec.unique_member_id.clone(),
        name: workunit_name,
        start_year: spec.start_date.year,
        run_years,
        app_id: ctx.app_id,
    }
    .insert(&ctx.primary)?;

    // one row per attribute, each committed on its own
    let parameters = [
        (ParamType::FullposNamelist, assets.fullpos_name.to_string()),
        (ParamType::AnalysisMemberNumber, spec.analysis_member_number.clone()),
        (ParamType::EnsembleMemberNumber, spec.ensemble_member_number.clone()),
        (ParamType::ForecastLength, spec.fclen.to_string()),
        (ParamType::ForecastLengthUnits, spec.fclen_units.clone()),
        (ParamType::StartDay, spec.start_date.day.to_string()),
        (ParamType::StartHour, spec.start_date.hour.to_string()),
        (ParamType::StartMonth, spec.start_date.month.to_string()),
        (ParamType::StartYear, spec.start_date.year.to_string()),
        (ParamType::IcAncilArchive, spec.ic_ancil_zip.clone()),
        (ParamType::ChemicalForcingArchive, spec.ifsdata.cfc_zip.clone()),
        (ParamType::SulphateArchive, spec.ifsdata.so4_zip.clone()),
        (ParamType::RadiationArchive, spec.ifsdata.radiation_zip.clone()),
        (ParamType::ClimateDataArchive, spec.climate_data_zip.clone()),
    ];
    for (param, value) in &parameters {
        record::insert_parameter(&ctx.secondary, workunit_id, *param, value)?;
    }

    clear_scratch(project)?;
    Ok(workunit_id)
}

/// Rewrite the consumed descriptor into the sent area and delete the original.
///
/// The two literal placeholders in the document text are replaced with the
/// realised workunit-id range and the last allocated batch id.
fn archive_descriptor(
    project: &ProjectDir,
    path: &Path,
    text: &str,
    first_workunit_id: i64,
    last_workunit_id: i64,
    batch_id: i64,
) -> Result<(), WorkgenError> {
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    let rewritten = text
        .replace("workunit_range", &format!("{first_workunit_id},{last_workunit_id}"))
        .replace("batchid", &batch_id.to_string());

    let sent_path = project.sent_dir().join(format!("sent-{file_name}"));
    fs::write(&sent_path, rewritten)?;
    fs::remove_file(path)?;
    info!("Archived descriptor to {}", sent_path.display());
    Ok(())
}

/// Upload endpoint with the registrar's handler suffix removed.
fn server_cgi(upload_handler: &str) -> String {
    upload_handler
        .strip_suffix("file_upload_handler")
        .unwrap_or(upload_handler)
        .to_string()
}

fn reset_scratch(project: &ProjectDir) -> io::Result<()> {
    remove_scratch(project)?;
    fs::create_dir_all(project.scratch_dir())
}

fn clear_scratch(project: &ProjectDir) -> io::Result<()> {
    reset_scratch(project)
}

fn remove_scratch(project: &ProjectDir) -> io::Result<()> {
    match fs::remove_dir_all(project.scratch_dir()) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::archive;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    const MODEL_CONFIG: &str = r#"<model_config>
  <horiz_resolution>159</horiz_resolution>
  <vert_resolution>60</vert_resolution>
  <grid_type>l_2</grid_type>
  <timestep>3600</timestep>
  <timestep_units>seconds</timestep_units>
  <namelist_template_global>namelist_t159.tmpl</namelist_template_global>
  <wam_template_global>wam_t159.tmpl</wam_template_global>
</model_config>
"#;

    const NAMELIST_TEMPLATE: &str = "!! generated for _UNIQUE_MEMBER_ID\n\
        &NAMRUN\n  NSTOP=_NUM_TIMESTEPS,\n  TSTEP=_TIMESTEP,\n  CNMEXP='_EXPTID',\n/\n";

    const WAM_TEMPLATE: &str = "&NAWAM\n  CBPLTDT='_START_DATE',\n  CEXPT='_EXPTID',\n/\n";

    const FULLPOS: &str = "!! fullpos\r\n&NAMFPC\r\n/\r\n";

    fn workunit_xml(umid: &str, year: i32) -> String {
        format!(
            r#"    <workunit>
      <analysis_member_number>1</analysis_member_number>
      <ensemble_member_number>2</ensemble_member_number>
      <exptid>b0nd</exptid>
      <fclen>10</fclen>
      <fclen_units>days</fclen_units>
      <start_day>7</start_day>
      <start_hour>0</start_hour>
      <start_month>3</start_month>
      <start_year>{year}</start_year>
      <unique_member_id>{umid}</unique_member_id>
      <ic_ancil>
        <ic_ancil_zip>ic_b0nd.zip</ic_ancil_zip>
      </ic_ancil>
      <ifsdata>
        <CFC_zip>cfc.zip</CFC_zip>
        <radiation_zip>rad.zip</radiation_zip>
        <SO4_zip>so4.zip</SO4_zip>
      </ifsdata>
      <climate_data>
        <climate_data_zip>clim_t159.zip</climate_data_zip>
      </climate_data>
    </workunit>
"#
        )
    }

    fn descriptor_xml(model_class: &str, model_config: &str, workunits: &str) -> String {
        format!(
            r#"<?xml version="1.0"?>
<batch_list>
  <batch>
    <model_class>{model_class}</model_class>
    <model_config>{model_config}</model_config>
    <fullpos_namelist>fullpos_default.nl</fullpos_namelist>
    <upload_info>
      <upload_handler>http://upload.example.org/cgi-bin/file_upload_handler</upload_handler>
      <result_template_prefix>oifs_result</result_template_prefix>
    </upload_info>
    <batch_info>
      <name>test batch</name>
      <desc>a test batch</desc>
      <owner>abowery</owner>
      <proj>TestProj</proj>
      <tech_info>none</tech_info>
      <umid_start>a000</umid_start>
      <umid_end>a001</umid_end>
      <allocated_ids>workunit_range batchid</allocated_ids>
    </batch_info>
{workunits}  </batch>
</batch_list>
"#
        )
    }

    fn setup_project() -> (TempDir, ProjectDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        let project = ProjectDir { path: dir.path().to_path_buf() };

        fs::create_dir_all(project.incoming_dir()).unwrap();
        fs::create_dir_all(project.model_configs_dir()).unwrap();
        fs::create_dir_all(project.namelist_templates_dir()).unwrap();
        fs::create_dir_all(project.path.join("bin")).unwrap();
        fs::create_dir_all(project.ancil_dir().join("fullpos_namelist")).unwrap();
        fs::create_dir_all(project.ancil_dir().join("climate_data")).unwrap();
        fs::create_dir_all(project.ancil_dir().join("ic_ancil/b0nd/2024030700/1")).unwrap();
        fs::create_dir_all(project.ancil_dir().join("ic_ancil/b0nd/2025030700/1")).unwrap();

        fs::write(project.model_configs_dir().join("oifs_t159.xml"), MODEL_CONFIG).unwrap();
        fs::write(project.namelist_templates_dir().join("namelist_t159.tmpl"), NAMELIST_TEMPLATE)
            .unwrap();
        fs::write(project.namelist_templates_dir().join("wam_t159.tmpl"), WAM_TEMPLATE).unwrap();
        fs::write(project.ancil_dir().join("fullpos_namelist/fullpos_default.nl"), FULLPOS)
            .unwrap();
        fs::write(project.ancil_dir().join("climate_data/clim_t159.zip"), b"clim").unwrap();
        fs::write(project.ancil_dir().join("ic_ancil/b0nd/2024030700/1/ic_b0nd.zip"), b"ic")
            .unwrap();
        fs::write(project.ancil_dir().join("ic_ancil/b0nd/2025030700/1/ic_b0nd.zip"), b"ic")
            .unwrap();

        let ifsdata = project.ancil_dir().join("ifsdata");
        for (subdir, name, member) in [
            ("CFC_files", "cfc.zip", "C11CLIM"),
            ("radiation_files", "rad.zip", "RADRRTM"),
            ("SO4_files", "so4.zip", "SO4_A1B2000"),
        ] {
            let dir = ifsdata.join(subdir);
            fs::create_dir_all(&dir).unwrap();
            let content = project.path.join(member);
            fs::write(&content, member.as_bytes()).unwrap();
            archive::pack(&dir.join(name), &[(member.to_string(), content.clone())]).unwrap();
            fs::remove_file(content).unwrap();
        }

        let stub = project.path.join("bin/create_work");
        fs::write(&stub, "#!/bin/sh\necho \"$@\" >> created.log\n").unwrap();
        fs::set_permissions(&stub, fs::Permissions::from_mode(0o755)).unwrap();

        let config = Config {
            primary_db: project.path.join("primary.db"),
            secondary_db: project.path.join("secondary.db"),
            lockfile: project.path.join("lockfile_workgen"),
            region_id: 15,
            number_of_uploads: 1,
            max_results_per_workunit: 1,
            flops_factor: 4_388_810_000_000,
            submit_delay_secs: 0,
            descriptor_order: DescriptorOrder::Lexicographic,
        };

        let primary = open::open_primary(&config.primary_db).unwrap();
        primary.execute("INSERT INTO app (id, name) VALUES (1, 'openifs')", []).unwrap();
        let secondary = open::open_secondary(&config.secondary_db).unwrap();
        secondary.execute("INSERT INTO project (id, name) VALUES (3, 'TestProj')", []).unwrap();

        (dir, project, config)
    }

    #[test]
    fn a_full_run_compiles_registers_and_records_every_workunit() {
        let (_dir, project, config) = setup_project();

        let workunits = workunit_xml("a000", 2024) + &workunit_xml("a001", 2025);
        fs::write(
            project.incoming_dir().join("a_batch.xml"),
            descriptor_xml("openifs", "oifs_t159", &workunits),
        )
        .unwrap();
        // a foreign model class must pass through untouched
        fs::write(
            project.incoming_dir().join("b_other.xml"),
            descriptor_xml("weatherathome", "oifs_t159", &workunit_xml("b000", 2024)),
        )
        .unwrap();

        // seed the high-water mark so allocation continues from it
        let primary = open::open_primary(&config.primary_db).unwrap();
        primary
            .execute(
                "INSERT INTO workunit (id, cpdn_batch, umid, name, start_year, run_years, appid) \
                 VALUES (5, 0, 'old', 'old', 2020, 0.0, 1)",
                [],
            )
            .unwrap();
        drop(primary);

        let summary = run(&config, &project, "openifs").unwrap();
        assert_eq!(summary.documents, 2);
        assert_eq!(summary.batches_submitted, 1);
        assert_eq!(summary.batches_skipped, 1);
        assert_eq!(summary.workunits, 2);

        // workunit ids continue the primary store's sequence
        let primary = open::open_primary(&config.primary_db).unwrap();
        let ids: Vec<i64> = primary
            .prepare("SELECT id FROM workunit WHERE cpdn_batch = 1 ORDER BY id")
            .unwrap()
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(ids, [6, 7]);
        let name: String = primary
            .query_row("SELECT name FROM workunit WHERE id = 6", [], |r| r.get(0))
            .unwrap();
        assert_eq!(name, "openifs_a000_2024030700_10_1_6");

        // one batch row, summarising both workunits
        let secondary = open::open_secondary(&config.secondary_db).unwrap();
        let (batch_count, wu_count, first_year, last_year): (i64, i64, i32, i32) = secondary
            .query_row(
                "SELECT count(*), max(number_of_workunits), max(first_start_year), \
                 max(last_start_year) FROM batch",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
            )
            .unwrap();
        assert_eq!((batch_count, wu_count, first_year, last_year), (1, 2, 2024, 2025));

        // fourteen parameter rows per workunit
        let params: i64 = secondary
            .query_row("SELECT count(*) FROM parameter", [], |r| r.get(0))
            .unwrap();
        assert_eq!(params, 28);

        // the delivery area holds four artifacts per workunit
        for wuid in [6, 7] {
            for name in [
                format!("ic_ancil_{wuid}.zip"),
                format!("ifsdata_{wuid}.zip"),
                format!("clim_data_{wuid}.zip"),
            ] {
                assert!(project.download_dir().join(&name).symlink_metadata().is_ok(), "{name}");
            }
        }
        assert!(project.download_dir().join("openifs_a000_2024030700_10_1_6.zip").exists());
        assert!(project.download_dir().join("openifs_a001_2025030700_10_1_7.zip").exists());

        // the registrar saw both workunits
        let created = fs::read_to_string(project.path.join("created.log")).unwrap();
        assert_eq!(created.lines().count(), 2);
        assert!(created.contains("-wu_name openifs_a000_2024030700_10_1_6"));

        // accepted descriptor archived with the realised ids, original removed
        let sent = fs::read_to_string(project.sent_dir().join("sent-a_batch.xml")).unwrap();
        assert!(sent.contains("<allocated_ids>6,7 1</allocated_ids>"));
        assert!(!project.incoming_dir().join("a_batch.xml").exists());

        // the skipped document stays in the incoming area
        assert!(project.incoming_dir().join("b_other.xml").exists());

        assert!(!project.scratch_dir().exists());
    }

    #[test]
    fn a_skipped_batch_consumes_no_identifiers() {
        let (_dir, project, config) = setup_project();
        fs::write(
            project.incoming_dir().join("other.xml"),
            descriptor_xml("weatherathome", "oifs_t159", &workunit_xml("b000", 2024)),
        )
        .unwrap();

        let summary = run(&config, &project, "openifs").unwrap();
        assert_eq!(summary.batches_submitted, 0);
        assert_eq!(summary.batches_skipped, 1);

        let primary = open::open_primary(&config.primary_db).unwrap();
        assert_eq!(open::last_workunit_id(&primary).unwrap(), 0);
        let secondary = open::open_secondary(&config.secondary_db).unwrap();
        assert_eq!(open::last_batch_id(&secondary).unwrap(), 0);

        // the next accepted batch still starts at 1
        fs::write(
            project.incoming_dir().join("accepted.xml"),
            descriptor_xml("openifs", "oifs_t159", &workunit_xml("a000", 2024)),
        )
        .unwrap();
        run(&config, &project, "openifs").unwrap();
        let primary = open::open_primary(&config.primary_db).unwrap();
        assert_eq!(open::last_workunit_id(&primary).unwrap(), 1);
    }

    #[test]
    fn an_invalid_grid_type_aborts_before_any_persistence() {
        let (_dir, project, config) = setup_project();
        fs::write(
            project.model_configs_dir().join("bad_grid.xml"),
            MODEL_CONFIG.replace("l_2", "_5"),
        )
        .unwrap();
        fs::write(
            project.incoming_dir().join("bad.xml"),
            descriptor_xml("openifs", "bad_grid", &workunit_xml("a000", 2024)),
        )
        .unwrap();

        let err = run(&config, &project, "openifs").unwrap_err();
        assert!(matches!(err, WorkgenError::InvalidGridType(_)));

        let primary = open::open_primary(&config.primary_db).unwrap();
        assert_eq!(open::last_workunit_id(&primary).unwrap(), 0);
        let secondary = open::open_secondary(&config.secondary_db).unwrap();
        assert_eq!(open::last_batch_id(&secondary).unwrap(), 0);

        // the descriptor is not consumed, and scratch is still cleaned up
        assert!(project.incoming_dir().join("bad.xml").exists());
        assert!(!project.scratch_dir().exists());
    }

    #[test]
    fn a_malformed_descriptor_stops_the_remaining_documents() {
        let (_dir, project, config) = setup_project();
        let broken = descriptor_xml("openifs", "oifs_t159", &workunit_xml("a000", 2024))
            .replace("<exptid>b0nd</exptid>", "");
        fs::write(project.incoming_dir().join("a_broken.xml"), broken).unwrap();
        fs::write(
            project.incoming_dir().join("b_fine.xml"),
            descriptor_xml("openifs", "oifs_t159", &workunit_xml("a001", 2024)),
        )
        .unwrap();

        let err = run(&config, &project, "openifs").unwrap_err();
        assert!(matches!(err, WorkgenError::MalformedDescriptor { .. }));

        // the later document was never reached
        assert!(project.incoming_dir().join("b_fine.xml").exists());
        let primary = open::open_primary(&config.primary_db).unwrap();
        assert_eq!(open::last_workunit_id(&primary).unwrap(), 0);
    }

    #[test]
    fn an_unknown_project_name_is_fatal() {
        let (_dir, project, config) = setup_project();
        let descriptor = descriptor_xml("openifs", "oifs_t159", &workunit_xml("a000", 2024))
            .replace("TestProj", "NoSuchProj");
        fs::write(project.incoming_dir().join("orphan.xml"), descriptor).unwrap();

        let err = run(&config, &project, "openifs").unwrap_err();
        assert!(matches!(err, WorkgenError::UnknownProject(_)));
    }
}

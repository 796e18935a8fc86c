use log::info;
use rusqlite::{params, Connection};

/// One row per submitted workunit, keyed by the allocated workunit id.
/// Never mutated after insertion.
pub struct WorkunitRow {
    pub id: i64,
    pub batch_id: i64,
    pub unique_member_id: String,
    pub name: String,
    pub start_year: i32,
    pub run_years: f64,
    pub app_id: i64,
}

impl WorkunitRow {
    pub fn insert(&self, conn: &Connection) -> rusqlite::Result<()> {
        info!("Recording workunit {} ({})", self.id, self.name);
        conn.execute(
            "INSERT INTO workunit (id, cpdn_batch, umid, name, start_year, run_years, appid) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                self.id,
                self.batch_id,
                self.unique_member_id,
                self.name,
                self.start_year,
                self.run_years,
                self.app_id
            ],
        )?;
        Ok(())
    }
}

/// Attribute type codes recorded with each workunit.
#[derive(Copy, Clone, Debug)]
pub enum ParamType {
    FullposNamelist = 159,
    AnalysisMemberNumber = 160,
    EnsembleMemberNumber = 161,
    ForecastLength = 162,
    ForecastLengthUnits = 163,
    StartDay = 164,
    StartHour = 165,
    StartMonth = 166,
    StartYear = 167,
    IcAncilArchive = 168,
    ChemicalForcingArchive = 169,
    SulphateArchive = 170,
    RadiationArchive = 171,
    ClimateDataArchive = 172,
}

/// Append one parameter row. Parameters are append-only; each insert commits
/// on its own, so a crash mid-workunit can leave a partial set.
pub fn insert_parameter(
    conn: &Connection,
    workunit_id: i64,
    param: ParamType,
    value: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO parameter (paramtypeid, charvalue, submodelid, workunitid) \
         VALUES (?1, ?2, 0, ?3)",
        params![param as i64, value, workunit_id],
    )?;
    Ok(())
}

/// Denormalised batch summary, inserted once per accepted batch after all of
/// its workunits have been compiled and submitted.
pub struct BatchRow {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub first_start_year: i32,
    pub app_id: i64,
    pub server_cgi: String,
    pub owner: String,
    pub upload_files: u32,
    pub tech_info: String,
    pub umid_start: String,
    pub umid_end: String,
    pub project_id: i64,
    pub last_start_year: i32,
    pub number_of_workunits: i64,
    pub max_results_per_workunit: i64,
    pub region_id: i64,
}

impl BatchRow {
    pub fn insert(&self, conn: &Connection) -> rusqlite::Result<()> {
        info!("Recording batch {} ({})", self.id, self.name);
        conn.execute(
            "INSERT INTO batch (id, name, description, first_start_year, appid, server_cgi, \
             owner, ul_files, tech_info, umid_start, umid_end, projectid, last_start_year, \
             number_of_workunits, max_results_per_workunit, regionid) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                self.id,
                self.name,
                self.description,
                self.first_start_year,
                self.app_id,
                self.server_cgi,
                self.owner,
                self.upload_files,
                self.tech_info,
                self.umid_start,
                self.umid_end,
                self.project_id,
                self.last_start_year,
                self.number_of_workunits,
                self.max_results_per_workunit,
                self.region_id
            ],
        )?;
        Ok(())
    }
}

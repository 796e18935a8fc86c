use std::fmt;
use std::fs;
use std::path::Path;

use roxmltree::Document;

use crate::descriptor::parse::{child_text, malformed};
use crate::error::WorkgenError;

/// Spectral grid encodings accepted by the model.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GridType {
    Linear,
    Quadratic,
    Full,
    Cubic,
    OctahedralCubic,
}

impl GridType {
    /// Any value outside the enumeration aborts the run.
    pub fn parse(value: &str) -> Result<GridType, WorkgenError> {
        match value {
            "l_2" => Ok(GridType::Linear),
            "_2" => Ok(GridType::Quadratic),
            "_full" => Ok(GridType::Full),
            "_3" => Ok(GridType::Cubic),
            "_4" => Ok(GridType::OctahedralCubic),
            other => Err(WorkgenError::InvalidGridType(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GridType::Linear => "l_2",
            GridType::Quadratic => "_2",
            GridType::Full => "_full",
            GridType::Cubic => "_3",
            GridType::OctahedralCubic => "_4",
        }
    }
}

impl fmt::Display for GridType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Model configuration a batch resolves through its model_config reference.
#[derive(Debug)]
pub struct ModelConfig {
    pub horiz_resolution: String,
    pub vert_resolution: String,
    pub grid_type: GridType,
    /// Model timestep in seconds.
    pub timestep: u64,
    pub timestep_units: String,
    /// Template file name of the model namelist.
    pub namelist_template: String,
    /// Template file name of the wave-model namelist.
    pub wam_namelist_template: String,
}

impl ModelConfig {
    pub fn load(path: &Path) -> Result<ModelConfig, WorkgenError> {
        let text = fs::read_to_string(path)?;
        let doc = Document::parse(&text).map_err(|source| WorkgenError::Xml {
            path: path.to_path_buf(),
            source,
        })?;
        let root = doc.root();

        let timestep_text = child_text(root, "timestep", path)?;
        let timestep: u64 = timestep_text
            .parse()
            .map_err(|_| malformed(path, "<timestep> is not an integer".to_string()))?;
        if timestep == 0 {
            return Err(malformed(path, "<timestep> must be positive".to_string()));
        }

        Ok(ModelConfig {
            horiz_resolution: child_text(root, "horiz_resolution", path)?,
            vert_resolution: child_text(root, "vert_resolution", path)?,
            grid_type: GridType::parse(&child_text(root, "grid_type", path)?)?,
            timestep,
            timestep_units: child_text(root, "timestep_units", path)?,
            namelist_template: child_text(root, "namelist_template_global", path)?,
            wam_namelist_template: child_text(root, "wam_template_global", path)?,
        })
    }

    /// Timestep count for a forecast, 0 when the length is not in days.
    ///
    /// A forecast length in days must divide into whole timesteps.
    pub fn num_timesteps(&self, fclen: u64, fclen_units: &str) -> Result<u64, WorkgenError> {
        if fclen_units != "days" {
            return Ok(0);
        }
        let seconds = fclen * 86400;
        if seconds % self.timestep != 0 {
            return Err(WorkgenError::InvalidTimestep {
                fclen,
                timestep: self.timestep,
            });
        }
        Ok(seconds / self.timestep)
    }
}

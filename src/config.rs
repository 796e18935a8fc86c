//! Run settings and the on-disk project layout

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Root of the project tree that workunits are compiled into.
pub struct ProjectDir {
    pub path: PathBuf,
}

impl ProjectDir {
    pub fn incoming_dir(&self) -> PathBuf {
        self.path.join("incoming_xmls")
    }

    pub fn sent_dir(&self) -> PathBuf {
        self.path.join("sent_xmls")
    }

    /// Delivery area the platform serves workunit inputs from.
    pub fn download_dir(&self) -> PathBuf {
        self.path.join("download")
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.path.join("templates")
    }

    pub fn ancil_dir(&self) -> PathBuf {
        self.path.join("oifs_ancil_files")
    }

    pub fn namelist_templates_dir(&self) -> PathBuf {
        self.path.join("namelist_template_files")
    }

    pub fn model_configs_dir(&self) -> PathBuf {
        self.path.join("model_configs")
    }

    /// Scratch area for re-packing ancillary data, cleared between workunits.
    pub fn scratch_dir(&self) -> PathBuf {
        self.path.join("temp")
    }
}

/// Iteration order for descriptor documents in the incoming directory.
#[derive(Copy, Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DescriptorOrder {
    /// Lexicographic by file name.
    #[default]
    Lexicographic,
    /// Whatever order the filesystem lists entries in.
    Directory,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    /// Primary store: application and workunit tables.
    pub primary_db: PathBuf,
    /// Secondary store: project, batch, and parameter tables.
    pub secondary_db: PathBuf,
    #[serde(default = "default_lockfile")]
    pub lockfile: PathBuf,
    #[serde(default = "default_region_id")]
    pub region_id: i64,
    #[serde(default = "default_number_of_uploads")]
    pub number_of_uploads: u32,
    #[serde(default = "default_max_results_per_workunit")]
    pub max_results_per_workunit: i64,
    /// Estimated floating-point operations per forecast day.
    #[serde(default = "default_flops_factor")]
    pub flops_factor: u64,
    /// Pause before each registration call.
    #[serde(default = "default_submit_delay_secs")]
    pub submit_delay_secs: u64,
    #[serde(default)]
    pub descriptor_order: DescriptorOrder,
}

fn default_lockfile() -> PathBuf {
    PathBuf::from("/tmp/lockfile_workgen")
}

fn default_region_id() -> i64 {
    15
}

fn default_number_of_uploads() -> u32 {
    1
}

fn default_max_results_per_workunit() -> i64 {
    1
}

fn default_flops_factor() -> u64 {
    4_388_810_000_000
}

fn default_submit_delay_secs() -> u64 {
    2
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Config> {
        let text = fs::read_to_string(path)?;
        let config = serde_json::from_str(&text)?;
        Ok(config)
    }
}

mod classify;
mod data;
mod errors;
mod etl;
mod normalize;

use std::env;
use std::fs::{create_dir_all, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::process;

use log::error;
use serde::Deserialize;
use structured_logger::json::new_writer;
use structured_logger::Builder;

use crate::errors::Result;
use crate::etl::audit::AuditEtl;
use crate::etl::clean::CleanEtl;
use crate::etl::Etl;
use crate::normalize::{Normalizer, NormalizerConfig};

const DEFAULT_CONFIG_PATH: &str = "config/clean.json";

fn default_progress() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct UserConfig {
    pub data_path: String,
    pub dest_path: String,
    #[serde(default)]
    pub overrides_path: Option<String>,
    #[serde(default)]
    pub corrections_path: Option<String>,
    #[serde(default)]
    pub street_types_path: Option<String>,
    #[serde(default = "default_progress")]
    pub progress: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Job {
    Clean,
    Audit,
    All,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<(Job, PathBuf)> {
    let mut job = Job::All;
    let mut config_path = PathBuf::from(DEFAULT_CONFIG_PATH);

    let mut args = args.into_iter();
    if let Some(arg) = args.next() {
        match arg.as_str() {
            "clean" => job = Job::Clean,
            "audit" => job = Job::Audit,
            "all" => job = Job::All,
            "-h" | "--help" => {
                println!("Usage: osm_clean [clean|audit|all] [CONFIG]\n");
                println!("CONFIG  Path to the JSON run configuration. Defaults to {}.", DEFAULT_CONFIG_PATH);
                process::exit(0);
            },
            _ => return Err(format!("unknown job: {}", arg).into()),
        }
    }
    if let Some(path) = args.next() {
        config_path = PathBuf::from(path);
    }
    if let Some(extra) = args.next() {
        return Err(format!("unexpected argument: {}", extra).into());
    }
    Ok((job, config_path))
}

fn load_user_config(path: &Path) -> Result<UserConfig> {
    let file = File::open(path)
        .map_err(|err| format!("Could not open config file {}: {}", path.display(), err))?;
    let config = serde_json::from_reader(BufReader::new(file))
        .map_err(|err| format!("Could not parse config {}: {}", path.display(), err))?;
    Ok(config)
}

fn create_output_dir(config: &UserConfig) -> Result<PathBuf> {
    let input_fname = Path::new(&config.data_path)
        .file_name()
        .ok_or("Could not get input file name")?;
    let output_dir = Path::new(&config.dest_path).join(input_fname);
    create_dir_all(&output_dir)?;
    Ok(output_dir)
}

fn setup_logging(level: &str) {
    Builder::with_level(level)
        .with_target_writer("*", new_writer(io::stdout()))
        .init();
}

fn run(job: Job, user_config: &UserConfig) -> Result<()> {
    let output_dir = create_output_dir(user_config)?;
    let data_path = Path::new(&user_config.data_path);

    if matches!(job, Job::Audit | Job::All) {
        AuditEtl::new(data_path)?.process(&output_dir, user_config.progress)?;
    }
    if matches!(job, Job::Clean | Job::All) {
        let normalizer = Normalizer::new(NormalizerConfig::load(user_config)?);
        CleanEtl::new(data_path, normalizer).process(&output_dir, user_config.progress)?;
    }
    Ok(())
}

fn main() {
    let (job, config_path) = match parse_args(env::args().skip(1)) {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("error: {}", err);
            process::exit(2);
        },
    };
    let user_config = match load_user_config(&config_path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {}", err);
            process::exit(1);
        },
    };
    setup_logging(&user_config.log_level);

    if let Err(err) = run(job, &user_config) {
        error!(err = err.message.as_str(); "Run failed");
        process::exit(1);
    }
}

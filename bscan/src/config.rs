//! Config loader.
//!
//! Reads `--config-dir` overrides (falling back to the packaged defaults
//! embedded via `include_str!`) and freezes them into a [`Configuration`]
//! value.

use std::fs;
use std::path::{Path, PathBuf};

use bscan_core::BscanError;
use regex::Regex;

use crate::taxonomy::{self, PortScanMethod, ProtocolRule};

const DEFAULT_PATTERNS: &str = include_str!("../../config/patterns.txt");
const DEFAULT_REQUIRED_PROGRAMS: &str = include_str!("../../config/required-programs.txt");
const DEFAULT_PORT_SCANS: &str = include_str!("../../config/port-scans.toml");
const DEFAULT_SERVICE_SCANS: &str = include_str!("../../config/service-scans.toml");
const DEFAULT_REVERSE_SHELLS: &str = include_str!("../../config/reverse-shells.toml");

/// Default concurrency ceiling.
pub const DEFAULT_MAX_CONCURRENCY: usize = 20;
/// Default status-reporter interval in seconds; `<= 0` disables it.
pub const DEFAULT_STATUS_INTERVAL: i64 = 30;
/// Default width commands are truncated to before being logged.
pub const DEFAULT_CMD_PRINT_WIDTH: usize = 80;

/// The CLI-independent request the engine needs to build a [`Configuration`].
///
/// `bscan-cli` fills this in from parsed flags; it carries no `clap`
/// dependency into the engine crate.
#[derive(Debug, Clone, Default)]
pub struct ConfigRequest {
    pub config_dir: Option<PathBuf>,
    pub brute_pass_list: Option<String>,
    pub brute_user_list: Option<String>,
    pub cmd_print_width: Option<usize>,
    pub output_dir: Option<PathBuf>,
    pub extra_patterns: Vec<String>,
    pub quick_only: bool,
    pub hard: bool,
    pub udp: bool,
    pub status_interval: Option<i64>,
    pub verbose_status: bool,
    pub web_word_list: Option<String>,
    pub max_concurrency: Option<usize>,
    pub qs_method: Option<String>,
    pub ts_method: Option<String>,
    pub udp_method: Option<String>,
    pub ping_sweep: bool,
    pub no_program_check: bool,
}

/// Frozen, process-wide configuration.
#[derive(Debug)]
pub struct Configuration {
    pub brute_pass_list: String,
    pub brute_user_list: String,
    pub cmd_print_width: usize,
    pub output_dir: PathBuf,
    pub patterns: Regex,
    pub quick_only: bool,
    pub hard: bool,
    pub udp: bool,
    pub status_interval: i64,
    pub verbose_status: bool,
    pub web_word_list: String,
    pub max_concurrency: usize,
    pub qs_method: PortScanMethod,
    pub ts_method: PortScanMethod,
    pub udp_method: PortScanMethod,
    pub protocol_rules: Vec<ProtocolRule>,
}

impl Configuration {
    /// Loads and validates configuration from `req`, rejecting the
    /// unimplemented `--ping-sweep` flag and any reserved/unknown scan
    /// method name.
    pub fn load(req: ConfigRequest) -> Result<Self, BscanError> {
        if req.ping_sweep {
            return Err(BscanError::Config(
                "--ping-sweep is reserved and not implemented".to_string(),
            ));
        }

        let port_scans = read_or_default(&req.config_dir, "port-scans.toml", DEFAULT_PORT_SCANS)?;
        let service_scans =
            read_or_default(&req.config_dir, "service-scans.toml", DEFAULT_SERVICE_SCANS)?;
        let patterns_file = read_or_default(&req.config_dir, "patterns.txt", DEFAULT_PATTERNS)?;
        let required_programs_file = read_or_default(
            &req.config_dir,
            "required-programs.txt",
            DEFAULT_REQUIRED_PROGRAMS,
        )?;

        if !req.no_program_check {
            check_required_programs(&parse_lines(&required_programs_file))?;
        }

        let port_scans_value: toml::Value = toml::from_str(&port_scans)
            .map_err(|e| BscanError::Config(format!("invalid port-scans.toml: {e}")))?;
        let port_scans_table = port_scans_value
            .as_table()
            .ok_or_else(|| BscanError::Config("port-scans.toml must be a table".to_string()))?;

        let qs_method = select_stage(port_scans_table, "quick", req.qs_method.as_deref())?;
        let ts_method = select_stage(port_scans_table, "thorough", req.ts_method.as_deref())?;
        let udp_method = select_stage(port_scans_table, "udp", req.udp_method.as_deref())?;

        let protocol_rules = taxonomy::load_protocol_rules(&service_scans)?;

        let mut pattern_lines = parse_lines(&patterns_file);
        pattern_lines.extend(req.extra_patterns.iter().cloned());
        if pattern_lines.is_empty() {
            return Err(BscanError::Config(
                "no highlight patterns configured".to_string(),
            ));
        }
        let alternation = pattern_lines.join("|");
        let patterns = Regex::new(&alternation)
            .map_err(|e| BscanError::Config(format!("invalid pattern alternation: {e}")))?;

        let max_concurrency = req.max_concurrency.unwrap_or(DEFAULT_MAX_CONCURRENCY);
        if max_concurrency < 1 {
            return Err(BscanError::Config(
                "--max-concurrency must be >= 1".to_string(),
            ));
        }

        Ok(Configuration {
            brute_pass_list: req.brute_pass_list.unwrap_or_default(),
            brute_user_list: req.brute_user_list.unwrap_or_default(),
            cmd_print_width: req.cmd_print_width.unwrap_or(DEFAULT_CMD_PRINT_WIDTH),
            output_dir: req.output_dir.unwrap_or_else(|| PathBuf::from(".")),
            patterns,
            quick_only: req.quick_only,
            hard: req.hard,
            udp: req.udp,
            status_interval: req.status_interval.unwrap_or(DEFAULT_STATUS_INTERVAL),
            verbose_status: req.verbose_status,
            web_word_list: req.web_word_list.unwrap_or_default(),
            max_concurrency,
            qs_method,
            ts_method,
            udp_method,
            protocol_rules,
        })
    }
}

/// Parsed `reverse-shells.toml`, loaded independently of [`Configuration`]
/// since only `bscan-shells` needs it.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ReverseShell {
    pub name: String,
    pub cmd: String,
}

#[derive(Debug, Clone, serde::Deserialize)]
struct ReverseShellsFile {
    shells: Vec<ReverseShell>,
}

/// Loads `reverse-shells.toml` from `config_dir` if present, else the
/// packaged default.
pub fn load_reverse_shells(config_dir: &Option<PathBuf>) -> Result<Vec<ReverseShell>, BscanError> {
    let contents = read_or_default(config_dir, "reverse-shells.toml", DEFAULT_REVERSE_SHELLS)?;
    let file: ReverseShellsFile = toml::from_str(&contents)
        .map_err(|e| BscanError::Config(format!("invalid reverse-shells.toml: {e}")))?;
    Ok(file.shells)
}

fn select_stage(
    table: &toml::value::Table,
    stage: &str,
    override_name: Option<&str>,
) -> Result<PortScanMethod, BscanError> {
    let stage_table = table
        .get(stage)
        .and_then(|v| v.as_table())
        .ok_or_else(|| BscanError::Config(format!("port-scans.toml missing `{stage}` table")))?;
    taxonomy::select_port_scan_method(stage, stage_table, override_name)
}

fn read_or_default(
    config_dir: &Option<PathBuf>,
    file_name: &str,
    default: &str,
) -> Result<String, BscanError> {
    match config_dir {
        Some(dir) => {
            let path = dir.join(file_name);
            fs::read_to_string(&path).map_err(|e| {
                BscanError::Config(format!("failed to read {}: {e}", path.display()))
            })
        }
        None => Ok(default.to_string()),
    }
}

fn parse_lines(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Probes `PATH` for each required executable, returning a configuration
/// error naming every program that could not be found.
fn check_required_programs(programs: &[String]) -> Result<(), BscanError> {
    let path_var = std::env::var_os("PATH").unwrap_or_default();
    let search_dirs: Vec<PathBuf> = std::env::split_paths(&path_var).collect();

    let missing: Vec<&str> = programs
        .iter()
        .filter(|p| !is_on_path(&search_dirs, p))
        .map(String::as_str)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(BscanError::Config(format!(
            "required program(s) not found on PATH: {}",
            missing.join(", ")
        )))
    }
}

fn is_on_path(dirs: &[PathBuf], program: &str) -> bool {
    dirs.iter().any(|dir| is_executable(&dir.join(program)))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_ping_sweep() {
        let req = ConfigRequest {
            ping_sweep: true,
            ..Default::default()
        };
        let err = Configuration::load(req).unwrap_err();
        assert!(matches!(err, BscanError::Config(_)));
    }

    #[test]
    fn loads_packaged_defaults() {
        let req = ConfigRequest {
            no_program_check: true,
            ..Default::default()
        };
        let cfg = Configuration::load(req).expect("packaged defaults must parse");
        assert!(!cfg.protocol_rules.is_empty());
        assert_eq!(cfg.qs_method.name, "unicornscan");
        assert_eq!(cfg.ts_method.name, "nmap-thorough");
        assert_eq!(cfg.udp_method.name, "nmap-udp-top");
    }

    #[test]
    fn method_override_is_honored() {
        let req = ConfigRequest {
            no_program_check: true,
            qs_method: Some("nmap-quick".to_string()),
            ..Default::default()
        };
        let cfg = Configuration::load(req).expect("override must resolve");
        assert_eq!(cfg.qs_method.name, "nmap-quick");
    }

    #[test]
    fn rejects_unknown_method_override() {
        let req = ConfigRequest {
            no_program_check: true,
            qs_method: Some("not-a-real-method".to_string()),
            ..Default::default()
        };
        let err = Configuration::load(req).unwrap_err();
        assert!(matches!(err, BscanError::Config(_)));
    }

    #[test]
    fn rejects_max_concurrency_zero() {
        let req = ConfigRequest {
            no_program_check: true,
            max_concurrency: Some(0),
            ..Default::default()
        };
        let err = Configuration::load(req).unwrap_err();
        assert!(matches!(err, BscanError::Config(_)));
    }

    #[test]
    fn loads_reverse_shells() {
        let shells = load_reverse_shells(&None).unwrap();
        assert!(shells.iter().any(|s| s.name == "bash -i"));
    }
}

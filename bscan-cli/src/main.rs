//! Primary `bscan` executable: parses CLI flags, assembles targets, and
//! drives the orchestration engine end to end.

use std::path::PathBuf;
use std::sync::Arc;

use bscan::config::{ConfigRequest, Configuration};
use bscan::runtime::Runtime;
use bscan::supervisor::Supervisor;
use bscan::{pipeline, status};
use bscan_core::{is_network_range, is_valid_host_addr, is_valid_hostname, BscanError};
use clap::Parser;

/// Reconnaissance orchestration engine.
#[derive(Debug, Parser)]
#[command(name = "bscan", version, about)]
struct Cli {
    /// One or more target hosts (IPv4/IPv6 literal or DNS name).
    #[arg(required = true)]
    targets: Vec<String>,

    #[arg(long, value_name = "F")]
    brute_pass_list: Option<String>,
    #[arg(long, value_name = "F")]
    brute_user_list: Option<String>,
    #[arg(long, value_name = "I")]
    cmd_print_width: Option<usize>,
    #[arg(long, value_name = "D")]
    config_dir: Option<PathBuf>,
    /// Remove and recreate an existing target output directory instead of
    /// skipping the target.
    #[arg(long)]
    hard: bool,
    #[arg(long, value_name = "I")]
    max_concurrency: Option<usize>,
    #[arg(long, value_name = "D")]
    output_dir: Option<PathBuf>,
    /// Additional highlight regex patterns, appended to the packaged set.
    #[arg(long, value_name = "P", num_args = 1..)]
    patterns: Vec<String>,
    /// Reserved; rejected as a configuration error.
    #[arg(long)]
    ping_sweep: bool,
    #[arg(long)]
    quick_only: bool,
    #[arg(long, value_name = "S")]
    qs_method: Option<String>,
    #[arg(long, value_name = "I")]
    status_interval: Option<i64>,
    #[arg(long, value_name = "S")]
    ts_method: Option<String>,
    #[arg(long)]
    udp: bool,
    #[arg(long, value_name = "S")]
    udp_method: Option<String>,
    #[arg(long)]
    verbose_status: bool,
    #[arg(long, value_name = "F")]
    web_word_list: Option<String>,
    /// Skip probing `PATH` for `required-programs.txt` entries at startup.
    #[arg(long)]
    no_program_check: bool,
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();
    std::process::exit(run(cli).await);
}

async fn run(cli: Cli) -> i32 {
    let targets = cli.targets.clone();

    if let Err(e) = validate_targets(&targets) {
        log::error!("{e}");
        return 1;
    }

    let req = ConfigRequest {
        config_dir: cli.config_dir,
        brute_pass_list: cli.brute_pass_list,
        brute_user_list: cli.brute_user_list,
        cmd_print_width: cli.cmd_print_width,
        output_dir: cli.output_dir,
        extra_patterns: cli.patterns,
        quick_only: cli.quick_only,
        hard: cli.hard,
        udp: cli.udp,
        status_interval: cli.status_interval,
        verbose_status: cli.verbose_status,
        web_word_list: cli.web_word_list,
        max_concurrency: cli.max_concurrency,
        qs_method: cli.qs_method,
        ts_method: cli.ts_method,
        udp_method: cli.udp_method,
        ping_sweep: cli.ping_sweep,
        no_program_check: cli.no_program_check,
    };

    let cfg = match Configuration::load(req) {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            log::error!("{e}");
            return 1;
        }
    };

    let supervisor = Supervisor::new(cfg.max_concurrency, cfg.cmd_print_width);
    let rt = Arc::new(Runtime::new(supervisor));

    // On interrupt: stop admitting new subprocesses but keep awaiting the
    // exit codes of whatever is already in flight, so no handle leaks.
    {
        let rt = Arc::clone(&rt);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("interrupt received, refusing new subprocess spawns");
                rt.supervisor.shutdown();
            }
        });
    }

    let pipeline_handles: Vec<_> = targets
        .iter()
        .map(|target| {
            let rt = Arc::clone(&rt);
            let cfg = Arc::clone(&cfg);
            let target = target.clone();
            tokio::spawn(async move { pipeline::run_pipeline(rt, cfg, target).await })
        })
        .collect();

    // Give every pipeline's synchronous admission step a chance to run
    // before the status reporter samples the active-target count.
    for _ in 0..targets.len() {
        tokio::task::yield_now().await;
    }
    let status_handle = tokio::spawn(status::run_status_reporter(
        Arc::clone(&rt),
        cfg.status_interval,
        cfg.verbose_status,
    ));

    let mut fatal = false;
    for (target, handle) in targets.iter().zip(pipeline_handles) {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                if e.is_fatal() {
                    log::error!("{e}");
                } else {
                    log::warn!("{e}");
                }
                fatal = fatal || e.is_fatal();
            }
            Err(e) => {
                log::error!("[{target}] pipeline task panicked: {e}");
                fatal = true;
            }
        }
    }

    let _ = status_handle.await;

    if fatal {
        1
    } else {
        0
    }
}

/// Rejects CIDR network ranges (ping-sweep/range expansion is explicitly
/// unimplemented) and any target that is neither a valid host address nor a
/// valid DNS hostname.
fn validate_targets(targets: &[String]) -> Result<(), BscanError> {
    for target in targets {
        if is_network_range(target) {
            return Err(BscanError::Config(format!(
                "`{target}` is a network range; range expansion/ping-sweep is not implemented"
            )));
        }
        if !is_valid_host_addr(target) && !is_valid_hostname(target) {
            return Err(BscanError::Config(format!(
                "`{target}` is not a valid IPv4/IPv6 address or DNS hostname"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_network_ranges() {
        let err = validate_targets(&["10.0.0.0/24".to_string()]).unwrap_err();
        assert!(matches!(err, BscanError::Config(_)));
    }

    #[test]
    fn rejects_invalid_targets() {
        let err = validate_targets(&["-not-a-host".to_string()]).unwrap_err();
        assert!(matches!(err, BscanError::Config(_)));
    }

    #[test]
    fn accepts_ip_literals_and_hostnames() {
        assert!(validate_targets(&["10.0.0.1".to_string(), "example.com".to_string()]).is_ok());
    }
}

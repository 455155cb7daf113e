//! Per-target pipeline.
//!
//! The orchestration state machine driving one target from quick scan
//! through fanned-out service scans, thorough scan, second fanout on
//! newly-discovered services, optional UDP, and recommendations emission.

use std::path::Path;
use std::sync::Arc;

use bscan_core::BscanError;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;

use crate::config::Configuration;
use crate::parser;
use crate::runtime::Runtime;
use crate::structure::TargetPaths;
use crate::taxonomy::{self, DetectedService, TemplateWordlists};

/// Which of the three port-scan passes is running; also names the
/// `<fout>` stem substituted into its command template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStage {
    Quick,
    Thorough,
    Udp,
}

impl ScanStage {
    pub fn file_stem(self) -> &'static str {
        match self {
            Self::Quick => "tcp.quickscan",
            Self::Thorough => "tcp.thorough",
            Self::Udp => "udp",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Quick => "quick",
            Self::Thorough => "thorough",
            Self::Udp => "udp",
        }
    }
}

type FanoutHandles = Vec<JoinHandle<Result<(), BscanError>>>;

/// Runs the full per-target state machine. Admission and retirement from
/// the active-targets set bracket the whole function so siblings always see
/// a consistent view even if an inner step returns early.
pub async fn run_pipeline(rt: Arc<Runtime>, cfg: Arc<Configuration>, target: String) -> Result<(), BscanError> {
    rt.admit(&target)?;
    let result = run_pipeline_inner(Arc::clone(&rt), Arc::clone(&cfg), target.clone()).await;
    rt.retire(&target);
    result
}

async fn run_pipeline_inner(
    rt: Arc<Runtime>,
    cfg: Arc<Configuration>,
    target: String,
) -> Result<(), BscanError> {
    let paths = TargetPaths::new(&cfg.output_dir, &target);
    paths.create(&target, cfg.hard)?;
    let services_dir = paths.services_dir();

    let mut fanout_handles: FanoutHandles = Vec::new();

    // Quick scan.
    let quick_services = parser::run_port_scan(
        &rt.supervisor,
        &cfg.patterns,
        &target,
        ScanStage::Quick,
        &cfg.qs_method,
        &services_dir,
    )
    .await?;

    let (unmatched_quick, detected_quick) =
        taxonomy::join_services(&target, &quick_services, &cfg.protocol_rules);
    log_join(&target, "quick", &detected_quick, unmatched_quick.len());

    schedule_fanout(&rt, &cfg, &target, &services_dir, &detected_quick, &mut fanout_handles);

    // Thorough scan, overlapping the fanout just scheduled.
    let thorough_services = if cfg.quick_only {
        std::collections::HashSet::new()
    } else {
        parser::run_port_scan(
            &rt.supervisor,
            &cfg.patterns,
            &target,
            ScanStage::Thorough,
            &cfg.ts_method,
            &services_dir,
        )
        .await?
    };

    let new_services: std::collections::HashSet<_> =
        thorough_services.difference(&quick_services).cloned().collect();

    let detected_thorough = if !new_services.is_empty() {
        let (unmatched_new, detected_new) =
            taxonomy::join_services(&target, &new_services, &cfg.protocol_rules);
        log_join(&target, "thorough", &detected_new, unmatched_new.len());
        schedule_fanout(&rt, &cfg, &target, &services_dir, &detected_new, &mut fanout_handles);
        detected_new
    } else {
        if !cfg.quick_only {
            log::info!("[{target}] thorough scan found no additional services");
        }
        Vec::new()
    };

    // Recommendations: one serialized writer, so sections never interleave.
    write_recommendations(
        &paths.recommendations(),
        &services_dir,
        &cfg,
        detected_quick.iter().chain(detected_thorough.iter()),
    )
    .await?;

    // UDP.
    if cfg.udp {
        let udp_services = parser::run_port_scan(
            &rt.supervisor,
            &cfg.patterns,
            &target,
            ScanStage::Udp,
            &cfg.udp_method,
            &services_dir,
        )
        .await?;
        for s in &udp_services {
            log::info!("[{target}] udp service: {} on {}", s.name, s.port);
        }
    }

    // Drain both fanouts.
    for handle in fanout_handles {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::warn!("[{target}] service scan failed: {e}"),
            Err(e) => log::warn!("[{target}] service scan task panicked: {e}"),
        }
    }

    Ok(())
}

fn log_join(target: &str, phase: &str, detected: &[DetectedService], unmatched_count: usize) {
    for d in detected {
        log::info!(
            "[{target}] {phase}: matched {} on port(s) {}",
            d.protocol,
            d.port_str()
        );
    }
    if unmatched_count > 0 {
        log::debug!("[{target}] {phase}: {unmatched_count} service(s) matched no known protocol");
    }
}

fn schedule_fanout(
    rt: &Arc<Runtime>,
    cfg: &Arc<Configuration>,
    target: &str,
    services_dir: &Path,
    detected: &[DetectedService],
    handles: &mut FanoutHandles,
) {
    let words = TemplateWordlists {
        web_word_list: &cfg.web_word_list,
        user_list: &cfg.brute_user_list,
        pass_list: &cfg.brute_pass_list,
    };

    for d in detected {
        for cmd in d.build_scans(services_dir, words) {
            let rt = Arc::clone(rt);
            let cfg = Arc::clone(cfg);
            let target = target.to_string();
            handles.push(tokio::spawn(async move {
                parser::run_stream_only(&rt.supervisor, &cfg.patterns, &target, cmd).await
            }));
        }
    }
}

async fn write_recommendations<'a>(
    path: &Path,
    services_dir: &Path,
    cfg: &Configuration,
    detected: impl Iterator<Item = &'a DetectedService>,
) -> Result<(), BscanError> {
    let words = TemplateWordlists {
        web_word_list: &cfg.web_word_list,
        user_list: &cfg.brute_user_list,
        pass_list: &cfg.brute_pass_list,
    };

    let mut file = tokio::fs::OpenOptions::new()
        .append(true)
        .open(path)
        .await
        .map_err(|e| BscanError::Internal(format!("opening {}: {e}", path.display())))?;

    for d in detected {
        if d.recommendations.is_empty() {
            continue;
        }
        let lines = d.build_recommendations(services_dir, words);
        let section = format_recommendation_section(d, &lines);
        file.write_all(section.as_bytes())
            .await
            .map_err(|e| BscanError::Internal(format!("writing {}: {e}", path.display())))?;
    }

    Ok(())
}

fn format_recommendation_section(d: &DetectedService, lines: &[String]) -> String {
    let header = format!(
        "The following commands are recommended for service {} running on port(s) {}:",
        d.protocol,
        d.port_str()
    );
    let rule = "-".repeat(header.chars().count());

    let mut out = String::new();
    out.push_str(&header);
    out.push('\n');
    out.push_str(&rule);
    out.push('\n');
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigRequest;
    use crate::supervisor::Supervisor;

    fn test_config(output_dir: &Path) -> Configuration {
        Configuration::load(ConfigRequest {
            no_program_check: true,
            output_dir: Some(output_dir.to_path_buf()),
            qs_method: Some("nmap-quick".to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn recommendation_section_is_well_formed() {
        let d = DetectedService {
            protocol: "ssh".to_string(),
            target: "10.0.0.1".to_string(),
            ports: vec![22],
            scans: vec![],
            recommendations: vec!["ssh-audit 10.0.0.1 -p 22".to_string()],
        };
        let section = format_recommendation_section(&d, &["ssh-audit 10.0.0.1 -p 22".to_string()]);
        let mut lines = section.lines();
        let header = lines.next().unwrap();
        let rule = lines.next().unwrap();
        assert!(header.starts_with("The following commands are recommended"));
        assert_eq!(rule.chars().count(), header.chars().count());
        assert!(rule.chars().all(|c| c == '-'));
    }

    #[tokio::test]
    async fn quick_only_pipeline_runs_end_to_end() {
        let out = std::env::temp_dir().join(format!("bscan-pipeline-test-{}", std::process::id()));
        std::fs::create_dir_all(&out).ok();
        let mut cfg = test_config(&out);
        cfg.quick_only = true;
        // Make the "quick" method deterministic for the test without shelling
        // out to a real port scanner.
        cfg.qs_method.scan = "printf '22/tcp open ssh\\n'".to_string();
        let cfg = Arc::new(cfg);
        let rt = Arc::new(Runtime::new(Supervisor::new(4, 80)));

        run_pipeline(Arc::clone(&rt), Arc::clone(&cfg), "10.0.0.1".to_string())
            .await
            .unwrap();

        assert!(!rt.is_active("10.0.0.1"));
        let paths = TargetPaths::new(&out, "10.0.0.1");
        let recs = std::fs::read_to_string(paths.recommendations()).unwrap();
        assert!(recs.contains("ssh"));

        std::fs::remove_dir_all(&out).ok();
    }
}

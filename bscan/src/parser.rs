//! Port-scan parser.
//!
//! Runs one configured [`PortScanMethod`], streaming its stdout through the
//! pattern highlighter and collecting every line that matches the method's
//! named-capture regex into a set of [`ParsedService`]s.

use std::collections::HashSet;

use bscan_core::BscanError;
use regex::Regex;

use crate::supervisor::Supervisor;
use crate::taxonomy::{ParsedService, PortScanMethod};
use crate::{highlighter, pipeline::ScanStage};

/// Substitutes `<target>` and `<fout>` into `method.scan`, spawns it through
/// `supervisor`, and collects a [`ParsedService`] for every stdout line
/// matching `method.pattern`. Every line is also run through the pattern
/// highlighter for its side-effecting console log.
pub async fn run_port_scan(
    supervisor: &Supervisor,
    patterns: &Regex,
    target: &str,
    stage: ScanStage,
    method: &PortScanMethod,
    services_dir: &std::path::Path,
) -> Result<HashSet<ParsedService>, BscanError> {
    let fout = services_dir
        .join(format!("{}.{}", stage.file_stem(), method.name))
        .to_string_lossy()
        .into_owned();
    let cmd = method.scan.replace("<target>", target).replace("<fout>", &fout);

    let mut handle = supervisor.spawn(cmd).await?;
    let mut services = HashSet::new();

    while let Some(line) = handle.next_line().await? {
        highlighter::highlight_line(patterns, target, &line);

        if let Some(caps) = method.pattern.captures(&line) {
            let name = caps.name("name").map(|m| m.as_str().to_string());
            let port = caps
                .name("port")
                .and_then(|m| m.as_str().parse::<u16>().ok());
            if let (Some(name), Some(port)) = (name, port) {
                services.insert(ParsedService::new(name, port));
            }
        }
    }

    let code = handle.wait_exit_code().await?;
    if code != 0 {
        log::warn!(
            "[{target}] {} scan (`{}`) exited with status {code}",
            stage.label(),
            method.name
        );
    }

    Ok(services)
}

/// Streams a fanned-out service scan's stdout through the highlighter
/// without attempting to parse it into services.
pub async fn run_stream_only(
    supervisor: &Supervisor,
    patterns: &Regex,
    target: &str,
    cmd: String,
) -> Result<(), BscanError> {
    let display_cmd = cmd.clone();
    let mut handle = supervisor.spawn(cmd).await?;

    while let Some(line) = handle.next_line().await? {
        highlighter::highlight_line(patterns, target, &line);
    }

    let code = handle.wait_exit_code().await?;
    if code != 0 {
        log::warn!(
            "[{target}] service scan (`{}`) exited with status {code}",
            bscan_core::truncate_cmd(&display_cmd, 80)
        );
    }
    Ok(())
}

//! Service taxonomy & templater.
//!
//! Reduces raw `(name, port)` observations reported by the port-scan parser
//! into protocol-grouped [`DetectedService`] values, then expands each
//! protocol's declared scan/recommendation templates into concrete command
//! lines.

use std::collections::HashSet;
use std::path::Path;

use bscan_core::BscanError;
use regex::Regex;

/// A `(service-name, port)` observation reported by the port-scan parser.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParsedService {
    pub name: String,
    pub port: u16,
}

impl ParsedService {
    pub fn new(name: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            port,
        }
    }
}

/// Declarative rule loaded from `service-scans.toml`.
#[derive(Debug, Clone)]
pub struct ProtocolRule {
    pub protocol: String,
    pub service_names: Vec<String>,
    /// `(scan-id, command template)`, in file order.
    pub scans: Vec<(String, String)>,
    pub recommendations: Vec<String>,
}

/// All ports of one target matched to one protocol.
#[derive(Debug, Clone)]
pub struct DetectedService {
    pub protocol: String,
    pub target: String,
    /// Strictly increasing, non-empty.
    pub ports: Vec<u16>,
    pub scans: Vec<(String, String)>,
    pub recommendations: Vec<String>,
}

/// Values substituted into every command/recommendation template.
#[derive(Debug, Clone, Copy)]
pub struct TemplateWordlists<'a> {
    pub web_word_list: &'a str,
    pub user_list: &'a str,
    pub pass_list: &'a str,
}

impl DetectedService {
    /// Comma-joined, ascending port list (e.g. `"80,8080"`).
    pub fn port_str(&self) -> String {
        self.ports
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Expand every configured scan template into concrete, fully
    /// substituted command lines, writing each command's `<fout>` path
    /// under `services_dir`.
    ///
    /// Output-file naming: port-less templates that would
    /// collide with an already-existing file (e.g. a second fanout
    /// rediscovering the same protocol) are disambiguated by probing
    /// `<protocol>.0.<scanId>`, `<protocol>.1.<scanId>`, ...
    pub fn build_scans(&self, services_dir: &Path, words: TemplateWordlists<'_>) -> Vec<String> {
        self.scans
            .iter()
            .flat_map(|(scan_id, template)| {
                self.fill_template(scan_id, template, services_dir, words)
            })
            .collect()
    }

    /// Expand every configured recommendation template the same way scans
    /// are expanded, but the resulting lines are never executed — only
    /// written into `recommendations.txt`.
    pub fn build_recommendations(&self, services_dir: &Path, words: TemplateWordlists<'_>) -> Vec<String> {
        self.recommendations
            .iter()
            .enumerate()
            .flat_map(|(i, template)| {
                self.fill_template(&format!("rec{i}"), template, services_dir, words)
            })
            .collect()
    }

    fn fill_template(
        &self,
        scan_id: &str,
        template: &str,
        services_dir: &Path,
        words: TemplateWordlists<'_>,
    ) -> Vec<String> {
        let has_ports = template.contains("<ports>");
        let has_port = !has_ports && template.contains("<port>");

        if has_ports {
            let fout = self.fout_ports_form(services_dir, scan_id);
            vec![self.substitute(template, &fout, words, Some(&self.port_str()), None)]
        } else if has_port {
            self.ports
                .iter()
                .map(|p| {
                    let fout = self.fout_port_form(services_dir, scan_id, *p);
                    self.substitute(template, &fout, words, None, Some(*p))
                })
                .collect()
        } else {
            let fout = self.fout_portless_form(services_dir, scan_id);
            vec![self.substitute(template, &fout, words, None, None)]
        }
    }

    fn substitute(
        &self,
        template: &str,
        fout: &str,
        words: TemplateWordlists<'_>,
        ports: Option<&str>,
        port: Option<u16>,
    ) -> String {
        let mut cmd = template
            .replace("<target>", &self.target)
            .replace("<fout>", fout)
            .replace("<wordlist>", words.web_word_list)
            .replace("<userlist>", words.user_list)
            .replace("<passlist>", words.pass_list);

        if let Some(ports) = ports {
            cmd = cmd.replace("<ports>", ports);
        }
        if let Some(port) = port {
            cmd = cmd.replace("<port>", &port.to_string());
        }
        cmd
    }

    fn fout_ports_form(&self, services_dir: &Path, scan_id: &str) -> String {
        let joined = self
            .ports
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join(".");
        services_dir
            .join(format!("{}.{joined}.{scan_id}", self.protocol))
            .to_string_lossy()
            .into_owned()
    }

    fn fout_port_form(&self, services_dir: &Path, scan_id: &str, port: u16) -> String {
        services_dir
            .join(format!("{}.{port}.{scan_id}", self.protocol))
            .to_string_lossy()
            .into_owned()
    }

    fn fout_portless_form(&self, services_dir: &Path, scan_id: &str) -> String {
        let base = services_dir.join(format!("{}.{scan_id}", self.protocol));
        if !base.exists() {
            return base.to_string_lossy().into_owned();
        }

        let mut i = 0u32;
        loop {
            let candidate = services_dir.join(format!("{}.{i}.{scan_id}", self.protocol));
            if !candidate.exists() {
                return candidate.to_string_lossy().into_owned();
            }
            i += 1;
        }
    }
}

/// Partitions `services` into detected, protocol-grouped services and the
/// residual that matched no configured protocol.
///
/// Rule order is the tie-break: a service already claimed by an earlier rule
/// is never claimed again by a later one, so the returned `DetectedService`
/// list partitions `services`.
pub fn join_services(
    target: &str,
    services: &HashSet<ParsedService>,
    rules: &[ProtocolRule],
) -> (HashSet<ParsedService>, Vec<DetectedService>) {
    let mut consumed: HashSet<ParsedService> = HashSet::new();
    let mut joined = Vec::new();

    for rule in rules {
        let matches: Vec<&ParsedService> = services
            .iter()
            .filter(|s| !consumed.contains(*s) && rule.service_names.iter().any(|n| n == &s.name))
            .collect();

        if matches.is_empty() {
            continue;
        }

        let mut ports: Vec<u16> = matches.iter().map(|s| s.port).collect();
        ports.sort_unstable();
        ports.dedup();

        joined.push(DetectedService {
            protocol: rule.protocol.clone(),
            target: target.to_string(),
            ports,
            scans: rule.scans.clone(),
            recommendations: rule.recommendations.clone(),
        });

        for m in matches {
            consumed.insert(m.clone());
        }
    }

    let unmatched = services.difference(&consumed).cloned().collect();
    (unmatched, joined)
}

/// Loads the `[protocol]` tables of `service-scans.toml` into [`ProtocolRule`]s,
/// preserving file order (the join tie-break depends on it).
pub fn load_protocol_rules(contents: &str) -> Result<Vec<ProtocolRule>, BscanError> {
    let value: toml::Value = toml::from_str(contents)
        .map_err(|e| BscanError::Config(format!("invalid service-scans.toml: {e}")))?;
    let table = value
        .as_table()
        .ok_or_else(|| BscanError::Config("service-scans.toml must be a table".to_string()))?;

    let mut rules = Vec::with_capacity(table.len());
    for (protocol, def) in table {
        let def = def.as_table().ok_or_else(|| {
            BscanError::Config(format!("service-scans.toml `{protocol}` must be a table"))
        })?;

        let service_names = def
            .get("nmap-service-names")
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                BscanError::Config(format!(
                    "service-scans.toml `{protocol}` missing `nmap-service-names`"
                ))
            })?
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();

        let scans_table = def.get("scans").and_then(|v| v.as_table()).ok_or_else(|| {
            BscanError::Config(format!("service-scans.toml `{protocol}` missing `scans`"))
        })?;
        let scans = scans_table
            .iter()
            .map(|(id, tmpl)| {
                let tmpl = tmpl.as_str().ok_or_else(|| {
                    BscanError::Config(format!(
                        "service-scans.toml `{protocol}.scans.{id}` must be a string"
                    ))
                })?;
                Ok((id.clone(), tmpl.to_string()))
            })
            .collect::<Result<Vec<_>, BscanError>>()?;

        let recommendations = def
            .get("recommendations")
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                BscanError::Config(format!(
                    "service-scans.toml `{protocol}` missing `recommendations`"
                ))
            })?
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();

        rules.push(ProtocolRule {
            protocol: protocol.clone(),
            service_names,
            scans,
            recommendations,
        });
    }

    Ok(rules)
}

/// A declared port-scan method: a command template plus the regex used to
/// parse its output into [`ParsedService`]s.
#[derive(Debug, Clone)]
pub struct PortScanMethod {
    pub name: String,
    pub pattern: Regex,
    pub scan: String,
}

/// Selects one method from a `[quick]`/`[thorough]`/`[udp]` table of
/// `port-scans.toml`, honoring an optional CLI override and rejecting the
/// literal method name `default`.
pub fn select_port_scan_method(
    stage: &str,
    table: &toml::value::Table,
    override_name: Option<&str>,
) -> Result<PortScanMethod, BscanError> {
    let default_name = table
        .get("default")
        .and_then(|v| v.as_str())
        .ok_or_else(|| BscanError::Config(format!("port-scans.toml `{stage}` missing `default`")))?;

    let name = override_name.unwrap_or(default_name);
    if name == "default" {
        return Err(BscanError::Config(format!(
            "`{stage}` scan method name `default` is reserved"
        )));
    }

    let method_table = table
        .get(name)
        .and_then(|v| v.as_table())
        .ok_or_else(|| BscanError::Config(format!("unknown `{stage}` scan method `{name}`")))?;

    let pattern_str = method_table
        .get("pattern")
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            BscanError::Config(format!("`{stage}.{name}` missing `pattern`"))
        })?;
    let scan = method_table
        .get("scan")
        .and_then(|v| v.as_str())
        .ok_or_else(|| BscanError::Config(format!("`{stage}.{name}` missing `scan`")))?;

    let pattern = Regex::new(pattern_str)
        .map_err(|e| BscanError::Config(format!("invalid regex for `{stage}.{name}`: {e}")))?;

    let group_names: Vec<&str> = pattern.capture_names().flatten().collect();
    for required in ["name", "port"] {
        if !group_names.contains(&required) {
            return Err(BscanError::Config(format!(
                "`{stage}.{name}` pattern must capture a named group `{required}`"
            )));
        }
    }

    Ok(PortScanMethod {
        name: name.to_string(),
        pattern,
        scan: scan.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(protocol: &str, names: &[&str]) -> ProtocolRule {
        ProtocolRule {
            protocol: protocol.to_string(),
            service_names: names.iter().map(|s| s.to_string()).collect(),
            scans: vec![("nmap".to_string(), "nmap -p<ports> <target> -oN <fout>".to_string())],
            recommendations: vec!["hydra <target> <port>".to_string()],
        }
    }

    #[test]
    fn join_partitions_services() {
        let mut s = HashSet::new();
        s.insert(ParsedService::new("http", 80));
        s.insert(ParsedService::new("http", 8080));
        s.insert(ParsedService::new("unknown-thing", 31337));

        let rules = vec![rule("http", &["http", "http-alt"])];
        let (unmatched, joined) = join_services("10.0.0.1", &s, &rules);

        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].ports, vec![80, 8080]);
        assert_eq!(unmatched.len(), 1);
        assert!(unmatched.contains(&ParsedService::new("unknown-thing", 31337)));
    }

    #[test]
    fn first_rule_wins_tie_break() {
        let mut s = HashSet::new();
        s.insert(ParsedService::new("http", 80));

        let rules = vec![rule("http", &["http"]), rule("web", &["http"])];
        let (unmatched, joined) = join_services("t", &s, &rules);

        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].protocol, "http");
        assert!(unmatched.is_empty());
    }

    #[test]
    fn idempotent_on_residual() {
        let mut s = HashSet::new();
        s.insert(ParsedService::new("weird", 1234));
        let rules = vec![rule("http", &["http"])];

        let (unmatched1, joined1) = join_services("t", &s, &rules);
        assert!(joined1.is_empty());

        let (unmatched2, joined2) = join_services("t", &unmatched1, &rules);
        assert_eq!(unmatched1, unmatched2);
        assert!(joined2.is_empty());
    }

    #[test]
    fn ports_template_is_total_and_single_command() {
        let ds = DetectedService {
            protocol: "http".to_string(),
            target: "10.0.0.1".to_string(),
            ports: vec![80, 8080],
            scans: vec![(
                "nmap".to_string(),
                "nmap -p<ports> <target> -oN <fout>".to_string(),
            )],
            recommendations: vec![],
        };
        let dir = std::env::temp_dir().join("bscan-taxonomy-test-ports");
        let words = TemplateWordlists {
            web_word_list: "/wl",
            user_list: "/ul",
            pass_list: "/pl",
        };
        let cmds = ds.build_scans(&dir, words);
        assert_eq!(cmds.len(), 1);
        assert!(cmds[0].contains("80,8080"));
        for forbidden in ["<target>", "<port>", "<ports>", "<fout>"] {
            assert!(!cmds[0].contains(forbidden));
        }
    }

    #[test]
    fn port_template_cardinality_matches_port_count() {
        let ds = DetectedService {
            protocol: "http".to_string(),
            target: "10.0.0.1".to_string(),
            ports: vec![80, 8080, 8443],
            scans: vec![(
                "gobuster".to_string(),
                "gobuster dir -u http://<target>:<port>/ -w <wordlist> -o <fout>".to_string(),
            )],
            recommendations: vec![],
        };
        let dir = std::env::temp_dir().join("bscan-taxonomy-test-port");
        let words = TemplateWordlists {
            web_word_list: "/wl",
            user_list: "/ul",
            pass_list: "/pl",
        };
        let cmds = ds.build_scans(&dir, words);
        assert_eq!(cmds.len(), ds.ports.len());
    }

    #[test]
    fn portless_output_file_is_disambiguated() {
        let dir = std::env::temp_dir().join(format!("bscan-taxonomy-test-portless-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("smb.enum4linux"), b"").unwrap();

        let ds = DetectedService {
            protocol: "smb".to_string(),
            target: "10.0.0.1".to_string(),
            ports: vec![445],
            scans: vec![(
                "enum4linux".to_string(),
                "enum4linux -a <target> | tee <fout>".to_string(),
            )],
            recommendations: vec![],
        };
        let words = TemplateWordlists {
            web_word_list: "/wl",
            user_list: "/ul",
            pass_list: "/pl",
        };
        let cmds = ds.build_scans(&dir, words);
        assert!(cmds[0].contains("smb.0.enum4linux"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn rejects_reserved_default_method_name() {
        let mut stage = toml::value::Table::new();
        stage.insert("default".to_string(), toml::Value::String("default".to_string()));
        let err = select_port_scan_method("quick", &stage, None).unwrap_err();
        assert!(matches!(err, BscanError::Config(_)));
    }

    fn stage_with_method(pattern: &str, scan: &str) -> toml::value::Table {
        let mut method = toml::value::Table::new();
        method.insert("pattern".to_string(), toml::Value::String(pattern.to_string()));
        method.insert("scan".to_string(), toml::Value::String(scan.to_string()));

        let mut stage = toml::value::Table::new();
        stage.insert("default".to_string(), toml::Value::String("m".to_string()));
        stage.insert("m".to_string(), toml::Value::Table(method));
        stage
    }

    #[test]
    fn rejects_pattern_missing_name_group() {
        let stage = stage_with_method(r"^(?P<port>\d+)/tcp open", "nmap <target> -oN <fout>");
        let err = select_port_scan_method("quick", &stage, None).unwrap_err();
        assert!(matches!(err, BscanError::Config(_)));
    }

    #[test]
    fn rejects_pattern_missing_port_group() {
        let stage = stage_with_method(r"^\d+/tcp open (?P<name>\S+)", "nmap <target> -oN <fout>");
        let err = select_port_scan_method("quick", &stage, None).unwrap_err();
        assert!(matches!(err, BscanError::Config(_)));
    }

    #[test]
    fn accepts_pattern_with_both_required_groups() {
        let stage = stage_with_method(
            r"^(?P<port>\d+)/tcp\s+open\s+(?P<name>\S+)",
            "nmap <target> -oN <fout>",
        );
        let method = select_port_scan_method("quick", &stage, None).unwrap();
        assert_eq!(method.name, "m");
    }
}

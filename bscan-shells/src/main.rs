//! Companion utility for generating reverse-shell command variants.

use bscan::config::load_reverse_shells;
use bscan_core::{is_valid_host_addr, is_valid_hostname};
use clap::Parser;

/// bscan companion utility for generating reverse shell commands.
#[derive(Debug, Parser)]
#[command(name = "bscan-shells", version, about)]
struct Cli {
    /// The port the reverse shell should connect back to (defaults to 80).
    #[arg(long, value_name = "I")]
    port: Option<u16>,
    /// URL-encode every generated command.
    #[arg(long)]
    url_encode: bool,
    /// The ip or host the reverse shell should connect back to.
    target: String,
}

fn main() {
    let cli = Cli::parse();

    if !is_valid_host_addr(&cli.target) && !is_valid_hostname(&cli.target) {
        eprintln!("Configuration error: invalid target specified: {}", cli.target);
        std::process::exit(1);
    }

    let port = cli.port.unwrap_or(80);

    let shells = match load_reverse_shells(&None) {
        Ok(shells) => shells,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    let mut shells = shells;
    shells.sort_by(|a, b| a.name.cmp(&b.name));

    for shell in shells {
        let cmd = shell
            .cmd
            .replace("<target>", &cli.target)
            .replace("<port>", &port.to_string());
        let display = if cli.url_encode {
            urlencoding::encode(&cmd).into_owned()
        } else {
            cmd
        };
        println!("{}", shell.name);
        println!("{display}");
        println!();
    }
}

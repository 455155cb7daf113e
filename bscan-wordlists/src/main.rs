//! Companion utility for listing and finding wordlists on disk.

use std::path::{Path, PathBuf};

use clap::Parser;
use walkdir::WalkDir;

/// Default roots searched for wordlists.
const DEFAULT_WORDLIST_SEARCH_DIRS: &[&str] =
    &["/usr/share/wordlists/", "/usr/share/seclists/Passwords/"];

/// bscan companion utility for listing and finding wordlists on Kali Linux.
#[derive(Debug, Parser)]
#[command(name = "bscan-wordlists", version, about)]
struct Cli {
    /// List all findable wordlists on the system.
    #[arg(long)]
    list: bool,
    /// Find the absolute path to a wordlist via its filename.
    #[arg(long, value_name = "FILENAME")]
    find: Option<String>,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if cli.list {
        walk_wordlists(DEFAULT_WORDLIST_SEARCH_DIRS);
    } else if let Some(filename) = &cli.find {
        match find_wordlist(DEFAULT_WORDLIST_SEARCH_DIRS, filename) {
            Some(path) => println!("{}", path.display()),
            None => println!("Unable to locate {filename}"),
        }
    } else {
        println!("specify `--list` or `--find <filename>` options");
    }
}

/// Recursively searches `search_dirs` for `filename`, returning the first
/// match. A `filename` that is already a path to an existing file is
/// returned unchanged.
fn find_wordlist(search_dirs: &[&str], filename: &str) -> Option<PathBuf> {
    let as_path = Path::new(filename);
    if as_path.is_file() {
        return Some(as_path.to_path_buf());
    }

    let target_name = as_path.file_name()?;
    for dir in search_dirs {
        for entry in WalkDir::new(dir).into_iter().filter_map(Result::ok) {
            if entry.file_type().is_file() && entry.file_name() == target_name {
                return Some(entry.into_path());
            }
        }
    }
    None
}

/// Recursively walks `wordlist_dirs`, printing every non-empty directory
/// and the files it contains.
fn walk_wordlists(wordlist_dirs: &[&str]) {
    for dir in wordlist_dirs {
        let mut by_dir: std::collections::BTreeMap<PathBuf, Vec<String>> = Default::default();
        for entry in WalkDir::new(dir).into_iter().filter_map(Result::ok) {
            if entry.file_type().is_file() {
                by_dir
                    .entry(entry.path().parent().unwrap_or(Path::new("")).to_path_buf())
                    .or_default()
                    .push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        for (dirpath, mut filenames) in by_dir {
            filenames.sort();
            println!("{}", dirpath.display());
            for name in filenames {
                println!("---> {name}");
            }
            println!();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn existing_path_is_returned_unchanged() {
        let dir = std::env::temp_dir().join(format!("bscan-wordlists-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let file = dir.join("rockyou.txt");
        fs::write(&file, b"password123").unwrap();

        let found = find_wordlist(&[], file.to_str().unwrap());
        assert_eq!(found, Some(file.clone()));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn recursive_search_finds_nested_file() {
        let dir = std::env::temp_dir().join(format!("bscan-wordlists-test-nested-{}", std::process::id()));
        let nested = dir.join("Discovery/SNMP");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("common-snmp-community-strings.txt"), b"public").unwrap();

        let found = find_wordlist(&[dir.to_str().unwrap()], "common-snmp-community-strings.txt");
        assert_eq!(found, Some(nested.join("common-snmp-community-strings.txt")));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_file_returns_none() {
        let dir = std::env::temp_dir().join(format!("bscan-wordlists-test-missing-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        assert_eq!(find_wordlist(&[dir.to_str().unwrap()], "does-not-exist.txt"), None);
        fs::remove_dir_all(&dir).ok();
    }
}

use std::env;
use std::path::PathBuf;

use wos_adb_automator::adb::BackendKind;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mode {
    Run,
    Screenshot,
    Observe,
    Status,
}

#[derive(Debug)]
pub struct Args {
    pub mode: Mode,
    pub debug_mode: bool,
    pub config_path: Option<PathBuf>,
    /// Overrides `[device] backend` when given
    pub backend: Option<BackendKind>,
}

impl Args {
    pub fn parse() -> Option<Self> {
        Self::parse_from(env::args().skip(1))
    }

    fn parse_from(args: impl IntoIterator<Item = String>) -> Option<Self> {
        let mut mode: Option<Mode> = None;
        let mut debug_mode: bool = false;
        let mut config_path: Option<PathBuf> = None;
        let mut backend: Option<BackendKind> = None;

        for arg in args {
            if arg == "--help" || arg == "-h" {
                print_help();
                return None;
            } else if arg == "--version" || arg == "-v" {
                println!(
                    "WOS Automator v{} (built {})",
                    env!("APP_VERSION_DISPLAY"),
                    env!("APP_BUILD_YEAR")
                );
                return None;
            } else if arg == "--debug" {
                debug_mode = true;
            } else if arg == "--run" {
                mode = Some(Mode::Run);
            } else if arg == "--screenshot" || arg == "-s" {
                mode = Some(Mode::Screenshot);
            } else if arg == "--observe" {
                mode = Some(Mode::Observe);
            } else if arg == "--status" {
                mode = Some(Mode::Status);
            } else if let Some(path) = arg.strip_prefix("--config=") {
                config_path = Some(PathBuf::from(path));
            } else if let Some(rest) = arg.strip_prefix("--impl=") {
                match rest.parse::<BackendKind>() {
                    Ok(kind) => backend = Some(kind),
                    Err(e) => {
                        eprintln!("❌ {e}");
                        return None;
                    }
                }
            } else {
                eprintln!("❌ Unknown argument: {}", arg);
                print_help();
                return None;
            }
        }

        Some(Args {
            mode: mode.unwrap_or(Mode::Run),
            debug_mode,
            config_path,
            backend,
        })
    }
}

fn print_help() {
    println!("🤖 WOS Automator - unattended Whiteout Survival routines over ADB");
    println!();
    println!("USAGE:");
    println!("    wos-automator [FLAGS]");
    println!();
    println!("FLAGS:");
    println!("    (no flags)          Run the task scheduler");
    println!("    --run               Run the task scheduler");
    println!("    --screenshot, -s    Capture one frame and save it to cli-screenshot.png");
    println!("    --observe           Capture one frame and print the recognized screen");
    println!("    --status            Print the persisted task table and recent runs");
    println!("    --config=<path>     Extra TOML config layered over config/default.toml");
    println!("    --impl=<shell|rust> Select ADB implementation (default: rust)");
    println!(
        "                        The shell implementation requires the ADB tool to be installed."
    );
    println!("    --debug             Enable debug logging");
    println!("    --help, -h          Show this help message");
    println!("    --version, -v       Show version information");
    println!();
    println!("ENVIRONMENT:");
    println!("    WOS__SECTION__KEY   Override any config value, e.g. WOS__DEVICE__SERIAL=emulator-5554");
    println!("    RUST_LOG            Log filter (default: info)");
    println!();
    println!("EXAMPLES:");
    println!("    wos-automator --status");
    println!("    wos-automator --observe --impl=shell");
    println!("    wos-automator --config=farm.toml --debug");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Option<Args> {
        Args::parse_from(args.iter().map(|a| a.to_string()))
    }

    #[test]
    fn defaults_to_run() {
        let args = parse(&[]).unwrap();
        assert_eq!(args.mode, Mode::Run);
        assert!(!args.debug_mode);
        assert_eq!(args.config_path, None);
        assert_eq!(args.backend, None);
    }

    #[test]
    fn flags_combine() {
        let args = parse(&["--observe", "--impl=shell", "--config=farm.toml", "--debug"]).unwrap();
        assert_eq!(args.mode, Mode::Observe);
        assert_eq!(args.backend, Some(BackendKind::Shell));
        assert_eq!(args.config_path, Some(PathBuf::from("farm.toml")));
        assert!(args.debug_mode);
    }

    #[test]
    fn bad_input_stops() {
        assert!(parse(&["--impl=usb"]).is_none());
        assert!(parse(&["--frobnicate"]).is_none());
    }
}

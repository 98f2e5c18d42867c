const GREEN: &str = "\x1b[32m";
const CYAN: &str = "\x1b[36m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";
const DIM: &str = "\x1b[2m";

macro_rules! env_or {
    ($key:literal, $default:literal) => {
        option_env!($key).unwrap_or($default)
    };
}

/// Build facts printed at startup.
pub struct BannerInfo {
    pub version: &'static str,
    pub branch: &'static str,
    pub commit: &'static str,
    pub profile: &'static str,
}

impl Default for BannerInfo {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            branch: env_or!("GIT_BRANCH", "unknown"),
            commit: env_or!("GIT_COMMIT", "unknown"),
            profile: if cfg!(debug_assertions) {
                "debug"
            } else {
                "release"
            },
        }
    }
}

impl BannerInfo {
    pub fn commit_short(&self) -> &'static str {
        let commit: &'static str = self.commit;
        commit.get(..7).unwrap_or(commit)
    }
}

pub fn print_banner(info: &BannerInfo) {
    println!();
    println!("{GREEN}  __                  _       {RESET}");
    println!("{GREEN} / /  ___ ___ _ ___ _| |_ ___ {RESET}");
    println!("{GREEN}/ /__/ -_) _ `/ _ `/  _/ _ \\{RESET}");
    println!("{GREEN}\\____/\\__/\\_, /\\_,_/\\__/\\___/{RESET}");
    println!("{GREEN}         /___/               {RESET}");
    println!("{DIM}================================{RESET}");
    println!();

    print_row("Version", info.version, CYAN);
    print_row("Branch", info.branch, RESET);
    print_row("Commit", info.commit_short(), RESET);
    print_row("Profile", info.profile, YELLOW);
    println!();
}

fn print_row(label: &str, value: &str, color: &str) {
    println!("  {BOLD}{label:<10}{RESET}{color}{value}{RESET}");
}

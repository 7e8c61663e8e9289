use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "teemake", version)]
#[command(about = "Build a Teeworlds-family game server from source", long_about = None)]
pub struct Cli {
    #[arg(
        short,
        long,
        help = "Server name (letters, digits, '_' and '-', at most 64 characters)"
    )]
    pub name: Option<String>,

    #[arg(short, long, help = "Game mode: Teeworlds, DDNet or zCatch")]
    pub mode: Option<String>,

    #[arg(short, long, help = "Stream command output instead of the progress line")]
    pub verbose: bool,

    #[arg(long, help = "Generate Ninja build files and compile with ninja")]
    pub ninja: bool,

    #[arg(
        long = "option",
        value_name = "-DNAME=VALUE",
        allow_hyphen_values = true,
        help = "Override a build option of the selected mode (repeatable)"
    )]
    pub options: Vec<String>,

    #[arg(long, default_value = ".", help = "Directory the server folder is created in")]
    pub dir: PathBuf,

    #[arg(long, help = "Do not check for free disk space before building")]
    pub skip_disk_check: bool,

    #[arg(long, help = "Print the resolved build plan as JSON and exit")]
    pub dry_run: bool,

    #[arg(short = 'y', long, help = "Accept the default answer for every remaining question")]
    pub yes: bool,

    #[arg(
        long,
        env = "TEEMAKE_POST_BUILD_URL",
        value_name = "URL",
        help = "HTTPS script to run in the build directory after a successful build"
    )]
    pub post_build_url: Option<String>,
}

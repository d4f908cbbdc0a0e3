//! Command-line argument parsing

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "docker-papa")]
#[command(about = "Docker companion that pushes images straight to a registry")]
#[command(version, author)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Verbose output
    #[arg(long = "verbose", short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Quiet mode
    #[arg(
        long = "quiet",
        short = 'q',
        global = true,
        conflicts_with = "verbose",
        help = "Only print the final digest and errors"
    )]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long = "config", global = true, help = "Path to a JSON configuration file")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Push an image to a registry without going through the daemon
    Push(PushArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct PushArgs {
    /// Image to push, e.g. team/app:1.0
    pub image: String,

    #[arg(
        long = "registry",
        short = 'r',
        help = "Registry address, e.g. localhost:5000 or https://registry.example.com"
    )]
    pub registry: String,

    #[arg(
        long = "input",
        short = 'i',
        help = "Read the image from a docker save archive instead of the engine"
    )]
    pub input: Option<PathBuf>,

    #[arg(
        long = "timeout",
        short = 't',
        help = "Deadline in seconds shared by all registry calls"
    )]
    pub timeout: Option<u64>,

    #[arg(
        long = "concurrency",
        short = 'j',
        help = "Number of layers uploaded at the same time"
    )]
    pub concurrency: Option<usize>,

    #[arg(long = "username", short = 'u', help = "Username for registry authentication")]
    pub username: Option<String>,

    #[arg(long = "password", short = 'p', help = "Password for registry authentication")]
    pub password: Option<String>,

    #[arg(long = "skip-tls", short = 'k', help = "Skip TLS certificate verification")]
    pub skip_tls: bool,

    #[arg(long = "docker-host", help = "Docker engine host, e.g. unix:///var/run/docker.sock")]
    pub docker_host: Option<String>,

    #[arg(long = "api-version", help = "Docker engine API version")]
    pub api_version: Option<String>,

    #[arg(
        long = "verify-layers",
        help = "Hash every layer locally and compare it with the image config"
    )]
    pub verify_layers: bool,
}

impl Args {
    pub fn parse_args() -> Self {
        Args::parse()
    }
}

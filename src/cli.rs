use std::path::PathBuf;

use clap::{Parser, Subcommand};

const EXAMPLES: &str = r#"Examples:
  browser-agent navigate --url "https://example.com" --headless
  browser-agent task --prompt "Click the login button" --url "https://site.com"
  browser-agent login --site "github.com" --username "user" --password "pass" --save
  browser-agent interactive --site "https://admin.dashboard.com""#;

#[derive(Debug, Parser)]
#[command(
    name = "browser-agent",
    version,
    about = "AI Browser Agent - Intelligent browser automation",
    after_help = EXAMPLES
)]
pub struct Cli {
    /// Run the browser without a window (the default)
    #[arg(long, global = true, overrides_with = "headed")]
    pub headless: bool,

    /// Show the browser window; the later of --headless/--headed wins
    #[arg(long, global = true, overrides_with = "headless")]
    pub headed: bool,

    /// Default timeout in milliseconds for CLI-driven navigation
    #[arg(long, global = true, default_value_t = 30_000)]
    pub timeout: u64,

    /// Enable verbose logging and print the step log
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    pub fn run_headless(&self) -> bool {
        self.headless || !self.headed
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Navigate to a URL
    Navigate {
        /// URL to navigate to
        #[arg(long)]
        url: String,

        /// CSS selector to wait for after navigation
        #[arg(long)]
        wait_for: Option<String>,

        /// Save a PNG screenshot of the page here
        #[arg(long)]
        screenshot: Option<PathBuf>,
    },

    /// Execute a task using LLM guidance
    Task {
        /// Task description for the LLM
        #[arg(long)]
        prompt: String,

        /// URL to start the task from
        #[arg(long)]
        url: Option<String>,

        /// Maximum number of automation steps
        #[arg(long, default_value_t = 10, allow_negative_numbers = true)]
        max_steps: i64,

        /// On a failed action, ask once for a recovery plan and resume
        #[arg(long)]
        recover: bool,
    },

    /// Login to a website
    Login {
        /// Website domain (e.g. github.com)
        #[arg(long)]
        site: String,

        /// Username for login
        #[arg(long)]
        username: Option<String>,

        /// Password for login
        #[arg(long)]
        password: Option<String>,

        /// Save credentials for later logins
        #[arg(long)]
        save: bool,
    },

    /// Start interactive mode
    Interactive {
        /// Initial website to navigate to
        #[arg(long)]
        site: Option<String>,
    },
}

/// Negative budgets mean "run nothing".
pub fn step_budget(max_steps: i64) -> u32 {
    u32::try_from(max_steps.max(0)).unwrap_or(u32::MAX)
}

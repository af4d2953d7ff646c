mod cli;

use std::io::Write as _;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use ai_browser_agent::credentials::{CredentialStore, Credentials};
use ai_browser_agent::hands::{BrowserOptions, BrowserSession, ChromePage};
use ai_browser_agent::login::{log_in, site_url};
use ai_browser_agent::orchestrator::CancelHandle;
use ai_browser_agent::{
    DriverExecutor, GeminiClient, ModelProvider, OrchestratorConfig, PageDriver, Settings,
    TaskOrchestrator, TaskState, TaskSummary,
};
use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser};
use cli::{Cli, Command, step_budget};
use dotenvy::dotenv;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    let args = Cli::parse();
    init_tracing(args.verbose);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ Error: {e:#}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "ai_browser_agent=debug,browser_agent=debug,info"
    } else {
        "ai_browser_agent=info,browser_agent=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(args: Cli) -> Result<()> {
    let settings = Settings::from_env()?;
    let headless = args.run_headless();
    let timeout = Duration::from_millis(args.timeout);
    let verbose = args.verbose;

    let Some(command) = args.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    match command {
        Command::Navigate {
            url,
            wait_for,
            screenshot,
        } => {
            navigate(
                &settings,
                headless,
                timeout,
                &url,
                wait_for.as_deref(),
                screenshot.as_deref(),
            )
            .await
        }
        Command::Task {
            prompt,
            url,
            max_steps,
            recover,
        } => {
            let options = TaskOptions {
                max_steps: step_budget(max_steps),
                recover,
                verbose,
            };
            task(&settings, headless, timeout, &prompt, url.as_deref(), options).await
        }
        Command::Login {
            site,
            username,
            password,
            save,
        } => login(&settings, headless, &site, username, password, save).await,
        Command::Interactive { site } => interactive(&settings, timeout, site.as_deref()).await,
    }
}

/// Launch (or attach to) Chrome and open one page. The session must outlive the page.
async fn open_browser(settings: &Settings, headless: bool) -> Result<(BrowserSession, ChromePage)> {
    let options = BrowserOptions {
        headless,
        attach_url: settings.chrome_attach_url.clone(),
        ..Default::default()
    };
    info!("Launching Chrome...");
    let opened = tokio::task::spawn_blocking(move || {
        let session = BrowserSession::launch(&options)?;
        let page = session.new_page()?;
        Ok::<_, anyhow::Error>((session, page))
    })
    .await
    .map_err(|e| anyhow!("Browser launch panicked: {e}"))??;
    info!("Chrome ready.");
    Ok(opened)
}

async fn navigate(
    settings: &Settings,
    headless: bool,
    timeout: Duration,
    url: &str,
    wait_for: Option<&str>,
    screenshot: Option<&Path>,
) -> Result<()> {
    let (_session, page) = open_browser(settings, headless).await?;
    page.goto(url, timeout)
        .await
        .with_context(|| format!("could not open {url}"))?;

    if let Some(selector) = wait_for {
        page.wait_for_selector(selector, timeout)
            .await
            .with_context(|| format!("{selector} never appeared"))?;
    }
    println!("✅ Navigated to: {url}");

    if let Some(path) = screenshot {
        let png = page.screenshot().await?;
        tokio::fs::write(path, png)
            .await
            .with_context(|| format!("could not write {}", path.display()))?;
        println!("📸 Screenshot saved to {}", path.display());
    }

    if !headless {
        let mut stdin = stdin_lines();
        prompt_line(&mut stdin, "Press Enter to close browser...").await?;
    }
    Ok(())
}

struct TaskOptions {
    max_steps: u32,
    recover: bool,
    verbose: bool,
}

async fn task(
    settings: &Settings,
    headless: bool,
    timeout: Duration,
    prompt: &str,
    url: Option<&str>,
    options: TaskOptions,
) -> Result<()> {
    let provider: Arc<dyn ModelProvider> = Arc::new(GeminiClient::from_settings(settings)?);
    let (_session, page) = open_browser(settings, headless).await?;
    let page: Arc<dyn PageDriver> = Arc::new(page);

    if let Some(url) = url {
        page.goto(url, timeout)
            .await
            .with_context(|| format!("could not open {url}"))?;
    }

    let config = OrchestratorConfig::default()
        .max_steps(options.max_steps)
        .step_delay(settings.step_delay);
    let mut orchestrator = TaskOrchestrator::new(page, provider, config);

    let summary = run_until_done(&mut orchestrator, prompt, options.recover).await;
    print_summary(&summary, options.verbose);
    Ok(())
}

async fn run_until_done(
    orchestrator: &mut TaskOrchestrator,
    task: &str,
    recover: bool,
) -> TaskSummary {
    let cancel = orchestrator.cancel_handle();
    if recover {
        with_ctrl_c(cancel, orchestrator.run_with_recovery(task)).await
    } else {
        with_ctrl_c(cancel, orchestrator.run(task)).await
    }
}

/// Ctrl-C during a run stops it between steps instead of killing the process.
async fn with_ctrl_c<F: std::future::Future<Output = TaskSummary>>(
    cancel: CancelHandle,
    run: F,
) -> TaskSummary {
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });
    let summary = run.await;
    watcher.abort();
    summary
}

fn print_summary(summary: &TaskSummary, verbose: bool) {
    let icon = match summary.state {
        TaskState::Completed => "✅",
        TaskState::Exhausted => "⚠️",
        TaskState::Aborted => "❌",
    };
    println!("{icon} {}", summary.message);

    if verbose {
        for entry in &summary.log {
            match serde_json::to_string(entry) {
                Ok(line) => println!("   {line}"),
                Err(e) => println!("   (step {}: unprintable log entry: {e})", entry.step()),
            }
        }
    }
}

async fn login(
    settings: &Settings,
    headless: bool,
    site: &str,
    username: Option<String>,
    password: Option<String>,
    save: bool,
) -> Result<()> {
    let store = match &settings.credentials_path {
        Some(path) => CredentialStore::new(path),
        None => CredentialStore::default_location()?,
    };

    let credentials = match (username, password) {
        (Some(username), Some(password)) => {
            if save {
                store.store(site, &username, &password)?;
                println!("🔐 Credentials saved to {}", store.path().display());
            }
            Credentials { username, password }
        }
        _ => match store.get(site)? {
            Some(credentials) => credentials,
            None => {
                println!("❌ No credentials found for site");
                return Ok(());
            }
        },
    };

    let (_session, page) = open_browser(settings, headless).await?;
    let executor = DriverExecutor::new(Arc::new(page));
    let outcome = log_in(&executor, site, &credentials).await?;
    if outcome.success {
        println!("✅ {}", outcome.message);
    } else {
        println!("❌ {}", outcome.message);
    }
    Ok(())
}

const INTERACTIVE_HELP: &str = "Available commands:
  navigate <url>    open a page
  task <text>       let the model work towards a goal
  action <json>     run one action, e.g. {\"type\":\"click\",\"selector\":\"#go\"}
  history           show recent planning and task history
  clear             clear the history
  exit              leave";

async fn interactive(settings: &Settings, timeout: Duration, site: Option<&str>) -> Result<()> {
    println!("🤖 Starting interactive mode...");
    println!("Type 'exit' to quit, 'help' for commands");

    let (_session, page) = open_browser(settings, false).await?;
    let page: Arc<dyn PageDriver> = Arc::new(page);
    let executor = DriverExecutor::new(Arc::clone(&page));
    let mut orchestrator: Option<TaskOrchestrator> = None;

    if let Some(site) = site {
        page.goto(&site_url(site), timeout).await?;
    }

    let mut stdin = stdin_lines();
    loop {
        let line = tokio::select! {
            line = prompt_line(&mut stdin, "\n> ") => line?,
            _ = tokio::signal::ctrl_c() => break,
        };
        let Some(line) = line else { break };
        let command = line.trim();
        let (verb, rest) = command
            .split_once(char::is_whitespace)
            .map(|(v, r)| (v, r.trim()))
            .unwrap_or((command, ""));

        match verb.to_ascii_lowercase().as_str() {
            "" => {}
            "exit" | "quit" => break,
            "help" => println!("{INTERACTIVE_HELP}"),
            "navigate" if !rest.is_empty() => match page.goto(rest, timeout).await {
                Ok(()) => println!("✅ Navigated to: {rest}"),
                Err(e) => println!("❌ Navigation failed: {e}"),
            },
            "task" if !rest.is_empty() => {
                if orchestrator.is_none() {
                    match GeminiClient::from_settings(settings) {
                        Ok(client) => {
                            let config =
                                OrchestratorConfig::default().step_delay(settings.step_delay);
                            orchestrator = Some(TaskOrchestrator::new(
                                Arc::clone(&page),
                                Arc::new(client),
                                config,
                            ));
                        }
                        Err(e) => {
                            println!("❌ {e}");
                            continue;
                        }
                    }
                }
                if let Some(orch) = orchestrator.as_mut() {
                    let summary = with_ctrl_c(orch.cancel_handle(), orch.run(rest)).await;
                    print_summary(&summary, false);
                }
            }
            "action" if !rest.is_empty() => match serde_json::from_str(rest) {
                Ok(value) => match executor.execute_raw(&value).await {
                    Ok(outcome) if outcome.success => println!("✅ {}", outcome.message),
                    Ok(outcome) => println!("❌ {}", outcome.message),
                    Err(e) => println!("❌ {e}"),
                },
                Err(e) => println!("❌ Not valid JSON: {e}"),
            },
            "history" => match &orchestrator {
                Some(orch) => print_history(orch),
                None => println!("No history yet."),
            },
            "clear" => {
                if let Some(orch) = orchestrator.as_mut() {
                    orch.clear_history();
                }
                println!("History cleared.");
            }
            _ => println!("❌ Unknown command. Type 'help' for available commands."),
        }
    }

    println!("👋 Interactive mode ended");
    Ok(())
}

fn print_history(orchestrator: &TaskOrchestrator) {
    let summary = orchestrator.history().summary();
    println!(
        "{} interactions: {} tasks executed, {} pages analyzed",
        summary.total_interactions, summary.tasks_executed, summary.pages_analyzed
    );
    for record in &summary.recent {
        match serde_json::to_string(record) {
            Ok(line) => println!("  {line}"),
            Err(e) => println!("  (unprintable record: {e})"),
        }
    }
}

fn stdin_lines() -> Lines<BufReader<Stdin>> {
    BufReader::new(tokio::io::stdin()).lines()
}

async fn prompt_line(lines: &mut Lines<BufReader<Stdin>>, prompt: &str) -> Result<Option<String>> {
    print!("{prompt}");
    std::io::stdout().flush()?;
    Ok(lines.next_line().await?)
}

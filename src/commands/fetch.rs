use crate::api::{BrewApi, Formula};
use crate::colors;
use crate::config::Config;
use crate::download::{self, DownloadRequest};
use crate::error::{BottleError, Result};
use crate::flow::{DownloadFlow, DownloadState, Effect, FlowEvent};
use crate::platform::{self, DownloadOption};
use crate::progress::{self, DownloadProgress};
use colored::Colorize;
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use inquire::{InquireError, Select};
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const MENU_PAGE_SIZE: usize = 14;
const FINAL_PAUSE: Duration = Duration::from_millis(750);

/// How an interactive run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Downloaded,
    Cancelled,
    Failed,
}

/// Fetch a formula, let the user pick a bottle and download it.
///
/// Errors before the menu is shown (fetch, parse, no bottles) are returned
/// for the caller to report; errors during the download are reported inline
/// and yield [`Outcome::Failed`].
pub async fn fetch(
    api: &BrewApi,
    config: &Config,
    formula_name: &str,
    colors_enabled: bool,
) -> Result<Outcome> {
    let is_tty = std::io::IsTerminal::is_terminal(&std::io::stdout());

    let spinner = if is_tty {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("Fetching {}...", formula_name));
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    } else {
        ProgressBar::hidden()
    };

    let formula = api.fetch_formula(formula_name).await;
    spinner.finish_and_clear();
    let formula = formula?;

    print_formula(&formula);

    let mut flow = DownloadFlow::new(formula);
    if flow.options().is_empty() {
        return Err(BottleError::NoArtifactError(flow.formula().name.clone()));
    }

    let start = match platform::detect_bottle_tag() {
        Ok(tag) => {
            let index = platform::preferred_index(flow.options(), &tag);
            if index.is_none() {
                tracing::warn!(platform = %tag, "no bottle for this platform");
            }
            index
        }
        Err(e) => {
            tracing::debug!(error = %e, "could not detect platform");
            None
        }
    };

    let selection = select_option(&flow, start, colors_enabled).await?;
    match flow.handle(selection) {
        Some(Effect::StartDownload(option)) => {
            Ok(run_download(api.client().clone(), config, &mut flow, option).await)
        }
        _ => {
            println!("\n    🍺 Bottle dud? That's cool.\n");
            Ok(Outcome::Cancelled)
        }
    }
}

/// Metadata panel shown above the menu.
fn print_formula(formula: &Formula) {
    println!(
        "{} {}",
        format!("==> {}", formula.name).bold().green(),
        formula.versions.stable.as_deref().unwrap_or("").cyan()
    );
    if let Some(desc) = &formula.desc {
        println!("{}", desc);
    }
    if let Some(homepage) = &formula.homepage {
        println!("{}: {}", "Homepage".bold(), homepage);
    }
    for dep in &formula.dependencies {
        tracing::info!(dep = %dep, "dependency");
        println!("{} {}: {}", "⚠".yellow(), "Dependency".bold(), dep);
    }
    println!();
}

/// Show the bottle menu and turn the answer into a flow event.
async fn select_option(
    flow: &DownloadFlow,
    start: Option<usize>,
    colors_enabled: bool,
) -> Result<FlowEvent> {
    let labels: Vec<String> = flow.options().iter().map(|o| o.label.clone()).collect();
    let title = format!("Download '{}' ?", flow.formula().name);

    tokio::task::spawn_blocking(move || {
        let mut select = Select::new(&title, labels)
            .with_page_size(MENU_PAGE_SIZE)
            .with_help_message("↑↓ to move, enter to download, esc to quit")
            .with_render_config(colors::menu_render_config(colors_enabled));
        if let Some(index) = start {
            select = select.with_starting_cursor(index);
        }

        match select.raw_prompt() {
            Ok(choice) => Ok(FlowEvent::Confirm(choice.index)),
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => {
                Ok(FlowEvent::Cancel)
            }
            Err(e) => Err(BottleError::Other(e.into())),
        }
    })
    .await
    .map_err(|e| BottleError::Other(e.into()))?
}

/// Start the download for `option` and drive the flow to a terminal state.
async fn run_download(
    client: reqwest::Client,
    config: &Config,
    flow: &mut DownloadFlow,
    option: DownloadOption,
) -> Outcome {
    let name = flow.formula().name.clone();
    let destination = config.destination_for(&name);

    if let Some((width, _)) = term_size::dimensions() {
        flow.handle(FlowEvent::Resize(width));
    }

    let request = DownloadRequest {
        formula: name,
        url: option.url.clone(),
        sha256: option.sha256.clone(),
        destination: destination.clone(),
        token: config.registry_token.clone(),
        verify_checksum: config.verify_checksum,
    };

    let mut view = DownloadProgress::new(
        &option.label,
        flow.bar_width(),
        progress::should_show_progress(),
    );

    let (tx, rx) = mpsc::unbounded_channel();
    let task = download::spawn_download(client, request, tx);
    let interrupt = async {
        // Without a handler Ctrl-C keeps its default behavior
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    drive_download(flow, rx, task, interrupt, &mut view, &destination).await
}

/// Feed task messages, `cancel` and window resizes into `flow` until it
/// reaches a terminal state, then report the result on `view`.
///
/// `cancel` resolving counts as the quit key. On Cancel the task is aborted.
/// Unless the bottle was downloaded, the partial file next to `destination`
/// is removed.
pub async fn drive_download<C>(
    flow: &mut DownloadFlow,
    mut rx: mpsc::UnboundedReceiver<FlowEvent>,
    task: JoinHandle<()>,
    cancel: C,
    view: &mut DownloadProgress,
    destination: &Path,
) -> Outcome
where
    C: Future<Output = ()>,
{
    tokio::pin!(cancel);
    let mut cancel_armed = true;
    let mut resize = ResizeWatcher::new();
    let mut width = flow.bar_width();

    loop {
        let event = tokio::select! {
            event = rx.recv() => match event {
                Some(event) => event,
                None => FlowEvent::Failed(BottleError::Other(anyhow::anyhow!(
                    "download task ended without reporting"
                ))),
            },
            _ = &mut cancel, if cancel_armed => {
                cancel_armed = false;
                FlowEvent::Cancel
            }
            Some(columns) = resize.next_width() => FlowEvent::Resize(columns),
        };

        let effect = flow.handle(event);

        if flow.bar_width() != width {
            width = flow.bar_width();
            view.set_width(width);
        }
        if let Some(sample) = flow.progress() {
            view.update(&sample);
        }

        match effect {
            Some(Effect::AbortDownload) => {
                task.abort();
                let _ = task.await;
                break;
            }
            Some(Effect::Exit) => break,
            _ => {}
        }
    }

    let outcome = match flow.state() {
        DownloadState::Done { path, bytes } => {
            view.finish_success(format!("✓ {}", flow.formula().name));
            println!(
                "{} Downloaded {} ({})",
                "✓".green(),
                path.display().to_string().bold(),
                HumanBytes(*bytes)
            );
            tokio::time::sleep(FINAL_PAUSE).await;
            Outcome::Downloaded
        }
        DownloadState::Failed(e) => {
            let hold = view.finish_error();
            eprintln!("{} Error downloading: {}", "✗".red(), e);
            if !hold.is_zero() {
                tokio::time::sleep(hold).await;
            }
            Outcome::Failed
        }
        _ => {
            view.clear();
            println!("\n    🍺 Bottle dud? That's cool.\n");
            Outcome::Cancelled
        }
    };

    if outcome != Outcome::Downloaded
        && let Err(e) = download::remove_partial(destination).await
    {
        tracing::warn!(error = %e, "failed to remove partial download");
    }

    outcome
}

/// Terminal width changes, from SIGWINCH where available.
struct ResizeWatcher {
    #[cfg(unix)]
    signal: Option<tokio::signal::unix::Signal>,
}

impl ResizeWatcher {
    fn new() -> Self {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            Self {
                signal: signal(SignalKind::window_change()).ok(),
            }
        }
        #[cfg(not(unix))]
        {
            Self {}
        }
    }

    async fn next_width(&mut self) -> Option<usize> {
        #[cfg(unix)]
        if let Some(signal) = self.signal.as_mut() {
            signal.recv().await?;
            return term_size::dimensions().map(|(width, _)| width);
        }
        std::future::pending().await
    }
}

//! InsightDeck CLI
//!
//! Command-line client for an InsightDeck backend:
//! - List, create and select dashboards
//! - List, add and delete widgets
//! - Render the dashboard layout and the sample overview
//! - Watch a dashboard live through the change feed

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use insightdeck::app::{App, AppView};
use insightdeck::config::{generate_default_config, Config};
use insightdeck::model::WidgetType;
use insightdeck::notify::ToastQueue;
use insightdeck::realtime::RealtimeClient;
use insightdeck::service::{Backend, DashboardService, DashboardSnapshot};
use insightdeck::session::{LocalSession, User};
use insightdeck::store::RestStore;
use insightdeck::ui::{
    render, AddWidgetForm, CreateDashboardForm, DashboardList, DeleteConfirmation, Overview, Tab,
    WidgetGrid,
};

#[derive(Parser)]
#[command(name = "insightdeck")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Business-intelligence dashboards from the command line")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Backend URL (overrides backend.url)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// User id to act as (overrides session.user_id)
    #[arg(long, global = true)]
    pub user_id: Option<String>,

    /// Email of that user (overrides session.email)
    #[arg(long, global = true)]
    pub email: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table, global = true)]
    pub format: OutputFormat,

    /// Config file (default: standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage dashboards
    Dashboards {
        #[command(subcommand)]
        action: DashboardCommand,
    },

    /// Select the dashboard later commands act on
    Select {
        /// Dashboard id
        dashboard_id: String,
    },

    /// Manage widgets of the selected dashboard
    Widgets {
        #[command(subcommand)]
        action: WidgetCommand,
    },

    /// Show the analytics overview
    Overview,

    /// Render the application for one tab
    Show {
        /// dashboard, datasets, reports or settings
        #[arg(short, long, default_value = "dashboard")]
        tab: Tab,
    },

    /// Follow live changes until interrupted
    Watch,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum DashboardCommand {
    /// List your dashboards, newest first
    List,

    /// Create a dashboard and select it
    Create {
        /// Dashboard name
        name: String,
        /// Optional description
        #[arg(short, long)]
        description: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum WidgetCommand {
    /// List widgets
    List {
        /// Dashboard id (default: the selected dashboard)
        #[arg(short, long)]
        dashboard: Option<String>,
    },

    /// Add a widget
    Add {
        /// Widget title
        title: String,
        /// chart, table, kpi or map
        #[arg(short = 't', long = "type")]
        widget_type: WidgetType,
        /// Dashboard id (default: the selected dashboard)
        #[arg(short, long)]
        dashboard: Option<String>,
    },

    /// Delete a widget
    Delete {
        /// Widget id
        widget_id: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Selection remembered between invocations
#[derive(Debug, Default, Serialize, Deserialize)]
struct CliState {
    selected_dashboard: Option<String>,
}

impl CliState {
    fn path() -> PathBuf {
        dirs::data_local_dir()
            .map(|p| p.join("insightdeck").join("cli-state.json"))
            .unwrap_or_else(|| PathBuf::from(".insightdeck-cli-state.json"))
    }

    fn load() -> Self {
        std::fs::read_to_string(Self::path())
            .ok()
            .and_then(|text| serde_json::from_str(&text).ok())
            .unwrap_or_default()
    }

    fn save(&self) -> anyhow::Result<()> {
        let path = Self::path();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("writing {:?}", path))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                if cli.verbose {
                    "insightdeck=debug".into()
                } else {
                    "insightdeck=warn".into()
                }
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    if let Some(url) = &cli.api_url {
        config.backend.url = url.clone();
    }
    if let Some(user_id) = &cli.user_id {
        config.session.user_id = Some(user_id.clone());
    }
    if let Some(email) = &cli.email {
        config.session.email = Some(email.clone());
    }

    match cli.command {
        Commands::Overview => {
            println!("{}", render::overview(&Overview::sample()));
            Ok(())
        }

        Commands::Config { output } => write_default_config(output.as_deref()),

        command => {
            let user = config
                .session
                .user()
                .context("no user configured: pass --user-id or set session.user_id")?;
            let toasts = ToastQueue::new();
            let app = connect(&config, &toasts)?;
            let service = app.sign_in(user).await;

            let result = run(command, cli.format, &app, &service).await;

            print_toasts(&toasts);
            app.sign_out().await;
            result
        }
    }
}

fn connect(config: &Config, toasts: &ToastQueue) -> anyhow::Result<App> {
    let store = RestStore::new(config.backend.rest_config())?;
    let feed = RealtimeClient::new(config.realtime.client_config(&config.backend.url));
    let backend = Backend::new(Arc::new(store), Arc::new(feed), Arc::new(toasts.clone()));

    Ok(App::new(
        Arc::new(LocalSession::new()),
        backend,
        config.realtime.service_config(),
    ))
}

async fn run(
    command: Commands,
    format: OutputFormat,
    app: &App,
    service: &DashboardService,
) -> anyhow::Result<()> {
    let mut state = CliState::load();
    restore_selection(service, &state).await;

    match command {
        Commands::Dashboards { action } => match action {
            DashboardCommand::List => {
                let snapshot = service.snapshot();
                match format {
                    OutputFormat::Json => print_json(&snapshot.dashboards)?,
                    OutputFormat::Table => {
                        println!("{}", render::dashboard_list(&DashboardList::build(&snapshot)))
                    }
                }
            }

            DashboardCommand::Create { name, description } => {
                let mut form = CreateDashboardForm {
                    open: true,
                    name,
                    description: description.unwrap_or_default(),
                    loading: false,
                };
                if !form.can_submit() {
                    bail!("dashboard name is required");
                }

                let Some(dashboard) = form.submit(service).await else {
                    bail!("dashboard was not created");
                };
                state.selected_dashboard = Some(dashboard.id.clone());
                state.save()?;

                match format {
                    OutputFormat::Json => print_json(&dashboard)?,
                    OutputFormat::Table => println!("Created {} ({})", dashboard.name, dashboard.id),
                }
            }
        },

        Commands::Select { dashboard_id } => {
            if !service.select_dashboard(&dashboard_id).await {
                bail!("no dashboard '{}' among yours", dashboard_id);
            }
            state.selected_dashboard = Some(dashboard_id);
            state.save()?;
            print_widgets(&service.snapshot(), format)?;
        }

        Commands::Widgets { action } => match action {
            WidgetCommand::List { dashboard } => {
                select_override(service, dashboard.as_deref()).await?;
                print_widgets(&service.snapshot(), format)?;
            }

            WidgetCommand::Add {
                title,
                widget_type,
                dashboard,
            } => {
                select_override(service, dashboard.as_deref()).await?;
                if service.snapshot().current.is_none() {
                    bail!("no dashboard selected: create one first");
                }

                let mut form = AddWidgetForm {
                    open: true,
                    title,
                    widget_type: Some(widget_type),
                    loading: false,
                };
                if !form.can_submit() {
                    bail!("widget title is required");
                }

                let Some(widget) = form.submit(service).await else {
                    bail!("widget was not added");
                };
                match format {
                    OutputFormat::Json => print_json(&widget)?,
                    OutputFormat::Table => println!(
                        "Added {} widget {} ({})",
                        widget.widget_type, widget.title, widget.id
                    ),
                }
            }

            WidgetCommand::Delete { widget_id, yes } => {
                let confirmation = DeleteConfirmation::new(widget_id);
                if !yes && !ask(DeleteConfirmation::PROMPT)? {
                    confirmation.cancel();
                    println!("Cancelled");
                    return Ok(());
                }
                if !confirmation.confirm(service).await {
                    bail!("widget was not deleted");
                }
            }
        },

        Commands::Show { tab } => match format {
            OutputFormat::Json => print_json(&snapshot_json(&service.snapshot()))?,
            OutputFormat::Table => match app.view(tab).await {
                AppView::Dashboard(layout) => println!("{}", render::layout(&layout)),
                AppView::SignIn => bail!("not signed in"),
            },
        },

        Commands::Watch => watch(app, service, format).await?,

        Commands::Overview | Commands::Config { .. } => {}
    }

    Ok(())
}

/// Re-select the remembered dashboard if it still exists
async fn restore_selection(service: &DashboardService, state: &CliState) {
    if let Some(id) = &state.selected_dashboard {
        if !service.select_dashboard(id).await {
            tracing::debug!(dashboard_id = %id, "Remembered dashboard is gone");
        }
    }
}

async fn select_override(service: &DashboardService, dashboard: Option<&str>) -> anyhow::Result<()> {
    if let Some(id) = dashboard {
        if !service.select_dashboard(id).await {
            bail!("no dashboard '{}' among yours", id);
        }
    }
    Ok(())
}

async fn watch(app: &App, service: &DashboardService, format: OutputFormat) -> anyhow::Result<()> {
    let mut snapshots = service.watch();
    let initial = snapshots.borrow_and_update().clone();
    print_snapshot(app, &initial, format).await?;

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                print_snapshot(app, &snapshot, format).await?;
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(())
}

async fn print_snapshot(
    app: &App,
    snapshot: &DashboardSnapshot,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string(&snapshot_json(snapshot))?);
        }
        OutputFormat::Table => {
            if let AppView::Dashboard(layout) = app.view(Tab::Dashboard).await {
                // Clear the terminal before redrawing
                print!("\x1B[2J\x1B[H");
                println!("{}", render::layout(&layout));
            }
        }
    }
    std::io::stdout().flush()?;
    Ok(())
}

fn print_widgets(snapshot: &DashboardSnapshot, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => print_json(&snapshot.widgets),
        OutputFormat::Table => {
            let Some(current) = &snapshot.current else {
                bail!("no dashboard selected: create one first");
            };
            println!("{}", current.name);
            println!("{}", "-".repeat(60));
            println!("{}", render::widget_grid(&WidgetGrid::build(&snapshot.widgets)));
            Ok(())
        }
    }
}

fn snapshot_json(snapshot: &DashboardSnapshot) -> serde_json::Value {
    json!({
        "dashboards": snapshot.dashboards,
        "current": snapshot.current,
        "widgets": snapshot.widgets,
        "loading": snapshot.loading,
    })
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_toasts(toasts: &ToastQueue) {
    let pending = toasts.drain();
    if !pending.is_empty() {
        eprintln!("{}", render::toasts(&pending));
    }
}

fn ask(prompt: &str) -> anyhow::Result<bool> {
    eprint!("{} [y/N] ", prompt);
    std::io::stderr().flush()?;

    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn write_default_config(output: Option<&Path>) -> anyhow::Result<()> {
    let content = generate_default_config();
    match output {
        Some(path) => {
            std::fs::write(path, content).with_context(|| format!("writing {:?}", path))?;
            println!("Config written to {}", path.display());
        }
        None => print!("{}", content),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_widget_add() {
        let cli = Cli::try_parse_from([
            "insightdeck",
            "--user-id",
            "u1",
            "widgets",
            "add",
            "Revenue",
            "--type",
            "kpi",
        ])
        .unwrap();

        assert_eq!(cli.user_id.as_deref(), Some("u1"));
        match cli.command {
            Commands::Widgets {
                action: WidgetCommand::Add { title, widget_type, dashboard },
            } => {
                assert_eq!(title, "Revenue");
                assert_eq!(widget_type, WidgetType::Kpi);
                assert!(dashboard.is_none());
            }
            _ => panic!("Expected widgets add"),
        }
    }

    #[test]
    fn test_parse_rejects_unknown_type() {
        let parsed = Cli::try_parse_from(["insightdeck", "widgets", "add", "X", "--type", "gauge"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_parse_show_tab_and_format() {
        let cli =
            Cli::try_parse_from(["insightdeck", "show", "--tab", "reports", "--format", "json"])
                .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(matches!(cli.command, Commands::Show { tab: Tab::Reports }));
    }
}

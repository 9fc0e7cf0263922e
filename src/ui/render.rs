//! Plain-text rendering
//!
//! Terminal output for the view models, used by the `insightdeck` CLI.

use super::dashboards::DashboardList;
use super::layout::{Content, DashboardLayout, DashboardPanel};
use super::overview::{ActivityStatus, Overview};
use super::widgets::WidgetGrid;
use super::EmptyState;
use crate::model::Trend;
use crate::notify::Notification;

const BAR_WIDTH: u32 = 30;

/// Render an empty-state placeholder
pub fn empty_state(empty: &EmptyState) -> String {
    let mut lines = vec![
        format!("{} {}", empty.icon.glyph(), empty.title),
        format!("  {}", empty.message),
    ];
    if let Some(action) = empty.action {
        lines.push(format!("  [+ {}]", action));
    }
    lines.join("\n")
}

/// Render the dashboard list; the selected entry is marked with `*`
pub fn dashboard_list(list: &DashboardList) -> String {
    match list {
        DashboardList::Empty(empty) => empty_state(empty),
        DashboardList::Entries(entries) => {
            let mut lines = vec![
                format!("  {:<38} {:<24} {}", "ID", "Name", "Description"),
                "-".repeat(80),
            ];
            for entry in entries {
                lines.push(format!(
                    "{} {:<38} {:<24} {}",
                    if entry.selected { "*" } else { " " },
                    entry.id,
                    entry.name,
                    entry.description.as_deref().unwrap_or("")
                ));
            }
            lines.join("\n")
        }
    }
}

/// Render widget cards, one block per card
pub fn widget_grid(grid: &WidgetGrid) -> String {
    match grid {
        WidgetGrid::Empty(empty) => empty_state(empty),
        WidgetGrid::Cards(cards) => cards
            .iter()
            .map(|card| {
                format!(
                    "{} {}  [{}]\n  {}\n  id: {}\n  ┆ {} {} ┆",
                    card.icon.glyph(),
                    card.title,
                    card.badge,
                    card.created,
                    card.id,
                    card.icon.glyph(),
                    card.preview
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n"),
    }
}

/// Render the sample overview with text bar charts
pub fn overview(overview: &Overview) -> String {
    let mut lines = vec![
        overview.title.to_string(),
        overview.subtitle.to_string(),
        String::new(),
    ];

    for kpi in &overview.kpis {
        let arrow = match kpi.trend {
            Trend::Up => "↑",
            Trend::Down => "↓",
        };
        lines.push(format!(
            "{} {:<16} {:>8}  {} {} from last month",
            kpi.icon.glyph(),
            kpi.title,
            kpi.value,
            arrow,
            kpi.change
        ));
    }

    lines.push(String::new());
    lines.push("Sales Overview (sales ▇ / profit ░)".to_string());
    let peak = overview.sales_peak().max(1);
    for point in &overview.sales {
        let bar = |value: u32| (value * BAR_WIDTH / peak) as usize;
        lines.push(format!(
            "{:<4} {:<30} {:>5}",
            point.month,
            "▇".repeat(bar(point.sales)),
            point.sales
        ));
        lines.push(format!(
            "{:<4} {:<30} {:>5}",
            "",
            "░".repeat(bar(point.profit)),
            point.profit
        ));
    }

    lines.push(String::new());
    lines.push("Customer Distribution".to_string());
    for (segment, (name, share)) in overview.customers.iter().zip(overview.customer_shares()) {
        lines.push(format!(
            "  {:<15} {:>4} {:>5.1}%  {}",
            name, segment.value, share, segment.color
        ));
    }

    lines.push(String::new());
    lines.push("Recent Activity".to_string());
    for item in &overview.activity {
        let dot = match item.status {
            ActivityStatus::Success => "●",
            ActivityStatus::Info => "○",
        };
        lines.push(format!("  {} {:<40} {}", dot, item.action, item.time));
    }

    lines.join("\n")
}

fn dashboard_panel(panel: &DashboardPanel) -> String {
    if panel.loading {
        return "Loading...".to_string();
    }

    let mut sections = vec![overview(&panel.overview), dashboard_list(&panel.dashboards)];
    if let (Some(name), Some(grid)) = (&panel.current, &panel.widgets) {
        sections.push(format!("Widgets of {}\n{}", name, widget_grid(grid)));
    }
    sections.join("\n\n")
}

/// Render the full layout: sidebar line, header and content
pub fn layout(layout: &DashboardLayout) -> String {
    let tabs: Vec<String> = layout
        .sidebar
        .iter()
        .map(|item| {
            if item.active {
                format!("[{} {}]", item.icon.glyph(), item.label)
            } else {
                format!(" {} {} ", item.icon.glyph(), item.label)
            }
        })
        .collect();

    let content = match &layout.content {
        Content::Dashboard(panel) => dashboard_panel(panel),
        Content::Placeholder(empty) => empty_state(empty),
        Content::Settings { email } => format!("Account Settings\n  Email: {}", email),
    };

    format!(
        "{}  ({}) {}\n{}\n{}\n{}\n\n{}",
        layout.brand,
        layout.user.initial,
        layout.user.email,
        tabs.join(" "),
        "=".repeat(80),
        layout.header.title,
        content
    )
}

/// Render notifications, one per line
pub fn toasts(notifications: &[Notification]) -> String {
    notifications
        .iter()
        .map(|n| format!("{} {}", n.level.icon(), n.message))
        .collect::<Vec<_>>()
        .join("\n")
}

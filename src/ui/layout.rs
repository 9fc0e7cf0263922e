//! Application layout
//!
//! Sidebar with the four sections, a header naming the active one, the
//! signed-in user's badge and the section content.

use std::fmt;
use std::str::FromStr;

use super::dashboards::DashboardList;
use super::icons::Icon;
use super::overview::Overview;
use super::widgets::WidgetGrid;
use super::EmptyState;
use crate::service::DashboardSnapshot;
use crate::session::User;

pub const BRAND: &str = "Business Intelligence";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Tab {
    #[default]
    Dashboard,
    Datasets,
    Reports,
    Settings,
}

impl Tab {
    pub fn all() -> &'static [Tab] {
        &[Tab::Dashboard, Tab::Datasets, Tab::Reports, Tab::Settings]
    }

    pub fn id(&self) -> &'static str {
        match self {
            Tab::Dashboard => "dashboard",
            Tab::Datasets => "datasets",
            Tab::Reports => "reports",
            Tab::Settings => "settings",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tab::Dashboard => "Dashboard",
            Tab::Datasets => "Datasets",
            Tab::Reports => "Reports",
            Tab::Settings => "Settings",
        }
    }

    pub fn icon(&self) -> Icon {
        match self {
            Tab::Dashboard => Icon::LayoutDashboard,
            Tab::Datasets => Icon::Database,
            Tab::Reports => Icon::BarChart3,
            Tab::Settings => Icon::Settings,
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Tab {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tab::all()
            .iter()
            .copied()
            .find(|t| t.id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown tab '{}'", s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidebarItem {
    pub tab: Tab,
    pub label: &'static str,
    pub icon: Icon,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserBadge {
    pub initial: char,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub title: &'static str,
    pub search_placeholder: &'static str,
    pub primary_action: &'static str,
}

/// Everything shown on the dashboard tab
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardPanel {
    pub loading: bool,
    pub overview: Overview,
    pub dashboards: DashboardList,
    /// Name of the selected dashboard
    pub current: Option<String>,
    /// Widgets of the selected dashboard; `None` without a selection
    pub widgets: Option<WidgetGrid>,
}

impl DashboardPanel {
    pub fn build(snapshot: &DashboardSnapshot) -> Self {
        Self {
            loading: snapshot.loading,
            overview: Overview::sample(),
            dashboards: DashboardList::build(snapshot),
            current: snapshot.current.as_ref().map(|d| d.name.clone()),
            widgets: snapshot
                .current
                .as_ref()
                .map(|_| WidgetGrid::build(&snapshot.widgets)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Dashboard(DashboardPanel),
    Placeholder(EmptyState),
    Settings { email: String },
}

/// The signed-in application frame
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardLayout {
    pub brand: &'static str,
    pub sidebar: Vec<SidebarItem>,
    pub user: UserBadge,
    pub header: Header,
    pub content: Content,
}

impl DashboardLayout {
    pub fn build(tab: Tab, user: &User, snapshot: &DashboardSnapshot) -> Self {
        let sidebar = Tab::all()
            .iter()
            .map(|t| SidebarItem {
                tab: *t,
                label: t.label(),
                icon: t.icon(),
                active: *t == tab,
            })
            .collect();

        let content = match tab {
            Tab::Dashboard => Content::Dashboard(DashboardPanel::build(snapshot)),
            Tab::Datasets => Content::Placeholder(EmptyState {
                icon: Icon::Database,
                title: "No datasets yet",
                message: "Upload your first CSV, JSON, or Excel file to get started.",
                action: Some("Upload Dataset"),
            }),
            Tab::Reports => Content::Placeholder(EmptyState {
                icon: Icon::BarChart3,
                title: "No reports yet",
                message: "Create your first report from your datasets.",
                action: None,
            }),
            Tab::Settings => Content::Settings {
                email: user.email.clone(),
            },
        };

        Self {
            brand: BRAND,
            sidebar,
            user: UserBadge {
                initial: user.initial(),
                email: user.email.clone(),
            },
            header: Header {
                title: tab.label(),
                search_placeholder: "Search...",
                primary_action: "New Dashboard",
            },
            content,
        }
    }

    pub fn active_tab(&self) -> Tab {
        self.sidebar
            .iter()
            .find(|item| item.active)
            .map(|item| item.tab)
            .unwrap_or_default()
    }
}

//! Dashboard list and creation form

use super::icons::Icon;
use super::EmptyState;
use crate::model::Dashboard;
use crate::service::{DashboardService, DashboardSnapshot};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardEntry {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardList {
    Empty(EmptyState),
    Entries(Vec<DashboardEntry>),
}

impl DashboardList {
    pub const EMPTY: EmptyState = EmptyState {
        icon: Icon::LayoutDashboard,
        title: "No dashboards yet",
        message: "Create your first dashboard to get started.",
        action: Some("Create Dashboard"),
    };

    pub fn build(snapshot: &DashboardSnapshot) -> Self {
        if snapshot.dashboards.is_empty() {
            return DashboardList::Empty(Self::EMPTY);
        }

        let selected = snapshot.current.as_ref().map(|d| d.id.as_str());
        let entries = snapshot
            .dashboards
            .iter()
            .map(|d| DashboardEntry {
                id: d.id.clone(),
                name: d.name.clone(),
                description: d.description.clone(),
                selected: Some(d.id.as_str()) == selected,
            })
            .collect();

        DashboardList::Entries(entries)
    }

    pub fn entries(&self) -> &[DashboardEntry] {
        match self {
            DashboardList::Empty(_) => &[],
            DashboardList::Entries(entries) => entries,
        }
    }
}

/// Form state of the "create dashboard" dialog
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateDashboardForm {
    pub open: bool,
    pub name: String,
    pub description: String,
    pub loading: bool,
}

impl CreateDashboardForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn can_submit(&self) -> bool {
        !self.loading && !self.name.trim().is_empty()
    }

    pub fn submit_label(&self) -> &'static str {
        if self.loading {
            "Creating..."
        } else {
            "Create Dashboard"
        }
    }

    /// Create the dashboard; on success the form resets and closes
    pub async fn submit(&mut self, service: &DashboardService) -> Option<Dashboard> {
        if !self.can_submit() {
            return None;
        }

        self.loading = true;
        let name = self.name.trim().to_string();
        let description = Some(self.description.trim()).filter(|d| !d.is_empty());

        let result = service.create_dashboard(&name, description).await;
        if result.is_some() {
            *self = Self::default();
        } else {
            self.loading = false;
        }
        result
    }
}

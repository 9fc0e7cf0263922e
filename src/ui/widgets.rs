//! Widget grid

use super::icons::{widget_icon, Icon};
use super::EmptyState;
use crate::model::{Widget, WidgetType};
use crate::service::DashboardService;

/// One card in the widget grid
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetCard {
    pub id: String,
    pub title: String,
    pub widget_type: WidgetType,
    pub icon: Icon,
    /// Upper-cased widget type
    pub badge: String,
    /// "Created 10/19/2026"
    pub created: String,
    pub preview: &'static str,
}

impl WidgetCard {
    pub fn from_widget(widget: &Widget) -> Self {
        Self {
            id: widget.id.clone(),
            title: widget.title.clone(),
            widget_type: widget.widget_type,
            icon: widget_icon(widget.widget_type),
            badge: widget.widget_type.as_str().to_uppercase(),
            created: format!("Created {}", widget.created_at.format("%-m/%-d/%Y")),
            preview: "Widget Preview",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WidgetGrid {
    Empty(EmptyState),
    Cards(Vec<WidgetCard>),
}

impl WidgetGrid {
    pub const EMPTY: EmptyState = EmptyState {
        icon: Icon::Activity,
        title: "No widgets yet",
        message: "Add your first widget to start visualizing your data.",
        action: None,
    };

    /// Cards in the order given (the service keeps widgets oldest first)
    pub fn build(widgets: &[Widget]) -> Self {
        if widgets.is_empty() {
            WidgetGrid::Empty(Self::EMPTY)
        } else {
            WidgetGrid::Cards(widgets.iter().map(WidgetCard::from_widget).collect())
        }
    }

    pub fn cards(&self) -> &[WidgetCard] {
        match self {
            WidgetGrid::Empty(_) => &[],
            WidgetGrid::Cards(cards) => cards,
        }
    }
}

/// Pending delete that needs the user's confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteConfirmation {
    pub widget_id: String,
}

impl DeleteConfirmation {
    pub const PROMPT: &'static str = "Are you sure you want to delete this widget?";

    pub fn new(widget_id: impl Into<String>) -> Self {
        Self {
            widget_id: widget_id.into(),
        }
    }

    /// Delete the widget; returns whether it succeeded
    pub async fn confirm(self, service: &DashboardService) -> bool {
        service.delete_widget(&self.widget_id).await
    }

    /// Dismiss without deleting
    pub fn cancel(self) {
        tracing::debug!(widget_id = %self.widget_id, "Widget delete cancelled");
    }
}

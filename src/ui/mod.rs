//! Presentation
//!
//! View models built from a `DashboardSnapshot` plus the session user. They
//! hold no persisted data of their own; forms only keep what the user is
//! typing and a loading flag that blocks double submission.
//!
//! - **layout**: sidebar, header and the active tab's content
//! - **dashboards**: dashboard list and the create-dashboard form
//! - **widgets**: widget cards and delete confirmation
//! - **add_widget**: the add-widget form
//! - **overview**: sample business analytics shown on the dashboard tab
//! - **icons**: icon set, including the icon of each widget type
//! - **render**: plain-text rendering for the terminal

pub mod add_widget;
pub mod dashboards;
pub mod icons;
pub mod layout;
pub mod overview;
pub mod render;
pub mod widgets;

pub use add_widget::AddWidgetForm;
pub use dashboards::{CreateDashboardForm, DashboardEntry, DashboardList};
pub use icons::{widget_icon, Icon};
pub use layout::{Content, DashboardLayout, Tab};
pub use overview::Overview;
pub use widgets::{DeleteConfirmation, WidgetCard, WidgetGrid};

/// Placeholder shown when a collection is empty
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmptyState {
    pub icon: Icon,
    pub title: &'static str,
    pub message: &'static str,
    /// Label of the call-to-action button, if any
    pub action: Option<&'static str>,
}

//! Add-widget dialog

use crate::model::{Widget, WidgetDraft, WidgetType};
use crate::service::DashboardService;

/// One entry of the widget-type picker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeOption {
    pub widget_type: WidgetType,
    pub label: &'static str,
    pub description: &'static str,
}

/// Options of the widget-type picker, in display order
pub fn type_options() -> Vec<TypeOption> {
    WidgetType::all()
        .iter()
        .map(|t| TypeOption {
            widget_type: *t,
            label: t.label(),
            description: t.description(),
        })
        .collect()
}

/// Form state of the "add widget" dialog
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddWidgetForm {
    pub open: bool,
    pub title: String,
    pub widget_type: Option<WidgetType>,
    pub loading: bool,
}

impl AddWidgetForm {
    pub const TITLE: &'static str = "Add New Widget";
    pub const DESCRIPTION: &'static str =
        "Add a new widget to your dashboard to visualize your data.";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self) {
        self.open = true;
    }

    /// Close without submitting; typed values are kept
    pub fn close(&mut self) {
        self.open = false;
    }

    pub fn can_submit(&self) -> bool {
        !self.loading && !self.title.trim().is_empty() && self.widget_type.is_some()
    }

    pub fn submit_label(&self) -> &'static str {
        if self.loading {
            "Adding..."
        } else {
            "Add Widget"
        }
    }

    /// Draft for the current input, if submittable
    pub fn draft(&self) -> Option<WidgetDraft> {
        if !self.can_submit() {
            return None;
        }
        let widget_type = self.widget_type?;
        Some(WidgetDraft::new(self.title.trim(), widget_type))
    }

    /// Add the widget; on success the form resets and closes
    pub async fn submit(&mut self, service: &DashboardService) -> Option<Widget> {
        let draft = self.draft()?;

        self.loading = true;
        let result = service.add_widget(draft).await;
        if result.is_some() {
            *self = Self::default();
        } else {
            self.loading = false;
        }
        result
    }
}

//! Core record types
//!
//! - `Dashboard` / `NewDashboard`: a named, user-owned collection of widgets
//! - `Widget` / `NewWidget`: a visualization placed on a dashboard
//! - `WidgetDraft`: what a caller supplies when adding a widget
//! - `WidgetPosition` / `LayoutItem`: grid geometry

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ModelError;
use super::widget::{WidgetConfig, WidgetType};

/// Position and size of a widget in grid units
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct WidgetPosition {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Default for WidgetPosition {
    fn default() -> Self {
        Self { x: 0, y: 0, w: 6, h: 4 }
    }
}

impl WidgetPosition {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }
}

/// One placement record in a dashboard layout
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LayoutItem {
    pub widget_id: String,
    #[serde(flatten)]
    pub position: WidgetPosition,
}

/// A stored dashboard
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dashboard {
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub layout: Vec<LayoutItem>,
    #[serde(default)]
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
}

/// Insert shape for a dashboard; the store assigns `id` and `created_at`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewDashboard {
    pub user_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub layout: Vec<LayoutItem>,
    #[serde(default)]
    pub is_public: bool,
}

impl NewDashboard {
    /// Private dashboard with an empty layout
    pub fn new(user_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
            description: None,
            layout: Vec::new(),
            is_public: false,
        }
    }

    /// Builder method: set description
    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }
}

/// A stored widget
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Widget {
    pub id: String,
    pub dashboard_id: String,
    pub title: String,
    pub widget_type: WidgetType,
    #[serde(default)]
    pub config: Value,
    #[serde(default)]
    pub position: WidgetPosition,
    #[serde(default)]
    pub dataset_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Widget {
    /// Decode the stored config blob for this widget's type
    pub fn typed_config(&self) -> Result<WidgetConfig, ModelError> {
        WidgetConfig::from_value(self.widget_type, self.config.clone())
    }
}

/// Insert shape for a widget
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewWidget {
    pub dashboard_id: String,
    pub title: String,
    pub widget_type: WidgetType,
    pub config: Value,
    pub position: WidgetPosition,
    pub dataset_id: Option<String>,
}

/// Caller-supplied widget fields, before it is bound to a dashboard
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetDraft {
    pub title: String,
    pub widget_type: WidgetType,
    /// `None` uses the widget type's default configuration
    pub config: Option<WidgetConfig>,
    /// `None` uses `WidgetPosition::default()`
    pub position: Option<WidgetPosition>,
    pub dataset_id: Option<String>,
}

impl WidgetDraft {
    pub fn new(title: impl Into<String>, widget_type: WidgetType) -> Self {
        Self {
            title: title.into(),
            widget_type,
            config: None,
            position: None,
            dataset_id: None,
        }
    }

    /// Builder method: explicit configuration
    pub fn config(mut self, config: WidgetConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Builder method: explicit position
    pub fn position(mut self, position: WidgetPosition) -> Self {
        self.position = Some(position);
        self
    }

    /// Builder method: dataset reference
    pub fn dataset(mut self, dataset_id: impl Into<String>) -> Self {
        self.dataset_id = Some(dataset_id.into());
        self
    }

    /// Bind the draft to a dashboard, filling defaults
    pub fn into_new_widget(self, dashboard_id: impl Into<String>) -> NewWidget {
        let config = self
            .config
            .unwrap_or_else(|| self.widget_type.default_config());

        NewWidget {
            dashboard_id: dashboard_id.into(),
            title: self.title.trim().to_string(),
            widget_type: self.widget_type,
            config: config.to_value(),
            position: self.position.unwrap_or_default(),
            dataset_id: self.dataset_id,
        }
    }
}

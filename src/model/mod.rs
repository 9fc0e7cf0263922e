//! Dashboard Data Model
//!
//! Records exchanged with the table store:
//!
//! - **types**: `Dashboard`, `Widget`, their insert shapes and grid geometry
//! - **widget**: the closed `WidgetType` enumeration and typed `WidgetConfig`
//! - **error**: decoding errors
//!
//! # Example
//!
//! ```rust
//! use insightdeck::model::{WidgetConfig, WidgetDraft, WidgetType};
//!
//! let draft = WidgetDraft::new("Revenue", WidgetType::Chart);
//! let row = draft.into_new_widget("dash-1");
//!
//! assert_eq!(row.config, WidgetType::Chart.default_config().to_value());
//! assert!(matches!(
//!     WidgetConfig::from_value(WidgetType::Chart, row.config).unwrap(),
//!     WidgetConfig::Chart(_)
//! ));
//! ```

pub mod error;
pub mod types;
pub mod widget;

pub use error::ModelError;
pub use types::{Dashboard, LayoutItem, NewDashboard, NewWidget, Widget, WidgetDraft, WidgetPosition};
pub use widget::{
    ChartConfig, ChartKind, KpiConfig, KpiFormat, MapConfig, TableConfig, Trend, WidgetConfig,
    WidgetType,
};

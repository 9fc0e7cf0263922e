//! Widget types and their configuration shapes
//!
//! `WidgetType` is a closed enumeration. Everything that varies by type
//! (labels, default configuration, the JSON shape of the stored config) is an
//! exhaustive `match`, so adding a variant fails to compile until every
//! mapping handles it.

use serde::ser::SerializeTuple;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use super::error::ModelError;

/// Kind of visualization a widget renders
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum WidgetType {
    /// Bar, line or pie chart
    Chart,
    /// Data table with sorting
    Table,
    /// Key performance indicator card
    Kpi,
    /// Geographic visualization
    Map,
}

impl WidgetType {
    /// All widget types, in the order the add-widget dialog lists them
    pub fn all() -> &'static [WidgetType] {
        &[
            WidgetType::Chart,
            WidgetType::Table,
            WidgetType::Kpi,
            WidgetType::Map,
        ]
    }

    /// Value stored in the `widget_type` column
    pub fn as_str(&self) -> &'static str {
        match self {
            WidgetType::Chart => "chart",
            WidgetType::Table => "table",
            WidgetType::Kpi => "kpi",
            WidgetType::Map => "map",
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            WidgetType::Chart => "Chart",
            WidgetType::Table => "Table",
            WidgetType::Kpi => "KPI Card",
            WidgetType::Map => "Map",
        }
    }

    /// Short description shown next to the label
    pub fn description(&self) -> &'static str {
        match self {
            WidgetType::Chart => "Bar, line, or pie chart",
            WidgetType::Table => "Data table with sorting",
            WidgetType::Kpi => "Key performance indicator",
            WidgetType::Map => "Geographic visualization",
        }
    }

    /// Configuration a new widget of this type starts with
    pub fn default_config(&self) -> WidgetConfig {
        match self {
            WidgetType::Chart => WidgetConfig::Chart(ChartConfig::default()),
            WidgetType::Table => WidgetConfig::Table(TableConfig::default()),
            WidgetType::Kpi => WidgetConfig::Kpi(KpiConfig::default()),
            WidgetType::Map => WidgetConfig::Map(MapConfig::default()),
        }
    }
}

impl fmt::Display for WidgetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WidgetType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "chart" => Ok(WidgetType::Chart),
            "table" => Ok(WidgetType::Table),
            "kpi" => Ok(WidgetType::Kpi),
            "map" => Ok(WidgetType::Map),
            other => Err(ModelError::UnknownWidgetType(other.to_string())),
        }
    }
}

/// Chart flavour
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    #[default]
    Bar,
    Line,
    Pie,
}

/// Trend direction of a KPI
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    #[default]
    Up,
    Down,
}

/// Display format of a KPI value
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum KpiFormat {
    #[default]
    Number,
    Currency,
    Percent,
}

/// Chart widget configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ChartConfig {
    pub chart_type: ChartKind,
    pub data: Vec<Value>,
    pub colors: Vec<String>,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            chart_type: ChartKind::Bar,
            data: Vec::new(),
            colors: vec![
                "#3b82f6".to_string(),
                "#10b981".to_string(),
                "#f59e0b".to_string(),
            ],
        }
    }
}

/// Table widget configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TableConfig {
    pub columns: Vec<Value>,
    pub data: Vec<Value>,
    pub pagination: bool,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            columns: Vec::new(),
            data: Vec::new(),
            pagination: true,
        }
    }
}

/// KPI card configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KpiConfig {
    #[serde(serialize_with = "whole_number")]
    pub value: f64,
    #[serde(serialize_with = "whole_number")]
    pub target: f64,
    pub format: KpiFormat,
    pub trend: Trend,
}

impl Default for KpiConfig {
    fn default() -> Self {
        Self {
            value: 0.0,
            target: 100.0,
            format: KpiFormat::Number,
            trend: Trend::Up,
        }
    }
}

impl KpiConfig {
    /// Progress towards the target as a fraction (0 when the target is 0)
    pub fn progress(&self) -> f64 {
        if self.target == 0.0 {
            0.0
        } else {
            self.value / self.target
        }
    }
}

/// Map widget configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MapConfig {
    /// `[latitude, longitude]`
    #[serde(serialize_with = "whole_numbers")]
    pub center: [f64; 2],
    pub zoom: u8,
    pub markers: Vec<Value>,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            center: [0.0, 0.0],
            zoom: 2,
            markers: Vec::new(),
        }
    }
}

/// Write whole numbers as JSON integers, so `100.0` is stored as `100`
fn whole_number<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    // Beyond 2^53 an f64 no longer holds every integer
    if value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}

fn whole_numbers<S: Serializer>(values: &[f64; 2], serializer: S) -> Result<S::Ok, S::Error> {
    struct Whole(f64);

    impl Serialize for Whole {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            whole_number(&self.0, serializer)
        }
    }

    let mut tuple = serializer.serialize_tuple(values.len())?;
    for value in values {
        tuple.serialize_element(&Whole(*value))?;
    }
    tuple.end()
}

/// Typed widget configuration, one variant per widget type
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetConfig {
    Chart(ChartConfig),
    Table(TableConfig),
    Kpi(KpiConfig),
    Map(MapConfig),
}

impl WidgetConfig {
    /// Widget type this configuration belongs to
    pub fn widget_type(&self) -> WidgetType {
        match self {
            WidgetConfig::Chart(_) => WidgetType::Chart,
            WidgetConfig::Table(_) => WidgetType::Table,
            WidgetConfig::Kpi(_) => WidgetType::Kpi,
            WidgetConfig::Map(_) => WidgetType::Map,
        }
    }

    /// Encode as the JSON blob stored in the `config` column
    pub fn to_value(&self) -> Value {
        let encoded = match self {
            WidgetConfig::Chart(c) => serde_json::to_value(c),
            WidgetConfig::Table(c) => serde_json::to_value(c),
            WidgetConfig::Kpi(c) => serde_json::to_value(c),
            WidgetConfig::Map(c) => serde_json::to_value(c),
        };
        // Plain structs of strings, numbers and JSON values always encode
        encoded.unwrap_or(Value::Null)
    }

    /// Decode a stored config blob for the given widget type
    ///
    /// `null` decodes to the type's default configuration; missing fields
    /// are filled from the defaults.
    pub fn from_value(widget_type: WidgetType, value: Value) -> Result<Self, ModelError> {
        if value.is_null() {
            return Ok(widget_type.default_config());
        }

        let invalid = |e: serde_json::Error| ModelError::InvalidConfig {
            widget_type,
            error: e.to_string(),
        };

        let config = match widget_type {
            WidgetType::Chart => WidgetConfig::Chart(serde_json::from_value(value).map_err(invalid)?),
            WidgetType::Table => WidgetConfig::Table(serde_json::from_value(value).map_err(invalid)?),
            WidgetType::Kpi => WidgetConfig::Kpi(serde_json::from_value(value).map_err(invalid)?),
            WidgetType::Map => WidgetConfig::Map(serde_json::from_value(value).map_err(invalid)?),
        };

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_widget_type_round_trip_str() {
        for t in WidgetType::all() {
            assert_eq!(t.as_str().parse::<WidgetType>().unwrap(), *t);
        }
        assert_eq!("KPI".parse::<WidgetType>().unwrap(), WidgetType::Kpi);
    }

    #[test]
    fn test_unknown_widget_type() {
        let err = "gauge".parse::<WidgetType>().unwrap_err();
        assert!(matches!(err, ModelError::UnknownWidgetType(ref t) if t == "gauge"));
    }

    #[test]
    fn test_widget_type_serde() {
        assert_eq!(serde_json::to_string(&WidgetType::Kpi).unwrap(), "\"kpi\"");
        let t: WidgetType = serde_json::from_str("\"map\"").unwrap();
        assert_eq!(t, WidgetType::Map);
    }

    #[test]
    fn test_chart_default_config_shape() {
        let value = WidgetType::Chart.default_config().to_value();
        assert_eq!(
            value,
            json!({
                "chartType": "bar",
                "data": [],
                "colors": ["#3b82f6", "#10b981", "#f59e0b"]
            })
        );
    }

    #[test]
    fn test_table_and_map_default_config_shape() {
        assert_eq!(
            WidgetType::Table.default_config().to_value(),
            json!({"columns": [], "data": [], "pagination": true})
        );

        assert_eq!(
            WidgetType::Map.default_config().to_value(),
            json!({"center": [0, 0], "zoom": 2, "markers": []})
        );
    }

    #[test]
    fn test_kpi_default_config_shape() {
        assert_eq!(
            WidgetType::Kpi.default_config().to_value(),
            json!({"value": 0, "target": 100, "format": "number", "trend": "up"})
        );
    }

    #[test]
    fn test_fractional_numbers_stay_floats() {
        let config = WidgetConfig::Kpi(KpiConfig {
            value: 42.5,
            target: 50.0,
            ..KpiConfig::default()
        });
        let value = config.to_value();
        assert_eq!(value["value"], json!(42.5));
        assert_eq!(value["target"], json!(50));

        let map = WidgetConfig::Map(MapConfig {
            center: [51.5, -0.0],
            ..MapConfig::default()
        });
        assert_eq!(map.to_value()["center"], json!([51.5, 0]));

        let decoded = WidgetConfig::from_value(WidgetType::Kpi, value).unwrap();
        assert_eq!(decoded, config);
    }

    #[test]
    fn test_kpi_default_config() {
        let config = match WidgetType::Kpi.default_config() {
            WidgetConfig::Kpi(c) => c,
            other => panic!("Expected Kpi, got {:?}", other),
        };
        assert_eq!(config.target, 100.0);
        assert_eq!(config.format, KpiFormat::Number);
        assert_eq!(config.trend, Trend::Up);
        assert_eq!(config.progress(), 0.0);
    }

    #[test]
    fn test_from_value_fills_missing_fields() {
        let config = WidgetConfig::from_value(WidgetType::Chart, json!({"chartType": "pie"})).unwrap();
        match config {
            WidgetConfig::Chart(c) => {
                assert_eq!(c.chart_type, ChartKind::Pie);
                assert_eq!(c.colors.len(), 3);
            }
            other => panic!("Expected Chart, got {:?}", other),
        }
    }

    #[test]
    fn test_from_value_null_is_default() {
        let config = WidgetConfig::from_value(WidgetType::Map, Value::Null).unwrap();
        assert_eq!(config, WidgetType::Map.default_config());
    }

    #[test]
    fn test_from_value_rejects_wrong_shape() {
        let err = WidgetConfig::from_value(WidgetType::Kpi, json!({"value": "lots"})).unwrap_err();
        assert!(matches!(err, ModelError::InvalidConfig { widget_type: WidgetType::Kpi, .. }));
    }

    #[test]
    fn test_config_reports_its_type() {
        for t in WidgetType::all() {
            assert_eq!(t.default_config().widget_type(), *t);
        }
    }
}

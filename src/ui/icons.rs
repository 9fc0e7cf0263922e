//! Icon set

use crate::model::WidgetType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Icon {
    LayoutDashboard,
    Database,
    BarChart3,
    Settings,
    Table,
    Activity,
    Map,
    Plus,
    Trash2,
    LogOut,
    Search,
    Bell,
    TrendingUp,
    TrendingDown,
    DollarSign,
    Users,
    ShoppingCart,
}

impl Icon {
    /// Icon name in the web icon set
    pub fn name(&self) -> &'static str {
        match self {
            Icon::LayoutDashboard => "layout-dashboard",
            Icon::Database => "database",
            Icon::BarChart3 => "bar-chart-3",
            Icon::Settings => "settings",
            Icon::Table => "table",
            Icon::Activity => "activity",
            Icon::Map => "map",
            Icon::Plus => "plus",
            Icon::Trash2 => "trash-2",
            Icon::LogOut => "log-out",
            Icon::Search => "search",
            Icon::Bell => "bell",
            Icon::TrendingUp => "trending-up",
            Icon::TrendingDown => "trending-down",
            Icon::DollarSign => "dollar-sign",
            Icon::Users => "users",
            Icon::ShoppingCart => "shopping-cart",
        }
    }

    /// Single-character stand-in for terminals
    pub fn glyph(&self) -> &'static str {
        match self {
            Icon::LayoutDashboard => "▦",
            Icon::Database => "◫",
            Icon::BarChart3 => "▥",
            Icon::Settings => "⚙",
            Icon::Table => "▤",
            Icon::Activity => "∿",
            Icon::Map => "◍",
            Icon::Plus => "+",
            Icon::Trash2 => "✕",
            Icon::LogOut => "⇥",
            Icon::Search => "⌕",
            Icon::Bell => "♪",
            Icon::TrendingUp => "↑",
            Icon::TrendingDown => "↓",
            Icon::DollarSign => "$",
            Icon::Users => "☺",
            Icon::ShoppingCart => "⊞",
        }
    }
}

/// Icon shown on a widget card
pub fn widget_icon(widget_type: WidgetType) -> Icon {
    match widget_type {
        WidgetType::Chart => Icon::BarChart3,
        WidgetType::Table => Icon::Table,
        WidgetType::Kpi => Icon::Activity,
        WidgetType::Map => Icon::Map,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widget_icons() {
        assert_eq!(widget_icon(WidgetType::Chart), Icon::BarChart3);
        assert_eq!(widget_icon(WidgetType::Kpi).name(), "activity");
        assert_eq!(widget_icon(WidgetType::Map).glyph(), "◍");
    }
}

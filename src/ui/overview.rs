//! Sample business overview
//!
//! Static analytics shown at the top of the dashboard tab until real
//! datasets are wired in.

use super::icons::Icon;
use crate::model::Trend;

#[derive(Debug, Clone, PartialEq)]
pub struct SalesPoint {
    pub month: &'static str,
    pub sales: u32,
    pub profit: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomerSegment {
    pub name: &'static str,
    pub value: u32,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KpiCard {
    pub title: &'static str,
    pub value: &'static str,
    pub change: &'static str,
    pub trend: Trend,
    pub icon: Icon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityStatus {
    Success,
    Info,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivityItem {
    pub action: &'static str,
    pub time: &'static str,
    pub status: ActivityStatus,
}

/// The dashboard tab's overview section
#[derive(Debug, Clone, PartialEq)]
pub struct Overview {
    pub title: &'static str,
    pub subtitle: &'static str,
    pub kpis: Vec<KpiCard>,
    pub sales: Vec<SalesPoint>,
    pub customers: Vec<CustomerSegment>,
    pub activity: Vec<ActivityItem>,
}

impl Overview {
    pub fn sample() -> Self {
        let sales = [
            ("Jan", 4000, 2400),
            ("Feb", 3000, 1398),
            ("Mar", 2000, 9800),
            ("Apr", 2780, 3908),
            ("May", 1890, 4800),
            ("Jun", 2390, 3800),
        ]
        .into_iter()
        .map(|(month, sales, profit)| SalesPoint {
            month,
            sales,
            profit,
        })
        .collect();

        let customers = vec![
            CustomerSegment {
                name: "New Customers",
                value: 400,
                color: "#0088FE",
            },
            CustomerSegment {
                name: "Returning",
                value: 300,
                color: "#00C49F",
            },
            CustomerSegment {
                name: "Inactive",
                value: 200,
                color: "#FFBB28",
            },
        ];

        let kpis = vec![
            KpiCard {
                title: "Total Revenue",
                value: "$45,231",
                change: "+20.1%",
                trend: Trend::Up,
                icon: Icon::DollarSign,
            },
            KpiCard {
                title: "Active Users",
                value: "2,340",
                change: "+15.3%",
                trend: Trend::Up,
                icon: Icon::Users,
            },
            KpiCard {
                title: "Orders",
                value: "1,429",
                change: "-3.2%",
                trend: Trend::Down,
                icon: Icon::ShoppingCart,
            },
            KpiCard {
                title: "Conversion Rate",
                value: "3.24%",
                change: "+8.1%",
                trend: Trend::Up,
                icon: Icon::Activity,
            },
        ];

        let activity = vec![
            ActivityItem {
                action: "New dashboard created",
                time: "2 hours ago",
                status: ActivityStatus::Success,
            },
            ActivityItem {
                action: "Dataset \"Sales Q4\" uploaded",
                time: "4 hours ago",
                status: ActivityStatus::Info,
            },
            ActivityItem {
                action: "Report generation completed",
                time: "1 day ago",
                status: ActivityStatus::Success,
            },
            ActivityItem {
                action: "User \"john@example.com\" invited",
                time: "2 days ago",
                status: ActivityStatus::Info,
            },
        ];

        Self {
            title: "Dashboard Overview",
            subtitle: "Welcome back! Here's what's happening with your business today.",
            kpis,
            sales,
            customers,
            activity,
        }
    }

    /// Largest sales or profit figure, for scaling bars
    pub fn sales_peak(&self) -> u32 {
        self.sales
            .iter()
            .map(|p| p.sales.max(p.profit))
            .max()
            .unwrap_or(0)
    }

    /// Share of each customer segment in percent
    pub fn customer_shares(&self) -> Vec<(&'static str, f64)> {
        let total: u32 = self.customers.iter().map(|c| c.value).sum();
        self.customers
            .iter()
            .map(|c| {
                let share = if total == 0 {
                    0.0
                } else {
                    f64::from(c.value) * 100.0 / f64::from(total)
                };
                (c.name, share)
            })
            .collect()
    }
}

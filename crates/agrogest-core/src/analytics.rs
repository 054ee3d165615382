//! Read-only projections over tasks and inventory for the dashboard

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{InventoryItem, Task, TaskStatus, TaskType};

const AREA_PER_TASK_HA: f64 = 2.5;
const WATER_PER_IRRIGATION_L: f64 = 150.0;
const FERTILIZER_PER_SPRAYING_KG: f64 = 25.0;
const FALLBACK_DAILY_COST: f64 = 45.50;
const EXPIRY_WARNING_DAYS: i64 = 30;

crate::models::string_enum!(
    /// Dashboard reporting window
    Period {
        Week => "7d",
        Month => "30d",
        Quarter => "90d",
    }
);

impl Period {
    #[must_use]
    pub const fn days(self) -> u32 {
        match self {
            Self::Week => 7,
            Self::Month => 30,
            Self::Quarter => 90,
        }
    }
}

impl Default for Period {
    fn default() -> Self {
        Self::Month
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub in_progress: usize,
    /// Completed share of all tasks, in percent
    pub completion_rate: f64,
    pub by_type: BTreeMap<String, usize>,
}

#[must_use]
pub fn task_stats(tasks: &[Task]) -> TaskStats {
    let count = |status: TaskStatus| tasks.iter().filter(|task| task.status == status).count();
    let completed = count(TaskStatus::Completed);
    let completion_rate = if tasks.is_empty() {
        0.0
    } else {
        ratio(completed, tasks.len()) * 100.0
    };

    let by_type = TaskType::ALL
        .iter()
        .map(|task_type| {
            let total = tasks.iter().filter(|task| task.task_type == *task_type).count();
            (task_type.as_str().to_string(), total)
        })
        .collect();

    TaskStats {
        total: tasks.len(),
        completed,
        pending: count(TaskStatus::Pending),
        in_progress: count(TaskStatus::InProgress),
        completion_rate,
        by_type,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InventoryAlerts {
    pub low_stock: Vec<InventoryItem>,
    /// Not yet expired, expiring within 30 days
    pub expiring_soon: Vec<InventoryItem>,
}

#[must_use]
pub fn inventory_alerts(items: &[InventoryItem], today: NaiveDate) -> InventoryAlerts {
    InventoryAlerts {
        low_stock: items.iter().filter(|item| item.is_low_stock()).cloned().collect(),
        expiring_soon: items
            .iter()
            .filter(|item| {
                item.days_until_expiry(today)
                    .is_some_and(|days| (0..=EXPIRY_WARNING_DAYS).contains(&days))
            })
            .cloned()
            .collect(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KpiSnapshot {
    pub period_days: u32,
    pub treated_area_ha: f64,
    pub water_liters: f64,
    pub fertilizer_kg: f64,
    pub daily_cost: f64,
}

/// Estimates from tasks completed in the last `period` days up to `today`.
#[must_use]
pub fn kpi_snapshot(
    tasks: &[Task],
    total_value: f64,
    period: Period,
    today: NaiveDate,
) -> KpiSnapshot {
    let days = period.days();
    let start = today - chrono::Days::new(u64::from(days));
    let recent: Vec<&Task> = tasks
        .iter()
        .filter(|task| {
            task.status == TaskStatus::Completed
                && task.scheduled_date > start
                && task.scheduled_date <= today
        })
        .collect();
    let of_type = |task_type: TaskType| {
        recent
            .iter()
            .filter(|task| task.task_type == task_type)
            .count()
    };

    let daily_cost = total_value / f64::from(days);
    KpiSnapshot {
        period_days: days,
        treated_area_ha: count_f64(recent.len()) * AREA_PER_TASK_HA,
        water_liters: count_f64(of_type(TaskType::Irrigation)) * WATER_PER_IRRIGATION_L,
        fertilizer_kg: count_f64(of_type(TaskType::Spraying)) * FERTILIZER_PER_SPRAYING_KG,
        daily_cost: if daily_cost > 0.0 {
            daily_cost
        } else {
            FALLBACK_DAILY_COST
        },
    }
}

#[allow(clippy::cast_precision_loss)]
fn count_f64(count: usize) -> f64 {
    count as f64
}

fn ratio(part: usize, whole: usize) -> f64 {
    count_f64(part) / count_f64(whole)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemCategory, NewItem, NewTask};
    use pretty_assertions::assert_eq;

    fn task(task_type: TaskType, status: TaskStatus, date: NaiveDate) -> Task {
        NewTask {
            title: "Trabalho".to_string(),
            description: None,
            task_type,
            field: "Campo".to_string(),
            scheduled_date: date,
            scheduled_time: "08:00".to_string(),
            status,
            owner_id: "u1".to_string(),
        }
        .into_task()
        .unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, 31).unwrap()
    }

    #[test]
    fn task_stats_counts_by_status_and_type() {
        let tasks = vec![
            task(TaskType::Irrigation, TaskStatus::Completed, today()),
            task(TaskType::Irrigation, TaskStatus::Pending, today()),
            task(TaskType::Harvest, TaskStatus::InProgress, today()),
            task(TaskType::Spraying, TaskStatus::Completed, today()),
        ];
        let stats = task_stats(&tasks);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.in_progress, 1);
        assert_eq!(stats.completion_rate, 50.0);
        assert_eq!(stats.by_type["irrigation"], 2);
        assert_eq!(stats.by_type["planting"], 0);
        assert_eq!(task_stats(&[]).completion_rate, 0.0);
    }

    #[test]
    fn kpis_only_count_completed_tasks_in_period() {
        let old = today() - chrono::Days::new(40);
        let tasks = vec![
            task(TaskType::Irrigation, TaskStatus::Completed, today()),
            task(TaskType::Spraying, TaskStatus::Completed, today() - chrono::Days::new(3)),
            task(TaskType::Irrigation, TaskStatus::Pending, today()),
            task(TaskType::Irrigation, TaskStatus::Completed, old),
        ];

        let kpis = kpi_snapshot(&tasks, 300.0, Period::Month, today());
        assert_eq!(kpis.treated_area_ha, 5.0);
        assert_eq!(kpis.water_liters, 150.0);
        assert_eq!(kpis.fertilizer_kg, 25.0);
        assert_eq!(kpis.daily_cost, 10.0);

        let quarter = kpi_snapshot(&tasks, 0.0, Period::Quarter, today());
        assert_eq!(quarter.treated_area_ha, 7.5);
        assert_eq!(quarter.daily_cost, 45.50);
    }

    #[test]
    fn inventory_alerts_use_inclusive_bounds() {
        let item = |quantity: f64, expiry: Option<NaiveDate>| {
            NewItem {
                name: "Fitofármaco".to_string(),
                category: ItemCategory::Pesticide,
                quantity,
                unit: "L".to_string(),
                unit_price: 12.0,
                supplier: None,
                expiry_date: expiry,
                min_stock: 5.0,
                owner_id: "u1".to_string(),
            }
            .into_item()
            .unwrap()
        };
        let items = vec![
            item(5.0, Some(today() + chrono::Days::new(30))),
            item(6.0, Some(today() - chrono::Days::new(1))),
            item(9.0, None),
        ];

        let alerts = inventory_alerts(&items, today());
        assert_eq!(alerts.low_stock, vec![items[0].clone()]);
        assert_eq!(alerts.expiring_soon, vec![items[0].clone()]);
    }

    #[test]
    fn period_parses_from_label() {
        assert_eq!("7d".parse::<Period>().unwrap().days(), 7);
        assert_eq!(Period::default(), Period::Month);
    }
}

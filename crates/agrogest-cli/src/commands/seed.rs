use agrogest_core::models::{
    Coordinates, FieldType, ItemCategory, NewField, NewItem, NewTask, SoilType, TaskStatus,
    TaskType, User,
};
use agrogest_core::DomainStores;
use chrono::{Days, Local, NaiveDate};

use crate::commands::common::Context;
use crate::error::CliError;

/// Fill an empty database with a demo farm; signs in a demo user when nobody is.
pub async fn run_seed(ctx: &Context) -> Result<(), CliError> {
    let stores = ctx.open_stores().await?;
    seed(&stores, Local::now().date_naive()).await?;

    println!(
        "Seeded {} tasks, {} inventory items and {} fields",
        stores.tasks.all().await.len(),
        stores.inventory.all().await.len(),
        stores.fields.all().await.len()
    );
    Ok(())
}

pub async fn seed(stores: &DomainStores, today: NaiveDate) -> Result<(), CliError> {
    let populated = !stores.tasks.all().await.is_empty()
        || !stores.inventory.all().await.is_empty()
        || !stores.fields.all().await.is_empty();
    if populated {
        return Err(CliError::AlreadySeeded);
    }

    if stores.session.user().await.is_none() {
        let user = User::new("user-1", "agricultor@agrogest.pt", "João Silva")
            .with_farm("Quinta do Vale Verde");
        stores.session.set_user(Some(user)).await?;
    }

    for field in sample_fields() {
        stores.fields.add(field).await?;
    }
    for task in sample_tasks(today) {
        stores.tasks.add(task).await?;
    }
    for item in sample_items(today) {
        stores.inventory.add(item).await?;
    }
    Ok(())
}

#[rustfmt::skip]
fn sample_tasks(today: NaiveDate) -> Vec<NewTask> {
    let yesterday = today.checked_sub_days(Days::new(1)).unwrap_or(today);
    let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
    let next_week = today.checked_add_days(Days::new(7)).unwrap_or(today);

    [
        ("Rega do Campo A", "Rega matinal do campo de milho", TaskType::Irrigation, "Campo A - Milho", today, "07:00", TaskStatus::Pending),
        ("Aplicação de Fertilizante", "Aplicar fertilizante NPK no campo de tomate", TaskType::Spraying, "Campo B - Tomate", tomorrow, "08:30", TaskStatus::Pending),
        ("Plantio de Alface", "Plantio de mudas de alface na estufa 1", TaskType::Planting, "Estufa 1", yesterday, "09:00", TaskStatus::Completed),
        ("Colheita de Cenouras", "Colheita das cenouras do campo C", TaskType::Harvest, "Campo C - Cenouras", next_week, "06:00", TaskStatus::Pending),
        ("Rega da Estufa 2", "Rega do sistema de gotejamento", TaskType::Irrigation, "Estufa 2", today, "18:00", TaskStatus::InProgress),
    ]
    .into_iter()
    .map(|(title, description, task_type, field, date, time, status)| NewTask {
        title: title.to_string(),
        description: Some(description.to_string()),
        task_type,
        field: field.to_string(),
        scheduled_date: date,
        scheduled_time: time.to_string(),
        status,
        owner_id: String::new(),
    })
    .collect()
}

#[rustfmt::skip]
fn sample_items(today: NaiveDate) -> Vec<NewItem> {
    let in_60_days = today.checked_add_days(Days::new(60));

    [
        ("Sementes de Milho", ItemCategory::Seeds, 25.0, "kg", 4.50, "Agrosementes Lda", None, 10.0),
        ("Fertilizante NPK 20-10-10", ItemCategory::Fertilizer, 8.0, "sacos 25kg", 28.00, "Fertilizantes do Norte", None, 5.0),
        ("Pesticida Orgânico", ItemCategory::Pesticide, 3.0, "litros", 35.00, "EcoAgri", in_60_days, 2.0),
        ("Gasóleo Agrícola", ItemCategory::Fuel, 150.0, "litros", 0.85, "Posto Combustível Rural", None, 50.0),
        ("Sementes de Tomate", ItemCategory::Seeds, 2.0, "kg", 12.00, "Sementes Premium", None, 5.0),
        ("Adubo Composto", ItemCategory::Fertilizer, 12.0, "sacos 50kg", 18.50, "Adubos Naturais", None, 8.0),
    ]
    .into_iter()
    .map(|(name, category, quantity, unit, unit_price, supplier, expiry_date, min_stock)| NewItem {
        name: name.to_string(),
        category,
        quantity,
        unit: unit.to_string(),
        unit_price,
        supplier: Some(supplier.to_string()),
        expiry_date,
        min_stock,
        owner_id: String::new(),
    })
    .collect()
}

#[rustfmt::skip]
fn sample_fields() -> Vec<NewField> {
    [
        ("Campo A - Milho", FieldType::OpenField, SoilType::Loamy, 4.0, 8_000.0, Some((41.15, -8.61))),
        ("Campo B - Tomate", FieldType::OpenField, SoilType::Mixed, 2.5, 5_000.0, None),
        ("Campo C - Cenouras", FieldType::OpenField, SoilType::Sandy, 1.8, 3_000.0, None),
        ("Estufa 1", FieldType::Greenhouse, SoilType::Loamy, 0.4, 1_200.0, None),
        ("Estufa 2", FieldType::Greenhouse, SoilType::Loamy, 0.4, 1_200.0, None),
    ]
    .into_iter()
    .map(|(name, field_type, soil_type, area_ha, irrigation_capacity, position)| NewField {
        name: name.to_string(),
        description: String::new(),
        field_type,
        soil_type,
        area_ha,
        irrigation_capacity,
        notes: String::new(),
        coordinates: position.map(|(lat, lng)| Coordinates { lat, lng }),
        owner_id: String::new(),
    })
    .collect()
}

use agrogest_core::models::{InventoryItem, NewItem};
use chrono::Local;

use crate::cli::{InventoryCommands, ItemArgs, StockArgs};
use crate::commands::common::{
    format_item_lines, format_movement_lines, format_quantity, join_words, resolve_item, short_id,
    Context,
};
use crate::error::CliError;

pub async fn run_inventory(command: InventoryCommands, ctx: &Context) -> Result<(), CliError> {
    let stores = ctx.open_stores().await?;
    let inventory = &stores.inventory;

    match command {
        InventoryCommands::Add(args) => {
            let item = inventory.add(new_item(args)?).await?;
            ctx.emit(&item, || vec![item.id.to_string()])
        }
        InventoryCommands::List {
            category,
            low,
            expiring,
        } => {
            let mut items = match expiring {
                Some(days) => {
                    inventory
                        .expiring_within(days, Local::now().date_naive())
                        .await
                }
                None => inventory.all().await,
            };
            if let Some(category) = category {
                items.retain(|item| item.category == category);
            }
            if low {
                items.retain(InventoryItem::is_low_stock);
            }
            ctx.emit(&items, || format_item_lines(&items))
        }
        InventoryCommands::StockIn(StockArgs {
            id,
            quantity,
            reason,
        }) => {
            let item = resolve_item(&stores, &id).await?;
            let item = inventory.add_stock(&item.id, quantity, &reason).await?;
            print_stock(ctx, &item)
        }
        InventoryCommands::StockOut(StockArgs {
            id,
            quantity,
            reason,
        }) => {
            let item = resolve_item(&stores, &id).await?;
            let item = inventory.remove_stock(&item.id, quantity, &reason).await?;
            print_stock(ctx, &item)
        }
        InventoryCommands::Movements { id } => {
            let item = resolve_item(&stores, &id).await?;
            let movements = inventory.movements_for(&item.id).await;
            ctx.emit(&movements, || format_movement_lines(&item, &movements))
        }
        InventoryCommands::Delete { id } => {
            let item = resolve_item(&stores, &id).await?;
            inventory.remove(&item.id).await?;
            println!("Deleted inventory item {}", short_id(&item.id.as_str()));
            Ok(())
        }
    }
}

pub fn new_item(args: ItemArgs) -> Result<NewItem, CliError> {
    Ok(NewItem {
        name: join_words("item name", &args.name)?,
        category: args.category,
        quantity: args.quantity,
        unit: args.unit,
        unit_price: args.price,
        supplier: args.supplier,
        expiry_date: args.expiry,
        min_stock: args.min_stock,
        owner_id: String::new(),
    })
}

fn print_stock(ctx: &Context, item: &InventoryItem) -> Result<(), CliError> {
    ctx.emit(item, || {
        let mut lines = vec![format!(
            "{}: {} {}",
            item.name,
            format_quantity(item.quantity),
            item.unit
        )];
        if item.is_low_stock() {
            lines.push(format!(
                "Warning: at or below minimum stock of {} {}",
                format_quantity(item.min_stock),
                item.unit
            ));
        }
        lines
    })
}

use agrogest_core::models::{Coordinates, NewField};

use crate::cli::{FieldArgs, FieldCommands};
use crate::commands::common::{format_field_lines, join_words, resolve_field, short_id, Context};
use crate::error::CliError;

pub async fn run_field(command: FieldCommands, ctx: &Context) -> Result<(), CliError> {
    let stores = ctx.open_stores().await?;
    let fields = &stores.fields;

    match command {
        FieldCommands::Add(args) => {
            let field = fields.add(new_field(args)?).await?;
            ctx.emit(&field, || vec![field.id.to_string()])
        }
        FieldCommands::List { all, search } => {
            let mut listed = match search.as_deref() {
                Some(term) => fields.search(term).await,
                None => fields.all().await,
            };
            if !all {
                listed.retain(|field| field.active);
            }
            ctx.emit(&listed, || format_field_lines(&listed))
        }
        FieldCommands::Toggle { id } => {
            let field = resolve_field(&stores, &id).await?;
            let Some(field) = fields.toggle_active(&field.id).await? else {
                return Err(CliError::NotFound {
                    kind: "field",
                    query: id,
                });
            };
            let state = if field.active { "active" } else { "inactive" };
            ctx.emit(&field, || vec![format!("{} is now {state}", field.name)])
        }
        FieldCommands::Delete { id, soft } => {
            let field = resolve_field(&stores, &id).await?;
            let short = short_id(&field.id.as_str());
            if soft {
                fields.deactivate(&field.id).await?;
                println!("Deactivated field {short}");
            } else {
                fields.remove(&field.id).await?;
                println!("Deleted field {short}");
            }
            Ok(())
        }
    }
}

pub fn new_field(args: FieldArgs) -> Result<NewField, CliError> {
    let coordinates = args
        .lat
        .zip(args.lng)
        .map(|(lat, lng)| Coordinates { lat, lng });
    Ok(NewField {
        name: join_words("field name", &args.name)?,
        description: args.description,
        field_type: args.field_type,
        soil_type: args.soil,
        area_ha: args.area,
        irrigation_capacity: args.irrigation,
        notes: args.notes,
        coordinates,
        owner_id: String::new(),
    })
}

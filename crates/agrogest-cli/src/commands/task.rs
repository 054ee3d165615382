use agrogest_core::models::{NewTask, Task, TaskPatch, TaskStatus, TaskType};
use chrono::Local;

use crate::cli::{TaskArgs, TaskCommands};
use crate::commands::common::{format_task_lines, join_words, resolve_task, short_id, Context};
use crate::error::CliError;

pub async fn run_task(command: TaskCommands, ctx: &Context) -> Result<(), CliError> {
    let stores = ctx.open_stores().await?;

    match command {
        TaskCommands::Add(args) => {
            let task = stores.tasks.add(new_task(args)?).await?;
            print_task(ctx, &task)
        }
        TaskCommands::List {
            date,
            today,
            status,
            task_type,
            field,
        } => {
            let date = date.or_else(|| today.then(|| Local::now().date_naive()));
            let tasks = match date {
                Some(date) => stores.tasks.by_date(date).await,
                None => stores.tasks.all().await,
            };
            let filter = TaskFilter {
                status,
                task_type,
                field,
            };
            let tasks = filter.apply(tasks);
            ctx.emit(&tasks, || format_task_lines(&tasks))
        }
        TaskCommands::Status { id, status } => {
            let task = resolve_task(&stores, &id).await?;
            match stores.tasks.set_status(&task.id, status).await? {
                Some(task) => print_task(ctx, &task),
                None => Err(not_found(&id)),
            }
        }
        TaskCommands::Update {
            id,
            title,
            description,
            task_type,
            field,
            date,
            time,
        } => {
            let task = resolve_task(&stores, &id).await?;
            let patch = TaskPatch {
                title,
                description,
                task_type,
                field,
                scheduled_date: date,
                scheduled_time: time,
                status: None,
            };
            match stores.tasks.update(&task.id, patch).await? {
                Some(task) => print_task(ctx, &task),
                None => Err(not_found(&id)),
            }
        }
        TaskCommands::Delete { id } => {
            let task = resolve_task(&stores, &id).await?;
            stores.tasks.remove(&task.id).await?;
            println!("Deleted task {}", short_id(&task.id.as_str()));
            Ok(())
        }
    }
}

/// Narrowing applied after the date selection
#[derive(Debug, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub task_type: Option<TaskType>,
    /// Field label, case-insensitive
    pub field: Option<String>,
}

impl TaskFilter {
    pub fn apply(&self, mut tasks: Vec<Task>) -> Vec<Task> {
        if let Some(status) = self.status {
            tasks.retain(|task| task.status == status);
        }
        if let Some(task_type) = self.task_type {
            tasks.retain(|task| task.task_type == task_type);
        }
        if let Some(field) = self.field.as_deref().map(str::trim) {
            tasks.retain(|task| task.field.eq_ignore_ascii_case(field));
        }
        tasks
    }
}

pub fn new_task(args: TaskArgs) -> Result<NewTask, CliError> {
    Ok(NewTask {
        title: join_words("task title", &args.title)?,
        description: args.description,
        task_type: args.task_type,
        field: args.field,
        scheduled_date: args.date.unwrap_or_else(|| Local::now().date_naive()),
        scheduled_time: args.time,
        status: TaskStatus::Pending,
        owner_id: String::new(),
    })
}

fn print_task(ctx: &Context, task: &Task) -> Result<(), CliError> {
    ctx.emit(task, || vec![task.id.to_string()])
}

fn not_found(query: &str) -> CliError {
    CliError::NotFound {
        kind: "task",
        query: query.to_string(),
    }
}

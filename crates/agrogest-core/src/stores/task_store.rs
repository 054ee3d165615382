use chrono::NaiveDate;

use crate::models::{NewTask, Task, TaskId, TaskPatch, TaskStatus, TaskType};
use crate::services::LocalStore;
use crate::Result;

use super::{resolve_owner, Records, SessionStore};

/// Scheduled field work for the signed-in farm
#[derive(Clone)]
pub struct TaskStore {
    records: Records<Task>,
    session: SessionStore,
}

impl TaskStore {
    pub async fn load(local: LocalStore, session: SessionStore) -> Result<Self> {
        Ok(Self {
            records: Records::load(local).await?,
            session,
        })
    }

    /// Create a task and queue it for the remote.
    pub async fn add(&self, mut new_task: NewTask) -> Result<Task> {
        new_task.owner_id = resolve_owner(new_task.owner_id, &self.session).await;
        let task = self.records.insert(new_task.into_task()?).await?;
        tracing::debug!("Created task {} ({})", task.id, task.title);
        Ok(task)
    }

    /// Merge `patch` into the task. Returns `None` when the id is unknown.
    pub async fn update(&self, id: &TaskId, patch: TaskPatch) -> Result<Option<Task>> {
        self.records
            .modify(&id.as_str(), |task| task.patched(patch))
            .await
    }

    pub async fn set_status(&self, id: &TaskId, status: TaskStatus) -> Result<Option<Task>> {
        self.update(id, TaskPatch::status(status)).await
    }

    /// Delete the task. Returns `false` when the id is unknown.
    pub async fn remove(&self, id: &TaskId) -> Result<bool> {
        self.records.remove(&id.as_str()).await
    }

    pub async fn get(&self, id: &TaskId) -> Option<Task> {
        self.records.find(&id.as_str()).await
    }

    pub async fn all(&self) -> Vec<Task> {
        self.records.snapshot().await
    }

    /// Tasks on a calendar day, earliest time first
    pub async fn by_date(&self, date: NaiveDate) -> Vec<Task> {
        let mut tasks = self.records.filter(|task| task.is_scheduled_on(date)).await;
        tasks.sort_by(|a, b| a.scheduled_time.cmp(&b.scheduled_time));
        tasks
    }

    /// [`Self::by_date`] for the local calendar day
    pub async fn today(&self) -> Vec<Task> {
        self.by_date(chrono::Local::now().date_naive()).await
    }

    pub async fn by_status(&self, status: TaskStatus) -> Vec<Task> {
        self.records.filter(|task| task.status == status).await
    }

    pub async fn by_type(&self, task_type: TaskType) -> Vec<Task> {
        self.records.filter(|task| task.task_type == task_type).await
    }

    pub async fn by_field(&self, field: &str) -> Vec<Task> {
        let field = field.trim();
        self.records
            .filter(|task| task.field.eq_ignore_ascii_case(field))
            .await
    }

    /// Drop every task locally without queueing deletes (sign-out).
    pub async fn clear(&self) -> Result<()> {
        self.records.replace_all(Vec::new()).await
    }

    /// Overwrite the collection with remote data.
    pub async fn replace_all(&self, tasks: Vec<Task>) -> Result<()> {
        self.records.replace_all(tasks).await
    }

    /// Refresh from the remote, keeping tasks that have unsynced changes.
    pub async fn apply_remote(&self, tasks: Vec<Task>, user: &str) -> Result<usize> {
        self.records.apply_remote(tasks, user).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;
    use pretty_assertions::assert_eq;

    async fn setup() -> (LocalStore, TaskStore) {
        let local = LocalStore::open_in_memory().await.unwrap();
        let session = SessionStore::load(local.clone(), false).await.unwrap();
        session
            .set_user(Some(User::new("user-1", "rita@horta.pt", "Rita")))
            .await
            .unwrap();
        let store = TaskStore::load(local.clone(), session).await.unwrap();
        (local, store)
    }

    fn new_task(title: &str, date: NaiveDate, time: &str) -> NewTask {
        NewTask {
            title: title.to_string(),
            description: Some("Linhas 1 a 4".to_string()),
            task_type: TaskType::Irrigation,
            field: "Horta Sul".to_string(),
            scheduled_date: date,
            scheduled_time: time.to_string(),
            status: TaskStatus::Pending,
            owner_id: String::new(),
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, d).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_add_then_get_returns_input_with_generated_fields() {
        let (local, store) = setup().await;
        let input = new_task("Regar tomate", day(10), "07:30");

        let task = store.add(input.clone()).await.unwrap();
        assert_eq!(task.title, input.title);
        assert_eq!(task.description, input.description);
        assert_eq!(task.scheduled_date, input.scheduled_date);
        assert_eq!(task.scheduled_time, "07:30");
        assert_eq!(task.owner_id, "user-1");
        assert_eq!(task.created_at, task.updated_at);

        assert_eq!(store.get(&task.id).await, Some(task.clone()));
        let persisted: Option<Task> = local.get(&task.id.as_str()).await.unwrap();
        assert_eq!(persisted, Some(task));
        assert_eq!(local.pending_count().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_bumps_updated_at() {
        let (local, store) = setup().await;
        let task = store.add(new_task("Colher", day(2), "08:00")).await.unwrap();

        let updated = store
            .set_status(&task.id, TaskStatus::InProgress)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, TaskStatus::InProgress);
        assert!(updated.updated_at > task.updated_at);
        assert_eq!(store.by_status(TaskStatus::InProgress).await, vec![updated]);
        assert_eq!(local.pending_count().await.unwrap(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_missing_ids_are_noops() {
        let (local, store) = setup().await;
        let missing = TaskId::new();

        let patch = TaskPatch::status(TaskStatus::Completed);
        assert_eq!(store.update(&missing, patch).await.unwrap(), None);
        assert!(!store.remove(&missing).await.unwrap());
        assert_eq!(local.pending_count().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_by_date_ignores_time_of_day() {
        let (_, store) = setup().await;
        let evening = store.add(new_task("Tarde", day(5), "18:00")).await.unwrap();
        let morning = store.add(new_task("Manhã", day(5), "06:15")).await.unwrap();
        store.add(new_task("Outro dia", day(6), "06:15")).await.unwrap();

        assert_eq!(store.by_date(day(5)).await, vec![morning, evening]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_day_covers_midnight_to_midnight() {
        let (_, store) = setup().await;
        let late = store.add(new_task("Hoje tarde", day(20), "23:59")).await.unwrap();
        let early = store.add(new_task("Hoje cedo", day(20), "00:00")).await.unwrap();
        let next = store.add(new_task("Amanhã", day(21), "00:00")).await.unwrap();

        assert_eq!(store.by_date(day(20)).await, vec![early, late]);
        assert_eq!(store.by_date(day(21)).await, vec![next]);
        assert!(store.by_date(day(19)).await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_remove_and_reload() {
        let (local, store) = setup().await;
        let keep = store.add(new_task("Fica", day(1), "09:00")).await.unwrap();
        let gone = store.add(new_task("Sai", day(1), "10:00")).await.unwrap();
        assert!(store.remove(&gone.id).await.unwrap());

        let session = SessionStore::load(local.clone(), false).await.unwrap();
        let reloaded = TaskStore::load(local, session).await.unwrap();
        assert_eq!(reloaded.all().await, vec![keep]);
        assert_eq!(reloaded.by_field("horta sul").await.len(), 1);
        assert_eq!(reloaded.by_type(TaskType::Harvest).await.len(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_invalid_task_is_rejected_without_queueing() {
        let (local, store) = setup().await;
        let mut input = new_task("  ", day(1), "09:00");
        assert!(store.add(input.clone()).await.is_err());

        input.title = "Pulverizar".to_string();
        input.scheduled_time = "25:99".to_string();
        assert!(store.add(input).await.is_err());
        assert!(store.all().await.is_empty());
        assert_eq!(local.pending_count().await.unwrap(), 0);
    }
}

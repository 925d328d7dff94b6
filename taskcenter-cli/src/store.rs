//! JSON file storage under the data directory:
//! - tasks.json     `{ version, updated_at, tasks: [..] }`
//! - history.json   `[HistoryEvent, ..]`
//! - metadata.json  free-form project metadata

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

use taskcenter_core::{HistoryEvent, StoreError, Task, TaskStore};

const STORE_VERSION: &str = "1.0";

#[derive(Debug, Serialize, Deserialize)]
struct TasksFile {
    version: String,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    tasks: Vec<Task>,
}

#[derive(Debug, Clone)]
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn tasks_path(&self) -> PathBuf {
        self.dir.join("tasks.json")
    }

    fn history_path(&self) -> PathBuf {
        self.dir.join("history.json")
    }

    fn metadata_path(&self) -> PathBuf {
        self.dir.join("metadata.json")
    }

    pub fn append_history(&self, event: HistoryEvent) -> Result<(), StoreError> {
        let mut history = self.load_history()?;
        history.push(event);
        write_json(&self.history_path(), &history)
    }

    pub fn load_history(&self) -> Result<Vec<HistoryEvent>, StoreError> {
        read_json_or_default(&self.history_path())
    }

    pub fn task_history(&self, task_id: &str) -> Result<Vec<HistoryEvent>, StoreError> {
        Ok(self
            .load_history()?
            .into_iter()
            .filter(|e| e.task_id == task_id)
            .collect())
    }

    /// Stamps `updated_at` and overwrites metadata.json.
    pub fn save_metadata(
        &self,
        mut metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), StoreError> {
        metadata.insert(
            "updated_at".to_string(),
            serde_json::Value::String(Utc::now().to_rfc3339()),
        );
        write_json(&self.metadata_path(), &metadata)
    }

    pub fn load_metadata(&self) -> Result<serde_json::Map<String, serde_json::Value>, StoreError> {
        read_json_or_default(&self.metadata_path())
    }
}

impl TaskStore for JsonStore {
    fn load_all(&self) -> Result<Vec<Task>, StoreError> {
        let p = self.tasks_path();
        if !p.exists() {
            return Ok(Vec::new());
        }
        let file: TasksFile = serde_json::from_str(&fs::read_to_string(&p)?)?;
        if file.version != STORE_VERSION {
            tracing::warn!(version = %file.version, "tasks.json written by a different version");
        }
        Ok(file.tasks)
    }

    fn save_all(&self, tasks: &[Task]) -> Result<(), StoreError> {
        let file = TasksFile {
            version: STORE_VERSION.to_string(),
            updated_at: Utc::now(),
            tasks: tasks.to_vec(),
        };
        write_json(&self.tasks_path(), &file)?;
        tracing::debug!(count = tasks.len(), path = %self.tasks_path().display(), "saved tasks");
        Ok(())
    }
}

fn read_json_or_default<T: DeserializeOwned + Default>(p: &Path) -> Result<T, StoreError> {
    if !p.exists() {
        return Ok(T::default());
    }
    Ok(serde_json::from_str(&fs::read_to_string(p)?)?)
}

/// Write via a sibling temp file + rename so a crash never leaves half a file.
fn write_json<T: Serialize + ?Sized>(p: &Path, value: &T) -> Result<(), StoreError> {
    let tmp = p.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_string_pretty(value)?)?;
    fs::rename(&tmp, p)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskcenter_core::{HistoryAction, Priority, TaskStatus};

    fn store() -> (tempfile::TempDir, JsonStore) {
        let dir = tempfile::tempdir().unwrap();
        let s = JsonStore::open(dir.path().join("data")).unwrap();
        (dir, s)
    }

    #[test]
    fn test_empty_store_loads_nothing() {
        let (_d, s) = store();
        assert!(s.load_all().unwrap().is_empty());
        assert!(s.load_history().unwrap().is_empty());
        assert!(s.load_metadata().unwrap().is_empty());
    }

    #[test]
    fn test_tasks_survive_reopen() {
        let (d, s) = store();
        let t = Task::new("abc-1", "Проверить ФЛК").with_priority(Priority::High);
        s.upsert(t.clone()).unwrap();

        let reopened = JsonStore::open(d.path().join("data")).unwrap();
        let all = reopened.load_all().unwrap();
        assert_eq!(all, vec![t]);

        let raw = fs::read_to_string(reopened.dir().join("tasks.json")).unwrap();
        let v: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(v["version"], STORE_VERSION);
        assert_eq!(v["tasks"][0]["priority"], "high");
    }

    #[test]
    fn test_prefix_lookup_and_delete() {
        let (_d, s) = store();
        s.save_all(&[Task::new("aaa111", "a"), Task::new("aab222", "b")])
            .unwrap();
        assert_eq!(s.find("aaa").unwrap().title, "a");
        assert!(matches!(s.find("aa"), Err(StoreError::Ambiguous { .. })));

        s.delete("aab222").unwrap();
        assert_eq!(s.find("aa").unwrap().id, "aaa111");
    }

    #[test]
    fn test_history_is_appended_per_task() {
        let (_d, s) = store();
        s.append_history(HistoryEvent::field_change(
            "t1",
            HistoryAction::StatusChange,
            "status",
            TaskStatus::New,
            TaskStatus::Done,
        ))
        .unwrap();
        s.append_history(HistoryEvent::new("t2", HistoryAction::Create, serde_json::json!({})))
            .unwrap();

        let h = s.task_history("t1").unwrap();
        assert_eq!(h.len(), 1);
        assert_eq!(h[0].changes["status"]["to"], "done");
        assert_eq!(s.load_history().unwrap().len(), 2);
    }

    #[test]
    fn test_metadata_gets_timestamp() {
        let (_d, s) = store();
        let mut m = serde_json::Map::new();
        m.insert("project".into(), "РЭМД".into());
        s.save_metadata(m).unwrap();
        let back = s.load_metadata().unwrap();
        assert_eq!(back["project"], "РЭМД");
        assert!(back.contains_key("updated_at"));
    }

    #[test]
    fn test_corrupted_file_is_an_error() {
        let (_d, s) = store();
        fs::write(s.dir().join("tasks.json"), "{not json").unwrap();
        assert!(matches!(s.load_all(), Err(StoreError::Json(_))));
    }
}

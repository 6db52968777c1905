use tokio::sync::RwLock;

use crate::analysis::{ParseOutput, RelevancyAssessment, SpamAssessment};
use crate::files::UploadedFile;
use crate::pipeline::task::{ResumeTask, TransitionError};

#[derive(Debug, Default)]
struct Board {
    tasks: Vec<ResumeTask>,
    next_seq: u64,
}

impl Board {
    fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}

/// Owner of every task record.
///
/// Each mutation finds one task by id and applies one transition under the write lock,
/// so concurrent continuations cannot interleave a read-modify-write on the same task.
#[derive(Debug, Default)]
pub struct TaskStore {
    board: RwLock<Board>,
}

impl TaskStore {
    /// Drops the previous batch's records and queues one task per file, in order.
    /// Returns the new task ids.
    pub async fn replace_batch(&self, files: Vec<(String, UploadedFile)>) -> Vec<String> {
        let mut board = self.board.write().await;
        board.tasks.clear();
        let mut ids = Vec::with_capacity(files.len());
        for (id, file) in files {
            let seq = board.take_seq();
            ids.push(id.clone());
            board.tasks.push(ResumeTask::new(id, file, seq));
        }
        ids
    }

    pub async fn begin_parsing(&self, id: &str) -> Result<UploadedFile, TransitionError> {
        self.apply(id, |task, seq| task.begin_parsing(seq)).await
    }

    pub async fn finish_parsing(
        &self,
        id: &str,
        parse: ParseOutput,
    ) -> Result<(), TransitionError> {
        self.apply(id, |task, seq| task.finish_parsing(parse, seq))
            .await
    }

    pub async fn complete(
        &self,
        id: &str,
        spam: SpamAssessment,
        relevancy: RelevancyAssessment,
    ) -> Result<(), TransitionError> {
        self.apply(id, |task, seq| task.complete(spam, relevancy, seq))
            .await
    }

    pub async fn fail(&self, id: &str, message: String) -> Result<(), TransitionError> {
        self.apply(id, |task, seq| task.fail(message, seq)).await
    }

    /// Removes every record with this file name. Returns how many were removed.
    pub async fn remove_by_file_name(&self, file_name: &str) -> usize {
        let mut board = self.board.write().await;
        let before = board.tasks.len();
        board.tasks.retain(|t| t.file_name() != file_name);
        before - board.tasks.len()
    }

    /// Runs `f` over a consistent snapshot of all tasks, in batch order.
    pub async fn read<R>(&self, f: impl FnOnce(&[ResumeTask]) -> R) -> R {
        let board = self.board.read().await;
        f(&board.tasks)
    }

    async fn apply<R>(
        &self,
        id: &str,
        transition: impl FnOnce(&mut ResumeTask, u64) -> Result<R, TransitionError>,
    ) -> Result<R, TransitionError> {
        let mut board = self.board.write().await;
        let seq = board.next_seq;
        let task = board
            .tasks
            .iter_mut()
            .find(|t| t.id() == id)
            .ok_or_else(|| TransitionError::UnknownTask(id.to_string()))?;
        let result = transition(task, seq)?;
        board.next_seq += 1;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::task::TaskStatus;

    fn files(names: &[&str]) -> Vec<(String, UploadedFile)> {
        names
            .iter()
            .map(|n| {
                (
                    format!("{n}-id"),
                    UploadedFile::spool(n, None, b"text").unwrap(),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_replace_batch_queues_in_order() {
        let store = TaskStore::default();
        let ids = store.replace_batch(files(&["a.txt", "b.txt"])).await;
        assert_eq!(ids, vec!["a.txt-id", "b.txt-id"]);

        let statuses = store
            .read(|tasks| {
                tasks
                    .iter()
                    .map(|t| (t.file_name().to_string(), t.status()))
                    .collect::<Vec<_>>()
            })
            .await;
        assert_eq!(
            statuses,
            vec![
                ("a.txt".to_string(), TaskStatus::Queued),
                ("b.txt".to_string(), TaskStatus::Queued)
            ]
        );
    }

    #[tokio::test]
    async fn test_replace_batch_drops_previous_records() {
        let store = TaskStore::default();
        store.replace_batch(files(&["old.txt"])).await;
        store.replace_batch(files(&["new.txt"])).await;
        let names = store
            .read(|tasks| tasks.iter().map(|t| t.file_name().to_string()).collect::<Vec<_>>())
            .await;
        assert_eq!(names, vec!["new.txt"]);
    }

    #[tokio::test]
    async fn test_unknown_task_is_reported() {
        let store = TaskStore::default();
        let err = store.begin_parsing("missing").await.unwrap_err();
        assert_eq!(err, TransitionError::UnknownTask("missing".to_string()));
    }

    #[tokio::test]
    async fn test_sequence_only_advances_on_applied_transitions() {
        let store = TaskStore::default();
        store.replace_batch(files(&["a.txt"])).await;
        store.begin_parsing("a.txt-id").await.unwrap();
        assert!(store.begin_parsing("a.txt-id").await.is_err());
        store.fail("a.txt-id", "boom".to_string()).await.unwrap();

        let seqs = store
            .read(|tasks| tasks[0].history().iter().map(|c| c.seq).collect::<Vec<_>>())
            .await;
        assert_eq!(seqs, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_remove_by_file_name() {
        let store = TaskStore::default();
        store.replace_batch(files(&["a.txt", "b.txt"])).await;
        assert_eq!(store.remove_by_file_name("a.txt").await, 1);
        assert_eq!(store.remove_by_file_name("a.txt").await, 0);
        assert_eq!(store.read(|tasks| tasks.len()).await, 1);
    }
}

use super::client::CollectClient;
use super::controller::Command;
use super::task::TaskEvent;
use super::types::LaunchpadCheck;
use std::collections::HashMap;
use std::sync::mpsc::Sender;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Results flowing back from network work to the UI thread.
#[derive(Debug, Clone, PartialEq)]
pub enum RunnerMessage {
    Launchpad {
        batch: u64,
        result: Result<LaunchpadCheck, String>,
    },
    Task {
        batch: u64,
        index: usize,
        event: TaskEvent,
    },
    Deleted {
        file_id: String,
        result: Result<(), String>,
    },
}

/// Executes controller commands on a tokio runtime.
pub struct TaskRunner {
    handle: Handle,
    client: CollectClient,
    sender: Sender<RunnerMessage>,
    batch: u64,
    batch_token: CancellationToken,
    file_tokens: HashMap<usize, CancellationToken>,
}

impl TaskRunner {
    pub fn new(handle: Handle, client: CollectClient, sender: Sender<RunnerMessage>) -> Self {
        Self {
            handle,
            client,
            sender,
            batch: 0,
            batch_token: CancellationToken::new(),
            file_tokens: HashMap::new(),
        }
    }

    pub fn client(&self) -> &CollectClient {
        &self.client
    }

    /// Swaps the server client. In-flight requests keep the client they started with.
    pub fn set_client(&mut self, client: CollectClient) {
        self.client = client;
    }

    pub fn dispatch_all(&mut self, commands: Vec<Command>) {
        for command in commands {
            self.dispatch(command);
        }
    }

    pub fn dispatch(&mut self, command: Command) {
        match command {
            Command::ResolveLaunchpad {
                batch,
                launchpad_id,
            } => {
                self.begin_batch(batch);
                let client = self.client.clone();
                let sender = self.sender.clone();
                self.handle.spawn(async move {
                    let result = client
                        .check_launchpad(&launchpad_id)
                        .await
                        .map_err(|e| e.to_string());
                    sender
                        .send(RunnerMessage::Launchpad { batch, result })
                        .unwrap_or_default();
                });
            }
            Command::CheckExistence {
                batch,
                index,
                launchpad_id,
                file_name,
            } => {
                let Some(token) = self.file_token(batch, index) else {
                    return;
                };
                let client = self.client.clone();
                let sender = self.sender.clone();
                self.handle.spawn(async move {
                    let event = tokio::select! {
                        _ = token.cancelled() => TaskEvent::Aborted,
                        result = client.file_exists(&launchpad_id, &file_name) => match result {
                            Ok(answer) => TaskEvent::ExistenceChecked(answer),
                            Err(e) => TaskEvent::TransportFailed(e.to_string()),
                        },
                    };
                    sender
                        .send(RunnerMessage::Task { batch, index, event })
                        .unwrap_or_default();
                });
            }
            Command::Upload {
                batch,
                index,
                launchpad_id,
                file,
                directive,
            } => {
                let Some(token) = self.file_token(batch, index) else {
                    return;
                };
                let client = self.client.clone();
                let sender = self.sender.clone();
                let progress_sender = self.sender.clone();
                self.handle.spawn(async move {
                    let on_progress = move |loaded, total| {
                        progress_sender
                            .send(RunnerMessage::Task {
                                batch,
                                index,
                                event: TaskEvent::Progress { loaded, total },
                            })
                            .unwrap_or_default();
                    };
                    let event = tokio::select! {
                        _ = token.cancelled() => TaskEvent::Aborted,
                        result = client.upload(&launchpad_id, &file, directive, on_progress) => match result {
                            Ok(reply) => TaskEvent::Completed(reply),
                            Err(e) => {
                                warn!(file = %file.name, error = %e, "Upload transport failure");
                                TaskEvent::TransportFailed(e.to_string())
                            }
                        },
                    };
                    sender
                        .send(RunnerMessage::Task { batch, index, event })
                        .unwrap_or_default();
                });
            }
            Command::Abort { batch, index } => {
                if batch != self.batch {
                    debug!(batch, index, "Abort for a finished batch");
                    return;
                }
                match self.file_tokens.get(&index) {
                    Some(token) => token.cancel(),
                    None => warn!(index, "Abort for a file with no request in flight"),
                }
            }
            Command::DeleteFile { file_id } => {
                let client = self.client.clone();
                let sender = self.sender.clone();
                self.handle.spawn(async move {
                    let result = client.delete_file(&file_id).await.map_err(|e| e.to_string());
                    sender
                        .send(RunnerMessage::Deleted { file_id, result })
                        .unwrap_or_default();
                });
            }
        }
    }

    fn begin_batch(&mut self, batch: u64) {
        // anything left from an earlier batch is no longer wanted
        self.batch_token.cancel();
        self.batch = batch;
        self.batch_token = CancellationToken::new();
        self.file_tokens.clear();
    }

    fn file_token(&mut self, batch: u64, index: usize) -> Option<CancellationToken> {
        if batch != self.batch {
            debug!(batch, index, "Command for a finished batch");
            return None;
        }
        let parent = &self.batch_token;
        let token = self
            .file_tokens
            .entry(index)
            .or_insert_with(|| parent.child_token());
        // an abort that raced a finished request must not poison the next one
        if token.is_cancelled() && !parent.is_cancelled() {
            *token = parent.child_token();
        }
        Some(token.clone())
    }
}

impl Drop for TaskRunner {
    fn drop(&mut self) {
        self.batch_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::client::test_server::{self, *};
    use crate::upload::controller::{BatchPhase, UploadController};
    use crate::upload::types::{
        ConflictChoice, ConflictDirective, ExistenceAnswer, FileStatus, Notice, NoticeLevel,
        SelectedFile,
    };
    use std::io::Write;
    use std::sync::mpsc::{channel, Receiver};
    use std::time::Duration;

    async fn next_message(receiver: &Receiver<RunnerMessage>) -> RunnerMessage {
        for _ in 0..500 {
            if let Ok(message) = receiver.try_recv() {
                return message;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("no runner message within 5s");
    }

    /// Feeds runner output into the controller until `done` holds.
    async fn pump(
        controller: &mut UploadController,
        runner: &mut TaskRunner,
        receiver: &Receiver<RunnerMessage>,
        done: impl Fn(&UploadController) -> bool,
    ) {
        while !done(controller) {
            let commands = match next_message(receiver).await {
                RunnerMessage::Launchpad { batch, result } => {
                    controller.launchpad_resolved(batch, result)
                }
                RunnerMessage::Task { batch, index, event } => {
                    controller.handle_event(batch, index, event)
                }
                RunnerMessage::Deleted { file_id, result } => {
                    controller.delete_finished(&file_id, result);
                    Vec::new()
                }
            };
            runner.dispatch_all(commands);
        }
    }

    fn write_files(dir: &tempfile::TempDir, names: &[&str]) -> Vec<SelectedFile> {
        names
            .iter()
            .map(|name| {
                let path = dir.path().join(name);
                let mut file = std::fs::File::create(&path).unwrap();
                file.write_all(&vec![b'c'; 128 * 1024]).unwrap();
                SelectedFile::from_path(&path).unwrap()
            })
            .collect()
    }

    async fn setup() -> (TaskRunner, Receiver<RunnerMessage>) {
        let (url, _) = test_server::spawn().await;
        let (sender, receiver) = channel();
        let client = CollectClient::new(&url).unwrap();
        (TaskRunner::new(Handle::current(), client, sender), receiver)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_batch_uploads_every_file() {
        let (mut runner, receiver) = setup().await;
        let dir = tempfile::TempDir::new().unwrap();
        let mut controller = UploadController::new();
        controller.set_selection(write_files(&dir, &["a.tgz", "b.log", "c.tar.gz"]));

        runner.dispatch_all(controller.start_batch(KNOWN_LAUNCHPAD));
        pump(&mut controller, &mut runner, &receiver, |c| {
            c.phase() == BatchPhase::Idle
        })
        .await;

        let successes = controller
            .notices()
            .iter()
            .filter(|n| n.level == NoticeLevel::Success)
            .count();
        assert_eq!(successes, 3);
        assert!(controller.selection().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_unknown_launchpad_surfaces_server_text() {
        let (mut runner, receiver) = setup().await;
        let dir = tempfile::TempDir::new().unwrap();
        let mut controller = UploadController::new();
        controller.set_selection(write_files(&dir, &["a.tgz"]));

        runner.dispatch_all(controller.start_batch("404"));
        pump(&mut controller, &mut runner, &receiver, |c| {
            c.phase() == BatchPhase::Idle
        })
        .await;

        assert_eq!(controller.notices()[0].level, NoticeLevel::Danger);
        assert_eq!(
            controller.notices()[0].message,
            "Error: Launchpad bug id does not exist"
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_conflict_waits_for_choice_then_overwrites() {
        let (mut runner, receiver) = setup().await;
        let dir = tempfile::TempDir::new().unwrap();
        let mut controller = UploadController::new();
        controller.set_selection(write_files(&dir, &[EXISTING_FILE]));

        runner.dispatch_all(controller.start_batch(KNOWN_LAUNCHPAD));
        pump(&mut controller, &mut runner, &receiver, |c| {
            c.rows()
                .first()
                .map(|r| r.status == FileStatus::ConflictPending)
                .unwrap_or(false)
        })
        .await;

        runner.dispatch_all(controller.choose(0, ConflictChoice::Overwrite));
        pump(&mut controller, &mut runner, &receiver, |c| {
            c.phase() == BatchPhase::Idle
        })
        .await;

        assert_eq!(
            controller.notices().last().map(|n| n.message.as_str()),
            Some("file uploaded successfully (conflict=0)")
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_abort_before_existence_answer_cancels_file() {
        let (sender, receiver) = channel();
        // accepts connections but never answers, so only cancellation ends the check
        let silent = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", silent.local_addr().unwrap());
        let client = CollectClient::new(&url).unwrap();
        let mut runner = TaskRunner::new(Handle::current(), client, sender);

        runner.dispatch(Command::ResolveLaunchpad {
            batch: 1,
            launchpad_id: KNOWN_LAUNCHPAD.to_string(),
        });
        runner.dispatch(Command::CheckExistence {
            batch: 1,
            index: 0,
            launchpad_id: KNOWN_LAUNCHPAD.to_string(),
            file_name: "a.tgz".to_string(),
        });
        runner.dispatch(Command::Abort { batch: 1, index: 0 });

        loop {
            match next_message(&receiver).await {
                RunnerMessage::Task { index: 0, event, .. } => {
                    assert_eq!(event, TaskEvent::Aborted);
                    break;
                }
                _ => continue,
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_racing_existence_answer_ends_cancelled() {
        let (mut runner, receiver) = setup().await;
        let dir = tempfile::TempDir::new().unwrap();
        let mut controller = UploadController::new();
        controller.set_selection(write_files(&dir, &[EXISTING_FILE]));

        runner.dispatch_all(controller.start_batch(KNOWN_LAUNCHPAD));
        pump(&mut controller, &mut runner, &receiver, |c| !c.rows().is_empty()).await;

        // the answer is already queued when the user clicks cancel
        let answer = next_message(&receiver).await;
        runner.dispatch_all(controller.cancel_file(0));
        let (batch, index, event) = match answer {
            RunnerMessage::Task { batch, index, event } => (batch, index, event),
            other => panic!("expected a task event, got {:?}", other),
        };
        assert_eq!(event, TaskEvent::ExistenceChecked(ExistenceAnswer::Exists));
        runner.dispatch_all(controller.handle_event(batch, index, event));

        assert_eq!(controller.phase(), BatchPhase::Idle);
        assert_eq!(
            controller.notices(),
            &[Notice::new(
                NoticeLevel::Info,
                format!("Upload cancelled: {}", EXISTING_FILE)
            )]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_abort_after_finished_check_does_not_block_upload() {
        let (mut runner, receiver) = setup().await;
        let dir = tempfile::TempDir::new().unwrap();
        let file = write_files(&dir, &[EXISTING_FILE]).remove(0);

        runner.dispatch(Command::ResolveLaunchpad {
            batch: 1,
            launchpad_id: KNOWN_LAUNCHPAD.to_string(),
        });
        runner.dispatch(Command::CheckExistence {
            batch: 1,
            index: 0,
            launchpad_id: KNOWN_LAUNCHPAD.to_string(),
            file_name: file.name.clone(),
        });
        loop {
            if let RunnerMessage::Task { index: 0, .. } = next_message(&receiver).await {
                break;
            }
        }

        // lands after the check already answered
        runner.dispatch(Command::Abort { batch: 1, index: 0 });
        runner.dispatch(Command::Upload {
            batch: 1,
            index: 0,
            launchpad_id: KNOWN_LAUNCHPAD.to_string(),
            file,
            directive: Some(ConflictDirective::Overwrite),
        });

        loop {
            match next_message(&receiver).await {
                RunnerMessage::Task {
                    event: TaskEvent::Completed(reply),
                    ..
                } => {
                    assert!(reply.is_success());
                    break;
                }
                RunnerMessage::Task {
                    event: TaskEvent::Aborted,
                    ..
                } => panic!("upload reused a cancelled token"),
                _ => continue,
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_commands_for_old_batch_are_dropped() {
        let (mut runner, receiver) = setup().await;
        runner.dispatch(Command::ResolveLaunchpad {
            batch: 2,
            launchpad_id: KNOWN_LAUNCHPAD.to_string(),
        });
        runner.dispatch(Command::CheckExistence {
            batch: 1,
            index: 0,
            launchpad_id: KNOWN_LAUNCHPAD.to_string(),
            file_name: "a.tgz".to_string(),
        });

        // only the launchpad answer arrives
        let message = next_message(&receiver).await;
        assert!(matches!(message, RunnerMessage::Launchpad { batch: 2, .. }));
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_delete_round_trip() {
        let (mut runner, receiver) = setup().await;
        runner.dispatch(Command::DeleteFile {
            file_id: "17".to_string(),
        });
        assert_eq!(
            next_message(&receiver).await,
            RunnerMessage::Deleted {
                file_id: "17".to_string(),
                result: Ok(())
            }
        );
    }
}

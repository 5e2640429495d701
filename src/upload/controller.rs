use super::task::{FileRow, TaskCommand, TaskEvent};
use super::types::{
    ConflictChoice, ConflictDirective, LaunchpadCheck, Notice, NoticeLevel, SelectedFile,
};
use tracing::{debug, info, warn};

pub const EMPTY_SELECTION_TEXT: &str = "Select file or drop it here to upload";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPhase {
    Idle,
    Resolving,
    Running,
}

/// Network work requested by the controller. Every batch-scoped command carries
/// the batch id so late results from a finished batch can be told apart.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    ResolveLaunchpad {
        batch: u64,
        launchpad_id: String,
    },
    CheckExistence {
        batch: u64,
        index: usize,
        launchpad_id: String,
        file_name: String,
    },
    Upload {
        batch: u64,
        index: usize,
        launchpad_id: String,
        file: SelectedFile,
        directive: Option<ConflictDirective>,
    },
    Abort {
        batch: u64,
        index: usize,
    },
    DeleteFile {
        file_id: String,
    },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchTally {
    pub total: usize,
    pub completed: usize,
}

pub struct UploadController {
    selection: Vec<SelectedFile>,
    launchpad_id: String,
    title: Option<String>,
    phase: BatchPhase,
    batch: u64,
    rows: Vec<FileRow>,
    completed: usize,
    notices: Vec<Notice>,
}

impl Default for UploadController {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadController {
    pub fn new() -> Self {
        Self {
            selection: Vec::new(),
            launchpad_id: String::new(),
            title: None,
            phase: BatchPhase::Idle,
            batch: 0,
            rows: Vec::new(),
            completed: 0,
            notices: Vec::new(),
        }
    }

    pub fn phase(&self) -> BatchPhase {
        self.phase
    }

    #[cfg(test)]
    pub fn batch_id(&self) -> u64 {
        self.batch
    }

    /// Picker and launchpad input are locked from resolution until the batch resets.
    pub fn inputs_locked(&self) -> bool {
        self.phase != BatchPhase::Idle
    }

    #[cfg(test)]
    pub fn selection(&self) -> &[SelectedFile] {
        &self.selection
    }

    pub fn selection_label(&self) -> String {
        if self.selection.is_empty() {
            return EMPTY_SELECTION_TEXT.to_string();
        }
        self.selection
            .iter()
            .map(|f| f.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Replaces the selection. Refused while a batch is in progress.
    pub fn set_selection(&mut self, files: Vec<SelectedFile>) -> bool {
        if self.inputs_locked() {
            warn!("Selection change refused while a batch is running");
            return false;
        }
        self.selection = files;
        true
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn launchpad_id(&self) -> &str {
        &self.launchpad_id
    }

    pub fn rows(&self) -> &[FileRow] {
        &self.rows
    }

    pub fn tally(&self) -> BatchTally {
        BatchTally {
            total: self.rows.len(),
            completed: self.completed,
        }
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn dismiss_notice(&mut self, index: usize) {
        if index < self.notices.len() {
            self.notices.remove(index);
        }
    }

    pub fn push_notice(&mut self, notice: Notice) {
        self.notify(notice);
    }

    fn notify(&mut self, notice: Notice) {
        match notice.level {
            NoticeLevel::Danger | NoticeLevel::Warning => warn!("{}", notice.message),
            _ => info!("{}", notice.message),
        }
        self.notices.push(notice);
    }

    pub fn start_batch(&mut self, launchpad_id: &str) -> Vec<Command> {
        if self.phase != BatchPhase::Idle {
            debug!("Batch already in progress");
            return Vec::new();
        }
        if self.selection.is_empty() {
            self.notify(Notice::new(NoticeLevel::Warning, "No file selected"));
            return Vec::new();
        }

        self.notices.clear();
        self.batch += 1;
        self.launchpad_id = launchpad_id.trim().to_string();
        self.phase = BatchPhase::Resolving;
        info!(
            batch = self.batch,
            launchpad_id = %self.launchpad_id,
            files = self.selection.len(),
            "Resolving launchpad"
        );

        vec![Command::ResolveLaunchpad {
            batch: self.batch,
            launchpad_id: self.launchpad_id.clone(),
        }]
    }

    /// Applies the launchpad lookup. `Err` carries a transport failure.
    pub fn launchpad_resolved(
        &mut self,
        batch: u64,
        result: Result<LaunchpadCheck, String>,
    ) -> Vec<Command> {
        if batch != self.batch || self.phase != BatchPhase::Resolving {
            debug!(batch, "Dropping stale launchpad answer");
            return Vec::new();
        }

        let title = match result {
            Ok(LaunchpadCheck::Resolved(title)) => title,
            Ok(LaunchpadCheck::Rejected(body)) => {
                self.phase = BatchPhase::Idle;
                self.notify(Notice::new(NoticeLevel::Danger, body));
                return Vec::new();
            }
            Err(err) => {
                self.phase = BatchPhase::Idle;
                self.notify(Notice::new(NoticeLevel::Danger, err));
                return Vec::new();
            }
        };

        info!(batch, title = %title, "Launchpad resolved");
        self.title = Some(title);
        self.phase = BatchPhase::Running;
        self.completed = 0;
        self.rows = self
            .selection
            .iter()
            .cloned()
            .enumerate()
            .map(|(index, file)| FileRow::new(index, file))
            .collect();

        let mut commands = Vec::with_capacity(self.rows.len());
        for index in 0..self.rows.len() {
            commands.extend(self.apply(index, TaskEvent::Start));
        }
        commands
    }

    /// Feeds a network result for one file into its state machine.
    pub fn handle_event(&mut self, batch: u64, index: usize, event: TaskEvent) -> Vec<Command> {
        if batch != self.batch || self.phase != BatchPhase::Running {
            debug!(batch, index, "Dropping stale task event");
            return Vec::new();
        }
        self.apply(index, event)
    }

    pub fn choose(&mut self, index: usize, choice: ConflictChoice) -> Vec<Command> {
        if self.phase != BatchPhase::Running {
            return Vec::new();
        }
        self.apply(index, TaskEvent::Choice(choice))
    }

    pub fn cancel_file(&mut self, index: usize) -> Vec<Command> {
        if self.phase != BatchPhase::Running {
            return Vec::new();
        }
        self.apply(index, TaskEvent::CancelRequested)
    }

    /// Aborts every file still in flight.
    pub fn cancel_all(&mut self) -> Vec<Command> {
        match self.phase {
            BatchPhase::Idle => Vec::new(),
            BatchPhase::Resolving => {
                info!(batch = self.batch, "Batch cancelled before launchpad resolved");
                self.reset_batch();
                Vec::new()
            }
            BatchPhase::Running => {
                info!(batch = self.batch, "Cancelling batch");
                let mut commands = Vec::new();
                for index in 0..self.rows.len() {
                    if self.phase != BatchPhase::Running {
                        break;
                    }
                    if self.rows[index].is_active() {
                        commands.extend(self.apply(index, TaskEvent::CancelRequested));
                    }
                }
                commands
            }
        }
    }

    /// Restores the idle state and clears the selection. Safe to call repeatedly.
    pub fn reset_batch(&mut self) {
        self.phase = BatchPhase::Idle;
        self.selection.clear();
        self.rows.clear();
        self.completed = 0;
        self.title = None;
    }

    pub fn request_delete(&mut self, file_id: &str) -> Vec<Command> {
        let file_id = file_id.trim();
        if file_id.is_empty() {
            self.notify(Notice::new(NoticeLevel::Warning, "No file id supplied"));
            return Vec::new();
        }
        vec![Command::DeleteFile {
            file_id: file_id.to_string(),
        }]
    }

    pub fn delete_finished(&mut self, file_id: &str, result: Result<(), String>) {
        match result {
            Ok(()) => {
                info!(file_id, "File deleted");
                self.notify(Notice::new(NoticeLevel::Success, "File deleted"));
            }
            Err(err) => self.notify(Notice::new(
                NoticeLevel::Danger,
                format!("Failed to delete file {}: {}", file_id, err),
            )),
        }
    }

    fn apply(&mut self, index: usize, event: TaskEvent) -> Vec<Command> {
        let Some(row) = self.rows.get_mut(index) else {
            warn!(index, "Event for unknown file row");
            return Vec::new();
        };

        let transition = row.dispatch(event);
        let command = transition.command.map(|command| match command {
            TaskCommand::CheckExistence => Command::CheckExistence {
                batch: self.batch,
                index,
                launchpad_id: self.launchpad_id.clone(),
                file_name: row.file.name.clone(),
            },
            TaskCommand::Upload(directive) => Command::Upload {
                batch: self.batch,
                index,
                launchpad_id: self.launchpad_id.clone(),
                file: row.file.clone(),
                directive,
            },
            TaskCommand::Abort => Command::Abort {
                batch: self.batch,
                index,
            },
        });

        if let Some(notice) = transition.notice {
            self.notify(notice);
        }

        if transition.terminal {
            self.completed += 1;
            debug!(
                batch = self.batch,
                completed = self.completed,
                total = self.rows.len(),
                "File finished"
            );
            if self.completed == self.rows.len() {
                info!(batch = self.batch, "Batch complete");
                self.reset_batch();
            }
        }

        command.into_iter().collect()
    }
}

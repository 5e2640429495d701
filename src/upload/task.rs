//! Per-file upload state machine.
//!
//! A [`FileRow`] owns everything the UI shows for one file. Network results and
//! button clicks are fed in as [`TaskEvent`]s through [`FileRow::dispatch`], which
//! mutates only that row and reports the follow-up work as a [`TaskCommand`].

use super::types::{
    ConflictChoice, ConflictDirective, ExistenceAnswer, FileStatus, Notice, NoticeLevel,
    SelectedFile, UploadReply,
};
use tracing::debug;

pub const INITIALIZING_TEXT: &str = "Initializing upload...";
pub const INVALID_FILE_TEXT: &str = "Error: you did not supply a valid file in your request";

#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    /// Batch resolved its launchpad; begin the existence check.
    Start,
    ExistenceChecked(ExistenceAnswer),
    Choice(ConflictChoice),
    Progress { loaded: u64, total: u64 },
    Completed(UploadReply),
    TransportFailed(String),
    /// Per-file cancel button or batch-level cancel.
    CancelRequested,
    /// The in-flight request was dropped after a cancel.
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskCommand {
    CheckExistence,
    Upload(Option<ConflictDirective>),
    Abort,
}

/// Outcome of a single dispatch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transition {
    pub command: Option<TaskCommand>,
    pub notice: Option<Notice>,
    /// Set only on the dispatch that moved the row into a terminal state.
    pub terminal: bool,
}

impl Transition {
    fn command(command: TaskCommand) -> Self {
        Self {
            command: Some(command),
            ..Self::default()
        }
    }
}

/// Which buttons are visible on a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowControls {
    pub cancel: bool,
    pub ignore: bool,
    pub overwrite: bool,
    pub rename: bool,
}

impl RowControls {
    fn transfer() -> Self {
        Self {
            cancel: true,
            ignore: false,
            overwrite: false,
            rename: false,
        }
    }

    fn conflict() -> Self {
        Self {
            cancel: false,
            ignore: true,
            overwrite: true,
            rename: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileRow {
    pub index: usize,
    pub file: SelectedFile,
    pub status: FileStatus,
    pub progress: f32,
    pub status_text: String,
    pub highlighted: bool,
    pub controls: RowControls,
    pub hidden: bool,
    /// Cancel was requested while a request was in flight and no `Aborted` came back yet.
    abort_pending: bool,
}

impl FileRow {
    pub fn new(index: usize, file: SelectedFile) -> Self {
        Self {
            index,
            file,
            status: FileStatus::Initializing,
            progress: 0.0,
            status_text: INITIALIZING_TEXT.to_string(),
            highlighted: false,
            controls: RowControls::transfer(),
            hidden: false,
            abort_pending: false,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    pub fn dispatch(&mut self, event: TaskEvent) -> Transition {
        if self.status.is_terminal() {
            debug!(index = self.index, ?event, "Ignoring event for finished file");
            return Transition::default();
        }

        match (self.status, event) {
            (FileStatus::Initializing, TaskEvent::Start) => {
                self.status = FileStatus::Checking;
                Transition::command(TaskCommand::CheckExistence)
            }
            (FileStatus::Initializing, TaskEvent::CancelRequested) => {
                self.cancelled()
            }

            // the check answered before the abort landed
            (FileStatus::Checking, TaskEvent::ExistenceChecked(_)) if self.abort_pending => {
                self.cancelled()
            }
            (FileStatus::Checking, TaskEvent::ExistenceChecked(answer)) => match answer {
                ExistenceAnswer::Absent => {
                    self.status = FileStatus::Uploading;
                    Transition::command(TaskCommand::Upload(None))
                }
                ExistenceAnswer::Exists => {
                    self.status = FileStatus::ConflictPending;
                    self.status_text = format!("File already exists: {}", self.file.name);
                    self.highlighted = true;
                    self.controls = RowControls::conflict();
                    Transition::default()
                }
                ExistenceAnswer::Invalid(body) => {
                    debug!(index = self.index, body = %body, "Unexpected existence answer");
                    self.finish(
                        FileStatus::DoneError,
                        Notice::new(NoticeLevel::Warning, INVALID_FILE_TEXT),
                    )
                }
            },

            (FileStatus::ConflictPending, TaskEvent::Choice(choice)) => match choice {
                ConflictChoice::Ignore => self.cancelled(),
                ConflictChoice::Overwrite => self.resume(ConflictDirective::Overwrite),
                ConflictChoice::Rename => self.resume(ConflictDirective::Rename),
            },
            // Nothing is in flight while waiting on the user.
            (FileStatus::ConflictPending, TaskEvent::CancelRequested) => self.cancelled(),

            (FileStatus::Uploading, TaskEvent::Progress { loaded, total }) => {
                self.record_progress(loaded, total);
                Transition::default()
            }
            (FileStatus::Uploading, TaskEvent::Completed(reply)) => {
                self.progress = 1.0;
                if reply.is_success() {
                    self.finish(
                        FileStatus::DoneSuccess,
                        Notice::new(NoticeLevel::Success, reply.message),
                    )
                } else {
                    self.finish(
                        FileStatus::DoneError,
                        Notice::new(NoticeLevel::Danger, reply.message),
                    )
                }
            }

            (FileStatus::Checking | FileStatus::Uploading, TaskEvent::TransportFailed(err)) => {
                debug!(index = self.index, error = %err, "Transfer failed");
                let notice = Notice::new(
                    NoticeLevel::Warning,
                    format!("Error uploading file: {}", self.file.name),
                );
                self.finish(FileStatus::DoneError, notice)
            }
            (FileStatus::Checking | FileStatus::Uploading, TaskEvent::CancelRequested) => {
                self.abort_pending = true;
                Transition::command(TaskCommand::Abort)
            }
            (FileStatus::Checking | FileStatus::Uploading, TaskEvent::Aborted) => self.cancelled(),

            (status, event) => {
                debug!(index = self.index, ?status, ?event, "Event not applicable");
                Transition::default()
            }
        }
    }

    fn resume(&mut self, directive: ConflictDirective) -> Transition {
        self.status = FileStatus::Uploading;
        self.highlighted = false;
        self.controls = RowControls::transfer();
        Transition::command(TaskCommand::Upload(Some(directive)))
    }

    fn record_progress(&mut self, loaded: u64, total: u64) {
        let fraction = if total == 0 {
            1.0
        } else {
            (loaded.min(total) as f64 / total as f64) as f32
        };
        if fraction < self.progress {
            return;
        }
        self.progress = fraction;

        if total > 0 && loaded >= total {
            self.status_text = format!("Saving file: {}", self.file.name);
        } else {
            let percent = (fraction * 100.0).floor() as u32;
            self.status_text = format!("{}% uploaded: {}", percent, self.file.name);
        }
    }

    fn cancelled(&mut self) -> Transition {
        self.abort_pending = false;
        self.highlighted = false;
        self.controls = RowControls::transfer();
        let notice = Notice::new(
            NoticeLevel::Info,
            format!("Upload cancelled: {}", self.file.name),
        );
        self.finish(FileStatus::DoneCancelled, notice)
    }

    fn finish(&mut self, status: FileStatus, notice: Notice) -> Transition {
        self.status = status;
        self.hidden = true;
        Transition {
            command: None,
            notice: Some(notice),
            terminal: true,
        }
    }
}

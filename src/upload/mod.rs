mod client;
mod controller;
mod runner;
mod task;
mod types;

pub use client::CollectClient;
pub use controller::{BatchPhase, Command, UploadController};
pub use runner::{RunnerMessage, TaskRunner};
pub use task::FileRow;
pub use types::{ConflictChoice, FileStatus, Notice, NoticeLevel, SelectedFile};

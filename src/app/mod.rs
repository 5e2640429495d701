mod state;
mod ui;

use crate::config::{self, AppConfig};
use crate::error::UploaderError;
use crate::upload::{
    CollectClient, Command, ConflictChoice, Notice, NoticeLevel, RunnerMessage, SelectedFile,
    TaskRunner, UploadController,
};
use eframe::{egui, App};
pub use state::{BatchSummary, UiState};
use std::path::PathBuf;
use std::sync::mpsc::{self as std_mpsc, Receiver};
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{info, warn};

const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(250);

pub struct LaunchpadUploader {
    config: AppConfig,
    controller: UploadController,
    runner: TaskRunner,
    receiver: Receiver<RunnerMessage>,
    state: UiState,
    // declared last so the runner's tasks are cancelled before the runtime shuts down
    _runtime: Runtime,
}

impl LaunchpadUploader {
    pub fn new(config: AppConfig) -> Result<Self, UploaderError> {
        info!(server_url = %config.server_url, "Initializing launchpad uploader");
        let runtime = Runtime::new()?;
        let client = CollectClient::new(&config.server_url)?;
        let (sender, receiver) = std_mpsc::channel();
        let runner = TaskRunner::new(runtime.handle().clone(), client, sender);

        let state = UiState {
            server_input: config.server_url.clone(),
            ..UiState::default()
        };

        Ok(Self {
            config,
            controller: UploadController::new(),
            runner,
            receiver,
            state,
            _runtime: runtime,
        })
    }

    fn dispatch(&mut self, commands: Vec<Command>) {
        self.runner.dispatch_all(commands);
    }

    pub fn select_paths(&mut self, paths: Vec<PathBuf>) {
        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            match SelectedFile::from_path(&path) {
                Ok(file) => files.push(file),
                Err(e) => warn!(path = %path.display(), "Skipping selection: {}", e),
            }
        }
        if files.is_empty() {
            return;
        }
        info!(count = files.len(), "Files selected");
        self.controller.set_selection(files);
    }

    pub fn start_upload(&mut self) {
        if let Err(e) = self.apply_server_url() {
            warn!("{}", e);
            self.controller
                .push_notice(Notice::new(NoticeLevel::Danger, e.to_string()));
            return;
        }
        let launchpad_id = self.state.launchpad_input.clone();
        let commands = self.controller.start_batch(&launchpad_id);
        self.dispatch(commands);
    }

    /// Rebuilds the client when the server field was edited, and persists the change.
    fn apply_server_url(&mut self) -> Result<(), UploaderError> {
        let url = self.state.server_input.trim().to_string();
        if url == self.config.server_url {
            return Ok(());
        }
        let client = CollectClient::new(&url)?;
        self.runner.set_client(client);
        self.config.server_url = url;
        config::persist(&self.config);
        Ok(())
    }

    pub fn cancel_all(&mut self) {
        let commands = self.controller.cancel_all();
        self.dispatch(commands);
    }

    pub fn cancel_file(&mut self, index: usize) {
        let commands = self.controller.cancel_file(index);
        self.dispatch(commands);
    }

    pub fn resolve_conflict(&mut self, index: usize, choice: ConflictChoice) {
        let commands = self.controller.choose(index, choice);
        self.dispatch(commands);
    }

    pub fn confirm_delete(&mut self) {
        if let Some(file_id) = self.state.pending_delete.take() {
            let commands = self.controller.request_delete(&file_id);
            self.dispatch(commands);
            self.state.delete_input.clear();
        }
    }

    pub fn open_launchpad_page(&self) {
        let launchpad_id = self.controller.launchpad_id();
        match self.runner.client().launchpad_page(launchpad_id) {
            Ok(url) => {
                if let Err(e) = open::that(url.as_str()) {
                    warn!("Failed to open {}: {}", url, e);
                }
            }
            Err(e) => warn!("{}", e),
        }
    }

    pub fn update_state(&mut self, ctx: &egui::Context) {
        let dropped: Vec<PathBuf> = ctx.input(|i| {
            i.raw
                .dropped_files
                .iter()
                .filter_map(|f| f.path.clone())
                .collect()
        });
        if !dropped.is_empty() && !self.controller.inputs_locked() {
            self.select_paths(dropped);
        }

        let mut had_updates = false;
        while let Ok(message) = self.receiver.try_recv() {
            had_updates = true;
            let commands = match message {
                RunnerMessage::Launchpad { batch, result } => {
                    self.controller.launchpad_resolved(batch, result)
                }
                RunnerMessage::Task {
                    batch,
                    index,
                    event,
                } => self.controller.handle_event(batch, index, event),
                RunnerMessage::Deleted { file_id, result } => {
                    self.controller.delete_finished(&file_id, result);
                    Vec::new()
                }
            };
            self.dispatch(commands);
        }

        // keep polling the channel while work is in flight
        if had_updates || self.controller.inputs_locked() {
            ctx.request_repaint();
        } else {
            ctx.request_repaint_after(IDLE_POLL_INTERVAL);
        }
    }
}

impl App for LaunchpadUploader {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.update_state(ctx);
        self.render(ctx);
    }
}

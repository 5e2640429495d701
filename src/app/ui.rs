use super::{BatchSummary, LaunchpadUploader};
use crate::upload::{BatchPhase, ConflictChoice, FileRow, Notice};
use crate::utils::color::notice_color;
use crate::utils::file_size::format_size;
use eframe::egui::{self, Align, Color32, RichText};
use rfd::FileDialog;

const ACCENT: Color32 = Color32::from_rgb(0, 123, 255);
const HIGHLIGHT: Color32 = Color32::from_rgb(220, 53, 69);

/// Clicks collected while drawing, applied once the frame is laid out.
enum UiAction {
    SelectFiles,
    Upload,
    CancelAll,
    CancelFile(usize),
    Resolve(usize, ConflictChoice),
    OpenLaunchpad,
    DismissNotice(usize),
    AskDelete,
    ConfirmDelete,
    AbandonDelete,
}

impl LaunchpadUploader {
    pub fn render(&mut self, ctx: &egui::Context) {
        let mut actions = Vec::new();

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.add_space(20.0);
                ui.vertical_centered(|ui| {
                    ui.heading("Launchpad File Uploader");
                    ui.add_space(5.0);
                    ui.label(
                        RichText::new("Upload collected files to a launchpad")
                            .color(ui.visuals().text_color().gamma_multiply(0.7)),
                    );
                });

                ui.add_space(20.0);
                self.render_inputs(ui, &mut actions);

                ui.add_space(20.0);
                self.render_controls(ui, &mut actions);

                if !self.controller.notices().is_empty() {
                    ui.add_space(10.0);
                    render_notices(ui, self.controller.notices(), &mut actions);
                }

                if !self.controller.rows().is_empty() {
                    ui.add_space(10.0);
                    self.render_batch(ui, &mut actions);
                }

                ui.add_space(20.0);
                self.render_delete(ui, &mut actions);
                ui.add_space(20.0);
            });
        });

        self.render_delete_dialog(ctx, &mut actions);

        for action in actions {
            self.apply(action);
        }
    }

    fn apply(&mut self, action: UiAction) {
        match action {
            UiAction::SelectFiles => {
                if let Some(paths) = FileDialog::new().pick_files() {
                    self.select_paths(paths);
                }
            }
            UiAction::Upload => self.start_upload(),
            UiAction::CancelAll => self.cancel_all(),
            UiAction::CancelFile(index) => self.cancel_file(index),
            UiAction::Resolve(index, choice) => self.resolve_conflict(index, choice),
            UiAction::OpenLaunchpad => self.open_launchpad_page(),
            UiAction::DismissNotice(index) => self.controller.dismiss_notice(index),
            UiAction::AskDelete => {
                let file_id = self.state.delete_input.trim().to_string();
                self.state.pending_delete = Some(file_id);
            }
            UiAction::ConfirmDelete => self.confirm_delete(),
            UiAction::AbandonDelete => self.state.pending_delete = None,
        }
    }

    fn render_inputs(&mut self, ui: &mut egui::Ui, actions: &mut Vec<UiAction>) {
        let locked = self.controller.inputs_locked();

        ui.group(|ui| {
            egui::Grid::new("inputs")
                .num_columns(2)
                .spacing([8.0, 8.0])
                .show(ui, |ui| {
                    ui.label("Server");
                    ui.add_enabled(
                        !locked,
                        egui::TextEdit::singleline(&mut self.state.server_input)
                            .desired_width(ui.available_width())
                            .hint_text("http://127.0.0.1:5000"),
                    );
                    ui.end_row();

                    ui.label("Launchpad id");
                    ui.horizontal(|ui| {
                        ui.add_enabled(
                            !locked,
                            egui::TextEdit::singleline(&mut self.state.launchpad_input)
                                .desired_width(160.0),
                        );
                        ui.label("ℹ").on_hover_text_at_pointer(
                            "The numeric id shown on the launchpad's bug page",
                        );
                    });
                    ui.end_row();
                });

            ui.add_space(8.0);
            ui.horizontal(|ui| {
                if ui
                    .add_enabled(!locked, egui::Button::new("📁 Select Files"))
                    .clicked()
                {
                    actions.push(UiAction::SelectFiles);
                }
                ui.label(self.controller.selection_label());
            });
        });
    }

    fn render_controls(&self, ui: &mut egui::Ui, actions: &mut Vec<UiAction>) {
        ui.vertical_centered(|ui| match self.controller.phase() {
            BatchPhase::Idle => {
                let button =
                    egui::Button::new("📤 Upload Files").min_size(egui::vec2(200.0, 40.0));
                if ui.add(button).clicked() {
                    actions.push(UiAction::Upload);
                }
            }
            BatchPhase::Resolving => {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label("Checking launchpad...");
                    if ui.button("⏹ Cancel").clicked() {
                        actions.push(UiAction::CancelAll);
                    }
                });
            }
            BatchPhase::Running => {
                let tally = self.controller.tally();
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label(format!("Uploading... {}/{}", tally.completed, tally.total));
                    if ui.button("⏹ Cancel all").clicked() {
                        actions.push(UiAction::CancelAll);
                    }
                });
            }
        });
    }

    fn render_batch(&self, ui: &mut egui::Ui, actions: &mut Vec<UiAction>) {
        ui.group(|ui| {
            if let Some(title) = self.controller.title() {
                ui.horizontal(|ui| {
                    ui.label("Launchpad title: ");
                    let link = egui::Label::new(RichText::new(title).color(ACCENT).underline())
                        .sense(egui::Sense::click());
                    if ui
                        .add(link)
                        .on_hover_text("open launchpad page")
                        .clicked()
                    {
                        actions.push(UiAction::OpenLaunchpad);
                    }
                });
                ui.add_space(5.0);
            }

            let summary = BatchSummary::from_rows(self.controller.rows());
            let progress_bar = egui::ProgressBar::new(summary.progress_percentage())
                .show_percentage()
                .animate(false)
                .fill(ACCENT);
            ui.add(progress_bar);
            ui.label(summary.status_text());

            ui.add_space(8.0);
            egui::Frame::none()
                .fill(ui.style().visuals.extreme_bg_color)
                .inner_margin(8.0)
                .show(ui, |ui| {
                    for row in self.controller.rows().iter().filter(|r| !r.hidden) {
                        render_row(ui, row, actions);
                        ui.add_space(6.0);
                    }
                });
        });
    }

    fn render_delete(&mut self, ui: &mut egui::Ui, actions: &mut Vec<UiAction>) {
        ui.group(|ui| {
            ui.label("Delete an uploaded file");
            ui.horizontal(|ui| {
                ui.add(
                    egui::TextEdit::singleline(&mut self.state.delete_input)
                        .desired_width(160.0)
                        .hint_text("file id"),
                );
                if ui.button("🗑 Delete").clicked() {
                    actions.push(UiAction::AskDelete);
                }
            });
        });
    }

    fn render_delete_dialog(&self, ctx: &egui::Context, actions: &mut Vec<UiAction>) {
        let Some(file_id) = &self.state.pending_delete else {
            return;
        };

        egui::Window::new("Delete file")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label("Are you sure you want to delete this file?");
                ui.label(RichText::new(file_id).monospace());
                ui.add_space(8.0);
                ui.horizontal(|ui| {
                    if ui.button("Delete").clicked() {
                        actions.push(UiAction::ConfirmDelete);
                    }
                    if ui.button("Cancel").clicked() {
                        actions.push(UiAction::AbandonDelete);
                    }
                });
            });
    }
}

fn render_row(ui: &mut egui::Ui, row: &FileRow, actions: &mut Vec<UiAction>) {
    ui.horizontal(|ui| {
        let text = RichText::new(&row.status_text);
        if row.highlighted {
            ui.label(text.color(HIGHLIGHT));
        } else {
            ui.label(text);
        }

        ui.with_layout(egui::Layout::right_to_left(Align::Center), |ui| {
            ui.label(
                RichText::new(format_size(row.file.size))
                    .color(ui.visuals().text_color().gamma_multiply(0.7)),
            );
            // right_to_left: added in reverse of reading order
            if row.controls.rename && ui.button("Rename").clicked() {
                actions.push(UiAction::Resolve(row.index, ConflictChoice::Rename));
            }
            if row.controls.overwrite && ui.button("Overwrite").clicked() {
                actions.push(UiAction::Resolve(row.index, ConflictChoice::Overwrite));
            }
            if row.controls.ignore && ui.button("Cancel").clicked() {
                actions.push(UiAction::Resolve(row.index, ConflictChoice::Ignore));
            }
            if row.controls.cancel && ui.button("Cancel").clicked() {
                actions.push(UiAction::CancelFile(row.index));
            }
        });
    });

    let bar = egui::ProgressBar::new(row.progress)
        .desired_width(ui.available_width())
        .animate(false);
    ui.add(bar);
}

fn render_notices(ui: &mut egui::Ui, notices: &[Notice], actions: &mut Vec<UiAction>) {
    for (index, notice) in notices.iter().enumerate() {
        let color = notice_color(notice.level);
        egui::Frame::none()
            .stroke(egui::Stroke::new(1.0, color))
            .rounding(4.0)
            .inner_margin(6.0)
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    ui.colored_label(color, &notice.message);
                    ui.with_layout(egui::Layout::right_to_left(Align::Center), |ui| {
                        if ui.small_button("×").clicked() {
                            actions.push(UiAction::DismissNotice(index));
                        }
                    });
                });
            });
        ui.add_space(4.0);
    }
}

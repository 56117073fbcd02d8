use super::{BlurUploader, StatusKind};
use crate::utils::color::{ColorExt, ERROR_HEX, LINK_HEX, NEUTRAL_HEX, SUCCESS_HEX};
use crate::utils::duration::format_duration;
use crate::utils::file_size::FileSizeUtils;
use eframe::egui::{self, Align, Color32, RichText, Sense, Stroke};

fn status_color(kind: StatusKind) -> Color32 {
    match kind {
        StatusKind::Error => Color32::hex_or(ERROR_HEX, Color32::RED),
        StatusKind::Success => Color32::hex_or(SUCCESS_HEX, Color32::GREEN),
        StatusKind::Neutral | StatusKind::Processing => {
            Color32::hex_or(NEUTRAL_HEX, Color32::GRAY)
        }
    }
}

impl BlurUploader {
    pub fn render(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let total_height = ui.available_height();
            let footer_height = 40.0;
            let footer_margin = 15.0;
            let content_height = total_height - footer_height - footer_margin;

            egui::ScrollArea::vertical()
                .max_height(content_height)
                .show(ui, |ui| {
                    ui.add_space(20.0);
                    ui.vertical_centered(|ui| {
                        ui.heading("Video Blur");
                        ui.add_space(8.0);
                        ui.label(
                            RichText::new("Upload a video and download a blurred copy")
                                .color(ui.visuals().text_color().gamma_multiply(0.7)),
                        );
                    });

                    ui.add_space(20.0);

                    if self.state.visibility().drop_zone() {
                        self.render_drop_zone(ctx, ui);
                    } else {
                        self.render_preview(ui);
                    }

                    ui.add_space(20.0);

                    if self.state.visibility().progress_bar {
                        self.render_progress(ui);
                        ui.add_space(10.0);
                    }

                    self.render_status(ctx, ui);

                    if !self.state.phase().is_active() && !self.state.status().message.is_empty() {
                        ui.add_space(10.0);
                        ui.vertical_centered(|ui| {
                            if ui.button("🗑 Start Over").clicked() {
                                self.state.reset();
                            }
                        });
                    }

                    ui.add_space(20.0);
                });

            ui.with_layout(egui::Layout::bottom_up(Align::Center), |ui| {
                ui.add_space(footer_margin);
                self.render_footer(ui);
            });
        });
    }

    fn render_drop_zone(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        let accent = Color32::hex_or(LINK_HEX, Color32::LIGHT_BLUE);
        let stroke = if self.drop_hover {
            Stroke::new(2.0, accent)
        } else {
            Stroke::new(1.0, ui.visuals().widgets.noninteractive.bg_stroke.color)
        };

        let zone = egui::Frame::none()
            .stroke(stroke)
            .rounding(8.0)
            .inner_margin(egui::Margin::symmetric(16.0, 32.0))
            .show(ui, |ui| {
                ui.set_width(ui.available_width());
                ui.vertical_centered(|ui| {
                    ui.label(RichText::new("🎬").size(32.0));
                    ui.add_space(6.0);
                    ui.label("Drag & drop a video here, or click to browse");
                });
            })
            .response
            .interact(Sense::click());

        let mut browse = zone.clicked();

        ui.add_space(10.0);
        ui.vertical_centered(|ui| {
            let button = egui::Button::new("📁 Select Video").min_size(egui::vec2(200.0, 40.0));
            if ui.add(button).clicked() {
                browse = true;
            }
        });

        if browse {
            self.open_file_dialog(ctx);
        }
    }

    fn render_preview(&self, ui: &mut egui::Ui) {
        let Some(preview) = self.state.preview() else {
            return;
        };
        let can_play = preview.local_path().is_some();
        let checkmark = self.state.visibility().checkmark;
        let mut play = false;

        ui.group(|ui| {
            ui.set_width(ui.available_width());
            ui.horizontal(|ui| {
                ui.label(RichText::new("🎞").size(28.0));
                ui.vertical(|ui| {
                    ui.strong(&preview.name);
                    ui.label(
                        RichText::new(format!(
                            "{} · {}",
                            FileSizeUtils::format_size(preview.size),
                            preview.mime
                        ))
                        .color(ui.visuals().text_color().gamma_multiply(0.7)),
                    );
                });
                if checkmark {
                    ui.with_layout(egui::Layout::right_to_left(Align::Center), |ui| {
                        ui.label(
                            RichText::new("✔")
                                .size(28.0)
                                .color(status_color(StatusKind::Success)),
                        );
                    });
                }
            });

            ui.add_space(6.0);
            ui.add_enabled_ui(can_play, |ui| {
                if ui
                    .button("▶ Play locally")
                    .on_disabled_hover_text("Dropped without a path on disk")
                    .clicked()
                {
                    play = true;
                }
            });
        });

        if play {
            self.play_preview();
        }
    }

    fn render_progress(&self, ui: &mut egui::Ui) {
        let progress = self.state.progress();
        ui.group(|ui| {
            ui.label(&progress.label);

            let bar = egui::ProgressBar::new(progress.percent / 100.0)
                .text(format!("{:.0}%", progress.percent))
                .animate(false)
                .fill(Color32::hex_or(LINK_HEX, Color32::LIGHT_BLUE));
            ui.add(bar);

            if let Some(remaining) = progress.remaining {
                ui.label(
                    RichText::new(format!("About {} remaining", format_duration(remaining)))
                        .color(status_color(StatusKind::Neutral)),
                );
            }
        });
    }

    fn render_status(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        let status = self.state.status().clone();
        if status.message.is_empty() && status.notice.is_none() {
            return;
        }

        let mut clicked_link = None;
        ui.vertical_centered(|ui| {
            if !status.message.is_empty() {
                ui.colored_label(status_color(status.kind), &status.message);
            }

            if let Some(link) = &status.link {
                ui.add_space(12.0);
                let text = RichText::new(&link.label)
                    .color(Color32::hex_or(LINK_HEX, Color32::LIGHT_BLUE));
                if ui
                    .add(egui::Link::new(text))
                    .on_hover_text(&link.href)
                    .clicked()
                {
                    clicked_link = Some(link.clone());
                }
            }

            if let Some(notice) = &status.notice {
                ui.add_space(6.0);
                ui.colored_label(status_color(notice.kind), &notice.message);
            }
        });

        if let Some(link) = clicked_link {
            self.start_download(ctx, &link);
        }
    }

    fn render_footer(&self, ui: &mut egui::Ui) {
        let footer_width = 320.0;
        let indent = ((ui.available_width() - footer_width) / 2.0).max(0.0);

        ui.horizontal(|ui| {
            ui.add_space(indent);
            ui.scope(|ui| {
                ui.set_width(footer_width);
                ui.horizontal_centered(|ui| {
                    ui.label("Processing server:");
                    if ui
                        .add(
                            egui::Label::new(
                                RichText::new(&self.server_url)
                                    .color(Color32::hex_or(LINK_HEX, Color32::LIGHT_BLUE)),
                            )
                            .sense(Sense::click()),
                        )
                        .clicked()
                    {
                        let _ = open::that(&self.server_url);
                    }
                });
            });
        });
    }
}

use anyhow::Result;
use chrono::Local;
use eframe::egui;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;

use crate::core::{
    db::{TagDatabase, TagRecord},
    poller::{spawn_reader_thread, PollerConfig, ReaderEvent, POLL_INTERVAL},
    tags::TagRead,
};

#[derive(Default, Clone, Copy, PartialEq)]
enum TagTab {
    #[default]
    NewTags,
    ExistingTags,
}

pub struct RfidReaderApp {
    // Reader event channel
    rx: Receiver<ReaderEvent>,

    // Storage (GUI holds its own connection)
    db: TagDatabase,

    // Reader state
    status_message: String,
    tag_count: u64,
    latest: Option<TagRead>,

    // Tag tables
    session_tags: Vec<TagRecord>,
    known_tags: Vec<TagRecord>,
    active_tab: TagTab,

    // UI state
    confirm_clear: bool,
    error_message: String,
}

fn record_from_read(read: &TagRead) -> TagRecord {
    let timestamp = read.timestamp_string();
    TagRecord {
        tag_id: read.tag_id.clone(),
        first_seen: timestamp.clone(),
        last_seen: timestamp,
        rssi: read.rssi,
        rssi_percent: read.rssi_percent,
        antenna: read.antenna,
        reader_id: read.reader_id.clone(),
    }
}

impl RfidReaderApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        rx: Receiver<ReaderEvent>,
        db: TagDatabase,
    ) -> Self {
        let _ctx = &cc.egui_ctx;
        Self::from_parts(rx, db)
    }

    /// Build the app without an eframe context, used by tests
    pub fn from_parts(rx: Receiver<ReaderEvent>, db: TagDatabase) -> Self {
        let mut app = Self {
            rx,
            db,
            status_message: "Waiting for tags...".to_string(),
            tag_count: 0,
            latest: None,
            session_tags: Vec::new(),
            known_tags: Vec::new(),
            active_tab: TagTab::default(),
            confirm_clear: false,
            error_message: String::new(),
        };
        app.reload_known_tags();
        app
    }

    /// Load historical tags and the stored tag count from the database
    pub fn reload_known_tags(&mut self) {
        match self.db.all_tags() {
            Ok(tags) => {
                self.known_tags = tags;
                self.error_message.clear();
            }
            Err(e) => {
                self.error_message = format!("Failed to load tags: {e}");
            }
        }
        if let Ok(count) = self.db.tag_count() {
            self.tag_count = count;
        }
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.rx.try_recv() {
            self.apply_event(event);
        }
    }

    pub fn apply_event(&mut self, event: ReaderEvent) {
        match event {
            ReaderEvent::Status(message) => {
                self.status_message = message;
            }
            ReaderEvent::NewTag(read) => {
                let record = record_from_read(&read);
                self.session_tags.insert(0, record.clone());
                self.known_tags.insert(0, record);
                self.latest = Some(read);
            }
            ReaderEvent::TagSeen(read) => {
                let seen_at = read.timestamp_string();
                if let Some(record) =
                    self.known_tags.iter_mut().find(|r| r.tag_id == read.tag_id)
                {
                    record.last_seen = seen_at;
                    record.rssi = read.rssi;
                    record.rssi_percent = read.rssi_percent;
                    record.antenna = read.antenna;
                } else {
                    self.known_tags.insert(0, record_from_read(&read));
                }
                self.latest = Some(read);
            }
            ReaderEvent::TagCount(count) => {
                self.tag_count = count;
            }
        }
    }

    pub fn clear_database(&mut self) {
        match self.db.clear() {
            Ok(()) => {
                self.session_tags.clear();
                self.known_tags.clear();
                self.latest = None;
                self.tag_count = 0;
                self.status_message = "Database cleared".to_string();
                self.error_message.clear();
            }
            Err(e) => {
                self.error_message = format!("Failed to clear database: {e}");
            }
        }
    }

    fn export_tags(&mut self) {
        let path = format!("tags-export-{}.json", Local::now().format("%Y%m%d-%H%M%S"));
        match self.db.export_json() {
            Ok(json) => match std::fs::write(&path, json) {
                Ok(()) => {
                    log::info!("Exported tags to {path}");
                    self.status_message = format!("Tags exported to {path}");
                }
                Err(e) => {
                    self.error_message = format!("Failed to write export: {e}");
                }
            },
            Err(e) => {
                self.error_message = format!("Failed to export tags: {e}");
            }
        }
    }

    fn tag_table(ui: &mut egui::Ui, id: &str, rows: &[TagRecord]) {
        egui::ScrollArea::vertical()
            .auto_shrink([false; 2])
            .show(ui, |ui| {
                egui::Grid::new(id)
                    .num_columns(4)
                    .striped(true)
                    .min_col_width(120.0)
                    .show(ui, |ui| {
                        ui.strong("Tag ID");
                        ui.strong("First Seen");
                        ui.strong("Last Seen");
                        ui.strong("Signal");
                        ui.end_row();

                        for record in rows {
                            ui.monospace(&record.tag_id);
                            ui.label(&record.first_seen);
                            ui.label(&record.last_seen);
                            ui.label(format!("{:.1}%", record.rssi_percent));
                            ui.end_row();
                        }
                    });

                if rows.is_empty() {
                    ui.label("No tags to show");
                }
            });
    }
}

impl eframe::App for RfidReaderApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events();

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Refresh Tags").clicked() {
                        self.reload_known_tags();
                        ui.close_menu();
                    }
                    if ui.button("Export Tags").clicked() {
                        self.export_tags();
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.button("Exit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });

                ui.menu_button("Help", |ui| {
                    if ui.button("About").clicked() {
                        log::info!("RFID Tag Reader - desktop utility for USB RFID readers");
                        ui.close_menu();
                    }
                });
            });
        });

        egui::TopBottomPanel::bottom("bottom_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label("Status:");
                ui.colored_label(egui::Color32::from_rgb(0, 150, 0), &self.status_message);
                if !self.error_message.is_empty() {
                    ui.colored_label(egui::Color32::from_rgb(200, 0, 0), &self.error_message);
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.strong(format!("Total Tags: {}", self.tag_count));
                });
            });
        });

        // Clear-database confirmation dialog
        if self.confirm_clear {
            egui::Window::new("Confirm Clear")
                .collapsible(false)
                .resizable(false)
                .show(ctx, |ui| {
                    ui.label("Are you sure you want to clear all tag data? This cannot be undone.");
                    ui.horizontal(|ui| {
                        if ui.button("Clear").clicked() {
                            self.clear_database();
                            self.confirm_clear = false;
                        }
                        if ui.button("Cancel").clicked() {
                            self.confirm_clear = false;
                        }
                    });
                });
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("RFID Tag Reader");

            ui.separator();

            // Latest read panel
            ui.group(|ui| {
                ui.label("Latest Read");
                match &self.latest {
                    Some(read) => {
                        ui.horizontal(|ui| {
                            ui.monospace(&read.tag_id);
                            ui.label(format!("Time: {}", read.timestamp_string()));
                            ui.label(format!("Signal: {}", read.signal_display()));
                            ui.label(format!("Antenna: {}", read.antenna));
                        });
                    }
                    None => {
                        ui.label("No tags read yet");
                    }
                }
            });

            ui.horizontal(|ui| {
                if ui.button("Clear Database").clicked() {
                    self.confirm_clear = true;
                }
            });

            ui.separator();

            // Tabbed tag tables
            ui.horizontal(|ui| {
                ui.selectable_value(&mut self.active_tab, TagTab::NewTags, "New Tags");
                ui.selectable_value(&mut self.active_tab, TagTab::ExistingTags, "Existing Tags");
            });

            match self.active_tab {
                TagTab::NewTags => Self::tag_table(ui, "new_tags", &self.session_tags),
                TagTab::ExistingTags => Self::tag_table(ui, "existing_tags", &self.known_tags),
            }
        });

        // Keep draining the reader channel even without user input
        ctx.request_repaint_after(POLL_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tags::signal_percent;
    use std::sync::mpsc::Sender;

    fn test_app() -> (RfidReaderApp, Sender<ReaderEvent>) {
        let (tx, rx) = mpsc::channel();
        let db = TagDatabase::open_in_memory().unwrap();
        (RfidReaderApp::from_parts(rx, db), tx)
    }

    fn sample_read(tag_id: &str, rssi: u8) -> TagRead {
        TagRead {
            tag_id: tag_id.to_string(),
            tag_type: 0x04,
            antenna: 0x01,
            rssi,
            rssi_percent: signal_percent(rssi),
            timestamp: Local::now(),
            reader_id: "default".to_string(),
        }
    }

    #[test]
    fn test_status_event_updates_status_line() {
        let (mut app, _tx) = test_app();
        app.apply_event(ReaderEvent::Status("Reader connected".to_string()));
        assert_eq!(app.status_message, "Reader connected");
    }

    #[test]
    fn test_new_tag_event_fills_both_tables() {
        let (mut app, _tx) = test_app();

        app.apply_event(ReaderEvent::NewTag(sample_read("AABB", 0x90)));
        app.apply_event(ReaderEvent::TagCount(1));

        assert_eq!(app.session_tags.len(), 1);
        assert_eq!(app.known_tags.len(), 1);
        assert_eq!(app.known_tags[0].tag_id, "AABB");
        assert_eq!(app.tag_count, 1);
        assert_eq!(app.latest.as_ref().unwrap().tag_id, "AABB");
    }

    #[test]
    fn test_repeat_sighting_updates_known_row_in_place() {
        let (mut app, _tx) = test_app();

        app.apply_event(ReaderEvent::NewTag(sample_read("AABB", 0x85)));
        let mut repeat = sample_read("AABB", 0xA0);
        repeat.timestamp = repeat.timestamp + chrono::Duration::seconds(2);
        let expected_last_seen = repeat.timestamp_string();
        app.apply_event(ReaderEvent::TagSeen(repeat));

        // Repeat sighting must not duplicate the known-tags row
        assert_eq!(app.known_tags.len(), 1);
        assert_eq!(app.known_tags[0].last_seen, expected_last_seen);
        assert_eq!(app.known_tags[0].rssi_percent, 100.0);
        // And it is not a new-this-session tag
        assert_eq!(app.session_tags.len(), 1);
    }

    #[test]
    fn test_drain_consumes_queued_events_in_order() {
        let (mut app, tx) = test_app();

        tx.send(ReaderEvent::Status("Waiting for tags...".to_string()))
            .unwrap();
        tx.send(ReaderEvent::NewTag(sample_read("AABB", 0x90)))
            .unwrap();
        tx.send(ReaderEvent::TagCount(1)).unwrap();
        app.drain_events();

        assert_eq!(app.status_message, "Waiting for tags...");
        assert_eq!(app.known_tags.len(), 1);
        assert_eq!(app.tag_count, 1);
    }

    #[test]
    fn test_clear_database_resets_state() {
        let (mut app, _tx) = test_app();

        app.apply_event(ReaderEvent::NewTag(sample_read("AABB", 0x90)));
        app.apply_event(ReaderEvent::TagCount(1));
        app.clear_database();

        assert!(app.session_tags.is_empty());
        assert!(app.known_tags.is_empty());
        assert!(app.latest.is_none());
        assert_eq!(app.tag_count, 0);
        assert_eq!(app.status_message, "Database cleared");
    }

    #[test]
    fn test_startup_loads_existing_tags() {
        let (tx, rx) = mpsc::channel();
        let mut db = TagDatabase::open_in_memory().unwrap();
        db.record_read(&sample_read("E2003412", 0x90)).unwrap();
        drop(tx);

        let app = RfidReaderApp::from_parts(rx, db);
        assert_eq!(app.known_tags.len(), 1);
        assert_eq!(app.known_tags[0].tag_id, "E2003412");
        assert_eq!(app.tag_count, 1);
        assert!(app.session_tags.is_empty());
    }
}

pub fn run_gui(config: PollerConfig) -> Result<()> {
    let db = TagDatabase::open(&config.database_path)?;

    let (tx, rx) = mpsc::channel();
    // The reader thread has no cancellation protocol in GUI mode; it is
    // abandoned when the process exits.
    let stop = Arc::new(AtomicBool::new(false));
    let _reader_thread = spawn_reader_thread(config, tx, stop);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([800.0, 600.0])
            .with_icon(Arc::new(egui::IconData::default())),
        ..Default::default()
    };

    eframe::run_native(
        "RFID Tag Reader",
        options,
        Box::new(|cc| Ok(Box::new(RfidReaderApp::new(cc, rx, db)))),
    )
    .map_err(|e| anyhow::anyhow!("GUI error: {}", e))
}

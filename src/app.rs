use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

use crate::api::{self, ChatError, ChatResponse, Client, RenderedPart};
use crate::config::AppConfig;
use crate::history::PromptHistory;
use crate::images::{self, PreviewInfo, UploadedImage, NOT_AN_IMAGE};
use crate::storage::{FileStore, Store, KEY_API_CREDENTIAL};
use crate::theme::ThemeMode;

/// Completion messages from spawned tasks, applied on the UI thread between
/// frames. Image events carry the upload's stable id, never its position.
#[derive(Debug)]
pub enum AppEvent {
    PreviewReady { id: u64, info: PreviewInfo },
    PayloadReady { id: u64, payload: String },
    DecodeFailed { id: u64, error: String },
    GenerationDone(std::result::Result<ChatResponse, ChatError>),
    DownloadDone { result: std::result::Result<PathBuf, ChatError> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Credential,
    Prompt,
    Images,
    Response,
    History,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Popup {
    None,
    FileBrowser,
    Help,
}

/// What the response panel is currently showing.
#[derive(Debug)]
pub enum ResponsePanel {
    Placeholder,
    Parts(Vec<RenderedPart>),
    Error(String),
}

#[derive(Debug, Clone)]
pub struct BrowserEntry {
    pub name: String,
    pub is_dir: bool,
    pub path: PathBuf,
}

/// The readiness gate: a trimmed credential, at least one accepted image,
/// and a trimmed prompt.
pub fn is_ready(credential: &str, image_count: usize, prompt: &str) -> bool {
    !credential.trim().is_empty() && image_count > 0 && !prompt.trim().is_empty()
}

pub struct App {
    pub section: Section,
    pub popup: Popup,
    pub should_quit: bool,

    // Form fields
    pub credential: String,
    pub prompt: String,

    // Attached images; Vec order is display order and request order
    pub images: Vec<UploadedImage>,
    pub selected_image: usize,
    next_image_id: u64,

    // Prompt history (bottom panel)
    pub history: PromptHistory,
    pub selected_history: usize,

    // Response panel
    pub response: ResponsePanel,
    pub selected_response_image: usize,
    pub busy: bool,
    pub spinner_frame: usize,

    pub theme_mode: ThemeMode,

    // Status message (shown in info line, auto-clears after timeout)
    pub status_message: Option<String>,
    pub status_message_time: Option<Instant>,

    // File browser state
    pub browser_path: PathBuf,
    pub browser_entries: Vec<BrowserEntry>,
    pub browser_selected: usize,
    pub browser_marked: Vec<PathBuf>,

    pub config: AppConfig,
    store: Box<dyn Store>,
    client: Arc<Client>,
    events_tx: mpsc::UnboundedSender<AppEvent>,
    events_rx: mpsc::UnboundedReceiver<AppEvent>,
}

impl App {
    pub fn new() -> Result<Self> {
        let store = FileStore::open_default()?;
        let config = AppConfig::load().unwrap_or_default();
        Ok(Self::with_store(Box::new(store), config))
    }

    /// Build the app over an explicit store (tests use the in-memory fake).
    pub fn with_store(store: Box<dyn Store>, config: AppConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let credential = store.get(KEY_API_CREDENTIAL).unwrap_or_default();
        let history = PromptHistory::load(store.as_ref());
        let theme_mode = ThemeMode::initial(store.as_ref());

        Self {
            section: Section::Credential,
            popup: Popup::None,
            should_quit: false,

            credential,
            prompt: String::new(),

            images: Vec::new(),
            selected_image: 0,
            next_image_id: 0,

            history,
            selected_history: 0,

            response: ResponsePanel::Placeholder,
            selected_response_image: 0,
            busy: false,
            spinner_frame: 0,

            theme_mode,

            status_message: None,
            status_message_time: None,

            browser_path: dirs::home_dir().unwrap_or_else(|| PathBuf::from("/")),
            browser_entries: Vec::new(),
            browser_selected: 0,
            browser_marked: Vec::new(),

            config,
            store,
            client: Arc::new(Client::new()),
            events_tx,
            events_rx,
        }
    }

    /// Set a status message (auto-clears after 3 seconds)
    fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some(msg.into());
        self.status_message_time = Some(Instant::now());
    }

    pub fn ready(&self) -> bool {
        is_ready(&self.credential, self.images.len(), &self.prompt)
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('c') => {
                    self.should_quit = true;
                    return Ok(());
                }
                KeyCode::Char('t') => {
                    self.toggle_theme();
                    return Ok(());
                }
                KeyCode::Char('g') => {
                    self.submit();
                    return Ok(());
                }
                _ => {}
            }
        }

        if self.popup != Popup::None {
            return self.handle_popup_key(key);
        }
        self.handle_normal_key(key)
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Tab => {
                self.blur_section();
                self.section = self.next_section();
            }
            KeyCode::BackTab => {
                self.blur_section();
                self.section = self.prev_section();
            }
            _ => match self.section {
                Section::Credential => self.handle_credential_key(key),
                Section::Prompt => self.handle_prompt_key(key),
                Section::Images => self.handle_images_key(key),
                Section::Response => self.handle_response_key(key),
                Section::History => self.handle_history_key(key),
            },
        }
        Ok(())
    }

    fn next_section(&self) -> Section {
        match self.section {
            Section::Credential => Section::Prompt,
            Section::Prompt => Section::Images,
            Section::Images => Section::Response,
            Section::Response => Section::History,
            Section::History => Section::Credential,
        }
    }

    fn prev_section(&self) -> Section {
        match self.section {
            Section::Credential => Section::History,
            Section::Prompt => Section::Credential,
            Section::Images => Section::Prompt,
            Section::Response => Section::Images,
            Section::History => Section::Response,
        }
    }

    /// Leaving the credential field persists it, like the original's
    /// save-on-blur.
    fn blur_section(&mut self) {
        if self.section == Section::Credential && !self.credential.trim().is_empty() {
            let value = self.credential.trim().to_string();
            self.store.set(KEY_API_CREDENTIAL, &value);
        }
    }

    fn handle_credential_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char(c) => self.credential.push(c),
            KeyCode::Backspace => {
                self.credential.pop();
            }
            KeyCode::Enter => {
                self.blur_section();
                self.section = Section::Prompt;
            }
            _ => {}
        }
    }

    fn handle_prompt_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char(c) => self.prompt.push(c),
            KeyCode::Backspace => {
                self.prompt.pop();
            }
            KeyCode::Enter => self.submit(),
            _ => {}
        }
    }

    fn handle_images_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('?') => self.popup = Popup::Help,
            KeyCode::Char('j') | KeyCode::Down => {
                if !self.images.is_empty() {
                    self.selected_image = (self.selected_image + 1) % self.images.len();
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                if !self.images.is_empty() {
                    self.selected_image = self
                        .selected_image
                        .checked_sub(1)
                        .unwrap_or(self.images.len() - 1);
                }
            }
            KeyCode::Char('i') | KeyCode::Enter => self.start_file_browser(),
            KeyCode::Char('d') | KeyCode::Delete => self.remove_selected_image(),
            _ => {}
        }
    }

    fn handle_response_key(&mut self, key: KeyEvent) {
        let image_count = self.response_image_parts().len();
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('?') => self.popup = Popup::Help,
            KeyCode::Char('j') | KeyCode::Down => {
                if image_count > 0 {
                    self.selected_response_image = (self.selected_response_image + 1) % image_count;
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                if image_count > 0 {
                    self.selected_response_image = self
                        .selected_response_image
                        .checked_sub(1)
                        .unwrap_or(image_count - 1);
                }
            }
            KeyCode::Char('s') | KeyCode::Enter => self.download_selected(),
            _ => {}
        }
    }

    fn handle_history_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('?') => self.popup = Popup::Help,
            KeyCode::Char('j') | KeyCode::Down => {
                if !self.history.is_empty() {
                    self.selected_history = (self.selected_history + 1) % self.history.len();
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                if !self.history.is_empty() {
                    self.selected_history = self
                        .selected_history
                        .checked_sub(1)
                        .unwrap_or(self.history.len() - 1);
                }
            }
            KeyCode::Enter => self.copy_history_entry(),
            _ => {}
        }
    }

    fn handle_popup_key(&mut self, key: KeyEvent) -> Result<()> {
        match self.popup {
            Popup::FileBrowser => self.handle_browser_key(key),
            Popup::Help => {
                if matches!(
                    key.code,
                    KeyCode::Esc | KeyCode::Char('?') | KeyCode::Enter | KeyCode::Char('q')
                ) {
                    self.popup = Popup::None;
                }
                Ok(())
            }
            Popup::None => Ok(()),
        }
    }

    /// Flip the applied theme and persist the new value.
    pub fn toggle_theme(&mut self) {
        self.theme_mode = self.theme_mode.toggled();
        self.theme_mode.persist(self.store.as_mut());
        self.set_status(format!("Theme: {} {}", self.theme_mode.as_str(), self.theme_mode.glyph()));
    }

    /// Copy the selected history entry into the prompt field. Never resubmits.
    fn copy_history_entry(&mut self) {
        if let Some(entry) = self.history.get(self.selected_history) {
            self.prompt = entry.text.clone();
            self.section = Section::Prompt;
        }
    }

    /// Accept a selection from the file browser. Non-image entries are
    /// reported and dropped; an accepted set replaces the previous one, in
    /// selection order, and both decodes start for every entry.
    pub fn accept_selection(&mut self, paths: Vec<PathBuf>) {
        let mut accepted = Vec::new();
        let mut rejected = false;

        for path in paths {
            self.next_image_id += 1;
            match UploadedImage::accept(self.next_image_id, &path) {
                Some(image) => accepted.push(image),
                None => {
                    rejected = true;
                    tracing::warn!("Rejected non-image file: {}", path.display());
                }
            }
        }

        if rejected {
            self.set_status(NOT_AN_IMAGE);
        }
        if accepted.is_empty() {
            return;
        }

        self.images = accepted;
        self.selected_image = 0;
        for image in &self.images {
            images::spawn_preview_decode(image.id, image.path.clone(), self.events_tx.clone());
            images::spawn_payload_decode(image.id, image.path.clone(), self.events_tx.clone());
        }
    }

    /// Remove the selected image. Later entries renumber with the Vec; any
    /// decode completion still in flight for the removed id finds no entry
    /// and is discarded.
    pub fn remove_selected_image(&mut self) {
        if self.images.is_empty() {
            return;
        }
        let removed = self.images.remove(self.selected_image);
        if self.selected_image >= self.images.len() && !self.images.is_empty() {
            self.selected_image = self.images.len() - 1;
        }
        self.set_status(format!("Removed {}", removed.name));
    }

    /// The ordered (mime, payload) pairs that would go out right now. Images
    /// whose payload decode has not resolved are skipped silently.
    pub fn encoded_images(&self) -> Vec<(String, String)> {
        self.images
            .iter()
            .filter_map(|image| image.payload.clone().map(|p| (image.mime.clone(), p)))
            .collect()
    }

    /// Validate, record history, and fire the generation request. Busy is set
    /// here and cleared exactly once when `GenerationDone` arrives.
    pub fn submit(&mut self) {
        if self.busy || !self.ready() {
            return;
        }

        let credential = self.credential.trim().to_string();
        let prompt = self.prompt.trim().to_string();
        self.store.set(KEY_API_CREDENTIAL, &credential);

        // History is recorded before the request goes out, success or not.
        let now_ms = chrono::Utc::now().timestamp_millis();
        self.history.record(&prompt, now_ms, self.store.as_mut());
        self.selected_history = 0;

        let images = self.encoded_images();

        self.busy = true;
        self.response = ResponsePanel::Placeholder;
        self.selected_response_image = 0;

        let client = self.client.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = client.generate(&credential, &prompt, &images).await;
            let _ = tx.send(AppEvent::GenerationDone(result));
        });
    }

    /// (url, filename) for every image part of the current response.
    pub fn response_image_parts(&self) -> Vec<(&str, &str)> {
        match &self.response {
            ResponsePanel::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    RenderedPart::Image { url, filename } => {
                        Some((url.as_str(), filename.as_str()))
                    }
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    fn download_selected(&mut self) {
        let Some((url, filename)) = self
            .response_image_parts()
            .get(self.selected_response_image)
            .map(|(u, f)| (u.to_string(), f.to_string()))
        else {
            return;
        };

        let dir = self.config.resolve_downloads_dir();
        if let Err(e) = std::fs::create_dir_all(&dir) {
            tracing::warn!("Could not create downloads directory: {}", e);
        }

        self.set_status(format!("Downloading {}...", filename));
        let client = self.client.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = client.download(&url, &dir, &filename).await;
            let _ = tx.send(AppEvent::DownloadDone { result });
        });
    }

    pub fn apply_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::PreviewReady { id, info } => {
                if let Some(image) = self.images.iter_mut().find(|i| i.id == id) {
                    image.preview = Some(info);
                }
            }
            AppEvent::PayloadReady { id, payload } => {
                if let Some(image) = self.images.iter_mut().find(|i| i.id == id) {
                    image.payload = Some(payload);
                }
            }
            AppEvent::DecodeFailed { id, error } => {
                if self.images.iter().any(|i| i.id == id) {
                    self.set_status(format!("Error: {}", error));
                }
            }
            AppEvent::GenerationDone(result) => {
                self.busy = false;
                match result {
                    Ok(response) => match api::interpret_response(response) {
                        Ok(parts) => {
                            self.selected_response_image = 0;
                            self.section = Section::Response;
                            self.response = ResponsePanel::Parts(parts);
                        }
                        Err(e) => self.response = ResponsePanel::Error(e.to_string()),
                    },
                    Err(e) => self.response = ResponsePanel::Error(format!("Error: {}", e)),
                }
            }
            AppEvent::DownloadDone { result } => match result {
                Ok(path) => {
                    self.set_status(format!("Saved {}", path.display()));
                    if let Err(e) = notify_rust::Notification::new()
                        .summary("gazou")
                        .body(&format!("Saved {}", path.display()))
                        .icon("image-x-generic")
                        .show()
                    {
                        tracing::debug!("Notification failed: {}", e);
                    }
                }
                Err(e) => self.set_status(e.to_string()),
            },
        }
    }

    /// Per-frame housekeeping: drain task completions, advance the busy
    /// spinner, expire the status message.
    pub fn tick(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.apply_event(event);
        }

        if self.busy {
            self.spinner_frame = self.spinner_frame.wrapping_add(1);
        }

        if let Some(time) = self.status_message_time {
            if time.elapsed().as_secs() >= 3 {
                self.status_message = None;
                self.status_message_time = None;
            }
        }
    }

    pub fn start_file_browser(&mut self) {
        self.popup = Popup::FileBrowser;
        self.browser_path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/"));
        self.browser_selected = 0;
        self.browser_marked.clear();
        self.refresh_browser();
    }

    pub fn refresh_browser(&mut self) {
        self.browser_entries.clear();

        if let Some(parent) = self.browser_path.parent() {
            self.browser_entries.push(BrowserEntry {
                name: "..".to_string(),
                is_dir: true,
                path: parent.to_path_buf(),
            });
        }

        if let Ok(entries) = std::fs::read_dir(&self.browser_path) {
            let mut dirs: Vec<BrowserEntry> = Vec::new();
            let mut files: Vec<BrowserEntry> = Vec::new();

            for entry in entries.flatten() {
                let path = entry.path();
                let name = entry.file_name().to_string_lossy().to_string();

                // Skip hidden files
                if name.starts_with('.') {
                    continue;
                }

                if path.is_dir() {
                    dirs.push(BrowserEntry {
                        name,
                        is_dir: true,
                        path,
                    });
                } else if path
                    .extension()
                    .and_then(|e| e.to_str())
                    .and_then(crate::images::ImageFormat::from_extension)
                    .is_some()
                {
                    files.push(BrowserEntry {
                        name,
                        is_dir: false,
                        path,
                    });
                }
            }

            dirs.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
            files.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));

            self.browser_entries.extend(dirs);
            self.browser_entries.extend(files);
        }

        if self.browser_selected >= self.browser_entries.len() {
            self.browser_selected = 0;
        }
    }

    fn handle_browser_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => {
                self.popup = Popup::None;
                self.browser_marked.clear();
            }
            KeyCode::Char('j') | KeyCode::Down => {
                if !self.browser_entries.is_empty() {
                    self.browser_selected = (self.browser_selected + 1) % self.browser_entries.len();
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                if !self.browser_entries.is_empty() {
                    self.browser_selected = self
                        .browser_selected
                        .checked_sub(1)
                        .unwrap_or(self.browser_entries.len() - 1);
                }
            }
            // Space marks files for a multi-image selection, in mark order
            KeyCode::Char(' ') => {
                if let Some(entry) = self.browser_entries.get(self.browser_selected) {
                    if !entry.is_dir {
                        if let Some(pos) =
                            self.browser_marked.iter().position(|p| p == &entry.path)
                        {
                            self.browser_marked.remove(pos);
                        } else {
                            self.browser_marked.push(entry.path.clone());
                        }
                    }
                }
            }
            KeyCode::Enter => {
                if let Some(entry) = self.browser_entries.get(self.browser_selected).cloned() {
                    if entry.is_dir {
                        self.browser_path = entry.path;
                        self.browser_selected = 0;
                        self.refresh_browser();
                    } else {
                        let selection = if self.browser_marked.is_empty() {
                            vec![entry.path]
                        } else {
                            std::mem::take(&mut self.browser_marked)
                        };
                        self.popup = Popup::None;
                        self.accept_selection(selection);
                    }
                }
            }
            KeyCode::Backspace => {
                if let Some(parent) = self.browser_path.parent() {
                    self.browser_path = parent.to_path_buf();
                    self.browser_selected = 0;
                    self.refresh_browser();
                }
            }
            KeyCode::Char('h') => {
                self.browser_path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/"));
                self.browser_selected = 0;
                self.refresh_browser();
            }
            _ => {}
        }
        Ok(())
    }

    #[cfg(test)]
    fn stored(&self, key: &str) -> Option<String> {
        self.store.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemStore, KEY_THEME};
    use std::path::Path;

    fn test_app() -> App {
        App::with_store(Box::new(MemStore::new()), AppConfig::default())
    }

    fn attach(app: &mut App, names: &[&str]) {
        app.images = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                UploadedImage::accept(i as u64 + 1, Path::new(&format!("/tmp/{}", name))).unwrap()
            })
            .collect();
    }

    #[test]
    fn test_readiness_truth_table() {
        for credential in ["", "sk-or-key"] {
            for image_count in [0usize, 1] {
                for prompt in ["", "describe this"] {
                    let expected = !credential.is_empty() && image_count > 0 && !prompt.is_empty();
                    assert_eq!(
                        is_ready(credential, image_count, prompt),
                        expected,
                        "credential={:?} images={} prompt={:?}",
                        credential,
                        image_count,
                        prompt
                    );
                }
            }
        }
        // Whitespace-only fields do not count
        assert!(!is_ready("   ", 1, "prompt"));
        assert!(!is_ready("key", 1, "  \t"));
    }

    #[test]
    fn test_removal_realigns_images_and_payloads() {
        let mut app = test_app();
        attach(&mut app, &["a.png", "b.png", "c.png"]);

        app.apply_event(AppEvent::PayloadReady { id: 1, payload: "AAA".into() });
        app.apply_event(AppEvent::PayloadReady { id: 2, payload: "BBB".into() });
        app.apply_event(AppEvent::PayloadReady { id: 3, payload: "CCC".into() });

        app.selected_image = 1;
        app.remove_selected_image();

        assert_eq!(app.images.len(), 2);
        assert_eq!(app.images[0].name, "a.png");
        assert_eq!(app.images[1].name, "c.png");
        assert_eq!(app.images[0].payload.as_deref(), Some("AAA"));
        assert_eq!(app.images[1].payload.as_deref(), Some("CCC"));
    }

    #[test]
    fn test_late_decode_for_removed_id_is_discarded() {
        let mut app = test_app();
        attach(&mut app, &["a.png", "b.png"]);

        app.selected_image = 0;
        app.remove_selected_image();

        // Decode for the removed upload (id 1) arrives late: nothing may
        // change, in particular not the surviving image's payload.
        app.apply_event(AppEvent::PayloadReady { id: 1, payload: "STALE".into() });
        assert_eq!(app.images.len(), 1);
        assert_eq!(app.images[0].name, "b.png");
        assert!(app.images[0].payload.is_none());

        app.apply_event(AppEvent::PayloadReady { id: 2, payload: "FRESH".into() });
        assert_eq!(app.images[0].payload.as_deref(), Some("FRESH"));
    }

    #[test]
    fn test_pending_payloads_are_skipped_from_request() {
        let mut app = test_app();
        attach(&mut app, &["a.png", "b.jpg", "c.png"]);

        app.apply_event(AppEvent::PayloadReady { id: 1, payload: "AAA".into() });
        app.apply_event(AppEvent::PayloadReady { id: 3, payload: "CCC".into() });

        let encoded = app.encoded_images();
        assert_eq!(
            encoded,
            vec![
                ("image/png".to_string(), "AAA".to_string()),
                ("image/png".to_string(), "CCC".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_submit_records_history_and_sets_busy() {
        let mut app = test_app();
        app.credential = "sk-or-key".into();
        app.prompt = "  make it sparkle  ".into();
        attach(&mut app, &["a.png"]);

        app.submit();

        assert!(app.busy);
        assert_eq!(app.history.len(), 1);
        assert_eq!(app.history.get(0).unwrap().text, "make it sparkle");
        assert_eq!(app.stored(KEY_API_CREDENTIAL).as_deref(), Some("sk-or-key"));

        // A second submit while in flight is refused outright.
        app.submit();
        assert_eq!(app.history.len(), 1);
    }

    #[tokio::test]
    async fn test_submit_refused_when_not_ready() {
        let mut app = test_app();
        app.prompt = "no key, no image".into();
        app.submit();
        assert!(!app.busy);
        assert!(app.history.is_empty());
    }

    #[test]
    fn test_generation_done_clears_busy_and_reports_shape_errors() {
        let mut app = test_app();
        app.busy = true;

        let response: ChatResponse = serde_json::from_value(serde_json::json!({ "choices": [] })).unwrap();
        app.apply_event(AppEvent::GenerationDone(Ok(response)));

        assert!(!app.busy);
        match &app.response {
            ResponsePanel::Error(msg) => assert_eq!(msg, "No response from API"),
            other => panic!("expected error panel, got {:?}", other),
        }
    }

    #[test]
    fn test_transport_error_is_surfaced_verbatim() {
        let mut app = test_app();
        app.busy = true;
        app.apply_event(AppEvent::GenerationDone(Err(ChatError::Api(
            "HTTP error! status: 429".into(),
        ))));

        assert!(!app.busy);
        match &app.response {
            ResponsePanel::Error(msg) => assert_eq!(msg, "Error: HTTP error! status: 429"),
            other => panic!("expected error panel, got {:?}", other),
        }
    }

    #[test]
    fn test_theme_toggle_round_trips_applied_and_persisted_value() {
        let mut store = MemStore::new();
        ThemeMode::Dark.persist(&mut store);
        let mut app = App::with_store(Box::new(store), AppConfig::default());
        assert_eq!(app.theme_mode, ThemeMode::Dark);

        app.toggle_theme();
        assert_eq!(app.theme_mode, ThemeMode::Light);
        assert_eq!(app.stored(KEY_THEME).as_deref(), Some("light"));

        app.toggle_theme();
        assert_eq!(app.theme_mode, ThemeMode::Dark);
        assert_eq!(app.stored(KEY_THEME).as_deref(), Some("dark"));
    }

    #[test]
    fn test_history_entry_copies_into_prompt_without_submitting() {
        let mut app = test_app();
        let mut store = MemStore::new();
        app.history.record("older prompt", 1000, &mut store);
        app.history.record("newer prompt", 2000, &mut store);

        app.section = Section::History;
        app.selected_history = 1;
        app.handle_key(KeyEvent::from(KeyCode::Enter)).unwrap();

        assert_eq!(app.prompt, "older prompt");
        assert_eq!(app.section, Section::Prompt);
        assert!(!app.busy);
    }

    #[test]
    fn test_rejected_selection_reports_and_keeps_previous_set() {
        let mut app = test_app();
        attach(&mut app, &["keep.png"]);

        app.accept_selection(vec![PathBuf::from("/tmp/notes.txt")]);

        assert_eq!(app.images.len(), 1);
        assert_eq!(app.images[0].name, "keep.png");
        assert_eq!(app.status_message.as_deref(), Some(NOT_AN_IMAGE));
    }
}

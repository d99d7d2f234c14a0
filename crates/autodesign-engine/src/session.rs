//! Session coordinator: the single owner of design-session state.
//!
//! Every remote action runs in three phases so a front-end can keep the
//! session responsive while the request is out:
//!
//! 1. `begin_*` checks the guards, marks the session loading and hands back
//!    a [`PendingRequest`];
//! 2. [`PendingRequest::execute`] performs the one remote exchange (this is
//!    the only blocking step and may run on another thread);
//! 3. [`Session::complete`] applies the result and returns to idle.
//!
//! `start_generate` / `start_refine` run all three in place.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use autodesign_contracts::errors::DesignError;
use autodesign_contracts::events::{EventWriter, SessionEvent};
use autodesign_contracts::images::{
    GeneratedImage, ImageId, ImagePayload, REFINED_PROMPT_PREFIX, UPLOADED_IMAGE_LABEL,
    UPLOAD_ID_PREFIX,
};
use autodesign_contracts::session::{
    prompt_meets_minimum, Activity, AppMode, AspectRatio, GENERATING_MESSAGE, REFINING_MESSAGE,
    UPLOADING_MESSAGE,
};
use chrono::{SecondsFormat, Utc};
use tracing::{debug, error, info, warn};

use crate::upload::read_image_file;
use crate::{error_chain_text, RequestClient};

/// What happened to a requested action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// A guard rejected the action; nothing changed.
    Skipped,
    Completed(ImageId),
    /// The user-facing failure message.
    Failed(String),
}

impl ActionOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn image_id(&self) -> Option<&ImageId> {
        match self {
            Self::Completed(id) => Some(id),
            _ => None,
        }
    }
}

/// Result of a successful remote exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub image: ImagePayload,
    pub caption: Option<String>,
}

#[derive(Debug, Clone)]
enum RequestKind {
    Generate {
        prompt: String,
        aspect_ratio: AspectRatio,
    },
    Refine {
        source: ImagePayload,
        instruction: String,
    },
}

/// A request admitted by the session's guards and not yet applied.
#[derive(Debug)]
#[must_use = "a pending request keeps the session loading until it is completed"]
pub struct PendingRequest {
    ticket: u64,
    kind: RequestKind,
}

impl PendingRequest {
    pub fn action(&self) -> &'static str {
        match self.kind {
            RequestKind::Generate { .. } => "generate",
            RequestKind::Refine { .. } => "refine",
        }
    }

    pub fn prompt(&self) -> &str {
        match &self.kind {
            RequestKind::Generate { prompt, .. } => prompt,
            RequestKind::Refine { instruction, .. } => instruction,
        }
    }

    pub fn execute(&self, client: &RequestClient) -> Result<Completion, DesignError> {
        match &self.kind {
            RequestKind::Generate {
                prompt,
                aspect_ratio,
            } => client.generate(prompt, *aspect_ratio).map(|image| Completion {
                image,
                caption: None,
            }),
            RequestKind::Refine {
                source,
                instruction,
            } => client.refine(source, instruction).map(|refinement| Completion {
                image: refinement.image,
                caption: Some(refinement.caption),
            }),
        }
    }

    fn image_label(&self) -> String {
        match &self.kind {
            RequestKind::Generate { prompt, .. } => prompt.clone(),
            RequestKind::Refine { instruction, .. } => {
                format!("{REFINED_PROMPT_PREFIX}{instruction}")
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
struct SessionState {
    mode: AppMode,
    prompt: String,
    aspect_ratio: AspectRatio,
    history: VecDeque<GeneratedImage>,
    active_image: Option<GeneratedImage>,
    activity: Activity,
    last_error: Option<String>,
    last_caption: Option<String>,
}

/// Timestamp ids, suffixed when two land in the same millisecond.
#[derive(Debug, Default)]
struct IdClock {
    last: Option<String>,
    repeats: u32,
}

impl IdClock {
    fn next(&mut self, prefix: &str) -> ImageId {
        let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let id = if self.last.as_deref() == Some(stamp.as_str()) {
            self.repeats += 1;
            format!("{prefix}{stamp}-{}", self.repeats)
        } else {
            self.repeats = 0;
            format!("{prefix}{stamp}")
        };
        self.last = Some(stamp);
        ImageId::new(id)
    }
}

pub struct Session {
    client: Arc<RequestClient>,
    state: SessionState,
    ids: IdClock,
    events: Option<EventWriter>,
    next_ticket: u64,
    in_flight: Option<u64>,
}

impl Session {
    pub fn new(client: RequestClient) -> Self {
        Self::with_shared_client(Arc::new(client))
    }

    pub fn with_shared_client(client: Arc<RequestClient>) -> Self {
        Self {
            client,
            state: SessionState::default(),
            ids: IdClock::default(),
            events: None,
            next_ticket: 0,
            in_flight: None,
        }
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = Some(events);
        self.record(SessionEvent::SessionStarted {
            provider: self.client.provider_name().to_string(),
            generate_model: self.client.generate_model().to_string(),
            refine_model: self.client.refine_model().to_string(),
        });
        self
    }

    pub fn client(&self) -> Arc<RequestClient> {
        Arc::clone(&self.client)
    }

    pub fn mode(&self) -> AppMode {
        self.state.mode
    }

    pub fn prompt(&self) -> &str {
        &self.state.prompt
    }

    pub fn aspect_ratio(&self) -> AspectRatio {
        self.state.aspect_ratio
    }

    pub fn activity(&self) -> &Activity {
        &self.state.activity
    }

    pub fn is_loading(&self) -> bool {
        self.state.activity.is_loading()
    }

    pub fn loading_message(&self) -> Option<&str> {
        self.state.activity.message()
    }

    pub fn active_image(&self) -> Option<&GeneratedImage> {
        self.state.active_image.as_ref()
    }

    /// Newest first.
    pub fn history(&self) -> impl ExactSizeIterator<Item = &GeneratedImage> {
        self.state.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.state.history.len()
    }

    pub fn history_entry(&self, index: usize) -> Option<&GeneratedImage> {
        self.state.history.get(index)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.state.last_error.as_deref()
    }

    /// Text the refine model returned alongside its last image, if any.
    pub fn last_caption(&self) -> Option<&str> {
        self.state.last_caption.as_deref()
    }

    pub fn can_generate(&self) -> bool {
        !self.is_loading() && prompt_meets_minimum(&self.state.prompt)
    }

    pub fn can_refine(&self) -> bool {
        self.can_generate() && self.state.active_image.is_some()
    }

    pub fn set_mode(&mut self, mode: AppMode) {
        self.state.mode = mode;
        self.state.prompt.clear();
        self.record(SessionEvent::ModeChanged { mode });
    }

    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.state.prompt = prompt.into();
    }

    pub fn set_aspect_ratio(&mut self, aspect_ratio: AspectRatio) {
        self.state.aspect_ratio = aspect_ratio;
    }

    /// Sets the active image to a history entry. Unknown ids are ignored.
    pub fn select_image(&mut self, id: &ImageId) -> bool {
        let Some(image) = self.state.history.iter().find(|image| image.id() == id) else {
            debug!(image_id = %id, "ignoring selection of unknown image");
            return false;
        };
        self.state.active_image = Some(image.clone());
        self.record(SessionEvent::ImageSelected {
            image_id: id.clone(),
        });
        true
    }

    pub fn begin_generate(&mut self) -> Option<PendingRequest> {
        if !self.can_generate() {
            return None;
        }
        let kind = RequestKind::Generate {
            prompt: self.state.prompt.clone(),
            aspect_ratio: self.state.aspect_ratio,
        };
        Some(self.admit(kind, GENERATING_MESSAGE))
    }

    pub fn begin_refine(&mut self) -> Option<PendingRequest> {
        if !self.can_refine() {
            return None;
        }
        let source = self.state.active_image.as_ref()?.payload().clone();
        let kind = RequestKind::Refine {
            source,
            instruction: self.state.prompt.clone(),
        };
        Some(self.admit(kind, REFINING_MESSAGE))
    }

    /// Applies the outcome of `request` and returns the session to idle.
    pub fn complete(
        &mut self,
        request: PendingRequest,
        result: Result<Completion, DesignError>,
    ) -> ActionOutcome {
        if self.in_flight != Some(request.ticket) {
            warn!(
                ticket = request.ticket,
                "ignoring completion for a request this session is not waiting on"
            );
            return ActionOutcome::Skipped;
        }
        self.in_flight = None;

        let outcome = match result {
            Ok(completion) => {
                let image = GeneratedImage::new(
                    self.ids.next(""),
                    completion.image,
                    request.image_label(),
                );
                let id = image.id().clone();
                info!(
                    action = request.action(),
                    image_id = %id,
                    history_len = self.state.history.len() + 1,
                    "design image created"
                );
                self.record(SessionEvent::ImageCreated {
                    action: request.action(),
                    image_id: id.clone(),
                    prompt: image.prompt().to_string(),
                    mime_type: image.mime_type().to_string(),
                    bytes: image.payload().len(),
                });
                self.state.history.push_front(image.clone());
                self.state.active_image = Some(image);
                self.state.prompt.clear();
                self.state.last_caption = completion.caption.filter(|text| !text.is_empty());
                ActionOutcome::Completed(id)
            }
            Err(err) => self.fail(request.action(), &err),
        };
        self.state.activity = Activity::Idle;
        outcome
    }

    pub fn start_generate(&mut self) -> ActionOutcome {
        match self.begin_generate() {
            Some(request) => self.run(request),
            None => ActionOutcome::Skipped,
        }
    }

    pub fn start_refine(&mut self) -> ActionOutcome {
        match self.begin_refine() {
            Some(request) => self.run(request),
            None => ActionOutcome::Skipped,
        }
    }

    /// Submits the current draft in the current mode.
    pub fn submit(&mut self) -> ActionOutcome {
        match self.state.mode {
            AppMode::Generate => self.start_generate(),
            AppMode::Refine => self.start_refine(),
        }
    }

    /// Makes an image file the active image and switches to refine mode.
    /// Uploads are never added to history.
    pub fn upload_image(&mut self, file: Option<&Path>) -> ActionOutcome {
        let Some(path) = file else {
            return ActionOutcome::Skipped;
        };
        if self.is_loading() {
            return ActionOutcome::Skipped;
        }
        self.state.activity = Activity::loading(UPLOADING_MESSAGE);
        self.state.last_error = None;

        let outcome = match read_image_file(path) {
            Ok(payload) => {
                let image = GeneratedImage::new(
                    self.ids.next(UPLOAD_ID_PREFIX),
                    payload,
                    UPLOADED_IMAGE_LABEL,
                );
                let id = image.id().clone();
                info!(image_id = %id, path = %path.display(), "image uploaded");
                self.record(SessionEvent::ImageUploaded {
                    image_id: id.clone(),
                    path: path.display().to_string(),
                    mime_type: image.mime_type().to_string(),
                    bytes: image.payload().len(),
                });
                self.state.active_image = Some(image);
                self.state.mode = AppMode::Refine;
                ActionOutcome::Completed(id)
            }
            Err(err) => {
                let err = DesignError::UploadDecodeFailed {
                    detail: error_chain_text(&err, 1024),
                };
                self.fail("upload", &err)
            }
        };
        self.state.activity = Activity::Idle;
        outcome
    }

    fn run(&mut self, request: PendingRequest) -> ActionOutcome {
        let client = Arc::clone(&self.client);
        let result = request.execute(&client);
        self.complete(request, result)
    }

    fn admit(&mut self, kind: RequestKind, message: &str) -> PendingRequest {
        self.next_ticket += 1;
        let request = PendingRequest {
            ticket: self.next_ticket,
            kind,
        };
        self.in_flight = Some(request.ticket);
        self.state.activity = Activity::loading(message);
        self.state.last_error = None;
        self.record(SessionEvent::RequestStarted {
            action: request.action(),
            prompt: request.prompt().to_string(),
            aspect_ratio: self.state.aspect_ratio,
        });
        request
    }

    fn fail(&mut self, action: &'static str, err: &DesignError) -> ActionOutcome {
        error!(action, kind = err.kind(), detail = err.detail(), "design action failed");
        let message = err.to_string();
        self.record(SessionEvent::RequestFailed {
            action,
            kind: err.kind(),
            message: message.clone(),
            detail: err.detail().to_string(),
        });
        self.state.last_error = Some(message.clone());
        ActionOutcome::Failed(message)
    }

    fn record(&self, event: SessionEvent) {
        let Some(events) = &self.events else {
            return;
        };
        if let Err(err) = events.append(&event) {
            warn!(?event, error = %err, "failed to write session event");
        }
    }
}

use std::sync::Arc;
use std::time::{Duration, Instant};

use sopkoll_agent::{AgentHandle, Notification, NotificationPermission};
use sopkoll_core::{
    model::{Address, GroupedSchedule, MunicipalityId},
    service::{ScheduleFetch, ScheduleSource, SopkollService},
};
use tokio::sync::mpsc;

/// Quiet period after the last keystroke before a search fires.
pub(crate) const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

pub(crate) const STALE_ADVISORY: &str = "Visar cachad data - kunde inte uppdatera";

#[derive(Debug, Clone, Copy)]
pub(crate) enum Screen {
    MunicipalitySelect,
    AddressSearch,
    ScheduleView,
}

/// Results delivered from background tasks into the event loop.
pub(crate) enum AppEvent {
    SearchFinished {
        generation: u64,
        result: Result<Vec<Address>, String>,
    },
    ScheduleFinished {
        result: Result<ScheduleFetch, String>,
    },
    Notification(Notification),
}

pub(crate) struct App {
    pub service: Arc<SopkollService>,
    pub agent: AgentHandle,
    pub events_tx: mpsc::UnboundedSender<AppEvent>,
    pub events_rx: mpsc::UnboundedReceiver<AppEvent>,

    pub screen: Screen,
    pub municipalities: Vec<(MunicipalityId, String)>,
    pub municipality_list_index: usize,
    pub selected_municipality: Option<MunicipalityId>,

    pub search_input: String,
    pub search_generation: u64,
    pub search_deadline: Option<Instant>,
    pub search_results: Vec<Address>,
    pub search_list_index: usize,
    pub selected_address: Option<Address>,

    pub grouped: Vec<GroupedSchedule>,
    pub advisory: Option<String>,

    pub is_loading: bool,
    pub error_message: Option<String>,

    pub permission: NotificationPermission,
    pub banner: Option<Notification>,
}

impl App {
    pub(crate) fn new(
        service: Arc<SopkollService>,
        agent: AgentHandle,
        events_tx: mpsc::UnboundedSender<AppEvent>,
        events_rx: mpsc::UnboundedReceiver<AppEvent>,
        permission: NotificationPermission,
    ) -> Self {
        let municipalities = service.municipalities();
        let mut app = Self {
            service,
            agent,
            events_tx,
            events_rx,
            screen: Screen::MunicipalitySelect,
            municipalities,
            municipality_list_index: 0,
            selected_municipality: None,
            search_input: String::new(),
            search_generation: 0,
            search_deadline: None,
            search_results: Vec::new(),
            search_list_index: 0,
            selected_address: None,
            grouped: Vec::new(),
            advisory: None,
            is_loading: false,
            error_message: None,
            permission,
            banner: None,
        };

        // A single registered municipality needs no select screen.
        if app.municipalities.len() == 1 {
            app.select_current_municipality();
        }
        app
    }

    pub(crate) fn select_current_municipality(&mut self) {
        if let Some((id, _name)) = self.municipalities.get(self.municipality_list_index) {
            self.selected_municipality = Some(id.clone());
            self.screen = Screen::AddressSearch;
        }
    }

    pub(crate) fn select_current_address(&mut self) -> Option<Address> {
        let address = self.search_results.get(self.search_list_index).cloned()?;
        self.selected_address = Some(address.clone());
        self.screen = Screen::ScheduleView;
        Some(address)
    }

    /// Record a keystroke: bump the request generation (any in-flight
    /// result becomes stale) and restart the quiet period.
    pub(crate) fn note_query_edited(&mut self) {
        self.search_generation += 1;
        self.search_deadline = Some(Instant::now() + SEARCH_DEBOUNCE);
        self.error_message = None;
    }

    /// A search whose quiet period has elapsed, if any.
    pub(crate) fn take_due_search(&mut self) -> Option<(u64, String)> {
        let deadline = self.search_deadline?;
        if Instant::now() < deadline {
            return None;
        }
        self.search_deadline = None;
        Some((self.search_generation, self.search_input.clone()))
    }

    pub(crate) fn apply(&mut self, event: AppEvent) {
        match event {
            AppEvent::SearchFinished { generation, result } => {
                // A superseded request's result must never overwrite a
                // newer one.
                if generation != self.search_generation {
                    return;
                }
                self.is_loading = false;
                match result {
                    Ok(addresses) => {
                        self.search_results = addresses;
                        self.search_list_index = 0;
                    }
                    Err(message) => {
                        self.search_results.clear();
                        self.error_message = Some(message);
                    }
                }
            }
            AppEvent::ScheduleFinished { result } => {
                self.is_loading = false;
                match result {
                    Ok(fetch) => {
                        self.grouped = fetch.grouped;
                        self.error_message = None;
                        self.advisory = matches!(fetch.source, ScheduleSource::Cached { .. })
                            .then(|| STALE_ADVISORY.to_owned());
                    }
                    Err(message) => {
                        self.grouped.clear();
                        self.advisory = None;
                        self.error_message = Some(message);
                    }
                }
            }
            // Same-tag notifications replace rather than stack; with one
            // banner slot that falls out for free.
            AppEvent::Notification(notification) => {
                self.banner = Some(notification);
            }
        }
    }
}

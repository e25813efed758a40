//! Terminal UI for sopkoll: search your address, see the pickup schedule,
//! keep it available offline, get day-before and day-of reminders.

mod app;
mod config;
mod input;
mod ui;

use std::{
    io,
    sync::{Arc, Mutex},
    time::Duration as StdDuration,
};

use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event as CEvent},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use reqwest::Client;
use tokio::sync::mpsc;

use sopkoll_agent::{
    Agent, Notification, NotificationPermission, Notifier, OfflineGateway, ReqwestGateway,
};
use sopkoll_core::{
    model::{Address, AddressId, strip_disambiguator},
    plugin::PluginRegistry,
    ports::{AddressQuery, HttpGateway},
    service::SopkollService,
    store::{FileStore, KeyValueStore, NOTIFICATION_PERMISSION_KEY},
};
use sopkoll_provider_ale as ale;

use crate::app::{App, AppEvent, Screen};
use crate::config::Config;
use crate::input::Action;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    init_tracing(&config)?;

    // HTTP + agent + service setup
    let client = Client::builder().user_agent("sopkoll/0.1").build()?;
    let plain_gateway: Arc<dyn HttpGateway> = Arc::new(ReqwestGateway::new(client));

    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(config.store_file())?);
    let permission =
        NotificationPermission::from_stored(store.get(NOTIFICATION_PERMISSION_KEY)?.as_deref());

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let notifier: Arc<dyn Notifier> = Arc::new(ChannelNotifier {
        tx: events_tx.clone(),
    });

    let agent_config = config.agent_config();
    let (agent, bucket) = Agent::spawn(Arc::clone(&plain_gateway), notifier, &agent_config)?;
    let _client_guard = agent.register_client();

    // All provider traffic goes through the offline cache policy.
    let gateway: Arc<dyn HttpGateway> = Arc::new(OfflineGateway::new(
        plain_gateway,
        bucket,
        agent_config.api_marker.clone(),
    ));

    let plugins = vec![ale::plugin(gateway)];
    let registry = Arc::new(PluginRegistry::new(plugins));
    let service = Arc::new(SopkollService::new(registry, store));

    // Re-arm on startup when reminders were enabled before; arming is
    // idempotent on the agent side.
    if permission == NotificationPermission::Granted {
        agent.schedule_notifications();
    }

    // App state
    let mut app = App::new(service, agent, events_tx, events_rx, permission);
    restore_last_address(&mut app);

    // Terminal init
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run event loop
    let res = run(&mut terminal, app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    res
}

async fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, mut app: App) -> Result<()> {
    loop {
        // Draw current UI
        terminal.draw(|frame| ui::draw(frame, &app))?;

        // Deliver background results before reading input.
        while let Ok(app_event) = app.events_rx.try_recv() {
            app.apply(app_event);
        }

        // Fire a debounced search once its quiet period has elapsed.
        if let Some((generation, query)) = app.take_due_search() {
            app.is_loading = true;
            spawn_search(&app, generation, query);
        }

        // Poll for input (non-blocking, small timeout to keep CPU low)
        if event::poll(StdDuration::from_millis(100))?
            && let CEvent::Key(key) = event::read()?
        {
            let action = input::handle_key_event(key, &mut app);

            match action {
                Action::Quit => break,
                Action::None => {}
                Action::SelectAddress => {
                    let Some(address) = app.select_current_address() else {
                        app.error_message = Some("Inga adresser hittades".into());
                        continue;
                    };

                    if let Err(err) = app.service.set_address(&address.id.0) {
                        tracing::warn!(%err, "failed to persist selected address");
                    }

                    app.grouped.clear();
                    app.advisory = None;
                    app.error_message = None;
                    app.is_loading = true;
                    spawn_schedule_fetch(&app, address);
                }
                Action::Refresh => {
                    // Concurrent refreshes are not guarded; each completed
                    // fetch replaces the whole view.
                    if let Some(address) = app.selected_address.clone() {
                        app.is_loading = true;
                        spawn_schedule_fetch(&app, address);
                    }
                }
                Action::ChangeAddress => {
                    app.screen = Screen::AddressSearch;
                    app.search_input.clear();
                    app.search_results.clear();
                    app.search_list_index = 0;
                }
                Action::EnableNotifications => {
                    if app.permission != NotificationPermission::Denied {
                        app.permission = NotificationPermission::Granted;
                        if let Err(err) = app
                            .service
                            .store()
                            .set(NOTIFICATION_PERMISSION_KEY, app.permission.as_str())
                        {
                            tracing::warn!(%err, "failed to persist notification permission");
                        }
                        app.agent.schedule_notifications();
                    }
                }
                Action::OpenNotification => {
                    // Click transition: close the notification, focus the
                    // root schedule view instead of opening anything new.
                    app.banner = None;
                    if app.selected_address.is_some() {
                        app.screen = Screen::ScheduleView;
                    }
                }
            }
        }
    }

    Ok(())
}

/// Jump straight to the schedule view when a previous session left an
/// address behind.
fn restore_last_address(app: &mut App) {
    let saved = match app.service.last_address() {
        Ok(Some(saved)) => saved,
        Ok(None) => return,
        Err(err) => {
            tracing::warn!(%err, "failed to read persisted address");
            return;
        }
    };

    let Some(municipality) = app.selected_municipality.clone() else {
        return;
    };

    let address = Address {
        id: AddressId(saved.clone()),
        municipality,
        label: strip_disambiguator(&saved),
    };
    app.selected_address = Some(address.clone());
    app.screen = Screen::ScheduleView;
    app.is_loading = true;
    spawn_schedule_fetch(app, address);
}

fn spawn_search(app: &App, generation: u64, query: String) {
    let Some(municipality) = app.selected_municipality.clone() else {
        return;
    };
    let service = Arc::clone(&app.service);
    let tx = app.events_tx.clone();

    tokio::spawn(async move {
        let result = service
            .search_addresses(municipality, AddressQuery::new(query))
            .await
            .map_err(|err| {
                tracing::warn!(%err, "address search failed");
                "Sökningen misslyckades".to_owned()
            });
        tx.send(AppEvent::SearchFinished { generation, result }).ok();
    });
}

fn spawn_schedule_fetch(app: &App, address: Address) {
    let service = Arc::clone(&app.service);
    let tx = app.events_tx.clone();

    tokio::spawn(async move {
        let result = service
            .schedule_for(address.municipality.clone(), &address.id)
            .await
            .map_err(|err| {
                tracing::warn!(%err, "schedule fetch failed");
                "Kunde inte hämta sophämtningsschema".to_owned()
            });
        tx.send(AppEvent::ScheduleFinished { result }).ok();
    });
}

/// Bridge from the agent's notification surface into the app event loop.
struct ChannelNotifier {
    tx: mpsc::UnboundedSender<AppEvent>,
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        if self.tx.send(AppEvent::Notification(notification)).is_err() {
            tracing::debug!("app event channel closed, dropping notification");
        }
    }
}

// The TUI owns stdout, so logs go to a file.
fn init_tracing(config: &Config) -> Result<()> {
    let path = config.log_file();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

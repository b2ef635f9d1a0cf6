use canvas::MapView;
use clap::Parser;
use client::HttpClient;
use config::DashboardConfig;
use geotrackcore::control::{
    execute, CollaboratorError, CompletionStatus, CooperativeScheduler, FetchRequest,
    FetchResult, FetchTicket, LocationStore, ViewModeController,
};
use geotrackcore::model::User;
use geotrackcore::render::{MountOutcome, RenderEngine, StylePreset};
use geotrackcore::ViewMode;
use iced::{
    time,
    widget::{button, canvas::Canvas, column, row, scrollable, text, text_input, Column, Container},
    Alignment, Element, Length, Subscription, Task, Theme,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use summary::{devices, last_update, recent_rows, status_line, StatusInputs};
use surface::CanvasSurface;

mod canvas;
mod client;
mod config;
mod projection;
mod summary;
mod surface;

#[derive(Parser)]
#[command(author, version, about = "GeoTrack location dashboard")]
struct Args {
    /// Load the dashboard config from YAML
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value = "http://127.0.0.1:9000")]
    server: String,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    password: Option<String>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = if let Some(path) = args.config {
        DashboardConfig::load(path)?
    } else {
        DashboardConfig::from_args(args.server, args.email, args.password)
    };

    iced::application(
        move || Dashboard::boot(config.clone()),
        Dashboard::update,
        Dashboard::view,
    )
    .title(application_title)
    .subscription(application_subscription)
    .theme(application_theme)
    .run()
    .map_err(|err| anyhow::anyhow!("running the dashboard window: {err}"))
}

fn application_title(_: &Dashboard) -> String {
    "GeoTrack Dashboard".into()
}

fn application_subscription(state: &Dashboard) -> Subscription<Message> {
    time::every(Duration::from_millis(state.config.tick_ms.max(16))).map(|_| Message::Tick)
}

fn application_theme(_: &Dashboard) -> Theme {
    Theme::Light
}

struct Dashboard {
    config: DashboardConfig,
    client: Arc<HttpClient>,
    controller: ViewModeController<CooperativeScheduler>,
    engine: RenderEngine<CanvasSurface>,
    user: Option<User>,
    login: LoginForm,
    signing_in: bool,
    loaded: bool,
    active_users: Option<usize>,
    last_tick: Instant,
    last_error: Option<String>,
    history: Vec<String>,
}

#[derive(Debug, Clone)]
enum Message {
    Tick,
    EmailChanged(String),
    PasswordChanged(String),
    SignIn,
    SignedIn(Result<User, CollaboratorError>),
    SignOut,
    SignedOut(Result<(), CollaboratorError>),
    ToggleMode,
    StyleSelected(StylePreset),
    Fetched(FetchTicket, FetchResult),
    UsersLoaded(Result<Vec<User>, CollaboratorError>),
}

#[derive(Debug, Clone, Default)]
struct LoginForm {
    email: String,
    password: String,
}

impl Dashboard {
    fn new(config: DashboardConfig) -> Self {
        let surface = CanvasSurface::new(
            config.map.fallback_center,
            f64::from(config.map.fallback_zoom),
        );
        let mut engine = RenderEngine::new(surface, config.map.clone());
        let mut history = Vec::new();
        match engine.mount() {
            Ok(MountOutcome::Unavailable) => history.push("Map could not load".to_string()),
            Ok(_) => {}
            Err(err) => log::error!("mounting map failed: {err}"),
        }
        if let Err(err) = engine.set_style(config.style) {
            log::warn!("applying trail style failed: {err}");
        }

        Self {
            client: Arc::new(HttpClient::new(config.server_url.clone())),
            controller: ViewModeController::new(CooperativeScheduler::new(), config.polling.clone()),
            engine,
            user: None,
            login: LoginForm {
                email: config.email.clone().unwrap_or_default(),
                password: config.password.clone().unwrap_or_default(),
            },
            signing_in: false,
            loaded: false,
            active_users: None,
            last_tick: Instant::now(),
            last_error: None,
            history,
            config,
        }
    }

    fn boot(config: DashboardConfig) -> (Self, Task<Message>) {
        let mut state = Self::new(config);
        let task = match state.config.credentials() {
            Some((email, password)) => state.sign_in(email, password),
            None => Task::none(),
        };
        (state, task)
    }

    fn update(state: &mut Self, message: Message) -> Task<Message> {
        match message {
            Message::Tick => {
                let now = Instant::now();
                let elapsed = now.saturating_duration_since(state.last_tick);
                state.last_tick = now;
                let request = state.controller.advance_coalesced(elapsed);
                state.dispatch_all(request)
            }
            Message::EmailChanged(value) => {
                state.login.email = value;
                Task::none()
            }
            Message::PasswordChanged(value) => {
                state.login.password = value;
                Task::none()
            }
            Message::SignIn => {
                let LoginForm { email, password } = state.login.clone();
                state.sign_in(email, password)
            }
            Message::SignedIn(Ok(user)) => {
                state.signing_in = false;
                state.last_error = None;
                state.push_history(format!("Signed in as {}", user.email));
                state.user = Some(user);
                state.loaded = false;
                let first = state.controller.start();
                Task::batch([state.dispatch_all(first), state.load_users()])
            }
            Message::SignedIn(Err(err)) => {
                state.signing_in = false;
                state.last_error = Some(format!("Sign-in failed: {err}"));
                Task::none()
            }
            Message::SignOut => {
                state.controller.shutdown();
                state.controller = ViewModeController::new(
                    CooperativeScheduler::new(),
                    state.config.polling.clone(),
                );
                if let Err(err) = state.engine.update(&[], ViewMode::Historical) {
                    log::warn!("clearing map failed: {err}");
                }
                state.user = None;
                state.loaded = false;
                state.active_users = None;
                state.push_history("Signed out".into());
                let client = state.client.clone();
                Task::perform(async move { client.logout().await }, Message::SignedOut)
            }
            Message::SignedOut(result) => {
                if let Err(err) = result {
                    log::warn!("server logout failed: {err}");
                }
                Task::none()
            }
            Message::ToggleMode => {
                if state.user.is_none() {
                    return Task::none();
                }
                state.loaded = false;
                let request = state.controller.toggle_mode();
                let mode = state.controller.current_mode();
                state.push_history(format!("Switched to {} view", mode.label()));
                let users = if mode == ViewMode::Historical {
                    state.load_users()
                } else {
                    Task::none()
                };
                Task::batch([state.dispatch_all(request), users])
            }
            Message::StyleSelected(preset) => {
                if let Err(err) = state.engine.set_style(preset) {
                    log::warn!("applying trail style failed: {err}");
                }
                Task::none()
            }
            Message::Fetched(ticket, result) => {
                state.apply_fetch(ticket, result);
                Task::none()
            }
            Message::UsersLoaded(Ok(users)) => {
                state.active_users = Some(users.len());
                Task::none()
            }
            Message::UsersLoaded(Err(err)) => {
                log::warn!("active users unavailable: {err}");
                state.active_users = None;
                Task::none()
            }
        }
    }

    fn apply_fetch(&mut self, ticket: FetchTicket, result: FetchResult) -> CompletionStatus {
        let failure = result.as_ref().err().map(ToString::to_string);
        let status = self.controller.complete(ticket, result);
        if status != CompletionStatus::Applied {
            log::debug!("fetch {:?} not applied: {:?}", ticket, status);
            return status;
        }

        self.loaded = true;
        if let Some(message) = failure {
            self.last_error = Some(message);
        } else {
            self.last_error = None;
        }
        match self
            .engine
            .update(self.controller.points(), self.controller.current_mode())
        {
            Ok(report) if report.failures > 0 => {
                self.push_history(format!("Render pass had {} layer failures", report.failures))
            }
            Ok(_) => {}
            Err(err) => log::error!("render skipped: {err}"),
        }
        status
    }

    fn sign_in(&mut self, email: String, password: String) -> Task<Message> {
        if email.trim().is_empty() || password.is_empty() {
            self.last_error = Some("Email and password are required".into());
            return Task::none();
        }
        self.signing_in = true;
        let client = self.client.clone();
        Task::perform(
            async move { client.login(email.trim(), &password).await },
            Message::SignedIn,
        )
    }

    fn load_users(&self) -> Task<Message> {
        let client = self.client.clone();
        Task::perform(
            async move { client.active_users().await },
            Message::UsersLoaded,
        )
    }

    fn dispatch_all(&self, requests: impl IntoIterator<Item = FetchRequest>) -> Task<Message> {
        Task::batch(requests.into_iter().map(|request| {
            let client = self.client.clone();
            Task::perform(
                execute(request, client.clone(), client),
                |(ticket, result)| Message::Fetched(ticket, result),
            )
        }))
    }

    fn push_history(&mut self, entry: String) {
        self.history.push(entry);
        if self.history.len() > 20 {
            self.history.remove(0);
        }
    }

    fn status(&self) -> String {
        if let Some(error) = &self.last_error {
            return error.clone();
        }
        status_line(StatusInputs {
            mode: self.controller.current_mode(),
            points: self.controller.points(),
            loading: self.controller.is_loading(),
            loaded: self.loaded,
            map_notice: self.engine.notice(),
            poll_interval: self.controller.config().poll_interval(),
            window_hours: self.controller.config().window_hours,
        })
    }

    fn view(state: &Self) -> Element<'_, Message> {
        let account: Element<'_, Message> = match &state.user {
            Some(user) => column![
                text(format!("{} <{}>", user.name, user.email)).size(14),
                button("Sign out").on_press(Message::SignOut).padding(6),
            ]
            .spacing(6)
            .into(),
            None => {
                let submit = if state.signing_in {
                    button("Signing in...").padding(8)
                } else {
                    button("Sign in").on_press(Message::SignIn).padding(8)
                };
                column![
                    text_input("Email", &state.login.email)
                        .on_input(Message::EmailChanged)
                        .padding(6),
                    text_input("Password", &state.login.password)
                        .on_input(Message::PasswordChanged)
                        .on_submit(Message::SignIn)
                        .secure(true)
                        .padding(6),
                    submit,
                ]
                .spacing(8)
                .into()
            }
        };

        let mode = state.controller.current_mode();
        let toggle_label = format!("Switch to {}", mode.toggled().label());
        let toggle = if state.user.is_some() {
            button(text(toggle_label)).on_press(Message::ToggleMode).padding(8)
        } else {
            button(text(toggle_label)).padding(8)
        };

        let styles = StylePreset::ALL.iter().fold(row![].spacing(6), |row, preset| {
            let label = if *preset == state.engine.style() {
                format!("[{}]", preset.name())
            } else {
                preset.name().to_string()
            };
            row.push(
                button(text(label).size(12))
                    .on_press(Message::StyleSelected(*preset))
                    .padding(6),
            )
        });

        let points = state.controller.points();
        let device_list = devices(points);
        let mut stats = column![
            text(format!("Mode: {}", mode.label())).size(16),
            text(format!(
                "Active users: {}",
                state
                    .active_users
                    .map(|count| count.to_string())
                    .unwrap_or_else(|| "-".into())
            ))
            .size(14),
            text(format!("Locations loaded: {}", points.len())).size(14),
            text(format!(
                "Devices: {}",
                if device_list.is_empty() {
                    "-".to_string()
                } else {
                    device_list.join(", ")
                }
            ))
            .size(14),
        ]
        .spacing(4);
        if mode == ViewMode::Live {
            if let Some(at) = last_update(points) {
                stats = stats.push(
                    text(format!("Last update: {}", at.format("%Y-%m-%d %H:%M:%S UTC"))).size(14),
                );
            }
        }

        let metrics = state.engine.metrics().snapshot();
        let polling = state.controller.metrics().snapshot();
        let history_list = if state.history.is_empty() {
            Column::new().push(text("No activity yet").size(12))
        } else {
            state
                .history
                .iter()
                .rev()
                .fold(Column::new().spacing(4), |col, entry| {
                    col.push(text(entry.clone()).size(12))
                })
        };

        let side = column![
            text("GeoTrack").size(26),
            account,
            toggle,
            text("Trail style").size(16),
            styles,
            stats,
            text(state.status()).size(14),
            text(format!(
                "renders {} · layer failures {} · fetches {} ok / {} failed / {} stale",
                metrics.renders,
                metrics.layer_failures,
                polling.fetches_applied,
                polling.fetch_failures,
                polling.stale_results
            ))
            .size(11),
            text("Activity log").size(16),
            Container::new(scrollable(history_list).height(Length::Fixed(140.0))).padding(6),
        ]
        .spacing(10)
        .padding(16)
        .width(Length::Fixed(320.0));

        let map = Canvas::new(MapView::new(state.engine.surface(), Instant::now()))
            .width(Length::Fill)
            .height(Length::Fill);

        let rows = recent_rows(points);
        let table = if rows.is_empty() {
            Column::new().push(text("No recent points").size(12))
        } else {
            rows.into_iter().fold(
                Column::new().spacing(2).push(
                    text("device · position · accuracy · time").size(12),
                ),
                |col, row| {
                    col.push(
                        text(format!(
                            "{} · {} · {} · {}",
                            row.device, row.position, row.accuracy, row.when
                        ))
                        .size(12),
                    )
                },
            )
        };

        let main = column![
            map,
            text("Recent points").size(16),
            Container::new(table).padding(6),
        ]
        .spacing(8)
        .padding(16)
        .width(Length::Fill);

        let layout = row![side, main]
            .spacing(12)
            .align_y(Alignment::Start)
            .padding(12);

        Container::new(layout)
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }
}

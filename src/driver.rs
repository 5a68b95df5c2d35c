//! The UI driver: attach lifecycle, notification routing and geometry.
//!
//! [`UiDriver`] consumes [`SessionEvent`]s one at a time. Anything that
//! has to wait on the engine (buffer fetches, resizes, context lookups)
//! runs in a spawned task with the values captured when it was
//! triggered, so the event loop keeps draining notifications.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rmpv::Value;
use tokio::sync::mpsc;

use crate::attach::{attach, AttachCapabilities};
use crate::bell::{ProcessSoundPlayer, SoundPlayer};
use crate::buffer::{BufferSynchronizer, BufferUpdate};
use crate::config::Config;
use crate::context::EventContext;
use crate::error::DriverError;
use crate::events::{DriverEvents, EditorEvent};
use crate::geometry::{FontMeasurer, Geometry, GeometryCoordinator, MonospaceMeasurer, ResizeOutcome};
use crate::nvim::value::as_string;
use crate::nvim::{NvimApi, Session, SessionEvent};
use crate::plugin::{self, PluginNotification};
use crate::redraw::{interpret, RedrawEvent, RedrawSink, UiAction};
use crate::scroll::ScrollDebouncer;

/// Grid used for attach when no geometry is known yet.
const FALLBACK_GRID: (i64, i64) = (24, 80);

struct State {
    geometry: GeometryCoordinator,
    capabilities: Option<AttachCapabilities>,
}

struct Inner {
    session: Arc<dyn Session>,
    config: Config,
    events: DriverEvents,
    state: Mutex<State>,
    /// Last grid the engine was told about. Held across the resize request
    /// so resizes reach the engine one at a time.
    sent_grid: tokio::sync::Mutex<Option<(i64, i64)>>,
    leaving: AtomicBool,
    buffers: BufferSynchronizer,
    scroll: ScrollDebouncer,
    sound_player: Option<Box<dyn SoundPlayer>>,
}

/// Builder for [`UiDriver`] with replaceable collaborators.
pub struct UiDriverBuilder {
    session: Arc<dyn Session>,
    config: Config,
    font_measurer: Option<Box<dyn FontMeasurer>>,
    sound_player: Option<Box<dyn SoundPlayer>>,
}

impl UiDriverBuilder {
    /// Measure fonts with `measurer` instead of the monospace estimate.
    pub fn font_measurer(mut self, measurer: impl FontMeasurer + 'static) -> Self {
        self.font_measurer = Some(Box::new(measurer));
        self
    }

    /// Play bell sounds with `player` instead of the configured program.
    pub fn sound_player(mut self, player: impl SoundPlayer + 'static) -> Self {
        self.sound_player = Some(Box::new(player));
        self
    }

    pub fn build(self) -> UiDriver {
        let config = self.config;
        let measurer = self.font_measurer.unwrap_or_else(|| {
            Box::new(MonospaceMeasurer {
                width_ratio: config.font.cell_width_ratio,
            })
        });
        let sound_player = self.sound_player.or_else(|| {
            config.bell.sound.as_ref().map(|_| {
                Box::new(ProcessSoundPlayer::new(config.bell.player.clone()))
                    as Box<dyn SoundPlayer>
            })
        });

        let mut geometry = GeometryCoordinator::new(measurer, config.debug.fixed_size);
        geometry.set_font(
            &config.font.family,
            config.font.size,
            config.font.line_padding,
            false,
        );

        UiDriver {
            inner: Arc::new(Inner {
                session: self.session,
                events: DriverEvents::new(),
                state: Mutex::new(State {
                    geometry,
                    capabilities: None,
                }),
                sent_grid: tokio::sync::Mutex::new(None),
                leaving: AtomicBool::new(false),
                buffers: BufferSynchronizer::new(config.buffer.max_lines),
                scroll: ScrollDebouncer::new(Duration::from_millis(config.ui.scroll_debounce_ms)),
                sound_player,
                config,
            }),
        }
    }
}

/// Client-side driver for one engine session. Cheap to clone.
#[derive(Clone)]
pub struct UiDriver {
    inner: Arc<Inner>,
}

impl UiDriver {
    pub fn new(session: Arc<dyn Session>, config: Config) -> Self {
        Self::builder(session, config).build()
    }

    pub fn builder(session: Arc<dyn Session>, config: Config) -> UiDriverBuilder {
        UiDriverBuilder {
            session,
            config,
            font_measurer: None,
            sound_player: None,
        }
    }

    /// Feeds to subscribe to.
    pub fn events(&self) -> &DriverEvents {
        &self.inner.events
    }

    pub fn session(&self) -> &Arc<dyn Session> {
        &self.inner.session
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn geometry(&self) -> Geometry {
        self.state().geometry.geometry()
    }

    /// Capabilities negotiated on attach, `None` before.
    pub fn capabilities(&self) -> Option<AttachCapabilities> {
        self.state().capabilities
    }

    pub fn is_attached(&self) -> bool {
        self.capabilities().is_some()
    }

    /// Whether the engine is shutting down on purpose.
    pub fn is_leaving(&self) -> bool {
        self.inner.leaving.load(Ordering::Acquire)
    }

    /// Negotiate capabilities and attach with the current grid, then
    /// source the init file if one is configured.
    pub async fn start(&self) -> Result<AttachCapabilities, DriverError> {
        let (rows, cols) = {
            let geometry = self.geometry();
            if geometry.rows > 0 && geometry.cols > 0 {
                (geometry.rows, geometry.cols)
            } else {
                FALLBACK_GRID
            }
        };

        let capabilities = attach(self.inner.session.as_ref(), cols, rows).await?;
        {
            let mut sent = self.inner.sent_grid.lock().await;
            *sent = Some((rows, cols));
            self.state().capabilities = Some(capabilities);
        }
        tracing::info!(rows, cols, ?capabilities, "UI attached");

        // Geometry may have moved while the attach was in flight.
        sync_grid(&self.inner).await?;

        if let Some(init_file) = self.inner.config.nvim.resolved_init_file() {
            self.source_init_file(&init_file).await?;
        }
        Ok(capabilities)
    }

    async fn source_init_file(&self, path: &Path) -> Result<(), DriverError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        if !tokio::fs::try_exists(path).await? {
            tracing::debug!(path = %path.display(), "No init file to source");
            return Ok(());
        }
        let escaped = path.display().to_string().replace(' ', "\\ ");
        tracing::info!(path = %path.display(), "Sourcing init file");
        self.inner
            .session
            .command(&format!("source {}", escaped))
            .await
    }

    /// Ask the engine to exit. The disconnect that follows is not an error.
    pub async fn quit(&self) -> Result<(), DriverError> {
        self.inner.leaving.store(true, Ordering::Release);
        match self.inner.session.command("qa!").await {
            Ok(()) | Err(DriverError::ChannelClosed) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Change the font and recompute the grid.
    pub fn set_font(&self, family: &str, size: f64, line_padding: f64) -> ResizeOutcome {
        let outcome = {
            let mut state = self.state();
            let attached = state.capabilities.is_some();
            state.geometry.set_font(family, size, line_padding, attached)
        };
        self.apply_resize(outcome);
        outcome
    }

    /// Record a new pixel size for the UI area.
    pub fn resize(&self, width_px: f64, height_px: f64) -> ResizeOutcome {
        let outcome = {
            let mut state = self.state();
            let attached = state.capabilities.is_some();
            state.geometry.resize(width_px, height_px, attached)
        };
        self.apply_resize(outcome);
        outcome
    }

    fn apply_resize(&self, outcome: ResizeOutcome) {
        if let ResizeOutcome::Apply { rows, cols } = outcome {
            tracing::debug!(rows, cols, "Resizing UI");
            let inner = Arc::clone(&self.inner);
            self.spawn_reporting(async move { sync_grid(&inner).await });
        }
    }

    /// Process session events until the channel disconnects.
    pub async fn run(&self, mut events: mpsc::UnboundedReceiver<SessionEvent>) {
        while let Some(event) = events.recv().await {
            let disconnected = matches!(event, SessionEvent::Disconnect);
            self.handle_event(event);
            if disconnected {
                break;
            }
        }
    }

    /// Process one session event.
    pub fn handle_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::Notification { method, args } => match method.as_str() {
                "redraw" => interpret(&args, &mut DriverSink { driver: self }),
                "oni_plugin_notify" => self.handle_plugin(&args),
                _ => tracing::warn!(method = %method, "Unknown notification"),
            },
            SessionEvent::Request {
                method, responder, ..
            } => {
                tracing::warn!(method = %method, "Unknown request from Neovim");
                responder.respond(Err(Value::from(format!("Unknown request: {}", method))));
            }
            SessionEvent::Disconnect => {
                if self.is_leaving() {
                    tracing::info!("Neovim exited");
                } else {
                    self.inner.events.report(DriverError::UnexpectedDisconnect);
                }
            }
        }
    }

    fn handle_plugin(&self, args: &[Value]) {
        let notification = match plugin::decode(args) {
            Ok(notification) => notification,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed plugin notification");
                return;
            }
        };

        let events = &self.inner.events;
        match notification {
            PluginNotification::BufferUpdate {
                context,
                start_line,
                end_line,
            } => {
                let driver = self.clone();
                self.spawn_reporting(async move {
                    let inner = &driver.inner;
                    let update = inner
                        .buffers
                        .on_full_update(inner.session.as_ref(), context, start_line, end_line)
                        .await?;
                    if let Some(update) = update {
                        inner.events.buffer_update.emit(update);
                    }
                    Ok(())
                });
            }
            PluginNotification::IncrementalBufferUpdate {
                context,
                line_content,
                line_number,
            } => events.buffer_update.emit(BufferUpdate::Incremental {
                context,
                line_number,
                line_content,
            }),
            PluginNotification::Yank(info) => events.yank.emit(info),
            PluginNotification::Command(command) => events.external_command.emit(command),
            PluginNotification::Event { name, context } => {
                match name.as_str() {
                    "DirChanged" => self.refresh_directory(),
                    "VimLeave" => {
                        self.inner.leaving.store(true, Ordering::Release);
                        events.leave.emit(());
                    }
                    _ => {}
                }
                let event = EditorEvent { name, context };
                events.autocommand.emit(event.clone());
                events.event.emit(event);
            }
            PluginNotification::Unknown(method) => {
                tracing::warn!(method = %method, "Unknown plugin notification")
            }
        }
    }

    fn refresh_directory(&self) {
        let driver = self.clone();
        self.spawn_reporting(async move {
            let cwd = driver.inner.session.eval("getcwd()").await?;
            let cwd = normalize_path(&as_string(&cwd, "working directory")?);
            tracing::debug!(cwd = %cwd, "Working directory changed");
            driver.inner.events.directory_changed.emit(cwd);
            Ok(())
        });
    }

    fn schedule_scroll_settled(&self) {
        let driver = self.clone();
        self.inner.scroll.schedule(move || async move {
            match driver
                .inner
                .session
                .call_function("OniGetContext", vec![])
                .await
            {
                Ok(context) => driver
                    .inner
                    .events
                    .scroll_settled
                    .emit(EventContext::new(context)),
                Err(e) => driver.inner.report_background(e),
            }
        });
    }

    fn ring_bell(&self) {
        let (Some(sound), Some(player)) = (&self.inner.config.bell.sound, &self.inner.sound_player)
        else {
            return;
        };
        if let Err(e) = player.play(sound) {
            tracing::debug!(error = %e, "Bell sound failed");
        }
    }

    /// Run `task` in the background and put its error on the error feed.
    fn spawn_reporting<F>(&self, task: F)
    where
        F: Future<Output = Result<(), DriverError>> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            if let Err(e) = task.await {
                inner.report_background(e);
            }
        });
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner.state()
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Report a background task failure. A closed channel while the engine
    /// is leaving is the expected end of the session.
    fn report_background(&self, error: DriverError) {
        if self.leaving.load(Ordering::Acquire) && matches!(error, DriverError::ChannelClosed) {
            tracing::debug!(error = %error, "Ignoring failure during shutdown");
            return;
        }
        self.events.report(error);
    }
}

/// Send the current grid to the engine unless it already has it.
///
/// Always reads the latest geometry, so the last resize to run leaves the
/// engine on the newest grid whatever order the tasks ran in.
async fn sync_grid(inner: &Inner) -> Result<(), DriverError> {
    let mut sent = inner.sent_grid.lock().await;
    let geometry = inner.state().geometry.geometry();
    let grid = (geometry.rows, geometry.cols);
    if grid.0 <= 0 || grid.1 <= 0 || *sent == Some(grid) {
        return Ok(());
    }
    inner.session.ui_try_resize(grid.1, grid.0).await?;
    *sent = Some(grid);
    Ok(())
}

/// Routes interpreter output to the driver's feeds.
struct DriverSink<'a> {
    driver: &'a UiDriver,
}

impl RedrawSink for DriverSink<'_> {
    fn action(&mut self, action: UiAction) {
        self.driver.inner.events.ui_actions.emit(action);
    }

    fn event(&mut self, event: RedrawEvent) {
        let events = &self.driver.inner.events;
        match event {
            RedrawEvent::TitleChanged { title } => events.title.emit(title),
            RedrawEvent::TablineUpdated(state) => events.tabline.emit(state),
            RedrawEvent::ModeChanged { mode } => events.mode_changed.emit(mode),
            RedrawEvent::ShowPopupMenu(state) => events.show_popup_menu.emit(state),
            RedrawEvent::SelectPopupMenu { index } => events.select_popup_menu.emit(index),
            RedrawEvent::HidePopupMenu => events.hide_popup_menu.emit(()),
            RedrawEvent::Scrolled => self.driver.schedule_scroll_settled(),
            RedrawEvent::Bell => self.driver.ring_bell(),
            RedrawEvent::RedrawComplete => events.redraw_complete.emit(()),
        }
    }
}

/// Collapse `.` segments and trailing separators.
fn normalize_path(path: &str) -> String {
    Path::new(path)
        .components()
        .collect::<PathBuf>()
        .display()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FixedSize;
    use crate::nvim::value::string_map;
    use crate::nvim::Responder;
    use crate::testing::{api_info, RecordingSession};
    use tokio::sync::oneshot;

    fn config() -> Config {
        let mut config = Config::default();
        // 10x20 pixel cells
        config.font.size = 20.0;
        config.font.line_padding = 0.0;
        config.font.cell_width_ratio = 0.5;
        config
    }

    fn driver_with(session: &Arc<RecordingSession>, config: Config) -> UiDriver {
        UiDriver::new(Arc::clone(session) as Arc<dyn Session>, config)
    }

    fn attachable() -> Arc<RecordingSession> {
        Arc::new(RecordingSession::new().reply("nvim_get_api_info", api_info(0, 2, 1)))
    }

    fn notification(method: &str, args: Vec<Value>) -> SessionEvent {
        SessionEvent::Notification {
            method: method.to_string(),
            args,
        }
    }

    fn plugin(method: &str, args: Vec<Value>) -> SessionEvent {
        let mut inner = vec![Value::from(method)];
        inner.extend(args);
        notification("oni_plugin_notify", vec![Value::Array(inner)])
    }

    fn ctx(buffer: i64) -> Value {
        string_map([("bufferNumber", Value::from(buffer))])
    }

    // Lets spawned tasks run to completion under paused time.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_vim_leave_then_disconnect_is_clean() {
        let session = attachable();
        let driver = driver_with(&session, config());
        let mut leave = driver.events().leave.subscribe();
        let mut errors = driver.events().error.subscribe();

        driver.handle_event(plugin("event", vec![Value::from("VimLeave"), ctx(1)]));
        driver.handle_event(SessionEvent::Disconnect);

        assert_eq!(leave.try_recv(), Ok(()));
        assert!(errors.try_recv().is_err());
        assert!(driver.is_leaving());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_disconnect_reports_once() {
        let session = attachable();
        let driver = driver_with(&session, config());
        let mut leave = driver.events().leave.subscribe();
        let mut errors = driver.events().error.subscribe();

        driver.handle_event(SessionEvent::Disconnect);

        let error = errors.try_recv().unwrap();
        assert!(matches!(*error, DriverError::UnexpectedDisconnect));
        assert!(errors.try_recv().is_err());
        assert!(leave.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resize_sends_one_rpc_per_grid_change() {
        let session = attachable();
        let driver = driver_with(&session, config());
        driver.start().await.unwrap();

        assert_eq!(
            driver.resize(800.0, 400.0),
            ResizeOutcome::Apply { rows: 20, cols: 80 }
        );
        assert_eq!(driver.resize(805.0, 410.0), ResizeOutcome::Unchanged);
        settle().await;

        assert_eq!(
            session.calls_to("nvim_ui_try_resize"),
            vec![vec![Value::from(80), Value::from(20)]]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_resize_before_attach_is_recorded() {
        let session = attachable();
        let driver = driver_with(&session, config());

        assert_eq!(
            driver.resize(1000.0, 600.0),
            ResizeOutcome::Recorded {
                rows: 30,
                cols: 100
            }
        );
        settle().await;
        assert!(session.calls().is_empty());

        driver.start().await.unwrap();
        let attach = session.calls_to("nvim_ui_attach");
        assert_eq!(attach[0][0], Value::from(100));
        assert_eq!(attach[0][1], Value::from(30));
        assert!(session.calls_to("nvim_ui_try_resize").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_without_geometry_uses_fallback_grid() {
        let session = attachable();
        let driver = driver_with(&session, config());

        let caps = driver.start().await.unwrap();

        assert!(caps.ext_tabline);
        assert!(driver.is_attached());
        let attach = session.calls_to("nvim_ui_attach");
        assert_eq!(attach[0][0], Value::from(80));
        assert_eq!(attach[0][1], Value::from(24));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_rejects_unsupported_version() {
        let session = Arc::new(RecordingSession::new().reply("nvim_get_api_info", api_info(0, 1, 5)));
        let driver = driver_with(&session, config());

        let result = driver.start().await;

        assert!(matches!(result, Err(DriverError::UnsupportedVersion { .. })));
        assert!(!driver.is_attached());
        assert!(session.calls_to("nvim_ui_attach").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_size_override() {
        let session = attachable();
        let mut config = config();
        config.debug.fixed_size = Some(FixedSize { rows: 50, cols: 132 });
        let driver = driver_with(&session, config);

        driver.start().await.unwrap();

        let attach = session.calls_to("nvim_ui_attach");
        assert_eq!(attach[0][0], Value::from(132));
        assert_eq!(attach[0][1], Value::from(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_sources_existing_init_file() {
        let dir = tempfile::tempdir().unwrap();
        let init_file = dir.path().join("oni").join("init.vim");
        std::fs::create_dir_all(init_file.parent().unwrap()).unwrap();
        std::fs::write(&init_file, "set number\n").unwrap();

        let session = attachable();
        let mut config = config();
        config.nvim.init_file = Some(init_file.clone());
        let driver = driver_with(&session, config);
        driver.start().await.unwrap();

        assert_eq!(
            session.calls_to("nvim_command"),
            vec![vec![Value::from(format!("source {}", init_file.display()))]]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_init_file_creates_directory_only() {
        let dir = tempfile::tempdir().unwrap();
        let init_file = dir.path().join("config").join("init.vim");

        let session = attachable();
        let mut config = config();
        config.nvim.init_file = Some(init_file.clone());
        let driver = driver_with(&session, config);
        driver.start().await.unwrap();

        assert!(init_file.parent().unwrap().is_dir());
        assert!(session.calls_to("nvim_command").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_incremental_update_is_emitted_without_rpc() {
        let session = attachable();
        let driver = driver_with(&session, config());
        let mut updates = driver.events().buffer_update.subscribe();

        driver.handle_event(plugin(
            "incremental_buffer_update",
            vec![ctx(3), Value::from("foo"), Value::from(7)],
        ));

        assert_eq!(
            updates.try_recv().unwrap(),
            BufferUpdate::Incremental {
                context: EventContext::new(ctx(3)),
                line_number: 7,
                line_content: "foo".into(),
            }
        );
        settle().await;
        assert!(session.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_update_respects_ceiling() {
        let session = Arc::new(
            RecordingSession::new()
                .reply("nvim_buf_get_lines", Value::Array(vec![Value::from("x")])),
        );
        let driver = driver_with(&session, config());
        let mut updates = driver.events().buffer_update.subscribe();

        driver.handle_event(plugin(
            "buffer_update",
            vec![ctx(3), Value::from(1), Value::from(5001)],
        ));
        settle().await;
        assert!(session.calls().is_empty());
        assert!(updates.try_recv().is_err());

        driver.handle_event(plugin(
            "buffer_update",
            vec![ctx(3), Value::from(1), Value::from(5000)],
        ));
        settle().await;
        assert_eq!(
            session.calls_to("nvim_buf_get_lines"),
            vec![vec![
                Value::from(3),
                Value::from(0),
                Value::from(5000),
                Value::from(false)
            ]]
        );
        assert_eq!(
            updates.try_recv().unwrap(),
            BufferUpdate::Full {
                context: EventContext::new(ctx(3)),
                lines: vec!["x".into()],
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_fetch_goes_to_error_feed() {
        let session = Arc::new(RecordingSession::new().fail("nvim_buf_get_lines", "Invalid buffer id"));
        let driver = driver_with(&session, config());
        let mut errors = driver.events().error.subscribe();

        driver.handle_event(plugin(
            "buffer_update",
            vec![ctx(9), Value::from(1), Value::from(10)],
        ));
        settle().await;

        assert!(matches!(*errors.try_recv().unwrap(), DriverError::Engine(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_redraw_reaches_feeds() {
        let session = attachable();
        let driver = driver_with(&session, config());
        let mut actions = driver.events().ui_actions.subscribe();
        let mut complete = driver.events().redraw_complete.subscribe();
        let mut titles = driver.events().title.subscribe();
        let mut modes = driver.events().mode_changed.subscribe();

        driver.handle_event(notification(
            "redraw",
            vec![
                Value::Array(vec![
                    Value::from("cursor_goto"),
                    Value::Array(vec![Value::from(1), Value::from(2)]),
                ]),
                Value::Array(vec![
                    Value::from("set_title"),
                    Value::Array(vec![Value::from("main.rs")]),
                ]),
                Value::Array(vec![
                    Value::from("mode_change"),
                    Value::Array(vec![Value::from("normal"), Value::from(0)]),
                    Value::Array(vec![Value::from("insert"), Value::from(1)]),
                ]),
            ],
        ));

        assert_eq!(
            actions.try_recv().unwrap(),
            UiAction::CursorGoto { row: 1, col: 2 }
        );
        assert_eq!(
            actions.try_recv().unwrap(),
            UiAction::ChangeMode {
                mode: "insert".into()
            }
        );
        assert_eq!(titles.try_recv().unwrap(), "main.rs");
        assert_eq!(modes.try_recv().unwrap(), "insert");
        assert_eq!(complete.try_recv(), Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scroll_burst_settles_once() {
        let session = Arc::new(
            RecordingSession::new().reply("nvim_call_function", ctx(5)),
        );
        let driver = driver_with(&session, config());
        let mut settled = driver.events().scroll_settled.subscribe();
        let scroll = || {
            notification(
                "redraw",
                vec![Value::Array(vec![
                    Value::from("scroll"),
                    Value::Array(vec![Value::from(1)]),
                ])],
            )
        };

        for _ in 0..3 {
            driver.handle_event(scroll());
        }
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(
            session.calls_to("nvim_call_function"),
            vec![vec![Value::from("OniGetContext"), Value::Array(vec![])]]
        );
        assert_eq!(settled.try_recv().unwrap().buffer_number(), Some(5));
        assert!(settled.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dir_changed_refreshes_cwd() {
        let session = Arc::new(
            RecordingSession::new().reply("nvim_eval", Value::from("/home/user/./project/")),
        );
        let driver = driver_with(&session, config());
        let mut dirs = driver.events().directory_changed.subscribe();
        let mut autocommands = driver.events().autocommand.subscribe();
        let mut all = driver.events().event.subscribe();

        driver.handle_event(plugin("event", vec![Value::from("DirChanged"), ctx(1)]));
        settle().await;

        assert_eq!(dirs.try_recv().unwrap(), "/home/user/project");
        assert_eq!(autocommands.try_recv().unwrap().name, "DirChanged");
        assert_eq!(all.try_recv().unwrap().name, "DirChanged");
        assert_eq!(
            session.calls_to("nvim_eval"),
            vec![vec![Value::from("getcwd()")]]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_command_and_yank_routing() {
        let session = attachable();
        let driver = driver_with(&session, config());
        let mut commands = driver.events().external_command.subscribe();
        let mut yanks = driver.events().yank.subscribe();

        driver.handle_event(plugin("oni_command", vec![Value::from("oni.editor.split")]));
        driver.handle_event(plugin(
            "oni_yank",
            vec![string_map([
                ("operator", Value::from("y")),
                ("regcontents", Value::Array(vec![Value::from("abc")])),
            ])],
        ));
        driver.handle_event(plugin("oni_mystery", vec![]));

        assert_eq!(commands.try_recv().unwrap(), "oni.editor.split");
        assert_eq!(yanks.try_recv().unwrap().regcontents, vec!["abc"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_engine_request_gets_error_reply() {
        let session = attachable();
        let driver = driver_with(&session, config());
        let (tx, rx) = oneshot::channel();

        driver.handle_event(SessionEvent::Request {
            method: "oni_request".into(),
            args: vec![],
            responder: Responder::new(move |result| {
                let _ = tx.send(result);
            }),
        });

        let reply = rx.await.unwrap();
        assert_eq!(reply, Err(Value::from("Unknown request: oni_request")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_quit_marks_leaving() {
        let session = attachable();
        let driver = driver_with(&session, config());

        driver.quit().await.unwrap();

        assert!(driver.is_leaving());
        assert_eq!(
            session.calls_to("nvim_command"),
            vec![vec![Value::from("qa!")]]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_disconnect() {
        let session = attachable();
        let driver = driver_with(&session, config());
        let mut complete = driver.events().redraw_complete.subscribe();
        let (tx, rx) = mpsc::unbounded_channel();

        tx.send(notification("redraw", vec![])).unwrap();
        tx.send(SessionEvent::Disconnect).unwrap();
        tx.send(notification("redraw", vec![])).unwrap();
        driver.run(rx).await;

        assert_eq!(complete.try_recv(), Ok(()));
        assert!(complete.try_recv().is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_resizes_leave_engine_on_latest_grid() {
        for _ in 0..50 {
            let session = attachable();
            let driver = driver_with(&session, config());
            driver.start().await.unwrap();

            for width in [800.0, 900.0, 1000.0, 1100.0] {
                driver.resize(width, 400.0);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;

            let resizes = session.calls_to("nvim_ui_try_resize");
            assert_eq!(
                resizes.last(),
                Some(&vec![Value::from(110), Value::from(20)])
            );
            assert!(resizes.windows(2).all(|pair| pair[0] != pair[1]));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_channel_after_vim_leave_is_quiet() {
        let session = Arc::new(RecordingSession::new().closed("nvim_buf_get_lines"));
        let driver = driver_with(&session, config());
        let mut errors = driver.events().error.subscribe();
        let mut leave = driver.events().leave.subscribe();

        driver.handle_event(plugin("event", vec![Value::from("VimLeave"), ctx(1)]));
        driver.handle_event(plugin(
            "buffer_update",
            vec![ctx(1), Value::from(1), Value::from(10)],
        ));
        settle().await;
        driver.handle_event(SessionEvent::Disconnect);

        assert_eq!(leave.try_recv(), Ok(()));
        assert!(errors.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_channel_without_leave_is_reported() {
        let session = Arc::new(RecordingSession::new().closed("nvim_call_function"));
        let driver = driver_with(&session, config());
        let mut errors = driver.events().error.subscribe();

        driver.handle_event(notification(
            "redraw",
            vec![Value::Array(vec![
                Value::from("scroll"),
                Value::Array(vec![Value::from(1)]),
            ])],
        ));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(matches!(
            *errors.try_recv().unwrap(),
            DriverError::ChannelClosed
        ));
    }

    #[derive(Clone, Default)]
    struct RecordingPlayer {
        plays: Arc<Mutex<Vec<PathBuf>>>,
        fail: bool,
    }

    impl SoundPlayer for RecordingPlayer {
        fn play(&self, sound: &Path) -> Result<(), DriverError> {
            self.plays.lock().unwrap().push(sound.to_path_buf());
            if self.fail {
                return Err(DriverError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no player",
                )));
            }
            Ok(())
        }
    }

    fn bells() -> SessionEvent {
        notification(
            "redraw",
            vec![
                Value::Array(vec![Value::from("bell"), Value::Array(vec![])]),
                Value::Array(vec![Value::from("visual_bell"), Value::Array(vec![])]),
            ],
        )
    }

    fn with_bell_sound() -> Config {
        let mut config = config();
        config.bell.sound = Some(PathBuf::from("/usr/share/sounds/bell.oga"));
        config
    }

    #[tokio::test(start_paused = true)]
    async fn test_bell_plays_configured_sound() {
        let player = RecordingPlayer::default();
        let driver = UiDriver::builder(attachable() as Arc<dyn Session>, with_bell_sound())
            .sound_player(player.clone())
            .build();

        driver.handle_event(bells());

        assert_eq!(
            *player.plays.lock().unwrap(),
            vec![
                PathBuf::from("/usr/share/sounds/bell.oga"),
                PathBuf::from("/usr/share/sounds/bell.oga")
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_bell_without_sound_is_silent() {
        let player = RecordingPlayer::default();
        let driver = UiDriver::builder(attachable() as Arc<dyn Session>, config())
            .sound_player(player.clone())
            .build();

        driver.handle_event(bells());

        assert!(player.plays.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_bell_player_failure_is_swallowed() {
        let player = RecordingPlayer {
            fail: true,
            ..Default::default()
        };
        let driver = UiDriver::builder(attachable() as Arc<dyn Session>, with_bell_sound())
            .sound_player(player.clone())
            .build();
        let mut errors = driver.events().error.subscribe();
        let mut complete = driver.events().redraw_complete.subscribe();

        driver.handle_event(bells());
        settle().await;

        assert_eq!(player.plays.lock().unwrap().len(), 2);
        assert!(errors.try_recv().is_err());
        assert_eq!(complete.try_recv(), Ok(()));
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/a/./b/"), "/a/b");
        assert_eq!(normalize_path("/a/b"), "/a/b");
    }
}

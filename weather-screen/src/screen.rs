use std::{io::Write, sync::Arc};

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, warn};
use weather_core::{FetchError, WeatherRecord, WeatherSource, fetch_async, fetch_blocking};

/// Which call form a trigger uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum FetchMode {
    /// Blocking fetch on a worker thread.
    Sync,
    /// Non-blocking fetch with a completion callback.
    Async,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScreenState {
    Idle,
    Loading,
    Shown(WeatherRecord),
    Failed(String),
}

/// Everything the screen reacts to. Workers only ever send
/// `Completed`; the state itself is touched by the event loop alone.
#[derive(Debug)]
pub enum ScreenMsg {
    Trigger(FetchMode),
    Completed(Result<WeatherRecord, FetchError>),
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Redraw,
    Unchanged,
    Quit,
}

/// What is visible for a given state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    pub controls_enabled: bool,
    pub progress_visible: bool,
    pub container_visible: bool,
    pub fields: Option<[String; 3]>,
    pub notice: Option<String>,
}

#[derive(Debug)]
pub struct WeatherScreen {
    source: Arc<dyn WeatherSource>,
    temperature_label: &'static str,
    state: ScreenState,
    tx: UnboundedSender<ScreenMsg>,
    rx: UnboundedReceiver<ScreenMsg>,
}

impl WeatherScreen {
    pub fn new(source: Arc<dyn WeatherSource>, temperature_label: &'static str) -> Self {
        let (tx, rx) = unbounded_channel();
        Self { source, temperature_label, state: ScreenState::Idle, tx, rx }
    }

    /// Handle for feeding user input into the screen from another thread.
    pub fn sender(&self) -> UnboundedSender<ScreenMsg> {
        self.tx.clone()
    }

    pub fn state(&self) -> &ScreenState {
        &self.state
    }

    pub fn handle(&mut self, msg: ScreenMsg) -> Flow {
        match msg {
            ScreenMsg::Quit => Flow::Quit,
            ScreenMsg::Trigger(mode) => {
                if self.state == ScreenState::Loading {
                    warn!(?mode, "fetch already in flight, trigger ignored");
                    return Flow::Unchanged;
                }
                self.start_fetch(mode);
                Flow::Redraw
            }
            ScreenMsg::Completed(result) => {
                if self.state != ScreenState::Loading {
                    debug!("dropping result that arrived outside of loading");
                    return Flow::Unchanged;
                }
                self.state = match result {
                    Ok(record) => ScreenState::Shown(record),
                    Err(e) => ScreenState::Failed(e.to_string()),
                };
                Flow::Redraw
            }
        }
    }

    fn start_fetch(&mut self, mode: FetchMode) {
        // Any previous record is dropped here.
        self.state = ScreenState::Loading;
        let source = self.source.clone();
        let tx = self.tx.clone();

        match mode {
            FetchMode::Sync => {
                tokio::task::spawn_blocking(move || {
                    let result = fetch_blocking(source.as_ref());
                    let _ = tx.send(ScreenMsg::Completed(result));
                });
            }
            FetchMode::Async => {
                fetch_async(source, move |result| {
                    let _ = tx.send(ScreenMsg::Completed(result));
                });
            }
        }
    }

    pub fn view(&self) -> View {
        let idle = View {
            controls_enabled: true,
            progress_visible: false,
            container_visible: false,
            fields: None,
            notice: None,
        };

        match &self.state {
            ScreenState::Idle => idle,
            ScreenState::Loading => {
                View { controls_enabled: false, progress_visible: true, ..idle }
            }
            ScreenState::Shown(record) => View {
                container_visible: true,
                fields: Some(field_lines(record, self.temperature_label)),
                ..idle
            },
            ScreenState::Failed(message) => View { notice: Some(message.clone()), ..idle },
        }
    }

    /// Waits for the next message and applies it.
    pub async fn step(&mut self) -> Flow {
        match self.rx.recv().await {
            Some(msg) => self.handle(msg),
            // The screen holds a sender itself, so this only happens on teardown.
            None => Flow::Quit,
        }
    }

    /// Event loop: applies messages until `Quit`, redrawing after each change.
    pub async fn run<W: Write>(&mut self, out: &mut W) -> std::io::Result<()> {
        render(&self.view(), out)?;
        loop {
            match self.step().await {
                Flow::Quit => return Ok(()),
                Flow::Unchanged => {}
                Flow::Redraw => render(&self.view(), out)?,
            }
        }
    }

    /// Triggers a single fetch and waits for it to settle.
    pub async fn run_once(&mut self, mode: FetchMode) -> &ScreenState {
        self.handle(ScreenMsg::Trigger(mode));
        while self.state == ScreenState::Loading {
            if self.step().await == Flow::Quit {
                break;
            }
        }
        &self.state
    }
}

pub fn field_lines(record: &WeatherRecord, temperature_label: &str) -> [String; 3] {
    [
        format!("Temperature : {} {}", record.temperature(), temperature_label),
        format!("Pressure : {}", record.pressure()),
        format!("Humidity : {}", record.humidity()),
    ]
}

pub fn render<W: Write>(view: &View, out: &mut W) -> std::io::Result<()> {
    if view.progress_visible {
        writeln!(out, "Loading...")?;
    }
    if let Some(notice) = &view.notice {
        writeln!(out, "! {notice}")?;
    }
    if let Some(fields) = view.fields.as_ref().filter(|_| view.container_visible) {
        for line in fields {
            writeln!(out, "{line}")?;
        }
    }
    if view.controls_enabled {
        writeln!(out, "[s] fetch synchronously  [a] fetch asynchronously  [q] quit")?;
    }
    out.flush()
}

/// Maps one line of keyboard input to a message.
pub fn parse_command(line: &str) -> Option<ScreenMsg> {
    match line.trim().to_ascii_lowercase().as_str() {
        "s" | "sync" => Some(ScreenMsg::Trigger(FetchMode::Sync)),
        "a" | "async" => Some(ScreenMsg::Trigger(FetchMode::Async)),
        "q" | "quit" | "exit" => Some(ScreenMsg::Quit),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Notify;

    #[derive(Debug)]
    struct Canned(Result<WeatherRecord, FetchError>);

    #[async_trait]
    impl WeatherSource for Canned {
        async fn fetch(&self) -> Result<WeatherRecord, FetchError> {
            self.0.clone()
        }
    }

    /// Holds every fetch until released.
    #[derive(Debug, Default)]
    struct Gated(Notify);

    #[async_trait]
    impl WeatherSource for Gated {
        async fn fetch(&self) -> Result<WeatherRecord, FetchError> {
            self.0.notified().await;
            Ok(WeatherRecord::new(1.0, 2.0, 3.0))
        }
    }

    /// Collects output and asks the screen to quit once the record is drawn.
    struct QuitOnFields {
        buf: Vec<u8>,
        tx: Option<UnboundedSender<ScreenMsg>>,
    }

    impl Write for QuitOnFields {
        fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
            self.buf.extend_from_slice(data);
            if self.buf.windows(8).any(|w| w == b"Humidity") {
                if let Some(tx) = self.tx.take() {
                    tx.send(ScreenMsg::Quit).expect("screen alive");
                }
            }
            Ok(data.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn london() -> WeatherRecord {
        WeatherRecord::new(15.5, 1012.0, 80.0)
    }

    fn canned_screen(result: Result<WeatherRecord, FetchError>) -> WeatherScreen {
        WeatherScreen::new(Arc::new(Canned(result)), "Celsius")
    }

    async fn settle(screen: &mut WeatherScreen) -> Flow {
        tokio::time::timeout(Duration::from_secs(5), screen.step())
            .await
            .expect("fetch settles")
    }

    #[test]
    fn starts_idle_with_controls_enabled() {
        let screen = canned_screen(Ok(london()));

        assert_eq!(screen.state(), &ScreenState::Idle);
        let view = screen.view();
        assert!(view.controls_enabled);
        assert!(!view.progress_visible);
        assert!(!view.container_visible);
    }

    #[tokio::test]
    async fn async_success_shows_three_fields() {
        let mut screen = canned_screen(Ok(london()));

        assert_eq!(screen.handle(ScreenMsg::Trigger(FetchMode::Async)), Flow::Redraw);
        let view = screen.view();
        assert!(view.progress_visible);
        assert!(!view.controls_enabled);
        assert!(!view.container_visible);

        assert_eq!(settle(&mut screen).await, Flow::Redraw);
        assert_eq!(screen.state(), &ScreenState::Shown(london()));

        let view = screen.view();
        assert!(view.container_visible);
        assert!(view.controls_enabled);
        assert!(!view.progress_visible);
        assert_eq!(
            view.fields,
            Some([
                "Temperature : 15.5 Celsius".to_string(),
                "Pressure : 1012".to_string(),
                "Humidity : 80".to_string(),
            ])
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sync_success_shows_record() {
        let mut screen = canned_screen(Ok(london()));

        let state = screen.run_once(FetchMode::Sync).await;
        assert_eq!(state, &ScreenState::Shown(london()));
    }

    #[tokio::test]
    async fn network_failure_restores_controls() {
        let err = FetchError::Network("operation timed out".into());
        let mut screen = canned_screen(Err(err));

        let state = screen.run_once(FetchMode::Async).await;
        assert_eq!(state, &ScreenState::Failed("operation timed out".into()));

        let view = screen.view();
        assert!(view.controls_enabled);
        assert!(!view.progress_visible);
        assert!(!view.container_visible);
        assert_eq!(view.notice.as_deref(), Some("operation timed out"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn decode_failure_restores_controls_in_both_modes() {
        for mode in [FetchMode::Sync, FetchMode::Async] {
            let mut screen = canned_screen(Err(FetchError::Decode("missing field `pressure`".into())));

            let state = screen.run_once(mode).await.clone();
            assert!(matches!(state, ScreenState::Failed(_)), "{mode:?} gave {state:?}");

            let view = screen.view();
            assert!(view.controls_enabled, "{mode:?}");
            assert!(!view.container_visible, "{mode:?}");
        }
    }

    #[tokio::test]
    async fn trigger_while_loading_is_ignored() {
        let source = Arc::new(Gated::default());
        let mut screen = WeatherScreen::new(source.clone(), "Celsius");

        screen.handle(ScreenMsg::Trigger(FetchMode::Async));
        assert_eq!(screen.handle(ScreenMsg::Trigger(FetchMode::Async)), Flow::Unchanged);
        assert_eq!(screen.state(), &ScreenState::Loading);

        source.0.notify_one();
        assert_eq!(settle(&mut screen).await, Flow::Redraw);
        assert_eq!(screen.state(), &ScreenState::Shown(WeatherRecord::new(1.0, 2.0, 3.0)));
    }

    #[tokio::test]
    async fn new_trigger_discards_previous_record() {
        let mut screen = canned_screen(Ok(london()));
        screen.run_once(FetchMode::Async).await;

        screen.handle(ScreenMsg::Trigger(FetchMode::Async));
        assert_eq!(screen.state(), &ScreenState::Loading);
        assert_eq!(screen.view().fields, None);

        settle(&mut screen).await;
        assert_eq!(screen.state(), &ScreenState::Shown(london()));
    }

    #[test]
    fn stray_completion_is_dropped() {
        let mut screen = canned_screen(Ok(london()));

        let flow = screen.handle(ScreenMsg::Completed(Ok(london())));

        assert_eq!(flow, Flow::Unchanged);
        assert_eq!(screen.state(), &ScreenState::Idle);
    }

    #[tokio::test]
    async fn run_renders_until_quit() {
        let mut screen = canned_screen(Ok(london()));
        let tx = screen.sender();
        tx.send(ScreenMsg::Trigger(FetchMode::Async)).expect("screen alive");

        let mut out = QuitOnFields { buf: Vec::new(), tx: Some(tx) };
        tokio::time::timeout(Duration::from_secs(5), screen.run(&mut out))
            .await
            .expect("screen quits after drawing the record")
            .expect("render");

        let text = String::from_utf8(out.buf).expect("utf8");
        assert!(text.contains("Loading..."));
        assert!(text.contains("Temperature : 15.5 Celsius\nPressure : 1012\nHumidity : 80\n"));
    }

    #[test]
    fn render_failed_view_shows_notice_and_controls() {
        let view = View {
            controls_enabled: true,
            progress_visible: false,
            container_visible: false,
            fields: None,
            notice: Some("connection refused".into()),
        };
        let mut out = Vec::new();

        render(&view, &mut out).expect("render");

        let text = String::from_utf8(out).expect("utf8");
        assert_eq!(
            text,
            "! connection refused\n[s] fetch synchronously  [a] fetch asynchronously  [q] quit\n"
        );
    }

    #[test]
    fn parse_command_maps_keys() {
        assert!(matches!(parse_command("s"), Some(ScreenMsg::Trigger(FetchMode::Sync))));
        assert!(matches!(parse_command(" A \n"), Some(ScreenMsg::Trigger(FetchMode::Async))));
        assert!(matches!(parse_command("q"), Some(ScreenMsg::Quit)));
        assert!(parse_command("refresh").is_none());
    }
}

use anyhow::Result;
use belltower_core::bell::{auto_bell_due, should_ring, BellTrigger};
use belltower_core::clock::ScreenClock;
use belltower_core::models::{Asset, Schedule, Screen};
use belltower_core::sync::ChangeEvent;
use belltower_core::{resolve_status, CurrentStatus};
use chrono::NaiveDateTime;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::sync::watch;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

use crate::bell::BellPlayer;
use crate::channel::{dispatch, Reaction, Subscription};
use crate::playlist::{MediaSurface, PlaylistFeed, NO_MEDIA_MESSAGE};
use crate::store::ScreenStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Idle, no audio until an operator starts the display.
    NotStarted,
    Started,
}

/// Rows a session pulls from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refetch {
    Screen = 0,
    Schedules = 1,
    Assets = 2,
}

impl Refetch {
    fn label(self) -> &'static str {
        match self {
            Refetch::Screen => "screen",
            Refetch::Schedules => "schedules",
            Refetch::Assets => "assets",
        }
    }
}

enum Rows {
    Screen(Screen),
    Schedules(Vec<Schedule>),
    Assets(Vec<Asset>),
}

/// Outcome of one store read, tagged with the order it was issued in.
pub struct Fetched {
    what: Refetch,
    seq: u64,
    rows: Result<Rows>,
}

async fn fetch(store: Arc<dyn ScreenStore>, screen_id: String, what: Refetch, seq: u64) -> Fetched {
    let rows = match what {
        Refetch::Screen => store.fetch_screen(&screen_id).await.map(Rows::Screen),
        Refetch::Schedules => store.fetch_schedules(&screen_id).await.map(Rows::Schedules),
        Refetch::Assets => store.fetch_assets(&screen_id).await.map(Rows::Assets),
    };
    Fetched { what, seq, rows }
}

/// Blocks on an operator confirmation. The bell stays silent until then.
pub async fn wait_for_start_gesture(screen_id: String) -> Result<bool> {
    use dialoguer::{theme::ColorfulTheme, Confirm};

    let confirmed = tokio::task::spawn_blocking(move || {
        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Start display for {}? (enables bell audio)", screen_id))
            .default(true)
            .interact()
    })
    .await??;
    Ok(confirmed)
}

/// State of one classroom screen: cached timetable, derived status, bell
/// debounce and the playlist feed.
pub struct ScreenSession {
    screen_id: String,
    store: Arc<dyn ScreenStore>,
    bell: Arc<dyn BellPlayer>,
    status_surface: Option<Arc<dyn MediaSurface>>,
    timezone_override: Option<String>,
    clock: ScreenClock,
    phase: SessionPhase,
    schedules: Vec<Schedule>,
    status: CurrentStatus,
    last_auto_bell: Option<Instant>,
    playlist: watch::Sender<PlaylistFeed>,
    restart_epoch: u64,
    fetch_seq: u64,
    /// Newest applied `seq` per `Refetch` kind.
    applied_seq: [u64; 3],
}

impl ScreenSession {
    pub fn new(
        screen_id: String,
        store: Arc<dyn ScreenStore>,
        bell: Arc<dyn BellPlayer>,
        playlist: watch::Sender<PlaylistFeed>,
    ) -> Self {
        Self {
            screen_id,
            store,
            bell,
            status_surface: None,
            timezone_override: None,
            clock: ScreenClock::Local,
            phase: SessionPhase::NotStarted,
            schedules: Vec::new(),
            status: CurrentStatus::default(),
            last_auto_bell: None,
            playlist,
            restart_epoch: 0,
            fetch_seq: 0,
            applied_seq: [0; 3],
        }
    }

    /// Mirrors the status line onto the screen.
    pub fn with_status_surface(mut self, surface: Arc<dyn MediaSurface>) -> Self {
        self.status_surface = Some(surface);
        self
    }

    /// Uses this timezone instead of the one stored on the screen row.
    pub fn with_timezone(mut self, timezone: Option<String>) -> Self {
        if let Some(tz) = &timezone {
            match ScreenClock::parse(tz) {
                Ok(clock) => self.clock = clock,
                Err(e) => tracing::warn!("Ignoring configured timezone: {}", e),
            }
        }
        self.timezone_override = timezone;
        self
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn status(&self) -> &CurrentStatus {
        &self.status
    }

    pub fn schedules(&self) -> &[Schedule] {
        &self.schedules
    }

    pub fn last_auto_bell(&self) -> Option<Instant> {
        self.last_auto_bell
    }

    /// Leaves `NotStarted`: test-plays the bell and loads everything.
    pub async fn start(&mut self) {
        if self.phase == SessionPhase::Started {
            return;
        }
        self.phase = SessionPhase::Started;
        tracing::info!("Display {} started", self.screen_id);
        self.bell.ring();

        for what in self.everything() {
            self.refresh(what).await;
        }
    }

    /// Reads `what` from the store and applies it in place.
    pub async fn refresh(&mut self, what: Refetch) {
        let fetched = self.next_fetch(what).await;
        self.apply(fetched);
    }

    fn everything(&self) -> Vec<Refetch> {
        let mut all = Vec::with_capacity(3);
        // A configured timezone wins over the screen row
        if self.timezone_override.is_none() {
            all.push(Refetch::Screen);
        }
        all.push(Refetch::Schedules);
        all.push(Refetch::Assets);
        all
    }

    fn next_fetch(&mut self, what: Refetch) -> impl Future<Output = Fetched> + Send + 'static {
        self.fetch_seq += 1;
        fetch(self.store.clone(), self.screen_id.clone(), what, self.fetch_seq)
    }

    fn spawn_fetch(
        &mut self,
        what: Refetch,
        results: &UnboundedSender<Fetched>,
        cancel: CancellationToken,
    ) {
        let fetch = self.next_fetch(what);
        let results = results.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                fetched = fetch => {
                    let _ = results.send(fetched);
                }
            }
        });
    }

    /// Applies a finished read. Results older than one already applied for
    /// the same rows are dropped.
    fn apply(&mut self, fetched: Fetched) {
        let newest = &mut self.applied_seq[fetched.what as usize];
        if fetched.seq < *newest {
            tracing::debug!("Dropping stale {} fetch #{}", fetched.what.label(), fetched.seq);
            return;
        }
        *newest = fetched.seq;

        match fetched.rows {
            Ok(Rows::Screen(screen)) => match ScreenClock::parse(&screen.timezone) {
                Ok(clock) => self.clock = clock,
                Err(e) => tracing::warn!("Screen {}: {}, keeping previous clock", screen.id, e),
            },
            Ok(Rows::Schedules(schedules)) => {
                tracing::info!("Loaded {} schedule row(s)", schedules.len());
                self.schedules = schedules;
            }
            Ok(Rows::Assets(assets)) => {
                tracing::info!("Loaded {} asset(s)", assets.len());
                self.playlist.send_replace(PlaylistFeed {
                    assets,
                    restart_epoch: self.restart_epoch,
                });
            }
            Err(e) => tracing::error!(
                "Failed to fetch {} for {}: {}",
                fetched.what.label(),
                self.screen_id,
                e
            ),
        }
    }

    /// Drops caches, resets the bell debounce and restarts the playlist from
    /// the first item. The caller refetches.
    fn reset(&mut self) {
        tracing::info!("Reloading display {}", self.screen_id);

        self.schedules.clear();
        self.status = CurrentStatus::default();
        self.last_auto_bell = None;
        self.restart_epoch += 1;
        self.playlist.send_replace(PlaylistFeed {
            assets: Vec::new(),
            restart_epoch: self.restart_epoch,
        });
    }

    /// Hard refresh: `reset` followed by a full refetch.
    pub async fn reload(&mut self) {
        self.reset();
        for what in self.everything() {
            self.refresh(what).await;
        }
    }

    /// Re-evaluates the status at `wall` and fires the auto-bell when a
    /// boundary is due. `mono` feeds the debounce.
    pub fn tick(&mut self, wall: NaiveDateTime, mono: Instant) {
        let status = resolve_status(&self.schedules, wall);

        if status.summary() != self.status.summary() {
            tracing::info!("{}", status.summary());
        }
        if status.is_urgent() && status.minutes_to_bell != self.status.minutes_to_bell {
            tracing::warn!("Class ends in {} minutes", status.minutes_to_bell);
        }
        if let Some(surface) = &self.status_surface {
            if let Err(e) = surface.show_status(&self.status_line(&status)) {
                tracing::debug!("Failed to show status: {}", e);
            }
        }

        if self.phase == SessionPhase::Started
            && auto_bell_due(&status)
            && should_ring(BellTrigger::Auto, self.last_auto_bell, mono)
        {
            tracing::info!("Period boundary reached");
            self.bell.ring();
            self.last_auto_bell = Some(mono);
        }

        self.status = status;
    }

    /// The OSD has one text slot, so the empty-playlist notice rides along.
    fn status_line(&self, status: &CurrentStatus) -> String {
        let mut line = status.summary();
        if self.playlist.borrow().assets.is_empty() {
            line.push('\n');
            line.push_str(NO_MEDIA_MESSAGE);
        }
        line
    }

    /// Handles the parts of an event that need no I/O and returns the reads
    /// it still calls for.
    fn react(&mut self, event: &ChangeEvent) -> Vec<Refetch> {
        let reaction = dispatch(event);
        tracing::debug!("{:?}/{:?} -> {:?}", event.stream, event.kind, reaction);

        match reaction {
            Reaction::RefetchAssets => vec![Refetch::Assets],
            Reaction::RefetchSchedules => vec![Refetch::Schedules],
            Reaction::Ring => {
                if should_ring(BellTrigger::Remote, self.last_auto_bell, Instant::now()) {
                    tracing::info!("Remote bell");
                    self.bell.ring();
                }
                Vec::new()
            }
            Reaction::Reload => {
                self.reset();
                self.everything()
            }
            Reaction::Ignore => Vec::new(),
        }
    }

    /// Handles `event` and waits for any refetch it triggers.
    pub async fn handle_event(&mut self, event: ChangeEvent) {
        for what in self.react(&event) {
            self.refresh(what).await;
        }
    }

    /// Event loop. Store reads run on their own tasks and report back, so the
    /// tick keeps firing while they are in flight. Runs until `shutdown` fires
    /// or the transport goes away, then releases the subscription.
    pub async fn run(mut self, mut subscription: Subscription, shutdown: CancellationToken) {
        let mut tick = interval(Duration::from_secs(1));
        let (results_tx, mut results_rx) = mpsc::unbounded_channel::<Fetched>();
        let fetches = shutdown.child_token();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tick.tick() => {
                    let wall = self.clock.now();
                    self.tick(wall, Instant::now());
                }
                Some(fetched) = results_rx.recv() => self.apply(fetched),
                event = subscription.next() => match event {
                    Some(event) => {
                        for what in self.react(&event) {
                            self.spawn_fetch(what, &results_tx, fetches.clone());
                        }
                    }
                    None => {
                        tracing::warn!("Realtime transport ended");
                        break;
                    }
                },
            }
        }

        fetches.cancel();
        subscription.release();
        tracing::info!("Display {} session ended", self.screen_id);
    }
}

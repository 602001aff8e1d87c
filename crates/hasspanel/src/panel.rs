//! Panel worker.
//!
//! All requests run on a dedicated tokio task so the caller never waits on
//! the network. Commands are handled one at a time, so at most one request
//! is in flight. Results come back as `PanelEvent`s.
//!
//! Refresh requests coalesce: while one is queued, further requests are
//! dropped, so a ticker faster than the server never grows the queue.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::client::HassApi;
use crate::config::PanelConfig;
use crate::discovery;
use crate::entity::Domain;
use crate::entity::EntityRecord;
use crate::entity::EntityState;
use crate::util;

/// Capacity for the worker→caller event channel
const EVENT_CHANNEL_SIZE: usize = 64;

/// Entity ids the user chose to show. An empty list shows everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub switches: Vec<String>,
    pub sensors: Vec<String>,
}

impl From<&PanelConfig> for Selection {
    fn from(config: &PanelConfig) -> Self {
        Self {
            switches: config.switches.clone(),
            sensors: config.sensors.clone(),
        }
    }
}

fn select(records: Vec<EntityRecord>, allowed: &[String]) -> Vec<EntityRecord> {
    if allowed.is_empty() {
        return records;
    }
    records
        .into_iter()
        .filter(|r| allowed.contains(&r.entity_id))
        .collect()
}

/// A sensor together with its latest state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorReading {
    pub record: EntityRecord,
    pub state: String,
}

/// Events reported by the panel worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelEvent {
    /// The set of shown switches and lights changed
    TogglesChanged(Vec<EntityRecord>),

    /// The set of shown sensors changed
    SensorsChanged(Vec<EntityRecord>),

    /// Current values of every shown sensor, sent after each refresh
    SensorValues(Vec<SensorReading>),

    /// A toggle request was accepted by the server
    Toggled { entity_id: String },

    /// A toggle request failed
    ToggleFailed { entity_id: String, error: String },
}

#[derive(Debug)]
enum Command {
    Refresh,
    Toggle(String),
    Shutdown,
}

/// Background worker state
pub struct Panel<A: HassApi> {
    api: Arc<A>,
    base_url: String,
    selection: Selection,
    /// Ids from the previous refresh; `None` until the first one
    toggle_ids: Option<Vec<String>>,
    sensor_ids: Option<Vec<String>>,
    /// Set while a `Refresh` sits in the command queue
    refresh_pending: Arc<AtomicBool>,
    events: mpsc::Sender<PanelEvent>,
}

/// Handle for sending commands to a running panel worker
pub struct PanelHandle {
    commands: mpsc::UnboundedSender<Command>,
    refresh_pending: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

/// Queue a refresh unless one is already waiting. Returns false once the
/// worker is gone.
fn queue_refresh(commands: &mpsc::UnboundedSender<Command>, pending: &AtomicBool) -> bool {
    if pending.swap(true, Ordering::AcqRel) {
        debug!("Refresh already queued, skipping");
        return true;
    }
    commands.send(Command::Refresh).is_ok()
}

impl<A: HassApi + 'static> Panel<A> {
    /// Start the worker task
    ///
    /// Returns a handle for commands and the receiver for events.
    pub fn spawn(
        api: Arc<A>,
        base_url: String,
        selection: Selection,
    ) -> (PanelHandle, mpsc::Receiver<PanelEvent>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
        let refresh_pending = Arc::new(AtomicBool::new(false));

        let panel = Panel {
            api,
            base_url,
            selection,
            toggle_ids: None,
            sensor_ids: None,
            refresh_pending: refresh_pending.clone(),
            events: event_tx,
        };

        let task = tokio::spawn(panel.run(command_rx));

        (
            PanelHandle {
                commands: command_tx,
                refresh_pending,
                task,
            },
            event_rx,
        )
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        info!("Panel worker started for {}", self.base_url);

        while let Some(command) = commands.recv().await {
            debug!("Panel command: {:?}", command);
            let delivered = match command {
                Command::Refresh => {
                    // Cleared before fetching so changes made meanwhile get
                    // their own refresh
                    self.refresh_pending.store(false, Ordering::Release);
                    self.refresh().await
                }
                Command::Toggle(entity_id) => self.toggle(entity_id).await,
                Command::Shutdown => break,
            };

            if !delivered {
                info!("Panel event receiver dropped, stopping worker");
                break;
            }
        }

        info!("Panel worker stopped");
    }

    /// Send an event; returns false once the receiver is gone
    async fn emit(&self, event: PanelEvent) -> bool {
        self.events.send(event).await.is_ok()
    }

    async fn refresh(&mut self) -> bool {
        // Failures degrade to an empty state list
        let states: Vec<EntityState> = match self.api.states(&self.base_url).await {
            Ok(states) => states,
            Err(e) => {
                warn!("Refresh failed, showing no entities: {}", e);
                Vec::new()
            }
        };

        let toggles = select(discovery::toggleable(&states), &self.selection.switches);
        let sensors = select(discovery::sensors(&states), &self.selection.sensors);

        let toggle_ids: Vec<String> = toggles.iter().map(|r| r.entity_id.clone()).collect();
        if !util::equals(self.toggle_ids.as_deref(), Some(toggle_ids.as_slice())) {
            info!("Togglable entities changed ({} shown)", toggles.len());
            self.toggle_ids = Some(toggle_ids);
            if !self.emit(PanelEvent::TogglesChanged(toggles)).await {
                return false;
            }
        }

        let sensor_ids: Vec<String> = sensors.iter().map(|r| r.entity_id.clone()).collect();
        if !util::equals(self.sensor_ids.as_deref(), Some(sensor_ids.as_slice())) {
            info!("Sensors changed ({} shown)", sensors.len());
            self.sensor_ids = Some(sensor_ids);
            if !self.emit(PanelEvent::SensorsChanged(sensors.clone())).await {
                return false;
            }
        }

        let readings = sensors
            .into_iter()
            .filter_map(|record| {
                let state = states
                    .iter()
                    .find(|s| s.entity_id == record.entity_id)?
                    .state
                    .clone();
                Some(SensorReading { record, state })
            })
            .collect();

        self.emit(PanelEvent::SensorValues(readings)).await
    }

    async fn toggle(&mut self, entity_id: String) -> bool {
        if !Domain::of(&entity_id).is_some_and(Domain::is_toggleable) {
            let error = format!("{} is not a switch or light", entity_id);
            warn!("{}", error);
            return self.emit(PanelEvent::ToggleFailed { entity_id, error }).await;
        }

        let event = match self.api.toggle(&self.base_url, &entity_id).await {
            Ok(_) => {
                info!("Toggled {}", entity_id);
                PanelEvent::Toggled { entity_id }
            }
            Err(e) => PanelEvent::ToggleFailed {
                entity_id,
                error: e.to_string(),
            },
        };

        self.emit(event).await
    }
}

impl PanelHandle {
    /// Ask the worker to re-fetch entity states
    ///
    /// Does nothing if a refresh is already queued.
    pub fn refresh(&self) {
        if !queue_refresh(&self.commands, &self.refresh_pending) {
            warn!("Panel worker is not running, refresh dropped");
        }
    }

    /// Ask the worker to toggle an entity
    pub fn toggle(&self, entity_id: impl Into<String>) {
        if self.commands.send(Command::Toggle(entity_id.into())).is_err() {
            warn!("Panel worker is not running, toggle dropped");
        }
    }

    /// Request a refresh every `interval` until the worker stops
    ///
    /// The first refresh is requested immediately. Ticks that land while a
    /// refresh is still queued are skipped.
    pub fn run_periodic(&self, interval: Duration) -> JoinHandle<()> {
        let commands = self.commands.clone();
        let pending = self.refresh_pending.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !queue_refresh(&commands, &pending) {
                    break;
                }
            }
        })
    }

    /// Stop the worker after it finishes queued commands
    pub async fn shutdown(self) {
        let _ = self.commands.send(Command::Shutdown);
        match self.task.await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => info!("Panel worker task cancelled"),
            Err(e) => warn!("Panel worker task error: {}", e),
        }
    }
}

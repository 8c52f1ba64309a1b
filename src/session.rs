//! Exploration session
//!
//! Single owner of the grid, metrics and viewport. Positions come in either
//! directly ([`ExplorationSession::apply_position`]) or from a running
//! [`LocationStream`]; observers follow along through a broadcast channel.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tokio::sync::broadcast;

use crate::core::config::ExplorationConfig;
use crate::core::error::{FogError, Result};
use crate::core::types::{Coordinate, Position};
use crate::exploration::cell::GridCell;
use crate::exploration::grid::ExplorationGrid;
use crate::location::backoff::StreamState;
use crate::location::error::LocationError;
use crate::location::provider::LocationProvider;
use crate::location::stream::{LocationStream, StreamEvent, StreamStatus};
use crate::metrics::coverage;
use crate::metrics::progress::{ExplorationMetrics, MetricsSnapshot};
use crate::render::overlay::{FogOverlay, FogRenderer};
use crate::render::viewport::Viewport;

/// Buffered events per subscriber before the slowest one starts lagging
const EVENT_CAPACITY: usize = 256;

/// Default viewport span when nothing else is known (degrees)
const DEFAULT_SPAN_DEG: f64 = 0.05;

/// Change notifications for the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Position(Position),
    Metrics(MetricsSnapshot),
    StreamState(StreamState),
    Error(LocationError),
    ErrorCleared,
    Reset,
}

/// Persisted exploration history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorationState {
    pub visited_cells: Vec<GridCell>,
    pub total_distance_miles: f64,
    /// Cell size the indices were computed with; absent in older saves
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell_size_deg: Option<f64>,
}

impl ExplorationState {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }
}

/// Owns all mutable exploration state
pub struct ExplorationSession {
    config: ExplorationConfig,
    grid: ExplorationGrid,
    metrics: ExplorationMetrics,
    renderer: FogRenderer,
    viewport: Viewport,
    last_error: Option<LocationError>,
    events: broadcast::Sender<SessionEvent>,
}

impl Default for ExplorationSession {
    fn default() -> Self {
        Self::build(ExplorationConfig::default())
    }
}

impl ExplorationSession {
    /// Validates the config, then starts with an empty history
    pub fn new(config: ExplorationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: ExplorationConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            grid: ExplorationGrid::new(&config.grid),
            metrics: ExplorationMetrics::new(&config.metrics),
            renderer: FogRenderer::new(config.render.clone()),
            viewport: Viewport::around(Coordinate::default(), DEFAULT_SPAN_DEG),
            last_error: None,
            events,
            config,
        }
    }

    pub fn config(&self) -> &ExplorationConfig {
        &self.config
    }

    pub fn grid(&self) -> &ExplorationGrid {
        &self.grid
    }

    pub fn metrics(&self) -> &ExplorationMetrics {
        &self.metrics
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Most recent surfaced location error, until a fix clears it
    pub fn last_error(&self) -> Option<&LocationError> {
        self.last_error.as_ref()
    }

    /// Register an observer. Events published before this call are not
    /// replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: SessionEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    /// Mark the neighborhood, add distance, recompute level.
    /// Invalid coordinates change nothing and publish nothing.
    pub fn apply_position(&mut self, position: &Position) -> MetricsSnapshot {
        if !position.coordinate.is_valid() {
            tracing::warn!(
                "Skipping position with invalid coordinate ({}, {})",
                position.coordinate.lat,
                position.coordinate.lon
            );
            return self.metrics.snapshot();
        }
        let added = self.grid.mark_visited(position.coordinate);
        self.metrics.record_position(position);
        if added > 0 {
            self.metrics.record_visited_cell_count_change(self.grid.len());
            self.metrics.record_explored_area(self.grid.explored_area_m2());
        }

        let snapshot = self.metrics.snapshot();
        self.publish(SessionEvent::Position(*position));
        self.publish(SessionEvent::Metrics(snapshot));
        snapshot
    }

    /// Route one stream event. Returns the new snapshot for positions.
    pub fn handle_stream_event(&mut self, event: StreamEvent) -> Option<MetricsSnapshot> {
        match event {
            StreamEvent::Position(position) => Some(self.apply_position(&position)),
            StreamEvent::StateChanged { to, .. } => {
                self.publish(SessionEvent::StreamState(to));
                None
            }
            StreamEvent::Error(err) => {
                tracing::warn!("Location error: {}", err);
                self.last_error = Some(err.clone());
                self.publish(SessionEvent::Error(err));
                None
            }
            StreamEvent::ErrorCleared => {
                self.last_error = None;
                self.publish(SessionEvent::ErrorCleared);
                None
            }
        }
    }

    /// Consume the stream until it ends. Returns positions applied.
    pub async fn run<P: LocationProvider>(&mut self, stream: &mut LocationStream<P>) -> usize {
        self.run_until(stream, |_| false).await
    }

    /// Consume the stream until it ends or `done` holds for its status.
    /// Events already queued when `done` turns true are still applied.
    pub async fn run_until<P, F>(&mut self, stream: &mut LocationStream<P>, mut done: F) -> usize
    where
        P: LocationProvider,
        F: FnMut(&StreamStatus) -> bool,
    {
        let mut status = stream.watch_status();
        let mut applied = 0;

        loop {
            let current = *status.borrow_and_update();
            if done(&current) {
                while let Some(event) = stream.try_next_event() {
                    if self.handle_stream_event(event).is_some() {
                        applied += 1;
                    }
                }
                break;
            }
            tokio::select! {
                biased;
                event = stream.next_event() => match event {
                    Some(event) => {
                        if self.handle_stream_event(event).is_some() {
                            applied += 1;
                        }
                    }
                    None => break,
                },
                changed = status.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        applied
    }

    /// Overlay for an arbitrary viewport
    pub fn build_overlay(&self, viewport: &Viewport) -> FogOverlay {
        self.renderer.build_overlay(viewport, &self.grid)
    }

    /// Overlay for the session's own viewport
    pub fn current_overlay(&self) -> FogOverlay {
        self.build_overlay(&self.viewport)
    }

    /// Adopt the host map's viewport, spans clamped. Returns true if anything
    /// changed.
    pub fn set_viewport(&mut self, center: Coordinate, lat_span: f64, lon_span: f64) -> bool {
        let center_changed = center != self.viewport.center;
        self.viewport.center = center;
        let span_changed = self
            .viewport
            .set_span(lat_span, lon_span, self.config.render.max_span_deg);
        center_changed || span_changed
    }

    /// Drag the map by a delta in degrees
    pub fn pan_viewport(&mut self, dlat: f64, dlon: f64) {
        self.viewport.pan(dlat, dlon);
    }

    /// Share of the globe currently on screen, percent
    pub fn viewport_visible_percent(&self) -> f64 {
        coverage::viewport_visible_percent(&self.viewport)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn serialize_state(&self) -> ExplorationState {
        ExplorationState {
            visited_cells: self.grid.to_ordered_vec(),
            total_distance_miles: self.metrics.total_distance_miles(),
            cell_size_deg: Some(self.grid.cell_size()),
        }
    }

    /// Replace the history with a saved one. Cells off the globe are dropped.
    pub fn restore_state(&mut self, state: ExplorationState) -> Result<()> {
        if let Some(size) = state.cell_size_deg {
            if (size - self.grid.cell_size()).abs() > f64::EPSILON {
                return Err(FogError::Config(format!(
                    "saved state uses cell size {} but the session uses {}",
                    size,
                    self.grid.cell_size()
                )));
            }
        }

        let cell_size = self.grid.cell_size();
        let total = state.visited_cells.len();
        self.grid.restore(
            state
                .visited_cells
                .into_iter()
                .filter(|cell| cell.is_on_globe(cell_size)),
        );
        if self.grid.len() < total {
            tracing::warn!("Dropped {} cells while restoring", total - self.grid.len());
        }
        self.metrics.restore(
            state.total_distance_miles,
            self.grid.len(),
            self.grid.explored_area_m2(),
        );
        tracing::info!(
            "Restored {} cells, {:.2} mi",
            self.grid.len(),
            self.metrics.total_distance_miles()
        );
        self.publish(SessionEvent::Metrics(self.metrics.snapshot()));
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        self.serialize_state().to_json()
    }

    pub fn from_json(&mut self, json: &str) -> Result<()> {
        self.restore_state(ExplorationState::from_json(json)?)
    }

    /// Forget all history: cells, distance and level
    pub fn reset(&mut self) {
        self.grid.reset();
        self.metrics.reset();
        tracing::info!("Exploration reset");
        self.publish(SessionEvent::Reset);
        self.publish(SessionEvent::Metrics(self.metrics.snapshot()));
    }
}

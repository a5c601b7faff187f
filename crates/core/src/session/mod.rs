use std::{collections::BTreeSet, sync::Arc};

use crate::{
    clock::{ClockAdapter, ClockPosition, TransportCommand},
    config::AppConfig,
    engine::RemapEngine,
    mapping::LedColors,
    midi::ControlId,
    palette::Palette,
    scene::Scene,
    surface::Surface,
    timeline::{SceneChange, Scheduler, Timeline},
    Result,
};

#[derive(Debug)]
struct BeatIndicator {
    control: ControlId,
    colors: LedColors,
    lit: Option<bool>,
}

/// A running performance: one scheduler, one remap engine and the surface
/// they talk to. Clock updates and input events must be fed from a single
/// loop, one at a time.
#[derive(Debug)]
pub struct Session<S: Surface> {
    scheduler: Scheduler,
    engine: RemapEngine,
    surface: S,
    beat: Option<BeatIndicator>,
    touched_strips: BTreeSet<ControlId>,
}

impl<S: Surface> Session<S> {
    pub fn new(timeline: Arc<Timeline>, engine: RemapEngine, surface: S) -> Result<Self> {
        Ok(Self {
            scheduler: Scheduler::new(timeline)?,
            engine,
            surface,
            beat: None,
            touched_strips: BTreeSet::new(),
        })
    }

    /// Assembles a session from application configuration. Fails before
    /// anything is sent to the surface if the configuration is invalid.
    pub fn from_config(
        config: &AppConfig,
        timeline: Arc<Timeline>,
        palette: &Palette,
        surface: S,
    ) -> Result<Self> {
        config.validate()?;
        let engine = RemapEngine::new(config.engine.unmapped)
            .with_passthrough_channel(config.surface.layout.channel)
            .with_fallback(config.transport.mappings());
        let mut session = Self::new(timeline, engine, surface)?;
        if let Some(indicator) = &config.beat_indicator {
            session = session.with_beat_indicator(indicator.control, indicator.colors(palette)?);
        }
        tracing::info!(
            scenes = session.scheduler.timeline().len(),
            unmapped = ?config.engine.unmapped,
            "session ready"
        );
        Ok(session)
    }

    pub fn with_beat_indicator(mut self, control: ControlId, colors: LedColors) -> Self {
        self.beat = Some(BeatIndicator {
            control,
            colors,
            lit: None,
        });
        self
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn engine(&self) -> &RemapEngine {
        &self.engine
    }

    /// Scene input is currently translated against. Before the first clock
    /// update this is the timeline's default scene.
    pub fn active_scene(&self) -> Arc<Scene> {
        self.scheduler
            .active_scene()
            .unwrap_or_else(|| self.scheduler.timeline().default_scene())
            .clone()
    }

    /// Polls `clock` and advances to its position.
    pub fn sync(&mut self, clock: &impl ClockAdapter) -> Result<Option<SceneChange>> {
        self.advance(&clock.current_position())
    }

    /// Re-resolves the active scene. On a change the complete colour batch
    /// for the new scene is submitted to the surface before this returns.
    pub fn advance(&mut self, position: &ClockPosition) -> Result<Option<SceneChange>> {
        let change = self.scheduler.advance(position)?;
        if let Some(change) = &change {
            for update in self.engine.on_scene_change(&change.scene) {
                self.surface.set_color(update.control, update.color);
            }
            if let Some(beat) = &mut self.beat {
                // The scene batch may have painted over the indicator.
                beat.lit = None;
            }
        }
        self.update_beat(position);
        Ok(change)
    }

    fn update_beat(&mut self, position: &ClockPosition) {
        let ppq = self.scheduler.timeline().ppq();
        let scene = self.active_scene();
        let Some(beat) = &mut self.beat else {
            return;
        };
        if scene.mapping(beat.control).is_some() {
            return;
        }

        let lit = (position.ticks / u64::from(ppq)) % 2 == 0;
        if beat.lit != Some(lit) {
            beat.lit = Some(lit);
            let state = if lit {
                beat.colors.active
            } else {
                beat.colors.inactive
            };
            self.surface.set_color(beat.control, state);
        }
    }

    /// Handles one input event from the surface and returns the transport
    /// command it triggered, if any. Touch strips always show their own
    /// position, whatever the scene does with the value.
    pub fn on_raw_input(&mut self, control: ControlId, value: u8) -> Option<TransportCommand> {
        if let ControlId::Strip(_) = control {
            self.surface.set_strip(control, value);
            self.touched_strips.insert(control);
        }

        let scene = self.active_scene();
        let response = self.engine.on_control_event(&scene, control, value);
        if let Some(update) = response.visual {
            self.surface.set_color(update.control, update.color);
        }
        for message in response.midi {
            self.surface.send_midi(message);
        }
        response.transport
    }

    /// Sets every control the session may have lit to `color` and clears
    /// every touch strip that was moved.
    pub fn blackout(&mut self, color: u8) {
        let mut controls: BTreeSet<ControlId> = self
            .scheduler
            .timeline()
            .scenes()
            .iter()
            .flat_map(|scene| {
                scene
                    .illuminated()
                    .map(|(control, _)| control)
                    .collect::<Vec<_>>()
            })
            .collect();
        if let Some(beat) = &mut self.beat {
            controls.insert(beat.control);
            beat.lit = None;
        }

        for control in controls {
            self.surface.set_color(control, color);
        }
        for strip in std::mem::take(&mut self.touched_strips) {
            self.surface.set_strip(strip, 0);
        }
    }
}

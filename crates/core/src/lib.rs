//! Core library for the Traffic Jam controller bridge.
//!
//! A [`Timeline`] of scenes is resolved against the transport position by
//! the [`Scheduler`]; the [`RemapEngine`] translates every input event from
//! the controller surface against the active scene and decides which LED
//! colours to show. A [`Session`] ties both to a [`Surface`] and keeps
//! scene switches and input strictly ordered. Device I/O and the real-time
//! loop live in the application crate.

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod mapping;
pub mod midi;
pub mod notes;
pub mod palette;
pub mod scene;
pub mod session;
pub mod store;
pub mod surface;
pub mod timeline;

pub use clock::{ClockAdapter, ClockPosition, InternalClock, TransportCommand};
pub use config::{
    AppConfig, BeatIndicatorConfig, ClockConfig, EngineConfig, SurfaceConfig, TransportBindings,
};
pub use engine::{ControlResponse, RemapEngine, UnmappedPolicy, VisualUpdate};
pub use error::{Result, TrafficJamError};
pub use mapping::{Action, ButtonState, LedColors, Mapping, ValueRule};
pub use midi::{ControlId, MessageKind, MidiMessage, OutputKind};
pub use palette::Palette;
pub use scene::{Anchor, Scene};
pub use session::Session;
pub use store::{load_timeline, timeline_from_json, TimelineSpec};
pub use surface::{RecordingSurface, Surface, SurfaceLayout};
pub use timeline::{SceneChange, Scheduler, Timeline};

use std::{cmp::Ordering, sync::Arc};

use crate::{
    clock::ClockPosition,
    scene::{Anchor, Scene},
    Result, TrafficJamError,
};

/// Immutable, validated sequence of scenes.
///
/// Tick-anchored and time-anchored scenes are kept in two separately sorted
/// indexes. Each index is searched on its own and the two candidates are
/// compared on the tick axis using the tempo of the position being resolved.
#[derive(Debug)]
pub struct Timeline {
    scenes: Vec<Arc<Scene>>,
    tick_order: Vec<usize>,
    time_order: Vec<usize>,
    default_scene: usize,
    ppq: u32,
}

impl Timeline {
    /// Builds a timeline from scenes in authoring order.
    ///
    /// Within one anchor kind, anchors must not go backwards in authoring
    /// order. `default_scene` names the scene active before any anchor is
    /// reached; the first authored scene is used when it is `None`.
    pub fn new(scenes: Vec<Scene>, default_scene: Option<&str>, ppq: u32) -> Result<Self> {
        if scenes.is_empty() {
            return Err(TrafficJamError::config("timeline", "no scenes defined"));
        }

        let mut tick_order = Vec::new();
        let mut time_order = Vec::new();
        for (index, scene) in scenes.iter().enumerate() {
            let order = match scene.anchor() {
                Anchor::Tick(_) => &mut tick_order,
                Anchor::Time(_) => &mut time_order,
            };
            if let Some(&previous) = order.last() {
                let previous: &Scene = &scenes[previous];
                if anchor_cmp(&previous.anchor(), &scene.anchor()) == Ordering::Greater {
                    return Err(TrafficJamError::config(
                        format!("scene `{}`", scene.name()),
                        format!(
                            "anchored at {} which is before the preceding scene `{}` at {}",
                            scene.anchor(),
                            previous.name(),
                            previous.anchor()
                        ),
                    ));
                }
            }
            order.push(index);
        }

        let default_scene = match default_scene {
            None => 0,
            Some(name) => scenes
                .iter()
                .position(|scene| scene.name() == name)
                .ok_or_else(|| {
                    TrafficJamError::config(
                        "timeline",
                        format!("default scene `{name}` does not exist"),
                    )
                })?,
        };

        Ok(Self {
            scenes: scenes.into_iter().map(Arc::new).collect(),
            tick_order,
            time_order,
            default_scene,
            ppq: ppq.max(1),
        })
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn ppq(&self) -> u32 {
        self.ppq
    }

    /// Scenes in authoring order.
    pub fn scenes(&self) -> &[Arc<Scene>] {
        &self.scenes
    }

    pub fn scene(&self, index: usize) -> Option<&Arc<Scene>> {
        self.scenes.get(index)
    }

    pub fn default_scene(&self) -> &Arc<Scene> {
        &self.scenes[self.default_scene]
    }

    /// Scene indices sorted by anchor on the tick axis at `bpm`, ties in
    /// authoring order.
    pub fn ordered(&self, bpm: f64) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.scenes.len()).collect();
        order.sort_by(|&a, &b| {
            let a_ticks = self.scenes[a].anchor().to_ticks(bpm, self.ppq);
            let b_ticks = self.scenes[b].anchor().to_ticks(bpm, self.ppq);
            a_ticks.partial_cmp(&b_ticks).unwrap_or(Ordering::Equal)
        });
        order
    }

    /// Index of the scene active at `position`: the latest anchor not after
    /// the position, the later authored scene on ties, otherwise the
    /// default scene.
    pub fn resolve(&self, position: &ClockPosition) -> Result<usize> {
        if self.scenes.is_empty() {
            return Err(TrafficJamError::config("timeline", "no scenes defined"));
        }

        let by_tick = self.last_reached(&self.tick_order, position);
        let by_time = self.last_reached(&self.time_order, position);

        let resolved = match (by_tick, by_time) {
            (None, None) => self.default_scene,
            (Some(index), None) | (None, Some(index)) => index,
            (Some(tick_index), Some(time_index)) => {
                let ordering = if position.has_tempo() {
                    let tick_anchor = self.scenes[tick_index]
                        .anchor()
                        .to_ticks(position.bpm, self.ppq);
                    let time_anchor = self.scenes[time_index]
                        .anchor()
                        .to_ticks(position.bpm, self.ppq);
                    tick_anchor
                        .partial_cmp(&time_anchor)
                        .unwrap_or(Ordering::Equal)
                } else {
                    // Without a tempo the two axes cannot be compared.
                    Ordering::Equal
                };
                match ordering {
                    Ordering::Greater => tick_index,
                    Ordering::Less => time_index,
                    Ordering::Equal => tick_index.max(time_index),
                }
            }
        };
        Ok(resolved)
    }

    fn last_reached(&self, order: &[usize], position: &ClockPosition) -> Option<usize> {
        let reached = order
            .partition_point(|&index| self.scenes[index].anchor().reached(position, self.ppq));
        reached.checked_sub(1).map(|slot| order[slot])
    }
}

fn anchor_cmp(a: &Anchor, b: &Anchor) -> Ordering {
    match (a, b) {
        (Anchor::Tick(a), Anchor::Tick(b)) => a.cmp(b),
        (Anchor::Time(a), Anchor::Time(b)) => a.cmp(b),
        _ => Ordering::Equal,
    }
}

/// Emitted when the active scene changes.
#[derive(Debug, Clone)]
pub struct SceneChange {
    pub previous: Option<Arc<Scene>>,
    pub scene: Arc<Scene>,
}

/// Owns the active-scene pointer and re-resolves it on every position
/// update.
#[derive(Debug)]
pub struct Scheduler {
    timeline: Arc<Timeline>,
    active: Option<usize>,
    last_ticks: Option<u64>,
}

impl Scheduler {
    pub fn new(timeline: Arc<Timeline>) -> Result<Self> {
        if timeline.is_empty() {
            return Err(TrafficJamError::config("timeline", "no default scene available"));
        }
        Ok(Self {
            timeline,
            active: None,
            last_ticks: None,
        })
    }

    pub fn timeline(&self) -> &Arc<Timeline> {
        &self.timeline
    }

    pub fn active_scene(&self) -> Option<&Arc<Scene>> {
        self.active.and_then(|index| self.timeline.scene(index))
    }

    /// Resolves the scene for `position`. Returns a [`SceneChange`] when it
    /// differs from the previously active scene, including on the first
    /// call. A position earlier than the last one is resolved from scratch
    /// like any other.
    pub fn advance(&mut self, position: &ClockPosition) -> Result<Option<SceneChange>> {
        if let Some(last) = self.last_ticks {
            if position.ticks < last {
                tracing::debug!(
                    from = last,
                    to = position.ticks,
                    "clock moved backwards, re-resolving scene"
                );
            }
        }
        self.last_ticks = Some(position.ticks);

        let resolved = self.timeline.resolve(position)?;
        if self.active == Some(resolved) {
            return Ok(None);
        }

        let previous = self.active_scene().cloned();
        self.active = Some(resolved);
        let scene = self.timeline.scenes[resolved].clone();
        tracing::info!(
            scene = scene.name(),
            anchor = %scene.anchor(),
            ticks = position.ticks,
            "scene activated"
        );
        Ok(Some(SceneChange { previous, scene }))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{mapping::Mapping, midi::ControlId};

    fn scene(name: &str, anchor: Anchor) -> Scene {
        Scene::new(name, anchor, vec![Mapping::passthrough(ControlId::Pad(0))]).unwrap()
    }

    fn at(ticks: u64) -> ClockPosition {
        ClockPosition::at_tick(ticks, 120.0, 24)
    }

    fn ticks_timeline() -> Arc<Timeline> {
        Arc::new(
            Timeline::new(
                vec![
                    scene("intro", Anchor::Tick(0)),
                    scene("verse", Anchor::Tick(96)),
                    scene("chorus", Anchor::Tick(192)),
                ],
                None,
                24,
            )
            .unwrap(),
        )
    }

    fn active_name(scheduler: &Scheduler) -> String {
        scheduler.active_scene().unwrap().name().to_string()
    }

    #[test]
    fn resolves_latest_anchor_not_after_position() {
        let mut scheduler = Scheduler::new(ticks_timeline()).unwrap();

        scheduler.advance(&at(150)).unwrap();
        assert_eq!(active_name(&scheduler), "verse");
        scheduler.advance(&at(96)).unwrap();
        assert_eq!(active_name(&scheduler), "verse");
        scheduler.advance(&at(0)).unwrap();
        assert_eq!(active_name(&scheduler), "intro");
        scheduler.advance(&at(10_000)).unwrap();
        assert_eq!(active_name(&scheduler), "chorus");
    }

    #[test]
    fn no_change_inside_a_scene_interval() {
        let mut scheduler = Scheduler::new(ticks_timeline()).unwrap();

        let first = scheduler.advance(&at(96)).unwrap();
        assert_eq!(first.unwrap().scene.name(), "verse");
        for ticks in 97..192 {
            assert!(scheduler.advance(&at(ticks)).unwrap().is_none());
        }
        let change = scheduler.advance(&at(192)).unwrap().unwrap();
        assert_eq!(change.previous.unwrap().name(), "verse");
        assert_eq!(change.scene.name(), "chorus");
    }

    #[test]
    fn later_authored_scene_wins_a_tie() {
        let timeline = Timeline::new(
            vec![
                scene("start", Anchor::Tick(0)),
                scene("a", Anchor::Tick(96)),
                scene("b", Anchor::Tick(96)),
            ],
            None,
            24,
        )
        .unwrap();
        let mut scheduler = Scheduler::new(Arc::new(timeline)).unwrap();

        scheduler.advance(&at(96)).unwrap();
        assert_eq!(active_name(&scheduler), "b");
    }

    #[test]
    fn rewinding_re_resolves_with_a_full_change() {
        let mut scheduler = Scheduler::new(ticks_timeline()).unwrap();

        scheduler.advance(&at(200)).unwrap();
        assert_eq!(active_name(&scheduler), "chorus");

        let change = scheduler.advance(&at(50)).unwrap().unwrap();
        assert_eq!(change.scene.name(), "intro");
        assert_eq!(change.previous.unwrap().name(), "chorus");

        assert!(scheduler.advance(&at(40)).unwrap().is_none());
    }

    #[test]
    fn falls_back_to_the_default_scene_before_the_first_anchor() {
        let timeline = Timeline::new(
            vec![
                scene("idle", Anchor::Tick(48)),
                scene("drop", Anchor::Tick(96)),
            ],
            Some("drop"),
            24,
        )
        .unwrap();
        let mut scheduler = Scheduler::new(Arc::new(timeline)).unwrap();

        scheduler.advance(&at(10)).unwrap();
        assert_eq!(active_name(&scheduler), "drop");
        scheduler.advance(&at(50)).unwrap();
        assert_eq!(active_name(&scheduler), "idle");
    }

    #[test]
    fn time_anchors_are_interpreted_with_current_tempo() {
        let timeline = Timeline::new(
            vec![
                scene("start", Anchor::Tick(0)),
                scene("two-seconds", Anchor::Time(Duration::from_secs(2))),
                scene("bar-three", Anchor::Tick(192)),
            ],
            None,
            24,
        )
        .unwrap();
        let mut scheduler = Scheduler::new(Arc::new(timeline)).unwrap();

        // At 120 bpm two seconds is tick 96.
        scheduler.advance(&at(96)).unwrap();
        assert_eq!(active_name(&scheduler), "two-seconds");

        // At 240 bpm two seconds is tick 192, so tick 96 is before it.
        let faster = ClockPosition {
            ticks: 96,
            elapsed_ms: 1000.0,
            bpm: 240.0,
        };
        scheduler.advance(&faster).unwrap();
        assert_eq!(active_name(&scheduler), "start");

        scheduler.advance(&at(200)).unwrap();
        assert_eq!(active_name(&scheduler), "bar-three");
    }

    #[test]
    fn tick_and_time_anchor_tie_goes_to_later_authored() {
        let timeline = Timeline::new(
            vec![
                scene("start", Anchor::Tick(0)),
                scene("by-time", Anchor::Time(Duration::from_secs(2))),
                scene("by-tick", Anchor::Tick(96)),
            ],
            None,
            24,
        )
        .unwrap();
        assert_eq!(timeline.resolve(&at(96)).unwrap(), 2);
    }

    #[test]
    fn rejects_empty_timeline_and_unknown_default() {
        let err = Timeline::new(Vec::new(), None, 24).unwrap_err();
        assert!(err.is_configuration());

        let err = Timeline::new(vec![scene("a", Anchor::Tick(0))], Some("b"), 24).unwrap_err();
        assert!(err.to_string().contains("`b`"));
    }

    #[test]
    fn rejects_anchors_going_backwards() {
        let err = Timeline::new(
            vec![
                scene("late", Anchor::Tick(96)),
                scene("early", Anchor::Tick(48)),
            ],
            None,
            24,
        )
        .unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("early"));
    }

    #[test]
    fn orders_mixed_anchors_on_the_tick_axis() {
        let timeline = Timeline::new(
            vec![
                scene("tick-100", Anchor::Tick(100)),
                scene("one-second", Anchor::Time(Duration::from_secs(1))),
            ],
            None,
            24,
        )
        .unwrap();
        assert_eq!(timeline.ordered(120.0), vec![1, 0]);
        assert_eq!(timeline.ordered(480.0), vec![0, 1]);
    }
}

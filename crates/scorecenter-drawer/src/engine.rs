// Multi-panel sliding drawer state machine.
//
// Panels are stacked along the major axis. A panel at or before the expanded
// one has its handle pushed to the leading edge (its minimum offset); every
// later panel rests against the anchor edge (its maximum offset). Only the
// expanded panel's content is visible. Dragging or animating a panel moves
// the handles between it and the expanded panel together so the stack never
// overlaps.
//
// All positions are effective coordinates: the major axis grows toward the
// anchor, so "closed" is always the larger offset regardless of anchor side.

use std::time::Instant;

use tracing::{debug, trace, warn};

use crate::config::{Anchor, DrawerConfig, DrawerConfigError, ResolvedConfig, Size, Thresholds};
use crate::frame::{FrameRequest, FrameScheduler, FRAME_INTERVAL};
use crate::surface::{ContentSurface, DrawOp};
use crate::velocity::VelocityTracker;

// ---------------------------------------------------------------------------
// Events and input
// ---------------------------------------------------------------------------

/// Notifications queued by the engine, drained with
/// [`DrawerEngine::take_events`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawerEvent {
    Opened(usize),
    Closed(usize),
    ScrollStarted,
    ScrollEnded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerAction {
    Down,
    Move,
    Up,
    Cancel,
}

/// Raw pointer sample in container pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub action: PointerAction,
    pub x: f32,
    pub y: f32,
    pub at: Instant,
}

impl PointerEvent {
    pub fn new(action: PointerAction, x: f32, y: f32, at: Instant) -> Self {
        PointerEvent { action, x, y, at }
    }
}

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

struct Panel<C> {
    handle: String,
    extent: i32,
    breadth: Option<i32>,
    content: C,
    offset: i32,
    min: i32,
    max: i32,
}

impl<C> Panel<C> {
    fn bottom(&self) -> i32 {
        self.offset + self.extent
    }
}

#[derive(Debug, Clone, Copy)]
enum MoveTarget {
    FullOpen,
    FullClosed,
    To(i32),
}

/// Constant-acceleration motion of the animating panel.
#[derive(Debug, Clone, Copy)]
struct Motion {
    position: f32,
    velocity: f32,
    acceleration: f32,
    last: Instant,
}

impl Motion {
    fn at_rest(now: Instant) -> Self {
        Motion {
            position: 0.0,
            velocity: 0.0,
            acceleration: 0.0,
            last: now,
        }
    }

    fn step(&mut self, now: Instant) {
        let dt = now.saturating_duration_since(self.last).as_secs_f32();
        self.position += self.velocity * dt + 0.5 * self.acceleration * dt * dt;
        self.velocity += self.acceleration * dt;
        self.last = now;
    }
}

// ---------------------------------------------------------------------------
// DrawerEngine
// ---------------------------------------------------------------------------

pub struct DrawerEngine<C> {
    panels: Vec<Panel<C>>,
    anchor: Anchor,
    top_offset: i32,
    allow_single_tap: bool,
    animate_on_click: bool,
    lock_first_open: bool,
    lock_last_closed: bool,
    thresholds: Thresholds,

    container: Size,
    locked: bool,
    expanded: Option<usize>,
    tracking: Option<usize>,
    animating: Option<usize>,
    touch_delta: i32,

    velocity: VelocityTracker,
    motion: Motion,
    frames: FrameScheduler,
    events: Vec<DrawerEvent>,
}

impl<C: ContentSurface> DrawerEngine<C> {
    /// Build an engine from `config`, asking `resolve` for each panel's
    /// content view by name. Fails if the config is invalid or a content
    /// name doesn't resolve.
    pub fn build<F>(config: &DrawerConfig, resolve: F) -> Result<Self, DrawerConfigError>
    where
        F: FnMut(&str) -> Option<C>,
    {
        let resolved = config.resolve()?;
        Self::from_resolved(resolved, resolve)
    }

    pub fn from_resolved<F>(config: ResolvedConfig, mut resolve: F) -> Result<Self, DrawerConfigError>
    where
        F: FnMut(&str) -> Option<C>,
    {
        let mut panels = Vec::with_capacity(config.panels.len());
        for (index, spec) in config.panels.into_iter().enumerate() {
            let mut content = resolve(&spec.content).ok_or_else(|| {
                DrawerConfigError::UnresolvedContent {
                    index,
                    content: spec.content.clone(),
                }
            })?;
            content.set_visible(false);
            panels.push(Panel {
                handle: spec.handle,
                extent: spec.handle_extent,
                breadth: spec.handle_breadth,
                content,
                offset: 0,
                min: 0,
                max: 0,
            });
        }

        let mut engine = DrawerEngine {
            panels,
            anchor: config.anchor,
            top_offset: config.top_offset,
            allow_single_tap: config.allow_single_tap,
            animate_on_click: config.animate_on_click,
            lock_first_open: config.lock_first_open,
            lock_last_closed: config.lock_last_closed,
            thresholds: config.thresholds,
            container: Size::default(),
            locked: false,
            expanded: None,
            tracking: None,
            animating: None,
            touch_delta: 0,
            velocity: VelocityTracker::new(),
            motion: Motion::at_rest(Instant::now()),
            frames: FrameScheduler::new(),
            events: Vec::new(),
        };

        if engine.lock_first_open {
            engine.open_drawer(0);
        }
        debug!(
            panels = engine.panels.len(),
            anchor = ?engine.anchor,
            "drawer built"
        );
        Ok(engine)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn panel_count(&self) -> usize {
        self.panels.len()
    }

    pub fn anchor(&self) -> Anchor {
        self.anchor
    }

    pub fn expanded(&self) -> Option<usize> {
        self.expanded
    }

    pub fn is_expanded(&self, idx: usize) -> bool {
        self.expanded == Some(idx)
    }

    pub fn is_opened(&self) -> bool {
        self.expanded.is_some()
    }

    pub fn is_moving(&self) -> bool {
        self.tracking.is_some() || self.animating.is_some()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn handle_name(&self, idx: usize) -> Option<&str> {
        self.panels.get(idx).map(|p| p.handle.as_str())
    }

    /// Leading edge of a handle along the major axis.
    pub fn handle_offset(&self, idx: usize) -> Option<i32> {
        self.panels.get(idx).map(|p| p.offset)
    }

    /// Space left for content once every handle is accounted for.
    pub fn content_extent(&self) -> i32 {
        self.major_extent() - self.combined_handle_extent()
    }

    pub fn content(&self, idx: usize) -> Option<&C> {
        self.panels.get(idx).map(|p| &p.content)
    }

    pub fn content_mut(&mut self, idx: usize) -> Option<&mut C> {
        self.panels.get_mut(idx).map(|p| &mut p.content)
    }

    pub fn take_events(&mut self) -> Vec<DrawerEvent> {
        std::mem::take(&mut self.events)
    }

    /// The frame the host should deliver next, if an animation is running.
    pub fn next_frame(&self) -> Option<FrameRequest> {
        self.frames.pending()
    }

    // -----------------------------------------------------------------------
    // Layout
    // -----------------------------------------------------------------------

    /// Size the drawer to `container` and recompute each panel's travel.
    /// Ignored while a panel is being dragged.
    pub fn layout(&mut self, container: Size) {
        if self.tracking.is_some() {
            return;
        }
        self.container = container;

        let mut max = self.major_extent();
        for panel in self.panels.iter_mut().rev() {
            max -= panel.extent;
            panel.max = max;
        }
        let mut min = 0;
        for panel in self.panels.iter_mut() {
            panel.min = min;
            min += panel.extent;
        }

        if self.animating.is_none() {
            let expanded = self.expanded;
            for (i, panel) in self.panels.iter_mut().enumerate() {
                panel.offset = match expanded {
                    Some(e) if i <= e => panel.min,
                    _ => panel.max,
                };
            }
        }
    }

    // -----------------------------------------------------------------------
    // Programmatic control
    // -----------------------------------------------------------------------

    /// Lock or unlock pointer interaction. The programmatic API keeps
    /// working while locked.
    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    pub fn open(&mut self, idx: usize) {
        if self.check_index(idx) {
            self.open_drawer(idx);
        }
    }

    pub fn close(&mut self, idx: usize) {
        if self.check_index(idx) {
            self.close_drawer(idx);
        }
    }

    /// Open `idx` when nothing is open, otherwise close it.
    pub fn toggle(&mut self, idx: usize) {
        if !self.check_index(idx) {
            return;
        }
        if self.expanded.is_none() {
            self.open_drawer(idx);
        } else {
            self.close_drawer(idx);
        }
    }

    pub fn animate_open(&mut self, idx: usize, now: Instant) {
        if !self.check_index(idx) {
            return;
        }
        self.prepare_content(idx);
        self.events.push(DrawerEvent::ScrollStarted);
        let position = self.panels[idx].offset;
        self.animate_open_from(position, idx, now);
    }

    pub fn animate_close(&mut self, idx: usize, now: Instant) {
        if !self.check_index(idx) {
            return;
        }
        self.prepare_content(idx);
        self.events.push(DrawerEvent::ScrollStarted);
        let position = self.panels[idx].offset;
        self.animate_close_from(position, idx, now);
    }

    pub fn animate_toggle(&mut self, idx: usize, now: Instant) {
        if self.expanded.is_none() {
            self.animate_open(idx, now);
        } else {
            self.animate_close(idx, now);
        }
    }

    /// A click on handle `idx`. Ignored when locked or for a locked panel.
    /// Returns whether the click was acted on.
    pub fn click(&mut self, idx: usize, now: Instant) -> bool {
        if self.locked || idx >= self.panels.len() || self.is_pointer_locked(idx) {
            return false;
        }
        if self.animate_on_click {
            self.animate_toggle(idx, now);
        } else {
            self.toggle(idx);
        }
        true
    }

    fn check_index(&self, idx: usize) -> bool {
        if idx >= self.panels.len() {
            warn!(idx, panels = self.panels.len(), "drawer panel index out of range");
            return false;
        }
        true
    }

    fn is_pointer_locked(&self, idx: usize) -> bool {
        (idx == 0 && self.lock_first_open)
            || (idx + 1 == self.panels.len() && self.lock_last_closed)
    }

    // -----------------------------------------------------------------------
    // Pointer input
    // -----------------------------------------------------------------------

    /// Feed one pointer sample. Returns whether the drawer consumed it.
    pub fn handle_pointer(&mut self, event: PointerEvent) -> bool {
        if self.locked {
            return false;
        }
        let (major, minor) = self.anchor.effective(event.x, event.y, self.container);

        match event.action {
            PointerAction::Down => self.press(major, minor, event.at),
            PointerAction::Move => {
                let Some(idx) = self.tracking else {
                    return self.animating.is_some();
                };
                self.velocity.add(event.at, major, minor);
                self.move_handle(MoveTarget::To(major as i32 - self.touch_delta), idx);
                true
            }
            PointerAction::Up | PointerAction::Cancel => {
                let Some(idx) = self.tracking else {
                    return self.animating.is_some();
                };
                self.velocity.add(event.at, major, minor);
                self.release(idx, event.at);
                true
            }
        }
    }

    fn hit(&self, idx: usize, major: f32, minor: f32) -> bool {
        let panel = &self.panels[idx];
        let width = self.anchor.minor_extent(self.container);
        let breadth = panel.breadth.unwrap_or(width);
        let left = (width - breadth) / 2;
        let (major, minor) = (major as i32, minor as i32);
        major >= panel.offset
            && major < panel.offset + panel.extent
            && minor >= left
            && minor < left + breadth
    }

    fn press(&mut self, major: f32, minor: f32, at: Instant) -> bool {
        if self.tracking.is_some() {
            return false;
        }
        let Some(idx) = (0..self.panels.len()).find(|&i| self.hit(i, major, minor)) else {
            return false;
        };
        if self.is_pointer_locked(idx) {
            return false;
        }
        debug!(idx, "handle pressed");

        self.cancel_animation();
        self.tracking = Some(idx);
        self.prepare_content(idx);
        self.events.push(DrawerEvent::ScrollStarted);

        let top = self.panels[idx].offset;
        self.touch_delta = major as i32 - top;
        self.prepare_tracking(top, idx);
        self.velocity.add(at, major, minor);
        true
    }

    fn release(&mut self, idx: usize, now: Instant) {
        let t = self.thresholds;
        let (major_velocity, minor_velocity) = self.velocity.velocity(t.velocity_units);

        let minor = minor_velocity.abs().min(t.max_minor_velocity as f32);
        let mut velocity = major_velocity.hypot(minor);
        if major_velocity < 0.0 {
            velocity = -velocity;
        }

        let top = self.panels[idx].offset;
        let bottom = self.panels[idx].bottom();
        let preceding: i32 = self.panels[..idx].iter().map(|p| p.extent).sum();
        let succeeding: i32 = self.panels[idx + 1..].iter().map(|p| p.extent).sum();

        let closing = self.expanded.is_some_and(|e| idx <= e);
        let near_boundary = if closing {
            (preceding - top).abs() < t.tap
        } else {
            ((self.major_extent() - succeeding) - bottom).abs() < t.tap
        };

        if velocity.abs() < t.max_tap_velocity as f32 && near_boundary && self.allow_single_tap {
            if closing {
                debug!(idx, "tap closes panel");
                self.animate_close_from(top, idx, now);
            } else {
                debug!(idx, "tap opens panel");
                self.animate_open_from(top, idx, now);
            }
        } else {
            self.perform_fling(top, velocity, false, idx, now);
        }
    }

    // -----------------------------------------------------------------------
    // Animation
    // -----------------------------------------------------------------------

    /// Deliver a frame ticket. Stale or cancelled tickets are ignored; returns
    /// whether the frame was applied.
    pub fn on_frame(&mut self, generation: u64, now: Instant) -> bool {
        let Some(due) = self.frames.claim(generation) else {
            trace!(generation, "stale frame ignored");
            return false;
        };
        let Some(idx) = self.animating else {
            return false;
        };

        self.motion.step(now);
        let position = self.motion.position;
        let panel = &self.panels[idx];

        if position >= (panel.max - 1) as f32 {
            self.animating = None;
            self.close_drawer(idx);
        } else if position < panel.min as f32 {
            self.animating = None;
            self.open_drawer(idx);
        } else {
            self.move_handle(MoveTarget::To(position as i32), idx);
            self.frames.schedule(due + FRAME_INTERVAL);
        }
        true
    }

    fn animate_close_from(&mut self, position: i32, idx: usize, now: Instant) {
        self.prepare_tracking(position, idx);
        let velocity = self.thresholds.max_acceleration as f32;
        self.perform_fling(position, velocity, true, idx, now);
    }

    fn animate_open_from(&mut self, position: i32, idx: usize, now: Instant) {
        self.prepare_tracking(position, idx);
        let velocity = -(self.thresholds.max_acceleration as f32);
        self.perform_fling(position, velocity, true, idx, now);
    }

    /// Start a constant-acceleration settle from `position`.
    ///
    /// Past the major velocity threshold the direction of travel wins;
    /// otherwise the panel settles toward whichever side of the visible
    /// content's midpoint it was released on. `always` forces the panel to
    /// its opposite state.
    fn perform_fling(&mut self, position: i32, velocity: f32, always: bool, idx: usize, now: Instant) {
        let major = self.thresholds.max_major_velocity as f32;
        let accel = self.thresholds.max_acceleration as f32;
        let height = self.major_extent();
        let pos = position as f32;

        self.motion.position = pos;
        self.motion.velocity = velocity;

        let mut mid = (height - self.combined_handle_extent()) / 2;
        if self.expanded.is_some_and(|e| idx <= e) {
            if idx > 0 {
                mid += self.panels[idx - 1].bottom();
            }
            if always || velocity > major || (pos > mid as f32 && velocity > -major) {
                self.motion.acceleration = accel;
                if velocity < 0.0 {
                    self.motion.velocity = 0.0;
                }
            } else {
                self.motion.acceleration = -accel;
                if velocity > 0.0 {
                    self.motion.velocity = 0.0;
                }
            }
        } else {
            mid = match self.panels.get(idx + 1) {
                Some(next) => next.offset - mid,
                None => height - mid,
            };
            mid -= self.panels[idx].extent;
            if always || velocity < -major || (pos < mid as f32 && velocity < major) {
                self.motion.acceleration = -accel;
                if velocity > 0.0 {
                    self.motion.velocity = 0.0;
                }
            } else {
                self.motion.acceleration = accel;
                if velocity < 0.0 {
                    self.motion.velocity = 0.0;
                }
            }
        }
        debug!(idx, position, velocity, always, "flinging panel");

        self.motion.last = now;
        self.animating = Some(idx);
        self.frames.schedule(now + FRAME_INTERVAL);
        self.stop_tracking();
    }

    /// Begin moving `idx`. A panel about to open starts from its closed
    /// position.
    fn prepare_tracking(&mut self, position: i32, idx: usize) {
        self.cancel_animation();
        self.tracking = Some(idx);
        self.velocity.clear();

        let opening = self.expanded.map_or(true, |e| idx > e);
        if opening {
            let max = self.panels[idx].max;
            self.move_handle(MoveTarget::To(max), idx);
        } else {
            self.move_handle(MoveTarget::To(position), idx);
        }
    }

    fn stop_tracking(&mut self) {
        if self.tracking.take().is_some() {
            self.events.push(DrawerEvent::ScrollEnded);
        }
        self.velocity.clear();
    }

    fn cancel_animation(&mut self) {
        if self.animating.take().is_some() {
            trace!("animation cancelled");
        }
        self.frames.cancel();
    }

    // -----------------------------------------------------------------------
    // Settling
    // -----------------------------------------------------------------------

    fn open_drawer(&mut self, idx: usize) {
        self.move_handle(MoveTarget::FullOpen, idx);
        match self.expanded {
            Some(e) if idx > e => self.retire(e),
            Some(e) if idx < e && idx > 0 => self.retire(idx - 1),
            _ => {}
        }
        let shown = self.expanded.map_or(idx, |e| e.max(idx));
        self.expanded = Some(shown);
        self.reveal(shown);
        debug!(idx, expanded = shown, "panel opened");
        self.events.push(DrawerEvent::Opened(idx));
    }

    fn close_drawer(&mut self, idx: usize) {
        self.move_handle(MoveTarget::FullClosed, idx);
        let Some(e) = self.expanded else {
            return;
        };
        if idx <= e {
            self.retire(e);
            if idx != 0 {
                self.reveal(idx - 1);
            }
            self.expanded = idx.checked_sub(1);
        } else {
            self.reveal(e);
            self.retire(idx);
        }
        debug!(idx, expanded = ?self.expanded, "panel closed");
        self.events.push(DrawerEvent::Closed(idx));
    }

    fn reveal(&mut self, idx: usize) {
        let content = &mut self.panels[idx].content;
        content.set_visible(true);
        content.release_cache();
    }

    fn retire(&mut self, idx: usize) {
        let content = &mut self.panels[idx].content;
        content.set_visible(false);
        content.release_cache();
    }

    /// Snapshot the contents whose visibility is about to change: the one
    /// being uncovered and the currently expanded one.
    fn prepare_content(&mut self, idx: usize) {
        if self.animating.is_some() {
            return;
        }
        let gaining = match self.expanded {
            Some(e) if idx < e && idx > 0 => idx - 1,
            _ => idx,
        };
        self.snapshot(gaining);
        if let Some(e) = self.expanded {
            if e != idx {
                self.snapshot(e);
            }
        }
    }

    fn snapshot(&mut self, idx: usize) {
        let extent = self.major_extent() - self.panels[idx].extent - self.top_offset;
        let content = &mut self.panels[idx].content;
        content.build_cache(extent);
        content.set_visible(false);
    }

    fn move_handle(&mut self, target: MoveTarget, idx: usize) {
        match target {
            MoveTarget::FullOpen => {
                let last = self.expanded.map_or(idx, |e| e.max(idx));
                for panel in &mut self.panels[..=last] {
                    panel.offset = panel.min;
                }
            }
            MoveTarget::FullClosed => {
                let first = self.expanded.map_or(0, |e| idx.min(e + 1));
                for panel in &mut self.panels[first..] {
                    panel.offset = panel.max;
                }
            }
            MoveTarget::To(position) => {
                let panel = &self.panels[idx];
                let target = if position < panel.min {
                    panel.min
                } else if position > panel.max {
                    panel.max
                } else {
                    position
                };
                let delta = target - panel.offset;
                let range = match self.expanded {
                    Some(e) if idx <= e => idx..=e,
                    Some(e) => e + 1..=idx,
                    None => 0..=idx,
                };
                for panel in &mut self.panels[range] {
                    panel.offset += delta;
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Compositing
    // -----------------------------------------------------------------------

    /// Draw plan for the current state. While a panel moves, at most two
    /// contents are drawn (snapshots when available); once settled only
    /// the expanded content is. Handles are always drawn last.
    pub fn compose(&self) -> Vec<DrawOp> {
        let mut ops = Vec::with_capacity(self.panels.len() + 2);

        if let Some(idx) = self.animating.or(self.tracking) {
            if let Some(e) = self.expanded {
                if idx > 0 {
                    let upper = (idx - 1).min(e);
                    ops.push(self.moving_content(upper, self.panels[upper].bottom()));
                }
            }
            let lower = self.expanded.map_or(idx, |e| e.max(idx));
            ops.push(self.moving_content(lower, self.panels[idx].bottom()));
        } else if let Some(e) = self.expanded {
            ops.push(DrawOp::Content { panel: e });
        }

        ops.extend(self.panels.iter().enumerate().map(|(i, p)| DrawOp::Handle {
            panel: i,
            at: p.offset,
        }));
        ops
    }

    fn moving_content(&self, idx: usize, at: i32) -> DrawOp {
        let panel = &self.panels[idx];
        if panel.content.has_cache() {
            DrawOp::Cached { panel: idx, at }
        } else {
            DrawOp::Live {
                panel: idx,
                translate: panel.offset - panel.min,
            }
        }
    }

    // -----------------------------------------------------------------------
    // Geometry helpers
    // -----------------------------------------------------------------------

    fn major_extent(&self) -> i32 {
        self.anchor.major_extent(self.container)
    }

    fn combined_handle_extent(&self) -> i32 {
        self.panels.iter().map(|p| p.extent).sum()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PanelSpec;
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct TestSurface {
        visible: bool,
        cached: bool,
        builds: usize,
        refuse_cache: bool,
    }

    impl ContentSurface for TestSurface {
        fn set_visible(&mut self, visible: bool) {
            self.visible = visible;
        }

        fn is_visible(&self) -> bool {
            self.visible
        }

        fn build_cache(&mut self, _extent: i32) {
            self.builds += 1;
            self.cached = !self.refuse_cache;
        }

        fn has_cache(&self) -> bool {
            self.cached
        }

        fn release_cache(&mut self) {
            self.cached = false;
        }
    }

    const WIDTH: i32 = 400;
    const HEIGHT: i32 = 600;

    fn config(panels: usize) -> DrawerConfig {
        DrawerConfig::with_panels(
            (1..=panels)
                .map(|i| PanelSpec::new(format!("handle{i}"), format!("content{i}")))
                .collect(),
        )
    }

    fn engine_with(config: &DrawerConfig) -> DrawerEngine<TestSurface> {
        let mut engine = DrawerEngine::build(config, |_| Some(TestSurface::default())).unwrap();
        engine.layout(Size::new(WIDTH, HEIGHT));
        engine
    }

    fn engine(panels: usize) -> DrawerEngine<TestSurface> {
        engine_with(&config(panels))
    }

    /// Deliver frames until the animation settles. Returns the frame count.
    fn run_frames(engine: &mut DrawerEngine<TestSurface>) -> usize {
        let mut frames = 0;
        while let Some(request) = engine.next_frame() {
            assert!(engine.on_frame(request.generation, request.due));
            frames += 1;
            assert!(frames < 1000, "animation never settled");
        }
        frames
    }

    fn pointer(action: PointerAction, y: f32, at: Instant) -> PointerEvent {
        PointerEvent::new(action, (WIDTH / 2) as f32, y, at)
    }

    fn visible_count(engine: &DrawerEngine<TestSurface>) -> usize {
        (0..engine.panel_count())
            .filter(|&i| engine.content(i).is_some_and(|c| c.is_visible()))
            .count()
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn layout_stacks_closed_handles_at_anchor() {
        let engine = engine(3);
        assert_eq!(engine.handle_offset(0), Some(480));
        assert_eq!(engine.handle_offset(1), Some(520));
        assert_eq!(engine.handle_offset(2), Some(560));
        assert_eq!(engine.content_extent(), 480);
        assert!(!engine.is_opened());
        assert_eq!(visible_count(&engine), 0);
    }

    #[test]
    fn unresolved_content_fails_build() {
        let result = DrawerEngine::build(&config(2), |name| {
            (name == "content1").then(TestSurface::default)
        });
        assert!(matches!(
            result,
            Err(DrawerConfigError::UnresolvedContent { index: 1, .. })
        ));
    }

    #[test]
    fn open_and_close_move_the_stack() {
        let mut engine = engine(3);
        engine.open(1);
        assert_eq!(engine.expanded(), Some(1));
        assert_eq!(engine.handle_offset(0), Some(0));
        assert_eq!(engine.handle_offset(1), Some(40));
        assert_eq!(engine.handle_offset(2), Some(560));
        assert!(engine.content(1).unwrap().is_visible());
        assert_eq!(visible_count(&engine), 1);

        // Closing the expanded panel uncovers the one before it.
        engine.close(1);
        assert_eq!(engine.expanded(), Some(0));
        assert_eq!(engine.handle_offset(1), Some(520));
        assert!(engine.content(0).unwrap().is_visible());
        assert_eq!(visible_count(&engine), 1);

        engine.close(0);
        assert_eq!(engine.expanded(), None);
        assert_eq!(visible_count(&engine), 0);
        assert_eq!(
            engine.take_events(),
            vec![
                DrawerEvent::Opened(1),
                DrawerEvent::Closed(1),
                DrawerEvent::Closed(0)
            ]
        );
    }

    #[test]
    fn opening_a_later_panel_replaces_the_expanded_one() {
        let mut engine = engine(3);
        engine.open(0);
        engine.open(2);
        assert_eq!(engine.expanded(), Some(2));
        assert!(!engine.content(0).unwrap().is_visible());
        assert!(engine.content(2).unwrap().is_visible());
        assert_eq!(engine.handle_offset(1), Some(40));
        assert_eq!(engine.handle_offset(2), Some(80));
    }

    #[test]
    fn closing_without_anything_open_is_silent() {
        let mut engine = engine(2);
        engine.close(1);
        assert!(engine.take_events().is_empty());
        engine.close(7);
        assert!(engine.take_events().is_empty());
    }

    #[test]
    fn fast_fling_opens_regardless_of_position() {
        let mut engine = engine(3);
        let t0 = Instant::now();

        // Grab the last handle and flick it a short way toward the top.
        assert!(engine.handle_pointer(pointer(PointerAction::Down, 570.0, t0)));
        engine.handle_pointer(pointer(PointerAction::Move, 560.0, t0 + ms(10)));
        engine.handle_pointer(pointer(PointerAction::Move, 550.0, t0 + ms(20)));
        engine.handle_pointer(pointer(PointerAction::Up, 540.0, t0 + ms(30)));

        assert!(engine.is_moving());
        run_frames(&mut engine);
        assert_eq!(engine.expanded(), Some(2));
        assert_eq!(engine.handle_offset(2), Some(80));
        assert!(!engine.is_moving());
        assert_eq!(
            engine.take_events(),
            vec![
                DrawerEvent::ScrollStarted,
                DrawerEvent::ScrollEnded,
                DrawerEvent::Opened(2)
            ]
        );
    }

    #[test]
    fn slow_short_drag_falls_back_closed() {
        let mut engine = engine(3);
        let t0 = Instant::now();

        engine.handle_pointer(pointer(PointerAction::Down, 570.0, t0));
        engine.handle_pointer(pointer(PointerAction::Move, 550.0, t0 + ms(300)));
        engine.handle_pointer(pointer(PointerAction::Up, 550.0, t0 + ms(600)));

        run_frames(&mut engine);
        assert_eq!(engine.expanded(), None);
        assert_eq!(engine.handle_offset(2), Some(560));
        // Nothing was open, so settling closed reports no close.
        assert_eq!(
            engine.take_events(),
            vec![DrawerEvent::ScrollStarted, DrawerEvent::ScrollEnded]
        );
    }

    #[test]
    fn drag_past_midpoint_settles_open() {
        let mut engine = engine(3);
        let t0 = Instant::now();

        engine.handle_pointer(pointer(PointerAction::Down, 565.0, t0));
        engine.handle_pointer(pointer(PointerAction::Move, 300.0, t0 + ms(200)));
        engine.handle_pointer(pointer(PointerAction::Move, 200.0, t0 + ms(400)));
        engine.handle_pointer(pointer(PointerAction::Up, 200.0, t0 + ms(600)));

        run_frames(&mut engine);
        assert_eq!(engine.expanded(), Some(2));
    }

    #[test]
    fn tap_toggles_exactly_once() {
        let mut engine = engine(3);
        let t0 = Instant::now();

        engine.handle_pointer(pointer(PointerAction::Down, 530.0, t0));
        engine.handle_pointer(pointer(PointerAction::Up, 531.0, t0 + ms(50)));
        run_frames(&mut engine);
        assert_eq!(engine.expanded(), Some(1));
        let opened: Vec<_> = engine
            .take_events()
            .into_iter()
            .filter(|e| matches!(e, DrawerEvent::Opened(_) | DrawerEvent::Closed(_)))
            .collect();
        assert_eq!(opened, vec![DrawerEvent::Opened(1)]);

        // Tap the now-open handle to close it again.
        let t1 = t0 + ms(2000);
        engine.handle_pointer(pointer(PointerAction::Down, 50.0, t1));
        engine.handle_pointer(pointer(PointerAction::Up, 50.0, t1 + ms(50)));
        run_frames(&mut engine);
        assert!(!engine.is_expanded(1));
        let closed: Vec<_> = engine
            .take_events()
            .into_iter()
            .filter(|e| matches!(e, DrawerEvent::Opened(_) | DrawerEvent::Closed(_)))
            .collect();
        assert_eq!(closed, vec![DrawerEvent::Closed(1)]);
    }

    #[test]
    fn tap_is_ignored_without_single_tap() {
        let config = DrawerConfig {
            allow_single_tap: false,
            ..config(2)
        };
        let mut engine = engine_with(&config);
        let t0 = Instant::now();

        engine.handle_pointer(pointer(PointerAction::Down, 570.0, t0));
        engine.handle_pointer(pointer(PointerAction::Up, 570.0, t0 + ms(50)));
        run_frames(&mut engine);
        assert_eq!(engine.expanded(), None);
    }

    #[test]
    fn at_most_one_panel_expanded_through_a_sequence() {
        let mut engine = engine(4);
        let mut now = Instant::now();
        for idx in [2, 0, 3, 1, 3, 0, 2] {
            engine.animate_toggle(idx, now);
            let mut frames = 0;
            while let Some(request) = engine.next_frame() {
                assert!(visible_count(&engine) <= 1);
                now = request.due;
                engine.on_frame(request.generation, now);
                frames += 1;
                assert!(frames < 1000);
            }
            assert!(visible_count(&engine) <= 1);
            let expanded: Vec<_> = (0..4).filter(|&i| engine.is_expanded(i)).collect();
            assert!(expanded.len() <= 1);
            now += ms(100);
        }
    }

    #[test]
    fn lock_first_open_ignores_pointer_but_not_api() {
        let config = DrawerConfig {
            lock_first_open: true,
            ..config(3)
        };
        let mut engine = engine_with(&config);
        assert_eq!(engine.expanded(), Some(0));
        assert_eq!(engine.take_events(), vec![DrawerEvent::Opened(0)]);
        assert_eq!(engine.handle_offset(0), Some(0));

        let t0 = Instant::now();
        assert!(!engine.handle_pointer(pointer(PointerAction::Down, 10.0, t0)));
        assert!(!engine.click(0, t0));
        assert!(!engine.is_moving());
        assert_eq!(engine.expanded(), Some(0));

        engine.toggle(0);
        assert_eq!(engine.expanded(), None);
        engine.toggle(0);
        assert_eq!(engine.expanded(), Some(0));
    }

    #[test]
    fn lock_last_closed_refuses_last_handle() {
        let config = DrawerConfig {
            lock_last_closed: true,
            ..config(2)
        };
        let mut engine = engine_with(&config);
        let t0 = Instant::now();
        assert!(!engine.handle_pointer(pointer(PointerAction::Down, 570.0, t0)));
        assert!(!engine.click(1, t0));
        assert!(engine.click(0, t0));
    }

    #[test]
    fn locked_drawer_ignores_pointer_and_clicks() {
        let mut engine = engine(2);
        engine.set_locked(true);
        let t0 = Instant::now();
        assert!(!engine.handle_pointer(pointer(PointerAction::Down, 570.0, t0)));
        assert!(!engine.click(1, t0));

        engine.open(1);
        assert!(engine.is_opened());
    }

    #[test]
    fn click_without_animation_toggles_immediately() {
        let config = DrawerConfig {
            animate_on_click: false,
            ..config(2)
        };
        let mut engine = engine_with(&config);
        assert!(engine.click(1, Instant::now()));
        assert_eq!(engine.expanded(), Some(1));
        assert!(engine.next_frame().is_none());
    }

    #[test]
    fn press_cancels_running_animation() {
        let mut engine = engine(3);
        let t0 = Instant::now();
        engine.animate_open(1, t0);
        let stale = engine.next_frame().unwrap();
        engine.on_frame(stale.generation, stale.due);
        let pending = engine.next_frame().unwrap();

        let at = engine.handle_offset(1).unwrap() as f32 + 5.0;
        assert!(engine.handle_pointer(pointer(PointerAction::Down, at, pending.due)));
        assert!(engine.next_frame().is_none());
        assert!(!engine.on_frame(pending.generation, pending.due));
        assert!(engine.is_moving());
    }

    #[test]
    fn animate_during_animation_keeps_existing_snapshots() {
        let mut engine = engine(2);
        let t0 = Instant::now();
        engine.animate_open(1, t0);
        assert_eq!(engine.content(1).unwrap().builds, 1);

        engine.animate_open(1, t0 + ms(5));
        assert_eq!(engine.content(1).unwrap().builds, 1);
        assert!(engine.next_frame().is_some());

        run_frames(&mut engine);
        assert_eq!(engine.expanded(), Some(1));
        engine.animate_close(1, t0 + ms(500));
        assert_eq!(engine.content(1).unwrap().builds, 2);
    }

    #[test]
    fn stale_ticket_does_not_advance_animation() {
        let mut engine = engine(2);
        let t0 = Instant::now();
        engine.animate_open(1, t0);
        let first = engine.next_frame().unwrap();

        engine.animate_open(1, t0 + ms(5));
        let second = engine.next_frame().unwrap();
        assert_ne!(first.generation, second.generation);

        let before = engine.handle_offset(1);
        assert!(!engine.on_frame(first.generation, first.due + ms(100)));
        assert_eq!(engine.handle_offset(1), before);
        assert!(engine.on_frame(second.generation, second.due));
    }

    #[test]
    fn compose_uses_snapshots_while_moving() {
        let mut engine = engine(3);
        engine.open(0);
        engine.take_events();
        let t0 = Instant::now();

        // Drag panel 2 up over the expanded panel 0.
        engine.handle_pointer(pointer(PointerAction::Down, 570.0, t0));
        engine.handle_pointer(pointer(PointerAction::Move, 400.0, t0 + ms(100)));
        let plan = engine.compose();
        let contents: Vec<_> = plan
            .iter()
            .filter(|op| !matches!(op, DrawOp::Handle { .. }))
            .copied()
            .collect();
        assert_eq!(
            contents,
            vec![
                DrawOp::Cached { panel: 0, at: 40 },
                DrawOp::Cached { panel: 2, at: 430 },
            ]
        );
        assert_eq!(plan.iter().filter(|op| matches!(op, DrawOp::Handle { .. })).count(), 3);
    }

    #[test]
    fn compose_draws_live_when_snapshot_refused() {
        let mut engine = DrawerEngine::build(&config(2), |_| {
            Some(TestSurface {
                refuse_cache: true,
                ..TestSurface::default()
            })
        })
        .unwrap();
        engine.layout(Size::new(WIDTH, HEIGHT));
        let t0 = Instant::now();

        engine.handle_pointer(pointer(PointerAction::Down, 570.0, t0));
        engine.handle_pointer(pointer(PointerAction::Move, 500.0, t0 + ms(100)));
        let plan = engine.compose();
        assert_eq!(plan[0], DrawOp::Live { panel: 1, translate: 450 });
    }

    #[test]
    fn settled_compose_draws_expanded_content() {
        let mut engine = engine(2);
        assert_eq!(
            engine.compose(),
            vec![
                DrawOp::Handle { panel: 0, at: 520 },
                DrawOp::Handle { panel: 1, at: 560 },
            ]
        );
        engine.open(1);
        assert_eq!(engine.compose()[0], DrawOp::Content { panel: 1 });
    }

    #[test]
    fn horizontal_anchor_tracks_x() {
        let config = DrawerConfig {
            anchor: Some(Anchor::Right),
            ..config(2)
        };
        let mut engine = DrawerEngine::build(&config, |_| Some(TestSurface::default())).unwrap();
        engine.layout(Size::new(600, 400));
        assert_eq!(engine.handle_offset(1), Some(560));

        let t0 = Instant::now();
        assert!(engine.handle_pointer(PointerEvent::new(PointerAction::Down, 570.0, 200.0, t0)));
        engine.handle_pointer(PointerEvent::new(PointerAction::Up, 570.0, 200.0, t0 + ms(40)));
        run_frames(&mut engine);
        assert_eq!(engine.expanded(), Some(1));
    }

    #[test]
    fn narrow_handle_limits_hit_area() {
        let mut config = config(1);
        config.panels[0].handle_breadth = Some(100);
        let mut engine = engine_with(&config);
        let t0 = Instant::now();
        assert!(!engine.handle_pointer(PointerEvent::new(PointerAction::Down, 10.0, 580.0, t0)));
        assert!(engine.handle_pointer(PointerEvent::new(PointerAction::Down, 200.0, 580.0, t0)));
    }
}

// Drawer configuration: the declarative panel list plus placement and
// behavior flags, and its resolution into validated engine settings.

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

/// At most this many handle/content pairs per drawer.
pub const MAX_PANELS: usize = 4;

/// Handle thickness along the major axis when the config doesn't say.
pub const DEFAULT_HANDLE_EXTENT: i32 = 40;

// Base values at density 1.0.
const TAP_THRESHOLD: f32 = 6.0;
const MAX_TAP_VELOCITY: f32 = 100.0;
const MAX_MINOR_VELOCITY: f32 = 150.0;
const MAX_MAJOR_VELOCITY: f32 = 200.0;
const MAX_ACCELERATION: f32 = 2000.0;
const VELOCITY_UNITS: f32 = 1000.0;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DrawerConfigError {
    #[error("drawer may not specify both anchor and orientation")]
    ConflictingPlacement,

    #[error("drawer needs at least one panel")]
    NoPanels,

    #[error("drawer supports at most 4 panels, got {count}")]
    TooManyPanels { count: usize },

    #[error("panel {index} has no handle")]
    MissingHandle { index: usize },

    #[error("panel {index} has no content")]
    MissingContent { index: usize },

    #[error("panel {index} has invalid handle extent {extent}")]
    InvalidHandleExtent { index: usize, extent: i32 },

    #[error("panel {index} content '{content}' does not refer to an existing view")]
    UnresolvedContent { index: usize, content: String },
}

// ---------------------------------------------------------------------------
// Placement
// ---------------------------------------------------------------------------

/// Edge of the container the closed handles rest against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Anchor {
    Top,
    Right,
    Bottom,
    Left,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// Container dimensions in raw (unanchored) pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub fn new(width: i32, height: i32) -> Self {
        Size { width, height }
    }
}

impl Anchor {
    pub fn is_vertical(self) -> bool {
        matches!(self, Anchor::Top | Anchor::Bottom)
    }

    /// Extent of `container` along the axis panels slide on.
    pub fn major_extent(self, container: Size) -> i32 {
        if self.is_vertical() {
            container.height
        } else {
            container.width
        }
    }

    /// Extent of `container` across the sliding axis.
    pub fn minor_extent(self, container: Size) -> i32 {
        if self.is_vertical() {
            container.width
        } else {
            container.height
        }
    }

    /// Map a raw pointer position to `(major, minor)` coordinates where the
    /// major axis grows toward the anchor edge, so "closed" is always the
    /// largest offset.
    pub fn effective(self, x: f32, y: f32, container: Size) -> (f32, f32) {
        match self {
            Anchor::Bottom => (y, x),
            Anchor::Top => (container.height as f32 - y, x),
            Anchor::Right => (x, y),
            Anchor::Left => (container.width as f32 - x, y),
        }
    }
}

// ---------------------------------------------------------------------------
// DrawerConfig
// ---------------------------------------------------------------------------

/// One handle/content pair. Both refer to views by name.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PanelSpec {
    pub handle: String,
    pub content: String,
    #[serde(default = "default_handle_extent")]
    pub handle_extent: i32,
    /// Handle size across the sliding axis; full width when absent.
    #[serde(default)]
    pub handle_breadth: Option<i32>,
}

impl PanelSpec {
    pub fn new(handle: impl Into<String>, content: impl Into<String>) -> Self {
        PanelSpec {
            handle: handle.into(),
            content: content.into(),
            handle_extent: DEFAULT_HANDLE_EXTENT,
            handle_breadth: None,
        }
    }
}

fn default_handle_extent() -> i32 {
    DEFAULT_HANDLE_EXTENT
}

fn default_true() -> bool {
    true
}

fn default_density() -> f32 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DrawerConfig {
    #[serde(default)]
    pub panels: Vec<PanelSpec>,
    #[serde(default)]
    pub anchor: Option<Anchor>,
    #[serde(default)]
    pub orientation: Option<Orientation>,
    #[serde(default)]
    pub top_offset: i32,
    #[serde(default = "default_true")]
    pub allow_single_tap: bool,
    #[serde(default = "default_true")]
    pub animate_on_click: bool,
    #[serde(default)]
    pub lock_first_open: bool,
    #[serde(default)]
    pub lock_last_closed: bool,
    /// Display density; scales every pixel threshold.
    #[serde(default = "default_density")]
    pub density: f32,
}

impl Default for DrawerConfig {
    fn default() -> Self {
        DrawerConfig {
            panels: Vec::new(),
            anchor: None,
            orientation: None,
            top_offset: 0,
            allow_single_tap: true,
            animate_on_click: true,
            lock_first_open: false,
            lock_last_closed: false,
            density: 1.0,
        }
    }
}

/// Validated settings the engine runs with.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub panels: Vec<PanelSpec>,
    pub anchor: Anchor,
    pub top_offset: i32,
    pub allow_single_tap: bool,
    pub animate_on_click: bool,
    pub lock_first_open: bool,
    pub lock_last_closed: bool,
    pub thresholds: Thresholds,
}

impl DrawerConfig {
    pub fn with_panels(panels: Vec<PanelSpec>) -> Self {
        DrawerConfig {
            panels,
            ..DrawerConfig::default()
        }
    }

    /// Check the panel list and pick the anchor.
    ///
    /// An orientation implies an anchor (vertical: bottom, horizontal:
    /// right); with neither, the drawer is anchored at the bottom.
    pub fn resolve(&self) -> Result<ResolvedConfig, DrawerConfigError> {
        let anchor = match (self.anchor, self.orientation) {
            (Some(_), Some(_)) => return Err(DrawerConfigError::ConflictingPlacement),
            (Some(anchor), None) => anchor,
            (None, Some(Orientation::Vertical)) => Anchor::Bottom,
            (None, Some(Orientation::Horizontal)) => Anchor::Right,
            (None, None) => Anchor::Bottom,
        };

        if self.panels.is_empty() {
            return Err(DrawerConfigError::NoPanels);
        }
        if self.panels.len() > MAX_PANELS {
            return Err(DrawerConfigError::TooManyPanels {
                count: self.panels.len(),
            });
        }
        for (index, panel) in self.panels.iter().enumerate() {
            if panel.handle.trim().is_empty() {
                return Err(DrawerConfigError::MissingHandle { index });
            }
            if panel.content.trim().is_empty() {
                return Err(DrawerConfigError::MissingContent { index });
            }
            if panel.handle_extent <= 0 {
                return Err(DrawerConfigError::InvalidHandleExtent {
                    index,
                    extent: panel.handle_extent,
                });
            }
        }

        let density = if self.density.is_finite() && self.density > 0.0 {
            self.density
        } else {
            warn!(density = self.density, "invalid drawer density, using 1.0");
            1.0
        };

        Ok(ResolvedConfig {
            panels: self.panels.clone(),
            anchor,
            top_offset: self.top_offset,
            allow_single_tap: self.allow_single_tap,
            animate_on_click: self.animate_on_click,
            lock_first_open: self.lock_first_open,
            lock_last_closed: self.lock_last_closed,
            thresholds: Thresholds::for_density(density),
        })
    }
}

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Gesture thresholds in device pixels (velocities in px per
/// `velocity_units` ms).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub tap: i32,
    pub max_tap_velocity: i32,
    pub max_minor_velocity: i32,
    pub max_major_velocity: i32,
    pub max_acceleration: i32,
    pub velocity_units: i32,
}

impl Thresholds {
    pub fn for_density(density: f32) -> Self {
        let scale = |base: f32| (base * density + 0.5) as i32;
        Thresholds {
            tap: scale(TAP_THRESHOLD),
            max_tap_velocity: scale(MAX_TAP_VELOCITY),
            max_minor_velocity: scale(MAX_MINOR_VELOCITY),
            max_major_velocity: scale(MAX_MAJOR_VELOCITY),
            max_acceleration: scale(MAX_ACCELERATION),
            velocity_units: scale(VELOCITY_UNITS),
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn three_panels() -> Vec<PanelSpec> {
        vec![
            PanelSpec::new("handle1", "content1"),
            PanelSpec::new("handle2", "content2"),
            PanelSpec::new("handle3", "content3"),
        ]
    }

    #[test]
    fn anchor_defaults() {
        let mut config = DrawerConfig::with_panels(three_panels());
        assert_eq!(config.resolve().unwrap().anchor, Anchor::Bottom);

        config.orientation = Some(Orientation::Horizontal);
        assert_eq!(config.resolve().unwrap().anchor, Anchor::Right);

        config.orientation = Some(Orientation::Vertical);
        assert_eq!(config.resolve().unwrap().anchor, Anchor::Bottom);

        config.orientation = None;
        config.anchor = Some(Anchor::Left);
        assert_eq!(config.resolve().unwrap().anchor, Anchor::Left);
    }

    #[test]
    fn anchor_and_orientation_conflict() {
        let config = DrawerConfig {
            anchor: Some(Anchor::Top),
            orientation: Some(Orientation::Vertical),
            ..DrawerConfig::with_panels(three_panels())
        };
        assert_eq!(config.resolve(), Err(DrawerConfigError::ConflictingPlacement));
    }

    #[test]
    fn panel_list_is_validated() {
        assert_eq!(
            DrawerConfig::default().resolve(),
            Err(DrawerConfigError::NoPanels)
        );

        let mut panels = three_panels();
        panels.push(PanelSpec::new("h4", "c4"));
        panels.push(PanelSpec::new("h5", "c5"));
        assert_eq!(
            DrawerConfig::with_panels(panels).resolve(),
            Err(DrawerConfigError::TooManyPanels { count: 5 })
        );

        let mut panels = three_panels();
        panels[1].handle.clear();
        assert_eq!(
            DrawerConfig::with_panels(panels).resolve(),
            Err(DrawerConfigError::MissingHandle { index: 1 })
        );

        let mut panels = three_panels();
        panels[2].content = "  ".into();
        assert_eq!(
            DrawerConfig::with_panels(panels).resolve(),
            Err(DrawerConfigError::MissingContent { index: 2 })
        );

        let mut panels = three_panels();
        panels[0].handle_extent = 0;
        assert_eq!(
            DrawerConfig::with_panels(panels).resolve(),
            Err(DrawerConfigError::InvalidHandleExtent { index: 0, extent: 0 })
        );
    }

    #[test]
    fn thresholds_scale_with_density() {
        let base = Thresholds::for_density(1.0);
        assert_eq!(base.tap, 6);
        assert_eq!(base.max_major_velocity, 200);
        assert_eq!(base.velocity_units, 1000);

        let hdpi = Thresholds::for_density(1.5);
        assert_eq!(hdpi.tap, 9);
        assert_eq!(hdpi.max_tap_velocity, 150);
        assert_eq!(hdpi.max_acceleration, 3000);
    }

    #[test]
    fn bad_density_falls_back() {
        let config = DrawerConfig {
            density: 0.0,
            ..DrawerConfig::with_panels(three_panels())
        };
        assert_eq!(config.resolve().unwrap().thresholds, Thresholds::for_density(1.0));
    }

    #[test]
    fn effective_coordinates_grow_toward_anchor() {
        let container = Size::new(400, 600);
        assert_eq!(Anchor::Bottom.effective(10.0, 500.0, container), (500.0, 10.0));
        assert_eq!(Anchor::Top.effective(10.0, 500.0, container), (100.0, 10.0));
        assert_eq!(Anchor::Right.effective(300.0, 20.0, container), (300.0, 20.0));
        assert_eq!(Anchor::Left.effective(300.0, 20.0, container), (100.0, 20.0));
        assert_eq!(Anchor::Left.major_extent(container), 400);
        assert_eq!(Anchor::Top.minor_extent(container), 400);
    }
}

// Multi-panel sliding drawer: configuration, gesture physics, frame tickets
// and the compositing plan. Rendering is left to the host.

pub mod config;
pub mod engine;
pub mod frame;
pub mod surface;
pub mod velocity;

pub use config::{Anchor, DrawerConfig, DrawerConfigError, Orientation, PanelSpec, Size};
pub use engine::{DrawerEngine, DrawerEvent, PointerAction, PointerEvent};
pub use frame::{FrameRequest, FRAME_INTERVAL};
pub use surface::{ContentSurface, DrawOp};

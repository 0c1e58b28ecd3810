// What the engine needs from a panel's content view, and the draw plan it
// hands back to whoever paints the drawer.

/// A content view bound to one panel.
///
/// While a panel is moving, the engine composites offscreen snapshots
/// instead of the live views, so at most two snapshots exist at a time.
pub trait ContentSurface {
    fn set_visible(&mut self, visible: bool);

    fn is_visible(&self) -> bool;

    /// Lay the content out for `extent` pixels along the sliding axis and
    /// snapshot it. A surface may decline, in which case it is drawn live.
    fn build_cache(&mut self, extent: i32);

    fn has_cache(&self) -> bool;

    fn release_cache(&mut self);
}

/// One step of the compositing plan, in effective (anchored) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOp {
    /// Blit `panel`'s snapshot with its leading edge at `at`.
    Cached { panel: usize, at: i32 },
    /// Draw `panel`'s live view shifted by `translate` from its open layout.
    Live { panel: usize, translate: i32 },
    /// Draw the settled, expanded content at its layout position.
    Content { panel: usize },
    /// Draw `panel`'s handle with its leading edge at `at`.
    Handle { panel: usize, at: i32 },
}

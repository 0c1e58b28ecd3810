// Drawer content for the console: each panel holds a list of text rows and,
// while the drawer moves, a frozen copy of them.

use scorecenter_core::GroupingLevel;
use scorecenter_drawer::ContentSurface;

/// Panel that lists headlines.
pub const NEWS_PANEL: usize = 0;
/// Panel that lists a league's teams or a team's roster.
pub const LISTING_PANEL: usize = 2;

const GROUP_SECTIONS: [&str; 4] = ["News", "Standings", "Teams", "Schedule"];
const TEAM_SECTIONS: [&str; 4] = ["News", "Schedule", "Roster", "Game Recap"];
const PLAYER_SECTIONS: [&str; 4] = ["Stats", "Game Recap", "Images", "Roster"];

/// Handle labels for a selection at `level`.
pub fn section_labels(level: GroupingLevel) -> [&'static str; 4] {
    match level {
        GroupingLevel::Team => TEAM_SECTIONS,
        _ => GROUP_SECTIONS,
    }
}

/// Handle labels while a single player is shown.
pub fn player_section_labels() -> [&'static str; 4] {
    PLAYER_SECTIONS
}

#[derive(Debug, Clone, Default)]
pub struct SectionPanel {
    pub name: String,
    rows: Vec<String>,
    visible: bool,
    snapshot: Option<Vec<String>>,
}

impl SectionPanel {
    pub fn new(name: impl Into<String>) -> Self {
        SectionPanel {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Content resolver for `DrawerEngine::build`: accepts any non-blank name.
    pub fn resolve(name: &str) -> Option<SectionPanel> {
        let name = name.trim();
        (!name.is_empty()).then(|| SectionPanel::new(name))
    }

    pub fn set_rows(&mut self, rows: Vec<String>) {
        self.rows = rows;
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    /// What a viewer would see right now: the snapshot while one exists.
    pub fn shown_rows(&self) -> &[String] {
        self.snapshot.as_deref().unwrap_or(&self.rows)
    }
}

impl ContentSurface for SectionPanel {
    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn build_cache(&mut self, extent: i32) {
        // Nothing fits, draw live.
        if extent <= 0 {
            return;
        }
        self.snapshot = Some(self.rows.clone());
    }

    fn has_cache(&self) -> bool {
        self.snapshot.is_some()
    }

    fn release_cache(&mut self) {
        self.snapshot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn team_level_gets_roster_sections() {
        assert_eq!(section_labels(GroupingLevel::Team)[2], "Roster");
        assert_eq!(section_labels(GroupingLevel::League)[2], "Teams");
        assert_eq!(section_labels(GroupingLevel::Sport), section_labels(GroupingLevel::None));
    }

    #[test]
    fn resolver_rejects_blank_names() {
        assert!(SectionPanel::resolve("  ").is_none());
        assert_eq!(SectionPanel::resolve("content1").unwrap().name, "content1");
    }

    #[test]
    fn snapshot_freezes_rows_until_released() {
        let mut panel = SectionPanel::new("news");
        panel.set_rows(vec!["a".into()]);
        panel.build_cache(100);
        panel.set_rows(vec!["b".into()]);
        assert!(panel.has_cache());
        assert_eq!(panel.shown_rows(), ["a".to_string()]);

        panel.release_cache();
        assert_eq!(panel.shown_rows(), ["b".to_string()]);
    }

    #[test]
    fn no_snapshot_without_room() {
        let mut panel = SectionPanel::new("news");
        panel.build_cache(0);
        assert!(!panel.has_cache());
    }
}

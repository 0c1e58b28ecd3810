// Messages exchanged between the console front end, the app event loop and
// the background load tasks.

use std::sync::Arc;

use scorecenter_core::grouping::{Grouping, NodeId, Player};
use scorecenter_core::news::NewsItem;
use scorecenter_drawer::{DrawOp, DrawerEvent, PointerAction};

// ---------------------------------------------------------------------------
// Front end -> app
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum UserCommand {
    SelectSport(String),
    SelectLeague(String),
    SelectTeam(String),
    SelectPlayer(String),
    /// Select the parent of the current selection.
    Up,
    ShowTree,
    Drawer(DrawerCommand),
    /// Raw pointer input for the drawer, in display pixels.
    Pointer { action: PointerAction, x: f32, y: f32 },
    Quit,
}

/// Programmatic drawer control. Panel indexes are zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawerCommand {
    Open(usize),
    Close(usize),
    Toggle(usize),
    Click(usize),
}

// ---------------------------------------------------------------------------
// Background loads -> app
// ---------------------------------------------------------------------------

/// Identifies the selection a load was started for. A result is applied only
/// while its token is still the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionToken {
    pub node: NodeId,
    pub generation: u64,
}

#[derive(Debug)]
pub enum LoadOutcome {
    /// Leagues for a starter sport loaded at startup. Not tied to a selection.
    Leagues {
        sport: NodeId,
        leagues: Option<Arc<Vec<Grouping>>>,
    },
    Teams {
        token: SelectionToken,
        teams: Option<Arc<Vec<Grouping>>>,
    },
    Players {
        token: SelectionToken,
        players: Option<Arc<Vec<Player>>>,
    },
    News {
        token: SelectionToken,
        news: Option<Arc<Vec<NewsItem>>>,
    },
}

// ---------------------------------------------------------------------------
// App -> front end
// ---------------------------------------------------------------------------

/// Breadcrumb shown above the drawer. `None` hides a level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    pub sport: Option<String>,
    pub league: Option<String>,
    pub team: Option<String>,
    pub player: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerRow {
    pub name: String,
    pub position: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UiUpdate {
    Header(Header),
    /// Handle labels, one per drawer panel.
    Sections(Vec<String>),
    /// A load for the named section is in flight.
    Loading(String),
    News(Vec<NewsItem>),
    Teams(Vec<String>),
    Roster(Vec<PlayerRow>),
    /// Indented outline of the grouping tree.
    Tree(Vec<String>),
    Drawer {
        events: Vec<DrawerEvent>,
        expanded: Option<usize>,
        plan: Vec<DrawOp>,
    },
    Notice(String),
}

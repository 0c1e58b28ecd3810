// Sport / league / team hierarchy.
//
// The tree is an arena: nodes own their children through index lists and
// point back at their parent with a plain `NodeId`, so there are no reference
// cycles. The tree only grows; nothing is ever removed.

use std::fmt;

use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Identifiers and levels
// ---------------------------------------------------------------------------

/// Index of a node inside a [`GroupingTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Depth of a grouping in the fixed order NONE < SPORT < LEAGUE < TEAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupingLevel {
    None,
    Sport,
    League,
    Team,
}

impl GroupingLevel {
    /// The level a child of this level must have, if children are allowed.
    pub fn child(self) -> Option<GroupingLevel> {
        match self {
            GroupingLevel::None => Some(GroupingLevel::Sport),
            GroupingLevel::Sport => Some(GroupingLevel::League),
            GroupingLevel::League => Some(GroupingLevel::Team),
            GroupingLevel::Team => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GroupingLevel::None => "NONE",
            GroupingLevel::Sport => "SPORT",
            GroupingLevel::League => "LEAGUE",
            GroupingLevel::Team => "TEAM",
        }
    }
}

impl fmt::Display for GroupingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque reference to an image resource (sport icon, team logo, headshot).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageHandle(pub String);

impl ImageHandle {
    pub fn named(name: impl Into<String>) -> Self {
        ImageHandle(name.into())
    }
}

// ---------------------------------------------------------------------------
// Players and team payload
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub display_name: String,
    pub short_name: String,
    pub position: String,
    /// The team node this player was loaded for.
    pub team: NodeId,
    pub headshot: Option<ImageHandle>,
}

/// Team-specific data carried by [`GroupingKind::Team`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeamInfo {
    pub location: String,
    players: Vec<Player>,
}

impl TeamInfo {
    pub fn new(location: impl Into<String>) -> Self {
        TeamInfo {
            location: location.into(),
            players: Vec::new(),
        }
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Append a player unless one with the same display name is already on
    /// the roster. Returns whether the player was added.
    pub fn add_player(&mut self, player: Player) -> bool {
        if self
            .players
            .iter()
            .any(|p| p.display_name == player.display_name)
        {
            return false;
        }
        self.players.push(player);
        true
    }
}

// ---------------------------------------------------------------------------
// Grouping values
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum GroupingKind {
    None,
    Sport,
    League,
    Team(TeamInfo),
}

impl GroupingKind {
    pub fn level(&self) -> GroupingLevel {
        match self {
            GroupingKind::None => GroupingLevel::None,
            GroupingKind::Sport => GroupingLevel::Sport,
            GroupingKind::League => GroupingLevel::League,
            GroupingKind::Team(_) => GroupingLevel::Team,
        }
    }
}

/// A node's payload. Values returned by a data source are detached groupings;
/// they join the tree through [`GroupingTree::add`].
#[derive(Debug, Clone, PartialEq)]
pub struct Grouping {
    pub kind: GroupingKind,
    /// e.g. "Baseball", "Blue Jays", "National Football League".
    pub name: String,
    pub abbreviation: String,
    pub image: Option<ImageHandle>,
}

impl Grouping {
    pub fn new(kind: GroupingKind, name: impl Into<String>, abbreviation: impl Into<String>) -> Self {
        Grouping {
            kind,
            name: name.into(),
            abbreviation: abbreviation.into(),
            image: None,
        }
    }

    pub fn sport(name: impl Into<String>, abbreviation: impl Into<String>) -> Self {
        Self::new(GroupingKind::Sport, name, abbreviation)
    }

    pub fn league(name: impl Into<String>, abbreviation: impl Into<String>) -> Self {
        Self::new(GroupingKind::League, name, abbreviation)
    }

    pub fn team(
        name: impl Into<String>,
        abbreviation: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self::new(GroupingKind::Team(TeamInfo::new(location)), name, abbreviation)
    }

    pub fn with_image(mut self, image: ImageHandle) -> Self {
        self.image = Some(image);
        self
    }

    pub fn level(&self) -> GroupingLevel {
        self.kind.level()
    }

    pub fn team_info(&self) -> Option<&TeamInfo> {
        match &self.kind {
            GroupingKind::Team(info) => Some(info),
            _ => None,
        }
    }

    /// Abbreviation to show in headers. A few ESPN slugs are replaced by a
    /// friendlier label; everything else is shown as-is.
    pub fn display_abbreviation(&self) -> &str {
        abbreviation_override(&self.abbreviation).unwrap_or(&self.abbreviation)
    }

    /// "Toronto Blue Jays" for teams, the plain name otherwise.
    pub fn full_name(&self) -> String {
        match &self.kind {
            GroupingKind::Team(info) if !info.location.is_empty() => {
                format!("{} {}", info.location, self.name)
            }
            _ => self.name.clone(),
        }
    }
}

fn abbreviation_override(abbreviation: &str) -> Option<&'static str> {
    match abbreviation.to_lowercase().as_str() {
        "college-football" => Some("NCAA"),
        "mens-college-basketball" => Some("NCAA"),
        "womens-college-basketball" => Some("NCAA (W)"),
        _ => None,
    }
}

fn same_name(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b) || a.to_lowercase() == b.to_lowercase()
}

// ---------------------------------------------------------------------------
// Request scopes
// ---------------------------------------------------------------------------

/// Name and abbreviation of one ancestor in a [`RequestScope`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopePart {
    pub name: String,
    pub abbreviation: String,
}

/// Owned snapshot of a node and its sport/league ancestry.
///
/// Background loads cannot borrow the tree, so they receive this instead and
/// hand back detached values that the UI side attaches later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestScope {
    pub node: NodeId,
    pub level: GroupingLevel,
    pub name: String,
    pub abbreviation: String,
    pub sport: Option<ScopePart>,
    pub league: Option<ScopePart>,
}

// ---------------------------------------------------------------------------
// GroupingTree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Node {
    grouping: Grouping,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct GroupingTree {
    nodes: Vec<Node>,
}

impl Default for GroupingTree {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupingTree {
    /// Create a tree holding only the NONE root.
    pub fn new() -> Self {
        GroupingTree {
            nodes: vec![Node {
                grouping: Grouping::new(GroupingKind::None, "", ""),
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn grouping(&self, id: NodeId) -> &Grouping {
        &self.nodes[id.0].grouping
    }

    pub fn grouping_mut(&mut self, id: NodeId) -> &mut Grouping {
        &mut self.nodes[id.0].grouping
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Case-insensitive lookup of a direct child by name.
    pub fn get(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|&child| same_name(&self.grouping(child).name, name))
    }

    /// Like [`get`](Self::get), but an abbreviation match also counts.
    pub fn content_group(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.children(parent).iter().copied().find(|&child| {
            let g = self.grouping(child);
            same_name(&g.name, name) || same_name(&g.abbreviation, name)
        })
    }

    /// Attach `grouping` under `parent`.
    ///
    /// Returns `None` without touching the tree when a sibling already has the
    /// same name (ignoring case) or when the grouping is not exactly one level
    /// below its parent.
    pub fn add(&mut self, parent: NodeId, grouping: Grouping) -> Option<NodeId> {
        let parent_level = self.grouping(parent).level();
        if parent_level.child() != Some(grouping.level()) {
            warn!(
                parent = %self.grouping(parent).name,
                parent_level = %parent_level,
                child_level = %grouping.level(),
                "rejected grouping at the wrong level"
            );
            return None;
        }

        if self.get(parent, &grouping.name).is_some() {
            debug!(name = %grouping.name, "grouping already present, skipping");
            return None;
        }

        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            grouping,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        Some(id)
    }

    /// Nearest SPORT node at or above `id`.
    pub fn sport(&self, id: NodeId) -> Option<NodeId> {
        self.nearest(id, GroupingLevel::Sport)
    }

    /// Nearest LEAGUE node at or above `id`.
    pub fn league(&self, id: NodeId) -> Option<NodeId> {
        self.nearest(id, GroupingLevel::League)
    }

    fn nearest(&self, id: NodeId, level: GroupingLevel) -> Option<NodeId> {
        let mut current = id;
        loop {
            let current_level = self.grouping(current).level();
            if current_level == GroupingLevel::None {
                return None;
            }
            if current_level == level {
                return Some(current);
            }
            current = self.parent(current)?;
        }
    }

    pub fn team(&self, id: NodeId) -> Option<&TeamInfo> {
        self.grouping(id).team_info()
    }

    /// Add a player to a team's roster. Returns `false` for non-team nodes and
    /// for duplicate display names.
    pub fn add_player(&mut self, team: NodeId, mut player: Player) -> bool {
        match &mut self.nodes[team.0].grouping.kind {
            GroupingKind::Team(info) => {
                player.team = team;
                info.add_player(player)
            }
            _ => {
                warn!(node = team.index(), "add_player called on a non-team node");
                false
            }
        }
    }

    /// Display abbreviation of a node, see [`Grouping::display_abbreviation`].
    pub fn abbrev(&self, id: NodeId) -> &str {
        self.grouping(id).display_abbreviation()
    }

    /// Ancestors from the first sport down to `id` itself (root excluded).
    pub fn path(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            if self.grouping(node).level() == GroupingLevel::None {
                break;
            }
            path.push(node);
            current = self.parent(node);
        }
        path.reverse();
        path
    }

    /// Snapshot `id` and its ancestry for a background load.
    pub fn scope(&self, id: NodeId) -> RequestScope {
        let part = |node: NodeId| {
            let g = self.grouping(node);
            ScopePart {
                name: g.name.clone(),
                abbreviation: g.abbreviation.clone(),
            }
        };
        let g = self.grouping(id);
        RequestScope {
            node: id,
            level: g.level(),
            name: g.name.clone(),
            abbreviation: g.abbreviation.clone(),
            sport: self.sport(id).map(part),
            league: self.league(id).map(part),
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

// Application state and orchestration logic.
//
// The central event loop that coordinates user commands from the console,
// results of background data loads, and drawer animation frames. Owns the
// grouping tree and the drawer; pushes UI updates to the console.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use scorecenter_core::grouping::{Grouping, GroupingLevel, GroupingTree, ImageHandle, NodeId};
use scorecenter_core::{DataLoader, NewsItem, RequestScope};
use scorecenter_drawer::{DrawerEngine, FrameRequest, PointerEvent, Size};

use crate::config::{Config, SportsConfig};
use crate::protocol::{
    DrawerCommand, Header, LoadOutcome, PlayerRow, SelectionToken, UiUpdate, UserCommand,
};
use crate::sections::{self, SectionPanel, LISTING_PANEL, NEWS_PANEL};

const SELECT_LEAGUE: &str = "<select league>";
const SELECT_TEAM: &str = "<select team>";
const SELECT_PLAYER: &str = "<select player>";

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

pub struct AppState {
    pub tree: GroupingTree,
    pub drawer: DrawerEngine<SectionPanel>,
    loader: Arc<DataLoader>,
    load_tx: mpsc::Sender<LoadOutcome>,
    sports: SportsConfig,
    /// Current selection. Loads carry a copy and are dropped once it moves on.
    selection: Option<SelectionToken>,
    generation: u64,
    /// Display name of the player shown within the selected team, if any.
    active_player: Option<String>,
}

impl AppState {
    pub fn new(
        config: &Config,
        loader: Arc<DataLoader>,
        mut drawer: DrawerEngine<SectionPanel>,
        load_tx: mpsc::Sender<LoadOutcome>,
    ) -> Self {
        drawer.layout(Size::new(config.display.width, config.display.height));
        AppState {
            tree: GroupingTree::new(),
            drawer,
            loader,
            load_tx,
            sports: config.sports.clone(),
            selection: None,
            generation: 0,
            active_player: None,
        }
    }

    pub fn selection(&self) -> Option<SelectionToken> {
        self.selection
    }

    pub fn selected(&self) -> Option<NodeId> {
        self.selection.map(|s| s.node)
    }

    pub fn active_player(&self) -> Option<&str> {
        self.active_player.as_deref()
    }

    fn is_current(&self, token: SelectionToken) -> bool {
        self.selection == Some(token)
    }

    // -----------------------------------------------------------------------
    // Startup
    // -----------------------------------------------------------------------

    /// Populate the tree with the starter sports and select the favorite
    /// league. The favorite sport's leagues are loaded before returning; the
    /// other sports load in the background.
    pub async fn startup(&mut self) -> Vec<UiUpdate> {
        let root = self.tree.root();
        let favorite_name = self.sports.favorite.clone();

        let favorite = self.add_sport(&favorite_name);
        if let Some(sport) = favorite {
            let scope = self.tree.scope(sport);
            if let Some(leagues) = self.loader.load_leagues(&scope).await {
                self.attach_leagues(sport, &leagues);
            }
        }

        let others: Vec<String> = self
            .sports
            .starters
            .iter()
            .filter(|s| !s.eq_ignore_ascii_case(&favorite_name))
            .cloned()
            .collect();
        for name in others {
            let Some(sport) = self.add_sport(&name) else {
                continue;
            };
            self.spawn_load(sport, move |loader, scope| async move {
                LoadOutcome::Leagues {
                    sport,
                    leagues: loader.load_leagues(&scope).await,
                }
            });
        }

        let initial = match favorite {
            Some(sport) => match self.tree.content_group(sport, &self.sports.favorite_league) {
                Some(league) => league,
                None => {
                    warn!(
                        league = %self.sports.favorite_league,
                        "favorite league not available, selecting its sport"
                    );
                    sport
                }
            },
            None => root,
        };
        info!(
            sports = self.tree.children(root).len(),
            "startup complete"
        );

        let mut updates = self.select(initial);
        updates.push(self.drawer_update());
        updates
    }

    fn add_sport(&mut self, name: &str) -> Option<NodeId> {
        let root = self.tree.root();
        let sport = Grouping::sport(name, name).with_image(ImageHandle::named(name.to_lowercase()));
        let id = self.tree.add(root, sport);
        if id.is_none() {
            warn!(sport = name, "duplicate starter sport ignored");
        }
        id
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    /// Make `node` the active group: relabel the drawer, reset the header and
    /// start whatever loads the node still needs.
    pub fn select(&mut self, node: NodeId) -> Vec<UiUpdate> {
        self.generation += 1;
        let token = SelectionToken {
            node,
            generation: self.generation,
        };
        self.selection = Some(token);
        self.active_player = None;

        let level = self.tree.grouping(node).level();
        info!(
            name = %self.tree.grouping(node).name,
            level = %level,
            generation = token.generation,
            "group selected"
        );

        let mut updates = vec![
            UiUpdate::Sections(self.labels(sections::section_labels(level))),
            UiUpdate::Header(self.header_for(node)),
        ];
        self.set_panel_rows(NEWS_PANEL, Vec::new());
        self.set_panel_rows(LISTING_PANEL, Vec::new());

        self.spawn_load(node, move |loader, scope| async move {
            LoadOutcome::News {
                token,
                news: loader.load_news(&scope).await,
            }
        });
        updates.push(UiUpdate::Loading("News".into()));

        match level {
            GroupingLevel::League if self.tree.children(node).is_empty() => {
                self.spawn_load(node, move |loader, scope| async move {
                    LoadOutcome::Teams {
                        token,
                        teams: loader.load_teams(&scope).await,
                    }
                });
                updates.push(UiUpdate::Loading("Teams".into()));
            }
            GroupingLevel::League => updates.push(self.show_teams(node)),
            GroupingLevel::Team if self.roster_is_empty(node) => {
                self.spawn_load(node, move |loader, scope| async move {
                    LoadOutcome::Players {
                        token,
                        players: loader.load_players(&scope).await,
                    }
                });
                updates.push(UiUpdate::Loading("Roster".into()));
            }
            GroupingLevel::Team => updates.push(self.show_roster(node)),
            // A sport whose leagues failed to load earlier gets another try.
            GroupingLevel::Sport if self.tree.children(node).is_empty() => {
                self.spawn_load(node, move |loader, scope| async move {
                    LoadOutcome::Leagues {
                        sport: node,
                        leagues: loader.load_leagues(&scope).await,
                    }
                });
                updates.push(UiUpdate::Loading("Leagues".into()));
            }
            GroupingLevel::None | GroupingLevel::Sport => {}
        }

        updates
    }

    /// Show one player of the selected team. The team stays selected, so its
    /// pending loads still land.
    fn select_player(&mut self, name: &str) -> Vec<UiUpdate> {
        let Some(team) = self.selected().filter(|&n| self.tree.team(n).is_some()) else {
            return vec![UiUpdate::Notice("select a team first".into())];
        };
        let player = self.tree.team(team).and_then(|info| {
            info.players().iter().find(|p| {
                p.display_name.eq_ignore_ascii_case(name) || p.short_name.eq_ignore_ascii_case(name)
            })
        });
        let Some(player) = player.cloned() else {
            return vec![UiUpdate::Notice(format!("no player named '{name}'"))];
        };

        info!(player = %player.display_name, "player selected");
        self.active_player = Some(player.display_name.clone());

        let team_grouping = self.tree.grouping(team);
        let header = Header {
            sport: self.sport_name(team),
            league: self.league_label(team),
            team: Some(team_grouping.name.clone()),
            player: Some(player.short_name.clone()),
        };
        let row = format!("{} ({})", player.display_name, player.position);
        self.set_panel_rows(LISTING_PANEL, vec![row]);

        vec![
            UiUpdate::Sections(self.labels(sections::player_section_labels())),
            UiUpdate::Header(header),
            UiUpdate::Roster(vec![PlayerRow {
                name: player.display_name,
                position: player.position,
            }]),
        ]
    }

    fn labels(&self, labels: [&str; 4]) -> Vec<String> {
        labels
            .iter()
            .take(self.drawer.panel_count())
            .map(|s| s.to_string())
            .collect()
    }

    fn header_for(&self, node: NodeId) -> Header {
        let g = self.tree.grouping(node);
        match g.level() {
            GroupingLevel::None => Header::default(),
            GroupingLevel::Sport => Header {
                sport: Some(g.name.clone()),
                league: Some(SELECT_LEAGUE.into()),
                ..Header::default()
            },
            GroupingLevel::League => Header {
                sport: self.sport_name(node),
                league: self.league_label(node),
                team: Some(SELECT_TEAM.into()),
                player: None,
            },
            GroupingLevel::Team => Header {
                sport: self.sport_name(node),
                league: self.league_label(node),
                team: Some(g.name.clone()),
                player: Some(SELECT_PLAYER.into()),
            },
        }
    }

    fn sport_name(&self, node: NodeId) -> Option<String> {
        self.tree
            .sport(node)
            .map(|s| self.tree.grouping(s).name.clone())
    }

    fn league_label(&self, node: NodeId) -> Option<String> {
        self.tree
            .league(node)
            .map(|l| self.tree.abbrev(l).to_uppercase())
    }

    fn roster_is_empty(&self, team: NodeId) -> bool {
        self.tree.team(team).map_or(true, |info| info.is_empty())
    }

    // -----------------------------------------------------------------------
    // Background loads
    // -----------------------------------------------------------------------

    /// Run a load for `node` on the runtime and post its outcome back to the
    /// event loop.
    fn spawn_load<F, Fut>(&self, node: NodeId, load: F)
    where
        F: FnOnce(Arc<DataLoader>, RequestScope) -> Fut,
        Fut: Future<Output = LoadOutcome> + Send + 'static,
    {
        let task = load(Arc::clone(&self.loader), self.tree.scope(node));
        let tx = self.load_tx.clone();
        tokio::spawn(async move {
            let outcome = task.await;
            if tx.send(outcome).await.is_err() {
                debug!("event loop gone, dropping load result");
            }
        });
    }

    /// Fold a finished load into the tree. Results for a superseded selection
    /// are dropped untouched.
    pub fn apply_outcome(&mut self, outcome: LoadOutcome) -> Vec<UiUpdate> {
        match outcome {
            LoadOutcome::Leagues { sport, leagues } => {
                let Some(leagues) = leagues else {
                    return Vec::new();
                };
                let attached = self.attach_leagues(sport, &leagues);
                if attached && self.selected() == Some(sport) {
                    vec![self.show_leagues(sport)]
                } else {
                    Vec::new()
                }
            }
            LoadOutcome::Teams { token, teams } => {
                if !self.is_current(token) {
                    debug!(generation = token.generation, "discarding stale teams");
                    return Vec::new();
                }
                let Some(teams) = teams else {
                    return Vec::new();
                };
                if self.tree.children(token.node).is_empty() {
                    for team in teams.iter() {
                        self.tree.add(token.node, team.clone());
                    }
                }
                vec![self.show_teams(token.node)]
            }
            LoadOutcome::Players { token, players } => {
                if !self.is_current(token) {
                    debug!(generation = token.generation, "discarding stale roster");
                    return Vec::new();
                }
                let Some(players) = players else {
                    return Vec::new();
                };
                if self.roster_is_empty(token.node) {
                    for player in players.iter() {
                        self.tree.add_player(token.node, player.clone());
                    }
                }
                if self.active_player.is_some() {
                    return Vec::new();
                }
                vec![self.show_roster(token.node)]
            }
            LoadOutcome::News { token, news } => {
                if !self.is_current(token) {
                    debug!(generation = token.generation, "discarding stale news");
                    return Vec::new();
                }
                let Some(news) = news else {
                    return Vec::new();
                };
                self.set_panel_rows(NEWS_PANEL, news.iter().map(news_row).collect());
                vec![UiUpdate::News(news.to_vec())]
            }
        }
    }

    /// Returns false when the sport already had leagues.
    fn attach_leagues(&mut self, sport: NodeId, leagues: &[Grouping]) -> bool {
        if !self.tree.children(sport).is_empty() {
            debug!(
                sport = %self.tree.grouping(sport).name,
                "leagues already attached, skipping"
            );
            return false;
        }
        let mut added = 0;
        for league in leagues {
            if self.tree.add(sport, league.clone()).is_some() {
                added += 1;
            }
        }
        info!(sport = %self.tree.grouping(sport).name, added, "leagues attached");
        true
    }

    fn show_leagues(&self, sport: NodeId) -> UiUpdate {
        let names: Vec<String> = self
            .tree
            .children(sport)
            .iter()
            .map(|&league| self.tree.abbrev(league).to_uppercase())
            .collect();
        UiUpdate::Notice(format!("leagues: {}", names.join(", ")))
    }

    fn show_teams(&mut self, league: NodeId) -> UiUpdate {
        let names: Vec<String> = self
            .tree
            .children(league)
            .iter()
            .map(|&team| self.tree.grouping(team).full_name())
            .collect();
        self.set_panel_rows(LISTING_PANEL, names.clone());
        UiUpdate::Teams(names)
    }

    fn show_roster(&mut self, team: NodeId) -> UiUpdate {
        let rows: Vec<PlayerRow> = self
            .tree
            .team(team)
            .map(|info| {
                info.players()
                    .iter()
                    .map(|p| PlayerRow {
                        name: p.display_name.clone(),
                        position: p.position.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        self.set_panel_rows(
            LISTING_PANEL,
            rows.iter()
                .map(|r| format!("{} ({})", r.name, r.position))
                .collect(),
        );
        UiUpdate::Roster(rows)
    }

    fn set_panel_rows(&mut self, idx: usize, rows: Vec<String>) {
        if let Some(panel) = self.drawer.content_mut(idx) {
            panel.set_rows(rows);
        }
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Apply one user command. `Quit` is handled by the event loop.
    pub fn handle_command(&mut self, cmd: UserCommand, now: std::time::Instant) -> Vec<UiUpdate> {
        match cmd {
            UserCommand::SelectSport(name) => {
                let root = self.tree.root();
                match self.tree.content_group(root, &name) {
                    Some(sport) => self.select(sport),
                    None => vec![UiUpdate::Notice(format!("no sport named '{name}'"))],
                }
            }
            UserCommand::SelectLeague(name) => {
                let Some(sport) = self.selected().and_then(|n| self.tree.sport(n)) else {
                    return vec![UiUpdate::Notice("select a sport first".into())];
                };
                match self.tree.content_group(sport, &name) {
                    Some(league) => self.select(league),
                    None => vec![UiUpdate::Notice(format!("no league named '{name}'"))],
                }
            }
            UserCommand::SelectTeam(name) => {
                let Some(league) = self.selected().and_then(|n| self.tree.league(n)) else {
                    return vec![UiUpdate::Notice("select a league first".into())];
                };
                match self.tree.content_group(league, &name) {
                    Some(team) => self.select(team),
                    None => vec![UiUpdate::Notice(format!("no team named '{name}'"))],
                }
            }
            UserCommand::SelectPlayer(name) => self.select_player(&name),
            UserCommand::Up => self.go_up(),
            UserCommand::ShowTree => vec![UiUpdate::Tree(self.tree_lines())],
            UserCommand::Drawer(cmd) => self.handle_drawer(cmd, now),
            UserCommand::Pointer { action, x, y } => {
                let consumed = self
                    .drawer
                    .handle_pointer(PointerEvent::new(action, x, y, now));
                if !consumed {
                    debug!(?action, x, y, "pointer not consumed by drawer");
                }
                vec![self.drawer_update()]
            }
            UserCommand::Quit => Vec::new(),
        }
    }

    fn go_up(&mut self) -> Vec<UiUpdate> {
        let Some(node) = self.selected() else {
            return vec![UiUpdate::Notice("nothing selected".into())];
        };
        if self.active_player.is_some() {
            return self.select(node);
        }
        match self.tree.parent(node) {
            Some(parent) => self.select(parent),
            None => vec![UiUpdate::Notice("already at the top".into())],
        }
    }

    fn handle_drawer(&mut self, cmd: DrawerCommand, now: std::time::Instant) -> Vec<UiUpdate> {
        match cmd {
            DrawerCommand::Open(idx) => self.drawer.animate_open(idx, now),
            DrawerCommand::Close(idx) => self.drawer.animate_close(idx, now),
            DrawerCommand::Toggle(idx) => self.drawer.animate_toggle(idx, now),
            DrawerCommand::Click(idx) => {
                if !self.drawer.click(idx, now) {
                    return vec![UiUpdate::Notice(format!("handle {} is locked", idx + 1))];
                }
            }
        }
        vec![self.drawer_update()]
    }

    /// Advance the drawer animation. Only frames that produce drawer events
    /// (a panel settling) are reported.
    pub fn on_frame(&mut self, frame: FrameRequest, now: std::time::Instant) -> Option<UiUpdate> {
        if !self.drawer.on_frame(frame.generation, now) {
            return None;
        }
        let events = self.drawer.take_events();
        if events.is_empty() {
            return None;
        }
        Some(UiUpdate::Drawer {
            events,
            expanded: self.drawer.expanded(),
            plan: self.drawer.compose(),
        })
    }

    fn drawer_update(&mut self) -> UiUpdate {
        UiUpdate::Drawer {
            events: self.drawer.take_events(),
            expanded: self.drawer.expanded(),
            plan: self.drawer.compose(),
        }
    }

    fn tree_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        let mut stack: Vec<(NodeId, usize)> = self
            .tree
            .children(self.tree.root())
            .iter()
            .rev()
            .map(|&n| (n, 0))
            .collect();
        while let Some((node, depth)) = stack.pop() {
            let g = self.tree.grouping(node);
            let marker = if self.selected() == Some(node) { "*" } else { " " };
            let mut line = format!("{marker} {}{} ({})", "  ".repeat(depth), g.name, g.display_abbreviation());
            if let Some(info) = g.team_info() {
                if !info.is_empty() {
                    line.push_str(&format!(" [{} players]", info.len()));
                }
            }
            lines.push(line);
            stack.extend(self.tree.children(node).iter().rev().map(|&c| (c, depth + 1)));
        }
        lines
    }
}

fn news_row(item: &NewsItem) -> String {
    let label = item.published_label();
    if label.is_empty() {
        item.headline.clone()
    } else {
        format!("{}  {}", item.headline, label)
    }
}

// ---------------------------------------------------------------------------
// Event loop
// ---------------------------------------------------------------------------

/// Run the main application event loop.
///
/// Listens on three sources using `tokio::select!`:
/// 1. User commands from the console
/// 2. Outcomes of background loads
/// 3. The drawer's next animation frame
///
/// Pushes UI updates through `ui_tx`.
pub async fn run(
    mut cmd_rx: mpsc::Receiver<UserCommand>,
    mut load_rx: mpsc::Receiver<LoadOutcome>,
    ui_tx: mpsc::Sender<UiUpdate>,
    mut state: AppState,
) -> anyhow::Result<()> {
    info!("Application event loop started");

    let mut loads_open = true;

    loop {
        let frame = state.drawer.next_frame();

        tokio::select! {
            // --- User commands ---
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UserCommand::Quit) => {
                        info!("Quit command received, shutting down");
                        break;
                    }
                    Some(cmd) => {
                        let updates = state.handle_command(cmd, Instant::now().into_std());
                        send_all(&ui_tx, updates).await;
                    }
                    None => {
                        info!("Command channel closed, shutting down");
                        break;
                    }
                }
            }

            // --- Load outcomes (only poll while the channel is open) ---
            outcome = load_rx.recv(), if loads_open => {
                match outcome {
                    Some(outcome) => {
                        let updates = state.apply_outcome(outcome);
                        send_all(&ui_tx, updates).await;
                    }
                    None => {
                        info!("Load channel closed");
                        loads_open = false;
                    }
                }
            }

            // --- Drawer animation ---
            _ = wait_for_frame(frame) => {
                if let Some(frame) = frame {
                    if let Some(update) = state.on_frame(frame, Instant::now().into_std()) {
                        send_all(&ui_tx, vec![update]).await;
                    }
                }
            }
        }
    }

    Ok(())
}

async fn wait_for_frame(frame: Option<FrameRequest>) {
    match frame {
        Some(frame) => tokio::time::sleep_until(Instant::from_std(frame.due)).await,
        None => std::future::pending().await,
    }
}

async fn send_all(ui_tx: &mpsc::Sender<UiUpdate>, updates: Vec<UiUpdate>) {
    for update in updates {
        if ui_tx.send(update).await.is_err() {
            debug!("UI channel closed, dropping update");
            return;
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

//! In-memory portal driven through the `Session` trait.
//!
//! The portal is described with [`CommunityFixture`] and [`WikiFixture`]
//! values; the session answers element lookups, attribute reads and clicks
//! the way the real portal's markup would for the default `PortalLayout`.
//! Element handles are readable strings (`entry:3`, `row:1:0`, ...) so test
//! failures point at the element involved.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use wikimirror_core::session::{Credentials, Element, PortalLayout, Selector, Session, SessionError};

/// A wiki page of the scripted portal.
#[derive(Debug, Clone)]
pub struct WikiFixture {
    pub name: String,
    pub links: Vec<String>,
    pub attachment_pages: Vec<Vec<String>>,
    pub subwikis: Vec<WikiFixture>,
    pub saves_page: bool,
    pub loads: bool,
}

pub fn wiki(name: &str) -> WikiFixture {
    WikiFixture {
        name: name.to_string(),
        links: Vec::new(),
        attachment_pages: Vec::new(),
        subwikis: Vec::new(),
        saves_page: true,
        loads: true,
    }
}

impl WikiFixture {
    pub fn with_links(mut self, links: Vec<String>) -> Self {
        self.links = links;
        self
    }

    pub fn with_attachment_pages(mut self, pages: Vec<Vec<String>>) -> Self {
        self.attachment_pages = pages;
        self
    }

    pub fn with_subwikis(mut self, subwikis: Vec<WikiFixture>) -> Self {
        self.subwikis = subwikis;
        self
    }

    /// The "Download Page" action produces nothing.
    pub fn without_page_save(mut self) -> Self {
        self.saves_page = false;
        self
    }

    /// Navigating to the wiki leaves the browser on a blank page.
    pub fn never_loads(mut self) -> Self {
        self.loads = false;
        self
    }
}

/// State of a community's subcommunity menu.
#[derive(Debug, Clone)]
pub enum SubMenu {
    Absent,
    Hidden,
    Listed(Vec<CommunityFixture>),
}

/// A community of the scripted portal.
#[derive(Debug, Clone)]
pub struct CommunityFixture {
    pub name: String,
    pub url: String,
    pub wikis: Vec<WikiFixture>,
    pub has_wiki_section: bool,
    pub submenu: SubMenu,
}

pub fn community(name: &str, url: &str) -> CommunityFixture {
    CommunityFixture {
        name: name.to_string(),
        url: url.to_string(),
        wikis: Vec::new(),
        has_wiki_section: true,
        submenu: SubMenu::Absent,
    }
}

impl CommunityFixture {
    pub fn with_wikis(mut self, wikis: Vec<WikiFixture>) -> Self {
        self.wikis = wikis;
        self
    }

    pub fn with_subcommunities(mut self, subcommunities: Vec<CommunityFixture>) -> Self {
        self.submenu = SubMenu::Listed(subcommunities);
        self
    }

    pub fn with_hidden_submenu(mut self) -> Self {
        self.submenu = SubMenu::Hidden;
        self
    }

    pub fn without_wiki_section(mut self) -> Self {
        self.has_wiki_section = false;
        self
    }
}

#[derive(Debug)]
struct WikiRec {
    name: String,
    url: String,
    links: Vec<String>,
    attachment_pages: Vec<Vec<String>>,
    children: Vec<usize>,
    saves_page: bool,
    loads: bool,
}

#[derive(Debug)]
enum MenuRec {
    Absent,
    Hidden,
    Listed(Vec<usize>),
}

#[derive(Debug)]
struct CommunityRec {
    name: String,
    url: String,
    wiki_home: String,
    top_wikis: Vec<usize>,
    has_wiki_section: bool,
    submenu: MenuRec,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum View {
    Blank,
    Login { pending: String },
    Community(usize),
    WikiHome(usize),
    Wiki(usize),
}

/// Scripted `Session` over a fixture portal.
#[derive(Debug)]
pub struct ScriptedSession {
    layout: PortalLayout,
    communities: Vec<CommunityRec>,
    wikis: Vec<WikiRec>,
    view: View,
    expanded: HashSet<usize>,
    attachment_page: usize,
    download_dir: Option<PathBuf>,
    credentials: Option<Credentials>,
    logged_in: bool,
    typed_login: String,
    typed_password: String,
    closed: bool,
    /// Every URL passed to `navigate`, in order.
    pub navigations: Vec<String>,
    /// Number of attachment listing scans (row lookups).
    pub row_scans: usize,
    pub close_calls: usize,
}

impl ScriptedSession {
    pub fn new(root: CommunityFixture) -> Self {
        let mut session = Self {
            layout: PortalLayout::default(),
            communities: Vec::new(),
            wikis: Vec::new(),
            view: View::Blank,
            expanded: HashSet::new(),
            attachment_page: 0,
            download_dir: None,
            credentials: None,
            logged_in: true,
            typed_login: String::new(),
            typed_password: String::new(),
            closed: false,
            navigations: Vec::new(),
            row_scans: 0,
            close_calls: 0,
        };
        session.add_community(root);
        session
    }

    /// Sends every navigation to the login page until `credentials` are
    /// submitted.
    pub fn require_login(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self.logged_in = false;
        self
    }

    /// Directory "Download Page" writes into.
    pub fn set_download_dir(&mut self, dir: impl Into<PathBuf>) {
        self.download_dir = Some(dir.into());
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// URL the scripted portal gives the wiki named `name` in `community_url`.
    pub fn wiki_url(community_url: &str, name: &str) -> String {
        format!(
            "https://portal.example.com/wikis/home/wiki/{}/page/{}",
            urlencoding::encode(community_url),
            urlencoding::encode(name)
        )
    }

    fn add_community(&mut self, fixture: CommunityFixture) -> usize {
        let id = self.communities.len();
        self.communities.push(CommunityRec {
            name: fixture.name.clone(),
            url: fixture.url.clone(),
            wiki_home: format!("{}/wiki-home", fixture.url),
            top_wikis: Vec::new(),
            has_wiki_section: fixture.has_wiki_section,
            submenu: MenuRec::Absent,
        });
        let top: Vec<usize> = fixture
            .wikis
            .into_iter()
            .map(|w| self.add_wiki(&fixture.url, w))
            .collect();
        self.communities[id].top_wikis = top;
        let submenu = match fixture.submenu {
            SubMenu::Absent => MenuRec::Absent,
            SubMenu::Hidden => MenuRec::Hidden,
            SubMenu::Listed(subs) => {
                MenuRec::Listed(subs.into_iter().map(|c| self.add_community(c)).collect())
            }
        };
        self.communities[id].submenu = submenu;
        id
    }

    fn add_wiki(&mut self, community_url: &str, fixture: WikiFixture) -> usize {
        let id = self.wikis.len();
        self.wikis.push(WikiRec {
            name: fixture.name.clone(),
            url: Self::wiki_url(community_url, &fixture.name),
            links: fixture.links,
            attachment_pages: fixture.attachment_pages,
            children: Vec::new(),
            saves_page: fixture.saves_page,
            loads: fixture.loads,
        });
        let children: Vec<usize> = fixture
            .subwikis
            .into_iter()
            .map(|w| self.add_wiki(community_url, w))
            .collect();
        self.wikis[id].children = children;
        id
    }

    fn view_for(&self, url: &str) -> View {
        if let Some(id) = self.communities.iter().position(|c| c.url == url) {
            return View::Community(id);
        }
        if let Some(id) = self.communities.iter().position(|c| c.wiki_home == url) {
            return View::WikiHome(id);
        }
        if let Some(id) = self.wikis.iter().position(|w| w.url == url && w.loads) {
            return View::Wiki(id);
        }
        View::Blank
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.closed {
            Err(SessionError::Closed)
        } else {
            Ok(())
        }
    }

    fn resolve(&mut self, scope: Option<&Element>, selector: &Selector) -> Vec<Element> {
        let scope = scope.map(Element::handle);
        let layout = &self.layout;
        let handles: Vec<String> = match (&self.view, scope) {
            (View::Login { .. }, None) if *selector == layout.username_field => one("username"),
            (View::Login { .. }, None) if *selector == layout.password_field => one("password"),
            (View::Login { .. }, None) if *selector == layout.sign_in_button => one("signin"),

            (View::Community(_), None) if *selector == layout.nav_menu_toggle => one("toggle"),
            (View::Community(_), None) if *selector == layout.nav_bar => one("navbar"),
            (View::Community(c), Some("navbar")) if *selector == layout.nav_bar_entries => {
                if self.communities[*c].has_wiki_section {
                    vec!["nav:overview".into(), "nav:wiki".into()]
                } else {
                    one("nav:overview")
                }
            }
            (View::Community(_), Some("nav:wiki")) if *selector == layout.nav_entry_anchor => {
                one("nav:wiki:a")
            }
            (View::Community(c), None) if *selector == layout.subcommunity_container => {
                match self.communities[*c].submenu {
                    MenuRec::Absent => Vec::new(),
                    MenuRec::Hidden | MenuRec::Listed(_) => one("subcontainer"),
                }
            }
            (View::Community(c), Some("subcontainer"))
                if *selector == layout.subcommunity_entries =>
            {
                match &self.communities[*c].submenu {
                    MenuRec::Listed(subs) => subs.iter().map(|s| format!("subentry:{s}")).collect(),
                    _ => Vec::new(),
                }
            }
            (View::Community(_), Some(entry)) if *selector == layout.subcommunity_anchor => {
                entry
                    .strip_prefix("subentry:")
                    .map(|id| vec![format!("subanchor:{id}")])
                    .unwrap_or_default()
            }

            (View::WikiHome(_), None) if *selector == layout.wiki_menu_root => one("menu"),
            (View::WikiHome(c), Some("menu")) if *selector == layout.wiki_menu_entries => self
                .communities[*c]
                .top_wikis
                .iter()
                .map(|w| format!("entry:{w}"))
                .collect(),
            (View::WikiHome(_), Some(scope)) if scope.starts_with("subtree:") => {
                let id = parse_id(scope);
                if *selector == layout.wiki_menu_entries && self.expanded.contains(&id) {
                    self.wikis[id]
                        .children
                        .iter()
                        .map(|w| format!("entry:{w}"))
                        .collect()
                } else {
                    Vec::new()
                }
            }
            (View::WikiHome(_), Some(scope)) if scope.starts_with("entry:") => {
                let id = parse_id(scope);
                if *selector == layout.wiki_entry_anchor {
                    vec![format!("anchor:{id}")]
                } else if *selector == layout.wiki_entry_expander {
                    vec![format!("expander:{id}")]
                } else if *selector == layout.wiki_entry_subtree {
                    vec![format!("subtree:{id}")]
                } else {
                    Vec::new()
                }
            }

            (View::Wiki(_), None) if *selector == layout.page_actions_menu => one("actions"),
            (View::Wiki(_), None) if *selector == layout.download_page_action => one("download"),
            (View::Wiki(_), None) if *selector == layout.wiki_content => one("content"),
            (View::Wiki(w), Some("content")) if *selector == layout.internal_links => {
                (0..self.wikis[*w].links.len())
                    .map(|i| format!("link:{i}"))
                    .collect()
            }
            (View::Wiki(_), None) if *selector == layout.attachments_tab => one("tab"),
            (View::Wiki(_), None) if *selector == layout.attachments_listing => one("listing"),
            (View::Wiki(w), Some("listing")) if *selector == layout.attachment_rows => {
                self.row_scans += 1;
                let page = self.attachment_page;
                let count = self.wikis[*w]
                    .attachment_pages
                    .get(page)
                    .map_or(0, Vec::len);
                (0..count).map(|i| format!("row:{page}:{i}")).collect()
            }
            (View::Wiki(_), Some(row)) if *selector == layout.attachment_anchor => row
                .strip_prefix("row:")
                .map(|rest| vec![format!("rowanchor:{rest}")])
                .unwrap_or_default(),
            (View::Wiki(w), None) if *selector == layout.next_page_control => {
                if self.wikis[*w].attachment_pages.is_empty() {
                    Vec::new()
                } else {
                    one("pager")
                }
            }
            (View::Wiki(w), Some("pager")) if *selector == layout.next_page_anchor => {
                if self.attachment_page + 1 < self.wikis[*w].attachment_pages.len() {
                    one("next")
                } else {
                    Vec::new()
                }
            }
            _ => Vec::new(),
        };
        handles.into_iter().map(Element::new).collect()
    }

    fn read_attribute(&self, element: &str, name: &str) -> Option<String> {
        let layout = &self.layout;
        match (&self.view, element) {
            (View::Community(_), "nav:wiki") if name == layout.widget_attribute => {
                Some(layout.wiki_widget.clone())
            }
            (View::Community(_), "nav:overview") if name == layout.widget_attribute => {
                Some("Overview".to_string())
            }
            (View::Community(c), "nav:wiki:a") if name == "href" => {
                Some(self.communities[*c].wiki_home.clone())
            }
            (View::Community(c), "subcontainer") if name == "class" => {
                match self.communities[*c].submenu {
                    MenuRec::Hidden => Some(format!("lotusMenu {}", layout.hidden_class)),
                    _ => Some("lotusMenu".to_string()),
                }
            }
            (View::Community(_), anchor) if anchor.starts_with("subanchor:") && name == "href" => {
                Some(self.communities[parse_id(anchor)].url.clone())
            }
            (View::WikiHome(_), anchor) if anchor.starts_with("anchor:") => {
                let wiki = &self.wikis[parse_id(anchor)];
                match name {
                    "href" => Some(wiki.url.clone()),
                    "title" => Some(wiki.name.clone()),
                    _ => None,
                }
            }
            (View::WikiHome(_), subtree)
                if subtree.starts_with("subtree:") && name == "childElementCount" =>
            {
                let id = parse_id(subtree);
                let count = if self.expanded.contains(&id) {
                    self.wikis[id].children.len()
                } else {
                    0
                };
                Some(count.to_string())
            }
            (View::Wiki(w), link) if link.starts_with("link:") && name == "href" => {
                self.wikis[*w].links.get(parse_id(link)).cloned()
            }
            (View::Wiki(w), anchor) if anchor.starts_with("rowanchor:") && name == "href" => {
                let mut parts = anchor["rowanchor:".len()..].split(':');
                let page: usize = parts.next()?.parse().ok()?;
                let index: usize = parts.next()?.parse().ok()?;
                self.wikis[*w].attachment_pages.get(page)?.get(index).cloned()
            }
            (View::Wiki(w), "pager") if name == "childElementCount" => {
                let more = self.attachment_page + 1 < self.wikis[*w].attachment_pages.len();
                Some(if more { "1" } else { "0" }.to_string())
            }
            _ => None,
        }
    }

    fn activate(&mut self, element: &str) -> Result<(), SessionError> {
        match (&self.view, element) {
            (View::Login { pending }, "signin") => {
                let accepted = self.credentials.as_ref().is_some_and(|c| {
                    c.login == self.typed_login && c.password() == self.typed_password
                });
                if accepted {
                    self.logged_in = true;
                    self.view = self.view_for(&pending.clone());
                }
            }
            (View::WikiHome(_), expander) if expander.starts_with("expander:") => {
                self.expanded.insert(parse_id(expander));
            }
            (View::Wiki(w), "download") => {
                let wiki = &self.wikis[*w];
                if wiki.saves_page {
                    if let Some(dir) = &self.download_dir {
                        let file = dir.join(format!("{}.html", wiki.name));
                        std::fs::write(&file, page_html(wiki)).map_err(|e| {
                            SessionError::protocol("unknown error", e.to_string())
                        })?;
                    }
                }
            }
            (View::Wiki(_), "next") => self.attachment_page += 1,
            _ => {}
        }
        Ok(())
    }
}

fn one(handle: &str) -> Vec<String> {
    vec![handle.to_string()]
}

fn parse_id(handle: &str) -> usize {
    handle
        .rsplit(':')
        .next()
        .and_then(|id| id.parse().ok())
        .unwrap_or(usize::MAX)
}

fn page_html(wiki: &WikiRec) -> String {
    let mut html = format!("<html><head><title>{}</title></head><body>\n", wiki.name);
    for (i, link) in wiki.links.iter().enumerate() {
        html.push_str(&format!("<p><a class=\"file\" href=\"{link}\">file {i}</a></p>\n"));
    }
    html.push_str("<p><a href=\"https://example.com/elsewhere\">outside</a></p>\n</body></html>\n");
    html
}

#[async_trait]
impl Session for ScriptedSession {
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.navigations.push(url.to_string());
        self.attachment_page = 0;
        self.view = if self.logged_in {
            self.view_for(url)
        } else {
            View::Login {
                pending: url.to_string(),
            }
        };
        Ok(())
    }

    async fn title(&mut self) -> Result<String, SessionError> {
        self.ensure_open()?;
        Ok(match &self.view {
            View::Blank => String::new(),
            View::Login { .. } => self.layout.login_title.clone(),
            View::Community(c) => format!("Overview - {}", self.communities[*c].name),
            View::WikiHome(c) => format!("Home - Wiki - {}", self.communities[*c].name),
            View::Wiki(w) => format!("{} - Wiki", self.wikis[*w].name),
        })
    }

    async fn find_element(
        &mut self,
        scope: Option<&Element>,
        selector: &Selector,
    ) -> Result<Element, SessionError> {
        self.ensure_open()?;
        self.resolve(scope, selector)
            .into_iter()
            .next()
            .ok_or_else(|| SessionError::element_not_found(selector))
    }

    async fn find_elements(
        &mut self,
        scope: Option<&Element>,
        selector: &Selector,
    ) -> Result<Vec<Element>, SessionError> {
        self.ensure_open()?;
        Ok(self.resolve(scope, selector))
    }

    async fn attribute(
        &mut self,
        element: &Element,
        name: &str,
    ) -> Result<Option<String>, SessionError> {
        self.ensure_open()?;
        Ok(self.read_attribute(element.handle(), name))
    }

    async fn native_click(&mut self, element: &Element) -> Result<(), SessionError> {
        self.ensure_open()?;
        // The download action sits in a menu that is never "visible" to
        // native clicks, so the forced fallback is always exercised.
        if element.handle() == "download" {
            return Err(SessionError::not_interactable(element));
        }
        self.activate(element.handle())
    }

    async fn force_click(&mut self, element: &Element) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.activate(element.handle())
    }

    async fn clear(&mut self, element: &Element) -> Result<(), SessionError> {
        self.ensure_open()?;
        match element.handle() {
            "username" => self.typed_login.clear(),
            "password" => self.typed_password.clear(),
            _ => {}
        }
        Ok(())
    }

    async fn send_keys(&mut self, element: &Element, text: &str) -> Result<(), SessionError> {
        self.ensure_open()?;
        match element.handle() {
            "username" => self.typed_login.push_str(text),
            "password" => self.typed_password.push_str(text),
            _ => {}
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.close_calls += 1;
        self.closed = true;
        Ok(())
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(2)
    }
}

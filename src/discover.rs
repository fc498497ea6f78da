//! Structure discovery.
//!
//! Drives a [`Session`] through the portal's community overview, its wiki
//! navigation tree and (when recursive) its subcommunity menu, and records
//! what it finds in a structural [`MirrorTree`]. Nothing here touches the
//! filesystem.
//!
//! Both the wiki menu and the community hierarchy are walked with explicit
//! stacks. Children are pushed in reverse so that popping yields them in UI
//! order, and a node's subtree is finished before its next sibling starts.

use tracing::{debug, info, instrument, warn};

use crate::config::WalkSettings;
use crate::session::{
    Element, PortalLayout, Session, SessionError, authenticate, child_element_count, optional,
    required_attribute,
};
use crate::tree::{MirrorTree, NodeId};

/// Discovers the community at `root_url` and, when `recursive`, every
/// subcommunity below it at any depth.
///
/// # Errors
///
/// Fails when a page does not become ready within the configured timeout,
/// when a required element is missing, or when the session itself fails.
#[instrument(skip(session, settings), fields(url = %root_url))]
pub async fn discover(
    session: &mut dyn Session,
    settings: &WalkSettings,
    root_url: &str,
    recursive: bool,
) -> Result<MirrorTree, SessionError> {
    let name = open_community(session, settings, root_url).await?;
    let mut tree = MirrorTree::new(name, root_url);
    let root = tree.root();

    // (parent community, subcommunity url), popped depth first.
    let mut pending: Vec<(NodeId, String)> = Vec::new();
    let links = populate(session, settings, &mut tree, root, recursive).await?;
    pending.extend(links.into_iter().rev().map(|href| (root, href)));

    while let Some((parent, url)) = pending.pop() {
        let name = open_community(session, settings, &url).await?;
        let id = tree.add_community(parent, name, url);
        let links = populate(session, settings, &mut tree, id, recursive).await?;
        pending.extend(links.into_iter().rev().map(|href| (id, href)));
    }

    info!(
        communities = tree.node_count() - tree.wiki_count(),
        wikis = tree.wiki_count(),
        "discovery finished"
    );
    Ok(tree)
}

/// Fills in the wikis of the community the session is showing, then
/// returns its subcommunity links when `recursive`.
async fn populate(
    session: &mut dyn Session,
    settings: &WalkSettings,
    tree: &mut MirrorTree,
    community: NodeId,
    recursive: bool,
) -> Result<Vec<String>, SessionError> {
    let url = tree.node(community).source_url().to_owned();
    let name = tree.node(community).name().to_owned();

    if open_wiki_section(session, settings).await? {
        let menu = session
            .find_element(None, &settings.layout.wiki_menu_root)
            .await?;
        let added = enumerate_wikis(session, &settings.layout, tree, community, &menu).await?;
        info!(community = %name, wikis = added, "wiki menu enumerated");
    } else {
        warn!(community = %name, "community has no wiki section");
    }

    if !recursive {
        return Ok(Vec::new());
    }

    open_community(session, settings, &url).await?;
    let links = subcommunity_links(session, &settings.layout).await?;
    debug!(community = %name, count = links.len(), "collected subcommunity links");
    Ok(links)
}

/// Navigates to a community overview, signing in if the portal asks for it.
///
/// Returns the community name taken from the page title.
#[instrument(level = "debug", skip(session, settings))]
async fn open_community(
    session: &mut dyn Session,
    settings: &WalkSettings,
    url: &str,
) -> Result<String, SessionError> {
    let layout = &settings.layout;
    session.navigate(url).await?;

    let title = session.title().await?;
    if layout.is_login_page(&title) {
        authenticate(session, layout, settings.credentials.as_ref()).await?;
    }

    let ready = |title: &str| layout.is_community_page(title);
    let title = session
        .wait_for_title(&ready, settings.page_timeout, "community page")
        .await?;
    Ok(layout.community_name(&title).to_owned())
}

/// Follows the navigation bar's wiki widget. Returns false when the
/// community has none.
async fn open_wiki_section(
    session: &mut dyn Session,
    settings: &WalkSettings,
) -> Result<bool, SessionError> {
    let layout = &settings.layout;
    let toggle = session.find_element(None, &layout.nav_menu_toggle).await?;
    session.click(&toggle).await?;

    let nav_bar = session.find_element(None, &layout.nav_bar).await?;
    let entries = session
        .find_elements(Some(&nav_bar), &layout.nav_bar_entries)
        .await?;

    for entry in entries {
        let widget = session.attribute(&entry, &layout.widget_attribute).await?;
        if widget.as_deref() != Some(layout.wiki_widget.as_str()) {
            continue;
        }
        let anchor = session
            .find_element(Some(&entry), &layout.nav_entry_anchor)
            .await?;
        let href = required_attribute(session, &anchor, "href").await?;
        session.navigate(&href).await?;

        let ready = |title: &str| layout.is_wiki_page(title);
        session
            .wait_for_title(&ready, settings.page_timeout, "wiki page")
            .await?;
        return Ok(true);
    }
    Ok(false)
}

/// Walks the wiki navigation tree below `menu`, expanding every entry,
/// and appends the wikis under `community`. Returns how many were added.
async fn enumerate_wikis(
    session: &mut dyn Session,
    layout: &PortalLayout,
    tree: &mut MirrorTree,
    community: NodeId,
    menu: &Element,
) -> Result<usize, SessionError> {
    let mut added = 0;
    let mut stack: Vec<(Element, NodeId)> = Vec::new();
    let top = session
        .find_elements(Some(menu), &layout.wiki_menu_entries)
        .await?;
    stack.extend(top.into_iter().rev().map(|entry| (entry, community)));

    while let Some((entry, parent)) = stack.pop() {
        let anchor = session
            .find_element(Some(&entry), &layout.wiki_entry_anchor)
            .await?;
        let url = required_attribute(session, &anchor, "href").await?;
        let name = session
            .attribute(&anchor, "title")
            .await?
            .unwrap_or_default();
        let wiki = tree.add_wiki(parent, name, url);
        added += 1;

        // Subwikis are rendered only after the expander has been activated.
        let expander = optional(
            session
                .find_element(Some(&entry), &layout.wiki_entry_expander)
                .await,
        )?;
        let Some(expander) = expander else {
            continue;
        };
        session.force_click(&expander).await?;

        let subtree = optional(
            session
                .find_element(Some(&entry), &layout.wiki_entry_subtree)
                .await,
        )?;
        let Some(subtree) = subtree else {
            continue;
        };
        if child_element_count(session, &subtree).await? == 0 {
            continue;
        }
        let children = session
            .find_elements(Some(&subtree), &layout.wiki_menu_entries)
            .await?;
        stack.extend(children.into_iter().rev().map(|child| (child, wiki)));
    }
    Ok(added)
}

/// Reads every subcommunity href of the current overview page.
///
/// All links are collected before any of them is visited, since visiting
/// one navigates away and invalidates the menu's elements.
async fn subcommunity_links(
    session: &mut dyn Session,
    layout: &PortalLayout,
) -> Result<Vec<String>, SessionError> {
    let container = optional(
        session
            .find_element(None, &layout.subcommunity_container)
            .await,
    )?;
    let Some(container) = container else {
        return Ok(Vec::new());
    };
    let class = session
        .attribute(&container, "class")
        .await?
        .unwrap_or_default();
    if is_hidden(&class, &layout.hidden_class) {
        return Ok(Vec::new());
    }

    let mut links = Vec::new();
    let entries = session
        .find_elements(Some(&container), &layout.subcommunity_entries)
        .await?;
    for entry in entries {
        let anchor = optional(
            session
                .find_element(Some(&entry), &layout.subcommunity_anchor)
                .await,
        )?;
        let Some(anchor) = anchor else {
            continue;
        };
        match session.attribute(&anchor, "href").await? {
            Some(href) if !href.is_empty() => links.push(href),
            _ => debug!(entry = %entry, "subcommunity entry without href"),
        }
    }
    Ok(links)
}

fn is_hidden(class: &str, hidden_class: &str) -> bool {
    class.split_whitespace().any(|token| token == hidden_class)
}

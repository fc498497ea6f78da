//! Locators and title markers of the community portal.

use super::Selector;

/// Everything the walk needs to know about the portal's markup.
///
/// The defaults match the Connections community/wiki UI. Scoped selectors
/// (those starting with `./`) are evaluated relative to the element noted on
/// each field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalLayout {
    /// Exact page title of the sign-in page.
    pub login_title: String,
    /// Title substring of a loaded community overview page.
    pub community_title_marker: String,
    /// Prefix stripped from the overview title to get the community name.
    pub community_title_prefix: String,
    /// Title substring of a loaded wiki page.
    pub wiki_title_marker: String,

    pub username_field: Selector,
    pub password_field: Selector,
    pub sign_in_button: Selector,

    /// Toggle that reveals the community navigation bar.
    pub nav_menu_toggle: Selector,
    pub nav_bar: Selector,
    /// Entries of the navigation bar (scoped to `nav_bar`).
    pub nav_bar_entries: Selector,
    /// Attribute identifying a navigation widget.
    pub widget_attribute: String,
    /// `widget_attribute` value of the wiki section.
    pub wiki_widget: String,
    /// Anchor of a navigation entry (scoped to the entry).
    pub nav_entry_anchor: Selector,

    /// Container of the top-level wiki menu.
    pub wiki_menu_root: Selector,
    /// Menu entries (scoped to a menu container).
    pub wiki_menu_entries: Selector,
    /// Anchor carrying `href` and `title` (scoped to an entry).
    pub wiki_entry_anchor: Selector,
    /// Expander icon revealing subwikis (scoped to an entry).
    pub wiki_entry_expander: Selector,
    /// Container of the entry's subwikis (scoped to an entry).
    pub wiki_entry_subtree: Selector,

    pub subcommunity_container: Selector,
    /// Class marking the subcommunity container as hidden.
    pub hidden_class: String,
    /// Subcommunity entries (scoped to the container).
    pub subcommunity_entries: Selector,
    /// Anchor of a subcommunity entry (scoped to the entry).
    pub subcommunity_anchor: Selector,

    pub page_actions_menu: Selector,
    pub download_page_action: Selector,
    pub wiki_content: Selector,
    /// Internal links inside the page body (scoped to `wiki_content`).
    pub internal_links: Selector,

    pub attachments_tab: Selector,
    pub attachments_listing: Selector,
    /// Listing rows (scoped to `attachments_listing`).
    pub attachment_rows: Selector,
    /// Download anchor of a row (scoped to the row).
    pub attachment_anchor: Selector,
    /// Pager entry that holds a link while more pages exist.
    pub next_page_control: Selector,
    /// Link inside the pager entry (scoped to `next_page_control`).
    pub next_page_anchor: Selector,

    /// Substring identifying internal API hrefs.
    pub api_marker: String,
    /// Extension of saved page files, without the dot.
    pub page_extension: String,
}

impl Default for PortalLayout {
    fn default() -> Self {
        Self {
            login_title: "IBM w3id".to_string(),
            community_title_marker: "Overview".to_string(),
            community_title_prefix: "Overview - ".to_string(),
            wiki_title_marker: "Wiki".to_string(),

            username_field: Selector::id("desktop"),
            password_field: Selector::name("password"),
            sign_in_button: Selector::id("btn_signin"),

            nav_menu_toggle: Selector::id("dropdownNavMenuTitleLink"),
            nav_bar: Selector::id("lotusNavBar"),
            nav_bar_entries: Selector::xpath(".//*"),
            widget_attribute: "widgetdefid".to_string(),
            wiki_widget: "Wiki".to_string(),
            nav_entry_anchor: Selector::xpath("./a"),

            wiki_menu_root: Selector::xpath(r#"//div[@id="lconnWikisNavTree"]/div[2]/div[2]"#),
            wiki_menu_entries: Selector::xpath("./div"),
            wiki_entry_anchor: Selector::xpath("./div[1]/span[2]/a"),
            wiki_entry_expander: Selector::xpath("./div[1]/img[2]"),
            wiki_entry_subtree: Selector::xpath("./div[2]"),

            subcommunity_container: Selector::xpath(r#"//*[@id="dropdownSubMenuContainer"]"#),
            hidden_class: "lotusHidden".to_string(),
            subcommunity_entries: Selector::xpath(
                r#"./div[@id="dropdownSubMenu"]//div/div/div/ul/li"#,
            ),
            subcommunity_anchor: Selector::xpath("./a"),

            page_actions_menu: Selector::xpath(r#"//a[contains(text(), "Page Actions")]"#),
            download_page_action: Selector::xpath(r#"//td[contains(text(), "Download Page")]"#),
            wiki_content: Selector::xpath(r#"//div[@id="wikiContentDiv"]"#),
            internal_links: Selector::xpath(r#".//a[contains(@href, "/api/")]"#),

            attachments_tab: Selector::xpath(r#"//*[@id="attachments_link"]"#),
            attachments_listing: Selector::xpath(r#"//div[@id="attachments"]"#),
            attachment_rows: Selector::xpath(".//tbody/tr"),
            attachment_anchor: Selector::xpath(".//a"),
            next_page_control: Selector::xpath(
                r#"//*[@id="wikiPageAttachments"]/div[1]/ul[1]/li[4]"#,
            ),
            next_page_anchor: Selector::xpath("./a"),

            api_marker: "/api/".to_string(),
            page_extension: "html".to_string(),
        }
    }
}

impl PortalLayout {
    /// Community name shown in an overview page title.
    #[must_use]
    pub fn community_name<'a>(&self, title: &'a str) -> &'a str {
        title
            .strip_prefix(self.community_title_prefix.as_str())
            .unwrap_or(title)
            .trim()
    }

    #[must_use]
    pub fn is_login_page(&self, title: &str) -> bool {
        title == self.login_title
    }

    #[must_use]
    pub fn is_community_page(&self, title: &str) -> bool {
        title.contains(self.community_title_marker.as_str())
    }

    #[must_use]
    pub fn is_wiki_page(&self, title: &str) -> bool {
        title.contains(self.wiki_title_marker.as_str())
    }

    /// True for hrefs that point at the portal's internal file API.
    #[must_use]
    pub fn is_internal_link(&self, href: &str) -> bool {
        href.contains(self.api_marker.as_str())
    }
}

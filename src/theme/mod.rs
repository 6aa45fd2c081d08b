use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::{keys, load, save, KeyValueStore, StoreError, StoreResult};

/// Name of the theme whose selection does not by itself imply a solid color.
pub const DEFAULT_THEME_NAME: &str = "default";

pub type ThemeResult<T> = std::result::Result<T, ThemeError>;

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("unknown theme: {0}")]
    UnknownTheme(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A solid-color theme. Identity is the name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThemeRecord {
    pub name: &'static str,
    pub background_color: &'static str,
    pub text_color: &'static str,
}

impl ThemeRecord {
    pub const fn new(
        name: &'static str,
        background_color: &'static str,
        text_color: &'static str,
    ) -> Self {
        Self {
            name,
            background_color,
            text_color,
        }
    }

    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_THEME_NAME
    }

    /// Stylesheet file name, with spaces turned into dashes.
    pub fn stylesheet_name(&self) -> String {
        format!("{}.css", self.name.replace(' ', "-"))
    }

    pub fn style(&self, default_href: &str) -> ThemeStyle {
        ThemeStyle {
            name: self.name,
            stylesheet_href: stylesheet_href(default_href, self),
            background_color: self.background_color,
            text_color: self.text_color,
        }
    }
}

/// What the active theme contributes to the page besides its background.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeStyle {
    pub name: &'static str,
    pub stylesheet_href: String,
    pub background_color: &'static str,
    pub text_color: &'static str,
}

const THEMES: &[ThemeRecord] = &[
    ThemeRecord::new("default", "#f5f5f5", "#333333"),
    ThemeRecord::new("dark", "#1e1e1e", "#d4d4d4"),
    ThemeRecord::new("serika", "#e1e1e3", "#323437"),
    ThemeRecord::new("serika dark", "#323437", "#d1d0c5"),
    ThemeRecord::new("nord", "#242933", "#d8dee9"),
    ThemeRecord::new("dracula", "#282a36", "#f8f8f2"),
    ThemeRecord::new("olivia", "#1c1b1d", "#f2efed"),
    ThemeRecord::new("botanical", "#7b9c98", "#eaf1f3"),
    ThemeRecord::new("carbon", "#313131", "#f5e6c8"),
    ThemeRecord::new("laser", "#221b44", "#dbe7e8"),
    ThemeRecord::new("milkshake", "#ffffff", "#212b43"),
    ThemeRecord::new("miami nights", "#18181a", "#ffffff"),
    ThemeRecord::new("mizu", "#afcbdd", "#1a2633"),
    ThemeRecord::new("paper", "#eeeeee", "#444444"),
    ThemeRecord::new("sweden", "#0058a3", "#ffffff"),
];

/// Every theme, in display order.
pub fn all() -> &'static [ThemeRecord] {
    THEMES
}

pub fn find(name: &str) -> Option<&'static ThemeRecord> {
    THEMES.iter().find(|theme| theme.name == name)
}

pub fn default_theme() -> &'static ThemeRecord {
    &THEMES[0]
}

/// Resolves a location query such as `?serika-dark` to a theme.
///
/// Only the first dash is read as a space, matching how theme links are shared.
pub fn from_query(search: &str) -> Option<&'static ThemeRecord> {
    let name = search.strip_prefix('?').unwrap_or(search);
    if name.is_empty() {
        return None;
    }
    find(&name.replacen('-', " ", 1))
}

/// Href of `theme`'s stylesheet, placed next to the default stylesheet.
pub fn stylesheet_href(default_href: &str, theme: &ThemeRecord) -> String {
    let base_dir = default_href
        .rfind('/')
        .map_or("", |index| &default_href[..=index]);
    format!("{base_dir}{}", theme.stylesheet_name())
}

/// The user's theme choice plus whether a swatch was ever clicked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeSelection {
    pub theme_name: String,
    pub ever_activated_by_user: bool,
}

impl ThemeSelection {
    pub fn new(theme_name: impl Into<String>, ever_activated_by_user: bool) -> Self {
        Self {
            theme_name: theme_name.into(),
            ever_activated_by_user,
        }
    }

    pub fn load<S: KeyValueStore + ?Sized>(store: &S) -> Self {
        Self {
            theme_name: load::<String, _>(store, keys::UI_THEME).unwrap_or_default(),
            ever_activated_by_user: load::<bool, _>(store, keys::DEFAULT_THEME_CLICKED)
                .unwrap_or(false),
        }
    }

    /// Records an explicit swatch click and persists it.
    pub fn activate<S: KeyValueStore + ?Sized>(
        &mut self,
        name: &str,
        store: &mut S,
    ) -> ThemeResult<&'static ThemeRecord> {
        let theme = find(name).ok_or_else(|| ThemeError::UnknownTheme(name.to_string()))?;
        self.theme_name = theme.name.to_string();
        self.ever_activated_by_user = true;
        save(store, keys::UI_THEME, theme.name)?;
        save(store, keys::DEFAULT_THEME_CLICKED, &true)?;
        tracing::info!(theme = theme.name, "theme activated by user");
        Ok(theme)
    }

    pub fn clear_activation<S: KeyValueStore + ?Sized>(&mut self, store: &mut S) -> StoreResult<()> {
        self.ever_activated_by_user = false;
        store.remove(keys::DEFAULT_THEME_CLICKED)
    }

    pub fn theme(&self) -> Option<&'static ThemeRecord> {
        find(&self.theme_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn registry_starts_with_default_and_names_are_unique() {
        assert!(default_theme().is_default());
        for (index, theme) in all().iter().enumerate() {
            assert!(
                all()[index + 1..].iter().all(|other| other.name != theme.name),
                "duplicate theme {}",
                theme.name
            );
        }
    }

    #[test]
    fn from_query_maps_dash_to_space() {
        assert_eq!(from_query("?serika-dark").map(|t| t.name), Some("serika dark"));
        assert_eq!(from_query("?nord").map(|t| t.name), Some("nord"));
        assert!(from_query("?").is_none());
        assert!(from_query("?no-such-theme").is_none());
    }

    #[test]
    fn stylesheet_href_reuses_default_directory() {
        let theme = find("miami nights").unwrap();
        assert_eq!(
            stylesheet_href("/assets/themes/default.css", theme),
            "/assets/themes/miami-nights.css"
        );
        assert_eq!(stylesheet_href("default.css", theme), "miami-nights.css");
    }

    #[test]
    fn theme_style_carries_stylesheet_and_text_color() {
        let style = find("serika dark").unwrap().style("/themes/default.css");
        assert_eq!(style.stylesheet_href, "/themes/serika-dark.css");
        assert_eq!(style.text_color, "#d1d0c5");
        assert_eq!(default_theme().style("/themes/default.css").stylesheet_href, "/themes/default.css");
    }

    #[test]
    fn selection_loads_empty_when_store_is_fresh() {
        let store = MemoryStore::new();
        assert_eq!(ThemeSelection::load(&store), ThemeSelection::default());
    }

    #[test]
    fn activate_persists_name_and_flag() {
        let mut store = MemoryStore::new();
        let mut selection = ThemeSelection::default();
        selection.activate("dracula", &mut store).unwrap();

        let reloaded = ThemeSelection::load(&store);
        assert_eq!(reloaded, ThemeSelection::new("dracula", true));
    }

    #[test]
    fn activate_rejects_unknown_theme_without_changes() {
        let mut store = MemoryStore::new();
        let mut selection = ThemeSelection::new("nord", false);
        let err = selection
            .activate("plaid", &mut store)
            .expect_err("unknown theme should fail");
        assert!(matches!(err, ThemeError::UnknownTheme(ref name) if name == "plaid"));
        assert_eq!(selection, ThemeSelection::new("nord", false));
        assert!(store.is_empty());
    }

    #[test]
    fn clear_activation_drops_flag_but_keeps_theme() {
        let mut store = MemoryStore::new();
        let mut selection = ThemeSelection::default();
        selection.activate("default", &mut store).unwrap();
        selection.clear_activation(&mut store).unwrap();

        assert_eq!(ThemeSelection::load(&store), ThemeSelection::new("default", false));
    }
}

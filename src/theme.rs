//! Light/dark theme preference and the palettes the UI renders with.

use ratatui::style::Color;

use crate::storage::{Store, KEY_THEME};

/// The persisted two-value theme preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeMode {
    Light,
    Dark,
}

impl ThemeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            _ => None,
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }

    /// Glyph shown on the footer toggle.
    pub fn glyph(&self) -> &'static str {
        match self {
            Self::Light => "☀",
            Self::Dark => "☾",
        }
    }

    /// Resolve the initial mode: explicit persisted choice, else the
    /// terminal's ambient signal, else light.
    pub fn initial(store: &dyn Store) -> Self {
        if let Some(saved) = store.get(KEY_THEME).as_deref().and_then(Self::from_str) {
            return saved;
        }
        ambient_mode().unwrap_or(Self::Light)
    }

    /// Persist the current value.
    pub fn persist(&self, store: &mut dyn Store) {
        store.set(KEY_THEME, self.as_str());
    }
}

/// Read the terminal's ambient light/dark signal from COLORFGBG
/// ("<fg>;<bg>", low background indices mean a dark terminal).
fn ambient_mode() -> Option<ThemeMode> {
    let var = std::env::var("COLORFGBG").ok()?;
    ambient_from_colorfgbg(&var)
}

fn ambient_from_colorfgbg(var: &str) -> Option<ThemeMode> {
    let bg: u8 = var.rsplit(';').next()?.trim().parse().ok()?;
    Some(if bg < 7 || bg == 8 {
        ThemeMode::Dark
    } else {
        ThemeMode::Light
    })
}

/// Theme colors for the UI.
#[derive(Debug, Clone)]
pub struct Theme {
    pub accent: Color,      // Active borders, highlights
    pub danger: Color,      // Errors
    pub success: Color,     // Ready / saved indicators
    pub warning: Color,     // Status messages
    pub text: Color,        // Primary text
    pub text_dim: Color,    // Dimmed text
    pub bg_selected: Color, // Selection background
    pub inactive: Color,    // Inactive borders
    pub header: Color,      // Box header text
}

impl Theme {
    pub fn for_mode(mode: ThemeMode) -> Self {
        match mode {
            ThemeMode::Dark => Self {
                accent: Color::Rgb(250, 179, 135),
                danger: Color::Rgb(243, 139, 168),
                success: Color::Rgb(166, 218, 149),
                warning: Color::Rgb(249, 226, 175),
                text: Color::Rgb(205, 214, 244),
                text_dim: Color::Rgb(147, 153, 178),
                bg_selected: Color::Rgb(69, 71, 90),
                inactive: Color::Rgb(88, 91, 112),
                header: Color::Rgb(243, 139, 168),
            },
            ThemeMode::Light => Self {
                accent: Color::Rgb(254, 100, 11),
                danger: Color::Rgb(210, 15, 57),
                success: Color::Rgb(64, 160, 43),
                warning: Color::Rgb(223, 142, 29),
                text: Color::Rgb(76, 79, 105),
                text_dim: Color::Rgb(140, 143, 161),
                bg_selected: Color::Rgb(220, 224, 232),
                inactive: Color::Rgb(172, 176, 190),
                header: Color::Rgb(210, 15, 57),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_string_roundtrip() {
        assert_eq!(ThemeMode::from_str("light"), Some(ThemeMode::Light));
        assert_eq!(ThemeMode::from_str("dark"), Some(ThemeMode::Dark));
        assert_eq!(ThemeMode::from_str("solarized"), None);
        assert_eq!(ThemeMode::Dark.as_str(), "dark");
    }

    #[test]
    fn test_toggle_is_an_involution() {
        assert_eq!(ThemeMode::Dark.toggled(), ThemeMode::Light);
        assert_eq!(ThemeMode::Dark.toggled().toggled(), ThemeMode::Dark);
        assert_eq!(ThemeMode::Light.toggled().toggled(), ThemeMode::Light);
    }

    #[test]
    fn test_ambient_from_colorfgbg() {
        assert_eq!(ambient_from_colorfgbg("15;0"), Some(ThemeMode::Dark));
        assert_eq!(ambient_from_colorfgbg("0;15"), Some(ThemeMode::Light));
        assert_eq!(ambient_from_colorfgbg("12;default;8"), Some(ThemeMode::Dark));
        assert_eq!(ambient_from_colorfgbg("garbage"), None);
        assert_eq!(ambient_from_colorfgbg(""), None);
    }

    #[test]
    fn test_initial_prefers_persisted_choice() {
        use crate::storage::MemStore;

        let mut store = MemStore::new();
        ThemeMode::Dark.persist(&mut store);
        assert_eq!(ThemeMode::initial(&store), ThemeMode::Dark);

        ThemeMode::Light.persist(&mut store);
        assert_eq!(ThemeMode::initial(&store), ThemeMode::Light);
    }
}

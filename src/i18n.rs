//! Language selection for the page around the scene.
//!
//! The scene itself has no text. The host page switches languages through
//! [`Localization`] and picks its initial language with
//! [`preferred_language`].

pub const SUPPORTED_LANGUAGES: [&str; 2] = ["en", "es"];
pub const DEFAULT_LANGUAGE: &str = "en";

/// Operations the page uses to change its language.
pub trait Localization {
    /// Set the language used when a translation is missing.
    fn set_active_language(&mut self, code: &str);

    /// Switch the displayed language.
    fn switch_language(&mut self, code: &str);
}

/// The supported language matching the browser's, or [`DEFAULT_LANGUAGE`].
///
/// Region subtags are ignored, so `es-MX` selects `es`.
pub fn preferred_language(browser_language: Option<&str>) -> &'static str {
    browser_language
        .and_then(|lang| lang.split(['-', '_']).next())
        .and_then(|primary| {
            SUPPORTED_LANGUAGES
                .iter()
                .copied()
                .find(|supported| supported.eq_ignore_ascii_case(primary))
        })
        .unwrap_or(DEFAULT_LANGUAGE)
}

/// Default/current language pair as the page tracks it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LanguageState {
    pub fallback: &'static str,
    pub current: &'static str,
}

impl LanguageState {
    pub fn new(browser_language: Option<&str>) -> Self {
        let mut state = Self {
            fallback: DEFAULT_LANGUAGE,
            current: DEFAULT_LANGUAGE,
        };
        state.set_active_language(DEFAULT_LANGUAGE);
        state.switch_language(preferred_language(browser_language));
        state
    }
}

fn supported(code: &str) -> Option<&'static str> {
    SUPPORTED_LANGUAGES.iter().copied().find(|l| *l == code)
}

impl Localization for LanguageState {
    fn set_active_language(&mut self, code: &str) {
        match supported(code) {
            Some(code) => self.fallback = code,
            None => log::warn!("unsupported language {code}, keeping {}", self.fallback),
        }
    }

    fn switch_language(&mut self, code: &str) {
        match supported(code) {
            Some(code) => self.current = code,
            None => log::warn!("unsupported language {code}, keeping {}", self.current),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browser_language_is_used_when_supported() {
        assert_eq!(preferred_language(Some("es")), "es");
        assert_eq!(preferred_language(Some("es-ES")), "es");
        assert_eq!(preferred_language(Some("EN_gb")), "en");
    }

    #[test]
    fn unsupported_or_missing_falls_back_to_english() {
        assert_eq!(preferred_language(Some("de-DE")), "en");
        assert_eq!(preferred_language(Some("")), "en");
        assert_eq!(preferred_language(None), "en");
    }

    #[test]
    fn page_starts_in_the_browser_language() {
        let state = LanguageState::new(Some("es-AR"));
        assert_eq!(state.fallback, "en");
        assert_eq!(state.current, "es");
    }

    #[test]
    fn switching_to_an_unknown_language_keeps_the_current_one() {
        let mut state = LanguageState::new(None);
        state.switch_language("es");
        state.switch_language("fr");
        assert_eq!(state.current, "es");
    }
}

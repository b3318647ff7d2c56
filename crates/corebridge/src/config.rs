use core::fmt;
use std::{ffi::c_uint, path::PathBuf};

use crate::raw;

/// Host settings handed to a core through the environment callback.
///
/// `system_dir` and `save_dir` are created when a [`Session`](crate::Session)
/// is built, so cores can rely on both existing before `retro_init` runs.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BridgeConfig {
    /// Directory cores search for BIOS and firmware images.
    pub system_dir: PathBuf,
    /// Directory cores may persist their own files into.
    pub save_dir: PathBuf,
    /// Reported for `GET_CORE_ASSETS_DIRECTORY`; falls back to `system_dir`.
    pub core_assets_dir: Option<PathBuf>,
    pub language: Language,
    pub username: String,
    /// Directories scanned for dynamic core modules, in priority order.
    pub core_search_paths: Vec<PathBuf>,
    /// Value reported for `GET_INPUT_MAX_USERS`.
    pub max_users: u32,
    /// Value reported for `GET_TARGET_REFRESH_RATE`.
    pub target_refresh_rate: f32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        let root = std::env::temp_dir().join("corebridge");
        Self {
            system_dir: root.join("system"),
            save_dir: root.join("saves"),
            core_assets_dir: None,
            language: Language::English,
            username: String::from("player"),
            core_search_paths: Vec::new(),
            max_users: crate::input::MAX_PORTS as u32,
            target_refresh_rate: 60.0,
        }
    }
}

impl BridgeConfig {
    /// Places the system and save directories under a common root.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            system_dir: root.join("system"),
            save_dir: root.join("saves"),
            ..Self::default()
        }
    }

    pub fn with_search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.core_search_paths.push(path.into());
        self
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }
}

/// Language codes understood by `GET_LANGUAGE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Language {
    #[default]
    English,
    Japanese,
    French,
    Spanish,
    German,
    Italian,
    Dutch,
    PortugueseBrazil,
    PortuguesePortugal,
    Russian,
    Korean,
    ChineseTraditional,
    ChineseSimplified,
}

impl Language {
    pub const fn to_raw(self) -> c_uint {
        match self {
            Language::English => raw::RETRO_LANGUAGE_ENGLISH,
            Language::Japanese => raw::RETRO_LANGUAGE_JAPANESE,
            Language::French => raw::RETRO_LANGUAGE_FRENCH,
            Language::Spanish => raw::RETRO_LANGUAGE_SPANISH,
            Language::German => raw::RETRO_LANGUAGE_GERMAN,
            Language::Italian => raw::RETRO_LANGUAGE_ITALIAN,
            Language::Dutch => raw::RETRO_LANGUAGE_DUTCH,
            Language::PortugueseBrazil => raw::RETRO_LANGUAGE_PORTUGUESE_BRAZIL,
            Language::PortuguesePortugal => raw::RETRO_LANGUAGE_PORTUGUESE_PORTUGAL,
            Language::Russian => raw::RETRO_LANGUAGE_RUSSIAN,
            Language::Korean => raw::RETRO_LANGUAGE_KOREAN,
            Language::ChineseTraditional => raw::RETRO_LANGUAGE_CHINESE_TRADITIONAL,
            Language::ChineseSimplified => raw::RETRO_LANGUAGE_CHINESE_SIMPLIFIED,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Language::English => "en",
            Language::Japanese => "ja",
            Language::French => "fr",
            Language::Spanish => "es",
            Language::German => "de",
            Language::Italian => "it",
            Language::Dutch => "nl",
            Language::PortugueseBrazil => "pt-BR",
            Language::PortuguesePortugal => "pt-PT",
            Language::Russian => "ru",
            Language::Korean => "ko",
            Language::ChineseTraditional => "zh-Hant",
            Language::ChineseSimplified => "zh-Hans",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lang = match s.to_ascii_lowercase().as_str() {
            "en" | "english" => Language::English,
            "ja" | "japanese" => Language::Japanese,
            "fr" | "french" => Language::French,
            "es" | "spanish" => Language::Spanish,
            "de" | "german" => Language::German,
            "it" | "italian" => Language::Italian,
            "nl" | "dutch" => Language::Dutch,
            "pt-br" => Language::PortugueseBrazil,
            "pt" | "pt-pt" => Language::PortuguesePortugal,
            "ru" | "russian" => Language::Russian,
            "ko" | "korean" => Language::Korean,
            "zh-hant" | "zh-tw" => Language::ChineseTraditional,
            "zh" | "zh-hans" | "zh-cn" => Language::ChineseSimplified,
            other => return Err(format!("unknown language `{other}`")),
        };
        Ok(lang)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_root_places_directories_under_root() {
        let config = BridgeConfig::with_root("/tmp/host");
        assert_eq!(config.system_dir, PathBuf::from("/tmp/host/system"));
        assert_eq!(config.save_dir, PathBuf::from("/tmp/host/saves"));
        assert_eq!(config.language, Language::English);
    }

    #[test]
    fn language_parses_codes_and_names() {
        assert_eq!("JA".parse::<Language>(), Ok(Language::Japanese));
        assert_eq!("german".parse::<Language>(), Ok(Language::German));
        assert!("klingon".parse::<Language>().is_err());
        assert_eq!(Language::English.to_raw(), raw::RETRO_LANGUAGE_ENGLISH);
    }
}

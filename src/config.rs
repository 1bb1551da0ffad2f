use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::error::{Error, Result};
use crate::sender::types::{CoordMode, SEND_LEVEL_MAX, SendMode};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default = "default_key_delay")]
    pub key_delay: i32,
    #[serde(default = "default_unset")]
    pub press_duration: i32,
    #[serde(default = "default_unset")]
    pub key_delay_play: i32,
    #[serde(default = "default_unset")]
    pub press_duration_play: i32,
    #[serde(default = "default_mouse_delay")]
    pub mouse_delay: i32,
    #[serde(default = "default_unset")]
    pub mouse_delay_play: i32,
    #[serde(default = "default_send_mode")]
    pub send_mode: String,
    #[serde(default)]
    pub send_level: u32,
    #[serde(default = "default_mouse_speed")]
    pub default_mouse_speed: u32,
    #[serde(default = "default_true")]
    pub store_caps_lock_mode: bool,
    #[serde(default = "default_coord_mode")]
    pub coord_mode: String,
    #[serde(default = "default_hotkey_modifier_timeout")]
    pub hotkey_modifier_timeout: i32,
    #[serde(default = "default_menu_mask_key")]
    pub menu_mask_key: String,
    #[serde(default = "default_max_threads")]
    pub max_threads: u32,
    #[serde(default = "default_max_threads_per_hotkey")]
    pub max_threads_per_hotkey: u32,
}

fn default_key_delay() -> i32 {
    10
}
fn default_mouse_delay() -> i32 {
    10
}
fn default_unset() -> i32 {
    -1
}
fn default_send_mode() -> String {
    "Event".to_string()
}
fn default_mouse_speed() -> u32 {
    2
}
fn default_true() -> bool {
    true
}
fn default_coord_mode() -> String {
    "Screen".to_string()
}
fn default_hotkey_modifier_timeout() -> i32 {
    50
}
fn default_menu_mask_key() -> String {
    "LCtrl".to_string()
}
fn default_max_threads() -> u32 {
    10
}
fn default_max_threads_per_hotkey() -> u32 {
    1
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            key_delay: default_key_delay(),
            press_duration: default_unset(),
            key_delay_play: default_unset(),
            press_duration_play: default_unset(),
            mouse_delay: default_mouse_delay(),
            mouse_delay_play: default_unset(),
            send_mode: default_send_mode(),
            send_level: 0,
            default_mouse_speed: default_mouse_speed(),
            store_caps_lock_mode: true,
            coord_mode: default_coord_mode(),
            hotkey_modifier_timeout: default_hotkey_modifier_timeout(),
            menu_mask_key: default_menu_mask_key(),
            max_threads: default_max_threads(),
            max_threads_per_hotkey: default_max_threads_per_hotkey(),
        }
    }
}

impl AppConfig {
    /// Load config from file, or create default if not exists
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if !path.as_ref().exists() {
            let default_config = Self::default();
            default_config.save_to_file(&path)?;
            return Ok(default_config);
        }
        Self::load_from_file(path)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut config: AppConfig =
            toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))?;

        // Clamp numeric settings into range
        config.send_level = config.send_level.min(SEND_LEVEL_MAX);
        config.default_mouse_speed = config.default_mouse_speed.min(100);
        config.max_threads = config.max_threads.clamp(1, 255);
        config.max_threads_per_hotkey = config.max_threads_per_hotkey.clamp(1, 255);
        for delay in [
            &mut config.key_delay,
            &mut config.press_duration,
            &mut config.key_delay_play,
            &mut config.press_duration_play,
            &mut config.mouse_delay,
            &mut config.mouse_delay_play,
        ] {
            *delay = (*delay).max(-1);
        }

        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        // Add comments to make the config file more readable
        let commented = format!(
            "key_delay = {}                # Delay after each key in Event mode (ms, -1 = none)\n\
             press_duration = {}          # Time a key is held down (ms, -1 = none)\n\
             key_delay_play = {}          # Key delay used in Play mode\n\
             press_duration_play = {}     # Press duration used in Play mode\n\
             mouse_delay = {}              # Delay after each mouse event (ms, -1 = none)\n\
             mouse_delay_play = {}        # Mouse delay used in Play mode\n\
             send_mode = \"{}\"          # Event, Input, Play or InputThenPlay\n\
             send_level = {}                # 0-100, tags sent input for hotkey input levels\n\
             default_mouse_speed = {}       # 0 (instant) to 100 (slowest)\n\
             store_caps_lock_mode = {}   # Turn CapsLock off while sending\n\
             coord_mode = \"{}\"        # Screen, Window or Client\n\n\
             # Hotkeys\n\
             hotkey_modifier_timeout = {}  # How long a hotkey's modifiers are assumed held without a hook (ms, -1 = forever)\n\
             menu_mask_key = \"{}\"      # Key tapped to keep Alt/Win releases from opening menus\n\
             max_threads = {}              # Threads that may run at once\n\
             max_threads_per_hotkey = {}    # Threads one hotkey may run at once\n",
            self.key_delay,
            self.press_duration,
            self.key_delay_play,
            self.press_duration_play,
            self.mouse_delay,
            self.mouse_delay_play,
            self.send_mode,
            self.send_level,
            self.default_mouse_speed,
            self.store_caps_lock_mode,
            self.coord_mode,
            self.hotkey_modifier_timeout,
            self.menu_mask_key,
            self.max_threads,
            self.max_threads_per_hotkey,
        );

        fs::write(path, commented)?;
        Ok(())
    }
}

/// Per-thread send settings; every send reads them and leaves them intact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadSettings {
    pub key_delay: i32,
    pub press_duration: i32,
    pub key_delay_play: i32,
    pub press_duration_play: i32,
    pub mouse_delay: i32,
    pub mouse_delay_play: i32,
    pub send_mode: SendMode,
    pub send_level: u32,
    pub default_mouse_speed: u32,
    pub store_caps_lock_mode: bool,
    pub coord_mode: CoordMode,
}

impl Default for ThreadSettings {
    fn default() -> Self {
        Self {
            key_delay: default_key_delay(),
            press_duration: default_unset(),
            key_delay_play: default_unset(),
            press_duration_play: default_unset(),
            mouse_delay: default_mouse_delay(),
            mouse_delay_play: default_unset(),
            send_mode: SendMode::Event,
            send_level: 0,
            default_mouse_speed: default_mouse_speed(),
            store_caps_lock_mode: true,
            coord_mode: CoordMode::Screen,
        }
    }
}

impl TryFrom<&AppConfig> for ThreadSettings {
    type Error = Error;

    fn try_from(config: &AppConfig) -> Result<Self> {
        if config.send_level > SEND_LEVEL_MAX {
            return Err(Error::invalid_value("send_level", config.send_level));
        }
        Ok(Self {
            key_delay: config.key_delay,
            press_duration: config.press_duration,
            key_delay_play: config.key_delay_play,
            press_duration_play: config.press_duration_play,
            mouse_delay: config.mouse_delay,
            mouse_delay_play: config.mouse_delay_play,
            send_mode: config.send_mode.parse()?,
            send_level: config.send_level,
            default_mouse_speed: config.default_mouse_speed.min(100),
            store_caps_lock_mode: config.store_caps_lock_mode,
            coord_mode: config.coord_mode.parse()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_thread_settings() {
        let settings = ThreadSettings::try_from(&AppConfig::default()).unwrap();
        assert_eq!(settings, ThreadSettings::default());
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: AppConfig = toml::from_str("send_mode = \"Input\"\n").unwrap();
        assert_eq!(config.send_mode, "Input");
        assert_eq!(config.key_delay, 10);
        assert_eq!(config.press_duration, -1);
        assert!(config.store_caps_lock_mode);
        assert_eq!(config.menu_mask_key, "LCtrl");
    }

    #[test]
    fn test_bad_mode_names_are_rejected() {
        let config = AppConfig {
            send_mode: "Turbo".to_string(),
            ..AppConfig::default()
        };
        assert!(matches!(
            ThreadSettings::try_from(&config),
            Err(Error::InvalidValue { name: "send_mode", .. })
        ));

        let config = AppConfig {
            coord_mode: "Desk".to_string(),
            ..AppConfig::default()
        };
        assert!(ThreadSettings::try_from(&config).is_err());
    }

    #[test]
    fn test_saved_file_parses_back() {
        let path = std::env::temp_dir().join(format!("keysend_cfg_unit_{}.toml", std::process::id()));
        let config = AppConfig {
            send_mode: "Play".to_string(),
            key_delay_play: 5,
            ..AppConfig::default()
        };
        config.save_to_file(&path).unwrap();
        let loaded = AppConfig::load_from_file(&path).unwrap();
        let _ = fs::remove_file(&path);
        assert_eq!(loaded, config);
    }
}

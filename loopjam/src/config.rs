use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

const MIN_TEMPO: f32 = 20.0;
const MAX_TEMPO: f32 = 300.0;
const MIN_INTERVAL_MS: u64 = 50;

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    player: PlayerConfig,
    #[serde(default)]
    network: NetworkConfig,
    #[serde(default)]
    transport: TransportConfig,
}

#[derive(Deserialize, Default)]
struct PlayerConfig {
    name: Option<String>,
    color: Option<String>,
}

#[derive(Deserialize, Default)]
struct NetworkConfig {
    port: Option<u16>,
    clock_sync_interval_ms: Option<u64>,
    ping_interval_ms: Option<u64>,
}

#[derive(Deserialize, Default)]
struct TransportConfig {
    tempo: Option<f32>,
}

pub struct Config {
    player: PlayerConfig,
    network: NetworkConfig,
    transport: TransportConfig,
}

impl Config {
    /// Embedded defaults overlaid with the user's config file, if any.
    pub fn load() -> Self {
        Self::load_from(user_config_path().as_deref())
    }

    pub fn load_from(user_path: Option<&Path>) -> Self {
        let mut base: ConfigFile = toml::from_str(DEFAULT_CONFIG).unwrap_or_else(|e| {
            log::error!(target: "config", "embedded config.toml is invalid: {}", e);
            ConfigFile::default()
        });

        if let Some(path) = user_path.filter(|p| p.exists()) {
            match std::fs::read_to_string(path) {
                Ok(contents) => match toml::from_str::<ConfigFile>(&contents) {
                    Ok(user) => {
                        merge_player(&mut base.player, user.player);
                        merge_network(&mut base.network, user.network);
                        merge_transport(&mut base.transport, user.transport);
                        log::info!(target: "config", "loaded {}", path.display());
                    }
                    Err(e) => {
                        log::warn!(target: "config", "ignoring malformed config {}: {}", path.display(), e)
                    }
                },
                Err(e) => {
                    log::warn!(target: "config", "could not read config {}: {}", path.display(), e)
                }
            }
        }

        Config {
            player: base.player,
            network: base.network,
            transport: base.transport,
        }
    }

    pub fn player_name(&self) -> String {
        self.player
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or("player")
            .to_string()
    }

    pub fn player_color(&self) -> String {
        self.player.color.clone().unwrap_or_else(|| "#4fc3f7".to_string())
    }

    pub fn port(&self) -> u16 {
        self.network.port.unwrap_or(7777)
    }

    /// How often the leader broadcasts `clock_sync` (at least 50 ms).
    pub fn clock_sync_interval(&self) -> Duration {
        interval(self.network.clock_sync_interval_ms, 1000)
    }

    pub fn ping_interval(&self) -> Duration {
        interval(self.network.ping_interval_ms, 5000)
    }

    /// Starting tempo for hosted rooms, clamped to 20..=300 BPM.
    pub fn tempo(&self) -> f32 {
        let tempo = self.transport.tempo.unwrap_or(120.0);
        if tempo.is_finite() {
            tempo.clamp(MIN_TEMPO, MAX_TEMPO)
        } else {
            120.0
        }
    }
}

pub fn clamp_tempo(tempo: f32) -> f32 {
    tempo.clamp(MIN_TEMPO, MAX_TEMPO)
}

fn interval(ms: Option<u64>, fallback: u64) -> Duration {
    Duration::from_millis(ms.unwrap_or(fallback).max(MIN_INTERVAL_MS))
}

pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("loopjam"))
}

fn user_config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

fn merge_player(base: &mut PlayerConfig, user: PlayerConfig) {
    if user.name.is_some() {
        base.name = user.name;
    }
    if user.color.is_some() {
        base.color = user.color;
    }
}

fn merge_network(base: &mut NetworkConfig, user: NetworkConfig) {
    if user.port.is_some() {
        base.port = user.port;
    }
    if user.clock_sync_interval_ms.is_some() {
        base.clock_sync_interval_ms = user.clock_sync_interval_ms;
    }
    if user.ping_interval_ms.is_some() {
        base.ping_interval_ms = user.ping_interval_ms;
    }
}

fn merge_transport(base: &mut TransportConfig, user: TransportConfig) {
    if user.tempo.is_some() {
        base.tempo = user.tempo;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn user_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_embedded_config() {
        let config = Config::load_from(None);
        assert_eq!(config.player_name(), "player");
        assert_eq!(config.player_color(), "#4fc3f7");
        assert_eq!(config.port(), 7777);
        assert_eq!(config.clock_sync_interval(), Duration::from_millis(1000));
        assert_eq!(config.ping_interval(), Duration::from_millis(5000));
        assert_eq!(config.tempo(), 120.0);
    }

    #[test]
    fn test_user_file_overrides_single_keys() {
        let file = user_file("[player]\nname = \"mira\"\n\n[network]\nport = 9000\n");
        let config = Config::load_from(Some(file.path()));
        assert_eq!(config.player_name(), "mira");
        assert_eq!(config.player_color(), "#4fc3f7");
        assert_eq!(config.port(), 9000);
        assert_eq!(config.ping_interval(), Duration::from_millis(5000));
    }

    #[test]
    fn test_malformed_user_file_is_ignored() {
        let file = user_file("[network\nport = \"loud\"");
        let config = Config::load_from(Some(file.path()));
        assert_eq!(config.port(), 7777);
    }

    #[test]
    fn test_missing_user_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(Some(&dir.path().join("nope.toml")));
        assert_eq!(config.player_name(), "player");
    }

    #[test]
    fn test_values_are_clamped() {
        let file = user_file(
            "[network]\nclock_sync_interval_ms = 1\nping_interval_ms = 0\n\n[transport]\ntempo = 900.0\n",
        );
        let config = Config::load_from(Some(file.path()));
        assert_eq!(config.clock_sync_interval(), Duration::from_millis(50));
        assert_eq!(config.ping_interval(), Duration::from_millis(50));
        assert_eq!(config.tempo(), 300.0);
        assert_eq!(clamp_tempo(3.0), 20.0);
    }

    #[test]
    fn test_blank_name_falls_back() {
        let file = user_file("[player]\nname = \"   \"\n");
        let config = Config::load_from(Some(file.path()));
        assert_eq!(config.player_name(), "player");
    }
}

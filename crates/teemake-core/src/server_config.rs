use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::models::{CoreError, CoreErrorKind, GameMode};

pub const CONFIG_FILE_NAME: &str = "basic_config.cfg";
pub const DEFAULT_PORT: u16 = 8303;
pub const MIN_PORT: u16 = 1024;
pub const MAX_CLIENTS: u16 = 256;

/// The handful of settings written to `basic_config.cfg` after a build.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ServerSettings {
    pub name: String,
    pub port: u16,
    pub max_clients: u16,
    pub game_type: String,
}

impl ServerSettings {
    pub fn defaults_for(mode: GameMode) -> Self {
        let (max_clients, game_type) = match mode {
            GameMode::Teeworlds => (16, "dm"),
            GameMode::DDNet => (64, "DDraceNetwork"),
            GameMode::ZCatch => (16, "zCatch"),
        };

        Self {
            name: format!("My {mode} Server"),
            port: DEFAULT_PORT,
            max_clients,
            game_type: game_type.to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        validate_text("sv_name", &self.name)?;
        validate_text("sv_gametype", &self.game_type)?;
        if self.port < MIN_PORT {
            return Err(invalid_input(format!(
                "port must be between {MIN_PORT} and 65535, got {}",
                self.port
            )));
        }
        if self.max_clients == 0 || self.max_clients > MAX_CLIENTS {
            return Err(invalid_input(format!(
                "max clients must be between 1 and {MAX_CLIENTS}, got {}",
                self.max_clients
            )));
        }
        Ok(())
    }

    pub fn render(&self, mode: GameMode) -> String {
        let mut rendered = String::new();
        let _ = writeln!(rendered, "// Teeworlds Server Configuration");
        let _ = writeln!(rendered, "// Generated by teemake {}", env!("CARGO_PKG_VERSION"));
        let _ = writeln!(rendered, "// Game Mode: {mode}");
        let _ = writeln!(rendered);
        let _ = writeln!(rendered, "sv_name \"{}\"", self.name);
        let _ = writeln!(rendered, "sv_port {}", self.port);
        let _ = writeln!(rendered, "sv_max_clients {}", self.max_clients);
        let _ = writeln!(rendered, "sv_gametype \"{}\"", self.game_type);
        rendered
    }

    /// Validates and writes the settings into `build_dir`, replacing any
    /// previous file.
    pub fn write_to(&self, mode: GameMode, build_dir: &Path) -> Result<PathBuf, CoreError> {
        self.validate()?;
        let path = build_dir.join(CONFIG_FILE_NAME);
        std::fs::write(&path, self.render(mode)).map_err(|error| {
            CoreError::io(&format!("failed to write '{}'", path.display()), error)
        })?;
        tracing::info!(path = %path.display(), "wrote server configuration");
        Ok(path)
    }
}

pub fn parse_port(raw: &str) -> Result<u16, CoreError> {
    let port: u32 = raw
        .trim()
        .parse()
        .map_err(|_| invalid_input(format!("port must be a number, got '{}'", raw.trim())))?;
    u16::try_from(port)
        .ok()
        .filter(|port| *port >= MIN_PORT)
        .ok_or_else(|| {
            invalid_input(format!(
                "port must be between {MIN_PORT} and {}, got {port}",
                u16::MAX
            ))
        })
}

pub fn parse_max_clients(raw: &str) -> Result<u16, CoreError> {
    let clients: u32 = raw.trim().parse().map_err(|_| {
        invalid_input(format!("max clients must be a number, got '{}'", raw.trim()))
    })?;
    u16::try_from(clients)
        .ok()
        .filter(|clients| (1..=MAX_CLIENTS).contains(clients))
        .ok_or_else(|| {
            invalid_input(format!(
                "max clients must be between 1 and {MAX_CLIENTS}, got {clients}"
            ))
        })
}

fn validate_text(key: &str, value: &str) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        return Err(invalid_input(format!("{key} must not be empty")));
    }
    if value.contains(['"', '\n', '\r']) {
        return Err(invalid_input(format!(
            "{key} must not contain quotes or line breaks"
        )));
    }
    Ok(())
}

fn invalid_input(message: String) -> CoreError {
    CoreError::new(CoreErrorKind::InvalidInput, message)
}

#[cfg(test)]
mod tests {
    use super::{CONFIG_FILE_NAME, ServerSettings, parse_max_clients, parse_port};
    use crate::models::{CoreErrorKind, GameMode};

    #[test]
    fn defaults_follow_the_mode() {
        let ddnet = ServerSettings::defaults_for(GameMode::DDNet);
        assert_eq!(ddnet.name, "My DDNet Server");
        assert_eq!(ddnet.max_clients, 64);
        assert_eq!(ddnet.game_type, "DDraceNetwork");

        let teeworlds = ServerSettings::defaults_for(GameMode::Teeworlds);
        assert_eq!(teeworlds.port, 8303);
        assert_eq!(teeworlds.game_type, "dm");
    }

    #[test]
    fn numbers_are_bounded() {
        assert_eq!(parse_port(" 8303 ").ok(), Some(8303));
        assert!(parse_port("80").is_err());
        assert!(parse_port("70000").is_err());
        assert!(parse_port("port").is_err());

        assert_eq!(parse_max_clients("256").ok(), Some(256));
        assert!(parse_max_clients("0").is_err());
        assert!(parse_max_clients("257").is_err());
    }

    #[test]
    fn out_of_range_numbers_report_the_range() {
        let error = parse_port("70000").expect_err("above the highest port");
        assert_eq!(error.kind, CoreErrorKind::InvalidInput);
        assert_eq!(error.message, "port must be between 1024 and 65535, got 70000");

        let error = parse_max_clients("70000").expect_err("far above the limit");
        assert_eq!(
            error.message,
            "max clients must be between 1 and 256, got 70000"
        );

        let error = parse_port("-1").expect_err("negative");
        assert_eq!(error.message, "port must be a number, got '-1'");
    }

    #[test]
    fn strings_are_quoted_and_numbers_are_not() {
        let rendered = ServerSettings::defaults_for(GameMode::ZCatch).render(GameMode::ZCatch);
        assert!(rendered.contains("// Game Mode: zCatch\n"));
        assert!(rendered.contains("sv_name \"My zCatch Server\"\n"));
        assert!(rendered.contains("sv_port 8303\n"));
        assert!(rendered.contains("sv_max_clients 16\n"));
        assert!(rendered.ends_with("sv_gametype \"zCatch\"\n"));
    }

    #[test]
    fn write_rejects_quotes_and_writes_into_build_dir() {
        let dir = tempfile::tempdir().expect("tempdir");

        let mut settings = ServerSettings::defaults_for(GameMode::DDNet);
        settings.name = "bad \"name\"".to_string();
        let error = settings
            .write_to(GameMode::DDNet, dir.path())
            .expect_err("quotes are refused");
        assert_eq!(error.kind, CoreErrorKind::InvalidInput);
        assert!(!dir.path().join(CONFIG_FILE_NAME).exists());

        settings.name = "Fast Race".to_string();
        let path = settings
            .write_to(GameMode::DDNet, dir.path())
            .expect("write");
        let written = std::fs::read_to_string(path).expect("read");
        assert!(written.contains("sv_name \"Fast Race\""));
    }
}

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::models::{CoreError, CoreErrorKind, GameMode, PackageManagerFamily};
use crate::tables::{
    BuildOptionKind, CONFIGURE_PROGRAM, ConfigTables, NINJA_GENERATOR, SOURCE_FROM_BUILD_DIR,
};

pub const MAX_SERVER_NAME_LEN: usize = 64;

static SERVER_NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("server name pattern is a valid regex")
});

/// Flags that must always reach the configure step so only the server is built.
const REQUIRED_FLAGS: &[(&str, &str)] = &[("-DCLIENT", "OFF"), ("-DSERVER", "ON")];

/// Letters, digits, `-` and `_`, between 1 and 64 characters. The name becomes
/// a directory, so anything else (separators, dots, spaces) is refused.
pub fn is_valid_server_name(name: &str) -> bool {
    SERVER_NAME_PATTERN.is_match(name)
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildSystem {
    Make,
    Ninja,
}

/// Operator changes to a mode's default configure flags.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BuildOverrides {
    options: Vec<(String, String)>,
}

impl BuildOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ninja(self, enabled: bool) -> Self {
        if enabled {
            self.set(NINJA_GENERATOR, "ON")
        } else {
            self
        }
    }

    pub fn set(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self
            .options
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.1 = value,
            None => self.options.push((name, value)),
        }
        self
    }

    /// Accepts `-DNAME=VALUE` or a bare flag such as `-GNinja` (meaning `ON`).
    pub fn with_option(self, raw: &str) -> Result<Self, CoreError> {
        let raw = raw.trim();
        let (name, value) = match raw.split_once('=') {
            Some((name, value)) => (name.trim(), value.trim()),
            None => (raw, "ON"),
        };

        if name.is_empty() || value.is_empty() || !name.starts_with('-') {
            return Err(invalid_input(format!(
                "build option '{raw}' must look like -DNAME=VALUE or -GNinja"
            )));
        }

        Ok(self.set(name, value))
    }

    pub fn options(&self) -> &[(String, String)] {
        &self.options
    }
}

/// Everything the pipeline needs to know about the chosen mode on this host.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Selection {
    pub mode: GameMode,
    pub package_manager: PackageManagerFamily,
    pub dependencies: Vec<String>,
    pub build_command: String,
    pub source_url: String,
    pub build_system: BuildSystem,
}

pub fn resolve(
    tables: &ConfigTables,
    mode_name: &str,
    family: PackageManagerFamily,
    overrides: &BuildOverrides,
) -> Result<Selection, CoreError> {
    let mode = GameMode::from_name(mode_name)
        .ok_or_else(|| invalid_input(format!("unknown game mode '{mode_name}'")))?;
    let profile = tables.profile(mode).ok_or_else(|| {
        CoreError::new(
            CoreErrorKind::Configuration,
            format!("no build profile configured for '{mode}'"),
        )
    })?;

    let mut flags: Vec<String> = profile
        .default_flags
        .iter()
        .map(|flag| (*flag).to_string())
        .collect();
    let mut ninja = false;

    for (name, value) in overrides.options() {
        let option = profile.option(name).ok_or_else(|| {
            invalid_input(format!("build option '{name}' is not available for {mode}"))
        })?;
        let switched_on = parse_switch(option.name, value)?;

        match option.kind {
            BuildOptionKind::Boolean => {
                let state = if switched_on { "ON" } else { "OFF" };
                let assignment = format!("{}={state}", option.name);
                set_flag(&mut flags, option.name, assignment);
            }
            BuildOptionKind::Generator => ninja = switched_on,
        }
    }

    for (name, value) in REQUIRED_FLAGS {
        if !flags.iter().any(|flag| flag_name(flag).eq_ignore_ascii_case(name)) {
            flags.push(format!("{name}={value}"));
        }
    }

    if ninja {
        flags.push(NINJA_GENERATOR.to_string());
    }

    let build_command = [CONFIGURE_PROGRAM, SOURCE_FROM_BUILD_DIR]
        .into_iter()
        .chain(flags.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ");

    let mut dependencies: Vec<String> = tables
        .base_dependencies(family)
        .iter()
        .chain(profile.dependencies.get(family).iter())
        .map(|package| (*package).to_string())
        .collect();
    if ninja {
        dependencies.push(tables.ninja_package(family).to_string());
    }

    tracing::debug!(
        mode = %mode,
        package_manager = %family,
        build_command = %build_command,
        "resolved selection"
    );

    Ok(Selection {
        mode,
        package_manager: family,
        dependencies,
        build_command,
        source_url: profile.source_url.to_string(),
        build_system: if ninja {
            BuildSystem::Ninja
        } else {
            BuildSystem::Make
        },
    })
}

fn flag_name(flag: &str) -> &str {
    flag.split_once('=').map_or(flag, |(name, _)| name)
}

fn set_flag(flags: &mut Vec<String>, name: &str, assignment: String) {
    match flags
        .iter_mut()
        .find(|flag| flag_name(flag).eq_ignore_ascii_case(name))
    {
        Some(existing) => *existing = assignment,
        None => flags.push(assignment),
    }
}

fn parse_switch(name: &str, value: &str) -> Result<bool, CoreError> {
    match value.to_ascii_uppercase().as_str() {
        "ON" => Ok(true),
        "OFF" => Ok(false),
        _ => Err(invalid_input(format!(
            "build option '{name}' expects ON or OFF, got '{value}'"
        ))),
    }
}

fn invalid_input(message: String) -> CoreError {
    CoreError::new(CoreErrorKind::InvalidInput, message)
}

use std::fmt::{Display, Formatter};

use serde::Serialize;

/// Game-server flavours that can be built. The order of `ALL` is the order
/// presented to the operator.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
pub enum GameMode {
    Teeworlds,
    DDNet,
    #[serde(rename = "zCatch")]
    ZCatch,
}

impl GameMode {
    pub const ALL: [GameMode; 3] = [GameMode::Teeworlds, GameMode::DDNet, GameMode::ZCatch];

    pub fn name(self) -> &'static str {
        match self {
            Self::Teeworlds => "Teeworlds",
            Self::DDNet => "DDNet",
            Self::ZCatch => "zCatch",
        }
    }

    pub fn summary(self) -> &'static str {
        match self {
            Self::Teeworlds => "Classic Teeworlds",
            Self::DDNet => "Advanced race mode",
            Self::ZCatch => "PvP catch mode",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|mode| mode.name().eq_ignore_ascii_case(name))
    }

    /// Resolves a 1-indexed menu choice.
    pub fn from_menu_index(index: usize) -> Option<Self> {
        index
            .checked_sub(1)
            .and_then(|position| Self::ALL.get(position).copied())
    }
}

impl Display for GameMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::GameMode;

    #[test]
    fn names_match_case_insensitively() {
        assert_eq!(GameMode::from_name("ddnet"), Some(GameMode::DDNet));
        assert_eq!(GameMode::from_name(" zCatch "), Some(GameMode::ZCatch));
        assert_eq!(GameMode::from_name("ctf"), None);
    }

    #[test]
    fn menu_index_is_one_based() {
        assert_eq!(GameMode::from_menu_index(0), None);
        assert_eq!(GameMode::from_menu_index(1), Some(GameMode::Teeworlds));
        assert_eq!(GameMode::from_menu_index(3), Some(GameMode::ZCatch));
        assert_eq!(GameMode::from_menu_index(4), None);
    }
}

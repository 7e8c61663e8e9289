use std::fmt::{Display, Formatter};

use serde::Serialize;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageManagerFamily {
    Apt,
    Dnf,
    Yum,
    Pacman,
    Zypper,
}

impl PackageManagerFamily {
    /// Detection order: the first family whose binary is found wins.
    pub const ALL: [PackageManagerFamily; 5] = [
        PackageManagerFamily::Apt,
        PackageManagerFamily::Dnf,
        PackageManagerFamily::Yum,
        PackageManagerFamily::Pacman,
        PackageManagerFamily::Zypper,
    ];

    pub fn binary(self) -> &'static str {
        match self {
            Self::Apt => "apt-get",
            Self::Dnf => "dnf",
            Self::Yum => "yum",
            Self::Pacman => "pacman",
            Self::Zypper => "zypper",
        }
    }

    pub fn install_args(self) -> &'static [&'static str] {
        match self {
            Self::Apt | Self::Dnf | Self::Yum | Self::Zypper => &["install", "-y"],
            Self::Pacman => &["-S", "--noconfirm"],
        }
    }

    /// Builds the install command line, prefixed with `sudo` unless the
    /// process already runs as root.
    pub fn install_command(self, packages: &[String], elevate: bool) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(packages.len() + 4);
        if elevate {
            parts.push("sudo");
        }
        parts.push(self.binary());
        parts.extend(self.install_args());
        parts.extend(packages.iter().map(String::as_str));
        parts.join(" ")
    }
}

impl Display for PackageManagerFamily {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.binary())
    }
}

#[cfg(test)]
mod tests {
    use super::PackageManagerFamily;

    #[test]
    fn install_command_respects_elevation() {
        let packages = vec!["git".to_string(), "cmake".to_string()];
        assert_eq!(
            PackageManagerFamily::Apt.install_command(&packages, true),
            "sudo apt-get install -y git cmake"
        );
        assert_eq!(
            PackageManagerFamily::Pacman.install_command(&packages, false),
            "pacman -S --noconfirm git cmake"
        );
    }
}

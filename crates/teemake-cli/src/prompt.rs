use std::io::{BufRead, Write};

use anyhow::{Context, Result, bail};
use teemake_core::models::GameMode;
use teemake_core::selection::{MAX_SERVER_NAME_LEN, is_valid_server_name};
use teemake_core::server_config::{ServerSettings, parse_max_clients, parse_port};

/// Line-oriented operator questions. Invalid answers are explained and asked
/// again; only a closed input stream ends a question early.
pub struct Prompter<R, W> {
    input: R,
    out: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, out: W) -> Self {
        Self { input, out }
    }

    #[cfg(test)]
    pub fn writer(&self) -> &W {
        &self.out
    }

    pub fn server_name(&mut self) -> Result<String> {
        loop {
            let name = self.ask("Server name")?;
            if is_valid_server_name(&name) {
                return Ok(name);
            }
            self.say(&format!(
                "Use 1-{MAX_SERVER_NAME_LEN} letters, digits, '_' or '-'."
            ))?;
        }
    }

    pub fn game_mode(&mut self) -> Result<GameMode> {
        self.say("Available game modes:")?;
        for (index, mode) in GameMode::ALL.iter().enumerate() {
            self.say(&format!("  {}. {:<10} {}", index + 1, mode.name(), mode.summary()))?;
        }

        let count = GameMode::ALL.len();
        loop {
            let answer = self.ask(&format!("Select a game mode (1-{count})"))?;
            if let Some(mode) = answer.parse().ok().and_then(GameMode::from_menu_index) {
                return Ok(mode);
            }
            self.say(&format!("Please enter a number between 1 and {count}."))?;
        }
    }

    pub fn confirm(&mut self, question: &str, default: bool) -> Result<bool> {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        loop {
            let answer = self.ask(&format!("{question} {hint}"))?;
            match answer.to_ascii_lowercase().as_str() {
                "" => return Ok(default),
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => self.say("Please answer 'y' or 'n'.")?,
            }
        }
    }

    /// Collects `basic_config.cfg` values, starting from the mode defaults,
    /// until the operator accepts the summary.
    pub fn server_settings(&mut self, mode: GameMode) -> Result<ServerSettings> {
        let defaults = ServerSettings::defaults_for(mode);
        loop {
            let name = self.ask_or_default("Server display name", &defaults.name)?;
            let port = self.ask_parsed("Port", &defaults.port.to_string(), parse_port)?;
            let max_clients = self.ask_parsed(
                "Max clients",
                &defaults.max_clients.to_string(),
                parse_max_clients,
            )?;
            let game_type = self.ask_or_default("Game type", &defaults.game_type)?;

            let settings = ServerSettings {
                name,
                port,
                max_clients,
                game_type,
            };
            if let Err(error) = settings.validate() {
                self.say(&error.message)?;
                continue;
            }

            self.say("Configuration summary:")?;
            self.say(&format!("  name         {}", settings.name))?;
            self.say(&format!("  port         {}", settings.port))?;
            self.say(&format!("  max clients  {}", settings.max_clients))?;
            self.say(&format!("  game type    {}", settings.game_type))?;
            if self.confirm("Are these values correct?", true)? {
                return Ok(settings);
            }
        }
    }

    fn ask_parsed<T, E: std::fmt::Display>(
        &mut self,
        question: &str,
        default: &str,
        parse: impl Fn(&str) -> Result<T, E>,
    ) -> Result<T> {
        loop {
            let answer = self.ask_or_default(question, default)?;
            match parse(&answer) {
                Ok(value) => return Ok(value),
                Err(error) => self.say(&error.to_string())?,
            }
        }
    }

    fn ask_or_default(&mut self, question: &str, default: &str) -> Result<String> {
        let answer = self.ask(&format!("{question} [{default}]"))?;
        if answer.is_empty() {
            Ok(default.to_string())
        } else {
            Ok(answer)
        }
    }

    fn ask(&mut self, question: &str) -> Result<String> {
        write!(self.out, "{question}: ")
            .and_then(|()| self.out.flush())
            .context("failed to write prompt")?;

        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .context("failed to read answer")?;
        if read == 0 {
            bail!("input closed while waiting for an answer to '{question}'");
        }
        Ok(line.trim().to_string())
    }

    fn say(&mut self, line: &str) -> Result<()> {
        writeln!(self.out, "{line}").context("failed to write prompt")
    }
}

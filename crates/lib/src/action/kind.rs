use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Closed set of executor kinds an action `type` may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
  /// A single container driven through the `docker` CLI.
  Docker,
  /// A multi-service stack driven through `docker compose`.
  DockerCompose,
  /// Database provisioning against a PostgreSQL server.
  Postgres,
  /// Global package installs through `npm`.
  Npm,
  /// Package installs through `pip`.
  Pip,
  /// A script file invoked with option arguments appended.
  Script,
  /// A shell command string with option substitution.
  Command,
  /// Process-manager launcher fed one or more config files.
  Pm2,
}

impl ActionKind {
  pub const ALL: [ActionKind; 8] = [
    ActionKind::Docker,
    ActionKind::DockerCompose,
    ActionKind::Postgres,
    ActionKind::Npm,
    ActionKind::Pip,
    ActionKind::Script,
    ActionKind::Command,
    ActionKind::Pm2,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      ActionKind::Docker => "docker",
      ActionKind::DockerCompose => "docker-compose",
      ActionKind::Postgres => "postgres",
      ActionKind::Npm => "npm",
      ActionKind::Pip => "pip",
      ActionKind::Script => "script",
      ActionKind::Command => "command",
      ActionKind::Pm2 => "pm2",
    }
  }
}

impl fmt::Display for ActionKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown action type: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for ActionKind {
  type Err = UnknownKind;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    ActionKind::ALL
      .into_iter()
      .find(|kind| kind.as_str() == s)
      .ok_or_else(|| UnknownKind(s.to_string()))
  }
}

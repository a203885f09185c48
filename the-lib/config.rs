use serde::{
  Deserialize,
  Serialize,
};

use crate::edit::Result;

/// Settings for evaluating edits.
///
/// ```toml
/// shell = ["/bin/bash", "-c"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct EditConfig {
  /// Program and leading arguments that run the commands of `<`, `>` and
  /// `|`. The command text is passed as the last argument.
  pub shell: Vec<String>,
}

impl Default for EditConfig {
  fn default() -> Self {
    let shell = std::env::var("SHELL")
      .ok()
      .filter(|shell| !shell.is_empty())
      .unwrap_or_else(|| "/bin/sh".to_string());
    Self {
      shell: vec![shell, "-c".to_string()],
    }
  }
}

impl EditConfig {
  pub fn from_toml(text: &str) -> Result<Self> {
    Ok(toml::from_str(text)?)
  }
}

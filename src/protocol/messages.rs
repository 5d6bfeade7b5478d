use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::accessories::AccessoryError;
use crate::accessories::state::Brightness;

/// Component number of the zone level on an OUTPUT.
pub const OUTPUT_LEVEL_ACTION: u8 = 1;
pub const LINE_TERMINATOR: &str = "\r\n";

const COMMAND_PROMPTS: [&str; 2] = ["QNET>", "GNET>"];
const LOGIN_PROMPT: &str = "login:";
const PASSWORD_PROMPT: &str = "password:";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MessageError {
    #[error("Malformed message: {0}")]
    Malformed(String),
    #[error("Invalid output level in {line}: {source}")]
    InvalidLevel {
        line: String,
        source: AccessoryError,
    },
}

/// Commands sent to the processor for a single output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputCommand {
    Set {
        integration_id: String,
        level: Brightness,
        fade: Option<Duration>,
    },
    Query {
        integration_id: String,
    },
}

impl OutputCommand {
    pub fn integration_id(&self) -> &str {
        match self {
            OutputCommand::Set { integration_id, .. } => integration_id,
            OutputCommand::Query { integration_id } => integration_id,
        }
    }

    /// Encodes the command without the line terminator.
    pub fn encode(&self) -> String {
        match self {
            OutputCommand::Set {
                integration_id,
                level,
                fade,
            } => {
                let mut line = format!(
                    "#OUTPUT,{integration_id},{OUTPUT_LEVEL_ACTION},{}",
                    level.value()
                );
                if let Some(fade) = fade {
                    line.push(',');
                    line.push_str(&format_fade(*fade));
                }
                line
            }
            OutputCommand::Query { integration_id } => {
                format!("?OUTPUT,{integration_id},{OUTPUT_LEVEL_ACTION}")
            }
        }
    }
}

impl fmt::Display for OutputCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Fade times under a minute are plain seconds, longer ones `MM:SS`.
fn format_fade(fade: Duration) -> String {
    let secs = fade.as_secs();
    if secs < 60 {
        secs.to_string()
    } else {
        format!("{:02}:{:02}", secs / 60, secs % 60)
    }
}

/// Level of an output as reported by the processor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputReport {
    pub integration_id: String,
    pub level: Brightness,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProcessorMessage {
    Output(OutputReport),
    Prompt,
    LoginPrompt,
    PasswordPrompt,
    Other(String),
}

impl ProcessorMessage {
    /// True when the line starts with a command prompt, possibly followed by a report.
    pub fn is_command_prompt(line: &str) -> bool {
        Self::command_prompt_len(line).is_some()
    }

    /// Byte length of a leading command prompt, including surrounding whitespace.
    pub fn command_prompt_len(line: &str) -> Option<usize> {
        let start = line.len() - line.trim_start().len();
        let prompt = COMMAND_PROMPTS
            .iter()
            .find(|p| line[start..].starts_with(**p))?;
        let end = start + prompt.len();
        let spaces = line[end..].len() - line[end..].trim_start_matches(' ').len();
        Some(end + spaces)
    }

    pub fn parse(line: &str) -> Result<Self, MessageError> {
        let line = line.trim();
        if Self::is_command_prompt(line) {
            // reports may follow the prompt on the same line
            let rest = COMMAND_PROMPTS
                .iter()
                .find_map(|p| line.strip_prefix(*p))
                .unwrap_or_default()
                .trim();
            if rest.is_empty() {
                return Ok(ProcessorMessage::Prompt);
            }
            return Self::parse(rest);
        }
        let lower = line.to_lowercase();
        if lower.starts_with(LOGIN_PROMPT) {
            return Ok(ProcessorMessage::LoginPrompt);
        }
        if lower.starts_with(PASSWORD_PROMPT) {
            return Ok(ProcessorMessage::PasswordPrompt);
        }
        if let Some(body) = line.strip_prefix("~OUTPUT,") {
            return parse_output_report(line, body);
        }
        debug!("Unhandled processor message: {line}");
        Ok(ProcessorMessage::Other(line.to_string()))
    }
}

fn parse_output_report(line: &str, body: &str) -> Result<ProcessorMessage, MessageError> {
    let fields: Vec<&str> = body.split(',').map(str::trim).collect();
    let [integration_id, action, level, ..] = fields.as_slice() else {
        return Err(MessageError::Malformed(line.to_string()));
    };
    if integration_id.is_empty() {
        return Err(MessageError::Malformed(line.to_string()));
    }
    if action.parse::<u8>().ok() != Some(OUTPUT_LEVEL_ACTION) {
        return Ok(ProcessorMessage::Other(line.to_string()));
    }
    let raw = level
        .parse::<f64>()
        .map_err(|_| MessageError::Malformed(line.to_string()))?;
    let level = Brightness::try_from(raw).map_err(|source| MessageError::InvalidLevel {
        line: line.to_string(),
        source,
    })?;
    Ok(ProcessorMessage::Output(OutputReport {
        integration_id: integration_id.to_string(),
        level,
    }))
}

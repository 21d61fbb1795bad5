//! Native dialogs through the platform's dialog tool: zenity (Linux/BSD), osascript (macOS),
//! PowerShell (Windows).
//!
//! The tool runs as a child process with `kill_on_drop`, so a cancelled or expired delivery
//! closes the window by dropping the future.

use crate::models::{Prompt, PromptKind};
use crate::providers::surface::{DialogError, DialogOutcome, DialogSurface};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Separates the prompt from the operator's text in the multi-line editor
pub const MULTILINE_DELINEATOR: &str =
    "──────────────────────────────────────────────────";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    Zenity,
    Osascript,
    PowerShell,
}

impl Backend {
    fn for_current_platform() -> Self {
        if cfg!(target_os = "macos") {
            Backend::Osascript
        } else if cfg!(target_os = "windows") {
            Backend::PowerShell
        } else {
            Backend::Zenity
        }
    }

    fn program(&self) -> &'static str {
        match self {
            Backend::Zenity => "zenity",
            Backend::Osascript => "osascript",
            Backend::PowerShell => "powershell",
        }
    }
}

/// A fully built dialog invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogCommand {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<String>,
}

/// Dialog surface backed by the platform's dialog tool
pub struct NativeDialog {
    backend: Backend,
}

impl NativeDialog {
    pub fn new() -> Self {
        Self {
            backend: Backend::for_current_platform(),
        }
    }

    #[cfg(test)]
    fn zenity() -> Self {
        Self {
            backend: Backend::Zenity,
        }
    }

    /// Build the command line that shows `prompt`
    pub fn command_for(&self, prompt: &Prompt) -> DialogCommand {
        match self.backend {
            Backend::Zenity => zenity_command(prompt),
            Backend::Osascript => osascript_command(prompt),
            Backend::PowerShell => powershell_command(prompt),
        }
    }

    /// Map the tool's exit status and output to an outcome
    fn read_output(
        &self,
        kind: &PromptKind,
        status: Option<i32>,
        stdout: &str,
        stderr: &str,
    ) -> Result<DialogOutcome, DialogError> {
        let out = stdout.strip_suffix('\n').unwrap_or(stdout);
        let out = out.strip_suffix('\r').unwrap_or(out);
        let dismissed = match (self.backend, status) {
            (_, Some(0)) => false,
            (Backend::Zenity, Some(1)) | (Backend::Zenity, Some(5)) => true,
            (Backend::Osascript, Some(1)) if stderr.contains("-128") => true,
            (Backend::PowerShell, Some(1)) => true,
            (_, code) => {
                return Err(DialogError::Failed(format!(
                    "{} exited with {:?}: {}",
                    self.backend.program(),
                    code,
                    stderr.trim()
                )))
            }
        };

        let outcome = match kind {
            PromptKind::Info => DialogOutcome::Acknowledged,
            PromptKind::Confirmation if dismissed => DialogOutcome::Confirmed(false),
            PromptKind::Confirmation => match self.backend {
                Backend::Zenity => DialogOutcome::Confirmed(true),
                _ => DialogOutcome::Confirmed(out.trim().eq_ignore_ascii_case("yes")),
            },
            _ if dismissed => DialogOutcome::Dismissed,
            PromptKind::Choice { .. } if self.backend != Backend::PowerShell => {
                let picked: Vec<String> = out
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(String::from)
                    .collect();
                if picked.is_empty() {
                    DialogOutcome::Dismissed
                } else {
                    DialogOutcome::Selected(picked)
                }
            }
            PromptKind::Multiline { .. } => DialogOutcome::Submitted(strip_multiline_header(out)),
            _ => DialogOutcome::Submitted(out.to_string()),
        };
        Ok(outcome)
    }
}

impl Default for NativeDialog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DialogSurface for NativeDialog {
    fn name(&self) -> &str {
        self.backend.program()
    }

    fn check_available(&self) -> Result<(), DialogError> {
        if self.backend == Backend::Zenity
            && !has_graphical_session(|key| std::env::var_os(key))
        {
            return Err(DialogError::NoDisplay(
                "neither DISPLAY nor WAYLAND_DISPLAY is set".to_string(),
            ));
        }
        if find_in_path(self.backend.program()).is_none() {
            return Err(DialogError::ToolMissing(self.backend.program().to_string()));
        }
        Ok(())
    }

    async fn present(&self, prompt: &Prompt) -> Result<DialogOutcome, DialogError> {
        self.check_available()?;
        let command = self.command_for(prompt);

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(if command.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    DialogError::ToolMissing(command.program.clone())
                } else {
                    DialogError::Launch(e)
                }
            })?;

        if let (Some(input), Some(mut stdin)) = (command.stdin.as_deref(), child.stdin.take()) {
            stdin
                .write_all(input.as_bytes())
                .await
                .map_err(DialogError::Launch)?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(DialogError::Launch)?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::debug!(
            surface = self.backend.program(),
            status = ?output.status.code(),
            "Dialog closed"
        );
        self.read_output(&prompt.kind, output.status.code(), &stdout, &stderr)
    }
}

fn has_graphical_session<F>(var: F) -> bool
where
    F: Fn(&str) -> Option<OsString>,
{
    ["DISPLAY", "WAYLAND_DISPLAY"]
        .iter()
        .any(|key| var(key).map(|v| !v.is_empty()).unwrap_or(false))
}

fn find_in_path(program: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path).find_map(|dir| {
        [program.to_string(), format!("{}.exe", program)]
            .into_iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
    })
}

fn strip_multiline_header(text: &str) -> String {
    match text.find(MULTILINE_DELINEATOR) {
        Some(pos) => {
            let rest = &text[pos + MULTILINE_DELINEATOR.len()..];
            rest.strip_prefix('\n').unwrap_or(rest).to_string()
        }
        None => text.to_string(),
    }
}

/// Pango markup escaping for zenity's --text
fn escape_markup(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn zenity_command(prompt: &Prompt) -> DialogCommand {
    let text = escape_markup(&prompt.text);
    let mut stdin = None;
    let mut args: Vec<String> = Vec::new();
    match &prompt.kind {
        PromptKind::Text { default_value, .. } => {
            args.extend(["--entry".into(), "--text".into(), text]);
            if let Some(default) = default_value.as_deref().filter(|d| !d.is_empty()) {
                args.extend(["--entry-text".into(), default.to_string()]);
            }
        }
        PromptKind::Multiline { default_value } => {
            args.extend([
                "--text-info".into(),
                "--editable".into(),
                "--width".into(),
                "640".into(),
                "--height".into(),
                "480".into(),
            ]);
            stdin = Some(format!(
                "{}\n{}\n{}",
                prompt.text,
                MULTILINE_DELINEATOR,
                default_value.as_deref().unwrap_or("")
            ));
        }
        PromptKind::Choice {
            choices,
            allow_multiple,
        } => {
            args.extend([
                "--list".into(),
                if *allow_multiple {
                    "--checklist".into()
                } else {
                    "--radiolist".into()
                },
                "--text".into(),
                text,
                "--separator".into(),
                "\n".into(),
                "--column".into(),
                "".into(),
                "--column".into(),
                "Option".into(),
            ]);
            for choice in choices {
                args.extend(["FALSE".into(), choice.clone()]);
            }
        }
        PromptKind::Confirmation => {
            args.extend([
                "--question".into(),
                "--text".into(),
                text,
                "--ok-label".into(),
                "Yes".into(),
                "--cancel-label".into(),
                "No".into(),
            ]);
        }
        PromptKind::Info => {
            args.extend(["--info".into(), "--text".into(), text]);
        }
    }
    args.extend(["--title".into(), prompt.title.clone()]);
    DialogCommand {
        program: Backend::Zenity.program().to_string(),
        args,
        stdin,
    }
}

/// AppleScript string literal
fn applescript_string(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

fn osascript_command(prompt: &Prompt) -> DialogCommand {
    let title = applescript_string(&prompt.title);
    let text = applescript_string(&prompt.text);
    let lines: Vec<String> = match &prompt.kind {
        PromptKind::Text { default_value, .. } | PromptKind::Multiline { default_value } => {
            vec![format!(
                "text returned of (display dialog {} with title {} default answer {})",
                text,
                title,
                applescript_string(default_value.as_deref().unwrap_or(""))
            )]
        }
        PromptKind::Choice {
            choices,
            allow_multiple,
        } => {
            let list = choices
                .iter()
                .map(|c| applescript_string(c))
                .collect::<Vec<_>>()
                .join(", ");
            let multiple = if *allow_multiple {
                " with multiple selections allowed"
            } else {
                ""
            };
            vec![
                format!(
                    "set picked to choose from list {{{}}} with title {} with prompt {}{}",
                    list, title, text, multiple
                ),
                "if picked is false then error number -128".to_string(),
                "set AppleScript's text item delimiters to linefeed".to_string(),
                "return picked as text".to_string(),
            ]
        }
        PromptKind::Confirmation => vec![format!(
            "button returned of (display dialog {} with title {} buttons {{\"No\", \"Yes\"}} default button \"Yes\")",
            text, title
        )],
        PromptKind::Info => vec![format!(
            "display dialog {} with title {} buttons {{\"OK\"}} default button \"OK\"",
            text, title
        )],
    };
    let args = lines
        .into_iter()
        .flat_map(|line| ["-e".to_string(), line])
        .collect();
    DialogCommand {
        program: Backend::Osascript.program().to_string(),
        args,
        stdin: None,
    }
}

/// PowerShell single-quoted string literal
fn powershell_string(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

fn powershell_command(prompt: &Prompt) -> DialogCommand {
    let title = powershell_string(&prompt.title);
    let input_box = |body: &str, default: &str| {
        format!(
            "Add-Type -AssemblyName Microsoft.VisualBasic; \
             $r = [Microsoft.VisualBasic.Interaction]::InputBox({}, {}, {}); \
             if ($r -eq '') {{ exit 1 }}; [Console]::Out.Write($r)",
            powershell_string(body),
            title,
            powershell_string(default)
        )
    };
    let message_box = |buttons: &str, icon: &str| {
        format!(
            "Add-Type -AssemblyName System.Windows.Forms; \
             $r = [System.Windows.Forms.MessageBox]::Show({}, {}, '{}', '{}'); \
             [Console]::Out.Write($r)",
            powershell_string(&prompt.text),
            title,
            buttons,
            icon
        )
    };
    let script = match &prompt.kind {
        PromptKind::Text { default_value, .. } | PromptKind::Multiline { default_value } => {
            input_box(&prompt.text, default_value.as_deref().unwrap_or(""))
        }
        PromptKind::Choice { choices, .. } => {
            // No list control here: number the options and let the reply be interpreted
            let mut body = prompt.text.clone();
            for (idx, choice) in choices.iter().enumerate() {
                body.push_str(&format!("\n{}. {}", idx + 1, choice));
            }
            input_box(&body, "")
        }
        PromptKind::Confirmation => message_box("YesNo", "Question"),
        PromptKind::Info => message_box("OK", "Information"),
    };
    DialogCommand {
        program: Backend::PowerShell.program().to_string(),
        args: vec![
            "-NoProfile".into(),
            "-NonInteractive".into(),
            "-Command".into(),
            script,
        ],
        stdin: None,
    }
}

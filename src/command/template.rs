use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use anyhow::Result;

use crate::config::ToolsSection;
use crate::errors::TemplateError;

/// External tool a template runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Git,
    Compose,
    Keygen,
}

impl Tool {
    /// Arguments rendered after the tool's program on every invocation.
    fn base_args(self) -> &'static [&'static str] {
        match self {
            Tool::Git => &[
                "-c",
                "pull.rebase=false",
                "-c",
                "core.sshCommand=ssh -i {private_key:sh} -o IdentitiesOnly=yes",
            ],
            Tool::Compose => &[
                "--ansi",
                "never",
                "--project-name",
                "{id}",
                "--project-directory",
                "{compose_dir}",
            ],
            Tool::Keygen => &[],
        }
    }
}

/// One command with `{placeholder}` arguments.
#[derive(Debug, Clone, Copy)]
pub struct Template {
    pub tool: Tool,
    pub args: &'static [&'static str],
}

impl Template {
    pub const fn new(tool: Tool, args: &'static [&'static str]) -> Self {
        Self { tool, args }
    }
}

/// Program and leading arguments for each tool, from `[tools]`.
#[derive(Debug, Clone)]
pub struct Toolchain {
    git: Vec<String>,
    compose: Vec<String>,
    keygen: Vec<String>,
}

impl Toolchain {
    pub fn new(tools: &ToolsSection) -> Result<Self> {
        for (name, prefix) in [
            ("git", &tools.git),
            ("compose", &tools.compose),
            ("keygen", &tools.keygen),
        ] {
            if prefix.first().is_none_or(|program| program.trim().is_empty()) {
                anyhow::bail!("[tools] {} must name a program", name);
            }
        }
        Ok(Self {
            git: tools.git.clone(),
            compose: tools.compose.clone(),
            keygen: tools.keygen.clone(),
        })
    }

    fn prefix(&self, tool: Tool) -> &[String] {
        match tool {
            Tool::Git => &self.git,
            Tool::Compose => &self.compose,
            Tool::Keygen => &self.keygen,
        }
    }
}

impl Default for Toolchain {
    fn default() -> Self {
        let tools = ToolsSection::default();
        Self {
            git: tools.git,
            compose: tools.compose,
            keygen: tools.keygen,
        }
    }
}

/// Values bound to placeholder names.
#[derive(Debug, Clone, Default)]
pub struct Variables(HashMap<&'static str, String>);

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.0.insert(name, value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

/// A fully rendered argument vector, ready to spawn without a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedCommand {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl RenderedCommand {
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Whether any argument equals `arg`.
    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }
}

impl fmt::Display for RenderedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", quote(arg))?;
        }
        Ok(())
    }
}

fn quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@,+%".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Substitute every `{name}` in `arg` from `vars`. A `{name:sh}`
/// placeholder is shell-quoted, for arguments a tool hands to `sh`.
pub fn substitute(arg: &str, vars: &Variables) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(arg.len());
    let mut rest = arg;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}').ok_or_else(|| TemplateError::Unterminated {
            arg: arg.to_string(),
        })?;
        let (name, quoted) = match after[..close].strip_suffix(":sh") {
            Some(name) => (name, true),
            None => (&after[..close], false),
        };
        let value = vars.get(name).ok_or_else(|| TemplateError::Unbound {
            name: name.to_string(),
        })?;
        if quoted {
            out.push_str(&quote(value));
        } else {
            out.push_str(value);
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Render `template` into an argument vector.
pub fn render(
    template: &Template,
    toolchain: &Toolchain,
    vars: &Variables,
) -> Result<RenderedCommand, TemplateError> {
    let prefix = toolchain.prefix(template.tool);
    let program = prefix.first().cloned().unwrap_or_default();
    let mut args: Vec<String> = prefix.iter().skip(1).cloned().collect();
    for arg in template.tool.base_args().iter().chain(template.args) {
        args.push(substitute(arg, vars)?);
    }
    Ok(RenderedCommand {
        program,
        args,
        cwd: None,
    })
}

/// Render each template of a recipe in order.
pub fn render_all(
    templates: &[Template],
    toolchain: &Toolchain,
    vars: &Variables,
) -> Result<Vec<RenderedCommand>, TemplateError> {
    templates
        .iter()
        .map(|template| render(template, toolchain, vars))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> Variables {
        Variables::new()
            .set("id", "AB12CD34")
            .set("compose_dir", "/srv/AB12CD34/repository/bundle")
            .set("private_key", "/srv/AB12CD34/key")
            .set("tail", "100")
    }

    #[test]
    fn test_substitute_multiple_placeholders() {
        let out = substitute("{id}-{tail}", &vars()).unwrap();
        assert_eq!(out, "AB12CD34-100");
    }

    #[test]
    fn test_substitute_plain_text() {
        assert_eq!(substitute("--detach", &vars()).unwrap(), "--detach");
        assert_eq!(substitute("", &vars()).unwrap(), "");
    }

    #[test]
    fn test_unbound_variable_is_error() {
        let err = substitute("{repository}", &vars()).unwrap_err();
        assert_eq!(
            err,
            TemplateError::Unbound {
                name: "repository".into()
            }
        );
    }

    #[test]
    fn test_unterminated_placeholder_is_error() {
        assert!(matches!(
            substitute("{id", &vars()),
            Err(TemplateError::Unterminated { .. })
        ));
    }

    #[test]
    fn test_render_compose_command() {
        let template = Template::new(Tool::Compose, &["logs", "--tail", "{tail}"]);
        let cmd = render(&template, &Toolchain::default(), &vars()).unwrap();
        assert_eq!(cmd.program, "docker");
        assert_eq!(
            cmd.args,
            vec![
                "compose",
                "--ansi",
                "never",
                "--project-name",
                "AB12CD34",
                "--project-directory",
                "/srv/AB12CD34/repository/bundle",
                "logs",
                "--tail",
                "100",
            ]
        );
    }

    #[test]
    fn test_render_git_embeds_key() {
        let template = Template::new(Tool::Git, &["pull"]);
        let cmd = render(&template, &Toolchain::default(), &vars()).unwrap();
        assert_eq!(cmd.program, "git");
        assert!(cmd.has_arg("core.sshCommand=ssh -i /srv/AB12CD34/key -o IdentitiesOnly=yes"));
        assert_eq!(cmd.args.last().map(String::as_str), Some("pull"));
    }

    #[test]
    fn test_git_ssh_command_quotes_key_path() {
        let vars = Variables::new().set("private_key", "/srv/Application Support/AB12CD34/key");
        let template = Template::new(Tool::Git, &["pull"]);
        let cmd = render(&template, &Toolchain::default(), &vars).unwrap();
        assert!(cmd.has_arg(
            "core.sshCommand=ssh -i '/srv/Application Support/AB12CD34/key' -o IdentitiesOnly=yes"
        ));
    }

    #[test]
    fn test_shell_quoted_placeholder() {
        let vars = Variables::new().set("path", "it's here");
        assert_eq!(substitute("cat {path:sh}", &vars).unwrap(), r"cat 'it'\''s here'");
        assert_eq!(
            substitute("{missing:sh}", &vars).unwrap_err(),
            TemplateError::Unbound {
                name: "missing".into()
            }
        );
    }

    #[test]
    fn test_shell_metacharacters_stay_one_argument() {
        let vars = Variables::new()
            .set("private_key", "/k")
            .set("repository", "repo.git; rm -rf /");
        let template = Template::new(Tool::Git, &["clone", "--", "{repository}", "dest"]);
        let cmd = render(&template, &Toolchain::default(), &vars).unwrap();
        assert!(cmd.has_arg("repo.git; rm -rf /"));
        assert_eq!(cmd.args.len(), 4 + 4);
    }

    #[test]
    fn test_custom_toolchain_prefix() {
        let tools = ToolsSection {
            git: vec!["git".into()],
            compose: vec!["docker-compose".into()],
            keygen: vec!["ssh-keygen".into()],
        };
        let toolchain = Toolchain::new(&tools).unwrap();
        let template = Template::new(Tool::Compose, &["ps"]);
        let cmd = render(&template, &toolchain, &vars()).unwrap();
        assert_eq!(cmd.program, "docker-compose");
        assert_eq!(cmd.args[0], "--ansi");
    }

    #[test]
    fn test_toolchain_rejects_empty_program() {
        let tools = ToolsSection {
            compose: vec![],
            ..ToolsSection::default()
        };
        assert!(Toolchain::new(&tools).is_err());
    }

    #[test]
    fn test_display_quotes_when_needed() {
        let cmd = RenderedCommand {
            program: "ssh-keygen".into(),
            args: vec!["-N".into(), "".into(), "-C".into(), "Deployment key for x".into()],
            cwd: None,
        };
        assert_eq!(cmd.to_string(), "ssh-keygen -N '' -C 'Deployment key for x'");
    }

    #[test]
    fn test_render_all_stops_at_first_error() {
        let templates = [
            Template::new(Tool::Compose, &["down"]),
            Template::new(Tool::Compose, &["logs", "{missing}"]),
        ];
        assert!(render_all(&templates, &Toolchain::default(), &vars()).is_err());
    }
}

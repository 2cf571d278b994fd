//! Command templates for every lifecycle step.
//!
//! Placeholders: `id`, `path`, `private_key`, `worktree`, `compose_dir`,
//! `repository`, `directory`, `tail`, `timeout`.

use super::template::{Template, Tool};

pub const KEYGEN: &[Template] = &[Template::new(
    Tool::Keygen,
    &[
        "-t",
        "rsa",
        "-b",
        "4096",
        "-f",
        "{private_key}",
        "-N",
        "",
        "-C",
        "Deployment key for {id}",
    ],
)];

pub const CLONE: &[Template] = &[Template::new(
    Tool::Git,
    &["clone", "--", "{repository}", "{worktree}"],
)];

const GIT_PULL: Template = Template::new(Tool::Git, &["-C", "{worktree}", "pull"]);
const GIT_HARD_RESET: Template = Template::new(Tool::Git, &["-C", "{worktree}", "reset", "--hard"]);

const COMPOSE_BUILD: Template = Template::new(Tool::Compose, &["build", "--pull", "--force-rm"]);
const COMPOSE_UP: Template = Template::new(Tool::Compose, &["up", "--detach"]);
const COMPOSE_DOWN: Template = Template::new(
    Tool::Compose,
    &["down", "--remove-orphans", "--timeout", "{timeout}"],
);
const COMPOSE_DESTROY: Template = Template::new(
    Tool::Compose,
    &["down", "--remove-orphans", "--timeout", "{timeout}", "--volumes"],
);

pub const PULL: &[Template] = &[GIT_PULL];
pub const PULL_WITH_RESET: &[Template] = &[GIT_HARD_RESET, GIT_PULL];
pub const UPDATE: &[Template] = &[GIT_PULL, COMPOSE_BUILD, COMPOSE_DOWN, COMPOSE_UP];

pub const START: &[Template] = &[COMPOSE_UP];
pub const STOP: &[Template] = &[COMPOSE_DOWN];
pub const RESTART: &[Template] = &[COMPOSE_DOWN, COMPOSE_UP];
pub const DESTROY: &[Template] = &[COMPOSE_DESTROY];
pub const RESET: &[Template] = &[COMPOSE_DESTROY, COMPOSE_UP];

pub const STATUS: &[Template] = &[Template::new(Tool::Compose, &["ps", "--quiet"])];
pub const LOG: &[Template] = &[Template::new(
    Tool::Compose,
    &["logs", "--no-color", "--timestamps", "--tail", "{tail}"],
)];

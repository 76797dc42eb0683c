//! Descriptor rendering.
//!
//! Templates use minijinja syntax with strict undefined handling, so a
//! reference to a field the data does not carry is an error rather than
//! an empty string. Filters are pure value transforms:
//!
//! - `bool`: `true` / `false`
//! - `yes_no`: `YES` / `NO` (rc.conf style)
//! - `xml`: escape for plist string content
//! - `shell`: single-quote for `sh` and systemd command lines

use std::path::Path;

use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;

use service_platform::options::{
    KEEP_ALIVE, KEEP_ALIVE_DEFAULT, RESTART, RESTART_DEFAULT, RUN_AT_LOAD, RUN_AT_LOAD_DEFAULT,
    SESSION_CREATE, SESSION_CREATE_DEFAULT, START_TYPE, START_TYPE_DEFAULT, USER_SERVICE,
    USER_SERVICE_DEFAULT,
};
use service_platform::{Config, Error, Result};

/// Everything a descriptor template can reference.
#[derive(Debug, Clone, Serialize)]
pub struct DescriptorData<'a> {
    pub name: &'a str,
    pub display_name: &'a str,
    pub description: &'a str,
    pub user_name: &'a str,
    /// Absolute path of the executable the manager launches
    pub path: String,
    pub arguments: &'a [String],
    pub working_directory: Option<String>,
    pub dependencies: &'a [String],
    pub keep_alive: bool,
    pub run_at_load: bool,
    pub session_create: bool,
    pub user_service: bool,
    pub restart: String,
    pub start_type: String,
}

impl<'a> DescriptorData<'a> {
    pub fn new(config: &'a Config, executable: &Path) -> Self {
        let opts = &config.options;
        Self {
            name: &config.name,
            display_name: config.display_name(),
            description: &config.description,
            user_name: &config.user_name,
            path: executable.display().to_string(),
            arguments: &config.arguments,
            working_directory: config
                .working_directory
                .as_ref()
                .map(|dir| dir.display().to_string()),
            dependencies: &config.dependencies,
            keep_alive: opts.bool(KEEP_ALIVE, KEEP_ALIVE_DEFAULT),
            run_at_load: opts.bool(RUN_AT_LOAD, RUN_AT_LOAD_DEFAULT),
            session_create: opts.bool(SESSION_CREATE, SESSION_CREATE_DEFAULT),
            user_service: opts.bool(USER_SERVICE, USER_SERVICE_DEFAULT),
            restart: opts.string(RESTART, RESTART_DEFAULT),
            start_type: opts.string(START_TYPE, START_TYPE_DEFAULT),
        }
    }
}

pub fn render<S: Serialize>(source: &str, data: &S) -> Result<String> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_keep_trailing_newline(true);
    env.add_filter("bool", bool_literal);
    env.add_filter("yes_no", yes_no);
    env.add_filter("xml", xml_escape);
    env.add_filter("shell", shell_quote);

    env.render_str(source, data)
        .map_err(|e| Error::Template(e.to_string()))
}

fn bool_literal(value: bool) -> String {
    if value { "true" } else { "false" }.to_string()
}

fn yes_no(value: bool) -> String {
    if value { "YES" } else { "NO" }.to_string()
}

fn xml_escape(value: String) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn shell_quote(value: String) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

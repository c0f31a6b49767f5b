#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Quit,
    List,
    Load { name: String },
    Unload { name: String },
    Reload { name: String },
    Update { name: String },
    Rescan,
}

pub const COMMAND_HINTS: &[&str] = &[
    "help",
    "list",
    "load <module>",
    "unload <module>",
    "reload <module>",
    "update <module>",
    "rescan",
    "quit",
];

pub fn parse_command(input: &str) -> Result<Command, String> {
    let mut parts = input.split_whitespace();
    let head = parts
        .next()
        .ok_or_else(|| "empty command".to_string())?
        .to_ascii_lowercase();
    let rest: Vec<&str> = parts.collect();

    let module_arg = |verb: &str| -> Result<String, String> {
        match rest.as_slice() {
            [name] => Ok((*name).to_string()),
            [] => Err(format!("usage: {verb} <module>")),
            _ => Err(format!("`{verb}` takes exactly one module name")),
        }
    };

    match head.as_str() {
        "help" | "h" | "?" => Ok(Command::Help),
        "quit" | "q" | "exit" => Ok(Command::Quit),
        "list" | "ls" => Ok(Command::List),
        "rescan" => Ok(Command::Rescan),
        "load" => Ok(Command::Load {
            name: module_arg("load")?,
        }),
        "unload" => Ok(Command::Unload {
            name: module_arg("unload")?,
        }),
        "reload" => Ok(Command::Reload {
            name: module_arg("reload")?,
        }),
        "update" => Ok(Command::Update {
            name: module_arg("update")?,
        }),
        other => Err(format!("unknown command `{other}`, try `help`")),
    }
}

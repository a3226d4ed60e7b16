use rand::Rng;

const MAX_SIDES: u32 = 1000;
const DEFAULT_SIDES: u32 = 6;

/// Answers `MESSAGE !command ...` requests instead of broadcasting them.
pub trait ChatBot: Send {
    /// `args[0]` is the `!`-prefixed command. The returned text is sent back
    /// to `author` only.
    fn react(&mut self, author: &str, args: &[&str]) -> String;
}

#[derive(Debug, Default)]
pub struct Bot;

impl ChatBot for Bot {
    fn react(&mut self, author: &str, args: &[&str]) -> String {
        let Some((command, rest)) = args.split_first() else {
            return help();
        };

        match command.to_lowercase().as_str() {
            "!help" => help(),
            "!ping" => "pong".to_string(),
            "!roll" => roll(author, rest.first().copied()),
            "!echo" if !rest.is_empty() => rest.join(" "),
            "!echo" => "usage: !echo <text>".to_string(),
            other => format!("unknown command {other}, try !help"),
        }
    }
}

fn help() -> String {
    "commands: !help !ping !roll [sides] !echo <text>".to_string()
}

fn roll(author: &str, sides: Option<&str>) -> String {
    let sides = match sides.map(str::parse::<u32>) {
        None => DEFAULT_SIDES,
        Some(Ok(sides)) if (1..=MAX_SIDES).contains(&sides) => sides,
        Some(_) => return format!("usage: !roll [sides], with 1 <= sides <= {MAX_SIDES}"),
    };
    let value = rand::thread_rng().gen_range(1..=sides);
    format!("{author} rolled {value} (d{sides})")
}

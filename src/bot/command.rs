#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Subscribe(String),
    Unsubscribe(String),
    Subscriptions,
    Search(String),
    Liked,
    Block(String),
    Unblock(String),
    Random,
    Unknown(String),
}

impl Command {
    /// Parse `/name[@bot] [args]`. Returns `None` for plain text.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let rest = text.strip_prefix('/')?;
        let (head, args) = match rest.split_once(char::is_whitespace) {
            Some((head, args)) => (head, args.trim().to_string()),
            None => (rest, String::new()),
        };
        let name = head.split('@').next().unwrap_or_default().to_lowercase();

        Some(match name.as_str() {
            "start" => Command::Start,
            "help" => Command::Help,
            "subscribe" => Command::Subscribe(args),
            "unsubscribe" => Command::Unsubscribe(args),
            "subscriptions" => Command::Subscriptions,
            "search" => Command::Search(args),
            "liked" => Command::Liked,
            "block" => Command::Block(args),
            "unblock" => Command::Unblock(args),
            "random" => Command::Random,
            _ => Command::Unknown(name),
        })
    }
}

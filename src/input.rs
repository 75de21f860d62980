#[derive(Debug, PartialEq, Eq)]
pub enum Input<'a> {
    Send { data: &'a str },
    Reload,
    Quit,
    Help,
    Unknown { data: &'a str },
}

impl<'a> Input<'a> {
    pub const HELP: &'static str = "\
/reload  fetch the messages again after a failed load
/quit    leave the chat
//text   send a message starting with `/`";

    pub fn parse(input: &'a str) -> Self {
        let Some(tail) = input.strip_prefix('/') else {
            return Self::Send { data: input };
        };

        if tail.starts_with('/') {
            return Self::Send { data: tail };
        }

        let (head, _) = tail.split_once(' ').unwrap_or((tail, ""));
        match head.trim_end() {
            "reload" | "refresh" => Self::Reload,
            "quit" | "exit" => Self::Quit,
            "help" | "?" => Self::Help,
            _ => Self::Unknown { data: input },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_sent() {
        assert_eq!(
            Input::parse("  hello there "),
            Input::Send {
                data: "  hello there "
            }
        );
    }

    #[test]
    fn commands() {
        assert_eq!(Input::parse("/reload"), Input::Reload);
        assert_eq!(Input::parse("/exit now"), Input::Quit);
        assert_eq!(Input::parse("/?"), Input::Help);
        assert_eq!(
            Input::parse("/join #room"),
            Input::Unknown { data: "/join #room" }
        );
    }

    #[test]
    fn escaped_slash() {
        assert_eq!(Input::parse("//shrug"), Input::Send { data: "/shrug" });
    }
}

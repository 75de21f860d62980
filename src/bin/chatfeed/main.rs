use anyhow::Context as _;
use tokio::io::{AsyncBufReadExt as _, BufReader};
use tracing_subscriber::{fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter};

use chatfeed::{
    input::Input,
    message::SubmitError,
    view::{ChatView, ViewEvent},
    Config,
};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,chatfeed=debug"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::load().context("cannot load configuration")?;
    let feed = config.open_feed().context("cannot open the message feed")?;
    tracing::info!(url = %config.database_url, path = %config.path, "connecting");

    let mut view = ChatView::open(feed, &config.user_name, config.view, ())?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut printed = 0;

    println!("chatting as {}. /help lists commands", config.user_name);
    println!("loading messages...");

    loop {
        tokio::select! {
            events = view.changed() => {
                for event in events {
                    report(&event);
                }
                printed = print_new(&view, printed);
            }

            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match Input::parse(&line) {
                    Input::Send { data } => {
                        view.composer_mut().set(data);
                        match view.send() {
                            Ok(()) | Err(SubmitError::Empty) => {}
                            Err(err) => println!("! {err}"),
                        }
                    }
                    Input::Reload => {
                        if !view.reload() {
                            println!("! messages are already loaded");
                        }
                    }
                    Input::Quit => break,
                    Input::Help => println!("{}", Input::HELP),
                    Input::Unknown { data } => println!("! unknown command: {data}"),
                }
            }
        }
    }

    view.close();
    Ok(())
}

fn report(event: &ViewEvent) {
    match event {
        ViewEvent::Loaded { count } => println!("-- {count} messages --"),
        ViewEvent::FetchFailed { error, retry_in } => match retry_in {
            Some(delay) => println!("! {error}, retrying in {}s", delay.as_secs_f32()),
            None => println!("! {error}, type /reload to try again"),
        },
        ViewEvent::AppendFailed { error } => println!("! message not sent: {error}"),
        ViewEvent::Appended(..) | ViewEvent::Sent { .. } => {}
    }
}

fn print_new(view: &ChatView, printed: usize) -> usize {
    let rows = view.transcript();
    for row in rows.iter().skip(printed) {
        println!("{row}");
    }
    rows.len()
}


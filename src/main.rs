use memorius::database::db;
use memorius::export::json::{import_json, sample_deck, seed_database};
use memorius::logging;
use memorius::models::{CardId, Control, DeckId, Notification, UserId};
use memorius::review::{MessageRef, Notifier, NotifyError};
use memorius::*;

use async_trait::async_trait;
use chrono::Utc;
use clap::Parser;
use std::error::Error;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info};

#[derive(Parser, Debug)]
#[command(name = "memorius", about = "Review flashcards with SM-2 scheduling")]
struct Cli {
    /// SQLite database file (overrides REVIEW_DB_PATH)
    #[arg(long)]
    db: Option<PathBuf>,
    /// Seconds allowed per question (overrides REVIEW_ANSWER_TIMEOUT_SECS)
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// User id to review as
    #[arg(long, default_value_t = 1)]
    user: UserId,
    /// Deck fixture (JSON) to import before starting
    #[arg(long)]
    fixture: Option<PathBuf>,
}

const HELP: &str = "commands: decks | start [deck] | show | easy | medium | hard | pick <n> | skip | cancel | stats [days] | quit";

/// The card whose controls were printed last. Answers typed by the user
/// refer to this card, even if a timeout has moved the session on meanwhile.
type Shown = Arc<Mutex<Option<CardId>>>;

/// Prints timer-driven updates as if the bot edited its message.
struct ConsoleNotifier {
    shown: Shown,
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn notify(&self, _target: &MessageRef, notification: Notification) -> Result<(), NotifyError> {
        print_notification(&notification, &self.shown);
        Ok(())
    }
}

fn print_notification(notification: &Notification, shown: &Mutex<Option<CardId>>) {
    let mut shown = shown.lock().unwrap_or_else(|e| e.into_inner());
    *shown = notification.card_id;
    println!("\n{}", notification.text);
    if !notification.controls.is_empty() {
        let controls: Vec<String> = notification
            .controls
            .iter()
            .map(|control| match control {
                Control::ShowAnswer => "[show]".to_string(),
                Control::RateEasy => "[easy]".to_string(),
                Control::RateMedium => "[medium]".to_string(),
                Control::RateHard => "[hard]".to_string(),
                Control::Variant(n) => format!("[pick {n}]"),
                Control::Skip => "[skip]".to_string(),
            })
            .collect();
        println!("{}", controls.join(" "));
    }
}

fn report(err: &ReviewError) {
    if err.is_user_visible() {
        println!("! {err}");
    } else if err.is_ignorable() {
        debug!(error = %err, "ignored");
    } else {
        error!(error = %err, "review action failed");
        println!("! something went wrong, see logs");
    }
}

struct Repl {
    review: Arc<ReviewOrchestrator>,
    store: Arc<SqliteCardStore>,
    user_id: UserId,
    target: MessageRef,
    shown: Shown,
}

impl Repl {
    fn print(&self, notification: &Notification) {
        print_notification(notification, &self.shown);
    }

    fn print_step(&self, result: &AnswerOutcome) {
        match (result.correct, &result.correct_answer) {
            (Some(true), _) => println!("Correct!"),
            (Some(false), Some(answer)) => println!("Wrong! Correct answer: {answer}"),
            _ => {}
        }
        self.print(&result.step.notification());
    }

    fn shown_card(&self) -> Option<CardId> {
        *self.shown.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn resolve_deck(&self, name: Option<&str>) -> Result<Option<DeckId>, Box<dyn Error>> {
        let conn = self.store.conn()?;
        Ok(match name {
            Some(name) => db::find_deck(name, &conn)?,
            None => db::get_all_decks(&conn)?.first().map(|(id, _)| *id),
        })
    }

    /// Returns false once the user asks to quit.
    async fn handle(&self, line: &str) -> Result<bool, Box<dyn Error>> {
        let (command, arg) = match line.split_once(' ') {
            Some((command, arg)) => (command, Some(arg.trim())),
            None => (line, None),
        };

        match command {
            "quit" | "exit" => return Ok(false),
            "help" => println!("{HELP}"),
            "decks" => {
                let conn = self.store.conn()?;
                for (id, name) in db::get_all_decks(&conn)? {
                    println!("  {id}: {name}");
                }
            }
            "start" => {
                let Some(deck_id) = self.resolve_deck(arg)? else {
                    println!("! no such deck");
                    return Ok(true);
                };
                match self
                    .review
                    .start_session(self.user_id, deck_id, self.target, Utc::now())
                    .await
                {
                    Ok(view) => self.print(&Notification::question(&view)),
                    Err(err) => report(&err),
                }
            }
            "show" => match self.review.reveal(self.user_id).await {
                Ok(view) => self.print(&Notification::answer(&view)),
                Err(err) => report(&err),
            },
            "easy" | "medium" | "hard" | "pick" | "skip" => {
                let Some(card_id) = self.shown_card() else {
                    println!("no question on screen, try 'start'");
                    return Ok(true);
                };
                let result = match (command, arg.map(str::parse::<u8>)) {
                    ("easy", _) => self.review.answer(self.user_id, card_id, Rating::Easy).await,
                    ("medium", _) => self.review.answer(self.user_id, card_id, Rating::Medium).await,
                    ("hard", _) => self.review.answer(self.user_id, card_id, Rating::Hard).await,
                    ("pick", Some(Ok(n))) => {
                        self.review
                            .answer(self.user_id, card_id, Rating::Variant(n))
                            .await
                    }
                    ("pick", _) => {
                        println!("usage: pick <n>");
                        return Ok(true);
                    }
                    _ => self.review.skip(self.user_id, card_id).await,
                };
                match result {
                    Ok(result) => self.print_step(&result),
                    Err(err) => report(&err),
                }
            }
            "cancel" => {
                if self.review.cancel_session(self.user_id).await {
                    *self.shown.lock().unwrap_or_else(|e| e.into_inner()) = None;
                    println!("Session cancelled.");
                }
            }
            "stats" => {
                let days = arg.and_then(|d| d.parse().ok()).unwrap_or(30);
                match self.review.statistics(self.user_id, days, Utc::now()).await {
                    Ok(stats) if stats.total == 0 => println!("No reviews in the last {days} days."),
                    Ok(stats) => {
                        println!(
                            "Last {days} days: {} reviews, {} easy, {} need review, {} skipped, {} timed out",
                            stats.total,
                            stats.easy,
                            stats.need_review(),
                            stats.skipped,
                            stats.timed_out
                        );
                        if let Some(rate) = stats.success_rate() {
                            println!("Success rate: {rate:.1}%");
                        }
                    }
                    Err(err) => report(&err),
                }
            }
            "" => {}
            other => println!("unknown command '{other}'\n{HELP}"),
        }
        Ok(true)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = ReviewConfig::from_env()?;
    if let Some(path) = cli.db {
        config.database_path = path;
    }
    if let Some(secs) = cli.timeout_secs {
        config = config.with_answer_timeout(Duration::from_secs(secs))?;
    }
    logging::init_tracing(&config.log_level);

    let store = Arc::new(SqliteCardStore::open(&config.database_path)?);
    {
        let conn = store.conn()?;
        if let Some(path) = &cli.fixture {
            let deck = import_json(path)?;
            if db::find_deck(&deck.name, &conn)?.is_some() {
                println!("Deck '{}' is already loaded, fixture skipped", deck.name);
            } else {
                seed_database(&deck, Utc::now(), &conn)?;
            }
        } else if db::get_all_decks(&conn)?.is_empty() {
            seed_database(&sample_deck(), Utc::now(), &conn)?;
            println!("Sample data created!");
        }

        let decks = db::get_all_decks(&conn)?;
        println!("Loaded {} decks from database", decks.len());
        for (_, name) in &decks {
            println!("  - {name}");
        }
    }

    let shown = Shown::default();
    let review = ReviewOrchestrator::new(
        store.clone(),
        Arc::new(ConsoleNotifier {
            shown: Arc::clone(&shown),
        }),
        Arc::new(SystemClock),
        &config,
    );
    info!(timeout = ?config.answer_timeout, user_id = cli.user, "ready");
    println!("{HELP}");

    let repl = Repl {
        review: Arc::clone(&review),
        store,
        user_id: cli.user,
        target: MessageRef {
            chat_id: cli.user,
            message_id: 1,
        },
        shown,
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if !repl.handle(line.trim()).await? {
            break;
        }
    }

    review.shutdown();
    Ok(())
}

mod event;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::{Parser, Subcommand};

use event::{AppEvent, EventHandler};
use quizladder::config::Config;
#[cfg(feature = "network")]
use quizladder::engine::predictor::HttpPredictor;
use quizladder::engine::predictor::{HeuristicPredictor, ScaffoldPredictor};
use quizladder::session::recorder::AttemptRecorder;
use quizladder::session::summary::ProgressSummary;
use quizladder::session::{QuizEvent, QuizSession};
use quizladder::store::QuizStore;
use quizladder::store::json_store::JsonStore;
use quizladder::store::pending_queue::PendingQueue;

const TICK_RATE: Duration = Duration::from_millis(250);

#[derive(Parser)]
#[command(name = "quizladder", version, about = "Adaptive math quiz with mastery-based difficulty")]
struct Cli {
    #[arg(short, long, help = "Learner identifier")]
    learner: Option<String>,

    #[arg(short, long, help = "Directory holding questions, history and queued writes")]
    data_dir: Option<PathBuf>,

    #[arg(short, long, help = "Fully-correct rounds needed to clear Easy")]
    easy_goal: Option<u32>,

    #[arg(long, help = "Scaffold predictor endpoint")]
    predictor_url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    /// Start a quiz session (default)
    Play,
    /// Show the latest progress snapshot
    Progress,
    /// Replay writes queued while the store was unavailable
    Flush,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir.to_string_lossy().to_string();
    }
    if let Some(goal) = cli.easy_goal {
        config.easy_goal = goal;
    }
    if let Some(url) = cli.predictor_url {
        config.predictor_url = Some(url);
    }
    config.validate();

    let learner = cli.learner.unwrap_or_else(|| config.learner_id.clone());
    let mut store = JsonStore::with_base_dir(config.data_path())?;
    let queue = PendingQueue::open(store.pending_queue_path())?;

    match cli.command.unwrap_or(Command::Play) {
        Command::Play => play(store, queue, &config, learner),
        Command::Progress => {
            let latest = store.latest_progress(&learner)?;
            let scaffold = store.scaffold_level(&learner)?;
            print_summary(&learner, &ProgressSummary::from_latest(latest.as_ref()));
            println!("Scaffold level: {scaffold:?}");
            if !queue.is_empty() {
                println!("{} write(s) waiting to be synced", queue.len());
            }
            Ok(())
        }
        Command::Flush => {
            let report = AttemptRecorder::new(queue).flush_queued(&mut store);
            println!(
                "Replayed {} queued write(s), {} still pending",
                report.replayed, report.remaining
            );
            Ok(())
        }
    }
}

fn build_predictor(config: &Config) -> Result<Box<dyn ScaffoldPredictor>> {
    match config.predictor_url.as_deref() {
        #[cfg(feature = "network")]
        Some(url) => Ok(Box::new(HttpPredictor::new(url)?)),
        #[cfg(not(feature = "network"))]
        Some(_) => {
            log::warn!("Built without the network feature, using the heuristic predictor");
            Ok(Box::new(HeuristicPredictor::default()))
        }
        None => Ok(Box::new(HeuristicPredictor::default())),
    }
}

fn play(store: JsonStore, queue: PendingQueue, config: &Config, learner: String) -> Result<()> {
    let predictor = build_predictor(config)?;
    let mut quiz = QuizSession::new(store, predictor, config, learner.clone()).with_pending_queue(queue);

    let events = quiz.start()?;
    let flushed = quiz.last_flush();
    if flushed.replayed > 0 {
        println!("Synced {} answer(s) saved while offline.", flushed.replayed);
    }
    render(&events);

    let handler = EventHandler::new(TICK_RATE);
    while !quiz.is_over() {
        match handler.next()? {
            AppEvent::Tick => render(&quiz.tick(Instant::now())),
            AppEvent::Line(line) => match line.trim() {
                "q" | "quit" => break,
                "h" | "hint" => match quiz.request_hint() {
                    Ok(Some(hint)) => println!("Hint: {hint}"),
                    Ok(None) => println!("No hint for this step."),
                    Err(e) => println!("{e}"),
                },
                input => match (input.parse::<usize>(), quiz.current_ticket()) {
                    (Ok(choice), Some(ticket)) if choice >= 1 => {
                        match quiz.submit_answer(ticket, choice - 1) {
                            Ok(events) => render(&events),
                            Err(e) => println!("{e}"),
                        }
                    }
                    _ => println!("Enter a choice number, 'h' for a hint or 'q' to quit."),
                },
            },
            AppEvent::Eof => break,
        }
    }

    let latest = quiz.store().latest_progress(&learner)?;
    print_summary(&learner, &ProgressSummary::from_latest(latest.as_ref()));
    if quiz.pending_writes() > 0 {
        println!(
            "{} write(s) could not be saved and will sync next time.",
            quiz.pending_writes()
        );
    }
    Ok(())
}

fn render(events: &[QuizEvent]) {
    for event in events {
        match event {
            QuizEvent::QuestionReady {
                tier,
                main_question,
                sub_question,
                ..
            } => {
                println!();
                if sub_question.step <= 1 {
                    println!("[{tier}] {}", main_question.topic);
                    println!("{}", main_question.prompt);
                }
                println!(
                    "Step {}/{}: {}",
                    sub_question.step,
                    main_question.sub_questions.len(),
                    sub_question.prompt
                );
                for (i, choice) in sub_question.choices.iter().enumerate() {
                    println!("  {}) {choice}", i + 1);
                }
            }
            QuizEvent::AnswerOutcome {
                correct,
                correct_choice,
                timed_out,
            } => {
                if *timed_out {
                    println!("Time's up! The answer was {correct_choice}.");
                } else if *correct {
                    println!("Correct!");
                } else {
                    println!("Not quite. The answer was {correct_choice}.");
                }
            }
            QuizEvent::TierTransition { from, to, reason } => {
                println!();
                println!("{from} complete ({reason:?}), next: {to}");
            }
            QuizEvent::SessionComplete { reason } => {
                println!();
                println!("Session over: {reason}.");
            }
            QuizEvent::Warning(fault) => eprintln!("note: {fault}"),
        }
    }
}

fn print_summary(learner: &str, summary: &ProgressSummary) {
    println!();
    println!("Progress for {learner}");
    match summary.last_tier {
        Some(tier) => println!("  Last tier:          {tier}"),
        None => println!("  No completed tiers yet."),
    }
    println!("  Questions answered: {}", summary.questions_answered);
    println!("  Correct:            {}", summary.correct);
    println!("  Accuracy:           {}%", summary.accuracy_percent);
    println!("  Points:             {}", summary.points);
}

use std::time::{Duration, Instant};

use console::style;
use glimpse_core::{SessionEvent, SessionState};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.0}m {:.0}s", (secs / 60.0).floor(), secs % 60.0)
    }
}

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn create_bar(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:30.cyan/blue}] {pos:>3}%")
            .unwrap()
            .progress_chars("=> "),
    );
    pb.set_message(msg.to_string());
    pb
}

/// Draw session events until the session goes away
pub async fn render_events(
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
    provider: &'static str,
    model: String,
) {
    let mut bar: Option<ProgressBar> = None;
    let mut step_start = Instant::now();

    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::StateChanged(SessionState::Extracting) => {
                step_start = Instant::now();
                bar = Some(create_bar("Extracting frames"));
            }
            SessionEvent::Progress(fraction) => {
                if let Some(pb) = &bar {
                    pb.set_position((fraction * 100.0).round() as u64);
                }
            }
            SessionEvent::StateChanged(SessionState::Analyzing) => {
                if let Some(pb) = bar.take() {
                    pb.finish_with_message(format!(
                        "{} Frames extracted {}",
                        style("✓").green().bold(),
                        style(format!("[{}]", format_duration(step_start.elapsed()))).dim()
                    ));
                }
                step_start = Instant::now();
                bar = Some(create_spinner(&format!(
                    "Analyzing frames with {} ({})...",
                    provider, model
                )));
            }
            SessionEvent::StateChanged(SessionState::Done) => {
                if let Some(pb) = bar.take() {
                    pb.finish_with_message(format!(
                        "{} Analysis complete ({}) {}",
                        style("✓").green().bold(),
                        provider,
                        style(format!("[{}]", format_duration(step_start.elapsed()))).dim()
                    ));
                }
            }
            SessionEvent::StateChanged(SessionState::Failed) => {
                if let Some(pb) = bar.take() {
                    pb.abandon_with_message(format!("{} Analysis failed", style("✗").red().bold()));
                }
            }
            SessionEvent::StateChanged(_) => {}
        }
    }

    if let Some(pb) = bar.take() {
        pb.finish_and_clear();
    }
}

//! Stdin console for a screenless kiosk.
//!
//! A dedicated thread owns stdin. Every line counts as an interaction, a few
//! words are commands, and when the kiosk asks for setup the form runs on the
//! same thread so the prompts and the line reader never compete for input.

use std::{
    io::BufRead,
    sync::{Arc, Mutex},
    thread,
};

use anyhow::Result;
use inquire::{InquireError, Text};
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use kiosk_core::{KioskEvent, LocationInput, SetupCollaborator, SetupPrefill, SetupSubmission};

/// Setup collaborator backed by the console thread.
pub struct ConsoleSetup {
    pending: Arc<Mutex<Option<SetupPrefill>>>,
}

impl SetupCollaborator for ConsoleSetup {
    fn open(&mut self, prefill: SetupPrefill) {
        match self.pending.lock() {
            Ok(mut pending) => {
                *pending = Some(prefill);
                println!("Setup required: press Enter to open the setup form.");
            }
            Err(_) => warn!("console thread panicked; setup form unavailable"),
        }
    }
}

pub fn spawn(events: mpsc::Sender<KioskEvent>) -> ConsoleSetup {
    let pending = Arc::new(Mutex::new(None));
    let shared = Arc::clone(&pending);
    thread::spawn(move || console_loop(events, shared));
    ConsoleSetup { pending }
}

fn console_loop(events: mpsc::Sender<KioskEvent>, pending: Arc<Mutex<Option<SetupPrefill>>>) {
    let stdin = std::io::stdin();
    let mut line = String::new();

    loop {
        line.clear();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => {
                warn!("stdin closed; console input disabled");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("cannot read stdin: {e}");
                return;
            }
        }

        let requested = pending.lock().ok().and_then(|mut p| p.take());
        if let Some(prefill) = requested {
            run_setup_form(&events, prefill);
            continue;
        }

        if events.blocking_send(parse_command(line.trim())).is_err() {
            return;
        }
    }
}

/// `setup`, `quit`, `hover X Y`; anything else is a plain interaction.
fn parse_command(line: &str) -> KioskEvent {
    let mut words = line.split_whitespace();
    match words.next() {
        Some("setup") => KioskEvent::OpenSetup,
        Some("quit") | Some("exit") => KioskEvent::Shutdown,
        Some("hover") => {
            let x = words.next().and_then(|w| w.parse().ok());
            let y = words.next().and_then(|w| w.parse().ok());
            match (x, y) {
                (Some(x), Some(y)) => KioskEvent::Pointer { x, y },
                _ => KioskEvent::Interaction,
            }
        }
        _ => KioskEvent::Interaction,
    }
}

fn run_setup_form(events: &mpsc::Sender<KioskEvent>, mut prefill: SetupPrefill) {
    loop {
        let submission = match prompt_submission(&prefill) {
            Ok(Some(submission)) => submission,
            Ok(None) => {
                let _ = events.blocking_send(KioskEvent::SetupCancelled);
                return;
            }
            Err(e) => {
                eprintln!("Setup form failed: {e:#}");
                let _ = events.blocking_send(KioskEvent::SetupCancelled);
                return;
            }
        };
        prefill = prefill_from(&submission);

        let (reply, answer) = oneshot::channel();
        if events.blocking_send(KioskEvent::SetupSubmitted { submission, reply }).is_err() {
            return;
        }

        match answer.blocking_recv() {
            Ok(Ok(outcome)) if outcome.changed => {
                println!("Saved. Syncing now.");
                return;
            }
            Ok(Ok(_)) => {
                println!("Saved. Nothing changed.");
                return;
            }
            Ok(Err(e)) => eprintln!("Error: {e}"),
            Err(_) => return,
        }
    }
}

/// Ask for the API key and location. `None` when the user cancels.
///
/// The location field takes a Zip Code, or `lat,lon` to skip geocoding.
pub fn prompt_submission(prefill: &SetupPrefill) -> Result<Option<SetupSubmission>> {
    let api_key = Text::new("OpenWeather API Key")
        .with_initial_value(&prefill.api_key)
        .prompt();
    let Some(api_key) = cancellable(api_key)? else {
        return Ok(None);
    };

    let place = Text::new("Zip Code")
        .with_help_message("or lat,lon")
        .with_initial_value(&prefill.zip_code)
        .prompt();
    let Some(place) = cancellable(place)? else {
        return Ok(None);
    };

    Ok(Some(SetupSubmission {
        api_key,
        location: location_input(&place),
    }))
}

fn cancellable(answer: Result<String, InquireError>) -> Result<Option<String>> {
    match answer {
        Ok(value) => Ok(Some(value)),
        Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn location_input(raw: &str) -> LocationInput {
    match raw.split_once(',') {
        Some((lat, lon)) => LocationInput::Coordinates {
            lat: lat.trim().into(),
            lon: lon.trim().into(),
        },
        None => LocationInput::ZipCode(raw.trim().into()),
    }
}

/// Values to reopen the form with after a rejected submission.
pub fn prefill_from(submission: &SetupSubmission) -> SetupPrefill {
    let zip_code = match &submission.location {
        LocationInput::ZipCode(zip) => zip.clone(),
        LocationInput::Coordinates { lat, lon } => format!("{lat},{lon}"),
    };
    SetupPrefill {
        api_key: submission.api_key.clone(),
        zip_code,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_map_to_events() {
        assert!(matches!(parse_command(""), KioskEvent::Interaction));
        assert!(matches!(parse_command("setup"), KioskEvent::OpenSetup));
        assert!(matches!(parse_command("quit"), KioskEvent::Shutdown));
        assert!(matches!(parse_command("hover 20 350"), KioskEvent::Pointer { x: 20, y: 350 }));
        assert!(matches!(parse_command("hover twenty"), KioskEvent::Interaction));
    }

    #[test]
    fn comma_means_coordinates() {
        assert_eq!(
            location_input(" 41.9, -87.6 "),
            LocationInput::Coordinates {
                lat: "41.9".into(),
                lon: "-87.6".into(),
            }
        );
        assert_eq!(location_input("62701"), LocationInput::ZipCode("62701".into()));
    }

    #[test]
    fn rejected_coordinates_reopen_as_typed() {
        let submission = SetupSubmission {
            api_key: "KEY".into(),
            location: LocationInput::Coordinates {
                lat: "95".into(),
                lon: "0".into(),
            },
        };
        let prefill = prefill_from(&submission);
        assert_eq!(prefill.zip_code, "95,0");
        assert_eq!(location_input(&prefill.zip_code), submission.location);
    }
}

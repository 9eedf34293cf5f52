//! Terminal stand-in for the splash window.

use std::io::BufRead;
use std::path::Path;
use std::process::Command;

use splash_updater::{EventSender, LauncherEvent, LauncherHost, Platform, ReleaseAsset, UpdaterError};
use tracing::{debug, error, info, warn};

/// Prints status lines and forwards terminal input as user actions.
pub struct ConsoleHost {
    main_command: Option<String>,
}

impl ConsoleHost {
    pub fn new(main_command: Option<String>) -> Self {
        Self { main_command }
    }
}

impl LauncherHost for ConsoleHost {
    fn set_status(&self, message: &str) {
        for line in message.lines() {
            println!("> {line}");
        }
    }

    fn show_progress(&self, visible: bool) {
        debug!(visible, "progress indicator toggled");
    }

    fn set_progress(&self, value: u64, max: u64) {
        if max == 0 {
            println!("  [  ?  ] {value} bytes");
            return;
        }
        let percent = (value.min(max) as f64 / max as f64) * 100.0;
        println!("  [{percent:>5.1}%] {value}/{max} bytes");
    }

    fn set_window_progress(&self, transferred: u64, total: u64) {
        debug!(transferred, total, "window progress");
    }

    fn set_window_progress_loading(&self) {
        debug!("window progress set to loading");
    }

    fn prompt_download(&self, asset: &ReleaseAsset) {
        println!("  {} is ready to download.", asset.name);
        println!("  Press Enter to open the download page.");
    }

    fn open_external(&self, url: &str) -> splash_updater::Result<()> {
        let (program, args): (&str, &[&str]) = match Platform::current() {
            Platform::Windows => ("cmd", &["/C", "start", ""]),
            Platform::MacOs => ("open", &[]),
            Platform::Linux => ("xdg-open", &[]),
        };
        info!(url, program, "opening download link");
        Command::new(program)
            .args(args)
            .arg(url)
            .spawn()
            .map_err(UpdaterError::Io)?;
        Ok(())
    }

    fn run_installer(&self, path: &Path) -> splash_updater::Result<()> {
        let child = Command::new(path).spawn().map_err(UpdaterError::Io)?;
        info!(pid = child.id(), installer = %path.display(), "installer started");
        Ok(())
    }

    fn open_main_window(&self) {
        let Some(command) = self.main_command.as_deref() else {
            info!("no main application command configured");
            return;
        };
        let mut parts = command.split_whitespace();
        let Some(program) = parts.next() else {
            warn!("main application command is empty");
            return;
        };
        match Command::new(program).args(parts).spawn() {
            Ok(child) => info!(pid = child.id(), program, "main application started"),
            Err(err) => error!(program, error = %err, "failed to start main application"),
        }
    }

    fn close_update_window(&self) {
        info!("update window closed");
    }

    fn open_dev_tools(&self) {
        info!("developer tools requested; run with --debug for verbose output");
    }
}

/// Map one terminal line to a user action: `devtools` opens the developer
/// tools, anything else accepts the download prompt.
fn user_action(line: &str) -> LauncherEvent {
    match line.trim() {
        "devtools" | "F12" => LauncherEvent::DevToolsRequested,
        _ => LauncherEvent::DownloadRequested,
    }
}

/// Forward terminal lines from `input` until it ends or the orchestrator
/// stops listening. Waits for room while a download floods the channel.
fn pump_user_input(input: impl BufRead, events: &EventSender) {
    for line in input.lines() {
        let Ok(line) = line else {
            break;
        };
        if events.blocking_send(user_action(&line)).is_err() {
            debug!("launcher stopped listening for user input");
            break;
        }
    }
}

/// Read stdin on a detached thread.
pub fn forward_user_input(events: EventSender) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        pump_user_input(stdin.lock(), &events);
    });
}

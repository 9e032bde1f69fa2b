use comms::{
    command::UpdateTimerCommand,
    snapshot::{MemberSnapshot, PomodoroPhase, PomodoroState},
};

use crate::util::{now_millis, random_id};

pub const DEFAULT_X: f64 = 80.0;
pub const DEFAULT_Y: f64 = 90.0;
const MAX_COORDINATE: f64 = 5000.0;
const DEFAULT_POMODORO_SECONDS: u32 = 25 * 60;
const MAX_POMODORO_SECONDS: u32 = 60 * 60;

#[derive(Debug, Clone)]
/// [Member] is a participant of a single study room.
///
/// A member exists from the moment it is created or joins by code until it leaves,
/// being online only while a session is subscribed on its behalf.
pub struct Member {
    pub id: String,
    pub username: String,
    pub online: bool,
    /// The session currently subscribed on behalf of this member
    pub session_id: Option<String>,
    pub selected_cat: Option<String>,
    pub selected_action: Option<String>,
    pub x: f64,
    pub y: f64,
    pub pomodoro: Option<PomodoroState>,
    pub joined_at: u64,
}

impl Member {
    pub fn new(username: String) -> Self {
        Member {
            id: random_id("member"),
            username,
            online: false,
            session_id: None,
            selected_cat: None,
            selected_action: None,
            x: DEFAULT_X,
            y: DEFAULT_Y,
            pomodoro: None,
            joined_at: now_millis(),
        }
    }

    pub fn snapshot(&self) -> MemberSnapshot {
        MemberSnapshot {
            id: self.id.clone(),
            username: self.username.clone(),
            online: self.online,
            selected_cat: self.selected_cat.clone(),
            selected_action: self.selected_action.clone(),
            x: self.x,
            y: self.y,
            joined_at: self.joined_at,
            pomodoro: self.pomodoro.clone(),
        }
    }

    pub fn is_bound_to(&self, session_id: &str) -> bool {
        self.session_id.as_deref() == Some(session_id)
    }

    /// Mark online on behalf of the given session, updating the avatar when one is chosen
    pub fn bind(
        &mut self,
        session_id: &str,
        selected_cat: Option<&str>,
        selected_action: Option<&str>,
    ) {
        self.online = true;
        self.session_id = Some(String::from(session_id));

        if let Some(cat) = selected_cat.map(str::trim).filter(|cat| !cat.is_empty()) {
            self.selected_cat = Some(String::from(cat));
        }
        if let Some(action) = selected_action.map(str::trim).filter(|a| !a.is_empty()) {
            self.selected_action = Some(String::from(action));
        }
    }

    pub fn unbind(&mut self) {
        self.online = false;
        self.session_id = None;
    }

    /// Missing or non finite coordinates keep the current value
    pub fn move_to(&mut self, x: Option<f64>, y: Option<f64>) {
        self.x = safe_coordinate(x, self.x);
        self.y = safe_coordinate(y, self.y);
    }
}

fn safe_coordinate(value: Option<f64>, fallback: f64) -> f64 {
    match value {
        Some(value) if value.is_finite() => value.clamp(0.0, MAX_COORDINATE),
        _ => fallback,
    }
}

/// Builds the stored pomodoro state out of whatever the client reported
pub fn normalize_pomodoro(update: &UpdateTimerCommand) -> PomodoroState {
    let phase = match update.phase.as_deref() {
        Some("break") => PomodoroPhase::Break,
        _ => PomodoroPhase::Focus,
    };

    let seconds_left = match update.seconds_left {
        Some(seconds) if seconds.is_finite() => {
            seconds.floor().clamp(1.0, MAX_POMODORO_SECONDS as f64) as u32
        }
        _ => DEFAULT_POMODORO_SECONDS,
    };

    let updated_at = match update.updated_at {
        Some(updated_at) if updated_at.is_finite() => updated_at,
        _ => now_millis() as f64,
    };

    PomodoroState {
        phase,
        is_running: update.is_running.unwrap_or(false),
        seconds_left,
        updated_at,
    }
}

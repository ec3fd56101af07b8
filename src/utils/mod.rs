use crate::core::PlayerEvent;

pub fn format_timestamp(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    let (hours, minutes, secs) = (total / 3600, (total % 3600) / 60, total % 60);

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

/// One-line rendering of an event for terminal output.
pub fn describe_event(event: &PlayerEvent) -> String {
    match event {
        PlayerEvent::TimeUpdate(position) => {
            format!("{} {}", event.name(), format_timestamp(*position))
        }
        PlayerEvent::Error { code } => format!("{} (code {})", event.name(), code),
        PlayerEvent::LoadedMetadata(document) => match document.title() {
            Some(title) => format!("{} \"{}\"", event.name(), title),
            None if document.is_empty() => format!("{} (empty)", event.name()),
            None => format!("{} ({} fields)", event.name(), document.fields().len()),
        },
        _ => event.name().to_string(),
    }
}

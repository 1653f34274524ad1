use chrono::NaiveDateTime;
use serde_json::Value;

use crate::util::{parse_graph_datetime, truncate_preview};

const PREVIEW_MAX_CHARS: usize = 150;

fn value_items(payload: &Value) -> &[Value] {
    payload
        .get("value")
        .and_then(|v| v.as_array())
        .map(|a| a.as_slice())
        .unwrap_or(&[])
}

fn str_or<'a>(value: &'a Value, key: &str, fallback: &'a str) -> &'a str {
    value.get(key).and_then(|v| v.as_str()).unwrap_or(fallback)
}

/// Human-readable email listing. Unreadable timestamps fall back to the raw
/// Graph string rather than erroring out of the whole listing.
pub(crate) fn render_emails(payload: &Value, search: Option<&str>) -> String {
    let emails = value_items(payload);
    let search_text = match search {
        Some(s) => format!(" matching '{s}'"),
        None => String::new(),
    };
    if emails.is_empty() {
        return format!("\u{1f4e7} No emails found{search_text}.");
    }

    let mut summaries = Vec::with_capacity(emails.len());
    for email in emails {
        let from_addr = email["from"]["emailAddress"]["address"]
            .as_str()
            .unwrap_or("Unknown");
        let subject = str_or(email, "subject", "No subject");
        let received = str_or(email, "receivedDateTime", "Unknown");
        let is_read = email.get("isRead").and_then(|v| v.as_bool()).unwrap_or(false);
        let preview = str_or(email, "bodyPreview", "");

        let formatted_date = parse_graph_datetime(received)
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| received.to_string());
        let status = if is_read { "\u{2705} Read" } else { "\u{1f534} Unread" };

        summaries.push(format!(
            "\u{1f4e7} **{subject}**\n   From: {from_addr}\n   Date: {formatted_date}\n   Status: {status}\n   Preview: {}\n",
            truncate_preview(preview, PREVIEW_MAX_CHARS)
        ));
    }

    format!(
        "\u{1f4e7} Found {} emails{search_text}:\n\n{}",
        emails.len(),
        summaries.join("\n")
    )
}

/// Compress a same-day window to a single date with two clock times.
pub(crate) fn format_event_window(start_raw: &str, end_raw: &str) -> String {
    match (parse_graph_datetime(start_raw), parse_graph_datetime(end_raw)) {
        (Some(start), Some(end)) => format_window(&start, &end),
        _ => format!("{start_raw} - {end_raw}"),
    }
}

fn format_window(start: &NaiveDateTime, end: &NaiveDateTime) -> String {
    if start.date() == end.date() {
        format!(
            "{} - {}",
            start.format("%Y-%m-%d %H:%M"),
            end.format("%H:%M")
        )
    } else {
        format!(
            "{} - {}",
            start.format("%Y-%m-%d %H:%M"),
            end.format("%Y-%m-%d %H:%M")
        )
    }
}

pub(crate) fn render_events(payload: &Value, days: u64) -> String {
    let events = value_items(payload);
    if events.is_empty() {
        return format!("\u{1f4c5} No events found in the next {days} days.");
    }

    let mut summaries = Vec::with_capacity(events.len());
    for event in events {
        let subject = str_or(event, "subject", "No title");
        let start_raw = event["start"]["dateTime"].as_str().unwrap_or("");
        let end_raw = event["end"]["dateTime"].as_str().unwrap_or("");
        let location = event["location"]["displayName"]
            .as_str()
            .unwrap_or("No location");

        let attendee_list: Vec<&str> = event
            .get("attendees")
            .and_then(|v| v.as_array())
            .map(|atts| {
                atts.iter()
                    .filter_map(|att| att["emailAddress"]["address"].as_str())
                    .collect()
            })
            .unwrap_or_default();
        let attendee_text = if attendee_list.is_empty() {
            String::new()
        } else {
            format!("\n   Attendees: {}", attendee_list.join(", "))
        };

        summaries.push(format!(
            "\u{1f4c5} **{subject}**\n   When: {}\n   Where: {location}{attendee_text}\n",
            format_event_window(start_raw, end_raw)
        ));
    }

    format!(
        "\u{1f4c5} Found {} events in the next {days} days:\n\n{}",
        events.len(),
        summaries.join("\n")
    )
}

pub(crate) fn render_created_event(
    subject: &str,
    start: &NaiveDateTime,
    end: &NaiveDateTime,
    location: Option<&str>,
    attendees: &[String],
) -> String {
    let location_text = match location {
        Some(loc) => format!("\n   Location: {loc}"),
        None => String::new(),
    };
    let attendee_text = if attendees.is_empty() {
        String::new()
    } else {
        format!("\n   Attendees: {}", attendees.join(", "))
    };
    format!(
        "\u{2705} Calendar event created successfully!\n   Title: {subject}\n   When: {} - {}{location_text}{attendee_text}",
        start.format("%Y-%m-%d %H:%M"),
        end.format("%H:%M")
    )
}

pub(crate) fn render_user_info(user: &Value) -> String {
    let name = str_or(user, "displayName", "N/A");
    let email = user
        .get("mail")
        .and_then(|v| v.as_str())
        .or_else(|| user.get("userPrincipalName").and_then(|v| v.as_str()))
        .unwrap_or("N/A");
    let job_title = str_or(user, "jobTitle", "N/A");
    let office = str_or(user, "officeLocation", "N/A");
    let phone = user
        .get("businessPhones")
        .and_then(|v| v.as_array())
        .and_then(|phones| phones.first())
        .and_then(|v| v.as_str())
        .unwrap_or("N/A");
    format!(
        "\u{1f464} **User Information**\n   Name: {name}\n   Email: {email}\n   Job Title: {job_title}\n   Office: {office}\n   Phone: {phone}"
    )
}

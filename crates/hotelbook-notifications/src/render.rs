//! Booking confirmation rendering.

use std::fmt::Write as _;

use chrono::NaiveDate;
use hotelbook_core::event::BookingCreated;
use hotelbook_core::mail::EmailMessage;

/// Renders the confirmation email for a booking event.
#[must_use]
pub fn booking_confirmation(event: &BookingCreated) -> EmailMessage {
    let check_in = long_date(event.check_in);
    let check_out = long_date(event.check_out);
    let nights = event.nights();
    let total = format!("LKR {}", format_amount(event.total_cost));

    let mut text = String::new();
    let _ = writeln!(text, "Dear {} {},", event.first_name, event.last_name);
    let _ = writeln!(text);
    let _ = writeln!(text, "We're excited to confirm your booking! Here are the details:");
    let _ = writeln!(text);
    let _ = writeln!(text, "Hotel Name: {}", event.hotel_name);
    let _ = writeln!(text, "Location: {}, {}", event.hotel_city, event.hotel_country);
    let _ = writeln!(text, "Check-in: {check_in}");
    let _ = writeln!(text, "Check-out: {check_out}");
    let _ = writeln!(text, "Number of Nights: {nights}");
    let _ = writeln!(text, "Adults: {}", event.adult_count);
    let _ = writeln!(text, "Children: {}", event.child_count);
    let _ = writeln!(text, "Total Cost: {total}");
    let _ = writeln!(text);
    let _ = writeln!(text, "We look forward to hosting you!");
    let _ = writeln!(text, "Hotel Booking Team");

    let rows = [
        ("Hotel Name", escape(&event.hotel_name)),
        (
            "Location",
            format!("{}, {}", escape(&event.hotel_city), escape(&event.hotel_country)),
        ),
        ("Check-in", check_in),
        ("Check-out", check_out),
        ("Number of Nights", nights.to_string()),
        ("Adults", event.adult_count.to_string()),
        ("Children", event.child_count.to_string()),
    ];
    let mut details = String::new();
    for (label, value) in rows {
        let _ = writeln!(
            details,
            "<tr><td class=\"label\">{label}:</td><td class=\"value\">{value}</td></tr>"
        );
    }

    let html = format!(
        "<!DOCTYPE html>\n\
         <html lang=\"en\">\n\
         <head><meta charset=\"UTF-8\"><title>Booking Confirmation</title></head>\n\
         <body>\n\
         <h1>Booking Confirmed!</h1>\n\
         <p>Dear {first} {last},</p>\n\
         <p>We're excited to confirm your booking! Here are the details:</p>\n\
         <table>\n{details}</table>\n\
         <p class=\"total\">Total Cost: {total}</p>\n\
         <ul>\n\
         <li>Please bring a valid ID for check-in</li>\n\
         <li>Check-in time is usually after 2:00 PM</li>\n\
         <li>Check-out time is usually before 11:00 AM</li>\n\
         </ul>\n\
         <p>We look forward to hosting you!</p>\n\
         <p>Best regards,<br><strong>Hotel Booking Team</strong></p>\n\
         </body>\n\
         </html>\n",
        first = escape(&event.first_name),
        last = escape(&event.last_name),
    );

    EmailMessage {
        to: event.user_email.clone(),
        subject: format!("Booking Confirmation - {}", event.hotel_name),
        text,
        html,
    }
}

/// `Sunday, June 1, 2025`.
#[must_use]
pub fn long_date(date: NaiveDate) -> String {
    date.format("%A, %B %-d, %Y").to_string()
}

/// Groups thousands with `,` and keeps at most two decimals, dropping
/// trailing zeros: `30000.0` renders as `30,000`, `1234.5` as `1,234.5`.
#[must_use]
pub fn format_amount(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (whole, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let fraction = fraction.trim_end_matches('0');
    let sign = if amount < 0.0 && fixed != "0.00" { "-" } else { "" };
    if fraction.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{fraction}")
    }
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

use chrono::Local;
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use sopkoll_core::transform::{days_remaining_text, format_date};

use crate::app::{App, Screen};

pub(crate) fn draw(frame: &mut Frame<'_>, app: &App) {
    let area = frame.area();

    // Outer layout: title, main content, status line
    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [header_area, content_area, status_area] = chunks else {
        return;
    };

    // Title / header
    let header = Paragraph::new("sopkoll – sophämtningsschema")
        .block(Block::default().borders(Borders::ALL).title("Sopkoll"));
    frame.render_widget(header, *header_area);

    // Main screen
    match app.screen {
        Screen::MunicipalitySelect => draw_municipality_select(frame, app, *content_area),
        Screen::AddressSearch => draw_address_search(frame, app, *content_area),
        Screen::ScheduleView => draw_schedule_view(frame, app, *content_area),
    }

    // Status bar
    let nav_hint = match app.screen {
        Screen::MunicipalitySelect => "↑/↓ move · Enter select municipality · q/Ctrl-C quit",
        Screen::AddressSearch => "Type to search · ↑/↓ move · Enter select address · Esc back · Ctrl-C quit",
        Screen::ScheduleView => "r refresh · a change address · n enable reminders · q/Ctrl-C quit",
    };

    let status_text = if let Some(banner) = &app.banner {
        format!("🔔 {} – {} · o öppna · {nav_hint}", banner.title, banner.body)
    } else if app.is_loading {
        format!("Hämtar… · {nav_hint}")
    } else if let Some(msg) = &app.error_message {
        format!("{msg} · {nav_hint}")
    } else if let Some(advisory) = &app.advisory {
        format!("{advisory} · {nav_hint}")
    } else {
        nav_hint.to_owned()
    };

    let status_style = if app.error_message.is_some() {
        Style::default().fg(Color::Red)
    } else if app.advisory.is_some() {
        Style::default().fg(Color::Yellow)
    } else if app.is_loading {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };

    let status = Paragraph::new(status_text)
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .style(status_style)
        .wrap(Wrap { trim: true });

    frame.render_widget(status, *status_area);
}

fn draw_municipality_select(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let items = app
        .municipalities
        .iter()
        .enumerate()
        .map(|(idx, (_id, name))| {
            let prefix = if idx == app.municipality_list_index {
                "> "
            } else {
                "  "
            };
            ListItem::new(format!("{prefix}{name}"))
        })
        .collect::<Vec<ListItem<'_>>>();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Select municipality (↑/↓, Enter)"),
        )
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    let mut state = ListState::default();
    if !app.municipalities.is_empty() {
        state.select(Some(app.municipality_list_index));
    }
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_address_search(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // input
            Constraint::Min(0),    // results
        ])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [input_area, results_area] = chunks else {
        return;
    };

    let current = app
        .selected_address
        .as_ref()
        .map(|address| format!(" – nuvarande: {}", address.label))
        .unwrap_or_default();

    let input = Paragraph::new(app.search_input.as_str())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Sök adress{current}")),
        )
        .wrap(Wrap { trim: true });

    frame.render_widget(input, *input_area);

    let items = if app.search_input.trim().chars().count() < 2 {
        vec![ListItem::new("Skriv minst två tecken för att söka.")]
    } else if app.search_results.is_empty() {
        vec![ListItem::new("Inga adresser hittades")]
    } else {
        app.search_results
            .iter()
            .map(|address| ListItem::new(address.label.clone()))
            .collect()
    };

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Adresser (↑/↓, Enter)"),
        )
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    let mut state = ListState::default();
    if !app.search_results.is_empty() {
        state.select(Some(app.search_list_index));
    }
    frame.render_stateful_widget(list, *results_area, &mut state);
}

fn draw_schedule_view(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let address_label = app
        .selected_address
        .as_ref()
        .map_or("<adress>", |address| address.label.as_str());

    let title = format!("Sophämtning – {address_label}");

    if app.is_loading && app.grouped.is_empty() {
        let paragraph = Paragraph::new("Hämtar schema…")
            .block(Block::default().borders(Borders::ALL).title(title))
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
        return;
    }

    if app.grouped.is_empty() {
        let text = if app.error_message.is_some() {
            "Kunde inte hämta sophämtningsschema"
        } else {
            "Inga kommande hämtningar."
        };
        let paragraph = Paragraph::new(text)
            .block(Block::default().borders(Borders::ALL).title(title))
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
        return;
    }

    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5), // nearest collection hero
            Constraint::Min(0),    // full list
        ])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [hero_area, list_area] = chunks else {
        return;
    };

    if let Some(nearest) = app.grouped.first() {
        let chips = nearest
            .items
            .iter()
            .map(|item| format!("{} {}", item.icon, item.waste_type))
            .collect::<Vec<_>>()
            .join("  ");
        let hero_text = format!(
            "{}\n{}\n{chips}",
            days_remaining_text(nearest.days_remaining),
            format_date(nearest.date),
        );
        let hero = Paragraph::new(hero_text)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Nästa hämtning"),
            )
            .style(Style::default().fg(Color::Green).add_modifier(Modifier::BOLD));
        frame.render_widget(hero, *hero_area);
    }

    let today = Local::now().date_naive();
    let mut rows: Vec<ListItem<'_>> = Vec::new();
    for group in &app.grouped {
        let mut header_style = Style::default().add_modifier(Modifier::BOLD);
        if group.date <= today {
            header_style = header_style.fg(Color::Yellow);
        }
        rows.push(
            ListItem::new(format!(
                "{} · {}",
                format_date(group.date),
                days_remaining_text(group.days_remaining)
            ))
            .style(header_style),
        );
        for item in &group.items {
            let mut line = format!("  {} {}", item.icon, item.waste_type);
            if !item.frequency.is_empty() {
                line.push_str(&format!(" · {}", item.frequency));
            }
            if !item.bin_size.is_empty() {
                line.push_str(&format!(" · {}", item.bin_size));
            }
            rows.push(ListItem::new(line).style(Style::default().fg(hex_color(item.color))));
        }
    }

    let hint = if matches!(
        app.permission,
        sopkoll_agent::NotificationPermission::Default
    ) {
        format!("{title} · n aktivera påminnelser")
    } else {
        title
    };

    let list = List::new(rows).block(Block::default().borders(Borders::ALL).title(hint));
    frame.render_widget(list, *list_area);
}

// The classification colors are hex strings; ratatui wants RGB.
fn hex_color(hex: &str) -> Color {
    let raw = hex.strip_prefix('#').unwrap_or(hex);
    if raw.len() != 6 {
        return Color::Gray;
    }
    let channel = |start: usize| {
        raw.get(start..start + 2)
            .and_then(|pair| u8::from_str_radix(pair, 16).ok())
    };
    match (channel(0), channel(2), channel(4)) {
        (Some(red), Some(green), Some(blue)) => Color::Rgb(red, green, blue),
        _ => Color::Gray,
    }
}

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use userdir_core::models::{Field, User};
use userdir_core::utils::{format_optional, format_phone, truncate_string};
use userdir_core::DetailState;

use crate::app::{App, AppState, View};

use super::styles;

/// Width of the name column in the list view
const NAME_COLUMN_WIDTH: usize = 28;

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // Title bar
            Constraint::Min(5),    // Main content
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, app, chunks[0]);
    match app.view {
        View::List => render_user_list(frame, app, chunks[1]),
        View::Detail => render_user_detail(frame, app, chunks[1]),
    }
    render_status_bar(frame, app, chunks[2]);

    // Render overlays
    match app.state {
        AppState::ShowingHelp => render_help_overlay(frame),
        AppState::AddingUser => render_add_form(frame, app),
        AppState::ConfirmingDelete => render_delete_overlay(frame, app),
        AppState::ConfirmingQuit => render_quit_overlay(frame),
        AppState::Normal | AppState::Quitting => {}
    }

    // Notices block everything, including other overlays
    if let Some(ref notice) = app.notice {
        render_notice_overlay(frame, notice);
    }
}

fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let title = match app.view {
        View::List => "  All Users",
        View::Detail => "  User Details",
    };
    let help_hint = "[?] Help";

    let title_line = Line::from(vec![
        Span::styled(title, styles::title_style()),
        Span::raw(" ".repeat(
            area.width
                .saturating_sub(title.len() as u16 + help_hint.len() as u16 + 2)
                as usize,
        )),
        Span::styled(help_hint, styles::muted_style()),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    frame.render_widget(Paragraph::new(title_line).block(block), area);
}

fn render_user_list(frame: &mut Frame, app: &App, area: Rect) {
    let users = app.directory.users();

    let block = Block::default()
        .title(format!(" Users ({}) ", users.len()))
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(matches!(app.state, AppState::Normal)));

    if users.is_empty() {
        let (text, style) = if app.directory.is_loading() {
            ("Loading users...", styles::muted_style())
        } else {
            ("No users!!", styles::error_style())
        };
        let paragraph = Paragraph::new(Line::from(Span::styled(text, style)))
            .alignment(Alignment::Center)
            .block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let items: Vec<ListItem> = users
        .iter()
        .enumerate()
        .map(|(i, user)| {
            let style = if i == app.selection {
                styles::selected_style()
            } else {
                styles::list_item_style()
            };
            ListItem::new(Line::from(vec![
                Span::raw(format!(
                    "{:<width$}",
                    truncate_string(&user.name, NAME_COLUMN_WIDTH),
                    width = NAME_COLUMN_WIDTH
                )),
                Span::raw("  "),
                Span::styled(user.email.clone(), styles::muted_style()),
            ]))
            .style(style)
        })
        .collect();

    let mut state = ListState::default();
    state.select(Some(app.selection));

    frame.render_stateful_widget(List::new(items).block(block), area, &mut state);
}

fn render_user_detail(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    let lines = match app.detail.state() {
        DetailState::Loading(_) | DetailState::Closed => {
            vec![Line::from(Span::styled("Loading...", styles::muted_style()))]
        }
        DetailState::NotFound(_) => {
            vec![Line::from(Span::styled("USER NOT FOUND!!!", styles::error_style()))]
        }
        DetailState::Found(user) => detail_lines(user),
    };

    let alignment = if matches!(app.detail.state(), DetailState::Found(_)) {
        Alignment::Left
    } else {
        Alignment::Center
    };

    let paragraph = Paragraph::new(lines)
        .alignment(alignment)
        .wrap(Wrap { trim: false })
        .block(block);
    frame.render_widget(paragraph, area);
}

fn detail_lines(user: &User) -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(Span::styled(format!(" {}", user.name), styles::title_style())),
        Line::from(""),
        Line::from(Span::styled(" Personal Info", styles::highlight_style())),
        labeled("Email", user.email.clone()),
        labeled("Phone", format_phone(&user.phone)),
    ];
    if user.username.is_some() || user.website.is_some() {
        lines.push(labeled("Username", format_optional(user.username.as_deref(), "-")));
        lines.push(labeled("Website", format_optional(user.website.as_deref(), "-")));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(" Address", styles::highlight_style())));
    push_section(&mut lines, user.address_lines());

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(" Company", styles::highlight_style())));
    push_section(&mut lines, user.company_lines());

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(" [Esc] Back", styles::muted_style())));
    lines
}

fn labeled(label: &str, value: String) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("   {:<10}", format!("{}:", label)), styles::muted_style()),
        Span::styled(value, styles::list_item_style()),
    ])
}

fn push_section(lines: &mut Vec<Line<'static>>, section: Vec<String>) {
    if section.is_empty() {
        lines.push(Line::from(Span::styled("   -", styles::muted_style())));
    }
    for text in section {
        lines.push(Line::from(Span::styled(format!("   {}", text), styles::list_item_style())));
    }
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let shortcuts = match app.view {
        View::List => "[a]dd | [d]elete | [r]eload | [q]uit",
        View::Detail => "[Esc] back | [q]uit",
    };

    let left_text = match app.status_message {
        Some(ref msg) => format!(" {} ", msg),
        None => format!(" Cached {} ", app.directory.cache_age()),
    };
    let middle_text = format!(" {} @ {} ", app.config.storage, app.config.api_base_url());
    let right_text = format!(" {} ", shortcuts);

    let width = area.width as usize;
    let used = left_text.len() + middle_text.len() + right_text.len();
    let spans = if used <= width {
        let gap = width - used;
        vec![
            Span::styled(left_text, styles::muted_style()),
            Span::raw(" ".repeat(gap / 2)),
            Span::styled(middle_text, styles::muted_style()),
            Span::raw(" ".repeat(gap - gap / 2)),
            Span::styled(right_text, styles::muted_style()),
        ]
    } else {
        let padding = width
            .saturating_sub(left_text.len())
            .saturating_sub(right_text.len());
        vec![
            Span::styled(left_text, styles::muted_style()),
            Span::raw(" ".repeat(padding)),
            Span::styled(right_text, styles::muted_style()),
        ]
    };

    let paragraph = Paragraph::new(Line::from(spans)).style(styles::status_bar_style());
    frame.render_widget(paragraph, area);
}

fn overlay_block() -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default())
}

fn render_help_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(46, 19, frame.area());
    frame.render_widget(Clear, area);

    let version = env!("CARGO_PKG_VERSION");
    let key = |k: &'static str, desc: &'static str| {
        Line::from(vec![
            Span::styled(format!("  {:<10}", k), styles::help_key_style()),
            Span::styled(desc, styles::help_desc_style()),
        ])
    };

    let help_text = vec![
        Line::from(Span::styled(" userdir", styles::title_style())),
        Line::from(Span::styled(format!(" version {}", version), styles::muted_style())),
        Line::from(""),
        Line::from(Span::styled(" Navigation", styles::highlight_style())),
        key("↑/↓ j/k", "Move selection"),
        key("PgUp/PgDn", "Move by a page"),
        key("Enter", "View user details"),
        key("Esc", "Back to the list"),
        Line::from(""),
        Line::from(Span::styled(" Actions", styles::highlight_style())),
        key("a", "Add a user"),
        key("d", "Delete the selected user"),
        key("r", "Reload from the server"),
        key("q", "Quit"),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Press ", styles::muted_style()),
            Span::styled("?", styles::help_key_style()),
            Span::styled(" or ", styles::muted_style()),
            Span::styled("Esc", styles::help_key_style()),
            Span::styled(" to close", styles::muted_style()),
        ]),
    ];

    frame.render_widget(Paragraph::new(help_text).block(overlay_block()), area);
}

fn render_add_form(frame: &mut Frame, app: &App) {
    let area = centered_rect_fixed(52, 12, frame.area());
    frame.render_widget(Clear, area);

    let mut lines = vec![
        Line::from(Span::styled(" Create New User", styles::title_style())),
        Line::from(""),
    ];

    for field in Field::ALL {
        let focused = app.form.focus == field;
        let cursor = if focused { "▌" } else { "" };
        lines.push(Line::from(vec![
            Span::styled(format!("  {:<6} [", field.label()), styles::muted_style()),
            Span::styled(
                format!("{:<32}", format!("{}{}", app.form.value(field), cursor)),
                styles::input_style(focused),
            ),
            Span::styled("]", styles::muted_style()),
        ]));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::raw("  "),
        Span::styled("[Enter]", styles::help_key_style()),
        Span::styled(" Add User  ", styles::success_style()),
        Span::styled("[Tab]", styles::help_key_style()),
        Span::styled(" Next  ", styles::muted_style()),
        Span::styled("[Esc]", styles::help_key_style()),
        Span::styled(" Close", styles::muted_style()),
    ]));

    frame.render_widget(Paragraph::new(lines).block(overlay_block()), area);
}

fn render_delete_overlay(frame: &mut Frame, app: &App) {
    let Some(ref request) = app.pending_delete else {
        return;
    };

    let area = centered_rect_fixed(50, 8, frame.area());
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(format!("  {}", request.prompt()), styles::highlight_style())),
        Line::from(Span::styled(
            format!("  {}", truncate_string(request.name(), 44)),
            styles::list_item_style(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Press ", styles::muted_style()),
            Span::styled("[Y]", styles::help_key_style()),
            Span::styled(" to delete, ", styles::muted_style()),
            Span::styled("[N]", styles::help_key_style()),
            Span::styled(" to cancel", styles::muted_style()),
        ]),
    ];

    frame.render_widget(Paragraph::new(lines).block(overlay_block()), area);
}

fn render_quit_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(46, 7, frame.area());
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "   Are you sure you want to quit?",
            styles::highlight_style(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("   Press ", styles::muted_style()),
            Span::styled("[Y]", styles::help_key_style()),
            Span::styled(" to quit, ", styles::muted_style()),
            Span::styled("[N]", styles::help_key_style()),
            Span::styled(" to cancel", styles::muted_style()),
        ]),
    ];

    frame.render_widget(Paragraph::new(lines).block(overlay_block()), area);
}

fn render_notice_overlay(frame: &mut Frame, notice: &str) {
    let area = centered_rect_fixed(44, 7, frame.area());
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(notice.to_string(), styles::error_style())),
        Line::from(""),
        Line::from(Span::styled("Press any key", styles::muted_style())),
    ];

    let paragraph = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(overlay_block());
    frame.render_widget(paragraph, area);
}

/// Create a centered rectangle with fixed dimensions
fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}
